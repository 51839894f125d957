//! JSON-lines publishing of arbitration records.

use async_trait::async_trait;
use motive_core::{ArbitrationRecord, Publisher};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Writes each record as one JSON object per line.
pub struct JsonLinesPublisher<W> {
    out: Mutex<W>,
}

/// Records on stdout; logs go to stderr.
pub type StdoutPublisher = JsonLinesPublisher<tokio::io::Stdout>;

impl StdoutPublisher {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesPublisher<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> Publisher for JsonLinesPublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, record: &ArbitrationRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}
