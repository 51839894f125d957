use anyhow::Context;
use clap::Parser;
use motive_core::{LifecycleEvent, MotiveConfig};
use motive_limbic::DriveSystem;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod publisher;

use publisher::StdoutPublisher;

/// Run a motivational drive model and stream the dominant motivation.
///
/// Lifecycle events are read from stdin as JSON lines; one arbitration
/// record per tick is written to stdout as a JSON line.
#[derive(Parser, Debug)]
#[command(name = "motive", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML model
    #[arg(short, long, default_value = "motive.toml", env = "MOTIVE_CONFIG")]
    config: PathBuf,

    /// Stop after this many arbitration ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Log as JSON instead of plain text
    #[arg(long)]
    log_json: bool,

    /// Log value-change telemetry (target motive::telemetry)
    #[arg(long)]
    telemetry: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn forward_event(system: &DriveSystem, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<LifecycleEvent>(line) {
        Ok(event) => {
            if let Err(e) = system.send_event(event).await {
                warn!("Dropping event: {:#}", e);
            }
        }
        Err(e) => warn!("Ignoring malformed event {:?}: {}", line, e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = MotiveConfig::load(&args.config)?;
    if args.telemetry {
        config.runtime.telemetry = true;
    }

    let system = DriveSystem::from_config(&config, Some(Arc::new(StdoutPublisher::stdout())), None)
        .with_context(|| format!("Invalid model in {}", args.config.display()))?;
    info!(
        "Running {} with {} motivations",
        args.config.display(),
        system.model().motivations().len()
    );

    let mut records = system.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("Interrupted");
                break;
            }

            changed = records.changed() => {
                if changed.is_err() {
                    break;
                }
                let tick = records.borrow_and_update().as_ref().map(|r| r.tick);
                if let (Some(limit), Some(tick)) = (args.ticks, tick) {
                    if tick >= limit {
                        break;
                    }
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => forward_event(&system, &line).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Stopped reading events: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    system.shutdown().await;
    Ok(())
}
