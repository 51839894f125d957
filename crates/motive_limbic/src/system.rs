//! Drive system
//!
//! The DriveSystem owns the resolved model and runs the arbitration
//! driver. It:
//! - Selects a dominant motivation once per heartbeat interval
//! - Applies lifecycle events received on its channel
//! - Publishes one record per tick and keeps the latest on a watch channel
//! - Stops every worker on shutdown

use crate::arbitrator::{Arbitrator, DominanceHistory};
use crate::heartbeat::HeartbeatConfig;
use crate::lifecycle::LifecycleAdapter;
use crate::model::DriveModel;
use crate::telemetry::TracingTelemetry;
use motive_core::{
    ArbitrationRecord, ConfigError, LifecycleEvent, MotivationId, MotiveConfig, Publisher,
    TelemetrySink,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Dominant lineage by motivation name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DominanceNames {
    pub current: Option<String>,
    pub previous: Option<String>,
    pub saved_previous: Option<String>,
}

impl DominanceNames {
    fn resolve(history: DominanceHistory, model: &DriveModel) -> Self {
        let name = |id: Option<MotivationId>| {
            id.and_then(|id| model.motivations().iter().find(|m| m.id() == id))
                .map(|m| m.name().to_string())
        };
        Self {
            current: name(history.current),
            previous: name(history.previous),
            saved_previous: name(history.saved_previous),
        }
    }
}

pub struct DriveSystem {
    model: Arc<DriveModel>,
    adapter: Arc<LifecycleAdapter>,
    event_tx: mpsc::Sender<LifecycleEvent>,
    record_rx: watch::Receiver<Option<ArbitrationRecord>>,
    history: Arc<Mutex<DominanceNames>>,
    shutdown_tx: watch::Sender<bool>,
    driver: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DriveSystem {
    /// Build the model from `config` and start arbitrating. Must be called
    /// from within a tokio runtime.
    ///
    /// Without an explicit sink, `runtime.telemetry = true` routes
    /// telemetry to tracing.
    pub fn from_config(
        config: &MotiveConfig,
        publisher: Option<Arc<dyn Publisher>>,
        telemetry: Option<Arc<dyn TelemetrySink>>,
    ) -> Result<Self, ConfigError> {
        let telemetry = telemetry.or_else(|| {
            config
                .runtime
                .telemetry
                .then(|| Arc::new(TracingTelemetry) as Arc<dyn TelemetrySink>)
        });
        Self::with_heartbeat(
            config,
            HeartbeatConfig::from_runtime(&config.runtime),
            publisher,
            telemetry,
        )
    }

    /// Like [`DriveSystem::from_config`] with an explicit heartbeat.
    pub fn with_heartbeat(
        config: &MotiveConfig,
        heartbeat: HeartbeatConfig,
        publisher: Option<Arc<dyn Publisher>>,
        telemetry: Option<Arc<dyn TelemetrySink>>,
    ) -> Result<Self, ConfigError> {
        let model = Arc::new(DriveModel::build(config, &heartbeat, telemetry)?);
        let adapter = Arc::new(LifecycleAdapter::new(Arc::clone(&model)));
        let (event_tx, event_rx) = mpsc::channel(64);
        let (record_tx, record_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let history = Arc::new(Mutex::new(DominanceNames::default()));

        let driver = Driver {
            model: Arc::clone(&model),
            adapter: Arc::clone(&adapter),
            publisher,
            record_tx,
            history: Arc::clone(&history),
            arbitrator: Arbitrator::new(),
        };
        let handle = tokio::spawn(driver.run(heartbeat, event_rx, shutdown_rx));

        tracing::info!(
            "Drive system started (tick {:?}, evolution tick {:?})",
            heartbeat.interval,
            heartbeat.evolution_tick
        );

        Ok(Self {
            model,
            adapter,
            event_tx,
            record_rx,
            history,
            shutdown_tx,
            driver: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    pub fn model(&self) -> &Arc<DriveModel> {
        &self.model
    }

    /// Direct access to lifecycle handling, bypassing the event queue.
    pub fn adapter(&self) -> &Arc<LifecycleAdapter> {
        &self.adapter
    }

    /// Queue a lifecycle event for the driver.
    pub async fn send_event(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send lifecycle event: {}", e))
    }

    /// Watch the latest arbitration record (`None` before the first tick).
    pub fn subscribe(&self) -> watch::Receiver<Option<ArbitrationRecord>> {
        self.record_rx.clone()
    }

    pub fn latest(&self) -> Option<ArbitrationRecord> {
        self.record_rx.borrow().clone()
    }

    pub fn history(&self) -> DominanceNames {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the driver, then every evolution worker. Safe to call more
    /// than once, and from several tasks at a time.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let handle = self.driver.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Arbitration task ended abnormally: {}", e);
            }
            tracing::info!("Drive system shutting down");
        }
        self.model.stop().await;
    }
}

impl Drop for DriveSystem {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl std::fmt::Debug for DriveSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSystem")
            .field("model", &self.model)
            .field("history", &self.history())
            .finish_non_exhaustive()
    }
}

/// State owned by the background arbitration task.
struct Driver {
    model: Arc<DriveModel>,
    adapter: Arc<LifecycleAdapter>,
    publisher: Option<Arc<dyn Publisher>>,
    record_tx: watch::Sender<Option<ArbitrationRecord>>,
    history: Arc<Mutex<DominanceNames>>,
    arbitrator: Arbitrator,
}

impl Driver {
    async fn run(
        mut self,
        heartbeat: HeartbeatConfig,
        mut event_rx: mpsc::Receiver<LifecycleEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(heartbeat.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,

                Some(event) = event_rx.recv() => {
                    self.adapter.handle(&event).await;
                }

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Arbitration task stopped after {} ticks", self.arbitrator.ticks());
    }

    async fn tick(&mut self) {
        let readings = self.model.readings().await;
        let Some(decision) = self.arbitrator.arbitrate(&readings) else {
            tracing::error!("No motivation could be selected this tick");
            return;
        };

        if decision.changed {
            tracing::info!("Dominant motivation: {}", decision.dominant_name);
        }
        tracing::trace!("Tick {}: {:?}", decision.tick, decision.intensities);

        *self.history.lock().unwrap_or_else(PoisonError::into_inner) =
            DominanceNames::resolve(self.arbitrator.history(), &self.model);

        let record = decision.to_record();
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&record).await {
                tracing::error!("Failed to publish tick {}: {:#}", record.tick, e);
            }
        }
        self.record_tx.send_replace(Some(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use motive_core::ActionStatus;
    use std::time::Duration;
    use tokio::time::sleep;

    const MODEL: &str = r#"
[[evolutions]]
id = 1
kind = 1
slope = -1.0

[[evolutions]]
id = 2
kind = 4
step = 50.0

[[homeostatic_variables]]
id = 1
name = "energy"
initial_value = 100
ideal_value = 100
upper_limit = 100
lower_limit = 0
evolution = 1

[[effects]]
id = 1
evolution = 2
related_hv = [1]

[[actions]]
id = 1
name = "eat"
agent = 1
effects = [1]

[[agents]]
id = 1
name = "self"

[[motivations]]
id = 1
name = "none"
threshold = 1e9

[[motivations]]
id = 2
name = "hunger"
threshold = 2.5
related_hv = [1]
"#;

    fn config() -> MotiveConfig {
        MotiveConfig::from_toml_str(MODEL).unwrap()
    }

    fn heartbeat(interval_ms: u64) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_millis(interval_ms),
            ..HeartbeatConfig::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<ArbitrationRecord>>,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(&self, record: &ArbitrationRecord) -> anyhow::Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Publisher for Failing {
        async fn publish(&self, _record: &ArbitrationRecord) -> anyhow::Result<()> {
            anyhow::bail!("transport down")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deficit_after_n_ticks() {
        let system = DriveSystem::with_heartbeat(&config(), heartbeat(1000), None, None).unwrap();
        // Evolution steps at t = 0, 1, 2, 3, 4
        sleep(Duration::from_millis(4500)).await;
        let energy = system.model().homeostatic_variable(1).unwrap();
        assert_eq!(energy.get_deficit().await, 5.0);

        sleep(Duration::from_secs(200)).await;
        assert_eq!(energy.get_deficit().await, 100.0);
        system.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_record_per_tick_and_takeover() {
        let recorder = Arc::new(Recorder::default());
        let system = DriveSystem::with_heartbeat(
            &config(),
            heartbeat(300),
            Some(recorder.clone() as Arc<dyn Publisher>),
            None,
        )
        .unwrap();

        // Ticks at 0.0, 0.3, ..., 2.4; hunger crosses 2.5 once energy hits 97 at t = 2
        sleep(Duration::from_millis(2500)).await;
        let records = recorder.records.lock().unwrap().clone();
        assert_eq!(records.len(), 9);
        assert!(records.iter().all(|r| r.intensities.len() == 2));
        assert_eq!(records[0].tick, 1);
        assert_eq!(records[5].dominant, "none");
        assert_eq!(records[8].dominant, "hunger");
        assert_eq!(records[8].intensity("hunger"), Some(3.0));

        assert_eq!(system.latest(), records.last().cloned());
        assert_eq!(
            system.history(),
            DominanceNames {
                current: Some("hunger".into()),
                previous: Some("hunger".into()),
                saved_previous: Some("none".into()),
            }
        );
        system.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_go_through_the_queue() {
        let system = DriveSystem::with_heartbeat(&config(), heartbeat(1000), None, None).unwrap();
        sleep(Duration::from_millis(2500)).await;

        system
            .send_event(LifecycleEvent::action("eat", ActionStatus::Started))
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(system.adapter().active_actions().await, vec![1]);

        // The step effect jumped 97 -> 100 and settled into the baseline
        let energy = system.model().homeostatic_variable(1).unwrap();
        assert_eq!(energy.get_deficit().await, 0.0);
        assert!(energy.baseline().is_evolving());
        system.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_publisher_does_not_stop_ticks() {
        let system =
            DriveSystem::with_heartbeat(&config(), heartbeat(1000), Some(Arc::new(Failing)), None)
                .unwrap();
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(system.latest().map(|r| r.tick), Some(4));
        system.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_reading_is_zeroed() {
        let mut cfg = config();
        cfg.homeostatic_variables[0].ideal_value = f64::NAN;
        let system = DriveSystem::with_heartbeat(&cfg, heartbeat(1000), None, None).unwrap();
        sleep(Duration::from_millis(500)).await;

        let record = system.latest().unwrap();
        assert_eq!(record.intensity("hunger"), Some(0.0));
        assert_eq!(record.dominant, "none");
        system.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent_and_stops_everything() {
        let system = DriveSystem::with_heartbeat(&config(), heartbeat(1000), None, None).unwrap();
        system.adapter().on_action("eat", ActionStatus::Started).await;
        sleep(Duration::from_millis(1500)).await;

        tokio::join!(system.shutdown(), system.shutdown());
        system.shutdown().await;

        let energy = system.model().homeostatic_variable(1).unwrap();
        assert!(energy.baseline().is_stopped());
        let ticks = system.latest().map(|r| r.tick);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(system.latest().map(|r| r.tick), ticks);
        let late = LifecycleEvent::action("eat", ActionStatus::Stopped);
        assert!(system.send_event(late).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_fallback_fails_startup() {
        let mut cfg = config();
        cfg.motivations.remove(0);
        assert!(matches!(
            DriveSystem::from_config(&cfg, None, None),
            Err(ConfigError::MissingFallbackMotivation)
        ));
    }
}
