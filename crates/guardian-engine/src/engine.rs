//! Engine assembly.
//!
//! Wires the presence synchronizer to the dispatcher over the
//! accepted-sample queue and owns their shutdown.

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use std::sync::Arc;

use domain::models::{
    Bracelet, BraceletCommand, BraceletEvent, EventType, VibrationPattern,
};

use crate::config::Config;
use crate::dispatcher::{CommandOutcome, EventDispatcher, EventLedger};
use crate::error::EngineError;
use crate::sync::PresenceSynchronizer;
use crate::transport::{
    CommandTransport, DeliverySink, PermissionDirectory, PollChannel, PushChannel, ZoneDirectory,
};

/// The engine's external collaborators, bundled for assembly.
#[derive(Clone)]
pub struct EngineTransports {
    pub push: Arc<dyn PushChannel>,
    pub poll: Arc<dyn PollChannel>,
    pub zones: Arc<dyn ZoneDirectory>,
    pub permissions: Arc<dyn PermissionDirectory>,
    pub delivery: Arc<dyn DeliverySink>,
    pub commands: Arc<dyn CommandTransport>,
}

/// A running engine: per-bracelet presence workers feeding one dispatcher.
pub struct GuardianEngine {
    synchronizer: PresenceSynchronizer,
    ledger: EventLedger,
    reports_tx: mpsc::Sender<BraceletEvent>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher_handle: Mutex<Option<JoinHandle<()>>>,
}

impl GuardianEngine {
    /// Validate the configuration and start the dispatcher task. Must be
    /// called within a tokio runtime.
    pub fn start(config: Config, transports: EngineTransports) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::Config)?;

        let (samples_tx, samples_rx) = mpsc::channel(config.sync.sample_queue_capacity);
        let (reports_tx, reports_rx) = mpsc::channel(config.sync.sample_queue_capacity);
        let ledger = EventLedger::new(transports.commands);
        let hysteresis = config.dispatch.hysteresis(config.sync.poll_interval());
        let dispatcher = EventDispatcher::new(
            config.dispatch.clone(),
            hysteresis,
            transports.zones,
            transports.permissions,
            transports.delivery,
            ledger.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher_handle = tokio::spawn(dispatcher.run(samples_rx, reports_rx, shutdown_rx));

        let synchronizer = PresenceSynchronizer::new(
            config.sync.clone(),
            transports.push,
            transports.poll,
            samples_tx,
        );

        info!(
            fallback_delay_secs = config.sync.fallback_delay_secs,
            poll_interval_secs = config.sync.poll_interval_secs,
            low_battery_threshold = config.dispatch.low_battery_threshold,
            "Guardian engine started"
        );

        Ok(Self {
            synchronizer,
            ledger,
            reports_tx,
            shutdown_tx,
            dispatcher_handle: Mutex::new(Some(dispatcher_handle)),
        })
    }

    /// Ingest a device-initiated report (arrived, danger) from the inbound
    /// collaborator. The event takes the same ledger and fan-out path as
    /// dispatcher-produced events.
    pub async fn report_device_event(
        &self,
        bracelet_id: Uuid,
        event_type: EventType,
        position: Option<(f64, f64)>,
        battery_level: Option<u8>,
    ) -> Result<(), EngineError> {
        let mut event = BraceletEvent::new(bracelet_id, event_type, chrono::Utc::now());
        if let Some((latitude, longitude)) = position {
            event = event.with_position(latitude, longitude);
        }
        if let Some(level) = battery_level {
            event = event.with_battery(level);
        }
        self.reports_tx
            .send(event)
            .await
            .map_err(|_| EngineError::ShutDown)
    }

    /// Begin monitoring a bracelet.
    pub async fn watch(&self, bracelet: Bracelet) {
        self.synchronizer.start(bracelet).await;
    }

    /// Stop monitoring a bracelet. Idempotent.
    pub async fn unwatch(&self, bracelet_id: Uuid) {
        self.synchronizer.stop(bracelet_id).await;
    }

    /// Last authoritative state of a watched bracelet.
    pub async fn snapshot(&self, bracelet_id: Uuid) -> Option<Bracelet> {
        self.synchronizer.snapshot(bracelet_id).await
    }

    /// Event and command records, shareable with read surfaces.
    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Guardian acknowledgement: resolve an event, vibrate the bracelet.
    pub async fn acknowledge(
        &self,
        event_id: Uuid,
        pattern: VibrationPattern,
    ) -> Result<BraceletCommand, EngineError> {
        self.ledger.acknowledge(event_id, pattern).await
    }

    /// Apply an execution outcome reported by the command transport.
    pub async fn record_command_result(
        &self,
        command_id: Uuid,
        outcome: CommandOutcome,
    ) -> Result<BraceletCommand, EngineError> {
        self.ledger.record_command_result(command_id, outcome).await
    }

    /// Stop all presence workers, then the dispatcher.
    pub async fn shutdown(&self) {
        self.synchronizer.shutdown().await;
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.dispatcher_handle.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Dispatcher task panicked");
            }
        }
        info!("Guardian engine stopped");
    }
}
