//! Event dispatch and the guardian acknowledgement path.
//!
//! The dispatcher consumes accepted samples, evaluates every zone attached
//! to the bracelet, edge-triggers low-battery and status events, and fans
//! each produced event through the notification gate over the bracelet's
//! permission rows. Admitted (guardian, event) pairs go to the delivery
//! sink; transport from there on is the sender's problem.
//!
//! Guardian replies flow the other way: `acknowledge` resolves an event
//! and issues a vibration command whose lifecycle (pending, then executed
//! or failed, exactly once) is tracked in the [`EventLedger`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use domain::models::{
    BraceletCommand, BraceletEvent, BraceletStatus, EventType, PositionSample, VibrationPattern,
};
use domain::services::notification_gate;
use domain::services::zone_evaluator::{HysteresisConfig, ZoneEvaluator};

use crate::config::DispatchConfig;
use crate::error::EngineError;
use crate::metrics;
use crate::transport::{CommandTransport, DeliverySink, PermissionDirectory, ZoneDirectory};

/// Outcome reported back by the device command transport.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Executed { at: DateTime<Utc> },
    Failed { reason: String },
}

/// Shared record of events and commands, and the guardian-facing
/// acknowledgement surface.
#[derive(Clone)]
pub struct EventLedger {
    events: Arc<Mutex<HashMap<Uuid, BraceletEvent>>>,
    commands: Arc<Mutex<HashMap<Uuid, BraceletCommand>>>,
    command_transport: Arc<dyn CommandTransport>,
}

impl EventLedger {
    pub fn new(command_transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
            commands: Arc::new(Mutex::new(HashMap::new())),
            command_transport,
        }
    }

    pub(crate) async fn insert(&self, event: BraceletEvent) {
        self.events.lock().await.insert(event.id, event);
    }

    /// Look up one event.
    pub async fn event(&self, event_id: Uuid) -> Option<BraceletEvent> {
        self.events.lock().await.get(&event_id).cloned()
    }

    /// All events for a bracelet, most recent first.
    pub async fn events_for(&self, bracelet_id: Uuid) -> Vec<BraceletEvent> {
        let events = self.events.lock().await;
        let mut found: Vec<BraceletEvent> = events
            .values()
            .filter(|e| e.bracelet_id == bracelet_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    /// Look up one command.
    pub async fn command(&self, command_id: Uuid) -> Option<BraceletCommand> {
        self.commands.lock().await.get(&command_id).cloned()
    }

    /// Guardian acknowledgement: resolve the event and send a vibration
    /// command to the bracelet.
    ///
    /// The command starts `pending`. If the transport rejects the send
    /// outright the command is marked `failed` and returned as such; the
    /// engine never retries on its own.
    pub async fn acknowledge(
        &self,
        event_id: Uuid,
        pattern: VibrationPattern,
    ) -> Result<BraceletCommand, EngineError> {
        let now = Utc::now();
        let bracelet_id = {
            let mut events = self.events.lock().await;
            let event = events
                .get_mut(&event_id)
                .ok_or(EngineError::UnknownEvent(event_id))?;
            event.resolve(now);
            event.bracelet_id
        };

        let command = BraceletCommand::new(bracelet_id, pattern.into(), now);
        self.commands
            .lock()
            .await
            .insert(command.id, command.clone());
        info!(
            bracelet_id = %bracelet_id,
            event_id = %event_id,
            command_id = %command.id,
            command_type = %command.command_type,
            "Acknowledgement command created"
        );

        match self.command_transport.send_command(bracelet_id, &command).await {
            Ok(()) => Ok(command),
            Err(err) => {
                warn!(
                    bracelet_id = %bracelet_id,
                    command_id = %command.id,
                    error = %err,
                    "Command transport rejected send, marking command failed"
                );
                let mut commands = self.commands.lock().await;
                let stored = commands
                    .get_mut(&command.id)
                    .ok_or(EngineError::UnknownCommand(command.id))?;
                stored.mark_failed(err.to_string())?;
                Ok(stored.clone())
            }
        }
    }

    /// Record the execution outcome reported by the command transport.
    ///
    /// Terminal commands reject further transitions.
    pub async fn record_command_result(
        &self,
        command_id: Uuid,
        outcome: CommandOutcome,
    ) -> Result<BraceletCommand, EngineError> {
        let mut commands = self.commands.lock().await;
        let command = commands
            .get_mut(&command_id)
            .ok_or(EngineError::UnknownCommand(command_id))?;

        match outcome {
            CommandOutcome::Executed { at } => command.mark_executed(at)?,
            CommandOutcome::Failed { reason } => command.mark_failed(reason)?,
        }
        debug!(
            command_id = %command_id,
            status = %command.status,
            "Command outcome recorded"
        );
        Ok(command.clone())
    }
}

/// Per-bracelet edge-trigger bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
struct TriggerState {
    battery: Option<u8>,
    status: Option<BraceletStatus>,
}

/// Turns accepted samples into events and admitted deliveries.
pub struct EventDispatcher {
    config: DispatchConfig,
    zones: Arc<dyn ZoneDirectory>,
    permissions: Arc<dyn PermissionDirectory>,
    delivery: Arc<dyn DeliverySink>,
    evaluator: ZoneEvaluator,
    triggers: HashMap<Uuid, TriggerState>,
    ledger: EventLedger,
}

impl EventDispatcher {
    pub fn new(
        config: DispatchConfig,
        hysteresis: HysteresisConfig,
        zones: Arc<dyn ZoneDirectory>,
        permissions: Arc<dyn PermissionDirectory>,
        delivery: Arc<dyn DeliverySink>,
        ledger: EventLedger,
    ) -> Self {
        Self {
            config,
            zones,
            permissions,
            delivery,
            evaluator: ZoneEvaluator::new(hysteresis),
            triggers: HashMap::new(),
            ledger,
        }
    }

    /// Consume accepted samples and device-initiated reports until the
    /// sample channel closes or shutdown is signalled.
    ///
    /// Reports (arrived, danger) come straight from the device through the
    /// inbound collaborator; they skip evaluation and go directly to
    /// fan-out.
    pub async fn run(
        mut self,
        mut samples_rx: mpsc::Receiver<PositionSample>,
        mut reports_rx: mpsc::Receiver<BraceletEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut reports_open = true;
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                maybe = samples_rx.recv() => {
                    match maybe {
                        Some(sample) => self.handle_sample(sample).await,
                        None => break,
                    }
                }
                maybe = reports_rx.recv(), if reports_open => {
                    match maybe {
                        Some(event) => self.publish(event).await,
                        None => reports_open = false,
                    }
                }
            }
        }
        debug!("Event dispatcher exiting");
    }

    /// Evaluate one accepted sample end to end.
    pub async fn handle_sample(&mut self, sample: PositionSample) {
        let mut events = Vec::new();

        match self.zones.list_zones(sample.bracelet_id).await {
            Ok(zones) => {
                let live: Vec<Uuid> = zones.iter().map(|z| z.id).collect();
                self.evaluator.retain_zones(sample.bracelet_id, &live);
                for zone in &zones {
                    if let Some(transition) = self.evaluator.observe(zone, &sample) {
                        let mut event = BraceletEvent::new(
                            transition.bracelet_id,
                            transition.event_type,
                            transition.at,
                        )
                        .with_position(transition.latitude, transition.longitude)
                        .with_zone(transition.zone_id, transition.zone_name);
                        if let Some(level) = sample.battery_level {
                            event = event.with_battery(level);
                        }
                        events.push(event);
                    }
                }
            }
            Err(err) => {
                warn!(
                    bracelet_id = %sample.bracelet_id,
                    error = %err,
                    "Zone snapshot unavailable, skipping zone evaluation for this sample"
                );
            }
        }

        let trigger = self
            .triggers
            .entry(sample.bracelet_id)
            .or_default();

        if let Some(level) = sample.battery_level {
            let threshold = self.config.low_battery_threshold;
            if let Some(previous) = trigger.battery {
                // Edge-triggered: only the crossing emits, not every
                // sample below the threshold.
                if previous >= threshold && level < threshold {
                    events.push(
                        BraceletEvent::new(
                            sample.bracelet_id,
                            EventType::LowBattery,
                            sample.observed_at,
                        )
                        .with_position(sample.latitude, sample.longitude)
                        .with_battery(level),
                    );
                }
            }
            trigger.battery = Some(level);
        }

        if let Some(status) = sample.status {
            let previous = trigger.status;
            if status == BraceletStatus::Emergency && previous != Some(BraceletStatus::Emergency) {
                let mut event = BraceletEvent::new(
                    sample.bracelet_id,
                    EventType::Emergency,
                    sample.observed_at,
                )
                .with_position(sample.latitude, sample.longitude);
                if let Some(level) = sample.battery_level {
                    event = event.with_battery(level);
                }
                events.push(event);
            }
            if status == BraceletStatus::Lost && previous != Some(BraceletStatus::Lost) {
                events.push(
                    BraceletEvent::new(sample.bracelet_id, EventType::Lost, sample.observed_at)
                        .with_position(sample.latitude, sample.longitude),
                );
            }
            trigger.status = Some(status);
        }

        for event in events {
            self.publish(event).await;
        }
    }

    /// Record an event and fan it out to admitted guardians.
    async fn publish(&mut self, event: BraceletEvent) {
        metrics::record_event_emitted(event.event_type);
        info!(
            bracelet_id = %event.bracelet_id,
            event_id = %event.id,
            event_type = %event.event_type,
            "Event created"
        );
        self.ledger.insert(event.clone()).await;

        let permissions = match self.permissions.list_permissions(event.bracelet_id).await {
            Ok(permissions) => permissions,
            Err(err) => {
                warn!(
                    bracelet_id = %event.bracelet_id,
                    event_id = %event.id,
                    error = %err,
                    "Permission snapshot unavailable, event recorded without fan-out"
                );
                return;
            }
        };

        let now = Utc::now();
        for permission in &permissions {
            if notification_gate::admit(permission, event.event_type, now) {
                metrics::record_delivery_admitted();
                if let Err(err) = self
                    .delivery
                    .enqueue_delivery(permission.guardian_id, &event)
                    .await
                {
                    warn!(
                        guardian_id = %permission.guardian_id,
                        event_id = %event.id,
                        error = %err,
                        "Delivery enqueue failed"
                    );
                }
            } else {
                metrics::record_delivery_suppressed();
                debug!(
                    guardian_id = %permission.guardian_id,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Delivery suppressed by notification gate"
                );
            }
        }
    }
}
