//! Transport collaborator traits.
//!
//! Everything the engine needs from the outside world is behind one of
//! these traits: the live push stream, the poll endpoint, the zone and
//! permission directories, the outbound notification sink, and the device
//! command channel. Token management, platform push APIs and storage are
//! the collaborators' concern.
//!
//! In-memory implementations are provided for development and testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use domain::models::{
    BraceletCommand, BraceletEvent, BraceletStatus, EventType, NotificationPermission,
    PositionSample, SafetyZone, SampleSource,
};

/// Transport-level failure. Recovered locally by the engine wherever the
/// contract allows (poll retry, fallback activation).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("push subscribe failed: {0}")]
    Subscribe(String),

    #[error("state fetch failed: {0}")]
    Fetch(String),

    #[error("delivery enqueue failed: {0}")]
    Delivery(String),

    #[error("command send failed: {0}")]
    Command(String),
}

/// Device state as returned by the polling endpoint.
#[derive(Debug, Clone)]
pub struct BraceletSnapshot {
    pub bracelet_id: Uuid,
    pub status: BraceletStatus,
    pub battery_level: u8,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_meters: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl BraceletSnapshot {
    /// Convert to a poll-sourced sample; `None` when the snapshot carries
    /// no position yet.
    pub fn into_sample(self) -> Option<PositionSample> {
        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return None,
        };
        Some(PositionSample {
            bracelet_id: self.bracelet_id,
            latitude,
            longitude,
            accuracy_meters: self.accuracy_meters.unwrap_or(0.0),
            observed_at: self.observed_at,
            source: SampleSource::Poll,
            status: Some(self.status),
            battery_level: Some(self.battery_level),
        })
    }
}

/// Live update stream keyed by bracelet id.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Open a subscription; the receiver yields push-sourced samples until
    /// the subscription drops.
    async fn subscribe(
        &self,
        bracelet_id: Uuid,
    ) -> Result<mpsc::Receiver<PositionSample>, TransportError>;
}

/// Pull endpoint for current device state. Idempotent; safe to retry.
#[async_trait]
pub trait PollChannel: Send + Sync {
    async fn fetch_state(&self, bracelet_id: Uuid) -> Result<BraceletSnapshot, TransportError>;
}

/// Read-only zone snapshots, owned by the zone-management collaborator.
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    async fn list_zones(&self, bracelet_id: Uuid) -> Result<Vec<SafetyZone>, TransportError>;
}

/// Read-only permission snapshots, owned by the sharing collaborator.
#[async_trait]
pub trait PermissionDirectory: Send + Sync {
    async fn list_permissions(
        &self,
        bracelet_id: Uuid,
    ) -> Result<Vec<NotificationPermission>, TransportError>;
}

/// Outbound queue toward the push-notification sender. Delivery retries
/// are the sender's concern.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn enqueue_delivery(
        &self,
        guardian_id: Uuid,
        event: &BraceletEvent,
    ) -> Result<(), TransportError>;
}

/// Outbound device command channel. Execution results are reported back
/// through [`crate::dispatcher::EventLedger::record_command_result`].
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send_command(
        &self,
        bracelet_id: Uuid,
        command: &BraceletCommand,
    ) -> Result<(), TransportError>;
}

/// Mock push channel for development and testing.
///
/// Samples injected with [`MockPushChannel::push`] are fanned to the
/// bracelet's subscriber, if any.
#[derive(Debug, Default)]
pub struct MockPushChannel {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<PositionSample>>>,
    fail_subscribe: AtomicBool,
}

impl MockPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose subscriptions always fail.
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.fail_subscribe.store(true, Ordering::SeqCst);
        channel
    }

    /// Inject a push sample. Returns false when nobody is subscribed.
    pub async fn push(&self, sample: PositionSample) -> bool {
        let subscribers = self.subscribers.lock().await;
        match subscribers.get(&sample.bracelet_id) {
            Some(tx) => tx.send(sample).await.is_ok(),
            None => false,
        }
    }

    /// Drop the subscription, closing the stream on the worker side.
    pub async fn disconnect(&self, bracelet_id: Uuid) {
        self.subscribers.lock().await.remove(&bracelet_id);
    }
}

#[async_trait]
impl PushChannel for MockPushChannel {
    async fn subscribe(
        &self,
        bracelet_id: Uuid,
    ) -> Result<mpsc::Receiver<PositionSample>, TransportError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::Subscribe("simulated failure".into()));
        }
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().await.insert(bracelet_id, tx);
        Ok(rx)
    }
}

/// Mock poll channel serving canned snapshots.
#[derive(Debug, Default)]
pub struct MockPollChannel {
    states: Mutex<HashMap<Uuid, BraceletSnapshot>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
}

impl MockPollChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot returned for a bracelet.
    pub async fn set_state(&self, snapshot: BraceletSnapshot) {
        self.states
            .lock()
            .await
            .insert(snapshot.bracelet_id, snapshot);
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of fetch attempts observed, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollChannel for MockPollChannel {
    async fn fetch_state(&self, bracelet_id: Uuid) -> Result<BraceletSnapshot, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Fetch("simulated failure".into()));
        }
        self.states
            .lock()
            .await
            .get(&bracelet_id)
            .cloned()
            .ok_or_else(|| TransportError::Fetch(format!("no state for {bracelet_id}")))
    }
}

/// Mock zone directory with settable snapshots.
#[derive(Debug, Default)]
pub struct MockZoneDirectory {
    zones: Mutex<HashMap<Uuid, Vec<SafetyZone>>>,
    fail: AtomicBool,
}

impl MockZoneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_zones(&self, bracelet_id: Uuid, zones: Vec<SafetyZone>) {
        self.zones.lock().await.insert(bracelet_id, zones);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ZoneDirectory for MockZoneDirectory {
    async fn list_zones(&self, bracelet_id: Uuid) -> Result<Vec<SafetyZone>, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Fetch("simulated failure".into()));
        }
        Ok(self
            .zones
            .lock()
            .await
            .get(&bracelet_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Mock permission directory with settable snapshots.
#[derive(Debug, Default)]
pub struct MockPermissionDirectory {
    permissions: Mutex<HashMap<Uuid, Vec<NotificationPermission>>>,
    fail: AtomicBool,
}

impl MockPermissionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_permissions(
        &self,
        bracelet_id: Uuid,
        permissions: Vec<NotificationPermission>,
    ) {
        self.permissions.lock().await.insert(bracelet_id, permissions);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionDirectory for MockPermissionDirectory {
    async fn list_permissions(
        &self,
        bracelet_id: Uuid,
    ) -> Result<Vec<NotificationPermission>, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Fetch("simulated failure".into()));
        }
        Ok(self
            .permissions
            .lock()
            .await
            .get(&bracelet_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// An admitted (guardian, event) pair as recorded by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub guardian_id: Uuid,
    pub event_id: Uuid,
    pub event_type: EventType,
}

/// Delivery sink that records admitted pairs instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingDeliverySink {
    records: Mutex<Vec<DeliveryRecord>>,
}

impl RecordingDeliverySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<DeliveryRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingDeliverySink {
    async fn enqueue_delivery(
        &self,
        guardian_id: Uuid,
        event: &BraceletEvent,
    ) -> Result<(), TransportError> {
        self.records.lock().await.push(DeliveryRecord {
            guardian_id,
            event_id: event.id,
            event_type: event.event_type,
        });
        Ok(())
    }
}

/// Mock command transport recording sent commands.
#[derive(Debug, Default)]
pub struct MockCommandTransport {
    sent: Mutex<Vec<BraceletCommand>>,
    fail: AtomicBool,
}

impl MockCommandTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that rejects every send.
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    pub async fn sent(&self) -> Vec<BraceletCommand> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl CommandTransport for MockCommandTransport {
    async fn send_command(
        &self,
        _bracelet_id: Uuid,
        command: &BraceletCommand,
    ) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Command("simulated failure".into()));
        }
        self.sent.lock().await.push(command.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(bracelet_id: Uuid, with_position: bool) -> BraceletSnapshot {
        BraceletSnapshot {
            bracelet_id,
            status: BraceletStatus::Active,
            battery_level: 80,
            latitude: with_position.then_some(48.85),
            longitude: with_position.then_some(2.35),
            accuracy_meters: with_position.then_some(8.0),
            observed_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_into_sample() {
        let id = Uuid::new_v4();
        let sample = snapshot(id, true).into_sample().unwrap();
        assert_eq!(sample.bracelet_id, id);
        assert_eq!(sample.source, SampleSource::Poll);
        assert_eq!(sample.status, Some(BraceletStatus::Active));
        assert_eq!(sample.battery_level, Some(80));
    }

    #[test]
    fn test_snapshot_without_position_yields_no_sample() {
        assert!(snapshot(Uuid::new_v4(), false).into_sample().is_none());
    }

    #[tokio::test]
    async fn test_mock_push_channel_round_trip() {
        let channel = MockPushChannel::new();
        let id = Uuid::new_v4();
        let mut rx = channel.subscribe(id).await.unwrap();

        let sample = snapshot(id, true).into_sample().unwrap();
        assert!(channel.push(sample.clone()).await);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.bracelet_id, id);

        channel.disconnect(id).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_push_channel_failing() {
        let channel = MockPushChannel::failing();
        assert!(channel.subscribe(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_poll_channel_counts_failed_fetches() {
        let channel = MockPollChannel::new();
        let id = Uuid::new_v4();
        channel.set_state(snapshot(id, true)).await;

        assert!(channel.fetch_state(id).await.is_ok());
        channel.set_failing(true);
        assert!(channel.fetch_state(id).await.is_err());
        assert_eq!(channel.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_command_transport_failing() {
        let transport = MockCommandTransport::failing();
        let command = BraceletCommand::new(
            Uuid::new_v4(),
            domain::models::CommandType::VibrateShort,
            Utc::now(),
        );
        assert!(transport
            .send_command(command.bracelet_id, &command)
            .await
            .is_err());
        assert!(transport.sent().await.is_empty());
    }
}
