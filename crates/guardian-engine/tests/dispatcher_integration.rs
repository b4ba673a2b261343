//! Event dispatcher integration tests, driven sample-by-sample through
//! mock directories and sinks.

mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use domain::models::{
    BraceletStatus, CommandStatus, CommandType, EventType, NotificationPermission, SampleSource,
    VibrationPattern,
};
use domain::services::zone_evaluator::HysteresisConfig;
use guardian_engine::config::DispatchConfig;
use guardian_engine::dispatcher::{CommandOutcome, EventDispatcher, EventLedger};
use guardian_engine::transport::{
    MockCommandTransport, MockPermissionDirectory, MockZoneDirectory, RecordingDeliverySink,
};
use guardian_engine::EngineError;

use common::{sample, square_zone};

struct Harness {
    dispatcher: EventDispatcher,
    ledger: EventLedger,
    zones: Arc<MockZoneDirectory>,
    permissions: Arc<MockPermissionDirectory>,
    delivery: Arc<RecordingDeliverySink>,
    commands: Arc<MockCommandTransport>,
    bracelet_id: Uuid,
}

fn harness_with_commands(commands: Arc<MockCommandTransport>) -> Harness {
    let zones = Arc::new(MockZoneDirectory::new());
    let permissions = Arc::new(MockPermissionDirectory::new());
    let delivery = Arc::new(RecordingDeliverySink::new());
    let ledger = EventLedger::new(commands.clone());

    let dispatcher = EventDispatcher::new(
        DispatchConfig::default(),
        HysteresisConfig::default(),
        zones.clone(),
        permissions.clone(),
        delivery.clone(),
        ledger.clone(),
    );

    Harness {
        dispatcher,
        ledger,
        zones,
        permissions,
        delivery,
        commands,
        bracelet_id: Uuid::new_v4(),
    }
}

fn harness() -> Harness {
    harness_with_commands(Arc::new(MockCommandTransport::new()))
}

async fn grant_permissive(harness: &Harness) -> Uuid {
    let guardian_id = Uuid::new_v4();
    harness
        .permissions
        .set_permissions(
            harness.bracelet_id,
            vec![NotificationPermission::permissive(
                guardian_id,
                harness.bracelet_id,
            )],
        )
        .await;
    guardian_id
}

#[tokio::test]
async fn test_zone_entry_and_exit_events() -> Result<()> {
    let mut harness = harness();
    let guardian_id = grant_permissive(&harness).await;
    let zone = square_zone(harness.bracelet_id);
    let zone_id = zone.id;
    harness.zones.set_zones(harness.bracelet_id, vec![zone]).await;

    let id = harness.bracelet_id;
    // Inside commits immediately from Unknown; exit needs two consecutive
    // outside fixes.
    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 0.5, 0.5, 0))
        .await;
    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 1.5, 0.5, 1))
        .await;
    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 1.6, 0.5, 2))
        .await;

    let events = harness.ledger.events_for(id).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::ZoneExit);
    assert_eq!(events[1].event_type, EventType::ZoneEntry);
    assert_eq!(events[0].zone_id, Some(zone_id));
    assert_eq!(events[0].zone_name.as_deref(), Some("Home"));

    let records = harness.delivery.records().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.guardian_id == guardian_id));
    Ok(())
}

#[tokio::test]
async fn test_low_battery_is_edge_triggered() -> Result<()> {
    let mut harness = harness();
    grant_permissive(&harness).await;
    let id = harness.bracelet_id;

    let levels = [25u8, 18, 15, 30, 10];
    for (i, level) in levels.iter().enumerate() {
        let mut s = sample(id, SampleSource::Poll, 10.0, 10.0, i as i64);
        s.battery_level = Some(*level);
        harness.dispatcher.handle_sample(s).await;
    }

    let events = harness.ledger.events_for(id).await;
    let low_battery: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::LowBattery)
        .collect();
    // 25 -> 18 crosses the 20% threshold; 15 stays below without a new
    // event; 30 re-arms; 10 crosses again.
    assert_eq!(low_battery.len(), 2);
    assert_eq!(low_battery[0].battery_level, Some(10));
    assert_eq!(low_battery[1].battery_level, Some(18));
    Ok(())
}

#[tokio::test]
async fn test_emergency_is_edge_triggered() -> Result<()> {
    let mut harness = harness();
    grant_permissive(&harness).await;
    let id = harness.bracelet_id;

    let statuses = [
        BraceletStatus::Active,
        BraceletStatus::Emergency,
        BraceletStatus::Emergency,
        BraceletStatus::Active,
        BraceletStatus::Emergency,
    ];
    for (i, status) in statuses.iter().enumerate() {
        let mut s = sample(id, SampleSource::Push, 10.0, 10.0, i as i64);
        s.status = Some(*status);
        harness.dispatcher.handle_sample(s).await;
    }

    let events = harness.ledger.events_for(id).await;
    let emergencies: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::Emergency)
        .collect();
    assert_eq!(emergencies.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_lost_status_produces_event() -> Result<()> {
    let mut harness = harness();
    grant_permissive(&harness).await;
    let id = harness.bracelet_id;

    let mut s = sample(id, SampleSource::Poll, 10.0, 10.0, 0);
    s.status = Some(BraceletStatus::Lost);
    harness.dispatcher.handle_sample(s).await;

    let events = harness.ledger.events_for(id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Lost);
    Ok(())
}

#[tokio::test]
async fn test_fanout_respects_permissions() -> Result<()> {
    let mut harness = harness();
    let id = harness.bracelet_id;

    let allowed = Uuid::new_v4();
    let disabled = Uuid::new_v4();
    let entry_muted = Uuid::new_v4();

    let mut disabled_permission = NotificationPermission::permissive(disabled, id);
    disabled_permission.enabled = false;
    let mut muted_permission = NotificationPermission::permissive(entry_muted, id);
    muted_permission.types.zone_entry = false;

    harness
        .permissions
        .set_permissions(
            id,
            vec![
                NotificationPermission::permissive(allowed, id),
                disabled_permission,
                muted_permission,
            ],
        )
        .await;
    harness
        .zones
        .set_zones(id, vec![square_zone(id)])
        .await;

    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 0.5, 0.5, 0))
        .await;

    let records = harness.delivery.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].guardian_id, allowed);
    assert_eq!(records[0].event_type, EventType::ZoneEntry);
    Ok(())
}

#[tokio::test]
async fn test_zone_snapshot_error_skips_evaluation_only() -> Result<()> {
    let mut harness = harness();
    grant_permissive(&harness).await;
    let id = harness.bracelet_id;
    harness.zones.set_zones(id, vec![square_zone(id)]).await;
    harness.zones.set_failing(true);

    let mut s = sample(id, SampleSource::Push, 0.5, 0.5, 0);
    s.battery_level = Some(25);
    harness.dispatcher.handle_sample(s).await;
    let mut s = sample(id, SampleSource::Push, 0.5, 0.5, 1);
    s.battery_level = Some(15);
    harness.dispatcher.handle_sample(s).await;

    // No zone events while the directory is down, but the battery edge
    // still fires: per-sample failures stay local.
    let events = harness.ledger.events_for(id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::LowBattery);
    Ok(())
}

#[tokio::test]
async fn test_permission_snapshot_error_keeps_event() -> Result<()> {
    let mut harness = harness();
    let id = harness.bracelet_id;
    harness.zones.set_zones(id, vec![square_zone(id)]).await;
    harness.permissions.set_failing(true);

    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 0.5, 0.5, 0))
        .await;

    assert_eq!(harness.ledger.events_for(id).await.len(), 1);
    assert!(harness.delivery.records().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_acknowledge_lifecycle() -> Result<()> {
    let mut harness = harness();
    grant_permissive(&harness).await;
    let id = harness.bracelet_id;
    harness.zones.set_zones(id, vec![square_zone(id)]).await;

    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 0.5, 0.5, 0))
        .await;
    let event = harness.ledger.events_for(id).await.remove(0);
    assert!(!event.resolved);

    let command = harness
        .ledger
        .acknowledge(event.id, VibrationPattern::Short)
        .await?;
    assert_eq!(command.status, CommandStatus::Pending);
    assert_eq!(command.command_type, CommandType::VibrateShort);
    assert_eq!(command.bracelet_id, id);

    // The event is resolved and the command reached the transport.
    let event = harness.ledger.event(event.id).await.unwrap();
    assert!(event.resolved);
    assert!(event.resolved_at.is_some());
    let sent = harness.commands.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, command.id);

    // Transport reports execution; the terminal state then rejects
    // further transitions.
    let executed = harness
        .ledger
        .record_command_result(command.id, CommandOutcome::Executed { at: Utc::now() })
        .await?;
    assert_eq!(executed.status, CommandStatus::Executed);

    let again = harness
        .ledger
        .record_command_result(
            command.id,
            CommandOutcome::Failed {
                reason: "late report".into(),
            },
        )
        .await;
    assert!(matches!(again, Err(EngineError::CommandState(_))));
    Ok(())
}

#[tokio::test]
async fn test_acknowledge_unknown_event() {
    let harness = harness();
    let missing = Uuid::new_v4();
    let result = harness
        .ledger
        .acknowledge(missing, VibrationPattern::Sos)
        .await;
    assert!(matches!(result, Err(EngineError::UnknownEvent(id)) if id == missing));
}

#[tokio::test]
async fn test_command_transport_failure_marks_command_failed() -> Result<()> {
    let mut harness = harness_with_commands(Arc::new(MockCommandTransport::failing()));
    grant_permissive(&harness).await;
    let id = harness.bracelet_id;
    harness.zones.set_zones(id, vec![square_zone(id)]).await;

    harness
        .dispatcher
        .handle_sample(sample(id, SampleSource::Push, 0.5, 0.5, 0))
        .await;
    let event = harness.ledger.events_for(id).await.remove(0);

    let command = harness
        .ledger
        .acknowledge(event.id, VibrationPattern::Medium)
        .await?;
    assert_eq!(command.status, CommandStatus::Failed);
    assert!(command.failure_reason.is_some());

    // Failed is terminal: no later success report can revive it.
    let revived = harness
        .ledger
        .record_command_result(command.id, CommandOutcome::Executed { at: Utc::now() })
        .await;
    assert!(matches!(revived, Err(EngineError::CommandState(_))));
    Ok(())
}

#[tokio::test]
async fn test_record_result_for_unknown_command() {
    let harness = harness();
    let missing = Uuid::new_v4();
    let result = harness
        .ledger
        .record_command_result(missing, CommandOutcome::Executed { at: Utc::now() })
        .await;
    assert!(matches!(result, Err(EngineError::UnknownCommand(id)) if id == missing));
}
