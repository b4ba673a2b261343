//! Bracelet event domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported bracelet event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ZoneEntry,
    ZoneExit,
    Emergency,
    LowBattery,
    Arrived,
    Lost,
    Danger,
}

impl EventType {
    /// Converts to the wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ZoneEntry => "zone_entry",
            EventType::ZoneExit => "zone_exit",
            EventType::Emergency => "emergency",
            EventType::LowBattery => "low_battery",
            EventType::Arrived => "arrived",
            EventType::Lost => "lost",
            EventType::Danger => "danger",
        }
    }

    /// Parses from the wire string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zone_entry" => Some(EventType::ZoneEntry),
            "zone_exit" => Some(EventType::ZoneExit),
            "emergency" => Some(EventType::Emergency),
            "low_battery" => Some(EventType::LowBattery),
            "arrived" => Some(EventType::Arrived),
            "lost" => Some(EventType::Lost),
            "danger" => Some(EventType::Danger),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A guardian-facing event produced by the dispatcher.
///
/// Immutable once created, except for the resolution flag set by guardian
/// acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraceletEvent {
    pub id: Uuid,
    pub bracelet_id: Uuid,
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl BraceletEvent {
    /// Create an unresolved event.
    pub fn new(bracelet_id: Uuid, event_type: EventType, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bracelet_id,
            event_type,
            latitude: None,
            longitude: None,
            battery_level: None,
            zone_id: None,
            zone_name: None,
            created_at,
            resolved: false,
            resolved_at: None,
        }
    }

    /// Attach the position the event was observed at.
    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Attach the battery level at event time.
    pub fn with_battery(mut self, level: u8) -> Self {
        self.battery_level = Some(level);
        self
    }

    /// Attach the zone that produced the event.
    pub fn with_zone(mut self, zone_id: Uuid, zone_name: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id);
        self.zone_name = Some(zone_name.into());
        self
    }

    /// Mark the event acknowledged by a guardian. Idempotent.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_type_round_trip() {
        for event_type in [
            EventType::ZoneEntry,
            EventType::ZoneExit,
            EventType::Emergency,
            EventType::LowBattery,
            EventType::Arrived,
            EventType::Lost,
            EventType::Danger,
        ] {
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::parse("heartbeat"), None);
    }

    #[test]
    fn test_event_builder_attaches_context() {
        let zone_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 16, 30, 0).unwrap();
        let event = BraceletEvent::new(Uuid::new_v4(), EventType::ZoneExit, at)
            .with_position(48.85, 2.35)
            .with_battery(64)
            .with_zone(zone_id, "School");

        assert_eq!(event.event_type, EventType::ZoneExit);
        assert_eq!(event.latitude, Some(48.85));
        assert_eq!(event.battery_level, Some(64));
        assert_eq!(event.zone_id, Some(zone_id));
        assert_eq!(event.zone_name.as_deref(), Some("School"));
        assert!(!event.resolved);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 16, 30, 0).unwrap();
        let first = created + chrono::Duration::minutes(2);
        let second = created + chrono::Duration::minutes(5);

        let mut event = BraceletEvent::new(Uuid::new_v4(), EventType::Emergency, created);
        event.resolve(first);
        event.resolve(second);

        assert!(event.resolved);
        assert_eq!(event.resolved_at, Some(first));
    }

    #[test]
    fn test_event_serialization_skips_empty_context() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 16, 30, 0).unwrap();
        let event = BraceletEvent::new(Uuid::new_v4(), EventType::LowBattery, at).with_battery(18);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"low_battery\""));
        assert!(json.contains("\"batteryLevel\":18"));
        assert!(!json.contains("\"zoneId\""));
        assert!(!json.contains("\"latitude\""));
    }
}
