//! Guardian notification permission model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::event::EventType;

/// Per-event-type notification toggles for one guardian.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTypes {
    pub zone_entry: bool,
    pub zone_exit: bool,
    pub emergency: bool,
    pub low_battery: bool,
}

impl NotificationTypes {
    /// All toggles on.
    pub fn all() -> Self {
        Self {
            zone_entry: true,
            zone_exit: true,
            emergency: true,
            low_battery: true,
        }
    }

    /// Whether the toggles allow an event of this type.
    ///
    /// Event types without an explicit toggle (arrived, lost, danger) have
    /// no per-type switch in the sharing settings and pass through; the
    /// master `enabled` flag and the schedule still apply to them.
    pub fn allows(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::ZoneEntry => self.zone_entry,
            EventType::ZoneExit => self.zone_exit,
            EventType::Emergency => self.emergency,
            EventType::LowBattery => self.low_battery,
            EventType::Arrived | EventType::Lost | EventType::Danger => true,
        }
    }
}

impl Default for NotificationTypes {
    fn default() -> Self {
        Self::all()
    }
}

/// Day/hour window during which a guardian accepts deliveries.
///
/// `start_hour > end_hour` wraps past midnight: 22..6 means 22:00 through
/// 05:59 the next day.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySchedule {
    pub enabled: bool,

    #[validate(custom(function = "validate_allowed_days"))]
    pub allowed_days: Vec<u8>,

    #[validate(custom(function = "shared::validation::validate_hour"))]
    pub start_hour: u8,

    #[validate(custom(function = "shared::validation::validate_hour"))]
    pub end_hour: u8,
}

impl DeliverySchedule {
    /// A disabled schedule: no time restriction.
    pub fn unrestricted() -> Self {
        Self {
            enabled: false,
            allowed_days: (0..=6).collect(),
            start_hour: 0,
            end_hour: 0,
        }
    }

    /// An active schedule over the given days and hour window.
    pub fn window(allowed_days: Vec<u8>, start_hour: u8, end_hour: u8) -> Self {
        Self {
            enabled: true,
            allowed_days,
            start_hour,
            end_hour,
        }
    }
}

fn validate_allowed_days(days: &[u8]) -> Result<(), validator::ValidationError> {
    for day in days {
        shared::validation::validate_weekday(*day)?;
    }
    Ok(())
}

/// One guardian's delivery settings for one bracelet.
///
/// Owned by the sharing collaborator; read-only inside the core. When
/// `enabled` is false, delivery is unconditionally suppressed and neither
/// the type toggles nor the schedule are consulted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPermission {
    pub guardian_id: Uuid,
    pub bracelet_id: Uuid,
    pub enabled: bool,
    #[serde(default)]
    pub types: NotificationTypes,
    #[validate(nested)]
    pub schedule: DeliverySchedule,
}

impl NotificationPermission {
    /// Permission with everything on and no schedule restriction.
    pub fn permissive(guardian_id: Uuid, bracelet_id: Uuid) -> Self {
        Self {
            guardian_id,
            bracelet_id,
            enabled: true,
            types: NotificationTypes::all(),
            schedule: DeliverySchedule::unrestricted(),
        }
    }
}
