//! Per-guardian notification admission filter.
//!
//! Stateless: the decision depends only on the permission row, the event
//! type, and the delivery time. The schedule applies uniformly to every
//! event type, emergencies included: quiet hours silence emergencies too,
//! matching the shipped sharing behavior.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::models::event::EventType;
use crate::models::permission::{DeliverySchedule, NotificationPermission};

/// Whether a guardian should receive an event of `event_type` at `at`.
pub fn admit(
    permission: &NotificationPermission,
    event_type: EventType,
    at: DateTime<Utc>,
) -> bool {
    if !permission.enabled {
        return false;
    }
    if !permission.types.allows(event_type) {
        return false;
    }
    schedule_admits(&permission.schedule, at)
}

/// Whether the schedule window covers `at`. Disabled schedules admit
/// everything.
pub fn schedule_admits(schedule: &DeliverySchedule, at: DateTime<Utc>) -> bool {
    if !schedule.enabled {
        return true;
    }

    let weekday = at.weekday().num_days_from_sunday() as u8;
    if !schedule.allowed_days.contains(&weekday) {
        return false;
    }

    let hour = at.hour() as u8;
    if schedule.start_hour > schedule.end_hour {
        // Window wraps past midnight, e.g. 22..6 covers 22:00-05:59.
        hour >= schedule.start_hour || hour < schedule.end_hour
    } else {
        hour >= schedule.start_hour && hour < schedule.end_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::NotificationTypes;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn permission_with_schedule(schedule: DeliverySchedule) -> NotificationPermission {
        NotificationPermission {
            guardian_id: Uuid::new_v4(),
            bracelet_id: Uuid::new_v4(),
            enabled: true,
            types: NotificationTypes::all(),
            schedule,
        }
    }

    /// 2026-03-01 is a Sunday (weekday 0).
    fn sunday_at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 15, 0).unwrap()
    }

    #[test]
    fn test_disabled_permission_suppresses_everything() {
        let mut permission = permission_with_schedule(DeliverySchedule::unrestricted());
        permission.enabled = false;

        for event_type in [
            EventType::ZoneEntry,
            EventType::Emergency,
            EventType::Danger,
        ] {
            assert!(!admit(&permission, event_type, sunday_at(12)));
        }
    }

    #[test]
    fn test_type_toggle_blocks_only_that_type() {
        let mut permission = permission_with_schedule(DeliverySchedule::unrestricted());
        permission.types.low_battery = false;

        assert!(!admit(&permission, EventType::LowBattery, sunday_at(12)));
        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(12)));
    }

    #[test]
    fn test_disabled_schedule_admits_any_hour() {
        let permission = permission_with_schedule(DeliverySchedule::unrestricted());
        for hour in [0, 3, 12, 23] {
            assert!(admit(&permission, EventType::ZoneExit, sunday_at(hour)));
        }
    }

    #[test]
    fn test_daytime_window() {
        let permission =
            permission_with_schedule(DeliverySchedule::window((0..=6).collect(), 8, 18));

        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(8)));
        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(17)));
        // End hour is exclusive.
        assert!(!admit(&permission, EventType::ZoneEntry, sunday_at(18)));
        assert!(!admit(&permission, EventType::ZoneEntry, sunday_at(7)));
    }

    #[test]
    fn test_overnight_window_wraps_midnight() {
        let permission =
            permission_with_schedule(DeliverySchedule::window((0..=6).collect(), 22, 6));

        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(23)));
        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(2)));
        assert!(!admit(&permission, EventType::ZoneEntry, sunday_at(12)));
        // Boundary hours: start inclusive, end exclusive.
        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(22)));
        assert!(!admit(&permission, EventType::ZoneEntry, sunday_at(6)));
    }

    #[test]
    fn test_day_filter() {
        // Sunday only.
        let permission = permission_with_schedule(DeliverySchedule::window(vec![0], 8, 18));
        assert!(admit(&permission, EventType::ZoneEntry, sunday_at(12)));

        // Monday 2026-03-02 at noon.
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        assert!(!admit(&permission, EventType::ZoneEntry, monday));
    }

    #[test]
    fn test_emergency_not_exempt_from_schedule() {
        // Shipped behavior: quiet hours silence emergencies like any other
        // type. A change here must be a deliberate, visible diff.
        let permission =
            permission_with_schedule(DeliverySchedule::window((0..=6).collect(), 22, 6));
        assert!(!admit(&permission, EventType::Emergency, sunday_at(12)));
        assert!(admit(&permission, EventType::Emergency, sunday_at(23)));
    }
}
