//! Domain models.

pub mod bracelet;
pub mod command;
pub mod event;
pub mod membership;
pub mod permission;
pub mod zone;

pub use bracelet::{Bracelet, BraceletStatus, Position, PositionSample, SampleSource};
pub use command::{BraceletCommand, CommandStateError, CommandStatus, CommandType, VibrationPattern};
pub use event::{BraceletEvent, EventType};
pub use membership::{ContainmentState, ZoneMembership};
pub use permission::{DeliverySchedule, NotificationPermission, NotificationTypes};
pub use zone::{GeoPoint, SafetyZone, ZoneGeometry};
