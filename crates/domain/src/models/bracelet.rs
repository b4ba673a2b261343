//! Bracelet domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle status reported by a bracelet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BraceletStatus {
    Active,
    Inactive,
    Emergency,
    Lost,
}

impl BraceletStatus {
    /// Converts to the wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BraceletStatus::Active => "active",
            BraceletStatus::Inactive => "inactive",
            BraceletStatus::Emergency => "emergency",
            BraceletStatus::Lost => "lost",
        }
    }

    /// Parses from the wire string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BraceletStatus::Active),
            "inactive" => Some(BraceletStatus::Inactive),
            "emergency" => Some(BraceletStatus::Emergency),
            "lost" => Some(BraceletStatus::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for BraceletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Channel a position sample arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    Push,
    Poll,
}

impl SampleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSource::Push => "push",
            SampleSource::Poll => "poll",
        }
    }
}

impl std::fmt::Display for SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known position of a bracelet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub observed_at: DateTime<Utc>,
}

/// A raw position/status report from one of the two channels.
///
/// Ephemeral: consumed by the synchronizer, never stored beyond the
/// bracelet's last-known fields.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub bracelet_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_accuracy"))]
    #[serde(default)]
    pub accuracy_meters: f64,

    pub observed_at: DateTime<Utc>,

    pub source: SampleSource,

    /// Status carried by the reporting channel, if any changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BraceletStatus>,

    /// Battery level carried by the reporting channel, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
}

impl PositionSample {
    /// The position fields of this sample.
    pub fn position(&self) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy_meters: self.accuracy_meters,
            observed_at: self.observed_at,
        }
    }
}

/// A tracked bracelet and its last authoritative state.
///
/// Mutated only by the presence synchronizer; one writer per bracelet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracelet {
    pub id: Uuid,
    pub name: String,
    pub status: BraceletStatus,
    pub battery_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_contact_at: Option<DateTime<Utc>>,
}

impl Bracelet {
    /// Create a bracelet with no contact history.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: BraceletStatus::Inactive,
            battery_level: 100,
            last_position: None,
            last_contact_at: None,
        }
    }

    /// Apply a sample under the monotonic-acceptance rule.
    ///
    /// Returns `true` when the sample was newer than the stored state and
    /// was applied; `false` when it was stale and dropped. Staleness is
    /// judged on `observed_at` alone, so ordering holds regardless of which
    /// channel delivered the sample first.
    pub fn accept(&mut self, sample: &PositionSample) -> bool {
        if let Some(last) = self.last_contact_at {
            if sample.observed_at <= last {
                return false;
            }
        }

        self.last_position = Some(sample.position());
        self.last_contact_at = Some(sample.observed_at);
        if let Some(status) = sample.status {
            self.status = status;
        }
        if let Some(level) = sample.battery_level {
            self.battery_level = level.min(100);
        }
        true
    }
}
