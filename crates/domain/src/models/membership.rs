//! Zone membership state for a (bracelet, zone) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Containment state of a bracelet relative to one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainmentState {
    Unknown,
    Inside,
    Outside,
}

impl ContainmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainmentState::Unknown => "unknown",
            ContainmentState::Inside => "inside",
            ContainmentState::Outside => "outside",
        }
    }

    /// The state corresponding to a raw containment test result.
    pub fn from_contained(contained: bool) -> Self {
        if contained {
            ContainmentState::Inside
        } else {
            ContainmentState::Outside
        }
    }
}

impl std::fmt::Display for ContainmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate transition that has not yet cleared hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateState {
    pub state: ContainmentState,
    /// `observed_at` of the first sample in the current streak.
    pub since: DateTime<Utc>,
    pub consecutive_samples: u32,
}

/// Committed containment state plus hysteresis bookkeeping.
///
/// Created lazily on first evaluation of a (bracelet, zone) pair and kept
/// for the lifetime of that relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMembership {
    pub bracelet_id: Uuid,
    pub zone_id: Uuid,
    pub state: ContainmentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateState>,
}

impl ZoneMembership {
    /// Fresh membership with no observations yet.
    pub fn new(bracelet_id: Uuid, zone_id: Uuid) -> Self {
        Self {
            bracelet_id,
            zone_id,
            state: ContainmentState::Unknown,
            last_transition_at: None,
            candidate: None,
        }
    }

    /// Commit a transition to `state` observed at `at`.
    pub fn commit(&mut self, state: ContainmentState, at: DateTime<Utc>) {
        self.state = state;
        self.last_transition_at = Some(at);
        self.candidate = None;
    }
}
