//! Containment state machine for (bracelet, zone) pairs.
//!
//! Raw samples are noisy: a bracelet sitting on a zone border can flip the
//! containment test on every fix. A transition away from the committed
//! state is therefore only committed after the opposite containment has
//! been observed for a configurable number of consecutive samples, or has
//! held for a minimum time window, whichever arrives first. The window
//! path covers sparse sample streams where a fixed count would stall.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::bracelet::PositionSample;
use crate::models::event::EventType;
use crate::models::membership::{CandidateState, ContainmentState, ZoneMembership};
use crate::models::zone::{GeoPoint, SafetyZone};
use crate::services::geo;

/// Hysteresis tuning for the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct HysteresisConfig {
    /// Consecutive matching samples that commit a transition.
    pub min_samples: u32,
    /// Candidate age that commits a transition regardless of sample count.
    pub min_window: Duration,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            min_samples: 2,
            min_window: Duration::seconds(5),
        }
    }
}

/// A committed zone transition that carries a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTransition {
    pub bracelet_id: Uuid,
    pub zone_id: Uuid,
    pub zone_name: String,
    pub event_type: EventType,
    pub at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Evaluates accepted samples against zones, one membership per
/// (bracelet, zone) pair.
#[derive(Debug)]
pub struct ZoneEvaluator {
    config: HysteresisConfig,
    memberships: HashMap<(Uuid, Uuid), ZoneMembership>,
}

impl ZoneEvaluator {
    pub fn new(config: HysteresisConfig) -> Self {
        Self {
            config,
            memberships: HashMap::new(),
        }
    }

    /// Current membership state for a pair, if it has been evaluated.
    pub fn membership(&self, bracelet_id: Uuid, zone_id: Uuid) -> Option<&ZoneMembership> {
        self.memberships.get(&(bracelet_id, zone_id))
    }

    /// Drop memberships for zones that no longer exist on this bracelet.
    pub fn retain_zones(&mut self, bracelet_id: Uuid, live_zone_ids: &[Uuid]) {
        self.memberships
            .retain(|(b, z), _| *b != bracelet_id || live_zone_ids.contains(z));
    }

    /// Evaluate one accepted sample against one zone.
    ///
    /// Returns a transition only when one was committed *and* the zone's
    /// notify flag for that direction is set; the membership itself always
    /// tracks the committed state. Invalid geometry skips the zone for this
    /// sample without failing the caller.
    pub fn observe(
        &mut self,
        zone: &SafetyZone,
        sample: &PositionSample,
    ) -> Option<ZoneTransition> {
        let point = GeoPoint::new(sample.latitude, sample.longitude);
        let contained = match geo::contains(point, &zone.geometry) {
            Ok(contained) => contained,
            Err(err) => {
                warn!(
                    zone_id = %zone.id,
                    bracelet_id = %sample.bracelet_id,
                    geometry = zone.geometry.kind(),
                    error = %err,
                    "Skipping zone with invalid geometry"
                );
                return None;
            }
        };

        let observed = ContainmentState::from_contained(contained);
        let membership = self
            .memberships
            .entry((sample.bracelet_id, zone.id))
            .or_insert_with(|| ZoneMembership::new(sample.bracelet_id, zone.id));

        if membership.state == ContainmentState::Unknown {
            // First observation: nothing to protect against flapping from.
            membership.commit(observed, sample.observed_at);
            debug!(
                zone_id = %zone.id,
                bracelet_id = %sample.bracelet_id,
                state = %observed,
                "Initial zone containment committed"
            );
            return Self::notification_for(zone, ContainmentState::Unknown, observed, sample);
        }

        if membership.state == observed {
            // Confirmation of the committed state resets any candidate streak.
            membership.candidate = None;
            return None;
        }

        let candidate = match membership.candidate {
            Some(candidate) if candidate.state == observed => CandidateState {
                state: observed,
                since: candidate.since,
                consecutive_samples: candidate.consecutive_samples + 1,
            },
            _ => CandidateState {
                state: observed,
                since: sample.observed_at,
                consecutive_samples: 1,
            },
        };

        let held_long_enough =
            sample.observed_at - candidate.since >= self.config.min_window;
        if candidate.consecutive_samples >= self.config.min_samples || held_long_enough {
            let previous = membership.state;
            membership.commit(observed, sample.observed_at);
            debug!(
                zone_id = %zone.id,
                bracelet_id = %sample.bracelet_id,
                from = %previous,
                to = %observed,
                "Zone transition committed"
            );
            return Self::notification_for(zone, previous, observed, sample);
        }

        membership.candidate = Some(candidate);
        None
    }

    fn notification_for(
        zone: &SafetyZone,
        previous: ContainmentState,
        committed: ContainmentState,
        sample: &PositionSample,
    ) -> Option<ZoneTransition> {
        let event_type = match (previous, committed) {
            (ContainmentState::Outside | ContainmentState::Unknown, ContainmentState::Inside)
                if zone.notify_on_entry =>
            {
                EventType::ZoneEntry
            }
            (ContainmentState::Inside, ContainmentState::Outside) if zone.notify_on_exit => {
                EventType::ZoneExit
            }
            _ => return None,
        };

        Some(ZoneTransition {
            bracelet_id: sample.bracelet_id,
            zone_id: zone.id,
            zone_name: zone.name.clone(),
            event_type,
            at: sample.observed_at,
            latitude: sample.latitude,
            longitude: sample.longitude,
        })
    }
}
