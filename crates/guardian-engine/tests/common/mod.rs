//! Shared fixtures for engine integration tests.

// Allow dead code in this module - these are helper utilities that may not
// be used by every integration test binary.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use domain::models::{
    Bracelet, BraceletStatus, GeoPoint, PositionSample, SafetyZone, SampleSource,
};

/// Fixed reference instant; sample times are offsets from here so tests
/// are independent of the wall clock.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub fn bracelet() -> Bracelet {
    Bracelet::new(Uuid::new_v4(), "Emma")
}

/// A 1x1 degree square zone around (0.5, 0.5).
pub fn square_zone(bracelet_id: Uuid) -> SafetyZone {
    SafetyZone::polygon(
        bracelet_id,
        "Home",
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
        ],
    )
}

pub fn sample(
    bracelet_id: Uuid,
    source: SampleSource,
    latitude: f64,
    longitude: f64,
    offset_secs: i64,
) -> PositionSample {
    PositionSample {
        bracelet_id,
        latitude,
        longitude,
        accuracy_meters: 8.0,
        observed_at: base_time() + Duration::seconds(offset_secs),
        source,
        status: Some(BraceletStatus::Active),
        battery_level: None,
    }
}

/// Pull everything currently buffered without blocking.
pub fn drain(rx: &mut mpsc::Receiver<PositionSample>) -> Vec<PositionSample> {
    let mut out = Vec::new();
    while let Ok(sample) = rx.try_recv() {
        out.push(sample);
    }
    out
}
