//! Safety zone domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bare coordinate pair, the unit of zone geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geofence geometry: a drawn polygon or a center-plus-radius circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ZoneGeometry {
    Polygon { vertices: Vec<GeoPoint> },
    Circle { center: GeoPoint, radius_meters: f64 },
}

impl ZoneGeometry {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ZoneGeometry::Polygon { .. } => "polygon",
            ZoneGeometry::Circle { .. } => "circle",
        }
    }
}

/// A geofenced zone attached to a bracelet.
///
/// Zones are created and edited by the zone-management collaborator and are
/// read-only snapshots inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyZone {
    pub id: Uuid,
    pub bracelet_id: Uuid,
    pub name: String,
    pub geometry: ZoneGeometry,
    pub notify_on_entry: bool,
    pub notify_on_exit: bool,
    pub created_at: DateTime<Utc>,
}

impl SafetyZone {
    /// Build a polygon zone snapshot.
    pub fn polygon(
        bracelet_id: Uuid,
        name: impl Into<String>,
        vertices: Vec<GeoPoint>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bracelet_id,
            name: name.into(),
            geometry: ZoneGeometry::Polygon { vertices },
            notify_on_entry: true,
            notify_on_exit: true,
            created_at: Utc::now(),
        }
    }

    /// Build a circular zone snapshot.
    pub fn circle(
        bracelet_id: Uuid,
        name: impl Into<String>,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bracelet_id,
            name: name.into(),
            geometry: ZoneGeometry::Circle {
                center,
                radius_meters,
            },
            notify_on_entry: true,
            notify_on_exit: true,
            created_at: Utc::now(),
        }
    }
}
