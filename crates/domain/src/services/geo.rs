//! Geofencing geometry.
//!
//! Containment tests use the ray-casting parity algorithm for polygons and
//! great-circle (haversine) distance for circles. Coordinates are WGS84
//! degrees; zone extents are small enough that the polygon test can treat
//! them as planar.

use thiserror::Error;

use crate::models::zone::{GeoPoint, ZoneGeometry};

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Geometry that cannot be evaluated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Ray-casting parity test against a closed ring of vertices.
///
/// The last vertex implicitly connects back to the first. Rings with fewer
/// than three vertices are degenerate.
pub fn point_in_polygon(point: GeoPoint, vertices: &[GeoPoint]) -> Result<bool, GeoError> {
    if vertices.len() < 3 {
        return Err(GeoError::InvalidGeometry(format!(
            "polygon needs at least 3 vertices, got {}",
            vertices.len()
        )));
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].latitude, vertices[i].longitude);
        let (xj, yj) = (vertices[j].latitude, vertices[j].longitude);

        let crosses = (yi > point.longitude) != (yj > point.longitude)
            && point.latitude < (xj - xi) * (point.longitude - yi) / (yj - yi) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }

    Ok(inside)
}

/// Whether a point lies within `radius_meters` of `center`.
pub fn point_in_circle(
    point: GeoPoint,
    center: GeoPoint,
    radius_meters: f64,
) -> Result<bool, GeoError> {
    if radius_meters <= 0.0 {
        return Err(GeoError::InvalidGeometry(format!(
            "circle radius must be positive, got {radius_meters}"
        )));
    }
    Ok(haversine_distance_meters(point, center) <= radius_meters)
}

/// Containment test against either geometry kind.
pub fn contains(point: GeoPoint, geometry: &ZoneGeometry) -> Result<bool, GeoError> {
    match geometry {
        ZoneGeometry::Polygon { vertices } => point_in_polygon(point, vertices),
        ZoneGeometry::Circle {
            center,
            radius_meters,
        } => point_in_circle(point, *center, *radius_meters),
    }
}

/// Index at which inserting `new_point` into the closed ring adds the least
/// perimeter.
///
/// Used by the interactive polygon editor: clicking near an edge inserts
/// the new vertex between that edge's endpoints instead of appending it and
/// crossing the ring. Rings that are not yet polygons append.
pub fn best_insertion_index(vertices: &[GeoPoint], new_point: GeoPoint) -> usize {
    if vertices.len() < 3 {
        return vertices.len();
    }

    let mut min_added = f64::INFINITY;
    let mut best_index = vertices.len();

    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];

        let current = flat_distance(a, b);
        let detour = flat_distance(a, new_point) + flat_distance(new_point, b);
        let added = detour - current;

        if added < min_added {
            min_added = added;
            best_index = i + 1;
        }
    }

    best_index
}

// Degree-space distance; sufficient for comparing candidate edges.
fn flat_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    (a.latitude - b.latitude).hypot(a.longitude - b.longitude)
}
