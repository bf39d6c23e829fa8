use serde::{Deserialize, Serialize};

use crate::location::GeoCoordinate;

/// Mean earth radius in meters, same value the map widget measures with.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Assumed urban travel speed of a technician (~24 km/h)
pub const TRAVEL_METERS_PER_MINUTE: f64 = 400.0;

/// Great-circle distance between two coordinates, in meters
pub fn haversine_meters(a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlong = (b.long - a.long).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlong / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    pub distance_meters: f64,
    pub eta_minutes: u32,
}

impl DistanceEstimate {
    /// Build an estimate from a measured distance, ETA rounds up to whole minutes
    pub fn from_meters(distance_meters: f64, meters_per_minute: f64) -> Self {
        let eta_minutes = (distance_meters / meters_per_minute).ceil().max(0.0) as u32;
        Self {
            distance_meters,
            eta_minutes,
        }
    }
}

/// Distance between the user and technician along with an ETA at
/// [TRAVEL_METERS_PER_MINUTE]
pub fn distance_and_eta(user: &GeoCoordinate, technician: &GeoCoordinate) -> DistanceEstimate {
    DistanceEstimate::from_meters(haversine_meters(user, technician), TRAVEL_METERS_PER_MINUTE)
}
