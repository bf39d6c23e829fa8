use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// A "part" of a coordinate, in degrees
pub type CoordinateComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// Some point on the earth as gotten from a Geolocation API
pub struct GeoCoordinate {
    /// Latitude
    #[serde(alias = "latitude")]
    pub lat: CoordinateComponent,
    /// Longitude
    #[serde(alias = "longitude")]
    pub long: CoordinateComponent,
}

impl GeoCoordinate {
    pub const fn new(lat: CoordinateComponent, long: CoordinateComponent) -> Self {
        Self { lat, long }
    }

    /// Whether this is a finite coordinate within the usual lat/long ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.long.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.long)
    }

    /// Per-axis difference `other - self`
    pub fn delta_to(&self, other: &Self) -> (CoordinateComponent, CoordinateComponent) {
        (other.lat - self.lat, other.long - self.long)
    }
}

/// Options passed along when asking a device for its position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Milliseconds to wait for a fix before giving up
    pub timeout: u32,
    /// Oldest cached position (in milliseconds) that may be returned
    pub maximum_age: u32,
}

impl PositionOptions {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout as u64)
    }
}

/// High accuracy, 10 second timeout, never a cached position
pub const POSITION_OPTIONS: PositionOptions = PositionOptions {
    enable_high_accuracy: true,
    timeout: 10000,
    maximum_age: 0,
};

/// Source of the user's current position.
///
/// Failure reasons (denied, timeout, unavailable) are not distinguished by
/// consumers, any error means the lookup failed.
pub trait LocationService: Send + Sync {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<GeoCoordinate>> + Send;
}

/// A position that was already determined elsewhere (e.g. reported by the
/// browser or passed on the command line). `None` represents a failed lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedLocation(pub Option<GeoCoordinate>);

impl LocationService for ReportedLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<GeoCoordinate> {
        match self.0 {
            Some(coord) if coord.is_valid() => Ok(coord),
            Some(coord) => anyhow::bail!("Reported position is out of range: {coord:?}"),
            None => anyhow::bail!("Position unavailable"),
        }
    }
}
