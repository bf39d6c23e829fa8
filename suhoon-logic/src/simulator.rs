use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    geo::{DistanceEstimate, haversine_meters},
    location::GeoCoordinate,
    settings::TrackerSettings,
};

/// Models a technician driving toward the user.
///
/// The technician starts at a random offset of 0.010 - 0.015 degrees on each
/// axis and then covers a fixed fraction of the remaining vector every tick,
/// so it slows down as it gets closer rather than moving at a constant speed.
pub struct LocationSimulator<R: Rng = ChaCha20Rng> {
    rng: R,
    settings: TrackerSettings,
    user: Option<GeoCoordinate>,
    technician: Option<GeoCoordinate>,
    /// Ticks that moved the technician since [LocationSimulator::begin]
    ticks: u32,
}

impl LocationSimulator<ChaCha20Rng> {
    /// Create a simulator with an rng seeded from [TrackerSettings::random_seed]
    pub fn from_settings(settings: TrackerSettings) -> Self {
        let rng = ChaCha20Rng::seed_from_u64(settings.random_seed);
        Self::new(rng, settings)
    }
}

impl<R: Rng> LocationSimulator<R> {
    pub fn new(rng: R, settings: TrackerSettings) -> Self {
        Self {
            rng,
            settings,
            user: None,
            technician: None,
            ticks: 0,
        }
    }

    fn random_axis_offset(&mut self) -> f64 {
        let magnitude = self.rng.random_range(self.settings.offset_range());
        if self.rng.random_bool(0.5) {
            magnitude
        } else {
            -magnitude
        }
    }

    /// Place the technician at a random offset from `user`, returns the technician's position
    pub fn begin(&mut self, user: GeoCoordinate) -> GeoCoordinate {
        let lat_offset = self.random_axis_offset();
        let long_offset = self.random_axis_offset();
        self.begin_with_offset(user, lat_offset, long_offset)
    }

    /// Place the technician at exactly `user + (lat_offset, long_offset)`
    pub fn begin_with_offset(
        &mut self,
        user: GeoCoordinate,
        lat_offset: f64,
        long_offset: f64,
    ) -> GeoCoordinate {
        let technician = GeoCoordinate::new(user.lat + lat_offset, user.long + long_offset);
        self.user = Some(user);
        self.technician = Some(technician);
        self.ticks = 0;
        technician
    }

    pub fn user(&self) -> Option<GeoCoordinate> {
        self.user
    }

    pub fn technician(&self) -> Option<GeoCoordinate> {
        self.technician
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn is_running(&self) -> bool {
        self.user.is_some() && self.technician.is_some()
    }

    /// Whether both axis deltas are under the arrival threshold
    pub fn has_arrived(&self) -> bool {
        match (self.user, self.technician) {
            (Some(user), Some(tech)) => {
                let (dlat, dlong) = tech.delta_to(&user);
                let threshold = self.settings.arrival_threshold_deg;
                dlat.abs() < threshold && dlong.abs() < threshold
            }
            _ => false,
        }
    }

    /// Move the technician toward the user. Returns `false` without moving if
    /// the simulation isn't running or the technician has already arrived.
    pub fn tick(&mut self) -> bool {
        if self.has_arrived() {
            return false;
        }

        let (Some(user), Some(tech)) = (self.user, self.technician.as_mut()) else {
            return false;
        };

        let factor = self.settings.approach_factor;
        let (dlat, dlong) = tech.delta_to(&user);
        tech.lat += dlat * factor;
        tech.long += dlong * factor;
        self.ticks += 1;
        true
    }

    /// Haversine distance and ETA between the user and technician
    pub fn estimate(&self) -> Option<DistanceEstimate> {
        let (user, tech) = (self.user?, self.technician?);
        Some(self.estimate_from_meters(haversine_meters(&user, &tech)))
    }

    /// ETA for a distance measured elsewhere (e.g. by the map widget)
    pub fn estimate_from_meters(&self, distance_meters: f64) -> DistanceEstimate {
        DistanceEstimate::from_meters(distance_meters, self.settings.meters_per_minute)
    }

    pub fn reset(&mut self) {
        self.user = None;
        self.technician = None;
        self.ticks = 0;
    }
}
