use std::{ops::RangeInclusive, time::Duration};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::{geo::TRAVEL_METERS_PER_MINUTE, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Tunables for the technician tracking simulation
pub struct TrackerSettings {
    /// Seed for the rng used to place the technician
    pub random_seed: u64,
    /// Milliseconds between technician movement ticks
    pub tick_millis: u64,
    /// Fraction of the remaining vector the technician covers every tick
    pub approach_factor: f64,
    /// Once both axis deltas (in degrees) are below this the technician has arrived
    pub arrival_threshold_deg: f64,
    /// Smallest initial offset on each axis, in degrees
    pub min_offset_deg: f64,
    /// Largest initial offset on each axis, in degrees
    pub max_offset_deg: f64,
    /// Assumed travel speed used for ETAs
    pub meters_per_minute: f64,
}

impl TrackerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn offset_range(&self) -> RangeInclusive<f64> {
        self.min_offset_deg..=self.max_offset_deg
    }

    /// Check the settings can drive a simulation, settings loaded from
    /// elsewhere should always go through this
    pub fn validate(&self) -> Result {
        if self.tick_millis == 0 {
            bail!("tick_millis must be greater than 0");
        }
        if !(self.approach_factor > 0.0 && self.approach_factor <= 1.0) {
            bail!(
                "approach_factor must be in (0, 1], got {}",
                self.approach_factor
            );
        }
        if !(self.min_offset_deg >= 0.0 && self.min_offset_deg <= self.max_offset_deg) {
            bail!(
                "Offsets must satisfy 0 <= min <= max, got {} - {}",
                self.min_offset_deg,
                self.max_offset_deg
            );
        }
        if !self.max_offset_deg.is_finite() {
            bail!("max_offset_deg must be finite");
        }
        if !(self.arrival_threshold_deg > 0.0) {
            bail!(
                "arrival_threshold_deg must be greater than 0, got {}",
                self.arrival_threshold_deg
            );
        }
        if !(self.meters_per_minute > 0.0 && self.meters_per_minute.is_finite()) {
            bail!(
                "meters_per_minute must be greater than 0, got {}",
                self.meters_per_minute
            );
        }
        Ok(())
    }

    /// Same settings with a fixed seed
    pub fn with_seed(self, random_seed: u64) -> Self {
        Self {
            random_seed,
            ..self
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            random_seed: rand::random(),
            tick_millis: 1000,
            approach_factor: 0.05,
            arrival_threshold_deg: 0.00005,
            min_offset_deg: 0.010,
            max_offset_deg: 0.015,
            meters_per_minute: TRAVEL_METERS_PER_MINUTE,
        }
    }
}
