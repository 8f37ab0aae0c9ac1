//! Required applause level from venue occupancy.
//!
//! ```text
//! density        = occupancy / venue_volume_m3
//! required_level = base_level_db + density * scaling_factor
//! ```
//!
//! An occupancy of zero yields `0.0` rather than the base level: it marks
//! "no threshold configured", and hosts should not start a session in that
//! state.

use serde::{Deserialize, Serialize};

use crate::error::{OvationError, Result};

/// Gymnasium volume the defaults were calibrated for: 36 m × 24 m × 12 m.
pub const DEFAULT_VENUE_VOLUME_M3: f64 = 36.0 * 24.0 * 12.0;
pub const DEFAULT_BASE_LEVEL_DB: f64 = 50.0;
pub const DEFAULT_SCALING_FACTOR: f64 = 50.0;

/// Number of people present. Supplied by the host at any time.
pub type OccupancyCount = u32;

/// Decibel level a reading has to exceed for approval.
pub type RequiredLevel = f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdModel {
    venue_volume_m3: f64,
    base_level_db: f64,
    scaling_factor: f64,
}

impl ThresholdModel {
    /// Build a model, rejecting parameters that would break monotonicity or
    /// divide by zero.
    pub fn new(venue_volume_m3: f64, base_level_db: f64, scaling_factor: f64) -> Result<Self> {
        if !venue_volume_m3.is_finite() || venue_volume_m3 <= 0.0 {
            return Err(OvationError::InvalidConfig(format!(
                "venue volume must be a positive number of cubic metres, got {venue_volume_m3}"
            )));
        }
        if !base_level_db.is_finite() {
            return Err(OvationError::InvalidConfig(format!(
                "base level must be finite, got {base_level_db}"
            )));
        }
        if !scaling_factor.is_finite() || scaling_factor < 0.0 {
            return Err(OvationError::InvalidConfig(format!(
                "scaling factor must be finite and non-negative, got {scaling_factor}"
            )));
        }
        Ok(Self {
            venue_volume_m3,
            base_level_db,
            scaling_factor,
        })
    }

    /// Default base level and scaling for a venue of the given volume.
    pub fn for_venue(venue_volume_m3: f64) -> Result<Self> {
        Self::new(venue_volume_m3, DEFAULT_BASE_LEVEL_DB, DEFAULT_SCALING_FACTOR)
    }

    pub fn venue_volume_m3(&self) -> f64 {
        self.venue_volume_m3
    }

    pub fn base_level_db(&self) -> f64 {
        self.base_level_db
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// People per cubic metre.
    pub fn density(&self, occupancy: OccupancyCount) -> f64 {
        f64::from(occupancy) / self.venue_volume_m3
    }

    pub fn required_level(&self, occupancy: OccupancyCount) -> RequiredLevel {
        if occupancy == 0 {
            return 0.0;
        }
        self.base_level_db + self.density(occupancy) * self.scaling_factor
    }
}

impl Default for ThresholdModel {
    fn default() -> Self {
        Self {
            venue_volume_m3: DEFAULT_VENUE_VOLUME_M3,
            base_level_db: DEFAULT_BASE_LEVEL_DB,
            scaling_factor: DEFAULT_SCALING_FACTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_venue_is_the_gymnasium() {
        assert_eq!(ThresholdModel::default().venue_volume_m3(), 10_368.0);
    }

    #[test]
    fn zero_occupancy_has_no_threshold() {
        for volume in [1.0, 500.0, 10_368.0, 1e9] {
            let model = ThresholdModel::for_venue(volume).unwrap();
            assert_eq!(model.required_level(0), 0.0);
        }
    }

    #[test]
    fn five_thousand_people_in_the_gymnasium() {
        let model = ThresholdModel::for_venue(10_368.0).unwrap();
        let expected = 50.0 + (5000.0 / 10_368.0) * 50.0;
        assert_eq!(model.required_level(5000), expected);
        assert!((expected - 74.11).abs() < 0.01);
    }

    #[test]
    fn required_level_is_monotonic() {
        let model = ThresholdModel::default();
        let mut previous = model.required_level(0);
        for occupancy in (1..20_000).step_by(37) {
            let level = model.required_level(occupancy);
            assert!(level >= previous, "{occupancy}: {level} < {previous}");
            previous = level;
        }
    }

    #[test]
    fn single_person_jumps_to_base_level() {
        let model = ThresholdModel::default();
        assert!(model.required_level(1) > 50.0);
        assert!(model.required_level(1) < 50.01);
    }

    #[test]
    fn rejects_degenerate_parameters() {
        assert!(ThresholdModel::for_venue(0.0).is_err());
        assert!(ThresholdModel::for_venue(-3.0).is_err());
        assert!(ThresholdModel::for_venue(f64::NAN).is_err());
        assert!(ThresholdModel::new(100.0, f64::INFINITY, 50.0).is_err());
        assert!(ThresholdModel::new(100.0, 50.0, -1.0).is_err());
        assert!(ThresholdModel::new(100.0, 40.0, 0.0).is_ok());
    }

    #[test]
    fn density_is_people_per_cubic_metre() {
        let model = ThresholdModel::default();
        assert!((model.density(500) - 0.0482).abs() < 1e-4);
    }
}
