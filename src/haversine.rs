//! Great-circle cost estimator (default, and fallback when OSRM is unavailable).
//!
//! Less accurate than road routing but pure and always available, which
//! makes it the deterministic choice for tests.

use crate::config::EstimatorConfig;
use crate::model::{Coordinate, Leg};
use crate::traits::CostEstimator;

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const KM_PER_MILE: f64 = 1.609344;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Haversine distance between two points in miles.
pub fn haversine_miles(from: Coordinate, to: Coordinate) -> f64 {
    haversine_km(from, to) / KM_PER_MILE
}

/// Estimates legs from straight-line distance and an assumed speed.
#[derive(Debug, Clone, Default)]
pub struct HaversineEstimator {
    config: EstimatorConfig,
}

impl HaversineEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Duration and emissions for a known distance in miles.
    pub fn leg_for_distance(&self, miles: f64) -> Leg {
        Leg {
            distance: miles,
            duration: miles / self.config.average_speed_mph,
            emissions: miles * self.config.emissions_kg_per_mile,
        }
    }
}

impl CostEstimator for HaversineEstimator {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        self.leg_for_distance(haversine_miles(from, to))
    }
}
