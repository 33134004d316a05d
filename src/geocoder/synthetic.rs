//! Deterministic, network-free geocoder.
//!
//! Hashes the normalized address into a point near a fixed centre. The same
//! address always lands on the same coordinate, so runs are reproducible.

use std::time::Duration;

use crate::error::GeocodeFailure;
use crate::geocoder::normalize_address;
use crate::haversine::{EARTH_RADIUS_KM, KM_PER_MILE};
use crate::model::Coordinate;
use crate::traits::Geocoder;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticConfig {
    pub center: Coordinate,
    /// Points fall within this many miles of `center`.
    pub radius_miles: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            center: Coordinate::new(40.0, -74.0),
            radius_miles: 15.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticGeocoder {
    config: SyntheticConfig,
}

impl SyntheticGeocoder {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    /// Maps a normalized address to a point; never fails.
    pub fn locate(&self, normalized: &str) -> Coordinate {
        let hash = fnv1a(normalized.as_bytes());
        // two independent 32-bit halves -> unit square
        let u = (hash >> 32) as f64 / u32::MAX as f64;
        let v = (hash & 0xffff_ffff) as f64 / u32::MAX as f64;

        // uniform over the disc
        let distance_km = self.config.radius_miles * KM_PER_MILE * u.sqrt();
        let bearing = v * std::f64::consts::TAU;
        let delta_lat = (distance_km * bearing.cos() / EARTH_RADIUS_KM).to_degrees();
        let delta_lng = (distance_km * bearing.sin()
            / (EARTH_RADIUS_KM * self.config.center.lat.to_radians().cos().max(1e-6)))
        .to_degrees();

        Coordinate::new(
            (self.config.center.lat + delta_lat).clamp(-90.0, 90.0),
            wrap_longitude(self.config.center.lng + delta_lng),
        )
    }
}

impl Geocoder for SyntheticGeocoder {
    fn resolve(&self, address: &str, _timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        let normalized = normalize_address(address);
        if !normalized.chars().any(char::is_alphanumeric) {
            return Err(GeocodeFailure::NotFound);
        }
        Ok(self.locate(&normalized))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn wrap_longitude(lng: f64) -> f64 {
    if lng > 180.0 {
        lng - 360.0
    } else if lng < -180.0 {
        lng + 360.0
    } else {
        lng
    }
}
