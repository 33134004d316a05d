//! Geocoder backends and the shared address normalization they key on.

pub mod cache;
pub mod nominatim;
pub mod synthetic;
pub mod table;

pub use cache::CachingGeocoder;
pub use nominatim::{NominatimConfig, NominatimGeocoder};
pub use synthetic::{SyntheticConfig, SyntheticGeocoder};
pub use table::TableGeocoder;

use crate::config::{GeocoderBackend, OptimizerConfig};
use crate::error::BackendError;
use crate::traits::Geocoder;

/// Canonical form of an address: trimmed, lowercased, inner whitespace
/// collapsed to single spaces.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the geocoder selected by `config`, wrapped in the TTL cache unless
/// the cache capacity is zero.
pub fn from_config(config: &OptimizerConfig) -> Result<Box<dyn Geocoder>, BackendError> {
    let backend: Box<dyn Geocoder> = match &config.geocoder {
        GeocoderBackend::Nominatim(nominatim) => Box::new(NominatimGeocoder::new(nominatim.clone())?),
        GeocoderBackend::Synthetic(synthetic) => Box::new(SyntheticGeocoder::new(*synthetic)),
    };

    if config.cache.capacity == 0 {
        Ok(backend)
    } else {
        Ok(Box::new(CachingGeocoder::new(backend, config.cache)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(
            normalize_address("  702 SW 8th   St,\tBentonville  "),
            "702 sw 8th st, bentonville"
        );
        assert_eq!(normalize_address("   "), "");
    }
}
