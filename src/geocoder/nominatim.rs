//! Nominatim (OpenStreetMap) HTTP geocoder.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BackendError, GeocodeFailure};
use crate::model::Coordinate;
use crate::traits::Geocoder;

#[derive(Debug, Clone, PartialEq)]
pub struct NominatimConfig {
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying agent.
    pub user_agent: String,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("route-optimizer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, client })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

impl Geocoder for NominatimGeocoder {
    fn resolve(&self, address: &str, timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        let places = self
            .client
            .get(self.search_url())
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .timeout(timeout)
            .send()?
            .error_for_status()?
            .json::<Vec<NominatimPlace>>()?;

        let place = places.into_iter().next().ok_or(GeocodeFailure::NotFound)?;
        place.coordinate()
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn coordinate(&self) -> Result<Coordinate, GeocodeFailure> {
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| GeocodeFailure::InvalidResponse(format!("bad coordinate {:?}", value)))
        };
        let coordinate = Coordinate::new(parse(&self.lat)?, parse(&self.lon)?);
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(GeocodeFailure::InvalidResponse(format!(
                "coordinate out of range: {}, {}",
                self.lat, self.lon
            )))
        }
    }
}
