//! OSRM HTTP adapter for road-network travel costs.
//!
//! Any failure talking to OSRM degrades to the haversine estimate so a slow
//! or missing routing backend never stalls a run.

use serde::Deserialize;
use tracing::warn;

use crate::config::EstimatorConfig;
use crate::error::BackendError;
use crate::haversine::{HaversineEstimator, KM_PER_MILE};
use crate::model::{Coordinate, Leg};
use crate::traits::CostEstimator;

const METERS_PER_MILE: f64 = KM_PER_MILE * 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmEstimator {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
    fallback: HaversineEstimator,
}

impl OsrmEstimator {
    pub fn new(config: OsrmConfig, costs: EstimatorConfig) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            fallback: HaversineEstimator::new(costs),
        })
    }

    fn leg(&self, meters: f64, seconds: f64) -> Leg {
        let miles = meters / METERS_PER_MILE;
        Leg {
            distance: miles,
            duration: seconds / 3600.0,
            emissions: miles * self.fallback.config().emissions_kg_per_mile,
        }
    }

    fn url(&self, service: &str, points: &[Coordinate], query: &str) -> String {
        let coords = points
            .iter()
            .map(|point| format!("{:.6},{:.6}", point.lng, point.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/{}/v1/{}/{}?{}",
            self.config.base_url.trim_end_matches('/'),
            service,
            self.config.profile,
            coords,
            query
        )
    }

    fn fetch_route(&self, from: Coordinate, to: Coordinate) -> Result<Leg, reqwest::Error> {
        let body = self
            .client
            .get(self.url("route", &[from, to], "overview=false"))
            .send()?
            .error_for_status()?
            .json::<OsrmRouteResponse>()?;

        Ok(body
            .routes
            .first()
            .map(|route| self.leg(route.distance, route.duration))
            .unwrap_or_else(|| self.fallback.cost(from, to)))
    }

    fn fetch_table(&self, points: &[Coordinate]) -> Result<Option<Vec<Vec<Leg>>>, reqwest::Error> {
        let body = self
            .client
            .get(self.url("table", points, "annotations=distance,duration"))
            .send()?
            .error_for_status()?
            .json::<OsrmTableResponse>()?;

        let (Some(distances), Some(durations)) = (body.distances, body.durations) else {
            return Ok(None);
        };
        if distances.len() != points.len() || durations.len() != points.len() {
            return Ok(None);
        }

        let mut matrix = Vec::with_capacity(points.len());
        for (i, (distance_row, duration_row)) in distances.iter().zip(&durations).enumerate() {
            if distance_row.len() != points.len() || duration_row.len() != points.len() {
                return Ok(None);
            }
            let row = (0..points.len())
                .map(|j| match (distance_row[j], duration_row[j]) {
                    (Some(meters), Some(seconds)) => self.leg(meters, seconds),
                    // unroutable pair
                    _ => self.fallback.cost(points[i], points[j]),
                })
                .collect();
            matrix.push(row);
        }

        Ok(Some(matrix))
    }
}

impl CostEstimator for OsrmEstimator {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        match self.fetch_route(from, to) {
            Ok(leg) => leg,
            Err(err) => {
                warn!(error = %err, "OSRM route request failed, using haversine estimate");
                self.fallback.cost(from, to)
            }
        }
    }

    fn matrix(&self, points: &[Coordinate]) -> Vec<Vec<Leg>> {
        if points.len() < 2 {
            return self.fallback.matrix(points);
        }

        match self.fetch_table(points) {
            Ok(Some(matrix)) => matrix,
            Ok(None) => {
                warn!(points = points.len(), "OSRM table response was incomplete, using haversine estimates");
                self.fallback.matrix(points)
            }
            Err(err) => {
                warn!(error = %err, points = points.len(), "OSRM table request failed, using haversine estimates");
                self.fallback.matrix(points)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    distances: Option<Vec<Vec<Option<f64>>>>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}
