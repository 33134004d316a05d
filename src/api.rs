//! JSON request and response shapes for the optimizer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterCount;
use crate::error::OptimizeError;
use crate::model::{Coordinate, Objective, OptimizationResult, Stop, StopId};
use crate::optimizer::{OptimizeOptions, RouteOptimizer};
use crate::polyline::Polyline;
use crate::traits::{CostEstimator, Geocoder};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub addresses: Vec<String>,
    #[serde(default)]
    pub optimization_type: Objective,
    /// 1-based positions into `addresses`.
    #[serde(default)]
    pub priority_stops: Vec<usize>,
    #[serde(default)]
    pub max_route_time_hours: Option<f64>,
    #[serde(default)]
    pub cluster_count: ClusterCount,
    /// Depot as `[lat, lng]`.
    #[serde(default)]
    pub start: Option<[f64; 2]>,
}

impl OptimizeRequest {
    pub fn new(addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Stops are numbered "1".."n" in request order.
    pub fn into_parts(self) -> (Vec<Stop>, OptimizeOptions) {
        let stops = self
            .addresses
            .into_iter()
            .enumerate()
            .map(|(i, address)| Stop::new((i + 1).to_string(), address))
            .collect();
        let options = OptimizeOptions {
            objective: self.optimization_type,
            cluster_count: self.cluster_count,
            max_route_time: self.max_route_time_hours,
            priority_stops: self
                .priority_stops
                .iter()
                .map(|number| StopId::new(number.to_string()))
                .collect(),
            start: self.start.map(Coordinate::from),
        };
        (stops, options)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// 1-based position in the visiting order.
    pub stop_number: usize,
    pub stop_id: StopId,
    pub address: String,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub points: Vec<[f64; 2]>,
    pub centroid: [f64; 2],
    pub num_stops: usize,
    pub total_distance: f64,
    pub total_time: f64,
    pub co2_emissions: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub success: bool,
    pub route: Vec<RouteEntry>,
    pub total_distance: f64,
    pub total_time: f64,
    pub co2_emissions: f64,
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<BTreeMap<usize, ClusterEntry>>,
    pub unresolved: Vec<String>,
    pub deferred: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OptimizeResponse {
    /// An empty, unsuccessful response carrying `error` and any addresses it
    /// names as unresolved.
    pub fn failure(error: &OptimizeError) -> Self {
        let unresolved = match error {
            OptimizeError::NoResolvableStops { unresolved } => unresolved.clone(),
            _ => Vec::new(),
        };
        Self {
            success: false,
            route: Vec::new(),
            total_distance: 0.0,
            total_time: 0.0,
            co2_emissions: 0.0,
            coordinates: Vec::new(),
            clusters: None,
            unresolved,
            deferred: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

impl From<&OptimizationResult> for OptimizeResponse {
    fn from(result: &OptimizationResult) -> Self {
        let route = result
            .visited()
            .enumerate()
            .map(|(i, stop)| RouteEntry {
                stop_number: i + 1,
                stop_id: stop.id.clone(),
                address: stop.address.clone(),
                coordinates: stop.coordinate.as_pair(),
            })
            .collect::<Vec<_>>();
        let coordinates = route.iter().map(|entry| entry.coordinates).collect();

        let clusters = (result.routes.len() > 1).then(|| {
            result
                .routes
                .iter()
                .map(|route| {
                    let line = Polyline::from_route(route);
                    let entry = ClusterEntry {
                        points: line.to_pairs(),
                        centroid: route.centroid.as_pair(),
                        num_stops: route.stops.len(),
                        total_distance: route.metrics.total_distance,
                        total_time: route.metrics.total_time,
                        co2_emissions: route.metrics.co2_emissions,
                    };
                    (route.cluster_id, entry)
                })
                .collect()
        });

        Self {
            success: true,
            route,
            total_distance: result.metrics.total_distance,
            total_time: result.metrics.total_time,
            co2_emissions: result.metrics.co2_emissions,
            coordinates,
            clusters,
            unresolved: result.unresolved.iter().map(|stop| stop.address.clone()).collect(),
            deferred: result.deferred().map(|stop| stop.address.clone()).collect(),
            error: None,
        }
    }
}

/// Runs one request. Validation and cancellation come back as errors; a run
/// where nothing geocoded is still answered, with `success: false`.
pub fn handle<G: Geocoder, E: CostEstimator>(
    optimizer: &RouteOptimizer<G, E>,
    request: OptimizeRequest,
) -> Result<OptimizeResponse, OptimizeError> {
    let (stops, options) = request.into_parts();
    match optimizer.optimize(stops, &options) {
        Ok(result) => Ok(OptimizeResponse::from(&result)),
        Err(error @ OptimizeError::NoResolvableStops { .. }) => Ok(OptimizeResponse::failure(&error)),
        Err(error) => Err(error),
    }
}
