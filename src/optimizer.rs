//! Optimization orchestrator: the public entry point for a run.
//!
//! validate -> geocode (parallel) -> partition -> sequence each cluster
//! (parallel) -> assemble. Every piece of working state is owned by the call.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterCount, Partitioner};
use crate::config::{EstimatorBackend, OptimizerConfig};
use crate::error::{BackendError, GeocodeFailure, OptimizeError};
use crate::geocoder::{self, normalize_address};
use crate::haversine::HaversineEstimator;
use crate::model::{
    Coordinate, FixedPosition, Objective, OptimizationResult, ResolvedStop, Route, RouteMetrics, Stop, StopId,
    UnresolvedStop,
};
use crate::osrm::OsrmEstimator;
use crate::sequencer::{SequencePlan, Sequencer};
use crate::traits::{CostEstimator, Geocoder};

/// Caller-selected options for one run.
#[derive(Debug, Clone, Default)]
pub struct OptimizeOptions {
    pub objective: Objective,
    pub cluster_count: ClusterCount,
    /// Per-route duration budget in hours.
    pub max_route_time: Option<f64>,
    /// Stops to visit first, in addition to stops flagged `priority`.
    pub priority_stops: Vec<StopId>,
    /// Depot every route departs from.
    pub start: Option<Coordinate>,
}

/// Cooperative cancellation flag shared between the caller and a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), OptimizeError> {
        if self.is_cancelled() {
            Err(OptimizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct RouteOptimizer<G, E> {
    geocoder: G,
    estimator: E,
    config: OptimizerConfig,
}

/// Optimizer whose backends were picked at runtime from configuration.
pub type DynRouteOptimizer = RouteOptimizer<Box<dyn Geocoder>, Box<dyn CostEstimator>>;

impl DynRouteOptimizer {
    /// Builds the geocoder and estimator selected by `config`.
    pub fn from_config(config: OptimizerConfig) -> Result<Self, BackendError> {
        let geocoder = geocoder::from_config(&config)?;
        let estimator: Box<dyn CostEstimator> = match &config.estimator {
            EstimatorBackend::Haversine => Box::new(HaversineEstimator::new(config.costs)),
            EstimatorBackend::Osrm(osrm) => Box::new(OsrmEstimator::new(osrm.clone(), config.costs)?),
        };
        Ok(Self::new(geocoder, estimator, config))
    }
}

impl<G: Geocoder, E: CostEstimator> RouteOptimizer<G, E> {
    pub fn new(geocoder: G, estimator: E, config: OptimizerConfig) -> Self {
        Self {
            geocoder,
            estimator,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn optimize(&self, stops: Vec<Stop>, options: &OptimizeOptions) -> Result<OptimizationResult, OptimizeError> {
        self.optimize_with_cancel(stops, options, &CancelToken::new())
    }

    /// Like [`optimize`](Self::optimize), but gives up with
    /// [`OptimizeError::Cancelled`] once `cancel` is set.
    pub fn optimize_with_cancel(
        &self,
        stops: Vec<Stop>,
        options: &OptimizeOptions,
        cancel: &CancelToken,
    ) -> Result<OptimizationResult, OptimizeError> {
        validate(&stops, options)?;
        info!(
            stops = stops.len(),
            objective = ?options.objective,
            clusters = ?options.cluster_count,
            "optimizing route"
        );

        let priority: HashSet<&StopId> = options.priority_stops.iter().collect();
        let stops: Vec<Stop> = stops
            .into_iter()
            .map(|mut stop| {
                stop.priority |= priority.contains(&stop.id);
                stop
            })
            .collect();

        let (resolved, unresolved) = self.resolve(stops, cancel)?;
        if resolved.is_empty() {
            warn!(unresolved = unresolved.len(), "no stop could be geocoded");
            return Err(OptimizeError::NoResolvableStops {
                unresolved: unresolved.into_iter().map(|stop| stop.address).collect(),
            });
        }
        cancel.check()?;

        let clusters = Partitioner::new(self.config.clustering).partition(resolved, options.cluster_count);
        debug!(clusters = clusters.len(), "partitioned stops");

        let plan = SequencePlan {
            start: options.start,
            objective: options.objective,
            max_route_time: options.max_route_time,
        };
        let sequencer = Sequencer::new(&self.estimator, self.config.sequencer);

        let routes = clusters
            .into_par_iter()
            .map(|cluster| {
                cancel.check()?;
                let sequence = sequencer.sequence(cluster.stops, &plan);
                Ok(Route {
                    cluster_id: cluster.id,
                    centroid: cluster.centroid,
                    stops: sequence.stops,
                    legs: sequence.legs,
                    metrics: sequence.metrics,
                    deferred: sequence.deferred,
                })
            })
            .collect::<Result<Vec<Route>, OptimizeError>>()?;
        cancel.check()?;

        let metrics = routes
            .iter()
            .fold(RouteMetrics::default(), |total, route| total + route.metrics);
        let result = OptimizationResult {
            routes,
            metrics,
            unresolved,
        };

        info!(
            routes = result.routes.len(),
            visited = result.visited().count(),
            deferred = result.deferred().count(),
            unresolved = result.unresolved.len(),
            total_distance = result.metrics.total_distance,
            "route optimized"
        );
        Ok(result)
    }

    /// Resolves every stop, geocoding each distinct address once.
    fn resolve(
        &self,
        stops: Vec<Stop>,
        cancel: &CancelToken,
    ) -> Result<(Vec<ResolvedStop>, Vec<UnresolvedStop>), OptimizeError> {
        let mut pending: BTreeMap<String, &str> = BTreeMap::new();
        for stop in &stops {
            if stop.coordinate.is_none() && Coordinate::parse_literal(&stop.address).is_none() {
                pending.entry(normalize_address(&stop.address)).or_insert(&stop.address);
            }
        }

        let timeout = self.config.geocode_timeout;
        let answers: BTreeMap<String, Option<Result<Coordinate, GeocodeFailure>>> = pending
            .into_par_iter()
            .map(|(key, address)| {
                if cancel.is_cancelled() {
                    return (key, None);
                }
                let answer = self.geocoder.resolve(address, timeout).and_then(|coordinate| {
                    if coordinate.is_valid() {
                        Ok(coordinate)
                    } else {
                        Err(GeocodeFailure::InvalidResponse(format!(
                            "coordinate out of range: {}, {}",
                            coordinate.lat, coordinate.lng
                        )))
                    }
                });
                (key, Some(answer))
            })
            .collect();
        cancel.check()?;

        let mut resolved = Vec::with_capacity(stops.len());
        let mut unresolved = Vec::new();
        for (index, stop) in stops.into_iter().enumerate() {
            let answer = match stop.coordinate.or_else(|| Coordinate::parse_literal(&stop.address)) {
                Some(coordinate) => Ok(coordinate),
                None => answers
                    .get(&normalize_address(&stop.address))
                    .cloned()
                    .flatten()
                    .ok_or(OptimizeError::Cancelled)?,
            };
            match answer {
                Ok(coordinate) => resolved.push(ResolvedStop::new(stop, coordinate, index)),
                Err(reason) => {
                    warn!(stop = %stop.id, address = %stop.address, %reason, "geocoding failed");
                    unresolved.push(UnresolvedStop {
                        id: stop.id,
                        address: stop.address,
                        reason,
                    });
                }
            }
        }

        Ok((resolved, unresolved))
    }
}

fn validate(stops: &[Stop], options: &OptimizeOptions) -> Result<(), OptimizeError> {
    if stops.is_empty() {
        return Err(OptimizeError::validation("at least one stop is required"));
    }

    let mut ids = HashSet::with_capacity(stops.len());
    let (mut firsts, mut lasts) = (0, 0);
    for stop in stops {
        if !ids.insert(&stop.id) {
            return Err(OptimizeError::validation(format!("duplicate stop id {}", stop.id)));
        }
        match stop.coordinate {
            Some(coordinate) if !coordinate.is_valid() => {
                return Err(OptimizeError::validation(format!(
                    "stop {} has an out-of-range coordinate",
                    stop.id
                )));
            }
            None if stop.address.trim().is_empty() => {
                return Err(OptimizeError::validation(format!("stop {} has an empty address", stop.id)));
            }
            _ => {}
        }
        match stop.position {
            Some(FixedPosition::First) => firsts += 1,
            Some(FixedPosition::Last) => lasts += 1,
            None => {}
        }
    }
    if firsts > 1 || lasts > 1 {
        return Err(OptimizeError::validation(
            "at most one stop may be pinned first and one pinned last",
        ));
    }

    if let Some(unknown) = options.priority_stops.iter().find(|id| !ids.contains(id)) {
        return Err(OptimizeError::validation(format!("unknown priority stop {}", unknown)));
    }
    if let Some(hours) = options.max_route_time {
        if !(hours.is_finite() && hours > 0.0) {
            return Err(OptimizeError::validation("max route time must be a positive number of hours"));
        }
    }
    if options.cluster_count == ClusterCount::Fixed(0) {
        return Err(OptimizeError::validation("cluster count must be at least 1"));
    }
    if let Some(start) = options.start {
        if !start.is_valid() {
            return Err(OptimizeError::validation("start coordinate is out of range"));
        }
    }

    Ok(())
}
