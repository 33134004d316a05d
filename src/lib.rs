//! route-optimizer core
//!
//! Turns a list of delivery addresses into per-vehicle visiting orders:
//! geocode, partition into clusters, sequence each cluster.

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod haversine;
pub mod model;
pub mod optimizer;
pub mod osrm;
pub mod polyline;
pub mod sequencer;
pub mod traits;

pub use cluster::ClusterCount;
pub use config::OptimizerConfig;
pub use error::{GeocodeFailure, OptimizeError};
pub use model::{Coordinate, FixedPosition, Objective, OptimizationResult, Route, RouteMetrics, Stop, StopId};
pub use optimizer::{CancelToken, OptimizeOptions, RouteOptimizer};
pub use traits::{CostEstimator, Geocoder};
