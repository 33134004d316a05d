//! Shared fixtures for the integration tests.
//!
//! Real Las Vegas / Henderson delivery addresses with known coordinates,
//! plus helpers for building optimizers that never touch the network.

#![allow(dead_code)]

pub mod las_vegas;

use route_optimizer::config::OptimizerConfig;
use route_optimizer::geocoder::TableGeocoder;
use route_optimizer::haversine::HaversineEstimator;
use route_optimizer::{RouteOptimizer, Stop};

pub use las_vegas::*;

/// Geocoder that knows every fixture address.
pub fn vegas_geocoder() -> TableGeocoder {
    all_addresses().iter().map(|a| (a.address, a.coordinate())).collect()
}

pub fn vegas_optimizer() -> RouteOptimizer<TableGeocoder, HaversineEstimator> {
    RouteOptimizer::new(vegas_geocoder(), HaversineEstimator::default(), OptimizerConfig::default())
}

/// Stops numbered "1".."n" in slice order.
pub fn stops_for(addresses: &[Address]) -> Vec<Stop> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, a)| Stop::new((i + 1).to_string(), a.address))
        .collect()
}
