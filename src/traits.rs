//! Capability seams for the optimizer.
//!
//! The orchestrator only talks to geocoding and travel-cost backends through
//! these traits, so real services and deterministic test doubles plug in the
//! same way.

use std::sync::Arc;
use std::time::Duration;

use crate::error::GeocodeFailure;
use crate::model::{Coordinate, Leg};

/// Resolves free-text addresses to coordinates.
///
/// Implementations must be idempotent for the same address within a run and
/// must give up after `timeout`, reporting [`GeocodeFailure::Timeout`].
pub trait Geocoder: Send + Sync {
    fn resolve(&self, address: &str, timeout: Duration) -> Result<Coordinate, GeocodeFailure>;
}

impl<G: Geocoder + ?Sized> Geocoder for Box<G> {
    fn resolve(&self, address: &str, timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        (**self).resolve(address, timeout)
    }
}

impl<G: Geocoder + ?Sized> Geocoder for Arc<G> {
    fn resolve(&self, address: &str, timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        (**self).resolve(address, timeout)
    }
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn resolve(&self, address: &str, timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        (**self).resolve(address, timeout)
    }
}

/// Estimates travel distance, duration and emissions between points.
pub trait CostEstimator: Send + Sync {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg;

    /// Full cost matrix for a set of points, indexed by input order.
    fn matrix(&self, points: &[Coordinate]) -> Vec<Vec<Leg>> {
        points
            .iter()
            .enumerate()
            .map(|(i, from)| {
                points
                    .iter()
                    .enumerate()
                    .map(|(j, to)| if i == j { Leg::ZERO } else { self.cost(*from, *to) })
                    .collect()
            })
            .collect()
    }
}

impl<E: CostEstimator + ?Sized> CostEstimator for Box<E> {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        (**self).cost(from, to)
    }

    fn matrix(&self, points: &[Coordinate]) -> Vec<Vec<Leg>> {
        (**self).matrix(points)
    }
}

impl<E: CostEstimator + ?Sized> CostEstimator for Arc<E> {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        (**self).cost(from, to)
    }

    fn matrix(&self, points: &[Coordinate]) -> Vec<Vec<Leg>> {
        (**self).matrix(points)
    }
}

impl<E: CostEstimator + ?Sized> CostEstimator for &E {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        (**self).cost(from, to)
    }

    fn matrix(&self, points: &[Coordinate]) -> Vec<Vec<Leg>> {
        (**self).matrix(points)
    }
}
