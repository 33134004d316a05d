//! Data model for a single optimization run.
//!
//! Everything here is call-scoped: stops are accepted from the caller,
//! clusters and routes are built by the run, and the result is handed back.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::error::GeocodeFailure;

/// A WGS-84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within latitude/longitude range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// `[lat, lng]`, the shape used on the wire.
    pub fn as_pair(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }

    /// Parses a `"lat,lng"` literal such as `"40.7128, -74.0060"`.
    pub fn parse_literal(text: &str) -> Option<Self> {
        let (lat, lng) = text.trim().split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lng = lng.trim().parse::<f64>().ok()?;
        let coordinate = Self::new(lat, lng);
        coordinate.is_valid().then_some(coordinate)
    }

    /// Arithmetic mean of a set of coordinates.
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let (mut lat, mut lng, mut count) = (0.0, 0.0, 0usize);
        for point in points {
            lat += point.lat;
            lng += point.lng;
            count += 1;
        }
        (count > 0).then(|| Self::new(lat / count as f64, lng / count as f64))
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

/// Caller-chosen identifier for a stop. Ordering is lexicographic and is
/// used to break ties between equal-cost routes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopId(pub String);

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StopId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StopId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Position a stop must hold inside its route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedPosition {
    First,
    Last,
}

/// A delivery location as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: StopId,
    pub address: String,
    /// Already-known position; skips geocoding when present.
    pub coordinate: Option<Coordinate>,
    pub priority: bool,
    pub position: Option<FixedPosition>,
}

impl Stop {
    pub fn new(id: impl Into<StopId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            coordinate: None,
            priority: false,
            position: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn with_priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn pinned(mut self, position: FixedPosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// A stop that survived geocoding, ready for partitioning and sequencing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStop {
    pub id: StopId,
    pub address: String,
    pub coordinate: Coordinate,
    pub priority: bool,
    pub position: Option<FixedPosition>,
    /// Position of the stop in the caller's input list.
    pub input_index: usize,
}

impl ResolvedStop {
    pub fn new(stop: Stop, coordinate: Coordinate, input_index: usize) -> Self {
        Self {
            id: stop.id,
            address: stop.address,
            coordinate,
            priority: stop.priority,
            position: stop.position,
            input_index,
        }
    }
}

/// A stop that could not be resolved, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedStop {
    pub id: StopId,
    pub address: String,
    pub reason: GeocodeFailure,
}

/// What the sequencer minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    ShortestDistance,
    FastestTime,
    #[serde(rename = "eco", alias = "lowest_emissions")]
    LowestEmissions,
}

impl Objective {
    /// The component of a leg this objective compares.
    pub fn weight(&self, leg: &Leg) -> f64 {
        match self {
            Objective::ShortestDistance => leg.distance,
            Objective::FastestTime => leg.duration,
            Objective::LowestEmissions => leg.emissions,
        }
    }
}

/// Travel cost between two consecutive points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Leg {
    /// Miles.
    pub distance: f64,
    /// Hours.
    pub duration: f64,
    /// Kilograms of CO2.
    pub emissions: f64,
}

impl Leg {
    pub const ZERO: Leg = Leg {
        distance: 0.0,
        duration: 0.0,
        emissions: 0.0,
    };
}

/// Totals derived from a route's consecutive legs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RouteMetrics {
    pub total_distance: f64,
    pub total_time: f64,
    pub co2_emissions: f64,
}

impl RouteMetrics {
    pub fn from_legs<'a>(legs: impl IntoIterator<Item = &'a Leg>) -> Self {
        legs.into_iter().fold(Self::default(), |mut metrics, leg| {
            metrics += *leg;
            metrics
        })
    }
}

impl AddAssign<Leg> for RouteMetrics {
    fn add_assign(&mut self, leg: Leg) {
        self.total_distance += leg.distance;
        self.total_time += leg.duration;
        self.co2_emissions += leg.emissions;
    }
}

impl Add for RouteMetrics {
    type Output = RouteMetrics;

    fn add(self, other: RouteMetrics) -> RouteMetrics {
        RouteMetrics {
            total_distance: self.total_distance + other.total_distance,
            total_time: self.total_time + other.total_time,
            co2_emissions: self.co2_emissions + other.co2_emissions,
        }
    }
}

/// A geographically coherent group of stops, served by one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: usize,
    pub stops: Vec<ResolvedStop>,
    pub centroid: Coordinate,
}

/// The visiting order computed for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub cluster_id: usize,
    pub centroid: Coordinate,
    pub stops: Vec<ResolvedStop>,
    /// One leg per visited stop; the first leg starts at the depot when one
    /// was given and is zero otherwise.
    pub legs: Vec<Leg>,
    pub metrics: RouteMetrics,
    /// Stops assigned to this cluster that did not fit the duration budget.
    pub deferred: Vec<ResolvedStop>,
}

/// Everything a run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub routes: Vec<Route>,
    pub metrics: RouteMetrics,
    pub unresolved: Vec<UnresolvedStop>,
}

impl OptimizationResult {
    /// Visited stops across every route, in cluster then visiting order.
    pub fn visited(&self) -> impl Iterator<Item = &ResolvedStop> {
        self.routes.iter().flat_map(|route| route.stops.iter())
    }

    /// Stops dropped by the duration budget, in cluster order.
    pub fn deferred(&self) -> impl Iterator<Item = &ResolvedStop> {
        self.routes.iter().flat_map(|route| route.deferred.iter())
    }
}
