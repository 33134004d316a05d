//! Route geometry as an ordered run of coordinates.
//!
//! Geometry here is the straight-line path through a route's stops, in
//! visiting order. Road-following shapes are not modelled.

use serde::{Deserialize, Serialize};

use crate::model::{Coordinate, Route};

/// The path a vehicle draws on a map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    /// Path through a route's visited stops. Deferred stops are not drawn.
    pub fn from_route(route: &Route) -> Self {
        route.stops.iter().map(|stop| stop.coordinate).collect()
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// `[lat, lng]` pairs, the shape map clients consume.
    pub fn to_pairs(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(Coordinate::as_pair).collect()
    }
}

impl FromIterator<Coordinate> for Polyline {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
