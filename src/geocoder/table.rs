//! Geocoder backed by a fixed address table.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::GeocodeFailure;
use crate::geocoder::normalize_address;
use crate::model::Coordinate;
use crate::traits::Geocoder;

/// Resolves addresses from an in-memory table; anything else is `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct TableGeocoder {
    entries: HashMap<String, Coordinate>,
}

impl TableGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, coordinate: Coordinate) -> Self {
        self.insert(address, coordinate);
        self
    }

    pub fn insert(&mut self, address: &str, coordinate: Coordinate) {
        self.entries.insert(normalize_address(address), coordinate);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, Coordinate)> for TableGeocoder {
    fn from_iter<I: IntoIterator<Item = (S, Coordinate)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (address, coordinate) in iter {
            table.insert(address.as_ref(), coordinate);
        }
        table
    }
}

impl Geocoder for TableGeocoder {
    fn resolve(&self, address: &str, _timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        self.entries
            .get(&normalize_address(address))
            .copied()
            .ok_or(GeocodeFailure::NotFound)
    }
}
