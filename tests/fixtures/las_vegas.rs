//! Las Vegas metro delivery addresses.
//!
//! Coordinates from OpenStreetMap. Grouped by neighbourhood so tests can
//! reason about which stops belong together.

use route_optimizer::Coordinate;

#[derive(Debug, Clone, Copy)]
pub struct Address {
    pub address: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Address {
    pub const fn new(address: &'static str, lat: f64, lng: f64) -> Self {
        Self { address, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

pub const STRIP: &[Address] = &[
    Address::new("3131 Las Vegas Blvd S, Las Vegas, NV", 36.1263781, -115.1658180),
    Address::new("3570 Las Vegas Blvd S, Las Vegas, NV", 36.1162, -115.1745),
    Address::new("3600 Las Vegas Blvd S, Las Vegas, NV", 36.1126, -115.1767),
    Address::new("3799 Las Vegas Blvd S, Las Vegas, NV", 36.1023654, -115.1688720),
    Address::new("3500 Las Vegas Blvd S, Las Vegas, NV", 36.1181377, -115.1710989),
    Address::new("3377 Las Vegas Blvd S, Las Vegas, NV", 36.1231133, -115.1697093),
];

pub const EAST_SIDE: &[Address] = &[
    Address::new("5052 E Charleston Blvd, Las Vegas, NV", 36.1450055, -115.0482587),
    Address::new("5060 E Charleston Blvd, Las Vegas, NV", 36.1452953, -115.0478347),
    Address::new("4420 E Charleston Blvd, Las Vegas, NV", 36.1440711, -115.0634197),
    Address::new("4441 E Charleston Blvd, Las Vegas, NV", 36.1443292, -115.0624966),
    Address::new("4300 E Charleston Blvd, Las Vegas, NV", 36.1470458, -115.0644345),
];

pub const HENDERSON: &[Address] = &[
    Address::new("2800 N Green Valley Pkwy, Henderson, NV", 36.0137634, -114.9928676),
    Address::new("2895 N Green Valley Pkwy, Henderson, NV", 36.0090449, -114.9917034),
    Address::new("1550 W Horizon Ridge Pkwy, Henderson, NV", 36.0335058, -114.9856162),
];

pub fn all_addresses() -> Vec<Address> {
    STRIP.iter().chain(EAST_SIDE).chain(HENDERSON).copied().collect()
}
