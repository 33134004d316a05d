//! End-to-end optimizer tests
//!
//! Ordering, priority, pinning, duration budgets and failure reporting,
//! driven through the public `RouteOptimizer` API with in-memory backends.

use std::time::Duration;

use route_optimizer::config::OptimizerConfig;
use route_optimizer::geocoder::TableGeocoder;
use route_optimizer::model::Leg;
use route_optimizer::{
    CancelToken, Coordinate, CostEstimator, FixedPosition, GeocodeFailure, Geocoder, Objective,
    OptimizationResult, OptimizeError, OptimizeOptions, RouteOptimizer, Stop, StopId,
};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Flat-plane estimator: one coordinate unit costs one of everything.
struct Planar;

impl CostEstimator for Planar {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        let d = ((from.lat - to.lat).powi(2) + (from.lng - to.lng).powi(2)).sqrt();
        Leg {
            distance: d,
            duration: d,
            emissions: d,
        }
    }
}

/// Builder for test stops placed on the plane.
#[derive(Clone, Debug)]
struct TestStop {
    id: &'static str,
    at: (f64, f64),
    priority: bool,
    position: Option<FixedPosition>,
}

impl TestStop {
    fn new(id: &'static str, lat: f64, lng: f64) -> Self {
        Self {
            id,
            at: (lat, lng),
            priority: false,
            position: None,
        }
    }

    fn priority(mut self) -> Self {
        self.priority = true;
        self
    }

    fn pinned(mut self, position: FixedPosition) -> Self {
        self.position = Some(position);
        self
    }

    fn address(&self) -> String {
        format!("{} street", self.id)
    }

    fn build(&self) -> Stop {
        let mut stop = Stop::new(self.id, self.address());
        stop.priority = self.priority;
        stop.position = self.position;
        stop
    }
}

fn planar_optimizer(stops: &[TestStop]) -> RouteOptimizer<TableGeocoder, Planar> {
    let table = stops
        .iter()
        .map(|s| (s.address(), Coordinate::new(s.at.0, s.at.1)))
        .collect();
    RouteOptimizer::new(table, Planar, OptimizerConfig::default())
}

fn run(stops: &[TestStop], options: &OptimizeOptions) -> Result<OptimizationResult, OptimizeError> {
    planar_optimizer(stops).optimize(stops.iter().map(TestStop::build).collect(), options)
}

fn order(result: &OptimizationResult) -> Vec<String> {
    result.visited().map(|s| s.id.to_string()).collect()
}

fn line_of(n: usize) -> Vec<TestStop> {
    const IDS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];
    (0..n).map(|i| TestStop::new(IDS[i], 0.0, i as f64)).collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn collinear_stops_visit_in_line() {
    let result = run(&line_of(3), &OptimizeOptions::default()).unwrap();

    let order = order(&result);
    assert!(
        order == ["A", "B", "C"] || order == ["C", "B", "A"],
        "unexpected order {:?}",
        order
    );
    assert!((result.metrics.total_distance - 2.0).abs() < 1e-9);
    assert_eq!(result.routes.len(), 1);
    assert!(result.unresolved.is_empty());
}

#[test]
fn shuffled_input_still_walks_the_line() {
    let mut stops = line_of(6);
    stops.swap(0, 4);
    stops.swap(1, 5);
    let result = run(&stops, &OptimizeOptions::default()).unwrap();
    assert!((result.metrics.total_distance - 5.0).abs() < 1e-9);
}

#[test]
fn reported_distance_matches_leg_costs() {
    let stops = vec![
        TestStop::new("A", 0.0, 0.0),
        TestStop::new("B", 3.0, 4.0),
        TestStop::new("C", 1.0, 7.0),
        TestStop::new("D", -2.0, 2.0),
    ];
    let result = run(&stops, &OptimizeOptions::default()).unwrap();

    let route = &result.routes[0];
    let walked: f64 = route
        .stops
        .windows(2)
        .map(|pair| Planar.cost(pair[0].coordinate, pair[1].coordinate).distance)
        .sum();
    assert!((route.metrics.total_distance - walked).abs() < 1e-9);
    assert_eq!(route.legs.len(), route.stops.len());
}

#[test]
fn depot_leg_counts_toward_totals() {
    let options = OptimizeOptions {
        start: Some(Coordinate::new(0.0, -1.0)),
        ..OptimizeOptions::default()
    };
    let result = run(&line_of(3), &options).unwrap();
    assert_eq!(order(&result), vec!["A", "B", "C"]);
    assert!((result.metrics.total_distance - 3.0).abs() < 1e-9);
}

#[test]
fn repeated_runs_agree() {
    let stops = vec![
        TestStop::new("A", 0.0, 0.0),
        TestStop::new("B", 1.0, 1.0),
        TestStop::new("C", 1.0, -1.0),
        TestStop::new("D", -1.0, 1.0),
        TestStop::new("E", -1.0, -1.0),
    ];
    let first = run(&stops, &OptimizeOptions::default()).unwrap();
    let second = run(&stops, &OptimizeOptions::default()).unwrap();
    assert_eq!(order(&first), order(&second));
    assert_eq!(first, second);
}

// ============================================================================
// Priority and pinning
// ============================================================================

#[test]
fn priority_stop_moves_forward() {
    let plain = line_of(5);
    let baseline = order(&run(&plain, &OptimizeOptions::default()).unwrap());
    let baseline_pos = baseline.iter().position(|id| id == "D").unwrap();

    let mut flagged = line_of(5);
    flagged[3] = flagged[3].clone().priority();
    let result = run(&flagged, &OptimizeOptions::default()).unwrap();
    let pos = order(&result).iter().position(|id| id == "D").unwrap();

    assert_eq!(pos, 0);
    assert!(pos <= baseline_pos);
    assert_eq!(result.visited().count(), 5);
}

#[test]
fn priority_from_options_matches_flag() {
    let options = OptimizeOptions {
        priority_stops: vec![StopId::from("C")],
        ..OptimizeOptions::default()
    };
    let by_option = run(&line_of(5), &options).unwrap();

    let mut flagged = line_of(5);
    flagged[2] = flagged[2].clone().priority();
    let by_flag = run(&flagged, &OptimizeOptions::default()).unwrap();

    assert_eq!(order(&by_option), order(&by_flag));
    assert_eq!(order(&by_option)[0], "C");
}

#[test]
fn pinned_stops_hold_their_ends() {
    let mut stops = line_of(5);
    stops[2] = stops[2].clone().pinned(FixedPosition::First);
    stops[0] = stops[0].clone().pinned(FixedPosition::Last);
    let result = run(&stops, &OptimizeOptions::default()).unwrap();

    let order = order(&result);
    assert_eq!(order.first().map(String::as_str), Some("C"));
    assert_eq!(order.last().map(String::as_str), Some("A"));
    assert_eq!(order.len(), 5);
}

#[test]
fn two_first_pins_are_rejected() {
    let mut stops = line_of(3);
    stops[0] = stops[0].clone().pinned(FixedPosition::First);
    stops[1] = stops[1].clone().pinned(FixedPosition::First);
    assert!(matches!(
        run(&stops, &OptimizeOptions::default()),
        Err(OptimizeError::Validation(_))
    ));
}

// ============================================================================
// Duration budget
// ============================================================================

#[test]
fn budget_defers_the_tail() {
    let options = OptimizeOptions {
        max_route_time: Some(2.5),
        ..OptimizeOptions::default()
    };
    let result = run(&line_of(6), &options).unwrap();

    let route = &result.routes[0];
    assert!(route.metrics.total_time <= 2.5 + 1e-9);
    assert_eq!(route.stops.len(), 3);
    assert_eq!(route.deferred.len(), 3);
    assert_eq!(result.visited().count() + result.deferred().count(), 6);
}

#[test]
fn generous_budget_defers_nothing() {
    let options = OptimizeOptions {
        max_route_time: Some(100.0),
        ..OptimizeOptions::default()
    };
    let result = run(&line_of(6), &options).unwrap();
    assert_eq!(result.deferred().count(), 0);
}

// ============================================================================
// Objectives
// ============================================================================

#[test]
fn every_objective_visits_every_stop() {
    for objective in [Objective::ShortestDistance, Objective::FastestTime, Objective::LowestEmissions] {
        let options = OptimizeOptions {
            objective,
            ..OptimizeOptions::default()
        };
        let result = run(&line_of(4), &options).unwrap();
        assert_eq!(result.visited().count(), 4, "{:?}", objective);
        assert!((result.metrics.total_distance - 3.0).abs() < 1e-9, "{:?}", objective);
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn empty_input_is_rejected() {
    let result = run(&[], &OptimizeOptions::default());
    assert!(matches!(result, Err(OptimizeError::Validation(_))));
}

#[test]
fn unresolvable_stops_are_reported_not_fatal() {
    let known = line_of(2);
    let optimizer = planar_optimizer(&known);
    let mut stops: Vec<Stop> = known.iter().map(TestStop::build).collect();
    stops.push(Stop::new("X", "nowhere at all"));

    let result = optimizer.optimize(stops, &OptimizeOptions::default()).unwrap();
    assert_eq!(result.visited().count(), 2);
    assert_eq!(result.unresolved.len(), 1);
    assert_eq!(result.unresolved[0].address, "nowhere at all");
    assert_eq!(result.unresolved[0].reason, GeocodeFailure::NotFound);
}

#[test]
fn nothing_resolvable_lists_every_address() {
    struct Offline;
    impl Geocoder for Offline {
        fn resolve(&self, _address: &str, _timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
            Err(GeocodeFailure::Timeout)
        }
    }

    let optimizer = RouteOptimizer::new(Offline, Planar, OptimizerConfig::default());
    let stops = vec![Stop::new("1", "a"), Stop::new("2", "b"), Stop::new("3", "c")];
    match optimizer.optimize(stops, &OptimizeOptions::default()) {
        Err(OptimizeError::NoResolvableStops { unresolved }) => {
            assert_eq!(unresolved, vec!["a", "b", "c"]);
        }
        other => panic!("expected NoResolvableStops, got {:?}", other),
    }
}

#[test]
fn cancelled_before_start() {
    let stops = line_of(3);
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = planar_optimizer(&stops).optimize_with_cancel(
        stops.iter().map(TestStop::build).collect(),
        &OptimizeOptions::default(),
        &cancel,
    );
    assert_eq!(result, Err(OptimizeError::Cancelled));
}

/// Planar costs, but pulls the plug the first time it is asked for one.
struct CancellingEstimator(CancelToken);

impl CostEstimator for CancellingEstimator {
    fn cost(&self, from: Coordinate, to: Coordinate) -> Leg {
        self.0.cancel();
        Planar.cost(from, to)
    }
}

#[test]
fn cancelled_while_sequencing() {
    let stops = line_of(4);
    let cancel = CancelToken::new();
    let table: TableGeocoder = stops
        .iter()
        .map(|s| (s.address(), Coordinate::new(s.at.0, s.at.1)))
        .collect();
    let optimizer = RouteOptimizer::new(
        table,
        CancellingEstimator(cancel.clone()),
        OptimizerConfig::default(),
    );

    let result = optimizer.optimize_with_cancel(
        stops.iter().map(TestStop::build).collect(),
        &OptimizeOptions::default(),
        &cancel,
    );
    assert_eq!(result, Err(OptimizeError::Cancelled));
    assert!(cancel.is_cancelled());
}

#[test]
fn cancelled_while_geocoding() {
    struct CancellingGeocoder(CancelToken);
    impl Geocoder for CancellingGeocoder {
        fn resolve(&self, _address: &str, _timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
            self.0.cancel();
            Ok(Coordinate::new(0.0, 0.0))
        }
    }

    let cancel = CancelToken::new();
    let optimizer = RouteOptimizer::new(
        CancellingGeocoder(cancel.clone()),
        Planar,
        OptimizerConfig::default(),
    );
    let stops = vec![Stop::new("1", "a"), Stop::new("2", "b"), Stop::new("3", "c")];
    let result = optimizer.optimize_with_cancel(stops, &OptimizeOptions::default(), &cancel);
    assert_eq!(result, Err(OptimizeError::Cancelled));
}
