//! Route sequencing within one cluster.
//!
//! Nearest-neighbour construction followed by first-improvement local search
//! (2-opt reversal and single-stop relocation). Routes are open paths: they
//! start at the depot when one is given and do not return.
//!
//! Constraints, in order of precedence:
//! - a stop pinned `First` or `Last` holds that position;
//! - priority stops form the prefix of the remaining route, in the relative
//!   order the unconstrained optimization gives them;
//! - with a duration budget, the route is cut where the budget runs out and
//!   the rest of the stops are deferred.

use tracing::debug;

use crate::config::SequencerConfig;
use crate::model::{Coordinate, FixedPosition, Leg, Objective, ResolvedStop, RouteMetrics};
use crate::traits::CostEstimator;

/// Improvements smaller than this are treated as ties.
const EPSILON: f64 = 1e-9;

/// Per-route inputs besides the stops themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequencePlan {
    pub start: Option<Coordinate>,
    pub objective: Objective,
    /// Duration budget in hours.
    pub max_route_time: Option<f64>,
}

/// A sequenced route: visiting order, its legs, and the stops that did not fit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    pub stops: Vec<ResolvedStop>,
    /// `legs[i]` arrives at `stops[i]`.
    pub legs: Vec<Leg>,
    pub metrics: RouteMetrics,
    pub deferred: Vec<ResolvedStop>,
}

pub struct Sequencer<'e, E: ?Sized> {
    estimator: &'e E,
    config: SequencerConfig,
}

impl<'e, E: CostEstimator + ?Sized> Sequencer<'e, E> {
    pub fn new(estimator: &'e E, config: SequencerConfig) -> Self {
        Self { estimator, config }
    }

    pub fn sequence(&self, stops: Vec<ResolvedStop>, plan: &SequencePlan) -> Sequence {
        if stops.is_empty() {
            return Sequence::default();
        }

        let table = CostTable::build(self.estimator, &stops, plan);
        let order = self.order(&stops, &table);
        let (visited, cut) = truncate(&order, &table, plan.max_route_time);

        let mut legs = Vec::with_capacity(visited.len());
        let mut previous = table.start;
        for &node in visited {
            legs.push(previous.map_or(Leg::ZERO, |from| table.legs[from][node]));
            previous = Some(node);
        }
        let metrics = RouteMetrics::from_legs(&legs);

        let mut slots: Vec<Option<ResolvedStop>> = stops.into_iter().map(Some).collect();
        let mut take = |nodes: &[usize]| -> Vec<ResolvedStop> {
            nodes.iter().filter_map(|&node| slots[node].take()).collect()
        };
        let stops = take(visited);
        let deferred = take(cut);

        if !deferred.is_empty() {
            debug!(
                visited = stops.len(),
                deferred = deferred.len(),
                budget_hours = plan.max_route_time,
                "route truncated by duration budget"
            );
        }

        Sequence {
            stops,
            legs,
            metrics,
            deferred,
        }
    }

    fn order(&self, stops: &[ResolvedStop], table: &CostTable) -> Vec<usize> {
        let first = stops.iter().position(|s| s.position == Some(FixedPosition::First));
        let last = stops
            .iter()
            .position(|s| s.position == Some(FixedPosition::Last))
            .filter(|&i| Some(i) != first);
        let free: Vec<usize> = (0..stops.len())
            .filter(|&i| Some(i) != first && Some(i) != last)
            .collect();

        let anchor = first.or(table.start);
        let mut search = Search {
            stops,
            table,
            budget: self.budget(stops.len()),
        };

        let base = search.build(&free, anchor, last);

        let (priority, rest): (Vec<usize>, Vec<usize>) =
            base.iter().copied().partition(|&i| stops[i].priority);
        let middle = match priority.last() {
            Some(&tail) if !rest.is_empty() => {
                let mut middle = priority.clone();
                middle.extend(search.build(&rest, Some(tail), last));
                middle
            }
            _ => base,
        };

        first.into_iter().chain(middle).chain(last).collect()
    }

    fn budget(&self, n: usize) -> usize {
        n.saturating_mul(n).min(self.config.iteration_ceiling)
    }
}

/// Pairwise legs and objective weights. Stops occupy indices `0..n`; the
/// depot, when present, is index `n`.
struct CostTable {
    legs: Vec<Vec<Leg>>,
    weights: Vec<Vec<f64>>,
    start: Option<usize>,
}

impl CostTable {
    fn build<E: CostEstimator + ?Sized>(estimator: &E, stops: &[ResolvedStop], plan: &SequencePlan) -> Self {
        let mut points: Vec<Coordinate> = stops.iter().map(|stop| stop.coordinate).collect();
        let start = plan.start.map(|depot| {
            points.push(depot);
            points.len() - 1
        });

        let mut legs = estimator.matrix(&points);
        if legs.len() != points.len() || legs.iter().any(|row| row.len() != points.len()) {
            legs = points
                .iter()
                .map(|from| points.iter().map(|to| estimator.cost(*from, *to)).collect())
                .collect();
        }
        let weights = legs
            .iter()
            .map(|row| row.iter().map(|leg| plan.objective.weight(leg)).collect())
            .collect();

        Self { legs, weights, start }
    }

    fn weight(&self, from: Option<usize>, to: Option<usize>) -> f64 {
        match (from, to) {
            (Some(from), Some(to)) => self.weights[from][to],
            _ => 0.0,
        }
    }

    /// Cost of `anchor -> path... -> tail`.
    fn path_cost(&self, path: &[usize], anchor: Option<usize>, tail: Option<usize>) -> f64 {
        let Some((&head, _)) = path.split_first() else {
            return self.weight(anchor, tail);
        };
        let inner: f64 = path.windows(2).map(|pair| self.weights[pair[0]][pair[1]]).sum();
        let end = path[path.len() - 1];
        self.weight(anchor, Some(head)) + inner + self.weight(Some(end), tail)
    }
}

struct Search<'a> {
    stops: &'a [ResolvedStop],
    table: &'a CostTable,
    /// Improvement moves still allowed for this route.
    budget: usize,
}

impl Search<'_> {
    /// Orders `nodes` between an optional fixed predecessor and successor.
    fn build(&mut self, nodes: &[usize], anchor: Option<usize>, tail: Option<usize>) -> Vec<usize> {
        if nodes.len() <= 1 {
            return nodes.to_vec();
        }

        let mut path = match anchor {
            Some(_) => self.nearest_neighbour(nodes, anchor, None),
            // no fixed start: try every stop as the first one
            None => nodes
                .iter()
                .map(|&first| self.nearest_neighbour(nodes, None, Some(first)))
                .map(|path| (self.table.path_cost(&path, None, tail), path))
                .reduce(|best, candidate| {
                    if self.prefer(&candidate, &best) {
                        candidate
                    } else {
                        best
                    }
                })
                .map(|(_, path)| path)
                .unwrap_or_default(),
        };

        self.improve(&mut path, anchor, tail);

        if anchor.is_none() && tail.is_none() {
            let reversed: Vec<usize> = path.iter().rev().copied().collect();
            let forward = (self.table.path_cost(&path, None, None), path);
            let backward = (self.table.path_cost(&reversed, None, None), reversed);
            path = if self.prefer(&backward, &forward) {
                backward.1
            } else {
                forward.1
            };
        }

        path
    }

    /// Lower cost wins; equal costs go to the smaller first stop identifier.
    fn prefer(&self, candidate: &(f64, Vec<usize>), incumbent: &(f64, Vec<usize>)) -> bool {
        if candidate.0 < incumbent.0 - EPSILON {
            return true;
        }
        if candidate.0 > incumbent.0 + EPSILON {
            return false;
        }
        match (candidate.1.first(), incumbent.1.first()) {
            (Some(&a), Some(&b)) => self.stops[a].id < self.stops[b].id,
            _ => false,
        }
    }

    fn nearest_neighbour(&self, nodes: &[usize], anchor: Option<usize>, first: Option<usize>) -> Vec<usize> {
        let mut remaining: Vec<usize> = nodes.to_vec();
        let mut path = Vec::with_capacity(nodes.len());
        let mut current = anchor;

        if let Some(first) = first {
            remaining.retain(|&node| node != first);
            path.push(first);
            current = Some(first);
        }

        while !remaining.is_empty() {
            let mut best = 0;
            for candidate in 1..remaining.len() {
                let a = self.table.weight(current, Some(remaining[candidate]));
                let b = self.table.weight(current, Some(remaining[best]));
                let closer = a < b - EPSILON
                    || (a <= b + EPSILON && self.stops[remaining[candidate]].id < self.stops[remaining[best]].id);
                if closer {
                    best = candidate;
                }
            }
            let next = remaining.swap_remove(best);
            path.push(next);
            current = Some(next);
        }

        path
    }

    /// First-improvement local search until no move helps or the budget runs out.
    fn improve(&mut self, path: &mut Vec<usize>, anchor: Option<usize>, tail: Option<usize>) {
        while self.budget > 0 {
            let improved = self.two_opt(path, anchor, tail) || self.relocate(path, anchor, tail);
            if !improved {
                break;
            }
            self.budget -= 1;
        }
    }

    /// Reverses the first segment whose reversal lowers the cost.
    fn two_opt(&self, path: &mut [usize], anchor: Option<usize>, tail: Option<usize>) -> bool {
        let n = path.len();
        let w = |from: Option<usize>, to: Option<usize>| self.table.weight(from, to);

        for i in 0..n.saturating_sub(1) {
            for j in i + 1..n {
                let before = if i == 0 { anchor } else { Some(path[i - 1]) };
                let after = if j == n - 1 { tail } else { Some(path[j + 1]) };

                let mut forward = 0.0;
                let mut backward = 0.0;
                for k in i..j {
                    forward += w(Some(path[k]), Some(path[k + 1]));
                    backward += w(Some(path[k + 1]), Some(path[k]));
                }

                let old = w(before, Some(path[i])) + forward + w(Some(path[j]), after);
                let new = w(before, Some(path[j])) + backward + w(Some(path[i]), after);

                if new < old - EPSILON {
                    path[i..=j].reverse();
                    return true;
                }
            }
        }

        false
    }

    /// Moves the first single stop whose relocation lowers the cost.
    fn relocate(&self, path: &mut Vec<usize>, anchor: Option<usize>, tail: Option<usize>) -> bool {
        let n = path.len();
        if n < 3 {
            return false;
        }
        let current = self.table.path_cost(path, anchor, tail);
        let mut candidate = Vec::with_capacity(n);

        for from in 0..n {
            for to in 0..n {
                if to == from || to + 1 == from {
                    // no-op or plain adjacent swap (covered by 2-opt)
                    continue;
                }
                candidate.clear();
                candidate.extend_from_slice(path);
                let node = candidate.remove(from);
                candidate.insert(to, node);

                if self.table.path_cost(&candidate, anchor, tail) < current - EPSILON {
                    path.copy_from_slice(&candidate);
                    return true;
                }
            }
        }

        false
    }
}

/// Splits `order` where the cumulative duration first exceeds the budget.
fn truncate<'o>(order: &'o [usize], table: &CostTable, budget: Option<f64>) -> (&'o [usize], &'o [usize]) {
    let Some(budget) = budget else {
        return (order, &[]);
    };

    let mut elapsed = 0.0;
    let mut previous = table.start;
    for (position, &node) in order.iter().enumerate() {
        elapsed += previous.map_or(0.0, |from| table.legs[from][node].duration);
        if elapsed > budget + EPSILON {
            return order.split_at(position);
        }
        previous = Some(node);
    }

    (order, &[])
}
