//! Density-based partitioning of stops into per-vehicle clusters.
//!
//! Stops are grouped DBSCAN-style: dense neighbourhoods grow into clusters and
//! sparse outliers become singleton clusters. The result is then merged or
//! split until the cluster count fits the requested bound.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClusterConfig;
use crate::haversine::haversine_miles;
use crate::model::{Cluster, Coordinate, ResolvedStop};

/// Lloyd iterations when splitting a cluster in two.
const SPLIT_ITERATIONS: usize = 10;

/// How many clusters the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ClusterCountRepr", into = "ClusterCountRepr")]
pub enum ClusterCount {
    /// Cluster only above the configured stop threshold, up to `max_clusters`.
    #[default]
    Auto,
    Fixed(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ClusterCountRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<ClusterCountRepr> for ClusterCount {
    type Error = String;

    fn try_from(repr: ClusterCountRepr) -> Result<Self, Self::Error> {
        match repr {
            ClusterCountRepr::Count(count) => Ok(ClusterCount::Fixed(count)),
            ClusterCountRepr::Keyword(keyword) if keyword.eq_ignore_ascii_case("auto") => {
                Ok(ClusterCount::Auto)
            }
            ClusterCountRepr::Keyword(keyword) => Err(format!(
                "cluster_count must be a number or \"auto\", got {:?}",
                keyword
            )),
        }
    }
}

impl From<ClusterCount> for ClusterCountRepr {
    fn from(count: ClusterCount) -> Self {
        match count {
            ClusterCount::Auto => ClusterCountRepr::Keyword("auto".to_string()),
            ClusterCount::Fixed(count) => ClusterCountRepr::Count(count),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    config: ClusterConfig,
}

impl Partitioner {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Cluster count bound for `n` stops: the requested count (or the auto
    /// limit), never above `max_clusters` or `ceil(n / min_cluster_size)`.
    pub fn cluster_bound(&self, n: usize, count: ClusterCount) -> usize {
        if !self.config.enabled || n <= 1 {
            return 1;
        }
        let limit = match count {
            ClusterCount::Fixed(k) => k.min(self.config.max_clusters),
            ClusterCount::Auto if n <= self.config.auto_threshold => 1,
            ClusterCount::Auto => self.config.max_clusters,
        };
        let min_size = self.config.min_cluster_size.max(1);
        limit.min(n.div_ceil(min_size)).min(n).max(1)
    }

    /// Splits `stops` into disjoint clusters covering every stop exactly once.
    pub fn partition(&self, stops: Vec<ResolvedStop>, count: ClusterCount) -> Vec<Cluster> {
        let bound = self.cluster_bound(stops.len(), count);
        if bound == 1 {
            return vec![single_cluster(stops)];
        }

        let points: Vec<Coordinate> = stops.iter().map(|stop| stop.coordinate).collect();
        let distances = distance_matrix(&points);
        let eps = self.eps(&distances);
        let min_points = self.config.min_cluster_size.max(1);

        let mut groups = density_groups(&points, &distances, eps, min_points);
        debug!(stops = stops.len(), eps_miles = eps, groups = groups.len(), bound, "density grouping");

        while groups.len() > bound {
            merge_smallest(&mut groups, &points);
        }
        if let ClusterCount::Fixed(_) = count {
            while groups.len() < bound {
                if !split_widest(&mut groups, &points, &distances) {
                    break;
                }
            }
        }
        groups.sort_by_key(|group| group.iter().copied().min().unwrap_or(usize::MAX));

        let mut slots: Vec<Option<ResolvedStop>> = stops.into_iter().map(Some).collect();
        groups
            .into_iter()
            .enumerate()
            .map(|(id, mut members)| {
                members.sort_unstable();
                let stops: Vec<ResolvedStop> =
                    members.iter().filter_map(|&i| slots[i].take()).collect();
                let centroid = centroid_of(&stops);
                Cluster { id, stops, centroid }
            })
            .collect()
    }

    fn eps(&self, distances: &[Vec<f64>]) -> f64 {
        if let Some(eps) = self.config.eps_miles {
            return eps;
        }
        let mut nearest: Vec<f64> = distances
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, d)| *d)
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        nearest.sort_by(f64::total_cmp);
        let median = nearest[nearest.len() / 2];
        (median * self.config.eps_scale).max(1e-6)
    }
}

fn single_cluster(stops: Vec<ResolvedStop>) -> Cluster {
    let centroid = centroid_of(&stops);
    Cluster {
        id: 0,
        stops,
        centroid,
    }
}

fn centroid_of(stops: &[ResolvedStop]) -> Coordinate {
    Coordinate::centroid(stops.iter().map(|stop| &stop.coordinate)).unwrap_or(Coordinate::new(0.0, 0.0))
}

fn group_centroid(group: &[usize], points: &[Coordinate]) -> Coordinate {
    Coordinate::centroid(group.iter().map(|&i| &points[i])).unwrap_or(Coordinate::new(0.0, 0.0))
}

fn distance_matrix(points: &[Coordinate]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = haversine_miles(points[i], points[j]);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}

/// Core points connected through `eps` neighbourhoods form clusters. Border
/// points join the reachable cluster whose running centroid is nearest.
/// Noise points become singletons.
fn density_groups(
    points: &[Coordinate],
    distances: &[Vec<f64>],
    eps: f64,
    min_points: usize,
) -> Vec<Vec<usize>> {
    let n = points.len();
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| distances[i][j] <= eps).collect())
        .collect();
    let is_core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_points).collect();

    let mut label: Vec<Option<usize>> = vec![None; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for seed in 0..n {
        if !is_core[seed] || label[seed].is_some() {
            continue;
        }
        let id = groups.len();
        let mut members = Vec::new();
        let mut queue = VecDeque::from([seed]);
        label[seed] = Some(id);
        while let Some(current) = queue.pop_front() {
            members.push(current);
            for &next in &neighbours[current] {
                if is_core[next] && label[next].is_none() {
                    label[next] = Some(id);
                    queue.push_back(next);
                }
            }
        }
        groups.push(members);
    }

    let mut centroids: Vec<Coordinate> = groups.iter().map(|g| group_centroid(g, points)).collect();
    for point in 0..n {
        if label[point].is_some() {
            continue;
        }
        let nearest = neighbours[point]
            .iter()
            .filter(|&&j| is_core[j])
            .filter_map(|&j| label[j])
            .map(|id| (id, haversine_miles(points[point], centroids[id])))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        match nearest {
            Some((id, _)) => {
                label[point] = Some(id);
                groups[id].push(point);
                centroids[id] = group_centroid(&groups[id], points);
            }
            None => {
                label[point] = Some(groups.len());
                groups.push(vec![point]);
                centroids.push(points[point]);
            }
        }
    }

    groups
}

/// Folds the smallest group into the group with the nearest centroid.
fn merge_smallest(groups: &mut Vec<Vec<usize>>, points: &[Coordinate]) {
    let Some(smallest) = (0..groups.len())
        .min_by_key(|&i| (groups[i].len(), std::cmp::Reverse(first_member(&groups[i]))))
    else {
        return;
    };
    let source = group_centroid(&groups[smallest], points);
    let target = (0..groups.len())
        .filter(|&i| i != smallest)
        .map(|i| (i, haversine_miles(source, group_centroid(&groups[i], points))))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(first_member(&groups[a.0]).cmp(&first_member(&groups[b.0]))))
        .map(|(i, _)| i);

    if let Some(target) = target {
        let moved = groups.swap_remove(smallest);
        // swap_remove moved the last group into `smallest`
        let target = if target == groups.len() { smallest } else { target };
        groups[target].extend(moved);
    }
}

fn first_member(group: &[usize]) -> usize {
    group.iter().copied().min().unwrap_or(usize::MAX)
}

/// Splits the group with the largest diameter by farthest-pair 2-means.
/// Returns false when no group can be split.
fn split_widest(groups: &mut Vec<Vec<usize>>, points: &[Coordinate], distances: &[Vec<f64>]) -> bool {
    let widest = groups
        .iter()
        .enumerate()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(i, group)| (i, farthest_pair(group, distances)))
        .max_by(|a, b| a.1.2.total_cmp(&b.1.2).then(b.0.cmp(&a.0)));

    let Some((index, (seed_a, seed_b, diameter))) = widest else {
        return false;
    };

    let mut members = std::mem::take(&mut groups[index]);
    members.sort_unstable();

    let (left, right) = if diameter <= 0.0 {
        // identical points: any split is as coherent as another
        let right = members.split_off(members.len() / 2);
        (members, right)
    } else {
        two_means(&members, points, points[seed_a], points[seed_b])
    };

    groups[index] = left;
    groups.push(right);
    true
}

fn farthest_pair(group: &[usize], distances: &[Vec<f64>]) -> (usize, usize, f64) {
    let mut best = (group[0], group[0], 0.0);
    for (k, &a) in group.iter().enumerate() {
        for &b in &group[k + 1..] {
            if distances[a][b] > best.2 {
                best = (a, b, distances[a][b]);
            }
        }
    }
    best
}

fn two_means(
    members: &[usize],
    points: &[Coordinate],
    mut center_a: Coordinate,
    mut center_b: Coordinate,
) -> (Vec<usize>, Vec<usize>) {
    let assign = |a: Coordinate, b: Coordinate| -> (Vec<usize>, Vec<usize>) {
        members
            .iter()
            .copied()
            .partition(|&i| haversine_miles(points[i], a) <= haversine_miles(points[i], b))
    };

    let (mut left, mut right) = assign(center_a, center_b);
    for _ in 0..SPLIT_ITERATIONS {
        if left.is_empty() || right.is_empty() {
            break;
        }
        center_a = group_centroid(&left, points);
        center_b = group_centroid(&right, points);
        let (next_left, next_right) = assign(center_a, center_b);
        if next_left == left {
            break;
        }
        left = next_left;
        right = next_right;
    }

    if left.is_empty() || right.is_empty() {
        let mut all = members.to_vec();
        let right = all.split_off(all.len() / 2);
        return (all, right);
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Stop, StopId};

    fn stop(i: usize, lat: f64, lng: f64) -> ResolvedStop {
        ResolvedStop::new(
            Stop::new(format!("s{:02}", i), format!("addr {}", i)),
            Coordinate::new(lat, lng),
            i,
        )
    }

    /// Three tight groups of four stops, ~10 miles apart.
    fn three_neighbourhoods() -> Vec<ResolvedStop> {
        let centres = [(36.10, -115.17), (36.25, -115.17), (36.10, -114.98)];
        let offsets = [(0.0, 0.0), (0.004, 0.0), (0.0, 0.004), (0.004, 0.004)];
        let mut stops = Vec::new();
        for (c, (lat, lng)) in centres.iter().enumerate() {
            for (o, (dlat, dlng)) in offsets.iter().enumerate() {
                stops.push(stop(c * 4 + o, lat + dlat, lng + dlng));
            }
        }
        stops
    }

    fn ids(cluster: &Cluster) -> Vec<usize> {
        cluster.stops.iter().map(|s| s.input_index).collect()
    }

    #[test]
    fn small_runs_stay_whole_in_auto_mode() {
        let stops: Vec<_> = three_neighbourhoods().into_iter().take(8).collect();
        let clusters = Partitioner::default().partition(stops, ClusterCount::Auto);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].stops.len(), 8);
    }

    #[test]
    fn auto_mode_finds_neighbourhoods() {
        let clusters = Partitioner::default().partition(three_neighbourhoods(), ClusterCount::Auto);
        assert_eq!(clusters.len(), 3);
        assert_eq!(ids(&clusters[0]), vec![0, 1, 2, 3]);
        assert_eq!(ids(&clusters[1]), vec![4, 5, 6, 7]);
        assert_eq!(ids(&clusters[2]), vec![8, 9, 10, 11]);
        for (i, cluster) in clusters.iter().enumerate() {
            assert_eq!(cluster.id, i);
        }
    }

    #[test]
    fn explicit_count_merges_nearest_groups() {
        let clusters = Partitioner::default().partition(three_neighbourhoods(), ClusterCount::Fixed(2));
        assert_eq!(clusters.len(), 2);
        let total: usize = clusters.iter().map(|c| c.stops.len()).sum();
        assert_eq!(total, 12);
        // every neighbourhood stays intact
        for cluster in &clusters {
            assert_eq!(cluster.stops.len() % 4, 0);
        }
    }

    #[test]
    fn explicit_count_splits_dense_blob() {
        let stops: Vec<_> = (0..10).map(|i| stop(i, 36.1, -115.17 + i as f64 * 0.001)).collect();
        let clusters = Partitioner::default().partition(stops, ClusterCount::Fixed(2));
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec![0, 1, 2, 3, 4]);
        assert_eq!(ids(&clusters[1]), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn outliers_become_singletons_before_bounding() {
        let mut stops: Vec<_> = (0..4).map(|i| stop(i, 36.1, -115.17 + i as f64 * 0.001)).collect();
        stops.push(stop(4, 37.5, -113.0));
        let partitioner = Partitioner::new(ClusterConfig {
            auto_threshold: 2,
            ..ClusterConfig::default()
        });
        let clusters = partitioner.partition(stops, ClusterCount::Auto);
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[1]), vec![4]);
    }

    #[test]
    fn bound_respects_min_cluster_size() {
        let partitioner = Partitioner::default();
        assert_eq!(partitioner.cluster_bound(5, ClusterCount::Fixed(10)), 3);
        assert_eq!(partitioner.cluster_bound(12, ClusterCount::Auto), 3);
        assert_eq!(partitioner.cluster_bound(1, ClusterCount::Fixed(4)), 1);

        let disabled = Partitioner::new(ClusterConfig {
            enabled: false,
            ..ClusterConfig::default()
        });
        assert_eq!(disabled.cluster_bound(50, ClusterCount::Fixed(4)), 1);
    }

    #[test]
    fn explicit_count_capped_by_max_clusters() {
        let partitioner = Partitioner::default();
        assert_eq!(partitioner.cluster_bound(20, ClusterCount::Fixed(6)), 3);

        let wider = Partitioner::new(ClusterConfig {
            max_clusters: 6,
            ..ClusterConfig::default()
        });
        assert_eq!(wider.cluster_bound(20, ClusterCount::Fixed(6)), 6);
    }

    #[test]
    fn coincident_points_split_evenly() {
        let stops: Vec<_> = (0..4).map(|i| stop(i, 36.1, -115.17)).collect();
        let clusters = Partitioner::default().partition(stops, ClusterCount::Fixed(2));
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].stops.len(), 2);
        assert_eq!(clusters[1].stops.len(), 2);
    }

    #[test]
    fn centroid_is_mean_of_members() {
        let stops = vec![stop(0, 0.0, 0.0), stop(1, 2.0, 2.0)];
        let clusters = Partitioner::default().partition(stops, ClusterCount::Auto);
        assert_eq!(clusters[0].centroid, Coordinate::new(1.0, 1.0));
        assert_eq!(clusters[0].stops[0].id, StopId::from("s00"));
    }

    #[test]
    fn cluster_count_wire_format() {
        let auto: ClusterCount = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, ClusterCount::Auto);
        let fixed: ClusterCount = serde_json::from_str("3").unwrap();
        assert_eq!(fixed, ClusterCount::Fixed(3));
        assert!(serde_json::from_str::<ClusterCount>("\"many\"").is_err());
        assert_eq!(serde_json::to_string(&ClusterCount::Fixed(2)).unwrap(), "2");
    }
}
