//! Seeded synthetic graph generators
//!
//! Both generators emit simple undirected graphs with unit node weights and
//! a constant edge weight, so their output is valid edge-list input.

use crate::error::{DensityError, DensityResult};
use crate::storage::CsrGraph;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

/// Above this fraction of all pairs the full pair list is shuffled instead
/// of sampling by rejection
const DENSE_FRACTION: f64 = 0.4;

const MIN_CLUSTER_SIZE: usize = 3;
const MAX_CLUSTER_SIZE: usize = 8;

/// Planted dense-cluster generator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantedConfig {
    /// Number of nodes
    pub nodes: usize,
    /// Number of edges
    pub edges: usize,
    /// Cluster count; `None` selects `max(1, n / 6)`
    pub clusters: Option<usize>,
    /// Fraction of intra-cluster pairs turned into edges
    pub cluster_density: f64,
    /// Weight of every edge
    pub edge_weight: f64,
    /// RNG seed
    pub seed: u64,
}

impl PlantedConfig {
    /// Defaults for `nodes` and `edges`: density 0.8, unit weights, seed 0
    #[must_use]
    pub const fn new(nodes: usize, edges: usize) -> Self {
        Self {
            nodes,
            edges,
            clusters: None,
            cluster_density: 0.8,
            edge_weight: 1.0,
            seed: 0,
        }
    }

    /// Set the cluster count
    #[must_use]
    pub const fn with_clusters(mut self, clusters: usize) -> Self {
        self.clusters = Some(clusters);
        self
    }

    /// Set the intra-cluster density
    #[must_use]
    pub const fn with_cluster_density(mut self, density: f64) -> Self {
        self.cluster_density = density;
        self
    }

    /// Set the constant edge weight
    #[must_use]
    pub const fn with_edge_weight(mut self, edge_weight: f64) -> Self {
        self.edge_weight = edge_weight;
        self
    }

    /// Set the RNG seed
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Graph with `m` distinct edges sampled uniformly from all pairs
///
/// # Errors
///
/// Returns [`DensityError::MalformedInput`] if `m > n (n - 1) / 2` or the
/// edge weight is not positive.
///
/// # Example
///
/// ```
/// use trueno_densest::generator::uniform_random;
///
/// let graph = uniform_random(10, 20, 1.0, 7).unwrap();
/// assert_eq!(graph.num_edges(), 20);
/// ```
pub fn uniform_random(
    nodes: usize,
    edges: usize,
    edge_weight: f64,
    seed: u64,
) -> DensityResult<CsrGraph> {
    validate(nodes, edges, edge_weight)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pairs = BTreeSet::new();
    fill_random(&mut rng, nodes, edges, &mut pairs);
    into_graph(nodes, &pairs, edge_weight)
}

/// Graph with planted dense clusters topped up with uniform random edges
///
/// Clusters are disjoint groups of 3 to 8 shuffled nodes (all nodes when
/// `n < 6`). Each is filled to `cluster_density` of its pairs until the edge
/// budget is reached.
///
/// # Errors
///
/// Returns [`DensityError::MalformedInput`] if `m > n (n - 1) / 2`, the edge
/// weight is not positive or the cluster density is outside `[0, 1]`.
pub fn planted_clusters(config: &PlantedConfig) -> DensityResult<CsrGraph> {
    let PlantedConfig {
        nodes: n,
        edges: m,
        ..
    } = *config;
    validate(n, m, config.edge_weight)?;
    if !(0.0..=1.0).contains(&config.cluster_density) {
        return Err(DensityError::MalformedInput(format!(
            "cluster density {} outside [0, 1]",
            config.cluster_density
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut pairs = BTreeSet::new();
    let cluster_count = config.clusters.unwrap_or(n / 6).max(1);

    'clusters: for cluster in pick_clusters(&mut rng, n, cluster_count) {
        let mut cluster_pairs = Vec::new();
        for (i, &u) in cluster.iter().enumerate() {
            for &v in &cluster[i + 1..] {
                cluster_pairs.push((u.min(v), u.max(v)));
            }
        }
        cluster_pairs.shuffle(&mut rng);
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let target = (config.cluster_density * cluster_pairs.len() as f64).round() as usize;
        for pair in cluster_pairs.into_iter().take(target) {
            if pairs.len() >= m {
                break 'clusters;
            }
            pairs.insert(pair);
        }
    }

    fill_random(&mut rng, n, m, &mut pairs);
    into_graph(n, &pairs, config.edge_weight)
}

fn pick_clusters(rng: &mut StdRng, n: usize, count: usize) -> Vec<Vec<u32>> {
    #[allow(clippy::cast_possible_truncation)] // checked by validate
    let mut remaining: Vec<u32> = (0..n).map(|node| node as u32).collect();
    remaining.shuffle(rng);

    let mut clusters = Vec::new();
    for _ in 0..count {
        if remaining.is_empty() {
            break;
        }
        let size = if n >= 6 && remaining.len() >= MIN_CLUSTER_SIZE {
            rng.gen_range(MIN_CLUSTER_SIZE..=MAX_CLUSTER_SIZE.min(remaining.len()))
        } else {
            remaining.len()
        };
        let cluster = remaining.split_off(remaining.len() - size);
        clusters.push(cluster);
    }
    clusters
}

fn fill_random(rng: &mut StdRng, n: usize, m: usize, pairs: &mut BTreeSet<(u32, u32)>) {
    if pairs.len() >= m {
        return;
    }
    let total = max_edges(n);
    #[allow(clippy::cast_precision_loss)]
    let dense = m as f64 > DENSE_FRACTION * total as f64;
    #[allow(clippy::cast_possible_truncation)] // checked by validate
    let n32 = n as u32;

    if dense {
        let mut missing: Vec<(u32, u32)> = (0..n32)
            .flat_map(|u| (u + 1..n32).map(move |v| (u, v)))
            .filter(|pair| !pairs.contains(pair))
            .collect();
        missing.shuffle(rng);
        let needed = m - pairs.len();
        pairs.extend(missing.into_iter().take(needed));
    } else {
        while pairs.len() < m {
            let u = rng.gen_range(0..n32);
            let v = rng.gen_range(0..n32);
            if u != v {
                pairs.insert((u.min(v), u.max(v)));
            }
        }
    }
}

fn into_graph(n: usize, pairs: &BTreeSet<(u32, u32)>, edge_weight: f64) -> DensityResult<CsrGraph> {
    let edges: Vec<(u32, u32, f64)> = pairs.iter().map(|&(u, v)| (u, v, edge_weight)).collect();
    CsrGraph::load(n, edges.len(), vec![1.0; n], &edges)
}

fn max_edges(n: usize) -> usize {
    n.saturating_mul(n.saturating_sub(1)) / 2
}

fn validate(n: usize, m: usize, edge_weight: f64) -> DensityResult<()> {
    if u32::try_from(n).is_err() {
        return Err(DensityError::MalformedInput(format!("{n} nodes exceed the u32 id space")));
    }
    let total = max_edges(n);
    if m > total {
        return Err(DensityError::MalformedInput(format!(
            "{m} edges requested but a simple graph on {n} nodes has at most {total}"
        )));
    }
    if !edge_weight.is_finite() || edge_weight <= 0.0 {
        return Err(DensityError::MalformedInput(format!(
            "edge weight must be positive and finite, got {edge_weight}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_exact_edge_count() {
        for (n, m) in [(10, 5), (10, 40), (10, 45), (1, 0), (0, 0)] {
            let graph = uniform_random(n, m, 2.0, 3).unwrap();
            assert_eq!(graph.num_nodes(), n);
            assert_eq!(graph.num_edges(), m);
            assert!(graph.edges().all(|(u, v, w)| u < v && w == 2.0));
        }
    }

    #[test]
    fn test_uniform_is_seeded() {
        let a = uniform_random(30, 60, 1.0, 11).unwrap();
        let b = uniform_random(30, 60, 1.0, 11).unwrap();
        let c = uniform_random(30, 60, 1.0, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rejects_impossible_requests() {
        assert!(uniform_random(4, 7, 1.0, 0).is_err());
        assert!(uniform_random(4, 2, 0.0, 0).is_err());
        assert!(planted_clusters(&PlantedConfig::new(5, 11)).is_err());
        assert!(planted_clusters(&PlantedConfig::new(5, 3).with_cluster_density(1.5)).is_err());
    }

    #[test]
    fn test_planted_small_graph_is_one_cluster() {
        let config = PlantedConfig::new(5, 8).with_cluster_density(1.0).with_seed(1);
        let graph = planted_clusters(&config).unwrap();
        assert_eq!(graph.num_edges(), 8);
        assert!(graph.has_unit_node_weights());
    }

    #[test]
    fn test_planted_graph_has_dense_core() {
        let config = PlantedConfig::new(60, 90).with_cluster_density(1.0).with_seed(5);
        let graph = planted_clusters(&config).unwrap();
        assert_eq!(graph.num_edges(), 90);
        // A fully connected planted cluster of at least 3 nodes gives density >= 1
        let exact = crate::algorithms::FlowExact::default().solve(&graph).unwrap();
        assert!(exact.best.density() >= 1.0 - exact.epsilon);
    }

    #[test]
    fn test_budget_smaller_than_clusters() {
        let config = PlantedConfig::new(24, 4).with_seed(9);
        let graph = planted_clusters(&config).unwrap();
        assert_eq!(graph.num_edges(), 4);
    }
}
