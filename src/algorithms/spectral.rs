//! Spectral seeding via truncated SVD
//!
//! Computes the leading singular triplets of the weighted adjacency matrix
//! (or of the biadjacency block when the graph is read as bipartite) with
//! block subspace iteration. The sparse products run directly over the CSR
//! rows; re-orthonormalisation and the small Rayleigh-Ritz SVD use `faer`.
//!
//! Each singular vector yields one seed: the node ordering by descending
//! absolute entry (ties by index) and a candidate set of the nodes whose
//! entry is above the uniform magnitude `1 / sqrt(len)`.

use super::engine::Deadline;
use crate::error::{DensityError, DensityResult};
use crate::storage::{CsrGraph, NodeId};
use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

/// Default number of singular vectors
pub const DEFAULT_SPECTRAL_K: usize = 3;

/// Default RNG seed for the starting block
pub const DEFAULT_SPECTRAL_SEED: u64 = 0x5EED_DE45;

/// How the adjacency structure is read by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Partition {
    /// Symmetric `n x n` adjacency
    #[default]
    Unipartite,
    /// Nodes `0..left` on one side, `left..n` on the other
    Bipartite {
        /// Size of the left node range
        left: usize,
    },
}

/// Truncated SVD parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralConfig {
    /// Number of singular vectors (seeds) to compute
    pub k: usize,
    /// Unipartite or bipartite reading of the graph
    pub partition: Partition,
    /// Extra subspace columns beyond `k`
    pub oversample: usize,
    /// Subspace iteration cap
    pub max_iterations: usize,
    /// Relative change of the top-k singular values treated as converged
    pub tolerance: f64,
    /// Seed for the random starting block
    pub seed: u64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_SPECTRAL_K,
            partition: Partition::Unipartite,
            oversample: 8,
            max_iterations: 500,
            tolerance: 1e-9,
            seed: DEFAULT_SPECTRAL_SEED,
        }
    }
}

impl SpectralConfig {
    /// Set the number of seeds
    #[must_use]
    pub const fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the partition reading
    #[must_use]
    pub const fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// Set the oversampling width
    #[must_use]
    pub const fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample;
        self
    }

    /// Set the iteration cap
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the RNG seed
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// One seed derived from a singular triplet
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralSeed {
    /// Singular value of the triplet
    pub singular_value: f64,
    /// Every node, by descending absolute vector entry
    pub ordering: Vec<NodeId>,
    /// Nodes with above-uniform magnitude, ascending
    pub candidates: Vec<NodeId>,
}

/// Seeds in descending singular-value order
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralSeeds {
    /// One seed per singular vector
    pub seeds: Vec<SpectralSeed>,
    /// Subspace iterations until convergence
    pub iterations: usize,
}

impl SpectralSeeds {
    /// Singular value following seed `index`, if computed
    #[must_use]
    pub fn next_singular_value(&self, index: usize) -> Option<f64> {
        self.seeds.get(index + 1).map(|seed| seed.singular_value)
    }
}

/// Sparse adjacency or biadjacency operator over the CSR rows
struct Operator<'g> {
    graph: &'g CsrGraph,
    left: Option<usize>,
}

impl<'g> Operator<'g> {
    fn new(graph: &'g CsrGraph, partition: Partition) -> DensityResult<Self> {
        let n = graph.num_nodes();
        match partition {
            Partition::Unipartite => Ok(Self { graph, left: None }),
            Partition::Bipartite { left } => {
                if left == 0 || left >= n {
                    return Err(DensityError::MalformedInput(format!(
                        "bipartite split {left} must leave both sides non-empty (n = {n})"
                    )));
                }
                if let Some((u, v, _)) = graph.edges().find(|&(u, v, _)| {
                    let (u, v) = (u as usize, v as usize);
                    (u < left) == (v < left)
                }) {
                    return Err(DensityError::MalformedInput(format!(
                        "edge ({u}, {v}) does not cross the bipartite split at {left}"
                    )));
                }
                Ok(Self {
                    graph,
                    left: Some(left),
                })
            }
        }
    }

    fn rows(&self) -> usize {
        self.left.unwrap_or_else(|| self.graph.num_nodes())
    }

    fn cols(&self) -> usize {
        let n = self.graph.num_nodes();
        self.left.map_or(n, |left| n - left)
    }

    /// `X * m`
    fn apply(&self, m: &Mat<f64>) -> Mat<f64> {
        let offset = self.left.unwrap_or(0);
        let mut out = Mat::<f64>::zeros(self.rows(), m.ncols());
        for row in 0..self.rows() {
            let (targets, weights) = self.graph.row(row);
            for (&target, &weight) in targets.iter().zip(weights) {
                let target = target as usize;
                if target < offset {
                    continue;
                }
                for col in 0..m.ncols() {
                    out[(row, col)] += weight * m[(target - offset, col)];
                }
            }
        }
        out
    }

    /// `X^T * m`
    fn apply_transpose(&self, m: &Mat<f64>) -> Mat<f64> {
        let Some(left) = self.left else {
            return self.apply(m);
        };
        let mut out = Mat::<f64>::zeros(self.cols(), m.ncols());
        for col_node in 0..self.cols() {
            let (targets, weights) = self.graph.row(left + col_node);
            for (&target, &weight) in targets.iter().zip(weights) {
                let target = target as usize;
                for col in 0..m.ncols() {
                    out[(col_node, col)] += weight * m[(target, col)];
                }
            }
        }
        out
    }
}

fn orthonormalize(m: &Mat<f64>) -> Mat<f64> {
    m.qr().compute_thin_q()
}

/// Compute spectral seeds for `graph`
///
/// # Errors
///
/// - [`DensityError::MalformedInput`] if the bipartite split is empty or an
///   edge does not cross it
/// - [`DensityError::SpectralConvergence`] if the top-k singular values are
///   still moving after `max_iterations` subspace iterations
pub fn spectral_seeds(graph: &CsrGraph, config: &SpectralConfig) -> DensityResult<SpectralSeeds> {
    spectral_seeds_within(graph, config, &Deadline::none())
}

/// [`spectral_seeds`] that checks `deadline` before every subspace iteration
///
/// # Errors
///
/// As [`spectral_seeds`], plus [`DensityError::EngineTimeout`] once the
/// deadline passes.
#[instrument(
    name = "spectral_seeds",
    skip_all,
    err,
    fields(k = config.k, partition = ?config.partition)
)]
pub fn spectral_seeds_within(
    graph: &CsrGraph,
    config: &SpectralConfig,
    deadline: &Deadline,
) -> DensityResult<SpectralSeeds> {
    let operator = Operator::new(graph, config.partition)?;
    let min_dim = operator.rows().min(operator.cols());
    if min_dim == 0 {
        return Ok(SpectralSeeds {
            seeds: Vec::new(),
            iterations: 0,
        });
    }
    let k = config.k.clamp(1, min_dim);
    let width = (k + config.oversample).min(min_dim);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut omega = Mat::<f64>::zeros(operator.cols(), width);
    for row in 0..operator.cols() {
        for col in 0..width {
            omega[(row, col)] = rng.gen_range(-1.0..1.0);
        }
    }
    let mut q = orthonormalize(&operator.apply(&omega));

    let mut previous: Option<Vec<f64>> = None;
    let mut change = f64::INFINITY;
    for iteration in 1..=config.max_iterations {
        deadline.check()?;
        let z = orthonormalize(&operator.apply_transpose(&q));
        let y = operator.apply(&z);
        q = orthonormalize(&y);

        // Rayleigh-Ritz: X Z ~ Q C with C = U S V^T
        let c = q.transpose() * y.as_ref();
        let svd = c.svd();
        let cv = c.as_ref() * svd.v();
        let mut sigma: Vec<(usize, f64)> = (0..width)
            .map(|j| {
                let norm = (0..width).map(|i| cv[(i, j)] * cv[(i, j)]).sum::<f64>().sqrt();
                (j, norm)
            })
            .collect();
        sigma.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let top: Vec<f64> = sigma.iter().take(k).map(|&(_, s)| s).collect();

        if let Some(prev) = &previous {
            change = top
                .iter()
                .zip(prev)
                .map(|(now, before)| (now - before).abs())
                .fold(0.0, f64::max);
            let scale = top.first().copied().unwrap_or(0.0).max(f64::MIN_POSITIVE);
            if change <= config.tolerance * scale {
                debug!(iteration, ?top, "spectral solver converged");
                let left_vectors = q.as_ref() * svd.u();
                let right_vectors = z.as_ref() * svd.v();
                let seeds = sigma
                    .iter()
                    .take(k)
                    .map(|&(j, value)| {
                        let left: Vec<f64> =
                            (0..left_vectors.nrows()).map(|i| left_vectors[(i, j)]).collect();
                        let right: Vec<f64> =
                            (0..right_vectors.nrows()).map(|i| right_vectors[(i, j)]).collect();
                        build_seed(graph.num_nodes(), operator.left, value, &left, &right)
                    })
                    .collect();
                return Ok(SpectralSeeds {
                    seeds,
                    iterations: iteration,
                });
            }
        }
        previous = Some(top);
    }

    Err(DensityError::SpectralConvergence {
        iterations: config.max_iterations,
        change,
    })
}

fn build_seed(
    n: usize,
    split: Option<usize>,
    singular_value: f64,
    left: &[f64],
    right: &[f64],
) -> SpectralSeed {
    let mut magnitude = vec![0.0; n];
    let mut candidate = vec![false; n];
    match split {
        None => {
            let threshold = uniform_magnitude(n);
            for node in 0..n {
                let (u, v) = (left[node].abs(), right[node].abs());
                magnitude[node] = u;
                candidate[node] = u > threshold || v > threshold;
            }
        }
        Some(split) => {
            let (left_threshold, right_threshold) =
                (uniform_magnitude(split), uniform_magnitude(n - split));
            for node in 0..split {
                magnitude[node] = left[node].abs();
                candidate[node] = magnitude[node] > left_threshold;
            }
            for node in split..n {
                magnitude[node] = right[node - split].abs();
                candidate[node] = magnitude[node] > right_threshold;
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| magnitude[b].total_cmp(&magnitude[a]).then(a.cmp(&b)));

    #[allow(clippy::cast_possible_truncation)] // node count fits u32 (checked at load)
    let to_id = |node: usize| NodeId(node as u32);
    SpectralSeed {
        singular_value,
        ordering: order.into_iter().map(to_id).collect(),
        candidates: (0..n).filter(|&node| candidate[node]).map(to_id).collect(),
    }
}

#[allow(clippy::cast_precision_loss)] // node counts far below 2^52
fn uniform_magnitude(len: usize) -> f64 {
    1.0 / (len as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::EngineKind;
    use std::time::Duration;

    fn ids(nodes: impl IntoIterator<Item = u32>) -> Vec<NodeId> {
        nodes.into_iter().map(NodeId).collect()
    }

    fn clique_edges(nodes: &[u32], weight: f64) -> Vec<(u32, u32, f64)> {
        let mut edges = Vec::new();
        for (i, &u) in nodes.iter().enumerate() {
            for &v in &nodes[i + 1..] {
                edges.push((u, v, weight));
            }
        }
        edges
    }

    /// K5 (weight 2) on 0..5 and K4 (weight 1) on 5..9
    fn two_cliques() -> CsrGraph {
        let mut edges = clique_edges(&[0, 1, 2, 3, 4], 2.0);
        edges.extend(clique_edges(&[5, 6, 7, 8], 1.0));
        CsrGraph::from_edges(9, &edges).unwrap()
    }

    #[test]
    fn test_unipartite_seeds_separate_cliques() {
        let graph = two_cliques();
        let seeds = spectral_seeds(&graph, &SpectralConfig::default().with_k(2)).unwrap();
        assert_eq!(seeds.seeds.len(), 2);

        let first = &seeds.seeds[0];
        assert!((first.singular_value - 8.0).abs() < 1e-6);
        assert_eq!(first.candidates, ids(0..5));
        let mut head = first.ordering[..5].to_vec();
        head.sort_unstable();
        assert_eq!(head, ids(0..5));

        let second = &seeds.seeds[1];
        assert!((second.singular_value - 3.0).abs() < 1e-6);
        assert_eq!(second.candidates, ids(5..9));
        assert_eq!(seeds.next_singular_value(0), Some(second.singular_value));
        assert_eq!(seeds.next_singular_value(1), None);
    }

    #[test]
    fn test_bipartite_blocks() {
        // Left 0..5, right 5..10; block A = {0,1,2} x {5,6,7} weight 2, block B = {3,4} x {8,9}
        let mut edges = Vec::new();
        for u in 0..3 {
            for v in 5..8 {
                edges.push((u, v, 2.0));
            }
        }
        for u in 3..5 {
            for v in 8..10 {
                edges.push((u, v, 1.0));
            }
        }
        let graph = CsrGraph::from_edges(10, &edges).unwrap();
        let config = SpectralConfig::default()
            .with_k(2)
            .with_partition(Partition::Bipartite { left: 5 });
        let seeds = spectral_seeds(&graph, &config).unwrap();

        assert!((seeds.seeds[0].singular_value - 6.0).abs() < 1e-6);
        assert_eq!(seeds.seeds[0].candidates, ids([0, 1, 2, 5, 6, 7]));
        assert!((seeds.seeds[1].singular_value - 2.0).abs() < 1e-6);
        assert_eq!(seeds.seeds[1].candidates, ids([3, 4, 8, 9]));
    }

    #[test]
    fn test_bipartite_rejects_same_side_edge() {
        let graph = CsrGraph::from_edges(4, &[(0, 2, 1.0), (0, 1, 1.0)]).unwrap();
        let config = SpectralConfig::default().with_partition(Partition::Bipartite { left: 2 });
        let err = spectral_seeds(&graph, &config).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");

        let config = SpectralConfig::default().with_partition(Partition::Bipartite { left: 4 });
        assert!(spectral_seeds(&graph, &config).is_err());
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let graph = two_cliques();
        let config = SpectralConfig::default().with_max_iterations(1);
        match spectral_seeds(&graph, &config) {
            Err(DensityError::SpectralConvergence { iterations, .. }) => assert_eq!(iterations, 1),
            other => panic!("expected convergence failure, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_deadline_stops_iteration() {
        let graph = two_cliques();
        let deadline = Deadline::after(EngineKind::SpecGreedy, Duration::ZERO);
        match spectral_seeds_within(&graph, &SpectralConfig::default(), &deadline) {
            Err(DensityError::EngineTimeout { engine, timeout }) => {
                assert_eq!(engine, "SPECGREEDY");
                assert_eq!(timeout, Duration::ZERO);
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let open = Deadline::none();
        assert_eq!(
            spectral_seeds_within(&graph, &SpectralConfig::default(), &open).unwrap(),
            spectral_seeds(&graph, &SpectralConfig::default()).unwrap()
        );
    }

    #[test]
    fn test_seeded_runs_are_deterministic() {
        let graph = two_cliques();
        let config = SpectralConfig::default().with_k(2).with_oversample(1).with_seed(7);
        let first = spectral_seeds(&graph, &config).unwrap();
        let second = spectral_seeds(&graph, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ordering_ties_break_on_index() {
        let seed = build_seed(4, None, 1.0, &[0.5, -0.5, 0.5, -0.5], &[0.5, -0.5, 0.5, -0.5]);
        assert_eq!(seed.ordering, ids(0..4));
        assert!(seed.candidates.is_empty());
    }
}
