//! Density objective shared by every engine
//!
//! `score(S) = weight(E(S)) / mass(S)` where `weight(E(S))` sums the weights of
//! edges with both endpoints in `S` and `mass(S)` is either the node count or
//! the sum of node weights. Subsets with at most one node score `0.0`, which
//! lets peeling and local search compare against them without special cases.
//!
//! A [`NodeBias`] adds a per-node term `c(v)` to the numerator, giving
//! `(weight(E(S)) + sum of c(v) over S) / mass(S)`. This is the diagonal of the
//! generalized quadratic objective `0.5 x'Px / x'Qx` behind the SpecGreedy
//! methods; the unbiased objective is the plain edge density.

use crate::storage::{CsrGraph, NodeId};

/// Normalizer used for the denominator of the density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MassMode {
    /// `mass(S) = |S|` (classical densest subgraph)
    #[default]
    NodeCount,
    /// `mass(S) = sum of node weights in S`
    WeightedMass,
}

/// Diagonal term `c(v)` added to the edge weight of every member
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NodeBias {
    /// `c(v) = 0`
    #[default]
    Zero,
    /// `c(v) = factor * node_weight(v)`
    NodeWeight(f64),
    /// `c(v) = factor * weighted_degree(v)`
    Degree(f64),
    /// `c(v) = value`
    Constant(f64),
}

impl NodeBias {
    /// Bias of one node; callers must pass `node < graph.num_nodes()`
    #[must_use]
    pub fn of(&self, graph: &CsrGraph, node: usize) -> f64 {
        match *self {
            Self::Zero => 0.0,
            Self::NodeWeight(factor) => factor * graph.node_weights()[node],
            Self::Degree(factor) => factor * graph.degrees()[node],
            Self::Constant(value) => value,
        }
    }
}

/// Density scoring function parameterized by a [`MassMode`]
///
/// # Example
///
/// ```
/// use trueno_densest::{CsrGraph, DensityObjective, MassMode, NodeId};
///
/// let graph = CsrGraph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]).unwrap();
/// let objective = DensityObjective::new(MassMode::NodeCount);
///
/// let all = [NodeId(0), NodeId(1), NodeId(2)];
/// assert_eq!(objective.density_of(&graph, &all), 1.0);
/// assert_eq!(objective.density_of(&graph, &[NodeId(0)]), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DensityObjective {
    mass_mode: MassMode,
    bias: NodeBias,
}

impl DensityObjective {
    /// Create an objective with the given mass normalizer
    #[must_use]
    pub const fn new(mass_mode: MassMode) -> Self {
        Self {
            mass_mode,
            bias: NodeBias::Zero,
        }
    }

    /// Add a per-node numerator term
    ///
    /// Peeling and local search honour the bias; the flow engine assumes an
    /// unbiased objective.
    #[must_use]
    pub const fn with_bias(mut self, bias: NodeBias) -> Self {
        self.bias = bias;
        self
    }

    /// Numerator term in use
    #[must_use]
    pub const fn bias(&self) -> NodeBias {
        self.bias
    }

    /// Mass normalizer in use
    #[must_use]
    pub const fn mass_mode(&self) -> MassMode {
        self.mass_mode
    }

    /// Mass contributed by a single node
    ///
    /// Callers must pass `node < graph.num_nodes()`.
    #[must_use]
    pub fn mass_unit(&self, graph: &CsrGraph, node: usize) -> f64 {
        match self.mass_mode {
            MassMode::NodeCount => 1.0,
            MassMode::WeightedMass => graph.node_weights()[node],
        }
    }

    /// Mass of a subset; duplicates and out-of-range IDs are ignored
    #[must_use]
    pub fn mass_of(&self, graph: &CsrGraph, subset: &[NodeId]) -> f64 {
        let members = Membership::new(graph, subset);
        members
            .nodes
            .iter()
            .map(|&node| self.mass_unit(graph, node))
            .sum()
    }

    /// Density of a subset
    ///
    /// Only edges incident to members are visited. Subsets with fewer than two
    /// distinct nodes score `0.0`.
    #[must_use]
    pub fn density_of(&self, graph: &CsrGraph, subset: &[NodeId]) -> f64 {
        let members = Membership::new(graph, subset);
        if members.nodes.len() <= 1 {
            return 0.0;
        }
        let mass: f64 = members
            .nodes
            .iter()
            .map(|&node| self.mass_unit(graph, node))
            .sum();
        let bias: f64 = members
            .nodes
            .iter()
            .map(|&node| self.bias.of(graph, node))
            .sum();
        (members.edge_weight(graph) + bias) / mass
    }

    /// Upper bound on the density of any subset of `graph`
    ///
    /// A subset with positive density holds at least one edge and two nodes,
    /// so `(W + positive bias) / (2 * min mass unit)` bounds every score.
    #[must_use]
    pub fn upper_bound(&self, graph: &CsrGraph) -> f64 {
        let min_unit = match self.mass_mode {
            MassMode::NodeCount => 1.0,
            MassMode::WeightedMass => graph
                .node_weights()
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min),
        };
        let positive_bias: f64 = (0..graph.num_nodes())
            .map(|node| self.bias.of(graph, node).max(0.0))
            .sum();
        if min_unit.is_finite() {
            (graph.total_edge_weight() + positive_bias) / (2.0 * min_unit)
        } else {
            0.0
        }
    }
}

/// Sum of edge weights with both endpoints in `subset`
#[must_use]
pub fn edge_weight_within(graph: &CsrGraph, subset: &[NodeId]) -> f64 {
    Membership::new(graph, subset).edge_weight(graph)
}

/// Density of `subset` under `mass_mode`
#[must_use]
pub fn density_of(subset: &[NodeId], graph: &CsrGraph, mass_mode: MassMode) -> f64 {
    DensityObjective::new(mass_mode).density_of(graph, subset)
}

/// Distinct in-range members of a subset with a membership bitmap
struct Membership {
    flags: Vec<bool>,
    nodes: Vec<usize>,
}

impl Membership {
    fn new(graph: &CsrGraph, subset: &[NodeId]) -> Self {
        let mut flags = vec![false; graph.num_nodes()];
        let mut nodes = Vec::with_capacity(subset.len());
        for node in subset {
            if let Some(flag) = flags.get_mut(node.index()) {
                if !*flag {
                    *flag = true;
                    nodes.push(node.index());
                }
            }
        }
        Self { flags, nodes }
    }

    fn edge_weight(&self, graph: &CsrGraph) -> f64 {
        let mut total = 0.0;
        for &node in &self.nodes {
            let (targets, weights) = graph.row(node);
            for (&target, &weight) in targets.iter().zip(weights) {
                let target = target as usize;
                if target > node && self.flags[target] {
                    total += weight;
                }
            }
        }
        total
    }
}

/// Incrementally maintained candidate subset
///
/// Tracks, for every node, the edge weight linking it into the current
/// subset, so single-node insertions and removals cost O(degree) and the
/// density after a hypothetical move costs O(1).
#[derive(Debug, Clone)]
pub(crate) struct SubsetTracker<'g> {
    graph: &'g CsrGraph,
    objective: DensityObjective,
    member: Vec<bool>,
    links: Vec<f64>,
    edge_weight: f64,
    bias: f64,
    mass: f64,
    size: usize,
}

impl<'g> SubsetTracker<'g> {
    pub(crate) fn new(graph: &'g CsrGraph, objective: DensityObjective) -> Self {
        let n = graph.num_nodes();
        Self {
            graph,
            objective,
            member: vec![false; n],
            links: vec![0.0; n],
            edge_weight: 0.0,
            bias: 0.0,
            mass: 0.0,
            size: 0,
        }
    }

    pub(crate) fn with_nodes(
        graph: &'g CsrGraph,
        objective: DensityObjective,
        nodes: impl IntoIterator<Item = usize>,
    ) -> Self {
        let mut tracker = Self::new(graph, objective);
        for node in nodes {
            tracker.insert(node);
        }
        tracker
    }

    pub(crate) fn contains(&self, node: usize) -> bool {
        self.member[node]
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    /// Weight of edges between `node` and current members
    #[cfg(test)]
    pub(crate) fn links(&self, node: usize) -> f64 {
        self.links[node]
    }

    pub(crate) fn mass_unit(&self, node: usize) -> f64 {
        self.objective.mass_unit(self.graph, node)
    }

    fn bias_of(&self, node: usize) -> f64 {
        self.objective.bias().of(self.graph, node)
    }

    /// Numerator share of `node`: its links into the subset plus its bias
    pub(crate) fn contribution(&self, node: usize) -> f64 {
        self.links[node].max(0.0) + self.bias_of(node)
    }

    pub(crate) fn insert(&mut self, node: usize) {
        if self.member[node] {
            return;
        }
        self.member[node] = true;
        self.edge_weight += self.links[node];
        self.bias += self.bias_of(node);
        self.mass += self.mass_unit(node);
        self.size += 1;
        let (targets, weights) = self.graph.row(node);
        for (&target, &weight) in targets.iter().zip(weights) {
            self.links[target as usize] += weight;
        }
    }

    pub(crate) fn remove(&mut self, node: usize) {
        if !self.member[node] {
            return;
        }
        self.member[node] = false;
        self.edge_weight -= self.links[node];
        self.bias -= self.bias_of(node);
        self.mass -= self.mass_unit(node);
        self.size -= 1;
        let (targets, weights) = self.graph.row(node);
        for (&target, &weight) in targets.iter().zip(weights) {
            self.links[target as usize] -= weight;
        }
        if self.size == 0 {
            self.edge_weight = 0.0;
            self.bias = 0.0;
            self.mass = 0.0;
        }
    }

    pub(crate) fn density(&self) -> f64 {
        score(self.size, self.edge_weight, self.bias, self.mass)
    }

    /// Density if `node` (currently outside) were inserted
    pub(crate) fn density_with(&self, node: usize) -> f64 {
        score(
            self.size + 1,
            self.edge_weight + self.links[node],
            self.bias + self.bias_of(node),
            self.mass + self.mass_unit(node),
        )
    }

    /// Density if `node` (currently inside) were removed
    pub(crate) fn density_without(&self, node: usize) -> f64 {
        score(
            self.size - 1,
            self.edge_weight - self.links[node],
            self.bias - self.bias_of(node),
            self.mass - self.mass_unit(node),
        )
    }

    /// Members in ascending order
    pub(crate) fn members(&self) -> Vec<NodeId> {
        self.member
            .iter()
            .enumerate()
            .filter(|&(_, &inside)| inside)
            .map(|(node, _)| {
                #[allow(clippy::cast_possible_truncation)] // node count fits u32 (checked at load)
                NodeId(node as u32)
            })
            .collect()
    }

    /// Member indices in ascending order
    pub(crate) fn member_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.member
            .iter()
            .enumerate()
            .filter(|&(_, &inside)| inside)
            .map(|(node, _)| node)
    }
}

fn score(size: usize, edge_weight: f64, bias: f64, mass: f64) -> f64 {
    if size <= 1 || mass <= 0.0 {
        0.0
    } else {
        (edge_weight.max(0.0) + bias) / mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(nodes: &[u32]) -> Vec<NodeId> {
        nodes.iter().copied().map(NodeId).collect()
    }

    fn weighted_triangle() -> CsrGraph {
        CsrGraph::load(
            4,
            4,
            vec![1.0, 2.0, 1.0, 4.0],
            &[(0, 1, 1.0), (1, 2, 2.0), (0, 2, 3.0), (2, 3, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_node_count_density() {
        let graph = weighted_triangle();
        let objective = DensityObjective::new(MassMode::NodeCount);
        assert_eq!(objective.density_of(&graph, &ids(&[0, 1, 2])), 2.0);
        assert_eq!(objective.density_of(&graph, &ids(&[0, 1, 2, 3])), 7.0 / 4.0);
    }

    #[test]
    fn test_weighted_mass_density() {
        let graph = weighted_triangle();
        let objective = DensityObjective::new(MassMode::WeightedMass);
        assert_eq!(objective.mass_of(&graph, &ids(&[0, 1, 2])), 4.0);
        assert_eq!(objective.density_of(&graph, &ids(&[0, 1, 2])), 1.5);
        assert_eq!(density_of(&ids(&[2, 3]), &graph, MassMode::WeightedMass), 0.2);
    }

    #[test]
    fn test_degenerate_subsets_score_zero() {
        let graph = weighted_triangle();
        let objective = DensityObjective::default();
        assert_eq!(objective.density_of(&graph, &[]), 0.0);
        assert_eq!(objective.density_of(&graph, &ids(&[2])), 0.0);
        assert_eq!(objective.density_of(&graph, &ids(&[2, 2, 2])), 0.0);
    }

    #[test]
    fn test_duplicates_and_out_of_range_are_ignored() {
        let graph = weighted_triangle();
        let objective = DensityObjective::default();
        let noisy = ids(&[0, 1, 1, 9, 2, 0]);
        assert_eq!(objective.density_of(&graph, &noisy), 2.0);
        assert_eq!(edge_weight_within(&graph, &noisy), 6.0);
    }

    #[test]
    fn test_upper_bound_dominates_every_pair() {
        let graph = weighted_triangle();
        for mode in [MassMode::NodeCount, MassMode::WeightedMass] {
            let objective = DensityObjective::new(mode);
            let bound = objective.upper_bound(&graph);
            for (u, v, _) in graph.edges() {
                assert!(objective.density_of(&graph, &ids(&[u, v])) <= bound);
            }
        }
    }

    #[test]
    fn test_tracker_matches_batch_density() {
        let graph = weighted_triangle();
        let objective = DensityObjective::new(MassMode::WeightedMass);
        let mut tracker = SubsetTracker::with_nodes(&graph, objective, [0, 1, 2]);
        assert!((tracker.density() - 1.5).abs() < 1e-12);

        assert!((tracker.density_with(3) - 7.0 / 8.0).abs() < 1e-12);
        tracker.insert(3);
        assert!((tracker.density() - 7.0 / 8.0).abs() < 1e-12);

        assert!((tracker.density_without(1) - 4.0 / 6.0).abs() < 1e-12);
        tracker.remove(1);
        let expected = objective.density_of(&graph, &tracker.members());
        assert!((tracker.density() - expected).abs() < 1e-12);
        assert_eq!(tracker.members(), ids(&[0, 2, 3]));
        assert_eq!(tracker.links(1), 3.0);
    }

    #[test]
    fn test_biased_density() {
        let graph = weighted_triangle();
        let subset = ids(&[0, 1, 2]);

        let fraud = DensityObjective::default().with_bias(NodeBias::NodeWeight(1.0));
        assert_eq!(fraud.density_of(&graph, &subset), (6.0 + 4.0) / 3.0);

        // Half the degree per member leaves minus half the cut
        let cut = DensityObjective::default().with_bias(NodeBias::Degree(-0.5));
        assert_eq!(cut.density_of(&graph, &subset), -0.5 / 3.0);
        assert_eq!(cut.density_of(&graph, &ids(&[0, 1, 2, 3])), 0.0);

        for (u, v, _) in graph.edges() {
            assert!(fraud.density_of(&graph, &ids(&[u, v])) <= fraud.upper_bound(&graph));
        }
    }

    #[test]
    fn test_biased_tracker_matches_batch_density() {
        let graph = weighted_triangle();
        let objective =
            DensityObjective::new(MassMode::WeightedMass).with_bias(NodeBias::NodeWeight(2.0));
        let mut tracker = SubsetTracker::with_nodes(&graph, objective, [0, 1, 3]);
        let expected = objective.density_of(&graph, &ids(&[0, 1, 3]));
        assert!((tracker.density() - expected).abs() < 1e-12);

        let with_two = objective.density_of(&graph, &ids(&[0, 1, 2, 3]));
        assert!((tracker.density_with(2) - with_two).abs() < 1e-12);
        tracker.insert(2);
        assert!((tracker.density() - with_two).abs() < 1e-12);
        assert_eq!(tracker.contribution(3), 1.0 + 8.0);

        tracker.remove(0);
        let expected = objective.density_of(&graph, &tracker.members());
        assert!((tracker.density() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_tracker_empty_after_removing_everything() {
        let graph = weighted_triangle();
        let mut tracker = SubsetTracker::with_nodes(&graph, DensityObjective::default(), [0, 1]);
        tracker.remove(0);
        tracker.remove(1);
        assert_eq!(tracker.size(), 0);
        assert_eq!(tracker.density(), 0.0);
        assert!(!tracker.contains(0));
    }
}
