//! Greedy peeling (Charikar 2000)
//!
//! Repeatedly removes the node with the smallest `(deg_S(v) + c(v)) / mass(v)`,
//! where `c(v)` is the objective's node bias (zero for plain density), and
//! records the density of every non-empty intermediate subset. The best
//! prefix is a 2-approximation of the densest subgraph.
//!
//! Runs in O((n + m) log n) using an indexed heap with decrease-key.

use super::engine::{Deadline, DenseSubgraph, DensityEngine, EngineKind};
use super::heap::IndexedMinHeap;
use crate::error::{DensityError, DensityResult};
use crate::objective::{DensityObjective, SubsetTracker};
use crate::storage::{CsrGraph, NodeId};
use tracing::{debug, instrument};

/// One removal in a peeling sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeelStep {
    /// Node removed at this step
    pub removed: NodeId,
    /// Number of nodes left after the removal
    pub remaining: usize,
    /// Density of the remaining subset; `None` once it is empty
    pub density: Option<f64>,
}

/// Full record of a peeling run; immutable once produced
#[derive(Debug, Clone, PartialEq)]
pub struct PeelingSequence {
    initial: Vec<NodeId>,
    initial_density: f64,
    steps: Vec<PeelStep>,
}

impl PeelingSequence {
    /// Nodes present before the first removal, ascending
    #[must_use]
    pub fn initial(&self) -> &[NodeId] {
        &self.initial
    }

    /// Density before the first removal
    #[must_use]
    pub const fn initial_density(&self) -> f64 {
        self.initial_density
    }

    /// Removals in peeling order
    #[must_use]
    pub fn steps(&self) -> &[PeelStep] {
        &self.steps
    }

    /// Subset left after the first `removed` steps, ascending
    #[must_use]
    pub fn subset_after(&self, removed: usize) -> Vec<NodeId> {
        let mut gone: Vec<NodeId> = self.steps.iter().take(removed).map(|s| s.removed).collect();
        gone.sort_unstable();
        self.initial
            .iter()
            .copied()
            .filter(|node| gone.binary_search(node).is_err())
            .collect()
    }

    /// Best prefix as `(steps removed, density)`
    ///
    /// Ties go to the earliest prefix, i.e. the larger subset.
    #[must_use]
    pub fn best(&self) -> (usize, f64) {
        let mut best = (0, self.initial_density);
        for (idx, step) in self.steps.iter().enumerate() {
            if let Some(density) = step.density {
                if density > best.1 {
                    best = (idx + 1, density);
                }
            }
        }
        best
    }

    /// Subset and density of the best prefix
    #[must_use]
    pub fn best_subset(&self) -> (Vec<NodeId>, f64) {
        let (removed, density) = self.best();
        (self.subset_after(removed), density)
    }
}

/// Removals between two deadline polls
const DEADLINE_POLL_INTERVAL: usize = 256;

/// Peel `graph`, or the subgraph induced by `scope` when given
///
/// Out-of-range and duplicate scope entries are ignored.
#[must_use]
pub fn peel(
    graph: &CsrGraph,
    objective: DensityObjective,
    scope: Option<&[NodeId]>,
) -> PeelingSequence {
    peel_until(graph, objective, scope, &Deadline::none()).0
}

/// [`peel`] that gives up once `deadline` passes
///
/// # Errors
///
/// Returns [`DensityError::EngineTimeout`] if the deadline passes first.
pub fn peel_within(
    graph: &CsrGraph,
    objective: DensityObjective,
    scope: Option<&[NodeId]>,
    deadline: &Deadline,
) -> DensityResult<PeelingSequence> {
    let (sequence, finished) = peel_until(graph, objective, scope, deadline);
    if !finished {
        deadline.check()?;
    }
    Ok(sequence)
}

/// Peeling loop; the flag is `false` when the deadline cut it short
fn peel_until(
    graph: &CsrGraph,
    objective: DensityObjective,
    scope: Option<&[NodeId]>,
    deadline: &Deadline,
) -> (PeelingSequence, bool) {
    let n = graph.num_nodes();
    let members: Vec<usize> = match scope {
        Some(nodes) => {
            let mut members: Vec<usize> = nodes
                .iter()
                .map(|node| node.index())
                .filter(|&node| node < n)
                .collect();
            members.sort_unstable();
            members.dedup();
            members
        }
        None => (0..n).collect(),
    };

    let mut tracker = SubsetTracker::with_nodes(graph, objective, members.iter().copied());
    let initial = tracker.members();
    let initial_density = tracker.density();

    #[allow(clippy::cast_possible_truncation)] // node count fits u32 (checked at load)
    let mut heap = IndexedMinHeap::from_entries(
        n,
        members
            .iter()
            .map(|&node| (node as u32, priority(&tracker, node))),
    );

    let mut steps = Vec::with_capacity(heap.len());
    let mut finished = true;
    loop {
        if steps.len() % DEADLINE_POLL_INTERVAL == 0 && deadline.expired() {
            finished = false;
            break;
        }
        let Some((removed, _)) = heap.pop() else {
            break;
        };
        let node = removed as usize;
        tracker.remove(node);

        let (targets, _) = graph.row(node);
        for &target in targets {
            if heap.contains(target) {
                heap.decrease_key(target, priority(&tracker, target as usize));
            }
        }

        let remaining = tracker.size();
        steps.push(PeelStep {
            removed: NodeId(removed),
            remaining,
            density: (remaining > 0).then(|| tracker.density()),
        });
    }

    let sequence = PeelingSequence {
        initial,
        initial_density,
        steps,
    };
    (sequence, finished)
}

fn priority(tracker: &SubsetTracker<'_>, node: usize) -> f64 {
    tracker.contribution(node) / tracker.mass_unit(node)
}

/// Charikar greedy peeling engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Charikar {
    objective: DensityObjective,
}

impl Charikar {
    /// Create the engine for an objective
    #[must_use]
    pub const fn new(objective: DensityObjective) -> Self {
        Self { objective }
    }
}

impl DensityEngine for Charikar {
    fn kind(&self) -> EngineKind {
        EngineKind::Charikar
    }

    fn run(&self, graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        self.run_within(graph, &Deadline::none())
    }

    #[instrument(
        name = "charikar",
        skip_all,
        err,
        fields(nodes = graph.num_nodes(), edges = graph.num_edges())
    )]
    fn run_within(&self, graph: &CsrGraph, deadline: &Deadline) -> DensityResult<DenseSubgraph> {
        if graph.num_edges() == 0 {
            return Err(DensityError::no_edges());
        }
        let sequence = peel_within(graph, self.objective, None, deadline)?;
        let (removed, peel_density) = sequence.best();
        let nodes = sequence.subset_after(removed);
        let density = self.objective.density_of(graph, &nodes);
        debug!(removed, size = nodes.len(), peel_density, density, "peeling finished");
        Ok(DenseSubgraph::new(nodes, density))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::{MassMode, NodeBias};
    use std::time::Duration;

    fn ids(nodes: &[u32]) -> Vec<NodeId> {
        nodes.iter().copied().map(NodeId).collect()
    }

    fn clique_with_pendant(pendant_weight: f64) -> CsrGraph {
        let edges = [(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0), (2, 3, pendant_weight)];
        CsrGraph::from_edges(4, &edges).unwrap()
    }

    fn brute_force_optimum(graph: &CsrGraph, objective: DensityObjective) -> f64 {
        let n = graph.num_nodes();
        (1_u32..(1 << n))
            .map(|mask| {
                let subset: Vec<NodeId> = (0..n as u32)
                    .filter(|&i| mask & (1_u32 << i) != 0)
                    .map(NodeId)
                    .collect();
                objective.density_of(graph, &subset)
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_sequence_shape() {
        let graph = clique_with_pendant(1.0);
        let sequence = peel(&graph, DensityObjective::default(), None);

        assert_eq!(sequence.initial(), ids(&[0, 1, 2, 3]).as_slice());
        assert_eq!(sequence.initial_density(), 1.0);
        assert_eq!(sequence.steps().len(), 4);
        assert_eq!(sequence.steps()[0].removed, NodeId(3));
        assert_eq!(sequence.steps()[0].density, Some(1.0));
        assert_eq!(sequence.steps()[3].remaining, 0);
        assert_eq!(sequence.steps()[3].density, None);
    }

    #[test]
    fn test_tie_prefers_larger_subset() {
        let graph = clique_with_pendant(1.0);
        let sequence = peel(&graph, DensityObjective::default(), None);
        let (subset, density) = sequence.best_subset();
        assert_eq!(density, 1.0);
        assert_eq!(subset, ids(&[0, 1, 2, 3]));
    }

    #[test]
    fn test_light_pendant_is_peeled_off() {
        let graph = clique_with_pendant(0.5);
        let result = Charikar::default().run(&graph).unwrap();
        assert_eq!(result.nodes(), ids(&[0, 1, 2]).as_slice());
        assert!((result.density() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scope_restricts_peeling() {
        let graph = clique_with_pendant(1.0);
        let scope = ids(&[2, 3, 9]);
        let sequence = peel(&graph, DensityObjective::default(), Some(&scope));
        assert_eq!(sequence.initial(), ids(&[2, 3]).as_slice());
        assert_eq!(sequence.initial_density(), 0.5);
        assert_eq!(sequence.steps().len(), 2);
    }

    #[test]
    fn test_weighted_mass_priority() {
        // Node 3 is heavy, so keeping it costs more than its edge contributes
        let graph = CsrGraph::load(
            4,
            4,
            vec![1.0, 1.0, 1.0, 10.0],
            &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0), (2, 3, 3.0)],
        )
        .unwrap();
        let objective = DensityObjective::new(MassMode::WeightedMass);
        let sequence = peel(&graph, objective, None);
        assert_eq!(sequence.steps()[0].removed, NodeId(3));
        let (subset, density) = sequence.best_subset();
        assert_eq!(subset, ids(&[0, 1, 2]));
        assert!((density - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_half_approximation_on_small_graph() {
        let graph = CsrGraph::from_edges(
            7,
            &[
                (0, 1, 1.0),
                (0, 2, 1.0),
                (0, 3, 1.0),
                (1, 2, 1.0),
                (1, 3, 1.0),
                (2, 3, 1.0),
                (3, 4, 2.0),
                (4, 5, 1.0),
                (5, 6, 4.0),
                (4, 6, 1.0),
            ],
        )
        .unwrap();
        for mode in [MassMode::NodeCount, MassMode::WeightedMass] {
            let objective = DensityObjective::new(mode);
            let optimum = brute_force_optimum(&graph, objective);
            let found = Charikar::new(objective).run(&graph).unwrap().density();
            assert!(found >= optimum / 2.0 - 1e-12);
            assert!(found <= optimum + 1e-12);
        }
    }

    #[test]
    fn test_node_bias_changes_peeling_order() {
        // Edge (3, 4) is light but its endpoints carry heavy node weights
        let graph = CsrGraph::load(
            5,
            4,
            vec![1.0, 1.0, 1.0, 5.0, 5.0],
            &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0), (3, 4, 1.0)],
        )
        .unwrap();

        let (plain, _) = peel(&graph, DensityObjective::default(), None).best_subset();
        assert_eq!(plain, ids(&[0, 1, 2]));

        let biased = DensityObjective::default().with_bias(NodeBias::NodeWeight(1.0));
        let (subset, score) = peel(&graph, biased, None).best_subset();
        assert_eq!(subset, ids(&[3, 4]));
        assert!((score - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_expired_deadline_stops_peeling() {
        let graph = clique_with_pendant(1.0);
        let deadline = Deadline::after(EngineKind::Charikar, Duration::ZERO);

        let err = peel_within(&graph, DensityObjective::default(), None, &deadline).unwrap_err();
        assert_eq!(err.kind(), "engine_timeout");
        let err = Charikar::default().run_within(&graph, &deadline).unwrap_err();
        assert_eq!(err.kind(), "engine_timeout");

        let open = Deadline::after(EngineKind::Charikar, Duration::from_secs(3600));
        let sequence = peel_within(&graph, DensityObjective::default(), None, &open).unwrap();
        assert_eq!(sequence, peel(&graph, DensityObjective::default(), None));
    }

    #[test]
    fn test_no_edges_is_infeasible() {
        let graph = CsrGraph::from_edges(3, &[]).unwrap();
        let err = Charikar::default().run(&graph).unwrap_err();
        assert_eq!(err.kind(), "infeasible_graph");
    }
}
