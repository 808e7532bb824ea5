//! Local search refinement driven by a seed ordering
//!
//! Each iteration first tries to add the highest-ranked outside node that
//! strictly improves the density; failing that it tries to drop the member
//! with the smallest `(links + bias) / mass`. The search stops at a local
//! optimum, when the iteration budget runs out or when a deadline passes.

use super::engine::Deadline;
use crate::error::DensityResult;
use crate::objective::{DensityObjective, SubsetTracker};
use crate::storage::{CsrGraph, NodeId};

/// Default bound on accepted moves per refinement
pub const DEFAULT_REFINE_ITERATIONS: usize = 10_000;

/// Relative margin a move must beat to count as an improvement
const IMPROVEMENT_MARGIN: f64 = 1e-12;

/// Local search parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineConfig {
    /// Maximum number of accepted moves
    pub max_iterations: usize,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_REFINE_ITERATIONS,
        }
    }
}

impl RefineConfig {
    /// Set the move budget
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Outcome of one refinement run
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Final subset, ascending
    pub nodes: Vec<NodeId>,
    /// Score of `nodes` under the refinement objective
    pub density: f64,
    /// Accepted moves
    pub iterations: usize,
    /// False when the move budget ran out before a local optimum
    pub converged: bool,
}

/// Refine `start` towards a local optimum
///
/// Only nodes listed in `ordering` are candidates for insertion, scanned in
/// rank order. When `start` holds fewer than two nodes it is padded with the
/// top of `ordering` so the first comparison is against a scored subset.
#[must_use]
pub fn refine(
    graph: &CsrGraph,
    objective: DensityObjective,
    ordering: &[NodeId],
    start: &[NodeId],
    config: &RefineConfig,
) -> Refinement {
    refine_until(graph, objective, ordering, start, config, &Deadline::none()).0
}

/// [`refine`] that gives up once `deadline` passes
///
/// # Errors
///
/// Returns [`DensityError::EngineTimeout`](crate::DensityError::EngineTimeout)
/// if the deadline passes first.
pub fn refine_within(
    graph: &CsrGraph,
    objective: DensityObjective,
    ordering: &[NodeId],
    start: &[NodeId],
    config: &RefineConfig,
    deadline: &Deadline,
) -> DensityResult<Refinement> {
    let (refinement, finished) = refine_until(graph, objective, ordering, start, config, deadline);
    if !finished {
        deadline.check()?;
    }
    Ok(refinement)
}

/// Search loop; the flag is `false` when the deadline cut it short
fn refine_until(
    graph: &CsrGraph,
    objective: DensityObjective,
    ordering: &[NodeId],
    start: &[NodeId],
    config: &RefineConfig,
    deadline: &Deadline,
) -> (Refinement, bool) {
    let n = graph.num_nodes();
    let ordering: Vec<usize> = ordering
        .iter()
        .map(|node| node.index())
        .filter(|&node| node < n)
        .collect();

    let mut tracker = SubsetTracker::with_nodes(
        graph,
        objective,
        start.iter().map(|node| node.index()).filter(|&node| node < n),
    );
    for &node in &ordering {
        if tracker.size() >= 2 {
            break;
        }
        tracker.insert(node);
    }

    let mut iterations = 0;
    let mut converged = false;
    let mut finished = true;
    while iterations < config.max_iterations {
        if deadline.expired() {
            finished = false;
            break;
        }
        let current = tracker.density();

        let addition = ordering
            .iter()
            .copied()
            .find(|&node| !tracker.contains(node) && improves(tracker.density_with(node), current));
        if let Some(node) = addition {
            tracker.insert(node);
            iterations += 1;
            continue;
        }

        let worst = tracker
            .member_indices()
            .map(|node| (node, tracker.contribution(node) / tracker.mass_unit(node)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(node, _)| node);
        if let Some(node) = worst.filter(|&node| improves(tracker.density_without(node), current)) {
            tracker.remove(node);
            iterations += 1;
            continue;
        }

        converged = true;
        break;
    }

    let nodes = tracker.members();
    let density = objective.density_of(graph, &nodes);
    let refinement = Refinement {
        nodes,
        density,
        iterations,
        converged,
    };
    (refinement, finished)
}

fn improves(candidate: f64, current: f64) -> bool {
    candidate > current + IMPROVEMENT_MARGIN * current.abs().max(1.0)
}
