//! Exact densest subgraph by parametric min-cut (Goldberg 1984)
//!
//! For a guess `g` a flow network is built whose minimum cut is smaller than
//! a fixed baseline exactly when some subset has density above `g`; the
//! source side of that cut is such a subset. A binary search over
//! `[0, upper bound]` narrows `g` to within `epsilon` of the optimum.
//!
//! # Formulations
//!
//! With `S` the source side, `W(S)` its internal edge weight and `m(S)` its
//! mass, both networks have `cut(S) = baseline + 2 * (g * m(S) - W(S))`:
//!
//! - [`FlowFormulation::DegreeSource`]: `s -> v` carries `deg(v)`, `v -> t`
//!   carries `2g * mass(v)`; baseline is the total degree.
//! - [`FlowFormulation::Goldberg`]: `s -> v` carries `M = max degree`,
//!   `v -> t` carries `M + 2g * mass(v) - deg(v)`; baseline is `n * M`.
//!
//! Every graph edge becomes an undirected arc pair with its weight.

use super::engine::{Deadline, DenseSubgraph, DensityEngine, EngineKind};
use super::maxflow::FlowNetwork;
use crate::error::{DensityError, DensityResult};
use crate::objective::{DensityObjective, NodeBias};
use crate::storage::{CsrGraph, NodeId};
use tracing::{debug, instrument};

/// Relative margin below the baseline that counts as a strictly smaller cut
const FEASIBILITY_EPSILON: f64 = 1e-10;

/// Guard against non-terminating searches with pathological epsilons
const MAX_SEARCH_STEPS: usize = 256;

/// Capacity layout of the per-guess network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowFormulation {
    /// Source arcs carry node degrees
    #[default]
    DegreeSource,
    /// Uniform source arcs of the maximum degree
    Goldberg,
}

/// Flow engine parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowConfig {
    /// Binary search precision; `None` selects `1 / (n (n - 1))`
    pub epsilon: Option<f64>,
    /// Network construction
    pub formulation: FlowFormulation,
}

impl FlowConfig {
    /// Set an explicit precision
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    /// Set the network construction
    #[must_use]
    pub const fn with_formulation(mut self, formulation: FlowFormulation) -> Self {
        self.formulation = formulation;
        self
    }
}

/// Feasibility answer for one density guess
#[derive(Debug, Clone, PartialEq)]
pub struct GuessEvaluation {
    /// Guess that was tested
    pub guess: f64,
    /// True when a subset with density above the guess exists
    pub feasible: bool,
    /// Max-flow (= min-cut) value
    pub cut: f64,
    /// Cut value of the trivial source-only partition
    pub baseline: f64,
    /// Graph nodes on the source side of the minimum cut, ascending
    pub source_side: Vec<NodeId>,
}

/// One binary-search step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowStep {
    /// Guess evaluated at this step
    pub guess: f64,
    /// Feasibility of the guess
    pub feasible: bool,
    /// Size of the source side
    pub subset_size: usize,
}

/// Flow result with the search trace
#[derive(Debug, Clone, PartialEq)]
pub struct FlowReport {
    /// Densest subgraph found
    pub best: DenseSubgraph,
    /// Binary-search steps in order
    pub steps: Vec<FlowStep>,
    /// Precision used
    pub epsilon: f64,
}

/// Build the network for `guess` and solve its minimum cut
///
/// # Errors
///
/// Returns [`DensityError::FlowSolve`] if the guess is negative or not
/// finite, or if the max-flow computation fails.
#[allow(clippy::cast_precision_loss)] // node counts far below 2^52
pub fn evaluate_guess(
    graph: &CsrGraph,
    objective: DensityObjective,
    formulation: FlowFormulation,
    guess: f64,
) -> DensityResult<GuessEvaluation> {
    if !guess.is_finite() || guess < 0.0 {
        return Err(DensityError::FlowSolve(format!("invalid density guess {guess}")));
    }
    let n = graph.num_nodes();
    let (source, sink) = (n, n + 1);
    let degrees = graph.degrees();
    let mut network = FlowNetwork::new(n + 2);

    let baseline = match formulation {
        FlowFormulation::DegreeSource => {
            for (node, &degree) in degrees.iter().enumerate() {
                network.add_arc(source, node, degree)?;
                network.add_arc(node, sink, 2.0 * guess * objective.mass_unit(graph, node))?;
            }
            degrees.iter().sum::<f64>()
        }
        FlowFormulation::Goldberg => {
            let max_degree = degrees.iter().copied().fold(0.0, f64::max);
            for (node, &degree) in degrees.iter().enumerate() {
                network.add_arc(source, node, max_degree)?;
                let to_sink = max_degree + 2.0 * guess * objective.mass_unit(graph, node) - degree;
                network.add_arc(node, sink, to_sink.max(0.0))?;
            }
            n as f64 * max_degree
        }
    };
    for (u, v, weight) in graph.edges() {
        network.add_edge(u as usize, v as usize, weight)?;
    }

    let cut = network.max_flow(source, sink)?;
    let side = network.source_side(source);
    #[allow(clippy::cast_possible_truncation)] // node count fits u32 (checked at load)
    let source_side: Vec<NodeId> = (0..n)
        .filter(|&node| side[node])
        .map(|node| NodeId(node as u32))
        .collect();

    let feasible =
        cut < baseline - FEASIBILITY_EPSILON * baseline.max(1.0) && source_side.len() >= 2;
    Ok(GuessEvaluation {
        guess,
        feasible,
        cut,
        baseline,
        source_side,
    })
}

/// Exact flow-based engine
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowExact {
    objective: DensityObjective,
    config: FlowConfig,
}

impl FlowExact {
    /// Create the engine
    ///
    /// The networks model plain edge density, so any node bias on
    /// `objective` is dropped.
    #[must_use]
    pub const fn new(objective: DensityObjective, config: FlowConfig) -> Self {
        Self {
            objective: objective.with_bias(NodeBias::Zero),
            config,
        }
    }

    /// Binary search precision for `graph`
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::MalformedInput`] for a non-positive or
    /// non-finite configured epsilon.
    #[allow(clippy::cast_precision_loss)] // node counts far below 2^52
    pub fn epsilon_for(&self, graph: &CsrGraph) -> DensityResult<f64> {
        let epsilon = match self.config.epsilon {
            Some(epsilon) => epsilon,
            None => {
                let n = graph.num_nodes() as f64;
                1.0 / (n * (n - 1.0)).max(1.0)
            }
        };
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(DensityError::MalformedInput(format!(
                "flow epsilon must be positive and finite, got {epsilon}"
            )));
        }
        Ok(epsilon)
    }

    /// Run the binary search and keep its trace
    ///
    /// # Errors
    ///
    /// - [`DensityError::InfeasibleGraph`] if the graph has no edges
    /// - [`DensityError::MalformedInput`] for an invalid epsilon
    /// - [`DensityError::FlowSolve`] if a max-flow solve fails (aborts the search)
    pub fn solve(&self, graph: &CsrGraph) -> DensityResult<FlowReport> {
        self.solve_within(graph, &Deadline::none())
    }

    /// [`FlowExact::solve`] that checks `deadline` before every guess
    ///
    /// # Errors
    ///
    /// As [`FlowExact::solve`], plus [`DensityError::EngineTimeout`] once the
    /// deadline passes.
    #[instrument(
        name = "flow",
        skip_all,
        err,
        fields(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            formulation = ?self.config.formulation
        )
    )]
    pub fn solve_within(&self, graph: &CsrGraph, deadline: &Deadline) -> DensityResult<FlowReport> {
        if graph.num_edges() == 0 {
            return Err(DensityError::no_edges());
        }
        let epsilon = self.epsilon_for(graph)?;
        let formulation = self.config.formulation;

        let mut lo = 0.0;
        let mut hi = self.objective.upper_bound(graph);
        let mut best: Option<Vec<NodeId>> = None;
        let mut steps = Vec::new();

        while hi - lo > epsilon && steps.len() < MAX_SEARCH_STEPS {
            deadline.check()?;
            let guess = lo + (hi - lo) / 2.0;
            let evaluation = evaluate_guess(graph, self.objective, formulation, guess)?;
            debug!(
                step = steps.len(),
                guess,
                feasible = evaluation.feasible,
                cut = evaluation.cut,
                size = evaluation.source_side.len(),
                "flow guess evaluated"
            );
            steps.push(FlowStep {
                guess,
                feasible: evaluation.feasible,
                subset_size: evaluation.source_side.len(),
            });
            if evaluation.feasible {
                lo = guess;
                best = Some(evaluation.source_side);
            } else {
                hi = guess;
            }
        }

        let nodes = match best {
            Some(nodes) => nodes,
            None => {
                let evaluation = evaluate_guess(graph, self.objective, formulation, lo)?;
                steps.push(FlowStep {
                    guess: lo,
                    feasible: evaluation.feasible,
                    subset_size: evaluation.source_side.len(),
                });
                if !evaluation.feasible {
                    return Err(DensityError::InfeasibleGraph(format!(
                        "no subset denser than {lo} found"
                    )));
                }
                evaluation.source_side
            }
        };

        let density = self.objective.density_of(graph, &nodes);
        debug!(
            size = nodes.len(),
            density,
            lo,
            hi,
            steps = steps.len(),
            "flow search finished"
        );
        Ok(FlowReport {
            best: DenseSubgraph::new(nodes, density),
            steps,
            epsilon,
        })
    }
}

impl DensityEngine for FlowExact {
    fn kind(&self) -> EngineKind {
        EngineKind::Flow
    }

    fn run(&self, graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        self.run_within(graph, &Deadline::none())
    }

    fn run_within(&self, graph: &CsrGraph, deadline: &Deadline) -> DensityResult<DenseSubgraph> {
        self.solve_within(graph, deadline).map(|report| report.best)
    }
}
