//! SpecGreedy: spectral seeds refined by greedy local search
//!
//! For each leading singular vector the candidate nodes are peeled on their
//! induced subgraph, and the best prefix is handed to [`refine`] together with
//! the vector's node ordering. The best local optimum over all seeds wins.
//!
//! Candidates are scored by a [`SpecGreedyMethod`], a quotient
//! `x^T P x / (2 x^T Q x)` over subset indicators. Every family used here has
//! `P = A + diag(c)` and a scaled identity `Q`, so peeling and refinement run
//! on the shared objective with `c` as its node bias. The reported density is
//! always the plain objective, which keeps results comparable across engines.
//!
//! When the singular-vector solver does not converge the engine logs a
//! warning and falls back to a single degree-ordered seed starting from the
//! highest-degree node. The returned [`SpecGreedyReport`] flags that mode.
//!
//! [`refine`]: super::refine::refine

use super::engine::{Deadline, DenseSubgraph, DensityEngine, EngineKind};
use super::peeling::peel_within;
use super::refine::{refine_within, RefineConfig, Refinement};
use super::spectral::{spectral_seeds_within, SpectralConfig, SpectralSeeds};
use crate::error::{DensityError, DensityResult};
use crate::objective::{DensityObjective, NodeBias};
use crate::storage::{CsrGraph, NodeId};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Default `alpha` of [`SpecGreedyMethod::SparseCutDs`]
pub const DEFAULT_SPARSE_CUT_ALPHA: f64 = 1.0;

/// Default diagonal weights of [`SpecGreedyMethod::RiskAverse`]
pub const DEFAULT_RISK_LAMBDA: f64 = 1.0;

/// Objective family SpecGreedy optimizes
///
/// With `A` the weighted adjacency, `D` the weighted degrees and `D_w` the
/// node weights:
///
/// | Method | `P` | `Q` |
/// |--------|-----|-----|
/// | `Charikar` | `A` | `I` |
/// | `Fraudar` | `A + 2 D_w` | `I` |
/// | `MinQuotientCut` | `A - D` | `I` |
/// | `SparseCutDs` | `A - (2a / (2a + 1)) D` | `I` |
/// | `RiskAverse` | `A+ + l1 I` | `A- + l2 I` |
///
/// `I` stands for the mass of the configured [`crate::MassMode`]. Edge
/// weights are positive, so `A-` is zero for the risk-averse family.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SpecGreedyMethod {
    /// Plain average degree
    #[default]
    Charikar,
    /// Node weights count as suspiciousness
    Fraudar,
    /// Edges leaving the subset are penalized
    MinQuotientCut,
    /// Leaving edges penalized with a tunable weight
    SparseCutDs {
        /// Penalty parameter, non-negative
        alpha: f64,
    },
    /// Constant per-member reward and cost
    RiskAverse {
        /// Reward per member
        lambda1: f64,
        /// Cost per member, positive
        lambda2: f64,
    },
}

impl SpecGreedyMethod {
    /// `SparseCutDs` with the default `alpha`
    pub const SPARSE_CUT_DS: Self = Self::SparseCutDs {
        alpha: DEFAULT_SPARSE_CUT_ALPHA,
    };

    /// `RiskAverse` with the default lambdas
    pub const RISK_AVERSE: Self = Self::RiskAverse {
        lambda1: DEFAULT_RISK_LAMBDA,
        lambda2: DEFAULT_RISK_LAMBDA,
    };

    /// Short lowercase name used in logs and on the command line
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Charikar => "charikar",
            Self::Fraudar => "fraudar",
            Self::MinQuotientCut => "minquotientcut",
            Self::SparseCutDs { .. } => "sparsecutds",
            Self::RiskAverse { .. } => "risk-averse",
        }
    }

    /// Per-member term `P_vv / 2` added to the edge weight
    #[must_use]
    pub fn bias(self) -> NodeBias {
        match self {
            Self::Charikar => NodeBias::Zero,
            Self::Fraudar => NodeBias::NodeWeight(1.0),
            Self::MinQuotientCut => NodeBias::Degree(-0.5),
            Self::SparseCutDs { alpha } => NodeBias::Degree(-alpha / (2.0 * alpha + 1.0)),
            Self::RiskAverse { lambda1, .. } => NodeBias::Constant(lambda1 / 2.0),
        }
    }

    /// Method score from the biased objective value
    #[must_use]
    pub fn score(self, biased: f64) -> f64 {
        match self {
            Self::RiskAverse { lambda2, .. } => biased / lambda2,
            _ => biased,
        }
    }

    /// Reject parameters that make the quotient meaningless
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::MalformedInput`] for a negative or non-finite
    /// `alpha`, a non-finite `lambda1` or a non-positive `lambda2`.
    pub fn validate(self) -> DensityResult<()> {
        match self {
            Self::SparseCutDs { alpha } if !alpha.is_finite() || alpha < 0.0 => {
                Err(DensityError::MalformedInput(format!(
                    "sparsecutds alpha must be finite and non-negative, got {alpha}"
                )))
            }
            Self::RiskAverse { lambda1, lambda2 }
                if !lambda1.is_finite() || !lambda2.is_finite() || lambda2 <= 0.0 =>
            {
                Err(DensityError::MalformedInput(format!(
                    "risk-averse lambdas must be finite with lambda2 > 0, got {lambda1}, {lambda2}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SpecGreedyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SpecGreedy parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpecGreedyConfig {
    /// Density objective
    pub objective: DensityObjective,
    /// Objective family used to rank candidates
    pub method: SpecGreedyMethod,
    /// Truncated SVD parameters
    pub spectral: SpectralConfig,
    /// Local search parameters
    pub refine: RefineConfig,
}

/// What one seed produced
#[derive(Debug, Clone, PartialEq)]
pub struct SeedOutcome {
    /// Seed position (0 = leading singular vector)
    pub seed: usize,
    /// Singular value of the seed; `None` for the degree fallback
    pub singular_value: Option<f64>,
    /// Nodes the seed started from before refinement
    pub start_size: usize,
    /// Method score of the starting subset
    pub start_score: f64,
    /// Method score of the refined subset
    pub score: f64,
    /// Plain density of the refined subset
    pub density: f64,
    /// Local search result
    pub refined: Refinement,
}

/// Full SpecGreedy result with per-seed detail
#[derive(Debug, Clone, PartialEq)]
pub struct SpecGreedyReport {
    /// Highest-scoring local optimum over all explored seeds
    pub best: DenseSubgraph,
    /// Seeds explored, in order
    pub explored: Vec<SeedOutcome>,
    /// True when spectral seeding failed and the degree fallback ran
    pub degraded: bool,
}

/// Spectral-seed + greedy refinement engine
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecGreedy {
    config: SpecGreedyConfig,
}

impl SpecGreedy {
    /// Create the engine
    #[must_use]
    pub const fn new(config: SpecGreedyConfig) -> Self {
        Self { config }
    }

    /// Engine parameters
    #[must_use]
    pub const fn config(&self) -> &SpecGreedyConfig {
        &self.config
    }

    /// Run and keep per-seed detail
    ///
    /// # Errors
    ///
    /// - [`DensityError::InfeasibleGraph`] if the graph has no edges
    /// - [`DensityError::MalformedInput`] if the bipartite split or the method
    ///   parameters are invalid
    pub fn detect(&self, graph: &CsrGraph) -> DensityResult<SpecGreedyReport> {
        self.detect_within(graph, &Deadline::none())
    }

    /// [`SpecGreedy::detect`] bounded by `deadline`
    ///
    /// # Errors
    ///
    /// As [`SpecGreedy::detect`], plus [`DensityError::EngineTimeout`] once
    /// the deadline passes.
    #[instrument(
        name = "specgreedy",
        skip_all,
        err,
        fields(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            k = self.config.spectral.k,
            method = %self.config.method
        )
    )]
    pub fn detect_within(
        &self,
        graph: &CsrGraph,
        deadline: &Deadline,
    ) -> DensityResult<SpecGreedyReport> {
        if graph.num_edges() == 0 {
            return Err(DensityError::no_edges());
        }
        self.config.method.validate()?;

        let seeds = spectral_seeds_within(graph, &self.config.spectral, deadline);
        let (explored, degraded) = match seeds {
            Ok(seeds) if !seeds.seeds.is_empty() => {
                (self.explore_seeds(graph, &seeds, deadline)?, false)
            }
            Ok(_) => {
                warn!("spectral solver returned no seeds; using the highest-degree node");
                (vec![self.degree_fallback(graph, deadline)?], true)
            }
            Err(err @ DensityError::SpectralConvergence { .. }) => {
                warn!(error = %err, "spectral seeding failed; using the highest-degree node");
                (vec![self.degree_fallback(graph, deadline)?], true)
            }
            Err(err) => return Err(err),
        };

        let mut best: Option<&SeedOutcome> = None;
        for outcome in &explored {
            if best.map_or(true, |b| outcome.score > b.score) {
                best = Some(outcome);
            }
        }
        let best = best
            .map(|outcome| DenseSubgraph::new(outcome.refined.nodes.clone(), outcome.density))
            .ok_or_else(|| {
                DensityError::InfeasibleGraph("no seed produced a candidate subgraph".to_string())
            })?;

        debug!(
            size = best.len(),
            density = best.density(),
            seeds = explored.len(),
            degraded,
            "specgreedy finished"
        );
        Ok(SpecGreedyReport {
            best,
            explored,
            degraded,
        })
    }

    /// Objective peeling and refinement optimize
    fn search_objective(&self) -> DensityObjective {
        self.config.objective.with_bias(self.config.method.bias())
    }

    fn explore_seeds(
        &self,
        graph: &CsrGraph,
        seeds: &SpectralSeeds,
        deadline: &Deadline,
    ) -> DensityResult<Vec<SeedOutcome>> {
        let method = self.config.method;
        let objective = self.search_objective();
        let mut explored = Vec::with_capacity(seeds.seeds.len());
        let mut best_score = f64::NEG_INFINITY;

        for (index, seed) in seeds.seeds.iter().enumerate() {
            let scope: Vec<NodeId> = if seed.candidates.len() >= 2 {
                seed.candidates.clone()
            } else {
                seed.ordering.iter().copied().take(2).collect()
            };
            let (start, start_biased) =
                peel_within(graph, objective, Some(&scope), deadline)?.best_subset();
            let refined = refine_within(
                graph,
                objective,
                &seed.ordering,
                &start,
                &self.config.refine,
                deadline,
            )?;
            let singular_value = Some(seed.singular_value);
            let outcome = self.outcome(graph, index, singular_value, &start, start_biased, refined);
            debug!(
                seed = index,
                singular_value = seed.singular_value,
                candidates = scope.len(),
                start_score = outcome.start_score,
                score = outcome.score,
                density = outcome.density,
                iterations = outcome.refined.iterations,
                converged = outcome.refined.converged,
                "seed refined"
            );

            best_score = best_score.max(outcome.score);
            explored.push(outcome);

            // The singular value bounds plain density only
            if method != SpecGreedyMethod::Charikar {
                continue;
            }
            if let Some(next) = seeds.next_singular_value(index) {
                if best_score >= next {
                    debug!(seed = index, best_score, next, "remaining seeds cannot improve");
                    break;
                }
            }
        }
        Ok(explored)
    }

    fn degree_fallback(&self, graph: &CsrGraph, deadline: &Deadline) -> DensityResult<SeedOutcome> {
        let degrees = graph.degrees();
        let mut ordering: Vec<usize> = (0..graph.num_nodes()).collect();
        ordering.sort_by(|&a, &b| degrees[b].total_cmp(&degrees[a]).then(a.cmp(&b)));

        #[allow(clippy::cast_possible_truncation)] // node count fits u32 (checked at load)
        let ordering: Vec<NodeId> = ordering.into_iter().map(|node| NodeId(node as u32)).collect();
        let start: Vec<NodeId> = ordering.iter().copied().take(1).collect();
        let refined = refine_within(
            graph,
            self.search_objective(),
            &ordering,
            &start,
            &self.config.refine,
            deadline,
        )?;
        Ok(self.outcome(graph, 0, None, &start, 0.0, refined))
    }

    fn outcome(
        &self,
        graph: &CsrGraph,
        seed: usize,
        singular_value: Option<f64>,
        start: &[NodeId],
        start_biased: f64,
        refined: Refinement,
    ) -> SeedOutcome {
        let method = self.config.method;
        if !refined.converged {
            warn!(
                seed,
                iterations = refined.iterations,
                "refinement stopped at the move budget before a local optimum"
            );
        }
        SeedOutcome {
            seed,
            singular_value,
            start_size: start.len(),
            start_score: method.score(start_biased),
            score: method.score(refined.density),
            density: self.config.objective.density_of(graph, &refined.nodes),
            refined,
        }
    }
}

impl DensityEngine for SpecGreedy {
    fn kind(&self) -> EngineKind {
        EngineKind::SpecGreedy
    }

    fn run(&self, graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        self.run_within(graph, &Deadline::none())
    }

    fn run_within(&self, graph: &CsrGraph, deadline: &Deadline) -> DensityResult<DenseSubgraph> {
        self.detect_within(graph, deadline).map(|report| report.best)
    }
}
