//! Error taxonomy for density detection
//!
//! Loading errors are fatal to a whole comparison; every other variant is
//! scoped to one engine run and is recorded by the harness instead of
//! aborting sibling engines.

use std::time::Duration;
use thiserror::Error;

/// Result alias used by the graph model and the engines
pub type DensityResult<T> = std::result::Result<T, DensityError>;

/// Errors raised while loading graphs or running a density engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DensityError {
    /// Graph file or in-memory graph structure is invalid
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Singular-vector solver did not converge within its iteration budget
    #[error("spectral solver did not converge after {iterations} iterations (change {change:.3e})")]
    SpectralConvergence {
        /// Iterations performed before giving up
        iterations: usize,
        /// Largest singular-value change seen in the last iteration
        change: f64,
    },

    /// Density is undefined for this graph (no edges)
    #[error("infeasible graph: {0}")]
    InfeasibleGraph(String),

    /// Harness-enforced per-engine timeout expired
    #[error("engine {engine} timed out after {timeout:?}")]
    EngineTimeout {
        /// Engine tag (e.g. `FLOW`)
        engine: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Max-flow computation failed internally
    #[error("flow solve failed: {0}")]
    FlowSolve(String),

    /// Engine worker panicked or was cancelled before reporting
    #[error("engine {engine} aborted: {reason}")]
    EngineAborted {
        /// Engine tag
        engine: String,
        /// Join failure description
        reason: String,
    },
}

impl DensityError {
    /// Short machine-friendly kind label used in report lines
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::SpectralConvergence { .. } => "spectral_convergence",
            Self::InfeasibleGraph(_) => "infeasible_graph",
            Self::EngineTimeout { .. } => "engine_timeout",
            Self::FlowSolve(_) => "flow_solve",
            Self::EngineAborted { .. } => "engine_aborted",
        }
    }

    pub(crate) fn no_edges() -> Self {
        Self::InfeasibleGraph("graph has no edges; density is undefined".to_string())
    }
}
