//! Engine abstraction shared by the harness
//!
//! Each algorithm implements [`DensityEngine`] so the comparison harness can
//! iterate over a heterogeneous set of engines uniformly.

use super::flow::{FlowConfig, FlowExact};
use super::peeling::Charikar;
use super::refine::RefineConfig;
use super::specgreedy::{SpecGreedy, SpecGreedyConfig, SpecGreedyMethod};
use super::spectral::SpectralConfig;
use crate::error::{DensityError, DensityResult};
use crate::objective::{DensityObjective, MassMode};
use crate::storage::{CsrGraph, NodeId};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Detected subgraph: sorted member IDs and their density
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSubgraph {
    nodes: Vec<NodeId>,
    density: f64,
}

impl DenseSubgraph {
    /// Create a result; members are sorted and deduplicated
    #[must_use]
    pub fn new(mut nodes: Vec<NodeId>, density: f64) -> Self {
        nodes.sort_unstable();
        nodes.dedup();
        Self { nodes, density }
    }

    /// Members in ascending order
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Density score under the engine's objective
    #[must_use]
    pub const fn density(&self) -> f64 {
        self.density
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the subgraph has no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Membership test (binary search over the sorted members)
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }
}

/// Engines known to the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineKind {
    /// Greedy peeling 2-approximation
    Charikar,
    /// Spectral seeds + greedy refinement
    SpecGreedy,
    /// Exact parametric max-flow
    Flow,
}

impl EngineKind {
    /// Every engine, in report order
    pub const ALL: [Self; 3] = [Self::Charikar, Self::Flow, Self::SpecGreedy];

    /// Fixed literal tag used in report lines
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Charikar => "CHARIKAR",
            Self::SpecGreedy => "SPECGREEDY",
            Self::Flow => "FLOW",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EngineKind {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "charikar" => Ok(Self::Charikar),
            "specgreedy" | "spec-greedy" => Ok(Self::SpecGreedy),
            "flow" => Ok(Self::Flow),
            other => Err(DensityError::MalformedInput(format!(
                "unknown engine `{other}`; expected charikar, specgreedy or flow"
            ))),
        }
    }
}

/// Wall-clock limit checked cooperatively inside engine loops
///
/// Engines poll [`Deadline::check`] between units of work (binary search
/// steps, solver iterations, local search moves) and give up with
/// [`DensityError::EngineTimeout`] once it has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    limit: Option<Limit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Limit {
    engine: EngineKind,
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// No limit
    #[must_use]
    pub const fn none() -> Self {
        Self { limit: None }
    }

    /// Limit `engine` to `timeout` from now
    ///
    /// A timeout too large to represent is treated as no limit.
    #[must_use]
    pub fn after(engine: EngineKind, timeout: Duration) -> Self {
        Self {
            limit: Instant::now().checked_add(timeout).map(|at| Limit {
                engine,
                at,
                timeout,
            }),
        }
    }

    /// Whether the limit has passed
    #[must_use]
    pub fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| Instant::now() >= limit.at)
    }

    /// Fail once the limit has passed
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::EngineTimeout`] after the deadline.
    pub fn check(&self) -> DensityResult<()> {
        match self.limit {
            Some(limit) if Instant::now() >= limit.at => Err(DensityError::EngineTimeout {
                engine: limit.engine.tag().to_string(),
                timeout: limit.timeout,
            }),
            _ => Ok(()),
        }
    }
}

/// A densest-subgraph algorithm
pub trait DensityEngine: Send + Sync {
    /// Which engine this is
    fn kind(&self) -> EngineKind;

    /// Run on a graph and return the best subgraph found
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::InfeasibleGraph`] for graphs without edges and
    /// engine-specific failures otherwise.
    fn run(&self, graph: &CsrGraph) -> DensityResult<DenseSubgraph>;

    /// Run, stopping early once `deadline` passes
    ///
    /// The default ignores the deadline; the built-in engines poll it.
    ///
    /// # Errors
    ///
    /// As [`DensityEngine::run`], plus [`DensityError::EngineTimeout`].
    fn run_within(&self, graph: &CsrGraph, deadline: &Deadline) -> DensityResult<DenseSubgraph> {
        let _ = deadline;
        self.run(graph)
    }
}

/// Configuration for all engines
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Mass normalizer of the density objective
    pub mass_mode: MassMode,
    /// Spectral seeding parameters (SpecGreedy)
    pub spectral: SpectralConfig,
    /// Local search parameters (SpecGreedy)
    pub refine: RefineConfig,
    /// Binary search and network parameters (Flow)
    pub flow: FlowConfig,
    /// Objective optimized by the seed search (SpecGreedy)
    pub method: SpecGreedyMethod,
}

impl EngineConfig {
    /// Set the mass normalizer
    #[must_use]
    pub const fn with_mass_mode(mut self, mass_mode: MassMode) -> Self {
        self.mass_mode = mass_mode;
        self
    }

    /// Set the spectral parameters
    #[must_use]
    pub const fn with_spectral(mut self, spectral: SpectralConfig) -> Self {
        self.spectral = spectral;
        self
    }

    /// Set the local search parameters
    #[must_use]
    pub const fn with_refine(mut self, refine: RefineConfig) -> Self {
        self.refine = refine;
        self
    }

    /// Set the flow parameters
    #[must_use]
    pub const fn with_flow(mut self, flow: FlowConfig) -> Self {
        self.flow = flow;
        self
    }

    /// Set the SpecGreedy method
    #[must_use]
    pub const fn with_method(mut self, method: SpecGreedyMethod) -> Self {
        self.method = method;
        self
    }

    /// Objective derived from the mass mode
    #[must_use]
    pub const fn objective(&self) -> DensityObjective {
        DensityObjective::new(self.mass_mode)
    }
}

/// Instantiate an engine from its kind and the shared configuration
#[must_use]
pub fn build_engine(kind: EngineKind, config: &EngineConfig) -> Box<dyn DensityEngine> {
    match kind {
        EngineKind::Charikar => Box::new(Charikar::new(config.objective())),
        EngineKind::SpecGreedy => Box::new(SpecGreedy::new(SpecGreedyConfig {
            objective: config.objective(),
            spectral: config.spectral,
            refine: config.refine,
            method: config.method,
        })),
        EngineKind::Flow => Box::new(FlowExact::new(config.objective(), config.flow)),
    }
}
