//! trueno-densest: densest-subgraph detection on weighted graphs
//!
//! # Overview
//!
//! Finds the node subset maximizing `weight(E(S)) / mass(S)`, a proxy for
//! dense anomalous clusters such as fraud rings. Three engines solve the
//! problem with different cost/quality trade-offs and share one objective:
//!
//! - [`Charikar`]: greedy peeling, a 2-approximation in O((n + m) log n)
//! - [`SpecGreedy`]: truncated-SVD seeds refined by greedy local search
//! - [`FlowExact`]: parametric min-cut with binary search, optimal up to ε
//!
//! # Quick Start
//!
//! ```
//! use trueno_densest::{build_engine, parse_edge_list, EngineConfig, EngineKind, NodeId};
//!
//! // 3-clique plus a light pendant edge
//! let graph = parse_edge_list("4 4\n1 1 1 1\n0 1 1\n1 2 1\n0 2 1\n2 3 0.5\n").unwrap();
//!
//! let engine = build_engine(EngineKind::Charikar, &EngineConfig::default());
//! let found = engine.run(&graph).unwrap();
//! assert_eq!(found.nodes(), &[NodeId(0), NodeId(1), NodeId(2)]);
//! assert_eq!(found.density(), 1.0);
//! ```
//!
//! # Architecture
//!
//! - **Storage**: immutable CSR adjacency with node weights, edge-list I/O
//! - **Objective**: node-count or weighted-mass density, incremental tracker
//! - **Algorithms**: peeling, spectral seeding (`faer`), Dinic max-flow
//! - **Harness**: async per-engine timing, timeouts and text reports (tokio)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod error;
pub mod generator;
pub mod harness;
pub mod logging;
pub mod objective;
pub mod storage;

// Re-export core types
pub use algorithms::{
    build_engine, evaluate_guess, peel, refine, spectral_seeds, Charikar, Deadline, DenseSubgraph,
    DensityEngine, EngineConfig, EngineKind, FlowConfig, FlowExact, FlowFormulation, FlowReport,
    Partition, PeelingSequence, RefineConfig, Refinement, SpecGreedy, SpecGreedyConfig,
    SpecGreedyMethod, SpecGreedyReport, SpectralConfig,
};
pub use error::{DensityError, DensityResult};
pub use harness::{
    compare, compare_file, ComparisonReport, EngineRun, HarnessConfig, ReportSink, TextReport,
};
pub use objective::{density_of, DensityObjective, MassMode, NodeBias};
pub use storage::{parse_edge_list, CsrGraph, NodeId};

// Error type
pub use anyhow::{Error, Result};
