//! Densest-subgraph engines (greedy peeling, SpecGreedy, exact flow)
//!
//! All engines implement [`DensityEngine`] and score subsets with the shared
//! [`crate::objective::DensityObjective`].

pub mod engine;
pub mod flow;
mod heap;
mod maxflow;
pub mod peeling;
pub mod refine;
pub mod specgreedy;
pub mod spectral;

pub use engine::{build_engine, Deadline, DenseSubgraph, DensityEngine, EngineConfig, EngineKind};
pub use flow::{
    evaluate_guess, FlowConfig, FlowExact, FlowFormulation, FlowReport, FlowStep, GuessEvaluation,
};
pub use peeling::{peel, peel_within, Charikar, PeelStep, PeelingSequence};
pub use refine::{refine, refine_within, RefineConfig, Refinement};
pub use specgreedy::{
    SeedOutcome, SpecGreedy, SpecGreedyConfig, SpecGreedyMethod, SpecGreedyReport,
};
pub use spectral::{
    spectral_seeds, spectral_seeds_within, Partition, SpectralConfig, SpectralSeed, SpectralSeeds,
};
