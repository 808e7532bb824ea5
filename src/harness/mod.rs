//! Comparison harness and benchmark driver
//!
//! [`compare`] runs each requested engine once on a shared read-only graph,
//! timing it on a tokio blocking worker. Failures, panics and timeouts are
//! recorded as entries; they never abort the remaining engines. Only graph
//! loading ([`compare_file`]) and report I/O errors end a comparison early.

pub mod benchmark;
pub mod report;

pub use benchmark::{run_benchmark, BenchmarkConfig, BenchmarkSummary, GeneratorKind};
pub use report::{parse_time_lines, ReportSink, TextReport};

use crate::algorithms::{
    build_engine, Deadline, DenseSubgraph, DensityEngine, EngineConfig, EngineKind,
};
use crate::error::{DensityError, DensityResult};
use crate::storage::CsrGraph;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Which engines to run and how
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Engines in report order
    pub engines: Vec<EngineKind>,
    /// Shared engine parameters
    pub engine_config: EngineConfig,
    /// Per-engine wall-clock limit
    pub timeout: Option<Duration>,
    /// Run engines concurrently instead of one after another
    pub parallel: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            engines: EngineKind::ALL.to_vec(),
            engine_config: EngineConfig::default(),
            timeout: None,
            parallel: false,
        }
    }
}

impl HarnessConfig {
    /// Set the engines to run
    #[must_use]
    pub fn with_engines(mut self, engines: Vec<EngineKind>) -> Self {
        self.engines = engines;
        self
    }

    /// Set the engine parameters
    #[must_use]
    pub fn with_engine_config(mut self, engine_config: EngineConfig) -> Self {
        self.engine_config = engine_config;
        self
    }

    /// Set the per-engine timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable concurrent engine runs
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Record of one engine invocation; never mutated after creation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRun {
    /// Engine that ran
    pub engine: EngineKind,
    /// Wall-clock time until the result (or the timeout)
    pub elapsed: Duration,
    /// Subgraph found, or the failure
    pub outcome: DensityResult<DenseSubgraph>,
}

/// All engine runs of one comparison, in requested order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonReport {
    /// Runs in requested order
    pub runs: Vec<EngineRun>,
}

impl ComparisonReport {
    /// First run of `engine`
    #[must_use]
    pub fn get(&self, engine: EngineKind) -> Option<&EngineRun> {
        self.runs.iter().find(|run| run.engine == engine)
    }

    /// Density reported by `engine`, if it succeeded
    #[must_use]
    pub fn density(&self, engine: EngineKind) -> Option<f64> {
        self.get(engine)
            .and_then(|run| run.outcome.as_ref().ok())
            .map(DenseSubgraph::density)
    }

    /// Runs that ended in an error
    pub fn failures(&self) -> impl Iterator<Item = &EngineRun> {
        self.runs.iter().filter(|run| run.outcome.is_err())
    }
}

/// Run the configured engines on `graph`
///
/// # Errors
///
/// Returns error only if the report sink fails; engine failures are recorded
/// in the report.
pub async fn compare(
    graph: Arc<CsrGraph>,
    config: &HarnessConfig,
    sink: &mut dyn ReportSink,
) -> Result<ComparisonReport> {
    let engines = config
        .engines
        .iter()
        .map(|&kind| build_engine(kind, &config.engine_config))
        .collect();
    compare_engines(graph, engines, config, sink).await
}

/// Load a graph file and compare the configured engines on it
///
/// # Errors
///
/// Returns error if the graph cannot be read or parsed (fatal to the whole
/// comparison) or if the report sink fails.
pub async fn compare_file<P: AsRef<Path>>(
    path: P,
    config: &HarnessConfig,
    sink: &mut dyn ReportSink,
) -> Result<ComparisonReport> {
    let graph = CsrGraph::read_edge_list(path).await?;
    compare(Arc::new(graph), config, sink).await
}

/// Run explicit engine instances on `graph`
///
/// `config.engines` is ignored; `config.timeout` and `config.parallel` apply.
///
/// # Errors
///
/// Returns error only if the report sink fails.
#[instrument(
    name = "compare",
    skip_all,
    fields(
        nodes = graph.num_nodes(),
        edges = graph.num_edges(),
        engines = engines.len(),
        parallel = config.parallel
    )
)]
pub async fn compare_engines(
    graph: Arc<CsrGraph>,
    engines: Vec<Box<dyn DensityEngine>>,
    config: &HarnessConfig,
    sink: &mut dyn ReportSink,
) -> Result<ComparisonReport> {
    let mut report = ComparisonReport::default();

    if config.parallel {
        let handles: Vec<_> = engines
            .into_iter()
            .map(|engine| {
                let kind = engine.kind();
                let graph = Arc::clone(&graph);
                (kind, tokio::spawn(run_engine(engine, graph, config.timeout)))
            })
            .collect();
        for (kind, handle) in handles {
            let run = handle.await.unwrap_or_else(|err| EngineRun {
                engine: kind,
                elapsed: Duration::ZERO,
                outcome: Err(DensityError::EngineAborted {
                    engine: kind.tag().to_string(),
                    reason: err.to_string(),
                }),
            });
            log_run(&run);
            sink.record(&run)?;
            report.runs.push(run);
        }
    } else {
        for engine in engines {
            let run = run_engine(engine, Arc::clone(&graph), config.timeout).await;
            log_run(&run);
            sink.record(&run)?;
            report.runs.push(run);
        }
    }

    Ok(report)
}

/// Time one engine on a blocking worker
///
/// The engine gets a [`Deadline`] for the same limit and stops at its next
/// check. An engine that never checks is abandoned once the limit passes and
/// its result is discarded.
async fn run_engine(
    engine: Box<dyn DensityEngine>,
    graph: Arc<CsrGraph>,
    timeout: Option<Duration>,
) -> EngineRun {
    let kind = engine.kind();
    let start = Instant::now();
    let deadline = timeout.map_or_else(Deadline::none, |limit| Deadline::after(kind, limit));
    let task = tokio::task::spawn_blocking(move || engine.run_within(&graph, &deadline));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                return EngineRun {
                    engine: kind,
                    elapsed: start.elapsed(),
                    outcome: Err(DensityError::EngineTimeout {
                        engine: kind.tag().to_string(),
                        timeout: limit,
                    }),
                }
            }
        },
        None => task.await,
    };

    let outcome = joined.unwrap_or_else(|err| {
        Err(DensityError::EngineAborted {
            engine: kind.tag().to_string(),
            reason: err.to_string(),
        })
    });
    EngineRun {
        engine: kind,
        elapsed: start.elapsed(),
        outcome,
    }
}

fn log_run(run: &EngineRun) {
    match &run.outcome {
        Ok(subgraph) => info!(
            engine = %run.engine,
            density = subgraph.density(),
            size = subgraph.len(),
            elapsed_ms = run.elapsed.as_secs_f64() * 1e3,
            "engine finished"
        ),
        Err(err) => warn!(
            engine = %run.engine,
            kind = err.kind(),
            error = %err,
            elapsed_ms = run.elapsed.as_secs_f64() * 1e3,
            "engine failed"
        ),
    }
}
