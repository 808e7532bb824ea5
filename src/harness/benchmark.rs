//! Repeated generate → compare rounds with averaged timings
//!
//! Round `k` (1-based) writes `graph_run{k}.txt` and `compare_run{k}.txt`
//! into the configured output directory. Timings are read back from the
//! report's `[TIME]` lines, so the averages reflect exactly what was written.

use super::report::{parse_time_lines, TextReport};
use super::{compare, HarnessConfig};
use crate::algorithms::EngineKind;
use crate::error::DensityError;
use crate::generator::{planted_clusters, uniform_random, PlantedConfig};
use crate::storage::CsrGraph;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

/// Synthetic graph family used per round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    /// Planted dense clusters plus uniform noise
    #[default]
    Planted,
    /// Uniform random edges
    Uniform,
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planted => "planted",
            Self::Uniform => "uniform",
        })
    }
}

impl FromStr for GeneratorKind {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planted" => Ok(Self::Planted),
            "uniform" | "random" => Ok(Self::Uniform),
            other => Err(DensityError::MalformedInput(format!(
                "unknown generator `{other}`; expected planted or uniform"
            ))),
        }
    }
}

/// Benchmark parameters; every path is explicit
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Graph family
    pub generator: GeneratorKind,
    /// Nodes per generated graph
    pub nodes: usize,
    /// Edges per generated graph
    pub edges: usize,
    /// Number of rounds
    pub runs: usize,
    /// Base seed; round `k` uses `seed + k`
    pub seed: u64,
    /// Directory receiving graph and report files
    pub output_dir: PathBuf,
    /// Engines and their parameters
    pub harness: HarnessConfig,
}

impl BenchmarkConfig {
    /// Planted-cluster benchmark with default harness settings
    #[must_use]
    pub fn new(nodes: usize, edges: usize, runs: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator: GeneratorKind::Planted,
            nodes,
            edges,
            runs,
            seed: 0,
            output_dir: output_dir.into(),
            harness: HarnessConfig::default(),
        }
    }

    /// Set the graph family
    #[must_use]
    pub const fn with_generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = generator;
        self
    }

    /// Set the base seed
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the harness configuration
    #[must_use]
    pub fn with_harness(mut self, harness: HarnessConfig) -> Self {
        self.harness = harness;
        self
    }

    fn generate(&self, round: usize) -> Result<CsrGraph> {
        let seed = self.seed.wrapping_add(round as u64);
        let graph = match self.generator {
            GeneratorKind::Planted => {
                planted_clusters(&PlantedConfig::new(self.nodes, self.edges).with_seed(seed))?
            }
            GeneratorKind::Uniform => uniform_random(self.nodes, self.edges, 1.0, seed)?,
        };
        Ok(graph)
    }
}

/// Averages and per-round scores of a benchmark
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkSummary {
    /// Completed rounds
    pub runs: usize,
    /// Mean elapsed seconds per engine tag
    pub average_seconds: BTreeMap<String, f64>,
    /// Per-round density of each engine that succeeded
    pub densities: Vec<BTreeMap<EngineKind, f64>>,
    /// Failed engine runs over all rounds
    pub failures: usize,
}

impl BenchmarkSummary {
    /// Write `[AVG] <TAG> <seconds> s` lines, one per engine
    ///
    /// # Errors
    ///
    /// Returns error if the writer fails
    pub fn render<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "[RUNS] {}", self.runs)?;
        for (tag, seconds) in &self.average_seconds {
            writeln!(writer, "[AVG] {tag} {seconds:.6} s")?;
        }
        writeln!(writer, "[FAILURES] {}", self.failures)
    }
}

/// Run `config.runs` rounds and aggregate timings
///
/// # Errors
///
/// Returns error if a graph cannot be generated or any file cannot be
/// written. Engine failures are counted, not propagated.
#[allow(clippy::cast_precision_loss)] // round counts are small
#[instrument(
    name = "benchmark",
    skip_all,
    fields(
        generator = %config.generator,
        nodes = config.nodes,
        edges = config.edges,
        runs = config.runs
    )
)]
pub async fn run_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkSummary> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut summary = BenchmarkSummary::default();

    for round in 1..=config.runs {
        let graph = config
            .generate(round)
            .with_context(|| format!("Failed to generate graph for round {round}"))?;
        let graph_path = config.output_dir.join(format!("graph_run{round}.txt"));
        graph.write_edge_list_file(&graph_path).await?;
        let graph = CsrGraph::read_edge_list(&graph_path).await?;

        let mut sink = TextReport::new(Vec::new());
        let report = compare(Arc::new(graph), &config.harness, &mut sink).await?;
        let text = String::from_utf8(sink.into_inner()).context("Report is not UTF-8")?;

        let report_path = config.output_dir.join(format!("compare_run{round}.txt"));
        tokio::fs::write(&report_path, &text)
            .await
            .with_context(|| format!("Failed to write {}", report_path.display()))?;

        for (tag, seconds) in parse_time_lines(&text) {
            let entry = totals.entry(tag).or_insert((0.0, 0));
            entry.0 += seconds;
            entry.1 += 1;
        }
        summary.failures += report.failures().count();
        summary.densities.push(
            report
                .runs
                .iter()
                .filter_map(|run| run.outcome.as_ref().ok().map(|sub| (run.engine, sub.density())))
                .collect(),
        );
        summary.runs += 1;
        info!(round, report = %report_path.display(), "benchmark round finished");
    }

    summary.average_seconds = totals
        .into_iter()
        .map(|(tag, (total, count))| (tag, total / count as f64))
        .collect();
    Ok(summary)
}
