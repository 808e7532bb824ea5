//! Command-line driver for trueno-densest
//!
//! `compare` runs the engines on an edge-list file, `generate` writes a
//! synthetic graph and `bench` repeats generate/compare rounds. Reports go to
//! stdout (or `--out`); diagnostics go to stderr through `tracing`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use trueno_densest::algorithms::specgreedy::{DEFAULT_RISK_LAMBDA, DEFAULT_SPARSE_CUT_ALPHA};
use trueno_densest::algorithms::spectral::DEFAULT_SPECTRAL_K;
use trueno_densest::generator::{planted_clusters, uniform_random, PlantedConfig};
use trueno_densest::harness::{run_benchmark, BenchmarkConfig, GeneratorKind};
use trueno_densest::logging::{self, LoggingError};
use trueno_densest::{
    compare_file, EngineConfig, EngineKind, FlowConfig, FlowFormulation, HarnessConfig, MassMode,
    Partition, SpecGreedyMethod, SpectralConfig, TextReport,
};

/// How long runtime shutdown waits for engine workers that ignore their deadline
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Top-level options
#[derive(Debug, Parser)]
#[command(
    name = "trueno-densest",
    version,
    about = "Densest-subgraph detection and engine comparison"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the engines on an edge-list file and print a report
    Compare(CompareArgs),
    /// Write a synthetic graph in edge-list format
    Generate(GenerateArgs),
    /// Repeat generate + compare rounds and print average timings
    Bench(BenchArgs),
}

/// Engine parameters shared by `compare` and `bench`
#[derive(Debug, Args)]
struct EngineArgs {
    /// Engines to run, in report order
    #[arg(long, value_delimiter = ',', default_values_t = EngineKind::ALL)]
    engines: Vec<EngineKind>,

    /// Density denominator
    #[arg(long, value_enum, default_value_t = MassArg::Nodes)]
    mass: MassArg,

    /// Singular triplets computed by SpecGreedy
    #[arg(long, default_value_t = DEFAULT_SPECTRAL_K)]
    k: usize,

    /// Objective family SpecGreedy optimizes
    #[arg(long, value_enum, default_value_t = MethodArg::Charikar)]
    sg_method: MethodArg,

    /// Leaving-edge penalty of `sparsecutds`
    #[arg(long, default_value_t = DEFAULT_SPARSE_CUT_ALPHA)]
    sg_alpha: f64,

    /// Per-member reward of `risk-averse`
    #[arg(long, default_value_t = DEFAULT_RISK_LAMBDA)]
    sg_lambda1: f64,

    /// Per-member cost of `risk-averse`
    #[arg(long, default_value_t = DEFAULT_RISK_LAMBDA)]
    sg_lambda2: f64,

    /// Treat nodes `0..LEFT` as the left side of a bipartite graph
    #[arg(long)]
    bipartite_left: Option<usize>,

    /// Binary search tolerance of the exact engine
    #[arg(long)]
    epsilon: Option<f64>,

    /// Flow network construction
    #[arg(long, value_enum, default_value_t = FormulationArg::DegreeSource)]
    formulation: FormulationArg,

    /// Per-engine wall-clock limit in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Run engines concurrently
    #[arg(long)]
    parallel: bool,
}

#[derive(Debug, Args)]
struct CompareArgs {
    /// Edge-list file to analyze
    graph: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,

    /// Write the report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Omit member lists from result lines
    #[arg(long)]
    no_members: bool,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Graph family
    #[arg(long, default_value_t = GeneratorKind::Planted)]
    kind: GeneratorKind,

    /// Number of nodes
    #[arg(short, long)]
    nodes: usize,

    /// Number of edges
    #[arg(short, long)]
    edges: usize,

    /// RNG seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Planted clusters (defaults to a size-derived count)
    #[arg(long)]
    clusters: Option<usize>,

    /// Edge probability inside planted clusters
    #[arg(long, default_value_t = 0.8)]
    cluster_density: f64,

    /// Weight of every generated edge
    #[arg(long, default_value_t = 1.0)]
    weight: f64,

    /// Output file (stdout when omitted)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct BenchArgs {
    /// Graph family
    #[arg(long, default_value_t = GeneratorKind::Planted)]
    kind: GeneratorKind,

    /// Nodes per generated graph
    #[arg(short, long)]
    nodes: usize,

    /// Edges per generated graph
    #[arg(short, long)]
    edges: usize,

    /// Number of rounds
    #[arg(long, default_value_t = 5)]
    runs: usize,

    /// Base seed; round k uses seed + k
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory receiving graph_run{k}.txt and compare_run{k}.txt
    #[arg(long, default_value = "bench-out")]
    output_dir: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MassArg {
    /// |S|
    Nodes,
    /// Sum of node weights in S
    Weighted,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    /// Plain average degree
    Charikar,
    /// Node weights add to the score
    Fraudar,
    /// Leaving edges count against the score
    Minquotientcut,
    /// Leaving edges weighted by --sg-alpha
    Sparsecutds,
    /// Per-member reward and cost from --sg-lambda1 and --sg-lambda2
    RiskAverse,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormulationArg {
    /// Source arcs carry weighted degrees
    DegreeSource,
    /// Goldberg's construction with a large constant
    Goldberg,
}

impl EngineArgs {
    fn harness_config(&self) -> Result<HarnessConfig> {
        let mass_mode = match self.mass {
            MassArg::Nodes => MassMode::NodeCount,
            MassArg::Weighted => MassMode::WeightedMass,
        };
        let formulation = match self.formulation {
            FormulationArg::DegreeSource => FlowFormulation::DegreeSource,
            FormulationArg::Goldberg => FlowFormulation::Goldberg,
        };
        let partition = self
            .bipartite_left
            .map_or(Partition::Unipartite, |left| Partition::Bipartite { left });
        let method = match self.sg_method {
            MethodArg::Charikar => SpecGreedyMethod::Charikar,
            MethodArg::Fraudar => SpecGreedyMethod::Fraudar,
            MethodArg::Minquotientcut => SpecGreedyMethod::MinQuotientCut,
            MethodArg::Sparsecutds => SpecGreedyMethod::SparseCutDs {
                alpha: self.sg_alpha,
            },
            MethodArg::RiskAverse => SpecGreedyMethod::RiskAverse {
                lambda1: self.sg_lambda1,
                lambda2: self.sg_lambda2,
            },
        };
        method.validate()?;

        let mut flow = FlowConfig::default().with_formulation(formulation);
        if let Some(epsilon) = self.epsilon {
            anyhow::ensure!(epsilon > 0.0, "--epsilon must be positive, got {epsilon}");
            flow = flow.with_epsilon(epsilon);
        }

        let engine_config = EngineConfig::default()
            .with_mass_mode(mass_mode)
            .with_spectral(SpectralConfig::default().with_k(self.k).with_partition(partition))
            .with_flow(flow)
            .with_method(method);

        let mut config = HarnessConfig::default()
            .with_engines(self.engines.clone())
            .with_engine_config(engine_config)
            .with_parallel(self.parallel);
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

async fn run_compare(args: CompareArgs) -> Result<()> {
    let config = args.engine.harness_config()?;
    let writer: Box<dyn Write + Send> = match &args.out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut sink = TextReport::new(writer).with_members(!args.no_members);

    let report = compare_file(&args.graph, &config, &mut sink)
        .await
        .with_context(|| format!("Failed to compare engines on {}", args.graph.display()))?;
    info!(
        runs = report.runs.len(),
        failures = report.failures().count(),
        "comparison finished"
    );
    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let graph = match args.kind {
        GeneratorKind::Uniform => uniform_random(args.nodes, args.edges, args.weight, args.seed)?,
        GeneratorKind::Planted => {
            let mut config = PlantedConfig::new(args.nodes, args.edges)
                .with_cluster_density(args.cluster_density)
                .with_edge_weight(args.weight)
                .with_seed(args.seed);
            if let Some(clusters) = args.clusters {
                config = config.with_clusters(clusters);
            }
            planted_clusters(&config)?
        }
    };

    match &args.out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            graph.write_edge_list(&mut writer)?;
            writer.flush()?;
            info!(
                path = %path.display(),
                nodes = graph.num_nodes(),
                edges = graph.num_edges(),
                "graph written"
            );
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            graph.write_edge_list(&mut writer)?;
            writer.flush()?;
        }
    }
    Ok(())
}

async fn run_bench(args: BenchArgs) -> Result<()> {
    let config = BenchmarkConfig::new(args.nodes, args.edges, args.runs, args.output_dir)
        .with_generator(args.kind)
        .with_seed(args.seed)
        .with_harness(args.engine.harness_config()?);
    let summary = run_benchmark(&config).await?;

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    summary.render(&mut writer).context("Failed to render summary")?;
    writer.flush().context("Failed to flush output")?;
    Ok(())
}

async fn try_main() -> Result<()> {
    match Cli::parse().command {
        Command::Compare(args) => run_compare(args).await,
        Command::Generate(args) => run_generate(&args),
        Command::Bench(args) => run_bench(args).await,
    }
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(try_main());
    // Blocking workers that outlive their deadline must not hold the process open
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(err) = result {
        let message = format!("{err:#}");
        error!(error = %message, "command execution failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
