//! Integration tests for trueno-densest
//!
//! End-to-end scenarios: small hand-checked graphs through every engine, the
//! bipartite fraud-block case, and harness failure isolation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use trueno_densest::algorithms::{DenseSubgraph, DensityEngine, EngineKind};
use trueno_densest::generator::{planted_clusters, PlantedConfig};
use trueno_densest::harness::compare_engines;
use trueno_densest::{
    build_engine, compare, compare_file, density_of, parse_edge_list, CsrGraph, Deadline,
    DensityError, DensityResult, EngineConfig, HarnessConfig, MassMode, NodeId, Partition,
    SpecGreedy, SpecGreedyConfig, SpecGreedyMethod, SpectralConfig, TextReport,
};

fn ids(nodes: impl IntoIterator<Item = u32>) -> Vec<NodeId> {
    nodes.into_iter().map(NodeId).collect()
}

fn run(kind: EngineKind, graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
    build_engine(kind, &EngineConfig::default()).run(graph)
}

/// Triangle {0,1,2} with a pendant edge (2,3)
fn clique_with_pendant(pendant_weight: f64) -> CsrGraph {
    let edges = [(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0), (2, 3, pendant_weight)];
    CsrGraph::from_edges(4, &edges).unwrap()
}

#[test]
fn test_clique_with_unit_pendant() {
    // Whole graph and the triangle both score 1.0
    let graph = clique_with_pendant(1.0);

    for kind in [EngineKind::Charikar, EngineKind::Flow] {
        let found = run(kind, &graph).unwrap();
        assert!((found.density() - 1.0).abs() < 1e-9, "{kind}: {}", found.density());
        for node in ids(0..3) {
            assert!(found.contains(node), "{kind} lost clique node {node:?}");
        }
    }
}

#[test]
fn test_clique_with_light_pendant() {
    let graph = clique_with_pendant(0.5);

    for kind in EngineKind::ALL {
        let found = run(kind, &graph).unwrap();
        assert_eq!(found.nodes(), ids(0..3).as_slice(), "{kind}");
        assert!((found.density() - 1.0).abs() < 1e-9, "{kind}: {}", found.density());
    }
}

#[test]
fn test_reported_density_matches_members() {
    let text = "5 6\n1 2 1 1 3\n0 1 2\n1 2 1\n0 2 1.5\n2 3 1\n3 4 0.5\n1 4 1\n";
    let graph = parse_edge_list(text).unwrap();

    for mass_mode in [MassMode::NodeCount, MassMode::WeightedMass] {
        let config = EngineConfig::default().with_mass_mode(mass_mode);
        for kind in EngineKind::ALL {
            let found = build_engine(kind, &config).run(&graph).unwrap();
            let expected = density_of(found.nodes(), &graph, mass_mode);
            assert!((found.density() - expected).abs() < 1e-12, "{kind} {mass_mode:?}");
        }
    }
}

#[test]
fn test_edgeless_graph_is_infeasible_for_every_engine() {
    let graph = parse_edge_list("3 0\n1 1 1\n").unwrap();

    for kind in EngineKind::ALL {
        let err = run(kind, &graph).unwrap_err();
        assert_eq!(err.kind(), "infeasible_graph", "{kind}: {err}");
    }
}

#[test]
fn test_bipartite_fraud_block_recovered() {
    // Users 0..8, products 8..16; block A = users 0..4 x products 8..12 with
    // doubled weights, block B = users 4..8 x products 12..16
    let mut edges = Vec::new();
    for user in 0..4 {
        for product in 8..12 {
            edges.push((user, product, 2.0));
        }
    }
    for user in 4..8 {
        for product in 12..16 {
            edges.push((user, product, 1.0));
        }
    }
    let graph = CsrGraph::from_edges(16, &edges).unwrap();

    let engine = SpecGreedy::new(SpecGreedyConfig {
        spectral: SpectralConfig::default()
            .with_k(2)
            .with_partition(Partition::Bipartite { left: 8 }),
        ..SpecGreedyConfig::default()
    });
    let report = engine.detect(&graph).unwrap();

    let expected: Vec<NodeId> = ids((0..4).chain(8..12));
    assert!(!report.degraded);
    assert_eq!(report.best.nodes(), expected.as_slice());
    assert!((report.best.density() - 4.0).abs() < 1e-9);

    let exact = run(EngineKind::Flow, &graph).unwrap();
    assert_eq!(exact.nodes(), expected.as_slice());
}

struct FailingEngine;

impl DensityEngine for FailingEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Flow
    }

    fn run(&self, _graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        Err(DensityError::FlowSolve("injected failure".to_string()))
    }
}

struct PanickingEngine;

impl DensityEngine for PanickingEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::SpecGreedy
    }

    fn run(&self, _graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        panic!("injected panic");
    }
}

struct SlowEngine;

impl DensityEngine for SlowEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Flow
    }

    fn run(&self, _graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        thread::sleep(Duration::from_millis(500));
        Ok(DenseSubgraph::new(vec![NodeId(0), NodeId(1)], 1.0))
    }
}

#[tokio::test]
async fn test_engine_failures_are_isolated() {
    let graph = Arc::new(clique_with_pendant(0.5));
    let engines: Vec<Box<dyn DensityEngine>> = vec![
        Box::new(FailingEngine),
        Box::new(PanickingEngine),
        build_engine(EngineKind::Charikar, &EngineConfig::default()),
    ];

    let mut sink = TextReport::new(Vec::new());
    let report = compare_engines(graph, engines, &HarnessConfig::default(), &mut sink)
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 3);
    assert_eq!(report.runs[0].outcome.as_ref().unwrap_err().kind(), "flow_solve");
    assert_eq!(report.runs[1].outcome.as_ref().unwrap_err().kind(), "engine_aborted");
    assert_eq!(report.density(EngineKind::Charikar), Some(1.0));
    assert_eq!(report.failures().count(), 2);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert!(text.contains("[FAILED] FLOW flow_solve"));
    assert!(text.contains("[FAILED] SPECGREEDY engine_aborted"));
    assert!(text.contains("[CHARIKAR] density 1 size 3 nodes [0, 1, 2]"));
}

#[tokio::test]
async fn test_slow_engine_times_out() {
    let graph = Arc::new(clique_with_pendant(0.5));
    let engines: Vec<Box<dyn DensityEngine>> = vec![
        Box::new(SlowEngine),
        build_engine(EngineKind::Charikar, &EngineConfig::default()),
    ];
    let config = HarnessConfig::default().with_timeout(Duration::from_millis(50));

    let mut sink = TextReport::new(Vec::new());
    let report = compare_engines(graph, engines, &config, &mut sink).await.unwrap();

    match &report.runs[0].outcome {
        Err(DensityError::EngineTimeout { engine, timeout }) => {
            assert_eq!(engine, "FLOW");
            assert_eq!(*timeout, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(report.runs[0].elapsed < Duration::from_millis(500));
    assert!(report.runs[1].outcome.is_ok());
}

/// Spins until its deadline passes, then flags that it stopped
struct CooperativeEngine {
    stopped: Arc<AtomicBool>,
}

impl DensityEngine for CooperativeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::SpecGreedy
    }

    fn run(&self, graph: &CsrGraph) -> DensityResult<DenseSubgraph> {
        self.run_within(graph, &Deadline::none())
    }

    fn run_within(&self, _graph: &CsrGraph, deadline: &Deadline) -> DensityResult<DenseSubgraph> {
        let started = Instant::now();
        while started.elapsed() < Duration::from_secs(10) {
            if let Err(err) = deadline.check() {
                self.stopped.store(true, Ordering::SeqCst);
                return Err(err);
            }
            thread::sleep(Duration::from_millis(1));
        }
        Ok(DenseSubgraph::new(vec![NodeId(0), NodeId(1)], 1.0))
    }
}

#[tokio::test]
async fn test_timed_out_worker_stops() {
    let graph = Arc::new(clique_with_pendant(0.5));
    let stopped = Arc::new(AtomicBool::new(false));
    let engines: Vec<Box<dyn DensityEngine>> = vec![Box::new(CooperativeEngine {
        stopped: Arc::clone(&stopped),
    })];
    let config = HarnessConfig::default().with_timeout(Duration::from_millis(50));

    let mut sink = TextReport::new(Vec::new());
    let report = compare_engines(graph, engines, &config, &mut sink).await.unwrap();
    assert_eq!(report.runs[0].outcome.as_ref().unwrap_err().kind(), "engine_timeout");

    // The worker observes the same limit and returns shortly after the harness gives up
    let waited = Instant::now();
    while !stopped.load(Ordering::SeqCst) && waited.elapsed() < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(stopped.load(Ordering::SeqCst));
}

#[test]
fn test_builtin_engines_honour_deadline() {
    let graph = planted_clusters(&PlantedConfig::new(3000, 24_000).with_seed(11)).unwrap();
    let config = EngineConfig::default();

    for kind in EngineKind::ALL {
        let engine = build_engine(kind, &config);
        let started = Instant::now();
        let deadline = Deadline::after(kind, Duration::from_micros(1));
        let err = engine.run_within(&graph, &deadline).unwrap_err();
        assert_eq!(err.kind(), "engine_timeout", "{kind}");
        assert!(started.elapsed() < Duration::from_secs(5), "{kind}");
    }
}

#[tokio::test]
async fn test_fraudar_method_through_harness() {
    // Heavy pair (3, 4) wins once node weights count toward the score
    let graph = parse_edge_list("5 4\n1 1 1 5 5\n0 1 1\n1 2 1\n0 2 1\n3 4 1\n").unwrap();
    let engine_config = EngineConfig::default().with_method(SpecGreedyMethod::Fraudar);
    let config = HarnessConfig::default()
        .with_engines(vec![EngineKind::SpecGreedy, EngineKind::Charikar])
        .with_engine_config(engine_config);

    let mut sink = TextReport::new(Vec::new());
    let report = compare(Arc::new(graph), &config, &mut sink).await.unwrap();

    let fraud = report.get(EngineKind::SpecGreedy).unwrap().outcome.as_ref().unwrap();
    assert_eq!(fraud.nodes(), ids(3..5).as_slice());
    assert!((fraud.density() - 0.5).abs() < 1e-9);
    assert_eq!(report.density(EngineKind::Charikar), Some(1.0));
}

#[tokio::test]
async fn test_compare_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.txt");
    clique_with_pendant(0.5).write_edge_list_file(&path).await.unwrap();

    let mut sink = TextReport::new(Vec::new());
    let report = compare_file(&path, &HarnessConfig::default(), &mut sink).await.unwrap();
    for kind in EngineKind::ALL {
        let found = report.get(kind).unwrap().outcome.as_ref().unwrap();
        assert_eq!(found.nodes(), ids(0..3).as_slice());
    }

    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(text.lines().filter(|line| line.starts_with("[TIME] ")).count(), 3);
}

#[tokio::test]
async fn test_malformed_file_aborts_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.txt");
    tokio::fs::write(&path, "3 2\n1 1 1\n0 1 1\n").await.unwrap();

    let mut sink = TextReport::new(Vec::new());
    assert!(compare_file(&path, &HarnessConfig::default(), &mut sink).await.is_err());
    assert!(sink.into_inner().is_empty());

    let missing = dir.path().join("missing.txt");
    let mut sink = TextReport::new(Vec::new());
    assert!(compare_file(&missing, &HarnessConfig::default(), &mut sink).await.is_err());
}

#[tokio::test]
async fn test_weighted_mass_comparison() {
    // Heavy node 3 makes the triangle {0,1,2} densest under weighted mass
    let graph = parse_edge_list("4 4\n1 1 1 10\n0 1 1\n1 2 1\n0 2 1\n2 3 3\n").unwrap();
    let config = HarnessConfig::default()
        .with_engine_config(EngineConfig::default().with_mass_mode(MassMode::WeightedMass));

    let mut sink = TextReport::new(Vec::new());
    let report = compare(Arc::new(graph), &config, &mut sink).await.unwrap();
    for kind in [EngineKind::Charikar, EngineKind::Flow] {
        let density = report.density(kind).unwrap();
        assert!((density - 1.0).abs() < 1e-9, "{kind}: {density}");
    }
}
