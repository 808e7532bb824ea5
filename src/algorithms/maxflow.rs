//! Dinic max-flow over real capacities
//!
//! Arcs are stored in pairs so the residual twin of arc `a` is `a ^ 1`.
//! Residual capacities at or below `1e-12 * max capacity` count as saturated.

use crate::error::{DensityError, DensityResult};
use std::collections::VecDeque;

const RESIDUAL_EPSILON: f64 = 1e-12;
const UNREACHED: usize = usize::MAX;

/// Flow network with residual bookkeeping
#[derive(Debug, Clone)]
pub(crate) struct FlowNetwork {
    adjacency: Vec<Vec<usize>>,
    heads: Vec<usize>,
    residual: Vec<f64>,
    max_capacity: f64,
}

impl FlowNetwork {
    pub(crate) fn new(num_vertices: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); num_vertices],
            heads: Vec::new(),
            residual: Vec::new(),
            max_capacity: 0.0,
        }
    }

    pub(crate) fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    /// Directed arc `from -> to`
    pub(crate) fn add_arc(&mut self, from: usize, to: usize, capacity: f64) -> DensityResult<()> {
        self.push_pair(from, to, capacity, 0.0)
    }

    /// Undirected edge: capacity in both directions on one arc pair
    pub(crate) fn add_edge(&mut self, a: usize, b: usize, capacity: f64) -> DensityResult<()> {
        self.push_pair(a, b, capacity, capacity)
    }

    fn push_pair(
        &mut self,
        from: usize,
        to: usize,
        forward: f64,
        backward: f64,
    ) -> DensityResult<()> {
        let n = self.num_vertices();
        if from >= n || to >= n {
            return Err(DensityError::FlowSolve(format!(
                "arc {from} -> {to} outside network of {n} vertices"
            )));
        }
        for capacity in [forward, backward] {
            if !capacity.is_finite() || capacity < 0.0 {
                return Err(DensityError::FlowSolve(format!(
                    "invalid capacity {capacity} on arc {from} -> {to}"
                )));
            }
        }
        let arc = self.heads.len();
        self.heads.extend([to, from]);
        self.residual.extend([forward, backward]);
        self.adjacency[from].push(arc);
        self.adjacency[to].push(arc ^ 1);
        self.max_capacity = self.max_capacity.max(forward).max(backward);
        Ok(())
    }

    fn tolerance(&self) -> f64 {
        RESIDUAL_EPSILON * self.max_capacity.max(f64::MIN_POSITIVE)
    }

    /// Push maximum flow from `source` to `sink`, returning its value
    ///
    /// Residual capacities are updated in place so [`Self::source_side`] can
    /// read the minimum cut afterwards.
    pub(crate) fn max_flow(&mut self, source: usize, sink: usize) -> DensityResult<f64> {
        let n = self.num_vertices();
        if source >= n || sink >= n || source == sink {
            return Err(DensityError::FlowSolve(format!(
                "invalid terminals {source} -> {sink} for {n} vertices"
            )));
        }
        let tolerance = self.tolerance();
        let mut total = 0.0;
        let mut phases = 0;

        loop {
            let level = self.levels(source, tolerance);
            if level[sink] == UNREACHED {
                break;
            }
            phases += 1;
            if phases > n + 1 {
                return Err(DensityError::FlowSolve(format!(
                    "no convergence after {phases} phases"
                )));
            }

            let mut level = level;
            let mut next_arc = vec![0; n];
            loop {
                let pushed = self.augment(source, sink, &mut level, &mut next_arc, tolerance);
                if pushed <= tolerance {
                    break;
                }
                total += pushed;
            }
        }

        if !total.is_finite() {
            return Err(DensityError::FlowSolve("flow value is not finite".to_string()));
        }
        Ok(total)
    }

    /// Vertices reachable from `source` in the residual network
    pub(crate) fn source_side(&self, source: usize) -> Vec<bool> {
        let level = self.levels(source, self.tolerance());
        level.into_iter().map(|l| l != UNREACHED).collect()
    }

    fn levels(&self, source: usize, tolerance: f64) -> Vec<usize> {
        let mut level = vec![UNREACHED; self.num_vertices()];
        let mut queue = VecDeque::new();
        level[source] = 0;
        queue.push_back(source);
        while let Some(vertex) = queue.pop_front() {
            for &arc in &self.adjacency[vertex] {
                let head = self.heads[arc];
                if self.residual[arc] > tolerance && level[head] == UNREACHED {
                    level[head] = level[vertex] + 1;
                    queue.push_back(head);
                }
            }
        }
        level
    }

    /// One blocking-flow augmentation along the level graph (iterative DFS)
    fn augment(
        &mut self,
        source: usize,
        sink: usize,
        level: &mut [usize],
        next_arc: &mut [usize],
        tolerance: f64,
    ) -> f64 {
        let mut path: Vec<usize> = Vec::new();
        let mut vertex = source;
        loop {
            if vertex == sink {
                let bottleneck = path
                    .iter()
                    .map(|&arc| self.residual[arc])
                    .fold(f64::INFINITY, f64::min);
                for &arc in &path {
                    self.residual[arc] -= bottleneck;
                    self.residual[arc ^ 1] += bottleneck;
                }
                return bottleneck;
            }

            let mut advanced = false;
            while next_arc[vertex] < self.adjacency[vertex].len() {
                let arc = self.adjacency[vertex][next_arc[vertex]];
                let head = self.heads[arc];
                if self.residual[arc] > tolerance && level[head] == level[vertex] + 1 {
                    path.push(arc);
                    vertex = head;
                    advanced = true;
                    break;
                }
                next_arc[vertex] += 1;
            }
            if advanced {
                continue;
            }

            // Dead end: prune the vertex and retreat one arc
            level[vertex] = UNREACHED;
            let Some(arc) = path.pop() else {
                return 0.0;
            };
            vertex = self.heads[arc ^ 1];
            next_arc[vertex] += 1;
        }
    }
}
