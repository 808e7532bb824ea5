//! CSR (Compressed Sparse Row) representation of an undirected weighted graph
//!
//! Every undirected edge `{u, v}` is stored twice, once in each endpoint's row,
//! and every row is sorted by neighbor index. The structure is built once by
//! [`CsrGraph::load`] and never mutated afterwards, so engines can share it
//! through `&CsrGraph` or `Arc<CsrGraph>` without locking.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 - 1 (w=1), 0 - 2 (w=2)
//!
//! CSR:
//!   row_offsets:  [0, 2, 3, 4]   // Node 0: slots [0..2), node 1: [2..3), node 2: [3..4)
//!   col_indices:  [1, 2, 0, 0]
//!   edge_weights: [1.0, 2.0, 1.0, 2.0]
//! ```

use crate::error::{DensityError, DensityResult};
use anyhow::{anyhow, Result};

/// Node identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index into per-node arrays
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Immutable undirected weighted graph in CSR layout
///
/// Optimized for:
/// - O(1) access to a node's adjacency row
/// - O(1) weighted degree and node weight lookups
/// - Sparse matrix-vector products (spectral seeding)
///
/// # Example
///
/// ```
/// use trueno_densest::{CsrGraph, NodeId};
///
/// let graph = CsrGraph::from_edges(3, &[(0, 1, 1.0), (0, 2, 2.0)]).unwrap();
///
/// assert_eq!(graph.num_edges(), 2);
/// assert_eq!(graph.degree(NodeId(0)).unwrap(), 3.0);
/// assert_eq!(graph.total_edge_weight(), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CsrGraph {
    /// node i's slots are `row_offsets[i]..row_offsets[i + 1]`
    /// Length: `num_nodes` + 1
    row_offsets: Vec<usize>,

    /// Neighbor index per slot, sorted within each row
    /// Length: 2 * `num_edges`
    col_indices: Vec<u32>,

    /// Edge weight per slot
    /// Length: 2 * `num_edges`
    edge_weights: Vec<f64>,

    /// Node weights (mass units in weighted mode)
    node_weights: Vec<f64>,

    /// Weighted degree per node
    degrees: Vec<f64>,

    /// Sum of all edge weights
    total_edge_weight: f64,

    /// Number of undirected edges
    num_edges: usize,
}

impl CsrGraph {
    /// Build a graph from a declared size, node weights and an undirected edge list
    ///
    /// # Arguments
    ///
    /// * `num_nodes` - Declared node count `n`
    /// * `declared_edges` - Declared edge count `m`; must equal `edges.len()`
    /// * `node_weights` - One positive weight per node
    /// * `edges` - `(u, v, w)` triples with `0 <= u, v < n` and `w > 0`
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::MalformedInput`] if the weight vector has the wrong
    /// length, a weight is not finite and positive, `m` disagrees with the edge
    /// list, an endpoint is out of range, or a self-loop or parallel edge is present.
    pub fn load(
        num_nodes: usize,
        declared_edges: usize,
        node_weights: Vec<f64>,
        edges: &[(u32, u32, f64)],
    ) -> DensityResult<Self> {
        if u32::try_from(num_nodes).is_err() {
            return Err(malformed(format!(
                "{num_nodes} nodes exceeds the u32 node index space"
            )));
        }
        if node_weights.len() != num_nodes {
            return Err(malformed(format!(
                "expected {num_nodes} node weights, found {}",
                node_weights.len()
            )));
        }
        if let Some((node, weight)) = node_weights
            .iter()
            .enumerate()
            .find(|(_, w)| !(w.is_finite() && **w > 0.0))
        {
            return Err(malformed(format!(
                "node {node} has invalid weight {weight}; weights must be finite and positive"
            )));
        }
        if edges.len() != declared_edges {
            return Err(malformed(format!(
                "declared {declared_edges} edges but {} were supplied",
                edges.len()
            )));
        }

        let mut row_counts = vec![0_usize; num_nodes];
        for &(u, v, w) in edges {
            if u as usize >= num_nodes || v as usize >= num_nodes {
                return Err(malformed(format!(
                    "edge ({u}, {v}) has an endpoint outside [0, {num_nodes})"
                )));
            }
            if u == v {
                return Err(malformed(format!("self-loop on node {u}")));
            }
            if !(w.is_finite() && w > 0.0) {
                return Err(malformed(format!(
                    "edge ({u}, {v}) has invalid weight {w}; weights must be finite and positive"
                )));
            }
            row_counts[u as usize] += 1;
            row_counts[v as usize] += 1;
        }

        let mut row_offsets = Vec::with_capacity(num_nodes + 1);
        let mut offset = 0_usize;
        row_offsets.push(offset);
        for count in &row_counts {
            offset += count;
            row_offsets.push(offset);
        }

        // Scatter both directions of every edge into its rows
        let mut rows: Vec<(u32, f64)> = vec![(0, 0.0); offset];
        let mut cursor: Vec<usize> = row_offsets[..num_nodes].to_vec();
        for &(u, v, w) in edges {
            rows[cursor[u as usize]] = (v, w);
            cursor[u as usize] += 1;
            rows[cursor[v as usize]] = (u, w);
            cursor[v as usize] += 1;
        }

        let mut degrees = vec![0.0; num_nodes];
        for node in 0..num_nodes {
            let row = &mut rows[row_offsets[node]..row_offsets[node + 1]];
            row.sort_unstable_by_key(|&(neighbor, _)| neighbor);

            if let Some(pair) = row.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                let (a, b) = (node.min(pair[0].0 as usize), node.max(pair[0].0 as usize));
                return Err(malformed(format!("parallel edge between {a} and {b}")));
            }
            degrees[node] = row.iter().map(|&(_, w)| w).sum();
        }

        let (col_indices, edge_weights): (Vec<u32>, Vec<f64>) = rows.into_iter().unzip();
        let total_edge_weight = edges.iter().map(|&(_, _, w)| w).sum();

        Ok(Self {
            row_offsets,
            col_indices,
            edge_weights,
            node_weights,
            degrees,
            total_edge_weight,
            num_edges: edges.len(),
        })
    }

    /// Build a graph with unit node weights from an edge list
    ///
    /// # Errors
    ///
    /// Same validation as [`CsrGraph::load`]
    pub fn from_edges(num_nodes: usize, edges: &[(u32, u32, f64)]) -> DensityResult<Self> {
        Self::load(num_nodes, edges.len(), vec![1.0; num_nodes], edges)
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_weights.len()
    }

    /// Get number of undirected edges
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Sum of all edge weights
    #[must_use]
    pub const fn total_edge_weight(&self) -> f64 {
        self.total_edge_weight
    }

    /// Weighted degree (sum of incident edge weights) of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn degree(&self, node: NodeId) -> Result<f64> {
        self.degrees
            .get(node.index())
            .copied()
            .ok_or_else(|| anyhow!("Node ID {} out of bounds", node.0))
    }

    /// Weight of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn node_weight(&self, node: NodeId) -> Result<f64> {
        self.node_weights
            .get(node.index())
            .copied()
            .ok_or_else(|| anyhow!("Node ID {} out of bounds", node.0))
    }

    /// Neighbors of a node with the connecting edge weights
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn neighbors(&self, node: NodeId) -> Result<impl Iterator<Item = (NodeId, f64)> + '_> {
        if node.index() >= self.num_nodes() {
            return Err(anyhow!("Node ID {} out of bounds", node.0));
        }
        let (targets, weights) = self.row(node.index());
        Ok(targets
            .iter()
            .zip(weights)
            .map(|(&target, &weight)| (NodeId(target), weight)))
    }

    /// All weighted degrees, indexed by node
    #[must_use]
    pub fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    /// All node weights, indexed by node
    #[must_use]
    pub fn node_weights(&self) -> &[f64] {
        &self.node_weights
    }

    /// True when every node weight is exactly 1.0
    #[must_use]
    pub fn has_unit_node_weights(&self) -> bool {
        self.node_weights.iter().all(|&w| w == 1.0)
    }

    /// Undirected edges in canonical order (`u < v`, sorted)
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        (0..self.num_nodes()).flat_map(move |node| {
            let (targets, weights) = self.row(node);
            targets
                .iter()
                .zip(weights)
                .filter(move |&(&target, _)| (target as usize) > node)
                .map(move |(&target, &weight)| {
                    // num_nodes checked against u32 at load
                    #[allow(clippy::cast_possible_truncation)]
                    let source = node as u32;
                    (source, target, weight)
                })
        })
    }

    /// Get CSR components (row offsets, neighbor indices, slot weights)
    #[must_use]
    pub fn csr_components(&self) -> (&[usize], &[u32], &[f64]) {
        (&self.row_offsets, &self.col_indices, &self.edge_weights)
    }

    /// Adjacency row of an in-range node index
    ///
    /// Callers must pass `node < num_nodes()`.
    pub(crate) fn row(&self, node: usize) -> (&[u32], &[f64]) {
        let start = self.row_offsets[node];
        let end = self.row_offsets[node + 1];
        (&self.col_indices[start..end], &self.edge_weights[start..end])
    }
}

fn malformed(reason: String) -> DensityError {
    DensityError::MalformedInput(reason)
}
