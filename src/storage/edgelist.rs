//! Plain-text edge-list I/O
//!
//! # Format
//!
//! ```text
//! n m              # node and edge counts
//! w0 w1 ... w{n-1} # node weights
//! u v w            # m lines, 0-indexed undirected edge with weight w
//! ```
//!
//! Writers emit edges in canonical order (`u < v`, sorted) with shortest
//! round-trip float formatting, so a written graph reloads to an equal
//! [`CsrGraph`].

use super::CsrGraph;
use crate::error::{DensityError, DensityResult};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Parse a graph from edge-list text
///
/// Blank lines after the edge block are ignored. For `n = 0` the weight line
/// may be empty or missing.
///
/// # Errors
///
/// Returns [`DensityError::MalformedInput`] naming the offending line when the
/// header, weight line or an edge line cannot be parsed, when counts disagree
/// with the header, or when [`CsrGraph::load`] rejects the structure.
///
/// # Example
///
/// ```
/// use trueno_densest::parse_edge_list;
///
/// let graph = parse_edge_list("3 2\n1 1 1\n0 1 1\n1 2 2.5\n").unwrap();
/// assert_eq!(graph.num_nodes(), 3);
/// assert_eq!(graph.total_edge_weight(), 3.5);
/// ```
pub fn parse_edge_list(text: &str) -> DensityResult<CsrGraph> {
    let mut lines = text.lines().enumerate().map(|(idx, line)| (idx + 1, line.trim()));

    let (header_no, header) = lines
        .next()
        .ok_or_else(|| malformed_at(1, "missing header line `n m`"))?;
    let mut header_tokens = header.split_whitespace();
    let num_nodes: usize = parse_token(header_tokens.next(), header_no, "node count")?;
    let num_edges: usize = parse_token(header_tokens.next(), header_no, "edge count")?;
    if header_tokens.next().is_some() {
        return Err(malformed_at(header_no, "header must contain exactly `n m`"));
    }

    let node_weights: Vec<f64> = match lines.next() {
        Some((line_no, line)) => {
            let weights = line
                .split_whitespace()
                .map(|token| parse_token(Some(token), line_no, "node weight"))
                .collect::<DensityResult<Vec<f64>>>()?;
            if weights.len() != num_nodes {
                return Err(malformed_at(
                    line_no,
                    &format!("expected {num_nodes} node weights, found {}", weights.len()),
                ));
            }
            weights
        }
        None if num_nodes == 0 => Vec::new(),
        None => return Err(malformed_at(2, "missing node weight line")),
    };

    let mut edges = Vec::with_capacity(num_edges);
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        if edges.len() == num_edges {
            return Err(malformed_at(
                line_no,
                &format!("more than the declared {num_edges} edge lines"),
            ));
        }
        let mut tokens = line.split_whitespace();
        let u: u32 = parse_token(tokens.next(), line_no, "edge source")?;
        let v: u32 = parse_token(tokens.next(), line_no, "edge target")?;
        let w: f64 = parse_token(tokens.next(), line_no, "edge weight")?;
        if tokens.next().is_some() {
            return Err(malformed_at(line_no, "edge line must contain exactly `u v w`"));
        }
        edges.push((u, v, w));
    }

    CsrGraph::load(num_nodes, num_edges, node_weights, &edges)
}

impl CsrGraph {
    /// Read a graph from an edge-list file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or its contents are malformed
    pub async fn read_edge_list<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_edge_list(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the graph in edge-list format
    ///
    /// # Errors
    ///
    /// Returns error if the writer fails
    pub fn write_edge_list<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.to_edge_list_string().as_bytes())
    }

    /// Render the graph in edge-list format
    #[must_use]
    pub fn to_edge_list_string(&self) -> String {
        let mut out = String::with_capacity(16 * (self.num_edges() + 1) + 4 * self.num_nodes());
        // Writing into a String cannot fail
        let _ = writeln!(out, "{} {}", self.num_nodes(), self.num_edges());
        let weights: Vec<String> = self.node_weights().iter().map(f64::to_string).collect();
        let _ = writeln!(out, "{}", weights.join(" "));
        for (u, v, w) in self.edges() {
            let _ = writeln!(out, "{u} {v} {w}");
        }
        out
    }

    /// Write the graph to an edge-list file, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub async fn write_edge_list_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(path, self.to_edge_list_string())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn parse_token<T: FromStr>(token: Option<&str>, line_no: usize, what: &str) -> DensityResult<T> {
    let token = token.ok_or_else(|| malformed_at(line_no, &format!("missing {what}")))?;
    token
        .parse()
        .map_err(|_| malformed_at(line_no, &format!("invalid {what} `{token}`")))
}

fn malformed_at(line_no: usize, reason: &str) -> DensityError {
    DensityError::MalformedInput(format!("line {line_no}: {reason}"))
}
