//! Append-only comparison reports
//!
//! # Line format
//!
//! ```text
//! [CHARIKAR] density 1 size 3 nodes [0, 1, 2]
//! [TIME] CHARIKAR elapsed 0.000042 s
//! [FAILED] FLOW infeasible_graph: infeasible graph: graph has no edges; density is undefined
//! [TIME] FLOW elapsed 0.000003 s
//! ```
//!
//! Every engine contributes a result (or `[FAILED]`) line followed by its
//! `[TIME]` line, so per-engine timings can be recovered with
//! [`parse_time_lines`].

use super::EngineRun;
use anyhow::{Context, Result};
use std::io::Write;

/// Destination for per-engine report entries
pub trait ReportSink: Send {
    /// Append the entry for one finished engine run
    ///
    /// # Errors
    ///
    /// Returns error if the underlying stream cannot be written
    fn record(&mut self, run: &EngineRun) -> Result<()>;
}

/// Text report over any writer
#[derive(Debug)]
pub struct TextReport<W> {
    writer: W,
    members: bool,
}

impl<W: Write + Send> TextReport<W> {
    /// Report that lists subgraph members
    pub const fn new(writer: W) -> Self {
        Self { writer, members: true }
    }

    /// Toggle the `nodes [..]` suffix on result lines
    #[must_use]
    pub fn with_members(mut self, members: bool) -> Self {
        self.members = members;
        self
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for TextReport<W> {
    fn record(&mut self, run: &EngineRun) -> Result<()> {
        let tag = run.engine.tag();
        match &run.outcome {
            Ok(subgraph) => {
                write!(
                    self.writer,
                    "[{tag}] density {} size {}",
                    subgraph.density(),
                    subgraph.len()
                )
                .context("Failed to write report line")?;
                if self.members {
                    let nodes: Vec<String> =
                        subgraph.nodes().iter().map(|node| node.0.to_string()).collect();
                    write!(self.writer, " nodes [{}]", nodes.join(", "))
                        .context("Failed to write report line")?;
                }
                writeln!(self.writer).context("Failed to write report line")?;
            }
            Err(err) => {
                writeln!(self.writer, "[FAILED] {tag} {}: {err}", err.kind())
                    .context("Failed to write report line")?;
            }
        }
        writeln!(self.writer, "[TIME] {tag} elapsed {:.6} s", run.elapsed.as_secs_f64())
            .context("Failed to write report line")?;
        self.writer.flush().context("Failed to flush report")
    }
}

/// Extract `(tag, seconds)` pairs from `[TIME]` lines, in report order
///
/// Lines that do not match the format are skipped.
#[must_use]
pub fn parse_time_lines(text: &str) -> Vec<(String, f64)> {
    text.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("[TIME] ")?;
            let mut tokens = rest.split_whitespace();
            let tag = tokens.next()?;
            if tokens.next()? != "elapsed" {
                return None;
            }
            let seconds: f64 = tokens.next()?.parse().ok()?;
            (tokens.next()? == "s").then(|| (tag.to_string(), seconds))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{DenseSubgraph, EngineKind};
    use crate::error::DensityError;
    use crate::NodeId;
    use std::time::Duration;

    fn success() -> EngineRun {
        EngineRun {
            engine: EngineKind::Charikar,
            elapsed: Duration::from_millis(1500),
            outcome: Ok(DenseSubgraph::new(vec![NodeId(2), NodeId(0), NodeId(1)], 1.0)),
        }
    }

    fn failure() -> EngineRun {
        EngineRun {
            engine: EngineKind::Flow,
            elapsed: Duration::from_micros(250),
            outcome: Err(DensityError::FlowSolve("boom".to_string())),
        }
    }

    #[test]
    fn test_text_lines() {
        let mut report = TextReport::new(Vec::new());
        report.record(&success()).unwrap();
        report.record(&failure()).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[CHARIKAR] density 1 size 3 nodes [0, 1, 2]",
                "[TIME] CHARIKAR elapsed 1.500000 s",
                "[FAILED] FLOW flow_solve: flow solve failed: boom",
                "[TIME] FLOW elapsed 0.000250 s",
            ]
        );
    }

    #[test]
    fn test_members_can_be_omitted() {
        let mut report = TextReport::new(Vec::new()).with_members(false);
        report.record(&success()).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        assert!(text.starts_with("[CHARIKAR] density 1 size 3\n"));
    }

    #[test]
    fn test_parse_time_lines() {
        let text = "[CHARIKAR] density 1 size 3\n\
                    [TIME] CHARIKAR elapsed 0.5 s\n\
                    noise\n\
                    [TIME] FLOW elapsed x s\n\
                    [TIME] SPECGREEDY elapsed 2 s\n";
        assert_eq!(
            parse_time_lines(text),
            vec![("CHARIKAR".to_string(), 0.5), ("SPECGREEDY".to_string(), 2.0)]
        );
    }
}
