//! Graph storage layer
//!
//! Provides the immutable CSR graph model and the plain-text edge-list
//! exchange format shared with the generators and the benchmark driver.

pub mod csr;
pub mod edgelist;

pub use csr::{CsrGraph, NodeId};
pub use edgelist::parse_edge_list;
