//! Trellis Workflow
//!
//! This crate provides the workflow graph representation for trellis.
//! A workflow (or "model") is a composite process whose body is a graph of
//! chained sub-process steps wired together by data edges. The graph is a
//! declarative structure; execution is the engine crate's concern.
//!
//! Key pieces:
//! - [`WorkflowGraph`] - step nodes, data edges and graph-level bindings
//! - [`execution_levels`] - Kahn-style topological leveling into batches of
//!   mutually independent steps

mod error;
mod graph;
mod level;

pub use error::WorkflowError;
pub use graph::{DataEdge, InputBinding, OutputBinding, WorkflowGraph, WorkflowStep};
pub use level::execution_levels;
