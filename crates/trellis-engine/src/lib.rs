//! Trellis Engine
//!
//! The execution manager behind an asynchronous processing service: accept a
//! request to run a named process, execute it on a bounded worker pool and
//! let clients poll for status, fetch results or dismiss the job. Composite
//! "model" processes - descriptors embedding a workflow graph - are leveled
//! topologically and run step by step as child jobs.
//!
//! The protocol layer consumes [`ExecutionManager`] through `execute`,
//! `status`, `result` and `dismiss`; process definitions arrive through the
//! registry and the pluggable `ProcessLoader`.

mod config;
mod engine;
mod error;
mod orchestrator;
mod status;

pub use config::EngineConfig;
pub use engine::ExecutionManager;
pub use error::EngineError;
pub use status::{ExecuteRequest, ResultDoc, StatusInfo};
