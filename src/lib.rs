//! Trellis
//!
//! Asynchronous job execution and workflow orchestration: submit a named
//! process for execution, poll its status, fetch its result or dismiss it,
//! and compose processes into workflow "models" whose step graph is leveled
//! and run on a bounded worker pool.
//!
//! This crate is the facade over the workspace members; embedders usually
//! only need [`ExecutionManager`] plus a [`ProcessLoader`] implementation.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use trellis::{EngineConfig, ExecuteRequest, ExecutionManager, StaticLoader};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = Arc::new(StaticLoader::new());
//! // loader.register(...) the deployed processes.
//!
//! let manager = ExecutionManager::new(loader, EngineConfig::default());
//! manager.start();
//!
//! let accepted = manager.execute(ExecuteRequest::new("my:process", Default::default()))?;
//! let result = manager.wait(&accepted.job_id).await?;
//! println!("{:?}", result.outputs);
//! # Ok(())
//! # }
//! ```

pub use trellis_engine::{EngineConfig, EngineError, ExecuteRequest, ExecutionManager, ResultDoc, StatusInfo};
pub use trellis_job::{JobData, JobError, JobStatus, PollPolicy};
pub use trellis_process::{
  InvokeContext, InvokeError, ParameterDescriptor, ParameterType, ProcessDescriptor,
  ProcessError, ProcessInputs, ProcessLoader, ProcessOutputs, ProcessRegistry,
  RegistryListener, StaticLoader, validate_inputs,
};
pub use trellis_progress::ProgressTracker;
pub use trellis_workflow::{
  DataEdge, InputBinding, OutputBinding, WorkflowError, WorkflowGraph, WorkflowStep,
  execution_levels,
};
