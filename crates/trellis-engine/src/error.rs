use thiserror::Error;

/// Errors surfaced synchronously by the execution manager's API.
///
/// Execution-time failures never appear here: they are caught at the worker
/// boundary and recorded on the job, retrievable through status and result.
#[derive(Debug, Error)]
pub enum EngineError {
  /// Unknown process or invalid inputs at submit time.
  #[error(transparent)]
  Process(#[from] trellis_process::ProcessError),

  /// Unknown or already evicted job id.
  #[error(transparent)]
  Job(#[from] trellis_job::JobError),

  /// Cyclic or unresolvable workflow graph at submit time.
  #[error("malformed workflow: {0}")]
  MalformedWorkflow(#[from] trellis_workflow::WorkflowError),
}
