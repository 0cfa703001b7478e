use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
  /// Unknown or already evicted job id.
  #[error("no such job: {job_id}")]
  NoSuchJob { job_id: String },
}

/// A captured execution-time failure, recorded on the job at the worker
/// boundary. Crosses thread boundaries as plain data.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecutionFailure {
  pub message: String,
}

impl ExecutionFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}
