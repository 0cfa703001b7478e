use thiserror::Error;

/// Errors surfaced synchronously by registry lookup and input validation.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("no such process: {identifier}")]
  NoSuchProcess { identifier: String },

  #[error("invalid input '{input}' for process '{process_id}': {reason}")]
  InvalidInput {
    process_id: String,
    input: String,
    reason: String,
  },
}

/// Failure returned by a process body.
///
/// Carries a message only - the scheduler records it on the job at the
/// worker boundary, so it must survive a thread hop as plain data.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InvokeError {
  pub message: String,
}

impl InvokeError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}
