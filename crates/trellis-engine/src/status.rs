//! Protocol-facing request and response documents.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_job::{JobData, JobStatus};

/// A pre-validated execute request handed over by the protocol layer.
///
/// `wants_status`/`wants_store` are the protocol's response-mode flags: the
/// engine always executes asynchronously, and a caller that asked for a
/// synchronous response awaits [`crate::ExecutionManager::wait`] instead of
/// polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
  pub identifier: String,
  #[serde(default)]
  pub inputs: JobData,
  #[serde(default = "default_true")]
  pub wants_status: bool,
  #[serde(default = "default_true")]
  pub wants_store: bool,
}

fn default_true() -> bool {
  true
}

impl ExecuteRequest {
  pub fn new(identifier: impl Into<String>, inputs: JobData) -> Self {
    Self {
      identifier: identifier.into(),
      inputs,
      wants_status: true,
      wants_store: true,
    }
  }
}

/// Client-visible job status document.
///
/// Running jobs carry `percent_completed` and a `next_poll` hint; Accepted
/// jobs carry only `next_poll`; terminal jobs carry neither but expose the
/// record's expiration date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
  pub job_id: String,
  pub status: JobStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub percent_completed: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next_poll: Option<Duration>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires_at: Option<DateTime<Utc>>,
}

/// Client-visible result document.
///
/// A failed job carries its failure message here - distinguishable from
/// "succeeded with no outputs". Reading the result of a job that is not
/// terminal yet returns empty outputs rather than blocking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDoc {
  pub job_id: String,
  pub outputs: JobData,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires_at: Option<DateTime<Utc>>,
}
