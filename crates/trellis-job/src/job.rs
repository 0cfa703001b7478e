use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use trellis_progress::ProgressTracker;

/// Named job data values (inputs or outputs), keyed by parameter identifier.
pub type JobData = HashMap<String, serde_json::Value>;

/// Client-visible lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Accepted,
  Running,
  Succeeded,
  Failed,
  Dismissed,
}

impl JobStatus {
  /// Terminal states have no outgoing transitions.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::Dismissed)
  }
}

/// Mutable job state, published atomically behind one lock.
#[derive(Debug, Clone)]
struct JobState {
  status: JobStatus,
  started_at: Option<DateTime<Utc>>,
  completed_at: Option<DateTime<Utc>>,
  outputs: JobData,
  failure: Option<String>,
}

/// A consistent point-in-time view of a job.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
  pub job_id: String,
  pub process_id: String,
  pub status: JobStatus,
  pub submitted_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  pub progression: f64,
  pub outputs: JobData,
  pub failure: Option<String>,
}

/// One tracked execution instance of a process.
///
/// Identity fields (id, process, submission time, inputs) are immutable;
/// lifecycle state lives behind a single lock so concurrent status reads
/// never observe a torn update. Only the scheduler worker and dismissal
/// mutate the state, and the transition guards below make terminal states
/// final.
pub struct Job {
  job_id: String,
  process_id: String,
  submitted_at: DateTime<Utc>,
  inputs: JobData,
  state: RwLock<JobState>,
  cancel: CancellationToken,
  progress: ProgressTracker,
  polls: AtomicU32,
  status_tx: watch::Sender<JobStatus>,
}

impl Job {
  pub(crate) fn new(process_id: impl Into<String>, inputs: JobData, cancel: CancellationToken) -> Self {
    let (status_tx, _) = watch::channel(JobStatus::Accepted);
    Self {
      job_id: uuid::Uuid::new_v4().to_string(),
      process_id: process_id.into(),
      submitted_at: Utc::now(),
      inputs,
      state: RwLock::new(JobState {
        status: JobStatus::Accepted,
        started_at: None,
        completed_at: None,
        outputs: JobData::new(),
        failure: None,
      }),
      cancel,
      progress: ProgressTracker::new(),
      polls: AtomicU32::new(0),
      status_tx,
    }
  }

  pub fn job_id(&self) -> &str {
    &self.job_id
  }

  pub fn process_id(&self) -> &str {
    &self.process_id
  }

  pub fn inputs(&self) -> &JobData {
    &self.inputs
  }

  pub fn submitted_at(&self) -> DateTime<Utc> {
    self.submitted_at
  }

  /// The job's cancellation token. Dismissal raises it; workers and process
  /// bodies poll it cooperatively.
  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// The progress tree the running body reports into.
  pub fn progress(&self) -> &ProgressTracker {
    &self.progress
  }

  pub fn status(&self) -> JobStatus {
    self.read().status
  }

  pub fn is_terminal(&self) -> bool {
    self.status().is_terminal()
  }

  /// Record one status poll and return the count before this one.
  pub fn record_poll(&self) -> u32 {
    self.polls.fetch_add(1, Ordering::Relaxed)
  }

  /// Consistent snapshot for status/result documents.
  pub fn snapshot(&self) -> JobSnapshot {
    let state = self.read();
    JobSnapshot {
      job_id: self.job_id.clone(),
      process_id: self.process_id.clone(),
      status: state.status,
      submitted_at: self.submitted_at,
      started_at: state.started_at,
      completed_at: state.completed_at,
      progression: self.progress.progression(),
      outputs: state.outputs.clone(),
      failure: state.failure.clone(),
    }
  }

  /// `Accepted -> Running`. Returns false when the job was dismissed while
  /// queued (or is otherwise past Accepted), in which case the worker must
  /// not run the body.
  pub(crate) fn try_start(&self) -> bool {
    let started = {
      let mut state = self.write();
      if state.status != JobStatus::Accepted {
        false
      } else {
        state.status = JobStatus::Running;
        state.started_at = Some(Utc::now());
        true
      }
    };
    if started {
      self.status_tx.send_replace(JobStatus::Running);
    }
    started
  }

  /// `Running -> Succeeded`, attaching the outputs in the same publication.
  pub(crate) fn succeed(&self, outputs: JobData) {
    let done = {
      let mut state = self.write();
      if state.status != JobStatus::Running {
        false
      } else {
        state.status = JobStatus::Succeeded;
        state.completed_at = Some(Utc::now());
        state.outputs = outputs;
        true
      }
    };
    if done {
      self.status_tx.send_replace(JobStatus::Succeeded);
    }
  }

  /// `Running -> Failed` with a retrievable message.
  pub(crate) fn fail(&self, message: impl Into<String>) {
    let done = {
      let mut state = self.write();
      if state.status != JobStatus::Running {
        false
      } else {
        state.status = JobStatus::Failed;
        state.completed_at = Some(Utc::now());
        state.failure = Some(message.into());
        true
      }
    };
    if done {
      self.status_tx.send_replace(JobStatus::Failed);
    }
  }

  /// Raise the cancellation flag. An Accepted job is dequeued and flips to
  /// Dismissed immediately; a Running one keeps its status until the worker
  /// observes the token, so a status read in between may still see Running.
  pub(crate) fn dismiss(&self) {
    self.cancel.cancel();
    let done = {
      let mut state = self.write();
      if state.status == JobStatus::Accepted {
        state.status = JobStatus::Dismissed;
        state.completed_at = Some(Utc::now());
        true
      } else {
        false
      }
    };
    if done {
      self.status_tx.send_replace(JobStatus::Dismissed);
    }
  }

  /// Worker-side terminal transition to Dismissed; no-op on terminal jobs.
  /// Dismissed jobs expose empty outputs.
  pub(crate) fn finalize_dismissed(&self) {
    let done = {
      let mut state = self.write();
      if state.status.is_terminal() {
        false
      } else {
        state.status = JobStatus::Dismissed;
        state.completed_at = Some(Utc::now());
        state.outputs = JobData::new();
        true
      }
    };
    if done {
      self.status_tx.send_replace(JobStatus::Dismissed);
    }
  }

  /// Wait for the job to reach a terminal state.
  pub async fn await_terminal(&self) -> JobStatus {
    let mut rx = self.status_tx.subscribe();
    loop {
      let status = *rx.borrow_and_update();
      if status.is_terminal() {
        return status;
      }
      if rx.changed().await.is_err() {
        return self.status();
      }
    }
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, JobState> {
    self.state.read().expect("job lock poisoned")
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, JobState> {
    self.state.write().expect("job lock poisoned")
  }
}
