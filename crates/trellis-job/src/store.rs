//! The arena of live jobs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::JobError;
use crate::job::{Job, JobData};

/// Owns every job record, keyed by id.
///
/// API callers and worker tasks access the store concurrently; the map lock
/// only guards membership, all per-job state sits behind the job's own lock.
/// Terminal jobs are evicted once `completed_at + retention` has elapsed,
/// both lazily on lookup and by the background sweeper.
pub struct JobStore {
  jobs: RwLock<HashMap<String, Arc<Job>>>,
  retention: chrono::Duration,
}

impl JobStore {
  pub fn new(retention: Duration) -> Self {
    Self {
      jobs: RwLock::new(HashMap::new()),
      retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
    }
  }

  /// Create a job in Accepted with its own cancellation token.
  pub fn create(&self, process_id: impl Into<String>, inputs: JobData) -> Arc<Job> {
    self.insert(Job::new(process_id, inputs, CancellationToken::new()))
  }

  /// Create a job whose cancellation token is a child of `parent`, so
  /// dismissing the parent job cancels this one as well. Used for workflow
  /// steps.
  pub fn create_child(
    &self,
    process_id: impl Into<String>,
    inputs: JobData,
    parent: &CancellationToken,
  ) -> Arc<Job> {
    self.insert(Job::new(process_id, inputs, parent.child_token()))
  }

  fn insert(&self, job: Job) -> Arc<Job> {
    let job = Arc::new(job);
    self
      .jobs
      .write()
      .expect("job store lock poisoned")
      .insert(job.job_id().to_string(), job.clone());
    debug!(job_id = %job.job_id(), process_id = %job.process_id(), "job created");
    job
  }

  /// Look up a job; evicts it instead when its retention has lapsed.
  pub fn get(&self, job_id: &str) -> Result<Arc<Job>, JobError> {
    let job = self
      .jobs
      .read()
      .expect("job store lock poisoned")
      .get(job_id)
      .cloned();

    match job {
      Some(job) if self.is_expired(&job, Utc::now()) => {
        self.evict(job_id);
        Err(JobError::NoSuchJob {
          job_id: job_id.to_string(),
        })
      }
      Some(job) => Ok(job),
      None => Err(JobError::NoSuchJob {
        job_id: job_id.to_string(),
      }),
    }
  }

  /// Request cancellation. Idempotent on terminal jobs.
  pub fn dismiss(&self, job_id: &str) -> Result<Arc<Job>, JobError> {
    let job = self.get(job_id)?;
    job.dismiss();
    info!(job_id = %job.job_id(), status = ?job.status(), "job dismissal requested");
    Ok(job)
  }

  /// When a terminal job's record will be evicted.
  pub fn expires_at(&self, job: &Job) -> Option<DateTime<Utc>> {
    job
      .snapshot()
      .completed_at
      .and_then(|completed| completed.checked_add_signed(self.retention))
  }

  fn is_expired(&self, job: &Job, now: DateTime<Utc>) -> bool {
    self.expires_at(job).is_some_and(|expiry| expiry <= now)
  }

  fn evict(&self, job_id: &str) {
    if self
      .jobs
      .write()
      .expect("job store lock poisoned")
      .remove(job_id)
      .is_some()
    {
      debug!(job_id, "expired job evicted");
    }
  }

  /// Evict every job whose retention lapsed before `now`. Returns the
  /// number of evicted records.
  pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
    let expired: Vec<String> = self
      .jobs
      .read()
      .expect("job store lock poisoned")
      .values()
      .filter(|job| self.is_expired(job, now))
      .map(|job| job.job_id().to_string())
      .collect();

    for job_id in &expired {
      self.evict(job_id);
    }
    expired.len()
  }

  /// Background eviction loop; runs until the token is cancelled.
  pub async fn run_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          debug!("job sweeper stopped");
          break;
        }
        _ = ticker.tick() => {
          let evicted = self.sweep_expired(Utc::now());
          if evicted > 0 {
            info!(evicted, "expired jobs evicted");
          }
        }
      }
    }
  }

  /// Number of live records (testing and diagnostics).
  pub fn len(&self) -> usize {
    self.jobs.read().expect("job store lock poisoned").len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::job::JobStatus;

  #[test]
  fn get_unknown_job_fails() {
    let store = JobStore::new(Duration::from_secs(60));
    assert!(matches!(
      store.get("nope"),
      Err(JobError::NoSuchJob { job_id }) if job_id == "nope"
    ));
  }

  #[test]
  fn created_jobs_are_retrievable() {
    let store = JobStore::new(Duration::from_secs(60));
    let job = store.create("p:demo", JobData::new());
    let found = store.get(job.job_id()).unwrap();
    assert_eq!(found.process_id(), "p:demo");
  }

  #[test]
  fn dismissing_an_accepted_job_is_terminal() {
    let store = JobStore::new(Duration::from_secs(60));
    let job = store.create("p:demo", JobData::new());
    store.dismiss(job.job_id()).unwrap();
    assert_eq!(job.status(), JobStatus::Dismissed);

    // Idempotent on terminal jobs.
    store.dismiss(job.job_id()).unwrap();
    assert_eq!(job.status(), JobStatus::Dismissed);
  }

  #[test]
  fn child_jobs_inherit_cancellation() {
    let store = JobStore::new(Duration::from_secs(60));
    let parent = store.create("p:model", JobData::new());
    let child = store.create_child("p:step", JobData::new(), parent.cancel_token());

    parent.cancel_token().cancel();
    assert!(child.cancel_token().is_cancelled());
  }

  #[test]
  fn sweep_evicts_only_lapsed_terminal_jobs() {
    let store = JobStore::new(Duration::from_millis(0));
    let done = store.create("p:done", JobData::new());
    done.try_start();
    done.succeed(JobData::new());
    let live = store.create("p:live", JobData::new());

    let evicted = store.sweep_expired(Utc::now() + chrono::Duration::seconds(1));
    assert_eq!(evicted, 1);
    assert!(store.get(done.job_id()).is_err());
    assert!(store.get(live.job_id()).is_ok());
  }

  #[test]
  fn lookup_evicts_lazily() {
    let store = JobStore::new(Duration::from_millis(0));
    let job = store.create("p:done", JobData::new());
    job.try_start();
    job.succeed(JobData::new());

    std::thread::sleep(Duration::from_millis(5));
    assert!(matches!(
      store.get(job.job_id()),
      Err(JobError::NoSuchJob { .. })
    ));
    assert!(store.is_empty());
  }

  #[test]
  fn expiry_is_completion_plus_retention() {
    let store = JobStore::new(Duration::from_secs(3600));
    let job = store.create("p:demo", JobData::new());
    assert!(store.expires_at(&job).is_none());

    job.try_start();
    job.succeed(JobData::new());
    let completed = job.snapshot().completed_at.unwrap();
    assert_eq!(
      store.expires_at(&job).unwrap(),
      completed + chrono::Duration::seconds(3600)
    );
  }
}
