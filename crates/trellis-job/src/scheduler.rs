//! Dispatch of job bodies onto a bounded worker pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::ExecutionFailure;
use crate::job::{Job, JobData};

/// A job body: an already-prepared future producing the job's outputs.
///
/// Blocking process invocations must be wrapped in `spawn_blocking` by the
/// body's author; the scheduler itself never blocks an executor thread.
pub type JobBody = Pin<Box<dyn Future<Output = Result<JobData, ExecutionFailure>> + Send>>;

/// Client polling-delay policy: bounded exponential backoff.
///
/// `next_poll(k) = min(base * multiplier^k, max)` where `k` is the number of
/// status polls the client has already made for the job.
#[derive(Debug, Clone)]
pub struct PollPolicy {
  pub base: Duration,
  pub multiplier: f64,
  pub max: Duration,
}

impl Default for PollPolicy {
  fn default() -> Self {
    Self {
      base: Duration::from_millis(500),
      multiplier: 2.0,
      max: Duration::from_secs(30),
    }
  }
}

impl PollPolicy {
  /// Suggested delay before the next status poll.
  pub fn next_poll(&self, polls: u32) -> Duration {
    let delay_ms = self.base.as_millis() as f64 * self.multiplier.powi(polls.min(64) as i32);
    if delay_ms >= self.max.as_millis() as f64 {
      self.max
    } else {
      Duration::from_millis(delay_ms as u64)
    }
  }
}

/// Dispatches job bodies and tracks pool capacity.
///
/// With no pool configured (`worker_count: None`) scheduling is a recorded
/// no-op: the job stays Accepted forever and every query path keeps
/// working - the degenerate mode must not crash callers.
pub struct JobScheduler {
  pool: Option<Arc<Semaphore>>,
  poll: PollPolicy,
}

impl JobScheduler {
  pub fn new(worker_count: Option<usize>, poll: PollPolicy) -> Self {
    Self {
      pool: worker_count.map(|size| Arc::new(Semaphore::new(size))),
      poll,
    }
  }

  pub fn poll_policy(&self) -> &PollPolicy {
    &self.poll
  }

  pub fn has_executor(&self) -> bool {
    self.pool.is_some()
  }

  /// Dispatch a pooled job: the worker holds one pool permit for the whole
  /// body, so true execution overlap is bounded by the pool size.
  pub fn schedule(&self, job: Arc<Job>, body: JobBody) {
    self.dispatch(job, body, true);
  }

  /// Dispatch without a permit. Coordinator jobs (workflow models) use
  /// this: they spend their life waiting on their own step jobs, and a
  /// level's worth of models holding permits would starve the very steps
  /// they wait for.
  pub fn schedule_unpooled(&self, job: Arc<Job>, body: JobBody) {
    self.dispatch(job, body, false);
  }

  fn dispatch(&self, job: Arc<Job>, body: JobBody, pooled: bool) {
    let Some(pool) = &self.pool else {
      debug!(job_id = %job.job_id(), "no executor configured; job stays accepted");
      return;
    };

    let pool = pool.clone();
    tokio::spawn(async move {
      let _permit = if pooled {
        if job.cancel_token().is_cancelled() {
          job.finalize_dismissed();
          return;
        }
        match pool.acquire_owned().await {
          Ok(permit) => Some(permit),
          Err(_) => return,
        }
      } else {
        None
      };

      run_job(job, body).await;
    });
  }
}

/// The worker boundary: start the job, run the body, record the outcome.
/// Nothing thrown by the body - error or panic - escapes into the
/// scheduler's own task.
async fn run_job(job: Arc<Job>, body: JobBody) {
  if job.cancel_token().is_cancelled() {
    job.finalize_dismissed();
    debug!(job_id = %job.job_id(), "job dismissed before start");
    return;
  }
  if !job.try_start() {
    return;
  }
  info!(job_id = %job.job_id(), process_id = %job.process_id(), "job started");

  let outcome = std::panic::AssertUnwindSafe(body).catch_unwind().await;

  // Dismissal wins over whatever the body returned.
  if job.cancel_token().is_cancelled() {
    job.finalize_dismissed();
    info!(job_id = %job.job_id(), "job dismissed");
    return;
  }

  match outcome {
    Ok(Ok(outputs)) => {
      job.progress().end_of_progress();
      job.succeed(outputs);
      info!(job_id = %job.job_id(), "job succeeded");
    }
    Ok(Err(failure)) => {
      job.fail(failure.message.clone());
      warn!(job_id = %job.job_id(), error = %failure, "job failed");
    }
    Err(panic) => {
      let message = panic_message(panic);
      error!(job_id = %job.job_id(), message = %message, "job body panicked");
      job.fail(message);
    }
  }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    format!("job body panicked: {message}")
  } else if let Some(message) = payload.downcast_ref::<String>() {
    format!("job body panicked: {message}")
  } else {
    "job body panicked".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::job::JobStatus;
  use crate::store::JobStore;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn store() -> JobStore {
    JobStore::new(Duration::from_secs(60))
  }

  #[test]
  fn poll_delay_grows_exponentially_and_caps() {
    let policy = PollPolicy {
      base: Duration::from_millis(100),
      multiplier: 2.0,
      max: Duration::from_secs(1),
    };

    assert_eq!(policy.next_poll(0), Duration::from_millis(100));
    assert_eq!(policy.next_poll(1), Duration::from_millis(200));
    assert_eq!(policy.next_poll(2), Duration::from_millis(400));
    assert_eq!(policy.next_poll(10), Duration::from_secs(1));
    // Huge poll counts must not overflow.
    assert_eq!(policy.next_poll(u32::MAX), Duration::from_secs(1));
  }

  #[tokio::test]
  async fn without_executor_jobs_stay_accepted() {
    let scheduler = JobScheduler::new(None, PollPolicy::default());
    let job = store().create("p:idle", JobData::new());

    scheduler.schedule(job.clone(), Box::pin(async { Ok(JobData::new()) }));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(job.status(), JobStatus::Accepted);
  }

  #[tokio::test]
  async fn body_outputs_are_recorded_on_success() {
    let scheduler = JobScheduler::new(Some(2), PollPolicy::default());
    let job = store().create("p:ok", JobData::new());

    scheduler.schedule(
      job.clone(),
      Box::pin(async { Ok(JobData::from([("out".to_string(), json!(42))])) }),
    );

    assert_eq!(job.await_terminal().await, JobStatus::Succeeded);
    let snapshot = job.snapshot();
    assert_eq!(snapshot.outputs["out"], json!(42));
    assert_eq!(snapshot.progression, 1.0);
  }

  #[tokio::test]
  async fn body_error_is_recorded_as_failure() {
    let scheduler = JobScheduler::new(Some(2), PollPolicy::default());
    let job = store().create("p:bad", JobData::new());

    scheduler.schedule(
      job.clone(),
      Box::pin(async { Err(ExecutionFailure::new("division by zero")) }),
    );

    assert_eq!(job.await_terminal().await, JobStatus::Failed);
    assert_eq!(job.snapshot().failure.as_deref(), Some("division by zero"));
  }

  #[tokio::test]
  async fn body_panic_is_caught_at_the_worker_boundary() {
    let scheduler = JobScheduler::new(Some(2), PollPolicy::default());
    let job = store().create("p:panics", JobData::new());

    scheduler.schedule(job.clone(), Box::pin(async { panic!("kaboom") }));

    assert_eq!(job.await_terminal().await, JobStatus::Failed);
    let failure = job.snapshot().failure.unwrap();
    assert!(failure.contains("kaboom"), "unexpected message: {failure}");
  }

  #[tokio::test]
  async fn dismissed_while_queued_never_runs() {
    let scheduler = JobScheduler::new(Some(1), PollPolicy::default());
    let store = store();

    // Occupy the single worker slot.
    let blocker = store.create("p:blocker", JobData::new());
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    scheduler.schedule(
      blocker.clone(),
      Box::pin(async move {
        let _ = release_rx.await;
        Ok(JobData::new())
      }),
    );

    let queued = store.create("p:queued", JobData::new());
    let ran = Arc::new(AtomicU32::new(0));
    let ran_in_body = ran.clone();
    scheduler.schedule(
      queued.clone(),
      Box::pin(async move {
        ran_in_body.fetch_add(1, Ordering::SeqCst);
        Ok(JobData::new())
      }),
    );

    store.dismiss(queued.job_id()).unwrap();
    let _ = release_tx.send(());

    assert_eq!(queued.await_terminal().await, JobStatus::Dismissed);
    assert_eq!(blocker.await_terminal().await, JobStatus::Succeeded);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn pool_bounds_true_overlap() {
    let scheduler = JobScheduler::new(Some(2), PollPolicy::default());
    let store = store();
    let active = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));

    let jobs: Vec<_> = (0..5)
      .map(|i| {
        let job = store.create(format!("p:load-{i}"), JobData::new());
        let active = active.clone();
        let peak = peak.clone();
        scheduler.schedule(
          job.clone(),
          Box::pin(async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(JobData::new())
          }),
        );
        job
      })
      .collect();

    for job in &jobs {
      assert_eq!(job.await_terminal().await, JobStatus::Succeeded);
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
  }
}
