//! The execution manager.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use trellis_job::{
  ExecutionFailure, Job, JobBody, JobData, JobScheduler, JobStatus, JobStore,
};
use trellis_process::{
  InvokeContext, ProcessDescriptor, ProcessError, ProcessLoader, ProcessRegistry,
  RegistryListener, validate_inputs,
};
use trellis_workflow::execution_levels;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::orchestrator;
use crate::status::{ExecuteRequest, ResultDoc, StatusInfo};

/// The facade the protocol layer consumes: submit, poll, fetch, dismiss.
///
/// Cheap to clone; clones share the registry, store and scheduler. Every
/// job's cancellation token is a child of the manager's shutdown token, so
/// [`ExecutionManager::shutdown`] cooperatively stops everything in flight.
#[derive(Clone)]
pub struct ExecutionManager {
  registry: Arc<ProcessRegistry>,
  loader: Arc<dyn ProcessLoader>,
  store: Arc<JobStore>,
  scheduler: Arc<JobScheduler>,
  config: EngineConfig,
  shutdown: CancellationToken,
}

impl ExecutionManager {
  pub fn new(loader: Arc<dyn ProcessLoader>, config: EngineConfig) -> Self {
    Self {
      registry: Arc::new(ProcessRegistry::new()),
      loader,
      store: Arc::new(JobStore::new(config.retention)),
      scheduler: Arc::new(JobScheduler::new(config.worker_count, config.poll.clone())),
      config,
      shutdown: CancellationToken::new(),
    }
  }

  /// Spawn the background retention sweeper. Call once from within a tokio
  /// runtime; `shutdown` stops it.
  pub fn start(&self) {
    tokio::spawn(
      self
        .store
        .clone()
        .run_sweeper(self.config.sweep_interval, self.shutdown.child_token()),
    );
  }

  /// Cooperatively stop: cancels the sweeper and raises every live job's
  /// cancellation token.
  pub fn shutdown(&self) {
    info!("execution manager shutting down");
    self.shutdown.cancel();
  }

  pub fn registry(&self) -> &Arc<ProcessRegistry> {
    &self.registry
  }

  pub fn store(&self) -> &Arc<JobStore> {
    &self.store
  }

  /// Register a process descriptor, notifying registry listeners.
  pub fn add_process(&self, descriptor: ProcessDescriptor) {
    self.registry.register(descriptor);
  }

  /// Remove a process descriptor, notifying registry listeners.
  pub fn remove_process(&self, identifier: &str) -> Result<(), EngineError> {
    self.registry.unregister(identifier)?;
    Ok(())
  }

  /// All currently registered descriptors.
  pub fn processes(&self) -> Vec<Arc<ProcessDescriptor>> {
    self.registry.list()
  }

  pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
    self.registry.add_listener(listener);
  }

  /// Resolve a descriptor through the loader and register it.
  pub fn import(&self, identifier: &str) -> Result<Arc<ProcessDescriptor>, EngineError> {
    let descriptor = self.loader.resolve(identifier)?;
    self.registry.register(descriptor.as_ref().clone());
    Ok(descriptor)
  }

  /// Submit a job for the named process. Validation errors surface here,
  /// synchronously, without creating a job; the returned document reports
  /// the Accepted job and its first next-poll hint. Never blocks on
  /// completion.
  #[instrument(name = "execute", skip(self, request), fields(process_id = %request.identifier))]
  pub fn execute(&self, request: ExecuteRequest) -> Result<StatusInfo, EngineError> {
    let job = self.submit(&request.identifier, request.inputs, &self.shutdown)?;
    info!(
      job_id = %job.job_id(),
      wants_status = request.wants_status,
      wants_store = request.wants_store,
      "job accepted"
    );
    Ok(self.status_for(&job, 0))
  }

  /// Current status of a job. Each call advances the client's poll counter,
  /// which drives the exponential next-poll backoff.
  pub fn status(&self, job_id: &str) -> Result<StatusInfo, EngineError> {
    let job = self.store.get(job_id)?;
    let polls = job.record_poll();
    Ok(self.status_for(&job, polls))
  }

  /// Result document for a job. Callable in any state: a non-terminal or
  /// dismissed job yields empty outputs, a failed one its failure message.
  pub fn result(&self, job_id: &str) -> Result<ResultDoc, EngineError> {
    let job = self.store.get(job_id)?;
    Ok(self.result_for(&job))
  }

  /// Request cancellation of a job. Idempotent on terminal jobs; a running
  /// job flips to Dismissed once its worker observes the flag.
  pub fn dismiss(&self, job_id: &str) -> Result<StatusInfo, EngineError> {
    let job = self.store.dismiss(job_id)?;
    Ok(self.status_for(&job, 0))
  }

  /// Await a job's terminal state and return its result document - the
  /// synchronous response mode of the protocol.
  pub async fn wait(&self, job_id: &str) -> Result<ResultDoc, EngineError> {
    let job = self.store.get(job_id)?;
    job.await_terminal().await;
    Ok(self.result_for(&job))
  }

  /// The single submit path, shared by top-level requests and workflow
  /// steps (which pass their model job's token as `parent`).
  pub(crate) fn submit(
    &self,
    identifier: &str,
    inputs: JobData,
    parent: &CancellationToken,
  ) -> Result<Arc<Job>, EngineError> {
    let descriptor =
      self
        .registry
        .get(identifier)
        .ok_or_else(|| ProcessError::NoSuchProcess {
          identifier: identifier.to_string(),
        })?;

    let effective = validate_inputs(&descriptor, &inputs)?;

    // A malformed model must fail before a job exists.
    if let Some(graph) = &descriptor.workflow {
      execution_levels(graph)?;
    }

    let job = self.store.create_child(identifier, effective, parent);
    if descriptor.is_model() {
      let body = orchestrator::model_body(self.clone(), descriptor, job.clone());
      self.scheduler.schedule_unpooled(job.clone(), body);
    } else {
      let body = self.invoke_body(descriptor, job.clone());
      self.scheduler.schedule(job.clone(), body);
    }
    Ok(job)
  }

  /// Body of an atomic (non-model) job: the loader's synchronous `invoke`
  /// isolated on a blocking thread, with the job's cancellation token and
  /// progress tree threaded into the call.
  fn invoke_body(&self, descriptor: Arc<ProcessDescriptor>, job: Arc<Job>) -> JobBody {
    let loader = self.loader.clone();
    Box::pin(async move {
      let ctx = InvokeContext {
        job_id: job.job_id().to_string(),
        cancel: job.cancel_token().clone(),
        progress: job.progress().clone(),
      };
      let inputs = job.inputs().clone();

      let joined =
        tokio::task::spawn_blocking(move || loader.invoke(&descriptor, &inputs, &ctx)).await;

      match joined {
        Ok(Ok(outputs)) => Ok(outputs),
        Ok(Err(invoke)) => Err(ExecutionFailure::new(invoke.message)),
        Err(join) if join.is_panic() => Err(ExecutionFailure::new(panic_message(join.into_panic()))),
        Err(_) => Err(ExecutionFailure::new("worker task aborted")),
      }
    })
  }

  fn status_for(&self, job: &Job, polls: u32) -> StatusInfo {
    let snapshot = job.snapshot();
    let next_poll = Some(self.config.poll.next_poll(polls));
    match snapshot.status {
      JobStatus::Accepted => StatusInfo {
        job_id: snapshot.job_id,
        status: snapshot.status,
        percent_completed: None,
        next_poll,
        expires_at: None,
      },
      JobStatus::Running => StatusInfo {
        job_id: snapshot.job_id,
        status: snapshot.status,
        percent_completed: Some((snapshot.progression * 100.0).round() as u8),
        next_poll,
        expires_at: None,
      },
      _ => StatusInfo {
        job_id: snapshot.job_id,
        status: snapshot.status,
        percent_completed: None,
        next_poll: None,
        expires_at: self.store.expires_at(job),
      },
    }
  }

  fn result_for(&self, job: &Job) -> ResultDoc {
    let snapshot = job.snapshot();
    debug!(job_id = %snapshot.job_id, status = ?snapshot.status, "result read");
    ResultDoc {
      job_id: snapshot.job_id,
      outputs: snapshot.outputs,
      failure: snapshot.failure,
      expires_at: self.store.expires_at(job),
    }
  }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    format!("process panicked: {message}")
  } else if let Some(message) = payload.downcast_ref::<String>() {
    format!("process panicked: {message}")
  } else {
    "process panicked".to_string()
  }
}
