//! The process loader seam.
//!
//! The original definition source (annotation scanning over deployed
//! artifacts) is abstracted away entirely: the engine consumes a declarative
//! [`ProcessDescriptor`] plus a synchronous invocation entry point through
//! the [`ProcessLoader`] trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use trellis_progress::ProgressTracker;

use crate::descriptor::{ProcessDescriptor, ProcessInputs, ProcessOutputs};
use crate::error::{InvokeError, ProcessError};

/// Per-invocation context threaded into process bodies.
///
/// Cancellation is cooperative: a long-running body is expected to check
/// `cancel` between loop iterations and bail out with an error when it is
/// raised. `progress` feeds the job's `percent_completed`.
#[derive(Debug, Clone)]
pub struct InvokeContext {
  pub job_id: String,
  pub cancel: CancellationToken,
  pub progress: ProgressTracker,
}

/// Source of process definitions and their invocation entry points.
///
/// `invoke` is synchronous and possibly long-running; the scheduler calls it
/// from a blocking worker thread, never from the async executor itself.
pub trait ProcessLoader: Send + Sync {
  /// Resolve a descriptor by identifier.
  fn resolve(&self, identifier: &str) -> Result<Arc<ProcessDescriptor>, ProcessError>;

  /// Run the process body with validated inputs.
  fn invoke(
    &self,
    descriptor: &ProcessDescriptor,
    inputs: &ProcessInputs,
    ctx: &InvokeContext,
  ) -> Result<ProcessOutputs, InvokeError>;
}

type ProcessBody =
  dyn Fn(&ProcessInputs, &InvokeContext) -> Result<ProcessOutputs, InvokeError> + Send + Sync;

/// In-memory loader backed by registered closures.
///
/// The embedding host (and the test suite) registers each process as a
/// descriptor plus a body closure.
#[derive(Default)]
pub struct StaticLoader {
  entries: RwLock<HashMap<String, (Arc<ProcessDescriptor>, Arc<ProcessBody>)>>,
}

impl StaticLoader {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a process body under the descriptor's identifier.
  pub fn register<F>(&self, descriptor: ProcessDescriptor, body: F)
  where
    F: Fn(&ProcessInputs, &InvokeContext) -> Result<ProcessOutputs, InvokeError>
      + Send
      + Sync
      + 'static,
  {
    let identifier = descriptor.identifier.clone();
    let body: Arc<ProcessBody> = Arc::new(body);
    self
      .entries
      .write()
      .expect("loader lock poisoned")
      .insert(identifier, (Arc::new(descriptor), body));
  }

  /// Register a descriptor without a body (models have no body of their
  /// own - the orchestrator runs their steps).
  pub fn register_model(&self, descriptor: ProcessDescriptor) {
    self.register(descriptor, |_, _| {
      Err(InvokeError::new("model processes are run by the orchestrator"))
    });
  }
}

impl ProcessLoader for StaticLoader {
  fn resolve(&self, identifier: &str) -> Result<Arc<ProcessDescriptor>, ProcessError> {
    self
      .entries
      .read()
      .expect("loader lock poisoned")
      .get(identifier)
      .map(|(descriptor, _)| descriptor.clone())
      .ok_or_else(|| ProcessError::NoSuchProcess {
        identifier: identifier.to_string(),
      })
  }

  fn invoke(
    &self,
    descriptor: &ProcessDescriptor,
    inputs: &ProcessInputs,
    ctx: &InvokeContext,
  ) -> Result<ProcessOutputs, InvokeError> {
    let body = self
      .entries
      .read()
      .expect("loader lock poisoned")
      .get(&descriptor.identifier)
      .map(|(_, body)| body.clone())
      .ok_or_else(|| {
        InvokeError::new(format!("no body registered for '{}'", descriptor.identifier))
      })?;

    body(inputs, ctx)
  }
}
