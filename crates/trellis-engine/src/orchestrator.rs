//! Execution of composite "model" processes.
//!
//! A model's body does no work of its own: the graph is leveled
//! topologically, every step becomes a child job through the regular submit
//! path, and a shared data map carries values from each step's outputs to
//! the inputs wired to them. The coordinator checks its cancellation token
//! between levels; dismissal of the model job cascades to the steps through
//! their child tokens.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use trellis_job::{ExecutionFailure, Job, JobBody, JobData, JobStatus};
use trellis_process::ProcessDescriptor;
use trellis_workflow::{WorkflowGraph, execution_levels};

use crate::engine::ExecutionManager;

/// Values flowing through a single model run, keyed by target slot
/// `(step_id, input)`. Exclusive to the run; steps of one level write
/// disjoint keys by construction, so there is no write-write race to guard.
type DataMap = HashMap<(String, String), serde_json::Value>;

/// Build the scheduler body for a model job.
pub(crate) fn model_body(
  manager: ExecutionManager,
  descriptor: Arc<ProcessDescriptor>,
  job: Arc<Job>,
) -> JobBody {
  Box::pin(async move { run_model(manager, descriptor, job).await })
}

async fn run_model(
  manager: ExecutionManager,
  descriptor: Arc<ProcessDescriptor>,
  job: Arc<Job>,
) -> Result<JobData, ExecutionFailure> {
  let graph = descriptor
    .workflow
    .as_ref()
    .ok_or_else(|| ExecutionFailure::new("process has no workflow graph"))?;

  // Submit-time validation already leveled the graph; a failure here means
  // the descriptor was replaced under the job's feet.
  let levels =
    execution_levels(graph).map_err(|e| ExecutionFailure::new(format!("malformed workflow: {e}")))?;

  job.progress().sub_process(graph.steps.len() as u32);

  let mut data = seed_inputs(graph, job.inputs());
  let mut step_outputs: HashMap<String, JobData> = HashMap::new();

  for (index, level) in levels.iter().enumerate() {
    if job.cancel_token().is_cancelled() {
      return Err(ExecutionFailure::new("model dismissed"));
    }
    info!(
      job_id = %job.job_id(),
      level = index,
      steps = ?level,
      "running workflow level"
    );

    let mut children = Vec::with_capacity(level.len());
    for step_id in level {
      let child = submit_step(&manager, graph, step_id, &data, &job)?;
      children.push((step_id.clone(), child));
    }

    let finished = join_all(children.into_iter().map(|(step_id, child)| async move {
      let status = child.await_terminal().await;
      (step_id, status, child)
    }))
    .await;

    for (step_id, status, child) in finished {
      match status {
        JobStatus::Succeeded => {
          let outputs = child.snapshot().outputs;
          propagate_outputs(graph, &step_id, &outputs, &mut data)?;
          step_outputs.insert(step_id, outputs);
          job.progress().end_step();
        }
        JobStatus::Failed => {
          let message = child
            .snapshot()
            .failure
            .unwrap_or_else(|| "unknown failure".to_string());
          warn!(job_id = %job.job_id(), step_id, error = %message, "workflow step failed");
          return Err(ExecutionFailure::new(format!(
            "step '{step_id}' failed: {message}"
          )));
        }
        _ => {
          return Err(ExecutionFailure::new(format!(
            "step '{step_id}' was dismissed"
          )));
        }
      }
    }
  }

  assemble_outputs(graph, &step_outputs)
}

/// Seed the data map from the model's own inputs through the graph-level
/// input bindings.
fn seed_inputs(graph: &WorkflowGraph, inputs: &JobData) -> DataMap {
  let mut data = DataMap::new();
  for binding in &graph.input_bindings {
    if let Some(value) = inputs.get(&binding.model_input) {
      data.insert(
        (binding.to_step.clone(), binding.input.clone()),
        value.clone(),
      );
    }
  }
  data
}

/// Gather a step's wired inputs and submit it as a child job through the
/// regular submit path, inheriting cancellation and failure semantics.
fn submit_step(
  manager: &ExecutionManager,
  graph: &WorkflowGraph,
  step_id: &str,
  data: &DataMap,
  model_job: &Job,
) -> Result<Arc<Job>, ExecutionFailure> {
  let step = graph
    .step(step_id)
    .ok_or_else(|| ExecutionFailure::new(format!("unknown step '{step_id}'")))?;

  let step_inputs: JobData = data
    .iter()
    .filter(|((target, _), _)| target == step_id)
    .map(|((_, input), value)| (input.clone(), value.clone()))
    .collect();

  manager
    .submit(&step.process_id, step_inputs, model_job.cancel_token())
    .map_err(|e| ExecutionFailure::new(format!("step '{step_id}' rejected: {e}")))
}

/// Copy a completed step's declared outputs into the slots its outgoing
/// edges feed, making them visible to later levels.
fn propagate_outputs(
  graph: &WorkflowGraph,
  step_id: &str,
  outputs: &JobData,
  data: &mut DataMap,
) -> Result<(), ExecutionFailure> {
  for edge in graph.edges.iter().filter(|e| e.from_step == step_id) {
    let value = outputs.get(&edge.output).ok_or_else(|| {
      ExecutionFailure::new(format!(
        "step '{step_id}' produced no output '{}'",
        edge.output
      ))
    })?;
    data.insert((edge.to_step.clone(), edge.input.clone()), value.clone());
  }
  Ok(())
}

/// The graph-output-bound entries of the completed run form the model's
/// result.
fn assemble_outputs(
  graph: &WorkflowGraph,
  step_outputs: &HashMap<String, JobData>,
) -> Result<JobData, ExecutionFailure> {
  let mut outputs = JobData::new();
  for binding in &graph.output_bindings {
    let value = step_outputs
      .get(&binding.from_step)
      .and_then(|step| step.get(&binding.output))
      .ok_or_else(|| {
        ExecutionFailure::new(format!(
          "output binding '{}' references missing value '{}/{}'",
          binding.model_output, binding.from_step, binding.output
        ))
      })?;
    outputs.insert(binding.model_output.clone(), value.clone());
  }
  Ok(outputs)
}
