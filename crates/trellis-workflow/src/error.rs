use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("duplicate step id: {step_id}")]
  DuplicateStep { step_id: String },

  #[error("{referenced_by} references unknown step: {step_id}")]
  UnknownStep {
    step_id: String,
    referenced_by: String,
  },

  #[error("workflow graph is cyclic; unschedulable steps: {steps:?}")]
  Cycle { steps: Vec<String> },
}
