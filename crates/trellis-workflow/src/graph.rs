use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// A single step of a workflow, referencing a registered process by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
  pub step_id: String,
  pub process_id: String,
}

/// A directed data edge: one step's output feeds another step's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEdge {
  pub from_step: String,
  pub output: String,
  pub to_step: String,
  pub input: String,
}

/// Binds one of the model's own inputs to a step input slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
  pub model_input: String,
  pub to_step: String,
  pub input: String,
}

/// Binds a step output slot to one of the model's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
  pub from_step: String,
  pub output: String,
  pub model_output: String,
}

/// The declared graph of a composite "model" process.
///
/// Steps reference processes by identifier only; the graph carries no
/// descriptors of its own. The graph must be acyclic - [`crate::execution_levels`]
/// rejects cycles when the graph is leveled for execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
  pub steps: Vec<WorkflowStep>,
  #[serde(default)]
  pub edges: Vec<DataEdge>,
  #[serde(default)]
  pub input_bindings: Vec<InputBinding>,
  #[serde(default)]
  pub output_bindings: Vec<OutputBinding>,
}

impl WorkflowGraph {
  /// Get a step by id.
  pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }

  /// Distinct upstream step ids for a step, derived from the data edges.
  pub fn upstream(&self, step_id: &str) -> BTreeSet<&str> {
    self
      .edges
      .iter()
      .filter(|e| e.to_step == step_id)
      .map(|e| e.from_step.as_str())
      .collect()
  }

  /// Adjacency map: step id -> distinct downstream step ids.
  pub(crate) fn downstream_map(&self) -> HashMap<&str, BTreeSet<&str>> {
    let mut adjacency: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for step in &self.steps {
      adjacency.entry(step.step_id.as_str()).or_default();
    }
    for edge in &self.edges {
      adjacency
        .entry(edge.from_step.as_str())
        .or_default()
        .insert(edge.to_step.as_str());
    }
    adjacency
  }

  /// Check that step ids are unique and that every edge and binding endpoint
  /// names a declared step.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for step in &self.steps {
      if !seen.insert(step.step_id.as_str()) {
        return Err(WorkflowError::DuplicateStep {
          step_id: step.step_id.clone(),
        });
      }
    }

    let check = |step_id: &str, referenced_by: &str| -> Result<(), WorkflowError> {
      if seen.contains(step_id) {
        Ok(())
      } else {
        Err(WorkflowError::UnknownStep {
          step_id: step_id.to_string(),
          referenced_by: referenced_by.to_string(),
        })
      }
    };

    for edge in &self.edges {
      check(&edge.from_step, "edge source")?;
      check(&edge.to_step, "edge target")?;
    }
    for binding in &self.input_bindings {
      check(&binding.to_step, "input binding")?;
    }
    for binding in &self.output_bindings {
      check(&binding.from_step, "output binding")?;
    }

    Ok(())
  }
}
