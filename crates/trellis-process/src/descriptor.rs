use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trellis_workflow::WorkflowGraph;

/// Named process data values, keyed by parameter identifier.
pub type ProcessInputs = HashMap<String, serde_json::Value>;
pub type ProcessOutputs = HashMap<String, serde_json::Value>;

/// Type tag of a process parameter.
///
/// The tag is descriptive metadata for capability documents; the engine does
/// not coerce values against it - the protocol layer validates encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
  String,
  Integer,
  Double,
  Boolean,
  Object,
}

/// One named input or output of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
  pub identifier: String,
  pub parameter_type: ParameterType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default: Option<serde_json::Value>,
  pub min_occurs: u32,
  pub max_occurs: u32,
}

impl ParameterDescriptor {
  /// A mandatory parameter occurring exactly once.
  pub fn required(identifier: impl Into<String>, parameter_type: ParameterType) -> Self {
    Self {
      identifier: identifier.into(),
      parameter_type,
      default: None,
      min_occurs: 1,
      max_occurs: 1,
    }
  }

  /// An optional parameter with a default injected when absent.
  pub fn with_default(
    identifier: impl Into<String>,
    parameter_type: ParameterType,
    default: serde_json::Value,
  ) -> Self {
    Self {
      identifier: identifier.into(),
      parameter_type,
      default: Some(default),
      min_occurs: 0,
      max_occurs: 1,
    }
  }

  /// Override the occurrence bounds.
  pub fn occurs(mut self, min: u32, max: u32) -> Self {
    self.min_occurs = min;
    self.max_occurs = max;
    self
  }
}

/// Static metadata of a registered process.
///
/// Immutable once registered; the registry owns descriptors and hands out
/// shared references. A descriptor carrying a [`WorkflowGraph`] describes a
/// composite "model" process whose body is the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
  pub identifier: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub inputs: Vec<ParameterDescriptor>,
  #[serde(default)]
  pub outputs: Vec<ParameterDescriptor>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workflow: Option<WorkflowGraph>,
}

impl ProcessDescriptor {
  pub fn new(identifier: impl Into<String>) -> Self {
    Self {
      identifier: identifier.into(),
      title: None,
      description: None,
      inputs: Vec::new(),
      outputs: Vec::new(),
      workflow: None,
    }
  }

  pub fn with_title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }

  pub fn with_input(mut self, input: ParameterDescriptor) -> Self {
    self.inputs.push(input);
    self
  }

  pub fn with_output(mut self, output: ParameterDescriptor) -> Self {
    self.outputs.push(output);
    self
  }

  pub fn with_workflow(mut self, workflow: WorkflowGraph) -> Self {
    self.workflow = Some(workflow);
    self
  }

  /// Look up an input parameter by identifier.
  pub fn input(&self, identifier: &str) -> Option<&ParameterDescriptor> {
    self.inputs.iter().find(|p| p.identifier == identifier)
  }

  /// Look up an output parameter by identifier.
  pub fn output(&self, identifier: &str) -> Option<&ParameterDescriptor> {
    self.outputs.iter().find(|p| p.identifier == identifier)
  }

  /// Whether this process is a composite model backed by a workflow graph.
  pub fn is_model(&self) -> bool {
    self.workflow.is_some()
  }
}
