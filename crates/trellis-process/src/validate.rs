//! Submit-time input validation.

use crate::descriptor::{ProcessDescriptor, ProcessInputs};
use crate::error::ProcessError;

/// Count the occurrences a supplied value represents: a JSON array counts as
/// its length, anything else as one.
fn occurrences(value: &serde_json::Value) -> u32 {
  match value {
    serde_json::Value::Array(items) => items.len() as u32,
    _ => 1,
  }
}

/// Validate supplied inputs against a descriptor and resolve defaults.
///
/// Returns the effective input map the job will run with. Fails with
/// [`ProcessError::InvalidInput`] on unknown identifiers, missing mandatory
/// inputs and occurrence bounds violations. No job is created when this
/// fails - validation errors surface synchronously at submit time.
pub fn validate_inputs(
  descriptor: &ProcessDescriptor,
  inputs: &ProcessInputs,
) -> Result<ProcessInputs, ProcessError> {
  let invalid = |input: &str, reason: String| ProcessError::InvalidInput {
    process_id: descriptor.identifier.clone(),
    input: input.to_string(),
    reason,
  };

  for identifier in inputs.keys() {
    if descriptor.input(identifier).is_none() {
      return Err(invalid(identifier, "not declared by the process".to_string()));
    }
  }

  let mut effective = ProcessInputs::new();
  for parameter in &descriptor.inputs {
    match inputs.get(&parameter.identifier) {
      Some(value) => {
        let count = occurrences(value);
        if count < parameter.min_occurs {
          return Err(invalid(
            &parameter.identifier,
            format!("{} occurrence(s), minimum is {}", count, parameter.min_occurs),
          ));
        }
        if count > parameter.max_occurs {
          return Err(invalid(
            &parameter.identifier,
            format!("{} occurrence(s), maximum is {}", count, parameter.max_occurs),
          ));
        }
        effective.insert(parameter.identifier.clone(), value.clone());
      }
      None => {
        if let Some(default) = &parameter.default {
          effective.insert(parameter.identifier.clone(), default.clone());
        } else if parameter.min_occurs > 0 {
          return Err(invalid(&parameter.identifier, "missing mandatory input".to_string()));
        }
      }
    }
  }

  Ok(effective)
}
