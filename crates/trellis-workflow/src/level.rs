//! Topological leveling of workflow graphs.

use std::collections::HashMap;

use crate::error::WorkflowError;
use crate::graph::WorkflowGraph;

/// Level a workflow graph into ordered batches of step ids.
///
/// Kahn-style: a step enters the earliest level at which all of its upstream
/// steps have already been placed. Steps inside one level have no data
/// dependency on each other and may execute concurrently.
///
/// Fails with [`WorkflowError::Cycle`] when steps remain unplaceable, and
/// with the graph's own validation errors for dangling edges or bindings.
pub fn execution_levels(graph: &WorkflowGraph) -> Result<Vec<Vec<String>>, WorkflowError> {
  graph.validate()?;

  let adjacency = graph.downstream_map();

  // In-degree over distinct upstream steps, so parallel edges between the
  // same pair of steps count once.
  let mut in_degree: HashMap<&str, usize> = graph
    .steps
    .iter()
    .map(|s| (s.step_id.as_str(), graph.upstream(&s.step_id).len()))
    .collect();

  let mut levels: Vec<Vec<String>> = Vec::new();
  let mut placed = 0usize;

  while placed < graph.steps.len() {
    // Declaration order within a level is kept stable.
    let ready: Vec<&str> = graph
      .steps
      .iter()
      .map(|s| s.step_id.as_str())
      .filter(|id| in_degree.get(id) == Some(&0))
      .collect();

    if ready.is_empty() {
      let mut remaining: Vec<String> = in_degree
        .iter()
        .filter(|(_, d)| **d > 0)
        .map(|(id, _)| id.to_string())
        .collect();
      remaining.sort();
      return Err(WorkflowError::Cycle { steps: remaining });
    }

    for id in &ready {
      in_degree.remove(id);
      for downstream in adjacency.get(id).into_iter().flatten() {
        if let Some(degree) = in_degree.get_mut(downstream) {
          *degree -= 1;
        }
      }
    }

    placed += ready.len();
    levels.push(ready.into_iter().map(str::to_string).collect());
  }

  Ok(levels)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::{DataEdge, WorkflowStep};

  fn step(step_id: &str) -> WorkflowStep {
    WorkflowStep {
      step_id: step_id.to_string(),
      process_id: format!("process:{step_id}"),
    }
  }

  fn edge(from: &str, to: &str) -> DataEdge {
    DataEdge {
      from_step: from.to_string(),
      output: "out".to_string(),
      to_step: to.to_string(),
      input: "in".to_string(),
    }
  }

  #[test]
  fn linear_chain_levels_one_step_each() {
    let graph = WorkflowGraph {
      steps: vec![step("b"), step("a"), step("c")],
      edges: vec![edge("b", "a"), edge("a", "c")],
      ..Default::default()
    };

    let levels = execution_levels(&graph).unwrap();
    assert_eq!(levels, vec![vec!["b"], vec!["a"], vec!["c"]]);
  }

  #[test]
  fn diamond_runs_middle_steps_in_one_level() {
    let graph = WorkflowGraph {
      steps: vec![step("root"), step("left"), step("right"), step("sink")],
      edges: vec![
        edge("root", "left"),
        edge("root", "right"),
        edge("left", "sink"),
        edge("right", "sink"),
      ],
      ..Default::default()
    };

    let levels = execution_levels(&graph).unwrap();
    assert_eq!(levels.len(), 3);
    assert_eq!(levels[0], vec!["root"]);
    assert_eq!(levels[1], vec!["left", "right"]);
    assert_eq!(levels[2], vec!["sink"]);
  }

  #[test]
  fn parallel_edges_between_two_steps_level_once() {
    let graph = WorkflowGraph {
      steps: vec![step("a"), step("c")],
      edges: vec![
        DataEdge {
          from_step: "a".to_string(),
          output: "out1".to_string(),
          to_step: "c".to_string(),
          input: "in1".to_string(),
        },
        DataEdge {
          from_step: "a".to_string(),
          output: "out2".to_string(),
          to_step: "c".to_string(),
          input: "in2".to_string(),
        },
      ],
      ..Default::default()
    };

    let levels = execution_levels(&graph).unwrap();
    assert_eq!(levels, vec![vec!["a"], vec!["c"]]);
  }

  #[test]
  fn cycle_is_rejected() {
    let graph = WorkflowGraph {
      steps: vec![step("a"), step("b")],
      edges: vec![edge("a", "b"), edge("b", "a")],
      ..Default::default()
    };

    match execution_levels(&graph) {
      Err(WorkflowError::Cycle { steps }) => {
        assert_eq!(steps, vec!["a".to_string(), "b".to_string()]);
      }
      other => panic!("expected cycle error, got {other:?}"),
    }
  }

  #[test]
  fn disconnected_steps_share_the_first_level() {
    let graph = WorkflowGraph {
      steps: vec![step("a"), step("b")],
      ..Default::default()
    };

    let levels = execution_levels(&graph).unwrap();
    assert_eq!(levels, vec![vec!["a", "b"]]);
  }
}
