//! Trellis Progress
//!
//! Hierarchical progress accumulator reported by a running task. A tracker
//! declares a number of equal-weight steps, ends them one by one and exposes
//! the aggregate progression in `[0, 1]`. Nested work attaches a child
//! tracker that counts toward one step of its parent.
//!
//! The tracker is a cheap clonable handle over a lock-guarded mutable tree:
//! the worker thread writes, status readers read.

use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ProgressNode {
  total: u32,
  completed: u32,
  children: Vec<Arc<Mutex<ProgressNode>>>,
  forced_complete: bool,
}

fn progression_of(node: &ProgressNode) -> f64 {
  if node.forced_complete {
    return 1.0;
  }
  if node.total == 0 {
    return 0.0;
  }

  let nested: f64 = node
    .children
    .iter()
    .map(|child| progression_of(&child.lock().expect("progress lock poisoned")))
    .sum();

  ((node.completed as f64 + nested) / node.total as f64).clamp(0.0, 1.0)
}

fn is_finished(node: &ProgressNode) -> bool {
  node.forced_complete || (node.total > 0 && node.completed >= node.total)
}

/// Shared handle to a progress tree.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
  node: Arc<Mutex<ProgressNode>>,
}

impl ProgressTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare `total_steps` equal-weight sub-steps and reset the counter.
  ///
  /// Any previously attached children are discarded.
  pub fn sub_process(&self, total_steps: u32) {
    let mut node = self.lock();
    node.total = total_steps;
    node.completed = 0;
    node.children.clear();
    node.forced_complete = false;
  }

  /// Mark one declared step as finished, clamped at the declared total.
  ///
  /// A finished child tracker is absorbed into the counter so its work is
  /// not counted twice.
  pub fn end_step(&self) {
    let mut node = self.lock();
    if let Some(pos) = node
      .children
      .iter()
      .position(|child| is_finished(&child.lock().expect("progress lock poisoned")))
    {
      node.children.remove(pos);
    }
    node.completed = (node.completed + 1).min(node.total);
  }

  /// Attach a nested tracker counting toward one step of this tracker.
  pub fn child(&self) -> ProgressTracker {
    let child = Arc::new(Mutex::new(ProgressNode::default()));
    self.lock().children.push(child.clone());
    ProgressTracker { node: child }
  }

  /// Aggregate progression in `[0, 1]`, recursing over live children.
  pub fn progression(&self) -> f64 {
    progression_of(&self.lock())
  }

  /// Idempotently force the progression to exactly `1.0`.
  pub fn end_of_progress(&self) {
    self.lock().forced_complete = true;
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, ProgressNode> {
    self.node.lock().expect("progress lock poisoned")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ten_steps_report_tenths() {
    let tracker = ProgressTracker::new();
    tracker.sub_process(10);

    for step in 0..10u32 {
      assert!((tracker.progression() - step as f64 / 10.0).abs() < f64::EPSILON);
      tracker.end_step();
    }
    assert_eq!(tracker.progression(), 1.0);
  }

  #[test]
  fn end_step_clamps_at_total() {
    let tracker = ProgressTracker::new();
    tracker.sub_process(2);
    for _ in 0..5 {
      tracker.end_step();
    }
    assert_eq!(tracker.progression(), 1.0);
  }

  #[test]
  fn end_of_progress_forces_completion() {
    let tracker = ProgressTracker::new();
    tracker.sub_process(100);
    tracker.end_step();

    tracker.end_of_progress();
    assert_eq!(tracker.progression(), 1.0);

    // Idempotent.
    tracker.end_of_progress();
    assert_eq!(tracker.progression(), 1.0);
  }

  #[test]
  fn undeclared_tracker_reports_zero() {
    let tracker = ProgressTracker::new();
    assert_eq!(tracker.progression(), 0.0);
  }

  #[test]
  fn child_progression_counts_toward_one_parent_step() {
    let parent = ProgressTracker::new();
    parent.sub_process(2);

    let child = parent.child();
    child.sub_process(2);
    child.end_step();

    // Half of one of two parent steps.
    assert!((parent.progression() - 0.25).abs() < f64::EPSILON);

    child.end_step();
    assert!((parent.progression() - 0.5).abs() < f64::EPSILON);

    // Ending the parent step absorbs the finished child instead of
    // double-counting it.
    parent.end_step();
    assert!((parent.progression() - 0.5).abs() < f64::EPSILON);

    parent.end_step();
    assert_eq!(parent.progression(), 1.0);
  }

  #[test]
  fn sub_process_resets_state() {
    let tracker = ProgressTracker::new();
    tracker.sub_process(4);
    tracker.end_step();
    tracker.end_step();

    tracker.sub_process(4);
    assert_eq!(tracker.progression(), 0.0);
  }

  #[test]
  fn shared_handles_observe_the_same_tree() {
    let tracker = ProgressTracker::new();
    let observer = tracker.clone();
    tracker.sub_process(4);
    tracker.end_step();
    assert!((observer.progression() - 0.25).abs() < f64::EPSILON);
  }
}
