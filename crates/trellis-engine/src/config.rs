use std::time::Duration;

use trellis_job::PollPolicy;

/// Configuration for the execution manager.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Polling-delay policy surfaced to clients as the next-poll hint.
  pub poll: PollPolicy,
  /// How long terminal job records stay queryable past completion.
  pub retention: Duration,
  /// Cadence of the background eviction sweep.
  pub sweep_interval: Duration,
  /// Worker pool size. `None` means no backing executor: submitted jobs are
  /// accepted but never progress (degenerate mode, must not crash callers).
  pub worker_count: Option<usize>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      poll: PollPolicy::default(),
      retention: Duration::from_secs(15 * 60),
      sweep_interval: Duration::from_secs(30),
      worker_count: Some(4),
    }
  }
}
