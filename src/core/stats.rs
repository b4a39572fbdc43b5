//! Live processor statistics and the lock-protected counter block.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Width of the rolling completion window used for messages-per-minute.
pub(crate) const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Lifecycle status reported in statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorStatus {
    /// The instance loop is active.
    Running,
    /// The instance exists but its loop has been stopped.
    Stopped,
    /// The name is configured but was never started.
    NotStarted,
    /// The name is neither configured nor known to the engine.
    NotFound,
    /// The loop is active but its last iteration failed.
    Error,
}

impl std::fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
            Self::NotStarted => write!(f, "Not Started"),
            Self::NotFound => write!(f, "Not Found"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Point-in-time statistics snapshot for one processor name.
///
/// Snapshots are immutable copies; callers never see a live reference to the
/// counters being mutated by in-flight processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorStatistics {
    /// Processor name.
    pub name: String,
    /// Whether the instance loop is active.
    pub is_running: bool,
    /// Completions observed in the trailing 60-second window.
    pub messages_per_minute: f64,
    /// Size of the last polled batch, an approximation of queue depth.
    pub pending_count: u64,
    /// Failed messages plus loop-level failures since start.
    pub error_count: u64,
    /// Time since the instance started (frozen once stopped).
    pub uptime: Duration,
    /// Total successfully processed messages since start.
    pub total_processed: u64,
    /// Lifecycle status.
    pub status: ProcessorStatus,
}

impl ProcessorStatistics {
    /// Synthesized record for a configured name that was never started.
    #[must_use]
    pub fn not_started(name: impl Into<String>) -> Self {
        Self::zeroed(name, ProcessorStatus::NotStarted)
    }

    /// Synthesized record for a name unknown to both the configuration set
    /// and the engine registry.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::zeroed(name, ProcessorStatus::NotFound)
    }

    fn zeroed(name: impl Into<String>, status: ProcessorStatus) -> Self {
        Self {
            name: name.into(),
            is_running: false,
            messages_per_minute: 0.0,
            pending_count: 0,
            error_count: 0,
            uptime: Duration::ZERO,
            total_processed: 0,
            status,
        }
    }

    /// Snapshot the counter block of a live instance as of `now`.
    pub(crate) fn from_block(
        name: &str,
        is_running: bool,
        uptime: Duration,
        block: &mut StatsBlock,
        now: Instant,
    ) -> Self {
        let status = if is_running {
            if block.faulted {
                ProcessorStatus::Error
            } else {
                ProcessorStatus::Running
            }
        } else {
            ProcessorStatus::Stopped
        };
        Self {
            name: name.to_owned(),
            is_running,
            messages_per_minute: block.messages_per_minute(now),
            pending_count: block.pending,
            error_count: block.error_count,
            uptime,
            total_processed: block.total_processed,
            status,
        }
    }
}

/// Counters shared by concurrently processed messages of one instance.
///
/// Guarded by a single mutex region in the owning instance; multiple
/// in-flight messages update the same fields.
#[derive(Debug, Default)]
pub(crate) struct StatsBlock {
    /// Total successfully processed messages.
    pub total_processed: u64,
    /// Failed messages plus loop-level failures.
    pub error_count: u64,
    /// Last observed batch size.
    pub pending: u64,
    /// Set while the loop is backing off after an iteration-level failure.
    pub faulted: bool,
    /// Completion timestamps, trimmed to [`RATE_WINDOW`].
    completions: VecDeque<Instant>,
}

impl StatsBlock {
    /// Record one completed message at `now` and trim the window.
    pub fn record_completion(&mut self, now: Instant) {
        self.total_processed += 1;
        self.completions.push_back(now);
        self.trim(now);
    }

    /// Completions remaining in the window as of `now`.
    pub fn messages_per_minute(&mut self, now: Instant) -> f64 {
        self.trim(now);
        self.completions.len() as f64
    }

    fn trim(&mut self, now: Instant) {
        while let Some(front) = self.completions.front() {
            if now.duration_since(*front) > RATE_WINDOW {
                self.completions.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_records_are_zeroed() {
        let stats = ProcessorStatistics::not_started("p1");
        assert_eq!(stats.status, ProcessorStatus::NotStarted);
        assert!(!stats.is_running);
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.messages_per_minute, 0.0);

        let stats = ProcessorStatistics::not_found("p2");
        assert_eq!(stats.status, ProcessorStatus::NotFound);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProcessorStatus::NotStarted.to_string(), "Not Started");
        assert_eq!(ProcessorStatus::NotFound.to_string(), "Not Found");
        assert_eq!(ProcessorStatus::Running.to_string(), "Running");
    }

    #[test]
    fn test_rate_counts_completions_in_window() {
        let mut block = StatsBlock::default();
        let now = Instant::now();
        block.record_completion(now);
        block.record_completion(now);
        block.record_completion(now);
        assert_eq!(block.messages_per_minute(now), 3.0);
        assert_eq!(block.total_processed, 3);
    }

    #[test]
    fn test_rate_evicts_entries_older_than_window() {
        // Completions spaced 61 seconds apart never accumulate: the earlier
        // one falls out of the window before the next is sampled.
        let now = Instant::now();
        let Some(old) = now.checked_sub(Duration::from_secs(61)) else {
            return;
        };
        let mut block = StatsBlock::default();
        block.record_completion(old);
        block.record_completion(now);
        assert_eq!(block.messages_per_minute(now), 1.0);
        // The total counter is unaffected by window eviction.
        assert_eq!(block.total_processed, 2);
    }

    #[test]
    fn test_rate_is_zero_after_full_window_elapses() {
        let now = Instant::now();
        let Some(old) = now.checked_sub(Duration::from_secs(120)) else {
            return;
        };
        let mut block = StatsBlock::default();
        block.record_completion(old);
        assert_eq!(block.messages_per_minute(now), 0.0);
    }
}
