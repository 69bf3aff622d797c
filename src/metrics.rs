// Load pass metrics
//
// Atomic counters shared between the load service and its background worker

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::loader::LoadOutcome;

/// Counters for load passes.
///
/// Lock-free so the background worker can record steps while the caller reads.
/// Call [`log_summary`](Self::log_summary) at shutdown for a one-shot report.
#[derive(Debug)]
pub struct Metrics {
    pub passes_started: AtomicUsize,
    pub passes_completed: AtomicUsize,
    pub passes_failed: AtomicUsize,
    pub passes_cancelled: AtomicUsize,

    /// Parsers routed across all passes
    pub parsers_routed: AtomicUsize,

    /// Individual steps executed across all passes
    pub steps_executed: AtomicU64,

    /// Wall time spent inside passes, in milliseconds
    pub total_load_time_ms: AtomicU64,

    /// Events sent on the broadcast channel
    pub events_sent: AtomicU64,

    /// Events dropped because nobody was subscribed
    pub events_unobserved: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            passes_started: AtomicUsize::new(0),
            passes_completed: AtomicUsize::new(0),
            passes_failed: AtomicUsize::new(0),
            passes_cancelled: AtomicUsize::new(0),
            parsers_routed: AtomicUsize::new(0),
            steps_executed: AtomicU64::new(0),
            total_load_time_ms: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            events_unobserved: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_pass_started(&self, parsers: usize) {
        self.passes_started.fetch_add(1, Ordering::Relaxed);
        self.parsers_routed.fetch_add(parsers, Ordering::Relaxed);
    }

    /// Records how a pass ended and how long it took.
    pub fn record_outcome(&self, outcome: &LoadOutcome, elapsed: Duration) {
        let counter = match outcome {
            LoadOutcome::Completed => &self.passes_completed,
            LoadOutcome::Failed(_) => &self.passes_failed,
            LoadOutcome::Cancelled => &self.passes_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_step(&self) {
        self.steps_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self, delivered: bool) {
        if delivered {
            self.events_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_unobserved.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average pass duration in milliseconds, over finished passes.
    pub fn avg_pass_time_ms(&self) -> f64 {
        let total = self.total_load_time_ms.load(Ordering::Relaxed);
        let finished = self.passes_completed.load(Ordering::Relaxed)
            + self.passes_failed.load(Ordering::Relaxed)
            + self.passes_cancelled.load(Ordering::Relaxed);
        if finished > 0 {
            total as f64 / finished as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Load Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Passes: {} started, {} completed, {} failed, {} cancelled",
            self.passes_started.load(Ordering::Relaxed),
            self.passes_completed.load(Ordering::Relaxed),
            self.passes_failed.load(Ordering::Relaxed),
            self.passes_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Parsers routed: {}, steps executed: {}",
            self.parsers_routed.load(Ordering::Relaxed),
            self.steps_executed.load(Ordering::Relaxed)
        );
        tracing::info!("Average pass time: {:.2}ms", self.avg_pass_time_ms());
        tracing::info!(
            "Events: {} sent, {} unobserved",
            self.events_sent.load(Ordering::Relaxed),
            self.events_unobserved.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadError;
    use std::sync::Arc;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.passes_started.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.steps_executed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = Metrics::new();

        metrics.record_pass_started(3);
        metrics.record_outcome(&LoadOutcome::Completed, Duration::from_millis(100));
        metrics.record_pass_started(2);
        metrics.record_outcome(
            &LoadOutcome::Failed(Arc::new(LoadError::AlreadyRunning)),
            Duration::from_millis(200),
        );
        metrics.record_outcome(&LoadOutcome::Cancelled, Duration::ZERO);

        assert_eq!(metrics.parsers_routed.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.passes_completed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.passes_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.passes_cancelled.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_pass_time_ms(), 100.0);
    }

    #[test]
    fn test_avg_pass_time_without_passes() {
        assert_eq!(Metrics::new().avg_pass_time_ms(), 0.0);
    }

    #[test]
    fn test_event_counters() {
        let metrics = Metrics::new();
        metrics.record_event(true);
        metrics.record_event(false);
        metrics.record_step();

        assert_eq!(metrics.events_sent.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.events_unobserved.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.steps_executed.load(Ordering::Relaxed), 1);
    }
}
