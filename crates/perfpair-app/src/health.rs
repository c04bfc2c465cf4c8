//! Queue health derived from run counters.
//!
//! Three signals are checked: queue depth against capacity, the share of
//! events that failed (queue rejections plus processor failures), and the
//! share of batches that timed out. The worst signal decides the level.

use crate::queue::QueueStats;
use serde::Serialize;

/// Depth above this share of capacity is unhealthy.
pub const DEPTH_UNHEALTHY: f64 = 0.8;
/// Depth above this share of capacity is degraded.
pub const DEPTH_DEGRADED: f64 = 0.6;
/// Error rate (percent) above which the queue is unhealthy.
pub const ERROR_RATE_UNHEALTHY: f64 = 10.0;
pub const ERROR_RATE_DEGRADED: f64 = 5.0;
/// Batch timeout rate (percent) above which the queue is unhealthy.
pub const TIMEOUT_RATE_UNHEALTHY: f64 = 20.0;
pub const TIMEOUT_RATE_DEGRADED: f64 = 10.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Counters a health assessment is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCounters {
    pub queue: QueueStats,
    pub events_received: u64,
    /// Queue rejections plus processor failures.
    pub errors: u64,
    pub batches_dispatched: u64,
    pub batches_timed_out: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueHealth {
    pub level: HealthLevel,
    pub depth: u64,
    pub capacity: usize,
    pub error_rate_pct: f64,
    pub batch_timeout_rate_pct: f64,
    /// One line per signal past its degraded threshold.
    pub findings: Vec<String>,
}

impl QueueHealth {
    pub fn assess(counters: &HealthCounters) -> Self {
        let depth = counters.queue.depth;
        let capacity = counters.queue.capacity;
        let error_rate_pct = percent(counters.errors, counters.events_received);
        let batch_timeout_rate_pct = percent(counters.batches_timed_out, counters.batches_dispatched);

        let mut level = HealthLevel::Healthy;
        let mut findings = Vec::new();
        let mut check = |value: f64, degraded: f64, unhealthy: f64, what: String| {
            let found = if value > unhealthy {
                HealthLevel::Unhealthy
            } else if value > degraded {
                HealthLevel::Degraded
            } else {
                return;
            };
            findings.push(what);
            level = level.max(found);
        };

        let cap = capacity as f64;
        check(
            depth as f64,
            cap * DEPTH_DEGRADED,
            cap * DEPTH_UNHEALTHY,
            format!("queue depth {depth} of capacity {capacity}"),
        );
        check(
            error_rate_pct,
            ERROR_RATE_DEGRADED,
            ERROR_RATE_UNHEALTHY,
            format!("error rate {error_rate_pct:.1}%"),
        );
        check(
            batch_timeout_rate_pct,
            TIMEOUT_RATE_DEGRADED,
            TIMEOUT_RATE_UNHEALTHY,
            format!("batch timeout rate {batch_timeout_rate_pct:.1}%"),
        );

        Self {
            level,
            depth,
            capacity,
            error_rate_pct,
            batch_timeout_rate_pct,
            findings,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.level == HealthLevel::Healthy
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(depth: u64, capacity: usize) -> HealthCounters {
        HealthCounters {
            queue: QueueStats {
                capacity,
                enqueued: depth,
                depth,
                ..QueueStats::default()
            },
            ..HealthCounters::default()
        }
    }

    #[test]
    fn idle_queue_is_healthy() {
        let health = QueueHealth::assess(&HealthCounters::default());
        assert!(health.is_healthy());
        assert_eq!(health.error_rate_pct, 0.0);
        assert!(health.findings.is_empty());
    }

    #[test]
    fn depth_thresholds_are_exclusive() {
        assert_eq!(QueueHealth::assess(&counters(60, 100)).level, HealthLevel::Healthy);
        assert_eq!(QueueHealth::assess(&counters(61, 100)).level, HealthLevel::Degraded);
        assert_eq!(QueueHealth::assess(&counters(80, 100)).level, HealthLevel::Degraded);
        let full = QueueHealth::assess(&counters(81, 100));
        assert_eq!(full.level, HealthLevel::Unhealthy);
        assert_eq!(full.findings, vec!["queue depth 81 of capacity 100".to_string()]);
    }

    #[test]
    fn error_rate_thresholds() {
        let at = |errors| HealthCounters {
            events_received: 100,
            errors,
            ..HealthCounters::default()
        };
        assert_eq!(QueueHealth::assess(&at(5)).level, HealthLevel::Healthy);
        assert_eq!(QueueHealth::assess(&at(6)).level, HealthLevel::Degraded);
        assert_eq!(QueueHealth::assess(&at(11)).level, HealthLevel::Unhealthy);
    }

    #[test]
    fn worst_signal_wins() {
        let health = QueueHealth::assess(&HealthCounters {
            events_received: 100,
            errors: 6,
            batches_dispatched: 10,
            batches_timed_out: 3,
            ..counters(10, 100)
        });
        assert_eq!(health.level, HealthLevel::Unhealthy);
        assert_eq!(health.findings.len(), 2);
        assert_eq!(health.batch_timeout_rate_pct, 30.0);
    }
}
