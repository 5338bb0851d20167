// Process-wide request statistics. Counters are atomics; a request counts
// as successful only when its exit code is 0.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug)]
pub struct Statistics {
    started_at: DateTime<Utc>,
    successful: AtomicU64,
    failed: AtomicU64,
    total_response_micros: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub successful: u64,
    pub failed: u64,
    pub total_requests: u64,
    /// Rounded to whole milliseconds.
    pub average_response_time_ms: u64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_response_micros: AtomicU64::new(0),
        }
    }

    pub fn record(&self, elapsed: Duration, exit_code: i32) {
        let counter = if exit_code == 0 {
            &self.successful
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_response_micros
            .fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total_requests = successful + failed;
        let total = self.total_response_micros.load(Ordering::Relaxed);
        let average_response_time_ms = if total_requests == 0 {
            0
        } else {
            (total / total_requests + 500) / 1000
        };
        StatisticsSnapshot {
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            successful,
            failed,
            total_requests,
            average_response_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_decides_success() {
        let stats = Statistics::new();
        stats.record(Duration::from_millis(10), 0);
        stats.record(Duration::from_millis(20), 2);
        stats.record(Duration::from_millis(31), 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successful, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.average_response_time_ms, 20);
    }

    #[test]
    fn average_rounds_to_milliseconds() {
        let stats = Statistics::new();
        stats.record(Duration::from_micros(1_499), 0);
        assert_eq!(stats.snapshot().average_response_time_ms, 1);
        stats.record(Duration::from_micros(1_600), 0);
        assert_eq!(stats.snapshot().average_response_time_ms, 2);
        assert_eq!(Statistics::new().snapshot().average_response_time_ms, 0);
    }
}
