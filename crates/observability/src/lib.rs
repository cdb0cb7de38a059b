//! Tracing setup and process counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();

/// Install the global subscriber once. `RUST_LOG` controls the filter,
/// defaulting to `info`. Set `json` for machine-readable output.
pub fn init_tracing(json: bool) {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false);
        if json {
            builder.json().init();
        } else {
            builder.init();
        }
    });
}

/// Monotonic counters for a running assistant process.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests: AtomicU64,
    remote_attempts: AtomicU64,
    remote_fallbacks: AtomicU64,
    dedup_hits: AtomicU64,
    interpret_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub remote_attempts: u64,
    pub remote_fallbacks: u64,
    pub dedup_hits: u64,
    pub interpret_micros_total: u64,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_attempt(&self) {
        self.remote_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_fallback(&self) {
        self.remote_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup_hit(&self) {
        self.dedup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interpret_latency(&self, elapsed: Duration) {
        self.interpret_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            remote_attempts: self.remote_attempts.load(Ordering::Relaxed),
            remote_fallbacks: self.remote_fallbacks.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            interpret_micros_total: self.interpret_micros.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = AppMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_remote_attempt();
        metrics.record_remote_fallback();
        metrics.record_dedup_hit();
        metrics.record_interpret_latency(Duration::from_micros(250));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.remote_attempts, 1);
        assert_eq!(snapshot.remote_fallbacks, 1);
        assert_eq!(snapshot.dedup_hits, 1);
        assert_eq!(snapshot.interpret_micros_total, 250);
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing(false);
        init_tracing(true);
    }
}
