//! Profiling counters for the coordinator, plus the optional CSV/JSON
//! sidecar writer (`--profile`). Shape follows the engine's own histogram
//! and atomic-counter metrics, repurposed for acceptance rate, throughput,
//! and token match rate instead of request/cache counters.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct LatencySample {
    duration_ms: f64,
}

#[derive(Debug)]
struct LatencyHistogram {
    samples: VecDeque<LatencySample>,
    max_samples: usize,
}

impl LatencyHistogram {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn record(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
        });
    }

    fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s.duration_ms).sum();
        sum / self.samples.len() as f64
    }
}

/// Coordinator-wide profiling counters, accumulated across all sessions in
/// a `generate` run.
pub struct EngineMetrics {
    pub rounds_executed: AtomicU64,
    pub tokens_proposed: AtomicU64,
    pub tokens_accepted: AtomicU64,
    pub tokens_committed: AtomicU64,
    pub worker_faults: AtomicU64,
    round_latency: std::sync::Mutex<LatencyHistogram>,
    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            rounds_executed: AtomicU64::new(0),
            tokens_proposed: AtomicU64::new(0),
            tokens_accepted: AtomicU64::new(0),
            tokens_committed: AtomicU64::new(0),
            worker_faults: AtomicU64::new(0),
            round_latency: std::sync::Mutex::new(LatencyHistogram::new(1000)),
            start_time: Instant::now(),
        }
    }

    pub fn record_round(&self, proposed: u64, accepted: u64, committed: u64, duration: Duration) {
        self.rounds_executed.fetch_add(1, Ordering::Relaxed);
        self.tokens_proposed.fetch_add(proposed, Ordering::Relaxed);
        self.tokens_accepted.fetch_add(accepted, Ordering::Relaxed);
        self.tokens_committed.fetch_add(committed, Ordering::Relaxed);
        if let Ok(mut hist) = self.round_latency.lock() {
            hist.record(duration);
        }
    }

    pub fn record_worker_fault(&self) {
        self.worker_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of proposed draft tokens that survived verification —
    /// the empirical analogue of invariant 4's `sum(min(p_t, q_t))`.
    pub fn token_match_rate(&self) -> f64 {
        let proposed = self.tokens_proposed.load(Ordering::Relaxed);
        let accepted = self.tokens_accepted.load(Ordering::Relaxed);
        if proposed == 0 {
            0.0
        } else {
            accepted as f64 / proposed as f64
        }
    }

    pub fn throughput(&self) -> f64 {
        let tokens = self.tokens_committed.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            tokens as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        let avg_token_time = self
            .round_latency
            .lock()
            .map(|h| h.average())
            .unwrap_or(0.0);
        ProfileSnapshot {
            total_time: self.start_time.elapsed().as_secs_f64(),
            tokens_generated: self.tokens_committed.load(Ordering::Relaxed),
            throughput: self.throughput(),
            avg_token_time,
            token_match_rate: self.token_match_rate(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<EngineMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}

/// The exact profiling sidecar schema from the spec's "Persisted state"
/// section.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSnapshot {
    pub total_time: f64,
    pub tokens_generated: u64,
    pub throughput: f64,
    pub avg_token_time: f64,
    pub token_match_rate: f64,
}

impl ProfileSnapshot {
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.total_time, self.tokens_generated, self.throughput, self.avg_token_time, self.token_match_rate
        )
    }

    pub fn csv_header() -> &'static str {
        "total_time,tokens_generated,throughput,avg_token_time,token_match_rate"
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_match_rate_tracks_accepted_over_proposed() {
        let metrics = EngineMetrics::new();
        metrics.record_round(4, 2, 3, Duration::from_millis(10));
        assert!((metrics.token_match_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn csv_row_has_five_columns() {
        let metrics = EngineMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.to_csv_row().split(',').count(), 5);
    }
}
