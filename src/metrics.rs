//! Sync-round metrics collection and reporting
//!
//! Tracks duration and outcome of recent sync rounds so a host can
//! surface engine latency and failure counts.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of round samples kept in the rolling window
const MAX_SAMPLES: usize = 100;

/// Snapshot of sync-round metrics
#[derive(Debug, Clone)]
pub struct RoundMetrics {
    /// 50th percentile round duration in milliseconds
    pub round_p50_ms: f64,
    /// 99th percentile round duration in milliseconds
    pub round_p99_ms: f64,
    /// Duration of the most recent round in milliseconds
    pub last_round_ms: f64,
    /// Rounds completed over the tracker's lifetime
    pub rounds_total: u64,
    /// Rounds that failed outright (no snapshot produced)
    pub rounds_failed: u64,
}

impl RoundMetrics {
    fn empty() -> Self {
        Self {
            round_p50_ms: 0.0,
            round_p99_ms: 0.0,
            last_round_ms: 0.0,
            rounds_total: 0,
            rounds_failed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct RoundSample {
    duration_ms: f64,
    success: bool,
}

/// Collects per-round samples into a rolling window plus lifetime totals.
pub struct SyncMetrics {
    window: RwLock<VecDeque<RoundSample>>,
    totals: RwLock<(u64, u64)>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            window: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            totals: RwLock::new((0, 0)),
        }
    }

    /// Records one completed round.
    pub async fn record_round(&self, duration: Duration, success: bool) {
        let duration_ms = duration.as_secs_f64() * 1000.0;

        {
            let mut totals = self.totals.write().await;
            totals.0 += 1;
            if !success {
                totals.1 += 1;
            }
        }

        let mut window = self.window.write().await;
        if window.len() >= MAX_SAMPLES {
            window.pop_front();
        }
        window.push_back(RoundSample {
            duration_ms,
            success,
        });
    }

    /// Computes current metrics from the collected samples.
    pub async fn report(&self) -> RoundMetrics {
        let window = self.window.read().await;
        let (total, failed) = *self.totals.read().await;

        if window.is_empty() {
            return RoundMetrics::empty();
        }

        // Percentiles are over successful rounds only; failed rounds end
        // early and would skew the latency picture.
        let mut durations: Vec<f64> = window
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        RoundMetrics {
            round_p50_ms: percentile(&durations, 50.0),
            round_p99_ms: percentile(&durations, 99.0),
            last_round_ms: window.back().map(|s| s.duration_ms).unwrap_or(0.0),
            rounds_total: total,
            rounds_failed: failed,
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
