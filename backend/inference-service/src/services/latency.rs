use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Percentiles reported in `inferenceDurationStats`, ascending.
pub const REPORTED_PERCENTILES: [(&str, f64); 4] =
    [("p50", 0.50), ("p90", 0.90), ("p95", 0.95), ("p99", 0.99)];

/// Sliding window of inference durations in microseconds.
pub struct LatencyTracker {
    samples: Mutex<VecDeque<f64>>,
    window: usize,
}

impl LatencyTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(window.min(16_384))),
            window,
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let micros = elapsed.as_nanos() as f64 / 1_000.0;
        let mut samples = self.lock();
        if samples.len() >= self.window {
            samples.pop_front();
        }
        samples.push_back(micros);
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// One single-entry map per reported percentile, e.g.
    /// `[{"p50": 1520.0}, {"p90": 2210.5}, ...]`. Empty when no samples
    /// have been recorded.
    pub fn percentiles(&self) -> Vec<BTreeMap<String, f64>> {
        let mut sorted: Vec<f64> = self.lock().iter().copied().collect();
        if sorted.is_empty() {
            return Vec::new();
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        REPORTED_PERCENTILES
            .iter()
            .map(|(label, q)| {
                let mut entry = BTreeMap::new();
                entry.insert((*label).to_string(), nearest_rank(&sorted, *q));
                entry
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        self.samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let rank = (q * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}
