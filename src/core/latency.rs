//! Rolling per-engine latency samples used to rank fallbacks

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Samples kept per engine
pub const MAX_LATENCY_SAMPLES: usize = 20;

/// Latency tracker shared by every orchestration task
///
/// Advisory only: a lost or duplicated sample changes ranking, never results.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: RwLock<HashMap<String, VecDeque<f64>>>,
    capacity: usize,
}

impl LatencyTracker {
    /// Create a new latency tracker
    pub fn new() -> Self {
        Self::with_capacity(MAX_LATENCY_SAMPLES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record one successful call duration
    pub fn record(&self, engine: &str, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        let mut samples = self.samples.write();
        let window = samples.entry(engine.to_string()).or_default();
        window.push_back(seconds);
        while window.len() > self.capacity {
            window.pop_front();
        }
        debug!("[{}] latency {:.2}s ({} samples)", engine, seconds, window.len());
    }

    /// Mean of the current window, `None` without samples
    pub fn mean_latency(&self, engine: &str) -> Option<f64> {
        let samples = self.samples.read();
        let window = samples.get(engine).filter(|w| !w.is_empty())?;
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    pub fn sample_count(&self, engine: &str) -> usize {
        self.samples.read().get(engine).map_or(0, VecDeque::len)
    }

    /// engine → mean, for listings
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.samples
            .read()
            .iter()
            .filter(|(_, w)| !w.is_empty())
            .map(|(engine, w)| (engine.clone(), w.iter().sum::<f64>() / w.len() as f64))
            .collect()
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}
