//! In-process timing histograms and event counters.
//! Histograms track p50/p95/p99 over a fixed-size window of recent samples.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn new(name: &'static str, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity ring of histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

/// Histograms and counters keyed by metric name.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    counters: Mutex<HashMap<&'static str, u64>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(ring_capacity: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            ring_capacity: ring_capacity.max(1),
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    /// Bump a counter by one.
    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_insert(0) += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan::new(name, Arc::clone(self))
    }

    /// Percentile for a metric (p in 0-100), microseconds.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists.get(name).map(|ring| ring.percentile(p)).unwrap_or(0.0)
    }

    /// p50/p95/p99 for every histogram.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        hists
            .iter()
            .map(|(&name, ring)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_us: ring.percentile(50.0),
                        p95_us: ring.percentile(95.0),
                        p99_us: ring.percentile(99.0),
                        count: ring.count,
                    },
                )
            })
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

/// Well-known metric names.
pub mod metric_names {
    pub const SYNTHESIZE: &str = "t_synthesize";
    pub const PLAYBACK_START: &str = "t_playback_start";
    pub const FORECAST: &str = "t_forecast";
    pub const AUTO_STOP_FIRED: &str = "auto_stop_fired";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_window() {
        let reg = MetricsRegistry::with_capacity(100);
        for v in 1..=100 {
            reg.record(metric_names::FORECAST, v as f64);
        }
        assert_eq!(reg.percentile(metric_names::FORECAST, 50.0), 51.0);
        assert_eq!(reg.percentile(metric_names::FORECAST, 99.0), 99.0);
        assert_eq!(reg.percentile("missing", 50.0), 0.0);
        assert_eq!(reg.summary()[metric_names::FORECAST].count, 100);
    }

    #[test]
    fn ring_keeps_only_recent_samples() {
        let reg = MetricsRegistry::with_capacity(4);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            reg.record(metric_names::SYNTHESIZE, v);
        }
        assert_eq!(reg.percentile(metric_names::SYNTHESIZE, 100.0), 4.0);
    }

    #[test]
    fn counters_accumulate() {
        let reg = Arc::new(MetricsRegistry::new());
        reg.incr(metric_names::AUTO_STOP_FIRED);
        reg.incr(metric_names::AUTO_STOP_FIRED);
        assert_eq!(reg.count(metric_names::AUTO_STOP_FIRED), 2);
        let span = reg.span(metric_names::PLAYBACK_START);
        assert!(span.finish() >= 0.0);
        assert_eq!(reg.summary()[metric_names::PLAYBACK_START].count, 1);
    }
}
