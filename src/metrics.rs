use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding-window quantile tracker for per-chunk latencies.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl LatencyWindow {
    /// Create a tracker keeping the most recent `window_size` samples.
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record one sample in nanoseconds.
    pub fn record(&self, nanos: u64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.window_size {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    /// Quantile `q` in [0, 1] over the window, in microseconds. Zero when
    /// empty.
    pub fn quantile_us(&self, q: f64) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<_> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 * q).ceil() as usize).saturating_sub(1);
        sorted[idx] as f64 / 1000.0
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

/// Counters for one pipeline run. Clones share the same underlying
/// counters, so a handle can observe a running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    /// Chunks pulled from the source
    pulled: Arc<AtomicU64>,
    /// Chunks emitted by the transform
    emitted: Arc<AtomicU64>,
    /// Chunks delivered to the sink
    delivered: Arc<AtomicU64>,
    /// Backpressure pauses observed
    pauses: Arc<AtomicU64>,
    /// Per-chunk source-to-sink latency
    latency: LatencyWindow,
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a fresh metrics set.
    pub fn new() -> Self {
        Self {
            pulled: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
            pauses: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(1000),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_pulled(&self) {
        self.pulled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_latency(&self, nanos: u64) {
        self.latency.record(nanos);
    }

    /// Chunks pulled from the source so far.
    pub fn total_pulled(&self) -> u64 {
        self.pulled.load(Ordering::Relaxed)
    }

    /// Chunks emitted by the transform so far.
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Chunks delivered to the sink so far.
    pub fn total_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Backpressure pauses so far.
    pub fn total_pauses(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }

    /// Delivered chunks per second since the pipeline was built.
    pub fn throughput_cps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_delivered() as f64 / elapsed
        }
    }

    /// Snapshot of current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_pulled: self.total_pulled(),
            total_emitted: self.total_emitted(),
            total_delivered: self.total_delivered(),
            total_pauses: self.total_pauses(),
            throughput_cps: self.throughput_cps(),
            latency_p50_us: self.latency.quantile_us(0.50),
            latency_p95_us: self.latency.quantile_us(0.95),
            latency_p99_us: self.latency.quantile_us(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of pipeline metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_pulled: u64,
    pub total_emitted: u64,
    pub total_delivered: u64,
    pub total_pauses: u64,
    pub throughput_cps: f64,
    pub latency_p50_us: f64,
    pub latency_p95_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable line.
    pub fn format(&self) -> String {
        format!(
            "Pulled: {}, Emitted: {}, Delivered: {}, Pauses: {}, \
             Throughput: {:.2} chunk/s, Latency P50: {:.2}µs, P95: {:.2}µs, \
             P99: {:.2}µs, Elapsed: {:.2}s",
            self.total_pulled,
            self.total_emitted,
            self.total_delivered,
            self.total_pauses,
            self.throughput_cps,
            self.latency_p50_us,
            self.latency_p95_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_window_quantiles() {
        let window = LatencyWindow::new(10);
        for i in 1..=10 {
            window.record(i * 1000);
        }
        assert!(window.quantile_us(0.50) > 0.0);
        assert!(window.quantile_us(0.99) >= window.quantile_us(0.50));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let window = LatencyWindow::new(3);
        for i in 0..5 {
            window.record(i);
        }
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_counters() {
        let metrics = PipelineMetrics::new();
        let shared = metrics.clone();
        for _ in 0..4 {
            metrics.record_pulled();
            metrics.record_delivered();
        }
        metrics.record_pause();
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.total_pulled, 4);
        assert_eq!(snapshot.total_delivered, 4);
        assert_eq!(snapshot.total_pauses, 1);
        assert!(shared.throughput_cps() > 0.0);
    }
}
