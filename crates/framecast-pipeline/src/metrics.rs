use std::time::Instant;

use framecast_core::now_ms;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub queue_dropped: u64,
    pub timeout_dropped: u64,
    pub processing_fps: f64,
    pub drop_rate: f64,
    pub max_queue_size_used: usize,
    pub current_queue_size: usize,
    pub queue_utilization: f64,
    pub avg_network_latency_ms: f64,
    pub avg_queue_wait_ms: f64,
    pub avg_server_processing_ms: f64,
    pub elapsed_seconds: f64,
    pub metrics_since: i64,
}

// Not internally synchronized: lives inside the processor's state
// mutex so admissions and drains observe consistent values.
#[derive(Debug)]
pub struct MetricsAggregator {
    frames_received: u64,
    frames_processed: u64,
    frames_dropped: u64,
    queue_dropped: u64,
    timeout_dropped: u64,
    total_network_latency_ms: i64,
    total_queue_wait_ms: i64,
    total_server_processing_ms: i64,
    max_queue_size_used: usize,
    current_queue_size: usize,
    since: Instant,
    since_ms: i64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            frames_received: 0,
            frames_processed: 0,
            frames_dropped: 0,
            queue_dropped: 0,
            timeout_dropped: 0,
            total_network_latency_ms: 0,
            total_queue_wait_ms: 0,
            total_server_processing_ms: 0,
            max_queue_size_used: 0,
            current_queue_size: 0,
            since: Instant::now(),
            since_ms: now_ms(),
        }
    }

    // Network latency may be negative under clock skew; summed as-is.
    pub fn record_admission(&mut self, network_latency_ms: i64) {
        self.frames_received += 1;
        self.total_network_latency_ms += network_latency_ms;
    }

    pub fn record_queue_drop(&mut self) {
        self.frames_dropped += 1;
        self.queue_dropped += 1;
    }

    pub fn record_drain_start(&mut self, queue_wait_ms: i64) {
        self.total_queue_wait_ms += queue_wait_ms;
    }

    pub fn record_processed(&mut self, server_latency_ms: i64) {
        self.frames_processed += 1;
        self.total_server_processing_ms += server_latency_ms;
    }

    pub fn record_timeout(&mut self) {
        self.frames_dropped += 1;
        self.timeout_dropped += 1;
    }

    pub fn record_failure(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn update_depth(&mut self, depth: usize) {
        self.current_queue_size = depth;
        self.max_queue_size_used = self.max_queue_size_used.max(depth);
    }

    pub fn set_current_depth(&mut self, depth: usize) {
        self.current_queue_size = depth;
    }

    pub fn snapshot(&self, capacity: usize) -> MetricsSnapshot {
        let elapsed = self.since.elapsed().as_secs_f64();
        // Denominators floored at 1 so fresh aggregators report 0
        // instead of NaN.
        let processed = self.frames_processed.max(1) as f64;
        let received = self.frames_received.max(1) as f64;

        MetricsSnapshot {
            frames_received: self.frames_received,
            frames_processed: self.frames_processed,
            frames_dropped: self.frames_dropped,
            queue_dropped: self.queue_dropped,
            timeout_dropped: self.timeout_dropped,
            processing_fps: if elapsed > 0.0 {
                self.frames_processed as f64 / elapsed
            } else {
                0.0
            },
            drop_rate: self.frames_dropped as f64 / received,
            max_queue_size_used: self.max_queue_size_used,
            current_queue_size: self.current_queue_size,
            queue_utilization: if capacity > 0 {
                self.max_queue_size_used as f64 / capacity as f64
            } else {
                0.0
            },
            avg_network_latency_ms: self.total_network_latency_ms as f64 / processed,
            avg_queue_wait_ms: self.total_queue_wait_ms as f64 / processed,
            avg_server_processing_ms: self.total_server_processing_ms as f64 / processed,
            elapsed_seconds: elapsed,
            metrics_since: self.since_ms,
        }
    }

    // The current queue depth is a live reading, not an accumulator,
    // so it survives the reset.
    pub fn reset(&mut self) {
        let depth = self.current_queue_size;
        *self = Self::new();
        self.current_queue_size = depth;
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aggregator_reports_zeros() {
        let metrics = MetricsAggregator::new();
        let snap = metrics.snapshot(10);

        assert_eq!(snap.frames_received, 0);
        assert_eq!(snap.drop_rate, 0.0);
        assert_eq!(snap.avg_network_latency_ms, 0.0);
        assert_eq!(snap.avg_queue_wait_ms, 0.0);
        assert_eq!(snap.avg_server_processing_ms, 0.0);
        assert_eq!(snap.queue_utilization, 0.0);
        assert!(snap.processing_fps.is_finite());
    }

    #[test]
    fn received_equals_processed_plus_dropped() {
        let mut metrics = MetricsAggregator::new();
        for _ in 0..10 {
            metrics.record_admission(5);
        }
        for _ in 0..6 {
            metrics.record_processed(20);
        }
        metrics.record_queue_drop();
        metrics.record_queue_drop();
        metrics.record_timeout();
        metrics.record_failure();

        let snap = metrics.snapshot(10);
        assert_eq!(
            snap.frames_received,
            snap.frames_processed + snap.frames_dropped
        );
        assert_eq!(snap.queue_dropped, 2);
        assert_eq!(snap.timeout_dropped, 1);
        assert_eq!(snap.frames_dropped, 4);
    }

    #[test]
    fn averages_divide_by_processed() {
        let mut metrics = MetricsAggregator::new();
        metrics.record_admission(30);
        metrics.record_admission(10);
        metrics.record_drain_start(8);
        metrics.record_processed(100);
        metrics.record_drain_start(4);
        metrics.record_processed(50);

        let snap = metrics.snapshot(10);
        assert_eq!(snap.avg_network_latency_ms, 20.0);
        assert_eq!(snap.avg_queue_wait_ms, 6.0);
        assert_eq!(snap.avg_server_processing_ms, 75.0);
    }

    #[test]
    fn negative_network_latency_summed_as_is() {
        let mut metrics = MetricsAggregator::new();
        metrics.record_admission(-40);
        metrics.record_processed(10);

        let snap = metrics.snapshot(10);
        assert_eq!(snap.avg_network_latency_ms, -40.0);
    }

    #[test]
    fn high_water_mark_is_monotonic() {
        let mut metrics = MetricsAggregator::new();
        metrics.update_depth(3);
        metrics.update_depth(7);
        metrics.set_current_depth(1);

        let snap = metrics.snapshot(10);
        assert_eq!(snap.max_queue_size_used, 7);
        assert_eq!(snap.current_queue_size, 1);
        assert_eq!(snap.queue_utilization, 0.7);
    }

    #[test]
    fn reset_preserves_queue_depth() {
        let mut metrics = MetricsAggregator::new();
        metrics.record_admission(5);
        metrics.record_processed(10);
        metrics.update_depth(4);

        metrics.reset();
        let snap = metrics.snapshot(10);

        assert_eq!(snap.frames_received, 0);
        assert_eq!(snap.frames_processed, 0);
        assert_eq!(snap.max_queue_size_used, 0);
        assert_eq!(snap.current_queue_size, 4);
        assert!(snap.elapsed_seconds < 1.0);
    }
}
