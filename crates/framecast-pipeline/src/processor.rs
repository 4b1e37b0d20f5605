use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use framecast_core::{
    now_ms, AdmissionReceipt, Detector, EnrichedResult, FrameData, FrameEnvelope, PipelineConfig,
    PipelineError,
};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::benchmark::{BenchmarkRecorder, FrameOutcome};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub size: usize,
    pub max_size: usize,
    pub utilization: f64,
    pub is_processing: bool,
    pub oldest_frame_age_ms: i64,
}

// Queue, worker flag and counters live behind one mutex: admission
// and drain must observe a consistent depth when deciding between
// eviction and triggering the worker. The lock is never held across
// an await.
struct ProcessorState {
    queue: VecDeque<FrameEnvelope>,
    queue_capacity: usize,
    timeout_ms: u64,
    is_processing: bool,
    metrics: MetricsAggregator,
}

// Bounded admission queue with drop-oldest backpressure and a single
// sequential drain worker. Admission is synchronous and never blocks
// on inference.
pub struct FrameProcessor {
    detector: Arc<dyn Detector>,
    benchmark: Arc<BenchmarkRecorder>,
    state: Mutex<ProcessorState>,
}

impl FrameProcessor {
    pub fn new(
        detector: Arc<dyn Detector>,
        benchmark: Arc<BenchmarkRecorder>,
        config: &PipelineConfig,
    ) -> Result<Arc<Self>, PipelineError> {
        config.validate()?;
        info!(
            "Frame processor initialized: capacity {}, timeout {}ms, backend {}",
            config.queue_capacity,
            config.timeout_ms,
            detector.mode()
        );

        Ok(Arc::new(Self {
            detector,
            benchmark,
            state: Mutex::new(ProcessorState {
                queue: VecDeque::with_capacity(config.queue_capacity),
                queue_capacity: config.queue_capacity,
                timeout_ms: config.timeout_ms,
                is_processing: false,
                metrics: MetricsAggregator::new(),
            }),
        }))
    }

    fn locked(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // At capacity the head (oldest) frame is evicted first; its
    // result channel never hears back.
    pub fn admit(
        self: &Arc<Self>,
        data: FrameData,
        result_tx: UnboundedSender<EnrichedResult>,
    ) -> AdmissionReceipt {
        let enqueue_ts = now_ms();
        let network_latency_ms = enqueue_ts - data.capture_ts;

        let mut state = self.locked();
        state.metrics.record_admission(network_latency_ms);

        if state.queue.len() >= state.queue_capacity {
            if let Some(evicted) = state.queue.pop_front() {
                state.metrics.record_queue_drop();
                debug!("Queue full, dropped frame {}", evicted.data.frame_id);
            }
        }

        state.queue.push_back(FrameEnvelope {
            data,
            enqueue_ts,
            network_latency_ms,
            result_tx,
        });
        let depth = state.queue.len();
        state.metrics.update_depth(depth);

        let start_worker = !state.is_processing;
        if start_worker {
            state.is_processing = true;
        }
        drop(state);

        if start_worker {
            let processor = Arc::clone(self);
            tokio::spawn(async move { processor.drain().await });
        }

        AdmissionReceipt {
            queued: true,
            queue_size: depth,
            network_latency_ms,
        }
    }

    // Exactly one frame in flight; exits once the queue is empty.
    async fn drain(self: Arc<Self>) {
        loop {
            let (envelope, timeout_ms) = {
                let mut state = self.locked();
                match state.queue.pop_front() {
                    Some(envelope) => {
                        let depth = state.queue.len();
                        state.metrics.set_current_depth(depth);
                        (envelope, state.timeout_ms)
                    }
                    None => {
                        state.is_processing = false;
                        return;
                    }
                }
            };
            self.process_one(envelope, timeout_ms).await;
        }
    }

    async fn process_one(&self, envelope: FrameEnvelope, timeout_ms: u64) {
        let FrameEnvelope {
            data,
            enqueue_ts,
            network_latency_ms,
            result_tx,
        } = envelope;
        let frame_id = data.frame_id.clone();
        let capture_ts = data.capture_ts;

        let processing_start_ts = now_ms();
        let queue_wait_ms = processing_start_ts - enqueue_ts;
        self.locked().metrics.record_drain_start(queue_wait_ms);

        // The backend may not be cancellable, so inference runs in a
        // detached task racing a deadline. On timeout the task keeps
        // running; its eventual send fails against the dropped
        // receiver and the late result is discarded.
        let (done_tx, done_rx) = oneshot::channel();
        let detector = Arc::clone(&self.detector);
        let late_id = frame_id.clone();
        tokio::spawn(async move {
            let outcome = detector.detect(data).await;
            if done_tx.send(outcome).is_err() {
                debug!("Discarding late result for abandoned frame {}", late_id);
            }
        });

        let detection = tokio::select! {
            outcome = done_rx => match outcome {
                Ok(Ok(detection)) => detection,
                Ok(Err(e)) => {
                    error!("Inference failed for frame {}: {}", frame_id, e);
                    self.locked().metrics.record_failure();
                    return;
                }
                Err(_) => {
                    error!("Inference task vanished for frame {}", frame_id);
                    self.locked().metrics.record_failure();
                    return;
                }
            },
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                warn!("Frame {} timed out after {}ms", frame_id, timeout_ms);
                self.locked().metrics.record_timeout();
                return;
            }
        };

        let processing_end_ts = now_ms();
        let server_latency_ms = processing_end_ts - processing_start_ts;
        self.locked().metrics.record_processed(server_latency_ms);

        let enriched = EnrichedResult {
            result: detection,
            processing_start_ts,
            processing_end_ts,
            queue_wait_ms,
            server_latency_ms,
            network_latency_ms,
            total_latency_ms: processing_end_ts - capture_ts,
        };

        self.benchmark.record_frame(FrameOutcome::from_result(&enriched));

        if result_tx.send(enriched).is_err() {
            debug!("Result channel closed for frame {}", frame_id);
        }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let state = self.locked();
        state.metrics.snapshot(state.queue_capacity)
    }

    pub fn reset_metrics(&self) {
        info!("Resetting frame processor metrics");
        self.locked().metrics.reset();
    }

    pub fn queue_status(&self) -> QueueStatus {
        let state = self.locked();
        let size = state.queue.len();
        QueueStatus {
            size,
            max_size: state.queue_capacity,
            utilization: size as f64 / state.queue_capacity as f64,
            is_processing: state.is_processing,
            oldest_frame_age_ms: state
                .queue
                .front()
                .map(|f| now_ms() - f.enqueue_ts)
                .unwrap_or(0),
        }
    }

    // Shrinking below the current depth evicts from the head until
    // the queue fits, counting each eviction as a drop.
    pub fn update_config(
        &self,
        queue_capacity: usize,
        timeout_ms: u64,
    ) -> Result<(), PipelineError> {
        let config = PipelineConfig {
            queue_capacity,
            timeout_ms,
            ..Default::default()
        };
        config.validate()?;

        let mut state = self.locked();
        info!(
            "Updating processor config: capacity {} -> {}, timeout {} -> {}ms",
            state.queue_capacity, queue_capacity, state.timeout_ms, timeout_ms
        );
        state.queue_capacity = queue_capacity;
        state.timeout_ms = timeout_ms;

        while state.queue.len() > state.queue_capacity {
            if let Some(evicted) = state.queue.pop_front() {
                state.metrics.record_queue_drop();
                debug!("Dropped frame {} on capacity shrink", evicted.data.frame_id);
            }
        }
        let depth = state.queue.len();
        state.metrics.set_current_depth(depth);
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        let state = self.locked();
        state.queue.is_empty() && !state.is_processing
    }
}
