use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

// Unix milliseconds, same unit as client capture timestamps. Clock
// skew between devices is tolerated, hence signed latencies.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// Coordinates normalized to [0,1], xmax > xmin, ymax > ymin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f64,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub frame_id: String,
    pub capture_ts: i64,
    pub recv_ts: i64,
    pub inference_ts: i64,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameData {
    pub frame_id: String,
    pub capture_ts: i64,
    pub image_data: String,
}

// total_latency_ms is processing end minus capture, so it equals
// network + queue wait + server time exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub result: DetectionResult,
    pub processing_start_ts: i64,
    pub processing_end_ts: i64,
    pub queue_wait_ms: i64,
    pub server_latency_ms: i64,
    pub network_latency_ms: i64,
    pub total_latency_ms: i64,
}

#[derive(Debug)]
pub struct FrameEnvelope {
    pub data: FrameData,
    pub enqueue_ts: i64,
    pub network_latency_ms: i64,
    pub result_tx: UnboundedSender<EnrichedResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdmissionReceipt {
    pub queued: bool,
    pub queue_size: usize,
    pub network_latency_ms: i64,
}
