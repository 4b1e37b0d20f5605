use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use framecast_core::{now_ms, EnrichedResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "FrameOutcomeWire")]
pub struct FrameOutcome {
    pub frame_id: String,
    pub capture_ts: i64,
    pub recv_ts: i64,
    pub total_latency_ms: i64,
    pub network_latency_ms: i64,
    pub server_latency_ms: i64,
    pub queue_wait_ms: i64,
    pub detection_count: usize,
}

// Browsers report `latency` and a raw `detections` array, not
// pre-computed latency components and counts.
#[derive(Deserialize)]
struct FrameOutcomeWire {
    #[serde(default)]
    frame_id: String,
    #[serde(default)]
    capture_ts: i64,
    #[serde(default)]
    recv_ts: i64,
    #[serde(default, alias = "latency")]
    total_latency_ms: i64,
    #[serde(default)]
    network_latency_ms: i64,
    #[serde(default)]
    server_latency_ms: i64,
    #[serde(default)]
    queue_wait_ms: i64,
    #[serde(default)]
    detection_count: usize,
    #[serde(default)]
    detections: Option<Vec<serde_json::Value>>,
}

impl From<FrameOutcomeWire> for FrameOutcome {
    fn from(wire: FrameOutcomeWire) -> Self {
        Self {
            frame_id: wire.frame_id,
            capture_ts: wire.capture_ts,
            recv_ts: wire.recv_ts,
            total_latency_ms: wire.total_latency_ms,
            network_latency_ms: wire.network_latency_ms,
            server_latency_ms: wire.server_latency_ms,
            queue_wait_ms: wire.queue_wait_ms,
            detection_count: wire
                .detections
                .map(|d| d.len())
                .unwrap_or(wire.detection_count),
        }
    }
}

impl FrameOutcome {
    pub fn from_result(result: &EnrichedResult) -> Self {
        Self {
            frame_id: result.result.frame_id.clone(),
            capture_ts: result.result.capture_ts,
            recv_ts: result.result.recv_ts,
            total_latency_ms: result.total_latency_ms,
            network_latency_ms: result.network_latency_ms,
            server_latency_ms: result.server_latency_ms,
            queue_wait_ms: result.queue_wait_ms,
            detection_count: result.result.detections.len(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandwidthSample {
    #[serde(default)]
    pub uplink_kbps: f64,
    #[serde(default)]
    pub downlink_kbps: f64,
    #[serde(default)]
    pub rtt_ms: f64,
    #[serde(default)]
    pub jitter_ms: f64,
    #[serde(default)]
    pub packet_loss_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LatencySummary {
    pub median_ms: f64,
    pub p95_ms: f64,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

// Median at sorted[n/2], p95 at sorted[n*95/100]. Empty series
// reduces to zeros, never NaN.
pub fn summarize_latencies(series: &[i64]) -> LatencySummary {
    if series.is_empty() {
        return LatencySummary::default();
    }

    let mut sorted = series.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();

    LatencySummary {
        median_ms: sorted[n / 2] as f64,
        p95_ms: sorted[n * 95 / 100] as f64,
        mean_ms: sorted.iter().sum::<i64>() as f64 / n as f64,
        min_ms: sorted[0] as f64,
        max_ms: sorted[n - 1] as f64,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandwidthSummary {
    pub avg_uplink_kbps: f64,
    pub avg_downlink_kbps: f64,
    pub peak_uplink_kbps: f64,
    pub peak_downlink_kbps: f64,
    pub avg_rtt_ms: f64,
    pub avg_jitter_ms: f64,
    pub avg_packet_loss_rate: f64,
}

fn summarize_bandwidth(samples: &[BandwidthSample]) -> Option<BandwidthSummary> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    let avg = |f: fn(&BandwidthSample) -> f64| samples.iter().map(f).sum::<f64>() / n;
    let peak = |f: fn(&BandwidthSample) -> f64| samples.iter().map(f).fold(0.0_f64, f64::max);

    Some(BandwidthSummary {
        avg_uplink_kbps: avg(|s| s.uplink_kbps),
        avg_downlink_kbps: avg(|s| s.downlink_kbps),
        peak_uplink_kbps: peak(|s| s.uplink_kbps),
        peak_downlink_kbps: peak(|s| s.downlink_kbps),
        avg_rtt_ms: avg(|s| s.rtt_ms),
        avg_jitter_ms: avg(|s| s.jitter_ms),
        avg_packet_loss_rate: avg(|s| s.packet_loss_rate),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub timestamp_ms: i64,
    pub duration_seconds: f64,
    pub mode: String,
    pub e2e_latency: LatencySummary,
    pub network_latency: LatencySummary,
    pub server_latency: LatencySummary,
    pub queue_wait: LatencySummary,
    pub processed_fps: f64,
    pub total_frames: usize,
    pub total_detections: usize,
    pub avg_detections_per_frame: f64,
    pub frames_with_detections: usize,
    pub detection_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<BandwidthSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartAck {
    pub status: &'static str,
    pub duration: u64,
    pub mode: String,
    pub start_time: i64,
}

#[derive(Debug, Clone)]
pub enum SessionReport {
    NotFound,
    Running { elapsed_ms: i64 },
    Completed(BenchmarkSummary),
}

#[derive(Debug)]
struct RunningSession {
    epoch: u64,
    start_ts: i64,
    started: Instant,
    duration: Duration,
    mode: String,
    frames: Vec<FrameOutcome>,
    bandwidth: Vec<BandwidthSample>,
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Running(RunningSession),
    Completed(BenchmarkSummary),
}

// Restarting while a run is active discards the in-progress data; the
// epoch counter keeps a discarded run's completion timer from
// finalizing its successor.
#[derive(Debug)]
pub struct BenchmarkRecorder {
    state: Mutex<SessionState>,
    epoch: AtomicU64,
}

impl BenchmarkRecorder {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            epoch: AtomicU64::new(0),
        }
    }

    fn locked(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // The caller resets the metrics aggregator alongside.
    pub fn start(self: &Arc<Self>, duration_secs: u64, mode: impl Into<String>) -> StartAck {
        let mode = mode.into();
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let start_ts = now_ms();
        let duration = Duration::from_secs(duration_secs);

        info!(
            "Starting benchmark run: {}s, mode {} (epoch {})",
            duration_secs, mode, epoch
        );

        *self.locked() = SessionState::Running(RunningSession {
            epoch,
            start_ts,
            started: Instant::now(),
            duration,
            mode: mode.clone(),
            frames: Vec::new(),
            bandwidth: Vec::new(),
        });

        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            recorder.complete(epoch);
        });

        StartAck {
            status: "started",
            duration: duration_secs,
            mode,
            start_time: start_ts,
        }
    }

    pub fn record_frame(&self, outcome: FrameOutcome) -> bool {
        match &mut *self.locked() {
            SessionState::Running(session) => {
                session.frames.push(outcome);
                true
            }
            _ => false,
        }
    }

    pub fn record_bandwidth(&self, sample: BandwidthSample) -> bool {
        match &mut *self.locked() {
            SessionState::Running(session) => {
                session.bandwidth.push(sample);
                true
            }
            _ => false,
        }
    }

    fn complete(&self, epoch: u64) {
        let mut state = self.locked();
        let SessionState::Running(session) = &*state else {
            return;
        };
        if session.epoch != epoch {
            debug!("Ignoring completion timer for discarded run (epoch {epoch})");
            return;
        }

        let summary = compute_summary(session);
        info!(
            "Benchmark completed: {} frames, {:.1} fps, median {}ms",
            summary.total_frames, summary.processed_fps, summary.e2e_latency.median_ms
        );
        *state = SessionState::Completed(summary);
    }

    pub fn complete_now(&self) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.complete(epoch);
    }

    pub fn results(&self) -> SessionReport {
        match &*self.locked() {
            SessionState::Idle => SessionReport::NotFound,
            SessionState::Running(session) => SessionReport::Running {
                elapsed_ms: session.started.elapsed().as_millis() as i64,
            },
            SessionState::Completed(summary) => SessionReport::Completed(summary.clone()),
        }
    }
}

impl Default for BenchmarkRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_summary(session: &RunningSession) -> BenchmarkSummary {
    let frames = &session.frames;
    let total_frames = frames.len();
    let duration_seconds = session.duration.as_secs_f64();

    // End-to-end latencies of zero mean the client never measured one
    // (no capture timestamp); they are excluded from the distribution
    // but the frames still count toward fps and detection rates.
    let e2e: Vec<i64> = frames
        .iter()
        .map(|f| f.total_latency_ms)
        .filter(|&l| l > 0)
        .collect();
    let network: Vec<i64> = frames.iter().map(|f| f.network_latency_ms).collect();
    let server: Vec<i64> = frames.iter().map(|f| f.server_latency_ms).collect();
    let queue: Vec<i64> = frames.iter().map(|f| f.queue_wait_ms).collect();

    let total_detections: usize = frames.iter().map(|f| f.detection_count).sum();
    let frames_with_detections = frames.iter().filter(|f| f.detection_count > 0).count();

    BenchmarkSummary {
        timestamp_ms: now_ms(),
        duration_seconds,
        mode: session.mode.clone(),
        e2e_latency: summarize_latencies(&e2e),
        network_latency: summarize_latencies(&network),
        server_latency: summarize_latencies(&server),
        queue_wait: summarize_latencies(&queue),
        processed_fps: if duration_seconds > 0.0 {
            total_frames as f64 / duration_seconds
        } else {
            0.0
        },
        total_frames,
        total_detections,
        avg_detections_per_frame: if total_frames > 0 {
            total_detections as f64 / total_frames as f64
        } else {
            0.0
        },
        frames_with_detections,
        detection_rate: if total_frames > 0 {
            frames_with_detections as f64 / total_frames as f64
        } else {
            0.0
        },
        bandwidth: summarize_bandwidth(&session.bandwidth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(total: i64, detections: usize) -> FrameOutcome {
        FrameOutcome {
            frame_id: "f".into(),
            capture_ts: 0,
            recv_ts: 0,
            total_latency_ms: total,
            network_latency_ms: total / 3,
            server_latency_ms: total / 3,
            queue_wait_ms: total / 3,
            detection_count: detections,
        }
    }

    #[test]
    fn browser_frame_report_counts_detections() {
        let outcome: FrameOutcome = serde_json::from_str(
            r#"{"frame_id":"f7","capture_ts":1000,"latency":120,
                "detections":[{"label":"person","score":0.9,
                               "xmin":0.1,"ymin":0.1,"xmax":0.3,"ymax":0.6}]}"#,
        )
        .unwrap();
        assert_eq!(outcome.total_latency_ms, 120);
        assert_eq!(outcome.detection_count, 1);

        let empty: FrameOutcome =
            serde_json::from_str(r#"{"frame_id":"f8","latency":30,"detections":[]}"#).unwrap();
        assert_eq!(empty.detection_count, 0);

        let counted: FrameOutcome =
            serde_json::from_str(r#"{"frame_id":"f9","detection_count":2}"#).unwrap();
        assert_eq!(counted.detection_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn browser_frame_reports_drive_detection_stats() {
        let recorder = Arc::new(BenchmarkRecorder::new());
        recorder.start(1, "wasm");
        let posted: FrameOutcome = serde_json::from_str(
            r#"{"frame_id":"f1","capture_ts":5,"latency":80,"detections":[{},{}]}"#,
        )
        .unwrap();
        assert!(recorder.record_frame(posted));
        recorder.complete_now();

        let SessionReport::Completed(summary) = recorder.results() else {
            panic!("expected completed summary");
        };
        assert_eq!(summary.total_detections, 2);
        assert_eq!(summary.frames_with_detections, 1);
        assert_eq!(summary.detection_rate, 1.0);
    }

    #[test]
    fn percentiles_match_floor_indexing() {
        let summary = summarize_latencies(&[40, 10, 100, 20, 30]);
        assert_eq!(summary.median_ms, 30.0);
        assert_eq!(summary.p95_ms, 100.0);
        assert_eq!(summary.mean_ms, 40.0);
        assert_eq!(summary.min_ms, 10.0);
        assert_eq!(summary.max_ms, 100.0);
    }

    #[test]
    fn empty_series_is_all_zeros() {
        let summary = summarize_latencies(&[]);
        assert_eq!(summary, LatencySummary::default());
    }

    #[test]
    fn single_sample_series() {
        let summary = summarize_latencies(&[42]);
        assert_eq!(summary.median_ms, 42.0);
        assert_eq!(summary.p95_ms, 42.0);
        assert_eq!(summary.min_ms, 42.0);
        assert_eq!(summary.max_ms, 42.0);
    }

    #[test]
    fn record_while_idle_is_rejected() {
        let recorder = BenchmarkRecorder::new();
        assert!(!recorder.record_frame(outcome(10, 1)));
        assert!(!recorder.record_bandwidth(BandwidthSample::default()));
        assert!(matches!(recorder.results(), SessionReport::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn run_completes_after_duration() {
        let recorder = Arc::new(BenchmarkRecorder::new());
        let ack = recorder.start(10, "server");
        assert_eq!(ack.status, "started");
        assert_eq!(ack.duration, 10);

        assert!(recorder.record_frame(outcome(10, 0)));
        assert!(recorder.record_frame(outcome(20, 2)));
        assert!(recorder.record_frame(outcome(30, 1)));
        assert!(recorder.record_bandwidth(BandwidthSample {
            uplink_kbps: 800.0,
            downlink_kbps: 1200.0,
            rtt_ms: 40.0,
            ..Default::default()
        }));
        assert!(matches!(
            recorder.results(),
            SessionReport::Running { .. }
        ));

        tokio::time::sleep(Duration::from_secs(11)).await;

        let SessionReport::Completed(summary) = recorder.results() else {
            panic!("expected completed summary");
        };
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.total_detections, 3);
        assert_eq!(summary.frames_with_detections, 2);
        assert!((summary.detection_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((summary.processed_fps - 0.3).abs() < 1e-9);
        assert_eq!(summary.e2e_latency.median_ms, 20.0);

        let bandwidth = summary.bandwidth.expect("bandwidth summary");
        assert_eq!(bandwidth.avg_uplink_kbps, 800.0);
        assert_eq!(bandwidth.peak_downlink_kbps, 1200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_discards_previous_run() {
        let recorder = Arc::new(BenchmarkRecorder::new());
        recorder.start(5, "server");
        recorder.record_frame(outcome(100, 1));

        // Second run supersedes the first; its frames must not leak
        // into the new summary, and the first timer must not complete
        // the new run early.
        recorder.start(30, "wasm");
        recorder.record_frame(outcome(7, 0));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(matches!(
            recorder.results(),
            SessionReport::Running { .. }
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        let SessionReport::Completed(summary) = recorder.results() else {
            panic!("expected completed summary");
        };
        assert_eq!(summary.mode, "wasm");
        assert_eq!(summary.total_frames, 1);
        assert_eq!(summary.e2e_latency.max_ms, 7.0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_latency_outcomes_excluded_from_e2e() {
        let recorder = Arc::new(BenchmarkRecorder::new());
        recorder.start(1, "wasm");
        recorder.record_frame(outcome(0, 1));
        recorder.record_frame(outcome(50, 0));
        recorder.complete_now();

        let SessionReport::Completed(summary) = recorder.results() else {
            panic!("expected completed summary");
        };
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.e2e_latency.median_ms, 50.0);
        assert_eq!(summary.e2e_latency.min_ms, 50.0);
        assert!(summary.bandwidth.is_none());
    }
}
