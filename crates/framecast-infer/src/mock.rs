use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use framecast_core::{now_ms, Detection, DetectionResult, Detector, FrameData, PipelineError};

// Canned boxes cycled through when no real model is loaded.
const MOCK_OBJECTS: &[(&str, f64, f64, f64, f64, f64)] = &[
    ("person", 0.85, 0.1, 0.1, 0.3, 0.6),
    ("chair", 0.72, 0.5, 0.4, 0.8, 0.9),
    ("bottle", 0.68, 0.7, 0.1, 0.85, 0.4),
];

pub struct MockDetector {
    calls: AtomicUsize,
}

impl MockDetector {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for MockDetector {
    fn mode(&self) -> &'static str {
        "mock"
    }

    async fn detect(&self, frame: FrameData) -> Result<DetectionResult, PipelineError> {
        let recv_ts = now_ms();

        // Vary the box count 0..=2 per call so consumers see frames
        // both with and without detections.
        let count = self.calls.fetch_add(1, Ordering::Relaxed) % 3;
        let detections = MOCK_OBJECTS
            .iter()
            .take(count)
            .map(|&(label, score, xmin, ymin, xmax, ymax)| Detection {
                label: label.to_string(),
                score,
                xmin,
                ymin,
                xmax,
                ymax,
            })
            .collect();

        Ok(DetectionResult {
            frame_id: frame.frame_id,
            capture_ts: frame.capture_ts,
            recv_ts,
            inference_ts: now_ms(),
            detections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_detection_counts() {
        let detector = MockDetector::new();
        let frame = |id: &str| FrameData {
            frame_id: id.to_string(),
            capture_ts: now_ms(),
            image_data: String::new(),
        };

        let counts: Vec<usize> = [
            detector.detect(frame("a")).await.unwrap(),
            detector.detect(frame("b")).await.unwrap(),
            detector.detect(frame("c")).await.unwrap(),
            detector.detect(frame("d")).await.unwrap(),
        ]
        .iter()
        .map(|r| r.detections.len())
        .collect();

        assert_eq!(counts, vec![0, 1, 2, 0]);
    }

    #[tokio::test]
    async fn boxes_are_normalized() {
        let detector = MockDetector::new();
        let frame = FrameData {
            frame_id: "f".into(),
            capture_ts: now_ms(),
            image_data: String::new(),
        };
        detector.detect(frame.clone()).await.unwrap();
        detector.detect(frame.clone()).await.unwrap();
        let result = detector.detect(frame).await.unwrap();

        for d in &result.detections {
            assert!((0.0..=1.0).contains(&d.score));
            assert!(d.xmax > d.xmin && d.ymax > d.ymin);
            assert!(d.xmin >= 0.0 && d.xmax <= 1.0);
            assert!(d.ymin >= 0.0 && d.ymax <= 1.0);
        }
    }
}
