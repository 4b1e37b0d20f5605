use async_trait::async_trait;
use framecast_core::{DetectionResult, Detector, FrameData, PipelineError};
use tracing::debug;

// The remote service answers with a full DetectionResult; box
// extraction and NMS are its problem.
pub struct RemoteDetector {
    http: reqwest::Client,
    endpoint: String,
}

impl RemoteDetector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    fn mode(&self) -> &'static str {
        "server"
    }

    async fn detect(&self, frame: FrameData) -> Result<DetectionResult, PipelineError> {
        debug!("Forwarding frame {} to {}", frame.frame_id, self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&frame)
            .send()
            .await
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Inference(format!(
                "inference endpoint returned {status}"
            )));
        }

        response
            .json::<DetectionResult>()
            .await
            .map_err(|e| PipelineError::Inference(e.to_string()))
    }
}
