use async_trait::async_trait;

use crate::{DetectionResult, FrameData, PipelineError};

// `detect` takes the frame by value because the drain worker runs it
// in a detached task: a call abandoned on timeout keeps running to
// completion and its result is discarded.
#[async_trait]
pub trait Detector: Send + Sync {
    fn mode(&self) -> &'static str;

    async fn detect(&self, frame: FrameData) -> Result<DetectionResult, PipelineError>;
}
