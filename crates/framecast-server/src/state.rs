use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use framecast_core::{Detector, PipelineConfig, PipelineError};
use framecast_pipeline::{BenchmarkRecorder, FrameProcessor};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

pub struct AppState {
    pub mode: String,
    pub config: PipelineConfig,
    pub processor: Arc<FrameProcessor>,
    pub benchmark: Arc<BenchmarkRecorder>,
    pub clients: DashMap<Uuid, UnboundedSender<String>>,
    pub summary_path: PathBuf,
}

impl AppState {
    pub fn new(
        mode: String,
        config: PipelineConfig,
        detector: Arc<dyn Detector>,
        summary_path: PathBuf,
    ) -> Result<Self, PipelineError> {
        let benchmark = Arc::new(BenchmarkRecorder::new());
        let processor = FrameProcessor::new(detector, Arc::clone(&benchmark), &config)?;

        Ok(Self {
            mode,
            config,
            processor,
            benchmark,
            clients: DashMap::new(),
            summary_path,
        })
    }

    // Closed channels are skipped; the owning connection task removes
    // them on disconnect.
    pub fn relay_from(&self, sender_id: Uuid, text: &str) {
        for entry in self.clients.iter() {
            if *entry.key() != sender_id {
                let _ = entry.value().send(text.to_string());
            }
        }
    }
}
