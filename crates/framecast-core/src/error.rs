use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("inference backend failed: {0}")]
    Inference(String),

    #[error("inference exceeded {0} ms deadline")]
    Timeout(u64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse frame payload: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}
