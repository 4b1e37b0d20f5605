pub mod config;
pub mod detector;
pub mod error;
pub mod types;

pub use config::PipelineConfig;
pub use detector::Detector;
pub use error::PipelineError;
pub use types::*;
