pub mod benchmark;
pub mod metrics;
pub mod processor;

pub use benchmark::{
    BandwidthSample, BenchmarkRecorder, BenchmarkSummary, FrameOutcome, SessionReport, StartAck,
};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use processor::{FrameProcessor, QueueStatus};
