use serde::{Deserialize, Serialize};

use crate::PipelineError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_BENCHMARK_DURATION_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub timeout_ms: u64,
    pub benchmark_duration_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            benchmark_duration_secs: DEFAULT_BENCHMARK_DURATION_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config(
                "queue_capacity must be a positive integer".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(PipelineError::Config(
                "timeout_ms must be a positive integer".into(),
            ));
        }
        if self.benchmark_duration_secs == 0 {
            return Err(PipelineError::Config(
                "benchmark_duration_secs must be a positive integer".into(),
            ));
        }
        Ok(())
    }

    // Unparseable env values are a configuration error, not a silent
    // fallback.
    pub fn from_env() -> Result<Self, PipelineError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("FRAMECAST_QUEUE_CAPACITY") {
            config.queue_capacity = raw
                .parse()
                .map_err(|_| PipelineError::Config(format!("bad queue capacity: {raw}")))?;
        }
        if let Ok(raw) = std::env::var("FRAMECAST_TIMEOUT_MS") {
            config.timeout_ms = raw
                .parse()
                .map_err(|_| PipelineError::Config(format!("bad timeout: {raw}")))?;
        }
        if let Ok(raw) = std::env::var("FRAMECAST_BENCHMARK_SECS") {
            config.benchmark_duration_secs = raw
                .parse()
                .map_err(|_| PipelineError::Config(format!("bad benchmark duration: {raw}")))?;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.benchmark_duration_secs, 30);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = PipelineConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
