use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of failed operations buffered per wave
pub const RETRY_OPERATION_BUFFER: usize = 100;

/// Default number of retry waves after the initial one
pub const MAX_RETRY_WAVES: usize = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-run knobs of the phase scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capacity of the retry queue of each wave
    pub retry_buffer: usize,

    /// Retry waves run after the initial one; 0 disables retries
    /// Operations still failing after the last wave are abandoned
    pub max_retry_waves: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_buffer: RETRY_OPERATION_BUFFER,
            max_retry_waves: MAX_RETRY_WAVES,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_buffer == 0 {
            return Err(ConfigError::Invalid(
                "retry_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Job descriptor passed with every phase run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for Job {
    fn default() -> Self {
        Self::new("map-reduce")
    }
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scheduler: SchedulerConfig::default(),
        }
    }
}
