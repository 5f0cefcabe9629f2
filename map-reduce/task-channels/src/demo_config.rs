use crate::worker_process::WorkerBehaviour;
use map_reduce_core::{ConfigError, Job};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub job: Job,
    pub num_workers: usize,
    pub num_inputs: usize,
    pub num_reducers: usize,
    pub failure_rate: f64,
    pub crash_rate: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub restart_delay_ms: u64,
    pub max_restarts: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            job: Job::new("word-count"),
            num_workers: 8,
            num_inputs: 200,
            num_reducers: 10,
            failure_rate: 0.05,
            crash_rate: 0.01,
            min_latency_ms: 5,
            max_latency_ms: 50,
            restart_delay_ms: 100,
            max_restarts: 3,
        }
    }
}

impl DemoConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: DemoConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.job.scheduler.validate()?;
        if self.num_workers == 0 {
            return Err(ConfigError::Invalid(
                "num_workers must be at least 1".to_string(),
            ));
        }
        for (name, rate) in [
            ("failure_rate", self.failure_rate),
            ("crash_rate", self.crash_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within 0.0..=1.0, got {}",
                    name, rate
                )));
            }
        }
        if self.min_latency_ms > self.max_latency_ms {
            return Err(ConfigError::Invalid(
                "min_latency_ms must not exceed max_latency_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn behaviour(&self) -> WorkerBehaviour {
        WorkerBehaviour {
            failure_rate: self.failure_rate,
            crash_rate: self.crash_rate,
            min_latency: Duration::from_millis(self.min_latency_ms),
            max_latency: Duration::from_millis(self.max_latency_ms),
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: DemoConfig = serde_json::from_str(
            r#"{ "num_workers": 3, "job": { "name": "grep", "scheduler": { "max_retry_waves": 2 } } }"#,
        )
        .unwrap();
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.job.name, "grep");
        assert_eq!(config.job.scheduler.max_retry_waves, 2);
        assert_eq!(config.num_reducers, DemoConfig::default().num_reducers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rates_out_of_range_are_rejected() {
        let config = DemoConfig {
            failure_rate: 1.5,
            ..DemoConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_no_workers_is_rejected() {
        let config = DemoConfig {
            num_workers: 0,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
