use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid worker configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invoke_timeout_ms must be greater than zero")]
    ZeroTimeout,
}

/// Options applied to every invocation of a worker.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Label attached to log events emitted for this worker.
    pub label: Option<String>,
    /// Upper bound for a whole invocation, in milliseconds.
    pub invoke_timeout_ms: Option<u64>,
}

impl WorkerConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invoke_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.invoke_timeout_ms.map(Duration::from_millis)
    }

    /// The label used in log events, `"worker"` when none is configured.
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("worker")
    }
}
