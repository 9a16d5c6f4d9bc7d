use crate::error::ServiceError;
use crate::status::StatusTiming;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single wait hint (10 minutes)
pub const MAX_WAIT_HINT_MS: u32 = 600_000;

/// Main runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into))]
pub struct RunnerConfig {
    /// Name the service was registered under with the host manager
    pub name: String,

    /// Expected time to leave START_PENDING (in milliseconds)
    #[serde(default = "default_start_wait_hint_ms")]
    #[builder(default = "default_start_wait_hint_ms()")]
    pub start_wait_hint_ms: u32,

    /// Expected time to leave STOP_PENDING (in milliseconds)
    #[serde(default = "default_stop_wait_hint_ms")]
    #[builder(default = "default_stop_wait_hint_ms()")]
    pub stop_wait_hint_ms: u32,
}

impl RunnerConfig {
    /// Create a config with default wait hints for the given service name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_wait_hint_ms: default_start_wait_hint_ms(),
            stop_wait_hint_ms: default_stop_wait_hint_ms(),
        }
    }

    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::configuration("service name cannot be empty"));
        }

        // The service control manager rejects these in service names
        if self.name.contains(['/', '\\']) {
            return Err(ServiceError::configuration(format!(
                "service name cannot contain path separators: {}",
                self.name
            )));
        }

        if self.start_wait_hint_ms > MAX_WAIT_HINT_MS {
            return Err(ServiceError::configuration(
                "start_wait_hint_ms should not exceed 10 minutes",
            ));
        }

        if self.stop_wait_hint_ms > MAX_WAIT_HINT_MS {
            return Err(ServiceError::configuration(
                "stop_wait_hint_ms should not exceed 10 minutes",
            ));
        }

        Ok(())
    }

    pub fn start_wait_hint(&self) -> Duration {
        Duration::from_millis(u64::from(self.start_wait_hint_ms))
    }

    pub fn stop_wait_hint(&self) -> Duration {
        Duration::from_millis(u64::from(self.stop_wait_hint_ms))
    }

    /// Wait hints in the shape the status snapshots need
    pub fn timing(&self) -> StatusTiming {
        StatusTiming {
            start_wait_hint: self.start_wait_hint(),
            stop_wait_hint: self.stop_wait_hint(),
        }
    }
}

// Default value functions for serde
fn default_start_wait_hint_ms() -> u32 {
    5_000
}
fn default_stop_wait_hint_ms() -> u32 {
    15_000
}
