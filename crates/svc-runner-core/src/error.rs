use thiserror::Error;

/// Core error types for service runner operations
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Registration with the service manager failed: {0}")]
    RegistrationFailed(String),

    #[error("Service dispatch failed: {0}")]
    Dispatch(String),

    #[error("Service manager never started the service")]
    NotStarted,

    #[error("A service is already running in this process: {active}")]
    AlreadyRunning { active: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Status report failed: {0}")]
    Report(String),

    #[error("No service manager binding for platform: {0}")]
    Unsupported(&'static str),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn registration_failed(msg: impl Into<String>) -> Self {
        Self::RegistrationFailed(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }

    /// Check if this error happened before the service reached RUNNING
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            ServiceError::RegistrationFailed(_)
                | ServiceError::Dispatch(_)
                | ServiceError::NotStarted
                | ServiceError::AlreadyRunning { .. }
                | ServiceError::Configuration(_)
                | ServiceError::Unsupported(_)
        )
    }
}
