//! Error types for ecs-runner-common.

use std::time::Duration;
use thiserror::Error;

/// Result type using RunnerError.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors raised while reconciling a cloud instance with its runner registration.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Missing or invalid input, detected before any remote call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A remote service rejected the supplied credential.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// The cloud job reached a terminal failure state. Carries the provider reason verbatim.
    #[error("instance provisioning failed: {0}")]
    ProvisioningFailed(String),

    /// No runner with the label came online within the polling horizon.
    #[error("runner '{label}' did not come online within {waited:?}")]
    RegistrationTimeout { label: String, waited: Duration },

    /// Instance deletion or runner deregistration was rejected.
    #[error("teardown error: {0}")]
    Teardown(String),

    /// The cloud provider rejected one or more instance ids as invalid.
    #[error("invalid instance id: {0}")]
    InvalidInstance(String),

    /// A remote service answered with a non-success status.
    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Local IO error, e.g. while writing step outputs.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Whether this error was raised before anything was sent to a remote service.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RunnerError::Configuration(_))
    }
}

impl From<reqwest::Error> for RunnerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RunnerError::Serialization(err.to_string())
        } else {
            RunnerError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(err: serde_json::Error) -> Self {
        RunnerError::Serialization(err.to_string())
    }
}
