//! Error types for observability crate

use thiserror::Error;

/// Errors raised while loading configuration from the environment.
///
/// These are always raised before any exporter or network resource exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or empty
    #[error("Missing required environment variable {0}")]
    MissingVar(String),

    /// A variable is present but its value cannot be used
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    pub fn invalid(var: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during observability initialization or operation
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// Failed to initialize OpenTelemetry
    #[error("Failed to initialize observability: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Flushing or shutting down a provider failed
    #[error("Telemetry shutdown failed: {0}")]
    Shutdown(String),

    /// Reading or writing a trace capture failed
    #[error("Trace capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trace capture serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
