//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Start was requested for a name with no configuration.
    #[error("no configuration found for processor `{0}`")]
    ConfigurationMissing(String),
    /// The configured processor type has no registered factory.
    #[error("unknown processor type `{0}`")]
    UnknownProcessorType(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Message source failure with context.
    #[error("source error: {0}")]
    Source(String),
    /// One or more sink writes failed during a publish.
    #[error("publish error: {0}")]
    Publish(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
