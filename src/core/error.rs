//! Error types for the deployment descriptor.

use thiserror::Error;

/// Result type alias for descriptor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating or submitting the descriptor.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Failed to read settings: {0}")]
    ConfigRead(String),

    #[error("Failed to parse settings: {0}")]
    ConfigParse(String),

    // Graph errors
    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Resource {resource} depends on unknown resource {dependency}")]
    UnknownDependency { resource: String, dependency: String },

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    // Backend errors
    #[error("Resource {resource} rejected: {message}")]
    ResourceRejected { resource: String, message: String },

    #[error("Timed out after {seconds}s waiting for {resource} to become ready")]
    ReadinessTimeout { resource: String, seconds: u64 },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    // Output errors
    #[error("Output {0} could not be resolved from live objects")]
    MissingOutput(String),

    #[error("No state recorded for stack {0}")]
    StateNotFound(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParse(err.to_string())
    }
}

#[cfg(feature = "cluster")]
impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Error::BackendUnavailable(err.to_string())
    }
}
