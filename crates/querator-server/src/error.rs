//! Error types for the service process.

use thiserror::Error;

use crate::config::ConfigError;

/// Failures reported by a running service or its factory.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Service failed: {message}")]
    Failed { message: String },

    #[error("Shutdown did not complete within {seconds}s")]
    ShutdownTimeout { seconds: u64 },

    #[error("Shutdown was interrupted by cancellation")]
    Interrupted,
}

/// Terminal failures of the process lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("while applying configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("while creating daemon: {0}")]
    Construction(#[source] ServiceError),

    #[error("while shutting down: {0}")]
    Shutdown(#[source] ServiceError),

    #[error("while installing signal handlers: {0}")]
    SignalHandler(#[source] std::io::Error),
}

impl LifecycleError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Construction(_) => 3,
            Self::Shutdown(_) => 4,
            Self::SignalHandler(_) => 5,
        }
    }
}
