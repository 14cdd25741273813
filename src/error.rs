//! Error types for the classification pipeline
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use thiserror::Error;

use crate::services::ServiceError;
use crate::vector::VectorError;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Retrieval produced nothing, which only happens on an empty index.
    #[error("no matching items found")]
    NoCandidates,

    /// An external service stayed unreachable after retries.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Vector index failures (load-time or query-time).
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// The request-level deadline expired before the pipeline finished.
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl PipelineError {
    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::NoCandidates => vec![
                "The index artifacts appear to be empty",
                "Rebuild the index from the source catalog and restart",
            ],
            Self::Service(_) => vec![
                "Check the service endpoints configured in settings.toml",
                "Verify the API key environment variable is set",
            ],
            Self::Vector(_) => vec![
                "Regenerate the index artifacts from the same source run",
                "Check disk errors in the index directory",
            ],
            Self::Timeout { .. } => vec![
                "Increase service.request_timeout_secs in settings.toml",
                "Check whether the chat or embedding service is overloaded",
            ],
            Self::Config { .. } => vec![],
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
