//! Clients for the external natural-language and embedding services.
//!
//! Every collaborator sits behind a trait so the pipeline can be exercised
//! with deterministic stubs. Production implementations talk HTTP with
//! bounded retry and exponential backoff; exhausted retries surface as
//! [`ServiceError::Unavailable`].

mod chat;
mod embedding;

use std::time::Duration;

use thiserror::Error;

pub use chat::{ChatClient, HttpChatClient, complete_structured, strip_code_fences};
pub use embedding::{Embedder, HttpEmbedder};

/// Errors from external service calls.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {reason}")]
    Transport {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned an unusable response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error(
        "{service} unavailable after {attempts} attempts: {last}\nSuggestion: Check the service endpoint and credentials in settings.toml"
    )]
    Unavailable {
        service: &'static str,
        attempts: u32,
        last: String,
    },
}

/// A structured reply from a service that promises JSON output.
///
/// Call sites must handle all three cases explicitly: a parsed payload, a
/// reply that arrived but could not be parsed, and a service that could
/// not be reached at all. Malformed output is never retried; it is
/// handled by a local deterministic fallback.
#[derive(Debug)]
pub enum StructuredReply<T> {
    /// The service answered with well-formed structured data.
    Parsed(T),
    /// The service answered, but the payload was not valid JSON of the
    /// expected shape. The raw text is kept for logging.
    Malformed { raw: String },
    /// The service could not be reached after retries.
    Unavailable(ServiceError),
}

/// Exponential backoff delay before retry `attempt` (zero-based): 1s, 2s, 4s.
#[must_use]
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
    }
}
