// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Retrace ingest pipeline.

use thiserror::Error;

/// The primary error type used across the Retrace workspace.
///
/// The variants map the pipeline's failure taxonomy: transient errors are
/// retried with backoff up to the attempt cap, missing dependencies and
/// configuration errors are terminal, and redundancy failures are logged
/// by the caller and never propagated.
#[derive(Debug, Error)]
pub enum RetraceError {
    /// Configuration errors (missing credentials, no endpoint configured).
    /// Never retried -- retrying cannot fix misconfiguration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Object-storage errors (network failure, unexpected status).
    #[error("object store error: {message}")]
    ObjectStore {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested object does not exist at the endpoint.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// A payload could not be parsed. Treated as transient up to the retry
    /// cap: a re-download may resolve partial-upload corruption.
    #[error("malformed payload: {0}")]
    Payload(String),

    /// A required upstream row is missing (e.g. a job whose session does not
    /// exist). Terminal -- indicates a data-integrity problem, not a fault
    /// that a retry can fix.
    #[error("missing dependency: {entity} {id}")]
    MissingDependency { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RetraceError {
    /// Whether a job failure with this error should be retried (until the
    /// attempt cap) rather than dead-lettered immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            RetraceError::Storage { .. }
            | RetraceError::ObjectStore { .. }
            | RetraceError::Payload(_)
            | RetraceError::Internal(_) => true,
            RetraceError::Config(_)
            | RetraceError::MissingDependency { .. }
            | RetraceError::NotFound { .. } => false,
        }
    }

    /// Shorthand for an object-store error without an underlying source.
    pub fn object_store(message: impl Into<String>) -> Self {
        RetraceError::ObjectStore {
            message: message.into(),
            source: None,
        }
    }

    /// Object-store error wrapping an underlying transport failure.
    pub fn object_store_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RetraceError::ObjectStore {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_matches_taxonomy() {
        assert!(
            RetraceError::ObjectStore {
                message: "connection reset".into(),
                source: None,
            }
            .is_transient()
        );
        assert!(RetraceError::Payload("unexpected EOF".into()).is_transient());
        assert!(
            !RetraceError::MissingDependency {
                entity: "session",
                id: "s1".into(),
            }
            .is_transient()
        );
        assert!(!RetraceError::Config("no endpoint".into()).is_transient());
        assert!(!RetraceError::NotFound { key: "a/b".into() }.is_transient());
    }

    #[test]
    fn error_messages_render() {
        let err = RetraceError::MissingDependency {
            entity: "session",
            id: "sess-9".into(),
        };
        assert_eq!(err.to_string(), "missing dependency: session sess-9");
    }
}
