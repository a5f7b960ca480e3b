use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Core error type for NewsCheck configuration and I/O surfaces.
#[derive(Debug, Error)]
pub enum NewsCheckError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NewsCheckError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure reported by an external collaborator (generative text or web search).
///
/// These never escape the verification pipeline; callers degrade to templates or
/// neutral evaluations instead.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("{service} unreachable: {reason}")]
    Communication { service: String, reason: String },
    #[error("{service} returned an unusable response: {reason}")]
    InvalidResponse { service: String, reason: String },
    #[error("{service} rate limited the request")]
    RateLimited { service: String },
    #[error("{service} timed out after {after:?}")]
    Timeout { service: String, after: Duration },
    #[error("{service} is not configured")]
    NotConfigured { service: String },
}

impl ServiceError {
    pub fn communication(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Communication {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Whether an adapter should try the call again after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Communication { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ServiceError::communication("search", "connection reset").is_retryable());
        assert!(
            ServiceError::RateLimited {
                service: "llm".into()
            }
            .is_retryable()
        );
        assert!(!ServiceError::invalid_response("llm", "empty body").is_retryable());
        assert!(
            !ServiceError::NotConfigured {
                service: "search".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn service_error_converts_into_core_error() {
        let err: NewsCheckError = ServiceError::communication("llm", "refused").into();
        assert!(err.to_string().contains("llm unreachable"));
    }
}
