//! Shared HTTP plumbing for the generative and search adapters.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{NewsCheckError, ServiceError};
use crate::redact::redact_secrets;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, NewsCheckError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| NewsCheckError::InvalidConfiguration(format!("http client: {err}")))
}

/// Map a transport failure, scrubbing secrets that may sit in the request URL.
pub(crate) fn transport_error(service: &str, timeout: Duration, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::Timeout {
            service: service.to_string(),
            after: timeout,
        };
    }
    ServiceError::communication(service, redact_secrets(&err.to_string()))
}

/// Map a non-success status. 429 and 5xx are retryable, other 4xx are not.
pub(crate) fn status_error(service: &str, status: StatusCode, body: &str) -> ServiceError {
    let excerpt: String = redact_secrets(body).chars().take(200).collect();
    if status == StatusCode::TOO_MANY_REQUESTS {
        ServiceError::RateLimited {
            service: service.to_string(),
        }
    } else if status.is_server_error() {
        ServiceError::communication(service, format!("HTTP {status}: {excerpt}"))
    } else {
        ServiceError::invalid_response(service, format!("HTTP {status}: {excerpt}"))
    }
}

/// Bounded retry with exponential backoff for retryable service errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1_000),
            max_backoff: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub async fn run<T, F, Fut>(&self, service: &str, mut attempt_fn: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        service,
                        error = %err,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "service call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retryable_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast_policy(2)
            .run("llm", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ServiceError::communication("llm", "reset"))
                } else {
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result.expect("second attempt succeeds"), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = fast_policy(3)
            .run("llm", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::invalid_response("llm", "bad request"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error("search", StatusCode::TOO_MANY_REQUESTS, ""),
            ServiceError::RateLimited { .. }
        ));
        assert!(status_error("search", StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!status_error("search", StatusCode::UNAUTHORIZED, "api_key=abc").is_retryable());
        assert!(
            !status_error("search", StatusCode::UNAUTHORIZED, "api_key=abc")
                .to_string()
                .contains("abc")
        );
    }
}
