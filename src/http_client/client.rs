//! Construction of retrying HTTP clients for outbound calls to the wearable
//! vendor, its OAuth endpoint and the push gateway.

use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
    default_on_request_success, policies::ExponentialBackoff,
};

use crate::config::{HttpRetryConfig, JitterSetting};

/// Retries transient failures except `429 Too Many Requests`, which the
/// wearable quota manager has to see.
struct SkipRateLimitedStrategy;

impl RetryableStrategy for SkipRateLimitedStrategy {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                Some(Retryable::Fatal)
            }
            Ok(response) => default_on_request_success(response),
            Err(error) => default_on_request_failure(error),
        }
    }
}

/// Wraps `base_client` with exponential-backoff retries for transient
/// failures (connection errors, 5xx and 408 responses).
pub fn create_retryable_http_client(
    config: &HttpRetryConfig,
    base_client: reqwest::Client,
) -> ClientWithMiddleware {
    let jitter = match config.jitter {
        JitterSetting::None => Jitter::None,
        JitterSetting::Full => Jitter::Full,
    };

    let retry_policy = ExponentialBackoff::builder()
        .jitter(jitter)
        .base(config.base_for_backoff)
        .retry_bounds(config.initial_backoff_ms, config.max_backoff_secs)
        .build_with_max_retries(config.max_retries);

    ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            retry_policy,
            SkipRateLimitedStrategy,
        ))
        .build()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fast_retry() -> HttpRetryConfig {
        HttpRetryConfig {
            max_retries: 2,
            initial_backoff_ms: Duration::from_millis(1),
            max_backoff_secs: Duration::from_millis(5),
            jitter: JitterSetting::None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/cycle").with_status(503).expect(3).create_async().await;

        let client = create_retryable_http_client(&fast_retry(), reqwest::Client::new());
        let response = client.get(format!("{}/cycle", server.url())).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_responses_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/cycle").with_status(429).expect(1).create_async().await;

        let client = create_retryable_http_client(&fast_retry(), reqwest::Client::new());
        let response = client.get(format!("{}/cycle", server.url())).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        mock.assert_async().await;
    }
}
