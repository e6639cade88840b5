//! HTTP client for listing pages and the price API
//!
//! Every request waits on a shared rate limiter, retries transient failures
//! with backoff and gives up as soon as the cancellation token fires.

use anyhow::{Context, Result};
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, RETRY_AFTER, USER_AGENT},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::fetch_error::{FetchError, FetchResult};
use super::retry_policy::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
    pub accept_language: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "opcg-catalog/0.1 (card catalog maintenance)".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 2,
            follow_redirects: true,
            accept_language: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        if let Some(lang) = &config.accept_language {
            headers.insert(
                ACCEPT_LANGUAGE,
                HeaderValue::from_str(lang).context("Invalid Accept-Language")?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fetch a page body as text, retrying per the configured policy
    pub async fn get_text(&self, url: &str, cancel: &CancellationToken) -> FetchResult<String> {
        let mut attempt = 0;
        loop {
            match self.get_text_once(url, cancel).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && self.config.retry.should_retry(attempt) => {
                    attempt += 1;
                    let delay = self.config.retry.delay_after(attempt, err.retry_after());
                    tracing::warn!(
                        "Retrying {} (attempt {}/{}) in {}ms: {}",
                        url,
                        attempt,
                        self.config.retry.max_retries,
                        delay.as_millis(),
                        err
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            return Err(FetchError::Cancelled { url: url.to_string() });
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetch and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, cancel: &CancellationToken) -> FetchResult<T> {
        let body = self.get_text(url, cancel).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::InvalidBody {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_text_once(&self, url: &str, cancel: &CancellationToken) -> FetchResult<String> {
        let cancelled = || FetchError::Cancelled { url: url.to_string() };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        tokio::select! {
            () = self.rate_limiter.until_ready() => {}
            () = cancel.cancelled() => return Err(cancelled()),
        }

        tracing::debug!("Fetching {}", url);

        let response = tokio::select! {
            result = self.client.get(url).send() => result.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?,
            () = cancel.cancelled() => return Err(cancelled()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchError::RateLimited {
                url: url.to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = tokio::select! {
            result = response.text() => result.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?,
            () = cancel.cancelled() => return Err(cancelled()),
        };

        tracing::debug!("Fetched {} ({} bytes)", url, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_builds_from_defaults() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn zero_rate_limit_is_rejected() {
        let config = HttpClientConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(HttpClient::new(config).is_err());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let client = HttpClient::new(HttpClientConfig::default()).expect("client");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .get_text("http://127.0.0.1:9/never", &cancel)
            .await
            .expect_err("should be cancelled");
        assert!(err.is_cancelled());
    }
}
