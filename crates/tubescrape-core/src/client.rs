//! HTTP client with rate limiting, plus the retry policy its callers apply
//!
//! The client performs exactly one attempt per fetch and reports failures
//! as transient or permanent. Retrying is left to the caller through
//! [`fetch_with_retry`], keeping transport and policy apart.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, TubeError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CLIENT_NAME: &str = "1";
const CLIENT_VERSION: &str = "2.20200720.00.02";

/// Configuration for the HTTP client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum requests per second (default: 2.0)
    pub requests_per_second: f64,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient errors (default: 3)
    pub max_retries: u32,
    /// First backoff delay in milliseconds, doubled per attempt (default: 1000)
    pub backoff_base_ms: u64,
    /// User-Agent sent with every request
    pub user_agent: String,
    /// Accept-Language sent with every request (default: "en-US,en")
    pub accept_language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1000,
            user_agent: USER_AGENT.to_string(),
            accept_language: "en-US,en".to_string(),
        }
    }
}

impl ClientConfig {
    /// Retry policy callers should apply around this client's fetches
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

/// Rate limiter to control request frequency
///
/// Ensures requests are spaced at least `min_interval` apart.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

/// Spacing between requests for a rate, or `None` if the rate is not a
/// positive finite number with a representable interval
fn interval_for(requests_per_second: f64) -> Option<Duration> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / requests_per_second).ok()
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    ///
    /// # Arguments
    /// * `requests_per_second` - Maximum number of requests allowed per second.
    ///   A rate without a usable interval (zero, negative, NaN, or too small)
    ///   spaces requests by `Duration::MAX`.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = interval_for(requests_per_second).unwrap_or(Duration::MAX);
        let now = Instant::now();
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(
                now.checked_sub(min_interval).unwrap_or(now),
            )),
        }
    }

    /// Acquire permission to make a request
    ///
    /// If called before the minimum interval has passed since the last request,
    /// this method will sleep until the interval has elapsed.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            let wait_time = self.min_interval - elapsed;
            sleep(wait_time).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Retrieves page and script text by URL
///
/// Implementations make a single attempt and classify failures as
/// [`TubeError::TransientNetwork`], [`TubeError::RateLimited`] or
/// [`TubeError::HttpStatus`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Size in bytes the server announces for `url`, without the body
    ///
    /// Fetchers that cannot ask cheaply return `Ok(None)`.
    async fn content_length(&self, _url: &str) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Maps 429 to `RateLimited` and any other 4xx/5xx to `HttpStatus`
fn check_status(status: reqwest::StatusCode, url: &str) -> Result<()> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(TubeError::RateLimited);
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(TubeError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(())
}

/// HTTP client wrapper with rate limiting
///
/// Sends a browser-like header set; the site serves different markup to
/// clients it does not recognize.
pub struct TubeClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl TubeClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        if interval_for(config.requests_per_second).is_none() {
            return Err(TubeError::InvalidConfig(format!(
                "requests_per_second must be a positive finite rate, got {}",
                config.requests_per_second
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| TubeError::InvalidConfig(format!("accept_language: {}", e)))?,
        );
        headers.insert(
            HeaderName::from_static("x-youtube-client-name"),
            HeaderValue::from_static(CLIENT_NAME),
        );
        headers.insert(
            HeaderName::from_static("x-youtube-client-version"),
            HeaderValue::from_static(CLIENT_VERSION),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| TubeError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_second),
        })
    }

    /// Get a reference to the rate limiter (for testing)
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

#[async_trait]
impl PageFetcher for TubeClient {
    /// Fetch text content from an absolute URL
    ///
    /// # Errors
    /// - `TransientNetwork` - connection reset, timeout, truncated body
    /// - `RateLimited` - server returned 429
    /// - `HttpStatus` - any other 4xx/5xx
    async fn fetch(&self, url: &str) -> Result<String> {
        self.rate_limiter.acquire().await;
        debug!(url, "fetching");

        let response = self.client.get(url).send().await?;
        check_status(response.status(), url)?;

        response
            .text()
            .await
            .map_err(|e| TubeError::TransientNetwork(e.to_string()))
    }

    /// Read `Content-Length` from a HEAD request
    ///
    /// # Errors
    /// Same classification as [`PageFetcher::fetch`]
    async fn content_length(&self, url: &str) -> Result<Option<u64>> {
        self.rate_limiter.acquire().await;
        debug!(url, "requesting content length");

        let response = self.client.head(url).send().await?;
        check_status(response.status(), url)?;

        Ok(response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok()))
    }
}

/// How often and how patiently a caller retries retryable fetch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ClientConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// Policy that surfaces the first error
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // 1x, 2x, 4x, ...
        self.backoff_base.saturating_mul(1 << attempt.min(16))
    }
}

/// Fetches `url`, retrying transient failures and 429s with exponential backoff
///
/// Permanent errors are returned immediately, unmodified.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<String> {
    let mut attempt = 0;

    loop {
        match fetcher.fetch(url).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                warn!(url, attempt, error = %e, "retrying after {:?}", backoff);
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
