use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Result, ScienceError};

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// Shared `reqwest` client spacing requests by `min_interval` and retrying
/// transport errors and HTTP 429 a bounded number of times.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(
        min_interval: Duration,
        max_retries: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// One request. `Ok(Err(..))` is a failure worth retrying.
    async fn attempt(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<std::result::Result<String, Retry>> {
        self.wait_for_rate_limit().await;
        let resp = match self.client.get(url).headers(headers.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => return Ok(Err(Retry::Transport(e))),
        };
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Err(Retry::RateLimited(retry_after(resp.headers()))));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScienceError::ApiError(
                url.to_string(),
                format!("HTTP {}: {body}", status.as_u16()),
            ));
        }
        Ok(Ok(resp.text().await?))
    }

    pub async fn get_text(&self, url: &str, headers: &HeaderMap) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            let retry = match self.attempt(url, headers).await? {
                Ok(body) => return Ok(body),
                Err(retry) => retry,
            };
            if attempt >= self.max_retries {
                return Err(retry.into_error(url));
            }
            let delay = retry.delay(attempt);
            debug!(url, attempt, ?delay, "metadata request failed, retrying");
            sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &HeaderMap) -> Result<T> {
        let text = self.get_text(url, headers).await?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }
}

enum Retry {
    Transport(reqwest::Error),
    /// Seconds the server asked us to wait.
    RateLimited(u64),
}

impl Retry {
    fn delay(&self, attempt: u32) -> Duration {
        match self {
            Retry::Transport(_) => Duration::from_secs(2u64.pow(attempt)),
            Retry::RateLimited(wait) => Duration::from_secs(*wait),
        }
    }

    fn into_error(self, url: &str) -> ScienceError {
        match self {
            Retry::Transport(e) => ScienceError::Http(e),
            Retry::RateLimited(wait) => ScienceError::RateLimit(url.to_string(), wait),
        }
    }
}

fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(60)
}
