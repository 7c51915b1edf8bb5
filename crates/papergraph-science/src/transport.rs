use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use papergraph_core::HarvestConfig;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Result, ScienceError};

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Fetches a URL into a file on disk.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn download(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Direct HTTP download, optionally routed through a SOCKS relay.
pub struct HttpTransport {
    client: reqwest::Client,
    retries: u32,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration, retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, retries })
    }

    /// Same transport, every request sent through `proxy_url`
    /// (e.g. `socks5h://127.0.0.1:1080`).
    pub fn with_relay(
        user_agent: &str,
        timeout: Duration,
        retries: u32,
        proxy_url: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .proxy(reqwest::Proxy::all(proxy_url)?)
            .build()?;
        Ok(Self { client, retries })
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        Self::new(
            &config.download.user_agent,
            config.download_timeout(),
            config.download.retries,
        )
    }

    pub fn relay_from_config(config: &HarvestConfig) -> Result<Self> {
        Self::with_relay(
            &config.download.user_agent,
            config.download_timeout(),
            config.download.retries,
            &config.download.relay_proxy,
        )
    }

    async fn fetch_once(&self, url: &str, destination: &Path) -> Result<()> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScienceError::Download(
                url.to_string(),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(url, destination).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retries => return Err(e),
                Err(e) => {
                    debug!(url, attempt, error = %e, "download attempt failed, retrying");
                    sleep(RETRY_BACKOFF).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Tries `primary`, then `relay` when the primary route fails.
pub struct FallbackTransport {
    primary: Arc<dyn Transport>,
    relay: Arc<dyn Transport>,
}

impl FallbackTransport {
    pub fn new(primary: Arc<dyn Transport>, relay: Arc<dyn Transport>) -> Self {
        Self { primary, relay }
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        match self.primary.download(url, destination).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(url, error = %e, "primary route failed, trying relay");
                self.relay.download(url, destination).await
            }
        }
    }
}
