use std::time::Duration;

use async_trait::async_trait;
use papergraph_core::{CitationEdge, HarvestConfig, PaperRecord, ReferenceEdge};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::sources::MetadataApi;

const PAPER_FIELDS: &str = "paperId,externalIds,title,venue,openAccessPdf,fieldsOfStudy,authors";
const EDGE_FIELDS: &str =
    "contexts,intents,paperId,externalIds,title,venue,openAccessPdf,fieldsOfStudy,authors";
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
const USER_AGENT: &str = concat!("papergraph/", env!("CARGO_PKG_VERSION"));

/// One page of a Graph API list endpoint. Only the first page is read.
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Option<Vec<T>>,
}

pub struct SemanticScholarSource {
    client: RateLimitedClient,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarSource {
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        Self::with_config(
            config.api.base_url.clone(),
            config.api.api_key.clone(),
            config.request_interval(),
            config.api.max_retries,
            config.request_timeout(),
        )
    }

    pub fn with_config(
        base_url: String,
        api_key: Option<String>,
        min_interval: Duration,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(min_interval, max_retries, timeout, USER_AGENT)?,
            api_key,
            base_url,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(base_url: String) -> Self {
        Self::with_config(base_url, None, Duration::from_millis(0), 0, Duration::from_secs(5))
            .expect("test client builds")
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ScienceError::Parse(format!("invalid URL {}: {e}", self.base_url)))?;
        {
            let mut segs = url.path_segments_mut().map_err(|_| {
                ScienceError::Parse("invalid Semantic Scholar base URL".to_string())
            })?;
            segs.pop_if_empty();
            for segment in segments {
                segs.push(segment);
            }
        }
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let page: Page<T> = self
            .client
            .get_json(url.as_str(), &self.auth_headers()?)
            .await?;
        Ok(page.data.unwrap_or_default())
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let value =
                HeaderValue::from_str(key).map_err(|e| ScienceError::Parse(e.to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl MetadataApi for SemanticScholarSource {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    async fn search(&self, title: &str) -> Result<Vec<PaperRecord>> {
        let url = self.endpoint(
            &["paper", "search"],
            &[("query", title), ("fields", PAPER_FIELDS)],
        )?;
        self.fetch_page(url).await
    }

    async fn citations_of(&self, paper_id: &str) -> Result<Vec<CitationEdge>> {
        let url = self.endpoint(&["paper", paper_id, "citations"], &[("fields", EDGE_FIELDS)])?;
        self.fetch_page(url).await
    }

    async fn references_of(&self, paper_id: &str) -> Result<Vec<ReferenceEdge>> {
        let url = self.endpoint(&["paper", paper_id, "references"], &[("fields", EDGE_FIELDS)])?;
        self.fetch_page(url).await
    }

    async fn papers_of(&self, author_id: &str) -> Result<Vec<PaperRecord>> {
        let url = self.endpoint(&["author", author_id, "papers"], &[("fields", PAPER_FIELDS)])?;
        self.fetch_page(url).await
    }
}
