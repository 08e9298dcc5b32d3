//! Freesound API client
//!
//! Implements the search collaborator: tag-filtered text search and
//! single-sound lookup. Deadlines are applied by callers through the
//! bounded-call utility; the HTTP client only carries a connect timeout
//! and a generous backstop.

use crate::models::{Recording, SearchResponse};
use crate::providers::{ProviderError, SearchProvider, TagQuery};
use async_trait::async_trait;
use soundsketch_common::config::SearchConfig;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://freesound.org/apiv2";

/// Fields requested from the search API. Keep in sync with `Recording`.
const FIELDS: &str =
    "id,name,license,username,previews,tags,duration,avg_rating,num_ratings,num_downloads";

/// Tags excluded from every query: frequent false positives that are
/// instruments or musical works rather than field recordings.
const BASE_EXCLUSIONS: &[&str] = &["rain stick", "rainstick", "instrument", "music"];

/// Freesound API client.
#[derive(Debug)]
pub struct FreesoundClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    page_size: u32,
    sort: String,
    duration_window: (u32, u32),
}

impl FreesoundClient {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("Freesound API key missing".into()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("SoundSketch/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: config.page_size,
            sort: config.sort.clone(),
            duration_window: (config.min_duration_secs, config.max_duration_secs),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Filter expression: the tag itself, negative-tag exclusions, and the
    /// loopable duration window.
    fn build_filter(&self, query: &TagQuery) -> String {
        let mut filter = format!("tag:{}", query.tag);
        for excl in BASE_EXCLUSIONS {
            if excl.contains(' ') {
                filter.push_str(&format!(" -tag:\"{excl}\""));
            } else {
                filter.push_str(&format!(" -tag:{excl}"));
            }
        }
        for excl in &query.exclude_tags {
            let excl = excl.trim();
            if excl.is_empty() {
                continue;
            }
            if excl.contains(' ') {
                filter.push_str(&format!(" -tag:\"{excl}\""));
            } else {
                filter.push_str(&format!(" -tag:{excl}"));
            }
        }
        filter.push_str(&format!(
            " duration:[{} TO {}]",
            self.duration_window.0, self.duration_window.1
        ));
        filter
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), text));
        }
        Ok(response)
    }
}

#[async_trait]
impl SearchProvider for FreesoundClient {
    async fn search_tag(&self, query: &TagQuery) -> Result<SearchResponse, ProviderError> {
        let url = format!("{}/search/text/", self.base_url);
        let filter = self.build_filter(query);

        tracing::debug!(tag = %query.tag, filter = %filter, "Querying Freesound search");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .query(&[
                ("query", query.tag.as_str()),
                ("filter", filter.as_str()),
                ("sort", self.sort.as_str()),
                ("page_size", &self.page_size.to_string()),
                ("fields", FIELDS),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        tracing::info!(
            tag = %query.tag,
            count = parsed.count,
            returned = parsed.results.len(),
            "Freesound search completed"
        );

        Ok(parsed)
    }

    async fn lookup(&self, id: u64) -> Result<Recording, ProviderError> {
        let url = format!("{}/sounds/{}/", self.base_url, id);

        tracing::debug!(id, "Looking up Freesound recording");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .query(&[("fields", FIELDS)])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}
