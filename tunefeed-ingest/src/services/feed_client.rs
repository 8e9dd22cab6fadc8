//! Catalog feed client
//!
//! Fetches chart and search pages from the third-party catalog feed and
//! normalizes their items into [`TrackMetadata`].

use std::time::Duration;
use thiserror::Error;

use crate::models::track::{FeedPage, TrackMetadata};
use crate::services::regional_classifier::RegionalClassifier;

pub const DEFAULT_FEED_BASE_URL: &str = "https://api.deezer.com";
const USER_AGENT: &str = concat!("tunefeed-ingest/", env!("CARGO_PKG_VERSION"));

/// Appended to search queries that carry no regional marker
const QUERY_ENHANCEMENT: &str = " vietnamese vpop nhac viet";

/// Feed client errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Feed API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Catalog feed HTTP client
pub struct FeedClient {
    http_client: reqwest::Client,
    base_url: String,
    search_limit: u32,
}

impl FeedClient {
    pub fn new(base_url: &str, search_limit: u32, timeout: Duration) -> Result<Self, FeedError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            search_limit,
        })
    }

    /// Tracks currently on the chart
    pub async fn chart(&self) -> Result<Vec<TrackMetadata>, FeedError> {
        let url = format!("{}/chart/0/tracks", self.base_url);
        let page = self.get_page(&url, &[]).await?;
        Ok(normalize_page(page))
    }

    /// Search tracks, steering plain queries toward regional results
    pub async fn search(
        &self,
        query: &str,
        classifier: &RegionalClassifier,
    ) -> Result<Vec<TrackMetadata>, FeedError> {
        let query = enhance_query(query, classifier)?;
        let url = format!("{}/search", self.base_url);
        let limit = self.search_limit.to_string();

        let page = self
            .get_page(&url, &[("q", query.as_str()), ("limit", limit.as_str())])
            .await?;
        Ok(normalize_page(page))
    }

    async fn get_page(&self, url: &str, query: &[(&str, &str)]) -> Result<FeedPage, FeedError> {
        tracing::debug!(url = %url, "Querying catalog feed");

        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FeedError::ApiError(status.as_u16(), error_text));
        }

        response
            .json::<FeedPage>()
            .await
            .map_err(|e| FeedError::ParseError(e.to_string()))
    }
}

/// Lower-case the query and append regional terms when it has none
pub fn enhance_query(query: &str, classifier: &RegionalClassifier) -> Result<String, FeedError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(FeedError::InvalidQuery("search query is empty".to_string()));
    }

    let lower = trimmed.to_lowercase();
    if classifier.has_regional_marker(&lower) {
        Ok(lower)
    } else {
        Ok(format!("{}{}", lower, QUERY_ENHANCEMENT))
    }
}

fn normalize_page(page: FeedPage) -> Vec<TrackMetadata> {
    let total = page.data.len();
    let tracks: Vec<TrackMetadata> = page
        .data
        .iter()
        .filter_map(|item| {
            let track = TrackMetadata::from_feed_item(item);
            if track.is_none() {
                tracing::debug!(id = ?item.id, "Dropping incomplete feed item");
            }
            track
        })
        .collect();

    tracing::info!(total, usable = tracks.len(), "Received feed page");
    tracks
}
