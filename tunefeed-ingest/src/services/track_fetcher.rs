//! Preview audio fetcher
//!
//! Downloads the audio referenced by a track's preview URL, validates the
//! bytes and persists accepted audio through the [`StorageManager`].
//!
//! **Failure model:** every failure is reported as a [`FetchFailure`] carrying a
//! [`FailureCategory`]; the caller decides whether to fall back to synthesis.

use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::artifact::AudioArtifact;
use crate::services::content_validator::{self, ContentClass};
use crate::services::storage_manager::{fetched_file_name, StorageManager};
use crate::utils::backoff::{retry_with_delay, RetryPolicy};

const USER_AGENT: &str = concat!("tunefeed-ingest/", env!("CARGO_PKG_VERSION"));

/// Number of leading bytes shown by the download probe
const PROBE_PREVIEW_BYTES: usize = 20;

const MAX_REDIRECTS: usize = 10;

/// Default cap on a downloaded body
pub const DEFAULT_MAX_BYTES: usize = 20 * 1024 * 1024;

/// Why real audio could not be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    NetworkUnreachable,
    Timeout,
    InvalidContent,
    Disallowed,
    SynthesisFailure,
    StorageFailure,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::NetworkUnreachable => "network_unreachable",
            FailureCategory::Timeout => "timeout",
            FailureCategory::InvalidContent => "invalid_content",
            FailureCategory::Disallowed => "disallowed",
            FailureCategory::SynthesisFailure => "synthesis_failure",
            FailureCategory::StorageFailure => "storage_failure",
        }
    }

    /// Transient categories worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureCategory::NetworkUnreachable | FailureCategory::Timeout
        )
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorized fetch failure
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{category}: {message}")]
pub struct FetchFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl FetchFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        let category = if err.is_redirect() {
            FailureCategory::Disallowed
        } else if err.is_timeout() {
            FailureCategory::Timeout
        } else {
            FailureCategory::NetworkUnreachable
        };
        Self::new(category, err.to_string())
    }
}

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Total download attempts per URL
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Hosts whose URLs are never fetched (suffix match), redirects included
    pub deny_hosts: Vec<String>,
    /// Largest accepted response body
    pub max_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
            deny_hosts: vec!["dzcdn.net".to_string()],
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// Outcome of a diagnostic download
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ContentClass>,
    /// Sniffed from the payload, not taken from the response headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeReport {
    fn failed(url: &str, status: Option<u16>, error: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            status,
            data_length: None,
            classification: None,
            content_type: None,
            first_bytes: None,
            error: Some(error),
        }
    }
}

/// Preview audio fetcher
pub struct TrackFetcher {
    http_client: reqwest::Client,
    /// Follows redirects anywhere; used only by the probe
    probe_client: reqwest::Client,
    storage: Arc<StorageManager>,
    policy: RetryPolicy,
    deny_hosts: Vec<String>,
    max_bytes: usize,
    cancel: CancellationToken,
}

impl TrackFetcher {
    pub fn new(storage: Arc<StorageManager>, config: FetcherConfig) -> Result<Self, FetchFailure> {
        let deny_hosts: Vec<String> = config
            .deny_hosts
            .into_iter()
            .map(|h| h.trim().trim_start_matches('.').to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .redirect(redirect_policy(deny_hosts.clone()))
            .build()
            .map_err(|e| FetchFailure::new(FailureCategory::NetworkUnreachable, e.to_string()))?;

        let probe_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchFailure::new(FailureCategory::NetworkUnreachable, e.to_string()))?;

        Ok(Self {
            http_client,
            probe_client,
            storage,
            policy: RetryPolicy::new(config.max_attempts, config.retry_delay),
            deny_hosts,
            max_bytes: config.max_bytes,
            cancel: CancellationToken::new(),
        })
    }

    /// Share a cancellation token (e.g. the server's shutdown token)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Parse a preview URL and apply the allow rules
    ///
    /// Blank, non-http(s) and deny-listed URLs are `Disallowed`.
    pub fn check_url(&self, url: &str) -> Result<Url, FetchFailure> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchFailure::new(FailureCategory::Disallowed, "empty preview URL"));
        }

        let parsed = Url::parse(url).map_err(|e| {
            FetchFailure::new(FailureCategory::Disallowed, format!("malformed URL: {}", e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchFailure::new(
                FailureCategory::Disallowed,
                format!("unsupported scheme: {}", parsed.scheme()),
            ));
        }

        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        if host.is_empty() {
            return Err(FetchFailure::new(FailureCategory::Disallowed, "URL has no host"));
        }
        if self.is_denied_host(&host) {
            return Err(FetchFailure::new(
                FailureCategory::Disallowed,
                format!("host is deny-listed: {}", host),
            ));
        }

        Ok(parsed)
    }

    /// Whether a URL would be refused without a network call
    pub fn is_disallowed(&self, url: &str) -> bool {
        self.check_url(url).is_err()
    }

    fn is_denied_host(&self, host: &str) -> bool {
        host_is_denied(&self.deny_hosts, host)
    }

    /// Obtain real audio for a track
    ///
    /// **Algorithm:**
    /// 1. Refuse disallowed URLs (no network call)
    /// 2. Return a previously fetched artifact for this id, if any
    /// 3. Download with retries on transport errors and non-success status
    /// 4. Validate the bytes; anything but real audio is `InvalidContent`
    /// 5. Persist as `audio_<id>_<millis><ext>`
    pub async fn fetch(&self, url: &str, external_id: &str) -> Result<AudioArtifact, FetchFailure> {
        self.fetch_with_status(url, external_id)
            .await
            .map(|(artifact, _)| artifact)
    }

    /// Like [`fetch`](Self::fetch), also reporting whether a download happened
    pub async fn fetch_with_status(
        &self,
        url: &str,
        external_id: &str,
    ) -> Result<(AudioArtifact, bool), FetchFailure> {
        let parsed = self.check_url(url)?;

        match self.storage.find_fetched(external_id).await {
            Ok(Some(cached)) => {
                debug!(external_id = %external_id, file_name = %cached.file_name, "Using cached download");
                return Ok((cached, false));
            }
            Ok(None) => {}
            Err(e) => warn!(external_id = %external_id, error = %e, "Fetched-audio cache lookup failed"),
        }

        let bytes = retry_with_delay(
            "preview download",
            self.policy,
            &self.cancel,
            |e: &FetchFailure| e.category.is_transient(),
            |attempt| {
                let parsed = parsed.clone();
                async move {
                    debug!(external_id = %external_id, attempt, "Downloading preview");
                    self.download_once(parsed).await
                }
            },
        )
        .await?;

        let class = content_validator::classify(&bytes);
        if !class.is_real_audio() {
            warn!(
                external_id = %external_id,
                bytes = bytes.len(),
                classification = ?class,
                "Downloaded content is not audio"
            );
            return Err(FetchFailure::new(
                FailureCategory::InvalidContent,
                format!("payload of {} bytes classified as {:?}", bytes.len(), class),
            ));
        }

        let file_name = fetched_file_name(external_id, url, tunefeed_common::time::unix_millis());
        let artifact = self
            .storage
            .write(&file_name, &bytes)
            .await
            .map_err(|e| FetchFailure::new(FailureCategory::StorageFailure, e.to_string()))?;

        info!(
            external_id = %external_id,
            file_name = %artifact.file_name,
            bytes = artifact.byte_size,
            "Stored downloaded audio"
        );
        Ok((artifact, true))
    }

    async fn download_once(&self, url: Url) -> Result<Vec<u8>, FetchFailure> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(FetchFailure::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::new(
                FailureCategory::NetworkUnreachable,
                format!("HTTP status {}", status.as_u16()),
            ));
        }

        read_capped(response, self.max_bytes).await
    }

    /// Single diagnostic download, nothing persisted
    ///
    /// The deny list is not applied so that refused hosts can be inspected.
    pub async fn probe(&self, url: &str) -> ProbeReport {
        let parsed = match Url::parse(url.trim()) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            Ok(u) => return ProbeReport::failed(url, None, format!("unsupported scheme: {}", u.scheme())),
            Err(e) => return ProbeReport::failed(url, None, format!("malformed URL: {}", e)),
        };

        let response = match self.probe_client.get(parsed).send().await {
            Ok(r) => r,
            Err(e) => return ProbeReport::failed(url, None, FetchFailure::from_transport(e).to_string()),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return ProbeReport::failed(url, Some(status), format!("HTTP status {}", status));
        }

        match read_capped(response, self.max_bytes).await {
            Ok(bytes) => ProbeReport {
                url: url.to_string(),
                success: true,
                status: Some(status),
                data_length: Some(bytes.len()),
                classification: Some(content_validator::classify(&bytes)),
                content_type: Some(content_validator::sniff_content_type(&bytes).to_string()),
                first_bytes: Some(content_validator::hex_preview(&bytes, PROBE_PREVIEW_BYTES)),
                error: None,
            },
            Err(e) => ProbeReport::failed(url, Some(status), e.to_string()),
        }
    }
}

/// Suffix match on whole labels: `dzcdn.net` denies `cdn.dzcdn.net`, not `notdzcdn.net`
fn host_is_denied(deny_hosts: &[String], host: &str) -> bool {
    deny_hosts.iter().any(|denied| {
        host == denied
            || host
                .strip_suffix(denied.as_str())
                .map_or(false, |rest| rest.ends_with('.'))
    })
}

/// Redirect policy that re-applies the deny list on every hop
fn redirect_policy(deny_hosts: Vec<String>) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        let host = attempt.url().host_str().map(str::to_lowercase);
        match host {
            Some(host) if host_is_denied(&deny_hosts, &host) => {
                attempt.error(format!("redirect to deny-listed host: {}", host))
            }
            _ if attempt.previous().len() >= MAX_REDIRECTS => attempt.error("too many redirects"),
            _ => attempt.follow(),
        }
    })
}

/// Read a response body, refusing anything larger than `max_bytes`
async fn read_capped(mut response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>, FetchFailure> {
    let too_large = |len: u64| {
        FetchFailure::new(
            FailureCategory::InvalidContent,
            format!("response body of {} bytes exceeds the {} byte limit", len, max_bytes),
        )
    };

    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(too_large(len));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(FetchFailure::from_transport)? {
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large((body.len() + chunk.len()) as u64));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
