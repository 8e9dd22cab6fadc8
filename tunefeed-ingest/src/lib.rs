//! tunefeed-ingest library interface
//!
//! Exposes the pipeline services and the HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, IngestError};

use anyhow::Context;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tunefeed_common::events::EventBus;

use crate::config::IngestConfig;
use crate::models::CatalogStore;
use crate::services::{FeedClient, ImportOrchestrator, RegionalClassifier, StorageManager, TrackFetcher};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageManager>,
    pub fetcher: Arc<TrackFetcher>,
    pub orchestrator: Arc<ImportOrchestrator>,
    pub feed: Arc<FeedClient>,
    pub catalog: Arc<dyn CatalogStore>,
    /// Ingest progress events
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the pipeline from configuration
    ///
    /// `shutdown` cancels in-flight retry delays.
    pub fn from_config(
        config: &IngestConfig,
        catalog: Arc<dyn CatalogStore>,
        event_bus: EventBus,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let storage = Arc::new(
            StorageManager::new(&config.storage.path, config.storage.public_prefix.clone())
                .with_generic_fallback_seconds(config.storage.generic_fallback_seconds),
        );

        let fetcher = Arc::new(
            TrackFetcher::new(storage.clone(), config.fetcher_config())
                .context("Failed to create track fetcher")?
                .with_cancellation(shutdown),
        );

        let feed = Arc::new(
            FeedClient::new(
                &config.feed.base_url,
                config.feed.search_limit,
                Duration::from_secs(config.feed.timeout_secs),
            )
            .context("Failed to create feed client")?,
        );

        let orchestrator = Arc::new(
            ImportOrchestrator::new(
                RegionalClassifier::new(config.classifier.clone()),
                fetcher.clone(),
                storage.clone(),
                catalog.clone(),
                event_bus.clone(),
            )
            .with_fallback_seconds(config.storage.fallback_seconds)
            .with_download_enabled(config.fetch.enabled),
        );

        Ok(Self {
            storage,
            fetcher,
            orchestrator,
            feed,
            catalog,
            event_bus,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let public_prefix = state.storage.public_prefix().to_string();

    Router::new()
        .merge(api::audio_routes(&public_prefix))
        .merge(api::storage_routes())
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
