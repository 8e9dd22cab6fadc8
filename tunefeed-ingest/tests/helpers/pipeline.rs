//! Pipeline fixtures backed by a temporary storage directory

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tunefeed_common::events::EventBus;
use tunefeed_ingest::models::MemoryCatalog;
use tunefeed_ingest::services::{
    FetcherConfig, ImportOrchestrator, RegionalClassifier, StorageManager, TrackFetcher,
};

/// Fetcher settings with short delays so retry tests stay fast
pub fn fast_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        max_attempts: 2,
        retry_delay: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
        ..FetcherConfig::default()
    }
}

/// Fully wired pipeline; keep the struct alive for the TempDir's lifetime
pub struct TestPipeline {
    pub dir: TempDir,
    pub storage: Arc<StorageManager>,
    pub fetcher: Arc<TrackFetcher>,
    pub catalog: Arc<MemoryCatalog>,
    pub event_bus: EventBus,
    pub orchestrator: ImportOrchestrator,
}

/// Build a pipeline with short synthesized clips
pub fn test_pipeline(download_enabled: bool) -> TestPipeline {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(
        StorageManager::new(dir.path().join("audio"), "/audio").with_generic_fallback_seconds(1),
    );
    let fetcher = Arc::new(TrackFetcher::new(storage.clone(), fast_fetcher_config()).unwrap());
    let catalog = Arc::new(MemoryCatalog::new());
    let event_bus = EventBus::new(64);

    let orchestrator = ImportOrchestrator::new(
        RegionalClassifier::default(),
        fetcher.clone(),
        storage.clone(),
        catalog.clone(),
        event_bus.clone(),
    )
    .with_fallback_seconds(2)
    .with_download_enabled(download_enabled);

    TestPipeline {
        dir,
        storage,
        fetcher,
        catalog,
        event_bus,
        orchestrator,
    }
}
