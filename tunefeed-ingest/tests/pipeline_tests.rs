//! Import orchestrator integration tests

mod helpers;

use helpers::{test_pipeline, StubServer};
use std::time::{Duration, SystemTime};
use tunefeed_common::events::IngestEvent;
use tunefeed_ingest::models::{ArtifactKind, CatalogStore, TrackMetadata};
use tunefeed_ingest::services::import_orchestrator::DEFAULT_SONG_IMAGE;
use tunefeed_ingest::services::regional_classifier::Signal;
use tunefeed_ingest::services::storage_manager::GENERIC_FALLBACK_FILE;
use tunefeed_ingest::services::{FailureCategory, RegionalClassifier, TrackState};
use uuid::Uuid;

fn mua_soobin() -> TrackMetadata {
    TrackMetadata::new("3135556", "Mưa", "Soobin")
        .with_preview_url("https://cdns-preview-d.dzcdn.net/stream/c-3135556.mp3")
        .with_album("Mưa Single")
        .with_duration(215)
}

#[tokio::test]
async fn test_deny_listed_preview_falls_back_to_melody() {
    // Given: an eligible track whose preview is on a deny-listed host
    let pipeline = test_pipeline(true);
    let mut events = pipeline.event_bus.subscribe();
    let track = mua_soobin();

    // When: processed
    let outcome = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();

    // Then: classified eligible on two signals
    assert!(outcome.classification.is_eligible);
    assert_eq!(outcome.classification.matched_signal_count, 2);
    assert_eq!(
        outcome.classification.reasons,
        vec![Signal::KnownArtist, Signal::Diacritics]
    );

    // And: the fetch is disallowed and a synthesized melody is used
    assert_eq!(
        outcome.fetch_failure.as_ref().map(|f| f.category),
        Some(FailureCategory::Disallowed)
    );
    let artifact = outcome.artifact.as_ref().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Synthesized);
    assert!(artifact.file_name.starts_with("music_"));
    assert_eq!(
        outcome.audio_ref.as_deref(),
        Some(format!("/audio/{}", artifact.file_name).as_str())
    );
    assert!(outcome.degraded.is_none());

    // And: the state machine went through the failure branch
    assert_eq!(
        outcome.states,
        vec![
            TrackState::Classified { eligible: true },
            TrackState::Fetching,
            TrackState::FetchFailed {
                category: FailureCategory::Disallowed
            },
            TrackState::Finalizing,
            TrackState::Done,
        ]
    );

    // And: classification, storage and fallback events were broadcast
    let mut saw_fallback = false;
    while let Ok(event) = events.try_recv() {
        if let IngestEvent::FallbackUsed { category, .. } = event {
            assert_eq!(category, "disallowed");
            saw_fallback = true;
        }
    }
    assert!(saw_fallback);
}

#[tokio::test]
async fn test_reprocessing_with_download_disabled_is_idempotent() {
    // Given: downloads disabled
    let pipeline = test_pipeline(false);
    let track = TrackMetadata::new("55", "Nơi Này Có Anh", "Sơn Tùng MTP")
        .with_preview_url("https://cdn.example.com/55.mp3");

    // When: the same track is processed twice
    let first = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();
    let first_path = first.artifact.as_ref().unwrap().storage_path.clone();
    let first_bytes = std::fs::read(&first_path).unwrap();

    let second = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();

    // Then: exactly one artifact exists and both runs return the same path
    assert_eq!(second.artifact.as_ref().unwrap().storage_path, first_path);
    assert_eq!(std::fs::read(&first_path).unwrap(), first_bytes);
    assert_eq!(first.audio_ref, second.audio_ref);

    let artifacts = pipeline.storage.list_artifacts().await.unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(
        first.fetch_failure.as_ref().map(|f| f.category),
        Some(FailureCategory::Disallowed)
    );
}

#[tokio::test]
async fn test_rejected_track_is_not_fetched() {
    let server = StubServer::start().await;
    let pipeline = test_pipeline(true);
    let track = TrackMetadata::new("9", "Hello", "Adele")
        .with_preview_url(server.url("/preview/frame.mp3"));

    let outcome = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();

    assert!(!outcome.is_eligible());
    assert_eq!(
        outcome.states,
        vec![TrackState::Classified { eligible: false }, TrackState::Done]
    );
    assert!(outcome.audio_ref.is_none());
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_successful_fetch_is_referenced() {
    let server = StubServer::start().await;
    let pipeline = test_pipeline(true);
    let track = TrackMetadata::new("100", "Mưa", "Soobin")
        .with_preview_url(server.url("/preview/frame.mp3"));

    let outcome = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();

    assert_eq!(outcome.final_state(), Some(TrackState::Done));
    assert!(outcome.states.contains(&TrackState::FetchedOk));
    assert!(!outcome.used_fallback());
    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Fetched);
    assert!(artifact.file_name.starts_with("audio_100_"));
}

#[tokio::test]
async fn test_invalid_content_falls_back() {
    let server = StubServer::start().await;
    let pipeline = test_pipeline(true);
    let track = TrackMetadata::new("101", "Mưa", "Soobin")
        .with_preview_url(server.url("/preview/page.html"));

    let outcome = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();

    assert_eq!(
        outcome.fetch_failure.map(|f| f.category),
        Some(FailureCategory::InvalidContent)
    );
    assert_eq!(outcome.artifact.unwrap().kind, ArtifactKind::Synthesized);
}

#[tokio::test]
async fn test_snapshot_counts_fetched_and_synthesized() {
    // Given: N = 2 fetched and M = 3 synthesized artifacts
    let server = StubServer::start().await;
    let pipeline = test_pipeline(true);

    for id in ["f1", "f2"] {
        pipeline
            .fetcher
            .fetch(&server.url("/preview/frame.mp3"), id)
            .await
            .unwrap();
    }

    pipeline.orchestrator.set_download_enabled(false);
    for (id, title) in [("s1", "Mưa"), ("s2", "Mưa Hồng"), ("s3", "Mưa Tháng Sáu")] {
        let track = TrackMetadata::new(id, title, "Soobin");
        pipeline
            .orchestrator
            .process_track(Uuid::new_v4(), &track)
            .await
            .unwrap();
    }

    // When: a snapshot is taken
    let snapshot = pipeline.storage.snapshot().await.unwrap();

    // Then: file_count = N + M and fallback_count = M
    assert_eq!(snapshot.file_count, 5);
    assert_eq!(snapshot.fallback_count, 3);
    assert!(snapshot.fallback_count <= snapshot.file_count);

    let listed: u64 = pipeline
        .storage
        .list_artifacts()
        .await
        .unwrap()
        .iter()
        .map(|a| a.byte_size)
        .sum();
    assert_eq!(snapshot.total_bytes, listed);
}

#[tokio::test]
async fn test_cleanup_removes_only_old_synthesized_files() {
    let server = StubServer::start().await;
    let pipeline = test_pipeline(false);

    let track = TrackMetadata::new("old", "Mưa", "Soobin");
    let outcome = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();
    let old_path = outcome.artifact.unwrap().storage_path;

    pipeline.orchestrator.set_download_enabled(true);
    let fetched = pipeline
        .fetcher
        .fetch(&server.url("/preview/frame.mp3"), "kept")
        .await
        .unwrap();
    pipeline.storage.ensure_generic_fallback().await.unwrap();

    // Age the synthesized file and the fetched file by 30 days
    let month_ago = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
    for path in [&old_path, &fetched.storage_path] {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(month_ago)
            .unwrap();
    }

    let deleted = pipeline.storage.cleanup_older_than(7).await.unwrap();

    assert_eq!(deleted, 1);
    assert!(!old_path.exists());
    assert!(fetched.storage_path.exists());
    assert!(pipeline.storage.exists(GENERIC_FALLBACK_FILE).await);
}

#[tokio::test]
async fn test_deleted_fallback_is_regenerated() {
    let pipeline = test_pipeline(false);
    let track = mua_soobin();

    let first = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();
    let name = first.artifact.unwrap().file_name;
    assert!(pipeline.storage.delete(&name).await.unwrap());

    let second = pipeline
        .orchestrator
        .process_track(Uuid::new_v4(), &track)
        .await
        .unwrap();
    assert_eq!(second.artifact.unwrap().file_name, name);
    assert!(pipeline.storage.exists(&name).await);
}

#[tokio::test]
async fn test_import_page_saves_songs_and_skips_duplicates() {
    let pipeline = test_pipeline(false);
    let tracks = vec![
        mua_soobin().with_country_hint("VN"),
        TrackMetadata::new("2", "Hello", "Adele"),
        TrackMetadata::new("3", "Nơi Này Có Anh", "Sơn Tùng MTP"),
    ];

    let report = pipeline.orchestrator.import_page(&tracks).await;

    assert_eq!(report.total, 3);
    assert_eq!(report.eligible, 2);
    assert_eq!(report.imported, 2);
    assert_eq!(report.fallbacks, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped_duplicates, 0);

    let songs = pipeline.catalog.songs();
    assert_eq!(songs.len(), 2);
    let mua = &songs[0];
    assert_eq!(mua.title, "Mưa");
    assert_eq!(mua.genre.name, "Nhạc Việt");
    assert_eq!(mua.duration_seconds, Some(215));
    assert_eq!(mua.image_url, DEFAULT_SONG_IMAGE);
    assert_eq!(mua.artist.country.as_deref(), Some("VN"));
    assert_eq!(mua.album.as_ref().map(|a| a.title.as_str()), Some("Mưa Single"));
    assert_eq!(mua.audio_kind, ArtifactKind::Synthesized);
    assert!(mua.created_at.is_some());
    assert!(mua.artist.created_at.is_some());
    assert!(mua.genre.created_at.is_some());
    assert!(mua.album.as_ref().and_then(|a| a.created_at).is_some());

    // A second run finds both songs already in the catalog
    let again = pipeline.orchestrator.import_page(&tracks).await;
    assert_eq!(again.skipped_duplicates, 2);
    assert_eq!(again.imported, 0);
    assert_eq!(pipeline.catalog.songs().len(), 2);
}

#[tokio::test]
async fn test_import_completed_event() {
    let pipeline = test_pipeline(false);
    let mut events = pipeline.event_bus.subscribe();

    let report = pipeline.orchestrator.import_page(&[mua_soobin()]).await;

    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        if let IngestEvent::ImportCompleted { session_id, imported, .. } = event {
            completed = Some((session_id, imported));
        }
    }
    assert_eq!(completed, Some((report.session_id, 1)));
}

#[tokio::test]
async fn test_storage_failure_degrades_to_generic_then_propagates() {
    // Given: the storage root is a regular file, so nothing can be written
    let dir = tempfile::TempDir::new().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").unwrap();

    let storage = std::sync::Arc::new(
        tunefeed_ingest::services::StorageManager::new(&blocked, "/audio")
            .with_generic_fallback_seconds(1),
    );
    let fetcher = std::sync::Arc::new(
        tunefeed_ingest::services::TrackFetcher::new(storage.clone(), helpers::fast_fetcher_config())
            .unwrap(),
    );
    let orchestrator = tunefeed_ingest::services::ImportOrchestrator::new(
        RegionalClassifier::default(),
        fetcher,
        storage,
        std::sync::Arc::new(tunefeed_ingest::models::MemoryCatalog::new()),
        tunefeed_common::events::EventBus::new(8),
    )
    .with_fallback_seconds(1)
    .with_download_enabled(false);

    // When: a track needs a fallback
    let result = orchestrator.process_track(Uuid::new_v4(), &mua_soobin()).await;

    // Then: the generic fallback also fails and the storage failure escapes
    assert!(matches!(
        result,
        Err(tunefeed_ingest::IngestError::StorageFailure(_))
    ));

    // And: at page level the failure is counted, not fatal
    let report = orchestrator.import_page(&[mua_soobin()]).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn test_classifier_monotonic_in_signals() {
    let classifier = RegionalClassifier::default();

    // Each step adds one more signal; score never decreases
    let steps = [
        TrackMetadata::new("1", "Hello", "Adele"),
        TrackMetadata::new("1", "Hello", "Adele").with_country_hint("VN"),
        TrackMetadata::new("1", "Hello vpop", "Adele").with_country_hint("VN"),
        TrackMetadata::new("1", "Hellô vpop", "Soobin").with_country_hint("VN"),
    ];

    let mut last_score = -1.0;
    let mut became_eligible = false;
    for track in &steps {
        let result = classifier.classify(track);
        assert!(result.score >= last_score);
        assert_eq!(result, classifier.classify(track), "classification is deterministic");
        if became_eligible {
            assert!(result.is_eligible, "adding signals never revokes eligibility");
        }
        became_eligible |= result.is_eligible;
        last_score = result.score;
    }
    assert!(became_eligible);
}
