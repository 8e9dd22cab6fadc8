//! Per-track import workflow
//!
//! Drives each track through classification, audio acquisition and fallback
//! synthesis, and hands accepted tracks to the catalog store.
//!
//! **State machine (per track):**
//! ```text
//! Classified(rejected) ──────────────────────────────────────────▶ Done
//! Classified(eligible) ─▶ Fetching ─▶ FetchedOk   ─▶ Finalizing ─▶ Done
//!                                  └▶ FetchFailed ─▶ Finalizing ─▶ Done
//! ```
//!
//! Every failure up to synthesis is absorbed into a fallback artifact. Only a
//! failure to produce the shared generic fallback escapes as an error.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tunefeed_common::events::{EventBus, IngestEvent};
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::artifact::{ArtifactKind, AudioArtifact};
use crate::models::catalog::{AlbumRecord, ArtistRecord, CatalogStore, GenreRecord, SongRecord};
use crate::models::track::TrackMetadata;
use crate::services::content_validator;
use crate::services::regional_classifier::{ClassificationResult, RegionalClassifier};
use crate::services::storage_manager::{synthesized_file_name, StorageManager};
use crate::services::track_fetcher::{FailureCategory, FetchFailure, TrackFetcher};
use crate::services::waveform_synthesizer::{synthesize, SynthesisSpec};

/// Cover image used when the feed has none
pub const DEFAULT_SONG_IMAGE: &str = "/images/default-song.png";

/// Per-track workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackState {
    Classified { eligible: bool },
    Fetching,
    FetchedOk,
    FetchFailed { category: FailureCategory },
    Finalizing,
    Done,
}

/// Result of processing one track
#[derive(Debug, Clone, Serialize)]
pub struct TrackOutcome {
    pub external_id: String,
    pub classification: ClassificationResult,
    /// States visited, in order
    pub states: Vec<TrackState>,
    /// Artifact backing the audio reference (absent for rejected tracks)
    pub artifact: Option<AudioArtifact>,
    /// Public audio reference handed to the catalog
    pub audio_ref: Option<String>,
    /// Why real audio was not used
    pub fetch_failure: Option<FetchFailure>,
    /// Set when the per-track fallback was replaced by the generic one
    pub degraded: Option<FailureCategory>,
}

impl TrackOutcome {
    pub fn is_eligible(&self) -> bool {
        self.classification.is_eligible
    }

    pub fn used_fallback(&self) -> bool {
        self.fetch_failure.is_some()
    }

    pub fn final_state(&self) -> Option<TrackState> {
        self.states.last().copied()
    }
}

/// Result of importing one feed page
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub session_id: Uuid,
    pub total: usize,
    pub eligible: usize,
    pub skipped_duplicates: usize,
    pub imported: usize,
    pub fallbacks: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub songs: Vec<SongRecord>,
}

/// Import workflow coordinator
pub struct ImportOrchestrator {
    classifier: RegionalClassifier,
    fetcher: Arc<TrackFetcher>,
    storage: Arc<StorageManager>,
    catalog: Arc<dyn CatalogStore>,
    event_bus: EventBus,
    download_enabled: AtomicBool,
    fallback_seconds: u32,
}

impl ImportOrchestrator {
    pub fn new(
        classifier: RegionalClassifier,
        fetcher: Arc<TrackFetcher>,
        storage: Arc<StorageManager>,
        catalog: Arc<dyn CatalogStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            classifier,
            fetcher,
            storage,
            catalog,
            event_bus,
            download_enabled: AtomicBool::new(true),
            fallback_seconds: 30,
        }
    }

    /// Duration of per-track synthesized fallbacks
    pub fn with_fallback_seconds(mut self, seconds: u32) -> Self {
        self.fallback_seconds = seconds;
        self
    }

    pub fn with_download_enabled(self, enabled: bool) -> Self {
        self.download_enabled.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn classifier(&self) -> &RegionalClassifier {
        &self.classifier
    }

    pub fn download_enabled(&self) -> bool {
        self.download_enabled.load(Ordering::SeqCst)
    }

    /// Runtime toggle for preview downloads
    pub fn set_download_enabled(&self, enabled: bool) {
        let previous = self.download_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "Audio download toggled");
        }
    }

    /// Drive one track through the workflow
    pub async fn process_track(
        &self,
        session_id: Uuid,
        track: &TrackMetadata,
    ) -> Result<TrackOutcome, IngestError> {
        let classification = self.classifier.classify(track);
        self.event_bus.emit_lossy(IngestEvent::TrackClassified {
            session_id,
            external_id: track.external_id.clone(),
            eligible: classification.is_eligible,
            reasons: classification.reason_names(),
            timestamp: tunefeed_common::time::now(),
        });

        let mut outcome = TrackOutcome {
            external_id: track.external_id.clone(),
            states: vec![TrackState::Classified {
                eligible: classification.is_eligible,
            }],
            classification,
            artifact: None,
            audio_ref: None,
            fetch_failure: None,
            degraded: None,
        };

        if !outcome.is_eligible() {
            debug!(external_id = %track.external_id, title = %track.title, "Track rejected by classifier");
            outcome.states.push(TrackState::Done);
            return Ok(outcome);
        }

        outcome.states.push(TrackState::Fetching);
        let fetched = self.acquire_real_audio(track).await;

        let artifact = match fetched {
            Ok((artifact, created)) => {
                outcome.states.push(TrackState::FetchedOk);
                outcome.states.push(TrackState::Finalizing);
                self.emit_stored(session_id, track, &artifact, created);
                artifact
            }
            Err(failure) => {
                warn!(
                    external_id = %track.external_id,
                    category = %failure.category,
                    reason = %failure.message,
                    "Real audio unavailable, using fallback"
                );
                outcome.states.push(TrackState::FetchFailed {
                    category: failure.category,
                });
                outcome.states.push(TrackState::Finalizing);

                let (artifact, degraded) = self.fallback_artifact(session_id, track).await?;
                outcome.degraded = degraded;

                self.event_bus.emit_lossy(IngestEvent::FallbackUsed {
                    session_id,
                    external_id: track.external_id.clone(),
                    category: failure.category.to_string(),
                    audio_ref: artifact.audio_ref(self.storage.public_prefix()),
                    timestamp: tunefeed_common::time::now(),
                });
                outcome.fetch_failure = Some(failure);
                artifact
            }
        };

        outcome.audio_ref = Some(artifact.audio_ref(self.storage.public_prefix()));
        outcome.artifact = Some(artifact);
        outcome.states.push(TrackState::Done);
        Ok(outcome)
    }

    async fn acquire_real_audio(
        &self,
        track: &TrackMetadata,
    ) -> Result<(AudioArtifact, bool), FetchFailure> {
        if !self.download_enabled() {
            return Err(FetchFailure::new(
                FailureCategory::Disallowed,
                "audio download is disabled",
            ));
        }

        let url = track.preview_url.as_deref().unwrap_or_default();
        self.fetcher.fetch_with_status(url, &track.external_id).await
    }

    /// Per-track melody, or the generic fallback when that cannot be used
    ///
    /// Returns the artifact and, when degraded to the generic fallback, the
    /// category of the problem that forced it.
    async fn fallback_artifact(
        &self,
        session_id: Uuid,
        track: &TrackMetadata,
    ) -> Result<(AudioArtifact, Option<FailureCategory>), IngestError> {
        let file_name = synthesized_file_name(&track.title, &track.artist_name, &track.external_id);

        match self.storage.get(&file_name).await {
            Ok(Some(existing)) => {
                debug!(file_name = %file_name, "Using cached synthesized audio");
                self.emit_stored(session_id, track, &existing, false);
                return Ok((existing, None));
            }
            Ok(None) => {}
            Err(e) => warn!(file_name = %file_name, error = %e, "Synthesized-audio cache lookup failed"),
        }

        let degraded = match self.synthesize_for(track).await {
            Ok(bytes) => match self.storage.write_if_absent(&file_name, &bytes).await {
                Ok((artifact, created)) => {
                    self.emit_stored(session_id, track, &artifact, created);
                    return Ok((artifact, None));
                }
                Err(e) => {
                    warn!(
                        file_name = %file_name,
                        category = %FailureCategory::StorageFailure,
                        error = %e,
                        "Could not store synthesized audio"
                    );
                    FailureCategory::StorageFailure
                }
            },
            Err(category) => category,
        };

        let generic = self.storage.ensure_generic_fallback().await.map_err(|e| {
            error!(
                external_id = %track.external_id,
                category = %FailureCategory::StorageFailure,
                error = %e,
                "Generic fallback unavailable"
            );
            IngestError::StorageFailure(e)
        })?;
        Ok((generic, Some(degraded)))
    }

    async fn synthesize_for(&self, track: &TrackMetadata) -> Result<Vec<u8>, FailureCategory> {
        let spec = SynthesisSpec::track_melody(self.fallback_seconds, &track.title, &track.artist_name);

        let bytes = tokio::task::spawn_blocking(move || synthesize(&spec))
            .await
            .map_err(|e| {
                warn!(
                    external_id = %track.external_id,
                    category = %FailureCategory::SynthesisFailure,
                    error = %e,
                    "Synthesis task failed"
                );
                FailureCategory::SynthesisFailure
            })?;

        if !content_validator::classify(&bytes).is_real_audio() {
            warn!(
                external_id = %track.external_id,
                category = %FailureCategory::SynthesisFailure,
                bytes = bytes.len(),
                "Synthesized output is not playable audio"
            );
            return Err(FailureCategory::SynthesisFailure);
        }

        Ok(bytes)
    }

    fn emit_stored(&self, session_id: Uuid, track: &TrackMetadata, artifact: &AudioArtifact, created: bool) {
        self.event_bus.emit_lossy(IngestEvent::ArtifactStored {
            session_id,
            external_id: track.external_id.clone(),
            file_name: artifact.file_name.clone(),
            kind: artifact.kind.as_str().to_string(),
            created,
            timestamp: tunefeed_common::time::now(),
        });
    }

    /// Import a page of tracks into the catalog
    ///
    /// **Algorithm:**
    /// 1. Skip tracks whose (title, artist) is already in the catalog
    /// 2. Run the per-track workflow
    /// 3. Save every eligible track with an audio reference as a song record
    ///
    /// A failing track is counted and reported; it never aborts the page.
    pub async fn import_page(&self, tracks: &[TrackMetadata]) -> ImportReport {
        let mut report = ImportReport {
            session_id: Uuid::new_v4(),
            total: tracks.len(),
            ..ImportReport::default()
        };

        info!(session_id = %report.session_id, total = tracks.len(), "Starting import");

        for track in tracks {
            if self.catalog.song_exists(&track.title, &track.artist_name) {
                debug!(title = %track.title, artist = %track.artist_name, "Skipping duplicate song");
                report.skipped_duplicates += 1;
                continue;
            }

            let outcome = match self.process_track(report.session_id, track).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(external_id = %track.external_id, error = %e, "Track import failed");
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", track.external_id, e));
                    continue;
                }
            };

            if !outcome.is_eligible() {
                continue;
            }
            report.eligible += 1;

            let Some(song) = self.song_record(track, &outcome) else {
                continue;
            };

            match self.catalog.save_song(song.clone()) {
                Ok(()) => {
                    report.imported += 1;
                    if outcome.used_fallback() {
                        report.fallbacks += 1;
                    }
                    report.songs.push(song);
                }
                Err(e) => {
                    error!(external_id = %track.external_id, error = %e, "Could not save song");
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", track.external_id, e));
                }
            }
        }

        info!(
            session_id = %report.session_id,
            total = report.total,
            eligible = report.eligible,
            imported = report.imported,
            fallbacks = report.fallbacks,
            skipped = report.skipped_duplicates,
            failed = report.failed,
            "Import completed"
        );

        self.event_bus.emit_lossy(IngestEvent::ImportCompleted {
            session_id: report.session_id,
            total: report.total,
            eligible: report.eligible,
            imported: report.imported,
            fallbacks: report.fallbacks,
            timestamp: tunefeed_common::time::now(),
        });

        report
    }

    fn song_record(&self, track: &TrackMetadata, outcome: &TrackOutcome) -> Option<SongRecord> {
        let audio_ref = outcome.audio_ref.clone()?;
        let audio_kind = outcome
            .artifact
            .as_ref()
            .map(|a| a.kind)
            .unwrap_or(ArtifactKind::Synthesized);

        let artist = ArtistRecord {
            name: track.artist_name.clone(),
            country: track.country_hint.clone(),
            created_at: None,
        };
        let album = track.album_title.as_ref().map(|title| AlbumRecord {
            title: title.clone(),
            cover_url: track.cover_url.clone(),
            artist_name: track.artist_name.clone(),
            created_at: None,
        });

        Some(SongRecord {
            id: Uuid::new_v4(),
            external_id: track.external_id.clone(),
            title: track.title.clone(),
            artist,
            album,
            genre: GenreRecord {
                name: self.classifier.rules().genre_name.clone(),
                created_at: None,
            },
            duration_seconds: track.duration_seconds,
            audio_ref,
            audio_kind,
            image_url: track
                .cover_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SONG_IMAGE.to_string()),
            created_at: None,
        })
    }
}
