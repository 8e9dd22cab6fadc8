//! Service modules for the ingest pipeline
//!
//! Data flow: feed page → classifier → fetcher → validator → (on failure)
//! synthesizer → storage → orchestrator → catalog store.

pub mod content_validator;
pub mod feed_client;
pub mod import_orchestrator;
pub mod regional_classifier;
pub mod storage_manager;
pub mod track_fetcher;
pub mod waveform_synthesizer;

pub use content_validator::ContentClass;
pub use feed_client::{FeedClient, FeedError};
pub use import_orchestrator::{ImportOrchestrator, ImportReport, TrackOutcome, TrackState};
pub use regional_classifier::{ClassificationResult, ClassifierRules, RegionalClassifier, Signal};
pub use storage_manager::{StorageError, StorageManager};
pub use track_fetcher::{FailureCategory, FetchFailure, FetcherConfig, ProbeReport, TrackFetcher};
pub use waveform_synthesizer::{SynthesisError, SynthesisSpec, Waveform};
