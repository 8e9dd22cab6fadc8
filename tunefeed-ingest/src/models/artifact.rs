//! Stored audio artifacts and storage statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name prefix of artifacts obtained from a remote URL
pub const FETCHED_PREFIX: &str = "audio_";
/// File name prefix of per-track synthesized fallbacks
pub const SYNTHESIZED_PREFIX: &str = "music_";
/// File name prefix of generic synthesized fallbacks
pub const FALLBACK_PREFIX: &str = "fallback_";

/// How an artifact came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Downloaded from the track's preview URL
    Fetched,
    /// Generated locally by the waveform synthesizer
    Synthesized,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Fetched => "fetched",
            ArtifactKind::Synthesized => "synthesized",
        }
    }

    /// Derive the kind from a storage file name
    ///
    /// The storage directory is its own index: the naming scheme encodes the kind.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        if file_name.starts_with(FETCHED_PREFIX) {
            Some(ArtifactKind::Fetched)
        } else if file_name.starts_with(SYNTHESIZED_PREFIX) || file_name.starts_with(FALLBACK_PREFIX)
        {
            Some(ArtifactKind::Synthesized)
        } else {
            None
        }
    }
}

/// A stored audio byte stream plus its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioArtifact {
    /// Deterministic file name (also the public identifier)
    pub file_name: String,
    /// Absolute or storage-relative path on disk
    pub storage_path: PathBuf,
    pub byte_size: u64,
    pub kind: ArtifactKind,
    pub content_type: String,
    /// File modification time at the moment the artifact was observed
    pub created_at: DateTime<Utc>,
}

impl AudioArtifact {
    /// Public audio reference, e.g. `/audio/music_x.wav`
    pub fn audio_ref(&self, public_prefix: &str) -> String {
        audio_ref(public_prefix, &self.file_name)
    }
}

/// Join a public URL prefix and a file name with exactly one slash
pub fn audio_ref(public_prefix: &str, file_name: &str) -> String {
    format!("{}/{}", public_prefix.trim_end_matches('/'), file_name)
}

/// Aggregate, freshly derived view of the storage directory
#[derive(Debug, Clone, Serialize)]
pub struct StorageSnapshot {
    pub storage_path: PathBuf,
    pub file_count: u64,
    pub total_bytes: u64,
    /// Synthesized per-track fallbacks; always `<= file_count`
    pub fallback_count: u64,
    pub as_of: DateTime<Utc>,
}

impl StorageSnapshot {
    /// Human-readable total size in megabytes
    pub fn formatted_size(&self) -> String {
        format!("{:.2} MB", self.total_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Content type derived purely from the file extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
