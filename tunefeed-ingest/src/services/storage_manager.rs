//! Audio storage directory
//!
//! A single flat directory holds every fetched and synthesized artifact. The
//! directory is its own index: file names encode the artifact kind and the
//! track identity, so listings, statistics and cache lookups are derived from
//! the directory contents on every call.
//!
//! Writes land in `<name>.part` and are renamed into place, so readers never
//! observe a partially written artifact. Writes for the same name are
//! serialized by a per-name async mutex.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::models::artifact::{
    content_type_for, ArtifactKind, AudioArtifact, StorageSnapshot, FETCHED_PREFIX,
    SYNTHESIZED_PREFIX,
};
use crate::services::waveform_synthesizer::{synthesize, SynthesisSpec};

/// Marker written when the directory is created
pub const README_FILE: &str = "README.txt";

/// Shared generic fallback, served when nothing track-specific exists
pub const GENERIC_FALLBACK_FILE: &str = "fallback_general.wav";

const PART_SUFFIX: &str = ".part";
const SLUG_MAX_LEN: usize = 48;
const HASH_HEX_LEN: usize = 16;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

const README_TEXT: &str = "\
Audio storage for tunefeed-ingest.

audio_<id>_<millis>.<ext>   downloaded preview audio
music_<slug>_<hash>.wav     per-track synthesized fallback
fallback_general.wav        shared generic fallback

Files are managed by the service; do not edit by hand.
";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Name is empty, contains a path separator, or escapes the directory
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Background task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Manager of the audio storage directory
#[derive(Debug)]
pub struct StorageManager {
    root: PathBuf,
    public_prefix: String,
    generic_fallback_seconds: u32,
    dir_lock: Mutex<()>,
    name_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
            generic_fallback_seconds: 10,
            dir_lock: Mutex::new(()),
            name_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Duration of the shared generic fallback clip
    pub fn with_generic_fallback_seconds(mut self, seconds: u32) -> Self {
        self.generic_fallback_seconds = seconds;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Public audio reference for a stored file
    pub fn audio_ref(&self, file_name: &str) -> String {
        crate::models::artifact::audio_ref(&self.public_prefix, file_name)
    }

    /// Map a file name to its path inside the storage directory
    ///
    /// Rejects anything that could address a file outside the directory or a
    /// hidden file.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        let invalid = file_name.is_empty()
            || file_name.starts_with('.')
            || file_name.contains(['/', '\\', '\0'])
            || file_name.contains("..");
        if invalid {
            return Err(StorageError::InvalidName(file_name.to_string()));
        }
        Ok(self.root.join(file_name))
    }

    /// Create the storage directory if missing
    ///
    /// Returns `true` when this call created it. Concurrent callers are
    /// serialized; a `README.txt` marker is written on creation.
    pub async fn ensure_directory(&self) -> Result<bool, StorageError> {
        let _guard = self.dir_lock.lock().await;

        if fs::metadata(&self.root).await.is_ok() {
            return Ok(false);
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(io_err(&self.root))?;

        let readme = self.root.join(README_FILE);
        fs::write(&readme, README_TEXT)
            .await
            .map_err(io_err(&readme))?;

        info!(path = %self.root.display(), "Created audio storage directory");
        Ok(true)
    }

    pub async fn exists(&self, file_name: &str) -> bool {
        match self.resolve(file_name) {
            Ok(path) => fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Artifact metadata for a stored file, if present
    pub async fn get(&self, file_name: &str) -> Result<Option<AudioArtifact>, StorageError> {
        let path = self.resolve(file_name)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(artifact_from(file_name, path, &meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    /// Read a stored file
    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(file_name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    /// Write (or overwrite) a file
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<AudioArtifact, StorageError> {
        let _guard = self.lock_name(file_name).await;
        self.write_unlocked(file_name, bytes).await
    }

    /// Write a file unless it already exists
    ///
    /// Returns the artifact and whether this call created it. The existence
    /// check and the write happen under the same per-name lock, so concurrent
    /// callers for one name produce exactly one write.
    pub async fn write_if_absent(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(AudioArtifact, bool), StorageError> {
        let _guard = self.lock_name(file_name).await;

        if let Some(existing) = self.get(file_name).await? {
            debug!(file_name = %file_name, "Artifact already stored");
            return Ok((existing, false));
        }

        let artifact = self.write_unlocked(file_name, bytes).await?;
        Ok((artifact, true))
    }

    async fn write_unlocked(&self, file_name: &str, bytes: &[u8]) -> Result<AudioArtifact, StorageError> {
        let path = self.resolve(file_name)?;
        if ArtifactKind::from_file_name(file_name).is_none() {
            return Err(StorageError::InvalidName(file_name.to_string()));
        }
        self.ensure_directory().await?;

        let part = self.root.join(format!("{}{}", file_name, PART_SUFFIX));
        fs::write(&part, bytes).await.map_err(io_err(&part))?;

        if let Err(e) = fs::rename(&part, &path).await {
            let _ = fs::remove_file(&part).await;
            return Err(StorageError::Io { path, source: e });
        }

        debug!(file_name = %file_name, bytes = bytes.len(), "Stored artifact");

        self.get(file_name)
            .await?
            .ok_or_else(|| StorageError::NotFound(file_name.to_string()))
    }

    /// Delete a file; `false` when it did not exist
    pub async fn delete(&self, file_name: &str) -> Result<bool, StorageError> {
        let path = self.resolve(file_name)?;
        let _guard = self.lock_name(file_name).await;

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(file_name = %file_name, "Deleted artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    /// All artifacts in the directory, sorted by file name
    ///
    /// Reserved files (`README.txt`, the generic fallback), in-flight `.part`
    /// files and hidden files are not artifacts and are skipped.
    pub async fn list_artifacts(&self) -> Result<Vec<AudioArtifact>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io { path: self.root.clone(), source: e }),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&self.root))? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if is_reserved(&file_name) {
                continue;
            }

            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    warn!(file_name = %file_name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            artifacts.push(artifact_from(&file_name, entry.path(), &meta));
        }

        artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(artifacts)
    }

    /// Aggregate statistics, derived fresh from the directory
    pub async fn snapshot(&self) -> Result<StorageSnapshot, StorageError> {
        let artifacts = self.list_artifacts().await?;

        Ok(StorageSnapshot {
            storage_path: self.root.clone(),
            file_count: artifacts.len() as u64,
            total_bytes: artifacts.iter().map(|a| a.byte_size).sum(),
            fallback_count: artifacts
                .iter()
                .filter(|a| a.kind == ArtifactKind::Synthesized)
                .count() as u64,
            as_of: tunefeed_common::time::now(),
        })
    }

    /// Delete synthesized per-track files last modified more than `days` ago
    ///
    /// Fetched audio and the shared generic fallback are never removed.
    pub async fn cleanup_older_than(&self, days: u32) -> Result<usize, StorageError> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let cutoff = tunefeed_common::time::from_system_time(cutoff);

        let mut deleted = 0;
        for artifact in self.list_artifacts().await? {
            if artifact.kind != ArtifactKind::Synthesized || artifact.created_at >= cutoff {
                continue;
            }
            match self.delete(&artifact.file_name).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(file_name = %artifact.file_name, error = %e, "Cleanup could not delete file"),
            }
        }

        info!(days, deleted, "Cleaned up old synthesized audio");
        Ok(deleted)
    }

    /// Most recent fetched artifact for a track, if any
    ///
    /// Matches the id part of the name exactly, so id `42` never picks up the
    /// files of `42_5`.
    pub async fn find_fetched(&self, external_id: &str) -> Result<Option<AudioArtifact>, StorageError> {
        let wanted = clean_id(external_id);

        Ok(self
            .list_artifacts()
            .await?
            .into_iter()
            .filter_map(|a| {
                let (id, millis) = parse_fetched_name(&a.file_name)?;
                (id == wanted).then_some((millis, a))
            })
            .max_by(|(a_millis, a), (b_millis, b)| {
                a_millis.cmp(b_millis).then_with(|| a.file_name.cmp(&b.file_name))
            })
            .map(|(_, a)| a))
    }

    /// Ensure the shared generic fallback exists, synthesizing it if needed
    pub async fn ensure_generic_fallback(&self) -> Result<AudioArtifact, StorageError> {
        let _guard = self.lock_name(GENERIC_FALLBACK_FILE).await;

        if let Some(existing) = self.get(GENERIC_FALLBACK_FILE).await? {
            return Ok(existing);
        }

        let spec = SynthesisSpec::generic_tone(self.generic_fallback_seconds);
        let bytes = tokio::task::spawn_blocking(move || synthesize(&spec))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?;

        let artifact = self.write_unlocked(GENERIC_FALLBACK_FILE, &bytes).await?;
        info!(
            file_name = GENERIC_FALLBACK_FILE,
            bytes = artifact.byte_size,
            "Created generic fallback audio"
        );
        Ok(artifact)
    }

    /// Acquire the per-name lock; the map entry is dropped with the last holder
    async fn lock_name(&self, file_name: &str) -> NameLock<'_> {
        let lock = {
            let mut locks = self
                .name_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(file_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = lock.clone().lock_owned().await;

        NameLock {
            locks: &self.name_locks,
            name: file_name.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.name_locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }
}

/// Held per-name lock
///
/// On drop, the map entry is removed unless another task holds or waits on
/// the same mutex. Clones are only taken under the map lock, so the strong
/// count checked there is exact.
struct NameLock<'a> {
    locks: &'a StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    name: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameLock<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) == 2
            && locks
                .get(&self.name)
                .map_or(false, |entry| Arc::ptr_eq(entry, &self.lock))
        {
            locks.remove(&self.name);
        }
    }
}

fn is_reserved(file_name: &str) -> bool {
    file_name == README_FILE
        || file_name == GENERIC_FALLBACK_FILE
        || file_name.starts_with('.')
        || file_name.ends_with(PART_SUFFIX)
        || ArtifactKind::from_file_name(file_name).is_none()
}

fn artifact_from(file_name: &str, path: PathBuf, meta: &std::fs::Metadata) -> AudioArtifact {
    let created_at = meta
        .modified()
        .map(tunefeed_common::time::from_system_time)
        .unwrap_or_else(|_| tunefeed_common::time::now());

    AudioArtifact {
        file_name: file_name.to_string(),
        storage_path: path,
        byte_size: meta.len(),
        kind: ArtifactKind::from_file_name(file_name).unwrap_or(ArtifactKind::Synthesized),
        content_type: content_type_for(file_name).to_string(),
        created_at,
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn clean_id(external_id: &str) -> String {
    external_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Extension guessed from a preview URL, `.mp3` when nothing matches
pub fn extension_for_url(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    [".mp3", ".wav", ".ogg", ".m4a"]
        .into_iter()
        .find(|ext| lower.contains(ext))
        .unwrap_or(".mp3")
}

/// Name of a downloaded artifact: `audio_<clean id>_<unix millis><ext>`
pub fn fetched_file_name(external_id: &str, url: &str, unix_millis: i64) -> String {
    format!(
        "{}{}_{}{}",
        FETCHED_PREFIX,
        clean_id(external_id),
        unix_millis,
        extension_for_url(url)
    )
}

/// Split `audio_<clean id>_<unix millis>.<ext>` into its id and timestamp
pub fn parse_fetched_name(file_name: &str) -> Option<(&str, u64)> {
    let rest = file_name.strip_prefix(FETCHED_PREFIX)?;
    let (stem, ext) = rest.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    let (id, millis) = stem.rsplit_once('_')?;
    if id.is_empty() || millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((id, millis.parse().ok()?))
}

/// Name of a per-track synthesized artifact: `music_<slug>_<hash>.wav`
///
/// Deterministic in (title, artist, external id); the hash keeps names
/// distinct when slugs collide or are truncated.
pub fn synthesized_file_name(title: &str, artist: &str, external_id: &str) -> String {
    let slug = slugify(&format!("{}_{}_{}", title, artist, external_id));

    let digest = Sha256::digest(format!("{}\u{1f}{}\u{1f}{}", title, artist, external_id).as_bytes());
    let hash: String = digest
        .iter()
        .take(HASH_HEX_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect();

    format!("{}{}_{}.wav", SYNTHESIZED_PREFIX, slug, hash)
}

/// Lower-case, collapse runs outside `[a-z0-9]` to `_`, trim, truncate
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    slug.truncate(SLUG_MAX_LEN);
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "track".to_string()
    } else {
        slug
    }
}
