//! Catalog records handed to the catalog-persistence boundary
//!
//! Persisting artists, albums, genres and songs belongs to the catalog service.
//! The ingest pipeline only produces normalized records and hands them to a
//! [`CatalogStore`]; [`MemoryCatalog`] is the in-process implementation used by
//! the standalone binary and tests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::RwLock;
use tunefeed_common::{Error, Result};
use uuid::Uuid;

use super::artifact::ArtifactKind;

/// Entities carrying a creation timestamp
pub trait Timestamped {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// Set the creation timestamp to now unless already set
    fn stamp_created(&mut self) {
        if self.created_at().is_none() {
            self.set_created_at(tunefeed_common::time::now());
        }
    }
}

macro_rules! impl_timestamped {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Timestamped for $ty {
                fn created_at(&self) -> Option<DateTime<Utc>> {
                    self.created_at
                }

                fn set_created_at(&mut self, at: DateTime<Utc>) {
                    self.created_at = Some(at);
                }
            }
        )+
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRecord {
    pub name: String,
    pub country: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumRecord {
    pub title: String,
    pub cover_url: Option<String>,
    pub artist_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreRecord {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Normalized song emitted by the import orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRecord {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub artist: ArtistRecord,
    pub album: Option<AlbumRecord>,
    pub genre: GenreRecord,
    pub duration_seconds: Option<u32>,
    /// Playable reference, e.g. `/audio/music_x.wav`
    pub audio_ref: String,
    pub audio_kind: ArtifactKind,
    pub image_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl_timestamped!(ArtistRecord, AlbumRecord, GenreRecord, SongRecord);

/// Catalog persistence boundary
pub trait CatalogStore: Send + Sync {
    /// Whether a song with this exact title and artist name is already stored
    fn song_exists(&self, title: &str, artist_name: &str) -> bool;

    /// Persist a song record, stamping it and its artist, album and genre
    fn save_song(&self, song: SongRecord) -> Result<()>;

    /// All stored songs, in insertion order
    fn songs(&self) -> Vec<SongRecord>;
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    songs: RwLock<Vec<SongRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for MemoryCatalog {
    fn song_exists(&self, title: &str, artist_name: &str) -> bool {
        self.songs
            .read()
            .map(|songs| {
                songs
                    .iter()
                    .any(|s| s.title == title && s.artist.name == artist_name)
            })
            .unwrap_or(false)
    }

    fn save_song(&self, mut song: SongRecord) -> Result<()> {
        song.stamp_created();
        song.artist.stamp_created();
        song.genre.stamp_created();
        if let Some(album) = song.album.as_mut() {
            album.stamp_created();
        }
        let mut songs = self
            .songs
            .write()
            .map_err(|_| Error::Internal("catalog lock poisoned".to_string()))?;
        songs.push(song);
        Ok(())
    }

    fn songs(&self) -> Vec<SongRecord> {
        self.songs.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, artist: &str) -> SongRecord {
        SongRecord {
            id: Uuid::new_v4(),
            external_id: "1".to_string(),
            title: title.to_string(),
            artist: ArtistRecord {
                name: artist.to_string(),
                country: None,
                created_at: None,
            },
            album: None,
            genre: GenreRecord {
                name: "Nhạc Việt".to_string(),
                created_at: None,
            },
            duration_seconds: Some(200),
            audio_ref: "/audio/x.wav".to_string(),
            audio_kind: ArtifactKind::Synthesized,
            image_url: "/images/default-song.png".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_stamp_created_only_once() {
        let mut genre = GenreRecord {
            name: "g".to_string(),
            created_at: None,
        };
        genre.stamp_created();
        let first = genre.created_at().unwrap();
        genre.stamp_created();
        assert_eq!(genre.created_at(), Some(first));
    }

    #[test]
    fn test_memory_catalog_duplicate_lookup() {
        let catalog = MemoryCatalog::new();
        assert!(!catalog.song_exists("Mưa", "Soobin"));

        catalog.save_song(song("Mưa", "Soobin")).unwrap();

        assert!(catalog.song_exists("Mưa", "Soobin"));
        assert!(!catalog.song_exists("Mưa", "Other"));
        let stored = catalog.songs();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].created_at.is_some(), "save stamps created_at");
        assert!(stored[0].artist.created_at.is_some());
        assert!(stored[0].genre.created_at.is_some());
    }
}
