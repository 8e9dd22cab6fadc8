//! Data models for the ingest pipeline

pub mod artifact;
pub mod catalog;
pub mod track;

pub use artifact::{ArtifactKind, AudioArtifact, StorageSnapshot};
pub use catalog::{
    AlbumRecord, ArtistRecord, CatalogStore, GenreRecord, MemoryCatalog, SongRecord, Timestamped,
};
pub use track::{FeedAlbum, FeedArtist, FeedItem, FeedPage, TrackMetadata};
