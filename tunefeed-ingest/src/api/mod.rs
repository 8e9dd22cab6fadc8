//! HTTP API handlers for tunefeed-ingest

pub mod audio;
pub mod health;
pub mod import;
pub mod storage;

pub use audio::audio_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use storage::storage_routes;
