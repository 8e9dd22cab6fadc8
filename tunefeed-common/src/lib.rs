//! # tunefeed common library
//!
//! Shared code for the tunefeed services:
//! - Error type used across crates
//! - Configuration file discovery and loading
//! - Ingest event types and the broadcast EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
