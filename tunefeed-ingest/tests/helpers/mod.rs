//! Test Helper Utilities
//!
//! Shared utilities for testing tunefeed-ingest

#![allow(dead_code)]

pub mod pipeline;
pub mod stub_server;

pub use pipeline::{fast_fetcher_config, test_pipeline, TestPipeline};
pub use stub_server::{frame_sync_payload, StubServer};
