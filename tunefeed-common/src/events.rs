//! Event types for the tunefeed event system
//!
//! Ingest progress is broadcast over an [`EventBus`] so that HTTP clients, loggers
//! and tests can observe an import without coupling to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Ingest event types
///
/// Events are serialized with an internal `type` tag so they can be forwarded
/// verbatim to JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IngestEvent {
    /// Track metadata was scored by the regional classifier
    TrackClassified {
        /// Import run this track belongs to
        session_id: Uuid,
        /// Catalog-feed identifier of the track
        external_id: String,
        /// Whether the track passed the eligibility threshold
        eligible: bool,
        /// Names of the signals that fired, in evaluation order
        reasons: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An audio artifact is available in storage (fresh write or cache hit)
    ArtifactStored {
        session_id: Uuid,
        external_id: String,
        file_name: String,
        /// "fetched" or "synthesized"
        kind: String,
        /// False when the artifact already existed
        created: bool,
        timestamp: DateTime<Utc>,
    },

    /// Real audio could not be used and a fallback was substituted
    FallbackUsed {
        session_id: Uuid,
        external_id: String,
        /// Failure category that triggered the fallback (e.g. "disallowed", "timeout")
        category: String,
        /// Audio reference handed to the catalog
        audio_ref: String,
        timestamp: DateTime<Utc>,
    },

    /// A feed page finished processing
    ImportCompleted {
        session_id: Uuid,
        total: usize,
        eligible: usize,
        imported: usize,
        fallbacks: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast event bus
///
/// Cloning an `EventBus` yields another handle onto the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IngestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IngestEvent,
    ) -> Result<usize, broadcast::error::SendError<IngestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IngestEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
