use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::{AggregateId, ExpectedVersion};
use std::sync::Arc;

/// Name of one aggregate instance's stream: `<aggregate_type>$<aggregate_id>`.
///
/// The aggregate type doubles as the stream category, so the ordering order
/// and the pricing order with the same id live in different streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamName {
    aggregate_type: String,
    aggregate_id: AggregateId,
}

impl StreamName {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }
}

impl core::fmt::Display for StreamName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}${}", self.aggregate_type, self.aggregate_id)
    }
}

/// An event ready to be appended (no stream position yet).
///
/// Build it from a typed domain event with [`UncommittedEvent::from_typed`],
/// which serializes the payload and captures the metadata needed to decode it
/// again on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event.
///
/// `sequence_number` is the 1-based position inside its stream (no gaps);
/// `global_position` orders events across all streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub stream: StreamName,

    pub sequence_number: u64,
    pub global_position: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Deserialize the payload back into the typed domain event.
    pub fn decode<E>(&self) -> Result<E, EventStoreError>
    where
        E: DeserializeOwned,
    {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            EventStoreError::Serialization(format!(
                "{} #{} ({}): {e}",
                self.stream, self.sequence_number, self.event_type
            ))
        })
    }

    /// Convert into an envelope for publication on the bus.
    pub fn to_envelope(&self) -> storefront_events::EventEnvelope<JsonValue> {
        storefront_events::EventEnvelope::new(
            self.event_id,
            self.stream.aggregate_type(),
            self.stream.aggregate_id(),
            self.sequence_number,
            self.event_type.clone(),
            self.payload.clone(),
        )
    }
}

/// Event store failure. These are infrastructure errors, never domain errors.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream moved past the version the writer based its decision on.
    /// Retryable by reloading and re-running the command.
    #[error("optimistic concurrency check failed on {stream}: expected {expected:?}, found {actual}")]
    Concurrency {
        stream: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event (de)serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Append-only event store with per-stream optimistic concurrency.
///
/// Implementations must:
/// - reject an append whose `ExpectedVersion` does not match the stream's
///   current version, without writing anything
/// - assign contiguous `sequence_number`s starting at `current_version + 1`
/// - persist a batch atomically
/// - return events in append order on every read
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        stream: &StreamName,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Full stream, empty if it does not exist yet.
    fn load_stream(&self, stream: &StreamName) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Stream filtered to the given event types, still in append order.
    fn load_stream_of_type(
        &self,
        stream: &StreamName,
        event_types: &[&str],
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Ok(self
            .load_stream(stream)?
            .into_iter()
            .filter(|e| event_types.contains(&e.event_type.as_str()))
            .collect())
    }

    /// Every event of every stream of one aggregate type, in global order.
    fn load_category(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        stream: &StreamName,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(stream, events, expected_version)
    }

    fn load_stream(&self, stream: &StreamName) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(stream)
    }

    fn load_stream_of_type(
        &self,
        stream: &StreamName,
        event_types: &[&str],
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream_of_type(stream, event_types)
    }

    fn load_category(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_category(aggregate_type)
    }
}

impl UncommittedEvent {
    /// Serialize a typed domain event, keeping its metadata alongside.
    pub fn from_typed<E>(event_id: Uuid, event: &E) -> Result<Self, EventStoreError>
    where
        E: storefront_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::Serialization(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
