//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream
//!   ↓
//! 2. Rehydrate (apply history in sequence order)
//!   ↓
//! 3. Handle (pure decision, produces events)
//!   ↓
//! 4. Append under ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed events on the bus
//! ```
//!
//! The dispatcher never retries. A concurrency failure surfaces as
//! [`DispatchError::Concurrency`]; [`retry_on_conflict`] re-runs the whole
//! load/decide/append cycle for callers that want that.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, ExpectedVersion};
use storefront_events::{Command, Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamName, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// The aggregate rejected the command.
    #[error("{0}")]
    Domain(E),

    /// The stream changed between load and append.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A historical payload could not be decoded into the aggregate's event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl<E> DispatchError<E> {
    /// Only concurrency conflicts are worth retrying; everything else is
    /// deterministic or already committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_))
    }
}

impl<E> From<EventStoreError> for DispatchError<E> {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency { .. } => DispatchError::Concurrency(value.to_string()),
            EventStoreError::Serialization(msg) => DispatchError::Deserialize(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Command execution engine for event-sourced aggregates.
///
/// - Events are persisted before publication; a failed append publishes nothing.
/// - Each command touches exactly one stream.
/// - A publish failure is reported even though the events are committed.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate it targets.
    ///
    /// `make_aggregate` builds the empty aggregate for the command's target id.
    /// Returns the committed events; an empty vector when the aggregate decided
    /// nothing.
    pub fn dispatch<A>(
        &self,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Command: Command,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let stream = StreamName::new(aggregate_type, command.target_aggregate_id());

        let history = self.store.load_stream(&stream)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));
        let aggregate =
            rehydrate::<A, A::Error>(make_aggregate(stream.aggregate_id()), &stream, &history)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::Domain)?;
        if decided.is_empty() {
            tracing::debug!(stream = %stream, "command produced no events");
            return Ok(vec![]);
        }

        self.commit(&stream, expected, &decided)
    }

    /// Load and rehydrate an aggregate without running a command.
    pub fn load<A>(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let stream = StreamName::new(aggregate_type, aggregate_id);
        let history = self.store.load_stream(&stream)?;
        rehydrate(make_aggregate(aggregate_id), &stream, &history)
    }

    /// Append already decided events and publish them.
    ///
    /// Used directly by callers whose decisions do not fit `Aggregate::handle`
    /// (e.g. calculations that read other streams).
    pub fn commit<Ev, E>(
        &self,
        stream: &StreamName,
        expected: ExpectedVersion,
        events: &[Ev],
    ) -> Result<Vec<StoredEvent>, DispatchError<E>>
    where
        Ev: Event + Serialize,
    {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = events
            .iter()
            .map(|ev| UncommittedEvent::from_typed(Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DispatchError::Store)?;

        let committed = match self.store.append(stream, uncommitted, expected) {
            Ok(committed) => committed,
            Err(err) => {
                if matches!(err, EventStoreError::Concurrency { .. }) {
                    tracing::warn!(stream = %stream, error = %err, "append rejected");
                }
                return Err(err.into());
            }
        };

        tracing::info!(
            stream = %stream,
            events = committed.len(),
            version = stream_version(&committed),
            "events committed"
        );

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

/// Re-run `attempt` while it fails with a concurrency conflict, at most
/// `max_retries` extra times.
pub fn retry_on_conflict<T, E>(
    max_retries: u32,
    mut attempt: impl FnMut() -> Result<T, DispatchError<E>>,
) -> Result<T, DispatchError<E>> {
    let mut retries = 0;
    loop {
        match attempt() {
            Err(DispatchError::Concurrency(conflict)) if retries < max_retries => {
                retries += 1;
                tracing::warn!(retry = retries, max_retries, %conflict, "retrying after conflict");
            }
            other => return other,
        }
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Apply a loaded stream to a fresh aggregate.
pub fn rehydrate<A, E>(
    mut aggregate: A,
    stream: &StreamName,
    history: &[StoredEvent],
) -> Result<A, DispatchError<E>>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    validate_loaded_stream::<E>(stream, history)?;

    for stored in history {
        let ev: A::Event = stored.decode()?;
        aggregate.apply(&ev);
    }

    tracing::debug!(stream = %stream, version = stream_version(history), "aggregate rehydrated");
    Ok(aggregate)
}

fn validate_loaded_stream<E>(
    stream: &StreamName,
    history: &[StoredEvent],
) -> Result<(), DispatchError<E>> {
    let mut last = 0u64;
    for (idx, e) in history.iter().enumerate() {
        if &e.stream != stream {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream {stream} contains an event of {} at index {idx}",
                e.stream
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in {stream} (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}
