use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use storefront_core::ExpectedVersion;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamName, UncommittedEvent};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamName, Vec<StoredEvent>>,
    /// Every committed event in commit order; index + 1 is the global position.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Total number of committed events across all streams.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        stream: &StreamName,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        if let Some((idx, _)) = events
            .iter()
            .enumerate()
            .find(|(_, e)| e.event_type.is_empty())
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "event at index {idx} has no event_type"
            )));
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        let Inner { streams, log } = &mut *inner;

        let current = streams
            .get(stream)
            .map(|s| Self::current_version(s))
            .unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency {
                stream: stream.to_string(),
                expected: expected_version,
                actual: current,
            });
        }

        // Assign positions and append (append-only).
        let entries = streams.entry(stream.clone()).or_default();
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                stream: stream.clone(),
                sequence_number: next,
                global_position: log.len() as u64 + 1,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            entries.push(stored.clone());
            log.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(&self, stream: &StreamName) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner.streams.get(stream).cloned().unwrap_or_default())
    }

    fn load_category(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner
            .log
            .iter()
            .filter(|e| e.stream.aggregate_type() == aggregate_type)
            .cloned()
            .collect())
    }
}
