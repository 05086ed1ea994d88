//! Append-only event store boundary.
//!
//! The core only depends on the read/append contract defined here; the
//! in-memory implementation backs tests, benchmarks and the demo binary.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamName, UncommittedEvent};
