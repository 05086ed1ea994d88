//! Infrastructure layer: event store, command dispatch, application services
//! and configuration.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod services;
pub mod storefront;

pub use command_dispatcher::{CommandDispatcher, DispatchError, retry_on_conflict};
pub use config::{Config, ConfigError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, StreamName, UncommittedEvent,
};
pub use services::{OrderingService, PricingService, ServiceError};
pub use storefront::{InMemoryDispatcher, Storefront};
