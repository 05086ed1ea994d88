//! Wiring of store, bus, dispatcher and services.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use storefront_core::Clock;
use storefront_events::{EventBus, EventEnvelope, InMemoryEventBus};
use storefront_ordering::NumberGenerator;

use crate::command_dispatcher::CommandDispatcher;
use crate::config::Config;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::services::{OrderingService, PricingService};

pub type InMemoryDispatcher = CommandDispatcher<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
>;

/// Both bounded contexts sharing one dispatcher (one store, one bus).
#[derive(Debug)]
pub struct Storefront<S, B> {
    pub ordering: OrderingService<S, B>,
    pub pricing: PricingService<S, B>,
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> Storefront<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        clock: Arc<dyn Clock>,
        numbers: Arc<dyn NumberGenerator>,
        max_retries: u32,
    ) -> Self {
        Self {
            ordering: OrderingService::new(
                Arc::clone(&dispatcher),
                Arc::clone(&clock),
                numbers,
                max_retries,
            ),
            pricing: PricingService::new(Arc::clone(&dispatcher), clock, max_retries),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }
}

impl Storefront<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>> {
    /// In-memory storefront configured from `config`.
    pub fn in_memory(config: &Config) -> Self {
        Self::in_memory_with(config, config.clock(), config.number_generator())
    }

    /// In-memory storefront with an explicit clock and number generator.
    pub fn in_memory_with(
        config: &Config,
        clock: Arc<dyn Clock>,
        numbers: Arc<dyn NumberGenerator>,
    ) -> Self {
        let dispatcher: Arc<InMemoryDispatcher> = Arc::new(CommandDispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
        ));
        Self::new(dispatcher, clock, numbers, config.conflict_retries)
    }
}
