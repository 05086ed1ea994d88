use std::sync::Arc;

use serde_json::Value as JsonValue;

use storefront_core::{Clock, CustomerId, ProductId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_ordering::{
    AddItemToBasket, CancelOrder, ConfirmOrder, ExpireOrder, NumberGenerator, Order, OrderCommand,
    OrderId, OrderNumber, RemoveItemFromBasket, SubmitOrder,
};

use crate::command_dispatcher::{CommandDispatcher, retry_on_conflict};
use crate::event_store::{EventStore, StoredEvent};

use super::error::ServiceError;

/// Entry point for the order lifecycle (`ordering.order` streams).
pub struct OrderingService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    clock: Arc<dyn Clock>,
    numbers: Arc<dyn NumberGenerator>,
    max_retries: u32,
}

impl<S, B> OrderingService<S, B>
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
            dispatcher,
            clock,
            numbers,
            max_retries,
        }
    }

    pub fn add_item(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::debug!(%order_id, %product_id, "add item to basket");
        self.run(|occurred_at| {
            OrderCommand::AddItem(AddItemToBasket {
                order_id,
                product_id,
                occurred_at,
            })
        })
    }

    pub fn remove_item(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::debug!(%order_id, %product_id, "remove item from basket");
        self.run(|occurred_at| {
            OrderCommand::RemoveItem(RemoveItemFromBasket {
                order_id,
                product_id,
                occurred_at,
            })
        })
    }

    /// Submit the order. Without an explicit number the configured generator
    /// assigns one, but only after the current order state accepts the
    /// submission; the number is drawn once even if the command is retried.
    ///
    /// A concurrent submit landing between the check and the append still
    /// consumes a number.
    pub fn submit(
        &self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
        order_number: Option<OrderNumber>,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let order_number = match order_number {
            Some(number) => number,
            None => {
                self.load_order(order_id)?
                    .ensure_submittable(customer_id)
                    .map_err(|err| {
                        tracing::warn!(%order_id, error = %err, "order command rejected");
                        err
                    })?;
                self.numbers.next_number(self.clock.now())
            }
        };
        tracing::info!(%order_id, %order_number, "submit order");

        self.run(|occurred_at| {
            OrderCommand::Submit(SubmitOrder {
                order_id,
                order_number: order_number.clone(),
                customer_id,
                occurred_at,
            })
        })
    }

    pub fn confirm(&self, order_id: OrderId) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%order_id, "confirm order");
        self.run(|occurred_at| {
            OrderCommand::Confirm(ConfirmOrder {
                order_id,
                occurred_at,
            })
        })
    }

    pub fn cancel(&self, order_id: OrderId) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%order_id, "cancel order");
        self.run(|occurred_at| {
            OrderCommand::Cancel(CancelOrder {
                order_id,
                occurred_at,
            })
        })
    }

    pub fn expire(&self, order_id: OrderId) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%order_id, "expire order");
        self.run(|occurred_at| {
            OrderCommand::Expire(ExpireOrder {
                order_id,
                occurred_at,
            })
        })
    }

    /// Current state, rebuilt from the order's stream.
    pub fn load_order(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        Ok(self
            .dispatcher
            .load(Order::AGGREGATE_TYPE, order_id.0, |id| Order::empty(OrderId::new(id)))?)
    }

    fn run(
        &self,
        command: impl Fn(chrono::DateTime<chrono::Utc>) -> OrderCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = retry_on_conflict(self.max_retries, || {
            self.dispatcher
                .dispatch(Order::AGGREGATE_TYPE, command(self.clock.now()), |id| {
                    Order::empty(OrderId::new(id))
                })
        })
        .map_err(|err| {
            tracing::warn!(error = %err, "order command rejected");
            err
        })?;

        Ok(committed)
    }
}

impl<S, B> core::fmt::Debug for OrderingService<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderingService")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
