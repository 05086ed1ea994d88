use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ProductId};
use storefront_events::{Command, Event};
use storefront_ordering::{Basket, OrderEvent, OrderId};

use crate::MAX_PERCENT;

pub const PERCENTAGE_DISCOUNT_SET: &str = "pricing.order.percentage_discount_set";
pub const PERCENTAGE_DISCOUNT_RESET: &str = "pricing.order.percentage_discount_reset";
pub const PRICE_ITEM_VALUE_CALCULATED: &str = "pricing.order.price_item_value_calculated";
pub const ORDER_TOTAL_VALUE_CALCULATED: &str = "pricing.order.total_value_calculated";

/// Pricing's view of an order: the flat discount plus a basket mirrored from
/// ordering events.
///
/// Its own stream (`pricing.order$<id>`) only holds discount changes and
/// calculation facts. The basket is fed separately through
/// [`PricingOrder::observe`] with the ordering stream's basket events, so this
/// is never the system of record for order state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingOrder {
    id: OrderId,
    basket: Basket,
    discount_percent: u8,
    last_total: Option<OrderTotalValueCalculated>,
    version: u64,
}

impl PricingOrder {
    pub const AGGREGATE_TYPE: &'static str = "pricing.order";

    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            basket: Basket::new(),
            discount_percent: 0,
            last_total: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn basket(&self) -> &Basket {
        &self.basket
    }

    /// Manually applied flat percentage, 0 unless set.
    pub fn discount_percent(&self) -> u8 {
        self.discount_percent
    }

    pub fn last_total(&self) -> Option<&OrderTotalValueCalculated> {
        self.last_total.as_ref()
    }

    /// Mirror a basket change from the ordering stream.
    ///
    /// Lifecycle events do not affect pricing. Does not touch `version()`,
    /// which tracks the pricing stream only.
    pub fn observe(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::ItemAddedToBasket(e) => {
                self.basket.increase_quantity(e.product_id);
            }
            OrderEvent::ItemRemovedFromBasket(e) => {
                self.basket.decrease_quantity(e.product_id);
            }
            OrderEvent::OrderSubmitted(_)
            | OrderEvent::OrderConfirmed(_)
            | OrderEvent::OrderCancelled(_)
            | OrderEvent::OrderExpired(_) => {}
        }
    }

    pub fn observe_all<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a OrderEvent>,
    {
        for event in events {
            self.observe(event);
        }
    }
}

impl AggregateRoot for PricingOrder {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SetPercentageDiscount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPercentageDiscount {
    pub order_id: OrderId,
    pub amount: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResetPercentageDiscount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPercentageDiscount {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingOrderCommand {
    SetPercentageDiscount(SetPercentageDiscount),
    ResetPercentageDiscount(ResetPercentageDiscount),
}

impl PricingOrderCommand {
    pub fn order_id(&self) -> OrderId {
        match self {
            PricingOrderCommand::SetPercentageDiscount(c) => c.order_id,
            PricingOrderCommand::ResetPercentageDiscount(c) => c.order_id,
        }
    }
}

impl Command for PricingOrderCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.order_id().0
    }
}

/// Event: PercentageDiscountSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageDiscountSet {
    pub order_id: OrderId,
    pub amount: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PercentageDiscountReset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageDiscountReset {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceItemValueCalculated (one per basket line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceItemValueCalculated {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub amount: u64,
    pub discounted_amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderTotalValueCalculated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotalValueCalculated {
    pub order_id: OrderId,
    pub total_amount: u64,
    pub discounted_amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingOrderEvent {
    PercentageDiscountSet(PercentageDiscountSet),
    PercentageDiscountReset(PercentageDiscountReset),
    PriceItemValueCalculated(PriceItemValueCalculated),
    OrderTotalValueCalculated(OrderTotalValueCalculated),
}

impl Event for PricingOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PricingOrderEvent::PercentageDiscountSet(_) => PERCENTAGE_DISCOUNT_SET,
            PricingOrderEvent::PercentageDiscountReset(_) => PERCENTAGE_DISCOUNT_RESET,
            PricingOrderEvent::PriceItemValueCalculated(_) => PRICE_ITEM_VALUE_CALCULATED,
            PricingOrderEvent::OrderTotalValueCalculated(_) => ORDER_TOTAL_VALUE_CALCULATED,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PricingOrderEvent::PercentageDiscountSet(e) => e.occurred_at,
            PricingOrderEvent::PercentageDiscountReset(e) => e.occurred_at,
            PricingOrderEvent::PriceItemValueCalculated(e) => e.occurred_at,
            PricingOrderEvent::OrderTotalValueCalculated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PricingOrder {
    type Command = PricingOrderCommand;
    type Event = PricingOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PricingOrderEvent::PercentageDiscountSet(e) => {
                self.discount_percent = e.amount;
            }
            PricingOrderEvent::PercentageDiscountReset(_) => {
                self.discount_percent = 0;
            }
            PricingOrderEvent::PriceItemValueCalculated(_) => {}
            PricingOrderEvent::OrderTotalValueCalculated(e) => {
                self.last_total = Some(e.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.order_id() != self.id {
            return Err(DomainError::invariant("order_id mismatch"));
        }

        match command {
            PricingOrderCommand::SetPercentageDiscount(cmd) => {
                if cmd.amount > MAX_PERCENT {
                    return Err(DomainError::validation(format!(
                        "percentage discount must be between 0 and {MAX_PERCENT}, got {}",
                        cmd.amount
                    )));
                }
                Ok(vec![PricingOrderEvent::PercentageDiscountSet(
                    PercentageDiscountSet {
                        order_id: cmd.order_id,
                        amount: cmd.amount,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            PricingOrderCommand::ResetPercentageDiscount(cmd) => {
                Ok(vec![PricingOrderEvent::PercentageDiscountReset(
                    PercentageDiscountReset {
                        order_id: cmd.order_id,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
        }
    }
}
