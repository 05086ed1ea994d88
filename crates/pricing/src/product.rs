use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ProductId};
use storefront_events::{Command, Event};

use crate::MAX_PERCENT;

pub const PRICE_SET: &str = "pricing.product.price_set";
pub const PRODUCT_ADDED_TO_HAPPY_HOUR: &str = "pricing.product.added_to_happy_hour";

const HOURS_PER_DAY: usize = 24;

/// Per-product discount by hour of day (UTC).
///
/// Each hour holds at most one discount; adding a range overwrites the hours
/// it covers. Hours never assigned have no discount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HappyHourSchedule {
    discounts: [u8; HOURS_PER_DAY],
}

impl HappyHourSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`HappyHourSchedule::add`].
    pub fn with_hours(mut self, discount: u8, start_hour: u8, end_hour: u8) -> Self {
        self.add(discount, start_hour, end_hour);
        self
    }

    /// Set `discount` for every hour from `start_hour` to `end_hour`
    /// inclusive. A start after the end wraps past midnight (22..=1 covers
    /// 22, 23, 0 and 1). Hours outside `0..24` are ignored.
    pub fn add(&mut self, discount: u8, start_hour: u8, end_hour: u8) {
        let (start, end) = (usize::from(start_hour), usize::from(end_hour));
        let hours: Vec<usize> = if start <= end {
            (start..=end).collect()
        } else {
            (start..HOURS_PER_DAY).chain(0..=end).collect()
        };
        for hour in hours {
            if let Some(slot) = self.discounts.get_mut(hour) {
                *slot = discount;
            }
        }
    }

    /// Discount for `hour`; 0 for unassigned or out-of-range hours.
    pub fn discount_at(&self, hour: u32) -> u8 {
        usize::try_from(hour)
            .ok()
            .and_then(|h| self.discounts.get(h))
            .copied()
            .unwrap_or(0)
    }

    pub fn discount_for(&self, at: DateTime<Utc>) -> u8 {
        self.discount_at(at.hour())
    }

    pub fn is_empty(&self) -> bool {
        self.discounts.iter().all(|d| *d == 0)
    }
}

/// Aggregate root: what pricing knows about one catalog product, its unit
/// price and its happy hours.
///
/// Prices are in the smallest currency unit. Last write wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPrice {
    id: ProductId,
    price: Option<u64>,
    happy_hours: HappyHourSchedule,
    version: u64,
}

impl ProductPrice {
    pub const AGGREGATE_TYPE: &'static str = "pricing.product";

    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            price: None,
            happy_hours: HappyHourSchedule::new(),
            version: 0,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.id
    }

    pub fn price(&self) -> Option<u64> {
        self.price
    }

    pub fn happy_hours(&self) -> &HappyHourSchedule {
        &self.happy_hours
    }

    /// Stream id for a product's price stream.
    pub fn stream_id(product_id: ProductId) -> AggregateId {
        AggregateId::from_uuid(*product_id.as_uuid())
    }
}

impl AggregateRoot for ProductPrice {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SetPrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPrice {
    pub product_id: ProductId,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddProductToHappyHour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddProductToHappyHour {
    pub product_id: ProductId,
    pub discount: u8,
    pub start_hour: u8,
    pub end_hour: u8,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductPriceCommand {
    SetPrice(SetPrice),
    AddToHappyHour(AddProductToHappyHour),
}

impl ProductPriceCommand {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductPriceCommand::SetPrice(c) => c.product_id,
            ProductPriceCommand::AddToHappyHour(c) => c.product_id,
        }
    }
}

impl Command for ProductPriceCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        ProductPrice::stream_id(self.product_id())
    }
}

/// Event: PriceSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSet {
    pub product_id: ProductId,
    pub price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductAddedToHappyHour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAddedToHappyHour {
    pub product_id: ProductId,
    pub discount: u8,
    pub start_hour: u8,
    pub end_hour: u8,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductPriceEvent {
    PriceSet(PriceSet),
    ProductAddedToHappyHour(ProductAddedToHappyHour),
}

impl Event for ProductPriceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductPriceEvent::PriceSet(_) => PRICE_SET,
            ProductPriceEvent::ProductAddedToHappyHour(_) => PRODUCT_ADDED_TO_HAPPY_HOUR,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductPriceEvent::PriceSet(e) => e.occurred_at,
            ProductPriceEvent::ProductAddedToHappyHour(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductPrice {
    type Command = ProductPriceCommand;
    type Event = ProductPriceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductPriceEvent::PriceSet(e) => {
                self.price = Some(e.price);
            }
            ProductPriceEvent::ProductAddedToHappyHour(e) => {
                self.happy_hours.add(e.discount, e.start_hour, e.end_hour);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.product_id() != self.id {
            return Err(DomainError::invariant("product_id mismatch"));
        }

        match command {
            ProductPriceCommand::SetPrice(cmd) => Ok(vec![ProductPriceEvent::PriceSet(PriceSet {
                product_id: cmd.product_id,
                price: cmd.price,
                occurred_at: cmd.occurred_at,
            })]),
            ProductPriceCommand::AddToHappyHour(cmd) => {
                if cmd.discount > MAX_PERCENT {
                    return Err(DomainError::validation(format!(
                        "happy hour discount must be within 0..=100, got {}",
                        cmd.discount
                    )));
                }
                for hour in [cmd.start_hour, cmd.end_hour] {
                    if usize::from(hour) >= HOURS_PER_DAY {
                        return Err(DomainError::validation(format!(
                            "happy hour must be within 0..=23, got {hour}"
                        )));
                    }
                }

                Ok(vec![ProductPriceEvent::ProductAddedToHappyHour(
                    ProductAddedToHappyHour {
                        product_id: cmd.product_id,
                        discount: cmd.discount,
                        start_hour: cmd.start_hour,
                        end_hour: cmd.end_hour,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
        }
    }
}
