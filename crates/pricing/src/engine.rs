//! Pricing calculation engine.
//!
//! Stateless per invocation: every input (basket, prices and happy hours,
//! flat discount, promotions, evaluation instant) is passed in, and the only output is the
//! list of calculated facts for the caller to append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{AggregateId, ProductId};
use storefront_events::Command;
use storefront_ordering::OrderId;

use crate::catalog::PriceCatalog;
use crate::discount::{apply_discount, combined_percent};
use crate::order::{OrderTotalValueCalculated, PriceItemValueCalculated, PricingOrder};
use crate::time_promotion::TimePromotion;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// No price is known for a product in the basket. Treating it as zero
    /// would corrupt every total built on top of it.
    #[error("no price set for product {0}")]
    MissingPrice(ProductId),

    #[error("amount overflow while pricing product {0}")]
    AmountOverflow(ProductId),

    #[error("amount overflow while summing order total")]
    TotalOverflow,
}

/// Command: CalculateSubAmounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculateSubAmounts {
    pub order_id: OrderId,
}

/// Command: CalculateTotalValue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculateTotalValue {
    pub order_id: OrderId,
}

impl Command for CalculateSubAmounts {
    fn target_aggregate_id(&self) -> AggregateId {
        self.order_id.0
    }
}

impl Command for CalculateTotalValue {
    fn target_aggregate_id(&self) -> AggregateId {
        self.order_id.0
    }
}

/// One evaluation context: prices, promotions and the instant they are
/// evaluated at.
#[derive(Debug)]
pub struct PricingEngine<'a, C: ?Sized> {
    catalog: &'a C,
    promotions: &'a [TimePromotion],
    now: DateTime<Utc>,
}

impl<'a, C> PricingEngine<'a, C>
where
    C: PriceCatalog + ?Sized,
{
    pub fn new(catalog: &'a C, promotions: &'a [TimePromotion], now: DateTime<Utc>) -> Self {
        Self {
            catalog,
            promotions,
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Discount percent applied to `product_id`'s line of `order`.
    pub fn combined_percent(&self, order: &PricingOrder, product_id: ProductId) -> u8 {
        combined_percent(
            order.discount_percent(),
            self.catalog.happy_hour_discount(product_id, self.now),
            self.promotions,
            self.now,
        )
    }

    /// One `PriceItemValueCalculated` per basket line, in basket order.
    /// An empty basket yields no facts.
    pub fn calculate_sub_amounts(
        &self,
        order: &PricingOrder,
    ) -> Result<Vec<PriceItemValueCalculated>, PricingError> {
        order
            .basket()
            .lines()
            .iter()
            .filter(|line| line.quantity > 0)
            .map(|line| {
                let unit_price = self
                    .catalog
                    .unit_price(line.product_id)
                    .ok_or(PricingError::MissingPrice(line.product_id))?;
                let amount = unit_price
                    .checked_mul(u64::from(line.quantity))
                    .ok_or(PricingError::AmountOverflow(line.product_id))?;

                Ok(PriceItemValueCalculated {
                    order_id: order.id_typed(),
                    product_id: line.product_id,
                    quantity: line.quantity,
                    amount,
                    discounted_amount: apply_discount(
                        amount,
                        self.combined_percent(order, line.product_id),
                    ),
                    occurred_at: self.now,
                })
            })
            .collect()
    }

    /// Sums the per-line amounts. The discounted total is the sum of the
    /// already discounted lines, not a second discount over the sum.
    pub fn calculate_total_value(
        &self,
        order: &PricingOrder,
    ) -> Result<OrderTotalValueCalculated, PricingError> {
        let lines = self.calculate_sub_amounts(order)?;

        let mut total_amount: u64 = 0;
        let mut discounted_amount: u64 = 0;
        for line in &lines {
            total_amount = total_amount
                .checked_add(line.amount)
                .ok_or(PricingError::TotalOverflow)?;
            discounted_amount = discounted_amount
                .checked_add(line.discounted_amount)
                .ok_or(PricingError::TotalOverflow)?;
        }

        Ok(OrderTotalValueCalculated {
            order_id: order.id_typed(),
            total_amount,
            discounted_amount,
            occurred_at: self.now,
        })
    }
}
