use std::collections::HashMap;

use chrono::{DateTime, Utc};

use storefront_core::ProductId;

use crate::product::{HappyHourSchedule, ProductPrice};

/// Per-product pricing lookups used by the calculation engine.
pub trait PriceCatalog {
    /// Unit price in the smallest currency unit, `None` if no price was set.
    fn unit_price(&self, product_id: ProductId) -> Option<u64>;

    /// Happy-hour discount for the product at `at`; 0 outside its happy hours.
    fn happy_hour_discount(&self, product_id: ProductId, at: DateTime<Utc>) -> u8;
}

impl<C> PriceCatalog for &C
where
    C: PriceCatalog + ?Sized,
{
    fn unit_price(&self, product_id: ProductId) -> Option<u64> {
        (**self).unit_price(product_id)
    }

    fn happy_hour_discount(&self, product_id: ProductId, at: DateTime<Utc>) -> u8 {
        (**self).happy_hour_discount(product_id, at)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryPriceCatalog {
    prices: HashMap<ProductId, u64>,
    happy_hours: HashMap<ProductId, HappyHourSchedule>,
}

impl InMemoryPriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, product_id: ProductId, price: u64) {
        self.prices.insert(product_id, price);
    }

    pub fn with_price(mut self, product_id: ProductId, price: u64) -> Self {
        self.set_price(product_id, price);
        self
    }

    pub fn set_happy_hours(&mut self, product_id: ProductId, schedule: HappyHourSchedule) {
        self.happy_hours.insert(product_id, schedule);
    }

    pub fn with_happy_hours(mut self, product_id: ProductId, schedule: HappyHourSchedule) -> Self {
        self.set_happy_hours(product_id, schedule);
        self
    }

    /// Number of products with a price.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceCatalog for InMemoryPriceCatalog {
    fn unit_price(&self, product_id: ProductId) -> Option<u64> {
        self.prices.get(&product_id).copied()
    }

    fn happy_hour_discount(&self, product_id: ProductId, at: DateTime<Utc>) -> u8 {
        self.happy_hours
            .get(&product_id)
            .map(|schedule| schedule.discount_for(at))
            .unwrap_or(0)
    }
}

/// Products without a price have no unit price; products without happy
/// hours have no schedule.
impl FromIterator<ProductPrice> for InMemoryPriceCatalog {
    fn from_iter<I: IntoIterator<Item = ProductPrice>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for product in iter {
            if let Some(price) = product.price() {
                catalog.set_price(product.product_id(), price);
            }
            if !product.happy_hours().is_empty() {
                catalog.set_happy_hours(product.product_id(), product.happy_hours().clone());
            }
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{PriceSet, ProductAddedToHappyHour, ProductPriceEvent};
    use chrono::TimeZone;
    use storefront_core::Aggregate;

    #[test]
    fn unknown_product_has_no_price() {
        let catalog = InMemoryPriceCatalog::new().with_price(ProductId::new(), 20);
        assert_eq!(catalog.unit_price(ProductId::new()), None);
    }

    #[test]
    fn built_from_priced_products_only() {
        let priced = ProductId::new();
        let unpriced = ProductId::new();

        let mut with_price = ProductPrice::empty(priced);
        with_price.apply(&ProductPriceEvent::PriceSet(PriceSet {
            product_id: priced,
            price: 30,
            occurred_at: Utc::now(),
        }));

        let catalog: InMemoryPriceCatalog =
            vec![with_price, ProductPrice::empty(unpriced)].into_iter().collect();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.unit_price(priced), Some(30));
        assert_eq!(catalog.unit_price(unpriced), None);
    }

    #[test]
    fn happy_hours_come_from_the_product_history() {
        let product_id = ProductId::new();
        let mut product = ProductPrice::empty(product_id);
        product.apply(&ProductPriceEvent::ProductAddedToHappyHour(ProductAddedToHappyHour {
            product_id,
            discount: 30,
            start_hour: 15,
            end_hour: 16,
            occurred_at: Utc::now(),
        }));

        let catalog: InMemoryPriceCatalog = vec![product].into_iter().collect();
        let at = |hour| Utc.with_ymd_and_hms(2022, 5, 30, hour, 33, 0).unwrap();

        assert!(catalog.is_empty());
        assert_eq!(catalog.happy_hour_discount(product_id, at(14)), 0);
        assert_eq!(catalog.happy_hour_discount(product_id, at(15)), 30);
        assert_eq!(catalog.happy_hour_discount(product_id, at(16)), 30);
        assert_eq!(catalog.happy_hour_discount(ProductId::new(), at(15)), 0);
    }
}
