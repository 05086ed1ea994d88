//! Pricing domain module.
//!
//! Time promotions, product prices (with happy hours) and the per-order
//! pricing view are event-sourced aggregates; the calculation engine is a pure
//! function of a basket, the price catalog, the order's flat discount, the
//! known promotions and an explicit evaluation instant.

pub mod catalog;
pub mod discount;
pub mod engine;
pub mod order;
pub mod product;
pub mod time_promotion;

pub use catalog::{InMemoryPriceCatalog, PriceCatalog};
pub use discount::{apply_discount, best_active_discount, combined_percent};
pub use engine::{CalculateSubAmounts, CalculateTotalValue, PricingEngine, PricingError};
pub use order::{
    OrderTotalValueCalculated, PercentageDiscountReset, PercentageDiscountSet,
    PriceItemValueCalculated, PricingOrder, PricingOrderCommand, PricingOrderEvent,
    ResetPercentageDiscount, SetPercentageDiscount,
};
pub use product::{
    AddProductToHappyHour, HappyHourSchedule, PriceSet, ProductAddedToHappyHour, ProductPrice,
    ProductPriceCommand, ProductPriceEvent, SetPrice,
};
pub use time_promotion::{
    CreateTimePromotion, LabelTimePromotion, SetTimePromotionDiscount, SetTimePromotionRange,
    TimePromotion, TimePromotionCommand, TimePromotionCreated, TimePromotionDiscountSet,
    TimePromotionEvent, TimePromotionId, TimePromotionLabeled, TimePromotionRangeSet, TimeRange,
};

/// Largest accepted percentage for any discount source.
pub const MAX_PERCENT: u8 = 100;
