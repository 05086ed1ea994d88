//! Demo session against an in-memory storefront.
//!
//! Prices two products, gives one an evening happy hour, runs a promotion
//! around "now", fills and submits an order and logs the calculated values.

use anyhow::Context;
use chrono::Duration;

use storefront_core::{AggregateId, Clock, CustomerId, ProductId};
use storefront_infra::{Config, Storefront};
use storefront_ordering::OrderId;
use storefront_pricing::TimePromotionId;

fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = Config::from_env().context("invalid storefront configuration")?;
    tracing::info!(
        conflict_retries = config.conflict_retries,
        frozen_time = ?config.frozen_time,
        "starting storefront session"
    );

    let clock = config.clock();
    let now = clock.now();
    let storefront = Storefront::in_memory_with(&config, clock, config.number_generator());

    let keyboard = ProductId::new();
    let mouse = ProductId::new();
    storefront.pricing.set_price(keyboard, 20)?;
    storefront.pricing.set_price(mouse, 30)?;
    storefront
        .pricing
        .add_product_to_happy_hour(keyboard, 15, 17, 19)?;

    let promotion = TimePromotionId::new(AggregateId::new());
    storefront.pricing.create_time_promotion(promotion)?;
    storefront
        .pricing
        .label_time_promotion(promotion, "Launch week")?;
    storefront
        .pricing
        .set_time_promotion_range(promotion, now - Duration::days(1), now + Duration::days(6))?;
    storefront
        .pricing
        .set_time_promotion_discount(promotion, 50)?;

    let order_id = OrderId::new(AggregateId::new());
    storefront.ordering.add_item(order_id, keyboard)?;
    storefront.ordering.add_item(order_id, mouse)?;
    storefront.ordering.add_item(order_id, mouse)?;
    storefront.pricing.set_percentage_discount(order_id, 10)?;

    for line in storefront.pricing.calculate_sub_amounts(order_id)? {
        tracing::info!(
            product_id = %line.product_id,
            quantity = line.quantity,
            amount = line.amount,
            discounted_amount = line.discounted_amount,
            "line priced"
        );
    }

    let total = storefront.pricing.calculate_total_value(order_id)?;
    tracing::info!(
        %order_id,
        total_amount = total.total_amount,
        discounted_amount = total.discounted_amount,
        "order priced"
    );

    storefront
        .ordering
        .submit(order_id, Some(CustomerId::new()), None)?;
    storefront.ordering.confirm(order_id)?;

    let order = storefront.ordering.load_order(order_id)?;
    tracing::info!(
        %order_id,
        state = ?order.state(),
        order_number = order.order_number().map(|n| n.as_str()).unwrap_or("-"),
        items = order.basket().total_quantity(),
        "session finished"
    );

    Ok(())
}
