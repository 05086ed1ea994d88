use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use storefront_core::{Aggregate, AggregateId, Clock, ExpectedVersion, ProductId};
use storefront_events::{Command, Event, EventBus, EventEnvelope};
use storefront_ordering::{Order, OrderEvent, OrderId};
use storefront_pricing::{
    AddProductToHappyHour, CreateTimePromotion, HappyHourSchedule, InMemoryPriceCatalog, LabelTimePromotion, OrderTotalValueCalculated,
    PriceItemValueCalculated, PricingEngine, PricingError, PricingOrder, PricingOrderCommand,
    PricingOrderEvent, ProductPrice, ProductPriceCommand, ProductPriceEvent,
    ResetPercentageDiscount, SetPercentageDiscount, SetPrice, SetTimePromotionDiscount,
    SetTimePromotionRange, TimePromotion, TimePromotionCommand, TimePromotionEvent,
    TimePromotionId,
};
use storefront_pricing::product::PRODUCT_ADDED_TO_HAPPY_HOUR;

use crate::command_dispatcher::{CommandDispatcher, DispatchError, rehydrate, retry_on_conflict};
use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamName};

use super::error::ServiceError;

/// Entry point for prices, promotions, discounts and order value calculation.
///
/// Calculations read four sources: the order's basket events from its
/// `ordering.order` stream, its `pricing.order` stream, every
/// `pricing.time_promotion` stream and every `pricing.product` stream. The
/// clock is read once per attempt and the resulting facts are appended to
/// the `pricing.order` stream under the version that was read.
pub struct PricingService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl<S, B> PricingService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        clock: Arc<dyn Clock>,
        max_retries: u32,
    ) -> Self {
        Self {
            dispatcher,
            clock,
            max_retries,
        }
    }

    pub fn create_time_promotion(
        &self,
        time_promotion_id: TimePromotionId,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%time_promotion_id, "create time promotion");
        self.run(
            TimePromotion::AGGREGATE_TYPE,
            |occurred_at| {
                TimePromotionCommand::Create(CreateTimePromotion {
                    time_promotion_id,
                    occurred_at,
                })
            },
            |id| TimePromotion::empty(TimePromotionId::new(id)),
        )
    }

    pub fn label_time_promotion(
        &self,
        time_promotion_id: TimePromotionId,
        label: impl Into<String>,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let label = label.into();
        tracing::debug!(%time_promotion_id, %label, "label time promotion");
        self.run(
            TimePromotion::AGGREGATE_TYPE,
            |occurred_at| {
                TimePromotionCommand::Label(LabelTimePromotion {
                    time_promotion_id,
                    label: label.clone(),
                    occurred_at,
                })
            },
            |id| TimePromotion::empty(TimePromotionId::new(id)),
        )
    }

    pub fn set_time_promotion_discount(
        &self,
        time_promotion_id: TimePromotionId,
        discount: u8,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%time_promotion_id, discount, "set time promotion discount");
        self.run(
            TimePromotion::AGGREGATE_TYPE,
            |occurred_at| {
                TimePromotionCommand::SetDiscount(SetTimePromotionDiscount {
                    time_promotion_id,
                    discount,
                    occurred_at,
                })
            },
            |id| TimePromotion::empty(TimePromotionId::new(id)),
        )
    }

    pub fn set_time_promotion_range(
        &self,
        time_promotion_id: TimePromotionId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%time_promotion_id, %start_time, %end_time, "set time promotion range");
        self.run(
            TimePromotion::AGGREGATE_TYPE,
            |occurred_at| {
                TimePromotionCommand::SetRange(SetTimePromotionRange {
                    time_promotion_id,
                    start_time,
                    end_time,
                    occurred_at,
                })
            },
            |id| TimePromotion::empty(TimePromotionId::new(id)),
        )
    }

    pub fn set_price(
        &self,
        product_id: ProductId,
        price: u64,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%product_id, price, "set product price");
        self.run(
            ProductPrice::AGGREGATE_TYPE,
            |occurred_at| {
                ProductPriceCommand::SetPrice(SetPrice {
                    product_id,
                    price,
                    occurred_at,
                })
            },
            |id| ProductPrice::empty(ProductId::from_uuid(*id.as_uuid())),
        )
    }

    /// Give `product_id` a `discount` from `start_hour` to `end_hour`
    /// inclusive (UTC hours, wrapping past midnight when start > end).
    pub fn add_product_to_happy_hour(
        &self,
        product_id: ProductId,
        discount: u8,
        start_hour: u8,
        end_hour: u8,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%product_id, discount, start_hour, end_hour, "add product to happy hour");
        self.run(
            ProductPrice::AGGREGATE_TYPE,
            |occurred_at| {
                ProductPriceCommand::AddToHappyHour(AddProductToHappyHour {
                    product_id,
                    discount,
                    start_hour,
                    end_hour,
                    occurred_at,
                })
            },
            |id| ProductPrice::empty(ProductId::from_uuid(*id.as_uuid())),
        )
    }

    pub fn set_percentage_discount(
        &self,
        order_id: OrderId,
        amount: u8,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%order_id, amount, "set percentage discount");
        self.run(
            PricingOrder::AGGREGATE_TYPE,
            |occurred_at| {
                PricingOrderCommand::SetPercentageDiscount(SetPercentageDiscount {
                    order_id,
                    amount,
                    occurred_at,
                })
            },
            |id| PricingOrder::empty(OrderId::new(id)),
        )
    }

    pub fn reset_percentage_discount(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        tracing::info!(%order_id, "reset percentage discount");
        self.run(
            PricingOrder::AGGREGATE_TYPE,
            |occurred_at| {
                PricingOrderCommand::ResetPercentageDiscount(ResetPercentageDiscount {
                    order_id,
                    occurred_at,
                })
            },
            |id| PricingOrder::empty(OrderId::new(id)),
        )
    }

    /// Price every basket line and record one `PriceItemValueCalculated` per
    /// line. An empty basket records nothing.
    pub fn calculate_sub_amounts(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<PriceItemValueCalculated>, ServiceError> {
        let lines = self.calculate(order_id, |engine, order| {
            let lines = engine.calculate_sub_amounts(order)?;
            let events = lines
                .iter()
                .cloned()
                .map(PricingOrderEvent::PriceItemValueCalculated)
                .collect();
            Ok((lines, events))
        })?;

        tracing::info!(%order_id, lines = lines.len(), "sub amounts calculated");
        Ok(lines)
    }

    /// Sum the basket lines and record one `OrderTotalValueCalculated`.
    pub fn calculate_total_value(
        &self,
        order_id: OrderId,
    ) -> Result<OrderTotalValueCalculated, ServiceError> {
        let total = self.calculate(order_id, |engine, order| {
            let total = engine.calculate_total_value(order)?;
            let events = vec![PricingOrderEvent::OrderTotalValueCalculated(total.clone())];
            Ok((total, events))
        })?;

        tracing::info!(
            %order_id,
            total_amount = total.total_amount,
            discounted_amount = total.discounted_amount,
            "total value calculated"
        );
        Ok(total)
    }

    /// Pricing's view of the order: its own stream plus the mirrored basket.
    pub fn load_pricing_order(&self, order_id: OrderId) -> Result<PricingOrder, ServiceError> {
        let (order, _) = self.load_pricing_view::<PricingError>(order_id)?;
        Ok(order)
    }

    pub fn load_time_promotion(
        &self,
        time_promotion_id: TimePromotionId,
    ) -> Result<TimePromotion, ServiceError> {
        Ok(self.dispatcher.load(
            TimePromotion::AGGREGATE_TYPE,
            time_promotion_id.0,
            |id| TimePromotion::empty(TimePromotionId::new(id)),
        )?)
    }

    /// Every known promotion, in order of first appearance.
    pub fn time_promotions(&self) -> Result<Vec<TimePromotion>, ServiceError> {
        Ok(self.load_time_promotions()?)
    }

    /// Current unit prices and happy hours of every known product.
    pub fn price_catalog(&self) -> Result<InMemoryPriceCatalog, ServiceError> {
        Ok(self.load_price_catalog()?)
    }

    /// Happy-hour discount of `product_id` at `hour` (UTC), 0 when none.
    /// Reads only the happy-hour events of the product's stream.
    pub fn happy_hour_discount(
        &self,
        product_id: ProductId,
        hour: u32,
    ) -> Result<u8, ServiceError> {
        let stream = StreamName::new(
            ProductPrice::AGGREGATE_TYPE,
            ProductPrice::stream_id(product_id),
        );
        let history = self
            .dispatcher
            .store()
            .load_stream_of_type(&stream, &[PRODUCT_ADDED_TO_HAPPY_HOUR])?;

        let mut schedule = HappyHourSchedule::new();
        for stored in &history {
            if let ProductPriceEvent::ProductAddedToHappyHour(e) =
                stored.decode::<ProductPriceEvent>()?
            {
                schedule.add(e.discount, e.start_hour, e.end_hour);
            }
        }

        Ok(schedule.discount_at(hour))
    }

    fn run<A>(
        &self,
        aggregate_type: &str,
        command: impl Fn(DateTime<Utc>) -> A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, ServiceError>
    where
        A: Aggregate,
        A::Command: Command,
        A::Event: Event + Serialize + DeserializeOwned,
        A::Error: Into<ServiceError> + core::fmt::Display,
    {
        let committed = retry_on_conflict(self.max_retries, || {
            self.dispatcher
                .dispatch(aggregate_type, command(self.clock.now()), &make_aggregate)
        })
        .map_err(|err| {
            tracing::warn!(aggregate_type, error = %err, "pricing command rejected");
            err
        })?;

        Ok(committed)
    }

    fn calculate<T>(
        &self,
        order_id: OrderId,
        decide: impl Fn(
            &PricingEngine<'_, InMemoryPriceCatalog>,
            &PricingOrder,
        ) -> Result<(T, Vec<PricingOrderEvent>), PricingError>,
    ) -> Result<T, ServiceError> {
        let value = retry_on_conflict(self.max_retries, || {
            let (order, version) = self.load_pricing_view::<PricingError>(order_id)?;
            let promotions = self.load_time_promotions()?;
            let catalog = self.load_price_catalog()?;

            let engine = PricingEngine::new(&catalog, &promotions, self.clock.now());
            let (value, events) = decide(&engine, &order).map_err(DispatchError::Domain)?;

            let stream = StreamName::new(PricingOrder::AGGREGATE_TYPE, order_id.0);
            self.dispatcher.commit::<_, PricingError>(
                &stream,
                ExpectedVersion::Exact(version),
                &events,
            )?;
            Ok(value)
        })
        .map_err(|err| {
            tracing::warn!(%order_id, error = %err, "pricing calculation failed");
            err
        })?;

        Ok(value)
    }

    /// Rehydrated pricing order plus the `pricing.order` stream version it
    /// reflects.
    fn load_pricing_view<E>(&self, order_id: OrderId) -> Result<(PricingOrder, u64), DispatchError<E>> {
        let store = self.dispatcher.store();

        let pricing_stream = StreamName::new(PricingOrder::AGGREGATE_TYPE, order_id.0);
        let history = store.load_stream(&pricing_stream)?;
        let mut order =
            rehydrate::<_, E>(PricingOrder::empty(order_id), &pricing_stream, &history)?;
        let version = history.last().map(|e| e.sequence_number).unwrap_or(0);

        let ordering_stream = StreamName::new(Order::AGGREGATE_TYPE, order_id.0);
        let basket_events = store
            .load_stream_of_type(&ordering_stream, &OrderEvent::BASKET_EVENT_TYPES)?
            .iter()
            .map(StoredEvent::decode::<OrderEvent>)
            .collect::<Result<Vec<_>, _>>()?;
        order.observe_all(&basket_events);

        Ok((order, version))
    }

    fn load_time_promotions(&self) -> Result<Vec<TimePromotion>, EventStoreError> {
        let history = self
            .dispatcher
            .store()
            .load_category(TimePromotion::AGGREGATE_TYPE)?;

        let mut promotions: Vec<TimePromotion> = Vec::new();
        let mut index: HashMap<AggregateId, usize> = HashMap::new();
        for stored in &history {
            let event: TimePromotionEvent = stored.decode()?;
            let id = stored.stream.aggregate_id();
            let slot = *index.entry(id).or_insert_with(|| {
                promotions.push(TimePromotion::empty(TimePromotionId::new(id)));
                promotions.len() - 1
            });
            promotions[slot].apply(&event);
        }

        Ok(promotions)
    }

    fn load_price_catalog(&self) -> Result<InMemoryPriceCatalog, EventStoreError> {
        let history = self
            .dispatcher
            .store()
            .load_category(ProductPrice::AGGREGATE_TYPE)?;

        let mut products: HashMap<AggregateId, ProductPrice> = HashMap::new();
        for stored in &history {
            let event: ProductPriceEvent = stored.decode()?;
            let id = stored.stream.aggregate_id();
            products
                .entry(id)
                .or_insert_with(|| ProductPrice::empty(ProductId::from_uuid(*id.as_uuid())))
                .apply(&event);
        }

        Ok(products.into_values().collect())
    }
}

impl<S, B> core::fmt::Debug for PricingService<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PricingService")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
