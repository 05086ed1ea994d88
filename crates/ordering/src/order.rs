use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, CustomerId, ProductId};
use storefront_events::{Command, Event};

use crate::basket::{Basket, OrderLine};
use crate::error::OrderError;

pub const ITEM_ADDED_TO_BASKET: &str = "ordering.order.item_added_to_basket";
pub const ITEM_REMOVED_FROM_BASKET: &str = "ordering.order.item_removed_from_basket";
pub const ORDER_SUBMITTED: &str = "ordering.order.submitted";
pub const ORDER_CONFIRMED: &str = "ordering.order.confirmed";
pub const ORDER_CANCELLED: &str = "ordering.order.cancelled";
pub const ORDER_EXPIRED: &str = "ordering.order.expired";

/// Order identifier. The pricing side keys its per-order stream by the same id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Human-facing order number, assigned on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order lifecycle.
///
/// ```text
/// Draft ──submit──▶ Submitted ──confirm──▶ Confirmed
///   │                  │ └────cancel────▶ Cancelled
///   └──expire──▶ Expired ◀──expire──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Draft,
    Submitted,
    Confirmed,
    Expired,
    Cancelled,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    state: OrderState,
    basket: Basket,
    order_number: Option<OrderNumber>,
    customer_id: Option<CustomerId>,
    version: u64,
}

impl Order {
    pub const AGGREGATE_TYPE: &'static str = "ordering.order";

    /// A fresh draft order; also the starting point for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            state: OrderState::Draft,
            basket: Basket::new(),
            order_number: None,
            customer_id: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn basket(&self) -> &Basket {
        &self.basket
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Checks everything a submission depends on without emitting anything.
    /// Returns the customer the order would be submitted for.
    pub fn ensure_submittable(
        &self,
        customer_id: Option<CustomerId>,
    ) -> Result<CustomerId, OrderError> {
        self.ensure_draft()?;
        customer_id.ok_or(OrderError::MissingCustomer)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItemToBasket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemToBasket {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItemFromBasket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItemFromBasket {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: Option<CustomerId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    AddItem(AddItemToBasket),
    RemoveItem(RemoveItemFromBasket),
    Submit(SubmitOrder),
    Confirm(ConfirmOrder),
    Cancel(CancelOrder),
    Expire(ExpireOrder),
}

impl OrderCommand {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderCommand::AddItem(c) => c.order_id,
            OrderCommand::RemoveItem(c) => c.order_id,
            OrderCommand::Submit(c) => c.order_id,
            OrderCommand::Confirm(c) => c.order_id,
            OrderCommand::Cancel(c) => c.order_id,
            OrderCommand::Expire(c) => c.order_id,
        }
    }
}

impl Command for OrderCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.order_id().0
    }
}

/// Event: ItemAddedToBasket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAddedToBasket {
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Basket quantity of the product before this unit was added.
    pub quantity_before: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemovedFromBasket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemovedFromBasket {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    /// Basket snapshot at submission time, in basket order.
    pub order_lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    ItemAddedToBasket(ItemAddedToBasket),
    ItemRemovedFromBasket(ItemRemovedFromBasket),
    OrderSubmitted(OrderSubmitted),
    OrderConfirmed(OrderConfirmed),
    OrderCancelled(OrderCancelled),
    OrderExpired(OrderExpired),
}

impl OrderEvent {
    /// Event types that change the basket; what the pricing side mirrors.
    pub const BASKET_EVENT_TYPES: [&'static str; 2] =
        [ITEM_ADDED_TO_BASKET, ITEM_REMOVED_FROM_BASKET];

    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::ItemAddedToBasket(e) => e.order_id,
            OrderEvent::ItemRemovedFromBasket(e) => e.order_id,
            OrderEvent::OrderSubmitted(e) => e.order_id,
            OrderEvent::OrderConfirmed(e) => e.order_id,
            OrderEvent::OrderCancelled(e) => e.order_id,
            OrderEvent::OrderExpired(e) => e.order_id,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::ItemAddedToBasket(_) => ITEM_ADDED_TO_BASKET,
            OrderEvent::ItemRemovedFromBasket(_) => ITEM_REMOVED_FROM_BASKET,
            OrderEvent::OrderSubmitted(_) => ORDER_SUBMITTED,
            OrderEvent::OrderConfirmed(_) => ORDER_CONFIRMED,
            OrderEvent::OrderCancelled(_) => ORDER_CANCELLED,
            OrderEvent::OrderExpired(_) => ORDER_EXPIRED,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::ItemAddedToBasket(e) => e.occurred_at,
            OrderEvent::ItemRemovedFromBasket(e) => e.occurred_at,
            OrderEvent::OrderSubmitted(e) => e.occurred_at,
            OrderEvent::OrderConfirmed(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderExpired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = OrderError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::ItemAddedToBasket(e) => {
                self.basket.increase_quantity(e.product_id);
            }
            OrderEvent::ItemRemovedFromBasket(e) => {
                self.basket.decrease_quantity(e.product_id);
            }
            OrderEvent::OrderSubmitted(e) => {
                self.order_number = Some(e.order_number.clone());
                self.customer_id = Some(e.customer_id);
                self.state = OrderState::Submitted;
            }
            OrderEvent::OrderConfirmed(_) => {
                self.state = OrderState::Confirmed;
            }
            OrderEvent::OrderCancelled(_) => {
                self.state = OrderState::Cancelled;
            }
            OrderEvent::OrderExpired(_) => {
                self.state = OrderState::Expired;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_order_id(command.order_id())?;

        match command {
            OrderCommand::AddItem(cmd) => self.handle_add_item(cmd),
            OrderCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            OrderCommand::Submit(cmd) => self.handle_submit(cmd),
            OrderCommand::Confirm(cmd) => self.handle_confirm(cmd),
            OrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
            OrderCommand::Expire(cmd) => self.handle_expire(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), OrderError> {
        if self.id != order_id {
            return Err(OrderError::OrderMismatch {
                command: order_id,
                aggregate: self.id,
            });
        }
        Ok(())
    }

    /// Basket changes are only allowed while the order is a draft.
    fn ensure_draft(&self) -> Result<(), OrderError> {
        match self.state {
            OrderState::Draft => Ok(()),
            OrderState::Submitted | OrderState::Confirmed | OrderState::Cancelled => {
                Err(OrderError::AlreadySubmitted)
            }
            OrderState::Expired => Err(OrderError::OrderHasExpired),
        }
    }

    /// Confirm and cancel both require a submitted order.
    fn ensure_submitted(&self) -> Result<(), OrderError> {
        match self.state {
            OrderState::Submitted => Ok(()),
            OrderState::Expired => Err(OrderError::OrderHasExpired),
            OrderState::Draft | OrderState::Confirmed | OrderState::Cancelled => {
                Err(OrderError::NotSubmitted)
            }
        }
    }

    fn handle_add_item(&self, cmd: &AddItemToBasket) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_draft()?;

        let quantity_before = self.basket.quantity(cmd.product_id);
        if quantity_before == u32::MAX {
            return Err(OrderError::QuantityLimitReached(cmd.product_id));
        }

        Ok(vec![OrderEvent::ItemAddedToBasket(ItemAddedToBasket {
            order_id: cmd.order_id,
            product_id: cmd.product_id,
            quantity_before,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(
        &self,
        cmd: &RemoveItemFromBasket,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_draft()?;

        if self.basket.quantity(cmd.product_id) == 0 {
            return Err(OrderError::CannotRemoveZeroQuantityItem(cmd.product_id));
        }

        Ok(vec![OrderEvent::ItemRemovedFromBasket(ItemRemovedFromBasket {
            order_id: cmd.order_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitOrder) -> Result<Vec<OrderEvent>, OrderError> {
        let customer_id = self.ensure_submittable(cmd.customer_id)?;

        Ok(vec![OrderEvent::OrderSubmitted(OrderSubmitted {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            customer_id,
            order_lines: self.basket.order_lines(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_submitted()?;

        Ok(vec![OrderEvent::OrderConfirmed(OrderConfirmed {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_submitted()?;

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Any order that is still open (draft or submitted) can expire.
    fn handle_expire(&self, cmd: &ExpireOrder) -> Result<Vec<OrderEvent>, OrderError> {
        match self.state {
            OrderState::Draft | OrderState::Submitted => {}
            OrderState::Confirmed => return Err(OrderError::AlreadyConfirmed),
            OrderState::Expired => return Err(OrderError::OrderHasExpired),
            OrderState::Cancelled => return Err(OrderError::AlreadyCancelled),
        }

        Ok(vec![OrderEvent::OrderExpired(OrderExpired {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderErrorKind;
    use storefront_events::execute;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn add(order_id: OrderId, product_id: ProductId) -> OrderCommand {
        OrderCommand::AddItem(AddItemToBasket {
            order_id,
            product_id,
            occurred_at: test_time(),
        })
    }

    fn remove(order_id: OrderId, product_id: ProductId) -> OrderCommand {
        OrderCommand::RemoveItem(RemoveItemFromBasket {
            order_id,
            product_id,
            occurred_at: test_time(),
        })
    }

    fn submit(order_id: OrderId, customer_id: Option<CustomerId>) -> OrderCommand {
        OrderCommand::Submit(SubmitOrder {
            order_id,
            order_number: OrderNumber::new("2019/01/60"),
            customer_id,
            occurred_at: test_time(),
        })
    }

    fn confirm(order_id: OrderId) -> OrderCommand {
        OrderCommand::Confirm(ConfirmOrder {
            order_id,
            occurred_at: test_time(),
        })
    }

    fn cancel(order_id: OrderId) -> OrderCommand {
        OrderCommand::Cancel(CancelOrder {
            order_id,
            occurred_at: test_time(),
        })
    }

    fn expire(order_id: OrderId) -> OrderCommand {
        OrderCommand::Expire(ExpireOrder {
            order_id,
            occurred_at: test_time(),
        })
    }

    fn submitted_order() -> Order {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        execute(&mut order, &add(order_id, ProductId::new())).unwrap();
        execute(&mut order, &submit(order_id, Some(CustomerId::new()))).unwrap();
        order
    }

    #[test]
    fn add_item_emits_event_with_quantity_before() {
        let order_id = test_order_id();
        let product_id = ProductId::new();
        let mut order = Order::empty(order_id);

        execute(&mut order, &add(order_id, product_id)).unwrap();
        let events = order.handle(&add(order_id, product_id)).unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            OrderEvent::ItemAddedToBasket(e) => {
                assert_eq!(e.order_id, order_id);
                assert_eq!(e.product_id, product_id);
                assert_eq!(e.quantity_before, 1);
            }
            _ => panic!("Expected ItemAddedToBasket event"),
        }
    }

    #[test]
    fn remove_item_decrements_and_deletes_at_zero() {
        let order_id = test_order_id();
        let product_id = ProductId::new();
        let mut order = Order::empty(order_id);

        execute(&mut order, &add(order_id, product_id)).unwrap();
        execute(&mut order, &add(order_id, product_id)).unwrap();
        execute(&mut order, &remove(order_id, product_id)).unwrap();
        assert_eq!(order.basket().quantity(product_id), 1);

        execute(&mut order, &remove(order_id, product_id)).unwrap();
        assert!(order.basket().is_empty());
    }

    #[test]
    fn removing_absent_item_fails_with_zero_quantity() {
        let order_id = test_order_id();
        let product_id = ProductId::new();
        let order = Order::empty(order_id);

        let err = order.handle(&remove(order_id, product_id)).unwrap_err();
        assert_eq!(err, OrderError::CannotRemoveZeroQuantityItem(product_id));
        assert_eq!(err.kind(), OrderErrorKind::Validation);
    }

    #[test]
    fn submit_snapshots_basket_lines() {
        let order_id = test_order_id();
        let a = ProductId::new();
        let b = ProductId::new();
        let customer = CustomerId::new();
        let mut order = Order::empty(order_id);
        execute(&mut order, &add(order_id, a)).unwrap();
        execute(&mut order, &add(order_id, b)).unwrap();
        execute(&mut order, &add(order_id, b)).unwrap();

        let events = execute(&mut order, &submit(order_id, Some(customer))).unwrap();
        match &events[0] {
            OrderEvent::OrderSubmitted(e) => {
                assert_eq!(e.customer_id, customer);
                assert_eq!(e.order_number.as_str(), "2019/01/60");
                assert_eq!(
                    e.order_lines,
                    vec![
                        OrderLine { product_id: a, quantity: 1 },
                        OrderLine { product_id: b, quantity: 2 },
                    ]
                );
            }
            _ => panic!("Expected OrderSubmitted event"),
        }
        assert_eq!(order.state(), OrderState::Submitted);
        assert_eq!(order.customer_id(), Some(customer));
        assert_eq!(order.order_number().map(OrderNumber::as_str), Some("2019/01/60"));
    }

    #[test]
    fn submit_without_customer_fails() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        let err = order.handle(&submit(order_id, None)).unwrap_err();
        assert_eq!(err, OrderError::MissingCustomer);
    }

    #[test]
    fn second_submit_fails_with_already_submitted() {
        let order = submitted_order();
        let err = order
            .handle(&submit(order.id_typed(), Some(CustomerId::new())))
            .unwrap_err();
        assert_eq!(err, OrderError::AlreadySubmitted);
        assert_eq!(err.kind(), OrderErrorKind::StateConflict);
    }

    #[test]
    fn confirm_before_submit_fails_with_not_submitted() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        assert_eq!(order.handle(&confirm(order_id)).unwrap_err(), OrderError::NotSubmitted);
        assert_eq!(order.handle(&cancel(order_id)).unwrap_err(), OrderError::NotSubmitted);
    }

    #[test]
    fn cannot_modify_submitted_order() {
        let order = submitted_order();
        let err = order
            .handle(&add(order.id_typed(), ProductId::new()))
            .unwrap_err();
        assert_eq!(err, OrderError::AlreadySubmitted);
    }

    #[test]
    fn confirmed_and_cancelled_orders_reject_basket_changes() {
        let mut confirmed = submitted_order();
        let confirmed_id = confirmed.id_typed();
        execute(&mut confirmed, &confirm(confirmed_id)).unwrap();

        let mut cancelled = submitted_order();
        let cancelled_id = cancelled.id_typed();
        execute(&mut cancelled, &cancel(cancelled_id)).unwrap();

        for (order, order_id) in [(&confirmed, confirmed_id), (&cancelled, cancelled_id)] {
            let in_basket = order.basket().lines()[0].product_id;
            assert_eq!(
                order.handle(&add(order_id, ProductId::new())).unwrap_err(),
                OrderError::AlreadySubmitted
            );
            assert_eq!(
                order.handle(&remove(order_id, in_basket)).unwrap_err(),
                OrderError::AlreadySubmitted
            );
        }
    }

    #[test]
    fn add_at_quantity_limit_is_rejected() {
        let order_id = test_order_id();
        let product_id = ProductId::new();
        let mut order = Order::empty(order_id);
        order.basket = Basket::with_line(product_id, u32::MAX);

        let err = order.handle(&add(order_id, product_id)).unwrap_err();
        assert_eq!(err, OrderError::QuantityLimitReached(product_id));
        assert_eq!(err.kind(), OrderErrorKind::Validation);

        // One below the limit still works, and removing restores it.
        order.basket = Basket::with_line(product_id, u32::MAX - 1);
        execute(&mut order, &add(order_id, product_id)).unwrap();
        assert_eq!(order.basket().quantity(product_id), u32::MAX);
        execute(&mut order, &remove(order_id, product_id)).unwrap();
        assert_eq!(order.basket().quantity(product_id), u32::MAX - 1);
    }

    #[test]
    fn submittable_check_matches_submit() {
        let order_id = test_order_id();
        let customer = CustomerId::new();
        let order = Order::empty(order_id);
        assert_eq!(order.ensure_submittable(Some(customer)), Ok(customer));
        assert_eq!(order.ensure_submittable(None), Err(OrderError::MissingCustomer));

        let submitted = submitted_order();
        assert_eq!(
            submitted.ensure_submittable(Some(customer)),
            Err(OrderError::AlreadySubmitted)
        );
    }

    #[test]
    fn full_lifecycle_draft_to_submitted_to_confirmed() {
        let mut order = submitted_order();
        let order_id = order.id_typed();

        execute(&mut order, &confirm(order_id)).unwrap();
        assert_eq!(order.state(), OrderState::Confirmed);

        assert_eq!(order.handle(&expire(order_id)).unwrap_err(), OrderError::AlreadyConfirmed);
        assert_eq!(order.handle(&confirm(order_id)).unwrap_err(), OrderError::NotSubmitted);
        assert_eq!(
            order.handle(&submit(order_id, Some(CustomerId::new()))).unwrap_err(),
            OrderError::AlreadySubmitted
        );
    }

    #[test]
    fn cancel_submitted_order_is_terminal() {
        let mut order = submitted_order();
        let order_id = order.id_typed();

        execute(&mut order, &cancel(order_id)).unwrap();
        assert_eq!(order.state(), OrderState::Cancelled);
        assert_eq!(order.handle(&cancel(order_id)).unwrap_err(), OrderError::NotSubmitted);
        assert_eq!(order.handle(&expire(order_id)).unwrap_err(), OrderError::AlreadyCancelled);
    }

    #[test]
    fn expired_order_rejects_everything() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        execute(&mut order, &expire(order_id)).unwrap();
        assert_eq!(order.state(), OrderState::Expired);

        for cmd in [
            add(order_id, ProductId::new()),
            remove(order_id, ProductId::new()),
            submit(order_id, Some(CustomerId::new())),
            confirm(order_id),
            cancel(order_id),
            expire(order_id),
        ] {
            assert_eq!(order.handle(&cmd).unwrap_err(), OrderError::OrderHasExpired);
        }
    }

    #[test]
    fn submitted_order_can_expire() {
        let mut order = submitted_order();
        let order_id = order.id_typed();
        execute(&mut order, &expire(order_id)).unwrap();
        assert_eq!(order.state(), OrderState::Expired);
        assert_eq!(order.handle(&confirm(order_id)).unwrap_err(), OrderError::OrderHasExpired);
    }

    #[test]
    fn command_for_another_order_is_rejected() {
        let order = Order::empty(test_order_id());
        let other = test_order_id();
        let err = order.handle(&add(other, ProductId::new())).unwrap_err();
        assert!(matches!(err, OrderError::OrderMismatch { command, .. } if command == other));
    }

    #[test]
    fn version_increments_on_apply() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        assert_eq!(order.version(), 0);

        execute(&mut order, &add(order_id, ProductId::new())).unwrap();
        assert_eq!(order.version(), 1);

        execute(&mut order, &submit(order_id, Some(CustomerId::new()))).unwrap();
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn remove_event_for_absent_product_is_harmless_on_replay() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        order.apply(&OrderEvent::ItemRemovedFromBasket(ItemRemovedFromBasket {
            order_id,
            product_id: ProductId::new(),
            occurred_at: test_time(),
        }));
        assert!(order.basket().is_empty());
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn events_survive_json_round_trip() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        execute(&mut order, &add(order_id, ProductId::new())).unwrap();
        let events = execute(&mut order, &submit(order_id, Some(CustomerId::new()))).unwrap();

        let json = serde_json::to_value(&events[0]).unwrap();
        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Add(usize),
            Remove(usize),
            Submit,
            Confirm,
            Cancel,
            Expire,
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                4 => (0usize..3).prop_map(Step::Add),
                3 => (0usize..3).prop_map(Step::Remove),
                1 => Just(Step::Submit),
                1 => Just(Step::Confirm),
                1 => Just(Step::Cancel),
                1 => Just(Step::Expire),
            ]
        }

        fn to_command(step: &Step, order_id: OrderId, products: &[ProductId]) -> OrderCommand {
            match step {
                Step::Add(i) => add(order_id, products[*i]),
                Step::Remove(i) => remove(order_id, products[*i]),
                Step::Submit => submit(order_id, Some(CustomerId::new())),
                Step::Confirm => confirm(order_id),
                Step::Cancel => cancel(order_id),
                Step::Expire => expire(order_id),
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: replaying the emitted stream rebuilds the live state.
            #[test]
            fn replay_reconstructs_live_state(steps in prop::collection::vec(step(), 0..40)) {
                let order_id = test_order_id();
                let products = [ProductId::new(), ProductId::new(), ProductId::new()];

                let mut live = Order::empty(order_id);
                let mut stream = Vec::new();
                for s in &steps {
                    if let Ok(events) = execute(&mut live, &to_command(s, order_id, &products)) {
                        stream.extend(events);
                    }
                }

                let mut replayed = Order::empty(order_id);
                replayed.replay(&stream);

                prop_assert_eq!(&replayed, &live);
                prop_assert_eq!(replayed.version(), stream.len() as u64);
                prop_assert!(live.basket().lines().iter().all(|l| l.quantity > 0));
            }

            /// Property: handle never mutates the aggregate.
            #[test]
            fn handle_does_not_mutate_state(steps in prop::collection::vec(step(), 0..20), next_step in step()) {
                let order_id = test_order_id();
                let products = [ProductId::new(), ProductId::new(), ProductId::new()];

                let mut order = Order::empty(order_id);
                for s in &steps {
                    let _ = execute(&mut order, &to_command(s, order_id, &products));
                }

                let before = order.clone();
                let _ = order.handle(&to_command(&next_step, order_id, &products));
                prop_assert_eq!(&order, &before);
            }

            /// Property: add then remove of the same product restores the basket.
            #[test]
            fn add_then_remove_round_trips_basket(adds in prop::collection::vec(0usize..3, 0..10), pick in 0usize..3) {
                let order_id = test_order_id();
                let products = [ProductId::new(), ProductId::new(), ProductId::new()];

                let mut order = Order::empty(order_id);
                for i in adds {
                    execute(&mut order, &add(order_id, products[i])).unwrap();
                }
                let before = order.basket().clone();

                execute(&mut order, &add(order_id, products[pick])).unwrap();
                execute(&mut order, &remove(order_id, products[pick])).unwrap();

                prop_assert_eq!(order.basket(), &before);
            }
        }
    }
}
