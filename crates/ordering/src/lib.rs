//! Ordering domain module (event-sourced).
//!
//! Business rules for the order lifecycle and its basket, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod basket;
pub mod error;
pub mod number;
pub mod order;

pub use basket::{Basket, OrderLine};
pub use error::{OrderError, OrderErrorKind};
pub use number::{FixedNumberGenerator, MonthlyNumberGenerator, NumberGenerator};
pub use order::{
    AddItemToBasket, CancelOrder, ConfirmOrder, ExpireOrder, ItemAddedToBasket,
    ItemRemovedFromBasket, Order, OrderCancelled, OrderCommand, OrderConfirmed, OrderEvent,
    OrderExpired, OrderId, OrderNumber, OrderState, OrderSubmitted, RemoveItemFromBasket,
    SubmitOrder,
};
