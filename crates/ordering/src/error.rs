use thiserror::Error;

use storefront_core::ProductId;

use crate::order::OrderId;

/// Rejection of an order command.
///
/// All variants are deterministic: retrying the same command against the same
/// state fails the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order has already been submitted")]
    AlreadySubmitted,

    #[error("order has not been submitted")]
    NotSubmitted,

    #[error("order has already been confirmed")]
    AlreadyConfirmed,

    #[error("order has already been cancelled")]
    AlreadyCancelled,

    #[error("order has expired")]
    OrderHasExpired,

    #[error("a customer is required to submit an order")]
    MissingCustomer,

    #[error("cannot remove product {0}: it is not in the basket")]
    CannotRemoveZeroQuantityItem(ProductId),

    #[error("product {0} is already at the maximum basket quantity")]
    QuantityLimitReached(ProductId),

    #[error("command targets order {command} but was routed to order {aggregate}")]
    OrderMismatch { command: OrderId, aggregate: OrderId },
}

/// Coarse classification of an [`OrderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderErrorKind {
    /// Command issued against an order in an incompatible lifecycle state.
    StateConflict,
    /// Command arguments inconsistent with the order's current data.
    Validation,
}

impl OrderError {
    pub fn kind(&self) -> OrderErrorKind {
        match self {
            OrderError::AlreadySubmitted
            | OrderError::NotSubmitted
            | OrderError::AlreadyConfirmed
            | OrderError::AlreadyCancelled
            | OrderError::OrderHasExpired => OrderErrorKind::StateConflict,
            OrderError::MissingCustomer
            | OrderError::CannotRemoveZeroQuantityItem(_)
            | OrderError::QuantityLimitReached(_)
            | OrderError::OrderMismatch { .. } => OrderErrorKind::Validation,
        }
    }
}
