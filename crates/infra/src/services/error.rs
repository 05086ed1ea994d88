use thiserror::Error;

use storefront_core::DomainError;
use storefront_ordering::OrderError;
use storefront_pricing::PricingError;

use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStoreError;

/// Failure of a storefront operation.
///
/// Domain rejections keep their typed error; infrastructure failures are
/// flattened. Only [`ServiceError::Concurrency`] is retryable.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    #[error("event publication failed: {0}")]
    Publish(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Concurrency(_))
    }
}

impl<E> From<DispatchError<E>> for ServiceError
where
    E: Into<ServiceError>,
{
    fn from(value: DispatchError<E>) -> Self {
        match value {
            DispatchError::Domain(e) => e.into(),
            DispatchError::Concurrency(msg) => ServiceError::Concurrency(msg),
            DispatchError::Deserialize(msg) => ServiceError::Deserialize(msg),
            DispatchError::Store(e) => ServiceError::Store(e),
            DispatchError::Publish(msg) => ServiceError::Publish(msg),
        }
    }
}

impl From<EventStoreError> for ServiceError {
    fn from(value: EventStoreError) -> Self {
        DispatchError::<ServiceError>::from(value).into()
    }
}
