//! Application services: the command entry points of the storefront.
//!
//! Each operation stamps the command with the injected clock, runs it through
//! the [`CommandDispatcher`](crate::command_dispatcher::CommandDispatcher) and
//! retries the whole cycle on optimistic concurrency conflicts, up to the
//! configured number of times.

pub mod error;
pub mod ordering;
pub mod pricing;

pub use error::ServiceError;
pub use ordering::OrderingService;
pub use pricing::PricingService;
