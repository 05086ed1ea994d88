use chrono::{DateTime, Utc};

/// A domain event: an immutable, append-only fact.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name used for storage and filtered reads
    /// (e.g. "ordering.order.item_added_to_basket").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
