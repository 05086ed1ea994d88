use storefront_core::AggregateId;

/// A command targets exactly one aggregate instance.
///
/// Commands are transient intent; the events they produce are what gets
/// persisted. The target id is what the dispatcher uses to pick the stream,
/// so commands for different ids can run fully in parallel while commands
/// for the same id are serialized by the stream's expected version.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
