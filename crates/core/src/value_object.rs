//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances holding the same attribute
/// values are interchangeable. In this system that covers basket lines, time
/// windows and calculated amounts.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct OrderLine {
///     product_id: ProductId,
///     quantity: u32,
/// }
///
/// impl ValueObject for OrderLine {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
