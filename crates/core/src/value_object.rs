//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two value objects
/// with the same attribute values are equal. "Modifying" one means constructing
/// a new one. Entities, by contrast, are identified by their id.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
