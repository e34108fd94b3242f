//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Snapshots mirrored from the ledger are value objects: a fresh read replaces the
/// previous copy wholesale, it is never patched in place. Two snapshots with the
/// same fields are the same snapshot.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
