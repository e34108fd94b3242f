//! Entity trait: ledger records with a stable identity.

/// A ledger record whose identity survives changes to its fields.
///
/// A property keeps its id while dividends accrue and tokens change hands; two
/// snapshots of it taken at different blocks are the same entity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
