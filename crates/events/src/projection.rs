use crate::{Event, EventEnvelope};

/// A projection builds a read model (claim history, distribution history) from the
/// ledger's event stream.
///
/// Read models are **disposable**: the ledger's logs are the source of truth and a
/// projection can be thrown away and rebuilt by rescanning from the first block.
///
/// ## Idempotency
///
/// Logs are delivered at least once (a rescan overlaps what was already seen), so
/// applying the same envelope twice must not double-count. `ProjectionRunner`
/// skips positions it has already applied; projections should still key rows by
/// chain position where they can.
///
/// ## Error Handling
///
/// `apply` doesn't return errors. Events that are irrelevant to the read model are
/// ignored; decoding failures are handled before the envelope reaches the projection.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
