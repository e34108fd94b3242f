use chrono::{DateTime, Utc};

/// A fact emitted by the ledger.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - ordered only by their chain position, which matters for display, not balances
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "dividends.claimed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Block time at which the event was emitted.
    fn occurred_at(&self) -> DateTime<Utc>;
}
