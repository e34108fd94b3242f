//! Ledger events: the payload trait, chain-positioned envelopes and read-model
//! projections rebuilt from them.

pub mod envelope;
pub mod event;
pub mod projection;
pub mod runner;

pub use envelope::{DecodeError, EventEnvelope, LogPosition};
pub use event::Event;
pub use projection::Projection;
pub use runner::ProjectionRunner;
