use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Position of a log inside the chain: block first, then index within the block.
///
/// Derived ordering is the chain order, so positions can be compared directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u32,
}

impl LogPosition {
    pub const fn new(block_number: u64, log_index: u32) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl core::fmt::Display for LogPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

#[derive(Debug, Error)]
#[error("failed to decode {event_name} at {position}: {source}")]
pub struct DecodeError {
    pub event_name: String,
    pub position: LogPosition,
    #[source]
    pub source: serde_json::Error,
}

/// Envelope for a ledger log: the transaction that emitted it, where it sits in the
/// chain, and the decoded payload.
///
/// Logs arrive from the ledger adapter with a JSON payload (`EventEnvelope<JsonValue>`)
/// and are decoded into typed events with [`EventEnvelope::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    tx_hash: String,
    position: LogPosition,

    /// ABI event name as emitted by the contract (e.g. "DividendsClaimed").
    event_name: String,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        tx_hash: impl Into<String>,
        position: LogPosition,
        event_name: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            position,
            event_name: event_name.into(),
            payload,
        }
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            tx_hash: self.tx_hash,
            position: self.position,
            event_name: self.event_name,
            payload: f(self.payload),
        }
    }
}

impl EventEnvelope<JsonValue> {
    /// Decode the raw JSON payload into a typed event, keeping chain metadata.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<EventEnvelope<T>, DecodeError> {
        let payload = serde_json::from_value(self.payload.clone()).map_err(|source| DecodeError {
            event_name: self.event_name.clone(),
            position: self.position,
            source,
        })?;
        Ok(EventEnvelope {
            tx_hash: self.tx_hash.clone(),
            position: self.position,
            event_name: self.event_name.clone(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Deposit {
        amount: u64,
    }

    #[test]
    fn positions_order_by_block_then_log_index() {
        assert!(LogPosition::new(1, 9) < LogPosition::new(2, 0));
        assert!(LogPosition::new(2, 0) < LogPosition::new(2, 1));
    }

    #[test]
    fn decode_keeps_chain_metadata() {
        let raw = EventEnvelope::new("0xabc", LogPosition::new(7, 2), "Deposit", json!({ "amount": 5 }));
        let typed: EventEnvelope<Deposit> = raw.decode().unwrap();
        assert_eq!(typed.tx_hash(), "0xabc");
        assert_eq!(typed.position(), LogPosition::new(7, 2));
        assert_eq!(typed.payload(), &Deposit { amount: 5 });
    }

    #[test]
    fn decode_failure_reports_position() {
        let raw = EventEnvelope::new("0xabc", LogPosition::new(7, 2), "Deposit", json!({ "amount": "x" }));
        let err = raw.decode::<Deposit>().unwrap_err();
        assert_eq!(err.position, LogPosition::new(7, 2));
        assert!(err.to_string().contains("Deposit"));
    }
}
