//! Events emitted by the tokenization contract, as typed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use estate_core::{InvestorAddress, PropertyId};
use estate_events::{DecodeError, Event, EventEnvelope};

/// Event: DividendsClaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendsClaimed {
    pub property_id: PropertyId,
    pub property_name: String,
    pub investor: InvestorAddress,
    #[serde(with = "crate::amount_serde")]
    pub amount: u128,
    pub block_time: DateTime<Utc>,
}

/// Event: DividendsDistributed (an owner deposit into the pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendsDistributed {
    pub property_id: PropertyId,
    #[serde(with = "crate::amount_serde")]
    pub amount: u128,
    pub block_time: DateTime<Utc>,
}

/// Event: TokensPurchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensPurchased {
    pub property_id: PropertyId,
    pub buyer: InvestorAddress,
    pub amount: u64,
    #[serde(with = "crate::amount_serde")]
    pub cost: u128,
    pub block_time: DateTime<Utc>,
}

/// Event: TokensSold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensSold {
    pub property_id: PropertyId,
    pub seller: InvestorAddress,
    pub amount: u64,
    pub block_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    DividendsClaimed(DividendsClaimed),
    DividendsDistributed(DividendsDistributed),
    TokensPurchased(TokensPurchased),
    TokensSold(TokensSold),
}

impl LedgerEvent {
    pub const DIVIDENDS_CLAIMED: &'static str = "DividendsClaimed";
    pub const DIVIDENDS_DISTRIBUTED: &'static str = "DividendsDistributed";
    pub const TOKENS_PURCHASED: &'static str = "TokensPurchased";
    pub const TOKENS_SOLD: &'static str = "TokensSold";

    /// Decode a raw log by its ABI event name. Logs of other events yield `None`.
    pub fn decode(raw: &EventEnvelope<JsonValue>) -> Result<Option<EventEnvelope<LedgerEvent>>, DecodeError> {
        let decoded = match raw.event_name() {
            Self::DIVIDENDS_CLAIMED => raw.decode::<DividendsClaimed>()?.map_payload(LedgerEvent::DividendsClaimed),
            Self::DIVIDENDS_DISTRIBUTED => raw.decode::<DividendsDistributed>()?.map_payload(LedgerEvent::DividendsDistributed),
            Self::TOKENS_PURCHASED => raw.decode::<TokensPurchased>()?.map_payload(LedgerEvent::TokensPurchased),
            Self::TOKENS_SOLD => raw.decode::<TokensSold>()?.map_payload(LedgerEvent::TokensSold),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    pub fn abi_name(&self) -> &'static str {
        match self {
            LedgerEvent::DividendsClaimed(_) => Self::DIVIDENDS_CLAIMED,
            LedgerEvent::DividendsDistributed(_) => Self::DIVIDENDS_DISTRIBUTED,
            LedgerEvent::TokensPurchased(_) => Self::TOKENS_PURCHASED,
            LedgerEvent::TokensSold(_) => Self::TOKENS_SOLD,
        }
    }

    /// JSON payload in the shape the adapter delivers logs.
    pub fn to_payload(&self) -> JsonValue {
        let value = match self {
            LedgerEvent::DividendsClaimed(e) => serde_json::to_value(e),
            LedgerEvent::DividendsDistributed(e) => serde_json::to_value(e),
            LedgerEvent::TokensPurchased(e) => serde_json::to_value(e),
            LedgerEvent::TokensSold(e) => serde_json::to_value(e),
        };
        // Plain structs of strings and integers always serialize.
        value.unwrap_or(JsonValue::Null)
    }

    pub fn property_id(&self) -> PropertyId {
        match self {
            LedgerEvent::DividendsClaimed(e) => e.property_id,
            LedgerEvent::DividendsDistributed(e) => e.property_id,
            LedgerEvent::TokensPurchased(e) => e.property_id,
            LedgerEvent::TokensSold(e) => e.property_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::DividendsClaimed(_) => "dividends.claimed",
            LedgerEvent::DividendsDistributed(_) => "dividends.distributed",
            LedgerEvent::TokensPurchased(_) => "tokens.purchased",
            LedgerEvent::TokensSold(_) => "tokens.sold",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::DividendsClaimed(e) => e.block_time,
            LedgerEvent::DividendsDistributed(e) => e.block_time,
            LedgerEvent::TokensPurchased(e) => e.block_time,
            LedgerEvent::TokensSold(e) => e.block_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_events::LogPosition;
    use serde_json::json;

    #[test]
    fn decodes_claim_log_by_abi_name() {
        let raw = EventEnvelope::new(
            "0xbeef",
            LogPosition::new(12, 0),
            "DividendsClaimed",
            json!({
                "propertyId": 3,
                "propertyName": "Kilimani Heights",
                "investor": "0x0101010101010101010101010101010101010101",
                "amount": "5000000000000000",
                "blockTime": "2025-01-02T03:04:05Z",
            }),
        );

        let env = LedgerEvent::decode(&raw).unwrap().unwrap();
        match env.payload() {
            LedgerEvent::DividendsClaimed(e) => {
                assert_eq!(e.property_id, PropertyId::new(3));
                assert_eq!(e.amount, 5 * 10u128.pow(15));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(env.payload().event_type(), "dividends.claimed");
    }

    #[test]
    fn unknown_logs_are_skipped_and_bad_payloads_fail() {
        let other = EventEnvelope::new("0x1", LogPosition::new(1, 0), "OwnershipTransferred", json!({}));
        assert!(LedgerEvent::decode(&other).unwrap().is_none());

        let bad = EventEnvelope::new("0x2", LogPosition::new(1, 1), "DividendsDistributed", json!({ "amount": "x" }));
        assert!(LedgerEvent::decode(&bad).is_err());
    }
}
