//! Claim history read model, built from `DividendsClaimed` logs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::LedgerEvent;
use estate_events::{EventEnvelope, LogPosition, Projection};

/// One confirmed claim as shown in an investor's history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimHistoryRow {
    pub tx_hash: String,
    pub position: LogPosition,
    pub property_id: PropertyId,
    pub property_name: String,
    #[serde(with = "estate_dividends::amount_serde")]
    pub amount: u128,
    pub block_time: DateTime<Utc>,
}

/// Per-investor claim rows.
///
/// Rows are keyed by chain position, so a redelivered log never adds a second row.
#[derive(Debug, Default, Clone)]
pub struct ClaimHistory {
    rows: HashMap<InvestorAddress, Vec<ClaimHistoryRow>>,
}

impl ClaimHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims by one investor, newest first.
    pub fn for_investor(&self, investor: InvestorAddress) -> Vec<ClaimHistoryRow> {
        let mut rows = self.rows.get(&investor).cloned().unwrap_or_default();
        rows.sort_by(|a, b| b.position.cmp(&a.position));
        rows
    }

    pub fn total_claimed(&self, investor: InvestorAddress) -> u128 {
        self.rows
            .get(&investor)
            .map(|rows| rows.iter().fold(0u128, |acc, r| acc.saturating_add(r.amount)))
            .unwrap_or(0)
    }

    /// Total claimed by one investor from one property, according to the logs.
    pub fn claimed_from(&self, investor: InvestorAddress, property_id: PropertyId) -> u128 {
        self.rows
            .get(&investor)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.property_id == property_id)
                    .fold(0u128, |acc, r| acc.saturating_add(r.amount))
            })
            .unwrap_or(0)
    }
}

impl Projection for ClaimHistory {
    type Ev = LedgerEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        let LedgerEvent::DividendsClaimed(event) = envelope.payload() else {
            return;
        };

        let rows = self.rows.entry(event.investor).or_default();
        if rows.iter().any(|r| r.position == envelope.position()) {
            return;
        }
        rows.push(ClaimHistoryRow {
            tx_hash: envelope.tx_hash().to_string(),
            position: envelope.position(),
            property_id: event.property_id,
            property_name: event.property_name.clone(),
            amount: event.amount,
            block_time: event.block_time,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_dividends::{DividendsClaimed, DividendsDistributed};

    fn addr(byte: u8) -> InvestorAddress {
        InvestorAddress::from_bytes([byte; 20])
    }

    fn claimed(block: u64, property: u64, investor: u8, amount: u128) -> EventEnvelope<LedgerEvent> {
        EventEnvelope::new(
            format!("0x{block:x}"),
            LogPosition::new(block, 0),
            LedgerEvent::DIVIDENDS_CLAIMED,
            LedgerEvent::DividendsClaimed(DividendsClaimed {
                property_id: PropertyId::new(property),
                property_name: format!("Property {property}"),
                investor: addr(investor),
                amount,
                block_time: DateTime::<Utc>::UNIX_EPOCH,
            }),
        )
    }

    #[test]
    fn rows_are_newest_first_and_totalled() {
        let mut history = ClaimHistory::new();
        history.apply(&claimed(3, 1, 0x01, 100));
        history.apply(&claimed(9, 2, 0x01, 50));
        history.apply(&claimed(5, 1, 0x02, 7));

        let rows = history.for_investor(addr(0x01));
        let blocks: Vec<_> = rows.iter().map(|r| r.position.block_number).collect();
        assert_eq!(blocks, vec![9, 3]);
        assert_eq!(history.total_claimed(addr(0x01)), 150);
        assert_eq!(history.claimed_from(addr(0x01), PropertyId::new(1)), 100);
        assert_eq!(history.total_claimed(addr(0x03)), 0);
    }

    #[test]
    fn redelivered_log_is_counted_once() {
        let mut history = ClaimHistory::new();
        let env = claimed(4, 1, 0x01, 10);
        history.apply(&env);
        history.apply(&env);
        assert_eq!(history.total_claimed(addr(0x01)), 10);
    }

    #[test]
    fn other_events_are_ignored() {
        let mut history = ClaimHistory::new();
        history.apply(&EventEnvelope::new(
            "0x1",
            LogPosition::new(1, 0),
            LedgerEvent::DIVIDENDS_DISTRIBUTED,
            LedgerEvent::DividendsDistributed(DividendsDistributed {
                property_id: PropertyId::new(1),
                amount: 10,
                block_time: DateTime::<Utc>::UNIX_EPOCH,
            }),
        ));
        assert!(history.for_investor(addr(0x01)).is_empty());
    }
}
