//! Dividend deposits per property, built from `DividendsDistributed` logs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use estate_core::PropertyId;
use estate_dividends::LedgerEvent;
use estate_events::{EventEnvelope, LogPosition, Projection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionRow {
    pub tx_hash: String,
    pub position: LogPosition,
    #[serde(with = "estate_dividends::amount_serde")]
    pub amount: u128,
    /// Total deposited into the property up to and including this row.
    #[serde(with = "estate_dividends::amount_serde")]
    pub running_total: u128,
    pub block_time: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct DistributionHistory {
    rows: BTreeMap<PropertyId, Vec<DistributionRow>>,
}

impl DistributionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposits into one property, newest first.
    pub fn for_property(&self, property_id: PropertyId) -> Vec<DistributionRow> {
        let mut rows = self.rows.get(&property_id).cloned().unwrap_or_default();
        rows.reverse();
        rows
    }

    pub fn total_distributed(&self, property_id: PropertyId) -> u128 {
        self.rows
            .get(&property_id)
            .and_then(|rows| rows.last())
            .map(|r| r.running_total)
            .unwrap_or(0)
    }

    /// Total distributed per property, for owner dashboards.
    pub fn totals(&self) -> BTreeMap<PropertyId, u128> {
        self.rows
            .keys()
            .map(|id| (*id, self.total_distributed(*id)))
            .collect()
    }
}

impl Projection for DistributionHistory {
    type Ev = LedgerEvent;

    /// Envelopes must arrive in chain order (the runner sorts them); a log at or
    /// before the last row's position is a redelivery and is skipped.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        let LedgerEvent::DividendsDistributed(event) = envelope.payload() else {
            return;
        };

        let rows = self.rows.entry(event.property_id).or_default();
        let previous = rows.last();
        if previous.is_some_and(|r| r.position >= envelope.position()) {
            return;
        }

        let running_total = previous.map_or(0, |r| r.running_total).saturating_add(event.amount);
        rows.push(DistributionRow {
            tx_hash: envelope.tx_hash().to_string(),
            position: envelope.position(),
            amount: event.amount,
            running_total,
            block_time: event.block_time,
        });
    }
}
