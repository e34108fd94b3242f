//! Keeps the history read models in step with the ledger's logs.

use std::sync::Arc;

use tokio::sync::Mutex;

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::LedgerEvent;
use estate_events::{EventEnvelope, LogPosition, ProjectionRunner};

use crate::ledger::{DividendLedger, LedgerError};
use crate::projections::claim_history::{ClaimHistory, ClaimHistoryRow};
use crate::projections::distribution_history::{DistributionHistory, DistributionRow};

struct Runners {
    claims: ProjectionRunner<ClaimHistory>,
    distributions: ProjectionRunner<DistributionHistory>,
}

impl Runners {
    fn new() -> Self {
        Self {
            claims: ProjectionRunner::new(ClaimHistory::new()),
            distributions: ProjectionRunner::new(DistributionHistory::new()),
        }
    }

    /// Latest position either runner has applied.
    fn cursor(&self) -> Option<LogPosition> {
        self.claims.cursor().max(self.distributions.cursor())
    }
}

/// What one sync pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub applied: usize,
    /// Logs whose payload could not be decoded; skipped.
    pub malformed: usize,
}

/// Pulls logs from the ledger and feeds the claim and distribution histories.
///
/// Each pass rescans from the block of the last applied log; the overlap is
/// dropped by the runners' cursors.
pub struct HistoryIndexer<L: DividendLedger> {
    ledger: Arc<L>,
    from_block: u64,
    runners: Mutex<Runners>,
}

impl<L: DividendLedger> HistoryIndexer<L> {
    pub fn new(ledger: Arc<L>, from_block: u64) -> Self {
        Self {
            ledger,
            from_block,
            runners: Mutex::new(Runners::new()),
        }
    }

    pub async fn sync(&self) -> Result<SyncReport, LedgerError> {
        let mut runners = self.runners.lock().await;
        let start = runners
            .cursor()
            .map_or(self.from_block, |c| c.block_number.max(self.from_block));

        let raw = self.ledger.logs(start).await.map_err(|e| {
            tracing::error!(from_block = start, error = %e, "failed to fetch ledger logs");
            e
        })?;

        let mut report = SyncReport {
            fetched: raw.len(),
            ..SyncReport::default()
        };
        let mut decoded: Vec<EventEnvelope<LedgerEvent>> = Vec::with_capacity(raw.len());
        for log in &raw {
            match LedgerEvent::decode(log) {
                Ok(Some(env)) => decoded.push(env),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(tx_hash = %log.tx_hash(), error = %e, "skipping malformed ledger log");
                    report.malformed += 1;
                }
            }
        }

        let claims = runners.claims.run(&decoded);
        let distributions = runners.distributions.run(&decoded);
        report.applied = claims.max(distributions);

        tracing::debug!(
            from_block = start,
            fetched = report.fetched,
            applied = report.applied,
            "history synced"
        );
        Ok(report)
    }

    /// Throw the read models away and rescan from the configured first block.
    pub async fn rebuild(&self) -> Result<SyncReport, LedgerError> {
        *self.runners.lock().await = Runners::new();
        self.sync().await
    }

    pub async fn claim_history(&self, investor: InvestorAddress) -> Vec<ClaimHistoryRow> {
        self.runners.lock().await.claims.projection().for_investor(investor)
    }

    pub async fn total_claimed(&self, investor: InvestorAddress) -> u128 {
        self.runners.lock().await.claims.projection().total_claimed(investor)
    }

    pub async fn distributions(&self, property_id: PropertyId) -> Vec<DistributionRow> {
        self.runners
            .lock()
            .await
            .distributions
            .projection()
            .for_property(property_id)
    }

    pub async fn total_distributed(&self, property_id: PropertyId) -> u128 {
        self.runners
            .lock()
            .await
            .distributions
            .projection()
            .total_distributed(property_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use estate_dividends::ClaimIntent;

    fn addr(byte: u8) -> InvestorAddress {
        InvestorAddress::from_bytes([byte; 20])
    }

    async fn ledger_with_history() -> (Arc<InMemoryLedger>, PropertyId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.tokenize(addr(0xee), "Kileleshwa Towers", 100, 1, "").unwrap();
        ledger.buy(id, addr(0x01), 40).unwrap();
        ledger.deposit_dividends(id, addr(0xee), 1_000).await.unwrap();
        ledger
            .submit_claim(&ClaimIntent {
                property_id: id,
                investor: addr(0x01),
            })
            .await
            .unwrap();
        (ledger, id)
    }

    #[tokio::test]
    async fn repeated_syncs_do_not_double_count() {
        let (ledger, id) = ledger_with_history().await;
        let indexer = HistoryIndexer::new(Arc::clone(&ledger), 0);

        let first = indexer.sync().await.unwrap();
        assert_eq!(first.malformed, 0);
        let second = indexer.sync().await.unwrap();
        assert_eq!(second.applied, 0);

        assert_eq!(indexer.total_claimed(addr(0x01)).await, 400);
        assert_eq!(indexer.total_distributed(id).await, 1_000);

        ledger.deposit_dividends(id, addr(0xee), 500).await.unwrap();
        indexer.sync().await.unwrap();
        let rows = indexer.distributions(id).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].running_total, 1_500);
    }

    #[tokio::test]
    async fn history_matches_ledger_claimed_amount_after_rebuild() {
        let (ledger, id) = ledger_with_history().await;
        let indexer = HistoryIndexer::new(Arc::clone(&ledger), 0);
        indexer.sync().await.unwrap();
        indexer.rebuild().await.unwrap();

        let rows = indexer.claim_history(addr(0x01)).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].property_name, "Kileleshwa Towers");
        assert_eq!(rows[0].amount, ledger.claimed(id, addr(0x01)).await.unwrap());
    }
}
