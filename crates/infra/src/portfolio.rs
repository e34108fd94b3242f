//! Investor and owner views assembled from fresh ledger reads.

use std::sync::Arc;

use thiserror::Error;

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::trade::deposit_from_display;
use estate_dividends::{
    ClaimKey, ConversionError, DisplayAmount, DisplayRate, InvestorDashboard, OwnerSummary, PortfolioLine, SubmissionFailure, TradeError,
};

use crate::cache::SnapshotCache;
use crate::ledger::{DividendLedger, LedgerError, TxReceipt};

#[derive(Debug, Error)]
pub enum DepositError {
    #[error("invalid deposit: {0}")]
    Invalid(#[from] TradeError),

    #[error(transparent)]
    Submission(#[from] SubmissionFailure),
}

pub struct PortfolioService<L: DividendLedger> {
    ledger: Arc<L>,
    cache: Arc<SnapshotCache>,
    rate: DisplayRate,
}

impl<L: DividendLedger> PortfolioService<L> {
    pub fn new(ledger: Arc<L>, cache: Arc<SnapshotCache>, rate: DisplayRate) -> Self {
        Self { ledger, cache, rate }
    }

    pub fn rate(&self) -> &DisplayRate {
        &self.rate
    }

    /// Presentation-only conversion of a ledger amount.
    pub fn display(&self, amount: u128) -> Result<DisplayAmount, ConversionError> {
        self.rate.to_display(amount)
    }

    /// Every property the investor holds, re-read from the ledger.
    ///
    /// Properties with corrupt data show up as unavailable lines; a property the
    /// ledger no longer knows is left out. Transport errors fail the whole view.
    pub async fn dashboard(&self, investor: InvestorAddress) -> Result<InvestorDashboard, LedgerError> {
        let property_ids = self.ledger.investor_properties(investor).await?;

        let mut lines: Vec<PortfolioLine> = Vec::with_capacity(property_ids.len());
        for property_id in property_ids {
            let key = ClaimKey::new(property_id, investor);
            match self.cache.refresh(self.ledger.as_ref(), key).await {
                Ok(snapshot) => {
                    let line = PortfolioLine::from_snapshot(&snapshot);
                    if !line.is_available() {
                        tracing::warn!(
                            property_id = %property_id,
                            investor = %investor,
                            "dividends unavailable for property"
                        );
                    }
                    lines.push(line);
                }
                Err(LedgerError::PropertyNotFound(_)) => {
                    tracing::warn!(property_id = %property_id, investor = %investor, "held property not found on ledger");
                }
                Err(e) => {
                    tracing::error!(investor = %investor, error = %e, "dashboard read failed");
                    return Err(e);
                }
            }
        }

        Ok(InvestorDashboard::fold(investor, lines))
    }

    pub async fn owner_summary(&self, owner: InvestorAddress) -> Result<OwnerSummary, LedgerError> {
        let properties = self.ledger.owner_properties(owner).await?;
        Ok(OwnerSummary::fold(owner, &properties))
    }

    /// Deposit dividends entered in display-currency cents.
    ///
    /// The amount is converted at the configured rate (floored); an amount that
    /// converts to zero units is refused before anything is sent.
    pub async fn deposit_dividends(
        &self,
        property_id: PropertyId,
        owner: InvestorAddress,
        cents: u128,
    ) -> Result<TxReceipt, DepositError> {
        let amount = deposit_from_display(cents, &self.rate)?;

        match self.ledger.deposit_dividends(property_id, owner, amount).await {
            Ok(receipt) => {
                self.cache.invalidate_property(property_id);
                tracing::info!(
                    property_id = %property_id,
                    owner = %owner,
                    amount = %amount,
                    tx_hash = %receipt.tx_hash,
                    "dividends deposited"
                );
                Ok(receipt)
            }
            Err(failure) => {
                tracing::warn!(property_id = %property_id, owner = %owner, failure = %failure, "deposit failed");
                Err(failure.into())
            }
        }
    }
}
