//! Dashboard folds over per-property results.

use serde::{Deserialize, Serialize};

use estate_core::{InvestorAddress, PropertyId};

use crate::accountant::Unclaimed;
use crate::error::DividendError;
use crate::property::{AccountSnapshot, Property};

/// Dividend figures for one line, or why they can't be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineStatus {
    Available {
        #[serde(with = "crate::amount_serde")]
        entitlement: u128,
        unclaimed: Unclaimed,
    },
    /// Upstream data is corrupt for this property; the rest of the view still renders.
    Unavailable { error: DividendError },
}

/// One held property in an investor's portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioLine {
    pub property_id: PropertyId,
    pub tokens: u64,
    /// `tokens * token_price`, in smallest units.
    #[serde(with = "crate::amount_serde")]
    pub position_value: u128,
    #[serde(with = "crate::amount_serde")]
    pub claimed: u128,
    pub status: LineStatus,
}

impl PortfolioLine {
    pub fn from_snapshot(snapshot: &AccountSnapshot) -> Self {
        let status = match snapshot.assess() {
            Ok(a) => LineStatus::Available {
                entitlement: a.entitlement,
                unclaimed: a.unclaimed,
            },
            Err(error) => LineStatus::Unavailable { error },
        };

        Self {
            property_id: snapshot.property.id,
            tokens: snapshot.holding.balance,
            position_value: snapshot
                .property
                .token_price
                .saturating_mul(u128::from(snapshot.holding.balance)),
            claimed: snapshot.record.claimed_amount,
            status,
        }
    }

    /// Unclaimed amount clamped at zero; zero for unavailable lines.
    pub fn payable(&self) -> u128 {
        match &self.status {
            LineStatus::Available { unclaimed, .. } => unclaimed.payable(),
            LineStatus::Unavailable { .. } => 0,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, LineStatus::Available { .. })
    }
}

/// An investor's portfolio with totals across properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorDashboard {
    pub investor: InvestorAddress,
    pub lines: Vec<PortfolioLine>,
    #[serde(with = "crate::amount_serde")]
    pub total_claimed: u128,
    /// Sum of `max(unclaimed, 0)` over available lines.
    #[serde(with = "crate::amount_serde")]
    pub total_unclaimed: u128,
    #[serde(with = "crate::amount_serde")]
    pub total_value: u128,
    pub total_tokens: u64,
}

impl InvestorDashboard {
    pub fn fold(investor: InvestorAddress, lines: Vec<PortfolioLine>) -> Self {
        let mut dashboard = Self {
            investor,
            lines: Vec::new(),
            total_claimed: 0,
            total_unclaimed: 0,
            total_value: 0,
            total_tokens: 0,
        };

        for line in &lines {
            dashboard.total_claimed = dashboard.total_claimed.saturating_add(line.claimed);
            dashboard.total_unclaimed = dashboard.total_unclaimed.saturating_add(line.payable());
            dashboard.total_value = dashboard.total_value.saturating_add(line.position_value);
            dashboard.total_tokens = dashboard.total_tokens.saturating_add(line.tokens);
        }
        dashboard.lines = lines;
        dashboard
    }

    pub fn from_snapshots<'a>(
        investor: InvestorAddress,
        snapshots: impl IntoIterator<Item = &'a AccountSnapshot>,
    ) -> Self {
        let lines = snapshots.into_iter().map(PortfolioLine::from_snapshot).collect();
        Self::fold(investor, lines)
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &PortfolioLine> {
        self.lines.iter().filter(|l| !l.is_available())
    }
}

/// Totals over the properties a single owner tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub owner: InvestorAddress,
    pub property_count: usize,
    pub tokens_total: u64,
    pub tokens_sold: u64,
    /// Proceeds of token sales at current prices, in smallest units.
    #[serde(with = "crate::amount_serde")]
    pub sales_value: u128,
    #[serde(with = "crate::amount_serde")]
    pub dividends_deposited: u128,
}

impl OwnerSummary {
    /// Properties not owned by `owner` are skipped.
    pub fn fold<'a>(owner: InvestorAddress, properties: impl IntoIterator<Item = &'a Property>) -> Self {
        let mut summary = Self {
            owner,
            property_count: 0,
            tokens_total: 0,
            tokens_sold: 0,
            sales_value: 0,
            dividends_deposited: 0,
        };

        for p in properties.into_iter().filter(|p| p.owner == owner) {
            summary.property_count += 1;
            summary.tokens_total = summary.tokens_total.saturating_add(p.total_tokens);
            summary.tokens_sold = summary.tokens_sold.saturating_add(p.tokens_sold);
            summary.sales_value = summary
                .sales_value
                .saturating_add(p.token_price.saturating_mul(u128::from(p.tokens_sold)));
            summary.dividends_deposited = summary.dividends_deposited.saturating_add(p.total_dividends);
        }
        summary
    }
}
