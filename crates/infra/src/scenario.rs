//! Scripted replays against the in-memory ledger.
//!
//! A scenario lists properties to tokenize and a sequence of steps (trades,
//! deposits, claims, views). Properties get ids 1, 2, ... in listing order.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::{ClaimKey, InvestorDashboard, OwnerSummary};

use crate::cache::SnapshotCache;
use crate::config::Settings;
use crate::coordinator::{ClaimCoordinator, ClaimOutcome};
use crate::ledger::InMemoryLedger;
use crate::portfolio::PortfolioService;
use crate::projections::{ClaimHistoryRow, HistoryIndexer};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub properties: Vec<PropertySetup>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertySetup {
    pub name: String,
    pub owner: InvestorAddress,
    pub total_tokens: u64,
    #[serde(with = "estate_dividends::amount_serde")]
    pub token_price: u128,
    #[serde(default)]
    pub metadata_cid: String,
}

fn connected() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Buy {
        property: PropertyId,
        investor: InvestorAddress,
        tokens: u64,
    },
    Sell {
        property: PropertyId,
        investor: InvestorAddress,
        tokens: u64,
    },
    /// Owner deposit entered in display-currency cents.
    Deposit {
        property: PropertyId,
        owner: InvestorAddress,
        #[serde(with = "estate_dividends::amount_serde")]
        cents: u128,
    },
    SetActive {
        property: PropertyId,
        active: bool,
    },
    /// The next signature request is declined by the user.
    RejectNextSignature,
    Claim {
        property: PropertyId,
        investor: InvestorAddress,
        /// `false` claims with no wallet connected.
        #[serde(default = "connected")]
        connected: bool,
    },
    Dashboard {
        investor: InvestorAddress,
    },
    OwnerSummary {
        owner: InvestorAddress,
    },
    History {
        investor: InvestorAddress,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Buy { .. } => "buy",
            Step::Sell { .. } => "sell",
            Step::Deposit { .. } => "deposit",
            Step::SetActive { .. } => "set_active",
            Step::RejectNextSignature => "reject_next_signature",
            Step::Claim { .. } => "claim",
            Step::Dashboard { .. } => "dashboard",
            Step::OwnerSummary { .. } => "owner_summary",
            Step::History { .. } => "history",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum StepReport {
    Done {
        op: &'static str,
        tx_hash: Option<String>,
    },
    Claim {
        outcome: ClaimOutcome,
        paid_display: Option<String>,
        /// User-facing explanation when the claim did not go through.
        message: Option<String>,
    },
    Dashboard {
        dashboard: InvestorDashboard,
        unclaimed_display: Option<String>,
    },
    OwnerSummary {
        summary: OwnerSummary,
    },
    History {
        rows: Vec<ClaimHistoryRow>,
        #[serde(with = "estate_dividends::amount_serde")]
        total_claimed: u128,
    },
    /// The step was refused; later steps still run.
    Error {
        op: &'static str,
        error: String,
    },
}

/// In-memory ledger plus every service wired to it.
pub struct Simulation {
    ledger: Arc<InMemoryLedger>,
    coordinator: ClaimCoordinator<InMemoryLedger>,
    portfolio: PortfolioService<InMemoryLedger>,
    indexer: HistoryIndexer<InMemoryLedger>,
}

impl Simulation {
    pub fn new(settings: &Settings) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let cache = Arc::new(SnapshotCache::new());
        Self {
            coordinator: ClaimCoordinator::new(Arc::clone(&ledger), Arc::clone(&cache)),
            portfolio: PortfolioService::new(Arc::clone(&ledger), cache, settings.display_rate.clone()),
            indexer: HistoryIndexer::new(Arc::clone(&ledger), settings.from_block),
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    /// Display-currency text, or `None` when the amount is out of range at the rate.
    fn shown(&self, amount: u128) -> Option<String> {
        match self.portfolio.display(amount) {
            Ok(shown) => Some(shown.to_string()),
            Err(e) => {
                tracing::warn!(amount = %amount, error = %e, "amount not shown in display currency");
                None
            }
        }
    }

    pub async fn run(&self, scenario: &Scenario) -> anyhow::Result<Vec<StepReport>> {
        tracing::info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");

        for setup in &scenario.properties {
            self.ledger
                .tokenize(
                    setup.owner,
                    setup.name.clone(),
                    setup.total_tokens,
                    setup.token_price,
                    setup.metadata_cid.clone(),
                )
                .with_context(|| format!("tokenizing {}", setup.name))?;
        }

        let mut reports = Vec::with_capacity(scenario.steps.len());
        for step in &scenario.steps {
            let report = match self.step(step).await {
                Ok(report) => report,
                Err(e) => StepReport::Error {
                    op: step.op(),
                    error: format!("{e:#}"),
                },
            };
            reports.push(report);
        }
        Ok(reports)
    }

    async fn step(&self, step: &Step) -> anyhow::Result<StepReport> {
        let done = |tx_hash: Option<String>| StepReport::Done { op: step.op(), tx_hash };

        Ok(match step {
            Step::Buy {
                property,
                investor,
                tokens,
            } => done(Some(self.ledger.buy(*property, *investor, *tokens)?.tx_hash)),
            Step::Sell {
                property,
                investor,
                tokens,
            } => done(Some(self.ledger.sell(*property, *investor, *tokens)?.tx_hash)),
            Step::Deposit { property, owner, cents } => {
                let receipt = self.portfolio.deposit_dividends(*property, *owner, *cents).await?;
                done(Some(receipt.tx_hash))
            }
            Step::SetActive { property, active } => {
                self.ledger.set_active(*property, *active)?;
                done(None)
            }
            Step::RejectNextSignature => {
                self.ledger.reject_next_signature();
                done(None)
            }
            Step::Claim {
                property,
                investor,
                connected,
            } => {
                let wallet = connected.then_some(*investor);
                let outcome = self.coordinator.claim(ClaimKey::new(*property, *investor), wallet).await?;
                let paid_display = match &outcome {
                    ClaimOutcome::Confirmed { receipt, .. } => self.shown(receipt.amount_paid),
                    _ => None,
                };
                let message = outcome.error().map(|e| e.to_string());
                StepReport::Claim {
                    outcome,
                    paid_display,
                    message,
                }
            }
            Step::Dashboard { investor } => {
                let dashboard = self.portfolio.dashboard(*investor).await?;
                let unclaimed_display = self.shown(dashboard.total_unclaimed);
                StepReport::Dashboard {
                    dashboard,
                    unclaimed_display,
                }
            }
            Step::OwnerSummary { owner } => StepReport::OwnerSummary {
                summary: self.portfolio.owner_summary(*owner).await?,
            },
            Step::History { investor } => {
                self.indexer.sync().await?;
                StepReport::History {
                    rows: self.indexer.claim_history(*investor).await,
                    total_claimed: self.indexer.total_claimed(*investor).await,
                }
            }
        })
    }
}
