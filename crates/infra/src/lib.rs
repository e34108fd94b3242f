//! Infrastructure layer: ledger adapter, snapshot cache, claim orchestration,
//! history projections and configuration.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod ledger;
pub mod portfolio;
pub mod projections;
pub mod scenario;

pub use cache::SnapshotCache;
pub use config::Settings;
pub use coordinator::{ClaimCoordinator, ClaimOutcome, CoordinatorError, PendingClaim, Preflight};
pub use ledger::{ClaimReceipt, DividendLedger, InMemoryLedger, LedgerError, TxReceipt};
pub use portfolio::{DepositError, PortfolioService};
