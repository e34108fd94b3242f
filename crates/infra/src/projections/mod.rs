//! History read models rebuilt from the ledger's event logs.
//!
//! Projections are:
//! - **Rebuildable**: the logs are the source of truth
//! - **Idempotent**: safe for at-least-once delivery of overlapping rescans
//! - **Display-only**: no accounting decision reads them

pub mod claim_history;
pub mod distribution_history;
pub mod indexer;

pub use claim_history::{ClaimHistory, ClaimHistoryRow};
pub use distribution_history::{DistributionHistory, DistributionRow};
pub use indexer::{HistoryIndexer, SyncReport};
