//! Ledger adapter boundary.
//!
//! Everything the tokenization contract exposes is reached through
//! [`DividendLedger`]; call sites map its records into the canonical snapshot types
//! and never redefine them.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedger;
pub use r#trait::{ClaimReceipt, DividendLedger, LedgerError, TxReceipt};
