//! Dividend accounting for tokenized properties.
//!
//! Pure domain logic only: no IO, no ledger client, no wallet. Every function takes
//! the investor identity and the ledger snapshots it needs as arguments and returns a
//! typed result. All amounts are in the ledger's smallest unit (18-decimal fixed
//! point); display-currency conversion lives in [`display`] and never feeds back.

pub mod accountant;
pub mod amount_serde;
pub mod claim;
pub mod display;
pub mod error;
pub mod event;
pub mod math;
pub mod portfolio;
pub mod property;
pub mod trade;

pub use accountant::{compute_entitlement, compute_unclaimed, validate_claim, ClaimIntent, Unclaimed};
pub use claim::{ClaimCommand, ClaimCycle, ClaimCycleError, ClaimEvent, ClaimState};
pub use display::{ConversionError, DisplayAmount, DisplayRate};
pub use error::{ClaimRejection, DividendError, SubmissionFailure};
pub use event::{DividendsClaimed, DividendsDistributed, LedgerEvent, TokensPurchased, TokensSold};
pub use portfolio::{InvestorDashboard, LineStatus, OwnerSummary, PortfolioLine};
pub use property::{AccountSnapshot, Assessment, ClaimKey, ClaimRecord, Holding, Property};
pub use trade::{PurchaseQuote, TradeError};
