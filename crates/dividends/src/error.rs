//! Dividend accounting error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use estate_core::{InvestorAddress, PropertyId};

/// Signer message that marks a user-cancelled transaction.
const USER_REJECTED_MARKER: &str = "User rejected the request";

/// Why a claim was not submitted.
///
/// None of these are faults of the accounting itself; each one maps to a distinct,
/// explained state in the caller's UI.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ClaimRejection {
    /// No wallet identity available.
    #[error("wallet not connected")]
    NotConnected,

    #[error("property {property_id} is inactive")]
    PropertyInactive { property_id: PropertyId },

    /// Unclaimed share is zero. Renders as a disabled state, not a failure.
    #[error("no unclaimed dividends")]
    NothingToClaim,

    /// Claimed exceeds the freshly computed entitlement; the cached snapshot
    /// disagrees with the ledger and must be re-read before a retry.
    #[error("cached claim state is stale (claimed exceeds entitlement by {excess})")]
    StaleEntitlement {
        #[serde(with = "crate::amount_serde")]
        excess: u128,
    },
}

impl ClaimRejection {
    /// Whether the snapshot must be re-fetched before the claim can be retried.
    pub fn requires_refresh(&self) -> bool {
        matches!(self, ClaimRejection::StaleEntitlement { .. })
    }
}

/// Why a submitted claim (or deposit) transaction did not go through.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SubmissionFailure {
    /// The signer declined to sign.
    #[error("transaction rejected by the signer")]
    UserRejected,

    /// The contract reverted (stale state, insufficient pool, out of gas).
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// The transaction never reached a verdict (RPC or network error).
    #[error("transaction could not be delivered: {0}")]
    Transport(String),
}

impl SubmissionFailure {
    /// Classify a signer/contract error message.
    pub fn from_signer_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(USER_REJECTED_MARKER) {
            SubmissionFailure::UserRejected
        } else {
            SubmissionFailure::Reverted(message)
        }
    }

    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, SubmissionFailure::UserRejected)
    }
}

/// Dividend accounting error.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum DividendError {
    /// The property snapshot reports a zero token supply; its dividends are
    /// unavailable until the upstream data is fixed.
    #[error("property {property_id} has zero total tokens")]
    DivisionByZero { property_id: PropertyId },

    #[error("balance {balance} exceeds total supply {total_tokens} of property {property_id}")]
    BalanceExceedsSupply {
        property_id: PropertyId,
        balance: u64,
        total_tokens: u64,
    },

    /// Holding or claim record belongs to a different (property, investor) pair.
    #[error("snapshot mismatch: expected {expected_property}/{expected_investor}, found {found_property}/{found_investor}")]
    SnapshotMismatch {
        expected_property: PropertyId,
        expected_investor: InvestorAddress,
        found_property: PropertyId,
        found_investor: InvestorAddress,
    },

    #[error("arithmetic overflow computing {context}")]
    Overflow { context: String },

    #[error("claim rejected: {0}")]
    Rejected(#[from] ClaimRejection),

    #[error("claim submission failed: {0}")]
    SubmissionFailed(#[from] SubmissionFailure),
}

impl DividendError {
    /// The view should show "unavailable" for this property instead of numbers.
    pub fn is_data_fault(&self) -> bool {
        matches!(
            self,
            DividendError::DivisionByZero { .. }
                | DividendError::BalanceExceedsSupply { .. }
                | DividendError::SnapshotMismatch { .. }
                | DividendError::Overflow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_rejection_is_classified_as_cancellation() {
        let failure = SubmissionFailure::from_signer_message(
            "MetaMask Tx Signature: User rejected the request.",
        );
        assert!(failure.is_user_cancellation());

        let revert = SubmissionFailure::from_signer_message("execution reverted: No dividends");
        assert_eq!(
            revert,
            SubmissionFailure::Reverted("execution reverted: No dividends".to_string())
        );
    }

    #[test]
    fn only_stale_entitlement_requires_refresh() {
        assert!(ClaimRejection::StaleEntitlement { excess: 1 }.requires_refresh());
        assert!(!ClaimRejection::NothingToClaim.requires_refresh());
        assert!(!ClaimRejection::NotConnected.requires_refresh());
    }
}
