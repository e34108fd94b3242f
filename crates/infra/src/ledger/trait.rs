use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use estate_core::{InvestorAddress, PropertyId};
use estate_dividends::{ClaimIntent, Property, SubmissionFailure};
use estate_events::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("property {0} not found")]
    PropertyNotFound(PropertyId),

    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// Receipt of a confirmed claim.
///
/// `amount_paid` is what the ledger computed at execution. It is reported to the
/// user but never written into cached claim records; those are re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub tx: TxReceipt,
    #[serde(with = "estate_dividends::amount_serde")]
    pub amount_paid: u128,
}

/// Read/write surface of the tokenization contract.
///
/// Reads return the ledger's current state. Writes return once the transaction is
/// mined, or the reason it was not.
#[async_trait::async_trait]
pub trait DividendLedger: Send + Sync {
    async fn property(&self, property_id: PropertyId) -> Result<Property, LedgerError>;

    /// Properties the investor holds (or has held) tokens in.
    async fn investor_properties(&self, investor: InvestorAddress) -> Result<Vec<PropertyId>, LedgerError>;

    async fn owner_properties(&self, owner: InvestorAddress) -> Result<Vec<Property>, LedgerError>;

    async fn balance(&self, property_id: PropertyId, investor: InvestorAddress) -> Result<u64, LedgerError>;

    /// Cumulative amount already claimed by the investor for the property.
    async fn claimed(&self, property_id: PropertyId, investor: InvestorAddress) -> Result<u128, LedgerError>;

    /// Submit a claim. The ledger computes and transfers the payable amount itself.
    async fn submit_claim(&self, intent: &ClaimIntent) -> Result<ClaimReceipt, SubmissionFailure>;

    /// Owner-only deposit into the property's dividend pool.
    async fn deposit_dividends(
        &self,
        property_id: PropertyId,
        from: InvestorAddress,
        amount: u128,
    ) -> Result<TxReceipt, SubmissionFailure>;

    /// Raw contract logs from `from_block` (inclusive) onwards, in chain order.
    async fn logs(&self, from_block: u64) -> Result<Vec<EventEnvelope<JsonValue>>, LedgerError>;
}
