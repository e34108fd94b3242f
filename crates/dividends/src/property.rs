//! Canonical ledger snapshots: property, holding, claim record.
//!
//! Every page-specific property shape maps into these at the ledger-adapter
//! boundary. They are read-only copies; a re-read replaces them wholesale.

use serde::{Deserialize, Serialize};

use estate_core::{Entity, InvestorAddress, PropertyId, ValueObject};

use crate::accountant::{compute_entitlement, compute_unclaimed, Unclaimed};
use crate::error::DividendError;

/// Property record as held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub owner: InvestorAddress,
    /// Fixed at tokenization.
    pub total_tokens: u64,
    pub tokens_sold: u64,
    /// Price of one token in smallest units.
    #[serde(with = "crate::amount_serde")]
    pub token_price: u128,
    /// Cumulative dividends deposited, in smallest units. Never decreases.
    #[serde(with = "crate::amount_serde")]
    pub total_dividends: u128,
    pub is_active: bool,
    /// Pointer to off-chain metadata (name, location, images).
    pub metadata_cid: String,
}

impl Property {
    /// Tokens still purchasable from the property owner.
    pub fn tokens_available(&self) -> u64 {
        self.total_tokens.saturating_sub(self.tokens_sold)
    }
}

impl Entity for Property {
    type Id = PropertyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ValueObject for Property {}

/// Token balance of one investor in one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub property_id: PropertyId,
    pub investor: InvestorAddress,
    pub balance: u64,
}

impl ValueObject for Holding {}

/// Cumulative dividends already paid to one investor for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub property_id: PropertyId,
    pub investor: InvestorAddress,
    #[serde(with = "crate::amount_serde")]
    pub claimed_amount: u128,
}

impl ClaimRecord {
    /// Record for an investor who has never claimed.
    pub fn unclaimed(property_id: PropertyId, investor: InvestorAddress) -> Self {
        Self {
            property_id,
            investor,
            claimed_amount: 0,
        }
    }
}

impl ValueObject for ClaimRecord {}

/// The (property, investor) pair a claim lifecycle runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimKey {
    pub property_id: PropertyId,
    pub investor: InvestorAddress,
}

impl ClaimKey {
    pub fn new(property_id: PropertyId, investor: InvestorAddress) -> Self {
        Self {
            property_id,
            investor,
        }
    }
}

impl core::fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.property_id, self.investor)
    }
}

/// Everything read from the ledger for one (property, investor) pair in one pass.
///
/// `revision` is assigned by whoever caches snapshots before the read is issued and
/// increases with every fresh read, so a read that started later carries a higher
/// revision and consumers can tell a re-read from a reused copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub property: Property,
    pub holding: Holding,
    pub record: ClaimRecord,
    pub revision: u64,
}

impl ValueObject for AccountSnapshot {}

/// Result of running the accountant over a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub entitlement: u128,
    pub claimed: u128,
    pub unclaimed: Unclaimed,
}

impl AccountSnapshot {
    pub fn key(&self) -> ClaimKey {
        ClaimKey::new(self.property.id, self.holding.investor)
    }

    /// Holding and claim record must describe the same pair as the property.
    pub fn check_consistency(&self) -> Result<(), DividendError> {
        let expected = self.key();
        let parts = [
            (self.holding.property_id, self.holding.investor),
            (self.record.property_id, self.record.investor),
        ];
        for (found_property, found_investor) in parts {
            if found_property != expected.property_id || found_investor != expected.investor {
                return Err(DividendError::SnapshotMismatch {
                    expected_property: expected.property_id,
                    expected_investor: expected.investor,
                    found_property,
                    found_investor,
                });
            }
        }
        Ok(())
    }

    /// Entitlement, claimed and unclaimed amounts for this snapshot.
    pub fn assess(&self) -> Result<Assessment, DividendError> {
        self.check_consistency()?;
        let entitlement = compute_entitlement(&self.property, &self.holding)?;
        Ok(Assessment {
            entitlement,
            claimed: self.record.claimed_amount,
            unclaimed: compute_unclaimed(entitlement, &self.record)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn investor(byte: u8) -> InvestorAddress {
        InvestorAddress::from_bytes([byte; 20])
    }

    pub fn property(total_tokens: u64, total_dividends: u128) -> Property {
        Property {
            id: PropertyId::new(1),
            owner: investor(0xee),
            total_tokens,
            tokens_sold: 0,
            token_price: 10u128.pow(15),
            total_dividends,
            is_active: true,
            metadata_cid: "bafy-test".to_string(),
        }
    }

    pub fn holding(balance: u64) -> Holding {
        Holding {
            property_id: PropertyId::new(1),
            investor: investor(0x01),
            balance,
        }
    }

    pub fn record(claimed_amount: u128) -> ClaimRecord {
        ClaimRecord {
            property_id: PropertyId::new(1),
            investor: investor(0x01),
            claimed_amount,
        }
    }

    pub fn snapshot(
        total_tokens: u64,
        total_dividends: u128,
        balance: u64,
        claimed: u128,
        revision: u64,
    ) -> AccountSnapshot {
        AccountSnapshot {
            property: property(total_tokens, total_dividends),
            holding: holding(balance),
            record: record(claimed),
            revision,
        }
    }
}
