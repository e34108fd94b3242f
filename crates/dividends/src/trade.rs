//! Input checks for the ledger writes that move tokens or dividends.
//!
//! The ledger enforces all of these again; checking first spares the user a
//! reverted transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use estate_core::PropertyId;

use crate::display::{ConversionError, DisplayRate};
use crate::property::Property;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("cannot sell {requested} tokens, balance is {balance}")]
    ExceedsBalance { requested: u64, balance: u64 },

    #[error("cannot buy {requested} tokens, only {available} available")]
    ExceedsAvailable { requested: u64, available: u64 },

    #[error("property {0} is inactive")]
    PropertyInactive(PropertyId),

    #[error("display rate is zero")]
    ZeroRate,

    #[error("cost of {tokens} tokens overflows")]
    Overflow { tokens: u64 },

    #[error("deposit of {cents} cents overflows")]
    DepositOverflow { cents: u128 },
}

/// Tokens to buy and what they cost in smallest units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseQuote {
    pub property_id: PropertyId,
    pub tokens: u64,
    #[serde(with = "crate::amount_serde")]
    pub cost: u128,
}

pub fn quote_purchase(property: &Property, tokens: u64) -> Result<PurchaseQuote, TradeError> {
    if tokens == 0 {
        return Err(TradeError::NonPositiveAmount);
    }
    if !property.is_active {
        return Err(TradeError::PropertyInactive(property.id));
    }
    let available = property.tokens_available();
    if tokens > available {
        return Err(TradeError::ExceedsAvailable {
            requested: tokens,
            available,
        });
    }

    let cost = property
        .token_price
        .checked_mul(u128::from(tokens))
        .ok_or(TradeError::Overflow { tokens })?;

    Ok(PurchaseQuote {
        property_id: property.id,
        tokens,
        cost,
    })
}

pub fn validate_sell(tokens: u64, balance: u64) -> Result<u64, TradeError> {
    if tokens == 0 {
        return Err(TradeError::NonPositiveAmount);
    }
    if tokens > balance {
        return Err(TradeError::ExceedsBalance {
            requested: tokens,
            balance,
        });
    }
    Ok(tokens)
}

/// Dividend deposit entered in display-currency cents, converted to smallest units.
///
/// An amount that floors to zero units is refused.
pub fn deposit_from_display(cents: u128, rate: &DisplayRate) -> Result<u128, TradeError> {
    if cents == 0 {
        return Err(TradeError::NonPositiveAmount);
    }
    let units = rate.from_display_cents(cents).map_err(|e| match e {
        ConversionError::ZeroRate => TradeError::ZeroRate,
        ConversionError::Overflow { .. } => TradeError::DepositOverflow { cents },
    })?;
    validate_deposit(units)
}

pub fn validate_deposit(amount: u128) -> Result<u128, TradeError> {
    if amount == 0 {
        return Err(TradeError::NonPositiveAmount);
    }
    Ok(amount)
}
