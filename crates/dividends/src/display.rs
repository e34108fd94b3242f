//! Presentation-only conversion from ledger units to a display currency.
//!
//! The rate is external and non-authoritative. Nothing in here is used by the
//! accounting in [`crate::accountant`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::mul_div_floor;

/// Smallest units per whole native coin (18-decimal fixed point).
pub const UNITS_PER_NATIVE: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("display rate is zero")]
    ZeroRate,

    #[error("{amount} is out of range for the display conversion")]
    Overflow { amount: u128 },
}

/// Display currency and how many of its units one native coin is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRate {
    pub currency: String,
    pub units_per_native: u64,
}

impl DisplayRate {
    pub fn new(currency: impl Into<String>, units_per_native: u64) -> Self {
        Self {
            currency: currency.into(),
            units_per_native,
        }
    }

    fn cents_per_native(&self) -> u128 {
        u128::from(self.units_per_native) * 100
    }

    /// Convert smallest units into display currency, floored to the cent.
    pub fn to_display(&self, amount: u128) -> Result<DisplayAmount, ConversionError> {
        let cents = mul_div_floor(amount, self.cents_per_native(), UNITS_PER_NATIVE)
            .ok_or(ConversionError::Overflow { amount })?;
        Ok(DisplayAmount {
            cents,
            currency: self.currency.clone(),
        })
    }

    /// Convert a display-currency amount (in cents) into smallest units, floored.
    pub fn from_display_cents(&self, cents: u128) -> Result<u128, ConversionError> {
        if self.units_per_native == 0 {
            return Err(ConversionError::ZeroRate);
        }
        mul_div_floor(cents, UNITS_PER_NATIVE, self.cents_per_native())
            .ok_or(ConversionError::Overflow { amount: cents })
    }
}

/// A display-currency amount with two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAmount {
    pub cents: u128,
    pub currency: String,
}

impl core::fmt::Display for DisplayAmount {
    /// Formats as `1,234.56 KES`.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let whole = (self.cents / 100).to_string();
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        write!(f, "{grouped}.{:02} {}", self.cents % 100, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kes() -> DisplayRate {
        DisplayRate::new("KES", 260_000)
    }

    #[test]
    fn one_native_coin_is_the_rate() {
        let shown = kes().to_display(UNITS_PER_NATIVE).unwrap();
        assert_eq!(shown.cents, 26_000_000);
        assert_eq!(shown.to_string(), "260,000.00 KES");
    }

    #[test]
    fn fractions_floor_to_the_cent() {
        // 0.0001 ETH = 26 KES
        assert_eq!(kes().to_display(UNITS_PER_NATIVE / 10_000).unwrap().to_string(), "26.00 KES");
        assert_eq!(kes().to_display(1).unwrap().to_string(), "0.00 KES");
    }

    #[test]
    fn deposit_amount_converts_back_to_units() {
        // 2,600 KES = 0.01 ETH
        assert_eq!(kes().from_display_cents(260_000), Ok(UNITS_PER_NATIVE / 100));
        assert_eq!(
            DisplayRate::new("KES", 0).from_display_cents(100),
            Err(ConversionError::ZeroRate)
        );
    }

    #[test]
    fn out_of_range_amounts_are_reported() {
        assert_eq!(
            kes().from_display_cents(u128::MAX),
            Err(ConversionError::Overflow { amount: u128::MAX })
        );

        let extreme = DisplayRate::new("KES", u64::MAX);
        assert_eq!(
            extreme.to_display(u128::MAX),
            Err(ConversionError::Overflow { amount: u128::MAX })
        );
        // The largest pool still converts at a realistic rate.
        assert!(kes().to_display(u128::MAX).is_ok());
    }

    #[test]
    fn small_amounts_are_not_grouped() {
        let a = DisplayAmount {
            cents: 99_905,
            currency: "KES".to_string(),
        };
        assert_eq!(a.to_string(), "999.05 KES");
    }
}
