//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a tokenized property, assigned by the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(u64);

impl PropertyId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for PropertyId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for PropertyId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("PropertyId: {e}")))
    }
}

/// 20-byte account address of an investor or property owner.
///
/// Parsed from (and rendered as) `0x`-prefixed hex. Comparison is on the raw bytes,
/// so checksummed and lowercase spellings of the same address are equal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvestorAddress([u8; 20]);

impl InvestorAddress {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl core::fmt::Display for InvestorAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl core::fmt::Debug for InvestorAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InvestorAddress({self})")
    }
}

impl FromStr for InvestorAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(DomainError::invalid_id(format!(
                "InvestorAddress: expected 40 hex digits, got {}",
                digits.len()
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| DomainError::invalid_id(format!("InvestorAddress: {e}")))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for InvestorAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvestorAddress> for String {
    fn from(value: InvestorAddress) -> Self {
        value.to_string()
    }
}

/// Identifier of a single claim attempt (one pass through the claim lifecycle).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(AttemptId, "AttemptId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_with_and_without_prefix() {
        let a: InvestorAddress = "0x00000000000000000000000000000000000000aB".parse().unwrap();
        let b: InvestorAddress = "00000000000000000000000000000000000000ab".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x00000000000000000000000000000000000000ab");
    }

    #[test]
    fn address_rejects_wrong_length_and_bad_digits() {
        assert!(matches!(
            "0x1234".parse::<InvestorAddress>(),
            Err(DomainError::InvalidId(_))
        ));
        assert!(matches!(
            "0xzz000000000000000000000000000000000000ab".parse::<InvestorAddress>(),
            Err(DomainError::InvalidId(_))
        ));
    }

    #[test]
    fn address_serializes_as_hex_string() {
        let a = InvestorAddress::from_bytes([0x11; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"0x1111111111111111111111111111111111111111\"");
        let back: InvestorAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn property_id_parses_decimal() {
        assert_eq!("42".parse::<PropertyId>().unwrap(), PropertyId::new(42));
        assert!("-1".parse::<PropertyId>().is_err());
    }
}
