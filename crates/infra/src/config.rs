//! Runtime settings, read from `ESTATE_*` environment variables.

use anyhow::Context;
use serde::Serialize;

use estate_core::InvestorAddress;
use estate_dividends::DisplayRate;
use estate_observability::LogFormat;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_DISPLAY_CURRENCY: &str = "KES";
/// 130 KES per USD at 2000 USD per ETH.
pub const DEFAULT_DISPLAY_UNITS_PER_NATIVE: u64 = 260_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Tokenization contract. `None` means no chain is configured and only the
    /// in-memory ledger can be used.
    pub contract_address: Option<InvestorAddress>,
    pub rpc_url: String,
    /// First block scanned when rebuilding history.
    pub from_block: u64,
    pub display_rate: DisplayRate,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            contract_address: None,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            from_block: 0,
            display_rate: DisplayRate::new(DEFAULT_DISPLAY_CURRENCY, DEFAULT_DISPLAY_UNITS_PER_NATIVE),
            log_format: LogFormat::Json,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Missing keys fall back to defaults;
    /// present but malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let contract_address = match get("ESTATE_CONTRACT_ADDRESS") {
            Some(raw) => Some(
                raw.parse::<InvestorAddress>()
                    .with_context(|| format!("ESTATE_CONTRACT_ADDRESS is not an address: {raw}"))?,
            ),
            None => {
                tracing::warn!("ESTATE_CONTRACT_ADDRESS not set; only the in-memory ledger is available");
                None
            }
        };

        let rpc_url = get("ESTATE_RPC_URL").unwrap_or_else(|| {
            tracing::warn!(default = DEFAULT_RPC_URL, "ESTATE_RPC_URL not set; using local node");
            defaults.rpc_url.clone()
        });

        let from_block = match get("ESTATE_FROM_BLOCK") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("ESTATE_FROM_BLOCK is not a block number: {raw}"))?,
            None => defaults.from_block,
        };

        let currency = get("ESTATE_DISPLAY_CURRENCY").unwrap_or_else(|| defaults.display_rate.currency.clone());
        let units_per_native = match get("ESTATE_DISPLAY_UNITS_PER_NATIVE") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("ESTATE_DISPLAY_UNITS_PER_NATIVE is not a positive integer: {raw}"))?,
            None => {
                tracing::warn!(
                    default = DEFAULT_DISPLAY_UNITS_PER_NATIVE,
                    "ESTATE_DISPLAY_UNITS_PER_NATIVE not set; display amounts use the built-in rate"
                );
                defaults.display_rate.units_per_native
            }
        };
        if units_per_native == 0 {
            anyhow::bail!("ESTATE_DISPLAY_UNITS_PER_NATIVE must be greater than zero");
        }

        let log_format = match get("ESTATE_LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().context("ESTATE_LOG_FORMAT")?,
            None => defaults.log_format,
        };

        Ok(Self {
            contract_address,
            rpc_url,
            from_block,
            display_rate: DisplayRate::new(currency, units_per_native),
            log_format,
        })
    }
}
