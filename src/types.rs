//! Types for the portfolio sync engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which chain an asset lives on, and therefore which configured address
/// list its balance source receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Bitcoin mainnet
    Bitcoin,
    /// Ethereum mainnet (native ETH and ERC-20 tokens)
    Ethereum,
}

/// Descriptor of a tracked asset (native coin or fungible token).
///
/// Identity is `code`; codes are unique across the tracked table in
/// `constants::ALL_SYMBOLS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Symbol {
    /// Short code, e.g. "btc", "usdt"
    pub code: &'static str,
    /// Display name, e.g. "Bitcoin"
    pub name: &'static str,
    /// Icon reference (relative image path for the host to resolve)
    pub icon: &'static str,
    /// ERC-20 contract address; `None` for native coins
    pub contract_address: Option<&'static str>,
    /// Raw-unit decimal exponent (8 for satoshi, 18 for wei)
    pub decimals: u32,
    /// Decimal places the host should render
    pub display_decimals: u32,
    /// Optional grouping label, e.g. "Stable"
    pub group: Option<&'static str>,
    /// Chain the asset lives on
    pub chain: Chain,
}

impl Symbol {
    /// True for native coins (no contract address).
    pub fn is_native(&self) -> bool {
        self.contract_address.is_none()
    }

    /// Get the CoinGecko ID for this asset, where it resolves by id
    /// rather than by contract address.
    pub fn coingecko_id(&self) -> Option<&'static str> {
        match self.code {
            "btc" => Some("bitcoin"),
            "eth" => Some("ethereum"),
            _ => None,
        }
    }
}

/// One user-configured address plus zero or more free-form tags.
///
/// The same address may appear in several asset classes; tags are
/// case-preserving and carried onto every [`AssetInfo`] built for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    pub address: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AddressConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(address: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            address: address.into(),
            tags,
        }
    }
}

/// Per-(symbol, address) balance record.
///
/// Balance sources populate `balance` and `balance_formatted` only; the
/// orchestrator fills in `value` and `tags` when it merges a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub address: String,
    /// Raw balance in the smallest unit (satoshi, wei, ...)
    pub balance: u128,
    /// Human-readable balance: `balance / 10^decimals`
    pub balance_formatted: f64,
    /// Fiat value at merge time; always 0 coming out of a balance source
    pub value: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AssetInfo {
    /// Zero-value placeholder for an address.
    pub fn zero(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: 0,
            balance_formatted: 0.0,
            value: 0.0,
            tags: Vec::new(),
        }
    }

    /// Builds a record from a raw smallest-unit balance.
    pub fn from_raw(address: impl Into<String>, raw: u128, decimals: u32) -> Self {
        Self {
            address: address.into(),
            balance: raw,
            balance_formatted: raw as f64 / 10f64.powi(decimals as i32),
            value: 0.0,
            tags: Vec::new(),
        }
    }
}

/// Symbol code -> lower-cased currency code -> price in fiat units per
/// whole asset unit.
pub type PriceTable = HashMap<String, HashMap<String, f64>>;

/// Looks up a price in the table. Missing entries are price 0, never an
/// error.
pub fn lookup_price(prices: &PriceTable, code: &str, currency: &str) -> f64 {
    prices
        .get(code)
        .and_then(|by_currency| by_currency.get(&currency.to_lowercase()))
        .copied()
        .unwrap_or(0.0)
}

/// The engine's merged view of prices and per-symbol balances.
///
/// `prices` and `assets` always reflect exactly one completed sync round
/// and are replaced together; `is_syncing` toggles independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Completion instant of the last successful round; `None` until the
    /// first round completes
    pub last_sync_time: Option<DateTime<Utc>>,
    pub prices: PriceTable,
    /// Symbol code -> ordered per-address records
    pub assets: HashMap<String, Vec<AssetInfo>>,
    pub is_syncing: bool,
}

/// Overall engine health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Last sync is fresh
    Healthy,
    /// Synced before, but not recently
    Degraded,
    /// Never completed a sync
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub details: HashMap<String, serde_json::Value>,
    pub last_checked: DateTime<Utc>,
}
