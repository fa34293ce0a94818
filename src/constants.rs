//! Constants for the portfolio sync engine
//!
//! All configuration for the engine is centralized here: intervals,
//! timeouts, provider endpoints and the table of tracked symbols.

use crate::types::{Chain, Symbol};

/// How often the periodic timer triggers a sync round (in seconds)
pub const SYNC_INTERVAL_SECS: u64 = 60;

/// HTTP request timeout for every outbound provider call (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between Etherscan per-address calls (in milliseconds)
pub const ETHERSCAN_THROTTLE_MS: u64 = 1000;

/// Age after which the last sync counts as stale for health checks
/// (in seconds)
pub const STALE_SYNC_SECS: u64 = 300;

/// blockchain.info base URL (BTC balances)
pub const BLOCKCHAIN_INFO_API_URL: &str = "https://blockchain.info";

/// Etherscan v2 API endpoint (EVM balances, chainid 1)
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// CoinGecko API base URL (fiat prices)
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "portfolio-sync-sdk/0.1.0";

// Native coins
pub const BTC: Symbol = Symbol {
    code: "btc",
    name: "Bitcoin",
    icon: "images/BTC.png",
    contract_address: None,
    decimals: 8,
    display_decimals: 4,
    group: Some("BTC"),
    chain: Chain::Bitcoin,
};

pub const ETH: Symbol = Symbol {
    code: "eth",
    name: "Ethereum",
    icon: "images/ETH.png",
    contract_address: None,
    decimals: 18,
    display_decimals: 2,
    group: Some("ETH"),
    chain: Chain::Ethereum,
};

// ERC-20 tokens
pub const STETH: Symbol = Symbol {
    code: "steth",
    name: "Lido Staked Ether",
    icon: "images/STETH.png",
    contract_address: Some("0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84"),
    decimals: 18,
    display_decimals: 2,
    group: Some("ETH"),
    chain: Chain::Ethereum,
};

pub const USDT: Symbol = Symbol {
    code: "usdt",
    name: "Tether",
    icon: "images/USDT.png",
    contract_address: Some("0xdac17f958d2ee523a2206206994597c13d831ec7"),
    decimals: 6,
    display_decimals: 2,
    group: Some("Stable"),
    chain: Chain::Ethereum,
};

pub const USDC: Symbol = Symbol {
    code: "usdc",
    name: "USD Coin",
    icon: "images/USDC.png",
    contract_address: Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
    decimals: 6,
    display_decimals: 2,
    group: Some("Stable"),
    chain: Chain::Ethereum,
};

pub const AETH_USDT: Symbol = Symbol {
    code: "aEthUSDT",
    name: "Aave Ethereum USDT",
    icon: "images/USDT.png",
    contract_address: Some("0x23878914efe38d27c4d67ab83ed1b93a74d4086a"),
    decimals: 6,
    display_decimals: 2,
    group: Some("Stable"),
    chain: Chain::Ethereum,
};

/// ERC-20 tokens tracked on the shared EVM address list
pub const ERC20_TOKENS: &[Symbol] = &[USDT, USDC, STETH, AETH_USDT];

/// Every tracked symbol, in merge/display order
pub const ALL_SYMBOLS: &[Symbol] = &[BTC, ETH, USDT, USDC, STETH, AETH_USDT];
