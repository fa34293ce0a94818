//! # Portfolio Sync SDK
//!
//! Tracks a multi-chain cryptocurrency portfolio: user-configured Bitcoin
//! and Ethereum-family addresses, periodic on-chain balance and fiat price
//! fetches, one merged snapshot for display.
//!
//! ## Usage
//!
//! ```no_run
//! use portfolio_sync_sdk::{
//!     AddressConfig, PortfolioConfig, PortfolioTracker, ProviderCredentials,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = PortfolioTracker::new();
//! tracker
//!     .configure(PortfolioConfig {
//!         currency: "USD".to_string(),
//!         min_value: 0.0,
//!         btc_addresses: vec![AddressConfig::with_tags("bc1q...", vec!["cold".into()])],
//!         evm_addresses: vec![AddressConfig::new("0x...")],
//!         credentials: ProviderCredentials {
//!             etherscan_api_key: Some("KEY".to_string()),
//!             coingecko_api_key: None,
//!         },
//!     })
//!     .await?;
//!
//! tracker
//!     .on_sync_done(|success| println!("sync finished, success: {success}"))
//!     .await;
//!
//! let state = tracker.get_state().await;
//! for (code, entries) in &state.assets {
//!     for entry in entries {
//!         println!("{code}: {} = {}", entry.address, entry.value);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PortfolioTracker (sync orchestrator)
//!     ├─ periodic timer / sync_now()        single-flight rounds
//!     ├─ PriceSource (CoinGecko)            ┐
//!     ├─ BalanceSource per symbol           ├─ parallel fan-out,
//!     │    BTC    -> blockchain.info        │  per-source degradation
//!     │    EVM    -> Etherscan (+Throttler) ┘
//!     └─ PortfolioStore                     atomic snapshot swap
//! ```
//!
//! A sync round never fails because one provider is down: each source
//! catches its own errors and degrades to zero balances or an empty price
//! table, and the round commits what it got. Only a source that dies
//! outright fails the round, leaving the previous snapshot in place.

pub mod constants;
pub mod error;
pub mod metrics;
pub mod source;
pub mod sources;
pub mod store;
pub mod throttler;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use error::{SourceError, ThrottleError};
pub use metrics::RoundMetrics;
pub use source::{BalanceSource, PriceSource};
pub use throttler::Throttler;
pub use tracker::{PortfolioConfig, PortfolioTracker, ProviderCredentials, SyncOutcome};
pub use types::{
    lookup_price, AddressConfig, AssetInfo, Chain, ComponentHealth, HealthStatus, PortfolioState,
    PriceTable, Symbol,
};
