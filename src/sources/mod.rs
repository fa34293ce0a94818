//! Concrete balance and price source adapters

pub mod blockchain_info;
pub mod coingecko;
pub mod etherscan;

pub use blockchain_info::BlockchainInfoSource;
pub use coingecko::CoinGeckoSource;
pub use etherscan::EtherscanSource;
