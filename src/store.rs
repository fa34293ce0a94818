//! In-memory portfolio snapshot store
//!
//! Sole owner of the engine's [`PortfolioState`]. All mutation goes
//! through the round protocol (`begin_round` / `commit_round` /
//! `end_round`), which keeps the snapshot invariants: `prices` and
//! `assets` always reflect one completed round and are replaced together
//! under a single write lock; `is_syncing` toggles independently.

use crate::{
    constants::ALL_SYMBOLS,
    types::{AddressConfig, AssetInfo, Chain, PortfolioState, PriceTable},
};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Symbol code -> ordered per-address records, as committed by one round
pub type AssetMap = HashMap<String, Vec<AssetInfo>>;

pub struct PortfolioStore {
    state: RwLock<PortfolioState>,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PortfolioState::default()),
        }
    }

    /// Resets the snapshot to zero-value placeholders: one entry per
    /// configured address under every tracked symbol of the matching
    /// chain, tags attached, so a host can render addresses before the
    /// first round completes.
    pub async fn seed(&self, btc_addresses: &[AddressConfig], evm_addresses: &[AddressConfig]) {
        let mut assets = AssetMap::new();
        for symbol in ALL_SYMBOLS {
            let configs = match symbol.chain {
                Chain::Bitcoin => btc_addresses,
                Chain::Ethereum => evm_addresses,
            };
            let placeholders = configs
                .iter()
                .map(|config| {
                    let mut info = AssetInfo::zero(&config.address);
                    info.tags = config.tags.clone();
                    info
                })
                .collect();
            assets.insert(symbol.code.to_string(), placeholders);
        }

        let mut state = self.state.write().await;
        *state = PortfolioState {
            assets,
            ..PortfolioState::default()
        };
    }

    /// Claims the single-flight guard. Returns false when a round is
    /// already in flight; the caller must not start new work then.
    pub async fn begin_round(&self) -> bool {
        let mut state = self.state.write().await;
        if state.is_syncing {
            return false;
        }
        state.is_syncing = true;
        true
    }

    /// Publishes a completed round: prices and assets are swapped
    /// together, never one without the other, and the sync timestamp is
    /// stamped. Only called for successful rounds.
    pub async fn commit_round(&self, prices: PriceTable, assets: AssetMap) {
        let mut state = self.state.write().await;
        state.prices = prices;
        state.assets = assets;
        state.last_sync_time = Some(Utc::now());
    }

    /// Releases the single-flight guard; runs on every round outcome.
    pub async fn end_round(&self) {
        let mut state = self.state.write().await;
        state.is_syncing = false;
    }

    /// Clone of the current snapshot. Readers never observe a
    /// half-updated state: the swap in `commit_round` happens under the
    /// write lock.
    pub async fn snapshot(&self) -> PortfolioState {
        self.state.read().await.clone()
    }
}

impl Default for PortfolioStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BTC, ETH, USDT};
    use crate::types::lookup_price;

    fn configs(entries: &[(&str, &[&str])]) -> Vec<AddressConfig> {
        entries
            .iter()
            .map(|(addr, tags)| {
                AddressConfig::with_tags(*addr, tags.iter().map(|t| t.to_string()).collect())
            })
            .collect()
    }

    #[tokio::test]
    async fn seed_places_zero_placeholders_with_tags() {
        let store = PortfolioStore::new();
        store
            .seed(
                &configs(&[("bc1qa", &["cold"])]),
                &configs(&[("0xaaa", &[]), ("0xbbb", &["hot", "defi"])]),
            )
            .await;

        let state = store.snapshot().await;
        assert!(state.last_sync_time.is_none());
        assert!(!state.is_syncing);
        assert_eq!(state.assets.len(), ALL_SYMBOLS.len());

        let btc = &state.assets[BTC.code];
        assert_eq!(btc.len(), 1);
        assert_eq!(btc[0].address, "bc1qa");
        assert_eq!(btc[0].balance, 0);
        assert_eq!(btc[0].tags, vec!["cold"]);

        // Every EVM symbol gets the shared EVM address list.
        for symbol in [ETH, USDT] {
            let entries = &state.assets[symbol.code];
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[1].tags, vec!["hot", "defi"]);
        }
    }

    #[tokio::test]
    async fn begin_round_is_single_flight() {
        let store = PortfolioStore::new();
        assert!(store.begin_round().await);
        assert!(!store.begin_round().await);
        assert!(store.snapshot().await.is_syncing);

        store.end_round().await;
        assert!(!store.snapshot().await.is_syncing);
        assert!(store.begin_round().await);
    }

    #[tokio::test]
    async fn commit_round_swaps_prices_and_assets_together() {
        let store = PortfolioStore::new();
        store.seed(&configs(&[("bc1qa", &[])]), &[]).await;

        let mut prices = PriceTable::new();
        prices
            .entry("btc".to_string())
            .or_default()
            .insert("usd".to_string(), 50_000.0);
        let mut assets = AssetMap::new();
        assets.insert(
            "btc".to_string(),
            vec![AssetInfo::from_raw("bc1qa", 100_000_000, 8)],
        );

        store.commit_round(prices, assets).await;

        let state = store.snapshot().await;
        assert!(state.last_sync_time.is_some());
        assert_eq!(lookup_price(&state.prices, "btc", "usd"), 50_000.0);
        assert_eq!(state.assets["btc"][0].balance, 100_000_000);
    }
}
