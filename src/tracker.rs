//! Portfolio sync orchestrator
//!
//! Owns the configuration, the snapshot store and the periodic timer,
//! and drives the sync rounds: single-flight guard, parallel fan-out to
//! the price source plus every balance source, merge, atomic snapshot
//! swap, completion notification.

use crate::{
    constants::{ALL_SYMBOLS, ETHERSCAN_THROTTLE_MS, STALE_SYNC_SECS, SYNC_INTERVAL_SECS},
    error::SourceError,
    metrics::{RoundMetrics, SyncMetrics},
    source::{BalanceSource, PriceSource},
    sources::{BlockchainInfoSource, CoinGeckoSource, EtherscanSource},
    store::{AssetMap, PortfolioStore},
    throttler::Throttler,
    types::{
        lookup_price, AddressConfig, AssetInfo, Chain, ComponentHealth, HealthStatus,
        PortfolioState, PriceTable, Symbol,
    },
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

/// Outcome of one [`PortfolioTracker::sync_now`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another round was in flight (or the tracker is unconfigured); no
    /// new work was started
    Skipped,
    /// The round completed and a new snapshot was committed
    Success,
    /// The round failed; the previous snapshot is untouched
    Failed,
}

/// Provider credentials supplied by the host
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub etherscan_api_key: Option<String>,
    pub coingecko_api_key: Option<String>,
}

/// Full engine configuration, replaced wholesale on every `configure`
#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    /// Fiat currency code, e.g. "USD"
    pub currency: String,
    /// Minimum fiat value the host wants to render; the engine only
    /// stores it
    pub min_value: f64,
    pub btc_addresses: Vec<AddressConfig>,
    pub evm_addresses: Vec<AddressConfig>,
    pub credentials: ProviderCredentials,
}

type SyncListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Everything one sync round needs, captured at configure time. A round
/// that straddles a reconfiguration keeps the sources it started with.
struct ActiveSync {
    currency: String,
    min_value: f64,
    btc_addresses: Vec<AddressConfig>,
    evm_addresses: Vec<AddressConfig>,
    price_source: Arc<dyn PriceSource>,
    balance_sources: Vec<Arc<dyn BalanceSource>>,
}

impl ActiveSync {
    fn addresses_for(&self, chain: Chain) -> &[AddressConfig] {
        match chain {
            Chain::Bitcoin => &self.btc_addresses,
            Chain::Ethereum => &self.evm_addresses,
        }
    }
}

/// Multi-chain portfolio sync engine.
///
/// # Example
/// ```no_run
/// use portfolio_sync_sdk::{AddressConfig, PortfolioConfig, PortfolioTracker, ProviderCredentials};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = PortfolioTracker::new();
/// tracker
///     .configure(PortfolioConfig {
///         currency: "USD".to_string(),
///         min_value: 0.0,
///         btc_addresses: vec![AddressConfig::new("bc1q...")],
///         evm_addresses: vec![AddressConfig::new("0x...")],
///         credentials: ProviderCredentials::default(),
///     })
///     .await?;
///
/// tracker.on_sync_done(|success| println!("sync done: {success}")).await;
/// let state = tracker.get_state().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PortfolioTracker {
    store: Arc<PortfolioStore>,
    metrics: Arc<SyncMetrics>,
    active: Arc<RwLock<Option<Arc<ActiveSync>>>>,
    listeners: Arc<RwLock<Vec<SyncListener>>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PortfolioTracker {
    /// Creates an unconfigured tracker. `sync_now` is a no-op until
    /// [`configure`](Self::configure) (or
    /// [`configure_with`](Self::configure_with)) installs sources.
    pub fn new() -> Self {
        Self {
            store: Arc::new(PortfolioStore::new()),
            metrics: Arc::new(SyncMetrics::new()),
            active: Arc::new(RwLock::new(None)),
            listeners: Arc::new(RwLock::new(Vec::new())),
            timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Installs the full configuration: one balance source per tracked
    /// symbol (blockchain.info for BTC, Etherscan for EVM assets sharing
    /// one request throttler), CoinGecko prices, zero-value placeholder
    /// state, and the periodic sync loop whose first tick fires
    /// immediately.
    ///
    /// Calling this again fully replaces sources and settings and
    /// restarts the timer.
    pub async fn configure(&self, config: PortfolioConfig) -> Result<(), SourceError> {
        let throttler = Arc::new(Throttler::new(Duration::from_millis(ETHERSCAN_THROTTLE_MS)));

        let mut balance_sources: Vec<Arc<dyn BalanceSource>> =
            Vec::with_capacity(ALL_SYMBOLS.len());
        for symbol in ALL_SYMBOLS {
            let source: Arc<dyn BalanceSource> = match symbol.chain {
                Chain::Bitcoin => Arc::new(BlockchainInfoSource::new()?),
                Chain::Ethereum => Arc::new(EtherscanSource::new(
                    *symbol,
                    config.credentials.etherscan_api_key.clone(),
                    throttler.clone(),
                )?),
            };
            balance_sources.push(source);
        }

        let price_source: Arc<dyn PriceSource> =
            Arc::new(CoinGeckoSource::new(config.credentials.coingecko_api_key.clone())?);

        self.configure_with(
            config.currency,
            config.min_value,
            config.btc_addresses,
            config.evm_addresses,
            price_source,
            balance_sources,
        )
        .await;

        self.start_sync_loop().await;
        Ok(())
    }

    /// Installs caller-supplied sources and seeds the placeholder state
    /// without starting the periodic timer. This is primarily for tests
    /// and for hosts with custom adapters; call
    /// [`start_sync_loop`](Self::start_sync_loop) to add the timer.
    pub async fn configure_with(
        &self,
        currency: impl Into<String>,
        min_value: f64,
        btc_addresses: Vec<AddressConfig>,
        evm_addresses: Vec<AddressConfig>,
        price_source: Arc<dyn PriceSource>,
        balance_sources: Vec<Arc<dyn BalanceSource>>,
    ) {
        self.store.seed(&btc_addresses, &evm_addresses).await;

        let active = ActiveSync {
            currency: currency.into(),
            min_value,
            btc_addresses,
            evm_addresses,
            price_source,
            balance_sources,
        };
        *self.active.write().await = Some(Arc::new(active));
    }

    /// (Re)starts the periodic sync loop. The first tick completes
    /// immediately, so this also triggers the initial sync. Ticks that
    /// land while a round is in flight are no-ops; no backlog
    /// accumulates.
    pub async fn start_sync_loop(&self) {
        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let tracker = self.clone();
        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(SYNC_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Each round runs on its own task so stopping the timer
                // never cancels a round mid-flight.
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    tracker.sync_now().await;
                });
            }
        }));
    }

    /// Stops the periodic sync loop. An in-flight round still runs to
    /// completion.
    pub async fn stop(&self) {
        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            tracing::info!("Stopping sync loop");
            handle.abort();
        }
    }

    /// Runs one sync round, unless one is already in flight.
    ///
    /// All sources are queried in parallel; each branch runs on its own
    /// task so that a panic escaping a source fails only this round (the
    /// previous snapshot stays). Sources that degrade internally (zero
    /// balances, empty price table) still count as a successful round.
    /// Listeners are notified on every outcome after the single-flight
    /// guard clears.
    pub async fn sync_now(&self) -> SyncOutcome {
        let active = self.active.read().await.clone();
        let Some(active) = active else {
            tracing::warn!("Sync requested before configuration");
            return SyncOutcome::Skipped;
        };

        if !self.store.begin_round().await {
            return SyncOutcome::Skipped;
        }

        let round = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(round = %round, "Starting sync round");

        let price_branch = {
            let source = active.price_source.clone();
            let currency = active.currency.clone();
            tokio::spawn(async move { source.get_prices(&currency, ALL_SYMBOLS).await })
        };

        let balance_branches: Vec<JoinHandle<(Symbol, Vec<AssetInfo>)>> = active
            .balance_sources
            .iter()
            .map(|source| {
                let source = source.clone();
                let addresses: Vec<String> = active
                    .addresses_for(source.symbol().chain)
                    .iter()
                    .map(|config| config.address.clone())
                    .collect();
                tokio::spawn(async move {
                    let symbol = source.symbol();
                    (symbol, source.get_balances(&addresses).await)
                })
            })
            .collect();

        // The round only settles once every branch has.
        let price_result = price_branch.await;
        let balance_results = join_all(balance_branches).await;

        let mut round_failed = false;

        let prices = match price_result {
            Ok(prices) => prices,
            Err(e) => {
                tracing::error!(round = %round, error = %e, "Price branch died");
                round_failed = true;
                PriceTable::new()
            }
        };

        let mut fetched: Vec<(Symbol, Vec<AssetInfo>)> = Vec::new();
        for result in balance_results {
            match result {
                Ok(entry) => fetched.push(entry),
                Err(e) => {
                    tracing::error!(round = %round, error = %e, "Balance branch died");
                    round_failed = true;
                }
            }
        }

        let success = !round_failed;
        if success {
            let assets = Self::merge_round(&active, &prices, fetched);
            self.store.commit_round(prices, assets).await;
            tracing::info!(
                round = %round,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Sync round finished"
            );
        } else {
            tracing::error!(round = %round, "Sync round failed, keeping previous snapshot");
        }

        self.metrics.record_round(started.elapsed(), success).await;
        self.store.end_round().await;
        self.notify_listeners(success).await;

        if success {
            SyncOutcome::Success
        } else {
            SyncOutcome::Failed
        }
    }

    /// Builds the round's asset map from the fetched per-source results:
    /// tags re-attached from the configured address entries (sources only
    /// know addresses and balances) and fiat value computed from the same
    /// round's price table.
    fn merge_round(
        active: &ActiveSync,
        prices: &PriceTable,
        fetched: Vec<(Symbol, Vec<AssetInfo>)>,
    ) -> AssetMap {
        let mut assets = AssetMap::new();

        for (symbol, mut entries) in fetched {
            let configs = active.addresses_for(symbol.chain);
            let price = lookup_price(prices, symbol.code, &active.currency);

            for entry in &mut entries {
                if let Some(config) = configs.iter().find(|c| c.address == entry.address) {
                    entry.tags = config.tags.clone();
                }
                entry.value = entry.balance_formatted * price;
            }

            assets.insert(symbol.code.to_string(), entries);
        }

        assets
    }

    /// Registers a callback invoked once per completed round, success or
    /// failure, after the snapshot is final. Callbacks are dispatched in
    /// registration order, each on its own task, so one listener cannot
    /// block or crash another.
    pub async fn on_sync_done<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.listeners.write().await.push(Arc::new(callback));
    }

    async fn notify_listeners(&self, success: bool) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            tokio::spawn(async move { listener(success) });
        }
    }

    /// Read-only clone of the current snapshot.
    pub async fn get_state(&self) -> PortfolioState {
        self.store.snapshot().await
    }

    /// Configured fiat currency; "USD" before configuration.
    pub async fn get_currency(&self) -> String {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.currency.clone())
            .unwrap_or_else(|| "USD".to_string())
    }

    /// Configured minimum display value; 0 before configuration.
    pub async fn get_min_value(&self) -> f64 {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.min_value)
            .unwrap_or(0.0)
    }

    /// Current sync-round metrics.
    pub async fn get_metrics(&self) -> RoundMetrics {
        self.metrics.report().await
    }

    /// Perform a health check on the sync engine.
    pub async fn health_check(&self) -> ComponentHealth {
        let state = self.get_state().await;
        let report = self.metrics.report().await;

        let mut details = HashMap::new();
        details.insert("tracked_symbols".to_string(), json!(ALL_SYMBOLS.len()));
        details.insert("is_syncing".to_string(), json!(state.is_syncing));
        details.insert("rounds_total".to_string(), json!(report.rounds_total));
        details.insert("rounds_failed".to_string(), json!(report.rounds_failed));
        if let Some(last_sync) = state.last_sync_time {
            details.insert("last_sync_time".to_string(), json!(last_sync));
        }

        let status = match state.last_sync_time {
            None => HealthStatus::Unhealthy,
            Some(last_sync)
                if Utc::now().signed_duration_since(last_sync).num_seconds()
                    > STALE_SYNC_SECS as i64 =>
            {
                HealthStatus::Degraded
            }
            Some(_) => HealthStatus::Healthy,
        };

        let message = match status {
            HealthStatus::Healthy => "Portfolio snapshot is fresh".to_string(),
            HealthStatus::Degraded => format!(
                "Last successful sync is older than {} seconds",
                STALE_SYNC_SECS
            ),
            HealthStatus::Unhealthy => "No sync round has completed yet".to_string(),
        };

        ComponentHealth {
            name: "portfolio_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }
}

impl Default for PortfolioTracker {
    fn default() -> Self {
        Self::new()
    }
}
