//! Source abstractions: balance and price adapters
//!
//! The orchestrator is polymorphic over two capabilities: "given addresses,
//! return balance records" and "given a currency and the tracked symbols,
//! return a price table". Concrete adapters live in [`crate::sources`].
//!
//! Both contracts are infallible outward: an adapter catches its own
//! transport/parse errors and returns degraded output (zero balances, an
//! empty table) instead of propagating. One provider outage must never
//! block or fail the other fan-out branches of a sync round.

use crate::types::{AssetInfo, PriceTable, Symbol};
use async_trait::async_trait;

/// Fetches raw on-chain balances for one tracked asset.
///
/// `get_balances` returns one record per input address, in input order.
/// Empty input means empty output with no provider call. Raw balances are
/// in the smallest unit; `value` is left 0 for the orchestrator to fill.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// The asset this source fetches balances for
    fn symbol(&self) -> Symbol;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;

    async fn get_balances(&self, addresses: &[String]) -> Vec<AssetInfo>;
}

/// Fetches fiat prices for the tracked symbols.
///
/// On any error the implementation returns an empty table: consumers treat
/// a missing entry as "price unknown, value 0", not as a sync failure.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Returns the name of this source
    fn source_name(&self) -> &'static str;

    async fn get_prices(&self, currency: &str, symbols: &[Symbol]) -> PriceTable;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Normal,
        /// Simulates a contained provider failure: zero-fill output
        Degraded,
        /// Simulates an unexpected failure escaping the source
        Panic,
    }

    /// Scriptable balance source for orchestrator tests.
    pub struct MockBalanceSource {
        symbol: Symbol,
        balances: Mutex<HashMap<String, u128>>,
        mode: Mutex<Mode>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl MockBalanceSource {
        pub fn new(symbol: Symbol) -> Self {
            Self {
                symbol,
                balances: Mutex::new(HashMap::new()),
                mode: Mutex::new(Mode::Normal),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn set_balance(&self, address: &str, raw: u128) {
            self.balances
                .lock()
                .unwrap()
                .insert(address.to_string(), raw);
        }

        /// Every fetch from now on returns zero-value records, as a real
        /// source does after catching a provider failure.
        pub fn set_degraded(&self) {
            *self.mode.lock().unwrap() = Mode::Degraded;
        }

        /// Every fetch from now on panics, modeling the one error class
        /// the orchestrator itself must absorb.
        pub fn set_panicking(&self) {
            *self.mode.lock().unwrap() = Mode::Panic;
        }

        /// Fetches block until the gate is notified.
        pub fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BalanceSource for MockBalanceSource {
        fn symbol(&self) -> Symbol {
            self.symbol
        }

        fn source_name(&self) -> &'static str {
            "mock-balance"
        }

        async fn get_balances(&self, addresses: &[String]) -> Vec<AssetInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let mode = *self.mode.lock().unwrap();
            match mode {
                Mode::Panic => panic!("mock balance source failure"),
                Mode::Degraded => addresses.iter().map(|a| AssetInfo::zero(a)).collect(),
                Mode::Normal => {
                    let balances = self.balances.lock().unwrap();
                    addresses
                        .iter()
                        .map(|addr| {
                            let raw = balances.get(addr).copied().unwrap_or(0);
                            AssetInfo::from_raw(addr, raw, self.symbol.decimals)
                        })
                        .collect()
                }
            }
        }
    }

    /// Scriptable price source for orchestrator tests.
    pub struct MockPriceSource {
        table: Mutex<PriceTable>,
        mode: Mutex<Mode>,
        calls: AtomicUsize,
    }

    impl MockPriceSource {
        pub fn new() -> Self {
            Self {
                table: Mutex::new(PriceTable::new()),
                mode: Mutex::new(Mode::Normal),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn set_price(&self, code: &str, currency: &str, price: f64) {
            self.table
                .lock()
                .unwrap()
                .entry(code.to_string())
                .or_default()
                .insert(currency.to_lowercase(), price);
        }

        /// Every fetch from now on returns an empty table, as a real
        /// source does after catching a provider failure.
        pub fn set_degraded(&self) {
            *self.mode.lock().unwrap() = Mode::Degraded;
        }

        pub fn set_panicking(&self) {
            *self.mode.lock().unwrap() = Mode::Panic;
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Default for MockPriceSource {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PriceSource for MockPriceSource {
        fn source_name(&self) -> &'static str {
            "mock-price"
        }

        async fn get_prices(&self, _currency: &str, _symbols: &[Symbol]) -> PriceTable {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mode = *self.mode.lock().unwrap();
            match mode {
                Mode::Panic => panic!("mock price source failure"),
                Mode::Degraded => PriceTable::new(),
                Mode::Normal => self.table.lock().unwrap().clone(),
            }
        }
    }
}
