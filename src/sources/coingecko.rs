//! CoinGecko price source

use crate::{
    constants::{COINGECKO_API_URL, REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::SourceError,
    source::PriceSource,
    types::{PriceTable, Symbol},
};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// `/simple/price` and `/simple/token_price` both return
/// id-or-contract -> currency -> price
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

/// Fiat price source backed by CoinGecko.
///
/// Tracked symbols are split by how the provider can resolve them: native
/// coins by CoinGecko id, tokens by contract address. Both legs are
/// fetched concurrently and merged into one [`PriceTable`] keyed by symbol
/// code. Any failure degrades to an empty table; consumers read missing
/// prices as 0.
pub struct CoinGeckoSource {
    api_key: Option<String>,
    client: Client,
}

impl CoinGeckoSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::NetworkError)?;

        let api_key = api_key.filter(|key| !key.trim().is_empty());

        Ok(Self { api_key, client })
    }

    fn build_id_url(&self, ids: &[&str], currency: &str) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            COINGECKO_API_URL,
            ids.join(","),
            currency
        )
    }

    fn build_contract_url(&self, contracts: &[&str], currency: &str) -> String {
        format!(
            "{}/simple/token_price/ethereum?contract_addresses={}&vs_currencies={}",
            COINGECKO_API_URL,
            contracts.join(","),
            currency
        )
    }

    async fn request(&self, url: &str) -> Result<SimplePriceResponse, SourceError> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            // CoinGecko demo API key header
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;

        if response.status().as_u16() == 429 {
            return Err(SourceError::RateLimitExceeded);
        }
        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }

    /// Folds both provider responses into one table keyed by symbol code,
    /// matching provider ids and contract addresses case-insensitively.
    fn merge_responses(
        symbols: &[Symbol],
        currency: &str,
        by_id: &SimplePriceResponse,
        by_contract: &SimplePriceResponse,
    ) -> PriceTable {
        let mut table = PriceTable::new();

        for symbol in symbols {
            let entry = match symbol.contract_address {
                None => symbol.coingecko_id().and_then(|id| {
                    by_id
                        .iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(id))
                        .map(|(_, prices)| prices)
                }),
                Some(contract) => by_contract
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(contract))
                    .map(|(_, prices)| prices),
            };

            if let Some(price) = entry.and_then(|prices| prices.get(currency)) {
                table
                    .entry(symbol.code.to_string())
                    .or_default()
                    .insert(currency.to_string(), *price);
            }
        }

        table
    }

    async fn fetch(&self, currency: &str, symbols: &[Symbol]) -> Result<PriceTable, SourceError> {
        let currency = currency.to_lowercase();

        let ids: Vec<&str> = symbols
            .iter()
            .filter(|s| s.is_native())
            .filter_map(|s| s.coingecko_id())
            .collect();
        let contracts: Vec<&str> = symbols
            .iter()
            .filter_map(|s| s.contract_address)
            .collect();

        let id_leg = async {
            if ids.is_empty() {
                return Ok(SimplePriceResponse::new());
            }
            self.request(&self.build_id_url(&ids, &currency)).await
        };
        let contract_leg = async {
            if contracts.is_empty() {
                return Ok(SimplePriceResponse::new());
            }
            self.request(&self.build_contract_url(&contracts, &currency))
                .await
        };

        let (by_id, by_contract) = tokio::join!(id_leg, contract_leg);
        let (by_id, by_contract) = (by_id?, by_contract?);

        tracing::debug!(
            ids = by_id.len(),
            contracts = by_contract.len(),
            "Fetched prices from CoinGecko"
        );

        Ok(Self::merge_responses(symbols, &currency, &by_id, &by_contract))
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn source_name(&self) -> &'static str {
        "coingecko"
    }

    async fn get_prices(&self, currency: &str, symbols: &[Symbol]) -> PriceTable {
        if symbols.is_empty() {
            return PriceTable::new();
        }

        match self.fetch(currency, symbols).await {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch prices");
                PriceTable::new()
            }
        }
    }
}
