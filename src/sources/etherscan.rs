//! Etherscan v2 balance source (native ETH and ERC-20 tokens)

use crate::{
    constants::{ETHERSCAN_API_URL, REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::SourceError,
    source::BalanceSource,
    throttler::Throttler,
    types::{AssetInfo, Symbol},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    /// `balancemulti` returns an array, `tokenbalance` a string; narrowed
    /// per action below
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MultiBalanceEntry {
    account: String,
    balance: String,
}

/// EVM balance source, one instance per tracked symbol.
///
/// Native ETH uses the `balancemulti` batch action (one call for all
/// addresses); tokens use `tokenbalance`, which is one call per address,
/// so each token call goes through the shared [`Throttler`] to stay inside
/// the provider's request quota.
pub struct EtherscanSource {
    symbol: Symbol,
    api_key: Option<String>,
    throttler: Arc<Throttler>,
    client: Client,
}

impl EtherscanSource {
    pub fn new(
        symbol: Symbol,
        api_key: Option<String>,
        throttler: Arc<Throttler>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::NetworkError)?;

        // An empty key behaves like no key at all.
        let api_key = api_key.filter(|key| !key.trim().is_empty());

        Ok(Self {
            symbol,
            api_key,
            throttler,
            client,
        })
    }

    fn build_native_url(&self, addresses: &[String], api_key: &str) -> String {
        format!(
            "{}?chainid=1&module=account&action=balancemulti&tag=latest&address={}&apikey={}",
            ETHERSCAN_API_URL,
            addresses.join(","),
            api_key
        )
    }

    fn build_token_url(&self, address: &str, contract: &str, api_key: &str) -> String {
        format!(
            "{}?chainid=1&module=account&action=tokenbalance&contractaddress={}&address={}&tag=latest&apikey={}",
            ETHERSCAN_API_URL, contract, address, api_key
        )
    }

    async fn request(client: &Client, url: &str) -> Result<EtherscanResponse, SourceError> {
        let response = client.get(url).send().await?;

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

    /// One record per input address, matched to the provider's entries
    /// case-insensitively; addresses the provider left out are zero.
    fn map_native_result(
        &self,
        response: EtherscanResponse,
        addresses: &[String],
    ) -> Result<Vec<AssetInfo>, SourceError> {
        if response.status != "1" {
            return Err(SourceError::ApiError(response.message));
        }

        let entries: Vec<MultiBalanceEntry> = serde_json::from_value(response.result)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let by_account: HashMap<String, u128> = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.account.to_lowercase(),
                    entry.balance.parse().unwrap_or(0),
                )
            })
            .collect();

        Ok(addresses
            .iter()
            .map(|addr| {
                let raw = by_account
                    .get(&addr.to_lowercase())
                    .copied()
                    .unwrap_or(0);
                AssetInfo::from_raw(addr, raw, self.symbol.decimals)
            })
            .collect())
    }

    /// A token balance of zero often comes back as status "0" with result
    /// "0"; that is a zero balance, not an error.
    fn parse_token_result(response: &EtherscanResponse, code: &str) -> u128 {
        let result = response.result.as_str().unwrap_or("0");

        if response.status != "1" && response.message != "OK" && result != "0" {
            tracing::warn!(
                symbol = code,
                message = %response.message,
                "Etherscan reported a token balance error"
            );
        }

        result.parse().unwrap_or(0)
    }

    async fn fetch_native(
        &self,
        addresses: &[String],
        api_key: &str,
    ) -> Result<Vec<AssetInfo>, SourceError> {
        let url = self.build_native_url(addresses, api_key);
        tracing::debug!(
            symbol = self.symbol.code,
            count = addresses.len(),
            "Fetching native balances"
        );

        let response = Self::request(&self.client, &url).await?;
        self.map_native_result(response, addresses)
    }

    /// Sequential per-address fetch; a failed address degrades only
    /// itself, the rest of the batch keeps its real balances.
    async fn fetch_tokens(
        &self,
        addresses: &[String],
        api_key: &str,
        contract: &str,
    ) -> Vec<AssetInfo> {
        tracing::debug!(
            symbol = self.symbol.code,
            count = addresses.len(),
            "Fetching token balances"
        );

        let mut results = Vec::with_capacity(addresses.len());
        for addr in addresses {
            let client = self.client.clone();
            let url = self.build_token_url(addr, contract, api_key);
            let code = self.symbol.code;

            let outcome = self
                .throttler
                .throttle(async move {
                    let response = Self::request(&client, &url).await?;
                    Ok::<u128, SourceError>(Self::parse_token_result(&response, code))
                })
                .await;

            match outcome {
                Ok(Ok(raw)) => results.push(AssetInfo::from_raw(addr, raw, self.symbol.decimals)),
                Ok(Err(e)) => {
                    tracing::error!(
                        symbol = self.symbol.code,
                        address = %addr,
                        error = %e,
                        "Failed to fetch token balance"
                    );
                    results.push(AssetInfo::zero(addr));
                }
                Err(e) => {
                    tracing::error!(
                        symbol = self.symbol.code,
                        address = %addr,
                        error = %e,
                        "Throttled token balance call was dropped"
                    );
                    results.push(AssetInfo::zero(addr));
                }
            }
        }
        results
    }
}

#[async_trait]
impl BalanceSource for EtherscanSource {
    fn symbol(&self) -> Symbol {
        self.symbol
    }

    fn source_name(&self) -> &'static str {
        "etherscan"
    }

    async fn get_balances(&self, addresses: &[String]) -> Vec<AssetInfo> {
        if addresses.is_empty() {
            return Vec::new();
        }

        let Some(api_key) = self.api_key.clone() else {
            tracing::error!(
                symbol = self.symbol.code,
                "No Etherscan API key configured"
            );
            return addresses.iter().map(|a| AssetInfo::zero(a)).collect();
        };

        match self.symbol.contract_address {
            None => match self.fetch_native(addresses, &api_key).await {
                Ok(balances) => balances,
                Err(e) => {
                    tracing::error!(
                        symbol = self.symbol.code,
                        error = %e,
                        "Failed to fetch native balances"
                    );
                    addresses.iter().map(|a| AssetInfo::zero(a)).collect()
                }
            },
            Some(contract) => self.fetch_tokens(addresses, &api_key, contract).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ETH, USDT};

    fn source(symbol: Symbol, api_key: Option<&str>) -> EtherscanSource {
        let throttler = Arc::new(Throttler::new(Duration::from_millis(1)));
        EtherscanSource::new(symbol, api_key.map(str::to_string), throttler).unwrap()
    }

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let source = source(ETH, Some("key"));
        assert!(source.get_balances(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn missing_key_degrades_every_address() {
        let source = source(USDT, None);
        let addresses = vec!["0xaaa".to_string(), "0xbbb".to_string()];

        let balances = source.get_balances(&addresses).await;

        assert_eq!(balances.len(), 2);
        for (info, addr) in balances.iter().zip(&addresses) {
            assert_eq!(&info.address, addr);
            assert_eq!(info.balance, 0);
            assert_eq!(info.balance_formatted, 0.0);
            assert_eq!(info.value, 0.0);
        }
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let source = source(ETH, Some("   "));
        let balances = source.get_balances(&["0xaaa".to_string()]).await;
        assert_eq!(balances[0].balance, 0);
    }

    #[tokio::test]
    async fn maps_native_result_case_insensitively() {
        let source = source(ETH, Some("key"));
        let response: EtherscanResponse = serde_json::from_str(
            r#"{
                "status": "1",
                "message": "OK",
                "result": [
                    { "account": "0xAbC", "balance": "1500000000000000000" },
                    { "account": "0xdef", "balance": "0" }
                ]
            }"#,
        )
        .unwrap();

        let addresses = vec!["0xabc".to_string(), "0xDEF".to_string(), "0x123".to_string()];
        let balances = source.map_native_result(response, &addresses).unwrap();

        assert_eq!(balances[0].balance, 1_500_000_000_000_000_000);
        assert!((balances[0].balance_formatted - 1.5).abs() < 1e-9);
        assert_eq!(balances[1].balance, 0);
        assert_eq!(balances[2].balance, 0);
    }

    #[tokio::test]
    async fn native_error_status_is_an_error() {
        let source = source(ETH, Some("key"));
        let response: EtherscanResponse = serde_json::from_str(
            r#"{ "status": "0", "message": "NOTOK", "result": "Max rate limit reached" }"#,
        )
        .unwrap();

        let err = source
            .map_native_result(response, &["0xabc".to_string()])
            .unwrap_err();
        assert!(matches!(err, SourceError::ApiError(_)));
    }

    #[test]
    fn token_zero_with_error_status_is_a_zero_balance() {
        let response: EtherscanResponse = serde_json::from_str(
            r#"{ "status": "0", "message": "No transactions found", "result": "0" }"#,
        )
        .unwrap();
        assert_eq!(EtherscanSource::parse_token_result(&response, "usdt"), 0);
    }

    #[test]
    fn token_result_parses_smallest_units() {
        let response: EtherscanResponse = serde_json::from_str(
            r#"{ "status": "1", "message": "OK", "result": "2500000" }"#,
        )
        .unwrap();
        assert_eq!(
            EtherscanSource::parse_token_result(&response, "usdt"),
            2_500_000
        );
    }
}
