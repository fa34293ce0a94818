//! blockchain.info balance source (BTC)

use crate::{
    constants::{BLOCKCHAIN_INFO_API_URL, BTC, REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::SourceError,
    source::BalanceSource,
    types::{AssetInfo, Symbol},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// blockchain.info `/balance` response: address -> balance record
type BalanceResponse = HashMap<String, AddressBalance>;

#[derive(Debug, Deserialize)]
struct AddressBalance {
    /// Confirmed balance in satoshi
    final_balance: u128,
}

/// BTC balance source backed by the public blockchain.info batch endpoint.
///
/// One request covers every address (`active=addr1|addr2`), so the failure
/// granularity is the whole batch: a transport or parse error degrades
/// every address to a zero-value record.
pub struct BlockchainInfoSource {
    client: Client,
}

impl BlockchainInfoSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::NetworkError)?;

        Ok(Self { client })
    }

    fn build_url(&self, addresses: &[String]) -> String {
        format!(
            "{}/balance?active={}",
            BLOCKCHAIN_INFO_API_URL,
            addresses.join("|")
        )
    }

    /// One record per input address, in input order; addresses the
    /// provider did not echo back count as zero balance.
    fn map_response(&self, response: &BalanceResponse, addresses: &[String]) -> Vec<AssetInfo> {
        addresses
            .iter()
            .map(|addr| {
                let raw = response
                    .get(addr)
                    .map(|info| info.final_balance)
                    .unwrap_or(0);
                AssetInfo::from_raw(addr, raw, BTC.decimals)
            })
            .collect()
    }

    async fn fetch(&self, addresses: &[String]) -> Result<Vec<AssetInfo>, SourceError> {
        let url = self.build_url(addresses);
        tracing::debug!(count = addresses.len(), "Fetching BTC balances");

        let response = self.client.get(&url).send().await?;

        if response.status().as_u16() == 429 {
            return Err(SourceError::RateLimitExceeded);
        }
        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let balances: BalanceResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        Ok(self.map_response(&balances, addresses))
    }
}

#[async_trait]
impl BalanceSource for BlockchainInfoSource {
    fn symbol(&self) -> Symbol {
        BTC
    }

    fn source_name(&self) -> &'static str {
        "blockchain.info"
    }

    async fn get_balances(&self, addresses: &[String]) -> Vec<AssetInfo> {
        if addresses.is_empty() {
            return Vec::new();
        }

        match self.fetch(addresses).await {
            Ok(balances) => balances,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch BTC balances");
                addresses.iter().map(|a| AssetInfo::zero(a)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let source = BlockchainInfoSource::new().unwrap();
        assert!(source.get_balances(&[]).await.is_empty());
    }

    #[test]
    fn maps_response_in_input_order() {
        let source = BlockchainInfoSource::new().unwrap();
        let json = r#"{
            "bc1qa": { "final_balance": 100000000 },
            "bc1qb": { "final_balance": 25000000 }
        }"#;
        let response: BalanceResponse = serde_json::from_str(json).unwrap();

        let addresses = vec![
            "bc1qb".to_string(),
            "bc1qa".to_string(),
            "bc1qmissing".to_string(),
        ];
        let balances = source.map_response(&response, &addresses);

        assert_eq!(balances.len(), 3);
        assert_eq!(balances[0].address, "bc1qb");
        assert_eq!(balances[0].balance, 25_000_000);
        assert_eq!(balances[1].balance, 100_000_000);
        assert_eq!(balances[1].balance_formatted, 1.0);
        // Address the provider left out reads as zero.
        assert_eq!(balances[2].balance, 0);
        assert_eq!(balances[2].value, 0.0);
    }

    #[test]
    fn batch_url_joins_with_pipe() {
        let source = BlockchainInfoSource::new().unwrap();
        let url = source.build_url(&["a1".to_string(), "a2".to_string()]);
        assert!(url.ends_with("/balance?active=a1|a2"));
    }
}
