use portfolio_sync_sdk::{
    lookup_price, AddressConfig, PortfolioConfig, PortfolioTracker, ProviderCredentials,
};
use std::time::Duration;

fn addresses_from_env(var: &str) -> Vec<AddressConfig> {
    std::env::var(var)
        .unwrap_or_default()
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AddressConfig::new)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Addresses and keys come from the environment:
    //   BTC_ADDRESSES=bc1q...,bc1q...  ETH_ADDRESSES=0x...,0x...
    //   ETHERSCAN_API_KEY=...          COINGECKO_API_KEY=... (optional)
    let btc_addresses = addresses_from_env("BTC_ADDRESSES");
    let evm_addresses = addresses_from_env("ETH_ADDRESSES");

    if btc_addresses.is_empty() && evm_addresses.is_empty() {
        eprintln!("Set BTC_ADDRESSES and/or ETH_ADDRESSES to watch a portfolio.");
        return Ok(());
    }

    let currency = std::env::var("CURRENCY").unwrap_or_else(|_| "USD".to_string());

    let tracker = PortfolioTracker::new();
    tracker
        .configure(PortfolioConfig {
            currency: currency.clone(),
            min_value: 0.0,
            btc_addresses,
            evm_addresses,
            credentials: ProviderCredentials {
                etherscan_api_key: std::env::var("ETHERSCAN_API_KEY").ok(),
                coingecko_api_key: std::env::var("COINGECKO_API_KEY").ok(),
            },
        })
        .await?;

    println!("Watching portfolio, syncing every minute. Ctrl-C to stop.");

    let report_tracker = tracker.clone();
    tracker
        .on_sync_done(move |success| {
            let tracker = report_tracker.clone();
            tokio::spawn(async move {
                if !success {
                    eprintln!("Sync failed, showing previous snapshot");
                }

                let state = tracker.get_state().await;
                let currency = tracker.get_currency().await;

                let mut total = 0.0;
                println!("--- snapshot @ {:?} ---", state.last_sync_time);
                for (code, entries) in &state.assets {
                    let price = lookup_price(&state.prices, code, &currency);
                    for entry in entries {
                        if entry.balance == 0 {
                            continue;
                        }
                        total += entry.value;
                        println!(
                            "{:>10} {:<14} {:>16.6} @ {:>12.2} = {:>12.2} {}",
                            code, entry.address, entry.balance_formatted, price, entry.value,
                            entry.tags.join(",")
                        );
                    }
                }
                println!("{:>10} total value: {:.2} {}", "", total, currency);
            });
        })
        .await;

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}
