use anyhow::Context;
use chrono::Local;
use prime_sweeper::config::{self, DEFAULT_API_URL};
use prime_sweeper::prime::{PrimeApi, PrimeClient};
use std::time::Duration;

const PAGE_SIZE: u32 = 1000;

struct Row {
    name: String,
    id: String,
    symbol: String,
    balance: String,
}

/// Dump every vault wallet with its withdrawable balance to a CSV file,
/// as a starting point for the `wallets:` section of the sweeper config.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let raw = std::env::var("PRIME_CREDENTIALS").context("PRIME_CREDENTIALS is not set")?;
    let credentials = config::Credentials::from_json(&raw)?;
    let api_url = std::env::var("PRIME_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let client = PrimeClient::new(&api_url, credentials, Duration::from_secs(30))?;

    let mut rows = Vec::new();
    let mut cursor = String::new();

    loop {
        let page = client
            .list_wallets_page("VAULT", &[], &cursor, PAGE_SIZE)
            .await
            .context("error listing wallets")?;
        let total = page.wallets.len();

        for (i, wallet) in page.wallets.into_iter().enumerate() {
            let balance = match client.get_wallet_balance(&wallet.id).await {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("error getting wallet balance for {}: {}", wallet.name, e);
                    continue;
                }
            };
            println!("{}/{}: wallet {} ({}) collected", i + 1, total, wallet.name, wallet.symbol);
            rows.push(Row {
                name: wallet.name,
                id: wallet.id,
                symbol: wallet.symbol,
                balance: balance.withdrawable_amount.to_string(),
            });
        }

        if !page.pagination.has_next {
            break;
        }
        cursor = page.pagination.next_cursor;
    }

    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let prefix: String = client.portfolio_id().chars().take(5).collect();
    let filename = format!(
        "cold_wallets_{}_{}.csv",
        prefix,
        Local::now().format("%Y%m%d-%H%M%S")
    );

    let mut writer = csv::Writer::from_path(&filename)
        .with_context(|| format!("error creating CSV file {filename}"))?;
    writer.write_record(["Name", "ID", "Symbol", "Balance"])?;
    for row in &rows {
        if let Err(e) = writer.write_record([&row.name, &row.id, &row.symbol, &row.balance]) {
            eprintln!("error writing wallet {} to CSV file: {}", row.name, e);
        }
    }
    writer.flush()?;

    println!(
        "{} cold wallets exported to {}, sorted by symbol.",
        rows.len(),
        filename
    );
    Ok(())
}
