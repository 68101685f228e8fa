use std::{path::Path, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use prime_sweeper::{
    config::{self, Config},
    directory::AssetDirectory,
    prime::{PrimeApi, PrimeClient},
    scheduler::Scheduler,
    sweeper::Sweeper,
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = term.recv() => {},
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_logging();
    info!("Prime sweeper starting...");

    let env = config::load_env()?;
    let cfg = Arc::new(Config::load(Path::new(&env.config_path))?);
    info!("  Config: {}", env.config_path);
    info!("  API URL: {}", env.api_url);
    info!("  Portfolio: {}", env.credentials.portfolio_id);

    let client = PrimeClient::new(&env.api_url, env.credentials, cfg.daemon.request_timeout())?;
    let api: Arc<dyn PrimeApi> = Arc::new(client);

    config::verify_wallets(&cfg, api.as_ref()).await?;

    // Must be complete before any rule can fire.
    let directory = Arc::new(AssetDirectory::build(api.as_ref(), &cfg.wallets).await?);
    info!(
        trading_wallets = ?directory.iter().collect::<Vec<_>>(),
        "successfully collected trading wallet information"
    );

    let sweeper = Sweeper::new(api, Arc::clone(&cfg), directory);
    let scheduler = Scheduler::start(sweeper.clone(), &cfg.rules)?;
    info!("Scheduled {} rules", scheduler.rule_count());

    shutdown_signal().await;
    info!("Shutdown signal received, stopping...");

    scheduler.stop().await;
    sweeper.drain(cfg.daemon.shutdown_grace()).await;

    info!("Prime sweeper stopped.");
    Ok(())
}
