use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::{collections::HashSet, env, fmt, path::Path, str::FromStr, time::Duration};
use tracing::{error, info};

use crate::error::ConfigError;
use crate::models::{Direction, WalletType};
use crate::prime::PrimeApi;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 7;
const DEFAULT_MONITOR_FREQUENCY_SECS: u64 = 10;
const DEFAULT_MONITOR_TIMEOUT_MINS: u64 = 60;

pub const DEFAULT_API_URL: &str = "https://api.prime.coinbase.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
}

/// Timing knobs. Zero or absent values fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub context_timeout_duration: u64, // seconds
    #[serde(default)]
    pub transfer_monitor_frequency: u64, // seconds
    #[serde(default)]
    pub transfer_monitor_timeout_duration: u64, // minutes
    #[serde(default)]
    pub shutdown_grace_period: u64, // seconds
}

impl DaemonConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(non_zero_or(
            self.context_timeout_duration,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ))
    }

    pub fn monitor_frequency(&self) -> Duration {
        Duration::from_secs(non_zero_or(
            self.transfer_monitor_frequency,
            DEFAULT_MONITOR_FREQUENCY_SECS,
        ))
    }

    pub fn monitor_timeout(&self) -> Duration {
        Duration::from_secs(
            60 * non_zero_or(
                self.transfer_monitor_timeout_duration,
                DEFAULT_MONITOR_TIMEOUT_MINS,
            ),
        )
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period)
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value > 0 {
        value
    } else {
        default
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rule {
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub wallets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletConfig {
    pub name: String,
    pub asset: String,
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
    #[serde(alias = "cold_wallet_id")]
    pub wallet_id: String,
    #[serde(default)]
    pub description: String,
}

impl Config {
    /// Load from a YAML file, with `SWEEPER__*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            )
            .add_source(
                ::config::Environment::with_prefix("SWEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;

        let cfg: Config = settings
            .try_deserialize()
            .wrap_err("failed to deserialize config")?;
        cfg.validate()?;

        info!(
            "Loaded config: {} rules, {} wallets",
            cfg.rules.len(),
            cfg.wallets.len()
        );
        Ok(cfg)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Config = ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut rule_names = HashSet::new();
        for rule in &self.rules {
            if !rule_names.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateRule(rule.name.clone()));
            }
        }

        for rule in &self.rules {
            parse_schedule(rule)?;
            for wallet_name in &rule.wallets {
                if self.wallet(wallet_name).is_none() {
                    return Err(ConfigError::UnknownWallet {
                        wallet: wallet_name.clone(),
                        rule: rule.name.clone(),
                    });
                }
            }
        }

        let mut wallet_names = HashSet::new();
        for wallet in &self.wallets {
            if !wallet_names.insert(wallet.name.as_str()) {
                return Err(ConfigError::DuplicateWallet(wallet.name.clone()));
            }
        }
        Ok(())
    }

    pub fn wallet(&self, name: &str) -> Option<&WalletConfig> {
        self.wallets.iter().find(|w| w.name == name)
    }

    /// First wallet of the given tier holding `asset`.
    pub fn wallet_for_asset(&self, asset: &str, wallet_type: WalletType) -> Option<&WalletConfig> {
        self.wallets
            .iter()
            .find(|w| w.asset == asset && w.wallet_type == wallet_type)
    }
}

/// Parse a rule's seconds-resolution cron expression.
pub fn parse_schedule(rule: &Rule) -> Result<cron::Schedule, ConfigError> {
    if rule.schedule.trim().is_empty() {
        return Err(ConfigError::EmptySchedule(rule.name.clone()));
    }
    cron::Schedule::from_str(&rule.schedule).map_err(|e| ConfigError::InvalidSchedule {
        rule: rule.name.clone(),
        schedule: rule.schedule.clone(),
        reason: e.to_string(),
    })
}

/// Check every configured wallet exists remotely and holds the configured asset.
pub async fn verify_wallets(cfg: &Config, api: &dyn PrimeApi) -> Result<()> {
    for wallet in &cfg.wallets {
        let remote = api
            .get_wallet(&wallet.wallet_id)
            .await
            .wrap_err_with(|| format!("cannot get wallet {}", wallet.name))?;

        if remote.symbol != wallet.asset {
            error!(wallet = %wallet.name, "configured asset does not match custody service");
            return Err(ConfigError::AssetMismatch {
                wallet: wallet.name.clone(),
                expected: wallet.asset.clone(),
                actual: remote.symbol,
            }
            .into());
        }
    }
    info!("Verified {} configured wallets", cfg.wallets.len());
    Ok(())
}

/// API credentials, read from `PRIME_CREDENTIALS` as JSON.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key: String,
    pub passphrase: String,
    pub signing_key: String,
    pub portfolio_id: String,
    #[serde(default)]
    pub svc_account_id: String,
    #[serde(default)]
    pub entity_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"<redacted>")
            .field("portfolio_id", &self.portfolio_id)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let creds: Credentials = serde_json::from_str(raw)
            .map_err(|e| ConfigError::Credentials(format!("cannot unmarshal credentials: {e}")))?;
        if creds.portfolio_id.is_empty() {
            return Err(ConfigError::Credentials("portfolioId is empty".into()));
        }
        Ok(creds)
    }
}

/// Process-level settings taken from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Env {
    pub config_path: String,
    pub api_url: String,
    pub credentials: Credentials,
}

pub fn load_env() -> Result<Env> {
    dotenv().ok();

    // first CLI argument wins over SWEEPER_CONFIG
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("SWEEPER_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    let api_url = env::var("PRIME_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

    let raw = env::var("PRIME_CREDENTIALS")
        .map_err(|_| ConfigError::Credentials("PRIME_CREDENTIALS is not set".into()))?;
    let credentials = Credentials::from_json(&raw)?;

    Ok(Env {
        config_path,
        api_url,
        credentials,
    })
}
