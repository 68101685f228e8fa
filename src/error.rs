use thiserror::Error;

/// Failures talking to the custody service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid amount {value:?} for wallet {wallet_id}")]
    InvalidAmount { wallet_id: String, value: String },

    #[error("request signing failed: {0}")]
    Signing(String),
}

/// Configuration rejected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate rule name: {0}")]
    DuplicateRule(String),

    #[error("duplicate wallet name: {0}")]
    DuplicateWallet(String),

    #[error("schedule not specified for rule: {0}")]
    EmptySchedule(String),

    #[error("invalid schedule {schedule:?} for rule {rule}: {reason}")]
    InvalidSchedule {
        rule: String,
        schedule: String,
        reason: String,
    },

    #[error("wallet '{wallet}' in rule '{rule}' does not exist")]
    UnknownWallet { wallet: String, rule: String },

    #[error("asset mismatch for wallet '{wallet}': expected '{expected}', got '{actual}'")]
    AssetMismatch {
        wallet: String,
        expected: String,
        actual: String,
    },

    #[error("invalid credentials: {0}")]
    Credentials(String),
}

/// No counterpart wallet for a balance's asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("cold custody wallet for asset '{0}' not found")]
    NoColdWallet(String),

    #[error("trading wallet for asset '{0}' not found")]
    NoTradingWallet(String),
}

/// A balance query failed; the whole collection is abandoned.
#[derive(Debug, Error)]
#[error("could not get balance for wallet {wallet_id}: {source}")]
pub struct CollectError {
    pub wallet_id: String,
    #[source]
    pub source: ApiError,
}
