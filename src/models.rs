// src/models.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which way a rule moves funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "trading_to_cold_custody", alias = "hot_to_cold")]
    HotToCold,
    #[serde(rename = "cold_custody_to_trading", alias = "cold_to_hot")]
    ColdToHot,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::HotToCold => f.write_str("trading_to_cold_custody"),
            Direction::ColdToHot => f.write_str("cold_custody_to_trading"),
        }
    }
}

/// Tier of an operator-declared wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    ColdCustody,
    Trading,
}

/// Wallet as reported by the custody service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub wallet_type: String,
}

/// The trading-tier wallet that handles one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradingWallet {
    pub id: String,
    pub symbol: String,
}

/// Identifies one sweep execution in the logs.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation_id: String,
    pub rule_name: String,
    pub direction: Direction,
    pub wallet_names: Vec<String>,
}

impl OperationContext {
    pub fn new(rule_name: &str, direction: Direction, wallet_names: &[String]) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            rule_name: rule_name.to_string(),
            direction,
            wallet_names: wallet_names.to_vec(),
        }
    }
}

/// Withdrawable amount currently held by a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub wallet_id: String,
    pub symbol: String,
    pub withdrawable_amount: Decimal, // exact, never f64
}

/// Instruction to move one wallet's balance to its counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_wallet_id: String,
    pub destination_wallet_id: String,
    pub symbol: String,
    pub amount: Decimal,
    pub idempotency_key: String,
}

impl TransferRequest {
    /// Every call mints a new idempotency key.
    pub fn new(balance: &Balance, destination_wallet_id: String) -> Self {
        Self {
            source_wallet_id: balance.wallet_id.clone(),
            destination_wallet_id,
            symbol: balance.symbol.clone(),
            amount: balance.withdrawable_amount,
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }
}

/// What the custody service returns for an accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCreated {
    pub activity_id: String,
    pub symbol: String,
    pub amount: String,
    pub approval_url: Option<String>,
}

/// A submitted transfer handed to a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTransfer {
    pub activity_id: String,
    pub source_wallet_id: String,
    pub destination_wallet_id: String,
    pub symbol: String,
    pub amount: String,
    /// Where an operator can approve or follow the transfer.
    pub review_url: Option<String>,
}

/// Settlement status of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum TransactionStatus {
    Pending,
    Done,
    Rejected,
    Failed,
    Other(String),
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Done | TransactionStatus::Rejected | TransactionStatus::Failed
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "TRANSACTION_PENDING",
            TransactionStatus::Done => "TRANSACTION_DONE",
            TransactionStatus::Rejected => "TRANSACTION_REJECTED",
            TransactionStatus::Failed => "TRANSACTION_FAILED",
            TransactionStatus::Other(s) => s,
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "TRANSACTION_PENDING" => TransactionStatus::Pending,
            "TRANSACTION_DONE" => TransactionStatus::Done,
            "TRANSACTION_REJECTED" => TransactionStatus::Rejected,
            "TRANSACTION_FAILED" => TransactionStatus::Failed,
            _ => TransactionStatus::Other(s),
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(s: &str) -> Self {
        TransactionStatus::from(s.to_string())
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
