//! In-memory custody service for tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::config::{Rule, WalletConfig};
use crate::error::ApiError;
use crate::models::{Balance, Direction, TransactionStatus, TransferCreated, TransferRequest, WalletInfo, WalletType};
use crate::prime::PrimeApi;

pub fn cold_wallet(name: &str, asset: &str, wallet_id: &str) -> WalletConfig {
    WalletConfig {
        name: name.into(),
        asset: asset.into(),
        wallet_type: WalletType::ColdCustody,
        wallet_id: wallet_id.into(),
        description: String::new(),
    }
}

pub fn rule(name: &str, direction: Direction, wallets: &[&str]) -> Rule {
    Rule {
        name: name.into(),
        direction,
        schedule: "0 0 0 * * *".into(),
        description: String::new(),
        wallets: wallets.iter().map(|w| w.to_string()).collect(),
    }
}

pub fn balance(wallet_id: &str, symbol: &str, amount: &str) -> Balance {
    Balance {
        wallet_id: wallet_id.into(),
        symbol: symbol.into(),
        withdrawable_amount: Decimal::from_str(amount).unwrap(),
    }
}

fn injected() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "injected failure".into(),
    }
}

/// Scripted stand-in for the custody service.
///
/// Activity `X` resolves to transaction `tx-X`. A status script yields its
/// entries in order and then keeps repeating the last one; transactions
/// without a script report pending.
#[derive(Default)]
pub struct FakePrime {
    trading: HashMap<String, Vec<WalletInfo>>,
    wallets: HashMap<String, WalletInfo>,
    balances: HashMap<String, Balance>,
    failing_listings: HashSet<String>,
    failing_balances: HashSet<String>,
    failing_transfers: HashSet<String>,
    failing_activities: HashSet<String>,
    failing_transactions: HashSet<String>,
    approval_url: Option<String>,
    scripts: Mutex<HashMap<String, VecDeque<TransactionStatus>>>,
    transfers: Mutex<Vec<TransferRequest>>,
    list_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl FakePrime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trading_wallet(mut self, symbol: &str, id: &str) -> Self {
        self.trading.entry(symbol.to_string()).or_default().push(WalletInfo {
            id: id.into(),
            name: format!("{symbol} Trading"),
            symbol: symbol.into(),
            wallet_type: "TRADING".into(),
        });
        self
    }

    pub fn with_wallet(mut self, id: &str, symbol: &str) -> Self {
        self.wallets.insert(
            id.to_string(),
            WalletInfo {
                id: id.into(),
                name: id.into(),
                symbol: symbol.into(),
                wallet_type: "VAULT".into(),
            },
        );
        self
    }

    pub fn with_balance(mut self, wallet_id: &str, symbol: &str, amount: &str) -> Self {
        self.balances
            .insert(wallet_id.to_string(), balance(wallet_id, symbol, amount));
        self
    }

    pub fn with_approval_url(mut self, url: &str) -> Self {
        self.approval_url = Some(url.to_string());
        self
    }

    pub fn with_status_script(self, transaction_id: &str, statuses: &[&str]) -> Self {
        self.scripts.lock().unwrap().insert(
            transaction_id.to_string(),
            statuses.iter().map(|s| TransactionStatus::from(*s)).collect(),
        );
        self
    }

    pub fn failing_listing(mut self, symbol: &str) -> Self {
        self.failing_listings.insert(symbol.to_string());
        self
    }

    pub fn failing_balance(mut self, wallet_id: &str) -> Self {
        self.failing_balances.insert(wallet_id.to_string());
        self
    }

    pub fn failing_transfer(mut self, source_wallet_id: &str) -> Self {
        self.failing_transfers.insert(source_wallet_id.to_string());
        self
    }

    pub fn failing_activity(mut self, activity_id: &str) -> Self {
        self.failing_activities.insert(activity_id.to_string());
        self
    }

    pub fn failing_transaction(mut self, transaction_id: &str) -> Self {
        self.failing_transactions.insert(transaction_id.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<TransferRequest> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrimeApi for FakePrime {
    async fn list_trading_wallets(&self, symbol: &str) -> Result<Vec<WalletInfo>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_listings.contains(symbol) {
            return Err(injected());
        }
        Ok(self.trading.get(symbol).cloned().unwrap_or_default())
    }

    async fn get_wallet(&self, wallet_id: &str) -> Result<WalletInfo, ApiError> {
        self.wallets.get(wallet_id).cloned().ok_or(ApiError::Status {
            status: 404,
            body: format!("wallet {wallet_id} not found"),
        })
    }

    async fn get_wallet_balance(&self, wallet_id: &str) -> Result<Balance, ApiError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_balances.contains(wallet_id) {
            return Err(injected());
        }
        Ok(self
            .balances
            .get(wallet_id)
            .cloned()
            .unwrap_or_else(|| balance(wallet_id, "UNKNOWN", "0")))
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferCreated, ApiError> {
        if self.failing_transfers.contains(&request.source_wallet_id) {
            return Err(injected());
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push(request.clone());
        Ok(TransferCreated {
            activity_id: format!("activity-{}", transfers.len()),
            symbol: request.symbol.clone(),
            amount: request.amount.to_string(),
            approval_url: self.approval_url.clone(),
        })
    }

    async fn get_activity(&self, activity_id: &str) -> Result<String, ApiError> {
        if self.failing_activities.contains(activity_id) {
            return Err(injected());
        }
        Ok(format!("tx-{activity_id}"))
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<TransactionStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_transactions.contains(transaction_id) {
            return Err(injected());
        }
        let mut scripts = self.scripts.lock().unwrap();
        let status = match scripts.get_mut(transaction_id) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(status.unwrap_or(TransactionStatus::Pending))
    }
}

/// One event seen by [`CapturedEvents`], with its fields rendered as text.
#[derive(Debug, Clone, Default)]
pub struct CapturedEvent {
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl Visit for CapturedEvent {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.push((field.name().to_string(), rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Records every event emitted on the current thread while installed.
#[derive(Clone, Default)]
pub struct CapturedEvents(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedEvents {
    /// Install as the thread's default subscriber until the guard drops.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let events = Self::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (events, guard)
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.message == message)
            .cloned()
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut captured = CapturedEvent::default();
        event.record(&mut captured);
        self.0.lock().unwrap().push(captured);
    }
}
