// src/prime.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use sha2::Sha256;
use std::{str::FromStr, time::Duration};
use tracing::debug;

use crate::config::Credentials;
use crate::error::ApiError;
use crate::models::{Balance, TransactionStatus, TransferCreated, TransferRequest, WalletInfo};

type HmacSha256 = Hmac<Sha256>;

/// Remote custody service, as seen by the sweeper.
#[async_trait]
pub trait PrimeApi: Send + Sync {
    /// Trading wallets holding `symbol`.
    async fn list_trading_wallets(&self, symbol: &str) -> Result<Vec<WalletInfo>, ApiError>;

    async fn get_wallet(&self, wallet_id: &str) -> Result<WalletInfo, ApiError>;

    async fn get_wallet_balance(&self, wallet_id: &str) -> Result<Balance, ApiError>;

    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferCreated, ApiError>;

    /// Transaction id the activity refers to.
    async fn get_activity(&self, activity_id: &str) -> Result<String, ApiError>;

    async fn get_transaction(&self, transaction_id: &str) -> Result<TransactionStatus, ApiError>;
}

#[derive(Debug, Deserialize)]
struct WalletsResponse {
    #[serde(default)]
    wallets: Vec<WalletInfo>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_cursor: String,
    #[serde(default)]
    pub has_next: bool,
}

/// One page of a wallet listing.
#[derive(Debug)]
pub struct WalletPage {
    pub wallets: Vec<WalletInfo>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct WalletResponse {
    wallet: WalletInfo,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: RawBalance,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    symbol: String,
    withdrawable_amount: String,
}

#[derive(Debug, Deserialize)]
struct CreateTransferResponse {
    activity_id: String,
    #[serde(default)]
    approval_url: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    amount: String,
}

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    activity: RawActivity,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    reference_id: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    transaction: RawTransaction,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    status: TransactionStatus,
}

/// Signed REST client for the custody service.
#[derive(Clone)]
pub struct PrimeClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl PrimeClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn portfolio_id(&self) -> &str {
        &self.credentials.portfolio_id
    }

    fn portfolio_path(&self, rest: &str) -> String {
        format!("/v1/portfolios/{}/{}", self.credentials.portfolio_id, rest)
    }

    fn sign(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> Result<String, ApiError> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.signing_key.as_bytes())
            .map_err(|e| ApiError::Signing(e.to_string()))?;
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&timestamp, &method, path, &body)?;

        debug!("📡 {} {}", method, path);

        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .query(query)
            .header("X-CB-ACCESS-KEY", &self.credentials.access_key)
            .header("X-CB-ACCESS-PASSPHRASE", &self.credentials.passphrase)
            .header("X-CB-ACCESS-SIGNATURE", signature)
            .header("X-CB-ACCESS-TIMESTAMP", timestamp);
        if !body.is_empty() {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// One page of wallets of the given type (`VAULT`, `TRADING`, ...).
    pub async fn list_wallets_page(
        &self,
        wallet_type: &str,
        symbols: &[&str],
        cursor: &str,
        limit: u32,
    ) -> Result<WalletPage, ApiError> {
        let mut query = vec![
            ("type", wallet_type.to_string()),
            ("limit", limit.to_string()),
            ("sort_direction", "ASC".to_string()),
        ];
        for symbol in symbols {
            query.push(("symbols", symbol.to_string()));
        }
        if !cursor.is_empty() {
            query.push(("cursor", cursor.to_string()));
        }

        let resp: WalletsResponse = self
            .send(Method::GET, &self.portfolio_path("wallets"), &query, None)
            .await?;
        Ok(WalletPage {
            wallets: resp.wallets,
            pagination: resp.pagination,
        })
    }
}

#[async_trait]
impl PrimeApi for PrimeClient {
    async fn list_trading_wallets(&self, symbol: &str) -> Result<Vec<WalletInfo>, ApiError> {
        Ok(self.list_wallets_page("TRADING", &[symbol], "", 100).await?.wallets)
    }

    async fn get_wallet(&self, wallet_id: &str) -> Result<WalletInfo, ApiError> {
        let path = self.portfolio_path(&format!("wallets/{wallet_id}"));
        let resp: WalletResponse = self.send(Method::GET, &path, &[], None).await?;
        Ok(resp.wallet)
    }

    async fn get_wallet_balance(&self, wallet_id: &str) -> Result<Balance, ApiError> {
        let path = self.portfolio_path(&format!("wallets/{wallet_id}/balance"));
        let resp: BalanceResponse = self.send(Method::GET, &path, &[], None).await?;
        parse_balance(wallet_id, resp.balance)
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferCreated, ApiError> {
        let path = self.portfolio_path(&format!("wallets/{}/transfers", request.source_wallet_id));
        let body = json!({
            "amount": request.amount.normalize().to_string(),
            "destination": request.destination_wallet_id,
            "idempotency_key": request.idempotency_key,
            "currency_symbol": request.symbol,
        });
        let resp: CreateTransferResponse = self.send(Method::POST, &path, &[], Some(body)).await?;
        Ok(TransferCreated {
            activity_id: resp.activity_id,
            symbol: resp.symbol,
            amount: resp.amount,
            approval_url: Some(resp.approval_url).filter(|u| !u.is_empty()),
        })
    }

    async fn get_activity(&self, activity_id: &str) -> Result<String, ApiError> {
        let path = self.portfolio_path(&format!("activities/{activity_id}"));
        let resp: ActivityResponse = self.send(Method::GET, &path, &[], None).await?;
        Ok(resp.activity.reference_id)
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<TransactionStatus, ApiError> {
        let path = self.portfolio_path(&format!("transactions/{transaction_id}"));
        let resp: TransactionResponse = self.send(Method::GET, &path, &[], None).await?;
        Ok(resp.transaction.status)
    }
}

fn parse_balance(wallet_id: &str, raw: RawBalance) -> Result<Balance, ApiError> {
    let amount = Decimal::from_str(raw.withdrawable_amount.trim()).map_err(|_| ApiError::InvalidAmount {
        wallet_id: wallet_id.to_string(),
        value: raw.withdrawable_amount.clone(),
    })?;
    Ok(Balance {
        wallet_id: wallet_id.to_string(),
        symbol: raw.symbol,
        withdrawable_amount: amount,
    })
}
