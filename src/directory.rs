use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info};

use crate::config::WalletConfig;
use crate::error::ApiError;
use crate::models::TradingWallet;
use crate::prime::PrimeApi;

/// Asset symbol -> the trading wallet for that asset.
///
/// Built once before scheduling starts and only read afterwards; there is no
/// way to change it after construction.
#[derive(Debug, Clone, Default)]
pub struct AssetDirectory {
    wallets: BTreeMap<String, TradingWallet>,
}

impl AssetDirectory {
    /// Look up the trading wallet for every asset referenced by `wallets`.
    ///
    /// Assets without a trading wallet are logged and left out. Any remote
    /// error fails the whole build.
    pub async fn build(api: &dyn PrimeApi, wallets: &[WalletConfig]) -> Result<Self, ApiError> {
        let assets: BTreeSet<&str> = wallets.iter().map(|w| w.asset.as_str()).collect();
        let mut directory = BTreeMap::new();

        for asset in assets {
            let found = api.list_trading_wallets(asset).await.map_err(|e| {
                error!(asset, error = %e, "cannot list wallets for asset");
                e
            })?;

            match found.into_iter().find(|w| w.symbol == asset) {
                Some(wallet) => {
                    directory.insert(
                        asset.to_string(),
                        TradingWallet {
                            id: wallet.id,
                            symbol: wallet.symbol,
                        },
                    );
                }
                None => info!(asset, "no trading wallet found for asset"),
            }
        }

        Ok(Self { wallets: directory })
    }

    pub fn get(&self, symbol: &str) -> Option<&TradingWallet> {
        self.wallets.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradingWallet> {
        self.wallets.values()
    }
}

impl FromIterator<TradingWallet> for AssetDirectory {
    fn from_iter<I: IntoIterator<Item = TradingWallet>>(iter: I) -> Self {
        Self {
            wallets: iter.into_iter().map(|w| (w.symbol.clone(), w)).collect(),
        }
    }
}
