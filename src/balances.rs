use rust_decimal::Decimal;
use tracing::debug;

use crate::error::CollectError;
use crate::models::Balance;
use crate::prime::PrimeApi;

/// Smallest amount worth moving: 1e-8 of the asset's unit.
pub fn dust_threshold() -> Decimal {
    Decimal::new(1, 8)
}

/// Amounts at or below the threshold are dust.
pub fn is_dust(amount: Decimal) -> bool {
    amount <= dust_threshold()
}

/// Query withdrawable balances one wallet at a time, keeping only non-dust.
///
/// The first failed query aborts the whole batch. The returned balances keep
/// the order of `wallet_ids`; wallets holding only dust are absent.
pub async fn collect(api: &dyn PrimeApi, wallet_ids: &[String]) -> Result<Vec<Balance>, CollectError> {
    let mut eligible = Vec::new();

    for wallet_id in wallet_ids {
        let balance = api
            .get_wallet_balance(wallet_id)
            .await
            .map_err(|source| CollectError {
                wallet_id: wallet_id.clone(),
                source,
            })?;

        if is_dust(balance.withdrawable_amount) {
            debug!(
                wallet_id = %wallet_id,
                amount = %balance.withdrawable_amount,
                "skipping dust balance"
            );
            continue;
        }
        eligible.push(balance);
    }

    Ok(eligible)
}
