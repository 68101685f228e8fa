use tracing::{error, info};

use crate::config::Config;
use crate::directory::AssetDirectory;
use crate::error::ResolutionError;
use crate::models::{Balance, Direction, OperationContext, TrackedTransfer, TransferRequest, WalletType};
use crate::prime::PrimeApi;

/// Counterpart wallet for an asset, given the sweep direction.
pub fn resolve_destination(
    direction: Direction,
    symbol: &str,
    config: &Config,
    directory: &AssetDirectory,
) -> Result<String, ResolutionError> {
    match direction {
        Direction::HotToCold => config
            .wallet_for_asset(symbol, WalletType::ColdCustody)
            .map(|w| w.wallet_id.clone())
            .ok_or_else(|| ResolutionError::NoColdWallet(symbol.to_string())),
        Direction::ColdToHot => directory
            .get(symbol)
            .map(|w| w.id.clone())
            .ok_or_else(|| ResolutionError::NoTradingWallet(symbol.to_string())),
    }
}

/// Submit one transfer per balance. A wallet whose destination cannot be
/// resolved, or whose submission fails, is logged and skipped.
///
/// `on_submitted` is called for every accepted transfer so the caller can
/// start tracking it; dispatch itself never waits on tracking.
pub async fn dispatch<F>(
    api: &dyn PrimeApi,
    ctx: &OperationContext,
    balances: &[Balance],
    config: &Config,
    directory: &AssetDirectory,
    mut on_submitted: F,
) -> Vec<TrackedTransfer>
where
    F: FnMut(&TrackedTransfer),
{
    let mut submitted = Vec::new();

    for balance in balances {
        let destination = match resolve_destination(ctx.direction, &balance.symbol, config, directory) {
            Ok(id) => id,
            Err(e) => {
                error!(
                    operation_id = %ctx.operation_id,
                    rule_name = %ctx.rule_name,
                    wallet_id = %balance.wallet_id,
                    error = %e,
                    "error preparing transfer request"
                );
                continue;
            }
        };

        let request = TransferRequest::new(balance, destination);
        let created = match api.create_transfer(&request).await {
            Ok(created) => created,
            Err(e) => {
                error!(
                    operation_id = %ctx.operation_id,
                    rule_name = %ctx.rule_name,
                    wallet_id = %balance.wallet_id,
                    error = %e,
                    "could not create transfer"
                );
                continue;
            }
        };

        info!(
            operation_id = %ctx.operation_id,
            amount = %created.amount,
            symbol = %created.symbol,
            source_wallet_id = %request.source_wallet_id,
            destination_wallet_id = %request.destination_wallet_id,
            activity_id = %created.activity_id,
            "initiated transfer"
        );
        if ctx.direction == Direction::ColdToHot {
            if let Some(url) = &created.approval_url {
                info!(operation_id = %ctx.operation_id, transfer_url = %url, "cold transfer awaiting approval");
            }
        }

        let tracked = TrackedTransfer {
            activity_id: created.activity_id,
            source_wallet_id: request.source_wallet_id,
            destination_wallet_id: request.destination_wallet_id,
            symbol: request.symbol,
            amount: request.amount.normalize().to_string(),
            review_url: created.approval_url,
        };
        on_submitted(&tracked);
        submitted.push(tracked);
    }

    submitted
}
