use crate::config::{Config, Rule};
use crate::directory::AssetDirectory;
use crate::models::Direction;

/// Wallet ids a rule should inspect, in rule order without duplicates.
///
/// Hot to cold: the trading wallets of the assets named by the rule's wallets.
/// Cold to hot: the configured wallets themselves. Unknown names and assets
/// without a trading wallet are skipped.
pub fn resolve(
    rule: &Rule,
    direction: Direction,
    config: &Config,
    directory: &AssetDirectory,
) -> Vec<String> {
    let ids: Vec<String> = match direction {
        Direction::HotToCold => assets_for_rule(rule, config)
            .iter()
            .filter_map(|asset| directory.get(asset))
            .map(|tw| tw.id.clone())
            .collect(),
        Direction::ColdToHot => rule
            .wallets
            .iter()
            .filter_map(|name| config.wallet(name))
            .map(|w| w.wallet_id.clone())
            .collect(),
    };

    let mut out: Vec<String> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Asset symbols referenced by a rule's wallets, in rule order.
pub fn assets_for_rule(rule: &Rule, config: &Config) -> Vec<String> {
    rule.wallets
        .iter()
        .filter_map(|name| config.wallet(name))
        .map(|w| w.asset.clone())
        .collect()
}
