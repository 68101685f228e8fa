use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, warn, Instrument};

use crate::balances;
use crate::config::{Config, Rule};
use crate::directory::AssetDirectory;
use crate::dispatcher;
use crate::models::{Balance, Direction, OperationContext, TrackedTransfer};
use crate::prime::PrimeApi;
use crate::resolver;
use crate::tracker::{self, TrackerSettings};

/// What one rule execution did.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub operation_id: String,
    pub rule_name: String,
    pub direction: Direction,
    pub wallet_ids: Vec<String>,
    pub balances: Vec<Balance>,
    pub transfers: Vec<TrackedTransfer>,
}

/// Runs rules against the custody service. Cheap to clone; every clone
/// shares the same directory and tracker set.
#[derive(Clone)]
pub struct Sweeper {
    api: Arc<dyn PrimeApi>,
    config: Arc<Config>,
    directory: Arc<AssetDirectory>,
    trackers: TaskTracker,
}

impl Sweeper {
    pub fn new(api: Arc<dyn PrimeApi>, config: Arc<Config>, directory: Arc<AssetDirectory>) -> Self {
        Self {
            api,
            config,
            directory,
            trackers: TaskTracker::new(),
        }
    }

    pub fn trackers(&self) -> &TaskTracker {
        &self.trackers
    }

    fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: self.config.daemon.monitor_frequency(),
            deadline: self.config.daemon.monitor_timeout(),
        }
    }

    /// One scheduled occurrence of `rule`, in the rule's direction.
    ///
    /// Never fails: problems are logged and end this execution early.
    pub async fn execute_rule(&self, rule: &Rule) -> SweepReport {
        let ctx = OperationContext::new(&rule.name, rule.direction, &rule.wallets);
        let span = info_span!(
            "sweep",
            operation_id = %ctx.operation_id,
            rule_name = %ctx.rule_name,
            direction = %ctx.direction
        );
        self.run(rule, ctx).instrument(span).await
    }

    async fn run(&self, rule: &Rule, ctx: OperationContext) -> SweepReport {
        info!(wallets = ?ctx.wallet_names, "checking for withdrawable balances");

        let mut report = SweepReport {
            operation_id: ctx.operation_id.clone(),
            rule_name: ctx.rule_name.clone(),
            direction: ctx.direction,
            wallet_ids: Vec::new(),
            balances: Vec::new(),
            transfers: Vec::new(),
        };

        report.wallet_ids = resolver::resolve(rule, ctx.direction, &self.config, &self.directory);
        if report.wallet_ids.is_empty() {
            info!("no wallets resolved for rule");
            return report;
        }

        report.balances = match balances::collect(self.api.as_ref(), &report.wallet_ids).await {
            Ok(found) => found,
            Err(e) => {
                error!(error = %e, "failed to query wallet balances");
                return report;
            }
        };
        if report.balances.is_empty() {
            info!("no wallets found with withdrawable balance");
            return report;
        }

        for balance in &report.balances {
            info!(
                wallet_id = %balance.wallet_id,
                symbol = %balance.symbol,
                withdrawable_amount = %balance.withdrawable_amount,
                "found wallet balance"
            );
        }

        let settings = self.tracker_settings();
        report.transfers = dispatcher::dispatch(
            self.api.as_ref(),
            &ctx,
            &report.balances,
            &self.config,
            &self.directory,
            |transfer| self.spawn_tracker(&ctx, transfer, settings),
        )
        .await;

        info!(
            submitted = report.transfers.len(),
            eligible = report.balances.len(),
            "dispatch finished"
        );
        report
    }

    fn spawn_tracker(&self, ctx: &OperationContext, transfer: &TrackedTransfer, settings: TrackerSettings) {
        let span = info_span!(
            "tracker",
            operation_id = %ctx.operation_id,
            activity_id = %transfer.activity_id
        );
        let api = Arc::clone(&self.api);
        let transfer = transfer.clone();
        self.trackers.spawn(
            async move {
                let report = tracker::track_transaction(api, transfer, settings).await;
                info!(outcome = ?report.outcome, polls = report.polls, "tracking finished");
            }
            .instrument(span),
        );
    }

    /// Stop accepting trackers and wait up to `grace` for running ones.
    /// Returns whether every tracker finished in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.trackers.close();
        let outstanding = self.trackers.len();
        if outstanding == 0 {
            return true;
        }
        if grace.is_zero() {
            warn!(outstanding, "abandoning in-flight transaction trackers");
            return false;
        }

        info!(outstanding, grace_secs = grace.as_secs(), "waiting for transaction trackers");
        match tokio::time::timeout(grace, self.trackers.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(outstanding = self.trackers.len(), "abandoning in-flight transaction trackers");
                false
            }
        }
    }
}
