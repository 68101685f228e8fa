use chrono::{DateTime, Utc};
use cron::Schedule;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{parse_schedule, Rule};
use crate::error::ConfigError;
use crate::sweeper::Sweeper;

/// Fires each rule on its cron schedule until stopped.
///
/// Every firing runs as its own task, so a slow execution can overlap the
/// next occurrence of the same rule.
pub struct Scheduler {
    cancel: CancellationToken,
    loops: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(sweeper: Sweeper, rules: &[Rule]) -> Result<Self, ConfigError> {
        let cancel = CancellationToken::new();
        let mut loops = Vec::with_capacity(rules.len());

        for rule in rules {
            let schedule = parse_schedule(rule)?;
            info!(rule_name = %rule.name, schedule = %rule.schedule, direction = %rule.direction, "scheduled rule");
            loops.push(tokio::spawn(run_rule(
                sweeper.clone(),
                rule.clone(),
                schedule,
                cancel.clone(),
            )));
        }

        Ok(Self { cancel, loops })
    }

    pub fn rule_count(&self) -> usize {
        self.loops.len()
    }

    /// Stop firing new executions. Executions already running are left alone.
    pub async fn stop(self) {
        self.cancel.cancel();
        for handle in self.loops {
            let _ = handle.await;
        }
        info!("scheduler stopped");
    }
}

/// Next occurrence strictly after `after`.
pub fn next_fire(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

async fn run_rule(sweeper: Sweeper, rule: Rule, schedule: Schedule, cancel: CancellationToken) {
    let mut cursor = Utc::now();

    loop {
        let Some(next) = next_fire(&schedule, cursor) else {
            warn!(rule_name = %rule.name, "schedule has no further occurrences");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(wait) => {}
        }
        cursor = next;

        let sweeper = sweeper.clone();
        let rule = rule.clone();
        tokio::spawn(async move {
            sweeper.execute_rule(&rule).await;
        });
    }
}
