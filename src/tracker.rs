use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{error, info};

use crate::models::{TrackedTransfer, TransactionStatus};
use crate::prime::PrimeApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    /// Total observation window, starting when tracking begins.
    pub deadline: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Started,
    Polling,
    Terminal,
    TimedOut,
}

/// How a tracker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerOutcome {
    Terminal(TransactionStatus),
    TimedOut { review_url: Option<String> },
    ActivityLookupFailed,
    PollFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: Option<TransactionStatus>,
    pub to: TransactionStatus,
}

#[derive(Debug, Clone)]
pub struct TrackerReport {
    pub outcome: TrackerOutcome,
    pub transaction_id: Option<String>,
    pub polls: u32,
    pub transitions: Vec<StatusTransition>,
}

impl TrackerReport {
    /// Final state; lookup and poll failures end the tracker where it stood.
    pub fn state(&self) -> TrackerState {
        match self.outcome {
            TrackerOutcome::Terminal(_) => TrackerState::Terminal,
            TrackerOutcome::TimedOut { .. } => TrackerState::TimedOut,
            TrackerOutcome::ActivityLookupFailed => TrackerState::Started,
            TrackerOutcome::PollFailed => TrackerState::Polling,
        }
    }
}

/// Follow a submitted transfer until its transaction settles or the window closes.
///
/// Errors end the tracker without retry; they are logged, never returned.
pub async fn track_transaction(
    api: Arc<dyn PrimeApi>,
    transfer: TrackedTransfer,
    settings: TrackerSettings,
) -> TrackerReport {
    let deadline = Instant::now() + settings.deadline;
    let mut report = TrackerReport {
        outcome: TrackerOutcome::ActivityLookupFailed,
        transaction_id: None,
        polls: 0,
        transitions: Vec::new(),
    };

    let transaction_id = match timeout_at(deadline, api.get_activity(&transfer.activity_id)).await {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            error!(activity_id = %transfer.activity_id, error = %e, "could not get activity");
            return report;
        }
        Err(_) => {
            report.outcome = timed_out(&transfer);
            return report;
        }
    };
    report.transaction_id = Some(transaction_id.clone());

    let mut last: Option<TransactionStatus> = None;
    loop {
        let poll = async {
            sleep(settings.poll_interval).await;
            api.get_transaction(&transaction_id).await
        };

        let status = match timeout_at(deadline, poll).await {
            Err(_) => {
                report.outcome = timed_out(&transfer);
                return report;
            }
            Ok(Err(e)) => {
                error!(transaction_id = %transaction_id, error = %e, "could not get transaction");
                report.outcome = TrackerOutcome::PollFailed;
                return report;
            }
            Ok(Ok(status)) => status,
        };
        report.polls += 1;

        if last.as_ref() != Some(&status) {
            info!(transaction_id = %transaction_id, status = %status, "transaction status updated");
            report.transitions.push(StatusTransition {
                from: last.take(),
                to: status.clone(),
            });
        }

        if status.is_terminal() {
            report.outcome = TrackerOutcome::Terminal(status);
            return report;
        }
        last = Some(status);
    }
}

fn timed_out(transfer: &TrackedTransfer) -> TrackerOutcome {
    if let Some(url) = &transfer.review_url {
        info!(prime_url = %url, "transaction tracking window exceeded, continue on Prime");
    }
    TrackerOutcome::TimedOut {
        review_url: transfer.review_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CapturedEvents, FakePrime};

    const CONTINUE_ON_PRIME: &str = "transaction tracking window exceeded, continue on Prime";

    fn transfer(review_url: Option<&str>) -> TrackedTransfer {
        TrackedTransfer {
            activity_id: "activity-1".into(),
            source_wallet_id: "hot-eth".into(),
            destination_wallet_id: "cold-eth".into(),
            symbol: "ETH".into(),
            amount: "0.5".into(),
            review_url: review_url.map(String::from),
        }
    }

    fn settings() -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_secs(10),
            deadline: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_terminal_status() {
        let api = Arc::new(FakePrime::new().with_status_script(
            "tx-activity-1",
            &["TRANSACTION_PENDING", "TRANSACTION_PENDING", "TRANSACTION_DONE"],
        ));

        let report = track_transaction(api.clone(), transfer(None), settings()).await;

        assert_eq!(report.outcome, TrackerOutcome::Terminal(TransactionStatus::Done));
        assert_eq!(report.state(), TrackerState::Terminal);
        assert_eq!(report.polls, 3);
        assert_eq!(api.status_calls(), 3);
        let pending_to_done = report
            .transitions
            .iter()
            .filter(|t| t.from == Some(TransactionStatus::Pending) && t.to == TransactionStatus::Done)
            .count();
        assert_eq!(pending_to_done, 1);
        // first sighting plus pending -> done, nothing for the repeated pending
        assert_eq!(report.transitions.len(), 2);
        assert_eq!(report.transitions[0].from, None);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_points_at_review_url() {
        let api = Arc::new(FakePrime::new().with_status_script("tx-activity-1", &["TRANSACTION_PENDING"]));
        let (events, _guard) = CapturedEvents::install();

        let report = track_transaction(api, transfer(Some("https://prime.example/a/1")), settings()).await;

        let continued = events.with_message(CONTINUE_ON_PRIME);
        assert_eq!(continued.len(), 1);
        assert_eq!(continued[0].field("prime_url"), Some("https://prime.example/a/1"));

        assert_eq!(report.state(), TrackerState::TimedOut);
        assert_eq!(
            report.outcome,
            TrackerOutcome::TimedOut {
                review_url: Some("https://prime.example/a/1".into())
            }
        );
        assert!(report.polls >= 5);
        assert_eq!(report.transitions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_quietly_without_review_url() {
        let api = Arc::new(FakePrime::new().with_status_script("tx-activity-1", &["TRANSACTION_PENDING"]));

        let (events, _guard) = CapturedEvents::install();

        let report = track_transaction(api, transfer(None), settings()).await;

        assert_eq!(report.outcome, TrackerOutcome::TimedOut { review_url: None });
        assert!(events.with_message(CONTINUE_ON_PRIME).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_lookup_failure_ends_tracking() {
        let api = Arc::new(FakePrime::new().failing_activity("activity-1"));

        let report = track_transaction(api.clone(), transfer(None), settings()).await;

        assert_eq!(report.outcome, TrackerOutcome::ActivityLookupFailed);
        assert_eq!(report.state(), TrackerState::Started);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_is_not_retried() {
        let api = Arc::new(FakePrime::new().failing_transaction("tx-activity-1"));

        let report = track_transaction(api.clone(), transfer(None), settings()).await;

        assert_eq!(report.outcome, TrackerOutcome::PollFailed);
        assert_eq!(api.status_calls(), 1);
    }
}
