//! Scheduled sweeps between trading and cold custody wallets.
//!
//! A rule fires on its cron schedule, resolves the wallets it covers, collects
//! their withdrawable balances, submits one transfer per non-dust balance and
//! follows each transfer in a detached tracker.

pub mod balances;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod prime;
pub mod resolver;
pub mod scheduler;
pub mod sweeper;
pub mod tracker;

#[cfg(test)]
mod testing;
