//! Scheduled Jobs
//!
//! Background maintenance that runs outside the transfer engine. The only job
//! today is the daily transfer cap reset: at the first check after UTC
//! midnight every account's `daily_transfer_amount` goes back to zero.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::store::{StoreError, WalletStore};

// =========================================================================
// Daily Transfer Cap Reset
// =========================================================================

/// Zero the daily outbound volume of every account that has one.
///
/// Each touched account gets a version bump, so a transfer that read the
/// pre-reset state conflicts and re-validates against the fresh counter.
pub async fn reset_daily_transfer_amounts(store: &dyn WalletStore) -> Result<u64, JobError> {
    let accounts_reset = store.reset_daily_transfer_amounts().await?;

    tracing::info!(accounts_reset, "Daily transfer amounts reset");

    Ok(accounts_reset)
}

/// Tracks the UTC calendar day the last reset ran for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRollover {
    last_reset_day: NaiveDate,
}

impl DayRollover {
    /// Treat `day` as already reset. Counters accumulated earlier that day are
    /// kept until the next midnight.
    pub fn starting_on(day: NaiveDate) -> Self {
        Self { last_reset_day: day }
    }

    pub fn last_reset_day(&self) -> NaiveDate {
        self.last_reset_day
    }

    /// Whether `now` falls on a later UTC date than the last reset
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.last_reset_day
    }

    pub fn mark_reset(&mut self, now: DateTime<Utc>) {
        self.last_reset_day = now.date_naive();
    }
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// How often to look for a date rollover (default: 1 minute)
    pub daily_reset_check_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            daily_reset_check_interval: Duration::from_secs(60),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    store: Arc<dyn WalletStore>,
    config: JobSchedulerConfig,
    rollover: DayRollover,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self::with_config(store, JobSchedulerConfig::default())
    }

    pub fn with_config(store: Arc<dyn WalletStore>, config: JobSchedulerConfig) -> Self {
        Self {
            store,
            config,
            rollover: DayRollover::starting_on(Utc::now().date_naive()),
        }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        tracing::info!(
            check_interval_secs = self.config.daily_reset_check_interval.as_secs(),
            "Job scheduler started"
        );

        let mut reset_interval = interval(self.config.daily_reset_check_interval);

        loop {
            reset_interval.tick().await;
            if let Err(e) = self.run_due(Utc::now()).await {
                // Rollover is not marked, so the next tick tries again.
                tracing::error!(error = %e, "Daily transfer amount reset failed");
            }
        }
    }

    /// Reset the daily counters if `now` is past the last reset day.
    /// Returns the number of accounts reset, or `None` when nothing was due.
    pub async fn run_due(&mut self, now: DateTime<Utc>) -> Result<Option<u64>, JobError> {
        if !self.rollover.is_due(now) {
            return Ok(None);
        }

        let count = reset_daily_transfer_amounts(self.store.as_ref()).await?;
        self.rollover.mark_reset(now);
        Ok(Some(count))
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// =========================================================================
// Tests
// =========================================================================
