//! Spam knowledge base synchronization.
//!
//! A sync run fetches the whole feed and applies it to the spam store
//! in one atomic batch. Failed attempts are retried with exponential
//! backoff up to `max_attempts`; if every attempt fails the store is
//! left exactly as it was. Only one run is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use callguard_types::config::{AppConfig, MAX_SYNC_ATTEMPTS};
use callguard_types::repository::{SpamFeed, SpamRepository};
use callguard_types::{Result, Timestamp};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::scheduler::{
    Constraints, DedupPolicy, JobFn, JobFuture, JobOutcome, JobScheduler, PeriodicSpec,
};

/// Unique name of the periodic sync job.
pub const SYNC_JOB_NAME: &str = "spam_db_sync";

/// Unique name of the on-demand sync job.
pub const SYNC_NOW_JOB_NAME: &str = "spam_db_sync_now";

/// Upper bound on a single backoff delay.
const BACKOFF_CAP: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// SyncPolicy
// ---------------------------------------------------------------------------

/// Retry and timing settings extracted from `AppConfig`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubled after each
    /// further failure.
    pub backoff_base: Duration,
    pub interval: Duration,
    pub flex: Duration,
}

impl From<&AppConfig> for SyncPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.sync_max_attempts.clamp(1, MAX_SYNC_ATTEMPTS),
            backoff_base: Duration::from_secs(config.sync_backoff_secs),
            interval: Duration::from_secs(config.sync_interval_hours.saturating_mul(3600)),
            flex: Duration::from_secs(config.sync_flex_hours.saturating_mul(3600)),
        }
    }
}

/// Backoff before the attempt following failed attempt `attempt`
/// (1-based): `base * 2^(attempt - 1)`, capped at one hour.
pub fn compute_backoff(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(BACKOFF_CAP)
}

// ---------------------------------------------------------------------------
// SyncReport
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Succeeded { upserted: usize },
    Failed { reason: String },
    /// Another run was already in flight; nothing was done.
    AlreadyRunning,
}

/// Summary of one sync run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SyncReport {
    /// Feed fetches performed.
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Succeeded { .. })
    }
}

impl From<SyncReport> for JobOutcome {
    fn from(report: SyncReport) -> Self {
        match report.outcome {
            SyncOutcome::Succeeded { .. } => JobOutcome::Succeeded,
            SyncOutcome::AlreadyRunning => JobOutcome::Skipped,
            SyncOutcome::Failed { reason } => JobOutcome::Failed { reason },
        }
    }
}

// ---------------------------------------------------------------------------
// SpamSync
// ---------------------------------------------------------------------------

/// Pulls the spam feed into the spam store.
pub struct SpamSync {
    feed: Arc<dyn SpamFeed>,
    store: Arc<dyn SpamRepository>,
    policy: SyncPolicy,
    running: Mutex<()>,
}

impl SpamSync {
    pub fn new(feed: Arc<dyn SpamFeed>, store: Arc<dyn SpamRepository>, policy: SyncPolicy) -> Self {
        Self {
            feed,
            store,
            policy,
            running: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Runs one sync with retries.
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] without touching the feed
    /// if another run holds the guard.
    pub async fn run_once(&self) -> SyncReport {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!("spam sync already running");
            return SyncReport {
                attempts: 0,
                outcome: SyncOutcome::AlreadyRunning,
            };
        };

        let max_attempts = self.policy.max_attempts.clamp(1, MAX_SYNC_ATTEMPTS);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt().await {
                Ok(upserted) => {
                    tracing::info!(attempt, upserted, "spam database synchronized");
                    return SyncReport {
                        attempts: attempt,
                        outcome: SyncOutcome::Succeeded { upserted },
                    };
                }
                Err(e) => {
                    tracing::warn!(attempt, max_attempts, error = %e, "spam sync attempt failed");
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(compute_backoff(self.policy.backoff_base, attempt))
                            .await;
                    }
                }
            }
        }

        tracing::error!(attempts = max_attempts, error = %last_error, "spam sync gave up");
        SyncReport {
            attempts: max_attempts,
            outcome: SyncOutcome::Failed { reason: last_error },
        }
    }

    async fn attempt(&self) -> Result<usize> {
        let records = self.feed.fetch().await?;
        self.store.upsert_all(records, Timestamp::now())
    }
}

// ---------------------------------------------------------------------------
// SpamSyncScheduler
// ---------------------------------------------------------------------------

/// Registers [`SpamSync`] runs with a [`JobScheduler`].
pub struct SpamSyncScheduler {
    sync: Arc<SpamSync>,
    scheduler: Arc<dyn JobScheduler>,
}

impl SpamSyncScheduler {
    pub fn new(sync: Arc<SpamSync>, scheduler: Arc<dyn JobScheduler>) -> Self {
        Self { sync, scheduler }
    }

    /// Schedules the periodic sync (network and battery required).
    ///
    /// Returns `false` if it was already scheduled; the existing
    /// schedule is kept.
    pub fn schedule(&self) -> bool {
        let policy = self.sync.policy();
        let spec = PeriodicSpec {
            interval: policy.interval,
            flex: policy.flex,
            constraints: Constraints {
                requires_network: true,
                requires_battery_not_low: true,
            },
            dedup: DedupPolicy::Keep,
        };
        self.scheduler.schedule_periodic(SYNC_JOB_NAME, spec, self.job())
    }

    /// Runs one sync as soon as the network is available.
    pub fn trigger_now(&self) -> bool {
        let constraints = Constraints {
            requires_network: true,
            requires_battery_not_low: false,
        };
        self.scheduler
            .schedule_once(SYNC_NOW_JOB_NAME, constraints, self.job())
    }

    /// Cancels the periodic sync.
    pub fn cancel(&self) -> bool {
        self.scheduler.cancel(SYNC_JOB_NAME)
    }

    fn job(&self) -> JobFn {
        let sync = Arc::clone(&self.sync);
        Arc::new(move || -> JobFuture {
            let sync = Arc::clone(&sync);
            Box::pin(async move { JobOutcome::from(sync.run_once().await) })
        })
    }
}
