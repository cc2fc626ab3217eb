//! Named background job scheduling.
//!
//! Jobs are registered under a unique name. A periodic job runs once
//! per `interval`, at a random point inside the trailing `flex` window
//! of each period, and only while its [`Constraints`] hold. Scheduling
//! a periodic job under a name that is still active is a no-op
//! ([`DedupPolicy::Keep`]) unless the caller asks to replace it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

/// How often unmet constraints are re-checked.
pub const DEFAULT_CONSTRAINT_POLL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Result of one job run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JobOutcome {
    Succeeded,
    /// The job had nothing to do (e.g. another run was in flight).
    Skipped,
    Failed { reason: String },
}

pub type JobFuture = Pin<Box<dyn Future<Output = JobOutcome> + Send>>;

/// Factory producing one future per run.
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Device state a job may depend on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Constraints {
    pub requires_network: bool,
    pub requires_battery_not_low: bool,
}

/// What to do when a job with the same name is already scheduled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DedupPolicy {
    /// Leave the existing job alone.
    Keep,
    /// Cancel the existing job and start the new one.
    Replace,
}

#[derive(Clone, Copy, Debug)]
pub struct PeriodicSpec {
    pub interval: Duration,
    /// Width of the window at the end of each period in which the run
    /// may start. Clamped to `interval`.
    pub flex: Duration,
    pub constraints: Constraints,
    pub dedup: DedupPolicy,
}

// ---------------------------------------------------------------------------
// DeviceConditions
// ---------------------------------------------------------------------------

/// Reports the device state that [`Constraints`] are checked against.
pub trait DeviceConditions: Send + Sync {
    fn network_available(&self) -> bool;

    fn battery_not_low(&self) -> bool;

    fn satisfies(&self, constraints: &Constraints) -> bool {
        (!constraints.requires_network || self.network_available())
            && (!constraints.requires_battery_not_low || self.battery_not_low())
    }
}

/// Conditions for a host that is always online and on mains power.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysReady;

impl DeviceConditions for AlwaysReady {
    fn network_available(&self) -> bool {
        true
    }

    fn battery_not_low(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// JobScheduler
// ---------------------------------------------------------------------------

pub trait JobScheduler: Send + Sync {
    /// Registers a periodic job. Returns `false` if an active job with
    /// this name was kept instead.
    fn schedule_periodic(&self, name: &str, spec: PeriodicSpec, job: JobFn) -> bool;

    /// Runs `job` once, as soon as `constraints` hold. Returns `false`
    /// if a job with this name is still active.
    fn schedule_once(&self, name: &str, constraints: Constraints, job: JobFn) -> bool;

    /// Cancels the job registered under `name`. Returns `true` if an
    /// active job was cancelled.
    fn cancel(&self, name: &str) -> bool;

    fn is_scheduled(&self, name: &str) -> bool;
}

// ---------------------------------------------------------------------------
// TokioJobScheduler
// ---------------------------------------------------------------------------

/// [`JobScheduler`] running each job as a tokio task.
///
/// Must be used from within a tokio runtime.
pub struct TokioJobScheduler {
    conditions: Arc<dyn DeviceConditions>,
    poll: Duration,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioJobScheduler {
    pub fn new(conditions: Arc<dyn DeviceConditions>) -> Self {
        Self::with_poll_interval(conditions, DEFAULT_CONSTRAINT_POLL)
    }

    pub fn with_poll_interval(conditions: Arc<dyn DeviceConditions>, poll: Duration) -> Self {
        Self {
            conditions,
            poll,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Aborts every job.
    pub fn shutdown(&self) {
        let mut jobs = lock(&self.jobs);
        for (name, handle) in jobs.drain() {
            handle.abort();
            tracing::debug!(job = %name, "job aborted");
        }
    }

    /// Inserts the task built by `spawn` unless an active job holds the
    /// name and `replace` is false.
    fn register<F>(&self, name: &str, replace: bool, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut jobs = lock(&self.jobs);
        if let Some(existing) = jobs.get(name) {
            if !existing.is_finished() {
                if !replace {
                    tracing::debug!(job = %name, "job already scheduled, keeping it");
                    return false;
                }
                existing.abort();
            }
        }
        jobs.insert(name.to_string(), spawn());
        true
    }
}

impl JobScheduler for TokioJobScheduler {
    fn schedule_periodic(&self, name: &str, spec: PeriodicSpec, job: JobFn) -> bool {
        let conditions = Arc::clone(&self.conditions);
        let poll = self.poll;
        let job_name = name.to_string();
        let registered = self.register(name, spec.dedup == DedupPolicy::Replace, move || {
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(next_run_delay(spec.interval, spec.flex)).await;
                    wait_for(conditions.as_ref(), &spec.constraints, poll).await;
                    log_outcome(&job_name, job().await);
                }
            })
        });
        if registered {
            tracing::info!(
                job = %name,
                interval_secs = spec.interval.as_secs(),
                flex_secs = spec.flex.as_secs(),
                "periodic job scheduled"
            );
        }
        registered
    }

    fn schedule_once(&self, name: &str, constraints: Constraints, job: JobFn) -> bool {
        let conditions = Arc::clone(&self.conditions);
        let poll = self.poll;
        let job_name = name.to_string();
        self.register(name, false, move || {
            tokio::spawn(async move {
                wait_for(conditions.as_ref(), &constraints, poll).await;
                log_outcome(&job_name, job().await);
            })
        })
    }

    fn cancel(&self, name: &str) -> bool {
        match lock(&self.jobs).remove(name) {
            Some(handle) => {
                let active = !handle.is_finished();
                handle.abort();
                if active {
                    tracing::info!(job = %name, "job cancelled");
                }
                active
            }
            None => false,
        }
    }

    fn is_scheduled(&self, name: &str) -> bool {
        lock(&self.jobs)
            .get(name)
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for TokioJobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Delay until the next periodic run: `interval - flex` plus a random
/// offset inside the flex window.
pub fn next_run_delay(interval: Duration, flex: Duration) -> Duration {
    let flex = flex.min(interval);
    let base = interval - flex;
    let flex_ms = u64::try_from(flex.as_millis()).unwrap_or(u64::MAX);
    if flex_ms == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0..=flex_ms);
    base + Duration::from_millis(jitter)
}

async fn wait_for(conditions: &dyn DeviceConditions, constraints: &Constraints, poll: Duration) {
    while !conditions.satisfies(constraints) {
        tracing::debug!(?constraints, "job constraints not met, waiting");
        tokio::time::sleep(poll).await;
    }
}

fn log_outcome(name: &str, outcome: JobOutcome) {
    match outcome {
        JobOutcome::Succeeded => tracing::debug!(job = %name, "job succeeded"),
        JobOutcome::Skipped => tracing::debug!(job = %name, "job skipped"),
        JobOutcome::Failed { reason } => tracing::warn!(job = %name, reason = %reason, "job failed"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panicking job cannot poison this map; the lock is only held
    // for map updates.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
