//! Periodic storage maintenance.
//!
//! All tasks are idempotent and safe to run at any frequency.
//!
//! # Tasks
//!
//! 1. **Storage flush**: persist pending writes to disk.
//! 2. **History retention**: drop call and message log entries older
//!    than `retention_days`. Pending messages are kept.

use std::sync::Arc;
use std::time::Duration;

use callguard_storage::StorageEngine;
use callguard_types::config::AppConfig;
use callguard_types::repository::{CallLogRepository, MessageLogRepository};
use callguard_types::{Result, Timestamp};
use serde::Serialize;

// ---------------------------------------------------------------------------
// MaintenanceReport
// ---------------------------------------------------------------------------

/// Summary of a maintenance run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MaintenanceReport {
    /// Whether the storage flush succeeded.
    pub flushed: bool,
    /// Call log entries removed for retention.
    pub calls_pruned: usize,
    /// Message log entries removed for retention.
    pub messages_pruned: usize,
}

// ---------------------------------------------------------------------------
// Maintenance entry point
// ---------------------------------------------------------------------------

/// Runs all storage maintenance tasks as of `now`.
///
/// # Errors
///
/// Returns the first error encountered. Pruning is skipped if the
/// flush fails.
pub fn run_storage_maintenance(
    storage: &StorageEngine,
    config: &AppConfig,
    now: Timestamp,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();

    // 1. Flush pending writes to disk.
    storage.flush()?;
    report.flushed = true;

    // 2. History retention.
    let cutoff = now.minus_days(i64::from(config.retention_days));
    report.calls_pruned = storage.call_log()?.delete_older_than(cutoff)?;
    report.messages_pruned = storage.message_log()?.delete_older_than(cutoff)?;

    tracing::debug!(
        flushed = report.flushed,
        calls_pruned = report.calls_pruned,
        messages_pruned = report.messages_pruned,
        "storage maintenance completed"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// MaintenanceTask
// ---------------------------------------------------------------------------

/// Runs [`run_storage_maintenance`] on a fixed interval.
pub struct MaintenanceTask {
    storage: Arc<StorageEngine>,
    config: AppConfig,
}

impl MaintenanceTask {
    pub fn new(storage: Arc<StorageEngine>, config: AppConfig) -> Self {
        Self { storage, config }
    }

    /// Runs the loop forever. Spawn it as a tokio task:
    ///
    /// ```ignore
    /// tokio::spawn(task.run());
    /// ```
    pub async fn run(self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.maintenance_interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = run_storage_maintenance(&self.storage, &self.config, Timestamp::now()) {
                // Keep running; the next tick retries.
                tracing::error!(error = %e, "storage maintenance failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
