//! `callguard run`: host the background schedulers.
//!
//! Schedules the periodic spam sync (when a feed is configured) and
//! the retention maintenance loop, then waits for Ctrl-C.

use std::sync::Arc;

use callguard_node::scheduler::{AlwaysReady, JobScheduler, TokioJobScheduler};
use callguard_node::spam_sync::SYNC_JOB_NAME;

use crate::commands;
use crate::GlobalOpts;

pub async fn run(sync_now: bool, opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let scheduler = Arc::new(TokioJobScheduler::new(Arc::new(AlwaysReady)));
    let tasks = node.start_background(scheduler.clone());

    match &tasks.sync {
        Some(sync) => {
            if sync_now {
                sync.trigger_now();
            }
        }
        None if sync_now => {
            tracing::warn!("--sync-now ignored: no spam feed configured");
        }
        None => {}
    }

    tracing::info!(
        data_dir = %opts.config.data_dir.display(),
        spam_sync = scheduler.is_scheduled(SYNC_JOB_NAME),
        "callguard running, press Ctrl-C to stop"
    );

    let signal = tokio::signal::ctrl_c().await;

    tracing::info!("shutting down");
    tasks.stop();
    scheduler.shutdown();
    commands::close(node)?;

    signal.map_err(|e| format!("failed to listen for Ctrl-C: {e}"))
}
