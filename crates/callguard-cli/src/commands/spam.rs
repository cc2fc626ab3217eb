//! Spam knowledge base commands.

use std::path::PathBuf;
use std::sync::Arc;

use callguard_node::feed::{FileSpamFeed, DEFAULT_SOURCE};
use callguard_node::spam_sync::SyncOutcome;
use callguard_types::repository::{SpamFeed, SpamRepository};
use callguard_types::{SpamRecord, Timestamp};
use clap::Subcommand;
use colored::Colorize;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum SpamAction {
    /// Import a feed document. `<file>.sha256` must hold its digest.
    Import {
        path: PathBuf,
    },
    /// Entry count, last update and most frequent tags.
    Stats {
        /// Number of tags to show.
        #[arg(long, default_value = "5")]
        top: usize,
    },
    /// Add or replace a single entry.
    Add {
        number: String,
        #[arg(long)]
        tag: String,
        #[arg(long, default_value = "50")]
        score: u32,
    },
    /// Remove a single entry.
    Remove {
        number: String,
    },
    /// Delete every entry.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Run one sync against the configured feed, with retries.
    Sync,
}

pub async fn run(action: SpamAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        SpamAction::Import { path } => import(opts, path).await,
        SpamAction::Stats { top } => stats(opts, top),
        SpamAction::Add { number, tag, score } => add(opts, &number, tag, score),
        SpamAction::Remove { number } => remove(opts, &number),
        SpamAction::Clear { yes } => clear(opts, yes),
        SpamAction::Sync => sync(opts).await,
    }
}

async fn import(opts: &GlobalOpts, path: PathBuf) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let feed = FileSpamFeed::new(path, Arc::clone(node.normalizer()));
    let records = feed.fetch().await.map_err(|e| e.to_string())?;
    let upserted = node
        .spam()
        .upsert_all(records, Timestamp::now())
        .map_err(|e| e.to_string())?;
    commands::close(node)?;

    output::print_success(&format!("imported {upserted} spam entries"), opts.json);
    Ok(())
}

fn stats(opts: &GlobalOpts, top: usize) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let stats = node.spam().stats(top).map_err(|e| e.to_string())?;

    if opts.json {
        output::print_value(&stats, true);
        return Ok(());
    }

    println!("{}: {}", "entries".bold(), stats.total_entries);
    let last = stats
        .last_updated
        .map(|ts| output::short_time(&ts))
        .unwrap_or_else(|| "never".into());
    println!("{}: {}", "last updated".bold(), last);
    let rows: Vec<Vec<String>> = stats
        .top_tags
        .iter()
        .map(|(tag, count)| vec![tag.clone(), count.to_string()])
        .collect();
    output::print_table(&["tag", "count"], &rows, false);
    Ok(())
}

fn add(opts: &GlobalOpts, number: &str, tag: String, score: u32) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let canonical = node
        .normalizer()
        .normalize(number)
        .ok_or_else(|| format!("invalid number '{number}'"))?;
    let tag = tag.trim().to_string();
    if tag.is_empty() {
        return Err("tag must not be empty".into());
    }

    let now = Timestamp::now();
    let record = SpamRecord {
        number: canonical.clone(),
        tag,
        score,
        source: DEFAULT_SOURCE.to_string(),
        last_seen: now,
    };
    node.spam().upsert(record, now).map_err(|e| e.to_string())?;
    commands::close(node)?;

    output::print_success(&format!("{canonical} marked as spam"), opts.json);
    Ok(())
}

fn remove(opts: &GlobalOpts, number: &str) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let canonical = node
        .normalizer()
        .normalize(number)
        .ok_or_else(|| format!("invalid number '{number}'"))?;
    let removed = node.spam().remove(&canonical).map_err(|e| e.to_string())?;
    commands::close(node)?;

    if !removed {
        return Err(format!("{canonical} is not in the spam database"));
    }
    output::print_success(&format!("{canonical} removed from the spam database"), opts.json);
    Ok(())
}

fn clear(opts: &GlobalOpts, yes: bool) -> std::result::Result<(), String> {
    if !yes {
        return Err("refusing to clear the spam database without --yes".into());
    }
    let node = commands::open(opts)?;
    let removed = node.spam().clear().map_err(|e| e.to_string())?;
    commands::close(node)?;

    output::print_success(&format!("removed {removed} spam entries"), opts.json);
    Ok(())
}

async fn sync(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let sync = node
        .spam_sync()
        .cloned()
        .ok_or("no spam feed configured (set spam_feed_path in the config file)")?;
    let report = sync.run_once().await;
    commands::close(node)?;

    match &report.outcome {
        SyncOutcome::Succeeded { upserted } => {
            if opts.json {
                output::print_value(&report, true);
            } else {
                output::print_success(
                    &format!("synchronized {upserted} entries in {} attempt(s)", report.attempts),
                    false,
                );
            }
            Ok(())
        }
        SyncOutcome::Failed { reason } => Err(format!(
            "spam sync failed after {} attempt(s): {reason}",
            report.attempts
        )),
        SyncOutcome::AlreadyRunning => Err("a spam sync is already running".into()),
    }
}
