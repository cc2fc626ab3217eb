//! `callguard stats`: database summary.

use callguard_types::repository::{CallLogRepository, SpamRepository};
use callguard_types::{CallDecision, ListKind, Timestamp};
use serde::Serialize;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

#[derive(Serialize)]
struct Summary {
    calls_total: u64,
    calls_today: u64,
    allowed_today: u64,
    rejected_today: u64,
    spam_today: u64,
    blocked_today: u64,
    allow_list: usize,
    block_list: usize,
    spam_entries: u64,
    spam_last_updated: Option<Timestamp>,
    storage_bytes: u64,
}

pub async fn run(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let summary = collect(&node).map_err(|e| e.to_string())?;

    if opts.json {
        output::print_value(&summary, true);
        return Ok(());
    }
    let last = summary
        .spam_last_updated
        .map(|ts| output::short_time(&ts))
        .unwrap_or_else(|| "never".into());
    let rows = vec![
        vec!["calls (total)".to_string(), summary.calls_total.to_string()],
        vec!["calls (today)".to_string(), summary.calls_today.to_string()],
        vec!["  allowed".to_string(), summary.allowed_today.to_string()],
        vec!["  rejected".to_string(), summary.rejected_today.to_string()],
        vec!["  spam".to_string(), summary.spam_today.to_string()],
        vec!["  blocked".to_string(), summary.blocked_today.to_string()],
        vec!["allow list".to_string(), summary.allow_list.to_string()],
        vec!["block list".to_string(), summary.block_list.to_string()],
        vec!["spam entries".to_string(), summary.spam_entries.to_string()],
        vec!["spam updated".to_string(), last],
        vec!["storage bytes".to_string(), summary.storage_bytes.to_string()],
    ];
    output::print_table(&["metric", "value"], &rows, false);
    Ok(())
}

fn collect(node: &callguard_node::node::Node) -> callguard_types::Result<Summary> {
    let today = Timestamp::now().start_of_day();
    let calls = node.calls();
    let spam = node.spam().stats(0)?;

    Ok(Summary {
        calls_total: calls.count()?,
        calls_today: calls.count_since(today, None)?,
        allowed_today: calls.count_since(today, Some(CallDecision::Allowed))?,
        rejected_today: calls.count_since(today, Some(CallDecision::Rejected))?,
        spam_today: calls.count_since(today, Some(CallDecision::RejectedSpam))?,
        blocked_today: calls.count_since(today, Some(CallDecision::Blocked))?,
        allow_list: node.lists().count(ListKind::Allow)?,
        block_list: node.lists().count(ListKind::Block)?,
        spam_entries: spam.total_entries,
        spam_last_updated: spam.last_updated,
        storage_bytes: node.storage().size_on_disk()?,
    })
}
