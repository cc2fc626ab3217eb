//! History commands: calls, messages.

use callguard_types::repository::{CallLogRepository, MessageLogRepository};
use callguard_types::{CallDecision, CallLogEntry, MessageLogEntry, Timestamp};
use clap::Subcommand;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Screened calls, newest first.
    Calls {
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only calls from this number.
        #[arg(long)]
        number: Option<String>,
        /// Only calls with this decision (allowed, rejected, spam, blocked).
        #[arg(long)]
        decision: Option<CallDecision>,
        /// Only calls at or after this RFC 3339 instant.
        #[arg(long)]
        since: Option<Timestamp>,
    },
    /// Identity-request messages, newest first.
    Messages {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        number: Option<String>,
    },
}

pub async fn run(action: HistoryAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        HistoryAction::Calls {
            limit,
            number,
            decision,
            since,
        } => calls(opts, limit, number.as_deref(), decision, since),
        HistoryAction::Messages { limit, number } => messages(opts, limit, number.as_deref()),
    }
}

fn calls(
    opts: &GlobalOpts,
    limit: usize,
    number: Option<&str>,
    decision: Option<CallDecision>,
    since: Option<Timestamp>,
) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let log = node.calls();

    let mut entries: Vec<CallLogEntry> = match (number, since) {
        (Some(raw), _) => {
            let canonical = node
                .normalizer()
                .normalize(raw)
                .ok_or_else(|| format!("invalid number '{raw}'"))?;
            log.by_number(&canonical)
        }
        (None, Some(from)) => log.between(from, Timestamp::now()),
        (None, None) => match decision {
            Some(d) => log.by_decision(d),
            None => log.recent(limit),
        },
    }
    .map_err(|e| e.to_string())?;

    entries.retain(|e| decision.map_or(true, |d| e.decision == d));
    entries.retain(|e| since.map_or(true, |s| e.timestamp >= s));
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    entries.truncate(limit);

    if opts.json {
        output::print_value(&entries, true);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                output::short_time(&e.timestamp),
                node.normalizer().format_for_display(&e.raw_number),
                e.decision.to_string(),
                e.reason.clone(),
                output::or_dash(e.contact_name.as_deref()),
            ]
        })
        .collect();
    output::print_table(&["id", "time", "number", "decision", "reason", "contact"], &rows, false);
    Ok(())
}

fn messages(opts: &GlobalOpts, limit: usize, number: Option<&str>) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let log = node.messages();

    let mut entries: Vec<MessageLogEntry> = match number {
        Some(raw) => {
            let canonical = node
                .normalizer()
                .normalize(raw)
                .ok_or_else(|| format!("invalid number '{raw}'"))?;
            log.by_number(&canonical)
        }
        None => log.recent(limit),
    }
    .map_err(|e| e.to_string())?;

    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    entries.truncate(limit);

    if opts.json {
        output::print_value(&entries, true);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                output::short_time(&e.timestamp),
                node.normalizer().format_for_display(&e.raw_number),
                e.status.to_string(),
            ]
        })
        .collect();
    output::print_table(&["id", "time", "number", "status"], &rows, false);
    Ok(())
}
