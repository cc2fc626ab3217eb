//! Identity-request message commands: check, send, resend.

use callguard_types::{LogId, MessageDecision};
use clap::Subcommand;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum MessageAction {
    /// Show whether a message would be sent to a number right now.
    Check {
        number: String,
    },
    /// Send the identity message to a number (user confirmation).
    Send {
        number: String,
        /// Send even if eligibility says to skip.
        #[arg(long)]
        force: bool,
    },
    /// Retry a FAILED message. The retry gets a new log entry.
    Resend {
        id: LogId,
    },
}

pub async fn run(action: MessageAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        MessageAction::Check { number } => check(opts, &number),
        MessageAction::Send { number, force } => send(opts, &number, force).await,
        MessageAction::Resend { id } => resend(opts, id).await,
    }
}

fn check(opts: &GlobalOpts, number: &str) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let decision = node
        .eligibility()
        .evaluate(number)
        .map_err(|e| e.to_string())?;

    if opts.json {
        output::print_value(&serde_json::json!({ "number": number, "decision": decision }), true);
    } else {
        output::print_kv("decision", &decision.to_string(), false);
    }
    Ok(())
}

async fn send(opts: &GlobalOpts, number: &str, force: bool) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    if !force {
        let decision = node
            .eligibility()
            .evaluate(number)
            .map_err(|e| e.to_string())?;
        if let MessageDecision::Skip { reason } = decision {
            return Err(format!("message not sent: {reason} (use --force to override)"));
        }
    }

    let sent = node.actions().confirm_message(number).await;
    commands::close(node)?;

    let log_id = sent.map_err(|e| e.to_string())?;
    output::print_success(&format!("identity message queued (message {log_id})"), opts.json);
    Ok(())
}

async fn resend(opts: &GlobalOpts, id: LogId) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let sent = node.dispatcher().resend(id).await;
    commands::close(node)?;

    let log_id = sent.map_err(|e| e.to_string())?;
    output::print_success(&format!("message {id} resent as message {log_id}"), opts.json);
    Ok(())
}
