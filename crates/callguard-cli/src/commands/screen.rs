//! `callguard screen`: run the screening pipeline for one call.

use callguard_node::screening::{FollowUp, ScreeningOutcome};
use colored::Colorize;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

pub async fn run(number: Option<&str>, opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let outcome = node.screener().screen(number).await;
    let display = node.normalizer().format_for_display(number.unwrap_or_default());
    commands::close(node)?;

    if opts.json {
        output::print_value(&outcome, true);
    } else {
        print_human(&display, &outcome);
    }
    Ok(())
}

fn print_human(display: &str, outcome: &ScreeningOutcome) {
    println!("{}: {}", "caller".bold(), display);
    println!("{}: {}", "action".bold(), output::colored_action(&outcome.action));
    if let Some(rule) = &outcome.rule {
        println!("{}: {}", "rule".bold(), rule);
    }
    if outcome.fail_open {
        println!("{}", "decision timed out, call allowed".yellow());
    }
    match &outcome.log_id {
        Some(id) => println!("{}: {}", "log id".bold(), id),
        None => println!("{}: {}", "log id".bold(), "(not recorded)".dimmed()),
    }

    let follow_up = match &outcome.follow_up {
        FollowUp::None => return,
        FollowUp::Sent { log_id } => format!("identity message sent (message {log_id})"),
        FollowUp::AwaitingConfirmation => {
            "identity message awaiting confirmation (callguard message send <number>)".to_string()
        }
        FollowUp::Skipped { reason } => format!("identity message skipped: {reason}"),
        FollowUp::SendFailed { log_id, reason } => match log_id {
            Some(id) => format!("identity message failed (message {id}): {reason}"),
            None => format!("identity message failed: {reason}"),
        },
    };
    println!("{}: {}", "follow-up".bold(), follow_up);
}
