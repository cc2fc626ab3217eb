//! List commands: add, remove, show.

use callguard_types::repository::ListRepository;
use callguard_types::ListKind;
use clap::Subcommand;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum ListAction {
    /// Add a number to the allow or block list (replaces any previous entry).
    Add {
        /// `allow` or `block`.
        kind: ListKind,
        /// Phone number in any common format.
        number: String,
        /// Free-form label shown in listings.
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove a number from whichever list holds it.
    Remove {
        number: String,
    },
    /// Show list entries.
    Show {
        /// Only show one list.
        #[arg(long)]
        kind: Option<ListKind>,
    },
}

pub async fn run(action: ListAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        ListAction::Add { kind, number, label } => add(opts, kind, &number, label),
        ListAction::Remove { number } => remove(opts, &number),
        ListAction::Show { kind } => show(opts, kind),
    }
}

fn add(
    opts: &GlobalOpts,
    kind: ListKind,
    number: &str,
    label: Option<String>,
) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let label = label.map(|l| sanitize_label(&l)).filter(|l| !l.is_empty());
    let canonical = match kind {
        ListKind::Allow => node.actions().allow(number, label),
        ListKind::Block => node.actions().block(number, label),
    }
    .map_err(|e| e.to_string())?;
    commands::close(node)?;

    output::print_success(&format!("{canonical} added to the {kind} list"), opts.json);
    Ok(())
}

fn remove(opts: &GlobalOpts, number: &str) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let removed = node.actions().unlist(number).map_err(|e| e.to_string())?;
    commands::close(node)?;

    if !removed {
        return Err(format!("{number} is not on any list"));
    }
    output::print_success(&format!("{number} removed"), opts.json);
    Ok(())
}

fn show(opts: &GlobalOpts, kind: Option<ListKind>) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let entries = node.lists().list(kind).map_err(|e| e.to_string())?;
    let normalizer = node.normalizer();

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                normalizer.format_for_display(entry.number.as_str()),
                entry.kind.to_string(),
                output::or_dash(entry.label.as_deref()),
                output::short_time(&entry.added_at),
            ]
        })
        .collect();
    output::print_table(&["number", "list", "label", "added"], &rows, opts.json);
    Ok(())
}

/// Trims, strips control characters and caps the length.
fn sanitize_label(s: &str) -> String {
    s.trim().chars().filter(|c| !c.is_control()).take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_trimmed_and_cleaned() {
        assert_eq!(sanitize_label("  Dr\x00 Martin\t "), "Dr Martin");
    }

    #[test]
    fn label_is_capped() {
        assert_eq!(sanitize_label(&"x".repeat(200)).chars().count(), 64);
    }
}
