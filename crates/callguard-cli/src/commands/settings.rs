//! Policy commands: show, set, reset.

use clap::Subcommand;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current screening policy.
    Show,
    /// Change one policy field, e.g. `auto_message_enabled true`.
    Set {
        key: String,
        value: String,
    },
    /// Restore every field to its default.
    Reset,
}

pub async fn run(action: SettingsAction, opts: &GlobalOpts) -> std::result::Result<(), String> {
    match action {
        SettingsAction::Show => show(opts),
        SettingsAction::Set { key, value } => set(opts, &key, &value),
        SettingsAction::Reset => reset(opts),
    }
}

fn show(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let settings = node.settings();

    if opts.json {
        output::print_value(&settings.current(), true);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = settings
        .fields()
        .into_iter()
        .map(|(key, value)| vec![key.to_string(), value])
        .collect();
    output::print_table(&["setting", "value"], &rows, false);
    Ok(())
}

fn set(opts: &GlobalOpts, key: &str, value: &str) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    node.settings()
        .set_by_key(key.trim(), value)
        .map_err(|e| e.to_string())?;
    commands::close(node)?;

    output::print_kv(key.trim(), value, opts.json);
    Ok(())
}

fn reset(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    node.settings().reset().map_err(|e| e.to_string())?;
    commands::close(node)?;

    output::print_success("screening policy reset to defaults", opts.json);
    Ok(())
}
