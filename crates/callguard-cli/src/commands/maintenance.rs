//! `callguard maintenance`: one storage maintenance pass.

use callguard_node::maintenance::run_storage_maintenance;
use callguard_types::Timestamp;

use crate::commands;
use crate::output;
use crate::GlobalOpts;

pub async fn run(opts: &GlobalOpts) -> std::result::Result<(), String> {
    let node = commands::open(opts)?;
    let report = run_storage_maintenance(node.storage(), node.config(), Timestamp::now())
        .map_err(|e| format!("maintenance failed: {e}"))?;

    if opts.json {
        output::print_value(&report, true);
    } else {
        output::print_success(
            &format!(
                "pruned {} calls and {} messages older than {} days",
                report.calls_pruned,
                report.messages_pruned,
                node.config().retention_days
            ),
            false,
        );
    }
    Ok(())
}
