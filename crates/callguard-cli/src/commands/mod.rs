//! Command handlers. Each module owns one top-level subcommand.

pub mod history;
pub mod list;
pub mod maintenance;
pub mod message;
pub mod run;
pub mod screen;
pub mod settings;
pub mod spam;
pub mod stats;

use callguard_node::node::Node;

use crate::GlobalOpts;

/// Opens the node described by the resolved config.
pub(crate) fn open(opts: &GlobalOpts) -> Result<Node, String> {
    opts.config.open_node()
}

/// Flushes pending writes before the process exits.
pub(crate) fn close(node: Node) -> Result<(), String> {
    node.storage()
        .flush()
        .map_err(|e| format!("failed to flush storage: {e}"))?;
    Ok(())
}
