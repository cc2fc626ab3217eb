//! Callguard screening runtime.
//!
//! Decides what to do with incoming calls, records every decision,
//! sends identity-request messages to rejected unknown callers, and
//! keeps the spam knowledge base in sync with its feed. [`node::Node`]
//! wires the components together.

pub mod actions;
pub mod decision;
pub mod directory;
pub mod dispatcher;
pub mod eligibility;
pub mod feed;
pub mod maintenance;
pub mod node;
pub mod recorder;
pub mod scheduler;
pub mod screening;
pub mod spam_sync;
pub mod transport;
