//! Persistent stores for callguard, backed by sled.
//!
//! Each entity lives in its own tree and is serialized with bincode.
//! Subsystems: user lists, spam knowledge base, call history, message
//! history, and the screening policy.

pub mod call_log;
pub mod engine;
pub mod lists;
pub mod message_log;
pub mod settings;
pub mod spam;
pub mod typed_tree;

pub use engine::StorageEngine;
