//! Storage engine: database lifecycle and tree access.
//!
//! The [`StorageEngine`] owns the sled database. On
//! [`open`](StorageEngine::open) it opens the database, creates every
//! tree, and loads the screening policy so that all handles returned by
//! [`settings`](StorageEngine::settings) share one observable cell.

use std::path::Path;
use std::sync::Arc;

use callguard_types::{CallguardError, Result};

use crate::call_log::CallLogStore;
use crate::lists::ListStore;
use crate::message_log::MessageLogStore;
use crate::settings::SettingsStore;
use crate::spam::SpamStore;

// ---------------------------------------------------------------------------
// Tree names
// ---------------------------------------------------------------------------

pub(crate) const TREE_LISTS: &str = "lists";
pub(crate) const TREE_SPAM: &str = "spam";
pub(crate) const TREE_CALL_LOG: &str = "call_log";
pub(crate) const TREE_MESSAGE_LOG: &str = "message_log";
pub(crate) const TREE_SETTINGS: &str = "settings";

const ALL_TREES: [&str; 5] = [
    TREE_LISTS,
    TREE_SPAM,
    TREE_CALL_LOG,
    TREE_MESSAGE_LOG,
    TREE_SETTINGS,
];

// ---------------------------------------------------------------------------
// StorageEngine
// ---------------------------------------------------------------------------

/// sled-backed storage engine.
///
/// # Trees
///
/// - `lists`: allow/block entries keyed by canonical number
/// - `spam`: spam verdicts keyed by canonical number
/// - `call_log`: call history keyed by big-endian log id
/// - `message_log`: message history keyed by big-endian log id
/// - `settings`: policy fields as key-value pairs
///
/// Store handles are cheap clones of the underlying trees and can be
/// moved into tasks freely.
pub struct StorageEngine {
    db: sled::Db,
    settings: Arc<SettingsStore>,
}

impl StorageEngine {
    /// Opens (or creates) the database in directory `path`.
    ///
    /// # Errors
    ///
    /// - [`CallguardError::StorageError`] if the database cannot be
    ///   opened.
    /// - [`CallguardError::ConfigError`] if a persisted policy value
    ///   cannot be parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| CallguardError::StorageError {
            reason: format!("failed to open sled database at {}: {e}", path.display()),
        })?;
        Self::from_db(db)
    }

    /// Opens a throwaway in-memory database, removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| CallguardError::StorageError {
                reason: format!("failed to open temporary sled database: {e}"),
            })?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        // Pre-create all trees so they exist for later access.
        for name in ALL_TREES {
            open_tree(&db, name)?;
        }
        let settings = Arc::new(SettingsStore::load(open_tree(&db, TREE_SETTINGS)?)?);
        tracing::debug!(trees = ALL_TREES.len(), "storage engine opened");
        Ok(Self { db, settings })
    }

    /// Flushes all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns [`CallguardError::StorageError`] if the flush fails.
    pub fn flush(&self) -> Result<usize> {
        self.db.flush().map_err(|e| CallguardError::StorageError {
            reason: format!("failed to flush database: {e}"),
        })
    }

    /// Approximate on-disk size in bytes.
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db.size_on_disk().map_err(|e| CallguardError::StorageError {
            reason: format!("failed to read database size: {e}"),
        })
    }

    pub fn lists(&self) -> Result<ListStore> {
        Ok(ListStore::new(open_tree(&self.db, TREE_LISTS)?))
    }

    pub fn spam(&self) -> Result<SpamStore> {
        Ok(SpamStore::new(open_tree(&self.db, TREE_SPAM)?))
    }

    pub fn call_log(&self) -> Result<CallLogStore> {
        Ok(CallLogStore::new(
            self.db.clone(),
            open_tree(&self.db, TREE_CALL_LOG)?,
        ))
    }

    pub fn message_log(&self) -> Result<MessageLogStore> {
        Ok(MessageLogStore::new(
            self.db.clone(),
            open_tree(&self.db, TREE_MESSAGE_LOG)?,
        ))
    }

    /// Shared settings store. Every call returns the same instance.
    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }
}

/// Opens a named sled tree.
fn open_tree(db: &sled::Db, name: &str) -> Result<sled::Tree> {
    db.open_tree(name).map_err(|e| CallguardError::StorageError {
        reason: format!("failed to open tree '{name}': {e}"),
    })
}

/// Draws the next id from the database-wide monotonic counter.
pub(crate) fn next_id(db: &sled::Db) -> Result<u64> {
    db.generate_id().map_err(|e| CallguardError::StorageError {
        reason: format!("failed to generate log id: {e}"),
    })
}
