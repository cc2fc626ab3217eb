//! Append-only message history with one-way status updates.
//!
//! Keyed like the call log (`log_id_be(8)`). Status changes go through
//! compare-and-swap so two completions racing on the same entry cannot
//! both win, and a terminal status is never overwritten.

use callguard_types::repository::MessageLogRepository;
use callguard_types::{
    CallguardError, CanonicalNumber, LogId, MessageLogEntry, MessageStatus, NewMessageLogEntry,
    Result, Timestamp,
};

use crate::engine::next_id;
use crate::typed_tree::TypedTree;

// ---------------------------------------------------------------------------
// MessageLogStore
// ---------------------------------------------------------------------------

/// Message history store backed by sled.
#[derive(Clone)]
pub struct MessageLogStore {
    db: sled::Db,
    tree: TypedTree<MessageLogEntry>,
}

impl MessageLogStore {
    pub(crate) fn new(db: sled::Db, tree: sled::Tree) -> Self {
        Self {
            db,
            tree: TypedTree::new(tree),
        }
    }

    /// Entries to one number, newest first.
    pub fn by_number(&self, number: &CanonicalNumber) -> Result<Vec<MessageLogEntry>> {
        let mut entries = self.tree.filter(|entry| &entry.number == number)?;
        entries.reverse();
        Ok(entries)
    }
}

impl MessageLogRepository for MessageLogStore {
    fn append_pending(&self, entry: NewMessageLogEntry) -> Result<LogId> {
        let id = LogId::new(next_id(&self.db)?);
        let entry = MessageLogEntry::pending(id, entry);
        self.tree.insert(&id.to_key(), &entry)?;
        Ok(id)
    }

    fn set_status(&self, id: LogId, status: MessageStatus) -> Result<()> {
        let updated = self.tree.update(&id.to_key(), |current| {
            if !current.status.can_transition_to(status) {
                return Err(CallguardError::StorageError {
                    reason: format!(
                        "message {id}: illegal status change {} -> {status}",
                        current.status
                    ),
                });
            }
            let mut next = current.clone();
            next.status = status;
            Ok(next)
        })?;

        match updated {
            Some(_) => Ok(()),
            None => Err(CallguardError::StorageError {
                reason: format!("message {id} not found"),
            }),
        }
    }

    fn get(&self, id: LogId) -> Result<Option<MessageLogEntry>> {
        self.tree.get(&id.to_key())
    }

    fn last_sent_at(&self, number: &CanonicalNumber) -> Result<Option<Timestamp>> {
        let sent = self.tree.filter(|entry| {
            &entry.number == number && entry.status == MessageStatus::Sent
        })?;
        Ok(sent.into_iter().map(|entry| entry.timestamp).max())
    }

    fn recent(&self, limit: usize) -> Result<Vec<MessageLogEntry>> {
        self.tree.last_n(limit)
    }

    fn delete_older_than(&self, cutoff: Timestamp) -> Result<usize> {
        // Any status: a Pending entry this old was abandoned.
        self.tree.remove_where(|entry| entry.timestamp < cutoff)
    }
}
