//! Append-only call history.
//!
//! Entries are keyed by `log_id_be(8)`. Ids come from the database-wide
//! monotonic generator, so sled's lexicographic order is append order
//! and concurrent appends never collide.

use callguard_types::repository::CallLogRepository;
use callguard_types::{
    CallDecision, CallLogEntry, CanonicalNumber, LogId, NewCallLogEntry, Result, Timestamp,
};

use crate::engine::next_id;
use crate::typed_tree::TypedTree;

// ---------------------------------------------------------------------------
// CallLogStore
// ---------------------------------------------------------------------------

/// Call history store backed by sled.
#[derive(Clone)]
pub struct CallLogStore {
    db: sled::Db,
    tree: TypedTree<CallLogEntry>,
}

impl CallLogStore {
    pub(crate) fn new(db: sled::Db, tree: sled::Tree) -> Self {
        Self {
            db,
            tree: TypedTree::new(tree),
        }
    }
}

impl CallLogRepository for CallLogStore {
    fn append(&self, entry: NewCallLogEntry) -> Result<LogId> {
        let id = LogId::new(next_id(&self.db)?);
        let entry = CallLogEntry::from_new(id, entry);
        self.tree.insert(&id.to_key(), &entry)?;
        Ok(id)
    }

    fn get(&self, id: LogId) -> Result<Option<CallLogEntry>> {
        self.tree.get(&id.to_key())
    }

    fn recent(&self, limit: usize) -> Result<Vec<CallLogEntry>> {
        self.tree.last_n(limit)
    }

    fn by_number(&self, number: &CanonicalNumber) -> Result<Vec<CallLogEntry>> {
        let mut entries = self.tree.filter(|entry| &entry.number == number)?;
        entries.reverse();
        Ok(entries)
    }

    fn by_decision(&self, decision: CallDecision) -> Result<Vec<CallLogEntry>> {
        let mut entries = self.tree.filter(|entry| entry.decision == decision)?;
        entries.reverse();
        Ok(entries)
    }

    fn between(&self, from: Timestamp, to: Timestamp) -> Result<Vec<CallLogEntry>> {
        let mut entries = self
            .tree
            .filter(|entry| entry.timestamp >= from && entry.timestamp < to)?;
        entries.sort_by_key(|entry| (entry.timestamp, entry.id));
        Ok(entries)
    }

    fn count_since(&self, since: Timestamp, decision: Option<CallDecision>) -> Result<u64> {
        let matching = self.tree.filter(|entry| {
            entry.timestamp >= since && decision.map_or(true, |d| entry.decision == d)
        })?;
        Ok(matching.len() as u64)
    }

    fn delete_older_than(&self, cutoff: Timestamp) -> Result<usize> {
        self.tree.remove_where(|entry| entry.timestamp < cutoff)
    }

    fn count(&self) -> Result<u64> {
        Ok(self.tree.len() as u64)
    }
}
