//! User allow/block list store.
//!
//! Keyed by canonical number, so a number sits on at most one list.
//! Adding it to the other list replaces the previous entry; the
//! decision engine still checks BLOCK before ALLOW.

use callguard_types::repository::ListRepository;
use callguard_types::{CanonicalNumber, ListEntry, ListKind, Result};

use crate::typed_tree::TypedTree;

// ---------------------------------------------------------------------------
// ListStore
// ---------------------------------------------------------------------------

/// Allow/block list store backed by sled.
#[derive(Clone)]
pub struct ListStore {
    tree: TypedTree<ListEntry>,
}

impl ListStore {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self {
            tree: TypedTree::new(tree),
        }
    }

    /// Number of entries of one kind.
    pub fn count(&self, kind: ListKind) -> Result<usize> {
        Ok(self.tree.filter(|entry| entry.kind == kind)?.len())
    }
}

impl ListRepository for ListStore {
    fn find(&self, number: &CanonicalNumber) -> Result<Option<ListEntry>> {
        self.tree.get(number.as_bytes())
    }

    fn upsert(&self, entry: ListEntry) -> Result<()> {
        tracing::debug!(number = %entry.number, kind = %entry.kind, "list entry upserted");
        self.tree.insert(entry.number.as_bytes(), &entry)
    }

    fn remove(&self, number: &CanonicalNumber) -> Result<bool> {
        self.tree.delete(number.as_bytes())
    }

    fn list(&self, kind: Option<ListKind>) -> Result<Vec<ListEntry>> {
        let mut entries = match kind {
            Some(kind) => self.tree.filter(|entry| entry.kind == kind)?,
            None => self.tree.values()?,
        };
        // Newest first, as presented to the user.
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(entries)
    }
}
