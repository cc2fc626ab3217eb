//! Spam knowledge base store.
//!
//! Upserts are last-writer-wins by canonical number. A full feed is
//! written with one sled batch, so a sync run either lands completely
//! or leaves the previous data untouched.

use std::collections::HashMap;

use callguard_types::repository::SpamRepository;
use callguard_types::{
    CanonicalNumber, Result, SpamEntry, SpamRecord, SpamStats, Timestamp,
};

use crate::typed_tree::TypedTree;

// ---------------------------------------------------------------------------
// SpamStore
// ---------------------------------------------------------------------------

/// Spam verdict store backed by sled.
#[derive(Clone)]
pub struct SpamStore {
    tree: TypedTree<SpamEntry>,
}

impl SpamStore {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self {
            tree: TypedTree::new(tree),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl SpamRepository for SpamStore {
    fn lookup(&self, number: &CanonicalNumber) -> Result<Option<SpamEntry>> {
        self.tree.get(number.as_bytes())
    }

    fn upsert(&self, record: SpamRecord, now: Timestamp) -> Result<()> {
        let entry = SpamEntry::from_record(record, now);
        self.tree.insert(entry.number.as_bytes(), &entry)
    }

    fn upsert_all(&self, records: Vec<SpamRecord>, now: Timestamp) -> Result<usize> {
        let entries: Vec<SpamEntry> = records
            .into_iter()
            .map(|record| SpamEntry::from_record(record, now))
            .collect();
        let written = self.tree.insert_all(
            entries
                .iter()
                .map(|entry| (entry.number.as_bytes().to_vec(), entry)),
        )?;
        tracing::debug!(written, "spam entries upserted");
        Ok(written)
    }

    fn remove(&self, number: &CanonicalNumber) -> Result<bool> {
        self.tree.delete(number.as_bytes())
    }

    fn clear(&self) -> Result<usize> {
        let removed = self.tree.clear()?;
        tracing::info!(removed, "spam knowledge base cleared");
        Ok(removed)
    }

    fn stats(&self, top_tags: usize) -> Result<SpamStats> {
        let entries = self.tree.values()?;
        let mut last_updated: Option<Timestamp> = None;
        let mut by_tag: HashMap<String, u64> = HashMap::new();

        for entry in &entries {
            last_updated = Some(match last_updated {
                Some(current) if current >= entry.updated_at => current,
                _ => entry.updated_at,
            });
            *by_tag.entry(entry.tag.clone()).or_insert(0) += 1;
        }

        let mut tags: Vec<(String, u64)> = by_tag.into_iter().collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tags.truncate(top_tags);

        Ok(SpamStats {
            total_entries: entries.len() as u64,
            last_updated,
            top_tags: tags,
        })
    }
}
