//! Generic typed sled tree wrapper.
//!
//! [`TypedTree<T>`] serializes values with bincode on write and
//! deserializes on read. Keys stay raw bytes so each store chooses its
//! own key layout (canonical number, big-endian log id).

use std::marker::PhantomData;

use callguard_types::{CallguardError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

// ---------------------------------------------------------------------------
// TypedTree
// ---------------------------------------------------------------------------

/// A sled tree whose values are bincode-encoded `T`.
pub struct TypedTree<T> {
    tree: sled::Tree,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedTree<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> TypedTree<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a new `TypedTree` wrapping the given sled tree.
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self {
            tree,
            _marker: PhantomData,
        }
    }

    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    pub fn get(&self, key: &[u8]) -> Result<Option<T>> {
        let raw = self.tree.get(key).map_err(|e| storage_err("get", e))?;
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    /// Serializes and inserts a value, replacing any previous one.
    pub fn insert(&self, key: &[u8], value: &T) -> Result<()> {
        let bytes = encode(value)?;
        self.tree
            .insert(key, bytes)
            .map_err(|e| storage_err("insert", e))?;
        Ok(())
    }

    /// Removes a key from the tree.
    ///
    /// Returns `Ok(true)` if the key existed, `Ok(false)` if it did not.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let prev = self.tree.remove(key).map_err(|e| storage_err("remove", e))?;
        Ok(prev.is_some())
    }

    /// All values in key order.
    pub fn values(&self) -> Result<Vec<T>> {
        let mut results = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item.map_err(|e| storage_err("iter", e))?;
            results.push(decode(&value)?);
        }
        Ok(results)
    }

    /// Values whose decoded form satisfies `keep`, in key order.
    pub fn filter<F>(&self, keep: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let mut results = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item.map_err(|e| storage_err("iter", e))?;
            let decoded = decode(&value)?;
            if keep(&decoded) {
                results.push(decoded);
            }
        }
        Ok(results)
    }

    /// Up to `limit` values in descending key order.
    pub fn last_n(&self, limit: usize) -> Result<Vec<T>> {
        let mut results = Vec::with_capacity(limit.min(256));
        for item in self.tree.iter().rev().take(limit) {
            let (_, value) = item.map_err(|e| storage_err("iter", e))?;
            results.push(decode(&value)?);
        }
        Ok(results)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Writes every `(key, value)` pair in one atomic batch.
    ///
    /// Values are encoded up front; if any encoding fails nothing is
    /// written.
    pub fn insert_all<'v, I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (Vec<u8>, &'v T)>,
        T: 'v,
    {
        let mut batch = sled::Batch::default();
        let mut count = 0;
        for (key, value) in items {
            batch.insert(key, encode(value)?);
            count += 1;
        }
        self.tree
            .apply_batch(batch)
            .map_err(|e| storage_err("apply_batch", e))?;
        Ok(count)
    }

    /// Deletes every entry whose value satisfies `pred`, atomically.
    ///
    /// Returns the number of entries removed.
    pub fn remove_where<F>(&self, pred: F) -> Result<usize>
    where
        F: Fn(&T) -> bool,
    {
        let mut batch = sled::Batch::default();
        let mut count = 0;
        for item in self.tree.iter() {
            let (key, value) = item.map_err(|e| storage_err("iter", e))?;
            if pred(&decode(&value)?) {
                batch.remove(key);
                count += 1;
            }
        }
        if count > 0 {
            self.tree
                .apply_batch(batch)
                .map_err(|e| storage_err("apply_batch", e))?;
        }
        Ok(count)
    }

    /// Removes every entry. Returns how many there were.
    pub fn clear(&self) -> Result<usize> {
        let count = self.tree.len();
        self.tree.clear().map_err(|e| storage_err("clear", e))?;
        Ok(count)
    }

    /// Atomically replaces the value at `key` with `f(current)`.
    ///
    /// Uses compare-and-swap, retrying if a concurrent writer changed
    /// the value in between. Returns `Ok(None)` if the key is absent.
    /// An error from `f` aborts without writing.
    pub fn update<F>(&self, key: &[u8], f: F) -> Result<Option<T>>
    where
        F: Fn(&T) -> Result<T>,
    {
        loop {
            let current = match self.tree.get(key).map_err(|e| storage_err("get", e))? {
                Some(bytes) => bytes,
                None => return Ok(None),
            };
            let next = f(&decode(&current)?)?;
            let next_bytes = encode(&next)?;
            let swapped = self
                .tree
                .compare_and_swap(key, Some(current), Some(next_bytes))
                .map_err(|e| storage_err("compare_and_swap", e))?;
            if swapped.is_ok() {
                return Ok(Some(next));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CallguardError::StorageError {
        reason: format!("bincode serialization failed: {e}"),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| CallguardError::StorageError {
        reason: format!("bincode deserialization failed: {e}"),
    })
}

fn storage_err(op: &str, e: sled::Error) -> CallguardError {
    CallguardError::StorageError {
        reason: format!("sled {op} failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Result<(sled::Db, TypedTree<u32>)> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| storage_err("open", e))?;
        let tree = db.open_tree("t").map_err(|e| storage_err("open_tree", e))?;
        Ok((db, TypedTree::new(tree)))
    }

    #[test]
    fn insert_get_delete() -> Result<()> {
        let (_db, t) = tree()?;
        t.insert(b"a", &7)?;
        assert_eq!(t.get(b"a")?, Some(7));
        assert!(t.delete(b"a")?);
        assert!(!t.delete(b"a")?);
        assert_eq!(t.get(b"a")?, None);
        Ok(())
    }

    #[test]
    fn last_n_is_descending() -> Result<()> {
        let (_db, t) = tree()?;
        for i in 0u64..5 {
            t.insert(&i.to_be_bytes(), &(i as u32))?;
        }
        assert_eq!(t.last_n(3)?, vec![4, 3, 2]);
        Ok(())
    }

    #[test]
    fn batch_and_remove_where() -> Result<()> {
        let (_db, t) = tree()?;
        let values = [1u32, 2, 3, 4];
        let written = t.insert_all(
            values
                .iter()
                .map(|v| (v.to_be_bytes().to_vec(), v)),
        )?;
        assert_eq!(written, 4);
        assert_eq!(t.remove_where(|v| *v < 3)?, 2);
        assert_eq!(t.values()?, vec![3, 4]);
        assert_eq!(t.clear()?, 2);
        assert!(t.is_empty());
        Ok(())
    }

    #[test]
    fn update_applies_or_aborts() -> Result<()> {
        let (_db, t) = tree()?;
        t.insert(b"k", &1)?;
        assert_eq!(t.update(b"k", |v| Ok(v + 1))?, Some(2));
        let refused = t.update(b"k", |_| {
            Err(CallguardError::StorageError {
                reason: "nope".into(),
            })
        });
        assert!(refused.is_err());
        assert_eq!(t.get(b"k")?, Some(2));
        assert_eq!(t.update(b"missing", |v| Ok(*v))?, None);
        Ok(())
    }
}
