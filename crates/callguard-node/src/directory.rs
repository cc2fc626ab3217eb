//! Contact directories.
//!
//! [`StaticDirectory`] answers from an in-memory map, optionally loaded
//! from a JSON contacts file:
//!
//! ```json
//! [ { "number": "06 12 34 56 78", "name": "Alice" } ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::Directory;
use callguard_types::{CallguardError, CanonicalNumber, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ContactRecord {
    number: String,
    name: String,
}

/// Fixed set of contacts keyed by canonical number.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    contacts: HashMap<CanonicalNumber, String>,
}

impl StaticDirectory {
    /// A directory that knows nobody.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a contact. Numbers without a canonical form are ignored.
    pub fn with_contact(
        mut self,
        normalizer: &PhoneNumberNormalizer,
        number: &str,
        name: &str,
    ) -> Self {
        if let Some(key) = normalizer.normalize(number) {
            self.contacts.insert(key, name.to_string());
        }
        self
    }

    /// Loads a JSON array of `{number, name}` objects.
    pub fn load(path: &Path, normalizer: &PhoneNumberNormalizer) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| CallguardError::LookupError {
            reason: format!("cannot read contacts {}: {e}", path.display()),
        })?;
        let records: Vec<ContactRecord> =
            serde_json::from_slice(&bytes).map_err(|e| CallguardError::LookupError {
                reason: format!("malformed contacts {}: {e}", path.display()),
            })?;

        let directory = records
            .iter()
            .fold(Self::empty(), |dir, record| {
                dir.with_contact(normalizer, &record.number, &record.name)
            });
        tracing::debug!(contacts = directory.len(), "contacts loaded");
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn is_known_contact(&self, number: &CanonicalNumber) -> Result<bool> {
        Ok(self.contacts.contains_key(number))
    }

    async fn display_name(&self, number: &CanonicalNumber) -> Result<Option<String>> {
        Ok(self.contacts.get(number).cloned())
    }
}
