//! User follow-up actions on a screened call.
//!
//! After a rejection the user may allow or block the number, or approve
//! the identity message that confirmation mode held back.

use std::sync::Arc;

use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::ListRepository;
use callguard_types::{
    CallguardError, CanonicalNumber, DispatchError, ListEntry, ListKind, LogId, Result, Timestamp,
};

use crate::dispatcher::MessageDispatcher;

pub struct UserActions {
    normalizer: Arc<PhoneNumberNormalizer>,
    lists: Arc<dyn ListRepository>,
    dispatcher: Arc<MessageDispatcher>,
}

impl UserActions {
    pub fn new(
        normalizer: Arc<PhoneNumberNormalizer>,
        lists: Arc<dyn ListRepository>,
        dispatcher: Arc<MessageDispatcher>,
    ) -> Self {
        Self {
            normalizer,
            lists,
            dispatcher,
        }
    }

    /// Puts `raw` on the allow list, replacing any block entry.
    pub fn allow(&self, raw: &str, label: Option<String>) -> Result<CanonicalNumber> {
        self.add(raw, ListKind::Allow, label)
    }

    /// Puts `raw` on the block list, replacing any allow entry.
    pub fn block(&self, raw: &str, label: Option<String>) -> Result<CanonicalNumber> {
        self.add(raw, ListKind::Block, label)
    }

    /// Removes `raw` from whichever list holds it.
    pub fn unlist(&self, raw: &str) -> Result<bool> {
        let number = self.canonical(raw)?;
        let removed = self.lists.remove(&number)?;
        if removed {
            tracing::info!(number = %number, "number removed from lists");
        }
        Ok(removed)
    }

    /// Sends the identity message the user approved.
    pub async fn confirm_message(&self, raw: &str) -> std::result::Result<LogId, DispatchError> {
        self.dispatcher.send(raw).await
    }

    fn add(&self, raw: &str, kind: ListKind, label: Option<String>) -> Result<CanonicalNumber> {
        let number = self.canonical(raw)?;
        let label = label.filter(|l| !l.trim().is_empty());
        self.lists.upsert(ListEntry {
            number: number.clone(),
            kind,
            label,
            added_at: Timestamp::now(),
        })?;
        tracing::info!(number = %number, list = %kind, "number listed");
        Ok(number)
    }

    fn canonical(&self, raw: &str) -> Result<CanonicalNumber> {
        self.normalizer
            .normalize(raw)
            .ok_or_else(|| CallguardError::InvalidNumber {
                reason: format!("'{raw}' has no usable digits"),
            })
    }
}
