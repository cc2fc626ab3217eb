//! Call history recording.
//!
//! Every screened call (except hidden numbers, which the screener drops
//! before this point) produces exactly one call log entry. The reason
//! code comes from the action and the chain step that decided it.

use std::sync::Arc;

use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::{CallLogRepository, Directory};
use callguard_types::{Action, CanonicalNumber, LogId, NewCallLogEntry, Result, Timestamp};

use crate::decision::Rule;

// ---------------------------------------------------------------------------
// Reason codes
// ---------------------------------------------------------------------------

pub const REASON_ALLOWLIST: &str = "allowlist";
pub const REASON_CONTACT: &str = "contact";
/// Allowed because no filter applied.
pub const REASON_UNFILTERED: &str = "unfiltered";
pub const REASON_UNKNOWN: &str = "unknown";
pub const REASON_BLOCKLIST: &str = "blocklist";
/// Allowed because the decision did not complete in time.
pub const REASON_FAIL_OPEN: &str = "fail-open";
/// Prefix of the spam reason, followed by the spam tag.
pub const REASON_SPAM_PREFIX: &str = "spam:";

// ---------------------------------------------------------------------------
// EventRecorder
// ---------------------------------------------------------------------------

/// Writes call log entries.
pub struct EventRecorder {
    normalizer: Arc<PhoneNumberNormalizer>,
    directory: Arc<dyn Directory>,
    log: Arc<dyn CallLogRepository>,
}

impl EventRecorder {
    pub fn new(
        normalizer: Arc<PhoneNumberNormalizer>,
        directory: Arc<dyn Directory>,
        log: Arc<dyn CallLogRepository>,
    ) -> Self {
        Self {
            normalizer,
            directory,
            log,
        }
    }

    /// Records `action`, decided by `rule`, for `raw` at the current
    /// time.
    pub async fn record(&self, raw: &str, action: &Action, rule: Rule) -> Result<LogId> {
        self.record_at(raw, action, rule, Timestamp::now()).await
    }

    /// Records `action`, decided by `rule`, for `raw` at `now`.
    ///
    /// `spam_tag` and `spam_score` are filled only for spam rejections.
    /// The directory display name is attached when available; a failed
    /// name lookup leaves it empty.
    pub async fn record_at(
        &self,
        raw: &str,
        action: &Action,
        rule: Rule,
        now: Timestamp,
    ) -> Result<LogId> {
        let number = self.key_for(raw);
        let contact_name = self.contact_name(&number).await;
        self.append(raw, number, action, reason_for(action, rule), contact_name, now)
    }

    /// Records an `Allow` that was forced because the decision pipeline
    /// timed out or failed.
    ///
    /// The directory is not consulted: it may be what stalled.
    pub fn record_fail_open(&self, raw: &str, now: Timestamp) -> Result<LogId> {
        let number = self.key_for(raw);
        self.append(raw, number, &Action::Allow, REASON_FAIL_OPEN.to_string(), None, now)
    }

    fn append(
        &self,
        raw: &str,
        number: CanonicalNumber,
        action: &Action,
        reason: String,
        contact_name: Option<String>,
        now: Timestamp,
    ) -> Result<LogId> {
        let (spam_tag, spam_score) = match action {
            Action::RejectAsSpam { tag, score } => (Some(tag.clone()), Some(*score)),
            _ => (None, None),
        };
        let id = self.log.append(NewCallLogEntry {
            raw_number: raw.to_string(),
            number,
            timestamp: now,
            decision: action.decision(),
            reason: reason.clone(),
            contact_name,
            spam_tag,
            spam_score,
        })?;
        tracing::debug!(log_id = %id, decision = %action.decision(), reason = %reason, "call recorded");
        Ok(id)
    }

    /// Canonical key, or the trimmed raw text when normalization fails.
    fn key_for(&self, raw: &str) -> CanonicalNumber {
        self.normalizer
            .normalize(raw)
            .unwrap_or_else(|| CanonicalNumber::new(raw.trim()))
    }

    async fn contact_name(&self, number: &CanonicalNumber) -> Option<String> {
        match self.directory.display_name(number).await {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(number = %number, error = %e, "display name lookup failed");
                None
            }
        }
    }
}

/// Reason code for `action` as decided by `rule`.
pub fn reason_for(action: &Action, rule: Rule) -> String {
    match (action, rule) {
        (Action::RejectAsSpam { tag, .. }, _) => format!("{REASON_SPAM_PREFIX}{tag}"),
        (Action::Block, _) => REASON_BLOCKLIST.to_string(),
        (Action::Reject, _) => REASON_UNKNOWN.to_string(),
        (Action::Allow, Rule::Allowlist) => REASON_ALLOWLIST.to_string(),
        (Action::Allow, Rule::Contact) => REASON_CONTACT.to_string(),
        (Action::Allow, _) => REASON_UNFILTERED.to_string(),
    }
}
