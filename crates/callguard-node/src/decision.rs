//! Call decision chain.
//!
//! The [`DecisionEngine`] turns a raw caller number into an [`Action`]
//! by walking a strict priority chain:
//!
//! 1. **Block list**: the user blocked this number.
//! 2. **Allow list**: the user allowed this number.
//! 3. **Spam knowledge base**: only when `spam_db_enabled`.
//! 4. **Directory**: a known contact is let through.
//! 5. **Unknown filter**: reject when `filter_unknown_enabled`.
//! 6. **Default**: allow.
//!
//! This order MUST NOT be changed. The first matching step decides and
//! nothing after it is consulted. A lookup that fails is treated as
//! "not found" and the chain moves on; the failure is reported in the
//! [`Verdict`] for the caller to log.

use std::fmt;
use std::sync::Arc;

use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::{Directory, ListRepository, PolicySource, SpamRepository};
use callguard_types::{Action, CallguardError, CanonicalNumber, ListKind};

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// The chain step that produced a verdict.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    Blocklist,
    Allowlist,
    SpamDb,
    Contact,
    FilterUnknown,
    Default,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Blocklist => "blocklist",
            Self::Allowlist => "allowlist",
            Self::SpamDb => "spam-db",
            Self::Contact => "contact",
            Self::FilterUnknown => "filter-unknown",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// A lookup that failed and was treated as "not found".
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SoftFailure {
    pub step: Rule,
    pub reason: String,
}

/// Result of one pass through the chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verdict {
    pub action: Action,
    /// Step that decided.
    pub rule: Rule,
    /// Lookups that failed on the way.
    pub soft_failures: Vec<SoftFailure>,
}

impl Verdict {
    fn new(action: Action, rule: Rule, soft_failures: Vec<SoftFailure>) -> Self {
        Self {
            action,
            rule,
            soft_failures,
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionEngine
// ---------------------------------------------------------------------------

/// Evaluates the decision chain against the stores and the directory.
///
/// The engine never writes anything. Policy is read once per call so a
/// settings change between two calls takes effect on the second one.
pub struct DecisionEngine {
    normalizer: Arc<PhoneNumberNormalizer>,
    lists: Arc<dyn ListRepository>,
    spam: Arc<dyn SpamRepository>,
    directory: Arc<dyn Directory>,
    policy: Arc<dyn PolicySource>,
}

impl DecisionEngine {
    pub fn new(
        normalizer: Arc<PhoneNumberNormalizer>,
        lists: Arc<dyn ListRepository>,
        spam: Arc<dyn SpamRepository>,
        directory: Arc<dyn Directory>,
        policy: Arc<dyn PolicySource>,
    ) -> Self {
        Self {
            normalizer,
            lists,
            spam,
            directory,
            policy,
        }
    }

    /// Returns the action for `raw`.
    ///
    /// Always returns; lookup failures only change which step decides.
    pub async fn decide(&self, raw: &str) -> Action {
        self.evaluate(raw).await.action
    }

    /// Like [`decide`](Self::decide) but also reports the deciding step
    /// and any lookups that failed.
    pub async fn evaluate(&self, raw: &str) -> Verdict {
        let policy = self.policy.policy();
        let mut failures = Vec::new();

        // Without a canonical key none of the lookups can match, so
        // only the policy steps apply.
        if let Some(number) = self.normalizer.normalize(raw) {
            // 1. Block list.
            if self.listed(&number, ListKind::Block, &mut failures) {
                return Verdict::new(Action::Block, Rule::Blocklist, failures);
            }

            // 2. Allow list.
            if self.listed(&number, ListKind::Allow, &mut failures) {
                return Verdict::new(Action::Allow, Rule::Allowlist, failures);
            }

            // 3. Spam knowledge base.
            if policy.spam_db_enabled {
                match self.spam.lookup(&number) {
                    Ok(Some(entry)) => {
                        let action = Action::RejectAsSpam {
                            tag: entry.tag,
                            score: entry.score,
                        };
                        return Verdict::new(action, Rule::SpamDb, failures);
                    }
                    Ok(None) => {}
                    Err(e) => failures.push(soft(Rule::SpamDb, &e)),
                }
            }

            // 4. Directory.
            match self.directory.is_known_contact(&number).await {
                Ok(true) => return Verdict::new(Action::Allow, Rule::Contact, failures),
                Ok(false) => {}
                Err(e) => failures.push(soft(Rule::Contact, &e)),
            }
        }

        // 5. Unknown filter.
        if policy.filter_unknown_enabled {
            return Verdict::new(Action::Reject, Rule::FilterUnknown, failures);
        }

        // 6. Default.
        Verdict::new(Action::Allow, Rule::Default, failures)
    }

    fn listed(
        &self,
        number: &CanonicalNumber,
        kind: ListKind,
        failures: &mut Vec<SoftFailure>,
    ) -> bool {
        let step = match kind {
            ListKind::Block => Rule::Blocklist,
            ListKind::Allow => Rule::Allowlist,
        };
        match self.lists.is_listed(number, kind) {
            Ok(listed) => listed,
            Err(e) => {
                failures.push(soft(step, &e));
                false
            }
        }
    }
}

fn soft(step: Rule, error: &CallguardError) -> SoftFailure {
    SoftFailure {
        step,
        reason: error.to_string(),
    }
}
