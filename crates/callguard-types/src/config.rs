//! Policy knobs and process configuration with documented defaults.
//!
//! [`PolicyConfig`] is the user-facing screening policy persisted by the
//! settings store. [`AppConfig`] carries the operational parameters of
//! the engine (region, timeouts, sync cadence, retention).

use serde::{Deserialize, Serialize};

use crate::{CallguardError, Result};

/// Default identity-request message.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Bonjour, je filtre les appels inconnus. \
Pouvez-vous m'indiquer votre identité et l'objet de votre appel ? Merci.";

/// Default region used to parse national-format numbers.
pub const DEFAULT_REGION: &str = "FR";

/// Upper bound on feed fetches in one spam sync run.
pub const MAX_SYNC_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

/// Screening policy. One instance per process, durable across restarts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Reject callers that are not contacts and not on any list.
    pub filter_unknown_enabled: bool,

    /// Consult the spam knowledge base.
    pub spam_db_enabled: bool,

    /// Send an identity-request message after rejecting an unknown caller.
    pub auto_message_enabled: bool,

    /// Ask the user before each identity-request message.
    pub confirmation_mode_enabled: bool,

    /// Minimum hours between two messages to the same number.
    pub cooldown_hours: u32,

    /// Body of the identity-request message.
    pub message_template: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            filter_unknown_enabled: true,
            spam_db_enabled: true,
            auto_message_enabled: false,
            confirmation_mode_enabled: true,
            cooldown_hours: 24,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Cooldown window in milliseconds.
    pub fn cooldown_millis(&self) -> i64 {
        i64::from(self.cooldown_hours) * 3_600_000
    }

    pub fn validate(&self) -> Result<()> {
        if self.message_template.trim().is_empty() {
            return Err(CallguardError::ConfigError {
                reason: "message_template must not be empty".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Operational configuration of the screening engine.
///
/// Every field has a default; a JSON config file may override any
/// subset of them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// ISO 3166 region used for national-format numbers.
    pub default_region: String,

    /// Upper bound for one decision pipeline, in milliseconds.
    /// Past this bound the call is allowed (fail open).
    pub decision_timeout_ms: u64,

    /// Upper bound for one transport send, in milliseconds.
    pub dispatch_timeout_ms: u64,

    // ----- Spam sync ------------------------------------------------------

    /// Period of the spam knowledge base refresh, in hours.
    pub sync_interval_hours: u64,

    /// Flex window at the end of each period, in hours.
    pub sync_flex_hours: u64,

    /// Attempts per sync run before the run is marked failed.
    pub sync_max_attempts: u32,

    /// Base delay between sync attempts, doubled on each retry.
    pub sync_backoff_secs: u64,

    /// JSON spam feed document. `None` disables the feed.
    pub spam_feed_path: Option<String>,

    // ----- History --------------------------------------------------------

    /// Call and message history older than this is pruned.
    pub retention_days: u32,

    /// Interval between maintenance runs, in seconds.
    pub maintenance_interval_secs: u64,

    /// Spool file the outbox transport appends messages to.
    pub outbox_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            decision_timeout_ms: 3_000,
            dispatch_timeout_ms: 30_000,
            sync_interval_hours: 24,
            sync_flex_hours: 1,
            sync_max_attempts: 3,
            sync_backoff_secs: 30,
            spam_feed_path: None,
            retention_days: 90,
            maintenance_interval_secs: 3_600,
            outbox_path: None,
        }
    }
}

impl AppConfig {
    /// Validates all configuration values.
    ///
    /// Returns an error if any value is outside its acceptable range.
    pub fn validate(&self) -> Result<()> {
        let region = self.default_region.trim();
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CallguardError::ConfigError {
                reason: format!(
                    "default_region must be a two-letter region code, got '{}'",
                    self.default_region
                ),
            });
        }

        if self.decision_timeout_ms == 0 {
            return Err(CallguardError::ConfigError {
                reason: "decision_timeout_ms must be greater than 0".into(),
            });
        }

        if self.dispatch_timeout_ms == 0 {
            return Err(CallguardError::ConfigError {
                reason: "dispatch_timeout_ms must be greater than 0".into(),
            });
        }

        if self.sync_interval_hours == 0 {
            return Err(CallguardError::ConfigError {
                reason: "sync_interval_hours must be greater than 0".into(),
            });
        }

        if self.sync_flex_hours > self.sync_interval_hours {
            return Err(CallguardError::ConfigError {
                reason: "sync_flex_hours must not exceed sync_interval_hours".into(),
            });
        }

        if self.sync_max_attempts == 0 || self.sync_max_attempts > MAX_SYNC_ATTEMPTS {
            return Err(CallguardError::ConfigError {
                reason: format!(
                    "sync_max_attempts must be 1..={MAX_SYNC_ATTEMPTS}, got {}",
                    self.sync_max_attempts
                ),
            });
        }

        if self.retention_days == 0 || self.retention_days > 36_500 {
            return Err(CallguardError::ConfigError {
                reason: "retention_days must be 1..=36500".into(),
            });
        }

        if self.maintenance_interval_secs == 0 {
            return Err(CallguardError::ConfigError {
                reason: "maintenance_interval_secs must be greater than 0".into(),
            });
        }

        Ok(())
    }
}
