//! Durable, observable screening policy.
//!
//! Each [`PolicyConfig`] field is persisted as a string key-value pair.
//! The loaded policy is published through a `tokio::sync::watch` cell:
//! the decision path reads the last known value synchronously with
//! [`SettingsStore::current`], while interested tasks may
//! [`subscribe`](SettingsStore::subscribe) to changes. Every setter
//! persists first and publishes second.

use std::sync::{Mutex, MutexGuard};

use callguard_types::config::PolicyConfig;
use callguard_types::repository::PolicySource;
use callguard_types::{CallguardError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::typed_tree::TypedTree;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub const KEY_FILTER_UNKNOWN: &str = "filter_unknown_enabled";
pub const KEY_SPAM_DB: &str = "spam_db_enabled";
pub const KEY_AUTO_MESSAGE: &str = "auto_message_enabled";
pub const KEY_CONFIRMATION_MODE: &str = "confirmation_mode_enabled";
pub const KEY_COOLDOWN_HOURS: &str = "cooldown_hours";
pub const KEY_MESSAGE_TEMPLATE: &str = "message_template";

/// Every key accepted by [`SettingsStore::set_by_key`].
pub const ALL_KEYS: [&str; 6] = [
    KEY_FILTER_UNKNOWN,
    KEY_SPAM_DB,
    KEY_AUTO_MESSAGE,
    KEY_CONFIRMATION_MODE,
    KEY_COOLDOWN_HOURS,
    KEY_MESSAGE_TEMPLATE,
];

// ---------------------------------------------------------------------------
// SettingValue
// ---------------------------------------------------------------------------

/// Wrapper for a stored setting value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettingValue {
    /// The setting value as a string.
    pub value: String,
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Key-value policy store with an observable current value.
pub struct SettingsStore {
    tree: TypedTree<SettingValue>,
    cell: watch::Sender<PolicyConfig>,
    /// Serializes persist-then-publish so readers never observe a value
    /// that is not on disk.
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Loads the persisted policy, falling back to defaults for missing
    /// fields.
    ///
    /// # Errors
    ///
    /// [`CallguardError::ConfigError`] if a stored value does not parse.
    pub(crate) fn load(tree: sled::Tree) -> Result<Self> {
        let tree = TypedTree::new(tree);
        let policy = read_policy(&tree)?;
        let (cell, _) = watch::channel(policy);
        Ok(Self {
            tree,
            cell,
            write_lock: Mutex::new(()),
        })
    }

    /// Last published policy.
    pub fn current(&self) -> PolicyConfig {
        self.cell.borrow().clone()
    }

    /// `(key, value)` pairs of the current policy, in storage form.
    pub fn fields(&self) -> [(&'static str, String); 6] {
        policy_fields(&self.current())
    }

    /// Receiver notified after every successful update.
    pub fn subscribe(&self) -> watch::Receiver<PolicyConfig> {
        self.cell.subscribe()
    }

    pub fn set_filter_unknown_enabled(&self, enabled: bool) -> Result<()> {
        self.write_field(KEY_FILTER_UNKNOWN, enabled.to_string(), |p| {
            p.filter_unknown_enabled = enabled
        })
    }

    pub fn set_spam_db_enabled(&self, enabled: bool) -> Result<()> {
        self.write_field(KEY_SPAM_DB, enabled.to_string(), |p| {
            p.spam_db_enabled = enabled
        })
    }

    pub fn set_auto_message_enabled(&self, enabled: bool) -> Result<()> {
        self.write_field(KEY_AUTO_MESSAGE, enabled.to_string(), |p| {
            p.auto_message_enabled = enabled
        })
    }

    pub fn set_confirmation_mode_enabled(&self, enabled: bool) -> Result<()> {
        self.write_field(KEY_CONFIRMATION_MODE, enabled.to_string(), |p| {
            p.confirmation_mode_enabled = enabled
        })
    }

    pub fn set_cooldown_hours(&self, hours: u32) -> Result<()> {
        self.write_field(KEY_COOLDOWN_HOURS, hours.to_string(), |p| {
            p.cooldown_hours = hours
        })
    }

    /// Sets the message body.
    ///
    /// # Errors
    ///
    /// [`CallguardError::ConfigError`] if `template` is blank.
    pub fn set_message_template(&self, template: &str) -> Result<()> {
        if template.trim().is_empty() {
            return Err(CallguardError::ConfigError {
                reason: "message_template must not be empty".into(),
            });
        }
        let owned = template.to_string();
        self.write_field(KEY_MESSAGE_TEMPLATE, owned.clone(), move |p| {
            p.message_template = owned
        })
    }

    /// Parses `value` for the field named `key` and stores it.
    pub fn set_by_key(&self, key: &str, value: &str) -> Result<()> {
        match key {
            KEY_FILTER_UNKNOWN => self.set_filter_unknown_enabled(parse_bool(key, value)?),
            KEY_SPAM_DB => self.set_spam_db_enabled(parse_bool(key, value)?),
            KEY_AUTO_MESSAGE => self.set_auto_message_enabled(parse_bool(key, value)?),
            KEY_CONFIRMATION_MODE => {
                self.set_confirmation_mode_enabled(parse_bool(key, value)?)
            }
            KEY_COOLDOWN_HOURS => self.set_cooldown_hours(parse_u32(key, value)?),
            KEY_MESSAGE_TEMPLATE => self.set_message_template(value),
            other => Err(CallguardError::ConfigError {
                reason: format!(
                    "unknown setting '{other}' (expected one of: {})",
                    ALL_KEYS.join(", ")
                ),
            }),
        }
    }

    /// Replaces the whole policy in one atomic write.
    pub fn replace(&self, policy: PolicyConfig) -> Result<()> {
        policy.validate()?;
        let values: Vec<(Vec<u8>, SettingValue)> = policy_fields(&policy)
            .into_iter()
            .map(|(key, value)| (key.as_bytes().to_vec(), SettingValue { value }))
            .collect();
        let _guard = self.lock_writes()?;
        self.tree
            .insert_all(values.iter().map(|(key, value)| (key.clone(), value)))?;
        self.cell.send_replace(policy);
        tracing::info!("screening policy replaced");
        Ok(())
    }

    /// Restores every field to its default.
    pub fn reset(&self) -> Result<()> {
        self.replace(PolicyConfig::default())
    }

    fn write_field<F>(&self, key: &str, value: String, apply: F) -> Result<()>
    where
        F: FnOnce(&mut PolicyConfig),
    {
        let _guard = self.lock_writes()?;
        self.tree.insert(key.as_bytes(), &SettingValue { value: value.clone() })?;
        self.cell.send_modify(apply);
        tracing::debug!(key, value = %value, "setting updated");
        Ok(())
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| CallguardError::StorageError {
                reason: "settings write lock poisoned".into(),
            })
    }
}

impl PolicySource for SettingsStore {
    fn policy(&self) -> PolicyConfig {
        self.current()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_policy(tree: &TypedTree<SettingValue>) -> Result<PolicyConfig> {
    let defaults = PolicyConfig::default();
    let get = |key: &str| -> Result<Option<String>> {
        Ok(tree.get(key.as_bytes())?.map(|sv| sv.value))
    };

    Ok(PolicyConfig {
        filter_unknown_enabled: match get(KEY_FILTER_UNKNOWN)? {
            Some(v) => parse_bool(KEY_FILTER_UNKNOWN, &v)?,
            None => defaults.filter_unknown_enabled,
        },
        spam_db_enabled: match get(KEY_SPAM_DB)? {
            Some(v) => parse_bool(KEY_SPAM_DB, &v)?,
            None => defaults.spam_db_enabled,
        },
        auto_message_enabled: match get(KEY_AUTO_MESSAGE)? {
            Some(v) => parse_bool(KEY_AUTO_MESSAGE, &v)?,
            None => defaults.auto_message_enabled,
        },
        confirmation_mode_enabled: match get(KEY_CONFIRMATION_MODE)? {
            Some(v) => parse_bool(KEY_CONFIRMATION_MODE, &v)?,
            None => defaults.confirmation_mode_enabled,
        },
        cooldown_hours: match get(KEY_COOLDOWN_HOURS)? {
            Some(v) => parse_u32(KEY_COOLDOWN_HOURS, &v)?,
            None => defaults.cooldown_hours,
        },
        message_template: get(KEY_MESSAGE_TEMPLATE)?.unwrap_or(defaults.message_template),
    })
}

fn policy_fields(policy: &PolicyConfig) -> [(&'static str, String); 6] {
    [
        (KEY_FILTER_UNKNOWN, policy.filter_unknown_enabled.to_string()),
        (KEY_SPAM_DB, policy.spam_db_enabled.to_string()),
        (KEY_AUTO_MESSAGE, policy.auto_message_enabled.to_string()),
        (KEY_CONFIRMATION_MODE, policy.confirmation_mode_enabled.to_string()),
        (KEY_COOLDOWN_HOURS, policy.cooldown_hours.to_string()),
        (KEY_MESSAGE_TEMPLATE, policy.message_template.clone()),
    ]
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(CallguardError::ConfigError {
            reason: format!("invalid {key} setting: expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| CallguardError::ConfigError {
            reason: format!("invalid {key} setting: {e}"),
        })
}
