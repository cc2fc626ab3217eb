//! Config file support and node construction.
//!
//! The CLI can be configured through a JSON config file, global flags,
//! or both (flags override the file). Every field of the file is
//! optional.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use callguard_node::directory::StaticDirectory;
use callguard_node::feed::FileSpamFeed;
use callguard_node::node::{Collaborators, Node};
use callguard_node::transport::OutboxTransport;
use callguard_phone::PhoneNumberNormalizer;
use callguard_storage::StorageEngine;
use callguard_types::config::AppConfig;
use callguard_types::repository::SpamFeed;
use serde::Deserialize;

/// Database directory under the data directory.
pub const STORAGE_DIR: &str = "db";

/// Default outbox spool under the data directory.
pub const OUTBOX_FILE: &str = "outbox.jsonl";

// ---------------------------------------------------------------------------
// Config file (JSON)
// ---------------------------------------------------------------------------

/// JSON config file format.
///
/// Example `callguard.json`:
/// ```json
/// {
///   "data_dir": "/var/lib/callguard",
///   "contacts_path": "/var/lib/callguard/contacts.json",
///   "default_region": "FR",
///   "decision_timeout_ms": 2000,
///   "spam_feed_path": "/var/lib/callguard/feed.json",
///   "retention_days": 30
/// }
/// ```
///
/// Engine fields not present keep their [`AppConfig`] defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub data_dir: Option<String>,
    /// JSON array of `{number, name}` objects used as the contact
    /// directory.
    pub contacts_path: Option<String>,
    #[serde(flatten)]
    pub engine: AppConfig,
}

// ---------------------------------------------------------------------------
// Resolved config (all defaults applied)
// ---------------------------------------------------------------------------

/// Fully resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub contacts_path: Option<PathBuf>,
    pub engine: AppConfig,
}

impl ResolvedConfig {
    /// Reads `config_path` when given, then applies the `--data-dir`
    /// override.
    pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self, String> {
        let file = match config_path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        file.engine
            .validate()
            .map_err(|e| format!("invalid config: {e}"))?;

        Ok(Self {
            data_dir: data_dir
                .or_else(|| file.data_dir.map(PathBuf::from))
                .unwrap_or_else(default_data_dir),
            contacts_path: file.contacts_path.map(PathBuf::from),
            engine: file.engine,
        })
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_DIR)
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.engine
            .outbox_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir.join(OUTBOX_FILE))
    }

    /// Opens the database and wires a [`Node`] with the file-backed
    /// collaborators.
    pub fn open_node(&self) -> Result<Node, String> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| format!("failed to create data directory: {e}"))?;

        let storage = StorageEngine::open(&self.storage_path())
            .map_err(|e| format!("failed to open storage: {e}"))?;

        let normalizer = Arc::new(PhoneNumberNormalizer::new(&self.engine.default_region));
        let directory = match &self.contacts_path {
            Some(path) => StaticDirectory::load(path, &normalizer)
                .map_err(|e| format!("failed to load contacts: {e}"))?,
            None => StaticDirectory::empty(),
        };
        let feed = self.engine.spam_feed_path.as_ref().map(|path| {
            Arc::new(FileSpamFeed::new(path, Arc::clone(&normalizer))) as Arc<dyn SpamFeed>
        });

        let collaborators = Collaborators {
            directory: Arc::new(directory),
            transport: Arc::new(OutboxTransport::new(self.outbox_path())),
            feed,
        };

        tracing::debug!(data_dir = %self.data_dir.display(), "opening node");
        Node::new(Arc::new(storage), self.engine.clone(), collaborators)
            .map_err(|e| format!("node creation failed: {e}"))
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read config file: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config JSON: {e}"))
}

/// Platform data directory, falling back to `./.callguard`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("callguard"))
        .unwrap_or_else(|| PathBuf::from(".callguard"))
}
