//! Outbox message transport.
//!
//! Hosts without a radio hand messages to an outbox file: one JSON line
//! per message, with the body already split into SMS-sized parts. A
//! separate gateway process drains the file.

use std::path::PathBuf;

use async_trait::async_trait;
use callguard_types::repository::MessageTransport;
use callguard_types::{CallguardError, CanonicalNumber, Result, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Characters in a single-part message.
pub const SINGLE_PART_LEN: usize = 160;

/// Characters per part once a message is split; the rest of each part
/// carries the concatenation header.
pub const MULTI_PART_LEN: usize = 153;

/// Splits `body` into message parts by character count.
///
/// A body of up to [`SINGLE_PART_LEN`] characters is one part. Longer
/// bodies are cut every [`MULTI_PART_LEN`] characters. An empty body
/// yields no parts.
pub fn split_into_parts(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= SINGLE_PART_LEN {
        return vec![body.to_string()];
    }
    chars
        .chunks(MULTI_PART_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// One line of the outbox file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub number: CanonicalNumber,
    pub parts: Vec<String>,
    pub queued_at: Timestamp,
}

/// [`MessageTransport`] appending to a JSON-lines outbox file.
pub struct OutboxTransport {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl MessageTransport for OutboxTransport {
    async fn send(&self, number: &CanonicalNumber, body: &str) -> Result<()> {
        let parts = split_into_parts(body);
        if parts.is_empty() {
            return Err(CallguardError::TransportError {
                reason: "refusing to send an empty message".into(),
            });
        }
        let record = OutboxRecord {
            number: number.clone(),
            parts,
            queued_at: Timestamp::now(),
        };
        let mut line = serde_json::to_string(&record).map_err(|e| transport_err(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| transport_err(format!("cannot open outbox {}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| transport_err(format!("cannot write outbox: {e}")))?;
        file.flush()
            .await
            .map_err(|e| transport_err(format!("cannot flush outbox: {e}")))?;

        tracing::debug!(number = %number, parts = record.parts.len(), "message queued in outbox");
        Ok(())
    }
}

fn transport_err(reason: String) -> CallguardError {
    CallguardError::TransportError { reason }
}
