//! Store contracts and external collaborator interfaces.
//!
//! The stores are synchronous key-indexed repositories (the embedded
//! database answers in microseconds). The directory, the message
//! transport and the spam feed are remote or platform services and are
//! therefore async and failable.

use async_trait::async_trait;

use crate::config::PolicyConfig;
use crate::{
    CallDecision, CallLogEntry, CanonicalNumber, ListEntry, ListKind, LogId, MessageLogEntry,
    MessageStatus, NewCallLogEntry, NewMessageLogEntry, Result, SpamEntry, SpamRecord,
    SpamStats, Timestamp,
};

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Allow/block membership keyed by canonical number.
pub trait ListRepository: Send + Sync {
    /// Returns the entry for `number`, whatever its kind.
    fn find(&self, number: &CanonicalNumber) -> Result<Option<ListEntry>>;

    /// Returns `true` if `number` is on the `kind` list.
    fn is_listed(&self, number: &CanonicalNumber, kind: ListKind) -> Result<bool> {
        Ok(self.find(number)?.map_or(false, |entry| entry.kind == kind))
    }

    /// Inserts or replaces the entry for `entry.number`.
    fn upsert(&self, entry: ListEntry) -> Result<()>;

    /// Removes the entry for `number`. Returns `true` if it existed.
    fn remove(&self, number: &CanonicalNumber) -> Result<bool>;

    /// Lists entries of one kind, or all entries when `kind` is `None`.
    fn list(&self, kind: Option<ListKind>) -> Result<Vec<ListEntry>>;
}

/// Spam verdicts keyed by canonical number.
pub trait SpamRepository: Send + Sync {
    fn lookup(&self, number: &CanonicalNumber) -> Result<Option<SpamEntry>>;

    /// Upserts one record (last writer wins).
    fn upsert(&self, record: SpamRecord, now: Timestamp) -> Result<()>;

    /// Upserts a whole feed atomically: either every record is
    /// written or none is.
    fn upsert_all(&self, records: Vec<SpamRecord>, now: Timestamp) -> Result<usize>;

    fn remove(&self, number: &CanonicalNumber) -> Result<bool>;

    /// Deletes every entry. Returns the number of entries removed.
    fn clear(&self) -> Result<usize>;

    fn stats(&self, top_tags: usize) -> Result<SpamStats>;
}

/// Append-only call history.
pub trait CallLogRepository: Send + Sync {
    /// Appends an entry and returns its monotonic id.
    fn append(&self, entry: NewCallLogEntry) -> Result<LogId>;

    fn get(&self, id: LogId) -> Result<Option<CallLogEntry>>;

    /// Most recent entries first.
    fn recent(&self, limit: usize) -> Result<Vec<CallLogEntry>>;

    fn by_number(&self, number: &CanonicalNumber) -> Result<Vec<CallLogEntry>>;

    fn by_decision(&self, decision: CallDecision) -> Result<Vec<CallLogEntry>>;

    /// Entries with `from <= timestamp < to`, oldest first.
    fn between(&self, from: Timestamp, to: Timestamp) -> Result<Vec<CallLogEntry>>;

    /// Counts entries at or after `since`, optionally of one decision.
    fn count_since(&self, since: Timestamp, decision: Option<CallDecision>) -> Result<u64>;

    /// Deletes entries strictly older than `cutoff`.
    fn delete_older_than(&self, cutoff: Timestamp) -> Result<usize>;

    fn count(&self) -> Result<u64>;
}

/// Append-only message history with one-way status updates.
pub trait MessageLogRepository: Send + Sync {
    /// Appends a `Pending` entry and returns its monotonic id.
    fn append_pending(&self, entry: NewMessageLogEntry) -> Result<LogId>;

    /// Moves an entry out of `Pending`. Fails if the transition is not
    /// allowed by [`MessageStatus::can_transition_to`].
    fn set_status(&self, id: LogId, status: MessageStatus) -> Result<()>;

    fn get(&self, id: LogId) -> Result<Option<MessageLogEntry>>;

    /// Timestamp of the most recent `Sent` message to `number`.
    fn last_sent_at(&self, number: &CanonicalNumber) -> Result<Option<Timestamp>>;

    /// Most recent entries first.
    fn recent(&self, limit: usize) -> Result<Vec<MessageLogEntry>>;

    /// Deletes entries strictly older than `cutoff`, whatever their
    /// status.
    fn delete_older_than(&self, cutoff: Timestamp) -> Result<usize>;
}

/// Point-in-time reader of the screening policy.
pub trait PolicySource: Send + Sync {
    /// Last known policy value. Never blocks.
    fn policy(&self) -> PolicyConfig;
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Contact directory of the device.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn is_known_contact(&self, number: &CanonicalNumber) -> Result<bool>;

    async fn display_name(&self, number: &CanonicalNumber) -> Result<Option<String>>;
}

/// Outbound message transport (SMS gateway).
///
/// Splitting long bodies into parts is the transport's concern.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, number: &CanonicalNumber, body: &str) -> Result<()>;
}

/// Source of spam knowledge base updates.
///
/// Implementations fetch, verify and parse; the records they return
/// are trusted.
#[async_trait]
pub trait SpamFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<SpamRecord>>;
}
