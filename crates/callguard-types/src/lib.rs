//! Core shared types for the callguard call-screening engine.
//!
//! This crate defines the entities persisted by the stores, the sum
//! types produced by the decision and messaging logic, the central
//! error enum, and the traits every collaborator implements. Other
//! crates depend on these definitions and never redefine them.

pub mod config;
pub mod repository;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CanonicalNumber
// ---------------------------------------------------------------------------

/// Normalized phone number used as the key of every store.
///
/// Either an E.164 string (`+33612345678`) when the raw input was a
/// valid number for the configured region, or a best-effort form
/// keeping only a leading `+` and digits.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CanonicalNumber(String);

impl CanonicalNumber {
    /// Wraps an already normalized number.
    ///
    /// Callers are expected to go through the phone normalizer; this
    /// constructor performs no validation.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key bytes used by the stores.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl AsRef<str> for CanonicalNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// LogId
// ---------------------------------------------------------------------------

/// Monotonic identifier assigned by a log store on append.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LogId(u64);

impl LogId {
    /// Creates a `LogId` from its raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Big-endian key bytes, so sled iteration order equals id order.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogId {
    type Err = CallguardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| CallguardError::ConfigError {
                reason: format!("invalid log id '{s}': {e}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// UTC instant with millisecond arithmetic helpers.
///
/// Every "now" used by the decision and eligibility logic is passed in
/// as a `Timestamp` so tests can pin the clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a `Timestamp` from milliseconds since the Unix epoch.
    ///
    /// Returns `None` if the value is outside chrono's range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Returns the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Milliseconds elapsed from `earlier` to `self` (negative if
    /// `earlier` is in the future).
    pub fn millis_since(&self, earlier: &Timestamp) -> i64 {
        self.as_millis().saturating_sub(earlier.as_millis())
    }

    /// Returns this instant shifted back by `hours`.
    pub fn minus_hours(&self, hours: i64) -> Self {
        Self(self.0 - Duration::hours(hours))
    }

    /// Returns this instant shifted back by `days`.
    pub fn minus_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Start of the UTC day containing this instant.
    pub fn start_of_day(&self) -> Self {
        let date = self.0.date_naive();
        match date.and_hms_opt(0, 0, 0) {
            Some(naive) => Self(Utc.from_utc_datetime(&naive)),
            None => *self,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = CallguardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CallguardError::ConfigError {
                reason: format!("invalid ISO 8601 timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }
}

// ---------------------------------------------------------------------------
// ListKind / ListEntry
// ---------------------------------------------------------------------------

/// Which user list a number belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    /// Always let the call through.
    Allow,
    /// Always block the call.
    Block,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Block => write!(f, "block"),
        }
    }
}

impl FromStr for ListKind {
    type Err = CallguardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "whitelist" => Ok(Self::Allow),
            "block" | "blacklist" => Ok(Self::Block),
            other => Err(CallguardError::ConfigError {
                reason: format!("unknown list kind '{other}' (expected allow or block)"),
            }),
        }
    }
}

/// A user decision about one number.
///
/// The normalized number is the unique key: adding a number to the
/// other list replaces its previous entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub number: CanonicalNumber,
    pub kind: ListKind,
    pub label: Option<String>,
    pub added_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Spam knowledge base
// ---------------------------------------------------------------------------

/// One record delivered by the spam feed, already integrity-checked.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpamRecord {
    pub number: CanonicalNumber,
    pub tag: String,
    pub score: u32,
    pub source: String,
    pub last_seen: Timestamp,
}

/// Stored spam verdict for a number.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpamEntry {
    pub number: CanonicalNumber,
    /// Category such as `robocall`, `telemarketing`, `scam`.
    pub tag: String,
    pub score: u32,
    pub source: String,
    pub last_seen: Timestamp,
    /// When this entry was last written by a sync or explicit update.
    pub updated_at: Timestamp,
}

impl SpamEntry {
    /// Builds the stored form of a feed record written at `now`.
    pub fn from_record(record: SpamRecord, now: Timestamp) -> Self {
        Self {
            number: record.number,
            tag: record.tag,
            score: record.score,
            source: record.source,
            last_seen: record.last_seen,
            updated_at: now,
        }
    }
}

/// Aggregate view of the spam knowledge base.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpamStats {
    pub total_entries: u64,
    pub last_updated: Option<Timestamp>,
    /// `(tag, count)` pairs, most frequent first.
    pub top_tags: Vec<(String, u64)>,
}

// ---------------------------------------------------------------------------
// Actions and decisions
// ---------------------------------------------------------------------------

/// What to do with an incoming call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Allow,
    Reject,
    RejectAsSpam { tag: String, score: u32 },
    Block,
}

impl Action {
    /// The persisted decision for this action.
    pub fn decision(&self) -> CallDecision {
        match self {
            Self::Allow => CallDecision::Allowed,
            Self::Reject => CallDecision::Rejected,
            Self::RejectAsSpam { .. } => CallDecision::RejectedSpam,
            Self::Block => CallDecision::Blocked,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Reject => write!(f, "reject"),
            Self::RejectAsSpam { tag, score } => write!(f, "reject-spam ({tag}, score {score})"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Decision column of a call log entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CallDecision {
    Allowed,
    Rejected,
    RejectedSpam,
    Blocked,
}

impl fmt::Display for CallDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "ALLOWED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::RejectedSpam => write!(f, "REJECTED_SPAM"),
            Self::Blocked => write!(f, "BLOCKED"),
        }
    }
}

impl FromStr for CallDecision {
    type Err = CallguardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ALLOWED" => Ok(Self::Allowed),
            "REJECTED" => Ok(Self::Rejected),
            "REJECTED_SPAM" | "SPAM" => Ok(Self::RejectedSpam),
            "BLOCKED" => Ok(Self::Blocked),
            other => Err(CallguardError::ConfigError {
                reason: format!("unknown call decision '{other}'"),
            }),
        }
    }
}

/// Why no follow-up message is sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Auto-messaging is turned off.
    Disabled,
    /// Hidden, emergency, or short-code number.
    Excluded,
    /// The number is not a mobile line.
    NonMobile,
    /// A message was sent to this number too recently.
    Cooldown,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Excluded => "excluded",
            Self::NonMobile => "non-mobile",
            Self::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether and how to send the identity-request message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MessageDecision {
    Send,
    /// The user must approve before the dispatcher is invoked.
    AskConfirmation,
    Skip { reason: SkipReason },
}

impl fmt::Display for MessageDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::AskConfirmation => write!(f, "ask-confirmation"),
            Self::Skip { reason } => write!(f, "skip ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// A call log entry before the store assigns its id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewCallLogEntry {
    pub raw_number: String,
    pub number: CanonicalNumber,
    pub timestamp: Timestamp,
    pub decision: CallDecision,
    pub reason: String,
    pub contact_name: Option<String>,
    pub spam_tag: Option<String>,
    pub spam_score: Option<u32>,
}

/// Immutable audit record of one screened call.
///
/// `spam_tag` and `spam_score` are set iff `decision` is
/// [`CallDecision::RejectedSpam`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub id: LogId,
    pub raw_number: String,
    pub number: CanonicalNumber,
    pub timestamp: Timestamp,
    pub decision: CallDecision,
    pub reason: String,
    pub contact_name: Option<String>,
    pub spam_tag: Option<String>,
    pub spam_score: Option<u32>,
}

impl CallLogEntry {
    /// Attaches a store-assigned id to a new entry.
    pub fn from_new(id: LogId, entry: NewCallLogEntry) -> Self {
        Self {
            id,
            raw_number: entry.raw_number,
            number: entry.number,
            timestamp: entry.timestamp,
            decision: entry.decision,
            reason: entry.reason,
            contact_name: entry.contact_name,
            spam_tag: entry.spam_tag,
            spam_score: entry.spam_score,
        }
    }
}

// ---------------------------------------------------------------------------
// Message log
// ---------------------------------------------------------------------------

/// Delivery state of an identity-request message.
///
/// `Pending` is the only non-terminal state. There is no delivered
/// state: the transport only reports acceptance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns `true` if a log entry may move from `self` to `next`.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sent) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Sent => write!(f, "SENT"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A message log entry before the store assigns its id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewMessageLogEntry {
    pub raw_number: String,
    pub number: CanonicalNumber,
    pub timestamp: Timestamp,
    pub template_used: String,
}

/// Audit record of one identity-request message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub id: LogId,
    pub raw_number: String,
    pub number: CanonicalNumber,
    pub timestamp: Timestamp,
    pub status: MessageStatus,
    pub template_used: String,
}

impl MessageLogEntry {
    /// Builds the initial `Pending` entry for a store-assigned id.
    pub fn pending(id: LogId, entry: NewMessageLogEntry) -> Self {
        Self {
            id,
            raw_number: entry.raw_number,
            number: entry.number,
            timestamp: entry.timestamp,
            status: MessageStatus::Pending,
            template_used: entry.template_used,
        }
    }
}

// ---------------------------------------------------------------------------
// CallguardError
// ---------------------------------------------------------------------------

/// Central error type for the callguard workspace.
///
/// All crates convert their internal errors into variants of this
/// enum.
#[derive(Debug, Error)]
pub enum CallguardError {
    /// A phone number could not be turned into a canonical key.
    #[error("invalid number: {reason}")]
    InvalidNumber {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// A storage or database operation failed.
    #[error("storage error: {reason}")]
    StorageError {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A directory (contacts) lookup failed.
    #[error("lookup error: {reason}")]
    LookupError {
        /// Human-readable description of the lookup failure.
        reason: String,
    },

    /// The message transport rejected or failed a send.
    #[error("transport error: {reason}")]
    TransportError {
        /// Human-readable description of the transport failure.
        reason: String,
    },

    /// Fetching, verifying or parsing the spam feed failed.
    #[error("sync error: {reason}")]
    SyncError {
        /// Human-readable description of the sync failure.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// An operation did not complete within its time bound.
    #[error("timed out: {reason}")]
    Timeout {
        /// What was being waited on.
        reason: String,
    },
}

/// Failure of a single identity-message dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The number could not be normalized; nothing was logged.
    #[error("cannot send to invalid number '{raw}'")]
    InvalidNumber { raw: String },

    /// The transport failed; the log entry is marked `Failed`.
    #[error("message {log_id} failed: {reason}")]
    TransportFailure { log_id: LogId, reason: String },

    /// The message log could not be written.
    #[error(transparent)]
    Storage(#[from] CallguardError),
}

impl DispatchError {
    /// The log entry created for this attempt, if any.
    pub fn log_id(&self) -> Option<LogId> {
        match self {
            Self::TransportFailure { log_id, .. } => Some(*log_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`CallguardError`].
pub type Result<T> = std::result::Result<T, CallguardError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> Timestamp {
        match Timestamp::from_millis(millis) {
            Some(t) => t,
            None => panic!("millis out of range"),
        }
    }

    #[test]
    fn action_maps_to_decision() {
        assert_eq!(Action::Allow.decision(), CallDecision::Allowed);
        assert_eq!(Action::Reject.decision(), CallDecision::Rejected);
        assert_eq!(
            Action::RejectAsSpam { tag: "scam".into(), score: 80 }.decision(),
            CallDecision::RejectedSpam
        );
        assert_eq!(Action::Block.decision(), CallDecision::Blocked);
    }

    #[test]
    fn skip_reason_codes() {
        assert_eq!(SkipReason::Disabled.as_str(), "disabled");
        assert_eq!(SkipReason::Excluded.as_str(), "excluded");
        assert_eq!(SkipReason::NonMobile.as_str(), "non-mobile");
        assert_eq!(SkipReason::Cooldown.as_str(), "cooldown");
    }

    #[test]
    fn message_status_transitions_are_one_way() {
        assert!(MessageStatus::Pending.can_transition_to(MessageStatus::Sent));
        assert!(MessageStatus::Pending.can_transition_to(MessageStatus::Failed));
        assert!(!MessageStatus::Sent.can_transition_to(MessageStatus::Pending));
        assert!(!MessageStatus::Failed.can_transition_to(MessageStatus::Sent));
        assert!(!MessageStatus::Pending.can_transition_to(MessageStatus::Pending));
        assert!(MessageStatus::Sent.is_terminal());
        assert!(!MessageStatus::Pending.is_terminal());
    }

    #[test]
    fn list_kind_parses_aliases() -> std::result::Result<(), Box<dyn std::error::Error>> {
        assert_eq!("allow".parse::<ListKind>()?, ListKind::Allow);
        assert_eq!("BLOCK".parse::<ListKind>()?, ListKind::Block);
        assert_eq!("blacklist".parse::<ListKind>()?, ListKind::Block);
        assert!("maybe".parse::<ListKind>().is_err());
        Ok(())
    }

    #[test]
    fn call_decision_display_and_parse() -> std::result::Result<(), Box<dyn std::error::Error>> {
        assert_eq!(CallDecision::RejectedSpam.to_string(), "REJECTED_SPAM");
        assert_eq!("rejected-spam".parse::<CallDecision>()?, CallDecision::RejectedSpam);
        assert_eq!("allowed".parse::<CallDecision>()?, CallDecision::Allowed);
        Ok(())
    }

    #[test]
    fn timestamp_millis_arithmetic() {
        let t0 = ts(1_700_000_000_000);
        let later = ts(1_700_000_000_000 + 86_400_000);
        assert_eq!(later.millis_since(&t0), 86_400_000);
        assert_eq!(t0.millis_since(&later), -86_400_000);
        assert_eq!(later.minus_days(1), t0);
        assert_eq!(later.minus_hours(24), t0);
    }

    #[test]
    fn timestamp_start_of_day() {
        // 2023-11-14T22:13:20Z
        let t = ts(1_700_000_000_000);
        let start = t.start_of_day();
        assert_eq!(start.as_millis() % 86_400_000, 0);
        assert!(start <= t);
    }

    #[test]
    fn timestamp_parses_rfc3339() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let ts = Timestamp::now();
        let parsed: Timestamp = ts.to_string().parse()?;
        assert_eq!(ts.as_datetime(), parsed.as_datetime());
        Ok(())
    }

    #[test]
    fn log_id_key_orders_like_value() {
        let a = LogId::new(9);
        let b = LogId::new(256);
        assert!(a.to_key() < b.to_key());
        assert_eq!(LogId::new(42).to_string(), "42");
    }

    #[test]
    fn entities_survive_bincode() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let entry = CallLogEntry {
            id: LogId::new(3),
            raw_number: "06 12 34 56 78".into(),
            number: CanonicalNumber::new("+33612345678"),
            timestamp: ts(1_700_000_000_000),
            decision: CallDecision::RejectedSpam,
            reason: "spam:robocall".into(),
            contact_name: None,
            spam_tag: Some("robocall".into()),
            spam_score: Some(90),
        };
        let bytes = bincode::serialize(&entry)?;
        let back: CallLogEntry = bincode::deserialize(&bytes)?;
        assert_eq!(entry, back);
        Ok(())
    }

    #[test]
    fn dispatch_error_exposes_log_id() {
        let err = DispatchError::TransportFailure {
            log_id: LogId::new(7),
            reason: "no signal".into(),
        };
        assert_eq!(err.log_id(), Some(LogId::new(7)));
        assert!(err.to_string().contains("no signal"));
        let invalid = DispatchError::InvalidNumber { raw: "".into() };
        assert_eq!(invalid.log_id(), None);
    }

    #[test]
    fn error_display() {
        let err = CallguardError::StorageError {
            reason: "disk full".into(),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
