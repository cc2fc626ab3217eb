//! Integration tests for the sled-backed stores.
//!
//! All tests are deterministic. Timestamps are injected; most tests run
//! against a temporary in-memory database.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{TimeZone, Utc};

use callguard_storage::settings::{KEY_COOLDOWN_HOURS, KEY_MESSAGE_TEMPLATE};
use callguard_storage::StorageEngine;
use callguard_types::repository::{
    CallLogRepository, ListRepository, MessageLogRepository, PolicySource, SpamRepository,
};
use callguard_types::{
    CallDecision, CanonicalNumber, ListEntry, ListKind, MessageStatus, NewCallLogEntry,
    NewMessageLogEntry, SpamRecord, Timestamp,
};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns a unique temporary directory for each test.
fn temp_dir() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "callguard-store-test-{}-{}-{}",
        std::process::id(),
        id,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    ));
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn base_time() -> Timestamp {
    Timestamp::from_datetime(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap())
}

fn at_offset_hours(hours: i64) -> Timestamp {
    Timestamp::from_millis(base_time().as_millis() + hours * 3_600_000).unwrap()
}

fn num(s: &str) -> CanonicalNumber {
    CanonicalNumber::new(s)
}

fn list_entry(number: &str, kind: ListKind) -> ListEntry {
    ListEntry {
        number: num(number),
        kind,
        label: None,
        added_at: base_time(),
    }
}

fn spam(number: &str, tag: &str, score: u32) -> SpamRecord {
    SpamRecord {
        number: num(number),
        tag: tag.into(),
        score,
        source: "test-feed".into(),
        last_seen: base_time(),
    }
}

fn call(number: &str, decision: CallDecision, ts: Timestamp) -> NewCallLogEntry {
    NewCallLogEntry {
        raw_number: number.into(),
        number: num(number),
        timestamp: ts,
        decision,
        reason: "unknown".into(),
        contact_name: None,
        spam_tag: None,
        spam_score: None,
    }
}

fn message(number: &str, ts: Timestamp) -> NewMessageLogEntry {
    NewMessageLogEntry {
        raw_number: number.into(),
        number: num(number),
        timestamp: ts,
        template_used: "hello".into(),
    }
}

// ===========================================================================
// Lists
// ===========================================================================

#[test]
fn list_upsert_is_idempotent() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let lists = engine.lists()?;

    lists.upsert(list_entry("+33611111111", ListKind::Block))?;
    lists.upsert(list_entry("+33611111111", ListKind::Block))?;

    assert_eq!(lists.list(Some(ListKind::Block))?.len(), 1);
    assert!(lists.is_listed(&num("+33611111111"), ListKind::Block)?);
    assert!(!lists.is_listed(&num("+33611111111"), ListKind::Allow)?);
    Ok(())
}

#[test]
fn list_readd_moves_between_kinds() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let lists = engine.lists()?;

    lists.upsert(list_entry("+33622222222", ListKind::Allow))?;
    let mut moved = list_entry("+33622222222", ListKind::Block);
    moved.label = Some("pushy seller".into());
    lists.upsert(moved)?;

    let found = lists.find(&num("+33622222222"))?.ok_or("missing entry")?;
    assert_eq!(found.kind, ListKind::Block);
    assert_eq!(found.label.as_deref(), Some("pushy seller"));
    assert_eq!(lists.count(ListKind::Allow)?, 0);
    assert_eq!(lists.count(ListKind::Block)?, 1);
    Ok(())
}

#[test]
fn list_remove_reports_presence() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let lists = engine.lists()?;

    lists.upsert(list_entry("+33633333333", ListKind::Allow))?;
    assert!(lists.remove(&num("+33633333333"))?);
    assert!(!lists.remove(&num("+33633333333"))?);
    assert!(lists.find(&num("+33633333333"))?.is_none());
    Ok(())
}

// ===========================================================================
// Spam knowledge base
// ===========================================================================

#[test]
fn spam_upsert_last_writer_wins() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let store = engine.spam()?;

    store.upsert(spam("+33600000000", "robocall", 90), base_time())?;
    store.upsert(spam("+33600000000", "scam", 95), at_offset_hours(1))?;

    let entry = store.lookup(&num("+33600000000"))?.ok_or("missing entry")?;
    assert_eq!(entry.tag, "scam");
    assert_eq!(entry.score, 95);
    assert_eq!(entry.updated_at, at_offset_hours(1));
    Ok(())
}

#[test]
fn spam_upsert_all_writes_every_record() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let store = engine.spam()?;

    let written = store.upsert_all(
        vec![
            spam("+33600000001", "robocall", 90),
            spam("+33600000002", "telemarketing", 40),
            spam("+33600000003", "robocall", 70),
        ],
        base_time(),
    )?;
    assert_eq!(written, 3);
    assert_eq!(store.len(), 3);
    Ok(())
}

#[test]
fn spam_stats_and_clear() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let store = engine.spam()?;

    store.upsert_all(
        vec![
            spam("+33600000001", "robocall", 90),
            spam("+33600000002", "telemarketing", 40),
            spam("+33600000003", "robocall", 70),
        ],
        base_time(),
    )?;
    store.upsert(spam("+33600000004", "scam", 99), at_offset_hours(2))?;

    let stats = store.stats(2)?;
    assert_eq!(stats.total_entries, 4);
    assert_eq!(stats.last_updated, Some(at_offset_hours(2)));
    assert_eq!(stats.top_tags.len(), 2);
    assert_eq!(stats.top_tags[0], ("robocall".to_string(), 2));

    assert_eq!(store.clear()?, 4);
    assert!(store.is_empty());
    assert_eq!(store.stats(5)?.last_updated, None);
    Ok(())
}

// ===========================================================================
// Call log
// ===========================================================================

#[test]
fn call_log_ids_are_monotonic() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.call_log()?;

    let a = log.append(call("+33611111111", CallDecision::Allowed, base_time()))?;
    let b = log.append(call("+33622222222", CallDecision::Rejected, base_time()))?;
    assert!(b > a);

    let stored = log.get(a)?.ok_or("missing entry")?;
    assert_eq!(stored.id, a);
    assert_eq!(stored.decision, CallDecision::Allowed);
    Ok(())
}

#[test]
fn call_log_queries() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.call_log()?;

    log.append(call("+33611111111", CallDecision::Allowed, at_offset_hours(0)))?;
    log.append(call("+33622222222", CallDecision::Rejected, at_offset_hours(1)))?;
    log.append(call("+33622222222", CallDecision::Blocked, at_offset_hours(2)))?;
    log.append(call("+33633333333", CallDecision::Rejected, at_offset_hours(3)))?;

    let recent = log.recent(2)?;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].number, num("+33633333333"));

    assert_eq!(log.by_number(&num("+33622222222"))?.len(), 2);
    assert_eq!(log.by_decision(CallDecision::Rejected)?.len(), 2);

    let window = log.between(at_offset_hours(1), at_offset_hours(3))?;
    assert_eq!(window.len(), 2);
    assert!(window[0].timestamp <= window[1].timestamp);

    assert_eq!(log.count_since(at_offset_hours(1), None)?, 3);
    assert_eq!(
        log.count_since(at_offset_hours(1), Some(CallDecision::Rejected))?,
        2
    );
    assert_eq!(log.count()?, 4);
    Ok(())
}

#[test]
fn call_log_retention() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.call_log()?;

    log.append(call("+33611111111", CallDecision::Allowed, at_offset_hours(-48)))?;
    log.append(call("+33611111111", CallDecision::Allowed, at_offset_hours(-1)))?;

    assert_eq!(log.delete_older_than(at_offset_hours(-24))?, 1);
    assert_eq!(log.count()?, 1);
    Ok(())
}

// ===========================================================================
// Message log
// ===========================================================================

#[test]
fn message_status_moves_once() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.message_log()?;

    let id = log.append_pending(message("+33611111111", base_time()))?;
    assert_eq!(log.get(id)?.ok_or("missing")?.status, MessageStatus::Pending);

    log.set_status(id, MessageStatus::Sent)?;
    assert_eq!(log.get(id)?.ok_or("missing")?.status, MessageStatus::Sent);

    // Terminal states never move again.
    assert!(log.set_status(id, MessageStatus::Failed).is_err());
    assert!(log.set_status(id, MessageStatus::Pending).is_err());
    assert_eq!(log.get(id)?.ok_or("missing")?.status, MessageStatus::Sent);
    Ok(())
}

#[test]
fn message_status_on_unknown_id_fails() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.message_log()?;
    assert!(log
        .set_status(callguard_types::LogId::new(999_999), MessageStatus::Sent)
        .is_err());
    Ok(())
}

#[test]
fn last_sent_ignores_failed_and_other_numbers() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.message_log()?;

    let sent = log.append_pending(message("+33611111111", at_offset_hours(0)))?;
    log.set_status(sent, MessageStatus::Sent)?;
    let failed = log.append_pending(message("+33611111111", at_offset_hours(5)))?;
    log.set_status(failed, MessageStatus::Failed)?;
    let other = log.append_pending(message("+33699999999", at_offset_hours(6)))?;
    log.set_status(other, MessageStatus::Sent)?;

    assert_eq!(
        log.last_sent_at(&num("+33611111111"))?,
        Some(at_offset_hours(0))
    );
    assert_eq!(log.last_sent_at(&num("+33600000000"))?, None);
    assert_eq!(log.by_number(&num("+33611111111"))?.len(), 2);
    Ok(())
}

#[test]
fn message_retention_prunes_stale_pending() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let log = engine.message_log()?;

    let old_sent = log.append_pending(message("+33611111111", at_offset_hours(-100)))?;
    log.set_status(old_sent, MessageStatus::Sent)?;
    let stale = log.append_pending(message("+33611111111", at_offset_hours(-100)))?;
    let fresh = log.append_pending(message("+33611111111", at_offset_hours(1)))?;

    assert_eq!(log.delete_older_than(at_offset_hours(0))?, 2);
    assert!(log.get(stale)?.is_none());
    let kept = log.recent(10)?;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, fresh);
    assert_eq!(kept[0].status, MessageStatus::Pending);
    Ok(())
}

// ===========================================================================
// Settings
// ===========================================================================

#[test]
fn settings_start_with_defaults() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let policy = engine.settings().current();
    assert!(policy.filter_unknown_enabled);
    assert!(policy.spam_db_enabled);
    assert!(!policy.auto_message_enabled);
    assert!(policy.confirmation_mode_enabled);
    assert_eq!(policy.cooldown_hours, 24);
    Ok(())
}

#[test]
fn settings_publish_to_subscribers() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let settings = engine.settings();
    let mut rx = settings.subscribe();

    settings.set_auto_message_enabled(true)?;

    assert!(rx.has_changed()?);
    assert!(rx.borrow_and_update().auto_message_enabled);
    assert!(settings.policy().auto_message_enabled);
    Ok(())
}

#[test]
fn settings_set_by_key_validates() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let settings = engine.settings();

    settings.set_by_key(KEY_COOLDOWN_HOURS, "12")?;
    assert_eq!(settings.current().cooldown_hours, 12);

    assert!(settings.set_by_key(KEY_COOLDOWN_HOURS, "soon").is_err());
    assert!(settings.set_by_key(KEY_MESSAGE_TEMPLATE, "  ").is_err());
    assert!(settings.set_by_key("volume", "11").is_err());
    assert_eq!(settings.current().cooldown_hours, 12);
    Ok(())
}

#[test]
fn settings_survive_reopen() -> TestResult {
    let dir = temp_dir();
    {
        let engine = StorageEngine::open(&dir)?;
        let settings = engine.settings();
        settings.set_filter_unknown_enabled(false)?;
        settings.set_message_template("Qui est-ce ?")?;
        engine.flush()?;
    }
    let engine = StorageEngine::open(&dir)?;
    let policy = engine.settings().current();
    assert!(!policy.filter_unknown_enabled);
    assert_eq!(policy.message_template, "Qui est-ce ?");

    drop(engine);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[test]
fn settings_replace_persists_every_field() -> TestResult {
    let dir = temp_dir();
    let replacement = callguard_types::config::PolicyConfig {
        filter_unknown_enabled: false,
        spam_db_enabled: false,
        auto_message_enabled: true,
        confirmation_mode_enabled: false,
        cooldown_hours: 6,
        message_template: "Bonjour, qui êtes-vous ?".into(),
    };
    {
        let engine = StorageEngine::open(&dir)?;
        engine.settings().replace(replacement.clone())?;
        assert_eq!(engine.settings().current(), replacement);
        engine.flush()?;
    }
    let engine = StorageEngine::open(&dir)?;
    assert_eq!(engine.settings().current(), replacement);

    drop(engine);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[test]
fn settings_replace_rejects_invalid_policy_without_writing() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let settings = engine.settings();
    let invalid = callguard_types::config::PolicyConfig {
        auto_message_enabled: true,
        message_template: "   ".into(),
        ..Default::default()
    };
    assert!(settings.replace(invalid).is_err());
    assert_eq!(settings.current(), callguard_types::config::PolicyConfig::default());
    Ok(())
}

#[test]
fn settings_reset_restores_defaults() -> TestResult {
    let engine = StorageEngine::temporary()?;
    let settings = engine.settings();
    settings.set_spam_db_enabled(false)?;
    settings.set_cooldown_hours(1)?;
    settings.reset()?;
    assert_eq!(settings.current(), callguard_types::config::PolicyConfig::default());
    Ok(())
}
