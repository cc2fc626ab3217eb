//! CLI integration tests.
//!
//! Each test runs the built binary against its own temporary data
//! directory.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

const MOBILE: &str = "06 12 34 56 78";
const CONTACT: &str = "06 98 76 54 32";

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_dir() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "callguard-cli-test-{}-{}",
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Runs the binary and returns (exit_code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_callguard"))
        .args(args)
        .env("RUST_LOG", "off")
        .output();

    match output {
        Ok(o) => {
            let code = o.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&o.stdout).to_string();
            let stderr = String::from_utf8_lossy(&o.stderr).to_string();
            (code, stdout, stderr)
        }
        Err(e) => {
            eprintln!("WARNING: could not run binary: {e}");
            (-1, String::new(), e.to_string())
        }
    }
}

/// Runs a command against `dir` and returns (exit_code, stdout, stderr).
fn run_in(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let dir = dir.to_string_lossy().to_string();
    let mut full = vec!["--data-dir", dir.as_str()];
    full.extend_from_slice(args);
    run_cli(&full)
}

/// Runs a `--json` command that must succeed and parses its stdout.
fn json_in(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let (code, stdout, stderr) = run_in(dir, &full);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("invalid JSON from {args:?}: {e}: {stdout}"))
}

// -----------------------------------------------------------------------
// Clap parsing
// -----------------------------------------------------------------------

#[test]
fn help_flag_exits_zero() {
    let (code, stdout, _) = run_cli(&["--help"]);
    assert_eq!(code, 0, "--help should exit 0");
    assert!(stdout.contains("screen"), "help should list commands");
}

#[test]
fn version_flag_exits_zero() {
    let (code, stdout, _) = run_cli(&["--version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("callguard"), "version should print program name");
}

#[test]
fn unknown_command_fails() {
    let (code, _, stderr) = run_cli(&["nonexistent"]);
    assert_ne!(code, 0);
    assert!(
        stderr.contains("error") || stderr.contains("unrecognized"),
        "stderr should indicate error: {stderr}"
    );
}

#[test]
fn list_add_missing_args_fails() {
    let (code, _, stderr) = run_cli(&["list", "add"]);
    assert_ne!(code, 0);
    assert!(!stderr.is_empty());
}

#[test]
fn list_add_rejects_unknown_kind() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["list", "add", "greylist", MOBILE]);
    assert_ne!(code, 0);
    assert!(stderr.contains("greylist"), "{stderr}");
}

// -----------------------------------------------------------------------
// Screening
// -----------------------------------------------------------------------

#[test]
fn unknown_caller_is_rejected_with_defaults() {
    let dir = temp_dir();
    let outcome = json_in(&dir, &["screen", MOBILE]);
    assert_eq!(outcome["action"], "Reject");
    assert_eq!(outcome["fail_open"], false);
    assert_eq!(outcome["follow_up"], "skipped");
    assert_eq!(outcome["reason"], "Disabled");
    assert!(outcome["log_id"].is_u64());
}

#[test]
fn withheld_number_is_allowed_without_record() {
    let dir = temp_dir();
    let outcome = json_in(&dir, &["screen"]);
    assert_eq!(outcome["action"], "Allow");
    assert!(outcome["log_id"].is_null());

    let calls = json_in(&dir, &["history", "calls"]);
    assert_eq!(calls.as_array().map(Vec::len), Some(0));
}

#[test]
fn block_list_wins_and_is_recorded() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["list", "add", "block", MOBILE, "--label", "pest"]);
    assert_eq!(code, 0, "{stderr}");

    let outcome = json_in(&dir, &["screen", MOBILE]);
    assert_eq!(outcome["action"], "Block");
    assert_eq!(outcome["follow_up"], "none");

    let calls = json_in(&dir, &["history", "calls"]);
    let first = &calls[0];
    assert_eq!(first["decision"], "Blocked");
    assert_eq!(first["reason"], "blocklist");
}

#[test]
fn moving_a_number_to_allow_list_replaces_block() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["list", "add", "block", MOBILE]).0, 0);
    assert_eq!(run_in(&dir, &["list", "add", "allow", MOBILE]).0, 0);

    let entries = json_in(&dir, &["list", "show"]);
    let entries = entries.as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["list"], "allow");

    let outcome = json_in(&dir, &["screen", MOBILE]);
    assert_eq!(outcome["action"], "Allow");
}

#[test]
fn list_remove_of_unlisted_number_fails() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["--json", "list", "remove", MOBILE]);
    assert_eq!(code, 1);
    let err: serde_json::Value = serde_json::from_str(stderr.trim()).expect("JSON error");
    assert!(err["error"].as_str().unwrap_or_default().contains("not on any list"));
}

#[test]
fn spam_entry_rejects_as_spam() {
    let dir = temp_dir();
    let (code, _, stderr) =
        run_in(&dir, &["spam", "add", "+33600000000", "--tag", "robocall", "--score", "90"]);
    assert_eq!(code, 0, "{stderr}");

    let outcome = json_in(&dir, &["screen", "+33600000000"]);
    assert_eq!(outcome["action"]["RejectAsSpam"]["tag"], "robocall");
    assert_eq!(outcome["action"]["RejectAsSpam"]["score"], 90);
    assert_eq!(outcome["follow_up"], "none");

    let stats = json_in(&dir, &["spam", "stats"]);
    assert_eq!(stats["total_entries"], 1);
}

#[test]
fn spam_clear_requires_confirmation() {
    let dir = temp_dir();
    let (code, _, _) = run_in(&dir, &["spam", "clear"]);
    assert_ne!(code, 0);
    let (code, _, stderr) = run_in(&dir, &["spam", "clear", "--yes"]);
    assert_eq!(code, 0, "{stderr}");
}

#[test]
fn contact_from_config_file_is_allowed() {
    let dir = temp_dir();
    let contacts = dir.join("contacts.json");
    std::fs::write(
        &contacts,
        format!(r#"[{{"number": "{CONTACT}", "name": "Alice"}}]"#),
    )
    .expect("write contacts");
    let config = dir.join("callguard.json");
    std::fs::write(
        &config,
        serde_json::json!({ "contacts_path": contacts.to_string_lossy() }).to_string(),
    )
    .expect("write config");
    let config = config.to_string_lossy().to_string();

    let outcome = json_in(&dir, &["--config", config.as_str(), "screen", CONTACT]);
    assert_eq!(outcome["action"], "Allow");

    let calls = json_in(&dir, &["--config", config.as_str(), "history", "calls"]);
    assert_eq!(calls[0]["reason"], "contact");
    assert_eq!(calls[0]["contact_name"], "Alice");
}

// -----------------------------------------------------------------------
// Settings and messaging
// -----------------------------------------------------------------------

#[test]
fn settings_set_then_show() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["settings", "set", "cooldown_hours", "12"]);
    assert_eq!(code, 0, "{stderr}");

    let policy = json_in(&dir, &["settings", "show"]);
    assert_eq!(policy["cooldown_hours"], 12);
    assert_eq!(policy["filter_unknown_enabled"], true);
}

#[test]
fn settings_set_unknown_key_fails() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["settings", "set", "volume", "11"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown setting"), "{stderr}");
}

#[test]
fn filter_off_allows_unknown_callers() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["settings", "set", "filter_unknown_enabled", "false"]).0, 0);

    let outcome = json_in(&dir, &["screen", MOBILE]);
    assert_eq!(outcome["action"], "Allow");
    let calls = json_in(&dir, &["history", "calls"]);
    assert_eq!(calls[0]["reason"], "unfiltered");
}

#[test]
fn auto_message_without_confirmation_lands_in_outbox() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["settings", "set", "auto_message_enabled", "true"]).0, 0);
    assert_eq!(
        run_in(&dir, &["settings", "set", "confirmation_mode_enabled", "false"]).0,
        0
    );

    let outcome = json_in(&dir, &["screen", MOBILE]);
    assert_eq!(outcome["action"], "Reject");
    assert_eq!(outcome["follow_up"], "sent");

    let outbox = std::fs::read_to_string(dir.join("outbox.jsonl")).expect("outbox written");
    let line: serde_json::Value =
        serde_json::from_str(outbox.lines().next().unwrap_or_default()).expect("outbox JSON");
    assert_eq!(line["number"], "+33612345678");

    let messages = json_in(&dir, &["history", "messages"]);
    assert_eq!(messages[0]["status"], "Sent");

    // The cooldown now holds the next message back.
    let check = json_in(&dir, &["message", "check", MOBILE]);
    assert_eq!(check["decision"]["Skip"]["reason"], "Cooldown");
}

#[test]
fn confirmation_mode_waits_for_message_send() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["settings", "set", "auto_message_enabled", "true"]).0, 0);

    let outcome = json_in(&dir, &["screen", MOBILE]);
    assert_eq!(outcome["follow_up"], "awaiting_confirmation");
    assert!(!dir.join("outbox.jsonl").exists());

    let (code, _, stderr) = run_in(&dir, &["message", "send", MOBILE]);
    assert_eq!(code, 0, "{stderr}");
    assert!(dir.join("outbox.jsonl").exists());
}

#[test]
fn message_send_refuses_landline_without_force() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["settings", "set", "auto_message_enabled", "true"]).0, 0);

    let (code, _, stderr) = run_in(&dir, &["message", "send", "01 62 00 00 01"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("non-mobile"), "{stderr}");
}

#[test]
fn resend_of_unknown_message_fails() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["message", "resend", "42"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"), "{stderr}");
}

// -----------------------------------------------------------------------
// Housekeeping
// -----------------------------------------------------------------------

#[test]
fn stats_counts_screened_calls() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["screen", MOBILE]).0, 0);
    assert_eq!(run_in(&dir, &["list", "add", "allow", CONTACT]).0, 0);

    let stats = json_in(&dir, &["stats"]);
    assert_eq!(stats["calls_total"], 1);
    assert_eq!(stats["rejected_today"], 1);
    assert_eq!(stats["allow_list"], 1);
}

#[test]
fn maintenance_keeps_recent_history() {
    let dir = temp_dir();
    assert_eq!(run_in(&dir, &["screen", MOBILE]).0, 0);

    let report = json_in(&dir, &["maintenance"]);
    assert_eq!(report["flushed"], true);
    assert_eq!(report["calls_pruned"], 0);
}

#[test]
fn spam_sync_without_feed_fails() {
    let dir = temp_dir();
    let (code, _, stderr) = run_in(&dir, &["spam", "sync"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no spam feed"), "{stderr}");
}
