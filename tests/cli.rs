//! CLI smoke tests against a temporary vault.

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn notesync(vault: &Path) -> Command {
    let mut cmd = Command::cargo_bin("notesync").unwrap();
    cmd.arg("--vault")
        .arg(vault)
        .arg("--json")
        .arg("--quiet")
        .env_remove("NOTESYNC_SERVER_URL")
        .env_remove("NOTESYNC_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn init_vault() -> TempDir {
    let dir = TempDir::new().unwrap();
    notesync(dir.path())
        .args(["init", "--server-url", "https://sync.example.test"])
        .assert()
        .success();
    dir
}

#[test]
fn test_version_json() {
    let dir = TempDir::new().unwrap();
    let out = json_stdout(notesync(dir.path()).arg("version"));
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
    assert!(out["schema"].as_i64().unwrap() >= 1);
}

#[test]
fn test_init_creates_state() {
    let dir = TempDir::new().unwrap();
    let out = json_stdout(notesync(dir.path()).args(["init", "--server-url", "https://sync.example.test"]));

    assert_eq!(out["created"], true);
    assert_eq!(out["enabled"], false);
    assert_eq!(out["server_url"], "https://sync.example.test");
    assert!(!out["device_id"].as_str().unwrap().is_empty());
    assert!(dir.path().join(".notesync").is_dir());
    assert!(dir.path().join(".notesync/.gitignore").is_file());

    // Running again keeps the device id.
    let again = json_stdout(notesync(dir.path()).arg("init"));
    assert_eq!(again["created"], false);
    assert_eq!(again["device_id"], out["device_id"]);
}

#[test]
fn test_status_on_fresh_vault() {
    let dir = init_vault();
    let out = json_stdout(notesync(dir.path()).arg("status"));

    assert_eq!(out["state"], "idle");
    assert_eq!(out["pending_changes"], 0);
    assert_eq!(out["conflicts"], 0);
    assert_eq!(out["cursor"], 0);
    assert!(out["last_sync_at"].is_null());
}

#[test]
fn test_queue_then_pending() {
    let dir = init_vault();
    let note_file = dir.path().join("draft.json");
    std::fs::write(
        &note_file,
        r#"{"id":"note-1","title":"Draft","content":{"text":"hello"},"created_at":1,"updated_at":2}"#,
    )
    .unwrap();

    let queued = json_stdout(notesync(dir.path()).arg("queue").arg(&note_file));
    assert_eq!(queued["note_id"], "note-1");
    assert_eq!(queued["operation"], "create");
    assert!(dir.path().join("notes").read_dir().unwrap().next().is_some());

    let pending = json_stdout(notesync(dir.path()).arg("pending"));
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["changes"][0]["note_id"], "note-1");

    // A delete replaces the queued create.
    let deleted = json_stdout(notesync(dir.path()).arg("queue").arg(&note_file).arg("--delete"));
    assert_eq!(deleted["operation"], "delete");
    let pending = json_stdout(notesync(dir.path()).arg("pending"));
    assert_eq!(pending["count"], 1);

    let events = json_stdout(notesync(dir.path()).args(["events", "--note", "note-1"]));
    assert!(events.as_array().unwrap().len() >= 2);
}

#[test]
fn test_conflicts_empty() {
    let dir = init_vault();
    let out = json_stdout(notesync(dir.path()).arg("conflicts"));
    assert_eq!(out["count"], 0);
    assert!(out["conflicts"].as_array().unwrap().is_empty());
}

#[test]
fn test_resolve_unknown_conflict_exit_code() {
    let dir = init_vault();
    let output = notesync(dir.path())
        .args(["resolve", "missing-note", "keep-local"])
        .assert()
        .code(3)
        .get_output()
        .stderr
        .clone();

    let err: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(err["error"]["code"], "CONFLICT_NOT_FOUND");
}

#[test]
fn test_config_set_and_show() {
    let dir = init_vault();
    notesync(dir.path())
        .args(["config", "set", "sync_interval_ms", "5000"])
        .assert()
        .success();
    notesync(dir.path())
        .args(["config", "set", "enabled", "true"])
        .assert()
        .success();

    let out = json_stdout(notesync(dir.path()).args(["config", "show"]));
    assert_eq!(out["config"]["sync_interval_ms"], 5000);
    assert_eq!(out["config"]["enabled"], true);
    assert_eq!(out["api_key_set"], false);

    notesync(dir.path())
        .args(["config", "set", "colour", "blue"])
        .assert()
        .code(4);
}

#[test]
fn test_uninitialized_vault() {
    let dir = TempDir::new().unwrap();
    let output = notesync(dir.path())
        .arg("status")
        .assert()
        .code(2)
        .get_output()
        .stderr
        .clone();

    let err: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}
