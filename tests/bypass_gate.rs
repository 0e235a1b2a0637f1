use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn run_stopgate(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_stopgate"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run stopgate")
}

fn setup_store_with_blocking_item() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("tmpdir");
    let dir = tmp.path().to_path_buf();
    let out = run_stopgate(&dir, &["init"]);
    assert!(
        out.status.success(),
        "stopgate init failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    // A bugfix in EXEC with no verification at all: blocks without a bypass.
    let conn =
        Connection::open(dir.join(".stopgate").join("data").join("planning.db")).expect("open db");
    conn.execute(
        "INSERT INTO work_items(id, key, item_type, category, status, current_phase, updated_at)
         VALUES('id-1', 'BUG-9', 'bugfix', NULL, 'in_progress', 'EXEC', '2025-06-01T00:00:00Z')",
        [],
    )
    .expect("insert item");
    (tmp, dir)
}

fn bypass_path(dir: &Path) -> PathBuf {
    dir.join(".stopgate").join("bypass.json")
}

fn write_bypass(dir: &Path, explanation: &str, retrospective_committed: bool) {
    let record = serde_json::json!({
        "work_item_key": "BUG-9",
        "explanation": explanation,
        "retrospective_committed": retrospective_committed,
        "retrospective_id": "RETRO-12",
        "skipped_agents": ["RCA", "REGRESSION", "TESTING"],
    });
    std::fs::write(bypass_path(dir), serde_json::to_string(&record).unwrap()).expect("write");
}

fn audit_events(dir: &Path, event_type: &str) -> usize {
    let conn =
        Connection::open(dir.join(".stopgate").join("data").join("planning.db")).expect("open db");
    conn.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE event_type = ?1",
        params![event_type],
        |row| row.get::<_, i64>(0),
    )
    .expect("count") as usize
}

#[test]
fn short_explanation_blocks_with_length_reason_and_artifact_survives() {
    let (_tmp, dir) = setup_store_with_blocking_item();
    write_bypass(&dir, &"x".repeat(49), true);

    let out = run_stopgate(&dir, &["check", "--work-item", "BUG-9"]);
    assert_eq!(out.status.code(), Some(2));
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert!(doc["reason"].as_str().unwrap().contains("at least 50"));
    assert_eq!(doc["details"]["failed_precondition"], "explanation_length");
    // The rejected artifact stays at the well-known path so the operator can
    // see the rejection and lengthen the explanation in place.
    assert!(bypass_path(&dir).exists());
    assert_eq!(audit_events(&dir, "bypass_used"), 0);

    // Fixing the file in place makes the next run succeed.
    write_bypass(&dir, &"x".repeat(50), true);
    let fixed = run_stopgate(&dir, &["check", "--work-item", "BUG-9"]);
    assert!(fixed.status.success());
    assert!(!bypass_path(&dir).exists());
    assert_eq!(audit_events(&dir, "bypass_used"), 1);
}

#[test]
fn valid_bypass_allows_once_and_writes_one_audit_entry() {
    let (_tmp, dir) = setup_store_with_blocking_item();
    write_bypass(&dir, &"x".repeat(50), true);

    let out = run_stopgate(&dir, &["check", "--work-item", "BUG-9", "--format", "json"]);
    assert!(
        out.status.success(),
        "expected allow: {}",
        String::from_utf8_lossy(&out.stdout)
    );
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(doc["decision"], "allow");
    assert!(!bypass_path(&dir).exists());
    assert_eq!(audit_events(&dir, "bypass_used"), 1);

    // Second invocation without a fresh artifact falls through to normal
    // evaluation, which blocks this item.
    let second = run_stopgate(&dir, &["check", "--work-item", "BUG-9"]);
    assert_eq!(second.status.code(), Some(2));
    assert_eq!(audit_events(&dir, "bypass_used"), 1);
}

#[test]
fn uncommitted_retrospective_blocks_with_specific_reason() {
    let (_tmp, dir) = setup_store_with_blocking_item();
    write_bypass(&dir, &"x".repeat(80), false);

    let out = run_stopgate(&dir, &["check", "--work-item", "BUG-9"]);
    assert_eq!(out.status.code(), Some(2));
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert!(
        doc["reason"]
            .as_str()
            .unwrap()
            .contains("retrospective_committed")
    );
    assert!(bypass_path(&dir).exists());
}

#[test]
fn malformed_artifact_blocks_with_parse_reason() {
    let (_tmp, dir) = setup_store_with_blocking_item();
    std::fs::write(bypass_path(&dir), "{ definitely not json").expect("write");

    let out = run_stopgate(&dir, &["check", "--work-item", "BUG-9"]);
    assert_eq!(out.status.code(), Some(2));
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert!(doc["reason"].as_str().unwrap().contains("not valid JSON"));
    assert!(bypass_path(&dir).exists());
}
