use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

fn run_stopgate(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> std::process::Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stopgate"));
    cmd.current_dir(dir).args(args);
    for (k, v) in envs {
        cmd.env(k, v);
    }
    cmd.output().expect("run stopgate")
}

fn setup_store() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("tmpdir");
    let dir = tmp.path().to_path_buf();
    let out = run_stopgate(&dir, &["init"], &[]);
    assert!(
        out.status.success(),
        "stopgate init failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    (tmp, dir)
}

fn open_db(dir: &Path) -> Connection {
    Connection::open(dir.join(".stopgate").join("data").join("planning.db")).expect("open db")
}

/// Epoch seconds `delta` in the past, in the store's compact `<secs>Z` form.
fn epoch_z_ago(delta_secs: u64) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_secs();
    format!("{}Z", secs - delta_secs)
}

fn insert_item(conn: &Connection, key: &str, item_type: &str, status: &str, phase: &str) {
    conn.execute(
        "INSERT INTO work_items(id, key, item_type, category, status, current_phase, updated_at)
         VALUES(?1, ?2, ?3, NULL, ?4, ?5, ?6)",
        params![format!("id-{}", key), key, item_type, status, phase, epoch_z_ago(0)],
    )
    .expect("insert item");
}

fn insert_handoff(conn: &Connection, id: &str, key: &str, transition: &str, at: &str) {
    conn.execute(
        "INSERT INTO phase_handoffs(id, work_item_key, transition_type, status, created_at)
         VALUES(?1, ?2, ?3, 'accepted', ?4)",
        params![id, key, transition, at],
    )
    .expect("insert handoff");
}

fn insert_execution(conn: &Connection, id: &str, key: &str, code: &str, verdict: &str, at: &str) {
    conn.execute(
        "INSERT INTO subagent_executions(id, work_item_key, sub_agent_code, verdict, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5)",
        params![id, key, code, verdict, at],
    )
    .expect("insert execution");
}

fn insert_merged_pr(conn: &Connection, key: &str) {
    conn.execute(
        "INSERT INTO deliverables(id, work_item_key, kind, state, merged)
         VALUES(?1, ?2, 'pull_request', 'completed', 1)",
        params![format!("pr-{}", key), key],
    )
    .expect("insert deliverable");
}

fn stdout_json(out: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}",
            e,
            String::from_utf8_lossy(&out.stdout)
        )
    })
}

#[test]
fn bugfix_with_all_passing_verification_allows() {
    let (_tmp, dir) = setup_store();
    let conn = open_db(&dir);
    insert_item(&conn, "BUG-1", "bugfix", "in_progress", "EXEC");
    insert_handoff(&conn, "h1", "BUG-1", "LEAD_TO_PLAN", &epoch_z_ago(10_000));
    insert_handoff(&conn, "h2", "BUG-1", "PLAN_TO_EXEC", &epoch_z_ago(9_000));
    // RCA ran during PLAN (stale but inside its window); the rest are fresh.
    insert_execution(&conn, "x1", "BUG-1", "RCA", "PASS", &epoch_z_ago(9_500));
    insert_execution(&conn, "x2", "BUG-1", "REGRESSION", "PASS", &epoch_z_ago(600));
    insert_execution(&conn, "x3", "BUG-1", "TESTING", "PASS", &epoch_z_ago(300));
    drop(conn);

    let out = run_stopgate(
        &dir,
        &["check", "--work-item", "BUG-1", "--format", "json"],
        &[],
    );
    assert!(
        out.status.success(),
        "expected allow: {}",
        String::from_utf8_lossy(&out.stdout)
    );
    let doc = stdout_json(&out);
    assert_eq!(doc["decision"], "allow");
    assert_eq!(doc["details"]["cache_hits"], 2);
}

#[test]
fn missing_required_verification_blocks_with_remediation() {
    let (_tmp, dir) = setup_store();
    let conn = open_db(&dir);
    insert_item(&conn, "BUG-2", "bugfix", "in_progress", "EXEC");
    insert_handoff(&conn, "h1", "BUG-2", "LEAD_TO_PLAN", &epoch_z_ago(10_000));
    insert_handoff(&conn, "h2", "BUG-2", "PLAN_TO_EXEC", &epoch_z_ago(9_000));
    insert_execution(&conn, "x1", "BUG-2", "TESTING", "PASS", &epoch_z_ago(300));
    drop(conn);

    let out = run_stopgate(&dir, &["check", "--work-item", "BUG-2"], &[]);
    assert_eq!(out.status.code(), Some(2));
    let doc = stdout_json(&out);
    assert_eq!(doc["decision"], "block");
    assert_eq!(doc["details"]["work_item_key"], "BUG-2");
    let missing: Vec<&str> = doc["details"]["missing_required"]
        .as_array()
        .expect("missing_required")
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(missing, vec!["RCA", "REGRESSION"]);
    let remediation = doc["remediation"].as_array().expect("remediation");
    // RCA sorts before REGRESSION in the remediation order.
    assert!(remediation[0].as_str().unwrap().contains("RCA"));
    assert!(
        remediation
            .iter()
            .any(|r| r.as_str().unwrap().contains("stopgate check"))
    );
}

#[test]
fn completed_item_missing_retrospective_allows_with_advisory() {
    let (_tmp, dir) = setup_store();
    let conn = open_db(&dir);
    insert_item(&conn, "BUG-3", "bugfix", "completed", "LEAD_FINAL");
    insert_merged_pr(&conn, "BUG-3");
    for (id, code) in [
        ("x1", "RCA"),
        ("x2", "REGRESSION"),
        ("x3", "TESTING"),
        ("x4", "RETROSPECTIVE"),
    ] {
        insert_execution(&conn, id, "BUG-3", code, "PASS", &epoch_z_ago(300));
    }
    drop(conn);

    let out = run_stopgate(
        &dir,
        &["check", "--work-item", "BUG-3", "--format", "json"],
        &[],
    );
    assert!(
        out.status.success(),
        "expected allow: {}",
        String::from_utf8_lossy(&out.stdout)
    );
    let doc = stdout_json(&out);
    assert_eq!(doc["decision"], "allow");
    let advisories = doc["details"]["advisories"].as_array().expect("advisories");
    assert!(
        advisories
            .iter()
            .any(|a| a.as_str().unwrap().contains("retrospective"))
    );
}

#[test]
fn completed_item_with_unshipped_changeset_blocks() {
    let (_tmp, dir) = setup_store();

    // A git repo with a committed code file that was then modified gives an
    // observable pending change-set.
    for args in [
        vec!["init", "-b", "main"],
        vec!["config", "user.email", "gate@example.com"],
        vec!["config", "user.name", "gate"],
    ] {
        let out = Command::new("git")
            .current_dir(&dir)
            .args(&args)
            .output()
            .expect("git");
        assert!(out.status.success(), "git {:?} failed", args);
    }
    std::fs::write(dir.join("service.py"), "print('v1')\n").expect("write");
    for args in [vec!["add", "."], vec!["commit", "-m", "seed"]] {
        let out = Command::new("git")
            .current_dir(&dir)
            .args(&args)
            .output()
            .expect("git");
        assert!(out.status.success(), "git {:?} failed", args);
    }
    std::fs::write(dir.join("service.py"), "print('v2')\n").expect("write");

    let conn = open_db(&dir);
    insert_item(&conn, "BUG-4", "bugfix", "completed", "LEAD_FINAL");
    drop(conn);

    let out = run_stopgate(&dir, &["check", "--work-item", "BUG-4"], &[]);
    assert_eq!(out.status.code(), Some(2));
    let doc = stdout_json(&out);
    assert_eq!(doc["decision"], "block");
    assert!(doc["reason"].as_str().unwrap().contains("shipped"));
    assert_eq!(doc["details"]["missing_action"], "ship");
    assert_eq!(doc["details"]["pending_files"][0], "service.py");
}

#[test]
fn empty_store_allows_with_nothing_to_gate() {
    let (_tmp, dir) = setup_store();
    let out = run_stopgate(&dir, &["check", "--format", "json"], &[]);
    assert!(out.status.success());
    let doc = stdout_json(&out);
    assert_eq!(doc["decision"], "allow");
    assert!(doc["reason"].as_str().unwrap().contains("no tracked work item"));
}

#[test]
fn work_item_key_from_environment() {
    let (_tmp, dir) = setup_store();
    let conn = open_db(&dir);
    insert_item(&conn, "ENV-1", "bugfix", "in_progress", "EXEC");
    drop(conn);

    let out = run_stopgate(&dir, &["check"], &[("STOPGATE_WORK_ITEM", "ENV-1")]);
    assert_eq!(out.status.code(), Some(2));
    let doc = stdout_json(&out);
    assert_eq!(doc["details"]["work_item_key"], "ENV-1");
}

#[test]
fn requirements_surface_lists_sets_and_windows() {
    let (_tmp, dir) = setup_store();
    let conn = open_db(&dir);
    insert_item(&conn, "FEAT-1", "feature", "in_progress", "PLAN_VERIFY");
    drop(conn);

    let out = run_stopgate(
        &dir,
        &["requirements", "--work-item", "FEAT-1", "--format", "json"],
        &[],
    );
    assert!(out.status.success());
    let doc = stdout_json(&out);
    let required: Vec<&str> = doc["required"]
        .as_array()
        .expect("required")
        .iter()
        .map(|v| v["code"].as_str().unwrap())
        .collect();
    assert!(required.contains(&"ARCHITECTURE"));
    assert!(required.contains(&"RETROSPECTIVE"));
    assert!(
        doc["required"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v["window"].as_str().is_some_and(|w| w.contains("PLAN")))
    );
}
