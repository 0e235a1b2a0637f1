//! Store handle and planning-store queries.
//!
//! The planning system owns the database; the gate reads work items,
//! handoffs, executions, and completion evidence, and appends audit rows.
//! All access goes through the [`StoreBroker`] thin waist.

use crate::core::broker::StoreBroker;
use crate::core::db;
use crate::core::error;
use crate::core::model::{
    Deliverable, PhaseHandoff, SubAgentExecution, TransitionType, Verdict, WorkItem,
    WorkItemStatus, WorkItemType,
};
use crate::core::time;
use regex::Regex;
use rusqlite::{OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Shape of a well-formed work item key.
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9._-]{0,127}$").unwrap());

pub const STORE_DIR_NAME: &str = ".stopgate";
pub const DATA_DIR_ENV: &str = "STOPGATE_DATA_DIR";

/// Handle for the gate's state workspace (`.stopgate/` by default).
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the store root: `STOPGATE_DATA_DIR` override, else
    /// `<cwd>/.stopgate`.
    pub fn discover(cwd: &Path) -> Self {
        match std::env::var(DATA_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => Self::new(PathBuf::from(dir)),
            _ => Self::new(cwd.join(STORE_DIR_NAME)),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        db::planning_db_path(&self.root)
    }

    fn broker(&self) -> StoreBroker {
        StoreBroker::new(&self.root)
    }

    /// Look up a work item by key. Unknown keys are a clean `None`, a
    /// malformed key is a validation error before we ever touch the store.
    pub fn work_item(&self, key: &str) -> Result<Option<WorkItem>, error::GateError> {
        if !KEY_PATTERN.is_match(key) {
            return Err(error::GateError::ValidationError(format!(
                "work item key has invalid shape: {:?}",
                key
            )));
        }

        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.work_item",
            |conn| {
                conn.query_row(
                    "SELECT id, key, item_type, category, status, current_phase,
                            completion_date, updated_at
                     FROM work_items WHERE key = ?1",
                    params![key],
                    map_work_item,
                )
                .optional()
                .map_err(error::GateError::RusqliteError)
            },
        )
    }

    /// The ambient work item: the most recently updated non-completed item,
    /// falling back to the most recently updated item of any status.
    pub fn ambient_work_item(&self) -> Result<Option<WorkItem>, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            None,
            "store.ambient_work_item",
            |conn| {
                let open = conn
                    .query_row(
                        "SELECT id, key, item_type, category, status, current_phase,
                                completion_date, updated_at
                         FROM work_items WHERE status != 'completed'
                         ORDER BY updated_at DESC LIMIT 1",
                        [],
                        map_work_item,
                    )
                    .optional()
                    .map_err(error::GateError::RusqliteError)?;
                if open.is_some() {
                    return Ok(open);
                }
                conn.query_row(
                    "SELECT id, key, item_type, category, status, current_phase,
                            completion_date, updated_at
                     FROM work_items ORDER BY updated_at DESC LIMIT 1",
                    [],
                    map_work_item,
                )
                .optional()
                .map_err(error::GateError::RusqliteError)
            },
        )
    }

    /// Accepted handoffs only; these are the timing anchors.
    pub fn accepted_handoffs(&self, key: &str) -> Result<Vec<PhaseHandoff>, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.accepted_handoffs",
            |conn| {
                let mut stmt = conn.prepare(
                    "SELECT transition_type, created_at FROM phase_handoffs
                     WHERE work_item_key = ?1 AND status = 'accepted'
                     ORDER BY created_at ASC",
                )?;
                let rows = stmt.query_map(params![key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                let mut out = Vec::new();
                for r in rows {
                    let (raw_transition, created_at) = r?;
                    // Unrecognized transition names carry no timing meaning.
                    if let Some(transition_type) = TransitionType::parse(&raw_transition) {
                        out.push(PhaseHandoff {
                            transition_type,
                            created_at,
                        });
                    }
                }
                Ok(out)
            },
        )
    }

    pub fn executions(&self, key: &str) -> Result<Vec<SubAgentExecution>, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.executions",
            |conn| {
                let mut stmt = conn.prepare(
                    "SELECT sub_agent_code, verdict, created_at FROM subagent_executions
                     WHERE work_item_key = ?1 ORDER BY created_at ASC",
                )?;
                let rows = stmt.query_map(params![key], |row| {
                    Ok(SubAgentExecution {
                        sub_agent_code: row.get(0)?,
                        verdict: row
                            .get::<_, Option<String>>(1)?
                            .as_deref()
                            .and_then(Verdict::parse),
                        created_at: row.get(2)?,
                    })
                })?;
                let mut out = Vec::new();
                for r in rows {
                    out.push(r?);
                }
                Ok(out)
            },
        )
    }

    pub fn deliverables(&self, key: &str) -> Result<Vec<Deliverable>, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.deliverables",
            |conn| {
                let mut stmt = conn.prepare(
                    "SELECT kind, state, merged FROM deliverables WHERE work_item_key = ?1",
                )?;
                let rows = stmt.query_map(params![key], |row| {
                    Ok(Deliverable {
                        kind: row.get(0)?,
                        state: row.get(1)?,
                        merged: row.get::<_, i64>(2)? != 0,
                    })
                })?;
                let mut out = Vec::new();
                for r in rows {
                    out.push(r?);
                }
                Ok(out)
            },
        )
    }

    pub fn retrospective_exists(&self, key: &str) -> Result<bool, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.retrospective_exists",
            |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM retrospectives WHERE work_item_key = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            },
        )
    }

    pub fn design_artifact_exists(&self, key: &str) -> Result<bool, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.design_artifact_exists",
            |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM design_artifacts WHERE work_item_key = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            },
        )
    }

    /// Latest documentation-verification outcome, modeled as the most recent
    /// DOCS_UPDATE execution verdict.
    pub fn latest_doc_verification(&self, key: &str) -> Result<Option<Verdict>, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            Some(key),
            "store.latest_doc_verification",
            |conn| {
                conn.query_row(
                    "SELECT verdict FROM subagent_executions
                     WHERE work_item_key = ?1 AND sub_agent_code = 'DOCS_UPDATE'
                     ORDER BY created_at DESC LIMIT 1",
                    params![key],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()
                .map_err(error::GateError::RusqliteError)
                .map(|v| v.flatten().as_deref().and_then(Verdict::parse))
            },
        )
    }

    /// Append one row to the audit log. Append-only; nothing in this crate
    /// ever updates or deletes audit rows.
    pub fn write_audit(
        &self,
        event_type: &str,
        severity: &str,
        details: &serde_json::Value,
    ) -> Result<String, error::GateError> {
        let event_id = time::new_event_id();
        let ts = time::now_epoch_z();
        let details_json = serde_json::to_string(details)?;
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            None,
            "store.write_audit",
            |conn| {
                conn.execute(
                    "INSERT INTO audit_log(event_id, ts, event_type, severity, details)
                     VALUES(?1, ?2, ?3, ?4, ?5)",
                    params![event_id, ts, event_type, severity, details_json],
                )?;
                Ok(())
            },
        )?;
        Ok(event_id)
    }

    pub fn audit_entries(&self, limit: usize) -> Result<Vec<serde_json::Value>, error::GateError> {
        self.broker().with_conn(
            &self.db_path(),
            "stopgate",
            None,
            "store.audit_entries",
            |conn| {
                let mut stmt = conn.prepare(
                    "SELECT event_id, ts, event_type, severity, details FROM audit_log
                     ORDER BY ts DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], |row| {
                    Ok(serde_json::json!({
                        "event_id": row.get::<_, String>(0)?,
                        "ts": row.get::<_, String>(1)?,
                        "event_type": row.get::<_, String>(2)?,
                        "severity": row.get::<_, String>(3)?,
                        "details": row.get::<_, String>(4)?,
                    }))
                })?;
                let mut out = Vec::new();
                for r in rows {
                    out.push(r?);
                }
                Ok(out)
            },
        )
    }
}

fn map_work_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: row.get(0)?,
        key: row.get(1)?,
        item_type: WorkItemType::parse(&row.get::<_, String>(2)?),
        category: row.get(3)?,
        status: WorkItemStatus::parse(&row.get::<_, String>(4)?),
        current_phase: crate::core::model::Phase::parse(&row.get::<_, String>(5)?),
        completion_date: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::initialize_planning_db;
    use tempfile::TempDir;

    fn seeded_store() -> (TempDir, Store) {
        let tmp = TempDir::new().expect("tmpdir");
        let store = Store::new(tmp.path().join(STORE_DIR_NAME));
        initialize_planning_db(&store.root).expect("init db");
        (tmp, store)
    }

    fn insert_item(store: &Store, key: &str, status: &str, updated_at: &str) {
        let conn = rusqlite::Connection::open(store.db_path()).expect("open");
        conn.execute(
            "INSERT INTO work_items(id, key, item_type, category, status, current_phase, updated_at)
             VALUES(?1, ?2, 'bugfix', NULL, ?3, 'EXEC', ?4)",
            params![format!("id-{}", key), key, status, updated_at],
        )
        .expect("insert");
    }

    #[test]
    fn test_work_item_lookup_and_miss() {
        let (_tmp, store) = seeded_store();
        insert_item(&store, "GATE-1", "in_progress", "2025-01-01T00:00:00Z");
        let item = store.work_item("GATE-1").expect("query").expect("item");
        assert_eq!(item.key, "GATE-1");
        assert_eq!(item.item_type, WorkItemType::Bugfix);
        assert!(store.work_item("GATE-404").expect("query").is_none());
    }

    #[test]
    fn test_malformed_key_rejected_before_query() {
        let (_tmp, store) = seeded_store();
        let err = store.work_item("; DROP TABLE work_items").unwrap_err();
        assert!(matches!(err, error::GateError::ValidationError(_)));
    }

    #[test]
    fn test_ambient_prefers_open_items() {
        let (_tmp, store) = seeded_store();
        insert_item(&store, "DONE-1", "completed", "2025-03-01T00:00:00Z");
        insert_item(&store, "OPEN-1", "in_progress", "2025-02-01T00:00:00Z");
        let item = store.ambient_work_item().expect("query").expect("item");
        assert_eq!(item.key, "OPEN-1");
    }

    #[test]
    fn test_accepted_handoffs_filters_status_and_unknown_transitions() {
        let (_tmp, store) = seeded_store();
        let conn = rusqlite::Connection::open(store.db_path()).expect("open");
        for (id, transition, status) in [
            ("h1", "LEAD_TO_PLAN", "accepted"),
            ("h2", "PLAN_TO_EXEC", "rejected"),
            ("h3", "SIDEWAYS", "accepted"),
        ] {
            conn.execute(
                "INSERT INTO phase_handoffs(id, work_item_key, transition_type, status, created_at)
                 VALUES(?1, 'GATE-1', ?2, ?3, '2025-01-01T00:00:00Z')",
                params![id, transition, status],
            )
            .expect("insert");
        }
        let handoffs = store.accepted_handoffs("GATE-1").expect("query");
        assert_eq!(handoffs.len(), 1);
        assert_eq!(handoffs[0].transition_type, TransitionType::LeadToPlan);
    }

    #[test]
    fn test_audit_write_is_append_only_rows() {
        let (_tmp, store) = seeded_store();
        let id = store
            .write_audit("bypass_used", "warning", &serde_json::json!({"k": "v"}))
            .expect("audit");
        assert!(!id.is_empty());
        let entries = store.audit_entries(10).expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["event_type"], "bypass_used");
    }
}
