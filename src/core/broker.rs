use crate::core::db;
use crate::core::error;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The store broker is the thin waist for planning-store access.
/// Every read and the audit write go through it, serialized in-process,
/// with one JSONL event appended per operation.
pub struct StoreBroker {
    op_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub work_item_ref: Option<String>,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl StoreBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            op_log_path: root.join("gate.events.jsonl"),
        }
    }

    /// Execute a closure with a serialized connection to the specified DB.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        work_item_ref: Option<&str>,
        op_name: &str,
        f: F,
    ) -> Result<R, error::GateError>
    where
        F: FnOnce(&Connection) -> Result<R, error::GateError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, work_item_ref, op_name, &db_id, status)?;

        result
    }

    fn log_event(
        &self,
        actor: &str,
        work_item_ref: Option<&str>,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::GateError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            work_item_ref: work_item_ref.map(|s| s.to_string()),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.op_log_path)
            .map_err(error::GateError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(error::GateError::IoError)?;
        Ok(())
    }
}
