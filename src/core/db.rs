use crate::core::broker::StoreBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::GateError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::GateError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::GateError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::GateError::RusqliteError)?;
    Ok(conn)
}

pub fn planning_db_path(root: &Path) -> PathBuf {
    root.join("data").join(schemas::PLANNING_DB_NAME)
}

pub fn initialize_planning_db(root: &Path) -> Result<(), error::GateError> {
    let db_path = planning_db_path(root);
    let parent_dir = db_path.parent().ok_or_else(|| {
        error::GateError::StoreInitializationError(format!(
            "no parent directory for {}",
            db_path.display()
        ))
    })?;
    fs::create_dir_all(parent_dir).map_err(error::GateError::IoError)?;

    let broker = StoreBroker::new(root);
    broker.with_conn(&db_path, "stopgate", None, "planning.init", |conn| {
        for schema in schemas::ALL_SCHEMAS {
            conn.execute(schema, [])?;
        }
        Ok(())
    })?;

    Ok(())
}
