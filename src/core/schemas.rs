//! Centralized schema definitions for the planning-store database.
//!
//! One consolidated SQLite database holds everything the gate reads
//! (work items, handoffs, verification executions, completion evidence)
//! plus the single table it writes: the append-only audit log.

pub const PLANNING_DB_NAME: &str = "planning.db";

pub const WORK_ITEMS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS work_items (
        id TEXT PRIMARY KEY,
        key TEXT NOT NULL UNIQUE,
        item_type TEXT NOT NULL,
        category TEXT,
        status TEXT NOT NULL,
        current_phase TEXT NOT NULL,
        completion_date TEXT,
        updated_at TEXT
    )
";

pub const PHASE_HANDOFFS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS phase_handoffs (
        id TEXT PRIMARY KEY,
        work_item_key TEXT NOT NULL,
        transition_type TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

pub const SUBAGENT_EXECUTIONS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS subagent_executions (
        id TEXT PRIMARY KEY,
        work_item_key TEXT NOT NULL,
        sub_agent_code TEXT NOT NULL,
        verdict TEXT,
        created_at TEXT
    )
";

pub const DELIVERABLES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS deliverables (
        id TEXT PRIMARY KEY,
        work_item_key TEXT NOT NULL,
        kind TEXT NOT NULL,
        state TEXT NOT NULL,
        merged INTEGER NOT NULL DEFAULT 0
    )
";

pub const RETROSPECTIVES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS retrospectives (
        id TEXT PRIMARY KEY,
        work_item_key TEXT NOT NULL,
        created_at TEXT
    )
";

pub const DESIGN_ARTIFACTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS design_artifacts (
        id TEXT PRIMARY KEY,
        work_item_key TEXT NOT NULL,
        kind TEXT NOT NULL,
        created_at TEXT
    )
";

pub const AUDIT_LOG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        event_id TEXT PRIMARY KEY,
        ts TEXT NOT NULL,
        event_type TEXT NOT NULL,
        severity TEXT NOT NULL,
        details TEXT NOT NULL
    )
";

pub const HANDOFF_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_handoffs_item ON phase_handoffs(work_item_key, status)";

pub const EXECUTION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_executions_item ON subagent_executions(work_item_key, sub_agent_code)";

pub const ALL_SCHEMAS: &[&str] = &[
    WORK_ITEMS_SCHEMA,
    PHASE_HANDOFFS_SCHEMA,
    SUBAGENT_EXECUTIONS_SCHEMA,
    DELIVERABLES_SCHEMA,
    RETROSPECTIVES_SCHEMA,
    DESIGN_ARTIFACTS_SCHEMA,
    AUDIT_LOG_SCHEMA,
    HANDOFF_INDEX,
    EXECUTION_INDEX,
];
