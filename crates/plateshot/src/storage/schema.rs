//! `SQLite` schema definitions for plateshot.

/// Bookkeeping table; holds the schema version. Created before any migration.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Key-value table; each value is a whole JSON document.
pub const CREATE_KV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// One step in the schema history.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version the database is at after this step.
    pub version: u32,
    /// Short label for logs.
    pub description: &'static str,
    /// Statements to run, as one batch.
    pub sql: &'static str,
}

/// Every migration, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "key-value table",
        sql: CREATE_KV_TABLE,
    },
];
