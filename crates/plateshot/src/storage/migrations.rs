//! Schema versioning for the plateshot database.
//!
//! Only the tables are versioned; the JSON documents stored in them are not.
//! Each pending [`Migration`] runs in its own transaction together with the
//! version bump, so a failed step leaves the database at the previous version.

use std::cmp::Ordering;

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{Migration, CREATE_METADATA_TABLE, MIGRATIONS};

/// The schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS[MIGRATIONS.len() - 1].version;

const VERSION_KEY: &str = "schema_version";

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns [`Error::DatabaseMigration`] if the database was written by a newer
/// build or a version value is corrupt, or the SQL error of a failed step.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_METADATA_TABLE)?;

    let version = schema_version(conn)?;
    match version.cmp(&CURRENT_VERSION) {
        Ordering::Equal => Ok(()),
        Ordering::Greater => Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        }),
        Ordering::Less => apply_pending(conn, version),
    }
}

/// The version recorded in the database; 0 when none is.
///
/// # Errors
///
/// Returns an error if the metadata table cannot be read or holds a
/// non-numeric version.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(v) => v.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {v}"),
        }),
    }
}

fn apply_pending(conn: &Connection, from: u32) -> Result<()> {
    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        apply(conn, migration)?;
    }
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    info!(
        "Applying schema migration {} ({})",
        migration.version, migration.description
    );
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (VERSION_KEY, migration.version.to_string()),
    )?;
    tx.commit()?;
    Ok(())
}
