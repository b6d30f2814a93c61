//! SQLite schema for the ingress database.

use rusqlite::{Connection, OptionalExtension, Result};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Create all tables if they don't exist and run any pending migrations.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get the current schema version (0 if not initialized).
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Projected posts, one row per record URI
        CREATE TABLE IF NOT EXISTS post (
            uri TEXT PRIMARY KEY,
            cid TEXT NOT NULL,
            reply_parent TEXT,
            reply_root TEXT,
            indexed_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_post_indexed_at ON post(indexed_at);

        -- Stream position per firehose service
        CREATE TABLE IF NOT EXISTS sub_state (
            service TEXT PRIMARY KEY,
            cursor INTEGER NOT NULL
        );
        "#,
    )
}
