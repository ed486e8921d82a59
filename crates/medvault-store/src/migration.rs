//! Database schema migrations for SQLite.
//!
//! Each migration is a SQL batch that moves the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE subjects (
            subject_id TEXT PRIMARY KEY,
            did TEXT NOT NULL,
            wallet_address TEXT,
            did_document_address TEXT,
            did_status TEXT NOT NULL           -- PENDING | CONFIRMED | FAILED
        );

        CREATE TABLE documents (
            document_id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            category TEXT NOT NULL,            -- DocumentCategory::as_str
            title TEXT NOT NULL,
            blob_address TEXT,                 -- set once the upload is confirmed
            uploaded_at INTEGER NOT NULL,      -- Unix ms
            status TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE credentials (
            token_id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            kind TEXT NOT NULL,                -- ACCESS_TOKEN | EMERGENCY_ENVELOPE
            category TEXT NOT NULL,            -- EMERGENCY | SHARE
            document_ids BLOB NOT NULL,        -- CBOR array of document ids
            issued_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            revoked_at INTEGER
        );

        CREATE TABLE grant_records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT NOT NULL UNIQUE,
            subject_id TEXT NOT NULL,
            token_id TEXT NOT NULL,
            ledger_grant_id TEXT NOT NULL,
            responder TEXT NOT NULL,           -- JSON ResponderMeta
            categories BLOB NOT NULL,          -- CBOR array of categories
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TRIGGER grant_records_no_update
        BEFORE UPDATE ON grant_records
        BEGIN
            SELECT RAISE(ABORT, 'grant_records is append-only');
        END;

        CREATE TRIGGER grant_records_no_delete
        BEFORE DELETE ON grant_records
        BEGIN
            SELECT RAISE(ABORT, 'grant_records is append-only');
        END;

        CREATE INDEX idx_documents_subject ON documents(subject_id, active, status);
        CREATE INDEX idx_credentials_subject ON credentials(subject_id);
        CREATE INDEX idx_grant_records_subject ON grant_records(subject_id);
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
