//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0);

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
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
        -- Custody events: one row per event, never updated or deleted
        CREATE TABLE custody_events (
            subject_id TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,   -- 0 = genesis
            event_type INTEGER NOT NULL,        -- EventType code, for indexing only
            payload BLOB NOT NULL,              -- CBOR of the tagged payload
            occurred_at TEXT NOT NULL,          -- RFC 3339, 9 fractional digits
            actor_name TEXT NOT NULL,
            actor_role TEXT NOT NULL,
            location TEXT NOT NULL,
            subject_status INTEGER NOT NULL,    -- SubjectStatus code
            previous_hash BLOB,                 -- 32 bytes, NULL for genesis
            current_hash BLOB NOT NULL,         -- 32 bytes, Blake3 of canonical bytes
            canonical_bytes BLOB NOT NULL,      -- audit copy, never trusted on read
            ingested_at INTEGER NOT NULL,       -- local write time (Unix ms)

            UNIQUE(subject_id, sequence_number)
        );

        -- Per-subject head pointer, the compare-and-swap target
        CREATE TABLE subjects (
            subject_id TEXT PRIMARY KEY,
            head_seq INTEGER NOT NULL,
            head_hash BLOB NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TRIGGER custody_events_no_update
        BEFORE UPDATE ON custody_events
        BEGIN
            SELECT RAISE(ABORT, 'custody events are immutable');
        END;

        CREATE TRIGGER custody_events_no_delete
        BEFORE DELETE ON custody_events
        BEGIN
            SELECT RAISE(ABORT, 'custody events are append-only');
        END;

        CREATE INDEX idx_custody_events_type ON custody_events(event_type);
        CREATE INDEX idx_custody_events_occurred ON custody_events(occurred_at);
        "#,
    )?;

    Ok(())
}
