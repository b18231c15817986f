//! SQLite implementation of the LedgerStore trait.
//!
//! This is the primary storage backend for the custody ledger. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::warn;

use custody_ledger_core::{
    canonical_bytes, canonical_timestamp, Actor, CustodyEvent, EventHash, EventPayload,
    PreviousHash, StoredEvent, SubjectId, SubjectStatus,
};

use crate::error::{Result, StoreError};
use crate::pool::ConnectionPool;
use crate::traits::{is_successor, AppendResult, HeadRef, LedgerStore};

const EVENT_COLUMNS: &str = "subject_id, sequence_number, payload, occurred_at, actor_name,
     actor_role, location, subject_status, previous_hash, current_hash";

/// SQLite-based store implementation.
///
/// Each operation runs on its own pooled connection via spawn_blocking.
/// Nothing in the store serializes callers; SQLite's locking orders
/// concurrent appends and the head compare-and-swap decides the winner.
pub struct SqliteStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            pool: Arc::new(ConnectionPool::file(path.as_ref())?),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing. Each call gets a separate database.
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            pool: Arc::new(ConnectionPool::memory()?),
        })
    }

    /// Run a closure against a pooled connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || pool.with(f))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// An event row as stored, before decoding.
///
/// Content columns are kept as raw bytes so a damaged row can still be
/// read and reported.
struct EventRow {
    subject_id: Option<Vec<u8>>,
    sequence_number: u64,
    payload: Option<Vec<u8>>,
    occurred_at: Option<Vec<u8>>,
    actor_name: Option<Vec<u8>>,
    actor_role: Option<Vec<u8>>,
    location: Option<Vec<u8>>,
    subject_status: Option<i64>,
    previous_hash: Option<Vec<u8>>,
    current_hash: Option<Vec<u8>>,
}

fn raw_bytes(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<Option<Vec<u8>>> {
    Ok(match row.get_ref(column)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
    })
}

fn raw_integer(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(column)? {
        ValueRef::Integer(i) => Some(i),
        _ => None,
    })
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            subject_id: raw_bytes(row, "subject_id")?,
            sequence_number: row.get("sequence_number")?,
            payload: raw_bytes(row, "payload")?,
            occurred_at: raw_bytes(row, "occurred_at")?,
            actor_name: raw_bytes(row, "actor_name")?,
            actor_role: raw_bytes(row, "actor_role")?,
            location: raw_bytes(row, "location")?,
            subject_status: raw_integer(row, "subject_status")?,
            previous_hash: raw_bytes(row, "previous_hash")?,
            current_hash: raw_bytes(row, "current_hash")?,
        })
    }

    /// Decode the row, keeping it as `Corrupt` if any column is damaged.
    fn into_stored(self) -> StoredEvent {
        let sequence_number = self.sequence_number;
        match self.into_event() {
            Ok(event) => StoredEvent::Decoded(event),
            Err(e) => {
                warn!(seq = sequence_number, error = %e, "undecodable custody event row");
                StoredEvent::Corrupt {
                    sequence_number,
                    detail: e.to_string(),
                }
            }
        }
    }

    fn into_event(self) -> Result<CustodyEvent> {
        let subject_id = SubjectId::new(utf8("subject_id", self.subject_id)?)
            .map_err(|e| StoreError::InvalidData(format!("subject_id: {e}")))?;

        let payload_bytes = required("payload", self.payload)?;
        let payload: EventPayload = ciborium::from_reader(payload_bytes.as_slice())
            .map_err(|e| StoreError::Serialization(format!("payload: {e}")))?;

        let occurred_at = DateTime::parse_from_rfc3339(&utf8("occurred_at", self.occurred_at)?)
            .map_err(|e| StoreError::InvalidData(format!("occurred_at: {e}")))?
            .with_timezone(&Utc);

        let subject_status = self
            .subject_status
            .and_then(|code| u16::try_from(code).ok())
            .and_then(SubjectStatus::from_u16)
            .ok_or_else(|| {
                StoreError::InvalidData(format!("unknown subject status {:?}", self.subject_status))
            })?;

        let previous_hash = match self.previous_hash {
            None => PreviousHash::Genesis,
            Some(bytes) => PreviousHash::Event(decode_hash("previous_hash", &bytes)?),
        };

        Ok(CustodyEvent {
            subject_id,
            sequence_number: self.sequence_number,
            payload,
            occurred_at,
            actor: Actor::new(
                utf8("actor_name", self.actor_name)?,
                utf8("actor_role", self.actor_role)?,
            ),
            location: utf8("location", self.location)?,
            subject_status,
            previous_hash,
            current_hash: decode_hash("current_hash", &required("current_hash", self.current_hash)?)?,
        })
    }
}

fn required(column: &str, bytes: Option<Vec<u8>>) -> Result<Vec<u8>> {
    bytes.ok_or_else(|| StoreError::InvalidData(format!("{column}: missing")))
}

fn utf8(column: &str, bytes: Option<Vec<u8>>) -> Result<String> {
    String::from_utf8(required(column, bytes)?)
        .map_err(|e| StoreError::InvalidData(format!("{column}: {e}")))
}

fn decode_hash(column: &str, bytes: &[u8]) -> Result<EventHash> {
    EventHash::try_from(bytes)
        .map_err(|_| StoreError::InvalidData(format!("{column}: expected 32 bytes, got {}", bytes.len())))
}

fn encode_payload(payload: &EventPayload) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(payload, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn query_stored(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<StoredEvent>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, EventRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().map(EventRow::into_stored).collect())
}

/// Events for callers that need them whole; a damaged row fails the read.
fn decoded(subject_id: &str, rows: Vec<StoredEvent>) -> Result<Vec<CustodyEvent>> {
    rows.into_iter().map(|row| decoded_one(subject_id, row)).collect()
}

fn decoded_one(subject_id: &str, row: StoredEvent) -> Result<CustodyEvent> {
    match row {
        StoredEvent::Decoded(event) => Ok(event),
        StoredEvent::Corrupt {
            sequence_number,
            detail,
        } => Err(StoreError::CorruptEvent {
            subject_id: subject_id.to_string(),
            sequence: sequence_number,
            detail,
        }),
    }
}

fn read_head(conn: &Connection, subject_id: &str) -> Result<Option<(HeadRef, bool)>> {
    let row: Option<(u64, Vec<u8>, bool)> = conn
        .query_row(
            "SELECT head_seq, head_hash, archived FROM subjects WHERE subject_id = ?1",
            params![subject_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    row.map(|(seq, hash, archived)| {
        Ok((
            HeadRef {
                sequence_number: seq,
                hash: decode_hash("head_hash", &hash)?,
            },
            archived,
        ))
    })
    .transpose()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn append_event(&self, event: &CustodyEvent) -> Result<AppendResult> {
        let event = event.clone();
        let payload = encode_payload(&event.payload)?;
        let canonical = canonical_bytes(&event);

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let subject = event.subject_id.as_str();

            let current = read_head(&tx, subject)?;
            if let Some((_, true)) = current {
                return Ok(AppendResult::Archived);
            }

            let head = current.map(|(head, _)| head);
            if !is_successor(head.as_ref(), &event) {
                return Ok(AppendResult::Conflict { head });
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO custody_events (
                    subject_id, sequence_number, event_type, payload, occurred_at,
                    actor_name, actor_role, location, subject_status, previous_hash,
                    current_hash, canonical_bytes, ingested_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    subject,
                    event.sequence_number as i64,
                    event.event_type().to_u16(),
                    payload,
                    canonical_timestamp(&event.occurred_at),
                    event.actor.name,
                    event.actor.role,
                    event.location,
                    event.subject_status.to_u16(),
                    event.previous_hash.hash().map(|h| h.as_bytes().to_vec()),
                    event.current_hash.as_bytes().as_slice(),
                    canonical,
                    now,
                ],
            )?;

            tx.execute(
                "INSERT INTO subjects (subject_id, head_seq, head_hash, archived, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)
                 ON CONFLICT(subject_id) DO UPDATE SET
                    head_seq = excluded.head_seq,
                    head_hash = excluded.head_hash,
                    updated_at = excluded.updated_at",
                params![
                    subject,
                    event.sequence_number as i64,
                    event.current_hash.as_bytes().as_slice(),
                    now,
                ],
            )?;

            tx.commit()?;
            Ok(AppendResult::Appended)
        })
        .await
    }

    async fn get_event(&self, subject_id: &SubjectId, seq: u64) -> Result<Option<CustodyEvent>> {
        let subject = subject_id.to_string();
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {EVENT_COLUMNS} FROM custody_events
                         WHERE subject_id = ?1 AND sequence_number = ?2"
                    ),
                    params![subject, seq as i64],
                    EventRow::from_row,
                )
                .optional()?;
            row.map(|r| decoded_one(&subject, r.into_stored())).transpose()
        })
        .await
    }

    async fn get_range(
        &self,
        subject_id: &SubjectId,
        start: u64,
        end: u64,
    ) -> Result<Vec<CustodyEvent>> {
        let rows = self.get_stored_range(subject_id, start, end).await?;
        decoded(subject_id.as_str(), rows)
    }

    async fn get_stored_range(
        &self,
        subject_id: &SubjectId,
        start: u64,
        end: u64,
    ) -> Result<Vec<StoredEvent>> {
        let subject = subject_id.to_string();
        // Beyond i64::MAX nothing is stored anyway.
        let end = end.min(i64::MAX as u64);
        self.blocking(move |conn| {
            query_stored(
                conn,
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM custody_events
                     WHERE subject_id = ?1 AND sequence_number >= ?2 AND sequence_number <= ?3
                     ORDER BY sequence_number"
                ),
                params![subject, start as i64, end as i64],
            )
        })
        .await
    }

    async fn get_head(&self, subject_id: &SubjectId) -> Result<Option<CustodyEvent>> {
        let subject = subject_id.to_string();
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {EVENT_COLUMNS} FROM custody_events
                         WHERE subject_id = ?1
                         ORDER BY sequence_number DESC LIMIT 1"
                    ),
                    params![subject],
                    EventRow::from_row,
                )
                .optional()?;
            row.map(|r| decoded_one(&subject, r.into_stored())).transpose()
        })
        .await
    }

    async fn get_chain(&self, subject_id: &SubjectId) -> Result<Vec<CustodyEvent>> {
        let rows = self.get_stored_chain(subject_id).await?;
        decoded(subject_id.as_str(), rows)
    }

    async fn chain_len(&self, subject_id: &SubjectId) -> Result<u64> {
        let subject = subject_id.to_string();
        self.blocking(move |conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM custody_events WHERE subject_id = ?1",
                params![subject],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT subject_id FROM subjects ORDER BY subject_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids.into_iter()
                .map(|id| {
                    SubjectId::new(id).map_err(|e| StoreError::InvalidData(format!("subject_id: {e}")))
                })
                .collect()
        })
        .await
    }

    async fn mark_archived(&self, subject_id: &SubjectId) -> Result<()> {
        let subject = subject_id.to_string();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE subjects SET archived = 1, updated_at = ?2 WHERE subject_id = ?1",
                params![subject, now_millis()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(subject));
            }
            Ok(())
        })
        .await
    }

    async fn is_archived(&self, subject_id: &SubjectId) -> Result<bool> {
        let subject = subject_id.to_string();
        self.blocking(move |conn| Ok(matches!(read_head(conn, &subject)?, Some((_, true)))))
            .await
    }
}
