//! Store trait: the abstract interface for custody event persistence.
//!
//! This trait allows the ledger to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use custody_ledger_core::{CustodyEvent, EventHash, PreviousHash, StoredEvent, SubjectId};

use crate::error::Result;

/// Position and hash of a subject's head event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadRef {
    pub sequence_number: u64,
    pub hash: EventHash,
}

impl HeadRef {
    /// Head reference for an event.
    pub fn of(event: &CustodyEvent) -> Self {
        Self {
            sequence_number: event.sequence_number,
            hash: event.current_hash,
        }
    }
}

/// Check that `event` declares `head` as its predecessor.
///
/// A genesis event only fits an empty chain; any other event must carry
/// the next sequence number and the head's hash.
pub fn is_successor(head: Option<&HeadRef>, event: &CustodyEvent) -> bool {
    match (head, &event.previous_hash) {
        (None, PreviousHash::Genesis) => event.sequence_number == 0,
        (Some(head), PreviousHash::Event(prev)) => {
            head.sequence_number.checked_add(1) == Some(event.sequence_number)
                && head.hash == *prev
        }
        _ => false,
    }
}

/// Result of appending an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    /// Event was persisted as the new head.
    Appended,
    /// The stored head is not the event's declared predecessor.
    Conflict {
        /// The head at the time of the attempt.
        head: Option<HeadRef>,
    },
    /// The subject's chain is archived and accepts no appends.
    Archived,
}

/// The LedgerStore trait: async interface for custody event persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Compare-and-swap appends**: `append_event` succeeds only when the
///   current head is exactly the event's declared predecessor.
/// - **Append-only**: no method updates or deletes a persisted event.
/// - **Atomic visibility**: readers see a chain either before or after an
///   append, never a partially written event.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Event Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an event as the new head of its subject's chain.
    ///
    /// # Returns
    /// - `Appended` if the event was persisted.
    /// - `Conflict` if the head is not the event's declared predecessor.
    /// - `Archived` if the subject's chain has been archived.
    async fn append_event(&self, event: &CustodyEvent) -> Result<AppendResult>;

    /// Get an event by its position in a subject's chain.
    async fn get_event(&self, subject_id: &SubjectId, seq: u64) -> Result<Option<CustodyEvent>>;

    /// Get a range of events from a chain.
    ///
    /// Returns events with `start <= seq <= end`, ordered by seq.
    async fn get_range(
        &self,
        subject_id: &SubjectId,
        start: u64,
        end: u64,
    ) -> Result<Vec<CustodyEvent>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Chain Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the head event of a chain, or `None` for an unknown subject.
    async fn get_head(&self, subject_id: &SubjectId) -> Result<Option<CustodyEvent>>;

    /// Get a full chain in ascending sequence order; empty if unknown.
    async fn get_chain(&self, subject_id: &SubjectId) -> Result<Vec<CustodyEvent>>;

    /// Get a range of rows as stored, `start <= seq <= end`, ordered by seq.
    ///
    /// Unlike [`get_range`](Self::get_range), a row that no longer decodes
    /// comes back as [`StoredEvent::Corrupt`] instead of failing the read.
    async fn get_stored_range(
        &self,
        subject_id: &SubjectId,
        start: u64,
        end: u64,
    ) -> Result<Vec<StoredEvent>> {
        let events = self.get_range(subject_id, start, end).await?;
        Ok(events.into_iter().map(StoredEvent::from).collect())
    }

    /// A full chain as stored; see [`get_stored_range`](Self::get_stored_range).
    async fn get_stored_chain(&self, subject_id: &SubjectId) -> Result<Vec<StoredEvent>> {
        self.get_stored_range(subject_id, 0, u64::MAX).await
    }

    /// Number of events in a chain.
    async fn chain_len(&self, subject_id: &SubjectId) -> Result<u64>;

    /// List every subject with at least one event.
    async fn list_subjects(&self) -> Result<Vec<SubjectId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Close a chain to further appends. It stays readable.
    async fn mark_archived(&self, subject_id: &SubjectId) -> Result<()>;

    /// Whether a chain has been archived.
    async fn is_archived(&self, subject_id: &SubjectId) -> Result<bool>;
}
