//! The Ledger: append, read and verify custody chains.
//!
//! The Ledger brings together the transition table, the hash chain engine,
//! storage and verification behind one interface for collaborators.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use custody_ledger_core::{
    check_transition, link_new_event, validate_content, validate_subject_len, verify_stored,
    ContentLimits, CustodyEvent, EventContent, FailureReason, PreviousHash, StoredEvent,
    SubjectId, VerificationReport,
};
use custody_ledger_store::{AppendResult, LedgerStore};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, Result};

/// Default number of re-reads after a concurrent append conflict.
pub const DEFAULT_MAX_APPEND_RETRIES: u32 = 8;

/// Configuration for the Ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How often `append_with_retry` re-reads the head after a conflict.
    pub max_append_retries: u32,
    /// Field length limits for appended content.
    pub limits: ContentLimits,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_append_retries: DEFAULT_MAX_APPEND_RETRIES,
            limits: ContentLimits::default(),
        }
    }
}

impl LedgerConfig {
    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Appending custody events
/// - Reading chains and heads
/// - Verifying chains and windows
/// - Archiving chains to cold storage
pub struct Ledger<S: LedgerStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Append time source.
    clock: Arc<dyn Clock>,
    /// Configuration.
    config: LedgerConfig,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a new ledger on the system clock.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Create a new ledger with an explicit clock.
    pub fn with_clock(store: S, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store: Arc::new(store),
            clock,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an event to a subject's chain.
    ///
    /// Validates the content, checks the transition against the current head,
    /// stamps the append time and persists the event with a compare-and-swap
    /// on the head. Either the event becomes the new head or nothing changes.
    ///
    /// # Errors
    /// - `InvalidTransition` / `ChainClosed` from the transition table
    /// - `ConcurrentAppendConflict` if another append won the race
    /// - `SubjectArchived` if the chain has been archived
    pub async fn append(&self, subject_id: &SubjectId, content: EventContent) -> Result<CustodyEvent> {
        validate_subject_len(subject_id.as_str(), &self.config.limits)?;
        validate_content(&content, &self.config.limits)?;

        if self.store.is_archived(subject_id).await? {
            return Err(LedgerError::SubjectArchived(subject_id.clone()));
        }

        let head = self.store.get_head(subject_id).await?;
        let current = head.as_ref().map(|h| h.subject_status);
        let status = check_transition(current, content.event_type())
            .map_err(|e| LedgerError::from_transition(subject_id, e))?;

        // Append time never runs backwards within a chain.
        let now = self.clock.now();
        let occurred_at = match &head {
            Some(h) if h.occurred_at > now => h.occurred_at,
            _ => now,
        };

        let event = link_new_event(head.as_ref(), subject_id.clone(), content, occurred_at, status);

        match self.store.append_event(&event).await? {
            AppendResult::Appended => {
                debug!(
                    subject = %subject_id,
                    seq = event.sequence_number,
                    event_type = ?event.event_type(),
                    hash = %event.current_hash.short(),
                    "appended custody event"
                );
                Ok(event)
            }
            AppendResult::Conflict { head } => {
                warn!(
                    subject = %subject_id,
                    seq = event.sequence_number,
                    head_seq = ?head.map(|h| h.sequence_number),
                    "append lost race for chain head"
                );
                Err(LedgerError::ConcurrentAppendConflict {
                    subject_id: subject_id.clone(),
                    expected_sequence: event.sequence_number,
                })
            }
            AppendResult::Archived => Err(LedgerError::SubjectArchived(subject_id.clone())),
        }
    }

    /// Append, re-reading the head and reapplying on conflict.
    ///
    /// The transition is re-checked on every attempt, so a retry can still
    /// fail with `InvalidTransition` if the winning append changed the status.
    pub async fn append_with_retry(
        &self,
        subject_id: &SubjectId,
        content: EventContent,
    ) -> Result<CustodyEvent> {
        let mut retries = 0;
        loop {
            match self.append(subject_id, content.clone()).await {
                Err(e) if e.is_retryable() => {
                    if retries >= self.config.max_append_retries {
                        warn!(subject = %subject_id, retries, "append retries exhausted");
                        return Err(e);
                    }
                    retries += 1;
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a subject's chain in sequence order; empty if unknown.
    pub async fn get_chain(&self, subject_id: &SubjectId) -> Result<Vec<CustodyEvent>> {
        Ok(self.store.get_chain(subject_id).await?)
    }

    /// Get a subject's head event, or `None` if unknown.
    pub async fn get_head(&self, subject_id: &SubjectId) -> Result<Option<CustodyEvent>> {
        Ok(self.store.get_head(subject_id).await?)
    }

    /// Get the event at a chain position.
    pub async fn get_event(&self, subject_id: &SubjectId, seq: u64) -> Result<Option<CustodyEvent>> {
        Ok(self.store.get_event(subject_id, seq).await?)
    }

    /// List all subjects with a chain.
    pub async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        Ok(self.store.list_subjects().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a subject's full chain. An unknown subject is vacuously valid.
    ///
    /// Rows that no longer decode are reported as a failure at their
    /// position; only storage access itself can make this return `Err`.
    pub async fn verify(&self, subject_id: &SubjectId) -> Result<VerificationReport> {
        let rows = self.store.get_stored_chain(subject_id).await?;
        let report = verify_stored(0, Some(PreviousHash::Genesis), &rows);
        log_failure(subject_id, &report);
        Ok(report)
    }

    /// Verify events `start..=end` of a chain.
    ///
    /// The window is anchored on the stored hash of event `start - 1`; that
    /// event itself is not re-verified. If it is missing or unreadable, the
    /// window's first event cannot be linked and fails as `LinkBroken`.
    pub async fn verify_window(
        &self,
        subject_id: &SubjectId,
        start: u64,
        end: u64,
    ) -> Result<VerificationReport> {
        let rows = self.store.get_stored_range(subject_id, start, end).await?;
        if rows.is_empty() {
            return Ok(VerificationReport::passed(0));
        }

        let report = match self.anchor_for(subject_id, start).await? {
            Some(anchor) => verify_stored(start, Some(anchor), &rows),
            None => VerificationReport::failed(start, FailureReason::LinkBroken, 1),
        };
        log_failure(subject_id, &report);
        Ok(report)
    }

    /// The link the event at `start` must carry, if it can be known.
    async fn anchor_for(&self, subject_id: &SubjectId, start: u64) -> Result<Option<PreviousHash>> {
        let Some(prev_seq) = start.checked_sub(1) else {
            return Ok(Some(PreviousHash::Genesis));
        };
        let prev = self.store.get_stored_range(subject_id, prev_seq, prev_seq).await?;
        Ok(prev
            .into_iter()
            .find_map(StoredEvent::into_event)
            .filter(|p| p.sequence_number == prev_seq)
            .map(|p| PreviousHash::Event(p.current_hash)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Move a chain to cold storage as a whole, preserving order.
    ///
    /// The chain must verify. Events are replayed into `cold` through its
    /// compare-and-swap append, then the chain is closed here. Events already
    /// present in `cold` are accepted if identical, so an interrupted archive
    /// can be rerun. Returns the number of events archived.
    pub async fn archive<C: LedgerStore>(&self, subject_id: &SubjectId, cold: &C) -> Result<u64> {
        let rows = self.store.get_stored_chain(subject_id).await?;
        if rows.is_empty() {
            return Err(LedgerError::SubjectNotFound(subject_id.clone()));
        }

        let report = verify_stored(0, Some(PreviousHash::Genesis), &rows);
        if !report.valid {
            warn!(subject = %subject_id, reason = ?report.reason, "refusing to archive broken chain");
            return Err(integrity_failure(subject_id, &report));
        }
        let chain: Vec<CustodyEvent> = rows.into_iter().filter_map(StoredEvent::into_event).collect();

        replay_into(cold, subject_id, &chain).await?;
        self.store.mark_archived(subject_id).await?;

        // Pick up anything appended between the read and the close.
        let archived_len = chain.len() as u64;
        let tail_rows = self.store.get_stored_range(subject_id, archived_len, u64::MAX).await?;
        let mut tail = Vec::new();
        if !tail_rows.is_empty() {
            let anchor = chain.last().map(|e| PreviousHash::Event(e.current_hash));
            let tail_report = verify_stored(archived_len, anchor, &tail_rows);
            if !tail_report.valid {
                return Err(integrity_failure(subject_id, &tail_report));
            }
            tail = tail_rows.into_iter().filter_map(StoredEvent::into_event).collect();
            replay_into(cold, subject_id, &tail).await?;
        }

        let total = archived_len + tail.len() as u64;
        info!(subject = %subject_id, events = total, "archived custody chain");
        Ok(total)
    }
}

fn log_failure(subject_id: &SubjectId, report: &VerificationReport) {
    if !report.valid {
        warn!(
            subject = %subject_id,
            index = ?report.first_failure_index,
            reason = ?report.reason,
            "chain verification failed"
        );
    }
}

fn integrity_failure(subject_id: &SubjectId, report: &VerificationReport) -> LedgerError {
    LedgerError::IntegrityFailure {
        subject_id: subject_id.clone(),
        index: report.first_failure_index,
        reason: report.reason,
    }
}

async fn replay_into<C: LedgerStore>(
    cold: &C,
    subject_id: &SubjectId,
    events: &[CustodyEvent],
) -> Result<()> {
    for event in events {
        match cold.append_event(event).await? {
            AppendResult::Appended => {}
            AppendResult::Conflict { .. } | AppendResult::Archived => {
                let existing = cold.get_event(subject_id, event.sequence_number).await?;
                if existing.as_ref() != Some(event) {
                    return Err(LedgerError::ArchiveMismatch {
                        subject_id: subject_id.clone(),
                        sequence: event.sequence_number,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use custody_ledger_core::{Actor, EventPayload, EventType, FailureReason, SubjectStatus};
    use custody_ledger_store::MemoryStore;
    use std::sync::Mutex;

    /// Clock that returns queued instants, then repeats the last one.
    struct ScriptedClock(Mutex<Vec<DateTime<Utc>>>);

    impl ScriptedClock {
        fn new(mut instants: Vec<DateTime<Utc>>) -> Self {
            instants.reverse();
            Self(Mutex::new(instants))
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            let mut queue = self.0.lock().unwrap();
            if queue.len() > 1 {
                queue.pop().unwrap()
            } else {
                queue[0]
            }
        }
    }

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    fn content(payload: EventPayload) -> EventContent {
        EventContent::new(payload, Actor::new("alice", "packer"), "DOCK-1")
    }

    fn created() -> EventContent {
        content(EventPayload::SubjectCreated {
            reference: "ORD-1".into(),
            description: "two boxes".into(),
        })
    }

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new(), LedgerConfig::default())
    }

    #[tokio::test]
    async fn test_append_genesis() {
        let ledger = ledger();
        let id = subject("PKG-001");

        let event = ledger.append(&id, created()).await.unwrap();
        assert_eq!(event.sequence_number, 0);
        assert_eq!(event.previous_hash, PreviousHash::Genesis);
        assert_eq!(event.subject_status, SubjectStatus::Open);
        assert_eq!(ledger.get_head(&id).await.unwrap(), Some(event));
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_chain_unchanged() {
        let ledger = ledger();
        let id = subject("PKG-001");
        ledger.append(&id, created()).await.unwrap();

        let err = ledger
            .append(&id, content(EventPayload::Sealed { seal_id: "S-1".into() }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                event_type: EventType::Sealed,
                current: Some(SubjectStatus::Open),
                ..
            }
        ));
        assert_eq!(ledger.get_chain(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_event_must_be_creation() {
        let ledger = ledger();
        let id = subject("PKG-NEW");
        let err = ledger
            .append(&id, content(EventPayload::Staged { bay: "B1".into() }))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { current: None, .. }));
        assert!(ledger.get_chain(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_rejected_before_storage() {
        let ledger = ledger();
        let id = subject("PKG-001");
        let mut bad = created();
        bad.actor.name = String::new();

        assert!(matches!(
            ledger.append(&id, bad).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(ledger.get_head(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_occurred_at_never_regresses() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let clock = ScriptedClock::new(vec![t0, t0 - Duration::minutes(5)]);
        let ledger = Ledger::with_clock(MemoryStore::new(), Arc::new(clock), LedgerConfig::default());
        let id = subject("PKG-CLOCK");

        let first = ledger.append(&id, created()).await.unwrap();
        let second = ledger
            .append(
                &id,
                content(EventPayload::SubmittedForReview {
                    reviewer: "bob".into(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(first.occurred_at, t0);
        assert_eq!(second.occurred_at, t0);
        assert!(ledger.verify(&id).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_verify_unknown_subject_is_vacuous() {
        let report = ledger().verify(&subject("GHOST")).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.events_checked, 0);
    }

    #[tokio::test]
    async fn test_verify_window_detects_tamper_inside() {
        let ledger = ledger();
        let id = subject("PKG-W");
        ledger.append(&id, created()).await.unwrap();
        for n in 0..4 {
            ledger
                .append(
                    &id,
                    content(EventPayload::ContentAdded {
                        item_code: format!("SKU-{n}"),
                        description: "widget".into(),
                        quantity: 1,
                    }),
                )
                .await
                .unwrap();
        }

        assert!(ledger.verify_window(&id, 2, 4).await.unwrap().valid);

        ledger
            .store()
            .tamper_with(&id, 3, |e| e.location = "YARD".into())
            .unwrap();
        let report = ledger.verify_window(&id, 2, 4).await.unwrap();
        assert_eq!(report.first_failure_index, Some(3));
        assert_eq!(report.reason, Some(FailureReason::HashMismatch));
    }

    #[tokio::test]
    async fn test_archive_moves_chain_and_closes_it() {
        let ledger = ledger();
        let cold = MemoryStore::new();
        let id = subject("PKG-ARC");
        ledger.append(&id, created()).await.unwrap();
        ledger
            .append(
                &id,
                content(EventPayload::Cancelled {
                    reason: "order withdrawn".into(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(ledger.archive(&id, &cold).await.unwrap(), 2);
        assert_eq!(cold.get_chain(&id).await.unwrap(), ledger.get_chain(&id).await.unwrap());
        assert!(ledger.store().is_archived(&id).await.unwrap());

        // Rerunning is harmless.
        assert_eq!(ledger.archive(&id, &cold).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_archived_subject_rejects_append() {
        let ledger = ledger();
        let cold = MemoryStore::new();
        let id = subject("PKG-ARC");
        ledger.append(&id, created()).await.unwrap();
        ledger.archive(&id, &cold).await.unwrap();

        let err = ledger
            .append(
                &id,
                content(EventPayload::SubmittedForReview {
                    reviewer: "bob".into(),
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SubjectArchived(_)));
    }

    #[tokio::test]
    async fn test_archive_refuses_broken_chain() {
        let ledger = ledger();
        let cold = MemoryStore::new();
        let id = subject("PKG-BAD");
        ledger.append(&id, created()).await.unwrap();
        ledger
            .store()
            .tamper_with(&id, 0, |e| e.actor.role = "intruder".into())
            .unwrap();

        assert!(matches!(
            ledger.archive(&id, &cold).await,
            Err(LedgerError::IntegrityFailure { index: Some(0), .. })
        ));
        assert!(cold.get_chain(&id).await.unwrap().is_empty());
        assert!(!ledger.store().is_archived(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_archive_unknown_subject() {
        assert!(matches!(
            ledger().archive(&subject("GHOST"), &MemoryStore::new()).await,
            Err(LedgerError::SubjectNotFound(_))
        ));
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = LedgerConfig::from_json(r#"{ "max_append_retries": 3 }"#).unwrap();
        assert_eq!(config.max_append_retries, 3);
        assert_eq!(config.limits, ContentLimits::default());

        let config = LedgerConfig::from_json("{}").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }
}
