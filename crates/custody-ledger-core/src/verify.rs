//! Chain verification: replay hashing and linkage over a subject's events.
//!
//! Verification is a pure read-side computation. Findings are returned as a
//! [`VerificationReport`], never as errors, so a corrupted chain can still be
//! inspected and reported.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::CustodyEvent;
use crate::types::PreviousHash;

/// Why verification stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// Stored `current_hash` differs from a fresh recomputation.
    HashMismatch,
    /// `previous_hash` differs from the prior event's `current_hash`.
    LinkBroken,
    /// The first event does not carry the genesis sentinel.
    GenesisMismatch,
    /// Stored sequence number is not the event's position in the chain.
    SequenceMismatch,
    /// Event belongs to a different subject than the rest of the chain.
    SubjectMismatch,
    /// `occurred_at` went backwards.
    TimestampRegression,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::HashMismatch => "content hash mismatch",
            FailureReason::LinkBroken => "link to previous event broken",
            FailureReason::GenesisMismatch => "genesis sentinel missing",
            FailureReason::SequenceMismatch => "sequence number out of place",
            FailureReason::SubjectMismatch => "event belongs to another subject",
            FailureReason::TimestampRegression => "timestamp earlier than previous event",
        };
        f.write_str(s)
    }
}

/// Result of verifying a chain or window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub valid: bool,
    /// Chain position (sequence number) of the first failing event.
    pub first_failure_index: Option<u64>,
    pub reason: Option<FailureReason>,
    /// Events examined, the failing one included.
    pub events_checked: u64,
}

impl VerificationReport {
    pub fn passed(events_checked: u64) -> Self {
        Self {
            valid: true,
            first_failure_index: None,
            reason: None,
            events_checked,
        }
    }

    pub fn failed(index: u64, reason: FailureReason, events_checked: u64) -> Self {
        Self {
            valid: false,
            first_failure_index: Some(index),
            reason: Some(reason),
            events_checked,
        }
    }

    /// Whether the event at this chain position is covered by a passing prefix.
    pub fn is_verified(&self, sequence_number: u64) -> bool {
        match self.first_failure_index {
            None => self.valid,
            Some(failed_at) => sequence_number < failed_at,
        }
    }
}

/// An event as read back from storage.
///
/// A row whose stored bytes no longer decode into an event still occupies its
/// chain position, so the verifier can report it instead of the read failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredEvent {
    Decoded(CustodyEvent),
    Corrupt {
        /// Position the row is stored under.
        sequence_number: u64,
        /// What failed to decode.
        detail: String,
    },
}

impl StoredEvent {
    pub fn sequence_number(&self) -> u64 {
        match self {
            StoredEvent::Decoded(event) => event.sequence_number,
            StoredEvent::Corrupt {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    pub fn event(&self) -> Option<&CustodyEvent> {
        match self {
            StoredEvent::Decoded(event) => Some(event),
            StoredEvent::Corrupt { .. } => None,
        }
    }

    pub fn into_event(self) -> Option<CustodyEvent> {
        match self {
            StoredEvent::Decoded(event) => Some(event),
            StoredEvent::Corrupt { .. } => None,
        }
    }
}

impl From<CustodyEvent> for StoredEvent {
    fn from(event: CustodyEvent) -> Self {
        StoredEvent::Decoded(event)
    }
}

/// Verify a full chain starting at genesis.
pub fn verify_chain(events: &[CustodyEvent]) -> VerificationReport {
    verify_window(0, Some(PreviousHash::Genesis), events)
}

/// Verify a contiguous window of a chain.
///
/// `start` is the chain position of `events[0]`. `anchor` is the link the
/// first event must carry; `None` trusts the first event's stored link.
/// A window starting at position 0 always requires the genesis sentinel.
///
/// Stops at the first failure; nothing past it is considered verified.
pub fn verify_window(
    start: u64,
    anchor: Option<PreviousHash>,
    events: &[CustodyEvent],
) -> VerificationReport {
    replay(start, anchor, events.iter().map(Ok))
}

/// [`verify_window`] over rows as stored.
///
/// An undecodable row fails as `HashMismatch` at its position, or as
/// `SequenceMismatch` if it is stored out of place.
pub fn verify_stored(
    start: u64,
    anchor: Option<PreviousHash>,
    rows: &[StoredEvent],
) -> VerificationReport {
    replay(
        start,
        anchor,
        rows.iter().map(|row| match row {
            StoredEvent::Decoded(event) => Ok(event),
            StoredEvent::Corrupt {
                sequence_number, ..
            } => Err(*sequence_number),
        }),
    )
}

/// `Err(seq)` is a row that could not be decoded, stored at `seq`.
fn replay<'a>(
    start: u64,
    anchor: Option<PreviousHash>,
    rows: impl Iterator<Item = Result<&'a CustodyEvent, u64>>,
) -> VerificationReport {
    let mut first: Option<&CustodyEvent> = None;
    let mut prev: Option<&CustodyEvent> = None;
    let mut checked = 0;

    for (i, row) in rows.enumerate() {
        let position = start + i as u64;
        checked = i as u64 + 1;

        let event = match row {
            Ok(event) => event,
            Err(seq) if seq != position => {
                return VerificationReport::failed(position, FailureReason::SequenceMismatch, checked)
            }
            Err(_) => {
                return VerificationReport::failed(position, FailureReason::HashMismatch, checked)
            }
        };

        let origin = *first.get_or_insert(event);
        if let Some(reason) = check_event(event, position, origin, prev, start, anchor) {
            return VerificationReport::failed(position, reason, checked);
        }
        prev = Some(event);
    }

    VerificationReport::passed(checked)
}

fn check_event(
    event: &CustodyEvent,
    position: u64,
    first: &CustodyEvent,
    prev: Option<&CustodyEvent>,
    start: u64,
    anchor: Option<PreviousHash>,
) -> Option<FailureReason> {
    if event.subject_id != first.subject_id {
        return Some(FailureReason::SubjectMismatch);
    }

    if event.sequence_number != position {
        return Some(FailureReason::SequenceMismatch);
    }

    if !event.hash_matches() {
        return Some(FailureReason::HashMismatch);
    }

    match prev {
        None if start == 0 => {
            if !event.previous_hash.is_genesis() {
                return Some(FailureReason::GenesisMismatch);
            }
        }
        None => {
            if let Some(expected) = anchor {
                if event.previous_hash != expected {
                    return Some(FailureReason::LinkBroken);
                }
            }
        }
        Some(p) => {
            if event.previous_hash != PreviousHash::Event(p.current_hash) {
                return Some(FailureReason::LinkBroken);
            }
            if event.occurred_at < p.occurred_at {
                return Some(FailureReason::TimestampRegression);
            }
        }
    }

    None
}
