//! Hash chain engine: computes event hashes and links new events to the head.
//!
//! Deterministic and side-effect free. Persisting the result is the store's job.

use chrono::{DateTime, Utc};

use crate::canonical::canonical_bytes;
use crate::crypto::EventHash;
use crate::event::{CustodyEvent, EventBuilder, EventContent, SubjectStatus};
use crate::types::SubjectId;

/// Hash canonical bytes.
pub fn compute_hash(canonical: &[u8]) -> EventHash {
    EventHash::hash(canonical)
}

/// Hash an event's canonical form (every field except `current_hash`).
pub fn compute_event_hash(event: &CustodyEvent) -> EventHash {
    compute_hash(&canonical_bytes(event))
}

/// Produce the next event for a subject.
///
/// With no previous event the result is the genesis event (sequence 0,
/// genesis sentinel). Otherwise it takes the next sequence number and links
/// to the previous event's `current_hash`.
pub fn link_new_event(
    previous: Option<&CustodyEvent>,
    subject_id: SubjectId,
    content: EventContent,
    occurred_at: DateTime<Utc>,
    subject_status: SubjectStatus,
) -> CustodyEvent {
    let builder = EventBuilder::from_content(subject_id, content)
        .occurred_at(occurred_at)
        .status(subject_status);

    match previous {
        Some(prev) => builder.follows(prev).seal(),
        None => builder.seal(),
    }
}
