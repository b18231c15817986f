//! Single-field mutations of persisted events.
//!
//! Each mutation leaves `current_hash` alone, so the verifier must notice the
//! edit from the remaining fields.

use chrono::Duration;

use custody_ledger_core::{
    CustodyEvent, EventHash, EventPayload, PreviousHash, SubjectId, SubjectStatus,
    MAX_SUBJECT_ID_LEN,
};

/// Which field to mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tamper {
    SubjectId,
    SequenceNumber,
    Payload,
    EventType,
    OccurredAt,
    ActorName,
    ActorRole,
    Location,
    SubjectStatus,
    PreviousHash,
}

impl Tamper {
    pub const ALL: [Tamper; 10] = [
        Tamper::SubjectId,
        Tamper::SequenceNumber,
        Tamper::Payload,
        Tamper::EventType,
        Tamper::OccurredAt,
        Tamper::ActorName,
        Tamper::ActorRole,
        Tamper::Location,
        Tamper::SubjectStatus,
        Tamper::PreviousHash,
    ];
}

/// Apply one mutation in place.
pub fn tamper(event: &mut CustodyEvent, field: Tamper) {
    match field {
        Tamper::SubjectId => {
            let mut id = event.subject_id.as_str().to_string();
            flip_first_byte(&mut id);
            if id.len() > MAX_SUBJECT_ID_LEN {
                id = "~".into();
            }
            event.subject_id = SubjectId::new(id).unwrap_or_else(|e| panic!("{e}"));
        }
        Tamper::SequenceNumber => event.sequence_number = event.sequence_number.wrapping_add(1),
        Tamper::Payload => mutate_payload(&mut event.payload),
        Tamper::EventType => event.payload = swap_type(&event.payload),
        Tamper::OccurredAt => event.occurred_at += Duration::nanoseconds(1),
        Tamper::ActorName => event.actor.name.push('~'),
        Tamper::ActorRole => event.actor.role.push('~'),
        Tamper::Location => flip_first_byte(&mut event.location),
        Tamper::SubjectStatus => {
            event.subject_status = match event.subject_status {
                SubjectStatus::Open => SubjectStatus::Released,
                _ => SubjectStatus::Open,
            }
        }
        Tamper::PreviousHash => {
            event.previous_hash = match event.previous_hash {
                PreviousHash::Genesis => PreviousHash::Event(EventHash::ZERO),
                PreviousHash::Event(h) => {
                    let mut bytes = h.0;
                    bytes[0] ^= 0x01;
                    PreviousHash::Event(EventHash(bytes))
                }
            }
        }
    }
}

/// Flip one bit of the first byte, keeping the string valid UTF-8.
///
/// Empty strings and non-alphanumeric leads get a marker appended instead.
pub fn flip_first_byte(s: &mut String) {
    match s.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() => {
            let flipped = ((c as u8) ^ 0x01) as char;
            s.replace_range(..1, flipped.encode_utf8(&mut [0u8; 4]));
        }
        _ => s.push('~'),
    }
}

fn mutate_payload(payload: &mut EventPayload) {
    match payload {
        EventPayload::ContentAdded { quantity, .. } => *quantity = quantity.wrapping_add(1),
        EventPayload::LabelsPrinted { label_count, .. } => {
            *label_count = label_count.wrapping_add(1)
        }
        EventPayload::Inspected { passed, .. } => *passed = !*passed,
        EventPayload::SubjectCreated { reference: s, .. }
        | EventPayload::SubmittedForReview { reviewer: s }
        | EventPayload::ReviewRejected { reason: s }
        | EventPayload::Released { approved_by: s }
        | EventPayload::Sealed { seal_id: s }
        | EventPayload::Staged { bay: s }
        | EventPayload::Loaded { vehicle_id: s }
        | EventPayload::Shipped { carrier: s, .. }
        | EventPayload::Delivered { recipient: s }
        | EventPayload::Cancelled { reason: s } => s.push('~'),
    }
}

/// Relabel a payload as another event type, keeping its text where possible.
fn swap_type(payload: &EventPayload) -> EventPayload {
    match payload {
        EventPayload::Cancelled { reason } => EventPayload::ReviewRejected {
            reason: reason.clone(),
        },
        EventPayload::ReviewRejected { reason } => EventPayload::Cancelled {
            reason: reason.clone(),
        },
        EventPayload::Released { approved_by } => EventPayload::SubmittedForReview {
            reviewer: approved_by.clone(),
        },
        EventPayload::SubmittedForReview { reviewer } => EventPayload::Released {
            approved_by: reviewer.clone(),
        },
        EventPayload::Staged { bay } => EventPayload::Sealed {
            seal_id: bay.clone(),
        },
        EventPayload::Sealed { seal_id } => EventPayload::Staged {
            bay: seal_id.clone(),
        },
        EventPayload::Loaded { vehicle_id } => EventPayload::Delivered {
            recipient: vehicle_id.clone(),
        },
        EventPayload::Delivered { recipient } => EventPayload::Loaded {
            vehicle_id: recipient.clone(),
        },
        other => EventPayload::Cancelled {
            reason: format!("{other:?}"),
        },
    }
}
