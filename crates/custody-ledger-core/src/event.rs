//! Custody event: the atomic unit of the ledger.
//!
//! An event is immutable once persisted. Corrections are represented as new
//! events appended to the subject's chain, never as edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::compute_event_hash;
use crate::crypto::EventHash;
use crate::types::{PreviousHash, SubjectId};

/// The current canonical schema version.
pub const EVENT_VERSION: u8 = 0;

/// The kind of custody event, determining the payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventType {
    SubjectCreated = 1,
    ContentAdded = 2,
    SubmittedForReview = 3,
    ReviewRejected = 4,
    Released = 5,
    LabelsPrinted = 6,
    Inspected = 7,
    Sealed = 8,
    Staged = 9,
    Loaded = 10,
    Shipped = 11,
    Delivered = 12,
    Cancelled = 13,
}

impl EventType {
    /// Every event type, in code order.
    pub const ALL: [EventType; 13] = [
        EventType::SubjectCreated,
        EventType::ContentAdded,
        EventType::SubmittedForReview,
        EventType::ReviewRejected,
        EventType::Released,
        EventType::LabelsPrinted,
        EventType::Inspected,
        EventType::Sealed,
        EventType::Staged,
        EventType::Loaded,
        EventType::Shipped,
        EventType::Delivered,
        EventType::Cancelled,
    ];

    /// Convert to u16 for serialization.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.to_u16() == value)
    }
}

/// The subject's state after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum SubjectStatus {
    Open = 1,
    InReview = 2,
    Released = 3,
    Sealed = 4,
    Staged = 5,
    Loaded = 6,
    Shipped = 7,
    Delivered = 8,
    Cancelled = 9,
}

impl SubjectStatus {
    /// Every status, in code order.
    pub const ALL: [SubjectStatus; 9] = [
        SubjectStatus::Open,
        SubjectStatus::InReview,
        SubjectStatus::Released,
        SubjectStatus::Sealed,
        SubjectStatus::Staged,
        SubjectStatus::Loaded,
        SubjectStatus::Shipped,
        SubjectStatus::Delivered,
        SubjectStatus::Cancelled,
    ];

    /// Convert to u16 for serialization.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.to_u16() == value)
    }

    /// Wire spelling, as in JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectStatus::Open => "OPEN",
            SubjectStatus::InReview => "IN_REVIEW",
            SubjectStatus::Released => "RELEASED",
            SubjectStatus::Sealed => "SEALED",
            SubjectStatus::Staged => "STAGED",
            SubjectStatus::Loaded => "LOADED",
            SubjectStatus::Shipped => "SHIPPED",
            SubjectStatus::Delivered => "DELIVERED",
            SubjectStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal statuses close the chain to ordinary appends.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubjectStatus::Shipped | SubjectStatus::Delivered | SubjectStatus::Cancelled
        )
    }
}

/// Identity and role of whoever triggered an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub role: String,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

/// Type-specific payload, keyed by event type.
///
/// Each variant has a fixed field set so canonicalization never depends on
/// dynamic key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "payload", rename_all_fields = "camelCase")]
pub enum EventPayload {
    SubjectCreated {
        reference: String,
        description: String,
    },
    ContentAdded {
        item_code: String,
        description: String,
        quantity: u32,
    },
    SubmittedForReview {
        reviewer: String,
    },
    ReviewRejected {
        reason: String,
    },
    Released {
        approved_by: String,
    },
    LabelsPrinted {
        label_count: u32,
        document_ref: String,
    },
    Inspected {
        passed: bool,
        notes: String,
    },
    Sealed {
        seal_id: String,
    },
    Staged {
        bay: String,
    },
    Loaded {
        vehicle_id: String,
    },
    Shipped {
        carrier: String,
        tracking_number: String,
    },
    Delivered {
        recipient: String,
    },
    Cancelled {
        reason: String,
    },
}

impl EventPayload {
    /// The event type this payload belongs to.
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::SubjectCreated { .. } => EventType::SubjectCreated,
            EventPayload::ContentAdded { .. } => EventType::ContentAdded,
            EventPayload::SubmittedForReview { .. } => EventType::SubmittedForReview,
            EventPayload::ReviewRejected { .. } => EventType::ReviewRejected,
            EventPayload::Released { .. } => EventType::Released,
            EventPayload::LabelsPrinted { .. } => EventType::LabelsPrinted,
            EventPayload::Inspected { .. } => EventType::Inspected,
            EventPayload::Sealed { .. } => EventType::Sealed,
            EventPayload::Staged { .. } => EventType::Staged,
            EventPayload::Loaded { .. } => EventType::Loaded,
            EventPayload::Shipped { .. } => EventType::Shipped,
            EventPayload::Delivered { .. } => EventType::Delivered,
            EventPayload::Cancelled { .. } => EventType::Cancelled,
        }
    }

    /// Text fields of the payload, by name.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            EventPayload::SubjectCreated {
                reference,
                description,
            } => vec![("reference", reference), ("description", description)],
            EventPayload::ContentAdded {
                item_code,
                description,
                ..
            } => vec![("item_code", item_code), ("description", description)],
            EventPayload::SubmittedForReview { reviewer } => vec![("reviewer", reviewer)],
            EventPayload::ReviewRejected { reason } | EventPayload::Cancelled { reason } => {
                vec![("reason", reason)]
            }
            EventPayload::Released { approved_by } => vec![("approved_by", approved_by)],
            EventPayload::LabelsPrinted { document_ref, .. } => {
                vec![("document_ref", document_ref)]
            }
            EventPayload::Inspected { notes, .. } => vec![("notes", notes)],
            EventPayload::Sealed { seal_id } => vec![("seal_id", seal_id)],
            EventPayload::Staged { bay } => vec![("bay", bay)],
            EventPayload::Loaded { vehicle_id } => vec![("vehicle_id", vehicle_id)],
            EventPayload::Shipped {
                carrier,
                tracking_number,
            } => vec![("carrier", carrier), ("tracking_number", tracking_number)],
            EventPayload::Delivered { recipient } => vec![("recipient", recipient)],
        }
    }
}

/// What a collaborator supplies to append an event.
///
/// Sequence number, timestamp, status and hashes are assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContent {
    pub payload: EventPayload,
    pub actor: Actor,
    pub location: String,
}

impl EventContent {
    pub fn new(payload: EventPayload, actor: Actor, location: impl Into<String>) -> Self {
        Self {
            payload,
            actor,
            location: location.into(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// A persisted custody event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyEvent {
    /// The tracked unit this event belongs to.
    pub subject_id: SubjectId,

    /// Position in the subject's chain (0 = genesis).
    pub sequence_number: u64,

    /// Type-specific payload (carries the event type tag).
    #[serde(flatten)]
    pub payload: EventPayload,

    /// Append time, assigned by the ledger.
    pub occurred_at: DateTime<Utc>,

    pub actor: Actor,

    pub location: String,

    /// The subject's status after this event.
    pub subject_status: SubjectStatus,

    /// Hash of the prior event, or the genesis sentinel.
    pub previous_hash: PreviousHash,

    /// Blake3 of the canonical bytes of every other field.
    pub current_hash: EventHash,
}

impl CustodyEvent {
    /// The event type.
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Check if this is the first event in its chain.
    pub fn is_genesis(&self) -> bool {
        self.sequence_number == 0
    }

    /// Recompute the hash from this event's own fields.
    pub fn recompute_hash(&self) -> EventHash {
        compute_event_hash(self)
    }

    /// Check that the stored hash matches the event's content.
    pub fn hash_matches(&self) -> bool {
        self.recompute_hash() == self.current_hash
    }

    /// The collaborator-supplied part of the event.
    pub fn content(&self) -> EventContent {
        EventContent {
            payload: self.payload.clone(),
            actor: self.actor.clone(),
            location: self.location.clone(),
        }
    }
}

/// Builder for sealing events.
///
/// Used by the hash chain engine and by tests that craft chains by hand.
pub struct EventBuilder {
    subject_id: SubjectId,
    sequence_number: u64,
    payload: EventPayload,
    occurred_at: DateTime<Utc>,
    actor: Actor,
    location: String,
    subject_status: Option<SubjectStatus>,
    previous_status: Option<SubjectStatus>,
    previous_hash: PreviousHash,
}

impl EventBuilder {
    /// Start building a genesis-position event.
    pub fn new(subject_id: SubjectId, payload: EventPayload) -> Self {
        Self {
            subject_id,
            sequence_number: 0,
            payload,
            occurred_at: DateTime::<Utc>::UNIX_EPOCH,
            actor: Actor::new("", ""),
            location: String::new(),
            subject_status: None,
            previous_status: None,
            previous_hash: PreviousHash::Genesis,
        }
    }

    /// Start from collaborator content.
    pub fn from_content(subject_id: SubjectId, content: EventContent) -> Self {
        Self::new(subject_id, content.payload)
            .actor(content.actor)
            .location(content.location)
    }

    /// Link after the given event: next sequence number, its hash as previous.
    pub fn follows(mut self, previous: &CustodyEvent) -> Self {
        self.sequence_number = previous.sequence_number + 1;
        self.previous_hash = PreviousHash::Event(previous.current_hash);
        self.previous_status = Some(previous.subject_status);
        self
    }

    /// Set the sequence number explicitly.
    pub fn sequence(mut self, sequence_number: u64) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    /// Set the previous hash explicitly.
    pub fn previous(mut self, previous_hash: PreviousHash) -> Self {
        self.previous_hash = previous_hash;
        self
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = at;
        self
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Override the resulting status.
    ///
    /// Defaults to what the transition table yields after the followed event.
    pub fn status(mut self, status: SubjectStatus) -> Self {
        self.subject_status = Some(status);
        self
    }

    /// Compute the hash and produce the event.
    pub fn seal(self) -> CustodyEvent {
        let event_type = self.payload.event_type();
        let subject_status = self.subject_status.unwrap_or_else(|| {
            event_type
                .resulting_status(self.previous_status)
                .unwrap_or(SubjectStatus::Open)
        });

        let mut event = CustodyEvent {
            subject_id: self.subject_id,
            sequence_number: self.sequence_number,
            payload: self.payload,
            occurred_at: self.occurred_at,
            actor: self.actor,
            location: self.location,
            subject_status,
            previous_hash: self.previous_hash,
            current_hash: EventHash::ZERO,
        };
        event.current_hash = compute_event_hash(&event);
        event
    }
}
