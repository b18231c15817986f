//! # Custody Ledger Core
//!
//! Pure primitives for the custody ledger: events, canonicalization, hash
//! chaining, status transitions and verification.
//!
//! This crate contains no I/O and no storage. It is pure computation over
//! hash-linked event chains.
//!
//! ## Key Types
//!
//! - [`CustodyEvent`] - The atomic, immutable unit of a subject's chain
//! - [`SubjectId`] - Identifier of a tracked unit; chains are scoped per subject
//! - [`EventHash`] - Blake3 digest of an event's canonical bytes
//! - [`PreviousHash`] - Link to the predecessor, or the genesis sentinel
//! - [`VerificationReport`] - Outcome of replaying a chain
//!
//! ## Canonicalization
//!
//! Events are hashed over deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod event;
pub mod transitions;
pub mod types;
pub mod validation;
pub mod verify;

pub use canonical::{canonical_bytes, canonical_timestamp};
pub use chain::{compute_event_hash, compute_hash, link_new_event};
pub use crypto::EventHash;
pub use error::{CoreError, TransitionError, ValidationError};
pub use event::{
    Actor, CustodyEvent, EventBuilder, EventContent, EventPayload, EventType, SubjectStatus,
    EVENT_VERSION,
};
pub use transitions::{check_transition, Transition};
pub use types::{PreviousHash, SubjectId, GENESIS_SENTINEL, MAX_SUBJECT_ID_LEN};
pub use validation::{validate_content, validate_subject_len, ContentLimits, DEFAULT_MAX_TEXT_LEN};
pub use verify::{
    verify_chain, verify_stored, verify_window, FailureReason, StoredEvent, VerificationReport,
};
