//! Error types for the custody ledger core.

use thiserror::Error;

use crate::event::{EventType, SubjectStatus};

/// Core errors that can occur while decoding ledger data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

/// Validation errors for event content supplied by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} exceeds maximum length of {max} bytes (got {len})")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("{0} contains control characters")]
    ControlCharacter(&'static str),
}

/// Rejections from the subject status transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{event_type:?} is not a legal successor of status {current:?}")]
    InvalidTransition {
        event_type: EventType,
        current: Option<SubjectStatus>,
    },

    #[error("chain is closed in terminal status {status:?}; {event_type:?} not allowed")]
    ChainClosed {
        status: SubjectStatus,
        event_type: EventType,
    },
}
