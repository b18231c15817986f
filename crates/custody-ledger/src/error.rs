//! Error types for the Ledger.

use custody_ledger_core::{
    EventType, FailureReason, SubjectId, SubjectStatus, TransitionError, ValidationError,
};
use custody_ledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Ledger operations.
///
/// Verification findings are never errors; they come back as a
/// [`custody_ledger_core::VerificationReport`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The event type may not follow the subject's current status.
    #[error("{event_type:?} is not a legal successor of status {current:?} for subject {subject_id}")]
    InvalidTransition {
        subject_id: SubjectId,
        event_type: EventType,
        current: Option<SubjectStatus>,
    },

    /// The subject is in a terminal status.
    #[error("chain for subject {subject_id} is closed ({status:?}); {event_type:?} not allowed")]
    ChainClosed {
        subject_id: SubjectId,
        status: SubjectStatus,
        event_type: EventType,
    },

    /// The head moved between read and write. Safe to retry.
    #[error("concurrent append to subject {subject_id} at sequence {expected_sequence}")]
    ConcurrentAppendConflict {
        subject_id: SubjectId,
        expected_sequence: u64,
    },

    /// The chain has been archived and accepts no appends.
    #[error("subject {0} is archived")]
    SubjectArchived(SubjectId),

    /// The operation needs an existing chain.
    #[error("subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// A chain failed verification where an intact one is required.
    #[error("chain for subject {subject_id} failed verification at event {index:?}: {reason:?}")]
    IntegrityFailure {
        subject_id: SubjectId,
        index: Option<u64>,
        reason: Option<FailureReason>,
    },

    /// The archive target already holds a different event at this position.
    #[error("archive of subject {subject_id} diverges at sequence {sequence}")]
    ArchiveMismatch { subject_id: SubjectId, sequence: u64 },

    /// Unknown export format name.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Configuration or export serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Attach the subject to a transition table rejection.
    pub fn from_transition(subject_id: &SubjectId, err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition {
                event_type,
                current,
            } => LedgerError::InvalidTransition {
                subject_id: subject_id.clone(),
                event_type,
                current,
            },
            TransitionError::ChainClosed { status, event_type } => LedgerError::ChainClosed {
                subject_id: subject_id.clone(),
                status,
                event_type,
            },
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrentAppendConflict { .. })
    }
}

/// Result type for Ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
