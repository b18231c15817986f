//! Subject status transitions.
//!
//! Each event type declares the statuses it may follow and the status it
//! leaves the subject in. The table is static; the ledger consults it before
//! linking a new event.

use crate::error::TransitionError;
use crate::event::{EventType, SubjectStatus};

use SubjectStatus::*;

/// A row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Statuses the head must be in. Empty means the chain must be empty.
    pub from: &'static [SubjectStatus],
    /// Resulting status; `None` leaves the current status unchanged.
    pub to: Option<SubjectStatus>,
}

const CANCELLABLE: &[SubjectStatus] = &[Open, InReview, Released, Sealed, Staged, Loaded];

impl EventType {
    /// The transition rule for this event type.
    pub fn transition(self) -> Transition {
        let (from, to): (&'static [SubjectStatus], Option<SubjectStatus>) = match self {
            EventType::SubjectCreated => (&[], Some(Open)),
            EventType::ContentAdded => (&[Open], None),
            EventType::SubmittedForReview => (&[Open], Some(InReview)),
            EventType::ReviewRejected => (&[InReview], Some(Open)),
            EventType::Released => (&[InReview], Some(Released)),
            EventType::LabelsPrinted => (&[Released], None),
            EventType::Inspected => (&[Sealed, Staged, Loaded], None),
            EventType::Sealed => (&[Released], Some(Sealed)),
            EventType::Staged => (&[Sealed], Some(Staged)),
            EventType::Loaded => (&[Staged], Some(Loaded)),
            EventType::Shipped => (&[Loaded], Some(Shipped)),
            EventType::Delivered => (&[Shipped], Some(Delivered)),
            EventType::Cancelled => (CANCELLABLE, Some(Cancelled)),
        };
        Transition { from, to }
    }

    /// Whether this event may follow a head with the given status.
    pub fn may_follow(self, current: Option<SubjectStatus>) -> bool {
        let rule = self.transition();
        match current {
            None => rule.from.is_empty(),
            Some(status) => rule.from.contains(&status),
        }
    }

    /// Audit-only continuations allowed after a terminal status.
    pub fn continues_after_terminal(self, status: SubjectStatus) -> bool {
        matches!((status, self), (Shipped, EventType::Delivered))
    }

    /// The status after applying this event to a head in `current`.
    ///
    /// Returns `None` when the event leaves the status unchanged and there is
    /// no current status to keep.
    pub fn resulting_status(self, current: Option<SubjectStatus>) -> Option<SubjectStatus> {
        self.transition().to.or(current)
    }
}

/// Check an event type against the current head status.
///
/// Returns the status the subject will be in after the event.
pub fn check_transition(
    current: Option<SubjectStatus>,
    event_type: EventType,
) -> Result<SubjectStatus, TransitionError> {
    if let Some(status) = current {
        if status.is_terminal() && !event_type.continues_after_terminal(status) {
            return Err(TransitionError::ChainClosed { status, event_type });
        }
    }

    if !event_type.may_follow(current) {
        return Err(TransitionError::InvalidTransition {
            event_type,
            current,
        });
    }

    event_type
        .resulting_status(current)
        .ok_or(TransitionError::InvalidTransition {
            event_type,
            current,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_only_subject_created() {
        assert_eq!(check_transition(None, EventType::SubjectCreated), Ok(Open));
        for t in EventType::ALL {
            if t != EventType::SubjectCreated {
                assert!(matches!(
                    check_transition(None, t),
                    Err(TransitionError::InvalidTransition { current: None, .. })
                ));
            }
        }
    }

    #[test]
    fn test_subject_created_rejected_on_existing_chain() {
        assert!(matches!(
            check_transition(Some(Open), EventType::SubjectCreated),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_happy_path() {
        let path = [
            (EventType::SubjectCreated, Open),
            (EventType::ContentAdded, Open),
            (EventType::SubmittedForReview, InReview),
            (EventType::Released, Released),
            (EventType::LabelsPrinted, Released),
            (EventType::Sealed, Sealed),
            (EventType::Inspected, Sealed),
            (EventType::Staged, Staged),
            (EventType::Loaded, Loaded),
            (EventType::Shipped, Shipped),
            (EventType::Delivered, Delivered),
        ];

        let mut current = None;
        for (event_type, expected) in path {
            let next = check_transition(current, event_type).unwrap();
            assert_eq!(next, expected, "after {event_type:?}");
            current = Some(next);
        }
    }

    #[test]
    fn test_sealed_requires_released() {
        assert!(matches!(
            check_transition(Some(Open), EventType::Sealed),
            Err(TransitionError::InvalidTransition {
                event_type: EventType::Sealed,
                current: Some(Open),
            })
        ));
    }

    #[test]
    fn test_loaded_requires_staged() {
        assert!(check_transition(Some(Sealed), EventType::Loaded).is_err());
        assert_eq!(check_transition(Some(Staged), EventType::Loaded), Ok(Loaded));
    }

    #[test]
    fn test_review_rejection_reopens() {
        assert_eq!(
            check_transition(Some(InReview), EventType::ReviewRejected),
            Ok(Open)
        );
    }

    #[test]
    fn test_terminal_closes_chain() {
        for status in [Shipped, Delivered, Cancelled] {
            assert!(matches!(
                check_transition(Some(status), EventType::ContentAdded),
                Err(TransitionError::ChainClosed { .. })
            ));
        }
    }

    #[test]
    fn test_delivered_allowed_after_shipped_only_once() {
        assert_eq!(
            check_transition(Some(Shipped), EventType::Delivered),
            Ok(Delivered)
        );
        assert!(matches!(
            check_transition(Some(Delivered), EventType::Delivered),
            Err(TransitionError::ChainClosed { .. })
        ));
        assert!(matches!(
            check_transition(Some(Cancelled), EventType::Delivered),
            Err(TransitionError::ChainClosed { .. })
        ));
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        for status in CANCELLABLE {
            assert_eq!(
                check_transition(Some(*status), EventType::Cancelled),
                Ok(Cancelled)
            );
        }
    }
}
