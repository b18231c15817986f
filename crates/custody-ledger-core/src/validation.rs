//! Content validation: structural checks on collaborator-supplied content.
//!
//! Runs before any hashing or storage so malformed input never reaches a chain.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::EventContent;
use crate::types::MAX_SUBJECT_ID_LEN;

/// Default maximum length of a free-text field, in bytes.
pub const DEFAULT_MAX_TEXT_LEN: usize = 1024;

/// Field length limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentLimits {
    /// Maximum subject id length. Never above [`MAX_SUBJECT_ID_LEN`].
    pub max_subject_id_len: usize,
    /// Maximum length of every other text field.
    pub max_text_len: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_subject_id_len: MAX_SUBJECT_ID_LEN,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

/// Validate event content against the given limits.
///
/// This performs:
/// - Actor name presence
/// - Control character checks on single-line fields (actor, location)
/// - Length checks on every text field, payload included
pub fn validate_content(content: &EventContent, limits: &ContentLimits) -> Result<(), ValidationError> {
    if content.actor.name.trim().is_empty() {
        return Err(ValidationError::EmptyField("actor.name"));
    }

    let single_line = [
        ("actor.name", content.actor.name.as_str()),
        ("actor.role", content.actor.role.as_str()),
        ("location", content.location.as_str()),
    ];
    for (field, value) in single_line {
        check_len(field, value, limits.max_text_len)?;
        if value.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacter(field));
        }
    }

    for (field, value) in content.payload.text_fields() {
        check_len(field, value, limits.max_text_len)?;
    }

    Ok(())
}

/// Validate a subject id against configured limits.
///
/// [`crate::SubjectId::new`] already enforces the hard maximum; this applies
/// a tighter configured one.
pub fn validate_subject_len(subject_id: &str, limits: &ContentLimits) -> Result<(), ValidationError> {
    check_len("subject_id", subject_id, limits.max_subject_id_len.min(MAX_SUBJECT_ID_LEN))
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.len() > max {
        return Err(ValidationError::FieldTooLong {
            field,
            max,
            len: value.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Actor, EventPayload};

    fn content() -> EventContent {
        EventContent::new(
            EventPayload::Sealed {
                seal_id: "SEAL-1".into(),
            },
            Actor::new("alice", "packer"),
            "DOCK-1",
        )
    }

    #[test]
    fn test_valid_content() {
        assert!(validate_content(&content(), &ContentLimits::default()).is_ok());
    }

    #[test]
    fn test_empty_actor_name() {
        let mut c = content();
        c.actor.name = "  ".into();
        assert_eq!(
            validate_content(&c, &ContentLimits::default()),
            Err(ValidationError::EmptyField("actor.name"))
        );
    }

    #[test]
    fn test_control_character_in_location() {
        let mut c = content();
        c.location = "DOCK\r\n1".into();
        assert_eq!(
            validate_content(&c, &ContentLimits::default()),
            Err(ValidationError::ControlCharacter("location"))
        );
    }

    #[test]
    fn test_payload_field_too_long() {
        let mut c = content();
        c.payload = EventPayload::Sealed {
            seal_id: "s".repeat(33),
        };
        let limits = ContentLimits {
            max_text_len: 32,
            ..ContentLimits::default()
        };
        assert_eq!(
            validate_content(&c, &limits),
            Err(ValidationError::FieldTooLong {
                field: "seal_id",
                max: 32,
                len: 33
            })
        );
    }

    #[test]
    fn test_multiline_notes_allowed() {
        let mut c = content();
        c.payload = EventPayload::Inspected {
            passed: true,
            notes: "line one\nline two".into(),
        };
        assert!(validate_content(&c, &ContentLimits::default()).is_ok());
    }

    #[test]
    fn test_subject_len_limit() {
        let limits = ContentLimits {
            max_subject_id_len: 8,
            ..ContentLimits::default()
        };
        assert!(validate_subject_len("PKG-0001", &limits).is_ok());
        assert!(validate_subject_len("PKG-00001", &limits).is_err());
    }
}
