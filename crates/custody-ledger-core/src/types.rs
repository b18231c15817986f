//! Strong type definitions for the custody ledger.
//!
//! Identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::crypto::EventHash;
use crate::error::ValidationError;

/// Maximum length of a subject identifier, in bytes.
pub const MAX_SUBJECT_ID_LEN: usize = 128;

/// Wire and canonical spelling of the genesis sentinel.
pub const GENESIS_SENTINEL: &str = "GENESIS";

/// Identifier of a tracked unit (e.g. a package).
///
/// All chain linkage is scoped per subject.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a subject id, rejecting empty, oversized or control-character ids.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyField("subject_id"));
        }
        if id.len() > MAX_SUBJECT_ID_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "subject_id",
                max: MAX_SUBJECT_ID_LEN,
                len: id.len(),
            });
        }
        if id.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacter("subject_id"));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Link from an event to its predecessor.
///
/// `Genesis` is a reserved sentinel, not a hash value: it can never compare
/// equal to any `EventHash`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviousHash {
    /// The event is the first in its subject's chain.
    Genesis,
    /// The `current_hash` of the prior event.
    Event(EventHash),
}

impl PreviousHash {
    /// Check if this is the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        matches!(self, PreviousHash::Genesis)
    }

    /// The linked hash, if any.
    pub fn hash(&self) -> Option<&EventHash> {
        match self {
            PreviousHash::Genesis => None,
            PreviousHash::Event(h) => Some(h),
        }
    }

    /// Wire representation: `"GENESIS"` or 64 hex characters.
    pub fn to_wire(&self) -> String {
        match self {
            PreviousHash::Genesis => GENESIS_SENTINEL.to_string(),
            PreviousHash::Event(h) => h.to_hex(),
        }
    }

    /// Parse the wire representation.
    pub fn from_wire(s: &str) -> Result<Self, crate::error::CoreError> {
        if s == GENESIS_SENTINEL {
            Ok(PreviousHash::Genesis)
        } else {
            EventHash::from_hex(s).map(PreviousHash::Event)
        }
    }
}

impl From<EventHash> for PreviousHash {
    fn from(hash: EventHash) -> Self {
        PreviousHash::Event(hash)
    }
}

impl fmt::Debug for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHash::Genesis => f.write_str("Genesis"),
            PreviousHash::Event(h) => write!(f, "Event({})", h.short()),
        }
    }
}

impl fmt::Display for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl Serialize for PreviousHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for PreviousHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PreviousHash::from_wire(&s).map_err(serde::de::Error::custom)
    }
}
