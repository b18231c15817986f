//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the canonical bytes and the Blake3 hash of one event.
//! Any implementation of the canonical form must reproduce both exactly.

use chrono::{DateTime, Utc};
use serde::Serialize;

use custody_ledger_core::{
    canonical_bytes, Actor, CustodyEvent, EventBuilder, EventHash, EventPayload, PreviousHash,
    SubjectId, SubjectStatus,
};

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub subject_id: &'static str,
    pub sequence_number: u64,
    pub payload: EventPayload,
    /// RFC 3339 append time.
    pub occurred_at: &'static str,
    pub actor_name: &'static str,
    pub actor_role: &'static str,
    pub location: &'static str,
    pub subject_status: SubjectStatus,
    /// Hex of the previous hash; `None` for genesis.
    pub previous_hash: Option<&'static str>,
    /// Expected canonical bytes (hex).
    pub expected_canonical: &'static str,
    /// Expected event hash (hex).
    pub expected_hash: &'static str,
}

const GENESIS_HASH: &str = "793139e08ac4b5fe140d3ad60e72c72c8eb03afe8a1533ceeb695596aebb0473";

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "Genesis SubjectCreated",
            subject_id: "PKG-001",
            sequence_number: 0,
            payload: EventPayload::SubjectCreated {
                reference: "ORD-1001".into(),
                description: "two boxes, fragile".into(),
            },
            occurred_at: "2026-01-14T12:00:00Z",
            actor_name: "alice",
            actor_role: "packer",
            location: "DOCK-1",
            subject_status: SubjectStatus::Open,
            previous_hash: None,
            expected_canonical: concat!(
                "aa00000167504b472d3030310200030104a200684f52442d31303031017274776f",
                "20626f7865732c2066726167696c6505781e323032362d30312d31345431323a30",
                "303a30302e3030303030303030305a06a20065616c69636501667061636b657207",
                "66444f434b2d310801096747454e45534953",
            ),
            expected_hash: GENESIS_HASH,
        },
        GoldenVector {
            name: "SubmittedForReview linked to genesis, nanosecond time",
            subject_id: "PKG-001",
            sequence_number: 1,
            payload: EventPayload::SubmittedForReview {
                reviewer: "bob".into(),
            },
            occurred_at: "2026-01-14T12:05:00.123456789Z",
            actor_name: "alice",
            actor_role: "packer",
            location: "DOCK-1",
            subject_status: SubjectStatus::InReview,
            previous_hash: Some(GENESIS_HASH),
            expected_canonical: concat!(
                "aa00000167504b472d3030310201030304a10063626f6205781e323032362d3031",
                "2d31345431323a30353a30302e3132333435363738395a06a20065616c69636501",
                "667061636b65720766444f434b2d310802095820793139e08ac4b5fe140d3ad60e",
                "72c72c8eb03afe8a1533ceeb695596aebb0473",
            ),
            expected_hash: "628a461f632ba1323f29f681d0973124d32385971f14a526f41371693e1e1f11",
        },
        GoldenVector {
            name: "Failed inspection with multi-line notes and non-ASCII location",
            subject_id: "PKG-042",
            sequence_number: 24,
            payload: EventPayload::Inspected {
                passed: false,
                notes: "seal intact\nlabel torn".into(),
            },
            occurred_at: "2026-02-01T08:30:15.000000001Z",
            actor_name: "dana",
            actor_role: "inspector",
            location: "Bay \u{dc}-7",
            subject_status: SubjectStatus::Sealed,
            previous_hash: Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            expected_canonical: concat!(
                "aa00000167504b472d303432021818030704a200f401767365616c20696e746163",
                "740a6c6162656c20746f726e05781e323032362d30322d30315430383a33303a31",
                "352e3030303030303030315a06a2006464616e610169696e73706563746f720768",
                "42617920c39c2d370804095820aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "aaaaaaaaaaaaaaaaaaaaaaaa",
            ),
            expected_hash: "d22af75391dbb631d76e9b8e9291cc2170d88e8bb6e6dedb25d72a26bc9329e4",
        },
        GoldenVector {
            name: "Empty actor and location, multi-byte integers",
            subject_id: "PKG-042",
            sequence_number: 300,
            payload: EventPayload::ContentAdded {
                item_code: "SKU-9".into(),
                description: "widget".into(),
                quantity: 65536,
            },
            occurred_at: "1970-01-01T00:00:00Z",
            actor_name: "",
            actor_role: "",
            location: "",
            subject_status: SubjectStatus::Open,
            previous_hash: Some("0000000000000000000000000000000000000000000000000000000000000000"),
            expected_canonical: concat!(
                "aa00000167504b472d3034320219012c030204a30065534b552d39016677696467",
                "6574021a0001000005781e313937302d30312d30315430303a30303a30302e3030",
                "303030303030305a06a20060016007600801095820000000000000000000000000",
                "0000000000000000000000000000000000000000",
            ),
            expected_hash: "47999303f5f3a932e5b25d35678a948f0d675edc9ef66ffb1ba3f4b53771afb0",
        },
    ]
}

/// Seal the event a golden vector describes.
pub fn build_event(vector: &GoldenVector) -> CustodyEvent {
    let subject = SubjectId::new(vector.subject_id)
        .unwrap_or_else(|e| panic!("vector '{}': {e}", vector.name));
    let occurred_at = DateTime::parse_from_rfc3339(vector.occurred_at)
        .unwrap_or_else(|e| panic!("vector '{}': {e}", vector.name))
        .with_timezone(&Utc);
    let previous = match vector.previous_hash {
        None => PreviousHash::Genesis,
        Some(hex) => PreviousHash::Event(
            EventHash::from_hex(hex).unwrap_or_else(|e| panic!("vector '{}': {e}", vector.name)),
        ),
    };

    EventBuilder::new(subject, vector.payload.clone())
        .sequence(vector.sequence_number)
        .previous(previous)
        .occurred_at(occurred_at)
        .actor(Actor::new(vector.actor_name, vector.actor_role))
        .location(vector.location)
        .status(vector.subject_status)
        .seal()
}

/// Check every vector's canonical bytes and hash.
///
/// Returns `(name, matches, actual hash hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let event = build_event(v);
            let canonical = hex::encode(canonical_bytes(&event));
            let hash = event.current_hash.to_hex();
            let matches = canonical == v.expected_canonical && hash == v.expected_hash;
            (v.name.to_string(), matches, hash)
        })
        .collect()
}

/// All vectors as pretty JSON, for other implementations to consume.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_ledger_core::verify_chain;

    #[test]
    fn test_golden_vectors_match() {
        for (name, matches, hash) in verify_all_vectors() {
            assert!(matches, "vector '{name}' drifted, got hash {hash}");
        }
    }

    #[test]
    fn test_canonical_bytes_match_exactly() {
        for vector in all_vectors() {
            let event = build_event(&vector);
            assert_eq!(
                hex::encode(canonical_bytes(&event)),
                vector.expected_canonical,
                "vector '{}'",
                vector.name
            );
        }
    }

    #[test]
    fn test_first_two_vectors_form_a_chain() {
        let vectors = all_vectors();
        let chain = vec![build_event(&vectors[0]), build_event(&vectors[1])];
        let report = verify_chain(&chain);
        assert!(report.valid, "{report:?}");
        assert_eq!(report.events_checked, 2);
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let a = build_event(&vector);
            let b = build_event(&vector);
            assert_eq!(a.current_hash, b.current_hash, "vector '{}'", vector.name);
        }
    }

    #[test]
    fn test_vectors_json() {
        let json = vectors_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(all_vectors().len()));
        assert_eq!(parsed[0]["expectedHash"], GENESIS_HASH);
    }
}
