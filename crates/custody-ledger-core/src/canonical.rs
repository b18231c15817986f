//! Canonical CBOR encoding for deterministic hashing.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Every string is length-prefixed, so adjacent fields can never be confused
//! (`"ab" + "c"` and `"a" + "bc"` encode differently). The same event content
//! produces identical bytes, and thus identical hashes, on every platform.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::event::{Actor, CustodyEvent, EventPayload, EVENT_VERSION};
use crate::types::{PreviousHash, GENESIS_SENTINEL};

/// Event field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const SUBJECT_ID: u64 = 1;
    pub const SEQUENCE: u64 = 2;
    pub const EVENT_TYPE: u64 = 3;
    pub const PAYLOAD: u64 = 4;
    pub const OCCURRED_AT: u64 = 5;
    pub const ACTOR: u64 = 6;
    pub const LOCATION: u64 = 7;
    pub const STATUS: u64 = 8;
    pub const PREVIOUS_HASH: u64 = 9;
}

/// The CBOR subset an event is built from.
///
/// Only unsigned integers, strings, bools and integer-keyed maps occur in
/// the canonical form, so nothing else is representable.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Canon<'a> {
    Uint(u64),
    Bytes(&'a [u8]),
    Text(&'a str),
    OwnedText(String),
    Bool(bool),
    Map(Vec<(u64, Canon<'a>)>),
}

/// Encode every field of an event except `current_hash` to canonical bytes.
pub fn canonical_bytes(event: &CustodyEvent) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &event_to_canon(event));
    buf
}

/// Fixed timestamp serialization: RFC 3339, UTC, nine fractional digits.
pub fn canonical_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn text(s: &str) -> Canon<'_> {
    Canon::Text(s)
}

/// Map an event to its canonical value (map with integer keys).
fn event_to_canon(event: &CustodyEvent) -> Canon<'_> {
    let previous = match &event.previous_hash {
        PreviousHash::Genesis => text(GENESIS_SENTINEL),
        PreviousHash::Event(h) => Canon::Bytes(&h.0),
    };

    Canon::Map(vec![
        (keys::VERSION, Canon::Uint(EVENT_VERSION.into())),
        (keys::SUBJECT_ID, text(event.subject_id.as_str())),
        (keys::SEQUENCE, Canon::Uint(event.sequence_number)),
        (keys::EVENT_TYPE, Canon::Uint(event.event_type().to_u16().into())),
        (keys::PAYLOAD, payload_to_canon(&event.payload)),
        (keys::OCCURRED_AT, Canon::OwnedText(canonical_timestamp(&event.occurred_at))),
        (keys::ACTOR, actor_to_canon(&event.actor)),
        (keys::LOCATION, text(&event.location)),
        (keys::STATUS, Canon::Uint(event.subject_status.to_u16().into())),
        (keys::PREVIOUS_HASH, previous),
    ])
}

fn actor_to_canon(actor: &Actor) -> Canon<'_> {
    Canon::Map(vec![(0, text(&actor.name)), (1, text(&actor.role))])
}

/// Payload fields in a fixed per-variant order.
fn payload_to_canon(payload: &EventPayload) -> Canon<'_> {
    let fields: Vec<Canon<'_>> = match payload {
        EventPayload::SubjectCreated {
            reference,
            description,
        } => vec![text(reference), text(description)],
        EventPayload::ContentAdded {
            item_code,
            description,
            quantity,
        } => vec![text(item_code), text(description), Canon::Uint((*quantity).into())],
        EventPayload::SubmittedForReview { reviewer } => vec![text(reviewer)],
        EventPayload::ReviewRejected { reason } => vec![text(reason)],
        EventPayload::Released { approved_by } => vec![text(approved_by)],
        EventPayload::LabelsPrinted {
            label_count,
            document_ref,
        } => vec![Canon::Uint((*label_count).into()), text(document_ref)],
        EventPayload::Inspected { passed, notes } => vec![Canon::Bool(*passed), text(notes)],
        EventPayload::Sealed { seal_id } => vec![text(seal_id)],
        EventPayload::Staged { bay } => vec![text(bay)],
        EventPayload::Loaded { vehicle_id } => vec![text(vehicle_id)],
        EventPayload::Shipped {
            carrier,
            tracking_number,
        } => vec![text(carrier), text(tracking_number)],
        EventPayload::Delivered { recipient } => vec![text(recipient)],
        EventPayload::Cancelled { reason } => vec![text(reason)],
    };

    Canon::Map((0u64..).zip(fields).collect())
}

/// Recursively encode a canonical value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Canon<'_>) {
    match value {
        Canon::Uint(n) => encode_uint(buf, 0, *n),
        Canon::Bytes(b) => encode_bytes(buf, b),
        Canon::Text(s) => encode_text(buf, s),
        Canon::OwnedText(s) => encode_text(buf, s),
        Canon::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Canon::Map(entries) => encode_map_canonical(buf, entries),
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(u64, Canon<'_>)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Canon<'_>)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_uint(&mut key_buf, 0, *k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
