//! # Custody Ledger
//!
//! An append-only, hash-linked ledger of custody events for tracked units
//! (packages, pallets, anything with a chain of custody).
//!
//! ## Overview
//!
//! Every subject has its own chain. Each event's hash covers its content and
//! its predecessor's hash, so any retroactive edit breaks verification from
//! that event onward.
//!
//! - **Append**: validate, check the status transition, link, compare-and-swap
//! - **Verify**: replay hashing and linkage, report the first failure
//! - **Query/Export**: timeline with per-event verified flags, integrity
//!   report, JSON or plain-text audit export
//! - **Archive**: move a verified chain to cold storage and close it
//!
//! ## Key Concepts
//!
//! - **Event**: Immutable. Never edited. Corrections are new events.
//! - **Chain**: Per subject. Sequence numbers start at 0 and have no gaps.
//! - **Genesis**: The first event links to a sentinel, not a hash.
//! - **Terminal status**: Shipped, Delivered and Cancelled close the chain.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use custody_ledger::{Ledger, LedgerConfig};
//! use custody_ledger::core::{Actor, EventContent, EventPayload, SubjectId};
//! use custody_ledger::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("custody.db").unwrap();
//!     let ledger = Ledger::new(store, LedgerConfig::default());
//!
//!     let subject = SubjectId::new("PKG-001").unwrap();
//!     let content = EventContent::new(
//!         EventPayload::SubjectCreated {
//!             reference: "ORD-1".into(),
//!             description: "two boxes".into(),
//!         },
//!         Actor::new("alice", "packer"),
//!         "DOCK-1",
//!     );
//!     let event = ledger.append_with_retry(&subject, content).await.unwrap();
//!     assert_eq!(event.sequence_number, 0);
//!
//!     let report = ledger.verify(&subject).await.unwrap();
//!     assert!(report.valid);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `custody_ledger::core` - Core primitives (CustodyEvent, verifier, etc.)
//! - `custody_ledger::store` - Storage abstraction and SQLite

pub mod clock;
pub mod error;
pub mod ledger;
pub mod query;

// Re-export component crates
pub use custody_ledger_core as core;
pub use custody_ledger_store as store;

// Re-export main types for convenience
pub use clock::{Clock, SystemClock};
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerConfig, DEFAULT_MAX_APPEND_RETRIES};
pub use query::{AuditExport, BrokenEvent, ExportFormat, IntegrityReport, TimelineEntry};

// Re-export commonly used core types
pub use custody_ledger_core::{
    Actor, CustodyEvent, EventContent, EventHash, EventPayload, EventType, FailureReason,
    PreviousHash, StoredEvent, SubjectId, SubjectStatus, VerificationReport,
};
