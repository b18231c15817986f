//! # Custody Ledger Testkit
//!
//! Testing utilities for the custody ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed events with pinned canonical bytes and hashes
//! - **Generators**: Proptest strategies for content, events and whole chains
//! - **Fixtures**: A ledger on a manual clock, plus standard lifecycle content
//! - **Tampering**: Field-by-field mutations for integrity tests
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical encoding so that any implementation
//! produces the same bytes for the same event:
//!
//! ```rust
//! use custody_ledger_testkit::vectors::{all_vectors, build_event};
//!
//! for vector in all_vectors() {
//!     let event = build_event(&vector);
//!     assert_eq!(event.current_hash.to_hex(), vector.expected_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use custody_ledger_testkit::generators::valid_chain;
//!
//! proptest! {
//!     #[test]
//!     fn generated_chains_verify(chain in valid_chain(1..20)) {
//!         prop_assert!(custody_ledger_core::verify_chain(&chain).valid);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use custody_ledger_testkit::fixtures::{lifecycle, TestFixture};
//!
//! # async fn example() {
//! let fixture = TestFixture::memory();
//! let subject = fixture.subject("PKG-001");
//! for content in lifecycle() {
//!     fixture.ledger.append(&subject, content).await.unwrap();
//!     fixture.clock.advance_secs(60);
//! }
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod tamper;
pub mod vectors;

pub use fixtures::{content_for, init_tracing, lifecycle, ManualClock, TestFixture};
pub use generators::{chain_from_contents, event_content, valid_chain};
pub use tamper::{tamper, Tamper};
pub use vectors::{all_vectors, build_event, verify_all_vectors, GoldenVector};
