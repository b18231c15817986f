//! # Custody Ledger Store
//!
//! Storage abstraction for the custody ledger. Provides a trait-based interface
//! for event persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts event storage behind the [`LedgerStore`] trait,
//! allowing the ledger to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`LedgerStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`AppendResult`] - Result of a compare-and-swap append
//! - [`HeadRef`] - Position and hash of a chain head
//!
//! ## Usage
//!
//! ```rust,no_run
//! use custody_ledger_store::{LedgerStore, SqliteStore};
//! use custody_ledger_core::SubjectId;
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("custody.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let subject = SubjectId::new("PKG-001").unwrap();
//!     let chain = store.get_chain(&subject).await.unwrap();
//!     assert!(chain.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Compare-and-swap**: an append wins only against the head it was built on
//! - **Per-subject isolation**: chains for different subjects never contend
//! - **Pooled connections**: SQLite reads and appends each run on their own
//!   connection; a file database runs in WAL mode
//! - **Damaged rows**: [`LedgerStore::get_stored_chain`] returns rows that no
//!   longer decode as [`StoredEvent::Corrupt`] so they can still be verified
//! - **Immutability**: SQLite triggers reject any UPDATE or DELETE of an event

pub mod error;
pub mod memory;
pub mod migration;
mod pool;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use custody_ledger_core::StoredEvent;
pub use sqlite::SqliteStore;
pub use traits::{is_successor, AppendResult, HeadRef, LedgerStore};
