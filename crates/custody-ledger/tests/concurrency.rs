//! Concurrent appenders against one subject never fork or skip a sequence.

use std::sync::Arc;

use custody_ledger::store::{LedgerStore, MemoryStore, SqliteStore};
use custody_ledger::{Ledger, LedgerConfig, LedgerError};
use custody_ledger_testkit::fixtures::{content_added, created, init_tracing, subject};

const APPENDERS: usize = 16;

fn contended_config() -> LedgerConfig {
    LedgerConfig {
        max_append_retries: 10_000,
        ..LedgerConfig::default()
    }
}

async fn concurrent_appends_are_contiguous<S: LedgerStore + 'static>(store: S) {
    init_tracing();
    let ledger = Arc::new(Ledger::new(store, contended_config()));
    let subject = subject("PKG-RACE");
    ledger.append(&subject, created("ORD-RACE")).await.unwrap();

    let mut handles = Vec::with_capacity(APPENDERS);
    for i in 0..APPENDERS {
        let ledger = ledger.clone();
        let subject = subject.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .append_with_retry(&subject, content_added(&format!("SKU-{i}"), i as u32))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let chain = ledger.get_chain(&subject).await.unwrap();
    assert_eq!(chain.len(), APPENDERS + 1);
    for (i, event) in chain.iter().enumerate() {
        assert_eq!(event.sequence_number, i as u64);
    }

    // Every appender's item landed exactly once.
    let mut quantities: Vec<u32> = chain[1..]
        .iter()
        .map(|e| match &e.payload {
            custody_ledger::EventPayload::ContentAdded { quantity, .. } => *quantity,
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    quantities.sort_unstable();
    assert_eq!(quantities, (0..APPENDERS as u32).collect::<Vec<_>>());

    let report = ledger.verify(&subject).await.unwrap();
    assert!(report.valid, "{report:?}");
    assert_eq!(report.events_checked, (APPENDERS + 1) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_memory() {
    concurrent_appends_are_contiguous(MemoryStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("race.db")).unwrap();
    concurrent_appends_are_contiguous(store).await;
}

/// Without retries, every call either lands or reports the conflict.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_attempt_appends_win_or_conflict() {
    let ledger = Arc::new(Ledger::new(MemoryStore::new(), LedgerConfig::default()));
    let subject = subject("PKG-ONESHOT");
    ledger.append(&subject, created("ORD-1")).await.unwrap();

    let mut handles = Vec::with_capacity(APPENDERS);
    for i in 0..APPENDERS {
        let ledger = ledger.clone();
        let subject = subject.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .append(&subject, content_added(&format!("SKU-{i}"), 1))
                .await
        }));
    }

    let mut landed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => landed += 1,
            Err(LedgerError::ConcurrentAppendConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let chain = ledger.get_chain(&subject).await.unwrap();
    assert!(landed >= 1);
    assert_eq!(chain.len(), landed + 1);
    assert!(ledger.verify(&subject).await.unwrap().valid);
}
