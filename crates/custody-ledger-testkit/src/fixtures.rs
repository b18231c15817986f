//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use custody_ledger::{Clock, Ledger, LedgerConfig};
use custody_ledger_core::{Actor, EventContent, EventPayload, EventType, SubjectId};
use custody_ledger_store::{LedgerStore, MemoryStore, SqliteStore};

/// 2026-01-14T12:00:00Z, the default start of every fixture clock.
pub fn fixture_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute instant (may go backwards).
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(fixture_epoch())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A ledger wired to a manual clock.
pub struct TestFixture<S: LedgerStore> {
    pub ledger: Ledger<S>,
    pub clock: Arc<ManualClock>,
}

impl TestFixture<MemoryStore> {
    /// Ledger over an in-memory store.
    pub fn memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl TestFixture<SqliteStore> {
    /// Ledger over an in-memory SQLite database.
    pub fn sqlite() -> Self {
        let store = SqliteStore::open_memory().unwrap_or_else(|e| panic!("open sqlite: {e}"));
        Self::with_store(store)
    }
}

impl<S: LedgerStore> TestFixture<S> {
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let ledger = Ledger::with_clock(store, clock.clone(), config);
        Self { ledger, clock }
    }

    /// Parse a subject id, panicking on invalid input.
    pub fn subject(&self, id: &str) -> SubjectId {
        subject(id)
    }

    /// Append every content in order, one minute apart.
    pub async fn append_all(
        &self,
        subject_id: &SubjectId,
        contents: impl IntoIterator<Item = EventContent>,
    ) -> custody_ledger::Result<u64> {
        let mut appended = 0;
        for content in contents {
            self.ledger.append(subject_id, content).await?;
            self.clock.advance_secs(60);
            appended += 1;
        }
        Ok(appended)
    }
}

/// Parse a subject id, panicking on invalid input.
pub fn subject(id: &str) -> SubjectId {
    SubjectId::new(id).unwrap_or_else(|e| panic!("invalid subject id {id:?}: {e}"))
}

fn staff(name: &str, role: &str, location: &str, payload: EventPayload) -> EventContent {
    EventContent::new(payload, Actor::new(name, role), location)
}

pub fn created(reference: &str) -> EventContent {
    staff(
        "alice",
        "packer",
        "DOCK-1",
        EventPayload::SubjectCreated {
            reference: reference.into(),
            description: "two boxes, fragile".into(),
        },
    )
}

pub fn content_added(item_code: &str, quantity: u32) -> EventContent {
    staff(
        "alice",
        "packer",
        "DOCK-1",
        EventPayload::ContentAdded {
            item_code: item_code.into(),
            description: format!("item {item_code}"),
            quantity,
        },
    )
}

pub fn submitted() -> EventContent {
    staff(
        "alice",
        "packer",
        "DOCK-1",
        EventPayload::SubmittedForReview {
            reviewer: "bob".into(),
        },
    )
}

pub fn rejected(reason: &str) -> EventContent {
    staff(
        "bob",
        "supervisor",
        "OFFICE",
        EventPayload::ReviewRejected {
            reason: reason.into(),
        },
    )
}

pub fn released() -> EventContent {
    staff(
        "bob",
        "supervisor",
        "OFFICE",
        EventPayload::Released {
            approved_by: "bob".into(),
        },
    )
}

pub fn labels_printed() -> EventContent {
    staff(
        "carol",
        "clerk",
        "OFFICE",
        EventPayload::LabelsPrinted {
            label_count: 2,
            document_ref: "BOL-7731".into(),
        },
    )
}

pub fn sealed() -> EventContent {
    staff(
        "alice",
        "packer",
        "DOCK-1",
        EventPayload::Sealed {
            seal_id: "SEAL-0042".into(),
        },
    )
}

pub fn staged() -> EventContent {
    staff(
        "dave",
        "loader",
        "BAY-3",
        EventPayload::Staged { bay: "BAY-3".into() },
    )
}

pub fn inspected(passed: bool) -> EventContent {
    staff(
        "dana",
        "inspector",
        "BAY-3",
        EventPayload::Inspected {
            passed,
            notes: if passed { "seal intact" } else { "seal torn" }.into(),
        },
    )
}

pub fn loaded() -> EventContent {
    staff(
        "dave",
        "loader",
        "BAY-3",
        EventPayload::Loaded {
            vehicle_id: "TRK-12".into(),
        },
    )
}

pub fn shipped() -> EventContent {
    staff(
        "dave",
        "loader",
        "GATE",
        EventPayload::Shipped {
            carrier: "ACME Freight".into(),
            tracking_number: "1Z999".into(),
        },
    )
}

pub fn delivered() -> EventContent {
    staff(
        "erin",
        "courier",
        "CUSTOMER",
        EventPayload::Delivered {
            recipient: "Frank".into(),
        },
    )
}

pub fn cancelled(reason: &str) -> EventContent {
    staff(
        "bob",
        "supervisor",
        "OFFICE",
        EventPayload::Cancelled {
            reason: reason.into(),
        },
    )
}

/// A representative content for each event type.
pub fn content_for(event_type: EventType) -> EventContent {
    match event_type {
        EventType::SubjectCreated => created("ORD-1001"),
        EventType::ContentAdded => content_added("SKU-1", 1),
        EventType::SubmittedForReview => submitted(),
        EventType::ReviewRejected => rejected("missing invoice"),
        EventType::Released => released(),
        EventType::LabelsPrinted => labels_printed(),
        EventType::Inspected => inspected(true),
        EventType::Sealed => sealed(),
        EventType::Staged => staged(),
        EventType::Loaded => loaded(),
        EventType::Shipped => shipped(),
        EventType::Delivered => delivered(),
        EventType::Cancelled => cancelled("order withdrawn"),
    }
}

/// Every legal step from creation to delivery, in order.
pub fn lifecycle() -> Vec<EventContent> {
    vec![
        created("ORD-1001"),
        content_added("SKU-1", 3),
        submitted(),
        released(),
        labels_printed(),
        sealed(),
        staged(),
        inspected(true),
        loaded(),
        shipped(),
        delivered(),
    ]
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_ledger_core::{check_transition, SubjectStatus};

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.advance_secs(90);
        assert_eq!(clock.now() - start, Duration::seconds(90));

        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_lifecycle_is_legal() {
        let mut status = None;
        for content in lifecycle() {
            status = Some(check_transition(status, content.event_type()).unwrap());
        }
        assert_eq!(status, Some(SubjectStatus::Delivered));
    }

    #[test]
    fn test_content_for_matches_type() {
        for t in EventType::ALL {
            assert_eq!(content_for(t).event_type(), t);
        }
    }

    #[tokio::test]
    async fn test_fixture_appends_with_clock() {
        let fixture = TestFixture::memory();
        let subject = fixture.subject("PKG-FIX");

        fixture.append_all(&subject, lifecycle()).await.unwrap();

        let chain = fixture.ledger.get_chain(&subject).await.unwrap();
        assert_eq!(chain.len(), lifecycle().len());
        assert_eq!(chain[0].occurred_at, fixture_epoch());
        assert_eq!(chain[1].occurred_at, fixture_epoch() + Duration::seconds(60));
    }
}
