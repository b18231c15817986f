//! Property tests driven through the ledger's public API.

use proptest::prelude::*;

use custody_ledger::{LedgerError, PreviousHash};
use custody_ledger_testkit::fixtures::TestFixture;
use custody_ledger_testkit::generators::{event_content, legal_contents, subject_id};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn appended_chains_are_contiguous_and_linked(
        subject in subject_id(),
        contents in legal_contents(1..24),
    ) {
        let rt = runtime();
        let chain = rt.block_on(async {
            let fixture = TestFixture::memory();
            for content in contents.clone() {
                fixture.ledger.append(&subject, content).await.unwrap();
                fixture.clock.advance_secs(1);
            }
            fixture.ledger.get_chain(&subject).await.unwrap()
        });

        prop_assert_eq!(chain.len(), contents.len());
        prop_assert_eq!(chain[0].previous_hash, PreviousHash::Genesis);
        for (i, event) in chain.iter().enumerate() {
            prop_assert_eq!(event.sequence_number, i as u64);
            prop_assert_eq!(&event.content(), &contents[i]);
            if i > 0 {
                prop_assert_eq!(event.previous_hash, PreviousHash::Event(chain[i - 1].current_hash));
            }
        }
    }

    #[test]
    fn rejected_appends_leave_chain_unchanged(
        contents in legal_contents(1..12),
        attempt in event_content(),
    ) {
        let rt = runtime();
        let (before, after, result) = rt.block_on(async {
            let fixture = TestFixture::sqlite();
            let subject = fixture.subject("PKG-PROP");
            for content in contents {
                fixture.ledger.append(&subject, content).await.unwrap();
            }
            let before = fixture.ledger.get_chain(&subject).await.unwrap();
            let result = fixture.ledger.append(&subject, attempt).await;
            let after = fixture.ledger.get_chain(&subject).await.unwrap();
            (before, after, result)
        });

        match result {
            Ok(event) => {
                prop_assert_eq!(after.len(), before.len() + 1);
                prop_assert_eq!(after.last(), Some(&event));
            }
            Err(LedgerError::InvalidTransition { .. })
            | Err(LedgerError::ChainClosed { .. })
            | Err(LedgerError::Validation(_)) => {
                prop_assert_eq!(after, before);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
        }
    }
}
