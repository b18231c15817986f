//! Proptest generators for property-based testing.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use custody_ledger_core::{
    check_transition, link_new_event, Actor, CustodyEvent, EventContent, EventPayload, EventType,
    SubjectId, SubjectStatus,
};

/// Short free text, including separators and non-ASCII.
pub fn text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9 ,.-]{0,24}",
        "\\PC{0,12}",
        Just(String::new()),
    ]
}

/// Generate a subject id.
pub fn subject_id() -> impl Strategy<Value = SubjectId> {
    "[A-Z]{3}-[0-9]{1,6}".prop_map(|s| SubjectId::new(s).unwrap_or_else(|e| panic!("{e}")))
}

/// Generate an actor.
pub fn actor() -> impl Strategy<Value = Actor> {
    ("[a-z]{1,12}", prop_oneof![Just("packer"), Just("supervisor"), Just("loader")])
        .prop_map(|(name, role)| Actor::new(name, role))
}

/// Generate any EventType.
pub fn event_type() -> impl Strategy<Value = EventType> {
    prop::sample::select(EventType::ALL.to_vec())
}

/// Generate a payload of the given type.
pub fn payload_for(event_type: EventType) -> BoxedStrategy<EventPayload> {
    match event_type {
        EventType::SubjectCreated => (text(), text())
            .prop_map(|(reference, description)| EventPayload::SubjectCreated {
                reference,
                description,
            })
            .boxed(),
        EventType::ContentAdded => (text(), text(), any::<u32>())
            .prop_map(|(item_code, description, quantity)| EventPayload::ContentAdded {
                item_code,
                description,
                quantity,
            })
            .boxed(),
        EventType::SubmittedForReview => text()
            .prop_map(|reviewer| EventPayload::SubmittedForReview { reviewer })
            .boxed(),
        EventType::ReviewRejected => text()
            .prop_map(|reason| EventPayload::ReviewRejected { reason })
            .boxed(),
        EventType::Released => text()
            .prop_map(|approved_by| EventPayload::Released { approved_by })
            .boxed(),
        EventType::LabelsPrinted => (any::<u32>(), text())
            .prop_map(|(label_count, document_ref)| EventPayload::LabelsPrinted {
                label_count,
                document_ref,
            })
            .boxed(),
        EventType::Inspected => (any::<bool>(), text())
            .prop_map(|(passed, notes)| EventPayload::Inspected { passed, notes })
            .boxed(),
        EventType::Sealed => text()
            .prop_map(|seal_id| EventPayload::Sealed { seal_id })
            .boxed(),
        EventType::Staged => text().prop_map(|bay| EventPayload::Staged { bay }).boxed(),
        EventType::Loaded => text()
            .prop_map(|vehicle_id| EventPayload::Loaded { vehicle_id })
            .boxed(),
        EventType::Shipped => (text(), text())
            .prop_map(|(carrier, tracking_number)| EventPayload::Shipped {
                carrier,
                tracking_number,
            })
            .boxed(),
        EventType::Delivered => text()
            .prop_map(|recipient| EventPayload::Delivered { recipient })
            .boxed(),
        EventType::Cancelled => text()
            .prop_map(|reason| EventPayload::Cancelled { reason })
            .boxed(),
    }
}

/// Generate content of the given type.
pub fn event_content_for(event_type: EventType) -> BoxedStrategy<EventContent> {
    (payload_for(event_type), actor(), text())
        .prop_map(|(payload, actor, location)| EventContent::new(payload, actor, location))
        .boxed()
}

/// Generate content of any type.
pub fn event_content() -> impl Strategy<Value = EventContent> {
    event_type().prop_flat_map(event_content_for)
}

/// Walk the transition table, picking among legal successors with `choices`.
///
/// Stops early if a terminal status leaves no legal successor.
pub fn legal_path(choices: &[u8]) -> Vec<EventType> {
    let mut path = Vec::with_capacity(choices.len());
    let mut status: Option<SubjectStatus> = None;

    for choice in choices {
        let next: Vec<EventType> = EventType::ALL
            .into_iter()
            .filter(|t| check_transition(status, *t).is_ok())
            .collect();
        if next.is_empty() {
            break;
        }
        let chosen = next[*choice as usize % next.len()];
        status = check_transition(status, chosen).ok();
        path.push(chosen);
    }

    path
}

/// Generate a legal sequence of contents, starting with creation.
pub fn legal_contents(
    len: impl Into<prop::collection::SizeRange>,
) -> impl Strategy<Value = Vec<EventContent>> {
    prop::collection::vec(any::<u8>(), len).prop_flat_map(|choices| {
        legal_path(&choices)
            .into_iter()
            .map(event_content_for)
            .collect::<Vec<_>>()
    })
}

/// Link contents into a chain, one step apart starting at `start`.
///
/// Panics if the contents are not a legal sequence.
pub fn chain_from_contents(
    subject_id: &SubjectId,
    contents: Vec<EventContent>,
    start: DateTime<Utc>,
    step: Duration,
) -> Vec<CustodyEvent> {
    let mut chain: Vec<CustodyEvent> = Vec::with_capacity(contents.len());
    let mut at = start;

    for content in contents {
        let head = chain.last();
        let status = check_transition(head.map(|e| e.subject_status), content.event_type())
            .unwrap_or_else(|e| panic!("illegal generated sequence: {e}"));
        let event = link_new_event(head, subject_id.clone(), content, at, status);
        chain.push(event);
        at += step;
    }

    chain
}

/// Parameters for generating a chain.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub subject_id: SubjectId,
    pub contents: Vec<EventContent>,
    pub start_secs: i64,
    pub step_millis: i64,
}

impl Arbitrary for ChainParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (subject_id(), legal_contents(1..16), 0i64..4_000_000_000, 0i64..86_400_000)
            .prop_map(|(subject_id, contents, start_secs, step_millis)| ChainParams {
                subject_id,
                contents,
                start_secs,
                step_millis,
            })
            .boxed()
    }
}

/// Build the chain described by `params`.
pub fn chain_from_params(params: &ChainParams) -> Vec<CustodyEvent> {
    let start = DateTime::<Utc>::from_timestamp(params.start_secs, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    chain_from_contents(
        &params.subject_id,
        params.contents.clone(),
        start,
        Duration::milliseconds(params.step_millis),
    )
}

/// Generate a valid chain with a length in `len` (terminal statuses may cut it short).
pub fn valid_chain(
    len: impl Into<prop::collection::SizeRange>,
) -> impl Strategy<Value = Vec<CustodyEvent>> {
    (subject_id(), legal_contents(len)).prop_map(|(subject_id, contents)| {
        chain_from_contents(
            &subject_id,
            contents,
            DateTime::<Utc>::UNIX_EPOCH,
            Duration::seconds(1),
        )
    })
}
