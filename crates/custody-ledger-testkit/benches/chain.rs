use chrono::{DateTime, Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use custody_ledger_core::{canonical_bytes, compute_hash, verify_chain, CustodyEvent};
use custody_ledger_testkit::fixtures::{content_added, created, subject};
use custody_ledger_testkit::generators::chain_from_contents;
use custody_ledger_testkit::vectors::{all_vectors, build_event};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn open_chain(len: usize) -> Vec<CustodyEvent> {
    let mut contents = vec![created("ORD-BENCH")];
    contents.extend((1..len).map(|i| content_added(&format!("SKU-{i}"), i as u32)));
    chain_from_contents(
        &subject("PKG-BENCH"),
        contents,
        DateTime::<Utc>::UNIX_EPOCH,
        Duration::seconds(1),
    )
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_canonicalize_and_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical");
    for vector in all_vectors() {
        let event = build_event(&vector);
        group.bench_with_input(
            BenchmarkId::new("canonicalize+hash", vector.sequence_number),
            &event,
            |b, event| b.iter(|| compute_hash(&canonical_bytes(black_box(event)))),
        );
    }
    group.finish();
}

fn bench_verify_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");
    for len in [10usize, 100, 1_000] {
        let chain = open_chain(len);
        group.bench_with_input(BenchmarkId::new("verify_chain", len), &chain, |b, chain| {
            b.iter(|| verify_chain(black_box(chain)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_canonicalize_and_hash, bench_verify_chain);
criterion_main!(benches);
