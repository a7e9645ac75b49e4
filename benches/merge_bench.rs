//! K-way merge benchmarks
//!
//! Measures the heap merge the federated read path funnels every query
//! through: sorted per-store entry streams combined into one ordered stream.
//!
//! ## Running
//!
//! ```bash
//! # Full merge benchmarks
//! cargo bench --bench merge_bench
//!
//! # Specific categories
//! cargo bench --bench merge_bench -- "merge/full"
//! cargo bench --bench merge_bench -- "merge/limited"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use obshub::{MergeSorted, Result, ScopedId, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed seed so every run merges identical streams.
const BENCH_SEED: u64 = 0x0B5_4B00;

/// Store counts for fan-out scaling.
const SOURCE_COUNTS: &[usize] = &[2, 4, 8, 16];

/// Entries per store for the fixed-fan-out benchmarks.
const ENTRIES_PER_SOURCE: usize = 10_000;

type Entry = (Timestamp, ScopedId);

/// Build `sources` sorted streams of `len` entries each, timestamps drawn
/// from one shared range so the merge actually interleaves.
fn sorted_streams(sources: usize, len: usize) -> Vec<Vec<Entry>> {
    let mut rng = StdRng::seed_from_u64(BENCH_SEED);
    (0..sources)
        .map(|source| {
            let mut times: Vec<u64> = (0..len).map(|_| rng.gen_range(0..1_000_000_000)).collect();
            times.sort_unstable();
            times
                .into_iter()
                .enumerate()
                .map(|(i, micros)| {
                    (
                        Timestamp::from_micros(micros),
                        ScopedId::from_raw((i as u64 + 1) * 1_000 + source as u64 + 1),
                    )
                })
                .collect()
        })
        .collect()
}

fn merge_of(streams: &[Vec<Entry>]) -> impl Iterator<Item = Result<Entry>> {
    let sources: Vec<_> = streams
        .iter()
        .map(|stream| stream.clone().into_iter().map(Ok))
        .collect();
    MergeSorted::new(sources, |entry: &Entry| *entry)
}

fn bench_full_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/full");
    for &sources in SOURCE_COUNTS {
        let streams = sorted_streams(sources, ENTRIES_PER_SOURCE);
        let total = (sources * ENTRIES_PER_SOURCE) as u64;
        group.throughput(Throughput::Elements(total));
        group.bench_with_input(
            BenchmarkId::from_parameter(sources),
            &streams,
            |b, streams| {
                b.iter(|| {
                    let merged = merge_of(streams);
                    let mut count = 0u64;
                    for entry in merged {
                        black_box(entry.unwrap());
                        count += 1;
                    }
                    assert_eq!(count, total);
                });
            },
        );
    }
    group.finish();
}

/// A limited read should cost proportionally to the limit, not to the total
/// entry count, since the merge is lazy.
fn bench_limited_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/limited");
    let streams = sorted_streams(8, ENTRIES_PER_SOURCE);
    for &limit in &[10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(limit as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(limit),
            &streams,
            |b, streams| {
                b.iter(|| {
                    let first: Vec<Entry> = merge_of(streams)
                        .take(limit)
                        .collect::<Result<_>>()
                        .unwrap();
                    black_box(first.len())
                });
            },
        );
    }
    group.finish();
}

fn bench_single_source(c: &mut Criterion) {
    let streams = sorted_streams(1, ENTRIES_PER_SOURCE);
    let mut group = c.benchmark_group("merge/single_source");
    group.throughput(Throughput::Elements(ENTRIES_PER_SOURCE as u64));
    group.bench_function("passthrough", |b| {
        b.iter(|| {
            let merged: Vec<Entry> = merge_of(&streams).collect::<Result<_>>().unwrap();
            black_box(merged.len())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_full_merge,
    bench_limited_merge,
    bench_single_source
);
criterion_main!(benches);
