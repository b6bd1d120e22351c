//! Benchmarks for file hashing.
//!
//! Run with: cargo bench -p patchsync-core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use patchsync_core::{parse_manifest, HashEngine};
use std::hint::black_box;
use std::io::Cursor;

/// Generate test data of the specified size
fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Benchmark SHA-256 hashing for different data sizes and progress intervals
fn bench_hash_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");

    let sizes = [
        (64 * 1024, "64KB"),
        (1024 * 1024, "1MB"),
        (16 * 1024 * 1024, "16MB"),
    ];

    let intervals = [(4 * 1024u64, "4K"), (1024 * 1024u64, "1M")];

    for (size, size_name) in sizes {
        let data = generate_test_data(size);
        group.throughput(Throughput::Bytes(size as u64));

        for (interval, interval_name) in intervals {
            let id = BenchmarkId::new(format!("sha256/every-{}", interval_name), size_name);
            group.bench_with_input(id, &data, |b, data| {
                b.iter(|| {
                    let mut cursor = Cursor::new(data);
                    let mut engine = HashEngine::new()
                        .progress_interval(interval)
                        .on_progress(|p| {
                            black_box(p);
                        });
                    engine
                        .hash_reader(black_box(&mut cursor), data.len() as u64)
                        .unwrap()
                });
            });
        }
    }

    group.finish();
}

/// Benchmark manifest parsing
fn bench_manifest_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest");

    for count in [100usize, 10_000] {
        let manifest: String = (0..count)
            .map(|i| {
                format!(
                    "Data/file{:05}.dat {:064X} http://patch.example.com/file{:05}.dat\n",
                    i, i, i
                )
            })
            .collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("parse", count), &manifest, |b, m| {
            b.iter(|| parse_manifest(black_box(m)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hash_engine, bench_manifest_parse);
criterion_main!(benches);
