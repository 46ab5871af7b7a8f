//! Benchmarks for the CPU-bound parts of a run
//!
//! Segment sealing across typical segment sizes and chunk reassembly of an
//! out-of-order upload.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vidlock_bus::Reassembler;
use vidlock_pipeline::stages::{open, seal};
use vidlock_pipeline::SegmentKey;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

fn bench_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("seal");
    let key = SegmentKey::generate().unwrap();

    for size in [64 * KIB, MIB, 8 * MIB] {
        let plaintext = vec![0x5au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &plaintext, |b, data| {
            b.iter(|| seal(black_box(&key), black_box(data)).unwrap());
        });
    }

    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let key = SegmentKey::generate().unwrap();
    let sealed = seal(&key, &vec![0x5au8; MIB]).unwrap();

    c.bench_function("open/1MiB", |b| {
        b.iter(|| open(black_box(key.key_bytes()), black_box(&sealed)).unwrap());
    });
}

fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");

    for chunks in [16u64, 256, 1024] {
        let payload = Bytes::from(vec![7u8; 64 * KIB]);
        // Interleave even and odd indices to mimic redelivered batches.
        let order: Vec<u64> = (0..chunks)
            .step_by(2)
            .chain((1..chunks).step_by(2))
            .collect();

        group.throughput(Throughput::Bytes(chunks * payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunks), &order, |b, order| {
            b.iter(|| {
                let mut r = Reassembler::new();
                for &idx in order {
                    r.insert(idx, payload.clone());
                }
                black_box(r.to_bytes())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_seal, bench_open, bench_reassembly);
criterion_main!(benches);
