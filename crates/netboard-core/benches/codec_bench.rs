//! Criterion benchmarks for the netboard frame codec.
//!
//! Measures encode, decode and stream splitting for typical clipboard sizes:
//! a short word, a paragraph, and a pasted screenshot-sized blob.
//!
//! Run with:
//! ```bash
//! cargo bench --package netboard-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use netboard_core::{Frame, FrameReader};

// ── Payload fixtures ──────────────────────────────────────────────────────────

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

const SIZES: [usize; 3] = [16, 4 * 1024, 1024 * 1024];

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");
    for size in SIZES {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Frame::encode(black_box(data)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    for size in SIZES {
        let frame = Frame::encode(&payload(size));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame).decode())
        });
    }
    group.finish();
}

fn bench_reader_small_chunks(c: &mut Criterion) {
    // 64 short frames delivered in 1 KiB reads, as a chunked body would arrive.
    let body: Vec<u8> = (0..64)
        .flat_map(|i| Frame::encode(&payload(100 + i)).into_bytes().to_vec())
        .collect();

    c.bench_function("reader_64_frames_1k_chunks", |b| {
        b.iter(|| {
            let mut reader = FrameReader::new();
            let mut count = 0usize;
            for chunk in body.chunks(1024) {
                reader.push(black_box(chunk));
                while let Some(frame) = reader.next_frame() {
                    if frame.is_ok() {
                        count += 1;
                    }
                }
            }
            count
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_reader_small_chunks);
criterion_main!(benches);
