//! Varint and header codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use msglog_codec::{decode_uint, encode_uint, VarintEncoder, MAX_VARINT_LEN};
use msglog_core::log::MAX_HEADER_LEN;
use msglog_core::Msg;

/// One value per encoded width.
const WIDTHS: &[(usize, u64)] = &[
    (1, 0x42),
    (2, 0xC8),
    (3, 0x1234),
    (5, 0xDEAD_BEEF),
    (9, u64::MAX),
];

fn bench_varint_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_encode");

    for &(width, value) in WIDTHS {
        group.bench_with_input(BenchmarkId::from_parameter(width), &value, |b, &value| {
            let mut buf = [0u8; MAX_VARINT_LEN];
            b.iter(|| {
                let len = encode_uint(black_box(value), &mut buf).len();
                black_box(len);
            });
        });
    }

    group.finish();
}

fn bench_varint_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_decode");

    for &(width, value) in WIDTHS {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let encoded = encode_uint(value, &mut buf).to_vec();
        group.bench_with_input(BenchmarkId::from_parameter(width), &encoded, |b, encoded| {
            b.iter(|| {
                let result = decode_uint(black_box(encoded)).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

fn typical_header() -> Msg {
    Msg {
        seq: 1_000_000,
        time: 1_700_000_000_000_000_000,
        from: 3,
        pos: 64 * 1024 * 1024,
        prev_pos: 64 * 1024 * 1024 - 90,
        id: 77,
        length: 80,
    }
}

fn bench_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("header");
    let msg = typical_header();
    group.throughput(Throughput::Bytes(msg.header_size()));

    group.bench_function("encode", |b| {
        let mut encoder = VarintEncoder::with_capacity(MAX_HEADER_LEN);
        b.iter(|| {
            encoder.clear();
            black_box(&msg).encode_header(&mut encoder);
            black_box(encoder.len());
        });
    });

    let mut encoded = Vec::new();
    msg.write_header(&mut encoded).unwrap();
    group.bench_function("decode", |b| {
        b.iter(|| {
            let result = Msg::decode_header(black_box(&encoded)).unwrap();
            black_box(result);
        });
    });

    group.bench_function("size", |b| {
        b.iter(|| black_box(black_box(&msg).header_size()));
    });

    group.finish();
}

criterion_group!(benches, bench_varint_encode, bench_varint_decode, bench_header);
criterion_main!(benches);
