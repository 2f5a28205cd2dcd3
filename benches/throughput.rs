//! Throughput benchmarks

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use protoscope_core::core::analysis::{BytePatternClassifier, FramingDetector};
use protoscope_core::core::protocol::checksum::{batch_test_crc, crc8_parameterised, CrcParams, CrcWidth};
use protoscope_core::core::protocol::framing::encode_slip;

fn payloads(count: usize, len: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| (0..len).map(|j| ((i * 31 + j * 17) % 256) as u8).collect())
        .collect()
}

fn crc_benchmark(c: &mut Criterion) {
    let data = payloads(100, 7);
    let expected: Vec<u16> = data.iter().map(|p| u16::from(crc8_parameterised(p, 0x4D, 0xFF, 0, true))).collect();

    let mut group = c.benchmark_group("crc");
    group.throughput(Throughput::Elements(data.len() as u64));

    group.bench_function("crc8_batch_one_config", |b| {
        let params = CrcParams {
            width: CrcWidth::Crc8,
            polynomial: 0x4D,
            init: 0xFF,
            xor_out: 0,
            reflect: true,
        };
        b.iter(|| black_box(batch_test_crc(black_box(&data), &expected, params)))
    });

    group.bench_function("crc8_all_polynomials", |b| {
        b.iter(|| {
            let mut hits = 0;
            for polynomial in 1..=0xFFu16 {
                let params = CrcParams {
                    width: CrcWidth::Crc8,
                    polynomial,
                    init: 0,
                    xor_out: 0,
                    reflect: false,
                };
                hits += batch_test_crc(&data, &expected, params).match_count;
            }
            black_box(hits)
        })
    });

    group.finish();
}

fn analysis_benchmark(c: &mut Criterion) {
    let frames = payloads(1000, 8);
    let mut stream = Vec::new();
    for frame in &frames {
        stream.extend(encode_slip(frame));
    }

    let mut group = c.benchmark_group("analysis");

    group.bench_function("classify_1000x8", |b| {
        let classifier = BytePatternClassifier::default();
        b.iter(|| black_box(classifier.classify(black_box(&frames))))
    });

    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("framing_slip_stream", |b| {
        let detector = FramingDetector::new();
        b.iter(|| black_box(detector.detect(black_box(&stream))))
    });

    group.finish();
}

criterion_group!(benches, crc_benchmark, analysis_benchmark);
criterion_main!(benches);
