//! Benchmarks for the DEFLATE codec.
//!
//! - One-shot compression per level and data shape
//! - Decompression throughput
//! - Streaming with small buffers
//! - Match finding and Huffman construction in isolation

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_core::{CompressionLevel, FlushMode, StreamStatus, Strategy};
use oxiflate_deflate::{
    DeflateConfig, Deflater, HuffmanBuilder, InflateConfig, Inflater, Lz77Encoder, deflate,
    inflate,
};
use std::hint::black_box;

fn generate_random(size: usize) -> Vec<u8> {
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    (0..size)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 32) as u8
        })
        .collect()
}

fn generate_text(size: usize) -> Vec<u8> {
    let words: [&[u8]; 12] = [
        b"stream ", b"block ", b"window ", b"huffman ", b"literal ", b"match ",
        b"distance ", b"length ", b"the ", b"of ", b"and ", b"code\n",
    ];
    let mut data = Vec::with_capacity(size);
    let mut i = 0usize;
    while data.len() < size {
        data.extend_from_slice(words[(i * 7 + i / 5) % words.len()]);
        i += 1;
    }
    data.truncate(size);
    data
}

fn generate_runs(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i / 97) % 4) as u8).collect()
}

fn inputs(size: usize) -> [(&'static str, Vec<u8>); 3] {
    [
        ("random", generate_random(size)),
        ("text", generate_text(size)),
        ("runs", generate_runs(size)),
    ]
}

fn bench_compress_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("deflate_levels");
    let size = 256 * 1024;
    group.throughput(Throughput::Bytes(size as u64));

    for (name, data) in inputs(size) {
        for level in [0u8, 1, 6, 9] {
            group.bench_with_input(
                BenchmarkId::new(name, format!("level{}", level)),
                &data,
                |b, data| {
                    b.iter(|| {
                        black_box(deflate(black_box(data), level).expect("compression failed"))
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("inflate");

    for size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        let data = generate_text(size);
        let compressed = deflate(&data, 6).expect("compression failed");
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &compressed, |b, compressed| {
            b.iter(|| black_box(inflate(black_box(compressed)).expect("decompression failed")));
        });
    }

    group.finish();
}

fn bench_streaming_buffers(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming_buffers");
    let data = generate_text(256 * 1024);
    let compressed = deflate(&data, 6).expect("compression failed");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for buffer_size in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("deflate", buffer_size),
            &buffer_size,
            |b, &buffer_size| {
                b.iter(|| {
                    let mut deflater = Deflater::new(DeflateConfig::RAW).expect("config");
                    let mut buffer = vec![0u8; buffer_size];
                    let mut total = 0usize;
                    for chunk in data.chunks(buffer_size) {
                        let mut pos = 0;
                        while pos < chunk.len() {
                            let (consumed, produced, _) = deflater
                                .step(&chunk[pos..], &mut buffer, FlushMode::None)
                                .expect("compression failed");
                            pos += consumed;
                            total += produced;
                        }
                    }
                    loop {
                        let (_, produced, status) = deflater
                            .step(&[], &mut buffer, FlushMode::Finish)
                            .expect("compression failed");
                        total += produced;
                        if status == StreamStatus::StreamEnd {
                            break;
                        }
                    }
                    black_box(total)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("inflate", buffer_size),
            &buffer_size,
            |b, &buffer_size| {
                b.iter(|| {
                    let mut inflater = Inflater::new(InflateConfig::RAW).expect("config");
                    let mut buffer = vec![0u8; buffer_size];
                    let mut pos = 0;
                    let mut total = 0usize;
                    loop {
                        let end = (pos + buffer_size).min(compressed.len());
                        let (consumed, produced, status) = inflater
                            .step(&compressed[pos..end], &mut buffer, FlushMode::None)
                            .expect("decompression failed");
                        pos += consumed;
                        total += produced;
                        if status == StreamStatus::StreamEnd {
                            break;
                        }
                    }
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

fn bench_match_finding(c: &mut Criterion) {
    let mut group = c.benchmark_group("lz77_tokens");
    let size = 256 * 1024;
    group.throughput(Throughput::Bytes(size as u64));

    for (name, data) in inputs(size) {
        for level in [1u8, 6, 9] {
            group.bench_with_input(
                BenchmarkId::new(name, format!("level{}", level)),
                &data,
                |b, data| {
                    b.iter(|| {
                        let mut encoder =
                            Lz77Encoder::new(15, CompressionLevel::new(level), Strategy::Default);
                        let mut pos = 0;
                        let mut tokens = 0usize;
                        loop {
                            pos += encoder.fill(&data[pos..]);
                            let flushing = pos == data.len();
                            while encoder.next_token(flushing).is_some() {
                                tokens += 1;
                            }
                            if flushing {
                                break;
                            }
                        }
                        black_box(tokens)
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_huffman_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("huffman_build");

    let skewed: Vec<u32> = (0..286u32).map(|i| 1 + 10_000 / (i + 1)).collect();
    let flat = vec![100u32; 286];
    for (name, frequencies) in [("skewed", skewed), ("flat", flat)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &frequencies, |b, freqs| {
            b.iter(|| {
                black_box(HuffmanBuilder::from_frequencies(black_box(freqs), 15).build_lengths())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compress_levels,
    bench_decompress,
    bench_streaming_buffers,
    bench_match_finding,
    bench_huffman_build,
);
criterion_main!(benches);
