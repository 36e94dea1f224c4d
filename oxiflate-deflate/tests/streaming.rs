//! Streaming behavior of the compressor and decompressor.

use oxiflate_core::{
    Compressor, Crc32, Decompressor, FlushMode, StreamStatus, Strategy as MatchStrategy,
};
use oxiflate_deflate::{
    DeflateConfig, Deflater, Format, InflateConfig, Inflater, deflate, gzip_compress, inflate,
    zlib_compress, zlib_compress_with_dict, zlib_decompress_with_dict,
};
use proptest::prelude::*;

/// Feed `data` in `chunk`-sized pieces through an output buffer of
/// `out_size` bytes, then finish.
fn compress_stream(deflater: &mut Deflater, data: &[u8], chunk: usize, out_size: usize) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut buffer = vec![0u8; out_size];
    for piece in data.chunks(chunk.max(1)) {
        let mut pos = 0;
        while pos < piece.len() {
            let (consumed, produced, _) = deflater
                .step(&piece[pos..], &mut buffer, FlushMode::None)
                .unwrap();
            pos += consumed;
            compressed.extend_from_slice(&buffer[..produced]);
        }
    }
    finish(deflater, &mut compressed, &mut buffer);
    compressed
}

fn finish(deflater: &mut Deflater, compressed: &mut Vec<u8>, buffer: &mut [u8]) {
    loop {
        let (_, produced, status) = deflater.step(&[], buffer, FlushMode::Finish).unwrap();
        compressed.extend_from_slice(&buffer[..produced]);
        if status == StreamStatus::StreamEnd {
            break;
        }
    }
}

/// Compress `data` with one flush of `mode` after `split` bytes.
fn compress_with_flush(config: DeflateConfig, data: &[u8], split: usize, mode: FlushMode) -> (Vec<u8>, usize) {
    let mut deflater = Deflater::new(config).unwrap();
    let mut compressed = Vec::new();
    let mut buffer = vec![0u8; 1024];

    let mut pos = 0;
    loop {
        let (consumed, produced, status) = deflater
            .step(&data[pos..split], &mut buffer, mode)
            .unwrap();
        pos += consumed;
        compressed.extend_from_slice(&buffer[..produced]);
        if status == StreamStatus::NeedMoreInput {
            break;
        }
    }
    let flushed_at = compressed.len();

    let mut pos = split;
    while pos < data.len() {
        let (consumed, produced, _) = deflater
            .step(&data[pos..], &mut buffer, FlushMode::None)
            .unwrap();
        pos += consumed;
        compressed.extend_from_slice(&buffer[..produced]);
    }
    finish(&mut deflater, &mut compressed, &mut buffer);
    (compressed, flushed_at)
}

fn decompress_stream(config: InflateConfig, compressed: &[u8], chunk: usize, out_size: usize) -> Vec<u8> {
    let mut inflater = Inflater::new(config).unwrap();
    let mut output = Vec::new();
    let mut buffer = vec![0u8; out_size];
    let mut pos = 0;
    loop {
        let end = (pos + chunk.max(1)).min(compressed.len());
        let flush = if end == compressed.len() {
            FlushMode::Finish
        } else {
            FlushMode::None
        };
        let (consumed, produced, status) = inflater
            .step(&compressed[pos..end], &mut buffer, flush)
            .unwrap();
        pos += consumed;
        output.extend_from_slice(&buffer[..produced]);
        if status == StreamStatus::StreamEnd {
            break;
        }
    }
    assert_eq!(pos, compressed.len());
    inflater.verify_trailer().unwrap();
    output
}

fn text(len: usize) -> Vec<u8> {
    let sentence = b"It was the best of times, it was the worst of times, it was the age of wisdom. ";
    sentence.iter().copied().cycle().take(len).collect()
}

fn data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..4096),
        prop::collection::vec(0u8..4, 0..20_000),
        (0usize..70_000).prop_map(text),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_roundtrip_every_level(data in data_strategy(), level in 0u8..=9) {
        let compressed = deflate(&data, level).unwrap();
        prop_assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_input_chunking_is_invisible(
        data in data_strategy(),
        level in 0u8..=9,
        chunk in 1usize..5000,
    ) {
        let config = DeflateConfig::new(level);
        let whole = compress_stream(&mut Deflater::new(config).unwrap(), &data, data.len().max(1), 1 << 16);
        let pieces = compress_stream(&mut Deflater::new(config).unwrap(), &data, chunk, 1 << 16);
        prop_assert_eq!(pieces, whole);
    }

    #[test]
    fn prop_output_buffer_size_is_invisible(data in data_strategy(), out_size in 1usize..300) {
        let config = DeflateConfig::ZLIB;
        let reference = zlib_compress(&data, 6).unwrap();
        let small = compress_stream(&mut Deflater::new(config).unwrap(), &data, 1000, out_size);
        prop_assert_eq!(&small, &reference);
        prop_assert_eq!(decompress_stream(InflateConfig::ZLIB, &reference, 17, out_size), data);
    }

    #[test]
    fn prop_compressed_size_is_bounded(data in data_strategy(), level in 0u8..=9) {
        for format in [Format::Raw, Format::Zlib, Format::Gzip] {
            let config = DeflateConfig::new(level).with_format(format);
            let mut deflater = Deflater::new(config).unwrap();
            let bound = deflater.bound(data.len());
            let compressed = deflater.compress_all(&data).unwrap();
            prop_assert!(compressed.len() <= bound);
        }
    }

    #[test]
    fn prop_sync_flush_then_finish(data in data_strategy(), split_frac in 0.0f64..1.0) {
        let split = (data.len() as f64 * split_frac) as usize;
        let (compressed, flushed_at) =
            compress_with_flush(DeflateConfig::RAW, &data, split, FlushMode::Sync);
        prop_assert_eq!(inflate(&compressed).unwrap(), data.clone());

        // Everything before the flush point decodes without the rest.
        let prefix = decompress_prefix(&compressed[..flushed_at]);
        prop_assert_eq!(&prefix[..], &data[..split]);
    }

    #[test]
    fn prop_full_flush_restarts_history(data in data_strategy(), split_frac in 0.0f64..1.0) {
        let split = (data.len() as f64 * split_frac) as usize;
        let (compressed, flushed_at) =
            compress_with_flush(DeflateConfig::new(9), &data, split, FlushMode::Full);
        prop_assert_eq!(inflate(&compressed).unwrap(), data.clone());

        // A decoder starting at the flush point needs no earlier history.
        prop_assert_eq!(inflate(&compressed[flushed_at..]).unwrap(), data[split..].to_vec());
    }
}

/// Decode as much as the bytes allow without treating them as complete.
fn decompress_prefix(compressed: &[u8]) -> Vec<u8> {
    let mut inflater = Inflater::new(InflateConfig::RAW).unwrap();
    let mut output = Vec::new();
    let mut buffer = vec![0u8; 4096];
    let mut pos = 0;
    loop {
        let (consumed, produced, status) = inflater
            .step(&compressed[pos..], &mut buffer, FlushMode::None)
            .unwrap();
        pos += consumed;
        output.extend_from_slice(&buffer[..produced]);
        if status != StreamStatus::NeedMoreOutput {
            break;
        }
    }
    output
}

#[test]
fn test_one_byte_at_a_time_both_ways() {
    let data = text(50_000);
    let mut deflater = Deflater::new(DeflateConfig::GZIP).unwrap();
    let compressed = compress_stream(&mut deflater, &data, 1, 1);
    assert_eq!(compressed, gzip_compress(&data, 6).unwrap());
    assert_eq!(decompress_stream(InflateConfig::GZIP, &compressed, 1, 1), data);
}

#[test]
fn test_empty_stream_per_format() {
    assert_eq!(deflate(&[], 6).unwrap(), [0x03, 0x00]);

    let zlib = zlib_compress(&[], 6).unwrap();
    assert_eq!(zlib, [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);

    let gzip = gzip_compress(&[], 6).unwrap();
    assert_eq!(gzip.len(), 10 + 2 + 8);
    assert_eq!(&gzip[12..], &[0u8; 8]);
}

#[test]
fn test_zlib_trailer_is_big_endian_adler() {
    let compressed = zlib_compress(b"Hello", 6).unwrap();
    assert_eq!(&compressed[compressed.len() - 4..], &[0x05, 0x8C, 0x01, 0xF5]);
}

#[test]
fn test_gzip_trailer_and_header() {
    let data = text(1000);
    let compressed = gzip_compress(&data, 9).unwrap();
    let n = compressed.len();
    assert_eq!(&compressed[n - 8..n - 4], &Crc32::compute(&data).to_le_bytes());
    assert_eq!(&compressed[n - 4..], &1000u32.to_le_bytes());

    let mut inflater = Inflater::new(InflateConfig::GZIP).unwrap();
    assert_eq!(inflater.decompress_all(&compressed).unwrap(), data);
    let header = inflater.gzip_header().unwrap();
    assert_eq!(header.extra_flags, 2);
    assert_eq!(header.os, 255);
    assert_eq!(header.name, None);
    let trailer = inflater.trailer().unwrap();
    assert!(trailer.is_valid());
    assert_eq!(trailer.actual_len, Some(1000));
}

#[test]
fn test_dictionary_determinism() {
    let dictionary = text(5000);
    let data = text(8000);
    let config = DeflateConfig::ZLIB.with_level(7);
    let a = Deflater::with_dictionary(config, &dictionary)
        .unwrap()
        .compress_all(&data)
        .unwrap();
    let b = Deflater::with_dictionary(config, &dictionary)
        .unwrap()
        .compress_all(&data)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(zlib_compress_with_dict(&data, 7, &dictionary).unwrap(), a);
    assert_eq!(zlib_decompress_with_dict(&a, &dictionary).unwrap(), data);
}

#[test]
fn test_dictionary_longer_than_window() {
    let mut dictionary = vec![b'#'; 40_000];
    dictionary.extend_from_slice(&text(2000));
    let data = text(3000);

    let compressed = zlib_compress_with_dict(&data, 6, &dictionary).unwrap();
    assert_eq!(zlib_decompress_with_dict(&compressed, &dictionary).unwrap(), data);
}

#[test]
fn test_reset_reuses_engines() {
    let data = text(10_000);
    let mut deflater = Deflater::new(DeflateConfig::ZLIB).unwrap();
    let first = deflater.compress_all(&data).unwrap();
    deflater.reset();
    assert_eq!(deflater.compress_all(&data).unwrap(), first);

    let mut inflater = Inflater::new(InflateConfig::ZLIB).unwrap();
    assert_eq!(inflater.decompress_all(&first).unwrap(), data);
    assert!(inflater.is_finished());
    inflater.reset();
    assert!(!inflater.is_finished());
    assert_eq!(inflater.decompress_all(&first).unwrap(), data);
    assert_eq!(inflater.total_in(), first.len() as u64);
    assert_eq!(inflater.total_out(), data.len() as u64);
}

#[test]
fn test_block_flush_decodes_with_block_mode() {
    let data = text(3000);
    let (compressed, _) = compress_with_flush(DeflateConfig::RAW, &data, 1000, FlushMode::Block);

    let mut inflater = Inflater::new(InflateConfig::RAW).unwrap();
    let mut buffer = vec![0u8; 8192];
    let mut output = Vec::new();
    let mut pos = 0;
    let mut boundaries = 0;
    loop {
        let (consumed, produced, status) = inflater
            .step(&compressed[pos..], &mut buffer, FlushMode::Block)
            .unwrap();
        pos += consumed;
        output.extend_from_slice(&buffer[..produced]);
        match status {
            StreamStatus::Continue => boundaries += 1,
            StreamStatus::StreamEnd => break,
            other => panic!("unexpected status {:?}", other),
        }
    }
    assert_eq!(output, data);
    assert!(boundaries >= 1);
}

#[test]
fn test_block_flush_then_full_flush_is_a_restart_point() {
    let data = text(5000);
    let split = 1700;
    let mut deflater = Deflater::new(DeflateConfig::RAW).unwrap();
    let mut buffer = vec![0u8; 8192];
    let mut compressed = Vec::new();

    for (input, mode) in [(&data[..split], FlushMode::Block), (&[][..], FlushMode::Full)] {
        let (consumed, produced, status) = deflater.step(input, &mut buffer, mode).unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(status, StreamStatus::NeedMoreInput);
        compressed.extend_from_slice(&buffer[..produced]);
    }
    assert!(compressed.ends_with(&[0x00, 0x00, 0xFF, 0xFF]));
    assert_eq!(decompress_prefix(&compressed), &data[..split]);

    let flushed_at = compressed.len();
    let (consumed, produced, _) = deflater
        .step(&data[split..], &mut buffer, FlushMode::None)
        .unwrap();
    assert_eq!(consumed, data.len() - split);
    compressed.extend_from_slice(&buffer[..produced]);
    finish(&mut deflater, &mut compressed, &mut buffer);

    assert_eq!(inflate(&compressed).unwrap(), data);
    assert_eq!(inflate(&compressed[flushed_at..]).unwrap(), &data[split..]);
}

#[test]
fn test_strategies_roundtrip_through_zlib() {
    let data = text(40_000);
    for strategy in [
        MatchStrategy::Default,
        MatchStrategy::Filtered,
        MatchStrategy::HuffmanOnly,
        MatchStrategy::Rle,
        MatchStrategy::Fixed,
    ] {
        let config = DeflateConfig::ZLIB.with_strategy(strategy);
        let compressed = Deflater::new(config).unwrap().compress_all(&data).unwrap();
        assert_eq!(
            decompress_stream(InflateConfig::AUTO, &compressed, 4096, 4096),
            data,
            "{:?}",
            strategy
        );
    }
}

#[test]
fn test_small_windows() {
    let data = text(30_000);
    for window_bits in 9..=15 {
        let config = DeflateConfig::ZLIB.with_window_bits(window_bits);
        let compressed = Deflater::new(config).unwrap().compress_all(&data).unwrap();
        assert_eq!(compressed[0] >> 4, window_bits - 8);
        let inflate_config = InflateConfig::ZLIB.with_window_bits(window_bits);
        assert_eq!(decompress_stream(inflate_config, &compressed, 999, 999), data);
    }
}
