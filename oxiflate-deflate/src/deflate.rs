//! DEFLATE compression.
//!
//! [`Deflater`] is a streaming engine: each [`Deflater::step`] takes as much
//! input as it can buffer, tokenizes it with the LZ77 matcher, closes blocks
//! as they fill and copies finished bytes into the caller's output slice.
//! Bytes that do not fit stay queued and are written on the next call before
//! any further input is accepted.
//!
//! Given the same configuration and dictionary, the compressed bytes do not
//! depend on how the input is split across calls as long as no flush is
//! requested before the end.

use crate::block::{BlockEncoder, write_sync_marker};
use crate::config::{DeflateConfig, Format};
use crate::lz77::Lz77Encoder;
use crate::tables::MAX_STORED_BLOCK;
use crate::wrapper::{self, StreamChecksum};
use oxiflate_core::BitWriter;
use oxiflate_core::adler::Adler32;
use oxiflate_core::error::{OxiflateError, Result};
use oxiflate_core::traits::{CompressionLevel, Compressor, FlushMode, StreamStatus};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing written yet; the container header is still due.
    Init,
    /// Accepting input.
    Active,
    /// The final block and trailer are queued; only draining remains.
    Finishing,
    /// Everything has been handed to the caller.
    Ended,
}

/// Streaming DEFLATE compressor.
#[derive(Debug)]
pub struct Deflater {
    config: DeflateConfig,
    dictionary: Option<Vec<u8>>,
    dict_id: Option<u32>,
    lz77: Lz77Encoder,
    block: BlockEncoder,
    writer: BitWriter,
    checksum: StreamChecksum,
    state: State,
    /// Input arrived since the last flush.
    dirty: bool,
    total_in: u64,
    total_out: u64,
    /// Set by the first error; every later call returns it.
    error: Option<OxiflateError>,
}

impl Deflater {
    /// Create a compressor for `config`.
    pub fn new(config: DeflateConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            level = config.level.level(),
            strategy = ?config.strategy,
            format = ?config.format,
            window_bits = config.window_bits,
            "deflate stream created"
        );
        Ok(Self {
            config,
            dictionary: None,
            dict_id: None,
            lz77: Lz77Encoder::new(config.window_bits, config.level, config.strategy),
            block: BlockEncoder::new(&config),
            writer: BitWriter::with_capacity(1 << 16),
            checksum: StreamChecksum::for_format(config.format),
            state: State::Init,
            dirty: true,
            total_in: 0,
            total_out: 0,
            error: None,
        })
    }

    /// Create a compressor whose window is primed with `dictionary`.
    ///
    /// Matches may refer into the dictionary, but its bytes are never part of
    /// the output. zlib streams announce the dictionary's Adler-32 in the
    /// header; gzip has no way to do so and is rejected.
    pub fn with_dictionary(config: DeflateConfig, dictionary: &[u8]) -> Result<Self> {
        if config.format == Format::Gzip {
            return Err(OxiflateError::config(
                "gzip streams cannot use a preset dictionary",
            ));
        }
        let mut deflater = Self::new(config)?;
        deflater.dict_id = Some(Adler32::checksum(dictionary));
        deflater.dictionary = Some(dictionary.to_vec());
        deflater.prime();
        Ok(deflater)
    }

    /// Create a raw DEFLATE compressor at `level` (0-9), optionally primed
    /// with a dictionary.
    pub fn init(dictionary: Option<&[u8]>, level: u8) -> Result<Self> {
        let config = DeflateConfig::new(CompressionLevel::try_new(level)?);
        match dictionary {
            Some(dict) => Self::with_dictionary(config, dict),
            None => Self::new(config),
        }
    }

    fn prime(&mut self) {
        if let Some(dictionary) = &self.dictionary {
            self.lz77.set_dictionary(dictionary);
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &DeflateConfig {
        &self.config
    }

    /// Adler-32 of the preset dictionary, if one was given.
    pub fn dictionary_id(&self) -> Option<u32> {
        self.dict_id
    }

    /// Uncompressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Compressed bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Running container checksum of the input (0 for raw streams).
    pub fn checksum(&self) -> u32 {
        self.checksum.value()
    }

    /// Whether the stream has ended and all output was delivered.
    pub fn is_finished(&self) -> bool {
        self.state == State::Ended
    }

    /// Upper bound on the compressed size of `len` input bytes written in one
    /// stream without intermediate flushes.
    pub fn bound(&self, len: usize) -> usize {
        let wrapper = match self.config.format {
            Format::Zlib => 6 + if self.dict_id.is_some() { 4 } else { 0 },
            Format::Gzip => 18,
            Format::Raw | Format::Auto => 0,
        };
        compress_bound(len) + wrapper
    }

    /// Return to the initial state, keeping the configuration and dictionary.
    pub fn reset(&mut self) {
        self.lz77.reset();
        self.block.clear();
        self.writer.clear();
        self.checksum = StreamChecksum::for_format(self.config.format);
        self.state = State::Init;
        self.dirty = true;
        self.total_in = 0;
        self.total_out = 0;
        self.error = None;
        self.prime();
        debug!("deflate stream reset");
    }

    /// Compress `input` into `output`.
    ///
    /// Returns `(consumed, produced, status)`:
    /// - `NeedMoreInput`: all input was taken and any requested flush is
    ///   complete.
    /// - `NeedMoreOutput`: `output` filled up; call again with more room
    ///   and the unconsumed input.
    /// - `StreamEnd`: after [`FlushMode::Finish`], the whole stream has been
    ///   written.
    ///
    /// Once `Finish` has been requested only further `Finish` calls with
    /// empty input are accepted. Any error poisons the stream until
    /// [`Deflater::reset`].
    pub fn step(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.run(input, output, flush).inspect_err(|err| {
            debug!(error = %err, "deflate stream poisoned");
            self.error = Some(err.clone());
        })
    }

    fn run(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)> {
        match self.state {
            State::Ended => {
                if !input.is_empty() {
                    return Err(OxiflateError::config("input after end of stream"));
                }
                return Ok((0, 0, StreamStatus::StreamEnd));
            }
            State::Finishing => {
                if !input.is_empty() || flush != FlushMode::Finish {
                    return Err(OxiflateError::config(
                        "stream is finishing; only Finish without input may follow",
                    ));
                }
                let produced = self.drain(output);
                return Ok((0, produced, self.finishing_status()));
            }
            State::Init => {
                self.write_header();
                self.state = State::Active;
            }
            State::Active => {}
        }

        let mut consumed = 0;
        let mut produced = 0;
        loop {
            produced += self.drain(&mut output[produced..]);
            if self.writer.pending_bytes() > 0 {
                return Ok((consumed, produced, StreamStatus::NeedMoreOutput));
            }

            let taken = self.lz77.fill(&input[consumed..]);
            if taken > 0 {
                self.checksum.update(&input[consumed..consumed + taken]);
                self.total_in += taken as u64;
                consumed += taken;
                self.dirty = true;
            }

            let flushing = flush != FlushMode::None && consumed == input.len();
            if self.tokenize(flushing) {
                self.block.emit(&mut self.writer, false);
                continue;
            }
            if consumed == input.len() {
                break;
            }
        }

        match flush {
            FlushMode::None => {}
            FlushMode::Block => {
                if !self.block.is_empty() {
                    self.block.emit(&mut self.writer, false);
                }
            }
            FlushMode::Sync | FlushMode::Full => {
                if !self.block.is_empty() {
                    self.block.emit(&mut self.writer, false);
                }
                // A preceding block flush may have left bits short of a byte.
                if self.dirty || !self.writer.is_byte_aligned() {
                    write_sync_marker(&mut self.writer);
                }
                if flush == FlushMode::Full {
                    self.lz77.clear_history();
                }
                self.dirty = false;
                debug!(?flush, total_in = self.total_in, "deflate flush");
            }
            FlushMode::Finish => {
                self.block.emit(&mut self.writer, true);
                self.writer.flush_to_byte();
                let trailer =
                    wrapper::trailer(self.config.format, self.checksum.value(), self.total_in);
                self.writer.put_bytes(&trailer);
                self.state = State::Finishing;
            }
        }

        produced += self.drain(&mut output[produced..]);
        let status = if self.state == State::Finishing {
            self.finishing_status()
        } else if self.writer.pending_bytes() > 0 {
            StreamStatus::NeedMoreOutput
        } else {
            StreamStatus::NeedMoreInput
        };
        Ok((consumed, produced, status))
    }

    /// Tokenize buffered input. Returns true when the block filled up.
    fn tokenize(&mut self, flushing: bool) -> bool {
        while let Some((token, bytes)) = self.lz77.next_token(flushing) {
            self.block.tally(token, bytes);
            if self.block.is_full() {
                return true;
            }
        }
        false
    }

    fn write_header(&mut self) {
        match self.config.format {
            Format::Zlib => {
                let header = wrapper::zlib_header(
                    self.config.window_bits,
                    self.config.level,
                    self.config.strategy,
                    self.dict_id,
                );
                self.writer.put_bytes(&header);
            }
            Format::Gzip => {
                let header = wrapper::gzip_header(self.config.level, self.config.strategy);
                self.writer.put_bytes(&header);
            }
            Format::Raw | Format::Auto => {}
        }
    }

    fn drain(&mut self, output: &mut [u8]) -> usize {
        let n = self.writer.drain_into(output);
        self.total_out += n as u64;
        n
    }

    fn finishing_status(&mut self) -> StreamStatus {
        if self.writer.pending_bytes() > 0 {
            return StreamStatus::NeedMoreOutput;
        }
        self.state = State::Ended;
        debug!(
            total_in = self.total_in,
            total_out = self.total_out,
            "deflate stream finished"
        );
        StreamStatus::StreamEnd
    }
}

impl Compressor for Deflater {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)> {
        self.step(input, output, flush)
    }

    fn reset(&mut self) {
        Deflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        Deflater::is_finished(self)
    }
}

/// Upper bound on the raw DEFLATE size of `len` input bytes compressed in
/// one stream without intermediate flushes, at any level.
///
/// Every block costs at most as much as storing it, and a stored chunk adds
/// at most six bytes of header and padding.
pub fn compress_bound(len: usize) -> usize {
    len + 6 * (len / 8192 + len / MAX_STORED_BLOCK + 2)
}

/// Compress data using DEFLATE at `level` (clamped to 0-9).
///
/// # Example
///
/// ```rust
/// use oxiflate_deflate::{deflate, inflate};
///
/// let compressed = deflate(b"AAAAAAAAAA", 6).unwrap();
/// assert_eq!(inflate(&compressed).unwrap(), b"AAAAAAAAAA");
/// ```
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut deflater = Deflater::new(DeflateConfig::new(level))?;
    deflater.compress_all(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;
    use oxiflate_core::traits::Strategy;

    fn compress_in_chunks(config: DeflateConfig, data: &[u8], chunk: usize) -> Vec<u8> {
        let mut deflater = Deflater::new(config).unwrap();
        let mut compressed = Vec::new();
        let mut buffer = [0u8; 4096];
        for piece in data.chunks(chunk) {
            let mut pos = 0;
            loop {
                let (consumed, produced, _) = deflater
                    .step(&piece[pos..], &mut buffer, FlushMode::None)
                    .unwrap();
                pos += consumed;
                compressed.extend_from_slice(&buffer[..produced]);
                if pos == piece.len() && produced < buffer.len() {
                    break;
                }
            }
        }
        loop {
            let (_, produced, status) = deflater.step(&[], &mut buffer, FlushMode::Finish).unwrap();
            compressed.extend_from_slice(&buffer[..produced]);
            if status == StreamStatus::StreamEnd {
                break;
            }
        }
        compressed
    }

    fn sample_text(len: usize) -> Vec<u8> {
        let words = ["alpha ", "beta ", "gamma ", "delta ", "epsilon ", "zeta "];
        let mut out = Vec::with_capacity(len);
        let mut i = 0usize;
        while out.len() < len {
            out.extend_from_slice(words[(i * 7 + i / 3) % words.len()].as_bytes());
            i += 1;
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_deflate_empty() {
        assert_eq!(deflate(&[], 6).unwrap(), vec![0x03, 0x00]);
        assert_eq!(deflate(&[], 0).unwrap(), vec![0x01, 0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_deflate_stored() {
        let data = b"Hello";
        let compressed = deflate(data, 0).unwrap();
        assert_eq!(compressed[0], 0x01);
        assert_eq!(&compressed[1..5], &[5, 0, 0xFA, 0xFF]);
        assert_eq!(&compressed[5..], data);
    }

    #[test]
    fn test_deflate_repeated_char() {
        let compressed = deflate(b"AAAAAAAAAA", 6).unwrap();
        assert!(compressed.len() < 10);
        assert_eq!(inflate(&compressed).unwrap(), b"AAAAAAAAAA");
    }

    #[test]
    fn test_deflate_roundtrip_levels() {
        let data = sample_text(100_000);
        for level in 0..=9 {
            let compressed = deflate(&data, level).unwrap();
            assert_eq!(inflate(&compressed).unwrap(), data, "level {}", level);
            if level > 0 {
                assert!(compressed.len() < data.len() / 2, "level {}", level);
            }
        }
    }

    #[test]
    fn test_deflate_level_comparison() {
        let data = sample_text(50_000);
        let fast = deflate(&data, 1).unwrap();
        let best = deflate(&data, 9).unwrap();
        assert!(best.len() <= fast.len());
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let data = sample_text(70_000);
        for level in [0, 1, 6, 9] {
            let config = DeflateConfig::new(level);
            let whole = compress_in_chunks(config, &data, data.len());
            assert_eq!(compress_in_chunks(config, &data, 1), whole, "level {}", level);
            assert_eq!(compress_in_chunks(config, &data, 4097), whole, "level {}", level);
        }
    }

    #[test]
    fn test_tiny_output_buffer() {
        let data = sample_text(20_000);
        let mut deflater = Deflater::new(DeflateConfig::ZLIB).unwrap();
        let mut compressed = Vec::new();
        let mut pos = 0;
        let mut byte = [0u8; 1];
        loop {
            let (consumed, produced, status) = deflater
                .step(&data[pos..], &mut byte, FlushMode::Finish)
                .unwrap();
            pos += consumed;
            compressed.extend_from_slice(&byte[..produced]);
            if status == StreamStatus::StreamEnd {
                break;
            }
        }
        assert_eq!(pos, data.len());
        assert_eq!(compressed, crate::wrapper::zlib_compress(&data, 6).unwrap());
    }

    #[test]
    fn test_sync_flush_is_byte_aligned() {
        let mut deflater = Deflater::new(DeflateConfig::RAW).unwrap();
        let mut buffer = [0u8; 256];
        let (consumed, produced, status) = deflater
            .step(b"hello hello", &mut buffer, FlushMode::Sync)
            .unwrap();
        assert_eq!(consumed, 11);
        assert_eq!(status, StreamStatus::NeedMoreInput);
        assert_eq!(&buffer[produced - 4..produced], &[0x00, 0x00, 0xFF, 0xFF]);

        // A second sync without new input adds nothing.
        let (_, again, _) = deflater.step(&[], &mut buffer, FlushMode::Sync).unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_block_then_sync_is_byte_aligned() {
        for flush in [FlushMode::Sync, FlushMode::Full] {
            let mut deflater = Deflater::new(DeflateConfig::RAW).unwrap();
            let mut buffer = [0u8; 256];
            let (consumed, first, _) = deflater
                .step(b"hello hello hello", &mut buffer, FlushMode::Block)
                .unwrap();
            assert_eq!(consumed, 17);
            let mut compressed = buffer[..first].to_vec();

            let (_, second, status) = deflater.step(&[], &mut buffer, flush).unwrap();
            assert_eq!(status, StreamStatus::NeedMoreInput);
            compressed.extend_from_slice(&buffer[..second]);
            assert!(
                compressed.ends_with(&[0x00, 0x00, 0xFF, 0xFF]),
                "{flush:?}: {compressed:02x?}"
            );
            assert!(inflate(&compressed).is_err());

            let (_, rest, status) = deflater
                .step(b" world", &mut buffer, FlushMode::Finish)
                .unwrap();
            assert_eq!(status, StreamStatus::StreamEnd);
            compressed.extend_from_slice(&buffer[..rest]);
            assert_eq!(inflate(&compressed).unwrap(), b"hello hello hello world");
        }
    }

    #[test]
    fn test_block_flush_keeps_bits_pending() {
        let mut deflater = Deflater::new(DeflateConfig::RAW).unwrap();
        let mut buffer = [0u8; 256];
        let (_, first, _) = deflater.step(b"abc", &mut buffer, FlushMode::Block).unwrap();
        let mut compressed = buffer[..first].to_vec();
        let (_, rest, status) = deflater.step(&[], &mut buffer, FlushMode::Finish).unwrap();
        assert_eq!(status, StreamStatus::StreamEnd);
        compressed.extend_from_slice(&buffer[..rest]);
        assert_eq!(inflate(&compressed).unwrap(), b"abc");
    }

    #[test]
    fn test_finish_only_accepts_finish() {
        let mut deflater = Deflater::new(DeflateConfig::RAW).unwrap();
        let mut tiny = [0u8; 1];
        let (_, _, status) = deflater
            .step(&sample_text(1000), &mut tiny, FlushMode::Finish)
            .unwrap();
        assert_eq!(status, StreamStatus::NeedMoreOutput);

        let err = deflater.step(&[], &mut tiny, FlushMode::None).unwrap_err();
        assert!(matches!(err, OxiflateError::InvalidConfig { .. }));
        // Poisoned until reset.
        assert_eq!(
            deflater.step(&[], &mut tiny, FlushMode::Finish).unwrap_err(),
            err
        );

        deflater.reset();
        let compressed = deflater.compress_all(b"fresh").unwrap();
        assert_eq!(inflate(&compressed).unwrap(), b"fresh");
    }

    #[test]
    fn test_input_after_end_is_rejected() {
        let mut deflater = Deflater::new(DeflateConfig::RAW).unwrap();
        deflater.compress_all(b"data").unwrap();
        assert!(deflater.is_finished());
        let mut buffer = [0u8; 16];
        assert_eq!(
            deflater.step(&[], &mut buffer, FlushMode::Finish).unwrap(),
            (0, 0, StreamStatus::StreamEnd)
        );
        assert!(deflater.step(b"more", &mut buffer, FlushMode::None).is_err());
    }

    #[test]
    fn test_init_rejects_bad_level() {
        assert!(matches!(
            Deflater::init(None, 10),
            Err(OxiflateError::InvalidConfig { .. })
        ));
        assert!(Deflater::init(Some(&b"dict"[..]), 9).is_ok());
    }

    #[test]
    fn test_dictionary_is_deterministic_and_used() {
        let dictionary = sample_text(2000);
        let data = sample_text(3000);
        let mut a = Deflater::init(Some(dictionary.as_slice()), 6).unwrap();
        let mut b = Deflater::init(Some(dictionary.as_slice()), 6).unwrap();
        let first = a.compress_all(&data).unwrap();
        assert_eq!(first, b.compress_all(&data).unwrap());
        assert_eq!(a.dictionary_id(), Some(Adler32::checksum(&dictionary)));

        // Reset keeps the dictionary.
        a.reset();
        assert_eq!(a.compress_all(&data).unwrap(), first);

        let plain = deflate(&data, 6).unwrap();
        assert!(first.len() < plain.len());
    }

    #[test]
    fn test_bounded_expansion() {
        let mut state = 0x1234_5678u32;
        let noise: Vec<u8> = (0..200_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();
        for level in [0, 1, 6, 9] {
            let deflater = Deflater::new(DeflateConfig::new(level)).unwrap();
            let compressed = deflate(&noise, level).unwrap();
            assert!(compressed.len() <= deflater.bound(noise.len()), "level {}", level);
        }
        // Level 6 closes a block every 16384 symbols; each costs at most its
        // stored size.
        let compressed = deflate(&noise, 6).unwrap();
        assert!(compressed.len() <= noise.len() + 6 * (noise.len() / 16384 + 1));
    }

    #[test]
    fn test_huffman_only_and_rle_roundtrip() {
        let data = sample_text(10_000);
        for strategy in [
            Strategy::HuffmanOnly,
            Strategy::Rle,
            Strategy::Filtered,
            Strategy::Fixed,
        ] {
            let config = DeflateConfig::new(6).with_strategy(strategy);
            let compressed = compress_in_chunks(config, &data, data.len());
            assert_eq!(inflate(&compressed).unwrap(), data, "{:?}", strategy);
        }
    }

    #[test]
    fn test_checksum_tracks_input() {
        let mut deflater = Deflater::new(DeflateConfig::ZLIB).unwrap();
        deflater.compress_all(b"Hello").unwrap();
        assert_eq!(deflater.checksum(), 0x058C01F5);
        assert_eq!(deflater.total_in(), 5);
        assert!(deflater.total_out() > 6);
    }
}
