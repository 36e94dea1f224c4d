//! DEFLATE decompression (inflate).
//!
//! [`Inflater`] decodes a stream incrementally. Every call decodes as far as
//! the supplied input and output allow and records where it stopped, so the
//! compressed bytes may arrive in pieces of any size, down to one byte, and
//! the output may be collected through a buffer of any size.
//!
//! Indivisible units (a block header, a symbol with its extra bits, a
//! code-length entry) are either decoded completely or left unconsumed.
//!
//! Supported block types:
//! - Type 0: Stored (uncompressed)
//! - Type 1: Fixed Huffman codes
//! - Type 2: Dynamic Huffman codes

use crate::config::{Format, InflateConfig};
use crate::huffman::{CODELEN_ALPHABET_SIZE, END_OF_BLOCK, HuffmanTree};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, decode_distance, decode_length,
    fixed_distance_tree, fixed_litlen_tree,
};
use crate::wrapper::{GzipHeader, Header, HeaderReader, StreamChecksum, TrailerCheck, trailer_len};
use oxiflate_core::adler::Adler32;
use oxiflate_core::error::{Interrupt, OxiflateError, Result};
use oxiflate_core::traits::{Decompressor, FlushMode, StreamStatus};
use oxiflate_core::{BitReader, BitState, RingBuffer};
use tracing::{debug, trace};

/// Where the decoder resumes on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// zlib or gzip header.
    Header,
    /// Three-bit block header.
    BlockHeader,
    /// LEN and NLEN of a stored block.
    StoredLen,
    /// Stored block payload.
    Stored { remaining: usize },
    /// Code description of a dynamic block.
    DynamicHeader,
    /// Huffman coded symbols.
    Body,
    /// Rest of a back-reference that did not fit the output.
    CopyMatch { length: usize, distance: usize },
    /// Container trailer.
    Trailer,
    /// Stream complete.
    Done,
}

/// Why a decoding state handed control back.
enum Flow {
    /// The state advanced; keep going.
    Next,
    /// The output slice is full.
    OutputFull,
    /// A non-final block ended.
    BlockEnd,
}

/// How a run of Huffman symbols stopped.
enum BodyEnd {
    EndOfBlock,
    OutputFull,
    Pending { length: usize, distance: usize },
}

#[derive(Debug, Clone)]
enum Tables {
    Fixed,
    Dynamic(Box<(HuffmanTree, HuffmanTree)>),
}

impl Tables {
    fn trees(&self) -> Result<(&HuffmanTree, &HuffmanTree)> {
        match self {
            Self::Fixed => Ok((fixed_litlen_tree()?, fixed_distance_tree()?)),
            Self::Dynamic(trees) => Ok((&trees.0, &trees.1)),
        }
    }
}

/// Partially read code description of a dynamic block.
#[derive(Debug, Clone, Default)]
struct DynamicHeader {
    counts: Option<(usize, usize, usize)>,
    codelen_lengths: [u8; CODELEN_ALPHABET_SIZE],
    codelen_read: usize,
    codelen_tree: Option<HuffmanTree>,
    lengths: Vec<u8>,
}

impl DynamicHeader {
    /// Continue reading; returns the literal/length and distance decoders
    /// once the description is complete.
    fn read(
        &mut self,
        reader: &mut BitReader<'_>,
    ) -> std::result::Result<(HuffmanTree, HuffmanTree), Interrupt> {
        let (hlit, hdist, hclen) = match self.counts {
            Some(counts) => counts,
            None => {
                let value = reader.get_bits(14)?;
                let hlit = (value & 0x1F) as usize + 257;
                let hdist = ((value >> 5) & 0x1F) as usize + 1;
                let hclen = (value >> 10) as usize + 4;
                if hlit > 286 || hdist > 30 {
                    return Err(OxiflateError::corrupt(
                        reader.bit_position(),
                        format!("too many length or distance symbols ({}, {})", hlit, hdist),
                    )
                    .into());
                }
                self.counts = Some((hlit, hdist, hclen));
                self.lengths.reserve(hlit + hdist);
                (hlit, hdist, hclen)
            }
        };

        while self.codelen_read < hclen {
            let len = reader.get_bits(3)? as u8;
            self.codelen_lengths[CODE_LENGTH_ORDER[self.codelen_read]] = len;
            self.codelen_read += 1;
        }

        if self.codelen_tree.is_none() {
            let tree = HuffmanTree::from_code_lengths_complete(&self.codelen_lengths)
                .map_err(|err| located(err, reader.bit_position()))?;
            self.codelen_tree = Some(tree);
        }
        let Some(tree) = &self.codelen_tree else {
            return Err(
                OxiflateError::corrupt(reader.bit_position(), "missing code length code").into(),
            );
        };

        let total = hlit + hdist;
        while self.lengths.len() < total {
            let checkpoint = reader.checkpoint();
            let symbol = tree.decode_symbol(reader)?;
            let (value, repeat) = match symbol {
                0..=15 => (symbol as u8, 1),
                16..=18 => {
                    let (extra_bits, base) = match symbol {
                        16 => (2, 3),
                        17 => (3, 3),
                        _ => (7, 11),
                    };
                    let extra = match reader.get_bits(extra_bits) {
                        Ok(extra) => extra as usize,
                        Err(err) => {
                            reader.rewind(checkpoint);
                            return Err(err.into());
                        }
                    };
                    let value = if symbol == 16 {
                        match self.lengths.last() {
                            Some(&prev) => prev,
                            None => {
                                return Err(OxiflateError::corrupt(
                                    reader.bit_position(),
                                    "repeat with no previous length",
                                )
                                .into());
                            }
                        }
                    } else {
                        0
                    };
                    (value, base + extra)
                }
                _ => {
                    return Err(OxiflateError::corrupt(
                        reader.bit_position(),
                        format!("invalid code length symbol {}", symbol),
                    )
                    .into());
                }
            };
            if self.lengths.len() + repeat > total {
                return Err(
                    OxiflateError::corrupt(reader.bit_position(), "too many code lengths").into(),
                );
            }
            self.lengths.extend(std::iter::repeat_n(value, repeat));
        }

        if self.lengths[END_OF_BLOCK as usize] == 0 {
            return Err(
                OxiflateError::corrupt(reader.bit_position(), "missing end-of-block code").into(),
            );
        }
        let position = reader.bit_position();
        let litlen = HuffmanTree::from_code_lengths(&self.lengths[..hlit])
            .map_err(|err| located(err, position))?;
        let dist = HuffmanTree::from_code_lengths(&self.lengths[hlit..])
            .map_err(|err| located(err, position))?;
        Ok((litlen, dist))
    }
}

/// Attach a stream position to a table construction error.
fn located(err: OxiflateError, offset: u64) -> OxiflateError {
    match err {
        OxiflateError::CorruptStream { message, .. } => {
            OxiflateError::CorruptStream { offset, message }
        }
        other => other,
    }
}

/// Decode Huffman symbols until the block ends or the output fills.
fn decode_body(
    tables: &Tables,
    window: &mut RingBuffer,
    reader: &mut BitReader<'_>,
    output: &mut [u8],
    produced: &mut usize,
) -> std::result::Result<BodyEnd, Interrupt> {
    let (litlen, dist) = tables.trees()?;
    loop {
        let checkpoint = reader.checkpoint();
        let symbol = litlen.decode_symbol(reader)?;
        match symbol {
            0..=255 => {
                if *produced == output.len() {
                    reader.rewind(checkpoint);
                    return Ok(BodyEnd::OutputFull);
                }
                output[*produced] = symbol as u8;
                window.write_byte(symbol as u8);
                *produced += 1;
            }
            END_OF_BLOCK => return Ok(BodyEnd::EndOfBlock),
            257..=285 => {
                let reference = read_reference(symbol, dist, reader);
                let (length, distance) = match reference {
                    Ok(reference) => reference,
                    Err(Interrupt::NeedMoreInput) => {
                        reader.rewind(checkpoint);
                        return Err(Interrupt::NeedMoreInput);
                    }
                    Err(fatal) => return Err(fatal),
                };
                let room = (output.len() - *produced).min(length);
                let copied =
                    window.resolve(distance, length, &mut output[*produced..*produced + room])?;
                *produced += copied;
                if copied < length {
                    return Ok(BodyEnd::Pending {
                        length: length - copied,
                        distance,
                    });
                }
            }
            _ => {
                return Err(OxiflateError::corrupt(
                    reader.bit_position(),
                    format!("invalid literal/length symbol {}", symbol),
                )
                .into());
            }
        }
    }
}

/// Read the length extra bits, distance code and distance extra bits that
/// follow a length symbol.
fn read_reference(
    symbol: u16,
    dist: &HuffmanTree,
    reader: &mut BitReader<'_>,
) -> std::result::Result<(usize, usize), Interrupt> {
    let index = (symbol - 257) as usize;
    let extra = reader.get_bits(LENGTH_EXTRA_BITS[index])? as u16;
    let length = decode_length(symbol, extra) as usize;

    let dist_symbol = dist.decode_symbol(reader)?;
    if dist_symbol >= 30 {
        return Err(OxiflateError::corrupt(
            reader.bit_position(),
            format!("invalid distance symbol {}", dist_symbol),
        )
        .into());
    }
    let extra = reader.get_bits(DISTANCE_EXTRA_BITS[dist_symbol as usize])? as u16;
    let distance = decode_distance(dist_symbol, extra) as usize;
    Ok((length, distance))
}

/// Streaming DEFLATE decompressor.
#[derive(Debug)]
pub struct Inflater {
    config: InflateConfig,
    dictionary: Option<Vec<u8>>,
    dict_id: Option<u32>,
    state: State,
    bits: BitState,
    window: RingBuffer,
    header: HeaderReader,
    /// Container in use; `Auto` until the header has been read.
    format: Format,
    gzip_header: Option<GzipHeader>,
    checksum: StreamChecksum,
    final_block: bool,
    tables: Option<Tables>,
    dynamic: Option<Box<DynamicHeader>>,
    trailer_bytes: Vec<u8>,
    trailer: Option<TrailerCheck>,
    total_in: u64,
    total_out: u64,
    /// Set by the first error; every later call returns it.
    error: Option<OxiflateError>,
}

impl Inflater {
    /// Create a decompressor for `config`.
    pub fn new(config: InflateConfig) -> Result<Self> {
        config.validate()?;
        let mut inflater = Self {
            config,
            dictionary: None,
            dict_id: None,
            state: State::Header,
            bits: BitState::default(),
            window: RingBuffer::new(config.window_size()),
            header: HeaderReader::new(config.format, config.window_bits),
            format: config.format,
            gzip_header: None,
            checksum: StreamChecksum::for_format(config.format),
            final_block: false,
            tables: None,
            dynamic: None,
            trailer_bytes: Vec::with_capacity(8),
            trailer: None,
            total_in: 0,
            total_out: 0,
            error: None,
        };
        inflater.reset();
        Ok(inflater)
    }

    /// Create a decompressor that may resolve references into `dictionary`.
    ///
    /// Raw streams see the dictionary as history from the start. zlib
    /// streams use it only when the header names it by Adler-32; a different
    /// identifier fails with `DictionaryMismatch`.
    pub fn with_dictionary(config: InflateConfig, dictionary: &[u8]) -> Result<Self> {
        if config.format == Format::Gzip {
            return Err(OxiflateError::config(
                "gzip streams cannot use a preset dictionary",
            ));
        }
        let mut inflater = Self::new(config)?;
        inflater.dict_id = Some(Adler32::checksum(dictionary));
        inflater.dictionary = Some(dictionary.to_vec());
        inflater.reset();
        Ok(inflater)
    }

    /// Create a raw DEFLATE decompressor, optionally primed with a
    /// dictionary.
    pub fn init(dictionary: Option<&[u8]>) -> Result<Self> {
        match dictionary {
            Some(dict) => Self::with_dictionary(InflateConfig::RAW, dict),
            None => Self::new(InflateConfig::RAW),
        }
    }

    /// Return to the initial state, keeping the configuration and dictionary.
    pub fn reset(&mut self) {
        self.state = if self.config.format == Format::Raw {
            State::BlockHeader
        } else {
            State::Header
        };
        self.bits = BitState::default();
        self.window.clear();
        if let (Format::Raw, Some(dictionary)) = (self.config.format, &self.dictionary) {
            self.window.preload_dictionary(dictionary);
        }
        self.header = HeaderReader::new(self.config.format, self.config.window_bits);
        self.format = self.config.format;
        self.gzip_header = None;
        self.checksum = StreamChecksum::for_format(self.config.format);
        self.final_block = false;
        self.tables = None;
        self.dynamic = None;
        self.trailer_bytes.clear();
        self.trailer = None;
        self.total_in = 0;
        self.total_out = 0;
        self.error = None;
    }

    /// Configuration in use.
    pub fn config(&self) -> &InflateConfig {
        &self.config
    }

    /// Container of the stream; for `Auto`, known once the header is read.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Header of a gzip member, once read.
    pub fn gzip_header(&self) -> Option<&GzipHeader> {
        self.gzip_header.as_ref()
    }

    /// Trailer checksums, once the trailer has been read.
    pub fn trailer(&self) -> Option<&TrailerCheck> {
        self.trailer.as_ref()
    }

    /// Fail if the trailer that was read disagrees with the decoded data.
    pub fn verify_trailer(&self) -> Result<()> {
        match &self.trailer {
            Some(check) => check.verify(),
            None => Ok(()),
        }
    }

    /// Compressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Decompressed bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Whether the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// Decompress `input` into `output`.
    ///
    /// Returns `(consumed, produced, status)`:
    /// - `NeedMoreInput`: every input byte was used; supply more.
    /// - `NeedMoreOutput`: `output` is full.
    /// - `Continue`: with [`FlushMode::Block`], a block just ended.
    /// - `StreamEnd`: the stream, including any trailer, is complete. Bytes
    ///   after it are not consumed.
    ///
    /// With [`FlushMode::Finish`] the input is taken to be complete, and
    /// running out of it is a `CorruptStream` error. Any error poisons the
    /// decompressor until [`Inflater::reset`]. A trailer mismatch is not an
    /// error here; see [`Inflater::trailer`].
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
            debug!(error = %err, "inflate stream poisoned");
            self.error = Some(err.clone());
        })
    }

    fn run(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)> {
        let mut reader = BitReader::resume(input, self.bits);
        let mut produced = 0;
        let mut checked = 0;
        let result = self.decode(&mut reader, output, &mut produced, &mut checked, flush);

        self.checksum.update(&output[checked..produced]);
        let (consumed, bits) = if matches!(result, Ok(StreamStatus::NeedMoreInput)) {
            reader.suspend_exhausted()
        } else {
            reader.suspend()
        };
        self.bits = bits;
        self.total_in += consumed as u64;
        self.total_out += produced as u64;

        let status = result?;
        Ok((consumed, produced, status))
    }

    fn decode(
        &mut self,
        reader: &mut BitReader<'_>,
        output: &mut [u8],
        produced: &mut usize,
        checked: &mut usize,
        flush: FlushMode,
    ) -> Result<StreamStatus> {
        loop {
            let flow = match self.state {
                State::Header => self.read_header(reader),
                State::BlockHeader => self.read_block_header(reader),
                State::StoredLen => self.read_stored_len(reader),
                State::Stored { remaining } => {
                    self.copy_stored(reader, output, produced, remaining)
                }
                State::DynamicHeader => self.read_dynamic_header(reader),
                State::Body => self.read_body(reader, output, produced),
                State::CopyMatch { length, distance } => {
                    self.copy_match(output, produced, length, distance)
                }
                State::Trailer => {
                    self.checksum.update(&output[*checked..*produced]);
                    *checked = *produced;
                    self.read_trailer(reader, *produced)
                }
                State::Done => return Ok(StreamStatus::StreamEnd),
            };

            match flow {
                Ok(Flow::Next) => {}
                Ok(Flow::OutputFull) => return Ok(StreamStatus::NeedMoreOutput),
                Ok(Flow::BlockEnd) => {
                    if flush == FlushMode::Block {
                        return Ok(StreamStatus::Continue);
                    }
                }
                Err(Interrupt::NeedMoreInput) => {
                    if flush == FlushMode::Finish {
                        return Err(OxiflateError::corrupt(
                            reader.bit_position(),
                            "truncated stream",
                        ));
                    }
                    return Ok(StreamStatus::NeedMoreInput);
                }
                Err(Interrupt::Fatal(err)) => return Err(err),
            }
        }
    }

    fn read_header(&mut self, reader: &mut BitReader<'_>) -> std::result::Result<Flow, Interrupt> {
        loop {
            let byte = reader.get_bits(8)? as u8;
            if let Some(header) = self.header.push(byte)? {
                self.begin_stream(header)?;
                self.state = State::BlockHeader;
                return Ok(Flow::Next);
            }
        }
    }

    fn begin_stream(&mut self, header: Header) -> Result<()> {
        match header {
            Header::Zlib { dict_id, .. } => {
                self.format = Format::Zlib;
                self.checksum = StreamChecksum::for_format(Format::Zlib);
                if let Some(expected) = dict_id {
                    match (&self.dictionary, self.dict_id) {
                        (Some(dictionary), Some(found)) if found == expected => {
                            self.window.preload_dictionary(dictionary);
                        }
                        (_, found) => {
                            return Err(OxiflateError::dictionary_mismatch(expected, found));
                        }
                    }
                }
            }
            Header::Gzip(header) => {
                self.format = Format::Gzip;
                self.checksum = StreamChecksum::for_format(Format::Gzip);
                self.gzip_header = Some(header);
            }
        }
        Ok(())
    }

    fn read_block_header(
        &mut self,
        reader: &mut BitReader<'_>,
    ) -> std::result::Result<Flow, Interrupt> {
        let header = reader.get_bits(3)?;
        self.final_block = header & 1 != 0;
        let btype = header >> 1;
        trace!(
            final_block = self.final_block,
            btype,
            position = reader.bit_position(),
            "block header"
        );

        match btype {
            0 => {
                reader.align_to_byte();
                self.state = State::StoredLen;
            }
            1 => {
                self.tables = Some(Tables::Fixed);
                self.state = State::Body;
            }
            2 => {
                self.dynamic = Some(Box::default());
                self.state = State::DynamicHeader;
            }
            _ => {
                return Err(OxiflateError::corrupt(
                    reader.bit_position() - 3,
                    "invalid block type 3",
                )
                .into());
            }
        }
        Ok(Flow::Next)
    }

    fn read_stored_len(
        &mut self,
        reader: &mut BitReader<'_>,
    ) -> std::result::Result<Flow, Interrupt> {
        let value = reader.get_bits(32)?;
        let len = value & 0xFFFF;
        let nlen = value >> 16;
        if len != !nlen & 0xFFFF {
            return Err(OxiflateError::corrupt(
                reader.bit_position() - 32,
                format!("stored block length {:#06x} does not match complement {:#06x}", len, nlen),
            )
            .into());
        }
        if len == 0 {
            return Ok(self.end_block());
        }
        self.state = State::Stored {
            remaining: len as usize,
        };
        Ok(Flow::Next)
    }

    fn copy_stored(
        &mut self,
        reader: &mut BitReader<'_>,
        output: &mut [u8],
        produced: &mut usize,
        remaining: usize,
    ) -> std::result::Result<Flow, Interrupt> {
        if *produced == output.len() {
            return Ok(Flow::OutputFull);
        }
        let wanted = remaining.min(output.len() - *produced);
        let copied = reader.copy_bytes(&mut output[*produced..*produced + wanted]);
        self.window.write_bytes(&output[*produced..*produced + copied]);
        *produced += copied;

        let remaining = remaining - copied;
        if remaining == 0 {
            return Ok(self.end_block());
        }
        self.state = State::Stored { remaining };
        if copied < wanted {
            Err(Interrupt::NeedMoreInput)
        } else {
            Ok(Flow::OutputFull)
        }
    }

    fn read_dynamic_header(
        &mut self,
        reader: &mut BitReader<'_>,
    ) -> std::result::Result<Flow, Interrupt> {
        let header = self.dynamic.get_or_insert_with(Box::default);
        let (litlen, dist) = header.read(reader)?;
        self.dynamic = None;
        self.tables = Some(Tables::Dynamic(Box::new((litlen, dist))));
        self.state = State::Body;
        Ok(Flow::Next)
    }

    fn read_body(
        &mut self,
        reader: &mut BitReader<'_>,
        output: &mut [u8],
        produced: &mut usize,
    ) -> std::result::Result<Flow, Interrupt> {
        let Some(tables) = &self.tables else {
            return Err(
                OxiflateError::corrupt(reader.bit_position(), "block without code tables").into(),
            );
        };
        match decode_body(tables, &mut self.window, reader, output, produced)? {
            BodyEnd::EndOfBlock => Ok(self.end_block()),
            BodyEnd::OutputFull => Ok(Flow::OutputFull),
            BodyEnd::Pending { length, distance } => {
                self.state = State::CopyMatch { length, distance };
                Ok(Flow::OutputFull)
            }
        }
    }

    fn copy_match(
        &mut self,
        output: &mut [u8],
        produced: &mut usize,
        length: usize,
        distance: usize,
    ) -> std::result::Result<Flow, Interrupt> {
        if *produced == output.len() {
            return Ok(Flow::OutputFull);
        }
        let room = (output.len() - *produced).min(length);
        let copied = self
            .window
            .resolve(distance, length, &mut output[*produced..*produced + room])?;
        *produced += copied;
        if copied == length {
            self.state = State::Body;
            return Ok(Flow::Next);
        }
        self.state = State::CopyMatch {
            length: length - copied,
            distance,
        };
        Ok(Flow::OutputFull)
    }

    fn end_block(&mut self) -> Flow {
        self.tables = None;
        if !self.final_block {
            self.state = State::BlockHeader;
            return Flow::BlockEnd;
        }
        self.state = if trailer_len(self.format) > 0 {
            State::Trailer
        } else {
            State::Done
        };
        if self.state == State::Done {
            debug!(total_out = self.total_out, "inflate stream finished");
        }
        Flow::Next
    }

    fn read_trailer(
        &mut self,
        reader: &mut BitReader<'_>,
        produced: usize,
    ) -> std::result::Result<Flow, Interrupt> {
        reader.align_to_byte();
        let needed = trailer_len(self.format);
        while self.trailer_bytes.len() < needed {
            let byte = reader.get_bits(8)? as u8;
            self.trailer_bytes.push(byte);
        }

        let decoded = self.total_out + produced as u64;
        let computed = self.checksum.value();
        let check = TrailerCheck::read(self.format, &self.trailer_bytes, computed, decoded);
        debug!(
            format = ?self.format,
            expected = check.expected,
            computed = check.computed,
            valid = check.is_valid(),
            "stream trailer read"
        );
        self.trailer = Some(check);
        self.state = State::Done;
        Ok(Flow::Next)
    }
}

impl Decompressor for Inflater {
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)> {
        self.step(input, output, flush)
    }

    fn reset(&mut self) {
        Inflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        Inflater::is_finished(self)
    }
}

/// Decompress raw DEFLATE data.
///
/// # Example
///
/// ```rust
/// use oxiflate_deflate::inflate;
///
/// // Empty final block with fixed codes.
/// assert!(inflate(&[0x03, 0x00]).unwrap().is_empty());
/// ```
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    Inflater::new(InflateConfig::RAW)?.decompress_all(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::deflate;

    fn decode_in_pieces(compressed: &[u8], in_chunk: usize, out_chunk: usize) -> Result<Vec<u8>> {
        let mut inflater = Inflater::new(InflateConfig::RAW)?;
        let mut output = Vec::new();
        let mut buffer = vec![0u8; out_chunk];
        let mut pos = 0;
        loop {
            let end = (pos + in_chunk).min(compressed.len());
            let flush = if end == compressed.len() {
                FlushMode::Finish
            } else {
                FlushMode::None
            };
            let (consumed, produced, status) =
                inflater.step(&compressed[pos..end], &mut buffer, flush)?;
            pos += consumed;
            output.extend_from_slice(&buffer[..produced]);
            if status == StreamStatus::StreamEnd {
                return Ok(output);
            }
        }
    }

    #[test]
    fn test_inflate_stored_block() {
        let compressed = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];
        assert_eq!(inflate(&compressed).unwrap(), b"Hello");
    }

    #[test]
    fn test_inflate_fixed_block() {
        // "a" with fixed codes: literal 0x61 is 10010001, then end of block.
        let compressed = [0x4B, 0x04, 0x00];
        assert_eq!(inflate(&compressed).unwrap(), b"a");
    }

    #[test]
    fn test_inflate_empty_streams() {
        assert!(inflate(&[0x03, 0x00]).unwrap().is_empty());
        assert!(inflate(&[0x01, 0x00, 0x00, 0xFF, 0xFF]).unwrap().is_empty());
    }

    #[test]
    fn test_one_byte_pieces() {
        let data: Vec<u8> = (0..20_000u32).map(|i| ((i * i) % 251) as u8).collect();
        let compressed = deflate(&data, 6).unwrap();
        assert_eq!(decode_in_pieces(&compressed, 1, 1).unwrap(), data);
        assert_eq!(decode_in_pieces(&compressed, 1, 7).unwrap(), data);
        assert_eq!(decode_in_pieces(&compressed, 333, 1).unwrap(), data);
    }

    #[test]
    fn test_invalid_block_type() {
        let err = inflate(&[0x07]).unwrap_err();
        assert!(matches!(err, OxiflateError::CorruptStream { .. }));
    }

    #[test]
    fn test_stored_length_mismatch() {
        let err = inflate(&[0x01, 0x05, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, OxiflateError::CorruptStream { .. }));
    }

    #[test]
    fn test_distance_before_start() {
        // Fixed block: literal 'a', then length 3 at distance 2.
        let mut writer = oxiflate_core::BitWriter::new();
        writer.put_bits(1, 1);
        writer.put_bits(1, 2);
        let litlen = crate::tables::fixed_litlen_table();
        let distance = crate::tables::fixed_distance_table();
        litlen.encode_symbol(b'a' as usize, &mut writer);
        litlen.encode_symbol(257, &mut writer);
        distance.encode_symbol(1, &mut writer);
        litlen.encode_symbol(256, &mut writer);
        writer.flush_to_byte();
        let mut compressed = vec![0u8; writer.pending_bytes()];
        writer.drain_into(&mut compressed);

        assert_eq!(
            inflate(&compressed).unwrap_err(),
            OxiflateError::invalid_distance(2, 1)
        );
    }

    #[test]
    fn test_truncated_stream() {
        let compressed = deflate(b"some text that is long enough to matter", 6).unwrap();
        let err = inflate(&compressed[..compressed.len() - 1]).unwrap_err();
        assert!(matches!(err, OxiflateError::CorruptStream { .. }));

        let mut inflater = Inflater::new(InflateConfig::RAW).unwrap();
        let mut buffer = [0u8; 64];
        let (consumed, _, status) = inflater
            .step(&compressed[..2], &mut buffer, FlushMode::None)
            .unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(status, StreamStatus::NeedMoreInput);
    }

    #[test]
    fn test_error_poisons_until_reset() {
        let mut inflater = Inflater::new(InflateConfig::RAW).unwrap();
        let mut buffer = [0u8; 16];
        let err = inflater.step(&[0x07], &mut buffer, FlushMode::Finish).unwrap_err();
        assert_eq!(
            inflater.step(&[0x03, 0x00], &mut buffer, FlushMode::Finish).unwrap_err(),
            err
        );

        inflater.reset();
        let (_, produced, status) = inflater
            .step(&[0x03, 0x00], &mut buffer, FlushMode::Finish)
            .unwrap();
        assert_eq!((produced, status), (0, StreamStatus::StreamEnd));
    }

    #[test]
    fn test_block_mode_stops_at_boundaries() {
        // Two stored blocks: "ab" (not final) then "c" (final).
        let compressed = [
            0x00, 0x02, 0x00, 0xFD, 0xFF, b'a', b'b', 0x01, 0x01, 0x00, 0xFE, 0xFF, b'c',
        ];
        let mut inflater = Inflater::new(InflateConfig::RAW).unwrap();
        let mut buffer = [0u8; 16];
        let (consumed, produced, status) = inflater
            .step(&compressed, &mut buffer, FlushMode::Block)
            .unwrap();
        assert_eq!(status, StreamStatus::Continue);
        assert_eq!(&buffer[..produced], b"ab");

        let (_, produced, status) = inflater
            .step(&compressed[consumed..], &mut buffer, FlushMode::Block)
            .unwrap();
        assert_eq!(status, StreamStatus::StreamEnd);
        assert_eq!(&buffer[..produced], b"c");
    }

    #[test]
    fn test_trailing_bytes_not_consumed() {
        let mut compressed = crate::wrapper::zlib_compress(b"payload", 6).unwrap();
        let len = compressed.len();
        compressed.extend_from_slice(b"junk");
        let mut inflater = Inflater::new(InflateConfig::ZLIB).unwrap();
        let mut buffer = [0u8; 64];
        let (consumed, produced, status) = inflater
            .step(&compressed, &mut buffer, FlushMode::Finish)
            .unwrap();
        assert_eq!(status, StreamStatus::StreamEnd);
        assert_eq!(consumed, len);
        assert_eq!(&buffer[..produced], b"payload");
        assert!(inflater.trailer().unwrap().is_valid());
    }

    #[test]
    fn test_auto_detection() {
        let data = b"detected either way";
        for compressed in [
            crate::wrapper::zlib_compress(data, 6).unwrap(),
            crate::wrapper::gzip_compress(data, 6).unwrap(),
        ] {
            let mut inflater = Inflater::new(InflateConfig::AUTO).unwrap();
            assert_eq!(inflater.decompress_all(&compressed).unwrap(), data);
            assert!(inflater.trailer().unwrap().is_valid());
            assert_ne!(inflater.format(), Format::Auto);
        }
    }

    #[test]
    fn test_raw_dictionary() {
        let dictionary = b"common prefix material";
        let data = b"common prefix material, again";
        let mut deflater = crate::deflate::Deflater::init(Some(&dictionary[..]), 9).unwrap();
        let compressed =
            oxiflate_core::traits::Compressor::compress_all(&mut deflater, data).unwrap();

        let mut inflater = Inflater::init(Some(&dictionary[..])).unwrap();
        assert_eq!(inflater.decompress_all(&compressed).unwrap(), data);

        // Without the dictionary the first reference points before the start.
        assert!(matches!(
            inflate(&compressed),
            Err(OxiflateError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn test_small_window_rejects_far_reference() {
        let mut data = vec![0u8; 0];
        data.extend_from_slice(b"0123456789abcdefghij");
        data.extend(std::iter::repeat_n(b'-', 2000));
        data.extend_from_slice(b"0123456789abcdefghij");
        let compressed = deflate(&data, 9).unwrap();

        let mut inflater = Inflater::new(InflateConfig::RAW.with_window_bits(9)).unwrap();
        assert!(matches!(
            inflater.decompress_all(&compressed),
            Err(OxiflateError::InvalidDistance { .. })
        ));
    }
}
