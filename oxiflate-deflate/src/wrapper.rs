//! zlib (RFC 1950) and gzip (RFC 1952) framing.
//!
//! The framing adds a small header in front of the raw DEFLATE bit stream and
//! a checksum trailer after it:
//!
//! ```text
//! zlib: CMF FLG [DICTID] <deflate> ADLER32 (big-endian)
//! gzip: 1F 8B 08 FLG MTIME XFL OS [fields] <deflate> CRC32 ISIZE (little-endian)
//! ```
//!
//! Headers are read one byte at a time by [`HeaderReader`] so a stream can be
//! fed in arbitrary pieces. The one-shot helpers at the bottom of this module
//! drive the streaming engines over buffers held in memory.

use crate::config::{DeflateConfig, Format, InflateConfig};
use crate::deflate::Deflater;
use crate::inflate::Inflater;
use oxiflate_core::adler::Adler32;
use oxiflate_core::crc::Crc32;
use oxiflate_core::error::{OxiflateError, Result};
use oxiflate_core::traits::{CompressionLevel, Compressor, Decompressor, Strategy};
use tracing::trace;

/// gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression method byte for DEFLATE, shared by both containers.
const CM_DEFLATE: u8 = 8;

/// zlib FLG bit announcing a preset dictionary.
const ZLIB_FDICT: u8 = 0x20;

/// gzip OS byte for "unknown".
pub const OS_UNKNOWN: u8 = 255;

const GZIP_FTEXT: u8 = 0x01;
const GZIP_FHCRC: u8 = 0x02;
const GZIP_FEXTRA: u8 = 0x04;
const GZIP_FNAME: u8 = 0x08;
const GZIP_FCOMMENT: u8 = 0x10;
const GZIP_RESERVED: u8 = 0xE0;

/// Optional gzip fields, in the order they follow the fixed header.
const GZIP_FIELDS: [(u8, Stage); 4] = [
    (GZIP_FEXTRA, Stage::GzipExtraLen),
    (GZIP_FNAME, Stage::GzipName),
    (GZIP_FCOMMENT, Stage::GzipComment),
    (GZIP_FHCRC, Stage::GzipHeaderCrc),
];

/// FLEVEL field of the zlib header. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZlibLevel {
    /// Fastest algorithm (level 0-1, or a literal-oriented strategy).
    Fastest = 0,
    /// Fast algorithm (level 2-5).
    Fast = 1,
    /// Default algorithm (level 6).
    Default = 2,
    /// Maximum compression (level 7-9).
    Maximum = 3,
}

impl ZlibLevel {
    /// Map a level and strategy to the FLEVEL advertised in the header.
    pub fn for_level(level: CompressionLevel, strategy: Strategy) -> Self {
        if matches!(
            strategy,
            Strategy::HuffmanOnly | Strategy::Rle | Strategy::Fixed
        ) {
            return Self::Fastest;
        }
        match level.level() {
            0..=1 => Self::Fastest,
            2..=5 => Self::Fast,
            6 => Self::Default,
            _ => Self::Maximum,
        }
    }
}

/// Build a zlib header for a window of `1 << window_bits` bytes.
///
/// With `dict_id` the FDICT bit is set and the identifier follows big-endian.
pub fn zlib_header(
    window_bits: u8,
    level: CompressionLevel,
    strategy: Strategy,
    dict_id: Option<u32>,
) -> Vec<u8> {
    let cmf = ((window_bits.saturating_sub(8)) << 4) | CM_DEFLATE;
    let mut flg = (ZlibLevel::for_level(level, strategy) as u8) << 6;
    if dict_id.is_some() {
        flg |= ZLIB_FDICT;
    }

    // FCHECK makes (CMF * 256 + FLG) a multiple of 31
    let remainder = ((cmf as u16) * 256 + flg as u16) % 31;
    if remainder != 0 {
        flg += (31 - remainder) as u8;
    }

    let mut header = vec![cmf, flg];
    if let Some(id) = dict_id {
        header.extend_from_slice(&id.to_be_bytes());
    }
    header
}

/// Build the fixed ten-byte gzip header written by the compressor.
///
/// MTIME is zero and OS is "unknown"; XFL follows the level.
pub fn gzip_header(level: CompressionLevel, strategy: Strategy) -> [u8; 10] {
    let xfl = if level.level() == 9 {
        2
    } else if level.level() < 2 || matches!(strategy, Strategy::HuffmanOnly | Strategy::Rle) {
        4
    } else {
        0
    };
    [
        GZIP_MAGIC[0],
        GZIP_MAGIC[1],
        CM_DEFLATE,
        0,
        0,
        0,
        0,
        0,
        xfl,
        OS_UNKNOWN,
    ]
}

/// Parsed gzip member header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GzipHeader {
    /// FTEXT hint.
    pub text: bool,
    /// Modification time (Unix seconds, 0 if unknown).
    pub modification_time: u32,
    /// Extra flags (XFL).
    pub extra_flags: u8,
    /// Operating system byte.
    pub os: u8,
    /// FEXTRA payload.
    pub extra: Option<Vec<u8>>,
    /// Original file name, without the terminating zero.
    pub name: Option<Vec<u8>>,
    /// File comment, without the terminating zero.
    pub comment: Option<Vec<u8>>,
    /// Header CRC-16 when FHCRC was set. Already verified.
    pub header_crc: Option<u16>,
}

/// A fully read container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// zlib header.
    Zlib {
        /// Window size announced by CINFO, in bits.
        window_bits: u8,
        /// Preset dictionary identifier when FDICT is set.
        dict_id: Option<u32>,
    },
    /// gzip member header.
    Gzip(GzipHeader),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    ZlibDictId,
    GzipFixed,
    GzipExtraLen,
    GzipExtra(usize),
    GzipName,
    GzipComment,
    GzipHeaderCrc,
    Done,
}

/// Incremental reader for a zlib or gzip header.
#[derive(Debug, Clone)]
pub struct HeaderReader {
    format: Format,
    window_bits: u8,
    stage: Stage,
    buf: Vec<u8>,
    flags: u8,
    pending_fields: u8,
    window_log: u8,
    gzip: GzipHeader,
    header_crc: Crc32,
    position: u64,
}

impl HeaderReader {
    /// Reader for `format` (`Zlib`, `Gzip` or `Auto`) accepting windows up to
    /// `1 << window_bits` bytes.
    pub fn new(format: Format, window_bits: u8) -> Self {
        Self {
            format,
            window_bits,
            stage: Stage::Start,
            buf: Vec::with_capacity(10),
            flags: 0,
            pending_fields: 0,
            window_log: 0,
            gzip: GzipHeader::default(),
            header_crc: Crc32::new(),
            position: 0,
        }
    }

    /// Whether the header has been read completely.
    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Feed one byte. Returns the header once its last byte arrives.
    pub fn push(&mut self, byte: u8) -> Result<Option<Header>> {
        self.position += 1;
        match self.stage {
            Stage::Start => {
                self.buf.push(byte);
                if self.buf.len() < 2 {
                    return Ok(None);
                }
                let is_gzip = self.buf[..] == GZIP_MAGIC;
                match self.format {
                    Format::Gzip | Format::Auto if is_gzip => {
                        self.stage = Stage::GzipFixed;
                        Ok(None)
                    }
                    Format::Gzip => Err(self.corrupt("not a gzip stream")),
                    _ => self.read_zlib_header(),
                }
            }
            Stage::ZlibDictId => {
                self.buf.push(byte);
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                let dict_id =
                    u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
                Ok(Some(self.finish_zlib(Some(dict_id))))
            }
            Stage::GzipFixed => {
                self.buf.push(byte);
                if self.buf.len() < 10 {
                    return Ok(None);
                }
                self.read_gzip_fixed()
            }
            Stage::GzipExtraLen => {
                self.header_crc.update(&[byte]);
                self.buf.push(byte);
                if self.buf.len() < 2 {
                    return Ok(None);
                }
                let len = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
                self.buf.clear();
                if len == 0 {
                    self.gzip.extra = Some(Vec::new());
                    return Ok(self.next_field());
                }
                self.stage = Stage::GzipExtra(len);
                Ok(None)
            }
            Stage::GzipExtra(len) => {
                self.header_crc.update(&[byte]);
                self.buf.push(byte);
                if self.buf.len() < len {
                    return Ok(None);
                }
                self.gzip.extra = Some(std::mem::take(&mut self.buf));
                Ok(self.next_field())
            }
            Stage::GzipName | Stage::GzipComment => {
                self.header_crc.update(&[byte]);
                if byte != 0 {
                    self.buf.push(byte);
                    return Ok(None);
                }
                let field = std::mem::take(&mut self.buf);
                if self.stage == Stage::GzipName {
                    self.gzip.name = Some(field);
                } else {
                    self.gzip.comment = Some(field);
                }
                Ok(self.next_field())
            }
            Stage::GzipHeaderCrc => {
                self.buf.push(byte);
                if self.buf.len() < 2 {
                    return Ok(None);
                }
                let stored = u16::from_le_bytes([self.buf[0], self.buf[1]]);
                let computed = (self.header_crc.value() & 0xFFFF) as u16;
                if stored != computed {
                    return Err(self.corrupt("gzip header CRC mismatch"));
                }
                self.gzip.header_crc = Some(stored);
                Ok(self.next_field())
            }
            Stage::Done => Err(self.corrupt("header already complete")),
        }
    }

    fn read_zlib_header(&mut self) -> Result<Option<Header>> {
        let (cmf, flg) = (self.buf[0], self.buf[1]);

        if cmf & 0x0F != CM_DEFLATE {
            return Err(self.corrupt(format!("unsupported compression method {}", cmf & 0x0F)));
        }
        let cinfo = cmf >> 4;
        if cinfo > 7 {
            return Err(self.corrupt(format!("invalid window size {}", cinfo)));
        }
        if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
            return Err(self.corrupt("incorrect header check"));
        }
        self.window_log = cinfo + 8;
        if self.window_log > self.window_bits {
            return Err(self.corrupt(format!(
                "stream window of {} bits exceeds configured {}",
                self.window_log, self.window_bits
            )));
        }

        if flg & ZLIB_FDICT != 0 {
            self.buf.clear();
            self.stage = Stage::ZlibDictId;
            return Ok(None);
        }
        Ok(Some(self.finish_zlib(None)))
    }

    fn finish_zlib(&mut self, dict_id: Option<u32>) -> Header {
        self.buf.clear();
        self.stage = Stage::Done;
        trace!(window_bits = self.window_log, ?dict_id, "zlib header");
        Header::Zlib {
            window_bits: self.window_log,
            dict_id,
        }
    }

    fn read_gzip_fixed(&mut self) -> Result<Option<Header>> {
        if self.buf[2] != CM_DEFLATE {
            return Err(self.corrupt(format!("unsupported compression method {}", self.buf[2])));
        }
        let flags = self.buf[3];
        if flags & GZIP_RESERVED != 0 {
            return Err(self.corrupt("reserved gzip flag bits set"));
        }

        self.flags = flags;
        self.pending_fields = flags & !GZIP_FTEXT;
        self.gzip.text = flags & GZIP_FTEXT != 0;
        self.gzip.modification_time =
            u32::from_le_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
        self.gzip.extra_flags = self.buf[8];
        self.gzip.os = self.buf[9];
        self.header_crc.update(&self.buf);
        self.buf.clear();
        Ok(self.next_field())
    }

    /// Move to the next optional field announced by FLG, or finish.
    fn next_field(&mut self) -> Option<Header> {
        self.buf.clear();
        for (flag, stage) in GZIP_FIELDS {
            if self.pending_fields & flag != 0 {
                self.pending_fields &= !flag;
                self.stage = stage;
                return None;
            }
        }
        self.stage = Stage::Done;
        trace!(flags = self.flags, "gzip header");
        Some(Header::Gzip(std::mem::take(&mut self.gzip)))
    }

    fn corrupt(&self, message: impl Into<String>) -> OxiflateError {
        OxiflateError::corrupt(self.position.saturating_sub(1) * 8, message)
    }
}

/// Running checksum of the uncompressed data for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChecksum {
    /// Raw streams carry no checksum.
    None,
    /// zlib: Adler-32.
    Adler(Adler32),
    /// gzip: CRC-32.
    Crc(Crc32),
}

impl StreamChecksum {
    /// Fresh checksum for `format`. `Auto` starts without one until the
    /// header has been read.
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::Zlib => Self::Adler(Adler32::new()),
            Format::Gzip => Self::Crc(Crc32::new()),
            Format::Raw | Format::Auto => Self::None,
        }
    }

    /// Add uncompressed bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::Adler(adler) => adler.update(data),
            Self::Crc(crc) => crc.update(data),
        }
    }

    /// Current value (0 for raw streams).
    pub fn value(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Adler(adler) => adler.finish(),
            Self::Crc(crc) => crc.value(),
        }
    }
}

/// Bytes of trailer following the DEFLATE data for `format`.
pub fn trailer_len(format: Format) -> usize {
    match format {
        Format::Zlib => 4,
        Format::Gzip => 8,
        Format::Raw | Format::Auto => 0,
    }
}

/// Build the trailer for `format` from the final checksum and total input size.
pub fn trailer(format: Format, checksum: u32, total_in: u64) -> Vec<u8> {
    match format {
        Format::Zlib => checksum.to_be_bytes().to_vec(),
        Format::Gzip => {
            let mut bytes = checksum.to_le_bytes().to_vec();
            // ISIZE is the input size modulo 2^32
            bytes.extend_from_slice(&(total_in as u32).to_le_bytes());
            bytes
        }
        Format::Raw | Format::Auto => Vec::new(),
    }
}

/// Checksum trailer as read by the decompressor, next to the values it
/// computed over the decoded data.
///
/// The decompressor reports the trailer instead of failing on a mismatch;
/// call [`TrailerCheck::verify`] to turn a mismatch into an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerCheck {
    /// Checksum stored in the trailer.
    pub expected: u32,
    /// Checksum of the decoded bytes.
    pub computed: u32,
    /// gzip ISIZE from the trailer.
    pub expected_len: Option<u32>,
    /// Decoded length modulo 2^32 (gzip only).
    pub actual_len: Option<u32>,
}

impl TrailerCheck {
    /// Interpret trailer `bytes` for `format`.
    pub fn read(format: Format, bytes: &[u8], computed: u32, decoded_len: u64) -> Self {
        match (format, bytes) {
            (Format::Gzip, [c0, c1, c2, c3, l0, l1, l2, l3, ..]) => Self {
                expected: u32::from_le_bytes([*c0, *c1, *c2, *c3]),
                computed,
                expected_len: Some(u32::from_le_bytes([*l0, *l1, *l2, *l3])),
                actual_len: Some(decoded_len as u32),
            },
            (_, [b0, b1, b2, b3, ..]) => Self {
                expected: u32::from_be_bytes([*b0, *b1, *b2, *b3]),
                computed,
                expected_len: None,
                actual_len: None,
            },
            _ => Self {
                expected: 0,
                computed,
                expected_len: None,
                actual_len: None,
            },
        }
    }

    /// Whether checksum and length agree.
    pub fn is_valid(&self) -> bool {
        self.expected == self.computed && self.expected_len == self.actual_len
    }

    /// Fail with `ChecksumMismatch` or a length error if the trailer disagrees.
    pub fn verify(&self) -> Result<()> {
        if self.expected != self.computed {
            return Err(OxiflateError::checksum_mismatch(
                self.expected,
                self.computed,
            ));
        }
        if let (Some(expected), Some(actual)) = (self.expected_len, self.actual_len) {
            if expected != actual {
                return Err(OxiflateError::corrupt(
                    0,
                    format!(
                        "length mismatch: trailer says {} bytes, decoded {}",
                        expected, actual
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Check whether `input` starts with a zlib header that requires a preset
/// dictionary, and return its identifier.
pub fn zlib_requires_dictionary(input: &[u8]) -> Option<u32> {
    let mut reader = HeaderReader::new(Format::Zlib, crate::config::MAX_WINDOW_BITS);
    for &byte in input {
        match reader.push(byte) {
            Ok(Some(Header::Zlib { dict_id, .. })) => return dict_id,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

fn compress_framed(
    config: DeflateConfig,
    dictionary: Option<&[u8]>,
    input: &[u8],
) -> Result<Vec<u8>> {
    let mut deflater = match dictionary {
        Some(dict) => Deflater::with_dictionary(config, dict)?,
        None => Deflater::new(config)?,
    };
    deflater.compress_all(input)
}

fn decompress_framed(
    config: InflateConfig,
    dictionary: Option<&[u8]>,
    input: &[u8],
) -> Result<Vec<u8>> {
    let mut inflater = match dictionary {
        Some(dict) => Inflater::with_dictionary(config, dict)?,
        None => Inflater::new(config)?,
    };
    let output = inflater.decompress_all(input)?;
    inflater.verify_trailer()?;
    Ok(output)
}

/// Compress data to zlib format.
///
/// # Example
///
/// ```rust
/// use oxiflate_deflate::{zlib_compress, zlib_decompress};
///
/// let data = b"Hello, World!";
/// let compressed = zlib_compress(data, 6).unwrap();
/// assert_eq!(compressed[0], 0x78);
/// let decompressed = zlib_decompress(&compressed).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_framed(DeflateConfig::ZLIB.with_level(level), None, input)
}

/// Compress data to zlib format with a preset dictionary.
///
/// The header carries the dictionary's Adler-32 and the decompressor must be
/// given the same dictionary.
pub fn zlib_compress_with_dict(input: &[u8], level: u8, dictionary: &[u8]) -> Result<Vec<u8>> {
    compress_framed(DeflateConfig::ZLIB.with_level(level), Some(dictionary), input)
}

/// Decompress zlib data and verify the Adler-32 trailer.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    decompress_framed(InflateConfig::ZLIB, None, input)
}

/// Decompress zlib data that was compressed with a preset dictionary.
///
/// Fails with `DictionaryMismatch` when the stream names a different
/// dictionary.
pub fn zlib_decompress_with_dict(input: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    decompress_framed(InflateConfig::ZLIB, Some(dictionary), input)
}

/// Compress data to a single gzip member.
///
/// # Example
///
/// ```rust
/// use oxiflate_deflate::{gzip_compress, gzip_decompress};
///
/// let compressed = gzip_compress(b"abcabcabc", 9).unwrap();
/// assert_eq!(&compressed[..2], &[0x1F, 0x8B]);
/// assert_eq!(gzip_decompress(&compressed).unwrap(), b"abcabcabc");
/// ```
pub fn gzip_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_framed(DeflateConfig::GZIP.with_level(level), None, input)
}

/// Decompress one gzip member and verify CRC-32 and ISIZE.
pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>> {
    decompress_framed(InflateConfig::GZIP, None, input)
}
