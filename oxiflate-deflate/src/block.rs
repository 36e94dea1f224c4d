//! Block assembly for DEFLATE compression.
//!
//! [`BlockEncoder`] collects the tokens of one block together with the raw
//! bytes they cover, prices the block as stored, fixed-Huffman and
//! dynamic-Huffman, and writes the cheapest encoding. Stored costs at most
//! five bytes per 64 KiB chunk over the raw data and is always a candidate,
//! so a block never comes out larger than its stored form.

use crate::config::DeflateConfig;
use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanTable,
    LITLEN_ALPHABET_SIZE, MAX_CODE_LENGTH, MAX_CODELEN_LENGTH,
};
use crate::lz77::Lz77Token;
use crate::tables::{
    CODE_LENGTH_ORDER, FIXED_DISTANCE_LENGTHS, FIXED_LITLEN_LENGTHS, MAX_STORED_BLOCK,
    distance_to_code, fixed_distance_table, fixed_litlen_table, length_to_code,
};
use oxiflate_core::BitWriter;
use oxiflate_core::traits::Strategy;
use tracing::debug;

/// Raw bytes one block may cover.
pub const MAX_BLOCK_BYTES: usize = 1 << 18;

/// Encoding of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Raw bytes (BTYPE 00).
    Stored,
    /// Fixed Huffman codes (BTYPE 01).
    Fixed,
    /// Transmitted Huffman codes (BTYPE 10).
    Dynamic,
}

impl BlockKind {
    /// BTYPE field value.
    pub fn btype(self) -> u32 {
        match self {
            Self::Stored => 0b00,
            Self::Fixed => 0b01,
            Self::Dynamic => 0b10,
        }
    }
}

/// Which encodings a block may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Level 0: stored blocks of up to 65535 bytes.
    StoredOnly,
    /// Stored or fixed.
    FixedOnly,
    /// Any encoding; dynamic must beat fixed by more than 1/16.
    PreferFixed,
    /// Cheapest encoding.
    Smallest,
}

impl BlockPolicy {
    /// Policy for a compression configuration.
    pub fn for_config(config: &DeflateConfig) -> Self {
        if config.level.level() == 0 {
            Self::StoredOnly
        } else if config.strategy == Strategy::Fixed {
            Self::FixedOnly
        } else if config.is_fast() {
            Self::PreferFixed
        } else {
            Self::Smallest
        }
    }
}

/// Exact sizes of a block under each encoding, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCosts {
    /// Stored, including header, padding and LEN/NLEN of every chunk.
    pub stored: u64,
    /// Fixed Huffman, including header and end-of-block code.
    pub fixed: u64,
    /// Dynamic Huffman including the code description, if allowed.
    pub dynamic: Option<u64>,
}

/// Collects one block of tokens and emits it.
#[derive(Debug, Clone)]
pub struct BlockEncoder {
    tokens: Vec<Lz77Token>,
    raw: Vec<u8>,
    litlen_freq: [u32; LITLEN_ALPHABET_SIZE],
    dist_freq: [u32; DISTANCE_ALPHABET_SIZE],
    /// Extra bits carried by all length and distance codes so far.
    extra_bits: u64,
    token_target: usize,
    policy: BlockPolicy,
}

impl BlockEncoder {
    /// Create an encoder with the block size and policy of `config`.
    pub fn new(config: &DeflateConfig) -> Self {
        Self::with_policy(BlockPolicy::for_config(config), config.block_token_target())
    }

    /// Create an encoder closing blocks after `token_target` tokens.
    pub fn with_policy(policy: BlockPolicy, token_target: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(token_target.min(32768)),
            raw: Vec::new(),
            litlen_freq: [0; LITLEN_ALPHABET_SIZE],
            dist_freq: [0; DISTANCE_ALPHABET_SIZE],
            extra_bits: 0,
            token_target,
            policy,
        }
    }

    /// Selection policy.
    pub fn policy(&self) -> BlockPolicy {
        self.policy
    }

    /// Whether no token has been collected.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Raw bytes covered by the collected tokens.
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    /// Number of collected tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the block has reached its size target.
    pub fn is_full(&self) -> bool {
        match self.policy {
            BlockPolicy::StoredOnly => self.raw.len() >= MAX_STORED_BLOCK,
            _ => self.tokens.len() >= self.token_target || self.raw.len() >= MAX_BLOCK_BYTES,
        }
    }

    /// Add a token covering `bytes` of input.
    pub fn tally(&mut self, token: Lz77Token, bytes: &[u8]) {
        debug_assert_eq!(token.byte_count(), bytes.len());
        self.raw.extend_from_slice(bytes);
        if self.policy == BlockPolicy::StoredOnly {
            return;
        }

        match token {
            Lz77Token::Literal(byte) => self.litlen_freq[byte as usize] += 1,
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra, _) = length_to_code(length);
                self.litlen_freq[len_code as usize] += 1;
                let (dist_code, dist_extra, _) = distance_to_code(distance);
                self.dist_freq[dist_code as usize] += 1;
                self.extra_bits += len_extra as u64 + dist_extra as u64;
            }
        }
        self.tokens.push(token);
    }

    /// Discard the collected block.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.raw.clear();
        self.litlen_freq = [0; LITLEN_ALPHABET_SIZE];
        self.dist_freq = [0; DISTANCE_ALPHABET_SIZE];
        self.extra_bits = 0;
    }

    /// Literal/length frequencies including the end-of-block symbol.
    fn litlen_frequencies(&self) -> [u32; LITLEN_ALPHABET_SIZE] {
        let mut freq = self.litlen_freq;
        freq[END_OF_BLOCK as usize] += 1;
        freq
    }

    fn fixed_cost(&self, litlen_freq: &[u32]) -> u64 {
        let litlen: u64 = litlen_freq
            .iter()
            .zip(FIXED_LITLEN_LENGTHS.iter())
            .map(|(&f, &len)| f as u64 * len as u64)
            .sum();
        let dist: u64 = self
            .dist_freq
            .iter()
            .zip(FIXED_DISTANCE_LENGTHS.iter())
            .map(|(&f, &len)| f as u64 * len as u64)
            .sum();
        3 + litlen + dist + self.extra_bits
    }

    fn dynamic_code(&self, litlen_freq: &[u32]) -> Option<(u64, DynamicCode)> {
        if matches!(self.policy, BlockPolicy::StoredOnly | BlockPolicy::FixedOnly) {
            return None;
        }
        let code = DynamicCode::build(litlen_freq, &self.dist_freq);
        let cost = code.header_bits()
            + code.litlen.cost(litlen_freq)
            + code.dist.cost(&self.dist_freq)
            + self.extra_bits;
        Some((cost, code))
    }

    /// Exact size of the collected block under each encoding when written
    /// at `bit_offset` bits into the current byte.
    pub fn costs(&self, bit_offset: u8) -> BlockCosts {
        let litlen_freq = self.litlen_frequencies();
        BlockCosts {
            stored: stored_cost(self.raw.len(), bit_offset),
            fixed: self.fixed_cost(&litlen_freq),
            dynamic: self.dynamic_code(&litlen_freq).map(|(cost, _)| cost),
        }
    }

    /// Pick an encoding for the given costs.
    ///
    /// Stored wins ties with the coded forms and fixed wins ties with
    /// dynamic.
    pub fn choose(&self, costs: &BlockCosts) -> BlockKind {
        if self.policy == BlockPolicy::StoredOnly {
            return BlockKind::Stored;
        }
        let dynamic = match (self.policy, costs.dynamic) {
            (BlockPolicy::PreferFixed, Some(cost)) => Some(cost + costs.fixed / 16),
            (BlockPolicy::Smallest, Some(cost)) => Some(cost),
            _ => None,
        };
        let coded = dynamic.map_or(costs.fixed, |d| d.min(costs.fixed));

        if costs.stored <= coded {
            BlockKind::Stored
        } else if dynamic.is_none_or(|d| costs.fixed <= d) {
            BlockKind::Fixed
        } else {
            BlockKind::Dynamic
        }
    }

    /// Write the collected block and start a new one.
    ///
    /// `last` sets the final-block flag. An empty block is still written.
    pub fn emit(&mut self, writer: &mut BitWriter, last: bool) -> BlockKind {
        let litlen_freq = self.litlen_frequencies();
        let stored = stored_cost(self.raw.len(), writer.bit_offset());
        let (fixed, dynamic) = if self.policy == BlockPolicy::StoredOnly {
            (u64::MAX, None)
        } else {
            (self.fixed_cost(&litlen_freq), self.dynamic_code(&litlen_freq))
        };
        let costs = BlockCosts {
            stored,
            fixed,
            dynamic: dynamic.as_ref().map(|(cost, _)| *cost),
        };
        let kind = self.choose(&costs);

        debug!(
            ?kind,
            last,
            tokens = self.tokens.len(),
            raw = self.raw.len(),
            stored_bits = costs.stored,
            fixed_bits = costs.fixed,
            dynamic_bits = ?costs.dynamic,
            "emitting block"
        );

        match (kind, dynamic) {
            (BlockKind::Dynamic, Some((_, code))) => {
                writer.put_bit(last);
                writer.put_bits(kind.btype(), 2);
                code.write_header(writer);
                write_symbols(writer, &self.tokens, &code.litlen, &code.dist);
            }
            (BlockKind::Stored, _) => write_stored_block(writer, &self.raw, last),
            _ => {
                writer.put_bit(last);
                writer.put_bits(BlockKind::Fixed.btype(), 2);
                write_symbols(
                    writer,
                    &self.tokens,
                    fixed_litlen_table(),
                    fixed_distance_table(),
                );
            }
        }

        self.clear();
        kind
    }
}

/// Size in bits of `len` raw bytes as stored blocks, starting `bit_offset`
/// bits into the current byte.
pub fn stored_cost(len: usize, bit_offset: u8) -> u64 {
    let chunks = len.div_ceil(MAX_STORED_BLOCK).max(1) as u64;
    // Header, then padding to the byte boundary.
    let first_header = 3 + (8 - (bit_offset as u64 + 3) % 8) % 8;
    // Later chunks start aligned: 3 header bits plus 5 padding bits.
    first_header + (chunks - 1) * 8 + chunks * 32 + 8 * len as u64
}

/// Write `data` as stored blocks of at most 65535 bytes. Empty data still
/// produces one (empty) block. Only the last chunk carries `last`.
pub fn write_stored_block(writer: &mut BitWriter, data: &[u8], last: bool) {
    let count = data.len().div_ceil(MAX_STORED_BLOCK).max(1);
    for index in 0..count {
        let start = (index * MAX_STORED_BLOCK).min(data.len());
        let end = (start + MAX_STORED_BLOCK).min(data.len());
        let chunk = &data[start..end];

        writer.put_bit(last && index + 1 == count);
        writer.put_bits(BlockKind::Stored.btype(), 2);
        writer.flush_to_byte();

        let len = chunk.len() as u16;
        writer.put_bits(len as u32, 16);
        writer.put_bits(!len as u32, 16);
        writer.put_bytes(chunk);
    }
}

/// Write the empty stored block that ends a sync or full flush.
pub fn write_sync_marker(writer: &mut BitWriter) {
    write_stored_block(writer, &[], false);
}

fn write_symbols(
    writer: &mut BitWriter,
    tokens: &[Lz77Token],
    litlen: &HuffmanTable,
    dist: &HuffmanTable,
) {
    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => litlen.encode_symbol(byte as usize, writer),
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra_bits, len_extra) = length_to_code(length);
                litlen.encode_symbol(len_code as usize, writer);
                writer.put_bits(len_extra as u32, len_extra_bits);

                let (dist_code, dist_extra_bits, dist_extra) = distance_to_code(distance);
                dist.encode_symbol(dist_code as usize, writer);
                writer.put_bits(dist_extra as u32, dist_extra_bits);
            }
        }
    }
    litlen.encode_symbol(END_OF_BLOCK as usize, writer);
}

/// Extra bits following a code-length symbol.
fn codelen_extra_bits(symbol: u8) -> u8 {
    match symbol {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// Run-length code a sequence of code lengths.
///
/// Returns `(symbol, extra value)` pairs: 0-15 are literal lengths, 16
/// repeats the previous length 3-6 times, 17 and 18 emit 3-10 and 11-138
/// zeros.
pub fn run_length_encode(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let run = lengths[i..].iter().take_while(|&&l| l == len).count();

        if len == 0 {
            let mut left = run;
            while left >= 11 {
                let n = left.min(138);
                runs.push((18, (n - 11) as u8));
                left -= n;
            }
            if left >= 3 {
                runs.push((17, (left - 3) as u8));
                left = 0;
            }
            runs.extend(std::iter::repeat_n((0, 0), left));
        } else {
            runs.push((len, 0));
            let mut left = run - 1;
            while left >= 3 {
                let n = left.min(6);
                runs.push((16, (n - 3) as u8));
                left -= n;
            }
            runs.extend(std::iter::repeat_n((len, 0), left));
        }
        i += run;
    }
    runs
}

fn used_length(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1)
}

/// Codes and header of a dynamic block.
#[derive(Debug, Clone)]
struct DynamicCode {
    litlen: HuffmanTable,
    dist: HuffmanTable,
    codelen: HuffmanTable,
    hlit: usize,
    hdist: usize,
    hclen: usize,
    runs: Vec<(u8, u8)>,
}

impl DynamicCode {
    fn build(litlen_freq: &[u32], dist_freq: &[u32]) -> Self {
        let litlen = HuffmanTable::build_canonical(litlen_freq, MAX_CODE_LENGTH);
        let dist = HuffmanTable::build_canonical(dist_freq, MAX_CODE_LENGTH);
        let hlit = used_length(litlen.lengths()).max(257);
        let hdist = used_length(dist.lengths()).max(1);

        let mut lengths = Vec::with_capacity(hlit + hdist);
        lengths.extend_from_slice(&litlen.lengths()[..hlit]);
        lengths.extend_from_slice(&dist.lengths()[..hdist]);
        let runs = run_length_encode(&lengths);

        let mut codelen_freq = [0u32; CODELEN_ALPHABET_SIZE];
        for &(symbol, _) in &runs {
            codelen_freq[symbol as usize] += 1;
        }
        let codelen = HuffmanTable::build_canonical(&codelen_freq, MAX_CODELEN_LENGTH);
        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&symbol| codelen.lengths()[symbol] != 0)
            .map_or(0, |i| i + 1)
            .max(4);

        Self {
            litlen,
            dist,
            codelen,
            hlit,
            hdist,
            hclen,
            runs,
        }
    }

    /// Block header plus code description, in bits.
    fn header_bits(&self) -> u64 {
        let runs: u64 = self
            .runs
            .iter()
            .map(|&(symbol, _)| {
                self.codelen.lengths()[symbol as usize] as u64
                    + codelen_extra_bits(symbol) as u64
            })
            .sum();
        3 + 5 + 5 + 4 + 3 * self.hclen as u64 + runs
    }

    fn write_header(&self, writer: &mut BitWriter) {
        writer.put_bits((self.hlit - 257) as u32, 5);
        writer.put_bits((self.hdist - 1) as u32, 5);
        writer.put_bits((self.hclen - 4) as u32, 4);
        for &symbol in &CODE_LENGTH_ORDER[..self.hclen] {
            writer.put_bits(self.codelen.lengths()[symbol] as u32, 3);
        }
        for &(symbol, extra) in &self.runs {
            self.codelen.encode_symbol(symbol as usize, writer);
            writer.put_bits(extra as u32, codelen_extra_bits(symbol));
        }
    }
}
