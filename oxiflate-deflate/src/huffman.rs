//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE transmits Huffman codes as code lengths only; codes of the same
//! length are assigned consecutive values in symbol order (canonical codes).
//!
//! - [`HuffmanBuilder`] turns symbol frequencies into length-limited code
//!   lengths.
//! - [`HuffmanTable`] maps symbols to bit-reversed codes for the encoder.
//! - [`HuffmanTree`] decodes symbols with a 9-bit lookup table and a
//!   canonical walk for longer codes.
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman trees)

use oxiflate_core::error::{Interrupt, OxiflateError, Result};
use oxiflate_core::{BitReader, BitWriter};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: u8 = 15;

/// Maximum code length for the code-length alphabet (7 bits).
pub const MAX_CODELEN_LENGTH: u8 = 7;

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Number of bits resolved by the decoder's lookup table.
const FAST_BITS: u8 = 9;

/// Deepest code length tracked before limiting.
const MAX_DEPTH: usize = 63;

/// Reverse the low `length` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, length: u8) -> u16 {
    if length == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - length)
}

/// Collects symbol frequencies and derives length-limited code lengths.
#[derive(Debug, Clone)]
pub struct HuffmanBuilder {
    frequencies: Vec<u32>,
    max_length: u8,
}

impl HuffmanBuilder {
    /// Create a builder for an alphabet of `alphabet_size` symbols.
    pub fn new(alphabet_size: usize, max_length: u8) -> Self {
        Self {
            frequencies: vec![0; alphabet_size],
            max_length,
        }
    }

    /// Create a builder from an existing frequency table.
    pub fn from_frequencies(frequencies: &[u32], max_length: u8) -> Self {
        Self {
            frequencies: frequencies.to_vec(),
            max_length,
        }
    }

    /// Count one occurrence of `symbol`.
    pub fn add(&mut self, symbol: u16) {
        self.frequencies[symbol as usize] += 1;
    }

    /// Count `count` occurrences of `symbol`.
    pub fn add_count(&mut self, symbol: u16, count: u32) {
        self.frequencies[symbol as usize] += count;
    }

    /// Frequencies collected so far.
    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    /// Compute code lengths.
    ///
    /// At least two symbols always receive a code, so the result is a
    /// complete prefix code that any decoder accepts. Lengths never exceed
    /// the builder's maximum.
    pub fn build_lengths(&self) -> Vec<u8> {
        let n = self.frequencies.len();
        let mut lengths = vec![0u8; n];

        // (frequency, symbol) for every coded symbol
        let mut symbols: Vec<(u32, u16)> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(s, &f)| (f, s as u16))
            .collect();

        // Pad with the lowest unused symbols.
        let mut filler = 0u16;
        while symbols.len() < 2 && n >= 2 {
            if symbols.iter().all(|&(_, s)| s != filler) {
                symbols.push((1, filler));
            }
            filler += 1;
        }

        match symbols.len() {
            0 => return lengths,
            1 => {
                lengths[symbols[0].1 as usize] = 1;
                return lengths;
            }
            _ => {}
        }

        symbols.sort_unstable();
        let mut keys: Vec<u32> = symbols.iter().map(|&(f, _)| f).collect();
        minimum_redundancy(&mut keys);

        let mut num_codes = [0u32; MAX_DEPTH + 1];
        for &depth in &keys {
            num_codes[(depth as usize).min(MAX_DEPTH)] += 1;
        }
        enforce_max_length(&mut num_codes, self.max_length as usize);

        // Shortest codes go to the most frequent symbols (end of the sort).
        let mut next = symbols.len();
        for (len, &count) in num_codes
            .iter()
            .enumerate()
            .take(self.max_length as usize + 1)
            .skip(1)
        {
            for _ in 0..count {
                next -= 1;
                lengths[symbols[next].1 as usize] = len as u8;
            }
        }

        lengths
    }

    /// Compute code lengths and the matching encoder table.
    pub fn build_table(&self) -> HuffmanTable {
        HuffmanTable::from_lengths(&self.build_lengths())
    }
}

/// In-place minimum-redundancy code lengths (Moffat and Katajainen).
///
/// `keys` holds frequencies sorted ascending on entry and code lengths on
/// exit, with `keys[i]` the length for the `i`-th least frequent symbol.
/// Requires at least two entries.
fn minimum_redundancy(keys: &mut [u32]) {
    let n = keys.len();
    debug_assert!(n >= 2);

    // Phase 1: build the tree bottom-up, internal nodes reuse the array.
    keys[0] += keys[1];
    let mut root = 0usize;
    let mut leaf = 2usize;
    for next in 1..n - 1 {
        if leaf >= n || keys[root] < keys[leaf] {
            keys[next] = keys[root];
            keys[root] = next as u32;
            root += 1;
        } else {
            keys[next] = keys[leaf];
            leaf += 1;
        }

        if leaf >= n || (root < next && keys[root] < keys[leaf]) {
            keys[next] += keys[root];
            keys[root] = next as u32;
            root += 1;
        } else {
            keys[next] += keys[leaf];
            leaf += 1;
        }
    }

    // Phase 2: parent pointers to internal node depths.
    keys[n - 2] = 0;
    for next in (0..n - 2).rev() {
        keys[next] = keys[keys[next] as usize] + 1;
    }

    // Phase 3: internal node depths to leaf depths.
    let mut available = 1usize;
    let mut used = 0usize;
    let mut depth = 0u32;
    let mut root = n as isize - 2;
    let mut next = n as isize - 1;
    while available > 0 {
        while root >= 0 && keys[root as usize] == depth {
            used += 1;
            root -= 1;
        }
        while available > used {
            keys[next as usize] = depth;
            next -= 1;
            available -= 1;
        }
        available = 2 * used;
        depth += 1;
        used = 0;
    }
}

/// Rebalance a code-length histogram so no code exceeds `max_length`.
///
/// Codes deeper than the limit are pulled up to it, then leaves are pushed
/// down from shorter lengths until the Kraft sum is exactly one again.
fn enforce_max_length(num_codes: &mut [u32; MAX_DEPTH + 1], max_length: usize) {
    for depth in max_length + 1..=MAX_DEPTH {
        num_codes[max_length] += num_codes[depth];
        num_codes[depth] = 0;
    }

    let mut total: u32 = (1..=max_length)
        .map(|len| num_codes[len] << (max_length - len))
        .sum();

    while total > 1 << max_length {
        num_codes[max_length] -= 1;
        for len in (1..max_length).rev() {
            if num_codes[len] != 0 {
                num_codes[len] -= 1;
                num_codes[len + 1] += 2;
                break;
            }
        }
        total -= 1;
    }
}

/// Encoder table: symbol to (bit-reversed code, length).
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    codes: Vec<u16>,
    lengths: Vec<u8>,
}

impl HuffmanTable {
    /// Build the canonical code for the given lengths.
    ///
    /// The lengths must describe a valid prefix code; lengths produced by
    /// [`HuffmanBuilder`] always do.
    pub fn from_lengths(lengths: &[u8]) -> Self {
        let mut bl_count = [0u16; MAX_CODE_LENGTH as usize + 1];
        for &len in lengths {
            bl_count[len as usize] += 1;
        }
        bl_count[0] = 0;

        let mut next_code = [0u16; MAX_CODE_LENGTH as usize + 2];
        let mut code = 0u16;
        for bits in 1..=MAX_CODE_LENGTH as usize {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }

        let codes = lengths
            .iter()
            .map(|&len| {
                if len == 0 {
                    return 0;
                }
                let code = next_code[len as usize];
                next_code[len as usize] += 1;
                reverse_bits(code, len)
            })
            .collect();

        Self {
            codes,
            lengths: lengths.to_vec(),
        }
    }

    /// Build a length-limited canonical code from symbol frequencies.
    pub fn build_canonical(frequencies: &[u32], max_length: u8) -> Self {
        HuffmanBuilder::from_frequencies(frequencies, max_length).build_table()
    }

    /// Code lengths, indexed by symbol.
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Bit-reversed code and length of `symbol`.
    #[inline]
    pub fn code(&self, symbol: usize) -> (u16, u8) {
        (self.codes[symbol], self.lengths[symbol])
    }

    /// Write the code for `symbol`.
    #[inline]
    pub fn encode_symbol(&self, symbol: usize, writer: &mut BitWriter) {
        debug_assert!(self.lengths[symbol] > 0, "symbol {} has no code", symbol);
        writer.put_bits(self.codes[symbol] as u32, self.lengths[symbol]);
    }

    /// Bits needed to encode the given symbol counts (extra bits excluded).
    pub fn cost(&self, frequencies: &[u32]) -> u64 {
        frequencies
            .iter()
            .zip(&self.lengths)
            .map(|(&f, &len)| f as u64 * len as u64)
            .sum()
    }
}

/// Decoder for one canonical Huffman code.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    /// `(symbol << 4) | length` for codes up to `FAST_BITS`, indexed by the
    /// next `FAST_BITS` input bits; 0 where no short code matches.
    fast_table: Vec<u16>,
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH as usize + 1],
    /// Symbols ordered by (length, symbol).
    symbols: Vec<u16>,
    /// Longest code length.
    max_length: u8,
}

impl HuffmanTree {
    /// Build a decoder for literal/length or distance code lengths.
    ///
    /// Over-subscribed codes are rejected. An incomplete code is accepted
    /// only when it consists of a single one-bit code; a table with no codes
    /// at all is accepted but fails on first use.
    pub fn from_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        Self::build(code_lengths, true)
    }

    /// Build a decoder that must be a complete prefix code (used for the
    /// code-length alphabet).
    pub fn from_code_lengths_complete(code_lengths: &[u8]) -> Result<Self> {
        Self::build(code_lengths, false)
    }

    fn build(code_lengths: &[u8], allow_single: bool) -> Result<Self> {
        let mut counts = [0u16; MAX_CODE_LENGTH as usize + 1];
        let mut max_length = 0u8;
        for &len in code_lengths {
            if len > MAX_CODE_LENGTH {
                return Err(OxiflateError::corrupt(
                    0,
                    format!("code length {} exceeds maximum {}", len, MAX_CODE_LENGTH),
                ));
            }
            counts[len as usize] += 1;
            max_length = max_length.max(len);
        }
        counts[0] = 0;

        // Kraft check: `left` counts unused codes at each length.
        let mut left = 1i32;
        for &count in counts.iter().skip(1) {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(OxiflateError::corrupt(0, "over-subscribed Huffman code"));
            }
        }
        if left > 0 && max_length > 0 && !(allow_single && max_length == 1) {
            return Err(OxiflateError::corrupt(0, "incomplete Huffman code"));
        }

        let mut offsets = [0u16; MAX_CODE_LENGTH as usize + 2];
        for len in 1..=MAX_CODE_LENGTH as usize {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let mut symbols = vec![0u16; offsets[MAX_CODE_LENGTH as usize + 1] as usize];
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        let table = HuffmanTable::from_lengths(code_lengths);
        let mut fast_table = vec![0u16; 1 << FAST_BITS];
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 || len > FAST_BITS {
                continue;
            }
            let (code, _) = table.code(symbol);
            let entry = ((symbol as u16) << 4) | len as u16;
            let step = 1usize << len;
            let mut index = code as usize;
            while index < fast_table.len() {
                fast_table[index] = entry;
                index += step;
            }
        }

        Ok(Self {
            fast_table,
            counts,
            symbols,
            max_length,
        })
    }

    /// Whether the code has no symbols.
    pub fn is_empty(&self) -> bool {
        self.max_length == 0
    }

    /// Decode one symbol.
    ///
    /// Nothing is consumed unless a whole code is read. Runs out of input
    /// with `NeedMoreInput`; a bit pattern that is no code is `CorruptStream`.
    #[inline]
    pub fn decode_symbol(&self, reader: &mut BitReader<'_>) -> std::result::Result<u16, Interrupt> {
        let (bits, available) = reader.peek_available(FAST_BITS);
        let entry = self.fast_table[bits as usize];
        if entry != 0 {
            let len = (entry & 0xF) as u8;
            if len > available {
                return Err(Interrupt::NeedMoreInput);
            }
            reader.skip_bits(len);
            return Ok(entry >> 4);
        }
        self.decode_slow(reader)
    }

    /// Canonical walk, one bit at a time.
    fn decode_slow(&self, reader: &mut BitReader<'_>) -> std::result::Result<u16, Interrupt> {
        let (bits, available) = reader.peek_available(MAX_CODE_LENGTH);
        let mut code = 0i32;
        let mut first = 0i32;
        let mut index = 0i32;

        for len in 1..=self.max_length {
            if len > available {
                return Err(Interrupt::NeedMoreInput);
            }
            code |= ((bits >> (len - 1)) & 1) as i32;
            let count = self.counts[len as usize] as i32;
            if code - first < count {
                reader.skip_bits(len);
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }

        Err(Interrupt::Fatal(OxiflateError::corrupt(
            reader.bit_position(),
            "invalid Huffman code",
        )))
    }
}
