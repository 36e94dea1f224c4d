//! Constant tables of the DEFLATE format (RFC 1951).
//!
//! Fixed Huffman code lengths, length/distance base values and extra bits,
//! and the transmission order of the code-length alphabet.

use crate::huffman::{HuffmanTable, HuffmanTree};
use oxiflate_core::error::Result;
use std::sync::OnceLock;

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Largest window (distance) DEFLATE can address.
pub const MAX_WINDOW: usize = 32768;

/// Largest payload of one stored block.
pub const MAX_STORED_BLOCK: usize = 65535;

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub const FIXED_LITLEN_LENGTHS: [u8; 288] = {
    let mut lengths = [8u8; 288];
    let mut i = 144;
    while i < 256 {
        lengths[i] = 9;
        i += 1;
    }
    while i < 280 {
        lengths[i] = 7;
        i += 1;
    }
    lengths
};

/// Fixed distance code lengths. Codes 30 and 31 exist in the code but never
/// occur in valid data.
pub const FIXED_DISTANCE_LENGTHS: [u8; 32] = [5; 32];

/// Decoder for the fixed literal/length code.
pub fn fixed_litlen_tree() -> Result<&'static HuffmanTree> {
    static TREE: OnceLock<Result<HuffmanTree>> = OnceLock::new();
    TREE.get_or_init(|| HuffmanTree::from_code_lengths(&FIXED_LITLEN_LENGTHS))
        .as_ref()
        .map_err(Clone::clone)
}

/// Decoder for the fixed distance code.
pub fn fixed_distance_tree() -> Result<&'static HuffmanTree> {
    static TREE: OnceLock<Result<HuffmanTree>> = OnceLock::new();
    TREE.get_or_init(|| HuffmanTree::from_code_lengths(&FIXED_DISTANCE_LENGTHS))
        .as_ref()
        .map_err(Clone::clone)
}

/// Encoder table for the fixed literal/length code.
pub fn fixed_litlen_table() -> &'static HuffmanTable {
    static TABLE: OnceLock<HuffmanTable> = OnceLock::new();
    TABLE.get_or_init(|| HuffmanTable::from_lengths(&FIXED_LITLEN_LENGTHS))
}

/// Encoder table for the fixed distance code.
pub fn fixed_distance_table() -> &'static HuffmanTable {
    static TABLE: OnceLock<HuffmanTable> = OnceLock::new();
    TABLE.get_or_init(|| HuffmanTable::from_lengths(&FIXED_DISTANCE_LENGTHS))
}

/// Length code base values for codes 257-285.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits
];

/// Number of extra bits for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values for codes 0-29.
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Number of extra bits for distance codes 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order of code length codes in dynamic block header (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Length code index (code - 257) for every match length 0-258.
const LENGTH_CODE_INDEX: [u8; MAX_MATCH + 1] = {
    let mut table = [0u8; MAX_MATCH + 1];
    let mut code = 0;
    while code < 28 {
        let mut len = LENGTH_BASE[code] as usize;
        while len < LENGTH_BASE[code + 1] as usize {
            table[len] = code as u8;
            len += 1;
        }
        code += 1;
    }
    // 258 has its own code; 227 + 31 would otherwise claim it.
    table[MAX_MATCH] = 28;
    table
};

/// Convert a length (3-258) to `(code, extra_bits, extra_value)`.
#[inline]
pub fn length_to_code(length: u16) -> (u16, u8, u16) {
    debug_assert!(
        (3..=258).contains(&length),
        "Length out of range: {}",
        length
    );
    let index = LENGTH_CODE_INDEX[length as usize] as usize;
    (
        index as u16 + 257,
        LENGTH_EXTRA_BITS[index],
        length - LENGTH_BASE[index],
    )
}

/// Distance code (0-29) for a distance (1-32768).
#[inline]
pub fn distance_code(distance: u16) -> usize {
    let d = distance as u32 - 1;
    if d < 4 {
        d as usize
    } else {
        let bits = 31 - d.leading_zeros();
        (2 * bits + ((d >> (bits - 1)) & 1)) as usize
    }
}

/// Convert a distance (1-32768) to `(code, extra_bits, extra_value)`.
#[inline]
pub fn distance_to_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(distance >= 1, "Distance out of range: {}", distance);
    let code = distance_code(distance);
    (
        code as u16,
        DISTANCE_EXTRA_BITS[code],
        distance - DISTANCE_BASE[code],
    )
}

/// Decode a length from a length code (257-285) and extra bits.
pub fn decode_length(code: u16, extra: u16) -> u16 {
    debug_assert!((257..=285).contains(&code), "Invalid length code: {}", code);
    LENGTH_BASE[(code - 257) as usize] + extra
}

/// Decode a distance from a distance code (0-29) and extra bits.
pub fn decode_distance(code: u16, extra: u16) -> u16 {
    debug_assert!(code < 30, "Invalid distance code: {}", code);
    DISTANCE_BASE[code as usize] + extra
}
