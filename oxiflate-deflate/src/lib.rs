//! # OxiFlate Deflate
//!
//! Pure Rust streaming implementation of DEFLATE (RFC 1951) with optional
//! zlib (RFC 1950) and gzip (RFC 1952) framing.
//!
//! ## Features
//!
//! - **Decompression**: all block types, fed in pieces of any size
//!   - Stored (uncompressed) blocks
//!   - Fixed Huffman codes
//!   - Dynamic Huffman codes
//! - **Compression**: LZ77 hash chains with lazy matching + Huffman coding
//!   - Compression levels 0-9 and zlib-style strategies
//!   - Per-block choice of the cheapest encoding
//!   - Sync, full and block flushes
//! - **Framing**: zlib with preset dictionaries, gzip members with header
//!   fields, automatic detection when decoding
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_deflate::{deflate, inflate};
//!
//! // Compress data
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! // Decompress data
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Streaming
//!
//! ```rust
//! use oxiflate_deflate::{DeflateConfig, Deflater, InflateConfig, Inflater};
//! use oxiflate_core::{FlushMode, StreamStatus};
//!
//! let mut deflater = Deflater::new(DeflateConfig::ZLIB).unwrap();
//! let mut compressed = vec![0u8; 256];
//! let (consumed, produced, status) = deflater
//!     .step(b"streamed data", &mut compressed, FlushMode::Finish)
//!     .unwrap();
//! assert_eq!((consumed, status), (13, StreamStatus::StreamEnd));
//!
//! let mut inflater = Inflater::new(InflateConfig::ZLIB).unwrap();
//! let mut output = vec![0u8; 64];
//! let (_, n, status) = inflater
//!     .step(&compressed[..produced], &mut output, FlushMode::Finish)
//!     .unwrap();
//! assert_eq!(status, StreamStatus::StreamEnd);
//! assert_eq!(&output[..n], b"streamed data");
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-3: Fast compression
//! - Level 4-6: Balanced (default is 6)
//! - Level 7-9: Best compression (slower)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod config;
pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;
pub mod wrapper;

// Re-exports
pub use block::{BlockEncoder, BlockKind, BlockPolicy};
pub use config::{DeflateConfig, Format, InflateConfig, LevelParams};
pub use deflate::{Deflater, compress_bound, deflate};
pub use huffman::{HuffmanBuilder, HuffmanTable, HuffmanTree};
pub use inflate::{Inflater, inflate};
pub use lz77::{Lz77Encoder, Lz77Token, MatchFinder};
pub use wrapper::{
    GzipHeader, TrailerCheck, gzip_compress, gzip_decompress, zlib_compress,
    zlib_compress_with_dict, zlib_decompress, zlib_decompress_with_dict,
};
