//! # OxiFlate Core
//!
//! Core components for the OxiFlate streaming codec.
//!
//! - [`bitstream`]: Resumable LSB-first bit reader and writer
//! - [`crc`]: CRC-32 with incremental update and combine
//! - [`adler`]: Adler-32 with incremental update and combine
//! - [`ringbuffer`]: Decompression history window
//! - [`traits`]: Streaming traits, flush modes, levels and strategies
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Framing                                             │
//! │     zlib / gzip header and trailer                      │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Deflater / Inflater (LZ77 + Huffman blocks)         │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, RingBuffer, CRC-32, Adler-32   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::adler::{Adler32, adler32_combine};
//! use oxiflate_core::crc::{Crc32, crc32_combine};
//!
//! let crc = crc32_combine(Crc32::compute(b"Hello, "), Crc32::compute(b"World!"), 6);
//! assert_eq!(crc, 0xEC4AC3D0);
//!
//! let adler = adler32_combine(Adler32::checksum(b"Hel"), Adler32::checksum(b"lo"), 2);
//! assert_eq!(adler, Adler32::checksum(b"Hello"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod adler;
pub mod bitstream;
pub mod crc;
pub mod error;
pub mod ringbuffer;
pub mod traits;

// Re-exports for convenience
pub use adler::{Adler32, adler32_combine, adler32_init, adler32_update};
pub use bitstream::{BitReader, BitState, BitWriter, Checkpoint, NeedMoreInput};
pub use crc::{Crc32, crc32_combine, crc32_init, crc32_update};
pub use error::{Interrupt, OxiflateError, Result};
pub use ringbuffer::RingBuffer;
pub use traits::{
    CompressionLevel, Compressor, Decompressor, FlushMode, StreamStatus, Strategy,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::adler::Adler32;
    pub use crate::crc::Crc32;
    pub use crate::error::{OxiflateError, Result};
    pub use crate::traits::{
        CompressionLevel, Compressor, Decompressor, FlushMode, StreamStatus, Strategy,
    };
}
