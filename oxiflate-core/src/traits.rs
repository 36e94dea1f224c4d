//! Streaming traits and the configuration enumerations they share.
//!
//! Compression and decompression engines are driven one `step` at a time
//! with caller-owned input and output slices. Each call reports how many
//! bytes it consumed and produced together with a [`StreamStatus`]. Errors
//! are returned as `Err` and poison the engine until it is reset.

use crate::error::{OxiflateError, Result};

/// Outcome of one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Stopped at a point the caller asked for (a block boundary); more work
    /// is pending, call again.
    Continue,
    /// All input was consumed; supply more to make progress.
    NeedMoreInput,
    /// The output slice is full; supply more room to make progress.
    NeedMoreOutput,
    /// The stream is complete and everything has been emitted.
    StreamEnd,
}

/// Flush mode for a streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlushMode {
    /// No flush - buffer data for best compression.
    #[default]
    None,
    /// Close the current block without byte alignment. Decoders stop and
    /// report [`StreamStatus::Continue`] at every block boundary.
    Block,
    /// Sync flush - emit all pending output aligned to a byte boundary.
    Sync,
    /// Full flush - sync flush, then forget the match history.
    Full,
    /// Finish - complete the stream. Decoders treat the input as complete.
    Finish,
}

/// A streaming decompressor (decoder).
pub trait Decompressor {
    /// Decompress data from input to output.
    ///
    /// # Returns
    ///
    /// A tuple of (bytes consumed from input, bytes written to output, status)
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)>;

    /// Reset the decompressor to its initial state.
    fn reset(&mut self);

    /// Check if the decompressor has finished.
    fn is_finished(&self) -> bool;

    /// Decompress a complete stream held in memory.
    fn decompress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) =
                self.decompress(&input[input_pos..], &mut buffer, FlushMode::Finish)?;

            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            match status {
                StreamStatus::StreamEnd => break,
                StreamStatus::NeedMoreInput => {
                    return Err(OxiflateError::corrupt(
                        input_pos as u64 * 8,
                        "truncated stream",
                    ));
                }
                StreamStatus::NeedMoreOutput | StreamStatus::Continue => continue,
            }
        }

        Ok(output)
    }
}

/// A streaming compressor (encoder).
pub trait Compressor {
    /// Compress data from input to output.
    ///
    /// # Returns
    ///
    /// A tuple of (bytes consumed from input, bytes written to output, status)
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, StreamStatus)>;

    /// Reset the compressor to its initial state.
    fn reset(&mut self);

    /// Check if the compressor has finished.
    fn is_finished(&self) -> bool;

    /// Compress `input` as one complete stream.
    fn compress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) =
                self.compress(&input[input_pos..], &mut buffer, FlushMode::Finish)?;

            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            if status == StreamStatus::StreamEnd {
                break;
            }
        }

        Ok(output)
    }
}

/// Compression level (0-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// No compression (store only).
    pub const NONE: Self = Self(0);
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Default compression (balanced).
    pub const DEFAULT: Self = Self(6);
    /// Best compression (slowest).
    pub const BEST: Self = Self(9);

    /// Create a compression level, clamping to 9.
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    /// Create a compression level, rejecting values above 9.
    pub fn try_new(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(OxiflateError::config(format!(
                "compression level {} out of range 0-9",
                level
            )));
        }
        Ok(Self(level))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for CompressionLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

/// Match-finding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Regular LZ77 matching tuned by the level.
    #[default]
    Default,
    /// Drop short matches; suits data produced by a filter or predictor.
    Filtered,
    /// Literals only, entropy coding without matching.
    HuffmanOnly,
    /// Only distance-1 matches (run-length encoding).
    Rle,
    /// Never emit dynamic Huffman blocks.
    Fixed,
}

impl TryFrom<i32> for Strategy {
    type Error = OxiflateError;

    /// Map the conventional numeric strategy codes (0-4).
    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Default),
            1 => Ok(Self::Filtered),
            2 => Ok(Self::HuffmanOnly),
            3 => Ok(Self::Rle),
            4 => Ok(Self::Fixed),
            _ => Err(OxiflateError::config(format!("unknown strategy {}", value))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level() {
        assert_eq!(CompressionLevel::NONE.level(), 0);
        assert_eq!(CompressionLevel::FAST.level(), 1);
        assert_eq!(CompressionLevel::DEFAULT.level(), 6);
        assert_eq!(CompressionLevel::BEST.level(), 9);

        assert_eq!(CompressionLevel::new(100).level(), 9);
    }

    #[test]
    fn test_compression_level_checked() {
        assert_eq!(CompressionLevel::try_new(4).unwrap().level(), 4);
        assert!(matches!(
            CompressionLevel::try_new(10),
            Err(OxiflateError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_flush_mode_default() {
        assert_eq!(FlushMode::default(), FlushMode::None);
    }

    #[test]
    fn test_strategy_codes() {
        assert_eq!(Strategy::try_from(0).unwrap(), Strategy::Default);
        assert_eq!(Strategy::try_from(3).unwrap(), Strategy::Rle);
        assert!(Strategy::try_from(7).is_err());
    }
}
