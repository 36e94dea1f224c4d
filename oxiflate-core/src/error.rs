//! Error types for OxiFlate operations.
//!
//! Flow-control conditions (`NeedMoreInput`, `NeedMoreOutput`) are not errors;
//! they are reported through [`StreamStatus`](crate::traits::StreamStatus).
//! Everything in [`OxiflateError`] is terminal for the stream instance that
//! raised it.

use thiserror::Error;

/// The main error type for OxiFlate operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OxiflateError {
    /// The compressed stream is malformed.
    #[error("Corrupt stream at bit {offset}: {message}")]
    CorruptStream {
        /// Bit position in the compressed input where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A back-reference points before the start of the available history.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Number of bytes of history available when the reference was resolved.
        history_size: usize,
    },

    /// The stream requires a preset dictionary other than the one supplied.
    #[error("Dictionary mismatch: stream expects {expected:#010x}, supplied {found:?}")]
    DictionaryMismatch {
        /// Adler-32 of the dictionary the stream was compressed with.
        expected: u32,
        /// Adler-32 of the dictionary supplied by the caller, if any.
        found: Option<u32>,
    },

    /// Out-of-range parameters or misuse of the streaming API.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A container trailer checksum did not match the decoded data.
    #[error("Checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the trailer.
        expected: u32,
        /// Checksum computed over the decoded bytes.
        computed: u32,
    },
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, OxiflateError>;

impl OxiflateError {
    /// Create a corrupt stream error.
    pub fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptStream {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create a dictionary mismatch error.
    pub fn dictionary_mismatch(expected: u32, found: Option<u32>) -> Self {
        Self::DictionaryMismatch { expected, found }
    }

    /// Create an invalid configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Whether this error means the compressed input is invalid, as opposed
    /// to a usage or configuration problem.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptStream { .. }
                | Self::InvalidDistance { .. }
                | Self::DictionaryMismatch { .. }
                | Self::ChecksumMismatch { .. }
        )
    }
}

/// Interruption of an incremental decoder.
///
/// `NeedMoreInput` suspends the decoder until the caller supplies more bytes;
/// `Fatal` poisons the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// Not enough input bits are buffered to finish the current unit.
    NeedMoreInput,
    /// An unrecoverable error.
    Fatal(OxiflateError),
}

impl From<OxiflateError> for Interrupt {
    fn from(err: OxiflateError) -> Self {
        Self::Fatal(err)
    }
}

impl From<crate::bitstream::NeedMoreInput> for Interrupt {
    fn from(_: crate::bitstream::NeedMoreInput) -> Self {
        Self::NeedMoreInput
    }
}
