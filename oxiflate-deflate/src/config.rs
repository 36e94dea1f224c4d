//! Stream configuration: container format, window size and level tuning.

use oxiflate_core::error::{OxiflateError, Result};
use oxiflate_core::traits::{CompressionLevel, Strategy};

/// Smallest supported window, in bits.
pub const MIN_WINDOW_BITS: u8 = 9;

/// Largest supported window, in bits (32 KiB).
pub const MAX_WINDOW_BITS: u8 = 15;

/// Framing around the raw DEFLATE bit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    /// Bare DEFLATE blocks (RFC 1951).
    #[default]
    Raw,
    /// zlib header and Adler-32 trailer (RFC 1950).
    Zlib,
    /// gzip header and CRC-32/ISIZE trailer (RFC 1952).
    Gzip,
    /// Detect zlib or gzip from the first two bytes. Decoding only.
    Auto,
}

/// Match-search tuning for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    /// Quarter the chain budget once the current match is at least this long.
    pub good_length: usize,
    /// Lazy levels: stop looking for a better match at the next position once
    /// the current one is this long. Fast levels: longest match whose
    /// positions are all indexed.
    pub max_lazy: usize,
    /// Stop walking the chain once a match this long is found.
    pub nice_length: usize,
    /// Most chain entries examined per search.
    pub max_chain: usize,
}

impl LevelParams {
    /// Tuning for levels 0-9.
    pub const TABLE: [Self; 10] = [
        Self::new(0, 0, 0, 0),
        Self::new(4, 4, 8, 4),
        Self::new(4, 5, 16, 8),
        Self::new(4, 6, 32, 32),
        Self::new(4, 4, 16, 16),
        Self::new(8, 16, 32, 32),
        Self::new(8, 16, 128, 128),
        Self::new(8, 32, 128, 256),
        Self::new(32, 128, 258, 1024),
        Self::new(32, 258, 258, 4096),
    ];

    const fn new(
        good_length: usize,
        max_lazy: usize,
        nice_length: usize,
        max_chain: usize,
    ) -> Self {
        Self {
            good_length,
            max_lazy,
            nice_length,
            max_chain,
        }
    }

    /// Tuning for `level`.
    pub fn for_level(level: CompressionLevel) -> Self {
        Self::TABLE[level.level().min(9) as usize]
    }
}

/// Compression stream configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeflateConfig {
    /// Effort level (0 = stored blocks only).
    pub level: CompressionLevel,
    /// Match-finding strategy.
    pub strategy: Strategy,
    /// Output framing. `Auto` is rejected.
    pub format: Format,
    /// Base-2 logarithm of the window size (9-15).
    pub window_bits: u8,
}

impl DeflateConfig {
    /// Raw DEFLATE, default level.
    pub const RAW: Self = Self {
        level: CompressionLevel::DEFAULT,
        strategy: Strategy::Default,
        format: Format::Raw,
        window_bits: MAX_WINDOW_BITS,
    };

    /// zlib framing, default level.
    pub const ZLIB: Self = Self {
        format: Format::Zlib,
        ..Self::RAW
    };

    /// gzip framing, default level.
    pub const GZIP: Self = Self {
        format: Format::Gzip,
        ..Self::RAW
    };

    /// Raw DEFLATE at `level`.
    pub fn new(level: impl Into<CompressionLevel>) -> Self {
        Self {
            level: level.into(),
            ..Self::RAW
        }
    }

    /// Same configuration with another level.
    pub fn with_level(self, level: impl Into<CompressionLevel>) -> Self {
        Self {
            level: level.into(),
            ..self
        }
    }

    /// Same configuration with another strategy.
    pub fn with_strategy(self, strategy: Strategy) -> Self {
        Self { strategy, ..self }
    }

    /// Same configuration with another format.
    pub fn with_format(self, format: Format) -> Self {
        Self { format, ..self }
    }

    /// Same configuration with another window size.
    pub fn with_window_bits(self, window_bits: u8) -> Self {
        Self {
            window_bits,
            ..self
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        validate_window_bits(self.window_bits)?;
        if self.level.level() > 9 {
            return Err(OxiflateError::config(format!(
                "compression level {} out of range 0-9",
                self.level.level()
            )));
        }
        if self.format == Format::Auto {
            return Err(OxiflateError::config(
                "format detection is only available for decompression",
            ));
        }
        Ok(())
    }

    /// Window size in bytes.
    pub fn window_size(&self) -> usize {
        1 << self.window_bits
    }

    /// Match-search tuning for the configured level.
    pub fn params(&self) -> LevelParams {
        LevelParams::for_level(self.level)
    }

    /// Whether the level searches without lazy evaluation.
    pub fn is_fast(&self) -> bool {
        (1..=3).contains(&self.level.level())
    }

    /// Symbols collected before a block is closed.
    pub fn block_token_target(&self) -> usize {
        match self.level.level() {
            0 => crate::tables::MAX_STORED_BLOCK,
            1..=3 => 8192,
            4..=6 => 16384,
            _ => 32768,
        }
    }
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self::RAW
    }
}

/// Decompression stream configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InflateConfig {
    /// Expected framing.
    pub format: Format,
    /// Largest window the stream may use (9-15).
    pub window_bits: u8,
}

impl InflateConfig {
    /// Raw DEFLATE.
    pub const RAW: Self = Self {
        format: Format::Raw,
        window_bits: MAX_WINDOW_BITS,
    };

    /// zlib framing.
    pub const ZLIB: Self = Self {
        format: Format::Zlib,
        ..Self::RAW
    };

    /// gzip framing.
    pub const GZIP: Self = Self {
        format: Format::Gzip,
        ..Self::RAW
    };

    /// zlib or gzip, detected from the header.
    pub const AUTO: Self = Self {
        format: Format::Auto,
        ..Self::RAW
    };

    /// Create a configuration for `format` with the full window.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Self::RAW
        }
    }

    /// Same configuration with another window size.
    pub fn with_window_bits(self, window_bits: u8) -> Self {
        Self {
            window_bits,
            ..self
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        validate_window_bits(self.window_bits)
    }

    /// Window size in bytes.
    pub fn window_size(&self) -> usize {
        1 << self.window_bits
    }
}

impl Default for InflateConfig {
    fn default() -> Self {
        Self::RAW
    }
}

fn validate_window_bits(window_bits: u8) -> Result<()> {
    if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
        return Err(OxiflateError::config(format!(
            "window bits {} out of range {}-{}",
            window_bits, MIN_WINDOW_BITS, MAX_WINDOW_BITS
        )));
    }
    Ok(())
}
