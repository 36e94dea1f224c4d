//! History window for back-reference resolution during decompression.
//!
//! The window holds the most recent `capacity` bytes of decompressed output
//! (including a preset dictionary) and replays `(distance, length)`
//! references against it. It persists across block boundaries of one stream.

use crate::error::{OxiflateError, Result};

/// DEFLATE window size (32 KiB).
pub const DEFLATE_WINDOW: usize = 32768;

/// A circular buffer of decompressed history.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    /// The underlying buffer.
    buffer: Vec<u8>,
    /// Current write position (next byte will be written here).
    position: usize,
    /// Number of bytes written (up to capacity).
    size: usize,
    /// Mask for efficient modulo (capacity - 1).
    mask: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of 2 or is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "Capacity must be a power of 2, got {}",
            capacity
        );

        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Create a ring buffer of the full DEFLATE window size.
    pub fn deflate() -> Self {
        Self::new(DEFLATE_WINDOW)
    }

    /// Get the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of history bytes available for back-references.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.size = 0;
        self.buffer.fill(0);
    }

    /// Append one byte of output.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size < self.buffer.len() {
            self.size += 1;
        }
    }

    /// Append a run of output bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let capacity = self.buffer.len();
        let bytes = if bytes.len() > capacity {
            &bytes[bytes.len() - capacity..]
        } else {
            bytes
        };

        let first = bytes.len().min(capacity - self.position);
        self.buffer[self.position..self.position + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        self.buffer[..rest].copy_from_slice(&bytes[first..]);

        self.position = (self.position + bytes.len()) & self.mask;
        self.size = (self.size + bytes.len()).min(capacity);
    }

    /// Replay a back-reference into `out` and the history.
    ///
    /// Copies `min(length, out.len())` bytes starting `distance` bytes behind
    /// the current position and returns how many were copied. Because the
    /// source advances with the destination, a partially resolved reference
    /// can be continued later with the same `distance`. Lengths longer than
    /// the distance repeat the referenced pattern.
    ///
    /// Fails with `InvalidDistance` if `distance` is zero or reaches past the
    /// bytes materialized so far.
    pub fn resolve(&mut self, distance: usize, length: usize, out: &mut [u8]) -> Result<usize> {
        if distance == 0 || distance > self.size {
            return Err(OxiflateError::invalid_distance(distance, self.size));
        }

        let count = length.min(out.len());
        let mut src_pos = self.position.wrapping_sub(distance) & self.mask;

        for slot in out.iter_mut().take(count) {
            let byte = self.buffer[src_pos];
            *slot = byte;
            self.write_byte(byte);
            src_pos = (src_pos + 1) & self.mask;
        }

        Ok(count)
    }

    /// Get the last `count` bytes written, oldest first.
    pub fn last_bytes(&self, count: usize) -> Vec<u8> {
        let count = count.min(self.size);
        (0..count)
            .map(|i| self.buffer[self.position.wrapping_sub(count - i) & self.mask])
            .collect()
    }

    /// Seed the history with a preset dictionary.
    ///
    /// A dictionary larger than the capacity contributes only its last
    /// `capacity` bytes. Existing history is replaced.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) {
        self.position = 0;
        self.size = 0;
        self.write_bytes(dictionary);
    }
}
