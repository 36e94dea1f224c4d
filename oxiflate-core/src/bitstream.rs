//! Resumable bit-level I/O for DEFLATE-style codecs.
//!
//! DEFLATE packs bits LSB-first: the first bit of a code occupies the least
//! significant free bit of the current byte.
//!
//! Both halves are designed for incremental, buffer-driven engines:
//!
//! - [`BitWriter`] packs bits into an engine-owned byte queue that the caller
//!   drains into whatever output slices it provides.
//! - [`BitReader`] borrows the caller's input slice for a single call and
//!   reports [`NeedMoreInput`] instead of failing when the slice runs out.
//!   Bits not yet used are carried across calls in a [`BitState`].
//!
//! # Example
//!
//! ```
//! use oxiflate_core::bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.put_bits(0b101, 3);
//! writer.put_bits(0b1100, 4);
//! writer.flush_to_byte();
//!
//! let mut output = [0u8; 4];
//! let n = writer.drain_into(&mut output);
//!
//! let mut reader = BitReader::new(&output[..n]);
//! assert_eq!(reader.get_bits(3), Ok(0b101));
//! assert_eq!(reader.get_bits(4), Ok(0b1100));
//! ```

use std::fmt;

/// Suspension signal: fewer bits are available than requested.
///
/// This is never fatal. The caller must supply more source bytes and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedMoreInput;

impl fmt::Display for NeedMoreInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("need more input")
    }
}

impl std::error::Error for NeedMoreInput {}

/// Bit-reader state carried between calls.
///
/// After [`BitReader::suspend`] it never holds a whole byte. After
/// [`BitReader::suspend_exhausted`] it holds the tail of an incomplete unit,
/// at most 56 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitState {
    buffer: u64,
    bits_in_buffer: u8,
    total_bits_read: u64,
}

impl BitState {
    /// Number of buffered bits.
    pub fn buffered_bits(&self) -> u8 {
        self.bits_in_buffer
    }

    /// Total number of bits consumed from the stream so far.
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }
}

/// A position inside a [`BitReader`] that can be restored with
/// [`BitReader::rewind`].
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pos: usize,
    buffer: u64,
    bits_in_buffer: u8,
    total_bits_read: u64,
}

/// A bit-level reader over one borrowed input slice.
///
/// Decoders take a [`Checkpoint`] before each indivisible unit (a symbol with
/// its extra bits, a header field) and rewind to it on [`NeedMoreInput`], so
/// a unit is either consumed completely or not at all.
#[derive(Debug)]
pub struct BitReader<'a> {
    input: &'a [u8],
    /// Next unread byte of `input`.
    pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u8,
    /// Total bits consumed (for error reporting).
    total_bits_read: u64,
}

impl<'a> BitReader<'a> {
    /// Create a reader at the start of a stream.
    pub fn new(input: &'a [u8]) -> Self {
        Self::resume(input, BitState::default())
    }

    /// Continue reading a stream whose earlier bits are summarized by `state`.
    pub fn resume(input: &'a [u8], state: BitState) -> Self {
        Self {
            input,
            pos: 0,
            buffer: state.buffer,
            bits_in_buffer: state.bits_in_buffer,
            total_bits_read: state.total_bits_read,
        }
    }

    /// Stop reading and return `(consumed, state)`.
    ///
    /// Whole bytes that were pulled into the bit buffer but not used are
    /// returned to the caller by lowering `consumed`.
    pub fn suspend(mut self) -> (usize, BitState) {
        let spare = (self.bits_in_buffer / 8) as usize;
        let give_back = spare.min(self.pos);
        if give_back > 0 {
            self.pos -= give_back;
            self.bits_in_buffer -= (give_back * 8) as u8;
            self.buffer &= low_mask(self.bits_in_buffer);
        }
        (
            self.pos,
            BitState {
                buffer: self.buffer,
                bits_in_buffer: self.bits_in_buffer,
                total_bits_read: self.total_bits_read,
            },
        )
    }

    /// Stop reading after the input ran out in the middle of a unit.
    ///
    /// Every remaining input byte is pulled into the bit buffer and counts as
    /// consumed, so the caller does not have to present it again.
    pub fn suspend_exhausted(mut self) -> (usize, BitState) {
        while self.pos < self.input.len() && self.bits_in_buffer < 56 {
            self.buffer |= (self.input[self.pos] as u64) << self.bits_in_buffer;
            self.bits_in_buffer += 8;
            self.pos += 1;
        }
        (
            self.pos,
            BitState {
                buffer: self.buffer,
                bits_in_buffer: self.bits_in_buffer,
                total_bits_read: self.total_bits_read,
            },
        )
    }

    /// Capture the current position.
    #[inline]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            buffer: self.buffer,
            bits_in_buffer: self.bits_in_buffer,
            total_bits_read: self.total_bits_read,
        }
    }

    /// Restore a position captured during this call.
    #[inline]
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.buffer = checkpoint.buffer;
        self.bits_in_buffer = checkpoint.bits_in_buffer;
        self.total_bits_read = checkpoint.total_bits_read;
    }

    /// Total number of bits consumed from the stream (for error reporting).
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }

    /// Number of bytes of the input slice not yet pulled into the buffer.
    pub fn remaining_input(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Bits that can still be read without more input.
    pub fn available_bits(&self) -> usize {
        self.bits_in_buffer as usize + self.remaining_input() * 8
    }

    /// Whether the reader sits on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bits_in_buffer % 8 == 0
    }

    /// Pull bytes until at least `count` bits are buffered or the input is
    /// exhausted. Returns the number of buffered bits.
    #[inline]
    fn refill(&mut self, count: u8) -> u8 {
        debug_assert!(count <= 56, "Cannot buffer more than 56 bits at once");
        while self.bits_in_buffer < count && self.pos < self.input.len() {
            self.buffer |= (self.input[self.pos] as u64) << self.bits_in_buffer;
            self.bits_in_buffer += 8;
            self.pos += 1;
        }
        self.bits_in_buffer
    }

    /// Look at up to `count` bits without consuming them.
    ///
    /// Returns the bits together with how many of them are valid; fewer than
    /// `count` are valid only when the input is exhausted. Invalid high bits
    /// are zero.
    #[inline]
    pub fn peek_available(&mut self, count: u8) -> (u32, u8) {
        let have = self.refill(count).min(count);
        ((self.buffer & low_mask(have)) as u32, have)
    }

    /// Look at the next `count` bits (0-32) without consuming them.
    #[inline]
    pub fn peek_bits(&mut self, count: u8) -> Result<u32, NeedMoreInput> {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");
        if self.refill(count) < count {
            return Err(NeedMoreInput);
        }
        Ok((self.buffer & low_mask(count)) as u32)
    }

    /// Consume `count` bits that are already buffered.
    #[inline]
    pub fn skip_bits(&mut self, count: u8) {
        debug_assert!(
            count <= self.bits_in_buffer,
            "skip_bits past buffered data: {count} > {}",
            self.bits_in_buffer
        );
        let count = count.min(self.bits_in_buffer);
        self.buffer = if count >= 64 { 0 } else { self.buffer >> count };
        self.bits_in_buffer -= count;
        self.total_bits_read += count as u64;
    }

    /// Read `count` bits (0-32); the first bit read lands in the LSB.
    #[inline]
    pub fn get_bits(&mut self, count: u8) -> Result<u32, NeedMoreInput> {
        if count == 0 {
            return Ok(0);
        }
        let value = self.peek_bits(count)?;
        self.skip_bits(count);
        Ok(value)
    }

    /// Read a single bit.
    #[inline]
    pub fn get_bit(&mut self) -> Result<bool, NeedMoreInput> {
        Ok(self.get_bits(1)? != 0)
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let partial = self.bits_in_buffer % 8;
        if partial != 0 {
            self.skip_bits(partial);
        }
    }

    /// Copy whole bytes into `out`, first from the bit buffer and then
    /// straight from the input slice. The reader must be byte aligned.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_bytes(&mut self, out: &mut [u8]) -> usize {
        debug_assert!(self.is_byte_aligned(), "copy_bytes on unaligned reader");
        let mut copied = 0;
        while copied < out.len() && self.bits_in_buffer >= 8 {
            out[copied] = self.buffer as u8;
            self.skip_bits(8);
            copied += 1;
        }
        let direct = (out.len() - copied).min(self.remaining_input());
        out[copied..copied + direct].copy_from_slice(&self.input[self.pos..self.pos + direct]);
        self.pos += direct;
        self.total_bits_read += direct as u64 * 8;
        copied + direct
    }
}

#[inline]
fn low_mask(count: u8) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

/// A bit-level writer that packs into an owned byte queue.
///
/// Complete bytes can be drained at any time with [`BitWriter::drain_into`];
/// at most seven bits stay behind until more bits arrive or
/// [`BitWriter::flush_to_byte`] pads them out.
#[derive(Debug, Default)]
pub struct BitWriter {
    /// Completed bytes, drained from `read_pos` onward.
    output: Vec<u8>,
    read_pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer (always < 8 between calls).
    bits_in_buffer: u8,
    /// Total bits written.
    total_bits_written: u64,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            output: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Number of bits in the current, incomplete byte.
    pub fn bit_offset(&self) -> u8 {
        self.bits_in_buffer
    }

    /// Whether the writer sits on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bits_in_buffer == 0
    }

    /// Append the `count` (0-32) low-order bits of `value`.
    #[inline]
    pub fn put_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");
        if count == 0 {
            return;
        }
        let masked = value as u64 & low_mask(count);
        self.buffer |= masked << self.bits_in_buffer;
        self.bits_in_buffer += count;
        self.total_bits_written += count as u64;

        while self.bits_in_buffer >= 8 {
            self.output.push(self.buffer as u8);
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
        }
    }

    /// Append a single bit.
    #[inline]
    pub fn put_bit(&mut self, bit: bool) {
        self.put_bits(bit as u32, 1);
    }

    /// Pad the current byte with zero bits.
    pub fn flush_to_byte(&mut self) {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.put_bits(0, pad);
        }
    }

    /// Append raw bytes. The writer must be byte aligned.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(self.is_byte_aligned(), "put_bytes on unaligned writer");
        self.output.extend_from_slice(bytes);
        self.total_bits_written += bytes.len() as u64 * 8;
    }

    /// Number of complete bytes waiting to be drained.
    pub fn pending_bytes(&self) -> usize {
        self.output.len() - self.read_pos
    }

    /// Move as many complete bytes as fit into `out`.
    ///
    /// Returns the number of bytes written.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = self.pending_bytes().min(out.len());
        out[..n].copy_from_slice(&self.output[self.read_pos..self.read_pos + n]);
        self.read_pos += n;

        if self.read_pos == self.output.len() {
            self.output.clear();
            self.read_pos = 0;
        } else if self.read_pos >= 4096 && self.read_pos * 2 >= self.output.len() {
            self.output.drain(..self.read_pos);
            self.read_pos = 0;
        }
        n
    }

    /// Discard all buffered bits and bytes.
    pub fn clear(&mut self) {
        self.output.clear();
        self.read_pos = 0;
        self.buffer = 0;
        self.bits_in_buffer = 0;
        self.total_bits_written = 0;
    }
}
