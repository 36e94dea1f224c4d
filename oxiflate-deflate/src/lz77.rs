//! LZ77 compression for DEFLATE.
//!
//! This module implements the LZ77 stage of DEFLATE compression: repeated
//! sequences in the input are replaced with back-references (length,
//! distance pairs) into a sliding window of earlier input.
//!
//! # Algorithm
//!
//! [`MatchFinder`] keeps a buffer of twice the window size. Every position
//! is indexed by the hash of its next three bytes; positions with equal
//! hashes form a chain through the `prev` array, which is indexed by
//! position modulo the window size. Once the buffer fills up, its upper half
//! slides down by one window and chain entries are rebased.
//!
//! [`Lz77Encoder`] walks the buffer and turns it into [`Lz77Token`]s:
//! - fast levels take the first acceptable match greedily,
//! - lazy levels defer a match by one position when the next position
//!   offers a longer one,
//! - `Rle` only looks for runs of the previous byte,
//! - `HuffmanOnly` and level 0 emit literals.
//!
//! A position is only tokenized once [`MIN_LOOKAHEAD`] bytes are buffered
//! after it (or the caller is flushing), so the token sequence does not
//! depend on how the input was split into chunks.

use crate::config::LevelParams;
use crate::tables::{MAX_MATCH, MIN_MATCH};
use oxiflate_core::traits::{CompressionLevel, Strategy};

/// Bytes that must follow a position before it is tokenized: a full-length
/// match plus the lookahead needed to hash the next position.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;

/// Minimum-length matches farther back than this cost more than literals.
const TOO_FAR: usize = 4096;

/// Size of the hash table (power of 2).
const HASH_SIZE: usize = 1 << 15;

/// Hash mask.
const HASH_MASK: usize = HASH_SIZE - 1;

/// Empty chain slot.
const NIL: u32 = u32::MAX;

/// A token produced by LZ77 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

impl Lz77Token {
    /// Number of input bytes the token stands for.
    #[inline]
    pub fn byte_count(&self) -> usize {
        match *self {
            Self::Literal(_) => 1,
            Self::Match { length, .. } => length as usize,
        }
    }
}

/// A back-reference found by [`MatchFinder::find_best_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Match length (3-258).
    pub length: usize,
    /// Distance back from the searched position.
    pub distance: usize,
}

impl From<Match> for Lz77Token {
    fn from(m: Match) -> Self {
        Self::Match {
            length: m.length as u16,
            distance: m.distance as u16,
        }
    }
}

/// Sliding window with hash-chain index.
#[derive(Debug, Clone)]
pub struct MatchFinder {
    /// Two windows of input; positions are offsets into this buffer.
    window: Vec<u8>,
    w_size: usize,
    w_mask: usize,
    /// Number of valid bytes in `window`.
    end: usize,
    /// Hash table: most recent position for each hash.
    head: Vec<u32>,
    /// Hash chain: previous position with the same hash.
    prev: Vec<u32>,
}

impl MatchFinder {
    /// Create a finder for a window of `1 << window_bits` bytes.
    pub fn new(window_bits: u8) -> Self {
        let w_size = 1usize << window_bits;
        Self {
            window: vec![0; 2 * w_size],
            w_size,
            w_mask: w_size - 1,
            end: 0,
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; w_size],
        }
    }

    /// Window size in bytes.
    pub fn window_size(&self) -> usize {
        self.w_size
    }

    /// Longest distance a match may have.
    ///
    /// Slightly less than the window, so the bytes a match needs never slide
    /// out while it is being evaluated.
    pub fn max_distance(&self) -> usize {
        self.w_size - MIN_LOOKAHEAD
    }

    /// Buffered bytes.
    pub fn data(&self) -> &[u8] {
        &self.window[..self.end]
    }

    /// Number of buffered bytes.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Room left before the buffer has to slide.
    pub fn free_space(&self) -> usize {
        self.window.len() - self.end
    }

    /// Append as much of `bytes` as fits. Returns the number appended.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free_space());
        self.window[self.end..self.end + n].copy_from_slice(&bytes[..n]);
        self.end += n;
        n
    }

    /// Move the upper window down and rebase the chains.
    ///
    /// Returns the shift applied to every position.
    pub fn slide(&mut self) -> usize {
        let shift = self.w_size.min(self.end);
        self.window.copy_within(shift..self.end, 0);
        self.end -= shift;
        rebase(&mut self.head, shift);
        rebase(&mut self.prev, shift);
        shift
    }

    /// Forget every indexed position. Buffered bytes stay.
    pub fn clear_hash(&mut self) {
        self.head.fill(NIL);
        self.prev.fill(NIL);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.clear_hash();
        self.end = 0;
    }

    /// Compute hash for 3 bytes using multiplicative mixing.
    #[inline(always)]
    fn hash(b0: u8, b1: u8, b2: u8) -> usize {
        let h = ((b0 as usize).wrapping_mul(506832829))
            ^ ((b1 as usize).wrapping_mul(2654435761) << 8)
            ^ ((b2 as usize).wrapping_mul(374761393) << 16);
        (h ^ (h >> 15)) & HASH_MASK
    }

    #[inline]
    fn hash_at(&self, pos: usize) -> usize {
        Self::hash(self.window[pos], self.window[pos + 1], self.window[pos + 2])
    }

    /// Index the three bytes starting at `pos`.
    ///
    /// Returns `false`, indexing nothing, when fewer than three bytes are
    /// buffered there.
    #[inline]
    pub fn insert(&mut self, pos: usize) -> bool {
        if pos + MIN_MATCH > self.end {
            return false;
        }
        let h = self.hash_at(pos);
        self.prev[pos & self.w_mask] = self.head[h];
        self.head[h] = pos as u32;
        true
    }

    /// Find the longest match for the bytes at `pos` that is strictly longer
    /// than `baseline`.
    ///
    /// The chain is walked from the most recent position backwards and only
    /// a strictly longer candidate replaces the current best, so among
    /// matches of equal length the closest one wins.
    pub fn find_best_match(
        &self,
        pos: usize,
        baseline: usize,
        params: &LevelParams,
    ) -> Option<Match> {
        let max_len = MAX_MATCH.min(self.end.saturating_sub(pos));
        if max_len < MIN_MATCH || baseline >= max_len {
            return None;
        }

        let max_dist = self.max_distance();
        let nice = params.nice_length.min(max_len);
        let mut chain = params.max_chain;
        if baseline >= params.good_length {
            chain >>= 2;
        }

        let current = &self.window[pos..pos + max_len];
        let mut best_len = baseline;
        let mut best_dist = 0usize;

        let mut candidate = self.head[self.hash_at(pos)];
        if candidate as usize == pos {
            candidate = self.prev[pos & self.w_mask];
        }

        while candidate != NIL && chain > 0 {
            let cand_pos = candidate as usize;
            if cand_pos >= pos || pos - cand_pos > max_dist {
                break;
            }

            let earlier = &self.window[cand_pos..cand_pos + max_len];
            // Quick rejection: the byte that would extend the best match
            if earlier[best_len] == current[best_len] && earlier[0] == current[0] {
                let len = earlier
                    .iter()
                    .zip(current)
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    best_len = len;
                    best_dist = pos - cand_pos;
                    if len >= nice {
                        break;
                    }
                }
            }

            candidate = self.prev[cand_pos & self.w_mask];
            chain -= 1;
        }

        (best_dist > 0 && best_len >= MIN_MATCH).then_some(Match {
            length: best_len,
            distance: best_dist,
        })
    }
}

fn rebase(entries: &mut [u32], shift: usize) {
    for entry in entries {
        *entry = if *entry != NIL && *entry as usize >= shift {
            *entry - shift as u32
        } else {
            NIL
        };
    }
}

/// How the encoder turns buffered bytes into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Literals only, destined for stored blocks.
    Stored,
    /// Literals only, entropy coded.
    HuffmanOnly,
    /// Runs of the previous byte only.
    Rle,
    /// Greedy matching.
    Fast,
    /// Matching with one position of lazy evaluation.
    Lazy,
}

impl MatchMode {
    /// Mode used for a level and strategy.
    pub fn select(level: CompressionLevel, strategy: Strategy) -> Self {
        match (level.level(), strategy) {
            (0, _) => Self::Stored,
            (_, Strategy::HuffmanOnly) => Self::HuffmanOnly,
            (_, Strategy::Rle) => Self::Rle,
            (1..=3, _) => Self::Fast,
            _ => Self::Lazy,
        }
    }

    fn uses_hash(self) -> bool {
        matches!(self, Self::Fast | Self::Lazy)
    }
}

/// LZ77 encoder for DEFLATE compression.
#[derive(Debug, Clone)]
pub struct Lz77Encoder {
    finder: MatchFinder,
    mode: MatchMode,
    params: LevelParams,
    /// Drop matches of length 5 or less.
    filtered: bool,
    /// Next position to examine.
    strstart: usize,
    /// First byte not yet covered by a returned token.
    emitted: usize,
    /// No match may reach back before this position.
    history_floor: usize,
    /// First position that could not be indexed for lack of lookahead.
    pending_insert: Option<usize>,
    /// Lazy evaluation: the position before `strstart` is still undecided.
    match_available: bool,
    match_length: usize,
    match_distance: usize,
    prev_length: usize,
    prev_distance: usize,
}

impl Lz77Encoder {
    /// Create an encoder for the given window, level and strategy.
    pub fn new(window_bits: u8, level: CompressionLevel, strategy: Strategy) -> Self {
        Self {
            finder: MatchFinder::new(window_bits),
            mode: MatchMode::select(level, strategy),
            params: LevelParams::for_level(level),
            filtered: strategy == Strategy::Filtered,
            strstart: 0,
            emitted: 0,
            history_floor: 0,
            pending_insert: None,
            match_available: false,
            match_length: MIN_MATCH - 1,
            match_distance: 0,
            prev_length: MIN_MATCH - 1,
            prev_distance: 0,
        }
    }

    /// Tokenization mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Underlying window.
    pub fn finder(&self) -> &MatchFinder {
        &self.finder
    }

    /// Forget all buffered input and history.
    pub fn reset(&mut self) {
        self.finder.clear();
        self.strstart = 0;
        self.emitted = 0;
        self.history_floor = 0;
        self.pending_insert = None;
        self.reset_lazy();
    }

    fn reset_lazy(&mut self) {
        self.match_available = false;
        self.match_length = MIN_MATCH - 1;
        self.match_distance = 0;
        self.prev_length = MIN_MATCH - 1;
        self.prev_distance = 0;
    }

    /// Seed the window with a preset dictionary.
    ///
    /// Only the last window's worth of `dictionary` is kept. The bytes are
    /// indexed for matching but never tokenized. Call on a fresh or reset
    /// encoder.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) {
        let w_size = self.finder.window_size();
        let tail = &dictionary[dictionary.len().saturating_sub(w_size)..];
        let start = self.finder.end();
        let n = self.finder.append(tail);

        if self.mode.uses_hash() {
            for pos in start..start + n {
                if !self.finder.insert(pos) {
                    self.defer_insert(pos);
                    break;
                }
            }
        }
        self.strstart = start + n;
        self.emitted = self.strstart;
    }

    /// Forget match history: nothing after this point refers back past it.
    pub fn clear_history(&mut self) {
        self.finder.clear_hash();
        self.history_floor = self.strstart;
        self.pending_insert = None;
        self.reset_lazy();
    }

    /// Buffer as much of `input` as fits. Returns the number of bytes taken.
    pub fn fill(&mut self, input: &[u8]) -> usize {
        if self.strstart >= 2 * self.finder.window_size() - MIN_LOOKAHEAD {
            let shift = self.finder.slide();
            self.strstart -= shift;
            self.emitted -= shift;
            self.history_floor = self.history_floor.saturating_sub(shift);
            self.pending_insert = self.pending_insert.and_then(|p| p.checked_sub(shift));
        }

        let n = self.finder.append(input);
        if n > 0 && self.mode.uses_hash() {
            self.catch_up_inserts();
        }
        n
    }

    /// Bytes buffered but not yet examined.
    pub fn lookahead(&self) -> usize {
        self.finder.end() - self.strstart
    }

    /// Bytes buffered but not yet covered by a returned token.
    pub fn unemitted(&self) -> usize {
        self.finder.end() - self.emitted
    }

    /// Produce the next token and the input bytes it covers.
    ///
    /// Returns `None` when more input is needed. With `flushing` set, every
    /// buffered byte is tokenized.
    pub fn next_token(&mut self, flushing: bool) -> Option<(Lz77Token, &[u8])> {
        let token = match self.mode {
            MatchMode::Stored | MatchMode::HuffmanOnly => self.next_literal(),
            MatchMode::Rle => self.next_run(flushing),
            MatchMode::Fast => self.next_fast(flushing),
            MatchMode::Lazy => self.next_lazy(flushing),
        }?;

        let start = self.emitted;
        self.emitted += token.byte_count();
        Some((token, &self.finder.data()[start..self.emitted]))
    }

    #[inline]
    fn can_advance(&self, flushing: bool) -> bool {
        let lookahead = self.lookahead();
        lookahead >= MIN_LOOKAHEAD || (flushing && lookahead > 0)
    }

    fn defer_insert(&mut self, pos: usize) {
        if self.pending_insert.is_none() {
            self.pending_insert = Some(pos);
        }
    }

    fn catch_up_inserts(&mut self) {
        if let Some(mut pos) = self.pending_insert {
            while pos < self.strstart && self.finder.insert(pos) {
                pos += 1;
            }
            self.pending_insert = (pos < self.strstart).then_some(pos);
        }
    }

    /// Whether a match is worth its bits under the configured strategy.
    fn keep(&self, m: &Match) -> bool {
        !(m.length <= 5 && (self.filtered || (m.length == MIN_MATCH && m.distance > TOO_FAR)))
    }

    fn next_literal(&mut self) -> Option<Lz77Token> {
        let byte = *self.finder.data().get(self.strstart)?;
        self.strstart += 1;
        Some(Lz77Token::Literal(byte))
    }

    fn next_run(&mut self, flushing: bool) -> Option<Lz77Token> {
        if !self.can_advance(flushing) {
            return None;
        }
        let pos = self.strstart;
        let data = self.finder.data();

        if pos > self.history_floor {
            let previous = data[pos - 1];
            let max_len = MAX_MATCH.min(data.len() - pos);
            let run = data[pos..pos + max_len]
                .iter()
                .take_while(|&&b| b == previous)
                .count();
            if run >= MIN_MATCH {
                self.strstart += run;
                return Some(Lz77Token::Match {
                    length: run as u16,
                    distance: 1,
                });
            }
        }

        let byte = data[pos];
        self.strstart += 1;
        Some(Lz77Token::Literal(byte))
    }

    fn next_fast(&mut self, flushing: bool) -> Option<Lz77Token> {
        if !self.can_advance(flushing) {
            return None;
        }
        let pos = self.strstart;

        let found = if self.finder.insert(pos) {
            self.finder
                .find_best_match(pos, MIN_MATCH - 1, &self.params)
                .filter(|m| self.keep(m))
        } else {
            self.defer_insert(pos);
            None
        };

        match found {
            Some(m) => {
                // Long matches are skipped without indexing their interior.
                if m.length <= self.params.max_lazy {
                    for p in pos + 1..pos + m.length {
                        if !self.finder.insert(p) {
                            self.defer_insert(p);
                            break;
                        }
                    }
                }
                self.strstart += m.length;
                Some(m.into())
            }
            None => {
                self.strstart += 1;
                Some(Lz77Token::Literal(self.finder.data()[pos]))
            }
        }
    }

    fn next_lazy(&mut self, flushing: bool) -> Option<Lz77Token> {
        loop {
            if !self.can_advance(flushing) {
                if flushing && self.match_available && self.lookahead() == 0 {
                    self.reset_lazy();
                    return Some(Lz77Token::Literal(self.finder.data()[self.strstart - 1]));
                }
                return None;
            }
            let pos = self.strstart;

            self.prev_length = self.match_length;
            self.prev_distance = self.match_distance;
            self.match_length = MIN_MATCH - 1;

            if self.finder.insert(pos) {
                if self.prev_length < self.params.max_lazy {
                    if let Some(m) = self
                        .finder
                        .find_best_match(pos, self.prev_length, &self.params)
                        .filter(|m| self.keep(m))
                    {
                        self.match_length = m.length;
                        self.match_distance = m.distance;
                    }
                }
            } else {
                self.defer_insert(pos);
            }

            if self.prev_length >= MIN_MATCH && self.match_length <= self.prev_length {
                // The match found one position back wins; it starts at pos - 1.
                let length = self.prev_length;
                let distance = self.prev_distance;
                for p in pos + 1..pos + length - 1 {
                    if !self.finder.insert(p) {
                        self.defer_insert(p);
                        break;
                    }
                }
                self.match_available = false;
                self.match_length = MIN_MATCH - 1;
                self.strstart = pos + length - 1;
                return Some(Match { length, distance }.into());
            }

            if self.match_available {
                self.strstart += 1;
                return Some(Lz77Token::Literal(self.finder.data()[pos - 1]));
            }

            self.match_available = true;
            self.strstart += 1;
        }
    }
}
