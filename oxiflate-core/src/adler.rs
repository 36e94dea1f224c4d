//! Adler-32 checksum (RFC 1950) with incremental update and combination.
//!
//! Adler-32 keeps two 16-bit sums modulo 65521: `a` is one plus the sum of
//! all bytes and `b` is the sum of the successive `a` values. It is the
//! trailer checksum of the zlib container and identifies preset
//! dictionaries.

/// Largest prime below 2^16.
const ADLER_MOD: u32 = 65521;

/// Largest n such that 255n(n+1)/2 + (n+1)(ADLER_MOD-1) fits in a u32.
const NMAX: usize = 5552;

/// Adler-32 checksum calculator.
///
/// # Example
///
/// ```
/// use oxiflate_core::adler::Adler32;
///
/// let mut adler = Adler32::new();
/// adler.update(b"Hel");
/// adler.update(b"lo");
/// assert_eq!(adler.finish(), 0x058C01F5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Resume from a previously finished value.
    pub fn from_value(value: u32) -> Self {
        Self {
            a: value & 0xFFFF,
            b: value >> 16,
        }
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        // Reduce once per NMAX bytes; the sums cannot overflow in between.
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        self.a = a;
        self.b = b;
    }

    /// Append the checksum of `len2` further bytes computed elsewhere.
    pub fn combine(&mut self, adler2: u32, len2: u64) {
        *self = Self::from_value(adler32_combine(self.finish(), adler2, len2));
    }

    /// Return the checksum.
    pub fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Compute Adler-32 checksum of data in one shot.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finish()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Adler-32 of the empty sequence.
pub fn adler32_init() -> u32 {
    1
}

/// Extend `adler` with `data`.
///
/// An empty `data` returns `adler` unchanged.
pub fn adler32_update(adler: u32, data: &[u8]) -> u32 {
    let mut state = Adler32::from_value(adler);
    state.update(data);
    state.finish()
}

/// Adler-32 of `A ++ B` given `adler1 = adler32(A)`, `adler2 = adler32(B)`
/// and `len2 = len(B)`.
///
/// With `len2` bytes appended, `a` grows by `a2 - 1` and `b` by
/// `len2 * a1 + b2 - len2`, all modulo 65521. A zero `len2` returns `adler1`
/// unchanged.
pub fn adler32_combine(adler1: u32, adler2: u32, len2: u64) -> u32 {
    if len2 == 0 {
        return adler1;
    }

    let rem = (len2 % ADLER_MOD as u64) as u32;
    let a1 = adler1 & 0xFFFF;
    let b1 = (adler1 >> 16) & 0xFFFF;
    let a2 = adler2 & 0xFFFF;
    let b2 = (adler2 >> 16) & 0xFFFF;

    let mut sum1 = a1 + a2 + ADLER_MOD - 1;
    let mut sum2 = (rem * a1) % ADLER_MOD;
    sum2 += b1 + b2 + ADLER_MOD - rem;

    if sum1 >= ADLER_MOD {
        sum1 -= ADLER_MOD;
    }
    if sum1 >= ADLER_MOD {
        sum1 -= ADLER_MOD;
    }
    if sum2 >= ADLER_MOD << 1 {
        sum2 -= ADLER_MOD << 1;
    }
    if sum2 >= ADLER_MOD {
        sum2 -= ADLER_MOD;
    }

    sum1 | (sum2 << 16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(Adler32::checksum(b""), 1);
        assert_eq!(Adler32::checksum(b"Hello"), 0x058C01F5);
        assert_eq!(Adler32::checksum(b"Wikipedia"), 0x11E60398);
    }

    #[test]
    fn test_adler32_long_input_reduction() {
        // Exercises more than one NMAX chunk of maximal bytes.
        let data = vec![0xFFu8; NMAX * 3 + 17];
        let mut bytewise = (1u64, 0u64);
        for &byte in &data {
            bytewise.0 = (bytewise.0 + byte as u64) % ADLER_MOD as u64;
            bytewise.1 = (bytewise.1 + bytewise.0) % ADLER_MOD as u64;
        }
        let expected = ((bytewise.1 << 16) | bytewise.0) as u32;
        assert_eq!(Adler32::checksum(&data), expected);
    }

    #[test]
    fn test_adler32_update_empty_is_noop() {
        let value = Adler32::checksum(b"abc");
        assert_eq!(adler32_update(value, b""), value);
        assert_eq!(adler32_init(), 1);
    }

    #[test]
    fn test_adler32_combine_simple() {
        let a = Adler32::checksum(b"Wiki");
        let b = Adler32::checksum(b"pedia");
        assert_eq!(adler32_combine(a, b, 5), Adler32::checksum(b"Wikipedia"));
    }

    #[test]
    fn test_adler32_combine_zero_length() {
        let a = Adler32::checksum(b"data");
        assert_eq!(adler32_combine(a, 1, 0), a);
        assert_eq!(adler32_combine(a, adler32_init(), 0), a);
    }

    #[test]
    fn test_adler32_combine_length_beyond_modulus() {
        let x = b"prefix".to_vec();
        let y = vec![0x5Au8; ADLER_MOD as usize + 123];
        let mut xy = x.clone();
        xy.extend_from_slice(&y);

        let mut adler = Adler32::new();
        adler.update(&x);
        adler.combine(Adler32::checksum(&y), y.len() as u64);
        assert_eq!(adler.finish(), Adler32::checksum(&xy));
    }

    proptest! {
        #[test]
        fn prop_adler32_combine_law(
            x in proptest::collection::vec(any::<u8>(), 0..1024),
            y in proptest::collection::vec(any::<u8>(), 0..1024),
        ) {
            let mut xy = x.clone();
            xy.extend_from_slice(&y);
            let combined =
                adler32_combine(Adler32::checksum(&x), Adler32::checksum(&y), y.len() as u64);
            prop_assert_eq!(combined, Adler32::checksum(&xy));
        }

        #[test]
        fn prop_adler32_chunking_invariant(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            split in 0usize..4096,
        ) {
            let split = split.min(data.len());
            let head = adler32_update(adler32_init(), &data[..split]);
            let incremental = adler32_update(head, &data[split..]);
            prop_assert_eq!(incremental, Adler32::checksum(&data));
        }
    }
}
