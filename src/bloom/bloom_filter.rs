use crate::bit_field::BitField;
use crate::error::{Error, Result};
use crate::hash::{ByteHasher, SipByteHasher};
use byteorder::{BigEndian, ByteOrder};
use log::debug;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::f64::consts::LN_2;
use std::ops::Range;

/// The number of bits used by [`BloomFilter::new`].
pub const DEFAULT_BIT_COUNT: usize = 1024;
/// The number of hash positions used by [`BloomFilter::new`].
pub const DEFAULT_HASH_COUNT: usize = 3;
/// The minimum number of bytes the hasher of a `BloomFilter` must produce.
pub const MIN_HASH_LEN: usize = 4;

/// A space-efficient probabilistic data structure to test for membership in a set.
///
/// At its core, a bloom filter is a bit array, initially all set to zero. `K` hash positions are
/// derived for each element and the corresponding bits are set. An element definitely does not
/// exist in the bloom filter if any of the `K` bits are unset. An element is possibly in the set
/// if all of the `K` bits are set.
///
/// This implementation hashes each element once. The first two big-endian 16-bit words of the
/// hash become a starting index `a` and an offset `b`, and the `i`th position is derived with
/// enhanced double hashing: `a + i * b + (i^3 - i) / 6 (mod m)`.
///
/// # Examples
///
/// ```
/// use approx_collections::bloom::BloomFilter;
/// use approx_collections::hash::SipByteHasher;
///
/// let mut filter = BloomFilter::new(SipByteHasher::from_seed(0, 0))?;
///
/// assert!(!filter.contains("foo"));
/// filter.insert("foo");
/// assert!(filter.contains("foo"));
///
/// filter.clear();
/// assert!(!filter.contains("foo"));
///
/// assert_eq!(filter.len(), 1024);
/// assert_eq!(filter.hash_count(), 3);
/// # Ok::<(), approx_collections::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
pub struct BloomFilter<H = SipByteHasher> {
    bit_field: BitField,
    hasher: H,
    hash_count: usize,
}

impl BloomFilter {
    /// Constructs a new, empty `BloomFilter` with `bit_count` bits and `hash_count` hash positions
    /// per element, hashing with a randomly seeded `SipByteHasher`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `bit_count` or `hash_count` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    ///
    /// let filter = BloomFilter::from_entropy(100, 7)?;
    /// assert_eq!(filter.len(), 100);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn from_entropy(bit_count: usize, hash_count: usize) -> Result<Self> {
        Self::with_params(SipByteHasher::from_entropy(), bit_count, hash_count)
    }

    /// Returns the `i`th index of an element whose hash yields `start` and `offset`, in a bloom
    /// filter of `bit_count` bits:
    ///
    /// `(start + offset * i + (i - 1) * i * (i + 1) / 6) mod bit_count`
    ///
    /// Every term is reduced modulo `bit_count` before it is combined, so any `i` is accepted.
    ///
    /// # Panics
    ///
    /// Panics if `bit_count` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    ///
    /// let indices: Vec<usize> = (0..10).map(|i| BloomFilter::generate_index(0, 1, i, 50)).collect();
    /// assert_eq!(indices, vec![0, 1, 3, 7, 14, 25, 41, 13, 42, 29]);
    /// assert_eq!(BloomFilter::generate_index(0, 1, 1 << 50, 1000), 624);
    /// ```
    pub fn generate_index(start: usize, offset: usize, i: usize, bit_count: usize) -> usize {
        let m = bit_count as u128;
        let i = i as u128;

        // (i - 1) * i * (i + 1) holds a multiple of 2 and a multiple of 3; divide them out first
        // so each factor stays below 2^64 and every product of two reduced factors fits in u128.
        let mut factors = [i.saturating_sub(1), i, i + 1];
        for divisor in &[3, 2] {
            if let Some(factor) = factors.iter_mut().find(|factor| **factor % divisor == 0) {
                *factor /= divisor;
            }
        }
        let cubic = factors
            .iter()
            .fold(1 % m, |acc, factor| acc * (factor % m) % m);

        let linear = (offset as u128 % m) * (i % m) % m;
        ((start as u128 % m + linear + cubic) % m) as usize
    }

    /// Returns the number of bits needed to hold `item_count` items with a false positive
    /// probability of `fpp`, rounded up to a whole number of bytes. The result saturates near
    /// `usize::MAX` when `fpp` is zero, and is zero when `fpp` is not a number or at least one.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    ///
    /// assert_eq!(BloomFilter::optimal_bit_field_length(1_000_000, 0.01), 9_585_064);
    /// assert_eq!(BloomFilter::optimal_bit_field_length(1_000_000, 0.20), 3_349_840);
    /// assert_eq!(BloomFilter::optimal_bit_field_length(1000, 0.0), usize::max_value() / 8 * 8);
    /// ```
    pub fn optimal_bit_field_length(item_count: usize, fpp: f64) -> usize {
        let bit_count = (-(item_count as f64) * fpp.ln() / (LN_2 * LN_2)).ceil();
        if !(bit_count > 0.0) {
            return 0;
        }
        // Float to integer casts saturate.
        let bit_count = bit_count as usize;
        match bit_count.checked_add(7) {
            Some(bit_count) => bit_count / 8 * 8,
            None => usize::max_value() / 8 * 8,
        }
    }

    /// Returns the number of hash positions that minimizes the false positive probability of a
    /// bloom filter with `bit_count` bits holding `item_count` items.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    ///
    /// assert_eq!(BloomFilter::optimal_hash_count(9_585_064, 1_000_000), 7);
    /// ```
    pub fn optimal_hash_count(bit_count: usize, item_count: usize) -> usize {
        (bit_count as f64 / item_count as f64 * LN_2).round() as usize
    }
}

impl<H> BloomFilter<H>
where
    H: ByteHasher,
{
    /// Constructs a new, empty `BloomFilter` with 1024 bits and 3 hash positions per element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `hasher` produces fewer than four bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    ///
    /// let filter = BloomFilter::new(|bytes: &[u8]| -> Vec<u8> {
    ///     bytes.iter().chain(b"salt").cycle().take(4).cloned().collect()
    /// });
    /// assert!(filter.is_ok());
    ///
    /// let filter = BloomFilter::new(|_: &[u8]| vec![0u8; 2]);
    /// assert!(filter.is_err());
    /// ```
    pub fn new(hasher: H) -> Result<Self> {
        Self::with_params(hasher, DEFAULT_BIT_COUNT, DEFAULT_HASH_COUNT)
    }

    /// Constructs a new, empty `BloomFilter` with `bit_count` bits and `hash_count` hash positions
    /// per element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `bit_count` or `hash_count` is zero, or if `hasher`
    /// produces fewer than four bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let filter = BloomFilter::with_params(SipByteHasher::from_seed(0, 0), 100, 7)?;
    /// assert_eq!(filter.len(), 100);
    /// assert_eq!(filter.hash_count(), 7);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn with_params(hasher: H, bit_count: usize, hash_count: usize) -> Result<Self> {
        if bit_count == 0 {
            return Err(Error::invalid_argument("bit count must be positive"));
        }
        if hash_count == 0 {
            return Err(Error::invalid_argument("hash count must be positive"));
        }
        let hash_len = hasher.output_len();
        if hash_len < MIN_HASH_LEN {
            return Err(Error::invalid_argument(format!(
                "hash function must produce at least {} bytes, got {}",
                MIN_HASH_LEN, hash_len
            )));
        }
        debug!(
            "created bloom filter with {} bits and {} hash positions",
            bit_count, hash_count
        );
        Ok(BloomFilter {
            bit_field: BitField::new(bit_count),
            hasher,
            hash_count,
        })
    }

    /// Constructs a new, empty `BloomFilter` sized to hold `item_count` items with a false
    /// positive probability of `fpp`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `item_count` is zero, if `fpp` is not in `(0, 1)`,
    /// or if `hasher` produces fewer than four bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let filter = BloomFilter::from_item_count(SipByteHasher::from_seed(0, 0), 1000, 0.01)?;
    /// assert_eq!(filter.len(), 9592);
    /// assert_eq!(filter.hash_count(), 7);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn from_item_count(hasher: H, item_count: usize, fpp: f64) -> Result<Self> {
        if item_count == 0 {
            return Err(Error::invalid_argument("item count must be positive"));
        }
        if !(fpp > 0.0 && fpp < 1.0) {
            return Err(Error::invalid_argument(format!(
                "false positive probability must be in (0, 1), got {}",
                fpp
            )));
        }
        let bit_count = BloomFilter::optimal_bit_field_length(item_count, fpp);
        let hash_count = BloomFilter::optimal_hash_count(bit_count, item_count).max(1);
        Self::with_params(hasher, bit_count, hash_count)
    }

    fn start_and_offset(&self, value: &[u8]) -> (usize, usize) {
        let hash = self.hasher.hash(value);
        let len = self.bit_field.len().max(1);
        // Hashers shorter than MIN_HASH_LEN are rejected at construction, but a hasher whose
        // output length varies with its input can still come up short.
        let read_word = |range: Range<usize>| match hash.get(range) {
            Some(word) => BigEndian::read_u16(word) as usize % len,
            None => 0,
        };
        (read_word(0..2), read_word(2..4))
    }

    /// Returns the bit positions associated with `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    ///
    /// let filter = BloomFilter::with_params(|_: &[u8]| vec![0u8, 0, 0, 1], 50, 4)?;
    /// assert_eq!(filter.indices_for_value("foo"), vec![0, 1, 3, 7]);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn indices_for_value<T>(&self, value: &T) -> Vec<usize>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let len = self.bit_field.len();
        if len == 0 {
            return Vec::new();
        }
        let (start, offset) = self.start_and_offset(value.as_ref());
        (0..self.hash_count)
            .map(|i| BloomFilter::generate_index(start, offset, i, len))
            .collect()
    }

    /// Inserts an element into the bloom filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let mut filter = BloomFilter::new(SipByteHasher::from_seed(0, 0))?;
    ///
    /// filter.insert("foo");
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn insert<T>(&mut self, value: &T)
    where
        T: AsRef<[u8]> + ?Sized,
    {
        for index in self.indices_for_value(value) {
            self.bit_field.set_wrapping(index, true);
        }
    }

    /// Checks if an element is possibly in the bloom filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let mut filter = BloomFilter::new(SipByteHasher::from_seed(0, 0))?;
    ///
    /// assert!(!filter.contains("foo"));
    /// filter.insert("foo");
    /// assert!(filter.contains("foo"));
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn contains<T>(&self, value: &T) -> bool
    where
        T: AsRef<[u8]> + ?Sized,
    {
        self.indices_for_value(value)
            .into_iter()
            .all(|index| self.bit_field.get_wrapping(index))
    }

    /// Returns the estimated false positive probability of the bloom filter from its current
    /// fill: `(1 - e^(-k * ones / m))^k`. This value will increase as more items are added.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let mut filter = BloomFilter::new(SipByteHasher::from_seed(0, 0))?;
    /// assert!(filter.error_rate() < std::f64::EPSILON);
    ///
    /// filter.insert("foo");
    /// assert!(filter.error_rate() > std::f64::EPSILON);
    /// assert!(filter.error_rate() < 0.01);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn error_rate(&self) -> f64 {
        let hash_count = self.hash_count as f64;
        let fill = self.bit_field.count_ones() as f64 / self.bit_field.len() as f64;
        (1.0 - (-hash_count * fill).exp()).powi(self.hash_count as i32)
    }

    /// Sets `self` to the union of `self` and `other`. Every element of either filter is
    /// possibly in the result.
    ///
    /// Both filters must hash with equivalent hashers for the result to be meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleShape`] if the filters differ in length or hash count.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::bloom::BloomFilter;
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let mut filter1 = BloomFilter::new(SipByteHasher::from_seed(0, 0))?;
    /// let mut filter2 = BloomFilter::new(SipByteHasher::from_seed(0, 0))?;
    /// filter1.insert("foo");
    /// filter2.insert("bar");
    ///
    /// filter1.union(&filter2)?;
    /// assert!(filter1.contains("foo"));
    /// assert!(filter1.contains("bar"));
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn union(&mut self, other: &Self) -> Result<()> {
        if self.hash_count != other.hash_count {
            return Err(Error::incompatible_shape(format!(
                "cannot union bloom filters with {} and {} hash positions",
                self.hash_count, other.hash_count
            )));
        }
        self.bit_field.union(&other.bit_field)?;
        debug!(
            "merged bloom filter, {} of {} bits set",
            self.bit_field.count_ones(),
            self.bit_field.len()
        );
        Ok(())
    }

    /// Returns the number of bits in the bloom filter.
    pub fn len(&self) -> usize {
        self.bit_field.len()
    }

    /// Returns `true` if the bloom filter has no bits. A successfully constructed filter always
    /// has at least one bit.
    pub fn is_empty(&self) -> bool {
        self.bit_field.is_empty()
    }

    /// Returns the number of bit positions derived for each element.
    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    /// Clears the bloom filter, removing all elements.
    pub fn clear(&mut self) {
        self.bit_field.set_all(false)
    }

    /// Returns the number of set bits in the bloom filter.
    pub fn count_ones(&self) -> usize {
        self.bit_field.count_ones()
    }

    /// Returns the number of unset bits in the bloom filter.
    pub fn count_zeros(&self) -> usize {
        self.bit_field.count_zeros()
    }

    /// Returns a reference to the underlying bit field.
    pub fn bit_field(&self) -> &BitField {
        &self.bit_field
    }

    /// Returns a reference to the bloom filter's hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}
