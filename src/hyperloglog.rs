//! Space-efficient probabilistic data structure for estimating the number of distinct items in a
//! multiset.

use crate::bits::{distance_to_next_one, harmonic_mean, n_significant_bits, smallest_fraction};
use crate::error::{Error, Result};
use crate::hash::{ByteHasher, SipByteHasher};
use log::debug;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::cmp;
use std::convert::TryFrom;

/// The smallest number of bucket bits accepted by [`HyperLogLog::new`].
pub const MIN_BUCKET_BITS: usize = 4;
/// The largest number of bucket bits accepted by [`HyperLogLog::new`].
pub const MAX_BUCKET_BITS: usize = 64;

// Fraction of the smallest buckets kept by the estimate; the rest are treated as outliers.
const KEPT_BUCKET_FRACTION: f64 = 0.7;

/// A space-efficient probabilitic data structure to count the number of distinct items in a
/// multiset.
///
/// A `HyperLogLog` uses the observation that the cardinality of a multiset of uniformly
/// distributed items can be estimated from the longest run of zeros seen in the hashes of its
/// items. The first `bucket_bits` bits of each hash select a bucket, and the bucket keeps the
/// largest distance from the end of the prefix to the next set bit. While some buckets are still
/// empty the estimate uses linear counting. Otherwise the largest 30% of the buckets are dropped
/// as outliers and the harmonic mean of the rest is scaled by a bias correction factor.
///
/// # Examples
///
/// ```
/// use approx_collections::hash::SipByteHasher;
/// use approx_collections::HyperLogLog;
///
/// let mut hll = HyperLogLog::new(14, SipByteHasher::from_seed(0, 0))?;
///
/// assert!(hll.is_empty());
///
/// for key in &["foo", "bar", "baz", "foo", "bar", "baz"] {
///     hll.insert(key);
/// }
///
/// assert!((hll.estimate().round() - 3.0).abs() < std::f64::EPSILON);
/// # Ok::<(), approx_collections::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct HyperLogLog<H = SipByteHasher> {
    correction_factor: f64,
    bucket_bits: usize,
    buckets: Vec<u8>,
    hasher: H,
}

impl HyperLogLog {
    /// Constructs a new, empty `HyperLogLog` with `2^bucket_bits` buckets, hashing with a
    /// randomly seeded `SipByteHasher`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `bucket_bits` is not in `[4, 64]` or the buckets
    /// cannot be allocated.
    pub fn from_entropy(bucket_bits: usize) -> Result<Self> {
        Self::new(bucket_bits, SipByteHasher::from_entropy())
    }

    /// Returns the bias correction factor for `2^bucket_bits` buckets.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::HyperLogLog;
    ///
    /// assert!((HyperLogLog::correction_factor(4) - 0.673).abs() < std::f64::EPSILON);
    /// assert!((HyperLogLog::correction_factor(10) - 0.7213 / (1.0 + 1.079 / 1024.0)).abs() < 1e-12);
    /// ```
    pub fn correction_factor(bucket_bits: usize) -> f64 {
        match bucket_bits {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            bucket_bits => 0.7213 / (1.0 + 1.079 / 2f64.powi(bucket_bits as i32)),
        }
    }

    /// Returns the linear counting estimate for `bucket_count` buckets of which `zero_count` are
    /// still empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::HyperLogLog;
    ///
    /// assert!(HyperLogLog::linear_counting_estimate(16, 16).abs() < std::f64::EPSILON);
    /// ```
    pub fn linear_counting_estimate(zero_count: usize, bucket_count: usize) -> f64 {
        let bucket_count = bucket_count as f64;
        bucket_count * (bucket_count / zero_count as f64).ln()
    }
}

impl<H> HyperLogLog<H>
where
    H: ByteHasher,
{
    /// Constructs a new, empty `HyperLogLog` with `2^bucket_bits` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `bucket_bits` is not in `[4, 64]`, if `hasher`
    /// produces fewer than `bucket_bits` bits, or if the buckets cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::HyperLogLog;
    ///
    /// let hll = HyperLogLog::new(4, SipByteHasher::from_seed(0, 0))?;
    /// assert_eq!(hll.bucket_count(), 16);
    ///
    /// assert!(HyperLogLog::new(3, SipByteHasher::from_seed(0, 0)).is_err());
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn new(bucket_bits: usize, hasher: H) -> Result<Self> {
        if bucket_bits < MIN_BUCKET_BITS || bucket_bits > MAX_BUCKET_BITS {
            return Err(Error::invalid_argument(format!(
                "bucket bits must be between {} and {}, got {}",
                MIN_BUCKET_BITS, MAX_BUCKET_BITS, bucket_bits
            )));
        }
        let hash_bits = hasher.output_len() * 8;
        if hash_bits < bucket_bits {
            return Err(Error::invalid_argument(format!(
                "hash function must produce at least {} bits, got {}",
                bucket_bits, hash_bits
            )));
        }
        let bucket_count = u32::try_from(bucket_bits)
            .ok()
            .and_then(|shift| 1usize.checked_shl(shift))
            .ok_or_else(|| {
                Error::invalid_argument(format!("2^{} buckets cannot be addressed", bucket_bits))
            })?;
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(bucket_count)
            .map_err(|err| Error::invalid_argument(format!("cannot allocate buckets: {}", err)))?;
        buckets.resize(bucket_count, 0);

        debug!("created hyperloglog with {} buckets", bucket_count);
        Ok(HyperLogLog {
            correction_factor: HyperLogLog::correction_factor(bucket_bits),
            bucket_bits,
            buckets,
            hasher,
        })
    }

    /// Inserts an item into the `HyperLogLog`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::HyperLogLog;
    ///
    /// let mut hll = HyperLogLog::new(4, SipByteHasher::from_seed(0, 0))?;
    ///
    /// hll.insert("foo");
    /// assert!(hll.largest_bucket() > 0);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn insert<T>(&mut self, value: &T)
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let hash = self.hasher.hash(value.as_ref());
        let bucket_index = n_significant_bits(&hash, self.bucket_bits) as usize;
        let distance = distance_to_next_one(&hash, self.bucket_bits);
        let distance = u8::try_from(distance).unwrap_or(u8::max_value());
        if let Some(bucket) = self.buckets.get_mut(bucket_index) {
            *bucket = cmp::max(*bucket, distance);
        }
    }

    /// Merges `other` into `self` by keeping the larger value of every bucket. The result is the
    /// same as if every item of `other` had been inserted into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleShape`] if the two `HyperLogLog`s have different numbers of
    /// bucket bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::HyperLogLog;
    ///
    /// let mut hll1 = HyperLogLog::new(14, SipByteHasher::from_seed(0, 0))?;
    /// hll1.insert("foo");
    /// hll1.insert("bar");
    ///
    /// let mut hll2 = HyperLogLog::new(14, SipByteHasher::from_seed(0, 0))?;
    /// hll2.insert("foo");
    /// hll2.insert("baz");
    ///
    /// hll1.merge(&hll2)?;
    ///
    /// assert!((hll1.estimate().round() - 3.0).abs() < std::f64::EPSILON);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.bucket_bits != other.bucket_bits {
            return Err(Error::incompatible_shape(format!(
                "cannot merge hyperloglogs with {} and {} bucket bits",
                self.bucket_bits, other.bucket_bits
            )));
        }
        for (bucket, other_bucket) in self.buckets.iter_mut().zip(&other.buckets) {
            *bucket = cmp::max(*bucket, *other_bucket);
        }
        debug!(
            "merged hyperloglog, {} of {} buckets empty",
            self.zero_bucket_count(),
            self.buckets.len()
        );
        Ok(())
    }

    /// Returns the number of buckets that no item has been hashed to.
    pub fn zero_bucket_count(&self) -> usize {
        self.buckets.iter().filter(|bucket| **bucket == 0).count()
    }

    /// Returns the estimated number of distinct items in the `HyperLogLog`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::HyperLogLog;
    ///
    /// let mut hll = HyperLogLog::new(14, SipByteHasher::from_seed(0, 0))?;
    /// assert!(hll.estimate().abs() < std::f64::EPSILON);
    ///
    /// hll.insert("foo");
    /// assert!((hll.estimate().round() - 1.0).abs() < std::f64::EPSILON);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn estimate(&self) -> f64 {
        let zero_count = self.zero_bucket_count();
        if zero_count > 0 {
            return HyperLogLog::linear_counting_estimate(zero_count, self.buckets.len());
        }

        let kept_buckets = smallest_fraction(&self.buckets, KEPT_BUCKET_FRACTION);
        let mean = harmonic_mean(&kept_buckets);
        self.correction_factor * self.buckets.len() as f64 * 2f64.powf(mean)
    }

    /// Returns the relative standard error of the estimate, `1.04 / sqrt(2^bucket_bits)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::HyperLogLog;
    ///
    /// let hll = HyperLogLog::new(8, SipByteHasher::from_seed(0, 0))?;
    /// assert!((hll.error() - 0.065).abs() < 1e-12);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn error(&self) -> f64 {
        1.04 / (self.buckets.len() as f64).sqrt()
    }

    /// Returns the largest value held by any bucket.
    pub fn largest_bucket(&self) -> u8 {
        self.buckets.iter().cloned().max().unwrap_or(0)
    }

    /// Returns the buckets of the `HyperLogLog`.
    pub fn buckets(&self) -> &[u8] {
        &self.buckets
    }

    /// Returns the number of hash bits used to select a bucket.
    pub fn bucket_bits(&self) -> usize {
        self.bucket_bits
    }

    /// Returns the number of buckets, `2^bucket_bits`.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no item has been inserted into the `HyperLogLog`.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| *bucket == 0)
    }

    /// Clears the `HyperLogLog`, removing all items.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = 0;
        }
    }

    /// Returns a reference to the `HyperLogLog`'s hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

#[cfg(test)]
mod tests {
    use super::HyperLogLog;
    use crate::error::Error;
    use crate::hash::tests::hasher_1;
    use std::f64::EPSILON;
    use test_case::test_case;

    #[test_case(2)]
    #[test_case(3)]
    #[test_case(65)]
    fn test_new_invalid_bucket_bits(bucket_bits: usize) {
        match HyperLogLog::new(bucket_bits, hasher_1()) {
            Err(Error::InvalidArgument(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_new_hash_too_short() {
        let hasher = |bytes: &[u8]| vec![bytes.len() as u8];
        assert!(HyperLogLog::new(8, hasher).is_ok());
        assert!(HyperLogLog::new(9, hasher).is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_new_unaddressable_bucket_count() {
        assert!(HyperLogLog::new(63, hasher_1()).is_err());
        assert!(HyperLogLog::new(64, hasher_1()).is_err());
    }

    #[test]
    fn test_new() {
        let hll = HyperLogLog::new(4, hasher_1()).unwrap();
        assert_eq!(hll.bucket_count(), 16);
        assert_eq!(hll.bucket_bits(), 4);
        assert_eq!(hll.zero_bucket_count(), 16);
        assert!(hll.is_empty());
    }

    #[test]
    fn test_insert() {
        let mut hll = HyperLogLog::new(4, hasher_1()).unwrap();
        for key in &["hello", "world", "something", "something else"] {
            hll.insert(key);
        }
        assert!(hll.largest_bucket() > 0);
        assert!(hll.zero_bucket_count() <= 15);
    }

    #[test]
    fn test_buckets_grow() {
        let mut hll = HyperLogLog::new(4, hasher_1()).unwrap();
        let mut prev = hll.buckets().to_vec();
        for i in 0..1000 {
            hll.insert(&format!("hello{}", i));
            assert!(hll.buckets().iter().zip(&prev).all(|(x, y)| x >= y));
            prev = hll.buckets().to_vec();
        }
        assert!(hll.largest_bucket() > 2);
    }

    #[test]
    fn test_insert_fixed_hash() {
        // The bucket is the top four bits, and the next set bit is three bits further.
        let hasher = |_: &[u8]| vec![0b1010_0010u8, 0b0000_0000];
        let mut hll = HyperLogLog::new(4, hasher).unwrap();
        hll.insert("anything");
        assert_eq!(hll.buckets()[0b1010], 3);
        assert_eq!(hll.zero_bucket_count(), 15);

        // No set bit after the prefix caps the value at the remaining bit count.
        let hasher = |_: &[u8]| vec![0b0001_0000u8, 0b0000_0000];
        let mut hll = HyperLogLog::new(4, hasher).unwrap();
        hll.insert("anything");
        assert_eq!(hll.buckets()[1], 12);
    }

    #[test_case(4 => 0.673)]
    #[test_case(5 => 0.697)]
    #[test_case(6 => 0.709)]
    fn test_correction_factor_constants(bucket_bits: usize) -> f64 {
        HyperLogLog::correction_factor(bucket_bits)
    }

    #[test]
    fn test_correction_factor_formula() {
        for bucket_bits in 7..=16 {
            let expected = 0.7213 / (1.0 + 1.079 / (1u64 << bucket_bits) as f64);
            assert!((HyperLogLog::correction_factor(bucket_bits) - expected).abs() < EPSILON);
        }
    }

    #[test_case(4, 0.26)]
    #[test_case(5, 0.183_847_763_108_502_34)]
    #[test_case(6, 0.13)]
    #[test_case(7, 0.091_923_881_554_251_17)]
    #[test_case(8, 0.065)]
    #[test_case(9, 0.045_961_940_777_125_59)]
    #[test_case(10, 0.0325)]
    #[test_case(11, 0.022_980_970_388_562_795)]
    fn test_error(bucket_bits: usize, expected: f64) {
        let hll = HyperLogLog::new(bucket_bits, hasher_1()).unwrap();
        assert!((hll.error() - expected).abs() < expected * 1e-4);
    }

    #[test]
    fn test_linear_counting() {
        let mut hll = HyperLogLog::new(11, hasher_1()).unwrap();
        for i in 0..1000 {
            hll.insert(&i.to_string());
        }
        let zero_count = hll.zero_bucket_count();
        assert!(zero_count > 0);

        let estimate = hll.estimate();
        assert!((estimate - HyperLogLog::linear_counting_estimate(zero_count, 2048)).abs() < EPSILON);
        assert!(estimate > 900.0 && estimate < 1100.0);
    }

    #[test]
    fn test_simple() {
        let mut hll = HyperLogLog::new(11, hasher_1()).unwrap();
        assert!(hll.estimate() < EPSILON);

        for key in &["foo", "bar", "baz", "foo", "bar", "baz"] {
            hll.insert(key);
        }

        assert!(!hll.is_empty());
        assert!((hll.estimate() - 3.0).abs() < 1.1);

        hll.clear();
        assert!(hll.is_empty());
        assert!(hll.estimate() < EPSILON);
    }

    #[test]
    fn test_estimate_large_cardinality() {
        let mut hll = HyperLogLog::new(11, hasher_1()).unwrap();
        let insertions = 1_000_000;
        for i in 0..insertions {
            hll.insert(&i.to_string());
        }
        assert_eq!(hll.zero_bucket_count(), 0);

        // Discarding the largest buckets biases the estimate low, by roughly 10-15% at this
        // bucket count.
        let estimate = hll.estimate();
        let insertions = f64::from(insertions);
        assert!(estimate > insertions * 0.8);
        assert!(estimate < insertions * (1.0 + hll.error()));
    }

    #[test]
    fn test_merge_fixed_buckets() {
        let mut hll1 = HyperLogLog::new(4, hasher_1()).unwrap();
        hll1.buckets = vec![1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2];
        let estimate1 = hll1.estimate();

        let mut hll2 = HyperLogLog::new(4, hasher_1()).unwrap();
        hll2.buckets = vec![3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3, 1];
        let estimate2 = hll2.estimate();

        hll1.merge(&hll2).unwrap();
        let estimate3 = hll1.estimate();

        assert_eq!(hll1.buckets[0], 3);
        assert_eq!(hll1.buckets[15], 2);
        assert!(estimate2 > estimate1);
        assert!(estimate3 > estimate2);

        let kept = 11.0;
        let expected1 = 0.673 * 16.0 * 2f64.powf(kept / (8.0 + 3.0 * 0.5));
        assert!((estimate1 - expected1).abs() < 1e-9);
    }

    #[test]
    fn test_merge_disjoint() {
        let mut hll1 = HyperLogLog::new(4, hasher_1()).unwrap();
        let mut hll2 = HyperLogLog::new(4, hasher_1()).unwrap();
        for i in 0..1000 {
            hll1.insert(&format!("one:{}", i));
            hll2.insert(&format!("two:{}", i));
        }
        let estimate1 = hll1.estimate();
        let estimate2 = hll2.estimate();
        let expected_buckets: Vec<u8> = hll1
            .buckets()
            .iter()
            .zip(hll2.buckets())
            .map(|(x, y)| *x.max(y))
            .collect();

        hll1.merge(&hll2).unwrap();
        let estimate3 = hll1.estimate();

        assert_eq!(hll1.buckets(), expected_buckets.as_slice());
        assert!(estimate3 >= estimate1);
        assert!(estimate3 >= estimate2);
    }

    #[test]
    fn test_merge_realistic() {
        let mut hll1 = HyperLogLog::new(11, hasher_1()).unwrap();
        let mut hll2 = HyperLogLog::new(11, hasher_1()).unwrap();
        for i in 0..100_000 {
            hll1.insert(&format!("first:{}", i));
        }
        for i in 0..200_000 {
            hll2.insert(&format!("second:{}", i));
        }
        let estimate1 = hll1.estimate();
        let estimate2 = hll2.estimate();

        hll1.merge(&hll2).unwrap();
        let estimate3 = hll1.estimate();

        let difference = (estimate3 - (estimate1 + estimate2)).abs();
        assert!(difference / (estimate1 + estimate2) < 0.1);
    }

    #[test]
    fn test_merge_incompatible() {
        let mut hll1 = HyperLogLog::new(4, hasher_1()).unwrap();
        let hll2 = HyperLogLog::new(5, hasher_1()).unwrap();
        match hll1.merge(&hll2) {
            Err(Error::IncompatibleShape(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de() {
        let mut hll = HyperLogLog::new(8, hasher_1()).unwrap();
        for key in &["foo", "bar", "baz"] {
            hll.insert(key);
        }

        let serialized_hll = bincode::serialize(&hll).unwrap();
        let de_hll: HyperLogLog = bincode::deserialize(&serialized_hll).unwrap();

        assert!((hll.estimate() - de_hll.estimate()).abs() < EPSILON);
        assert!((hll.correction_factor - de_hll.correction_factor).abs() < EPSILON);
        assert_eq!(hll.bucket_bits, de_hll.bucket_bits);
        assert_eq!(hll.buckets, de_hll.buckets);
        assert_eq!(hll.hasher(), de_hll.hasher());
    }
}
