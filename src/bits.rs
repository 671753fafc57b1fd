//! Bit-slicing helpers over hash outputs and raw byte buffers.
//!
//! Bits are addressed most significant bit first: bit `0` is the high-order bit of byte `0`.

/// Returns the bit at `index`, most significant bit first.
///
/// # Panics
///
/// Panics if `index` is not smaller than `bytes.len() * 8`.
#[inline]
pub(crate) fn bit_at(bytes: &[u8], index: usize) -> u8 {
    (bytes[index / 8] >> (7 - index % 8)) & 1
}

/// Returns the integer formed by the first `n` bits of `bytes`. Reading stops at the end of
/// the buffer, and only the last 64 bits read are kept.
///
/// # Examples
///
/// ```
/// use approx_collections::bits::n_significant_bits;
///
/// assert_eq!(n_significant_bits(&[0b0000_0001, 0b1000_0001], 9), 0b11);
/// assert_eq!(n_significant_bits(&[0b0000_0001, 0b1000_0001], 10), 0b110);
/// ```
pub fn n_significant_bits(bytes: &[u8], n: usize) -> u64 {
    let end = n.min(bytes.len() * 8);
    (0..end).fold(0, |acc, index| (acc << 1) | u64::from(bit_at(bytes, index)))
}

/// Returns the distance from bit `start` to the next set bit, counting the set bit itself. If
/// there is no set bit at or after `start`, the number of remaining bits is returned.
///
/// # Examples
///
/// ```
/// use approx_collections::bits::distance_to_next_one;
///
/// assert_eq!(distance_to_next_one(&[0b0000_0001], 0), 8);
/// assert_eq!(distance_to_next_one(&[0b0001_0011], 0), 4);
/// assert_eq!(distance_to_next_one(&[0b0000_0000, 0b0000_0000], 4), 12);
/// ```
pub fn distance_to_next_one(bytes: &[u8], start: usize) -> usize {
    let total = bytes.len() * 8;
    (start..total)
        .position(|index| bit_at(bytes, index) == 1)
        .map_or_else(|| total.saturating_sub(start), |position| position + 1)
}

/// Reverses the order of the bits in `byte`.
///
/// # Examples
///
/// ```
/// use approx_collections::bits::reverse_byte;
///
/// assert_eq!(reverse_byte(0b1100_0000), 0b0000_0011);
/// ```
#[inline]
pub fn reverse_byte(byte: u8) -> u8 {
    byte.reverse_bits()
}

/// Returns the harmonic mean of `values`, or `0.0` when `values` is empty.
pub fn harmonic_mean<T>(values: &[T]) -> f64
where
    T: Copy + Into<f64>,
{
    if values.is_empty() {
        return 0.0;
    }
    let inverse_sum = values
        .iter()
        .map(|value| {
            let value: f64 = (*value).into();
            1.0 / value
        })
        .sum::<f64>();
    values.len() as f64 / inverse_sum
}

/// Returns the smallest `floor(values.len() * fraction)` values in ascending order.
///
/// # Examples
///
/// ```
/// use approx_collections::bits::smallest_fraction;
///
/// assert_eq!(smallest_fraction(&[6, 1, 5, 2, 4, 3], 0.5), vec![1, 2, 3]);
/// ```
pub fn smallest_fraction<T>(values: &[T], fraction: f64) -> Vec<T>
where
    T: Copy + Ord,
{
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.truncate((values.len() as f64 * fraction).floor() as usize);
    sorted
}

#[cfg(test)]
mod tests {
    use super::{
        bit_at, distance_to_next_one, harmonic_mean, n_significant_bits, reverse_byte,
        smallest_fraction,
    };
    use test_case::test_case;

    #[test]
    fn test_bit_at() {
        let bytes = [0b1000_0001];
        assert_eq!(bit_at(&bytes, 0), 1);
        assert_eq!(bit_at(&bytes, 1), 0);
        assert_eq!(bit_at(&bytes, 7), 1);
    }

    #[test_case(&[0b0000_0001], 0 => 8)]
    #[test_case(&[0b0000_0001], 1 => 7)]
    #[test_case(&[0b0000_0001], 6 => 2)]
    #[test_case(&[0b0000_0001], 7 => 1)]
    #[test_case(&[0b0001_0011], 0 => 4)]
    #[test_case(&[0b0001_0011], 7 => 1)]
    #[test_case(&[0b0000_0000, 0b0000_0001], 0 => 16)]
    #[test_case(&[0b0000_0000, 0b0000_0001], 15 => 1)]
    fn test_distance_to_next_one(bytes: &[u8], start: usize) -> usize {
        distance_to_next_one(bytes, start)
    }

    #[test]
    fn test_distance_to_next_one_without_one() {
        assert_eq!(distance_to_next_one(&[0, 0], 0), 16);
        assert_eq!(distance_to_next_one(&[0, 0], 10), 6);
        assert_eq!(distance_to_next_one(&[0, 0], 16), 0);
        assert_eq!(distance_to_next_one(&[0, 0], 20), 0);
    }

    #[test_case(&[0b0100_0001], 1 => 0)]
    #[test_case(&[0b0100_0001], 2 => 1)]
    #[test_case(&[0b0100_0001], 3 => 2)]
    #[test_case(&[0b0000_0001, 0b1000_0001], 8 => 1)]
    #[test_case(&[0b0000_0001, 0b1000_0001], 9 => 3)]
    #[test_case(&[0b0000_0001, 0b1000_0001], 10 => 6)]
    #[test_case(&[0b1111_1111], 0 => 0)]
    #[test_case(&[0b1111_1111], 64 => 255)]
    fn test_n_significant_bits(bytes: &[u8], n: usize) -> u64 {
        n_significant_bits(bytes, n)
    }

    #[test]
    fn test_n_significant_bits_full_word() {
        let bytes = [0xFF; 8];
        assert_eq!(n_significant_bits(&bytes, 64), u64::max_value());
    }

    #[test]
    fn test_reverse_byte() {
        assert_eq!(reverse_byte(0b1000_0000), 0b0000_0001);
        assert_eq!(reverse_byte(0b1100_0000), 0b0000_0011);
        assert_eq!(reverse_byte(0b1110_0000), 0b0000_0111);
        assert_eq!(reverse_byte(0b1111_0000), 0b0000_1111);
        assert_eq!(reverse_byte(0b1111_1000), 0b0001_1111);
        assert_eq!(reverse_byte(0b1111_1100), 0b0011_1111);
        assert_eq!(reverse_byte(0b1111_1110), 0b0111_1111);
    }

    #[test]
    fn test_harmonic_mean() {
        assert!((harmonic_mean(&[1u8, 4, 4]) - 2.0).abs() < 1e-12);
        assert!((harmonic_mean(&[1u8, 4, 4, 10]) - 2.5).abs() < 1e-12);
        assert!(harmonic_mean::<u8>(&[]).abs() < std::f64::EPSILON);
    }

    #[test]
    fn test_smallest_fraction() {
        assert_eq!(smallest_fraction(&[1, 2, 3, 4, 5, 6], 0.5), vec![1, 2, 3]);
        assert_eq!(smallest_fraction(&[8, 7, 6, 5, 4, 3, 2, 1], 0.25), vec![1, 2]);
        assert_eq!(smallest_fraction(&[3, 1, 2], 0.0), Vec::<i32>::new());
    }
}
