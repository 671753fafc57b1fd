use crate::bit_field::BitField;
use crate::bits::bit_at;
use crate::error::{Error, Result};
use crate::hash::{ByteHasher, SipByteHasher};
use log::debug;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::collections::HashMap;

/// The number of bits in a vector produced by [`SimHash::with_hasher`].
pub const DEFAULT_VECTOR_LEN: usize = 64;

const PUNCTUATION: &[char] = &[
    '.', ',', '/', '#', '!', '$', '%', '^', '&', '*', ';', ':', '{', '}', '=', '-', '_', '`', '~',
    '(', ')',
];

/// `SimHash` is a locality sensitive hashing scheme. If two texts `t1` and `t2` are similar,
/// `SimHash` will generate vectors for `t1` and `t2` that have a small Hamming distance between
/// them.
///
/// A text is split into lowercase tokens with punctuation removed. Every distinct token is hashed,
/// and each of the first `vector_len` bits of its hash votes for a one or a zero in the matching
/// position of the vector, weighted by how often the token occurs.
///
/// # Examples
///
/// ```
/// use approx_collections::hash::SipByteHasher;
/// use approx_collections::similarity::SimHash;
///
/// let sim_hash = SimHash::with_hasher(SipByteHasher::from_seed(0, 0))?;
///
/// let vector1 = sim_hash.vector("the cat sat on a mat");
/// let vector2 = sim_hash.vector("The cat sat on a mat!");
///
/// assert_eq!(vector1, vector2);
/// assert_eq!(SimHash::hamming_distance(&vector1, &vector2)?, 0);
/// # Ok::<(), approx_collections::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct SimHash<H = SipByteHasher> {
    hasher: H,
    vector_len: usize,
}

impl SimHash {
    /// Constructs a new `SimHash` producing 64-bit vectors with a randomly seeded
    /// `SipByteHasher`.
    pub fn from_entropy() -> Self {
        SimHash {
            hasher: SipByteHasher::from_entropy(),
            vector_len: DEFAULT_VECTOR_LEN,
        }
    }

    /// Splits `text` into lowercase tokens with punctuation removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::similarity::SimHash;
    ///
    /// assert_eq!(SimHash::tokenize("Hello, (big)  world!"), vec!["hello", "big", "world"]);
    /// ```
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .replace(PUNCTUATION, "")
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    /// Returns the number of positions at which `vector1` and `vector2` differ.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleShape`] if the vectors have different lengths.
    pub fn hamming_distance(vector1: &BitField, vector2: &BitField) -> Result<usize> {
        if vector1.len() != vector2.len() {
            return Err(Error::incompatible_shape(format!(
                "cannot compare vectors of {} and {} bits",
                vector1.len(),
                vector2.len()
            )));
        }
        Ok(vector1
            .as_bytes()
            .iter()
            .zip(vector2.as_bytes())
            .map(|(byte1, byte2)| (byte1 ^ byte2).count_ones() as usize)
            .sum())
    }
}

impl<H> SimHash<H>
where
    H: ByteHasher,
{
    /// Constructs a new `SimHash` producing vectors of `vector_len` bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `vector_len` is zero or `hasher` produces fewer than
    /// `vector_len` bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::{Sip128ByteHasher, SipByteHasher};
    /// use approx_collections::similarity::SimHash;
    ///
    /// assert!(SimHash::new(Sip128ByteHasher::from_seed(0, 0), 128).is_ok());
    /// assert!(SimHash::new(SipByteHasher::from_seed(0, 0), 128).is_err());
    /// ```
    pub fn new(hasher: H, vector_len: usize) -> Result<Self> {
        if vector_len == 0 {
            return Err(Error::invalid_argument("vector length must be positive"));
        }
        let hash_bits = hasher.output_len() * 8;
        if hash_bits < vector_len {
            return Err(Error::invalid_argument(format!(
                "hash function must produce at least {} bits, got {}",
                vector_len, hash_bits
            )));
        }
        debug!("created simhash with {}-bit vectors", vector_len);
        Ok(SimHash { hasher, vector_len })
    }

    /// Constructs a new `SimHash` producing 64-bit vectors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `hasher` produces fewer than 64 bits.
    pub fn with_hasher(hasher: H) -> Result<Self> {
        Self::new(hasher, DEFAULT_VECTOR_LEN)
    }

    /// Returns the similarity vector of `text`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::similarity::SimHash;
    ///
    /// let sim_hash = SimHash::with_hasher(SipByteHasher::from_seed(0, 0))?;
    /// let vector = sim_hash.vector("hello world");
    ///
    /// assert_eq!(vector.len(), 64);
    /// assert_eq!(vector.as_bytes().len(), 8);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn vector(&self, text: &str) -> BitField {
        let mut token_counts: HashMap<String, i64> = HashMap::new();
        for token in SimHash::tokenize(text) {
            *token_counts.entry(token).or_insert(0) += 1;
        }

        let mut weights = vec![0i64; self.vector_len];
        for (token, count) in &token_counts {
            let hash = self.hasher.hash(token.as_bytes());
            for (index, weight) in weights.iter_mut().enumerate().take(hash.len() * 8) {
                if bit_at(&hash, index) == 1 {
                    *weight += count;
                } else {
                    *weight -= count;
                }
            }
        }

        weights.iter().map(|weight| *weight > 0).collect()
    }

    /// Returns the number of bits in the vectors produced by the `SimHash`.
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    /// Returns a reference to the `SimHash`'s hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

impl Default for SimHash {
    fn default() -> SimHash {
        SimHash::from_entropy()
    }
}
