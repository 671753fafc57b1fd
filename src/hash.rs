//! Byte hash functions consumed by the collections.
//!
//! Every collection is driven by a [`ByteHasher`]: a deterministic function from a byte slice to a
//! fixed-length byte buffer. Any `Fn(&[u8]) -> Vec<u8>` closure is a `ByteHasher`, and the crate
//! ships two seeded SipHash implementations for callers that do not bring their own.

use byteorder::{BigEndian, ByteOrder};
use rand::Rng;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use siphasher::sip::SipHasher;
use siphasher::sip128::{Hasher128, SipHasher as SipHasher128};
use std::hash::Hasher;

/// A deterministic hash function from bytes to a fixed-length byte buffer.
///
/// The length of the output must not depend on the input. Collections probe it once at
/// construction through [`ByteHasher::output_len`] and rely on it afterwards.
///
/// # Examples
///
/// ```
/// use approx_collections::hash::ByteHasher;
///
/// let hasher = |bytes: &[u8]| -> Vec<u8> {
///     let mut ret = bytes.to_vec();
///     ret.resize(4, 0);
///     ret
/// };
/// assert_eq!(hasher.hash(b"ab"), vec![b'a', b'b', 0, 0]);
/// assert_eq!(hasher.output_len(), 4);
/// ```
pub trait ByteHasher {
    /// Hashes `bytes` into a fixed-length buffer.
    fn hash(&self, bytes: &[u8]) -> Vec<u8>;

    /// Returns the number of bytes produced by [`ByteHasher::hash`].
    fn output_len(&self) -> usize {
        self.hash(b"test").len()
    }
}

impl<F> ByteHasher for F
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        self(bytes)
    }
}

/// SipHash-2-4 with 64-bit output, encoded big-endian into 8 bytes.
///
/// # Examples
///
/// ```
/// use approx_collections::hash::{ByteHasher, SipByteHasher};
///
/// let hasher = SipByteHasher::from_seed(0, 0);
/// assert_eq!(hasher.output_len(), 8);
/// assert_eq!(hasher.hash(b"foo"), hasher.hash(b"foo"));
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SipByteHasher {
    k0: u64,
    k1: u64,
}

impl SipByteHasher {
    /// Constructs a new `SipByteHasher` that uses the thread-local RNG to seed itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    ///
    /// let hasher = SipByteHasher::from_entropy();
    /// ```
    pub fn from_entropy() -> Self {
        let mut rng = rand::thread_rng();
        Self::from_seed(rng.gen(), rng.gen())
    }

    /// Constructs a new `SipByteHasher` that is seeded with the given keys.
    pub fn from_seed(k0: u64, k1: u64) -> Self {
        SipByteHasher { k0, k1 }
    }

    /// Returns the keys the hasher was seeded with.
    pub fn keys(&self) -> (u64, u64) {
        (self.k0, self.k1)
    }
}

impl ByteHasher for SipByteHasher {
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        let mut hasher = SipHasher::new_with_keys(self.k0, self.k1);
        hasher.write(bytes);
        let mut ret = vec![0; 8];
        BigEndian::write_u64(&mut ret, hasher.finish());
        ret
    }

    fn output_len(&self) -> usize {
        8
    }
}

/// SipHash-2-4 with 128-bit output, encoded big-endian into 16 bytes.
///
/// Useful when a collection needs more hash bits than [`SipByteHasher`] provides, such as a
/// `SimHash` with a 128-bit vector.
///
/// # Examples
///
/// ```
/// use approx_collections::hash::{ByteHasher, Sip128ByteHasher};
///
/// let hasher = Sip128ByteHasher::from_seed(0, 0);
/// assert_eq!(hasher.hash(b"foo").len(), 16);
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sip128ByteHasher {
    k0: u64,
    k1: u64,
}

impl Sip128ByteHasher {
    /// Constructs a new `Sip128ByteHasher` that uses the thread-local RNG to seed itself.
    pub fn from_entropy() -> Self {
        let mut rng = rand::thread_rng();
        Self::from_seed(rng.gen(), rng.gen())
    }

    /// Constructs a new `Sip128ByteHasher` that is seeded with the given keys.
    pub fn from_seed(k0: u64, k1: u64) -> Self {
        Sip128ByteHasher { k0, k1 }
    }

    /// Returns the keys the hasher was seeded with.
    pub fn keys(&self) -> (u64, u64) {
        (self.k0, self.k1)
    }
}

impl ByteHasher for Sip128ByteHasher {
    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        let mut hasher = SipHasher128::new_with_keys(self.k0, self.k1);
        hasher.write(bytes);
        let hash = hasher.finish128();
        let mut ret = vec![0; 16];
        BigEndian::write_u64(&mut ret[..8], hash.h1);
        BigEndian::write_u64(&mut ret[8..], hash.h2);
        ret
    }

    fn output_len(&self) -> usize {
        16
    }
}
