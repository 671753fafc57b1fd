//! # approx-collections
//!
//! `approx-collections` contains compact collections driven by caller-supplied byte hash
//! functions. The probabilistic ones trade a bounded amount of error for running time or memory,
//! which makes them useful for big data and streaming applications.
//!
//!  - [`BitField`]: a fixed-length list of bits packed most significant bit first, with raw byte
//!    import and export.
//!  - [`BloomFilter`]: approximate set membership using enhanced double hashing over a
//!    `BitField`.
//!  - [`HyperLogLog`]: distinct-count estimation from the longest zero runs seen per bucket.
//!  - [`SimHash`]: locality sensitive hashing of text into similarity vectors.
//!  - [`DoubleHashMap`]: a fixed-capacity open-addressing map probed with double hashing.
//!
//! Every collection hashes through the [`ByteHasher`] trait, which is implemented for any
//! `Fn(&[u8]) -> Vec<u8>` and by the seeded SipHash hashers in [`hash`].
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! approx-collections = "*"
//! ```
//!
//! Enable the `serde` feature to derive `Serialize` and `Deserialize` for every collection.
//!
//! ## Example
//!
//! ```
//! use approx_collections::hash::SipByteHasher;
//! use approx_collections::{BloomFilter, HyperLogLog};
//!
//! let mut filter = BloomFilter::from_item_count(SipByteHasher::from_seed(0, 0), 1000, 0.01)?;
//! let mut hll = HyperLogLog::new(14, SipByteHasher::from_seed(0, 0))?;
//!
//! for word in "the cat sat on the mat".split(' ') {
//!     filter.insert(word);
//!     hll.insert(word);
//! }
//!
//! assert!(filter.contains("cat"));
//! assert!((hll.estimate().round() - 5.0).abs() < std::f64::EPSILON);
//! # Ok::<(), approx_collections::Error>(())
//! ```
//!
//! ## References
//!
//!  - [HyperLogLog: the analysis of a near-optimal cardinality estimation algorithm](http://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf)
//!  > Flajolet, Philippe, Éric Fusy, Olivier Gandouet, and Frédéric Meunier. 2007. “Hyperloglog: The Analysis of a Near-Optimal Cardinality Estimation Algorithm.” In *IN Aofa ’07: PROCEEDINGS of the 2007 International Conference on Analysis of Algorithms*.
//!  - [Less hashing, same performance: Building a better Bloom filter](https://dl.acm.org/citation.cfm?id=1400125)
//!  > Kirsch, Adam, and Michael Mitzenmacher. 2008. “Less Hashing, Same Performance: Building a Better Bloom Filter.” *Random Struct. Algorithms* 33 (2). New York, NY, USA: John Wiley & Sons, Inc.: 187–218. doi:[10.1002/rsa.v33:2](https://doi.org/10.1002/rsa.v33:2).
//!  - [Similarity estimation techniques from rounding algorithms](https://dl.acm.org/citation.cfm?id=509965)
//!  > Charikar, Moses S. 2002. “Similarity Estimation Techniques from Rounding Algorithms.” In *Proceedings of the Thiry-Fourth Annual Acm Symposium on Theory of Computing*, 380–88. STOC ’02. New York, NY, USA: ACM. doi:[10.1145/509907.509965](https://doi.org/10.1145/509907.509965).

#![warn(missing_docs)]

pub mod bit_field;
pub mod bits;
pub mod bloom;
pub mod double_hash_map;
mod error;
pub mod hash;
pub mod hyperloglog;
pub mod similarity;

pub use crate::bit_field::BitField;
pub use crate::bloom::BloomFilter;
pub use crate::double_hash_map::DoubleHashMap;
pub use crate::error::{Error, Result};
pub use crate::hash::{ByteHasher, Sip128ByteHasher, SipByteHasher};
pub use crate::hyperloglog::HyperLogLog;
pub use crate::similarity::SimHash;
