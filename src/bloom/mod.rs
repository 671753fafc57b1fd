//! Space-efficient probabilistic data structure for approximate membership queries in a set.

mod bloom_filter;

pub use self::bloom_filter::BloomFilter;
pub use self::bloom_filter::{DEFAULT_BIT_COUNT, DEFAULT_HASH_COUNT, MIN_HASH_LEN};
