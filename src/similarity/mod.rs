//! Module for measuring similarities between texts.

mod sim_hash;

pub use self::sim_hash::{SimHash, DEFAULT_VECTOR_LEN};
