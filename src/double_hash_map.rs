//! Open-addressing hash map with a fixed number of slots and double hashing on collisions.

use crate::error::{Error, Result};
use crate::hash::{ByteHasher, SipByteHasher};
use byteorder::{BigEndian, ByteOrder};
use log::debug;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::mem;

/// The number of slots in a map constructed with [`DoubleHashMap::new`].
pub const DEFAULT_CAPACITY: usize = 1024;
/// The minimum number of bytes a hasher must produce.
pub const MIN_HASH_LEN: usize = 4;

const OFFSET_SUFFIX: &[u8] = b"offset";

#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
enum Slot<K, V> {
    Empty,
    Deleted,
    Occupied(K, V),
}

/// An open-addressing hash map over a fixed array of slots.
///
/// A key is looked up along the probe sequence `(start + offset * i) % capacity` for the first
/// `max(capacity / 4, 1)` values of `i`. `start` is derived from the hash of the key and `offset`
/// from the hash of the key followed by `"offset"`. The map never grows: an insertion that finds
/// no free slot in its probe window fails with [`Error::CapacityExceeded`]. Removed entries leave
/// a marker behind so that the probe sequences of other keys stay intact.
///
/// # Examples
///
/// ```
/// use approx_collections::hash::SipByteHasher;
/// use approx_collections::DoubleHashMap;
///
/// let mut map = DoubleHashMap::new(SipByteHasher::from_seed(0, 0))?;
///
/// assert_eq!(map.insert("hello", "world")?, None);
/// assert_eq!(map.get("hello"), Some(&"world"));
///
/// assert_eq!(map.remove("hello"), Some("world"));
/// assert_eq!(map.get("hello"), None);
/// # Ok::<(), approx_collections::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct DoubleHashMap<K, V, H = SipByteHasher> {
    slots: Vec<Slot<K, V>>,
    len: usize,
    hasher: H,
}

impl<K, V> DoubleHashMap<K, V>
where
    K: AsRef<[u8]> + Eq,
{
    /// Constructs a new, empty `DoubleHashMap` with `capacity` slots, hashing with a randomly
    /// seeded `SipByteHasher`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `capacity` is zero or the slots cannot be allocated.
    pub fn from_entropy(capacity: usize) -> Result<Self> {
        Self::with_capacity(SipByteHasher::from_entropy(), capacity)
    }
}

impl<K, V, H> DoubleHashMap<K, V, H>
where
    K: AsRef<[u8]> + Eq,
    H: ByteHasher,
{
    /// Constructs a new, empty `DoubleHashMap` with 1024 slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `hasher` produces fewer than four bytes.
    pub fn new(hasher: H) -> Result<Self> {
        Self::with_capacity(hasher, DEFAULT_CAPACITY)
    }

    /// Constructs a new, empty `DoubleHashMap` with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `capacity` is zero, if `hasher` produces fewer than
    /// four bytes, or if the slots cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::DoubleHashMap;
    ///
    /// let map = DoubleHashMap::<String, u32>::with_capacity(SipByteHasher::from_seed(0, 0), 64)?;
    /// assert_eq!(map.capacity(), 64);
    /// assert_eq!(map.probe_count(), 16);
    ///
    /// let short_hasher = |bytes: &[u8]| bytes.iter().take(2).cloned().collect::<Vec<u8>>();
    /// assert!(DoubleHashMap::<String, u32, _>::with_capacity(short_hasher, 64).is_err());
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn with_capacity(hasher: H, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_argument("capacity must be positive"));
        }
        let hash_len = hasher.output_len();
        if hash_len < MIN_HASH_LEN {
            return Err(Error::invalid_argument(format!(
                "hash function must produce at least {} bytes, got {}",
                MIN_HASH_LEN, hash_len
            )));
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|err| Error::invalid_argument(format!("cannot allocate slots: {}", err)))?;
        slots.resize_with(capacity, || Slot::Empty);

        debug!("created double hash map with {} slots", capacity);
        Ok(DoubleHashMap {
            slots,
            len: 0,
            hasher,
        })
    }

    fn hash_word(&self, bytes: &[u8]) -> usize {
        let hash = self.hasher.hash(bytes);
        // Hashers shorter than MIN_HASH_LEN are rejected at construction.
        match hash.get(..MIN_HASH_LEN) {
            Some(word) => BigEndian::read_u32(word) as usize % self.slots.len(),
            None => 0,
        }
    }

    /// Returns the slot indices probed for `key`, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::DoubleHashMap;
    ///
    /// let map = DoubleHashMap::<&str, u32>::with_capacity(SipByteHasher::from_seed(0, 0), 64)?;
    /// let indices = map.probe_indices("foo");
    ///
    /// assert_eq!(indices.len(), 16);
    /// assert!(indices.iter().all(|index| *index < 64));
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn probe_indices<Q>(&self, key: &Q) -> Vec<usize>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        let key = key.as_ref();
        let capacity = self.slots.len();
        let start = self.hash_word(key);
        let mut offset_key = Vec::with_capacity(key.len() + OFFSET_SUFFIX.len());
        offset_key.extend_from_slice(key);
        offset_key.extend_from_slice(OFFSET_SUFFIX);
        let offset = match self.hash_word(&offset_key) {
            0 => 1,
            offset => offset,
        };

        let mut index = start;
        (0..self.probe_count())
            .map(|_| {
                let ret = index;
                index = (index + offset) % capacity;
                ret
            })
            .collect()
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: AsRef<[u8]> + Eq + ?Sized,
    {
        for index in self.probe_indices(key) {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Occupied(slot_key, _) if key == slot_key.borrow() => return Some(index),
                _ => {}
            }
        }
        None
    }

    /// Inserts a key-value pair into the map. If the key was already present, its value is
    /// replaced and the old value is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if the key is absent and every slot in its probe window
    /// is taken. The map is unchanged on error.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::DoubleHashMap;
    ///
    /// let mut map = DoubleHashMap::new(SipByteHasher::from_seed(0, 0))?;
    ///
    /// assert_eq!(map.insert("foo", 1)?, None);
    /// assert_eq!(map.insert("foo", 2)?, Some(1));
    /// assert_eq!(map.len(), 1);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let mut free_index = None;
        for index in self.probe_indices(&key) {
            match &mut self.slots[index] {
                Slot::Occupied(slot_key, slot_value) => {
                    if *slot_key == key {
                        return Ok(Some(mem::replace(slot_value, value)));
                    }
                }
                Slot::Deleted => {
                    if free_index.is_none() {
                        free_index = Some(index);
                    }
                }
                Slot::Empty => {
                    if free_index.is_none() {
                        free_index = Some(index);
                    }
                    break;
                }
            }
        }

        match free_index {
            Some(index) => {
                self.slots[index] = Slot::Occupied(key, value);
                self.len += 1;
                Ok(None)
            }
            None => Err(Error::CapacityExceeded(self.probe_count())),
        }
    }

    /// Returns a reference to the value associated with `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: AsRef<[u8]> + Eq + ?Sized,
    {
        self.find(key).and_then(|index| match &self.slots[index] {
            Slot::Occupied(_, value) => Some(value),
            _ => None,
        })
    }

    /// Returns a mutable reference to the value associated with `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: AsRef<[u8]> + Eq + ?Sized,
    {
        let index = self.find(key)?;
        match &mut self.slots[index] {
            Slot::Occupied(_, value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if the map holds a value for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: AsRef<[u8]> + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Removes `key` from the map, returning its value if it was present.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::DoubleHashMap;
    ///
    /// let mut map = DoubleHashMap::new(SipByteHasher::from_seed(0, 0))?;
    /// map.insert("foo", 1)?;
    ///
    /// assert_eq!(map.remove("foo"), Some(1));
    /// assert_eq!(map.remove("foo"), None);
    /// assert!(map.is_empty());
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: AsRef<[u8]> + Eq + ?Sized,
    {
        let index = self.find(key)?;
        match mem::replace(&mut self.slots[index], Slot::Deleted) {
            Slot::Occupied(_, value) => {
                self.len -= 1;
                Some(value)
            }
            slot => {
                self.slots[index] = slot;
                None
            }
        }
    }

    /// Returns the number of probes made for each key, `max(capacity / 4, 1)`.
    pub fn probe_count(&self) -> usize {
        (self.slots.len() / 4).max(1)
    }

    /// Returns a reference to the map's hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

impl<K, V, H> DoubleHashMap<K, V, H> {
    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots in the map.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Removes every entry from the map.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.len = 0;
    }

    /// Returns an iterator over the entries of the map in slot order.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::hash::SipByteHasher;
    /// use approx_collections::DoubleHashMap;
    ///
    /// let mut map = DoubleHashMap::new(SipByteHasher::from_seed(0, 0))?;
    /// map.insert("foo", 1)?;
    /// map.insert("bar", 2)?;
    ///
    /// let mut entries = map.iter().collect::<Vec<_>>();
    /// entries.sort();
    /// assert_eq!(entries, vec![(&"bar", &2), (&"foo", &1)]);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
        }
    }
}

/// A borrowing iterator over the entries of a `DoubleHashMap`.
pub struct Iter<'a, K, V> {
    slots: std::slice::Iter<'a, Slot<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in &mut self.slots {
            if let Slot::Occupied(key, value) = slot {
                return Some((key, value));
            }
        }
        None
    }
}

impl<'a, K, V, H> IntoIterator for &'a DoubleHashMap<K, V, H> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::DoubleHashMap;
    use crate::error::Error;
    use crate::hash::tests::hasher_1;
    use byteorder::{BigEndian, ByteOrder};
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use std::collections::HashMap;

    fn constant_hasher(_: &[u8]) -> Vec<u8> {
        vec![0, 0, 0, 0]
    }

    fn prefix_hasher(bytes: &[u8]) -> Vec<u8> {
        let mut ret: Vec<u8> = bytes.iter().take(4).cloned().collect();
        ret.resize(4, 0);
        ret
    }

    #[test]
    fn test_new() {
        let map = DoubleHashMap::<String, u32>::new(hasher_1()).unwrap();
        assert_eq!(map.capacity(), 1024);
        assert_eq!(map.probe_count(), 256);
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_new_invalid() {
        match DoubleHashMap::<String, u32>::with_capacity(hasher_1(), 0) {
            Err(Error::InvalidArgument(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        let short_hasher = |_: &[u8]| vec![0u8; 3];
        match DoubleHashMap::<String, u32, _>::new(short_hasher) {
            Err(Error::InvalidArgument(_)) => {}
            Err(err) => panic!("unexpected error {:?}", err),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_insert_get() {
        let mut map = DoubleHashMap::new(hasher_1()).unwrap();
        assert_eq!(map.insert("hello", "world"), Ok(None));
        assert_eq!(map.insert("foo", "bar"), Ok(None));

        assert_eq!(map.get("hello"), Some(&"world"));
        assert_eq!(map.get("foo"), Some(&"bar"));
        assert_eq!(map.get("baz"), None);
        assert!(map.contains_key("foo"));
        assert!(!map.contains_key("baz"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_insert_replaces() {
        let mut map = DoubleHashMap::new(hasher_1()).unwrap();
        assert_eq!(map.insert(String::from("hello"), 1), Ok(None));
        assert_eq!(map.insert(String::from("hello"), 2), Ok(Some(1)));
        assert_eq!(map.get("hello"), Some(&2));
        assert_eq!(map.len(), 1);

        *map.get_mut("hello").unwrap() += 1;
        assert_eq!(map.get("hello"), Some(&3));
    }

    #[test]
    fn test_remove() {
        let mut map = DoubleHashMap::new(hasher_1()).unwrap();
        map.insert("hello", "world").unwrap();
        assert_eq!(map.remove("hello"), Some("world"));
        assert_eq!(map.get("hello"), None);
        assert_eq!(map.remove("hello"), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_probe_indices() {
        let map = DoubleHashMap::<&str, u32, _>::with_capacity(prefix_hasher, 64).unwrap();
        let start = BigEndian::read_u32(b"abcd") as usize % 64;
        let offset = BigEndian::read_u32(b"abcd") as usize % 64;
        let expected: Vec<usize> = (0..16).map(|i| (start + offset * i) % 64).collect();
        assert_eq!(map.probe_indices("abcd"), expected);

        let start = BigEndian::read_u32(b"ab\0\0") as usize % 64;
        let offset = BigEndian::read_u32(b"abof") as usize % 64;
        let expected: Vec<usize> = (0..16).map(|i| (start + offset * i) % 64).collect();
        assert_eq!(map.probe_indices("ab"), expected);
    }

    #[test]
    fn test_probe_indices_zero_offset() {
        let map = DoubleHashMap::<&str, u32, _>::with_capacity(constant_hasher, 16).unwrap();
        assert_eq!(map.probe_indices("anything"), vec![0, 1, 2, 3]);

        let map = DoubleHashMap::<&str, u32, _>::with_capacity(constant_hasher, 3).unwrap();
        assert_eq!(map.probe_indices("anything"), vec![0]);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut map = DoubleHashMap::with_capacity(constant_hasher, 16).unwrap();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            assert_eq!(map.insert(*key, i), Ok(None));
        }
        assert_eq!(map.insert("e", 4), Err(Error::CapacityExceeded(4)));
        assert_eq!(map.len(), 4);
        assert_eq!(map.get("e"), None);

        assert_eq!(map.insert("d", 5), Ok(Some(3)));
    }

    #[test]
    fn test_remove_keeps_probe_chain() {
        let mut map = DoubleHashMap::with_capacity(constant_hasher, 16).unwrap();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            map.insert(*key, i).unwrap();
        }

        assert_eq!(map.remove("b"), Some(1));
        assert_eq!(map.get("c"), Some(&2));
        assert_eq!(map.get("d"), Some(&3));

        assert_eq!(map.insert("d", 6), Ok(Some(3)));
        assert_eq!(map.len(), 3);
        assert_eq!(map.insert("e", 4), Ok(None));
        assert_eq!(map.get("e"), Some(&4));
        assert_eq!(map.insert("f", 5), Err(Error::CapacityExceeded(4)));

        let mut entries = map.iter().map(|(key, value)| (*key, *value)).collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, vec![("a", 0), ("c", 2), ("d", 6), ("e", 4)]);
    }

    #[test]
    fn test_clear() {
        let mut map = DoubleHashMap::with_capacity(constant_hasher, 16).unwrap();
        map.insert("a", 1).unwrap();
        map.insert("b", 2).unwrap();
        map.remove("a");
        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            assert_eq!(map.insert(*key, i), Ok(None));
        }
    }

    #[test]
    fn test_random_operations() {
        let mut rng = XorShiftRng::seed_from_u64(10);
        let mut map = DoubleHashMap::with_capacity(hasher_1(), 4093).unwrap();
        let mut expected = HashMap::new();

        for _ in 0..5000 {
            let key = format!("key{}", rng.gen_range(0, 500));
            if rng.gen::<bool>() {
                let value = rng.gen::<u32>();
                assert_eq!(map.insert(key.clone(), value), Ok(expected.insert(key, value)));
            } else {
                assert_eq!(map.remove(key.as_str()), expected.remove(&key));
            }
            assert_eq!(map.len(), expected.len());
        }

        for (key, value) in &expected {
            assert_eq!(map.get(key.as_str()), Some(value));
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de() {
        let mut map = DoubleHashMap::with_capacity(hasher_1(), 64).unwrap();
        map.insert(String::from("foo"), 1).unwrap();
        map.insert(String::from("bar"), 2).unwrap();
        map.remove("bar");

        let serialized_map = bincode::serialize(&map).unwrap();
        let de_map: DoubleHashMap<String, u32> = bincode::deserialize(&serialized_map).unwrap();

        assert_eq!(map, de_map);
        assert_eq!(de_map.get("foo"), Some(&1));
        assert_eq!(de_map.len(), 1);
    }
}
