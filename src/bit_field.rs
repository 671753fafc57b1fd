//! Fixed-length list of bits packed most significant bit first.

use crate::bits::{bit_at, reverse_byte};
use crate::error::{Error, Result};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use std::convert::TryFrom;
use std::fmt;
use std::iter::FromIterator;
use std::mem;
use std::ops::{Index, Range};
use std::str::FromStr;

/// A fixed-length list of bits implemented using a `Vec<u8>`.
///
/// Bit `0` is the most significant bit of the first byte, so the raw bytes of a `BitField` can be
/// exchanged with other systems that use the same layout. The number of set bits is maintained on
/// every write and is available in constant time.
///
/// # Examples
///
/// ```
/// use approx_collections::BitField;
///
/// let mut field = BitField::new(10);
///
/// field.set(0, true)?;
/// field.set(9, true)?;
/// assert_eq!(field.as_bytes(), &[0b1000_0000, 0b0100_0000]);
/// assert_eq!(field.count_ones(), 2);
///
/// let field = BitField::from_bytes(&[0b1100_0001]);
/// assert_eq!(
///     field.iter().collect::<Vec<bool>>(),
///     vec![true, true, false, false, false, false, false, true],
/// );
/// # Ok::<(), approx_collections::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(crate = "serde_crate", try_from = "RawBitField")
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitField {
    blocks: Vec<u8>,
    len: usize,
    one_count: usize,
}

const BLOCK_BIT_COUNT: usize = mem::size_of::<u8>() * 8;

/// The serialized fields of a `BitField`, checked for consistency before use.
#[cfg(feature = "serde")]
#[derive(Deserialize, Serialize)]
#[serde(crate = "serde_crate")]
struct RawBitField {
    blocks: Vec<u8>,
    len: usize,
    one_count: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<RawBitField> for BitField {
    type Error = Error;

    fn try_from(raw: RawBitField) -> Result<Self> {
        let block_count = BitField::get_block_count(raw.len);
        if raw.blocks.len() != block_count {
            return Err(Error::invalid_argument(format!(
                "{} bits need {} bytes, got {}",
                raw.len,
                block_count,
                raw.blocks.len()
            )));
        }
        let mut bit_field = BitField {
            blocks: raw.blocks,
            len: raw.len,
            one_count: 0,
        };
        let blocks = bit_field.blocks.clone();
        bit_field.clear_extra_bits();
        if bit_field.blocks != blocks {
            return Err(Error::invalid_argument("bits past the length are set"));
        }
        bit_field.one_count = bit_field
            .blocks
            .iter()
            .map(|block| block.count_ones() as usize)
            .sum();
        if bit_field.one_count != raw.one_count {
            return Err(Error::invalid_argument(format!(
                "one count is {}, but {} bits are set",
                raw.one_count, bit_field.one_count
            )));
        }
        Ok(bit_field)
    }
}

impl BitField {
    fn get_block_count(len: usize) -> usize {
        len / BLOCK_BIT_COUNT + usize::from(len % BLOCK_BIT_COUNT != 0)
    }

    fn mask(index: usize) -> u8 {
        0b1000_0000 >> (index % BLOCK_BIT_COUNT)
    }

    fn clear_extra_bits(&mut self) {
        let extra_bits = self.len % BLOCK_BIT_COUNT;
        if extra_bits > 0 {
            if let Some(block) = self.blocks.last_mut() {
                *block &= !0u8 << (BLOCK_BIT_COUNT - extra_bits);
            }
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Constructs a new `BitField` with a certain number of bits. All bits are initialized to
    /// zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let field = BitField::new(5);
    /// assert_eq!(field.iter().collect::<Vec<bool>>(), vec![false; 5]);
    /// assert_eq!(field.as_bytes().len(), 1);
    /// ```
    pub fn new(len: usize) -> Self {
        BitField {
            blocks: vec![0; Self::get_block_count(len)],
            len,
            one_count: 0,
        }
    }

    /// Constructs a `BitField` over a copy of `bytes`. Each byte becomes eight bits, with the most
    /// significant bit of each byte coming first.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let field = BitField::from_bytes(&[0b1100_0001, 0b0000_0001]);
    /// assert_eq!(field.len(), 16);
    /// assert_eq!(field.count_ones(), 4);
    /// assert_eq!(field.get(15), Ok(true));
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }

    /// Returns the underlying bytes of the `BitField`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blocks
    }

    /// Consumes the `BitField`, returning its underlying bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.blocks
    }

    /// Returns the value of the bit at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is not smaller than the length.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::{BitField, Error};
    ///
    /// let field = BitField::from_bytes(&[0b0100_0000]);
    /// assert_eq!(field.get(1), Ok(true));
    /// assert_eq!(field.get(8), Err(Error::IndexOutOfRange { index: 8, len: 8 }));
    /// ```
    pub fn get(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(bit_at(&self.blocks, index) == 1)
    }

    /// Returns the bit at `index % len`, or `false` if the `BitField` has no bits.
    pub(crate) fn get_wrapping(&self, index: usize) -> bool {
        if self.len == 0 {
            return false;
        }
        bit_at(&self.blocks, index % self.len) == 1
    }

    /// Sets the bit at `index` to `bit`. The count of set bits only changes if the bit does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is not smaller than the length.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let mut field = BitField::new(16);
    /// field.set(3, true)?;
    /// field.set(3, true)?;
    /// assert_eq!(field.count_ones(), 1);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn set(&mut self, index: usize, bit: bool) -> Result<()> {
        self.check_index(index)?;
        self.write(index, bit);
        Ok(())
    }

    /// Sets the bit at `index % len` to `bit`. Does nothing if the `BitField` has no bits.
    pub(crate) fn set_wrapping(&mut self, index: usize, bit: bool) {
        if self.len > 0 {
            self.write(index % self.len, bit);
        }
    }

    fn write(&mut self, index: usize, bit: bool) {
        let block_index = index / BLOCK_BIT_COUNT;
        let mask = Self::mask(index);
        let prev = (self.blocks[block_index] & mask) != 0;
        if bit {
            if !prev {
                self.one_count += 1;
            }
            self.blocks[block_index] |= mask;
        } else {
            if prev {
                self.one_count -= 1;
            }
            self.blocks[block_index] &= !mask;
        }
    }

    /// Sets the bit at `index` to `value`, which must be `0` or `1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is neither `0` nor `1`, and
    /// [`Error::IndexOutOfRange`] if `index` is not smaller than the length. The `BitField` is
    /// unchanged on error.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let mut field = BitField::new(8);
    /// field.set_value(0, 1)?;
    /// assert!(field.set_value(1, 2).is_err());
    /// assert_eq!(field.as_bytes(), &[0b1000_0000]);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn set_value(&mut self, index: usize, value: u8) -> Result<()> {
        match value {
            0 => self.set(index, false),
            1 => self.set(index, true),
            _ => Err(Error::invalid_argument(format!(
                "bit value must be 0 or 1, got {}",
                value
            ))),
        }
    }

    /// Sets all bits in the `BitField` to `bit`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let mut field = BitField::new(5);
    /// field.set_all(true);
    /// assert_eq!(field.as_bytes(), &[0b1111_1000]);
    /// assert_eq!(field.count_ones(), 5);
    /// ```
    pub fn set_all(&mut self, bit: bool) {
        let mask = if bit { !0 } else { 0 };
        for block in &mut self.blocks {
            *block = mask;
        }
        self.clear_extra_bits();
        self.one_count = if bit { self.len } else { 0 };
    }

    /// Sets `self` to the union of `self` and `other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleShape`] if the two `BitField`s are of different lengths.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let mut field1 = BitField::from_bytes(&[0b1100_0000]);
    /// let field2 = BitField::from_bytes(&[0b1010_0000]);
    ///
    /// field1.union(&field2)?;
    /// assert_eq!(field1.as_bytes(), &[0b1110_0000]);
    /// assert_eq!(field1.count_ones(), 3);
    /// # Ok::<(), approx_collections::Error>(())
    /// ```
    pub fn union(&mut self, other: &Self) -> Result<()> {
        if self.len != other.len {
            return Err(Error::incompatible_shape(format!(
                "cannot union bit fields of lengths {} and {}",
                self.len, other.len
            )));
        }
        for (x, y) in self.blocks.iter_mut().zip(&other.blocks) {
            *x |= *y;
        }
        self.one_count = self
            .blocks
            .iter()
            .map(|block| block.count_ones() as usize)
            .sum();
        Ok(())
    }

    /// Returns an iterator over the bits of the `BitField` in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let field = BitField::from_bytes(&[0b1010_0000]);
    /// assert_eq!(field.iter().take(3).collect::<Vec<bool>>(), vec![true, false, true]);
    /// ```
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            bit_field: self,
            range: 0..self.len,
        }
    }

    /// Returns `true` if the `BitField` has no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of bits in the `BitField`.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of set bits in the `BitField`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let field = BitField::from_bytes(&[0b1101_0000]);
    /// assert_eq!(field.count_ones(), 3);
    /// ```
    pub fn count_ones(&self) -> usize {
        self.one_count
    }

    /// Returns the number of unset bits in the `BitField`.
    pub fn count_zeros(&self) -> usize {
        self.len - self.one_count
    }

    /// Renders each byte as eight binary digits in bit-reversed order, separated by spaces. With
    /// `with_markers`, every byte is prefixed with `0b`.
    ///
    /// # Examples
    ///
    /// ```
    /// use approx_collections::BitField;
    ///
    /// let field = BitField::from_bytes(&[0b1000_0000, 0b0000_0011]);
    /// assert_eq!(field.to_string_with_markers(true), "0b00000001 0b11000000");
    /// assert_eq!(field.to_string_with_markers(false), "00000001 11000000");
    /// ```
    pub fn to_string_with_markers(&self, with_markers: bool) -> String {
        let marker = if with_markers { "0b" } else { "" };
        self.blocks
            .iter()
            .map(|block| format!("{}{:08b}", marker, reverse_byte(*block)))
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl From<Vec<u8>> for BitField {
    fn from(blocks: Vec<u8>) -> Self {
        let one_count = blocks.iter().map(|block| block.count_ones() as usize).sum();
        BitField {
            len: blocks.len() * BLOCK_BIT_COUNT,
            blocks,
            one_count,
        }
    }
}

impl FromIterator<bool> for BitField {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut blocks = Vec::new();
        let mut len = 0;
        let mut one_count = 0;
        for bit in iter {
            if len % BLOCK_BIT_COUNT == 0 {
                blocks.push(0);
            }
            if bit {
                if let Some(block) = blocks.last_mut() {
                    *block |= Self::mask(len);
                }
                one_count += 1;
            }
            len += 1;
        }
        BitField {
            blocks,
            len,
            one_count,
        }
    }
}

impl fmt::Display for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with_markers(false))
    }
}

impl FromStr for BitField {
    type Err = Error;

    /// Parses the rendering produced by [`BitField::to_string_with_markers`], with or without
    /// markers.
    fn from_str(s: &str) -> Result<Self> {
        s.split_whitespace()
            .map(|token| {
                let digits = token.strip_prefix("0b").unwrap_or(token);
                if digits.len() != BLOCK_BIT_COUNT || !digits.bytes().all(|c| c == b'0' || c == b'1')
                {
                    return Err(Error::invalid_argument(format!(
                        "expected {} binary digits, got {:?}",
                        BLOCK_BIT_COUNT, token
                    )));
                }
                u8::from_str_radix(digits, 2)
                    .map(reverse_byte)
                    .map_err(|err| Error::invalid_argument(err.to_string()))
            })
            .collect::<Result<Vec<u8>>>()
            .map(BitField::from)
    }
}

/// A borrowing iterator for `BitField`.
///
/// This iterator yields bits in order.
pub struct Iter<'a> {
    bit_field: &'a BitField,
    range: Range<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        self.range
            .next()
            .map(|index| bit_at(&self.bit_field.blocks, index) == 1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> IntoIterator for &'a BitField {
    type IntoIter = Iter<'a>;
    type Item = bool;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An owning iterator for `BitField`.
///
/// This iterator yields bits in order.
pub struct IntoIter {
    bit_field: BitField,
    range: Range<usize>,
}

impl Iterator for IntoIter {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        self.range
            .next()
            .map(|index| bit_at(&self.bit_field.blocks, index) == 1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl ExactSizeIterator for IntoIter {}

impl IntoIterator for BitField {
    type IntoIter = IntoIter;
    type Item = bool;

    fn into_iter(self) -> Self::IntoIter {
        let len = self.len;
        IntoIter {
            bit_field: self,
            range: 0..len,
        }
    }
}

static TRUE: bool = true;
static FALSE: bool = false;

impl Index<usize> for BitField {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        match self.get(index) {
            Ok(true) => &TRUE,
            Ok(false) => &FALSE,
            Err(err) => panic!("{}", err),
        }
    }
}
