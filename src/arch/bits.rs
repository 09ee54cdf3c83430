//! Fixed-width two's-complement values
//!
//! Every instruction field, memory word, latch and lane in the model is a
//! `Bits`. Bit 0 is the most significant bit, so `concat` places the first
//! part in the high bits and `cut` returns lanes starting from the high end.

use bitvec::prelude::*;
use std::fmt;

use super::error::{Result, SimError};

type Store = BitVec<u8, Msb0>;

/// Width of the widest lane that can be viewed as a native integer
pub const MAX_INT_BITS: usize = 128;

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bits {
  bits: Store,
}

impl Bits {
  pub fn zeros(width: usize) -> Self {
    Self {
      bits: Store::repeat(false, width),
    }
  }

  /// Build an unsigned value. Fails if `value` needs more than `width` bits.
  pub fn from_uint(value: u128, width: usize) -> Result<Self> {
    if width < MAX_INT_BITS && value >> width != 0 {
      return Err(range_error(value.to_string(), width, false));
    }
    let mut out = Self::zeros(width);
    write_i128(&mut out.bits, value as i128, false);
    Ok(out)
  }

  /// Build a two's-complement value. Fails if `value` lies outside
  /// `[-2^(width-1), 2^(width-1))`.
  pub fn from_int(value: i128, width: usize) -> Result<Self> {
    if !fits_signed(value, width) {
      return Err(range_error(value.to_string(), width, true));
    }
    let mut out = Self::zeros(width);
    write_i128(&mut out.bits, value, true);
    Ok(out)
  }

  /// Parse a hexadecimal string (optional `0x` prefix, `_` separators).
  /// The digits are read as an unsigned magnitude that must fit `width`.
  pub fn from_hex(text: &str, width: usize) -> Result<Self> {
    let digits: String = text
      .trim()
      .trim_start_matches("0x")
      .trim_start_matches("0X")
      .chars()
      .filter(|c| *c != '_')
      .collect();
    if digits.is_empty() {
      return Err(SimError::layout(format!("empty hex literal `{}`", text)));
    }

    let mut raw = Store::with_capacity(digits.len() * 4);
    for c in digits.chars() {
      let nibble = c
        .to_digit(16)
        .ok_or_else(|| SimError::layout(format!("invalid hex digit `{}` in `{}`", c, text)))?;
      for shift in (0..4).rev() {
        raw.push((nibble >> shift) & 1 == 1);
      }
    }

    let leading = raw.leading_zeros();
    let significant = raw.len() - leading;
    if significant > width {
      return Err(range_error(format!("0x{}", digits), width, false));
    }

    let mut out = Self::zeros(width);
    out.bits[width - significant..].copy_from_bitslice(&raw[leading..]);
    Ok(out)
  }

  /// Read `width` bits from big-endian bytes. The bytes must hold exactly
  /// `ceil(width / 8)` entries; the padding bits at the front must be zero.
  pub fn from_bytes(bytes: &[u8], width: usize) -> Result<Self> {
    let expected = byte_len(width);
    if bytes.len() != expected {
      return Err(SimError::layout(format!(
        "{} bytes supplied for a {}-bit word (expected {})",
        bytes.len(),
        width,
        expected
      )));
    }
    let raw = Store::from_slice(bytes);
    let pad = raw.len() - width;
    if raw[..pad].any() {
      return Err(SimError::layout(format!("non-zero padding in {}-bit word", width)));
    }
    Ok(Self {
      bits: raw[pad..].to_bitvec(),
    })
  }

  /// Big-endian bytes, left-padded with zeros to a whole number of bytes
  pub fn to_bytes(&self) -> Vec<u8> {
    let pad = byte_len(self.width()) * 8 - self.width();
    let mut raw = Store::repeat(false, pad);
    raw.extend_from_bitslice(&self.bits);
    raw.into_vec()
  }

  pub fn width(&self) -> usize {
    self.bits.len()
  }

  pub fn is_zero(&self) -> bool {
    self.bits.not_any()
  }

  /// Join several values, first part in the most significant position
  pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Bits>) -> Self {
    let mut bits = Store::new();
    for part in parts {
      bits.extend_from_bitslice(&part.bits);
    }
    Self { bits }
  }

  /// `count` copies of `lane`, concatenated
  pub fn repeat(lane: &Bits, count: usize) -> Self {
    Self::concat(std::iter::repeat(lane).take(count))
  }

  /// Bits `[start, start + len)` counted from the most significant end
  pub fn slice(&self, start: usize, len: usize) -> Result<Self> {
    if start + len > self.width() {
      return Err(SimError::layout(format!(
        "slice [{}, {}) outside {}-bit word",
        start,
        start + len,
        self.width()
      )));
    }
    Ok(Self {
      bits: self.bits[start..start + len].to_bitvec(),
    })
  }

  /// The `len` least significant bits
  pub fn low(&self, len: usize) -> Result<Self> {
    if len > self.width() {
      return Err(SimError::layout(format!(
        "cannot take {} low bits of a {}-bit word",
        len,
        self.width()
      )));
    }
    self.slice(self.width() - len, len)
  }

  /// Partition into consecutive `lane_width`-bit lanes, most significant first
  pub fn cut(&self, lane_width: usize) -> Result<Vec<Bits>> {
    if lane_width == 0 || self.width() % lane_width != 0 {
      return Err(SimError::layout(format!(
        "{}-bit word cannot be cut into {}-bit lanes",
        self.width(),
        lane_width
      )));
    }
    Ok(
      self
        .bits
        .chunks(lane_width)
        .map(|chunk| Bits { bits: chunk.to_bitvec() })
        .collect(),
    )
  }

  /// Unsigned integer view
  pub fn uint(&self) -> Result<u128> {
    let width = self.width();
    let head = width.saturating_sub(MAX_INT_BITS);
    if self.bits[..head].any() {
      return Err(SimError::layout(format!("{}-bit value exceeds u128", width)));
    }
    Ok(read_u128(&self.bits[head..]))
  }

  /// Two's-complement integer view
  pub fn int(&self) -> Result<i128> {
    let width = self.width();
    if width == 0 {
      return Ok(0);
    }
    let negative = self.bits[0];
    if width > MAX_INT_BITS {
      // every bit above the low 127 must repeat the sign
      let head = &self.bits[..=width - MAX_INT_BITS];
      if (negative && !head.all()) || (!negative && head.any()) {
        return Err(SimError::layout(format!("{}-bit value exceeds i128", width)));
      }
      return Ok(read_u128(&self.bits[width - MAX_INT_BITS..]) as i128);
    }
    let magnitude = read_u128(&self.bits);
    if negative && width < MAX_INT_BITS {
      Ok((magnitude | (!0u128 << width)) as i128)
    } else {
      Ok(magnitude as i128)
    }
  }

  pub(crate) fn as_bitslice(&self) -> &BitSlice<u8, Msb0> {
    &self.bits
  }

  pub(crate) fn as_mut_bitslice(&mut self) -> &mut BitSlice<u8, Msb0> {
    &mut self.bits
  }
}

impl fmt::Display for Bits {
  /// Hex with one digit per started nibble, e.g. `0xff880015`
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let digits = (self.width() + 3) / 4;
    let mut padded = Store::repeat(false, digits * 4 - self.width());
    padded.extend_from_bitslice(&self.bits);
    write!(f, "0x")?;
    for nibble in padded.chunks(4) {
      write!(f, "{:x}", read_u128(nibble))?;
    }
    Ok(())
  }
}

impl fmt::Debug for Bits {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Bits({}'{})", self.width(), self)
  }
}

// ------------------------------------------------------------
// Helpers shared with the instruction field accessors
// ------------------------------------------------------------

pub(crate) fn byte_len(width: usize) -> usize {
  (width + 7) / 8
}

pub(crate) fn fits_signed(value: i128, width: usize) -> bool {
  match width {
    0 => value == 0,
    w if w >= MAX_INT_BITS => true,
    w => {
      let bound = 1i128 << (w - 1);
      (-bound..bound).contains(&value)
    },
  }
}

/// Fold up to 128 bits, most significant first
pub(crate) fn read_u128(bits: &BitSlice<u8, Msb0>) -> u128 {
  bits.iter().by_vals().fold(0u128, |acc, bit| (acc << 1) | bit as u128)
}

/// Store the low bits of `value` into `bits`; positions beyond 128 bits are
/// filled with the sign (signed) or zero (unsigned).
pub(crate) fn write_i128(bits: &mut BitSlice<u8, Msb0>, value: i128, signed: bool) {
  let width = bits.len();
  for pos in 0..width {
    let bit = if pos < MAX_INT_BITS {
      (value >> pos) & 1 == 1
    } else {
      signed && value < 0
    };
    bits.set(width - 1 - pos, bit);
  }
}

fn range_error(value: String, width: usize, signed: bool) -> SimError {
  SimError::Range {
    field: "value".to_string(),
    value,
    width,
    signed,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_int_round_trip() {
    let v = Bits::from_int(-15, 16).unwrap();
    assert_eq!(v.to_string(), "0xfff1");
    assert_eq!(v.int().unwrap(), -15);
    assert_eq!(v.uint().unwrap(), 0xfff1);
  }

  #[test]
  fn test_from_int_rejects_misfit() {
    assert!(Bits::from_int(128, 8).is_err());
    assert!(Bits::from_int(-129, 8).is_err());
    assert!(Bits::from_int(-128, 8).is_ok());
    assert!(Bits::from_uint(256, 8).is_err());
    assert!(Bits::from_uint(255, 8).is_ok());
  }

  #[test]
  fn test_concat_and_cut() {
    let word = Bits::concat(&[Bits::from_int(-15, 16).unwrap(), Bits::from_int(7, 16).unwrap()]);
    assert_eq!(word.width(), 32);
    assert_eq!(word.to_string(), "0xfff10007");

    let lanes = word.cut(16).unwrap();
    assert_eq!(lanes.len(), 2);
    assert_eq!(lanes[0].int().unwrap(), -15);
    assert_eq!(lanes[1].int().unwrap(), 7);
    assert!(word.cut(12).is_err());
  }

  #[test]
  fn test_low_keeps_least_significant_bits() {
    let lane = Bits::from_int(-120, 32).unwrap();
    assert_eq!(lane.low(16).unwrap().to_string(), "0xff88");
    assert_eq!(lane.low(16).unwrap().int().unwrap(), -120);
  }

  #[test]
  fn test_wide_words() {
    let wide = Bits::from_int(-2, 256).unwrap();
    assert_eq!(wide.width(), 256);
    assert_eq!(wide.int().unwrap(), -2);
    assert!(wide.uint().is_err());

    let big = Bits::from_uint(260, 256).unwrap();
    assert_eq!(big.uint().unwrap(), 260);
    assert_eq!(big.int().unwrap(), 260);
  }

  #[test]
  fn test_hex_and_bytes() {
    let v = Bits::from_hex("0xABCD", 20).unwrap();
    assert_eq!(v.uint().unwrap(), 0xabcd);
    assert_eq!(v.to_bytes(), vec![0x00, 0xab, 0xcd]);
    assert_eq!(Bits::from_bytes(&v.to_bytes(), 20).unwrap(), v);
    assert!(Bits::from_hex("0x1FFFF", 16).is_err());
    assert!(Bits::from_bytes(&[0xff, 0xff, 0xff], 20).is_err());
  }

  #[test]
  fn test_repeat_broadcasts_lane() {
    let lane = Bits::from_uint(13, 16).unwrap();
    let word = Bits::repeat(&lane, 2);
    assert_eq!(word.uint().unwrap(), (13 << 16) | 13);
  }
}
