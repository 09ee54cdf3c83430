//! Bit-field layout shared by every instruction record

use crate::arch::bits::{read_u128, write_i128, Bits};
use crate::arch::error::{Result, SimError};

/// Widest field an instruction record may declare
pub const MAX_FIELD_BITS: usize = 64;

/// A named bit range inside a packed word. `offset` counts from the most
/// significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
  pub name: &'static str,
  pub offset: usize,
  pub width: usize,
}

impl Field {
  pub fn end(&self) -> usize {
    self.offset + self.width
  }

  pub fn read(&self, word: &Bits) -> u64 {
    read_u128(&word.as_bitslice()[self.offset..self.end()]) as u64
  }

  /// Masked write of one field; siblings are left untouched
  pub fn write(&self, word: &mut Bits, value: u64) -> Result<()> {
    if self.width < MAX_FIELD_BITS && value >> self.width != 0 {
      return Err(SimError::Range {
        field: self.name.to_string(),
        value: value.to_string(),
        width: self.width,
        signed: false,
      });
    }
    let range = self.offset..self.end();
    write_i128(&mut word.as_mut_bitslice()[range], value as i128, false);
    Ok(())
  }
}

/// Lay fields out in declaration order; each offset is the running sum of
/// the widths before it.
pub fn layout<const N: usize>(fields: [(&'static str, usize); N]) -> [Field; N] {
  let mut offset = 0;
  fields.map(|(name, width)| {
    let field = Field { name, offset, width };
    offset += width;
    field
  })
}

pub(crate) fn check_widths(record: &str, fields: &[Field]) -> Result<()> {
  for field in fields {
    if field.width == 0 || field.width > MAX_FIELD_BITS {
      return Err(SimError::config(format!(
        "{} field `{}` is {} bits wide (allowed 1..={})",
        record, field.name, field.width, MAX_FIELD_BITS
      )));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_layout_running_offsets() {
    let [a, b, c] = layout([("a", 2), ("b", 3), ("c", 10)]);
    assert_eq!((a.offset, a.width), (0, 2));
    assert_eq!((b.offset, b.width), (2, 3));
    assert_eq!((c.offset, c.width), (5, 10));
  }

  #[test]
  fn test_write_keeps_siblings() {
    let [a, b, c] = layout([("a", 2), ("b", 3), ("c", 10)]);
    let mut word = Bits::zeros(15);
    a.write(&mut word, 3).unwrap();
    c.write(&mut word, 1023).unwrap();
    b.write(&mut word, 5).unwrap();
    b.write(&mut word, 2).unwrap();
    assert_eq!(a.read(&word), 3);
    assert_eq!(b.read(&word), 2);
    assert_eq!(c.read(&word), 1023);

    let err = b.write(&mut word, 8).unwrap_err();
    assert!(err.to_string().contains("`b`"));
    assert_eq!(b.read(&word), 2);
  }
}
