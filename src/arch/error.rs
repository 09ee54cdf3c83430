//! Error types for the accelerator model and its host tooling

use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, SimError>;

/// Every failure the simulator can report. None of these are recovered
/// inside the model; they abort the current `execute` call.
#[derive(Debug, Error)]
pub enum SimError {
  /// Mutually inconsistent widths, bad bulk loads, bad config files
  #[error("configuration error: {reason}")]
  Config { reason: String },

  /// A value that cannot be represented in its declared width
  #[error("value {value} does not fit {width}-bit {} field `{field}`", signedness(.signed))]
  Range {
    field: String,
    value: String,
    width: usize,
    signed: bool,
  },

  /// Opcode (or opcode/value pair) outside the ISA tables
  #[error("unrecognized {unit} opcode {opcode} (value {value})")]
  UnknownOpcode { unit: &'static str, opcode: u64, value: u64 },

  /// MAC or RND produced a lane result wider than the accumulator lane.
  /// `value` is the result, or the operands when the result itself is not
  /// representable.
  #[error("{op} overflow in lane {lane}: {value} does not fit {width} bits")]
  Overflow {
    op: &'static str,
    lane: usize,
    value: String,
    width: usize,
  },

  /// A word cannot be viewed the way the caller asked for
  #[error("layout error: {reason}")]
  Layout { reason: String },

  /// Bank address beyond the configured depth
  #[error("address {address} out of range for bank {bank} (depth {depth})")]
  Address { bank: char, address: u64, depth: usize },

  #[error("line {line}: {reason}")]
  Assemble { line: usize, reason: String },

  #[error("malformed image: {reason}")]
  Image { reason: String },

  #[error("I/O error: {source}")]
  Io {
    #[from]
    source: std::io::Error,
  },
}

fn signedness(signed: &bool) -> &'static str {
  if *signed {
    "signed"
  } else {
    "unsigned"
  }
}

impl SimError {
  pub fn config(reason: impl Into<String>) -> Self {
    SimError::Config { reason: reason.into() }
  }

  pub fn layout(reason: impl Into<String>) -> Self {
    SimError::Layout { reason: reason.into() }
  }

  /// Relabel a `Range` error with the name of the field that rejected it.
  /// Other variants pass through untouched.
  pub fn in_field(self, name: &str) -> Self {
    match self {
      SimError::Range { value, width, signed, .. } => SimError::Range {
        field: name.to_string(),
        value,
        width,
        signed,
      },
      other => other,
    }
  }

  /// Attach a source line number to an error raised while assembling
  pub fn at_line(self, line: usize) -> Self {
    match self {
      SimError::Assemble { reason, .. } => SimError::Assemble { line, reason },
      other => SimError::Assemble {
        line,
        reason: other.to_string(),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_in_field_relabels_range() {
    let err = SimError::Range {
      field: "value".to_string(),
      value: "300".to_string(),
      width: 8,
      signed: false,
    }
    .in_field("mema_offset");
    assert_eq!(err.to_string(), "value 300 does not fit 8-bit unsigned field `mema_offset`");
  }

  #[test]
  fn test_at_line_wraps_foreign_errors() {
    let err = SimError::config("bad").at_line(7);
    match err {
      SimError::Assemble { line, reason } => {
        assert_eq!(line, 7);
        assert!(reason.contains("bad"));
      },
      other => panic!("unexpected error {:?}", other),
    }
  }
}
