//! Precision modes: the lane width an instruction computes at

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{Result, SimError};

/// Narrowest supported lane width
pub const SMALLEST_MODE_BITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
  Int8,
  Int16,
  Int32,
}

impl Mode {
  pub const ALL: [Mode; 3] = [Mode::Int8, Mode::Int16, Mode::Int32];

  /// Encoded mode field value (`log2(width / 8)`)
  pub fn code(self) -> u64 {
    match self {
      Mode::Int8 => 0,
      Mode::Int16 => 1,
      Mode::Int32 => 2,
    }
  }

  pub fn from_code(code: u64) -> Result<Self> {
    match code {
      0 => Ok(Mode::Int8),
      1 => Ok(Mode::Int16),
      2 => Ok(Mode::Int32),
      other => Err(SimError::UnknownOpcode {
        unit: "mode",
        opcode: other,
        value: 0,
      }),
    }
  }

  pub fn bitwidth(self) -> usize {
    bitwidth_for_code(self.code())
  }

  pub fn from_bitwidth(width: usize) -> Result<Self> {
    Self::from_code(code_for_bitwidth(width) as u64)
  }

  pub fn token(self) -> &'static str {
    match self {
      Mode::Int8 => "INT8",
      Mode::Int16 => "INT16",
      Mode::Int32 => "INT32",
    }
  }
}

/// Width to mode code: `ceil(log2(width / 8))`
pub fn code_for_bitwidth(width: usize) -> u32 {
  ceil_log2((width + SMALLEST_MODE_BITS - 1) / SMALLEST_MODE_BITS)
}

/// Mode code to width: `8 * 2^code`
pub fn bitwidth_for_code(code: u64) -> usize {
  SMALLEST_MODE_BITS << code
}

/// `ceil(log2(value))`, with `ceil_log2(0) == ceil_log2(1) == 0`
pub fn ceil_log2(value: usize) -> u32 {
  if value <= 1 {
    0
  } else {
    usize::BITS - (value - 1).leading_zeros()
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.token())
  }
}

impl FromStr for Mode {
  type Err = SimError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_uppercase().as_str() {
      "INT8" => Ok(Mode::Int8),
      "INT16" => Ok(Mode::Int16),
      "INT32" => Ok(Mode::Int32),
      other => Err(SimError::config(format!("datatype \"{}\" not recognized", other))),
    }
  }
}
