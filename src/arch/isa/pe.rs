//! PE sub-instruction: `{opcode, mode, value}`
//!
//! Opcode 0 selects the value-coded group (MAC, NOP, OUT, PASS, CLR are told
//! apart by `value`). Opcode 1 is RND, whose `value` is the shift amount.

use serde::{Deserialize, Serialize};

use super::field::{check_widths, layout, Field};
use crate::arch::bits::Bits;
use crate::arch::error::{Result, SimError};
use crate::arch::mode::Mode;

const OPCODE_VALUE_CODED: u64 = 0;
const OPCODE_RND: u64 = 1;

const VALUE_MAC: u64 = 0;
const VALUE_NOP: u64 = 1;
const VALUE_OUT: u64 = 2;
const VALUE_PASS: u64 = 3;
const VALUE_CLR: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeInstructionConfig {
  pub opcode_bits: usize,
  pub mode_bits: usize,
  pub value_bits: usize,
}

impl PeInstructionConfig {
  pub fn width(&self) -> usize {
    self.opcode_bits + self.mode_bits + self.value_bits
  }

  fn fields(&self) -> [Field; 3] {
    layout([
      ("opcode", self.opcode_bits),
      ("mode", self.mode_bits),
      ("value", self.value_bits),
    ])
  }

  pub fn validate(&self) -> Result<()> {
    check_widths("PE instruction", &self.fields())?;
    if self.mode_bits < 2 || self.value_bits < 3 {
      return Err(SimError::config(
        "PE instruction needs at least 2 mode bits and 3 value bits",
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeOp {
  Mac,
  Nop,
  Out,
  Pass,
  Clr,
  Rnd { shift: u64 },
}

impl PeOp {
  /// `(opcode, value)` pair as stored in the instruction word
  pub fn encode(self) -> (u64, u64) {
    match self {
      PeOp::Mac => (OPCODE_VALUE_CODED, VALUE_MAC),
      PeOp::Nop => (OPCODE_VALUE_CODED, VALUE_NOP),
      PeOp::Out => (OPCODE_VALUE_CODED, VALUE_OUT),
      PeOp::Pass => (OPCODE_VALUE_CODED, VALUE_PASS),
      PeOp::Clr => (OPCODE_VALUE_CODED, VALUE_CLR),
      PeOp::Rnd { shift } => (OPCODE_RND, shift),
    }
  }

  pub fn decode(opcode: u64, value: u64) -> Result<Self> {
    match (opcode, value) {
      (OPCODE_VALUE_CODED, VALUE_MAC) => Ok(PeOp::Mac),
      (OPCODE_VALUE_CODED, VALUE_NOP) => Ok(PeOp::Nop),
      (OPCODE_VALUE_CODED, VALUE_OUT) => Ok(PeOp::Out),
      (OPCODE_VALUE_CODED, VALUE_PASS) => Ok(PeOp::Pass),
      (OPCODE_VALUE_CODED, VALUE_CLR) => Ok(PeOp::Clr),
      (OPCODE_RND, shift) => Ok(PeOp::Rnd { shift }),
      (opcode, value) => Err(SimError::UnknownOpcode {
        unit: "PE",
        opcode,
        value,
      }),
    }
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      PeOp::Mac => "MAC",
      PeOp::Nop => "NOP",
      PeOp::Out => "OUT",
      PeOp::Pass => "PASS",
      PeOp::Clr => "CLR",
      PeOp::Rnd { .. } => "RND",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeInstruction {
  config: PeInstructionConfig,
  opcode: Field,
  mode: Field,
  value: Field,
  word: Bits,
}

impl PeInstruction {
  pub fn new(config: PeInstructionConfig) -> Self {
    let [opcode, mode, value] = config.fields();
    Self {
      config,
      opcode,
      mode,
      value,
      word: Bits::zeros(config.width()),
    }
  }

  pub fn config(&self) -> &PeInstructionConfig {
    &self.config
  }

  pub fn width(&self) -> usize {
    self.config.width()
  }

  pub fn opcode_code(&self) -> u64 {
    self.opcode.read(&self.word)
  }

  pub fn set_opcode_code(&mut self, code: u64) -> Result<()> {
    self.opcode.write(&mut self.word, code)
  }

  pub fn value(&self) -> u64 {
    self.value.read(&self.word)
  }

  pub fn set_value(&mut self, value: u64) -> Result<()> {
    self.value.write(&mut self.word, value)
  }

  pub fn mode_code(&self) -> u64 {
    self.mode.read(&self.word)
  }

  pub fn mode(&self) -> Result<Mode> {
    Mode::from_code(self.mode_code())
  }

  pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
    self.mode.write(&mut self.word, mode.code())
  }

  pub fn op(&self) -> Result<PeOp> {
    PeOp::decode(self.opcode_code(), self.value())
  }

  /// Write opcode and value together; a failed write leaves the word as it was
  pub fn set_op(&mut self, op: PeOp) -> Result<()> {
    let (opcode, value) = op.encode();
    let mut word = self.word.clone();
    self.opcode.write(&mut word, opcode)?;
    self.value.write(&mut word, value)?;
    self.word = word;
    Ok(())
  }

  pub fn word(&self) -> &Bits {
    &self.word
  }

  pub fn set_word(&mut self, word: Bits) -> Result<()> {
    if word.width() != self.width() {
      return Err(SimError::layout(format!(
        "{}-bit word for a {}-bit PE instruction",
        word.width(),
        self.width()
      )));
    }
    self.word = word;
    Ok(())
  }
}
