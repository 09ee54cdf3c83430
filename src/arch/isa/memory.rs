//! Memory sub-instruction: `{opcode, mode, mema_offset, memb_offset}`

use serde::{Deserialize, Serialize};

use super::field::{check_widths, layout, Field};
use crate::arch::bits::Bits;
use crate::arch::error::{Result, SimError};
use crate::arch::mode::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInstructionConfig {
  pub opcode_bits: usize,
  pub mode_bits: usize,
  pub mema_offset_bits: usize,
  pub memb_offset_bits: usize,
}

impl MemoryInstructionConfig {
  pub fn width(&self) -> usize {
    self.opcode_bits + self.mode_bits + self.mema_offset_bits + self.memb_offset_bits
  }

  fn fields(&self) -> [Field; 4] {
    layout([
      ("opcode", self.opcode_bits),
      ("mode", self.mode_bits),
      ("mema_offset", self.mema_offset_bits),
      ("memb_offset", self.memb_offset_bits),
    ])
  }

  pub fn validate(&self) -> Result<()> {
    check_widths("memory instruction", &self.fields())?;
    if self.opcode_bits < 2 || self.mode_bits < 2 {
      return Err(SimError::config(
        "memory instruction needs at least 2 opcode bits and 2 mode bits",
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemOpcode {
  Read,
  Write,
  Nop,
}

impl MemOpcode {
  pub fn code(self) -> u64 {
    match self {
      MemOpcode::Read => 0,
      MemOpcode::Write => 1,
      MemOpcode::Nop => 2,
    }
  }

  pub fn from_code(code: u64) -> Result<Self> {
    match code {
      0 => Ok(MemOpcode::Read),
      1 => Ok(MemOpcode::Write),
      2 => Ok(MemOpcode::Nop),
      other => Err(SimError::UnknownOpcode {
        unit: "memory",
        opcode: other,
        value: 0,
      }),
    }
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      MemOpcode::Read => "READ",
      MemOpcode::Write => "WRITE",
      MemOpcode::Nop => "NOP",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryInstruction {
  config: MemoryInstructionConfig,
  opcode: Field,
  mode: Field,
  mema_offset: Field,
  memb_offset: Field,
  word: Bits,
}

impl MemoryInstruction {
  /// All-zero record (READ, INT8, offsets 0)
  pub fn new(config: MemoryInstructionConfig) -> Self {
    let [opcode, mode, mema_offset, memb_offset] = config.fields();
    Self {
      config,
      opcode,
      mode,
      mema_offset,
      memb_offset,
      word: Bits::zeros(config.width()),
    }
  }

  pub fn config(&self) -> &MemoryInstructionConfig {
    &self.config
  }

  pub fn width(&self) -> usize {
    self.config.width()
  }

  pub fn opcode_code(&self) -> u64 {
    self.opcode.read(&self.word)
  }

  pub fn opcode(&self) -> Result<MemOpcode> {
    MemOpcode::from_code(self.opcode_code())
  }

  pub fn set_opcode(&mut self, opcode: MemOpcode) -> Result<()> {
    self.set_opcode_code(opcode.code())
  }

  pub fn set_opcode_code(&mut self, code: u64) -> Result<()> {
    self.opcode.write(&mut self.word, code)
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

  pub fn mema_offset(&self) -> u64 {
    self.mema_offset.read(&self.word)
  }

  pub fn set_mema_offset(&mut self, value: u64) -> Result<()> {
    self.mema_offset.write(&mut self.word, value)
  }

  pub fn memb_offset(&self) -> u64 {
    self.memb_offset.read(&self.word)
  }

  pub fn set_memb_offset(&mut self, value: u64) -> Result<()> {
    self.memb_offset.write(&mut self.word, value)
  }

  /// The packed word
  pub fn word(&self) -> &Bits {
    &self.word
  }

  /// Replace the packed word wholesale
  pub fn set_word(&mut self, word: Bits) -> Result<()> {
    if word.width() != self.width() {
      return Err(SimError::layout(format!(
        "{}-bit word for a {}-bit memory instruction",
        word.width(),
        self.width()
      )));
    }
    self.word = word;
    Ok(())
  }
}
