//! The full instruction: a loop body plus trip count and address increments
//!
//! Packed order: memory sub-instruction, PE sub-instruction, count,
//! mema_inc, memb_inc.

use serde::{Deserialize, Serialize};

use super::field::{check_widths, layout, Field};
use super::memory::{MemoryInstruction, MemoryInstructionConfig};
use super::pe::{PeInstruction, PeInstructionConfig};
use crate::arch::bits::Bits;
use crate::arch::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionConfig {
  pub count_bits: usize,
  pub mema_inc_bits: usize,
  pub memb_inc_bits: usize,
  pub memory: MemoryInstructionConfig,
  pub pe: PeInstructionConfig,
}

impl InstructionConfig {
  /// Width of the count and increment fields alone
  pub fn own_width(&self) -> usize {
    self.count_bits + self.mema_inc_bits + self.memb_inc_bits
  }

  /// Width of the whole packed instruction
  pub fn width(&self) -> usize {
    self.memory.width() + self.pe.width() + self.own_width()
  }

  fn fields(&self) -> [Field; 5] {
    layout([
      ("memory", self.memory.width()),
      ("pe", self.pe.width()),
      ("count", self.count_bits),
      ("mema_inc", self.mema_inc_bits),
      ("memb_inc", self.memb_inc_bits),
    ])
  }

  pub fn validate(&self) -> Result<()> {
    self.memory.validate()?;
    self.pe.validate()?;
    check_widths("instruction", &self.fields()[2..])
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
  config: InstructionConfig,
  memory: MemoryInstruction,
  pe: PeInstruction,
  count: u64,
  mema_inc: u64,
  memb_inc: u64,
}

impl Instruction {
  pub fn new(config: InstructionConfig) -> Self {
    Self {
      config,
      memory: MemoryInstruction::new(config.memory),
      pe: PeInstruction::new(config.pe),
      count: 0,
      mema_inc: 0,
      memb_inc: 0,
    }
  }

  /// Decode a packed word
  pub fn from_word(config: InstructionConfig, word: &Bits) -> Result<Self> {
    let mut inst = Self::new(config);
    inst.set_word(word)?;
    Ok(inst)
  }

  pub fn config(&self) -> &InstructionConfig {
    &self.config
  }

  pub fn width(&self) -> usize {
    self.config.width()
  }

  pub fn memory(&self) -> &MemoryInstruction {
    &self.memory
  }

  pub fn memory_mut(&mut self) -> &mut MemoryInstruction {
    &mut self.memory
  }

  pub fn set_memory(&mut self, memory: MemoryInstruction) -> Result<()> {
    if *memory.config() != self.config.memory {
      return Err(SimError::config("memory sub-instruction built for a different configuration"));
    }
    self.memory = memory;
    Ok(())
  }

  pub fn pe(&self) -> &PeInstruction {
    &self.pe
  }

  pub fn pe_mut(&mut self) -> &mut PeInstruction {
    &mut self.pe
  }

  pub fn set_pe(&mut self, pe: PeInstruction) -> Result<()> {
    if *pe.config() != self.config.pe {
      return Err(SimError::config("PE sub-instruction built for a different configuration"));
    }
    self.pe = pe;
    Ok(())
  }

  /// Encoded count; the body runs `count + 1` times
  pub fn count(&self) -> u64 {
    self.count
  }

  pub fn set_count(&mut self, value: u64) -> Result<()> {
    check_unsigned("count", value, self.config.count_bits)?;
    self.count = value;
    Ok(())
  }

  pub fn mema_inc(&self) -> u64 {
    self.mema_inc
  }

  pub fn set_mema_inc(&mut self, value: u64) -> Result<()> {
    check_unsigned("mema_inc", value, self.config.mema_inc_bits)?;
    self.mema_inc = value;
    Ok(())
  }

  pub fn memb_inc(&self) -> u64 {
    self.memb_inc
  }

  pub fn set_memb_inc(&mut self, value: u64) -> Result<()> {
    check_unsigned("memb_inc", value, self.config.memb_inc_bits)?;
    self.memb_inc = value;
    Ok(())
  }

  /// Add the increments to the memory sub-instruction's offsets in place
  pub fn advance_offsets(&mut self) -> Result<()> {
    let memory = self.config.memory;
    let mema = advance("mema_offset", self.memory.mema_offset(), self.mema_inc, memory.mema_offset_bits)?;
    let memb = advance("memb_offset", self.memory.memb_offset(), self.memb_inc, memory.memb_offset_bits)?;
    self.memory.set_mema_offset(mema)?;
    self.memory.set_memb_offset(memb)
  }

  /// Packed form of the whole instruction
  pub fn word(&self) -> Result<Bits> {
    let mut tail = Bits::zeros(self.config.own_width());
    let [count, mema_inc, memb_inc] = layout([
      ("count", self.config.count_bits),
      ("mema_inc", self.config.mema_inc_bits),
      ("memb_inc", self.config.memb_inc_bits),
    ]);
    count.write(&mut tail, self.count)?;
    mema_inc.write(&mut tail, self.mema_inc)?;
    memb_inc.write(&mut tail, self.memb_inc)?;
    Ok(Bits::concat([self.memory.word(), self.pe.word(), &tail]))
  }

  /// Replace every field from a packed word
  pub fn set_word(&mut self, word: &Bits) -> Result<()> {
    if word.width() != self.width() {
      return Err(SimError::layout(format!(
        "{}-bit word for a {}-bit instruction",
        word.width(),
        self.width()
      )));
    }
    let [memory, pe, count, mema_inc, memb_inc] = self.config.fields();
    self.memory.set_word(word.slice(memory.offset, memory.width)?)?;
    self.pe.set_word(word.slice(pe.offset, pe.width)?)?;
    self.count = count.read(word);
    self.mema_inc = mema_inc.read(word);
    self.memb_inc = memb_inc.read(word);
    Ok(())
  }
}

fn advance(field: &str, offset: u64, inc: u64, width: usize) -> Result<u64> {
  offset.checked_add(inc).ok_or_else(|| SimError::Range {
    field: field.to_string(),
    value: format!("{} + {}", offset, inc),
    width,
    signed: false,
  })
}

fn check_unsigned(field: &str, value: u64, width: usize) -> Result<()> {
  if width < 64 && value >> width != 0 {
    return Err(SimError::Range {
      field: field.to_string(),
      value: value.to_string(),
      width,
      signed: false,
    });
  }
  Ok(())
}
