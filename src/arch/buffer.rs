// Shared Buffer: three banks plus the latched ports between them and the PEs
//
//   bank A  wide matrix operand  -> A-output port
//   bank B  narrow vector operand -> B-output port (one lane, broadcast)
//   bank C  wide result           <- C-input port (staged by the controller)

use serde::{Deserialize, Serialize};

use crate::arch::bits::Bits;
use crate::arch::error::{Result, SimError};
use crate::arch::isa::{MemOpcode, MemoryInstruction};
use crate::arch::mode::ceil_log2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
  pub bank_a_bits: usize,
  pub bank_a_depth: usize,
  pub bank_b_bits: usize,
  pub bank_b_depth: usize,
  pub bank_c_bits: usize,
  pub bank_c_depth: usize,
}

/// One independently addressed SRAM
#[derive(Debug, Clone)]
pub struct Bank {
  id: char,
  width: usize,
  data: Vec<Bits>,
}

impl Bank {
  fn new(id: char, width: usize, depth: usize) -> Self {
    Self {
      id,
      width,
      data: vec![Bits::zeros(width); depth],
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn depth(&self) -> usize {
    self.data.len()
  }

  pub fn words(&self) -> &[Bits] {
    &self.data
  }

  pub fn read(&self, addr: u64) -> Result<&Bits> {
    self.data.get(addr as usize).ok_or(SimError::Address {
      bank: self.id,
      address: addr,
      depth: self.data.len(),
    })
  }

  fn write(&mut self, addr: u64, value: Bits) -> Result<()> {
    let depth = self.data.len();
    let slot = self.data.get_mut(addr as usize).ok_or(SimError::Address {
      bank: self.id,
      address: addr,
      depth,
    })?;
    *slot = value;
    Ok(())
  }

  /// Replace the whole bank; the image must match depth and word width
  fn load(&mut self, words: Vec<Bits>) -> Result<()> {
    if words.len() != self.data.len() {
      return Err(SimError::config(format!(
        "length of memory [{}] is incorrect for bank {} depth [{}]",
        words.len(),
        self.id,
        self.data.len()
      )));
    }
    if let Some(bad) = words.iter().position(|w| w.width() != self.width) {
      return Err(SimError::config(format!(
        "word {} of bank {} image is {} bits wide (expected {})",
        bad,
        self.id,
        words[bad].width(),
        self.width
      )));
    }
    self.data = words;
    Ok(())
  }

  fn load_ints(&mut self, values: &[i128]) -> Result<()> {
    let words = values
      .iter()
      .enumerate()
      .map(|(addr, v)| {
        Bits::from_int(*v, self.width).map_err(|e| e.in_field(&format!("bank {}[{}]", self.id, addr)))
      })
      .collect::<Result<Vec<_>>>()?;
    self.load(words)
  }
}

#[derive(Debug, Clone)]
pub struct SharedBuffer {
  config: BufferConfig,
  bank_a: Bank,
  bank_b: Bank,
  bank_c: Bank,
  a_output: Bits,
  b_output: Bits,
  c_input: Bits,
}

impl SharedBuffer {
  pub fn new(config: BufferConfig) -> Self {
    Self {
      config,
      bank_a: Bank::new('A', config.bank_a_bits, config.bank_a_depth),
      bank_b: Bank::new('B', config.bank_b_bits, config.bank_b_depth),
      bank_c: Bank::new('C', config.bank_c_bits, config.bank_c_depth),
      a_output: Bits::zeros(config.bank_a_bits),
      b_output: Bits::zeros(config.bank_b_bits),
      c_input: Bits::zeros(config.bank_c_bits),
    }
  }

  pub fn config(&self) -> &BufferConfig {
    &self.config
  }

  /// Run one memory sub-instruction
  pub fn execute(&mut self, instruction: &MemoryInstruction) -> Result<()> {
    match instruction.opcode()? {
      MemOpcode::Read => self.read(instruction),
      MemOpcode::Write => self.bank_c.write(instruction.mema_offset(), self.c_input.clone()),
      MemOpcode::Nop => Ok(()),
    }
  }

  fn read(&mut self, instruction: &MemoryInstruction) -> Result<()> {
    let a_word = self.bank_a.read(instruction.mema_offset())?.clone();

    // low `shift` bits of the B offset pick the lane, the rest pick the word
    let lane_bits = instruction.mode()?.bitwidth();
    let lanes_per_word = self.config.bank_b_bits / lane_bits;
    let shift = ceil_log2(lanes_per_word);
    let offset = instruction.memb_offset();
    let memory_index = offset >> shift;
    let lane_index = (offset - (memory_index << shift)) as usize;

    let lanes = self.bank_b.read(memory_index)?.cut(lane_bits)?;
    let lane = lanes
      .len()
      .checked_sub(lane_index + 1)
      .map(|pos| &lanes[pos])
      .ok_or_else(|| {
        SimError::layout(format!(
          "lane {} of a {}-lane bank B word addressed by offset {}",
          lane_index,
          lanes.len(),
          offset
        ))
      })?;

    self.a_output = a_word;
    self.b_output = Bits::repeat(lane, lanes.len());
    Ok(())
  }

  pub fn a_output(&self) -> &Bits {
    &self.a_output
  }

  pub fn b_output(&self) -> &Bits {
    &self.b_output
  }

  pub fn c_input(&self) -> &Bits {
    &self.c_input
  }

  /// Stage the word the next WRITE commits
  pub fn stage_c_input(&mut self, value: Bits) -> Result<()> {
    if value.width() != self.config.bank_c_bits {
      return Err(SimError::layout(format!(
        "{}-bit value staged into {}-bit bank C port",
        value.width(),
        self.config.bank_c_bits
      )));
    }
    self.c_input = value;
    Ok(())
  }

  pub fn load_bank_a(&mut self, words: Vec<Bits>) -> Result<()> {
    self.bank_a.load(words)
  }

  pub fn load_bank_b(&mut self, words: Vec<Bits>) -> Result<()> {
    self.bank_b.load(words)
  }

  pub fn load_bank_a_ints(&mut self, values: &[i128]) -> Result<()> {
    self.bank_a.load_ints(values)
  }

  pub fn load_bank_b_ints(&mut self, values: &[i128]) -> Result<()> {
    self.bank_b.load_ints(values)
  }

  pub fn bank_a(&self) -> &Bank {
    &self.bank_a
  }

  pub fn bank_b(&self) -> &Bank {
    &self.bank_b
  }

  pub fn bank_c(&self) -> &Bank {
    &self.bank_c
  }

  /// Bank C as signed integers; words wider than 128 bits must fit i128
  pub fn bank_c_ints(&self) -> Result<Vec<i128>> {
    self.bank_c.words().iter().map(Bits::int).collect()
  }
}
