// Accelerator controller: owns the PE array and the shared buffer and runs
// the per-instruction iteration protocol
//
//   buffer.execute(mem op) -> cut A-output across PEs, broadcast B-output
//   -> every PE runs the PE op -> PE outputs joined into C-input
//   -> offsets advance -> repeat count+1 times

use serde::{Deserialize, Serialize};

use crate::arch::bits::Bits;
use crate::arch::buffer::{BufferConfig, SharedBuffer};
use crate::arch::error::{Result, SimError};
use crate::arch::isa::Instruction;
use crate::arch::pe::{ProcessingElement, ProcessingElementConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorConfig {
  pub counter_bits: usize,
  pub pe_count: usize,
  pub pe: ProcessingElementConfig,
  pub buffer: BufferConfig,
}

impl AcceleratorConfig {
  /// Cross-component width invariants
  pub fn validate(&self) -> Result<()> {
    self.pe.validate()?;
    if self.pe_count == 0 {
      return Err(SimError::config("PE count must be non-zero"));
    }
    if self.pe_count * self.pe.input_bits != self.buffer.bank_a_bits {
      return Err(SimError::config(format!(
        "incorrect number of PEs ({}) with input bitwidth {} for bank A bitwidth {}",
        self.pe_count, self.pe.input_bits, self.buffer.bank_a_bits
      )));
    }
    if self.pe.input_bits != self.buffer.bank_b_bits {
      return Err(SimError::config(format!(
        "incorrect PE input bitwidth {} for bank B bitwidth {}",
        self.pe.input_bits, self.buffer.bank_b_bits
      )));
    }
    if self.pe_count * self.pe.output_bits != self.buffer.bank_c_bits {
      return Err(SimError::config(format!(
        "incorrect number of PEs ({}) with output bitwidth {} for bank C bitwidth {}",
        self.pe_count, self.pe.output_bits, self.buffer.bank_c_bits
      )));
    }
    Ok(())
  }
}

/// One executed iteration, as seen from the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
  pub instruction: usize,
  pub iteration: u64,
  pub memory_op: String,
  pub pe_op: String,
  pub mema_offset: u64,
  pub memb_offset: u64,
  pub c_input: String,
}

pub struct Accelerator {
  config: AcceleratorConfig,
  counter: Bits,
  pes: Vec<ProcessingElement>,
  buffer: SharedBuffer,
  executed: usize,
  recording: bool,
  records: Vec<IterationRecord>,
}

impl Accelerator {
  pub fn new(config: AcceleratorConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      config,
      counter: Bits::zeros(config.counter_bits),
      pes: (0..config.pe_count).map(|_| ProcessingElement::new(config.pe)).collect(),
      buffer: SharedBuffer::new(config.buffer),
      executed: 0,
      recording: false,
      records: Vec::new(),
    })
  }

  pub fn config(&self) -> &AcceleratorConfig {
    &self.config
  }

  pub fn counter(&self) -> &Bits {
    &self.counter
  }

  pub fn pes(&self) -> &[ProcessingElement] {
    &self.pes
  }

  pub fn buffer(&self) -> &SharedBuffer {
    &self.buffer
  }

  /// Number of instructions run so far
  pub fn executed(&self) -> usize {
    self.executed
  }

  pub fn set_memory(&mut self, bank_a: Vec<Bits>, bank_b: Vec<Bits>) -> Result<()> {
    self.set_bank_a(bank_a)?;
    self.set_bank_b(bank_b)
  }

  pub fn set_bank_a(&mut self, words: Vec<Bits>) -> Result<()> {
    self.buffer.load_bank_a(words)
  }

  pub fn set_bank_b(&mut self, words: Vec<Bits>) -> Result<()> {
    self.buffer.load_bank_b(words)
  }

  pub fn bank_c(&self) -> &[Bits] {
    self.buffer.bank_c().words()
  }

  pub fn bank_c_ints(&self) -> Result<Vec<i128>> {
    self.buffer.bank_c_ints()
  }

  pub fn set_recording(&mut self, enabled: bool) {
    self.recording = enabled;
  }

  /// Hand over every record collected since the last drain
  pub fn drain_records(&mut self) -> Vec<IterationRecord> {
    std::mem::take(&mut self.records)
  }

  pub fn execute_program(&mut self, instructions: &mut [Instruction]) -> Result<()> {
    for instruction in instructions.iter_mut() {
      self.execute_instruction(instruction)?;
    }
    Ok(())
  }

  /// Run one instruction's body `count + 1` times. The instruction's offsets
  /// are advanced in place after every iteration, the last one included.
  pub fn execute_instruction(&mut self, instruction: &mut Instruction) -> Result<()> {
    let index = self.executed;
    log::debug!(
      "inst {}: {} | {} x{}",
      index,
      instruction.memory().opcode()?.mnemonic(),
      instruction.pe().op()?.mnemonic(),
      instruction.count() + 1
    );

    for iteration in 0..=instruction.count() {
      let mema = instruction.memory().mema_offset();
      let memb = instruction.memory().memb_offset();

      self.buffer.execute(instruction.memory())?;

      let lanes = self.buffer.a_output().cut(self.config.pe.input_bits)?;
      let broadcast = self.buffer.b_output().clone();
      for (pe, lane) in self.pes.iter_mut().zip(lanes) {
        pe.input_a(lane)?;
        pe.input_b(broadcast.clone())?;
        pe.execute(instruction.pe())?;
      }

      let staged = Bits::concat(self.pes.iter().map(ProcessingElement::output));
      log::trace!("inst {} iter {}: A[{}] B[{}] -> C-in {}", index, iteration, mema, memb, staged);
      if self.recording {
        self.records.push(IterationRecord {
          instruction: index,
          iteration,
          memory_op: instruction.memory().opcode()?.mnemonic().to_string(),
          pe_op: instruction.pe().op()?.mnemonic().to_string(),
          mema_offset: mema,
          memb_offset: memb,
          c_input: staged.to_string(),
        });
      }
      self.buffer.stage_c_input(staged)?;

      instruction.advance_offsets()?;
    }

    self.executed += 1;
    Ok(())
  }
}
