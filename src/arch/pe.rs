// Processing Element: one SIMD multiply-accumulate lane set
//
// Two input latches, one accumulator, one output latch. Every operation is
// lanewise at the width of the instruction's precision mode; accumulator
// lanes are proportionally wider (`mode * acc / input`).

use serde::{Deserialize, Serialize};

use crate::arch::bits::Bits;
use crate::arch::error::{Result, SimError};
use crate::arch::isa::{PeInstruction, PeOp};
use crate::arch::mode::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingElementConfig {
  pub input_bits: usize,
  pub accumulation_bits: usize,
  pub output_bits: usize,
}

impl ProcessingElementConfig {
  pub fn validate(&self) -> Result<()> {
    if self.input_bits == 0 || self.output_bits == 0 {
      return Err(SimError::config("PE input and output widths must be non-zero"));
    }
    // OUT always yields input_bits: one mode-wide lane per input lane
    if self.output_bits != self.input_bits {
      return Err(SimError::config(format!(
        "PE output width {} differs from input width {}",
        self.output_bits, self.input_bits
      )));
    }
    if self.accumulation_bits == 0 || self.accumulation_bits % self.input_bits != 0 {
      return Err(SimError::config(format!(
        "PE accumulation width {} is not a multiple of input width {}",
        self.accumulation_bits, self.input_bits
      )));
    }
    Ok(())
  }

  /// Accumulator lane width for a given mode
  pub fn acc_lane_bits(&self, mode: Mode) -> usize {
    mode.bitwidth() * (self.accumulation_bits / self.input_bits)
  }
}

/// Processing Element (PE) - lanewise multiply-accumulate unit
#[derive(Debug, Clone)]
pub struct ProcessingElement {
  config: ProcessingElementConfig,
  /// Matrix operand latch
  input_a: Bits,
  /// Broadcast vector operand latch
  input_b: Bits,
  acc: Bits,
  output: Bits,
}

impl ProcessingElement {
  pub fn new(config: ProcessingElementConfig) -> Self {
    Self {
      config,
      input_a: Bits::zeros(config.input_bits),
      input_b: Bits::zeros(config.input_bits),
      acc: Bits::zeros(config.accumulation_bits),
      output: Bits::zeros(config.output_bits),
    }
  }

  pub fn config(&self) -> &ProcessingElementConfig {
    &self.config
  }

  pub fn input_a(&mut self, value: Bits) -> Result<()> {
    self.input_a = self.check_input("input_a", value)?;
    Ok(())
  }

  pub fn input_b(&mut self, value: Bits) -> Result<()> {
    self.input_b = self.check_input("input_b", value)?;
    Ok(())
  }

  pub fn output(&self) -> &Bits {
    &self.output
  }

  pub fn accumulation(&self) -> &Bits {
    &self.acc
  }

  /// Run one PE sub-instruction
  pub fn execute(&mut self, instruction: &PeInstruction) -> Result<()> {
    match instruction.op()? {
      PeOp::Mac => self.mac(instruction.mode()?),
      PeOp::Nop => Ok(()),
      PeOp::Out => self.out(instruction.mode()?),
      PeOp::Pass => self.pass(instruction.mode()?),
      // mode is ignored
      PeOp::Clr => {
        self.clear();
        Ok(())
      },
      PeOp::Rnd { shift } => self.rnd(instruction.mode()?, shift),
    }
  }

  /// acc[i] = acc[i] + a[i] * b[i]
  fn mac(&mut self, mode: Mode) -> Result<()> {
    let lane_bits = self.config.acc_lane_bits(mode);
    let a = self.input_a.cut(mode.bitwidth())?;
    let b = self.input_b.cut(mode.bitwidth())?;
    let acc = self.acc.cut(lane_bits)?;

    let mut lanes = Vec::with_capacity(acc.len());
    for (lane, ((a, b), acc)) in a.iter().zip(&b).zip(&acc).enumerate() {
      let acc = acc.int()?;
      let product = a.int()? * b.int()?;
      let sum = acc.checked_add(product).ok_or_else(|| SimError::Overflow {
        op: "MAC",
        lane,
        value: format!("{} + {}", acc, product),
        width: lane_bits,
      })?;
      lanes.push(Bits::from_int(sum, lane_bits).map_err(|_| SimError::Overflow {
        op: "MAC",
        lane,
        value: sum.to_string(),
        width: lane_bits,
      })?);
    }
    self.acc = Bits::concat(&lanes);
    Ok(())
  }

  /// Low `mode` bits of every accumulator lane into the output latch
  fn out(&mut self, mode: Mode) -> Result<()> {
    let lanes = self
      .acc
      .cut(self.config.acc_lane_bits(mode))?
      .iter()
      .map(|lane| lane.low(mode.bitwidth()))
      .collect::<Result<Vec<_>>>()?;
    let output = Bits::concat(&lanes);
    if output.width() != self.config.output_bits {
      return Err(SimError::layout(format!(
        "OUT produced {} bits for a {}-bit output latch",
        output.width(),
        self.config.output_bits
      )));
    }
    self.output = output;
    Ok(())
  }

  /// Sign-extend input_a lanes straight into the accumulator
  fn pass(&mut self, mode: Mode) -> Result<()> {
    let lane_bits = self.config.acc_lane_bits(mode);
    let lanes = self
      .input_a
      .cut(mode.bitwidth())?
      .iter()
      .map(|lane| Bits::from_int(lane.int()?, lane_bits))
      .collect::<Result<Vec<_>>>()?;
    self.acc = Bits::concat(&lanes);
    Ok(())
  }

  fn clear(&mut self) {
    self.acc = Bits::zeros(self.config.accumulation_bits);
    self.output = Bits::zeros(self.config.output_bits);
  }

  /// Arithmetic right shift of every accumulator lane (rounds toward -inf)
  fn rnd(&mut self, mode: Mode, shift: u64) -> Result<()> {
    let lane_bits = self.config.acc_lane_bits(mode);
    let mut lanes = Vec::new();
    for (lane, value) in self.acc.cut(lane_bits)?.iter().enumerate() {
      let value = value.int()?;
      let shifted = if shift >= 127 { value >> 127 } else { value >> shift };
      lanes.push(Bits::from_int(shifted, lane_bits).map_err(|_| SimError::Overflow {
        op: "RND",
        lane,
        value: shifted.to_string(),
        width: lane_bits,
      })?);
    }
    self.acc = Bits::concat(&lanes);
    Ok(())
  }

  fn check_input(&self, latch: &str, value: Bits) -> Result<Bits> {
    if value.width() != self.config.input_bits {
      return Err(SimError::layout(format!(
        "{}-bit value for {}-bit PE latch {}",
        value.width(),
        self.config.input_bits,
        latch
      )));
    }
    Ok(value)
  }
}

// ===========================================
// Unit Tests
// ===========================================

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::isa::PeInstructionConfig;

  fn test_pe() -> ProcessingElement {
    ProcessingElement::new(ProcessingElementConfig {
      input_bits: 32,
      accumulation_bits: 64,
      output_bits: 32,
    })
  }

  fn inst(op: PeOp, mode: Mode) -> PeInstruction {
    let mut inst = PeInstruction::new(PeInstructionConfig {
      opcode_bits: 2,
      mode_bits: 2,
      value_bits: 5,
    });
    inst.set_mode(mode).unwrap();
    inst.set_op(op).unwrap();
    inst
  }

  fn pair(hi: i128, lo: i128) -> Bits {
    Bits::concat(&[Bits::from_int(hi, 16).unwrap(), Bits::from_int(lo, 16).unwrap()])
  }

  fn load(pe: &mut ProcessingElement) {
    pe.input_a(pair(-15, 7)).unwrap();
    pe.input_b(pair(8, 3)).unwrap();
  }

  /// Test multiply-accumulate then output cast
  #[test]
  fn test_mac() {
    let mut pe = test_pe();
    load(&mut pe);
    pe.execute(&inst(PeOp::Mac, Mode::Int16)).unwrap();
    pe.execute(&inst(PeOp::Out, Mode::Int16)).unwrap();
    assert_eq!(pe.output().uint().unwrap(), 0xff88_0015);

    // accumulation over a second cycle
    pe.execute(&inst(PeOp::Mac, Mode::Int16)).unwrap();
    pe.execute(&inst(PeOp::Out, Mode::Int16)).unwrap();
    let lanes = pe.output().cut(16).unwrap();
    assert_eq!(lanes[0].int().unwrap(), -240);
    assert_eq!(lanes[1].int().unwrap(), 42);
  }

  #[test]
  fn test_pass() {
    let mut pe = test_pe();
    load(&mut pe);
    pe.execute(&inst(PeOp::Pass, Mode::Int16)).unwrap();
    pe.execute(&inst(PeOp::Out, Mode::Int16)).unwrap();
    assert_eq!(pe.output().uint().unwrap(), 0xfff1_0007);
    assert_eq!(pe.accumulation().to_string(), "0xfffffff100000007");
  }

  /// RND floors: 0xABCD >> 8 is 0xFFAB, not 0xFFAC
  #[test]
  fn test_rnd() {
    let mut pe = test_pe();
    pe.input_a(Bits::from_uint(0xabcd_ef00, 32).unwrap()).unwrap();
    pe.execute(&inst(PeOp::Pass, Mode::Int16)).unwrap();
    pe.execute(&inst(PeOp::Rnd { shift: 8 }, Mode::Int16)).unwrap();
    pe.execute(&inst(PeOp::Out, Mode::Int16)).unwrap();
    assert_eq!(pe.output().uint().unwrap(), 0xffab_ffef);
  }

  #[test]
  fn test_clr() {
    let configs = [(16, 32, 16), (32, 64, 32), (32, 128, 32), (64, 128, 64)];
    for (input_bits, accumulation_bits, output_bits) in configs {
      for mode in Mode::ALL {
        let mut pe = ProcessingElement::new(ProcessingElementConfig {
          input_bits,
          accumulation_bits,
          output_bits,
        });
        pe.input_a(Bits::repeat(&Bits::from_int(-3, 8).unwrap(), input_bits / 8)).unwrap();
        pe.input_b(Bits::repeat(&Bits::from_int(5, 8).unwrap(), input_bits / 8)).unwrap();
        pe.execute(&inst(PeOp::Mac, Mode::Int8)).unwrap();
        pe.execute(&inst(PeOp::Out, Mode::Int8)).unwrap();
        assert!(!pe.output().is_zero());

        pe.execute(&inst(PeOp::Clr, mode)).unwrap();
        assert_eq!(*pe.output(), Bits::zeros(output_bits), "{}/{}/{} {}", input_bits, accumulation_bits, output_bits, mode);
        assert_eq!(*pe.accumulation(), Bits::zeros(accumulation_bits));
      }
    }
  }

  #[test]
  fn test_nop_keeps_state() {
    let mut pe = test_pe();
    load(&mut pe);
    pe.execute(&inst(PeOp::Pass, Mode::Int8)).unwrap();
    let before = pe.accumulation().clone();
    pe.execute(&inst(PeOp::Nop, Mode::Int8)).unwrap();
    assert_eq!(*pe.accumulation(), before);
  }

  #[test]
  fn test_mac_overflow_is_fatal() {
    let mut pe = ProcessingElement::new(ProcessingElementConfig {
      input_bits: 32,
      accumulation_bits: 32,
      output_bits: 32,
    });
    // 8-bit accumulator lanes cannot hold -128 * -128
    pe.input_a(Bits::from_uint(0x0000_0080, 32).unwrap()).unwrap();
    pe.input_b(Bits::from_uint(0x0000_0080, 32).unwrap()).unwrap();
    match pe.execute(&inst(PeOp::Mac, Mode::Int8)).unwrap_err() {
      SimError::Overflow { op, lane, value, width } => {
        assert_eq!((op, lane, width), ("MAC", 3, 8));
        assert_eq!(value, "16384");
      },
      e => panic!("unexpected error {:?}", e),
    }
  }

  /// A sum beyond i128 reports the operands that produced it
  #[test]
  fn test_mac_overflow_reports_operands() {
    let mut pe = ProcessingElement::new(ProcessingElementConfig {
      input_bits: 32,
      accumulation_bits: 128,
      output_bits: 32,
    });
    pe.acc = Bits::from_int(i128::MAX, 128).unwrap();
    pe.input_a(Bits::from_int(2, 32).unwrap()).unwrap();
    pe.input_b(Bits::from_int(3, 32).unwrap()).unwrap();
    match pe.execute(&inst(PeOp::Mac, Mode::Int32)).unwrap_err() {
      SimError::Overflow { op, lane, value, width } => {
        assert_eq!((op, lane, width), ("MAC", 0, 128));
        assert_eq!(value, format!("{} + 6", i128::MAX));
      },
      e => panic!("unexpected error {:?}", e),
    }
    assert_eq!(pe.accumulation().int().unwrap(), i128::MAX);
  }

  #[test]
  fn test_output_width_must_match_input() {
    let config = ProcessingElementConfig {
      input_bits: 32,
      accumulation_bits: 64,
      output_bits: 16,
    };
    assert!(matches!(config.validate(), Err(SimError::Config { .. })));
  }

  #[test]
  fn test_latch_width_checked() {
    let mut pe = test_pe();
    assert!(pe.input_a(Bits::zeros(16)).is_err());
  }
}
