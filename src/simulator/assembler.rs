//! Mnemonic assembler and disassembler
//!
//! One instruction per line:
//!
//! ```text
//! <memory-op> | <pe-op> | <count> <mema-inc> <memb-inc>
//!
//! memory-op:  NOP | WRITE <mema> | READ <mode> <mema> <memb>
//! pe-op:      NOP|OUT|PASS|CLR|MAC <mode> | RND <mode> <shift>
//! ```
//!
//! `count` is the trip count; the encoded field holds `count - 1`.

use std::str::FromStr;

use crate::arch::error::{Result, SimError};
use crate::arch::isa::{Instruction, InstructionConfig, MemOpcode, MemoryInstruction, PeInstruction, PeOp};
use crate::arch::mode::Mode;

pub struct Assembler {
  config: InstructionConfig,
}

impl Assembler {
  pub fn new(config: InstructionConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &InstructionConfig {
    &self.config
  }

  /// Assemble a whole program; blank lines and `#` comments are skipped
  pub fn assemble(&self, source: &str) -> Result<Vec<Instruction>> {
    let mut program = Vec::new();
    for (index, raw) in source.lines().enumerate() {
      let text = raw.split('#').next().unwrap_or("").trim();
      if text.is_empty() {
        continue;
      }
      program.push(self.parse_line(text).map_err(|e| e.at_line(index + 1))?);
    }
    Ok(program)
  }

  pub fn assemble_lines<S: AsRef<str>>(&self, lines: &[S]) -> Result<Vec<Instruction>> {
    lines
      .iter()
      .enumerate()
      .map(|(index, line)| self.parse_line(line.as_ref()).map_err(|e| e.at_line(index + 1)))
      .collect()
  }

  /// Assemble a single line
  pub fn convert_instruction(&self, text: &str) -> Result<Instruction> {
    self.parse_line(text).map_err(|e| e.at_line(1))
  }

  fn parse_line(&self, text: &str) -> Result<Instruction> {
    let upper = text.trim().to_uppercase();
    let parts: Vec<&str> = upper.split('|').map(str::trim).collect();
    let [memory, pe, control] = parts[..] else {
      return Err(malformed(format!("expected 3 '|'-separated fields in \"{}\"", text.trim())));
    };

    let mut inst = Instruction::new(self.config);
    inst.set_memory(self.convert_memory(memory)?)?;
    inst.set_pe(self.convert_pe(pe)?)?;

    let params: Vec<&str> = control.split_whitespace().collect();
    let [count, mema_inc, memb_inc] = params[..] else {
      return Err(malformed(format!("expected \"<count> <mema-inc> <memb-inc>\", found \"{}\"", control)));
    };
    let count = number(count, "count")?;
    if count == 0 {
      return Err(malformed("count must be at least 1"));
    }
    inst.set_count(count - 1)?;
    inst.set_mema_inc(number(mema_inc, "MEMA increment")?)?;
    inst.set_memb_inc(number(memb_inc, "MEMB increment")?)?;
    Ok(inst)
  }

  fn convert_memory(&self, text: &str) -> Result<MemoryInstruction> {
    let mut inst = MemoryInstruction::new(self.config.memory);
    let params: Vec<&str> = text.split_whitespace().collect();

    match params[..] {
      ["NOP"] => inst.set_opcode(MemOpcode::Nop)?,
      ["WRITE", mema] => {
        inst.set_opcode(MemOpcode::Write)?;
        inst.set_mema_offset(number(mema, "MEMA offset")?)?;
        inst.set_memb_offset(0)?;
      },
      ["READ", mode, mema, memb] => {
        inst.set_opcode(MemOpcode::Read)?;
        inst.set_mode(Mode::from_str(mode)?)?;
        inst.set_mema_offset(number(mema, "MEMA offset")?)?;
        inst.set_memb_offset(number(memb, "MEMB offset")?)?;
      },
      ["NOP", ..] | ["WRITE", ..] | ["READ", ..] => {
        return Err(malformed(format!("wrong number of parameters in \"{}\"", text)));
      },
      [op, ..] => return Err(malformed(format!("memory operation \"{}\" not recognized", op))),
      [] => return Err(malformed("empty memory sub-instruction")),
    }
    Ok(inst)
  }

  fn convert_pe(&self, text: &str) -> Result<PeInstruction> {
    let mut inst = PeInstruction::new(self.config.pe);
    let params: Vec<&str> = text.split_whitespace().collect();

    let (op, mode) = match params[..] {
      ["RND", mode, shift] => (PeOp::Rnd { shift: number(shift, "shift")? }, mode),
      ["RND", _] => return Err(malformed("RND requires a third shift parameter")),
      [name, mode] => (pe_op(name)?, mode),
      [name, ..] => {
        pe_op(name)?;
        return Err(malformed(format!("wrong number of parameters in \"{}\"", text)));
      },
      [] => return Err(malformed("empty PE sub-instruction")),
    };
    inst.set_mode(Mode::from_str(mode)?)?;
    inst.set_op(op)?;
    Ok(inst)
  }
}

/// Canonical text for an instruction; assembling it gives the same word
pub fn disassemble(inst: &Instruction) -> Result<String> {
  let memory = inst.memory();
  let memory_text = match memory.opcode()? {
    MemOpcode::Nop => "NOP".to_string(),
    MemOpcode::Write => format!("WRITE {}", memory.mema_offset()),
    MemOpcode::Read => format!(
      "READ {} {} {}",
      memory.mode()?,
      memory.mema_offset(),
      memory.memb_offset()
    ),
  };

  let pe = inst.pe();
  let pe_text = match pe.op()? {
    PeOp::Rnd { shift } => format!("RND {} {}", pe.mode()?, shift),
    op => format!("{} {}", op.mnemonic(), pe.mode()?),
  };

  Ok(format!(
    "{} | {} | {} {} {}",
    memory_text,
    pe_text,
    inst.count() + 1,
    inst.mema_inc(),
    inst.memb_inc()
  ))
}

pub fn disassemble_program(program: &[Instruction]) -> Result<String> {
  let mut text = String::new();
  for inst in program {
    text.push_str(&disassemble(inst)?);
    text.push('\n');
  }
  Ok(text)
}

fn pe_op(name: &str) -> Result<PeOp> {
  match name {
    "MAC" => Ok(PeOp::Mac),
    "NOP" => Ok(PeOp::Nop),
    "OUT" => Ok(PeOp::Out),
    "PASS" => Ok(PeOp::Pass),
    "CLR" => Ok(PeOp::Clr),
    other => Err(malformed(format!("PE operation \"{}\" not recognized", other))),
  }
}

fn number(token: &str, what: &str) -> Result<u64> {
  token
    .parse::<u64>()
    .map_err(|_| malformed(format!("unable to convert \"{}\" to {}", token, what)))
}

fn malformed(reason: impl Into<String>) -> SimError {
  SimError::Assemble {
    line: 0,
    reason: reason.into(),
  }
}
