use std::fs::File;
use std::io::{self, BufWriter, Write};

use super::sim::mode::{SimConfig, StepMode};
use super::sim::shell::{Command, Shell};
use super::utils::log::set_log;
use crate::arch::accelerator::{Accelerator, AcceleratorConfig};
use crate::arch::error::Result;
use crate::arch::isa::Instruction;
use crate::log_info;

/// Host-side driver: feeds a program to the accelerator one instruction at
/// a time and writes the iteration trace
pub struct Simulator {
  config: SimConfig,
  accel: Accelerator,
  program: Vec<Instruction>,
  pc: usize,
  trace: Option<BufWriter<File>>,
}

impl Simulator {
  pub fn new(config: SimConfig, accel_config: AcceleratorConfig) -> Result<Self> {
    let mut accel = Accelerator::new(accel_config)?;
    let trace = match &config.trace_file {
      Some(path) => {
        accel.set_recording(true);
        Some(BufWriter::new(File::create(path)?))
      },
      None => None,
    };

    Ok(Self {
      config,
      accel,
      program: Vec::new(),
      pc: 0,
      trace,
    })
  }

  pub fn accelerator(&self) -> &Accelerator {
    &self.accel
  }

  pub fn accelerator_mut(&mut self) -> &mut Accelerator {
    &mut self.accel
  }

  /// Replace the program and rewind
  pub fn load_program(&mut self, program: Vec<Instruction>) {
    self.program = program;
    self.pc = 0;
  }

  /// The program as it stands; executed instructions carry advanced offsets
  pub fn program(&self) -> &[Instruction] {
    &self.program
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn is_finished(&self) -> bool {
    self.pc >= self.program.len()
  }

  pub fn run(&mut self) -> Result<()> {
    set_log(!self.config.quiet);
    log_info!("running {} instructions", self.program.len());
    let result = match self.config.step_mode {
      StepMode::Continuous => self.run_continuous(),
      StepMode::Step => self.run_step_mode(),
    };
    self.flush_trace()?;
    result?;
    log_info!("stopped at pc {} of {}", self.pc, self.program.len());
    Ok(())
  }

  fn run_continuous(&mut self) -> Result<()> {
    while self.step()? {}
    Ok(())
  }

  fn run_step_mode(&mut self) -> Result<()> {
    println!("Step mode - Press Enter to step, 'q' to quit");
    let mut shell = Shell::new()?;
    while !self.is_finished() {
      match shell.read_command()? {
        Command::Step(n) => {
          for _ in 0..n {
            if !self.step()? {
              break;
            }
          }
          self.print_position();
        },
        Command::Continue => self.run_continuous()?,
        Command::Print => self.print_bank_c(),
        Command::Quit => break,
      }
    }
    Ok(())
  }

  /// Execute the instruction at `pc`; false once the program is exhausted
  pub fn step(&mut self) -> Result<bool> {
    let Some(inst) = self.program.get_mut(self.pc) else {
      return Ok(false);
    };
    // iterations completed before a failure still reach the trace
    let executed = self.accel.execute_instruction(inst);
    self.write_trace()?;
    executed?;
    self.pc += 1;
    Ok(true)
  }

  fn write_trace(&mut self) -> Result<()> {
    let records = self.accel.drain_records();
    if let Some(out) = self.trace.as_mut() {
      for record in records {
        serde_json::to_writer(&mut *out, &record).map_err(io::Error::from)?;
        out.write_all(b"\n")?;
      }
    }
    Ok(())
  }

  fn flush_trace(&mut self) -> Result<()> {
    if let Some(out) = self.trace.as_mut() {
      out.flush()?;
    }
    Ok(())
  }

  fn print_position(&self) {
    match self.program.get(self.pc) {
      Some(inst) => match crate::simulator::assembler::disassemble(inst) {
        Ok(text) => println!("pc {}: {}", self.pc, text),
        Err(e) => println!("pc {}: <{}>", self.pc, e),
      },
      None => println!("pc {}: end of program", self.pc),
    }
  }

  fn print_bank_c(&self) {
    let words = self.accel.bank_c();
    let used: Vec<_> = words.iter().enumerate().filter(|(_, w)| !w.is_zero()).collect();
    println!("bank C: {} of {} words non-zero", used.len(), words.len());
    for (addr, word) in used {
      println!("  [{:4}] {}", addr, word);
    }
  }
}
