use clap::{Parser, Subcommand};
use macsim::simulator::assembler::{disassemble_program, Assembler};
use macsim::simulator::compiler::{compile_matvec, extract_results, random_workload, reference_matvec};
use macsim::simulator::config::config::{dump_config, load_and_merge_configs, AppConfig};
use macsim::simulator::image;
use macsim::simulator::utils::log::init_log;
use macsim::simulator::Simulator;
use macsim::{log_info, Instruction, Mode, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// macsim - A SIMD matrix-multiplication accelerator simulator
#[derive(Parser, Debug)]
#[command(name = "macsim")]
#[command(version = "0.1.0")]
#[command(about = "Bit-exact simulator for a configurable MAC accelerator", long_about = None)]
struct Args {
  /// Configuration file layered over the built-in defaults
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long, global = true)]
  step: bool,

  /// Quiet mode (suppress log messages)
  #[arg(short, long, global = true)]
  quiet: bool,

  /// Output trace file path (JSON lines, one record per iteration)
  #[arg(long, value_name = "FILE", global = true)]
  trace_file: Option<String>,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Run a program against bank A/B memory images
  Run {
    /// Program: mnemonic text, or a binary image with --image
    program: PathBuf,
    /// Treat the program file as a binary program image
    #[arg(long)]
    image: bool,
    /// Bank A memory image (hex per line)
    #[arg(long, value_name = "FILE")]
    bank_a: Option<PathBuf>,
    /// Bank B memory image (hex per line)
    #[arg(long, value_name = "FILE")]
    bank_b: Option<PathBuf>,
    /// Where to write bank C after the run
    #[arg(long, value_name = "FILE")]
    bank_c: Option<PathBuf>,
  },
  /// Assemble mnemonic text into a binary program image
  Assemble {
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
  },
  /// Turn a binary program image back into mnemonic text
  Disassemble {
    input: PathBuf,
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Run a random matrix-vector product and check it against plain arithmetic
  Matvec {
    #[arg(long, default_value_t = 4)]
    rows: usize,
    #[arg(long, default_value_t = 3)]
    cols: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// INT8, INT16 or INT32
    #[arg(long, default_value = "INT32")]
    mode: String,
  },
  /// Print the merged configuration as TOML
  DumpConfig,
}

fn main() -> ExitCode {
  init_log();

  let args = Args::parse();
  match run(args) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      log::error!("{}", e);
      ExitCode::FAILURE
    },
  }
}

/// Ok(false) when a self-check ran but disagreed
fn run(args: Args) -> Result<bool> {
  let config = load_and_merge_configs(args.config.as_deref(), args.quiet, args.step, args.trace_file.as_deref())?;

  match args.command {
    Cmd::Run {
      program,
      image,
      bank_a,
      bank_b,
      bank_c,
    } => {
      run_program(&config, &program, image, bank_a.as_deref(), bank_b.as_deref(), bank_c.as_deref())?;
      Ok(true)
    },
    Cmd::Assemble { input, output } => {
      let program = Assembler::new(config.instruction).assemble(&fs::read_to_string(&input)?)?;
      image::write_program_file(&output, &program)?;
      log_info!("{} instructions written to {}", program.len(), output.display());
      Ok(true)
    },
    Cmd::Disassemble { input, output } => {
      let program = image::read_program_file(&input, config.instruction)?;
      let text = disassemble_program(&program)?;
      match output {
        Some(path) => fs::write(path, text)?,
        None => print!("{}", text),
      }
      Ok(true)
    },
    Cmd::Matvec { rows, cols, seed, mode } => run_matvec(&config, rows, cols, seed, mode.parse()?),
    Cmd::DumpConfig => {
      print!("{}", dump_config(&config)?);
      Ok(true)
    },
  }
}

fn run_program(
  config: &AppConfig,
  program: &Path,
  is_image: bool,
  bank_a: Option<&Path>,
  bank_b: Option<&Path>,
  bank_c: Option<&Path>,
) -> Result<()> {
  let instructions: Vec<Instruction> = if is_image {
    image::read_program_file(program, config.instruction)?
  } else {
    Assembler::new(config.instruction).assemble(&fs::read_to_string(program)?)?
  };

  let buffer = &config.accelerator.buffer;
  let mut sim = Simulator::new(config.simulation.to_sim_config(), config.accelerator)?;
  if let Some(path) = bank_a {
    let words = image::read_memory_file(path, buffer.bank_a_bits, buffer.bank_a_depth)?;
    sim.accelerator_mut().set_bank_a(words)?;
  }
  if let Some(path) = bank_b {
    let words = image::read_memory_file(path, buffer.bank_b_bits, buffer.bank_b_depth)?;
    sim.accelerator_mut().set_bank_b(words)?;
  }

  sim.load_program(instructions);
  sim.run()?;

  if let Some(path) = bank_c {
    image::write_memory_file(path, sim.accelerator().bank_c())?;
    log_info!("bank C written to {}", path.display());
  }
  Ok(())
}

fn run_matvec(config: &AppConfig, rows: usize, cols: usize, seed: u64, mode: Mode) -> Result<bool> {
  let (matrix, vector) = random_workload(rows, cols, seed);
  let compiled = compile_matvec(&matrix, &vector, &config.accelerator, mode)?;
  let program = Assembler::new(config.instruction).assemble_lines(&compiled.program)?;

  let mut sim = Simulator::new(config.simulation.to_sim_config(), config.accelerator)?;
  sim.accelerator_mut().set_memory(compiled.bank_a, compiled.bank_b)?;
  sim.load_program(program);
  sim.run()?;

  let result = extract_results(sim.accelerator().bank_c(), compiled.rows, &config.accelerator, mode)?;
  let golden = reference_matvec(&matrix, &vector);
  let pe_count = config.accelerator.pe_count;
  if let Some(row) = result.iter().zip(&golden).position(|(a, b)| a != b) {
    log::error!(
      "(rows:{}, cols:{}, mode:{}, PE count:{}) failed at row {}: got {}, expected {}",
      rows,
      cols,
      mode,
      pe_count,
      row,
      result[row],
      golden[row]
    );
    return Ok(false);
  }
  log_info!("(rows:{}, cols:{}, mode:{}, PE count:{}) passed", rows, cols, mode, pe_count);
  Ok(true)
}
