//! Lowers an integer matrix-vector product onto the accelerator
//!
//! The matrix is split into tiles of `PE_COUNT * (input / mode)` rows. Every
//! column of a tile becomes one bank A word, rows packed high to low. The
//! vector is packed `input / mode` elements per bank B word in reversed lane
//! order, so sub-word address `j` selects element `j`. Tile `t` leaves its
//! results in bank C word `t`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arch::accelerator::AcceleratorConfig;
use crate::arch::bits::Bits;
use crate::arch::buffer::BufferConfig;
use crate::arch::error::{Result, SimError};
use crate::arch::isa::{InstructionConfig, MemoryInstructionConfig, PeInstructionConfig};
use crate::arch::mode::{ceil_log2, Mode, SMALLEST_MODE_BITS};
use crate::arch::pe::ProcessingElementConfig;

/// Bank images plus the program that computes `matrix * vector`
#[derive(Debug, Clone)]
pub struct CompiledMatvec {
  pub bank_a: Vec<Bits>,
  pub bank_b: Vec<Bits>,
  pub program: Vec<String>,
  /// Number of results to extract from bank C
  pub rows: usize,
}

/// Derive a consistent accelerator and ISA configuration
pub fn generate_configs(
  pe_count: usize,
  input_bits: usize,
  accumulation_bits: usize,
  output_bits: usize,
  counter_bits: usize,
) -> (AcceleratorConfig, InstructionConfig) {
  let lane_select_bits = ceil_log2(input_bits / SMALLEST_MODE_BITS) as usize;

  let accel = AcceleratorConfig {
    counter_bits,
    pe_count,
    pe: ProcessingElementConfig {
      input_bits,
      accumulation_bits,
      output_bits,
    },
    buffer: BufferConfig {
      bank_a_bits: pe_count * input_bits,
      bank_a_depth: 1 << counter_bits,
      bank_b_bits: input_bits,
      bank_b_depth: 1 << counter_bits.saturating_sub(lane_select_bits),
      bank_c_bits: pe_count * output_bits,
      bank_c_depth: 1 << counter_bits,
    },
  };

  let inst = InstructionConfig {
    count_bits: counter_bits,
    mema_inc_bits: 1,
    memb_inc_bits: 1,
    memory: MemoryInstructionConfig {
      opcode_bits: 2,
      mode_bits: 2,
      mema_offset_bits: counter_bits,
      memb_offset_bits: counter_bits,
    },
    pe: PeInstructionConfig {
      opcode_bits: 2,
      mode_bits: 2,
      value_bits: 5,
    },
  };

  (accel, inst)
}

pub fn compile_matvec(
  matrix: &[Vec<i64>],
  vector: &[i64],
  config: &AcceleratorConfig,
  mode: Mode,
) -> Result<CompiledMatvec> {
  let cols = matrix.first().map(Vec::len).unwrap_or(0);
  if cols == 0 {
    return Err(SimError::config("matrix must have at least one row and one column"));
  }
  if let Some(row) = matrix.iter().position(|r| r.len() != cols) {
    return Err(SimError::config(format!("matrix row {} has {} columns, expected {}", row, matrix[row].len(), cols)));
  }
  if vector.len() != cols {
    return Err(SimError::config(format!(
      "vector has {} elements for a matrix with {} columns",
      vector.len(),
      cols
    )));
  }

  let width = mode.bitwidth();
  let input_bits = config.pe.input_bits;
  if input_bits < width || input_bits % width != 0 {
    return Err(SimError::config(format!(
      "{}-bit PE inputs cannot be split into {} lanes",
      input_bits, mode
    )));
  }

  let lanes_per_input = input_bits / width;
  let rows_per_tile = config.pe_count * lanes_per_input;
  let tiles = (matrix.len() + rows_per_tile - 1) / rows_per_tile;
  let token = mode.token();

  // the last READ leaves mema_offset at tiles * cols, one past its final word
  let bank_a_depth = config.buffer.bank_a_depth;
  if tiles * cols >= bank_a_depth {
    return Err(SimError::config(format!(
      "{} tiles of {} columns need A offsets up to {}, bank A depth is {}",
      tiles,
      cols,
      tiles * cols,
      bank_a_depth
    )));
  }

  let mut bank_a = Vec::with_capacity(tiles * cols);
  let mut program = Vec::with_capacity(tiles * 4);
  for tile in 0..tiles {
    let rows = &matrix[tile * rows_per_tile..matrix.len().min((tile + 1) * rows_per_tile)];
    for col in 0..cols {
      let lanes = (0..rows_per_tile)
        .map(|r| rows.get(r).map_or(0, |row| row[col]))
        .map(|v| Bits::from_int(v as i128, width).map_err(|e| e.in_field("matrix element")))
        .collect::<Result<Vec<_>>>()?;
      bank_a.push(Bits::concat(&lanes));
    }

    program.push(format!("NOP | CLR {} | 1 0 0", token));
    program.push(format!("READ {} {} 0 | MAC {} | {} 1 1", token, tile * cols, token, cols));
    program.push(format!("NOP | OUT {} | 1 0 0", token));
    program.push(format!("WRITE {} | NOP {} | 1 0 0", tile, token));
  }

  let mut bank_b = Vec::new();
  for chunk in vector.chunks(lanes_per_input) {
    let mut lanes = chunk
      .iter()
      .map(|v| Bits::from_int(*v as i128, width).map_err(|e| e.in_field("vector element")))
      .collect::<Result<Vec<_>>>()?;
    lanes.resize(lanes_per_input, Bits::zeros(width));
    lanes.reverse();
    bank_b.push(Bits::concat(&lanes));
  }

  let buffer = &config.buffer;
  pad_bank('A', &mut bank_a, buffer.bank_a_bits, buffer.bank_a_depth)?;
  pad_bank('B', &mut bank_b, buffer.bank_b_bits, buffer.bank_b_depth)?;

  Ok(CompiledMatvec {
    bank_a,
    bank_b,
    program,
    rows: matrix.len(),
  })
}

fn pad_bank(bank: char, words: &mut Vec<Bits>, width: usize, depth: usize) -> Result<()> {
  if words.len() > depth {
    return Err(SimError::config(format!(
      "workload needs {} words of bank {} (depth {})",
      words.len(),
      bank,
      depth
    )));
  }
  words.resize(depth, Bits::zeros(width));
  Ok(())
}

/// First `count` signed `mode`-wide results from bank C
pub fn extract_results(bank_c: &[Bits], count: usize, config: &AcceleratorConfig, mode: Mode) -> Result<Vec<i128>> {
  let width = mode.bitwidth();
  let per_entry = config.pe_count * config.pe.output_bits / width;
  if per_entry == 0 {
    return Err(SimError::config(format!("{}-bit PE outputs hold no {} lanes", config.pe.output_bits, mode)));
  }
  let entries = (count + per_entry - 1) / per_entry;
  if entries > bank_c.len() {
    return Err(SimError::config(format!(
      "{} results need {} bank C words, bank holds {}",
      count,
      entries,
      bank_c.len()
    )));
  }

  let mut out = Vec::with_capacity(entries * per_entry);
  for word in &bank_c[..entries] {
    for lane in word.cut(width)? {
      out.push(lane.int()?);
    }
  }
  out.truncate(count);
  Ok(out)
}

/// Plain integer `matrix * vector`
pub fn reference_matvec(matrix: &[Vec<i64>], vector: &[i64]) -> Vec<i128> {
  matrix
    .iter()
    .map(|row| row.iter().zip(vector).map(|(a, b)| *a as i128 * *b as i128).sum())
    .collect()
}

/// Seeded workload with elements drawn from `[-5, 5)`
pub fn random_workload(rows: usize, cols: usize, seed: u64) -> (Vec<Vec<i64>>, Vec<i64>) {
  let mut rng = StdRng::seed_from_u64(seed);
  let matrix = (0..rows)
    .map(|_| (0..cols).map(|_| rng.gen_range(-5..5)).collect())
    .collect();
  let vector = (0..cols).map(|_| rng.gen_range(-5..5)).collect();
  (matrix, vector)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_generate_configs() {
    let (accel, inst) = generate_configs(4, 32, 32, 32, 10);
    accel.validate().unwrap();
    inst.validate().unwrap();
    assert_eq!(accel.buffer.bank_a_bits, 128);
    assert_eq!(accel.buffer.bank_a_depth, 1024);
    assert_eq!(accel.buffer.bank_b_depth, 256);
    assert_eq!(accel.buffer.bank_c_bits, 128);
    assert_eq!(inst.width(), 45);
  }

  #[test]
  fn test_program_per_tile() {
    let (accel, _) = generate_configs(1, 32, 64, 32, 6);
    // INT16: 2 rows per tile, so 3 rows take 2 tiles
    let matrix = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
    let compiled = compile_matvec(&matrix, &[7, 8], &accel, Mode::Int16).unwrap();
    assert_eq!(
      compiled.program,
      vec![
        "NOP | CLR INT16 | 1 0 0",
        "READ INT16 0 0 | MAC INT16 | 2 1 1",
        "NOP | OUT INT16 | 1 0 0",
        "WRITE 0 | NOP INT16 | 1 0 0",
        "NOP | CLR INT16 | 1 0 0",
        "READ INT16 2 0 | MAC INT16 | 2 1 1",
        "NOP | OUT INT16 | 1 0 0",
        "WRITE 1 | NOP INT16 | 1 0 0",
      ]
    );
    assert_eq!(compiled.bank_a.len(), 64);
    assert_eq!(compiled.bank_a[0].to_string(), "0x00010003");
    assert_eq!(compiled.bank_a[2].to_string(), "0x00050000");
    assert_eq!(compiled.rows, 3);
  }

  /// Element j of the vector sits in lane j counted from the low end
  #[test]
  fn test_vector_lanes_reversed() {
    let (accel, _) = generate_configs(1, 32, 32, 32, 6);
    let compiled = compile_matvec(&[vec![0, 0, 0, 0, 0]], &[1, 2, 3, 4, 5], &accel, Mode::Int8).unwrap();
    assert_eq!(compiled.bank_b[0].to_string(), "0x04030201");
    assert_eq!(compiled.bank_b[1].to_string(), "0x00000005");
  }

  #[test]
  fn test_rejects_bad_workloads() {
    let (accel, _) = generate_configs(1, 32, 32, 32, 6);
    assert!(compile_matvec(&[], &[], &accel, Mode::Int8).is_err());
    assert!(compile_matvec(&[vec![1, 2], vec![3]], &[1, 2], &accel, Mode::Int8).is_err());
    assert!(compile_matvec(&[vec![1, 2]], &[1], &accel, Mode::Int8).is_err());
    assert!(compile_matvec(&[vec![300]], &[1], &accel, Mode::Int8).is_err());
  }

  #[test]
  fn test_rejects_full_bank_a() {
    let (accel, _) = generate_configs(1, 32, 64, 32, 4);
    // INT32 on one PE: one row per tile, so rows * cols bank A words of 16
    let full = vec![vec![1; 4]; 4];
    assert!(matches!(
      compile_matvec(&full, &[1; 4], &accel, Mode::Int32),
      Err(SimError::Config { .. })
    ));

    let compiled = compile_matvec(&full[..3], &[1; 4], &accel, Mode::Int32).unwrap();
    assert_eq!(compiled.program[9], "READ INT32 8 0 | MAC INT32 | 4 1 1");
  }

  #[test]
  fn test_extract_results() {
    let (accel, _) = generate_configs(2, 16, 16, 16, 4);
    let bank_c = vec![
      Bits::from_uint(0xfff6_0007, 32).unwrap(),
      Bits::from_uint(0x0001_0002, 32).unwrap(),
    ];
    assert_eq!(extract_results(&bank_c, 3, &accel, Mode::Int16).unwrap(), vec![-10, 7, 1]);
    assert!(extract_results(&bank_c, 5, &accel, Mode::Int16).is_err());
  }

  #[test]
  fn test_random_workload_is_seeded() {
    let (m1, v1) = random_workload(4, 3, 7);
    let (m2, v2) = random_workload(4, 3, 7);
    assert_eq!(m1, m2);
    assert_eq!(v1, v2);
    assert!(m1.iter().flatten().chain(&v1).all(|x| (-5..5).contains(x)));
  }
}
