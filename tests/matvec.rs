use macsim::simulator::assembler::Assembler;
use macsim::simulator::compiler::{compile_matvec, extract_results, generate_configs, random_workload, reference_matvec};
use macsim::{Accelerator, Mode};

/// Compile, load, run and extract; returns (accelerator result, plain result)
fn run_matvec(matrix: &[Vec<i64>], vector: &[i64], pe_count: usize, acc_bits: usize, counter_bits: usize, mode: Mode) -> (Vec<i128>, Vec<i128>) {
  let (accel_config, inst_config) = generate_configs(pe_count, 32, acc_bits, 32, counter_bits);
  let compiled = compile_matvec(matrix, vector, &accel_config, mode).unwrap();
  let mut program = Assembler::new(inst_config).assemble_lines(&compiled.program).unwrap();

  let mut accel = Accelerator::new(accel_config).unwrap();
  accel.set_memory(compiled.bank_a, compiled.bank_b).unwrap();
  accel.execute_program(&mut program).unwrap();

  let result = extract_results(accel.bank_c(), compiled.rows, &accel_config, mode).unwrap();
  (result, reference_matvec(matrix, vector))
}

fn check_random(rows: usize, cols: usize, seed: u64, mode: Mode, pe_count: usize, acc_bits: usize, counter_bits: usize) {
  let (matrix, vector) = random_workload(rows, cols, seed);
  let (result, golden) = run_matvec(&matrix, &vector, pe_count, acc_bits, counter_bits, mode);
  assert_eq!(
    result, golden,
    "(rows:{}, cols:{}, mode:{}, PE count:{})",
    rows, cols, mode, pe_count
  );
}

#[test]
fn test_small_matrix_single_tile() {
  let matrix = vec![vec![-5, 4, 0], vec![3, -1, 2], vec![1, 1, 1], vec![-2, -3, 4]];
  let vector = vec![2, -4, 3];
  for mode in Mode::ALL {
    let (result, golden) = run_matvec(&matrix, &vector, 4, 64, 8, mode);
    assert_eq!(golden, vec![-26, 16, 1, 20]);
    assert_eq!(result, golden, "mode {}", mode);
  }
}

#[test]
fn test_int8_many_tiles() {
  check_random(64, 3, 0, Mode::Int8, 9, 32, 10);
}

#[test]
fn test_int16_partial_tile() {
  check_random(50, 17, 3, Mode::Int16, 4, 32, 10);
}

#[test]
fn test_int32_single_pe() {
  check_random(13, 8, 99, Mode::Int32, 1, 32, 8);
}

#[test]
fn test_vector_spans_several_b_words() {
  // INT8 packs four elements per bank B word; 11 columns need three.
  // 16-bit accumulator lanes leave headroom for 11 products.
  check_random(8, 11, 5, Mode::Int8, 2, 64, 8);
}

#[test]
fn test_largest_workload_for_bank_a() {
  // 4-bit offsets: 3 tiles of 4 columns use 12 of 16 words, the final
  // advance stops at 12
  check_random(3, 4, 21, Mode::Int32, 1, 64, 4);
}

#[test]
#[cfg(feature = "smoke-tests")]
fn test_large_int16() {
  check_random(768, 64, 12345, Mode::Int16, 64, 32, 16);
}

#[test]
#[cfg(feature = "smoke-tests")]
fn test_large_int32() {
  check_random(768, 64, 12345, Mode::Int32, 13, 32, 16);
}
