//! Program and memory images
//!
//! A program image is the concatenation of every instruction word, each
//! stored big-endian in `ceil(width / 8)` bytes with the padding bits at the
//! front. A memory image is text with one hexadecimal word per line.

use std::fs;
use std::path::Path;

use crate::arch::bits::{byte_len, Bits};
use crate::arch::error::{Result, SimError};
use crate::arch::isa::{Instruction, InstructionConfig};

pub fn encode_program(program: &[Instruction]) -> Result<Vec<u8>> {
  let mut image = Vec::new();
  for inst in program {
    image.extend(inst.word()?.to_bytes());
  }
  Ok(image)
}

pub fn decode_program(config: InstructionConfig, image: &[u8]) -> Result<Vec<Instruction>> {
  let record = byte_len(config.width());
  if record == 0 || image.len() % record != 0 {
    return Err(SimError::Image {
      reason: format!(
        "{} bytes is not a whole number of {}-byte instruction records",
        image.len(),
        record
      ),
    });
  }
  image
    .chunks(record)
    .enumerate()
    .map(|(index, chunk)| {
      Bits::from_bytes(chunk, config.width())
        .and_then(|word| Instruction::from_word(config, &word))
        .map_err(|e| SimError::Image {
          reason: format!("instruction {}: {}", index, e),
        })
    })
    .collect()
}

/// Parse a memory image and zero-pad it to `depth` words of `width` bits
pub fn parse_memory_image(text: &str, width: usize, depth: usize) -> Result<Vec<Bits>> {
  let mut words = Vec::with_capacity(depth);
  for (index, raw) in text.lines().enumerate() {
    let line = raw.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
      continue;
    }
    let word = Bits::from_hex(line, width).map_err(|e| SimError::Image {
      reason: format!("line {}: {}", index + 1, e),
    })?;
    words.push(word);
  }

  if words.len() > depth {
    return Err(SimError::Image {
      reason: format!("{} words do not fit a bank of depth {}", words.len(), depth),
    });
  }
  words.resize(depth, Bits::zeros(width));
  Ok(words)
}

/// One zero-padded hexadecimal word per line
pub fn render_memory_image(words: &[Bits]) -> String {
  let mut text = String::new();
  for word in words {
    let hex = word.to_string();
    text.push_str(hex.trim_start_matches("0x"));
    text.push('\n');
  }
  text
}

pub fn read_program_file(path: &Path, config: InstructionConfig) -> Result<Vec<Instruction>> {
  decode_program(config, &fs::read(path)?)
}

pub fn write_program_file(path: &Path, program: &[Instruction]) -> Result<()> {
  fs::write(path, encode_program(program)?)?;
  Ok(())
}

pub fn read_memory_file(path: &Path, width: usize, depth: usize) -> Result<Vec<Bits>> {
  parse_memory_image(&fs::read_to_string(path)?, width, depth)
}

pub fn write_memory_file(path: &Path, words: &[Bits]) -> Result<()> {
  fs::write(path, render_memory_image(words))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::isa::{MemoryInstructionConfig, PeInstructionConfig};
  use crate::simulator::assembler::Assembler;

  fn config() -> InstructionConfig {
    InstructionConfig {
      count_bits: 10,
      mema_inc_bits: 1,
      memb_inc_bits: 1,
      memory: MemoryInstructionConfig {
        opcode_bits: 2,
        mode_bits: 2,
        mema_offset_bits: 10,
        memb_offset_bits: 10,
      },
      pe: PeInstructionConfig {
        opcode_bits: 2,
        mode_bits: 2,
        value_bits: 5,
      },
    }
  }

  #[test]
  fn test_program_image() {
    let program = Assembler::new(config())
      .assemble("NOP | CLR INT8 | 1 0 0\nREAD INT8 3 5 | MAC INT8 | 4 1 1\n")
      .unwrap();
    let image = encode_program(&program).unwrap();
    // 45-bit words take 6 bytes each
    assert_eq!(image.len(), 12);
    // first record: opcode NOP (2) in the top bits after 3 padding bits
    assert_eq!(image[0], 0b0001_0000);

    assert_eq!(decode_program(config(), &image).unwrap(), program);
    assert!(matches!(decode_program(config(), &image[..7]), Err(SimError::Image { .. })));
  }

  #[test]
  fn test_program_image_rejects_padding_bits() {
    let mut image = vec![0u8; 6];
    image[0] = 0x80;
    assert!(decode_program(config(), &image).is_err());
  }

  #[test]
  fn test_memory_image() {
    let words = parse_memory_image("# bank B\n0000000d\nffff\n\n", 32, 4).unwrap();
    assert_eq!(words.len(), 4);
    assert_eq!(words[0].uint().unwrap(), 13);
    assert_eq!(words[1].uint().unwrap(), 0xffff);
    assert!(words[3].is_zero());

    let text = render_memory_image(&words);
    assert_eq!(text.lines().next(), Some("0000000d"));
    assert_eq!(parse_memory_image(&text, 32, 4).unwrap(), words);
  }

  #[test]
  fn test_memory_image_limits() {
    assert!(parse_memory_image("1\n2\n3\n", 8, 2).is_err());
    assert!(parse_memory_image("1ff\n", 8, 2).is_err());
    assert!(parse_memory_image("zz\n", 8, 2).is_err());
  }
}
