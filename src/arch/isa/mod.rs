//! Instruction set encoding
//!
//! Three nested bit-field records. Field order fixes the bit offsets; every
//! offset is derived from the configuration, never hard-coded.

pub mod field;
pub mod instruction;
pub mod memory;
pub mod pe;

pub use instruction::{Instruction, InstructionConfig};
pub use memory::{MemOpcode, MemoryInstruction, MemoryInstructionConfig};
pub use pe::{PeInstruction, PeInstructionConfig, PeOp};
