pub mod arch;
pub mod simulator;

pub use arch::accelerator::{Accelerator, AcceleratorConfig};
pub use arch::bits::Bits;
pub use arch::error::{Result, SimError};
pub use arch::isa::{Instruction, InstructionConfig};
pub use arch::mode::Mode;
pub use simulator::sim::mode::{SimConfig, StepMode};
pub use simulator::utils::log;
