pub mod accelerator;
pub mod bits;
pub mod buffer;
pub mod error;
pub mod isa;
pub mod mode;
pub mod pe;
