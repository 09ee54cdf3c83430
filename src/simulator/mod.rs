pub mod assembler;
pub mod compiler;
pub mod config;
pub mod image;
pub mod sim;
pub mod simulator;
pub mod utils;

// provide to macsim
pub use simulator::Simulator;
pub use utils::log;
