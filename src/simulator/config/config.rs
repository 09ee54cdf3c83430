use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::arch::accelerator::AcceleratorConfig;
use crate::arch::error::{Result, SimError};
use crate::arch::isa::InstructionConfig;
use crate::arch::mode::SMALLEST_MODE_BITS;
use crate::simulator::sim::mode::{SimConfig, StepMode};

/// Built-in defaults, always the first configuration layer
pub const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Environment variables `MACSIM_<SECTION>__<KEY>` override file values
pub const ENV_PREFIX: &str = "MACSIM";

/// Simulation section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
}

impl SimulationSection {
  pub fn to_sim_config(&self) -> SimConfig {
    SimConfig {
      quiet: self.quiet,
      step_mode: if self.step_mode {
        StepMode::Step
      } else {
        StepMode::Continuous
      },
      trace_file: if self.trace_file.is_empty() {
        None
      } else {
        Some(self.trace_file.clone())
      },
    }
  }
}

/// Unified application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
  pub accelerator: AcceleratorConfig,
  pub instruction: InstructionConfig,
  #[serde(default)]
  pub simulation: SimulationSection,
}

/// Layer the built-in defaults, an optional user file and the environment
pub fn load_config(custom_config_path: Option<&Path>) -> Result<AppConfig> {
  let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

  if let Some(path) = custom_config_path {
    if !path.exists() {
      return Err(SimError::config(format!("cannot read configuration file {:?}", path)));
    }
    builder = builder.add_source(File::from(path.to_path_buf()).format(FileFormat::Toml));
  }

  builder
    .add_source(
      Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .and_then(|merged| merged.try_deserialize::<AppConfig>())
    .map_err(|e| SimError::config(format!("failed to load configuration: {}", e)))
}

/// Apply CLI parameter overrides
pub fn apply_cli_overrides(config: &mut AppConfig, quiet: bool, step: bool, trace_file: Option<&str>) {
  if quiet {
    config.simulation.quiet = true;
  }
  if step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = trace_file {
    config.simulation.trace_file = file.to_string();
  }
}

/// Reject inconsistent widths; warn about offsets that cannot reach a whole bank
pub fn validate_config(config: &AppConfig) -> Result<()> {
  config.accelerator.validate()?;
  config.instruction.validate()?;

  let buffer = &config.accelerator.buffer;
  let memory = &config.instruction.memory;
  let reach = |bits: usize| if bits >= 64 { u64::MAX } else { 1u64 << bits };

  let mema_depth = buffer.bank_a_depth.max(buffer.bank_c_depth) as u64;
  if reach(memory.mema_offset_bits) < mema_depth {
    log::warn!(
      "{}-bit A offsets cannot address all {} words of banks A/C",
      memory.mema_offset_bits,
      mema_depth
    );
  }

  // B offsets address lanes of the narrowest mode
  let memb_lanes = (buffer.bank_b_depth * (buffer.bank_b_bits / SMALLEST_MODE_BITS)) as u64;
  if reach(memory.memb_offset_bits) < memb_lanes {
    log::warn!(
      "{}-bit B offsets cannot address all {} INT8 lanes of bank B",
      memory.memb_offset_bits,
      memb_lanes
    );
  }

  Ok(())
}

/// Render a configuration back to TOML
pub fn dump_config(config: &AppConfig) -> Result<String> {
  toml::to_string_pretty(config).map_err(|e| SimError::config(format!("failed to render configuration: {}", e)))
}

/// Load and merge configurations
///
/// Flow:
/// 1. Load built-in defaults
/// 2. Merge the custom configuration file, if provided
/// 3. Merge `MACSIM_*` environment variables
/// 4. Apply CLI parameter overrides
/// 5. Validate
pub fn load_and_merge_configs(
  custom_config_path: Option<&Path>,
  quiet: bool,
  step: bool,
  trace_file: Option<&str>,
) -> Result<AppConfig> {
  let mut config = load_config(custom_config_path)?;
  apply_cli_overrides(&mut config, quiet, step, trace_file);
  validate_config(&config)?;
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  #[test]
  fn test_default_config() {
    let config = load_config(None).unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.accelerator.buffer.bank_a_bits, 128);
    assert_eq!(config.instruction.width(), 45);
    assert_eq!(config.simulation.to_sim_config(), SimConfig::default());
  }

  #[test]
  fn test_dump_round_trip() {
    let config = load_config(None).unwrap();
    let text = dump_config(&config).unwrap();
    let parsed: AppConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
  }

  #[test]
  fn test_custom_file_overrides_defaults() {
    let path = std::env::temp_dir().join(format!("macsim-config-{}.toml", std::process::id()));
    fs::write(
      &path,
      "[accelerator]\npe_count = 8\n[accelerator.buffer]\nbank_a_bits = 256\nbank_c_bits = 256\n",
    )
    .unwrap();
    let config = load_config(Some(&path)).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(config.accelerator.pe_count, 8);
    assert_eq!(config.accelerator.buffer.bank_a_bits, 256);
    assert_eq!(config.accelerator.buffer.bank_b_bits, 32);
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_missing_file_is_an_error() {
    let path = Path::new("/nonexistent/macsim.toml");
    assert!(matches!(load_config(Some(path)), Err(SimError::Config { .. })));
  }

  #[test]
  fn test_invalid_widths_rejected() {
    let mut config = load_config(None).unwrap();
    config.accelerator.pe_count = 3;
    assert!(validate_config(&config).is_err());

    let mut config = load_config(None).unwrap();
    config.instruction.pe.value_bits = 0;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_cli_overrides() {
    let mut config = load_config(None).unwrap();
    apply_cli_overrides(&mut config, true, true, Some("trace.jsonl"));
    let sim = config.simulation.to_sim_config();
    assert!(sim.quiet);
    assert_eq!(sim.step_mode, StepMode::Step);
    assert_eq!(sim.trace_file.as_deref(), Some("trace.jsonl"));
  }
}
