#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
  pub quiet: bool,
  pub step_mode: StepMode,
  /// JSON-lines iteration trace
  pub trace_file: Option<String>,
}

impl Default for SimConfig {
  fn default() -> Self {
    Self {
      quiet: false,
      step_mode: StepMode::Continuous,
      trace_file: None,
    }
  }
}
