use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;

use crate::arch::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Step(u32), // Step N instructions
  Continue,
  Print,
  Quit,
}

/// Interactive prompt used in step mode
pub struct Shell {
  editor: DefaultEditor,
}

impl Shell {
  pub fn new() -> Result<Self> {
    let editor = DefaultEditor::new().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(Self { editor })
  }

  pub fn read_command(&mut self) -> Result<Command> {
    loop {
      match self.editor.readline("(macsim) ") {
        Ok(line) => {
          let trimmed = line.trim();

          // Add to history if not empty
          if !trimmed.is_empty() {
            let _ = self.editor.add_history_entry(trimmed);
          }

          match parse_command(trimmed) {
            Ok(cmd) => return Ok(cmd),
            Err(msg) => eprintln!("Error: {}", msg),
          }
        },
        // Ctrl-C / Ctrl-D: quit
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(Command::Quit),
        Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err).into()),
      }
    }
  }
}

/// Empty input steps once; `si N` steps N times
pub fn parse_command(input: &str) -> std::result::Result<Command, String> {
  let trimmed = input.trim();
  match trimmed {
    "" => return Ok(Command::Step(1)),
    "c" => return Ok(Command::Continue),
    "p" => return Ok(Command::Print),
    "q" => return Ok(Command::Quit),
    _ => {},
  }

  if let Some(num_str) = trimmed.strip_prefix("si") {
    let num_str = num_str.trim();
    if num_str.is_empty() {
      return Err("'si' requires a number, e.g., 'si 100'".to_string());
    }
    return match num_str.parse::<u32>() {
      Ok(n) if n > 0 => Ok(Command::Step(n)),
      Ok(_) => Err("step count must be greater than 0".to_string()),
      Err(e) => Err(format!("invalid number '{}': {}", num_str, e)),
    };
  }

  Err(format!(
    "unknown command '{}'. Use Enter to step, 'si N' to step N times, 'c' to continue, 'p' to print bank C, 'q' to quit",
    trimmed
  ))
}
