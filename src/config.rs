//! Options shared by the library entry points and the command line.

use clap::ValueEnum;

/// What a `return <expr>;` statement hands back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnMode {
  /// Evaluate the expression for its effects but always return `0`.
  #[default]
  Zero,
  /// Return the evaluated expression.
  Value,
}

/// Last pipeline stage to run; its output is what gets written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Emit {
  /// Token listing, one token per line.
  Tokens,
  /// Indented syntax tree dump.
  Ast,
  /// QBE intermediate representation.
  #[default]
  Ir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
  /// Name shown in diagnostics and log events.
  pub file_name: String,
  pub return_mode: ReturnMode,
  /// Symbol of the synthesized, exported entry point.
  pub entry_symbol: String,
  /// Symbol the user's `main` function is renamed to.
  pub user_main_symbol: String,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      file_name: "<input>".to_string(),
      return_mode: ReturnMode::Zero,
      entry_symbol: "main".to_string(),
      user_main_symbol: "main.user".to_string(),
    }
  }
}

impl CompileOptions {
  pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
    self.file_name = file_name.into();
    self
  }

  pub fn with_return_mode(mut self, return_mode: ReturnMode) -> Self {
    self.return_mode = return_mode;
    self
  }
}
