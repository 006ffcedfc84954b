//! Shared error type for every stage of the pipeline.
//!
//! Each stage stops at the first problem it sees and hands a `CompileError`
//! back up the call stack. Nothing in the library prints or exits: the binary
//! renders the error against the input file name and terminates with
//! [`EXIT_FAILURE_CODE`], whichever stage failed.

use std::fmt;

use snafu::Snafu;

/// Process status for any fatal diagnostic, shared by all stages.
pub const EXIT_FAILURE_CODE: i32 = 69;

pub type CompileResult<T> = Result<T, CompileError>;

/// Pipeline stage that raised an error, used as the diagnostic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Lexer,
  Parser,
  Codegen,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Stage::Lexer => "LEXER",
      Stage::Parser => "PARSER",
      Stage::Codegen => "CODEGEN",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display(
    "{line}:{column}: unexpected character '{}' (ASCII: {byte})",
    show_byte(*byte)
  ))]
  UnexpectedChar { line: u32, column: u32, byte: u8 },

  #[snafu(display(
    "{line}:{column}: unterminated string literal with '{}' (ASCII: {byte})",
    show_byte(*byte)
  ))]
  UnterminatedString { line: u32, column: u32, byte: u8 },

  #[snafu(display(
    "{line}:{column}: expected digit after decimal point, but got '{}' (ASCII: {byte})",
    show_byte(*byte)
  ))]
  MissingFractionDigit { line: u32, column: u32, byte: u8 },

  #[snafu(display("{line}:{column}: expected {expected} near '{found}'"))]
  UnexpectedToken {
    expected: String,
    found: String,
    line: u32,
    column: u32,
  },

  #[snafu(display("{line}:{column}: unexpected end of input, expected {expected} near 'EOF'"))]
  UnexpectedEof {
    expected: String,
    line: u32,
    column: u32,
  },

  #[snafu(display("{line}:{column}: invalid {what} literal near '{text}'"))]
  InvalidLiteral {
    what: &'static str,
    text: String,
    line: u32,
    column: u32,
  },

  #[snafu(display("{line}:{column}: nesting deeper than {limit} levels near '{found}'"))]
  NestingTooDeep {
    limit: usize,
    found: String,
    line: u32,
    column: u32,
  },

  #[snafu(display("{line}:{column}: undefined variable with '{name}'"))]
  UndefinedVariable { name: String, line: u32, column: u32 },

  #[snafu(display("{line}:{column}: unsupported statement with '{what}'"))]
  UnsupportedStatement {
    what: &'static str,
    line: u32,
    column: u32,
  },

  #[snafu(display("{line}:{column}: duplicate symbol with '{name}'"))]
  DuplicateSymbol { name: String, line: u32, column: u32 },

  #[snafu(display("mandatory function not found with '{name}'"))]
  MissingMain { name: String },
}

impl CompileError {
  pub fn stage(&self) -> Stage {
    match self {
      Self::UnexpectedChar { .. }
      | Self::UnterminatedString { .. }
      | Self::MissingFractionDigit { .. } => Stage::Lexer,
      Self::UnexpectedToken { .. }
      | Self::UnexpectedEof { .. }
      | Self::InvalidLiteral { .. }
      | Self::NestingTooDeep { .. } => Stage::Parser,
      Self::UndefinedVariable { .. }
      | Self::UnsupportedStatement { .. }
      | Self::DuplicateSymbol { .. }
      | Self::MissingMain { .. } => Stage::Codegen,
    }
  }

  /// Source position of the error, if it has one.
  pub fn position(&self) -> Option<(u32, u32)> {
    match self {
      Self::UnexpectedChar { line, column, .. }
      | Self::UnterminatedString { line, column, .. }
      | Self::MissingFractionDigit { line, column, .. }
      | Self::UnexpectedToken { line, column, .. }
      | Self::UnexpectedEof { line, column, .. }
      | Self::InvalidLiteral { line, column, .. }
      | Self::NestingTooDeep { line, column, .. }
      | Self::UndefinedVariable { line, column, .. }
      | Self::UnsupportedStatement { line, column, .. }
      | Self::DuplicateSymbol { line, column, .. } => Some((*line, *column)),
      Self::MissingMain { .. } => None,
    }
  }

  /// Format the one-line diagnostic written to stderr, e.g.
  /// `[PARSER] prog.q:3:7: expected ';' near '}'`.
  pub fn render(&self, file: &str) -> String {
    match self.position() {
      Some(_) => format!("[{}] {file}:{self}", self.stage()),
      None => format!("[{}] {file}: {self}", self.stage()),
    }
  }
}

/// Printable form of a raw source byte; control bytes and NUL are escaped.
fn show_byte(byte: u8) -> String {
  char::from(byte).escape_default().to_string()
}
