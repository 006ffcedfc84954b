//! Crate root: wires together the compilation pipeline.
//!
//! Each stage fully materialises its output before the next one starts:
//! - `tokenizer` performs lexical analysis and produces a flat token vector.
//! - `parser` owns all syntactic knowledge and returns the statement tree in `ast`.
//! - `codegen` lowers the tree into QBE IR text, with value classes from `ty`.
//! - `printer` renders tokens and trees for debugging.
//! - `error` holds the diagnostic type shared by all stages; `config` the options.

pub mod ast;
pub mod config;
pub mod error;
pub mod parser;
pub mod printer;
pub mod tokenizer;
pub mod ty;

mod codegen;

use tracing::debug_span;

pub use codegen::{PRINTLN, USER_MAIN};
pub use config::{CompileOptions, Emit, ReturnMode};
pub use error::{CompileError, CompileResult, EXIT_FAILURE_CODE, Stage};

/// Compile a source string into QBE IR.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
  emit(source, options, Emit::Ir)
}

/// Run the pipeline up to `stage` and return that stage's text output.
pub fn emit(source: &str, options: &CompileOptions, stage: Emit) -> CompileResult<String> {
  let _span = debug_span!("compile", file = %options.file_name).entered();

  let tokens = tokenizer::tokenize(source)?;
  if stage == Emit::Tokens {
    return Ok(printer::format_tokens(&tokens));
  }

  let program = parser::parse(tokens)?;
  if stage == Emit::Ast {
    return Ok(printer::format_program(&program));
  }

  codegen::generate(&program, options)
}
