use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qbec::{CompileOptions, EXIT_FAILURE_CODE, Emit, ReturnMode};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "QBEC_LOG";

#[derive(Parser)]
#[command(name = "qbec", about = "Compile a source file to QBE IR", version)]
struct Cli {
  /// Source file to compile
  input: PathBuf,

  /// Write output here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Stop after this stage and print its result
  #[arg(long, value_enum, default_value_t = Emit::Ir)]
  emit: Emit,

  /// Make `return <expr>;` return the expression instead of 0
  #[arg(long)]
  return_values: bool,

  /// Log pipeline progress to stderr
  #[arg(short, long)]
  verbose: bool,
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

fn fail(message: &str) -> ! {
  eprintln!("{message}");
  process::exit(EXIT_FAILURE_CODE);
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let file_name = cli.input.display().to_string();
  let bytes = fs::read(&cli.input)
    .unwrap_or_else(|err| fail(&format!("error: cannot read {file_name}: {err}")));
  // Bytes outside ASCII are rejected by the tokenizer outside string literals.
  let source = String::from_utf8_lossy(&bytes);

  let return_mode = if cli.return_values {
    ReturnMode::Value
  } else {
    ReturnMode::Zero
  };
  let options = CompileOptions::default()
    .with_file_name(file_name.as_str())
    .with_return_mode(return_mode);

  let output = match qbec::emit(&source, &options, cli.emit) {
    Ok(output) => output,
    Err(err) => fail(&err.render(&file_name)),
  };
  info!(file = %file_name, stage = ?cli.emit, bytes = output.len(), "compiled");

  match &cli.output {
    Some(path) => {
      if let Err(err) = fs::write(path, &output) {
        fail(&format!("error: cannot write {}: {err}", path.display()));
      }
    }
    None => print!("{output}"),
  }
}
