//! Code generation: lower the parsed program into QBE IR text.
//!
//! Lowering runs in two passes over the top-level statements. The first
//! declares every global `let` as a data definition: literals become static
//! data, anything else a zeroed slot whose initializer is deferred. The second
//! lowers each function with a fresh local table. Finally an exported entry
//! point stores the deferred globals and calls the user's renamed `main`.
//!
//! Expressions lower to a [`Value`]: a fresh temporary (`%t.N`), a parameter
//! register (`%p.name`) or an immediate. Literal strings and `println` format
//! strings are pooled and emitted as `$str.N` data after the functions.

use std::collections::{HashMap, HashSet};

use snafu::ensure;
use tracing::{debug, trace};

use crate::ast::{BinaryOp, Expr, ExprKind, FunctionDecl, Program, Stmt, StmtKind};
use crate::config::{CompileOptions, ReturnMode};
use crate::error::{
  CompileResult, DuplicateSymbolSnafu, MissingMainSnafu, UndefinedVariableSnafu,
  UnsupportedStatementSnafu,
};
use crate::ty::{IrType, Value};

/// Name of the user function that the entry point calls.
pub const USER_MAIN: &str = "main";

/// Call name lowered to a formatted `printf` instead of a user function.
pub const PRINTLN: &str = "println";

/// External symbol `println` lowers to; user code may not define it.
const PRINTF: &str = "printf";

/// Lower a whole program. On error nothing is returned, even if some IR had
/// already been produced.
pub fn generate(program: &Program, options: &CompileOptions) -> CompileResult<String> {
  let mut generator = Generator::new(options);
  generator.emit_program(program)?;
  debug!(
    temps = generator.temp_count,
    labels = generator.label_count,
    strings = generator.strings.len(),
    "generated IR"
  );
  Ok(generator.out)
}

/// Storage of a global: its data symbol and the class it was declared with.
#[derive(Debug, Clone)]
struct GlobalSlot {
  symbol: String,
  ty: IrType,
}

struct Generator<'a> {
  options: &'a CompileOptions,
  out: String,
  temp_count: usize,
  label_count: usize,
  /// Cleared before every function and before the entry point.
  locals: HashMap<String, Value>,
  /// Filled once, before any function is lowered.
  globals: HashMap<String, GlobalSlot>,
  strings: Vec<String>,
  string_labels: HashMap<String, String>,
}

impl<'a> Generator<'a> {
  fn new(options: &'a CompileOptions) -> Self {
    Self {
      options,
      out: String::new(),
      temp_count: 0,
      label_count: 0,
      locals: HashMap::new(),
      globals: HashMap::new(),
      strings: Vec::new(),
      string_labels: HashMap::new(),
    }
  }

  fn fresh_temp(&mut self) -> String {
    let temp = format!("%t.{}", self.temp_count);
    self.temp_count += 1;
    temp
  }

  fn fresh_label(&mut self) -> String {
    let label = format!("@L.{}", self.label_count);
    self.label_count += 1;
    label
  }

  /// Pool `text` as a NUL-terminated data block, reusing the label of an
  /// identical earlier string.
  fn intern(&mut self, text: &str) -> String {
    if let Some(label) = self.string_labels.get(text) {
      return label.clone();
    }
    let label = format!("$str.{}", self.strings.len());
    self.strings.push(text.to_string());
    self
      .string_labels
      .insert(text.to_string(), label.clone());
    label
  }

  /// Every function and global must own its QBE symbol. Redeclaring a global
  /// is allowed; it reuses its first data definition.
  fn check_symbols(&self, program: &Program) -> CompileResult<()> {
    let mut functions = HashSet::new();
    for (func, pos) in program.functions() {
      let symbol = self.function_symbol(&func.name);
      let reserved = symbol == self.options.entry_symbol || symbol == PRINTF;
      ensure!(
        !reserved && functions.insert(symbol),
        DuplicateSymbolSnafu {
          name: &func.name,
          line: pos.line,
          column: pos.column,
        }
      );
    }

    for stmt in &program.stmts {
      if let StmtKind::Let { name, .. } = &stmt.kind {
        let reserved = *name == self.options.entry_symbol || name == PRINTF;
        ensure!(
          !reserved && !functions.contains(name),
          DuplicateSymbolSnafu {
            name,
            line: stmt.pos.line,
            column: stmt.pos.column,
          }
        );
      }
    }
    Ok(())
  }

  fn emit_program(&mut self, program: &Program) -> CompileResult<()> {
    self.check_symbols(program)?;

    let mut deferred = Vec::new();
    for stmt in &program.stmts {
      if let StmtKind::Let { name, value } = &stmt.kind
        && let Some(init) = self.emit_global(name, value)
      {
        deferred.push(init);
      }
    }

    let mut found_main = false;
    for stmt in &program.stmts {
      match &stmt.kind {
        StmtKind::Let { .. } => {}
        StmtKind::Function(func) => {
          found_main |= func.name == USER_MAIN;
          self.emit_function(func)?;
        }
        StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Block(_) => {
          return unsupported(stmt);
        }
      }
    }
    ensure!(found_main, MissingMainSnafu { name: USER_MAIN });

    self.emit_entry(&deferred)?;
    self.emit_string_pool();
    Ok(())
  }

  /// Declare a top-level `let`. Returns the slot and initializer if it has to
  /// run at start-up instead of being stored as static data.
  fn emit_global<'p>(&mut self, name: &str, value: &'p Expr) -> Option<(GlobalSlot, &'p Expr)> {
    if let Some(slot) = self.globals.get(name) {
      debug!(global = name, "redeclared global, initializer deferred");
      return Some((slot.clone(), value));
    }

    let symbol = format!("${name}");
    let (ty, deferred) = match &value.kind {
      ExprKind::Int(v) => {
        self.out.push_str(&format!("data {symbol} = {{ l {v} }}\n"));
        (IrType::Long, None)
      }
      ExprKind::Float(v) => {
        self.out.push_str(&format!("data {symbol} = {{ d d_{v:?} }}\n"));
        (IrType::Double, None)
      }
      ExprKind::Str(s) => {
        self.out.push_str(&format!(
          "data {symbol}.bytes = {{ b \"{}\", b 0 }}\n",
          escape(s)
        ));
        self
          .out
          .push_str(&format!("data {symbol} = {{ l {symbol}.bytes }}\n"));
        (IrType::Long, None)
      }
      ExprKind::Ident(_) | ExprKind::Binary { .. } | ExprKind::Call { .. } => {
        self.out.push_str(&format!("data {symbol} = {{ l 0 }}\n"));
        (IrType::Long, Some(value))
      }
    };

    debug!(global = name, computed = deferred.is_some(), "declared global");
    let slot = GlobalSlot { symbol, ty };
    self.globals.insert(name.to_string(), slot.clone());
    deferred.map(|init| (slot, init))
  }

  fn function_symbol(&self, name: &str) -> String {
    if name == USER_MAIN {
      self.options.user_main_symbol.clone()
    } else {
      name.to_string()
    }
  }

  fn emit_function(&mut self, func: &FunctionDecl) -> CompileResult<()> {
    self.locals.clear();

    let mut params = Vec::with_capacity(func.params.len());
    for param in &func.params {
      let register = Value::long(format!("%p.{param}"));
      params.push(register.typed());
      self.locals.insert(param.clone(), register);
    }

    let symbol = self.function_symbol(&func.name);
    self.out.push_str(&format!(
      "\nfunction l ${symbol}({}) {{\n@start\n",
      params.join(", ")
    ));

    for stmt in &func.body.stmts {
      self.emit_stmt(stmt)?;
    }

    self.out.push_str("\tret 0\n}\n");
    debug!(function = %func.name, %symbol, params = func.params.len(), "lowered function");
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match &stmt.kind {
      StmtKind::Let { name, value } => {
        let value = self.emit_expr(value)?;
        if let Some(slot) = self.globals.get(name).cloned() {
          self.emit_store(value, &slot);
        } else {
          let register = self.fresh_temp();
          self
            .out
            .push_str(&format!("\t{register} ={} copy {value}\n", value.ty));
          self
            .locals
            .insert(name.clone(), Value::new(register, value.ty));
        }
      }
      StmtKind::Expr(expr) => {
        self.emit_expr(expr)?;
      }
      StmtKind::Return(value) => {
        let evaluated = value.as_ref().map(|expr| self.emit_expr(expr)).transpose()?;
        let result = match (self.options.return_mode, evaluated) {
          (ReturnMode::Value, Some(value)) => self.convert(value, IrType::Long).repr,
          _ => "0".to_string(),
        };
        self.out.push_str(&format!("\tret {result}\n"));
        // Anything after the return lands in a fresh, unreachable block.
        let label = self.fresh_label();
        self.out.push_str(&format!("{label}\n"));
      }
      StmtKind::Block(block) => {
        for stmt in &block.stmts {
          self.emit_stmt(stmt)?;
        }
      }
      StmtKind::Function(_) => return unsupported(stmt),
    }
    Ok(())
  }

  fn emit_expr(&mut self, expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
      ExprKind::Int(v) => Ok(self.emit_copy(IrType::Long, &v.to_string())),
      ExprKind::Float(v) => Ok(self.emit_copy(IrType::Double, &format!("d_{v:?}"))),
      ExprKind::Str(s) => {
        let label = self.intern(&escape(s));
        Ok(self.emit_copy(IrType::Long, &label))
      }
      ExprKind::Ident(name) => {
        if let Some(value) = self.locals.get(name) {
          return Ok(value.clone());
        }
        let Some(slot) = self.globals.get(name).cloned() else {
          return UndefinedVariableSnafu {
            name,
            line: expr.pos.line,
            column: expr.pos.column,
          }
          .fail();
        };
        let register = self.fresh_temp();
        self.out.push_str(&format!(
          "\t{register} ={ty} load{ty} {}\n",
          slot.symbol,
          ty = slot.ty
        ));
        Ok(Value::new(register, slot.ty))
      }
      ExprKind::Binary { op, lhs, rhs } => {
        let lhs = self.emit_expr(lhs)?;
        let rhs = self.emit_expr(rhs)?;
        let result = self.fresh_temp();
        self.out.push_str(&format!(
          "\t{result} =l {} {lhs}, {rhs}\n",
          instruction(*op)
        ));
        Ok(Value::long(result))
      }
      ExprKind::Call { callee, args } if callee == PRINTLN => self.emit_println(args),
      ExprKind::Call { callee, args } => {
        let mut operands = Vec::with_capacity(args.len());
        for arg in args {
          operands.push(self.emit_expr(arg)?.typed());
        }
        let result = self.fresh_temp();
        let symbol = self.function_symbol(callee);
        self.out.push_str(&format!(
          "\t{result} =l call ${symbol}({})\n",
          operands.join(", ")
        ));
        Ok(Value::long(result))
      }
    }
  }

  /// `printf` with a format chosen from each argument's syntax, not its value.
  /// Yields the immediate `0`.
  fn emit_println(&mut self, args: &[Expr]) -> CompileResult<Value> {
    let specs: Vec<&str> = args.iter().map(format_spec).collect();
    let format = format!("{}\\n", specs.join(" "));
    let label = self.intern(&format);
    let format_value = self.emit_copy(IrType::Long, &label);

    let mut operands = vec![format_value.typed(), "...".to_string()];
    for arg in args {
      operands.push(self.emit_expr(arg)?.typed());
    }
    self
      .out
      .push_str(&format!("\tcall $printf({})\n", operands.join(", ")));
    trace!(format = %format, args = args.len(), "lowered println");
    Ok(Value::long("0"))
  }

  fn emit_copy(&mut self, ty: IrType, operand: &str) -> Value {
    let register = self.fresh_temp();
    self
      .out
      .push_str(&format!("\t{register} ={ty} copy {operand}\n"));
    Value::new(register, ty)
  }

  /// Move `value` into class `ty`. Floats are truncated towards zero.
  fn convert(&mut self, value: Value, ty: IrType) -> Value {
    if value.ty == ty {
      return value;
    }
    let op = if ty.is_float() { "sltof" } else { "dtosi" };
    let register = self.fresh_temp();
    self
      .out
      .push_str(&format!("\t{register} ={ty} {op} {value}\n"));
    Value::new(register, ty)
  }

  /// Store into a global using the class its data was declared with.
  fn emit_store(&mut self, value: Value, slot: &GlobalSlot) {
    let value = self.convert(value, slot.ty);
    self
      .out
      .push_str(&format!("\tstore{} {value}, {}\n", slot.ty, slot.symbol));
  }

  /// Exported entry point: run deferred global initializers in declaration
  /// order, then return whatever the user's `main` returns.
  fn emit_entry(&mut self, deferred: &[(GlobalSlot, &Expr)]) -> CompileResult<()> {
    self.locals.clear();
    self.out.push_str(&format!(
      "\nexport function l ${}() {{\n@start\n",
      self.options.entry_symbol
    ));

    for (slot, init) in deferred {
      let value = self.emit_expr(init)?;
      self.emit_store(value, slot);
    }

    let result = self.fresh_temp();
    self.out.push_str(&format!(
      "\t{result} =l call ${}()\n\tret {result}\n}}\n",
      self.options.user_main_symbol
    ));
    debug!(computed_globals = deferred.len(), "emitted entry point");
    Ok(())
  }

  fn emit_string_pool(&mut self) {
    if self.strings.is_empty() {
      return;
    }
    self.out.push('\n');
    for (i, text) in self.strings.iter().enumerate() {
      self
        .out
        .push_str(&format!("data $str.{i} = {{ b \"{text}\", b 0 }}\n"));
    }
  }
}

/// Quote a literal for a QBE `b "..."` item. The bytes are kept as written.
fn escape(text: &str) -> String {
  text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn instruction(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Add => "add",
    BinaryOp::Sub => "sub",
    BinaryOp::Mul => "mul",
    BinaryOp::Div => "div",
  }
}

/// Identifiers are assumed to hold integers.
fn format_spec(arg: &Expr) -> &'static str {
  match arg.kind {
    ExprKind::Int(_) | ExprKind::Ident(_) => "%d",
    ExprKind::Float(_) => "%f",
    ExprKind::Str(_) | ExprKind::Binary { .. } | ExprKind::Call { .. } => "%s",
  }
}

fn unsupported<T>(stmt: &Stmt) -> CompileResult<T> {
  UnsupportedStatementSnafu {
    what: stmt.describe(),
    line: stmt.pos.line,
    column: stmt.pos.column,
  }
  .fail()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{Block, Pos};
  use crate::error::CompileError;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn lower_with(src: &str, options: &CompileOptions) -> CompileResult<String> {
    generate(&parse(tokenize(src).unwrap()).unwrap(), options)
  }

  fn lower(src: &str) -> CompileResult<String> {
    lower_with(src, &CompileOptions::default())
  }

  #[test]
  fn literal_and_computed_globals() {
    let ir = lower("let a = 5;\nlet b = a + 1;\nfn main() { return 0; }").unwrap();
    assert_eq!(
      ir,
      "data $a = { l 5 }\n\
       data $b = { l 0 }\n\
       \n\
       function l $main.user() {\n\
       @start\n\
       \t%t.0 =l copy 0\n\
       \tret 0\n\
       @L.0\n\
       \tret 0\n\
       }\n\
       \n\
       export function l $main() {\n\
       @start\n\
       \t%t.1 =l loadl $a\n\
       \t%t.2 =l copy 1\n\
       \t%t.3 =l add %t.1, %t.2\n\
       \tstorel %t.3, $b\n\
       \t%t.4 =l call $main.user()\n\
       \tret %t.4\n\
       }\n"
    );
  }

  #[test]
  fn float_and_string_globals_are_static() {
    let ir = lower("let f = 2.5;\nlet s = \"hi\";\nfn main() {}").unwrap();
    assert!(ir.starts_with(
      "data $f = { d d_2.5 }\n\
       data $s.bytes = { b \"hi\", b 0 }\n\
       data $s = { l $s.bytes }\n"
    ));
  }

  #[test]
  fn parameters_and_locals() {
    let ir = lower("fn add(x, y) { let s = x * y; return s; }\nfn main() { add(1, 2); }").unwrap();
    assert!(ir.contains(
      "function l $add(l %p.x, l %p.y) {\n\
       @start\n\
       \t%t.0 =l mul %p.x, %p.y\n\
       \t%t.1 =l copy %t.0\n\
       \tret 0\n"
    ));
    assert!(ir.contains("\t%t.4 =l call $add(l %t.2, l %t.3)\n"));
  }

  #[test]
  fn local_let_shadows_previous_binding() {
    let ir = lower("fn main() { let a = 1; let a = a + 2; println(a); }").unwrap();
    assert!(ir.contains("\t%t.1 =l copy %t.0\n"));
    assert!(ir.contains("\t%t.3 =l add %t.1, %t.2\n\t%t.4 =l copy %t.3\n"));
    assert!(ir.contains("call $printf(l %t.5, ..., l %t.4)\n"));
  }

  #[test]
  fn let_of_a_global_name_stores_to_memory() {
    let ir = lower("let g = 1;\nfn main() { let g = 7; }").unwrap();
    assert!(ir.contains("\t%t.0 =l copy 7\n\tstorel %t.0, $g\n"));
  }

  #[test]
  fn stores_convert_to_the_declared_class_of_the_global() {
    let ir = lower("let g = 1.5;\nfn main() { let g = 2; println(g); }").unwrap();
    assert!(ir.contains("\t%t.0 =l copy 2\n\t%t.1 =d sltof %t.0\n\tstored %t.1, $g\n"));
    assert!(ir.contains("=d loadd $g\n"));

    let ir = lower("let n = 1;\nlet n = 2.5;\nfn main() {}").unwrap();
    assert!(ir.contains("\t%t.0 =d copy d_2.5\n\t%t.1 =l dtosi %t.0\n\tstorel %t.1, $n\n"));
  }

  #[test]
  fn globals_declared_after_functions_are_visible() {
    let ir = lower("fn main() { println(g); }\nlet g = 3;").unwrap();
    assert!(ir.starts_with("data $g = { l 3 }\n"));
    assert!(ir.contains("\t%t.1 =l loadl $g\n"));
  }

  #[test]
  fn user_function_cannot_collide_with_renamed_main() {
    let ir = lower("fn __user_main() {}\nfn main() { __user_main(); }").unwrap();
    assert_eq!(ir.matches("function l $__user_main() {").count(), 1);
    assert_eq!(ir.matches("function l $main.user() {").count(), 1);
  }

  #[test]
  fn clashing_top_level_names_are_rejected() {
    let duplicate = |name: &str, line, column| CompileError::DuplicateSymbol {
      name: name.to_string(),
      line,
      column,
    };
    assert_eq!(
      lower("let main = 1;\nfn main() {}").unwrap_err(),
      duplicate("main", 1, 1)
    );
    assert_eq!(
      lower("fn f() {}\nfn f() {}\nfn main() {}").unwrap_err(),
      duplicate("f", 2, 1)
    );
    assert_eq!(
      lower("fn main() {}\nlet helper = 1;\nfn helper() {}").unwrap_err(),
      duplicate("helper", 2, 1)
    );
    assert_eq!(
      lower("fn printf() {}\nfn main() {}").unwrap_err(),
      duplicate("printf", 1, 1)
    );
    assert!(lower("let g = 1;\nlet g = 2;\nfn main() {}").is_ok());
  }

  #[test]
  fn quotes_and_backslashes_are_escaped_in_data() {
    let ir = lower("let p = \"C:\\\";\nfn main() { println(\"a\\b\"); }").unwrap();
    assert!(ir.contains("data $p.bytes = { b \"C:\\\\\", b 0 }\n"));
    assert!(ir.contains("data $str.0 = { b \"%s\\n\", b 0 }\n"));
    assert!(ir.contains("data $str.1 = { b \"a\\\\b\", b 0 }\n"));
  }

  #[test]
  fn locals_do_not_leak_between_functions() {
    let err = lower("fn helper() { let x = 1; }\nfn main() { return x; }").unwrap_err();
    assert_eq!(
      err,
      CompileError::UndefinedVariable {
        name: "x".to_string(),
        line: 2,
        column: 20,
      }
    );
  }

  #[test]
  fn main_is_renamed_at_declaration_and_call_sites() {
    let ir = lower("fn main() { main(); }").unwrap();
    assert!(ir.contains("function l $main.user() {"));
    assert!(ir.contains("\t%t.0 =l call $main.user()\n"));
    assert!(ir.contains("export function l $main() {"));
  }

  #[test]
  fn missing_main_is_fatal() {
    assert_eq!(
      lower("let x = 1;").unwrap_err(),
      CompileError::MissingMain {
        name: "main".to_string()
      }
    );
  }

  #[test]
  fn println_formats_by_argument_syntax() {
    let ir = lower("fn main() { println(1, 2.0, \"s\", x2(), 1 + 1); }\nfn x2() {}").unwrap();
    assert!(ir.contains("data $str.0 = { b \"%d %f %s %s %s\\n\", b 0 }\n"));
    assert!(ir.contains("\t%t.0 =l copy $str.0\n"));
    assert!(ir.contains("\t%t.2 =d copy d_2.0\n"));
    assert!(ir.contains("\t%t.3 =l copy $str.1\n"));
    assert!(ir.contains("call $printf(l %t.0, ..., l %t.1, d %t.2, l %t.3, l %t.4, l %t.7)\n"));
  }

  #[test]
  fn identical_println_shapes_share_one_format_string() {
    let ir = lower("fn main() { println(1, 2); println(3, 4); }").unwrap();
    assert_eq!(ir.matches("data $str.").count(), 1);
    assert_eq!(ir.matches("=l copy $str.0\n").count(), 2);
  }

  #[test]
  fn return_mode_value_returns_the_expression() {
    let options = CompileOptions::default().with_return_mode(ReturnMode::Value);
    let ir = lower_with("fn main() { return 2.5; }", &options).unwrap();
    assert!(ir.contains("\t%t.0 =d copy d_2.5\n\t%t.1 =l dtosi %t.0\n\tret %t.1\n"));
    let ir = lower_with("fn main() { return; }", &options).unwrap();
    assert!(ir.contains("@start\n\tret 0\n@L.0\n"));
  }

  #[test]
  fn top_level_expression_is_rejected() {
    assert_eq!(
      lower("fn main() {}\nprintln(1);").unwrap_err(),
      CompileError::UnsupportedStatement {
        what: "expression statement",
        line: 2,
        column: 1,
      }
    );
  }

  #[test]
  fn nested_function_is_rejected() {
    assert!(matches!(
      lower("fn main() { fn inner() {} }").unwrap_err(),
      CompileError::UnsupportedStatement {
        what: "function declaration",
        line: 1,
        column: 13,
      }
    ));
  }

  #[test]
  fn block_statements_lower_in_place() {
    let p = Pos::new(1, 1);
    let body = Block {
      stmts: vec![Stmt::new(
        StmtKind::Block(Block {
          stmts: vec![Stmt::new(StmtKind::Expr(Expr::int(3, p)), p)],
        }),
        p,
      )],
    };
    let program = Program {
      stmts: vec![Stmt::new(
        StmtKind::Function(FunctionDecl {
          name: "main".to_string(),
          params: Vec::new(),
          body,
        }),
        p,
      )],
    };
    let ir = generate(&program, &CompileOptions::default()).unwrap();
    assert!(ir.contains("@start\n\t%t.0 =l copy 3\n\tret 0\n}\n"));
  }
}
