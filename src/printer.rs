//! Human-readable dumps of intermediate stages, used by `--emit tokens|ast`.

use crate::ast::{Expr, ExprKind, Program, Stmt, StmtKind};
use crate::tokenizer::Token;

/// One line per token: kind, quoted text and start position.
pub fn format_tokens(tokens: &[Token]) -> String {
  let mut out = String::new();
  for token in tokens {
    out.push_str(&format!(
      "[{}]\t\"{}\"\tat line {}, column {}\n",
      token.kind.name(),
      token.text,
      token.line,
      token.column
    ));
  }
  out
}

/// Indented tree, two spaces per level.
pub fn format_program(program: &Program) -> String {
  let mut printer = AstPrinter::default();
  for stmt in &program.stmts {
    printer.stmt(stmt);
  }
  printer.out
}

#[derive(Default)]
struct AstPrinter {
  out: String,
  indent: usize,
}

impl AstPrinter {
  fn line(&mut self, text: &str) {
    self.out.push_str(&"  ".repeat(self.indent));
    self.out.push_str(text);
    self.out.push('\n');
  }

  fn nested(&mut self, f: impl FnOnce(&mut Self)) {
    self.indent += 1;
    f(self);
    self.indent -= 1;
  }

  fn stmt(&mut self, stmt: &Stmt) {
    match &stmt.kind {
      StmtKind::Let { name, value } => {
        self.line(&format!("LetStmt: {name}"));
        self.nested(|p| p.expr(value));
      }
      StmtKind::Expr(expr) => {
        self.line("ExprStmt:");
        self.nested(|p| p.expr(expr));
      }
      StmtKind::Return(value) => {
        self.line("ReturnStmt:");
        if let Some(value) = value {
          self.nested(|p| p.expr(value));
        }
      }
      StmtKind::Block(block) => {
        self.line("BlockStmt:");
        self.nested(|p| block.stmts.iter().for_each(|s| p.stmt(s)));
      }
      StmtKind::Function(func) => {
        self.line(&format!(
          "FunctionStmt: {}({})",
          func.name,
          func.params.join(", ")
        ));
        self.nested(|p| func.body.stmts.iter().for_each(|s| p.stmt(s)));
      }
    }
  }

  fn expr(&mut self, expr: &Expr) {
    match &expr.kind {
      ExprKind::Int(value) => self.line(&format!("IntExpr: {value}")),
      ExprKind::Float(value) => self.line(&format!("FloatExpr: {value:?}")),
      ExprKind::Str(value) => self.line(&format!("StringExpr: \"{value}\"")),
      ExprKind::Ident(name) => self.line(&format!("IdentifierExpr: {name}")),
      ExprKind::Binary { op, lhs, rhs } => {
        self.line(&format!("BinaryExpr: {}", op.symbol()));
        self.nested(|p| {
          p.expr(lhs);
          p.expr(rhs);
        });
      }
      ExprKind::Call { callee, args } => {
        self.line(&format!("CallExpr: {callee}"));
        self.nested(|p| args.iter().for_each(|arg| p.expr(arg)));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  #[test]
  fn token_listing() {
    let tokens = tokenize("let x = \"hi\";").unwrap();
    assert_eq!(
      format_tokens(&tokens[..2]),
      "[Keyword]\t\"let\"\tat line 1, column 1\n[Identifier]\t\"x\"\tat line 1, column 5\n"
    );
  }

  #[test]
  fn tree_dump_is_indented() {
    let source = "fn main(a) { let b = a * 2; println(b, 1.5); return; }";
    let program = parse(tokenize(source).unwrap()).unwrap();
    assert_eq!(
      format_program(&program),
      "FunctionStmt: main(a)\n\
       \x20 LetStmt: b\n\
       \x20   BinaryExpr: *\n\
       \x20     IdentifierExpr: a\n\
       \x20     IntExpr: 2\n\
       \x20 ExprStmt:\n\
       \x20   CallExpr: println\n\
       \x20     IdentifierExpr: b\n\
       \x20     FloatExpr: 1.5\n\
       \x20 ReturnStmt:\n"
    );
  }
}
