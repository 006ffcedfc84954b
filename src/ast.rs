//! Syntax tree produced by the parser and consumed by code generation.
//!
//! Every child is owned by exactly one parent (boxed or stored in a `Vec`), so
//! the tree is dropped as a unit with its `Program`.

use std::fmt;

/// 1-based source position of the token a node was built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
  pub line: u32,
  pub column: u32,
}

impl Pos {
  pub fn new(line: u32, column: u32) -> Self {
    Self { line, column }
  }
}

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "+" => Some(Self::Add),
      "-" => Some(Self::Sub),
      "*" => Some(Self::Mul),
      "/" => Some(Self::Div),
      _ => None,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
    }
  }

  /// Binding strength; higher binds tighter. All operators are left-associative.
  pub fn precedence(self) -> u8 {
    match self {
      Self::Add | Self::Sub => 10,
      Self::Mul | Self::Div => 20,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
  Int(i64),
  Float(f64),
  Str(String),
  Ident(String),
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Call {
    callee: String,
    args: Vec<Expr>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
  pub kind: ExprKind,
  pub pos: Pos,
}

impl Expr {
  pub fn new(kind: ExprKind, pos: Pos) -> Self {
    Self { kind, pos }
  }

  pub fn int(value: i64, pos: Pos) -> Self {
    Self::new(ExprKind::Int(value), pos)
  }

  pub fn float(value: f64, pos: Pos) -> Self {
    Self::new(ExprKind::Float(value), pos)
  }

  pub fn string(value: impl Into<String>, pos: Pos) -> Self {
    Self::new(ExprKind::Str(value.into()), pos)
  }

  pub fn ident(name: impl Into<String>, pos: Pos) -> Self {
    Self::new(ExprKind::Ident(name.into()), pos)
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, pos: Pos) -> Self {
    Self::new(
      ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      pos,
    )
  }

  pub fn call(callee: impl Into<String>, args: Vec<Expr>, pos: Pos) -> Self {
    Self::new(
      ExprKind::Call {
        callee: callee.into(),
        args,
      },
      pos,
    )
  }
}

/// Fully parenthesised source form, e.g. `(1 + (2 * 3))`.
impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      ExprKind::Int(value) => write!(f, "{value}"),
      ExprKind::Float(value) => write!(f, "{value:?}"),
      ExprKind::Str(value) => write!(f, "\"{value}\""),
      ExprKind::Ident(name) => f.write_str(name),
      ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
      ExprKind::Call { callee, args } => {
        write!(f, "{callee}(")?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{arg}")?;
        }
        f.write_str(")")
      }
    }
  }
}

/// `{ ... }` body. Also the body of every function declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
  pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
  pub name: String,
  pub params: Vec<String>,
  pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
  Let { name: String, value: Expr },
  Expr(Expr),
  /// `None` is a bare `return;`.
  Return(Option<Expr>),
  Block(Block),
  Function(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
  pub kind: StmtKind,
  pub pos: Pos,
}

impl Stmt {
  pub fn new(kind: StmtKind, pos: Pos) -> Self {
    Self { kind, pos }
  }

  /// Short name used in diagnostics.
  pub fn describe(&self) -> &'static str {
    match self.kind {
      StmtKind::Let { .. } => "let binding",
      StmtKind::Expr(_) => "expression statement",
      StmtKind::Return(_) => "return",
      StmtKind::Block(_) => "block",
      StmtKind::Function(_) => "function declaration",
    }
  }
}

/// Top-level statements in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
  pub stmts: Vec<Stmt>,
}

impl Program {
  /// Top-level function declarations with their positions, in source order.
  pub fn functions(&self) -> impl Iterator<Item = (&FunctionDecl, Pos)> {
    self.stmts.iter().filter_map(|stmt| match &stmt.kind {
      StmtKind::Function(func) => Some((func, stmt.pos)),
      _ => None,
    })
  }
}
