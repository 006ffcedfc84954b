//! Recursive-descent parser producing the top-level statement list.
//!
//! Declarations and statements are parsed by one helper per grammar rule.
//! Expressions use precedence climbing: a primary operand is parsed first and
//! then folded with every following operator that binds tighter than the
//! caller's threshold. Only one token of lookahead is ever needed.
//!
//! ```text
//! declaration := "let" IDENT "=" expr ";"
//!              | "fn" IDENT "(" [IDENT ("," IDENT)*] ")" block
//!              | statement
//! statement   := "return" [expr] ";" | expr ";"
//! block       := "{" declaration* "}"
//! primary     := INT | FLOAT | STRING | IDENT ["(" [expr ("," expr)*] ")"]
//!              | "(" expr ")"
//! ```

use tracing::debug;

use crate::ast::{BinaryOp, Block, Expr, FunctionDecl, Pos, Program, Stmt, StmtKind};
use crate::error::{
  CompileError, CompileResult, InvalidLiteralSnafu, NestingTooDeepSnafu, UnexpectedEofSnafu,
  UnexpectedTokenSnafu,
};
use crate::tokenizer::{Token, TokenKind, describe_token};

/// Deepest allowed nesting of expressions and blocks.
pub const MAX_NESTING: usize = 128;

/// Parse the whole token sequence into a program.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens);
  let mut stmts = Vec::new();

  while !stream.is_eof() {
    stmts.push(parse_declaration(&mut stream)?);
  }

  debug!(statements = stmts.len(), "parsed program");
  Ok(Program { stmts })
}

fn parse_declaration(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.equal("let") {
    return parse_let(stream);
  }
  if stream.equal("fn") {
    return parse_function(stream);
  }
  parse_statement(stream)
}

fn parse_let(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let pos = stream.previous_pos();
  let (name, _) = stream.get_ident("variable name after 'let'")?;
  stream.skip("=")?;
  let value = parse_expr(stream)?;
  stream.skip(";")?;
  Ok(Stmt::new(StmtKind::Let { name, value }, pos))
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let pos = stream.previous_pos();
  let (name, _) = stream.get_ident("function name after 'fn'")?;
  stream.skip("(")?;

  let mut params = Vec::new();
  if !stream.equal(")") {
    loop {
      let (param, _) = stream.get_ident("parameter name")?;
      params.push(param);
      if stream.equal(",") {
        continue;
      }
      stream.skip(")")?;
      break;
    }
  }

  let body = parse_block(stream)?;
  debug!(
    function = %name,
    params = params.len(),
    statements = body.stmts.len(),
    "parsed function"
  );
  Ok(Stmt::new(
    StmtKind::Function(FunctionDecl { name, params, body }),
    pos,
  ))
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Block> {
  stream.descend()?;
  stream.skip("{")?;
  let mut stmts = Vec::new();
  while !stream.equal("}") {
    if stream.is_eof() {
      return Err(stream.eof_error("'}'"));
    }
    stmts.push(parse_declaration(stream)?);
  }
  stream.ascend();
  Ok(Block { stmts })
}

fn parse_statement(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.equal("return") {
    let pos = stream.previous_pos();
    let value = if stream.equal(";") {
      None
    } else {
      let value = parse_expr(stream)?;
      stream.skip(";")?;
      Some(value)
    };
    return Ok(Stmt::new(StmtKind::Return(value), pos));
  }

  let expr = parse_expr(stream)?;
  let pos = expr.pos;
  stream.skip(";")?;
  Ok(Stmt::new(StmtKind::Expr(expr), pos))
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_binary(stream, 0)
}

/// Fold operators binding tighter than `min_prec` onto the primary operand.
/// The right operand is parsed at the operator's own precedence, so an
/// operator of equal strength ends that recursion and chains associate left.
fn parse_binary(stream: &mut TokenStream, min_prec: u8) -> CompileResult<Expr> {
  stream.descend()?;
  let mut lhs = parse_primary(stream)?;

  loop {
    let Some(op) = stream.peek_operator() else {
      break;
    };
    if op.precedence() <= min_prec {
      break;
    }

    let pos = stream.advance_pos();
    let rhs = parse_binary(stream, op.precedence())?;
    lhs = Expr::binary(op, lhs, rhs, pos);
  }

  stream.ascend();
  Ok(lhs)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let Some(token) = stream.peek().cloned() else {
    return Err(stream.eof_error("expression"));
  };
  let pos = Pos::new(token.line, token.column);

  match token.kind {
    TokenKind::Integer => {
      stream.pos += 1;
      let value = token.text.parse::<i64>().map_err(|_| {
        InvalidLiteralSnafu {
          what: "integer",
          text: token.text.clone(),
          line: token.line,
          column: token.column,
        }
        .build()
      })?;
      Ok(Expr::int(value, pos))
    }
    TokenKind::Float => {
      stream.pos += 1;
      let value = token.text.parse::<f64>().map_err(|_| {
        InvalidLiteralSnafu {
          what: "float",
          text: token.text.clone(),
          line: token.line,
          column: token.column,
        }
        .build()
      })?;
      Ok(Expr::float(value, pos))
    }
    TokenKind::String => {
      stream.pos += 1;
      Ok(Expr::string(token.text, pos))
    }
    TokenKind::Identifier => {
      stream.pos += 1;
      if stream.equal("(") {
        let args = parse_args(stream)?;
        return Ok(Expr::call(token.text, args, pos));
      }
      Ok(Expr::ident(token.text, pos))
    }
    TokenKind::Symbol if token.is("(") => {
      stream.pos += 1;
      let node = parse_expr(stream)?;
      stream.skip(")")?;
      Ok(node)
    }
    TokenKind::Symbol | TokenKind::Keyword => Err(stream.unexpected("expression")),
  }
}

/// Argument list after the opening parenthesis. A trailing comma is rejected
/// because an expression must follow every comma.
fn parse_args(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
  let mut args = Vec::new();
  if stream.equal(")") {
    return Ok(args);
  }
  loop {
    args.push(parse_expr(stream)?);
    if stream.equal(",") {
      continue;
    }
    stream.skip(")")?;
    return Ok(args);
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
  depth: usize,
}

impl TokenStream {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>) -> Self {
    Self {
      tokens,
      pos: 0,
      depth: 0,
    }
  }

  /// Enter one nesting level, failing at the current token past [`MAX_NESTING`].
  fn descend(&mut self) -> CompileResult<()> {
    self.depth += 1;
    if self.depth <= MAX_NESTING {
      return Ok(());
    }
    let (line, column) = self
      .peek()
      .or_else(|| self.tokens.last())
      .map_or((1, 1), |token| (token.line, token.column));
    NestingTooDeepSnafu {
      limit: MAX_NESTING,
      found: describe_token(self.peek()),
      line,
      column,
    }
    .fail()
  }

  fn ascend(&mut self) {
    self.depth = self.depth.saturating_sub(1);
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn previous(&self) -> Option<&Token> {
    self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
  }

  fn previous_pos(&self) -> Pos {
    self
      .previous()
      .map(|token| Pos::new(token.line, token.column))
      .unwrap_or_default()
  }

  /// Step over the current token and return where it was.
  fn advance_pos(&mut self) -> Pos {
    let pos = self
      .peek()
      .map(|token| Pos::new(token.line, token.column))
      .unwrap_or_default();
    self.pos += 1;
    pos
  }

  fn peek_operator(&self) -> Option<BinaryOp> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Symbol)
      .and_then(|token| BinaryOp::from_symbol(&token.text))
  }

  /// Consume the current token if it is the symbol or keyword `text`.
  fn equal(&mut self, text: &str) -> bool {
    if let Some(token) = self.peek()
      && token.is(text)
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("'{s}'")))
    }
  }

  /// Consume an identifier, returning its name and position.
  fn get_ident(&mut self, expected: &str) -> CompileResult<(String, Pos)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Identifier
    {
      let ident = (token.text.clone(), Pos::new(token.line, token.column));
      self.pos += 1;
      return Ok(ident);
    }
    Err(self.unexpected(expected))
  }

  /// Error for the current token, or the end-of-input error if there is none.
  fn unexpected(&self, expected: &str) -> CompileError {
    match self.peek() {
      Some(token) => UnexpectedTokenSnafu {
        expected,
        found: describe_token(Some(token)),
        line: token.line,
        column: token.column,
      }
      .build(),
      None => self.eof_error(expected),
    }
  }

  /// End-of-input error placed just past the last token.
  fn eof_error(&self, expected: &str) -> CompileError {
    let (line, column) = match self.tokens.last() {
      Some(token) => {
        let quotes = if token.kind == TokenKind::String { 2 } else { 0 };
        let width = u32::try_from(token.text.len() + quotes).unwrap_or(u32::MAX);
        (token.line, token.column.saturating_add(width))
      }
      None => (1, 1),
    };
    UnexpectedEofSnafu {
      expected,
      line,
      column,
    }
    .build()
  }

  fn is_eof(&self) -> bool {
    self.peek().is_none()
  }
}
