//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about grammar. It classifies each lexeme as a
//! number, identifier, keyword, string or one of the single-byte symbols and
//! records where it started. The first byte it cannot classify ends the run.

use snafu::ensure;
use tracing::{debug, trace};

use crate::error::{
  CompileResult, MissingFractionDigitSnafu, UnexpectedCharSnafu, UnterminatedStringSnafu,
};

/// Reserved words. `print`, `if`, `else` and `while` have no grammar yet.
pub const KEYWORDS: [&str; 7] = ["let", "print", "if", "else", "while", "fn", "return"];

/// Every byte that forms a one-character symbol token.
pub const SYMBOLS: &[u8] = b"=+-*/(){};,";

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Integer,
  Float,
  Identifier,
  String,
  Symbol,
  Keyword,
}

impl TokenKind {
  pub fn name(self) -> &'static str {
    match self {
      TokenKind::Integer => "Integer",
      TokenKind::Float => "Float",
      TokenKind::Identifier => "Identifier",
      TokenKind::String => "String",
      TokenKind::Symbol => "Symbol",
      TokenKind::Keyword => "Keyword",
    }
  }
}

/// A classified lexeme with its 1-based source position.
///
/// `text` is the literal source text, except for strings where the quotes
/// are stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub line: u32,
  pub column: u32,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
    Self {
      kind,
      text: text.into(),
      line,
      column,
    }
  }

  /// True if this is the symbol or keyword spelled `text`.
  pub fn is(&self, text: &str) -> bool {
    matches!(self.kind, TokenKind::Symbol | TokenKind::Keyword) && self.text == text
  }
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>) -> String {
  match token {
    Some(t) if t.kind == TokenKind::String => format!("\"{}\"", t.text),
    Some(t) => t.text.clone(),
    None => "EOF".to_string(),
  }
}

/// Lex the whole input. Fails on the first byte that starts no token.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut cursor = Cursor::new(input);
  let mut tokens = Vec::new();

  while let Some(c) = cursor.peek() {
    if is_whitespace(c) {
      cursor.advance();
      continue;
    }

    // A leading '.' always starts a number so that `.x` reports the missing
    // fraction digit instead of a bare unexpected character.
    let token = if c.is_ascii_digit() || c == b'.' {
      lex_number(&mut cursor)?
    } else if c.is_ascii_alphabetic() || c == b'_' {
      lex_word(&mut cursor)
    } else if c == b'"' {
      lex_string(&mut cursor)?
    } else if SYMBOLS.contains(&c) {
      let (line, column) = cursor.position();
      cursor.advance();
      Token::new(TokenKind::Symbol, char::from(c).to_string(), line, column)
    } else {
      let (line, column) = cursor.position();
      return UnexpectedCharSnafu {
        line,
        column,
        byte: c,
      }
      .fail();
    };

    trace!(
      kind = token.kind.name(),
      text = %token.text,
      line = token.line,
      column = token.column,
      "token"
    );
    tokens.push(token);
  }

  debug!(count = tokens.len(), "tokenized source");
  Ok(tokens)
}

/// Integer or float literal. Only the first '.' belongs to the literal; a
/// second one is left for the next token.
fn lex_number(cursor: &mut Cursor) -> CompileResult<Token> {
  let (line, column) = cursor.position();
  let start = cursor.pos;
  let mut has_dot = false;

  if cursor.peek() == Some(b'.') {
    has_dot = true;
    cursor.advance();
    let next = cursor.peek();
    ensure!(
      next.is_some_and(|b| b.is_ascii_digit()),
      MissingFractionDigitSnafu {
        line: cursor.line,
        column: cursor.column,
        byte: next.unwrap_or(0),
      }
    );
  }

  while let Some(c) = cursor.peek() {
    if c.is_ascii_digit() {
      cursor.advance();
    } else if c == b'.' && !has_dot {
      has_dot = true;
      cursor.advance();
    } else {
      break;
    }
  }

  let kind = if has_dot {
    TokenKind::Float
  } else {
    TokenKind::Integer
  };
  Ok(Token::new(kind, cursor.slice(start), line, column))
}

fn lex_word(cursor: &mut Cursor) -> Token {
  let (line, column) = cursor.position();
  let start = cursor.pos;
  while cursor
    .peek()
    .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
  {
    cursor.advance();
  }

  let text = cursor.slice(start);
  let kind = if KEYWORDS.contains(&text) {
    TokenKind::Keyword
  } else {
    TokenKind::Identifier
  };
  Token::new(kind, text, line, column)
}

/// String literal. The body is taken verbatim: no escapes are processed.
fn lex_string(cursor: &mut Cursor) -> CompileResult<Token> {
  let (line, column) = cursor.position();
  cursor.advance();
  let start = cursor.pos;

  loop {
    match cursor.peek() {
      Some(b'"') => break,
      Some(_) => cursor.advance(),
      None => {
        return UnterminatedStringSnafu {
          line: cursor.line,
          column: cursor.column,
          byte: 0u8,
        }
        .fail();
      }
    }
  }

  let body = cursor.slice(start);
  cursor.advance();
  Ok(Token::new(TokenKind::String, body, line, column))
}

fn is_whitespace(c: u8) -> bool {
  matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

/// Byte cursor that keeps the 1-based line and column of the next byte.
struct Cursor<'a> {
  source: &'a str,
  pos: usize,
  line: u32,
  column: u32,
}

impl<'a> Cursor<'a> {
  fn new(source: &'a str) -> Self {
    Self {
      source,
      pos: 0,
      line: 1,
      column: 1,
    }
  }

  fn peek(&self) -> Option<u8> {
    self.source.as_bytes().get(self.pos).copied()
  }

  fn position(&self) -> (u32, u32) {
    (self.line, self.column)
  }

  fn advance(&mut self) {
    if let Some(c) = self.peek() {
      self.pos += 1;
      if c == b'\n' {
        self.line += 1;
        self.column = 1;
      } else {
        self.column += 1;
      }
    }
  }

  /// Text from `start` up to the cursor. Token boundaries always fall on
  /// ASCII bytes, so the slice is valid UTF-8.
  fn slice(&self, start: usize) -> &'a str {
    self.source.get(start..self.pos).unwrap_or_default()
  }
}
