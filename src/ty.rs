//! Value classes of the emitted IR.
//!
//! The language is untyped, so only two QBE base classes are ever used:
//! `l` for integers and pointers (strings, globals) and `d` for floats.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
  Long,
  Double,
}

impl IrType {
  /// Class letter used in instructions and data definitions.
  pub fn suffix(self) -> &'static str {
    match self {
      IrType::Long => "l",
      IrType::Double => "d",
    }
  }

  pub fn is_float(self) -> bool {
    matches!(self, IrType::Double)
  }
}

impl fmt::Display for IrType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.suffix())
  }
}

/// Operand of an IR instruction: a register, a global symbol or an immediate,
/// together with its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
  pub repr: String,
  pub ty: IrType,
}

impl Value {
  pub fn new(repr: impl Into<String>, ty: IrType) -> Self {
    Self {
      repr: repr.into(),
      ty,
    }
  }

  pub fn long(repr: impl Into<String>) -> Self {
    Self::new(repr, IrType::Long)
  }

  /// `<class> <operand>`, the form used in call argument lists.
  pub fn typed(&self) -> String {
    format!("{} {}", self.ty, self.repr)
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.repr)
  }
}
