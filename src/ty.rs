//! The Simple C type system.
//!
//! A type is a scalar, an array, a function, or the error type, described
//! by a base specifier plus a level of indirection. Types are pure values:
//! cheap to clone, never mutated, compared structurally. The error type is
//! contagious by convention — the checker never operates on it, it only
//! propagates it — so equality treats any two error types as equal.

use std::fmt;

use crate::machine::{SIZEOF_CHAR, SIZEOF_INT, SIZEOF_LONG, SIZEOF_PTR};

/// Base type keyword of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
  Char,
  Int,
  Long,
  Void,
}

impl fmt::Display for Specifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Specifier::Char => "char",
      Specifier::Int => "int",
      Specifier::Long => "long",
      Specifier::Void => "void",
    };
    write!(f, "{name}")
  }
}

/// The parameter list of a function type.
///
/// Simple C distinguishes three states that a nullable list would
/// conflate: a function declared as `f()` has no parameter information at
/// all, `f(void)` is prototyped with zero parameters, and a definition
/// carries the full list. `Unspecified` compares equal to anything, which
/// is how an old-style declaration stays compatible with a later
/// definition.
#[derive(Debug, Clone)]
pub enum Parameters {
  Unspecified,
  Empty,
  Known(Vec<Type>),
}

impl Parameters {
  /// The declared parameter types, or `None` when the function was never
  /// prototyped. An empty slice means "takes no arguments".
  pub fn types(&self) -> Option<&[Type]> {
    match self {
      Parameters::Unspecified => None,
      Parameters::Empty => Some(&[]),
      Parameters::Known(types) => Some(types),
    }
  }
}

impl PartialEq for Parameters {
  fn eq(&self, other: &Self) -> bool {
    match (self.types(), other.types()) {
      (Some(lhs), Some(rhs)) => lhs == rhs,
      // An unprototyped declaration is compatible with any list.
      _ => true,
    }
  }
}

/// A Simple C type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
  Error,
  Scalar {
    specifier: Specifier,
    indirection: u32,
  },
  Array {
    specifier: Specifier,
    indirection: u32,
    length: u64,
  },
  Function {
    specifier: Specifier,
    indirection: u32,
    parameters: Parameters,
  },
}

impl Type {
  pub fn scalar(specifier: Specifier, indirection: u32) -> Self {
    Type::Scalar {
      specifier,
      indirection,
    }
  }

  pub fn array(specifier: Specifier, indirection: u32, length: u64) -> Self {
    Type::Array {
      specifier,
      indirection,
      length,
    }
  }

  pub fn function(specifier: Specifier, indirection: u32, parameters: Parameters) -> Self {
    Type::Function {
      specifier,
      indirection,
      parameters,
    }
  }

  pub fn char() -> Self {
    Type::scalar(Specifier::Char, 0)
  }

  pub fn int() -> Self {
    Type::scalar(Specifier::Int, 0)
  }

  pub fn long() -> Self {
    Type::scalar(Specifier::Long, 0)
  }

  pub fn void_pointer() -> Self {
    Type::scalar(Specifier::Void, 1)
  }

  /// The base specifier. Must not be called on the error type.
  pub fn specifier(&self) -> Specifier {
    match self {
      Type::Error => panic!("error type has no specifier"),
      Type::Scalar { specifier, .. }
      | Type::Array { specifier, .. }
      | Type::Function { specifier, .. } => *specifier,
    }
  }

  /// The number of pointer levels. Must not be called on the error type.
  pub fn indirection(&self) -> u32 {
    match self {
      Type::Error => panic!("error type has no indirection"),
      Type::Scalar { indirection, .. }
      | Type::Array { indirection, .. }
      | Type::Function { indirection, .. } => *indirection,
    }
  }

  /// The element count of an array type.
  pub fn length(&self) -> u64 {
    match self {
      Type::Array { length, .. } => *length,
      other => panic!("length() on non-array type {other}"),
    }
  }

  /// The parameter list of a function type.
  pub fn parameters(&self) -> &Parameters {
    match self {
      Type::Function { parameters, .. } => parameters,
      other => panic!("parameters() on non-function type {other}"),
    }
  }

  pub fn is_error(&self) -> bool {
    matches!(self, Type::Error)
  }

  pub fn is_scalar(&self) -> bool {
    matches!(self, Type::Scalar { .. })
  }

  pub fn is_array(&self) -> bool {
    matches!(self, Type::Array { .. })
  }

  pub fn is_function(&self) -> bool {
    matches!(self, Type::Function { .. })
  }

  /// A numeric type is a non-void scalar with no indirection.
  pub fn is_numeric(&self) -> bool {
    matches!(
      self,
      Type::Scalar {
        specifier,
        indirection: 0,
      } if *specifier != Specifier::Void
    )
  }

  /// A pointer type, counting arrays as pointers since they decay.
  pub fn is_pointer(&self) -> bool {
    match self {
      Type::Scalar { indirection, .. } => *indirection > 0,
      Type::Array { .. } => true,
      _ => false,
    }
  }

  /// A predicate type can appear as a boolean condition.
  pub fn is_predicate(&self) -> bool {
    self.is_numeric() || self.is_pointer()
  }

  /// Perform type promotion: a character becomes an integer and an array
  /// decays to a pointer. Every other type is unchanged.
  pub fn promote(&self) -> Type {
    match self {
      Type::Scalar {
        specifier: Specifier::Char,
        indirection: 0,
      } => Type::int(),
      Type::Array {
        specifier,
        indirection,
        ..
      } => Type::scalar(*specifier, indirection + 1),
      other => other.clone(),
    }
  }

  /// Two types are compatible if both are numeric, or both are pointers
  /// that are identical after promotion, or either side is `void *`.
  pub fn is_compatible_with(&self, that: &Type) -> bool {
    if self.is_numeric() && that.is_numeric() {
      return true;
    }

    if !self.is_pointer() || !that.is_pointer() {
      return false;
    }

    self.promote() == that.promote()
      || *self == Type::void_pointer()
      || *that == Type::void_pointer()
  }

  /// Strip one level of indirection. The type must be a scalar pointer;
  /// anything else is a bug in the caller.
  pub fn deref(&self) -> Type {
    match self {
      Type::Scalar {
        specifier,
        indirection,
      } if *indirection > 0 => Type::scalar(*specifier, indirection - 1),
      other => panic!("deref() on non-pointer type {other}"),
    }
  }

  /// The size of the type in bytes on the target machine. Undefined for
  /// function and error types.
  pub fn size(&self) -> u64 {
    assert!(
      !self.is_function() && !self.is_error(),
      "size() on {self:?}"
    );

    let count = if self.is_array() { self.length() } else { 1 };

    if self.indirection() > 0 {
      return count * SIZEOF_PTR;
    }

    let width = match self.specifier() {
      Specifier::Char => SIZEOF_CHAR,
      Specifier::Int => SIZEOF_INT,
      Specifier::Long => SIZEOF_LONG,
      Specifier::Void => 0,
    };

    count * width
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_error() {
      return write!(f, "error");
    }

    write!(f, "{}", self.specifier())?;

    if self.indirection() > 0 {
      write!(f, " {}", "*".repeat(self.indirection() as usize))?;
    }

    if self.is_array() {
      write!(f, "[{}]", self.length())?;
    } else if self.is_function() {
      write!(f, "()")?;
    }

    Ok(())
  }
}
