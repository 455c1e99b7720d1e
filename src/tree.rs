//! Abstract syntax trees for Simple C.
//!
//! The trees built here are the *checked* trees: every expression already
//! carries its resolved type, and all implicit conversions have been made
//! explicit by the checker (casts, array decay, pointer scaling). The
//! code generator never needs to re-derive a type.
//!
//! `Display` prints the tree in a LISP-like form with C operators, the
//! same format the original tree writer used. It has no role in the
//! compiler proper but makes checker tests read naturally.

use std::fmt;

use crate::scope::{ScopeId, SymbolId, SymbolTable};
use crate::ty::{Specifier, Type};

/// Identifies an expression node for the generator's register bindings.
/// Ids are unique across a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Multiply,
  Divide,
  Remainder,
  Add,
  Subtract,
  LessThan,
  GreaterThan,
  LessOrEqual,
  GreaterOrEqual,
  Equal,
  NotEqual,
  LogicalAnd,
  LogicalOr,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Multiply => "*",
      BinaryOp::Divide => "/",
      BinaryOp::Remainder => "%",
      BinaryOp::Add => "+",
      BinaryOp::Subtract => "-",
      BinaryOp::LessThan => "<",
      BinaryOp::GreaterThan => ">",
      BinaryOp::LessOrEqual => "<=",
      BinaryOp::GreaterOrEqual => ">=",
      BinaryOp::Equal => "==",
      BinaryOp::NotEqual => "!=",
      BinaryOp::LogicalAnd => "&&",
      BinaryOp::LogicalOr => "||",
    }
  }
}

/// A typed expression node.
#[derive(Debug)]
pub struct Expression {
  pub id: NodeId,
  pub ty: Type,
  pub lvalue: bool,
  pub kind: ExprKind,
}

#[derive(Debug)]
pub enum ExprKind {
  Number(u64),
  String(String),
  Identifier(SymbolId),
  Call {
    callee: SymbolId,
    args: Vec<Expression>,
  },
  Not(Box<Expression>),
  Negate(Box<Expression>),
  Dereference(Box<Expression>),
  Address(Box<Expression>),
  Cast(Box<Expression>),
  Binary {
    op: BinaryOp,
    left: Box<Expression>,
    right: Box<Expression>,
  },
}

impl Expression {
  /// The literal value, if this node is a number.
  pub fn as_number(&self) -> Option<u64> {
    match self.kind {
      ExprKind::Number(value) => Some(value),
      _ => None,
    }
  }

  /// The pointer operand, if this node is a dereference. Assignment and
  /// address-of generation treat `*p` specially.
  pub fn as_dereference(&self) -> Option<&Expression> {
    match &self.kind {
      ExprKind::Dereference(pointer) => Some(pointer),
      _ => None,
    }
  }
}

/// A statement. Statements never carry a type.
#[derive(Debug)]
pub enum Statement {
  Simple(Expression),
  Assignment {
    left: Expression,
    right: Expression,
  },
  Return(Expression),
  Block(Block),
  While {
    test: Expression,
    body: Box<Statement>,
  },
  For {
    init: Box<Statement>,
    test: Expression,
    step: Box<Statement>,
    body: Box<Statement>,
  },
  If {
    test: Expression,
    then_stmt: Box<Statement>,
    else_stmt: Option<Box<Statement>>,
  },
}

/// A compound statement owning its declarations and children.
#[derive(Debug)]
pub struct Block {
  pub scope: ScopeId,
  pub statements: Vec<Statement>,
}

/// A function definition: the defining symbol plus its body.
#[derive(Debug)]
pub struct Function {
  pub id: SymbolId,
  pub body: Block,
}

/// Everything the parser hands to the back end: function definitions in
/// source order and the file-level scope holding the globals.
#[derive(Debug)]
pub struct TranslationUnit {
  pub functions: Vec<Function>,
  pub globals: ScopeId,
}

/* Tree writing. Symbol names are not reachable from here without the
   table, so identifiers and calls print through a borrowed table via
   `display`. */

impl Expression {
  /// Render the tree against the table that owns its symbols.
  pub fn display<'a>(&'a self, table: &'a SymbolTable) -> ExprDisplay<'a> {
    ExprDisplay { expr: self, table }
  }
}

pub struct ExprDisplay<'a> {
  expr: &'a Expression,
  table: &'a SymbolTable,
}

impl fmt::Display for ExprDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write_expr(self.expr, self.table, f)
  }
}

fn write_expr(expr: &Expression, table: &SymbolTable, f: &mut fmt::Formatter<'_>) -> fmt::Result {
  let child = |e: &'_ Expression| -> String { e.display(table).to_string() };

  match &expr.kind {
    ExprKind::Number(value) => {
      write!(f, "{value}")?;
      if !expr.ty.is_error() && expr.ty.specifier() == Specifier::Long {
        write!(f, "L")?;
      }
      Ok(())
    }
    ExprKind::String(value) => write!(f, "\"{value}\""),
    ExprKind::Identifier(symbol) => write!(f, "{}", table.symbol(*symbol).name()),
    ExprKind::Call { callee, args } => {
      write!(f, "({}", table.symbol(*callee).name())?;
      for arg in args {
        write!(f, " {}", child(arg))?;
      }
      write!(f, ")")
    }
    ExprKind::Not(operand) => write!(f, "(! {})", child(operand)),
    ExprKind::Negate(operand) => write!(f, "(- {})", child(operand)),
    ExprKind::Dereference(operand) => write!(f, "(* {})", child(operand)),
    ExprKind::Address(operand) => write!(f, "(& {})", child(operand)),
    ExprKind::Cast(operand) => write!(f, "({} {})", expr.ty, child(operand)),
    ExprKind::Binary { op, left, right } => {
      write!(f, "({} {} {})", op.symbol(), child(left), child(right))
    }
  }
}

impl Statement {
  pub fn display<'a>(&'a self, table: &'a SymbolTable) -> StmtDisplay<'a> {
    StmtDisplay { stmt: self, table }
  }
}

pub struct StmtDisplay<'a> {
  stmt: &'a Statement,
  table: &'a SymbolTable,
}

impl fmt::Display for StmtDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.stmt {
      Statement::Simple(expr) => write!(f, "{}", expr.display(self.table)),
      Statement::Assignment { left, right } => write!(
        f,
        "(= {} {})",
        left.display(self.table),
        right.display(self.table)
      ),
      Statement::Return(expr) => write!(f, "(return {})", expr.display(self.table)),
      Statement::Block(block) => {
        write!(f, "(begin")?;
        for stmt in &block.statements {
          write!(f, " {}", stmt.display(self.table))?;
        }
        write!(f, ")")
      }
      Statement::While { test, body } => write!(
        f,
        "(while {} {})",
        test.display(self.table),
        body.display(self.table)
      ),
      Statement::For {
        init, test, body, ..
      } => write!(
        f,
        "(for {} {} {})",
        init.display(self.table),
        test.display(self.table),
        body.display(self.table)
      ),
      Statement::If {
        test,
        then_stmt,
        else_stmt,
      } => {
        write!(
          f,
          "(if {} {}",
          test.display(self.table),
          then_stmt.display(self.table)
        )?;
        if let Some(else_stmt) = else_stmt {
          write!(f, " {}", else_stmt.display(self.table))?;
        }
        write!(f, ")")
      }
    }
  }
}
