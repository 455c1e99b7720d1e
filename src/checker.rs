//! Semantic analysis.
//!
//! The checker owns the symbol table and the diagnostic reporter. The
//! parser calls into it for every declaration and every expression it
//! recognises, and gets back a fully typed tree with all implicit
//! conversions spelled out as explicit nodes: character operands are cast
//! to int, arrays decay to addresses, and pointer arithmetic is scaled by
//! the element size. Later passes never consult the language rules again.
//!
//! Semantic errors are not fatal. The offending expression gets the error
//! type, which silences all further diagnostics involving it, and checking
//! continues so a single run reports every independent mistake.

use crate::error::Reporter;
use crate::scope::{Symbol, SymbolId, SymbolTable};
use crate::tree::{BinaryOp, ExprKind, Expression, NodeId, Statement};
use crate::ty::{Parameters, Specifier, Type};

pub struct Checker {
  pub table: SymbolTable,
  pub reporter: Reporter,
  next_node: u32,
  line: usize,
}

impl Default for Checker {
  fn default() -> Self {
    Self::new()
  }
}

impl Checker {
  pub fn new() -> Self {
    Self {
      table: SymbolTable::new(),
      reporter: Reporter::new(),
      next_node: 0,
      line: 1,
    }
  }

  /// Anchor subsequent diagnostics at this source line.
  pub fn set_line(&mut self, line: usize) {
    self.line = line;
  }

  fn next_id(&mut self) -> NodeId {
    let id = NodeId(self.next_node);
    self.next_node += 1;
    id
  }

  fn expr(&mut self, ty: Type, lvalue: bool, kind: ExprKind) -> Expression {
    Expression {
      id: self.next_id(),
      ty,
      lvalue,
      kind,
    }
  }

  /* Implicit conversions. These build the extra tree nodes that make
     later passes type-blind. */

  /// Type promotion: a char becomes an int by an explicit cast, and an
  /// array decays to the address of its first element.
  fn promote(&mut self, expr: Expression) -> Expression {
    if expr.ty.is_error() {
      return expr;
    }

    if expr.ty.is_array() {
      let ty = expr.ty.promote();
      log::debug!("promoting array to {ty}");
      return self.expr(ty, false, ExprKind::Address(Box::new(expr)));
    }

    if expr.ty == Type::char() {
      return self.expr(Type::int(), false, ExprKind::Cast(Box::new(expr)));
    }

    expr
  }

  /// Wrap `expr` in a cast to `ty`. An int literal widening to long is
  /// simply retyped; every other cast is performed at run time, including
  /// narrowing a literal.
  fn cast(&mut self, expr: Expression, ty: Type) -> Expression {
    if expr.ty == Type::int()
      && ty == Type::long()
      && let Some(value) = expr.as_number()
    {
      return self.expr(ty, false, ExprKind::Number(value));
    }
    self.expr(ty, false, ExprKind::Cast(Box::new(expr)))
  }

  /// Convert `expr` to `ty` where an implicit conversion exists: array
  /// decay toward a pointer target and numeric widening or narrowing.
  fn convert(&mut self, expr: Expression, ty: &Type) -> Expression {
    let mut expr = expr;

    if expr.ty.is_array() && ty.is_pointer() {
      expr = self.promote(expr);
    }

    if expr.ty != *ty && expr.ty.is_numeric() && ty.is_numeric() {
      expr = self.cast(expr, ty.clone());
    }

    expr
  }

  /// Promote and then widen to `ty` unconditionally. Used for array
  /// subscripts, which are computed in full pointer width.
  fn extend(&mut self, expr: Expression, ty: Type) -> Expression {
    let expr = self.promote(expr);
    if expr.ty != ty {
      return self.cast(expr, ty);
    }
    expr
  }

  /// Scale a numeric expression by an element size for pointer
  /// arithmetic. A literal is folded on the spot.
  fn scale(&mut self, expr: Expression, size: u64) -> Expression {
    if let Some(value) = expr.as_number() {
      return self.expr(Type::long(), false, ExprKind::Number(value * size));
    }

    let expr = self.extend(expr, Type::long());
    let amount = self.expr(Type::long(), false, ExprKind::Number(size));
    self.expr(
      Type::long(),
      false,
      ExprKind::Binary {
        op: BinaryOp::Multiply,
        left: Box::new(expr),
        right: Box::new(amount),
      },
    )
  }

  fn binary(&mut self, op: BinaryOp, ty: Type, left: Expression, right: Expression) -> Expression {
    self.expr(
      ty,
      false,
      ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
      },
    )
  }

  /* Declarations. */

  /// Diagnose a scalar `void` declaration. The symbol still binds with
  /// its declared type, so later uses fail the operand checks.
  fn void_checked(&mut self, name: &str, ty: Type) -> Type {
    if !ty.is_function() && ty.specifier() == Specifier::Void && ty.indirection() == 0 {
      self.reporter.report(self.line, format!("'{name}' has type void"));
    }
    ty
  }

  /// Declare a variable or parameter in the current scope.
  pub fn declare_variable(&mut self, name: &str, ty: Type) -> SymbolId {
    let scope = self.table.current();

    match self.table.find(scope, name) {
      None => {
        let ty = self.void_checked(name, ty);
        self.table.insert(scope, Symbol::new(name, ty))
      }
      Some(id) => {
        if scope != self.table.globals() {
          self.reporter.report(self.line, format!("redeclaration of '{name}'"));
        } else if *self.table.symbol(id).ty() != ty {
          self
            .reporter
            .report(self.line, format!("conflicting types for '{name}'"));
        }
        id
      }
    }
  }

  /// Declare a function at file scope.
  pub fn declare_function(&mut self, name: &str, ty: Type) -> SymbolId {
    let globals = self.table.globals();

    match self.table.find(globals, name) {
      None => self.table.insert(globals, Symbol::new(name, ty)),
      Some(id) => {
        if *self.table.symbol(id).ty() != ty {
          self
            .reporter
            .report(self.line, format!("conflicting types for '{name}'"));
        }
        id
      }
    }
  }

  /// Define a function at file scope. The new symbol replaces any
  /// previous declaration so the parameter types become known.
  pub fn define_function(&mut self, name: &str, ty: Type) -> SymbolId {
    let globals = self.table.globals();

    if let Some(id) = self.table.find(globals, name) {
      let previous = self.table.symbol(id).ty();
      if previous.is_function()
        && matches!(previous.parameters(), Parameters::Empty | Parameters::Known(_))
      {
        self.reporter.report(self.line, format!("redefinition of '{name}'"));
      } else if *previous != ty {
        self
          .reporter
          .report(self.line, format!("conflicting types for '{name}'"));
      }
      self.table.remove(globals, name);
    }

    self.table.insert(globals, Symbol::new(name, ty))
  }

  /* Expressions. */

  pub fn number(&mut self, value: u64, long: bool) -> Expression {
    let ty = if long { Type::long() } else { Type::int() };
    self.expr(ty, false, ExprKind::Number(value))
  }

  /// A string literal has type array of char, counting the terminating
  /// nul.
  pub fn string(&mut self, value: String) -> Expression {
    let ty = Type::array(Specifier::Char, 0, value.len() as u64 + 1);
    self.expr(ty, false, ExprKind::String(value))
  }

  /// Use of an identifier in an expression. An undeclared name is
  /// reported once and then given the error type in the innermost scope,
  /// so further uses stay quiet.
  pub fn check_identifier(&mut self, name: &str) -> Expression {
    let scope = self.table.current();
    let id = match self.table.lookup(scope, name) {
      Some(id) => id,
      None => {
        self.reporter.report(self.line, format!("'{name}' undeclared"));
        self.table.insert(scope, Symbol::new(name, Type::Error))
      }
    };

    let ty = self.table.symbol(id).ty().clone();
    let lvalue = ty.is_scalar();
    self.expr(ty, lvalue, ExprKind::Identifier(id))
  }

  /// Resolve the callee of a function call. An undeclared name is
  /// implicitly declared at file scope as `int name()`.
  pub fn check_function(&mut self, name: &str) -> SymbolId {
    let scope = self.table.current();
    match self.table.lookup(scope, name) {
      Some(id) => id,
      None => {
        let ty = Type::function(Specifier::Int, 0, Parameters::Unspecified);
        let globals = self.table.globals();
        self.table.insert(globals, Symbol::new(name, ty))
      }
    }
  }

  pub fn check_call(&mut self, callee: SymbolId, args: Vec<Expression>) -> Expression {
    let ty = self.table.symbol(callee).ty().clone();

    if ty.is_error() {
      return self.expr(Type::Error, false, ExprKind::Call { callee, args });
    }

    if !ty.is_function() {
      self
        .reporter
        .report(self.line, "called object is not a function");
      return self.expr(Type::Error, false, ExprKind::Call { callee, args });
    }

    let mut args: Vec<Expression> = args.into_iter().map(|arg| self.promote(arg)).collect();
    let mut result = Type::scalar(ty.specifier(), ty.indirection());

    if args.iter().any(|arg| arg.ty.is_error()) {
      return self.expr(Type::Error, false, ExprKind::Call { callee, args });
    }

    match ty.parameters() {
      Parameters::Unspecified => {
        if args.iter().any(|arg| !arg.ty.is_predicate()) {
          self
            .reporter
            .report(self.line, "invalid arguments to called function");
          return self.expr(Type::Error, false, ExprKind::Call { callee, args });
        }
      }
      Parameters::Empty => {
        if !args.is_empty() {
          self
            .reporter
            .report(self.line, "invalid arguments to called function");
        }
      }
      Parameters::Known(expected) => {
        if expected.len() != args.len() {
          self
            .reporter
            .report(self.line, "invalid arguments to called function");
        } else {
          let mut checked = Vec::with_capacity(args.len());
          let mut rest = args.into_iter();
          for parameter in expected {
            let Some(arg) = rest.next() else { break };
            if !arg.ty.is_compatible_with(parameter) {
              self
                .reporter
                .report(self.line, "invalid arguments to called function");
              checked.push(arg);
              result = Type::Error;
              break;
            }
            checked.push(self.convert(arg, parameter));
          }
          checked.extend(rest);
          args = checked;
        }
      }
    }

    self.expr(result, false, ExprKind::Call { callee, args })
  }

  /// Subscripting rewrites `a[i]` as `*(a + i)` with the index scaled by
  /// the element size. The result is an lvalue.
  pub fn check_array(&mut self, left: Expression, right: Expression) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.expr(Type::Error, false, ExprKind::Dereference(Box::new(left)));
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if !left.ty.is_pointer() || left.ty == Type::void_pointer() || !right.ty.is_numeric() {
      self
        .reporter
        .report(self.line, "invalid operands to binary []");
      let sum = self.binary(BinaryOp::Add, Type::Error, left, right);
      return self.expr(Type::Error, false, ExprKind::Dereference(Box::new(sum)));
    }

    let element = left.ty.deref();
    let pointer = left.ty.clone();
    let right = self.scale(right, element.size());
    let sum = self.binary(BinaryOp::Add, pointer, left, right);
    self.expr(element, true, ExprKind::Dereference(Box::new(sum)))
  }

  pub fn check_not(&mut self, operand: Expression) -> Expression {
    if operand.ty.is_error() {
      return self.expr(Type::Error, false, ExprKind::Not(Box::new(operand)));
    }

    let operand = self.promote(operand);
    if !operand.ty.is_predicate() {
      self.reporter.report(self.line, "invalid operand to unary !");
      return self.expr(Type::Error, false, ExprKind::Not(Box::new(operand)));
    }

    self.expr(Type::int(), false, ExprKind::Not(Box::new(operand)))
  }

  pub fn check_negate(&mut self, operand: Expression) -> Expression {
    if operand.ty.is_error() {
      return self.expr(Type::Error, false, ExprKind::Negate(Box::new(operand)));
    }

    let operand = self.promote(operand);
    if !operand.ty.is_numeric() {
      self.reporter.report(self.line, "invalid operand to unary -");
      return self.expr(Type::Error, false, ExprKind::Negate(Box::new(operand)));
    }

    let ty = operand.ty.clone();
    self.expr(ty, false, ExprKind::Negate(Box::new(operand)))
  }

  /// Dereference yields an lvalue of the pointed-to type.
  pub fn check_dereference(&mut self, operand: Expression) -> Expression {
    if operand.ty.is_error() {
      return self.expr(Type::Error, false, ExprKind::Dereference(Box::new(operand)));
    }

    let operand = self.promote(operand);
    if !operand.ty.is_pointer() || operand.ty == Type::void_pointer() {
      self.reporter.report(self.line, "invalid operand to unary *");
      return self.expr(Type::Error, false, ExprKind::Dereference(Box::new(operand)));
    }

    let ty = operand.ty.deref();
    self.expr(ty, true, ExprKind::Dereference(Box::new(operand)))
  }

  /// Address-of requires an lvalue operand and never yields one.
  pub fn check_address(&mut self, operand: Expression) -> Expression {
    if operand.ty.is_error() {
      return self.expr(Type::Error, false, ExprKind::Address(Box::new(operand)));
    }

    if !operand.lvalue {
      self
        .reporter
        .report(self.line, "lvalue required in expression");
      return self.expr(Type::Error, false, ExprKind::Address(Box::new(operand)));
    }

    let ty = Type::scalar(operand.ty.specifier(), operand.ty.indirection() + 1);
    self.expr(ty, false, ExprKind::Address(Box::new(operand)))
  }

  /// `sizeof` never evaluates its operand; the tree node is discarded and
  /// replaced with a literal of type long.
  pub fn check_sizeof(&mut self, operand: Expression) -> Expression {
    if operand.ty.is_error() {
      return self.expr(Type::long(), false, ExprKind::Number(0));
    }

    if !operand.ty.is_predicate() {
      self
        .reporter
        .report(self.line, "invalid operand to unary sizeof");
      return self.expr(Type::Error, false, ExprKind::Number(0));
    }

    let size = operand.ty.size();
    self.expr(Type::long(), false, ExprKind::Number(size))
  }

  fn check_multiplicative(
    &mut self,
    op: BinaryOp,
    left: Expression,
    right: Expression,
  ) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.binary(op, Type::Error, left, right);
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if !left.ty.is_numeric() || !right.ty.is_numeric() {
      self
        .reporter
        .report(self.line, format!("invalid operands to binary {}", op.symbol()));
      return self.binary(op, Type::Error, left, right);
    }

    let ty = if left.ty == Type::long() || right.ty == Type::long() {
      Type::long()
    } else {
      Type::int()
    };
    let left = self.convert(left, &ty);
    let right = self.convert(right, &ty);
    self.binary(op, ty, left, right)
  }

  pub fn check_multiply(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_multiplicative(BinaryOp::Multiply, left, right)
  }

  pub fn check_divide(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_multiplicative(BinaryOp::Divide, left, right)
  }

  pub fn check_remainder(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_multiplicative(BinaryOp::Remainder, left, right)
  }

  /// Addition allows numeric + numeric and pointer + numeric in either
  /// order, scaling the numeric side by the element size.
  pub fn check_add(&mut self, left: Expression, right: Expression) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.binary(BinaryOp::Add, Type::Error, left, right);
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if left.ty.is_numeric() && right.ty.is_numeric() {
      let ty = if left.ty == Type::long() || right.ty == Type::long() {
        Type::long()
      } else {
        Type::int()
      };
      let left = self.convert(left, &ty);
      let right = self.convert(right, &ty);
      return self.binary(BinaryOp::Add, ty, left, right);
    }

    if left.ty.is_pointer() && left.ty != Type::void_pointer() && right.ty.is_numeric() {
      let ty = left.ty.clone();
      let right = self.scale(right, ty.deref().size());
      return self.binary(BinaryOp::Add, ty, left, right);
    }

    if left.ty.is_numeric() && right.ty.is_pointer() && right.ty != Type::void_pointer() {
      let ty = right.ty.clone();
      let left = self.scale(left, ty.deref().size());
      return self.binary(BinaryOp::Add, ty, left, right);
    }

    self.reporter.report(self.line, "invalid operands to binary +");
    self.binary(BinaryOp::Add, Type::Error, left, right)
  }

  /// Subtraction additionally allows pointer - pointer of identical
  /// types, which divides the byte difference by the element size and
  /// yields a long.
  pub fn check_subtract(&mut self, left: Expression, right: Expression) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.binary(BinaryOp::Subtract, Type::Error, left, right);
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if left.ty.is_numeric() && right.ty.is_numeric() {
      let ty = if left.ty == Type::long() || right.ty == Type::long() {
        Type::long()
      } else {
        Type::int()
      };
      let left = self.convert(left, &ty);
      let right = self.convert(right, &ty);
      return self.binary(BinaryOp::Subtract, ty, left, right);
    }

    if left.ty.is_pointer() && left.ty != Type::void_pointer() && right.ty.is_numeric() {
      let ty = left.ty.clone();
      let right = self.scale(right, ty.deref().size());
      return self.binary(BinaryOp::Subtract, ty, left, right);
    }

    if left.ty.is_pointer() && left.ty != Type::void_pointer() && left.ty == right.ty {
      let size = left.ty.deref().size();
      let difference = self.binary(BinaryOp::Subtract, Type::long(), left, right);
      let amount = self.expr(Type::long(), false, ExprKind::Number(size));
      return self.binary(BinaryOp::Divide, Type::long(), difference, amount);
    }

    self.reporter.report(self.line, "invalid operands to binary -");
    self.binary(BinaryOp::Subtract, Type::Error, left, right)
  }

  /// `<`, `>`, `<=`, `>=` require identical predicate types once both
  /// operands are promoted.
  fn check_relational(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.binary(op, Type::Error, left, right);
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if left.ty != right.ty || !left.ty.is_predicate() {
      self
        .reporter
        .report(self.line, format!("invalid operands to binary {}", op.symbol()));
      return self.binary(op, Type::Error, left, right);
    }

    self.binary(op, Type::int(), left, right)
  }

  /// `==` and `!=` additionally accept compatible pointers, including
  /// `void *` against any pointer, and widen mismatched numerics to long.
  fn check_equality(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.binary(op, Type::Error, left, right);
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if !left.ty.is_compatible_with(&right.ty) {
      self
        .reporter
        .report(self.line, format!("invalid operands to binary {}", op.symbol()));
      return self.binary(op, Type::Error, left, right);
    }

    if left.ty.is_numeric() && right.ty.is_numeric() && left.ty != right.ty {
      let left = self.convert(left, &Type::long());
      let right = self.convert(right, &Type::long());
      return self.binary(op, Type::int(), left, right);
    }

    self.binary(op, Type::int(), left, right)
  }

  pub fn check_less_than(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_relational(BinaryOp::LessThan, left, right)
  }

  pub fn check_greater_than(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_relational(BinaryOp::GreaterThan, left, right)
  }

  pub fn check_less_or_equal(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_relational(BinaryOp::LessOrEqual, left, right)
  }

  pub fn check_greater_or_equal(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_relational(BinaryOp::GreaterOrEqual, left, right)
  }

  pub fn check_equal(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_equality(BinaryOp::Equal, left, right)
  }

  pub fn check_not_equal(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_equality(BinaryOp::NotEqual, left, right)
  }

  fn check_logical(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
    if left.ty.is_error() || right.ty.is_error() {
      return self.binary(op, Type::Error, left, right);
    }

    let left = self.promote(left);
    let right = self.promote(right);

    if !left.ty.is_predicate() || !right.ty.is_predicate() {
      self
        .reporter
        .report(self.line, format!("invalid operands to binary {}", op.symbol()));
      return self.binary(op, Type::Error, left, right);
    }

    self.binary(op, Type::int(), left, right)
  }

  pub fn check_logical_and(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_logical(BinaryOp::LogicalAnd, left, right)
  }

  pub fn check_logical_or(&mut self, left: Expression, right: Expression) -> Expression {
    self.check_logical(BinaryOp::LogicalOr, left, right)
  }

  /* Statements. */

  pub fn check_assignment(&mut self, left: Expression, right: Expression) -> Statement {
    if left.ty.is_error() || right.ty.is_error() {
      return Statement::Assignment { left, right };
    }

    if !left.lvalue {
      self
        .reporter
        .report(self.line, "lvalue required in expression");
      return Statement::Assignment { left, right };
    }

    let ty = left.ty.clone();
    let right = self.convert(right, &ty);
    if !ty.is_compatible_with(&right.ty) {
      self
        .reporter
        .report(self.line, "invalid operands to binary =");
    }

    Statement::Assignment { left, right }
  }

  pub fn check_return(&mut self, expr: Expression, return_type: &Type) -> Statement {
    if expr.ty.is_error() || return_type.is_error() {
      return Statement::Return(expr);
    }

    let expr = self.convert(expr, return_type);
    if !return_type.is_compatible_with(&expr.ty) {
      self.reporter.report(self.line, "invalid return type");
    }

    Statement::Return(expr)
  }

  /// The condition of a while, for, or if statement.
  pub fn check_test(&mut self, expr: Expression) -> Expression {
    if expr.ty.is_error() {
      return expr;
    }

    let expr = self.promote(expr);
    if !expr.ty.is_predicate() {
      self
        .reporter
        .report(self.line, "invalid type for test expression");
    }

    expr
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn checker() -> Checker {
    let mut checker = Checker::new();
    checker.table.open_scope();
    checker
  }

  fn ident(checker: &mut Checker, name: &str, ty: Type) -> Expression {
    checker.declare_variable(name, ty);
    checker.check_identifier(name)
  }

  #[test]
  fn pointer_addition_scales_the_index() {
    let mut checker = checker();
    let p = ident(&mut checker, "p", Type::scalar(Specifier::Int, 1));
    let n = ident(&mut checker, "n", Type::int());
    let sum = checker.check_add(p, n);
    assert_eq!(sum.ty, Type::scalar(Specifier::Int, 1));
    assert_eq!(
      sum.display(&checker.table).to_string(),
      "(+ p (* (long n) 4L))"
    );
    assert!(checker.reporter.is_clean());
  }

  #[test]
  fn literal_subscripts_are_folded() {
    let mut checker = checker();
    let a = ident(&mut checker, "a", Type::array(Specifier::Long, 0, 10));
    let i = checker.number(3, false);
    let element = checker.check_array(a, i);
    assert_eq!(element.ty, Type::long());
    assert!(element.lvalue);
    assert_eq!(
      element.display(&checker.table).to_string(),
      "(* (+ (& a) 24L))"
    );
  }

  #[test]
  fn char_operands_are_promoted_to_int() {
    let mut checker = checker();
    let c = ident(&mut checker, "c", Type::char());
    let one = checker.number(1, false);
    let sum = checker.check_add(c, one);
    assert_eq!(sum.ty, Type::int());
    assert_eq!(sum.display(&checker.table).to_string(), "(+ (int c) 1)");
  }

  #[test]
  fn pointer_difference_divides_by_element_size() {
    let mut checker = checker();
    let p = ident(&mut checker, "p", Type::scalar(Specifier::Long, 1));
    let q = ident(&mut checker, "q", Type::scalar(Specifier::Long, 1));
    let diff = checker.check_subtract(p, q);
    assert_eq!(diff.ty, Type::long());
    assert_eq!(diff.display(&checker.table).to_string(), "(/ (- p q) 8L)");
  }

  #[test]
  fn undeclared_identifier_is_reported_once() {
    let mut checker = checker();
    checker.set_line(4);
    let first = checker.check_identifier("x");
    let second = checker.check_identifier("x");
    assert!(first.ty.is_error());
    assert!(second.ty.is_error());
    assert_eq!(checker.reporter.diagnostics(), ["line 4: 'x' undeclared"]);
  }

  #[test]
  fn error_operands_stay_quiet() {
    let mut checker = checker();
    let bad = checker.check_identifier("missing");
    let one = checker.number(1, false);
    let sum = checker.check_add(bad, one);
    assert!(sum.ty.is_error());
    assert_eq!(checker.reporter.error_count(), 1);
  }

  #[test]
  fn address_of_requires_an_lvalue() {
    let mut checker = checker();
    let n = checker.number(7, false);
    let addr = checker.check_address(n);
    assert!(addr.ty.is_error());
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: lvalue required in expression"]
    );
  }

  #[test]
  fn sizeof_discards_its_operand() {
    let mut checker = checker();
    let a = ident(&mut checker, "a", Type::array(Specifier::Int, 0, 10));
    let size = checker.check_sizeof(a);
    assert_eq!(size.ty, Type::long());
    assert_eq!(size.as_number(), Some(40));
  }

  #[test]
  fn redefinition_and_conflicts_are_reported() {
    let mut checker = checker();
    let params = Parameters::Known(vec![Type::int()]);
    checker.define_function("f", Type::function(Specifier::Int, 0, params.clone()));
    checker.define_function("f", Type::function(Specifier::Int, 0, params));
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: redefinition of 'f'"]
    );

    checker.declare_variable("g", Type::int());
    checker.declare_variable("g", Type::long());
    assert_eq!(checker.reporter.error_count(), 2);
    assert!(checker.reporter.diagnostics()[1].contains("conflicting types for 'g'"));
  }

  #[test]
  fn definition_after_declaration_is_allowed() {
    let mut checker = checker();
    checker.declare_function("f", Type::function(Specifier::Int, 0, Parameters::Unspecified));
    checker.define_function(
      "f",
      Type::function(Specifier::Int, 0, Parameters::Known(vec![Type::int()])),
    );
    assert!(checker.reporter.is_clean());
  }

  #[test]
  fn call_through_unprototyped_function_accepts_predicates() {
    let mut checker = checker();
    let callee = checker.check_function("f");
    let arg = checker.number(1, false);
    let call = checker.check_call(callee, vec![arg]);
    assert_eq!(call.ty, Type::int());
    assert!(checker.reporter.is_clean());
    assert!(checker.table.symbol(callee).ty().is_function());
  }

  #[test]
  fn call_arity_is_checked_against_a_prototype() {
    let mut checker = checker();
    let ty = Type::function(Specifier::Int, 0, Parameters::Known(vec![Type::int()]));
    let callee = checker.define_function("f", ty);
    let call = checker.check_call(callee, vec![]);
    assert_eq!(call.ty, Type::int());
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: invalid arguments to called function"]
    );
  }

  #[test]
  fn void_variables_are_rejected_but_keep_their_type() {
    let mut checker = checker();
    checker.declare_variable("v", Type::scalar(Specifier::Void, 0));
    assert_eq!(checker.reporter.diagnostics(), ["line 1: 'v' has type void"]);

    let v = checker.check_identifier("v");
    assert_eq!(v.ty, Type::scalar(Specifier::Void, 0));
    let one = checker.number(1, false);
    let sum = checker.check_add(v, one);
    assert!(sum.ty.is_error());
    assert_eq!(
      checker.reporter.diagnostics()[1],
      "line 1: invalid operands to binary +"
    );
  }

  #[test]
  fn relational_operands_must_have_identical_types() {
    let mut checker = checker();
    let p = ident(&mut checker, "p", Type::scalar(Specifier::Int, 1));
    let q = ident(&mut checker, "q", Type::scalar(Specifier::Void, 1));
    let less = checker.check_less_than(p, q);
    assert!(less.ty.is_error());
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: invalid operands to binary <"]
    );

    // Equality still takes the void * wildcard.
    let p = checker.check_identifier("p");
    let q = checker.check_identifier("q");
    let equal = checker.check_equal(p, q);
    assert_eq!(equal.ty, Type::int());
    assert_eq!(checker.reporter.error_count(), 1);
  }

  #[test]
  fn an_incompatible_argument_makes_the_call_error_typed() {
    let mut checker = checker();
    let params = Parameters::Known(vec![Type::scalar(Specifier::Int, 1)]);
    let callee = checker.define_function("f", Type::function(Specifier::Int, 0, params));
    let arg = checker.number(3, false);
    let call = checker.check_call(callee, vec![arg]);
    assert!(call.ty.is_error());

    let one = checker.number(1, false);
    let sum = checker.check_add(call, one);
    assert!(sum.ty.is_error());
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: invalid arguments to called function"]
    );
  }

  #[test]
  fn assignment_converts_and_checks_compatibility() {
    let mut checker = checker();
    let x = ident(&mut checker, "x", Type::long());
    let n = checker.number(1, false);
    let stmt = checker.check_assignment(x, n);
    assert_eq!(
      stmt.display(&checker.table).to_string(),
      "(= x 1L)"
    );
    assert!(checker.reporter.is_clean());

    let p = ident(&mut checker, "p", Type::scalar(Specifier::Int, 1));
    let y = checker.check_identifier("x");
    checker.check_assignment(p, y);
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: invalid operands to binary ="]
    );
  }
}
