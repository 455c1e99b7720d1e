//! Storage allocation.
//!
//! Assigns every parameter and local variable its frame offset relative
//! to %rbp before any code is generated. The first six parameters arrive
//! in registers and are spilled just below the frame pointer; the rest
//! already sit above it, beyond the saved %rbp and the return address.
//! Locals grow downward from there, and sibling blocks reuse the same
//! region since their lifetimes cannot overlap.
//!
//! The returned offset is the lowest byte of the frame. The generator
//! extends it further for spills, so the final frame size is not known
//! until after the body has been emitted.

use crate::machine::{NUM_PARAM_REGS, SIZEOF_PARAM, SIZEOF_REG};
use crate::scope::SymbolTable;
use crate::tree::{Block, Function, Statement};

/// Assign offsets to the parameters and locals of one function and
/// return the lowest offset used.
pub fn allocate(function: &Function, table: &mut SymbolTable) -> i64 {
  let symbols = table.symbols_of(function.body.scope).to_vec();
  let ty = table.symbol(function.id).ty().clone();
  let count = ty.parameters().types().map_or(0, |types| types.len());

  let mut above = 2 * SIZEOF_REG;
  for &id in symbols.iter().take(count).skip(NUM_PARAM_REGS) {
    table.set_offset(id, above);
    above += SIZEOF_PARAM;
  }

  let mut offset = 0;
  for &id in symbols.iter().take(count.min(NUM_PARAM_REGS)) {
    offset -= table.symbol(id).ty().promote().size() as i64;
    table.set_offset(id, offset);
  }

  allocate_block(&function.body, table, &mut offset);
  offset
}

fn allocate_block(block: &Block, table: &mut SymbolTable, offset: &mut i64) {
  for id in table.symbols_of(block.scope).to_vec() {
    if table.symbol(id).offset() == 0 {
      *offset -= table.symbol(id).ty().size() as i64;
      table.set_offset(id, *offset);
    }
  }

  // Sibling statements each start from the same watermark; the frame
  // only needs to cover the deepest of them.
  let saved = *offset;
  for statement in &block.statements {
    let mut inner = saved;
    allocate_statement(statement, table, &mut inner);
    if inner < *offset {
      *offset = inner;
    }
  }
}

fn allocate_statement(statement: &Statement, table: &mut SymbolTable, offset: &mut i64) {
  match statement {
    Statement::Block(block) => allocate_block(block, table, offset),
    Statement::While { body, .. } | Statement::For { body, .. } => {
      allocate_statement(body, table, offset);
    }
    Statement::If {
      then_stmt,
      else_stmt,
      ..
    } => {
      let saved = *offset;
      allocate_statement(then_stmt, table, offset);
      let mut other = saved;
      if let Some(else_stmt) = else_stmt {
        allocate_statement(else_stmt, table, &mut other);
      }
      if other < *offset {
        *offset = other;
      }
    }
    Statement::Simple(_) | Statement::Assignment { .. } | Statement::Return(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::checker::Checker;
  use crate::parser;
  use crate::tokenizer::tokenize;
  use crate::tree::TranslationUnit;

  fn allocated(source: &str) -> (TranslationUnit, Checker, i64) {
    let mut checker = Checker::new();
    let tokens = tokenize(source).unwrap();
    let unit = parser::parse(tokens, source, &mut checker).unwrap();
    assert!(checker.reporter.is_clean(), "{:?}", checker.reporter);
    let offset = allocate(&unit.functions[0], &mut checker.table);
    (unit, checker, offset)
  }

  fn offset_of(checker: &Checker, unit: &TranslationUnit, name: &str) -> i64 {
    let scope = unit.functions[0].body.scope;
    let id = checker.table.find(scope, name).unwrap();
    checker.table.symbol(id).offset()
  }

  #[test]
  fn register_parameters_spill_below_the_frame_pointer() {
    let source = "int f(int a, long b, char c) { return a; }";
    let (unit, checker, offset) = allocated(source);
    assert_eq!(offset_of(&checker, &unit, "a"), -4);
    assert_eq!(offset_of(&checker, &unit, "b"), -12);
    // A char parameter takes its promoted width.
    assert_eq!(offset_of(&checker, &unit, "c"), -16);
    assert_eq!(offset, -16);
  }

  #[test]
  fn stack_parameters_sit_above_the_return_address() {
    let source = "int f(int a, int b, int c, int d, int e, int g, int h, int i) { return h; }";
    let (unit, checker, _) = allocated(source);
    assert_eq!(offset_of(&checker, &unit, "g"), -24);
    assert_eq!(offset_of(&checker, &unit, "h"), 16);
    assert_eq!(offset_of(&checker, &unit, "i"), 24);
  }

  #[test]
  fn locals_grow_downward_past_the_parameters() {
    let source = "int f(int a) { int x; char c; long v[2]; return x; }";
    let (unit, checker, offset) = allocated(source);
    assert_eq!(offset_of(&checker, &unit, "a"), -4);
    assert_eq!(offset_of(&checker, &unit, "x"), -8);
    assert_eq!(offset_of(&checker, &unit, "c"), -9);
    assert_eq!(offset_of(&checker, &unit, "v"), -25);
    assert_eq!(offset, -25);
  }

  #[test]
  fn sibling_blocks_share_storage() {
    let source = "int f(void) { int r; { int x; r = x; } { long y[4]; r = 0; } return r; }";
    let (unit, checker, offset) = allocated(source);
    assert_eq!(offset_of(&checker, &unit, "r"), -4);

    let body = &unit.functions[0].body;
    let (first, second) = match (&body.statements[0], &body.statements[1]) {
      (Statement::Block(first), Statement::Block(second)) => (first, second),
      other => panic!("expected two blocks, got {other:?}"),
    };
    let x = checker.table.find(first.scope, "x").unwrap();
    let y = checker.table.find(second.scope, "y").unwrap();
    assert_eq!(checker.table.symbol(x).offset(), -8);
    assert_eq!(checker.table.symbol(y).offset(), -36);
    assert_eq!(offset, -36);
  }

  #[test]
  fn if_branches_overlap_like_siblings() {
    let source = "int f(int n) {
      if (n) { int a; a = 1; } else { long b[3]; b[0] = 2; }
      return n;
    }";
    let (unit, checker, offset) = allocated(source);
    let body = &unit.functions[0].body;
    let (then_block, else_block) = match &body.statements[0] {
      Statement::If {
        then_stmt,
        else_stmt,
        ..
      } => match (then_stmt.as_ref(), else_stmt.as_deref()) {
        (Statement::Block(t), Some(Statement::Block(e))) => (t, e),
        other => panic!("expected blocks, got {other:?}"),
      },
      other => panic!("expected if, got {other:?}"),
    };
    let a = checker.table.find(then_block.scope, "a").unwrap();
    let b = checker.table.find(else_block.scope, "b").unwrap();
    assert_eq!(checker.table.symbol(a).offset(), -8);
    assert_eq!(checker.table.symbol(b).offset(), -28);
    assert_eq!(offset, -28);
  }
}
