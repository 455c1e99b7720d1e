//! Code generation: lower the checked trees into AT&T x86-64 assembly.
//!
//! Registers are allocated on the fly while walking each expression tree.
//! A node's result lives in a register until the register is needed for
//! something else, at which point the value is spilled to a fresh slot in
//! the current frame and reloaded on demand. The frame size is therefore
//! only known after the body has been emitted, so the prologue subtracts
//! a symbolic `name.size` that is defined at the end of the function.
//!
//! The checker has already made every conversion explicit and typed every
//! node, so this pass reads operand widths off the trees and never
//! consults the language rules.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::allocator;
use crate::machine::{LABEL_PREFIX, NUM_PARAM_REGS, SIZEOF_REG, STACK_ALIGNMENT};
use crate::scope::{ScopeId, SymbolId, SymbolTable};
use crate::tree::{BinaryOp, ExprKind, Expression, Function, NodeId, Statement, TranslationUnit};
use crate::ty::Parameters;

/// The register pool in eviction order, each with its 64-, 32-, and
/// 8-bit names. %rax comes last so that plain temporaries avoid it; it
/// is still claimed directly for division, calls, and return values.
const REGISTERS: [[&str; 3]; 9] = [
  ["%r11", "%r11d", "%r11b"],
  ["%r10", "%r10d", "%r10b"],
  ["%r9", "%r9d", "%r9b"],
  ["%r8", "%r8d", "%r8b"],
  ["%rcx", "%ecx", "%cl"],
  ["%rdx", "%edx", "%dl"],
  ["%rsi", "%esi", "%sil"],
  ["%rdi", "%edi", "%dil"],
  ["%rax", "%eax", "%al"],
];

const RCX: usize = 4;
const RDX: usize = 5;
const RAX: usize = 8;

/// Argument registers in parameter order.
const PARAM_REGS: [usize; NUM_PARAM_REGS] = [7, 6, 5, 4, 3, 2];

fn register_name(reg: usize, size: u64) -> &'static str {
  match size {
    8 => REGISTERS[reg][0],
    4 => REGISTERS[reg][1],
    1 => REGISTERS[reg][2],
    other => panic!("no register name for operand size {other}"),
  }
}

/// Instruction suffix for an operand width.
fn suffix(size: u64) -> &'static str {
  match size {
    8 => "q",
    4 => "l",
    1 => "b",
    other => panic!("no instruction suffix for operand size {other}"),
  }
}

/// An assembler-local label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label(u32);

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", LABEL_PREFIX, self.0)
  }
}

#[derive(Debug, Clone, Copy)]
struct Binding {
  node: NodeId,
  size: u64,
}

/// Which expression node currently owns which register. The mapping is
/// kept bijective: binding a node releases whatever it owned before, and
/// overwrites whatever the register held.
#[derive(Debug, Default)]
struct RegisterPool {
  slots: [Option<Binding>; REGISTERS.len()],
}

impl RegisterPool {
  fn holder(&self, reg: usize) -> Option<Binding> {
    self.slots[reg]
  }

  fn register_of(&self, node: NodeId) -> Option<usize> {
    self
      .slots
      .iter()
      .position(|slot| slot.is_some_and(|binding| binding.node == node))
  }

  fn bind(&mut self, reg: usize, node: NodeId, size: u64) {
    if let Some(previous) = self.register_of(node) {
      self.slots[previous] = None;
    }
    self.slots[reg] = Some(Binding { node, size });
  }

  fn release(&mut self, node: NodeId) {
    if let Some(reg) = self.register_of(node) {
      self.slots[reg] = None;
    }
  }

  fn clear(&mut self, reg: usize) {
    self.slots[reg] = None;
  }

  fn first_free(&self) -> Option<usize> {
    self.slots.iter().position(|slot| slot.is_none())
  }

  fn is_empty(&self) -> bool {
    self.slots.iter().all(|slot| slot.is_none())
  }
}

/// Generate assembly for a whole translation unit: every function body,
/// then common storage for the globals and the string literals.
pub fn generate(unit: &TranslationUnit, table: &mut SymbolTable) -> String {
  let offsets: Vec<i64> = unit
    .functions
    .iter()
    .map(|function| allocator::allocate(function, table))
    .collect();

  let mut generator = Generator::new(table);
  for (function, offset) in unit.functions.iter().zip(offsets) {
    generator.emit_function(function, offset);
  }
  generator.emit_globals(unit.globals);
  generator.finish()
}

struct Generator<'a> {
  table: &'a SymbolTable,
  asm: String,
  pool: RegisterPool,
  /// Lowest frame offset of the current function; extended by spills.
  offset: i64,
  funcname: String,
  spills: HashMap<NodeId, i64>,
  labels: u32,
  /// Interned string literals, emitted into .data at the end. A BTreeMap
  /// keeps the output deterministic.
  strings: BTreeMap<String, u32>,
}

impl<'a> Generator<'a> {
  fn new(table: &'a SymbolTable) -> Self {
    Self {
      table,
      asm: String::new(),
      pool: RegisterPool::default(),
      offset: 0,
      funcname: String::new(),
      spills: HashMap::new(),
      labels: 0,
      strings: BTreeMap::new(),
    }
  }

  fn finish(self) -> String {
    self.asm
  }

  fn next_label(&mut self) -> Label {
    let label = Label(self.labels);
    self.labels += 1;
    label
  }

  fn intern_string(&mut self, text: &str) -> Label {
    if let Some(&number) = self.strings.get(text) {
      return Label(number);
    }
    let label = self.next_label();
    self.strings.insert(text.to_string(), label.0);
    label
  }

  /* Register plumbing. */

  /// The assembly operand for an expression that is not in a register: a
  /// literal, a named location, or the node's spill slot.
  fn operand(&mut self, expr: &Expression) -> String {
    match &expr.kind {
      ExprKind::Number(value) => format!("${value}"),
      ExprKind::String(text) => self.intern_string(text).to_string(),
      ExprKind::Identifier(id) => {
        let symbol = self.table.symbol(*id);
        if symbol.offset() == 0 {
          symbol.name().to_string()
        } else {
          format!("{}(%rbp)", symbol.offset())
        }
      }
      _ => {
        let slot = self.spills[&expr.id];
        format!("{slot}(%rbp)")
      }
    }
  }

  /// An expression wherever it currently lives: its register if it has
  /// one, its home or spill slot otherwise.
  fn value(&mut self, expr: &Expression) -> String {
    match self.pool.register_of(expr.id) {
      Some(reg) => register_name(reg, expr.ty.size()).to_string(),
      None => self.operand(expr),
    }
  }

  /// Evict whatever occupies `reg`, writing it to its spill slot. Each
  /// node keeps one slot for the whole function.
  fn spill(&mut self, reg: usize) {
    let Some(binding) = self.pool.holder(reg) else {
      return;
    };

    let slot = match self.spills.get(&binding.node) {
      Some(&slot) => slot,
      None => {
        self.offset -= binding.size as i64;
        self.spills.insert(binding.node, self.offset);
        self.offset
      }
    };

    log::trace!(
      "spilling {} to {}(%rbp) in {}",
      register_name(reg, binding.size),
      slot,
      self.funcname
    );
    self.asm.push_str(&format!(
      "\tmov{}\t{}, {}(%rbp)\n",
      suffix(binding.size),
      register_name(reg, binding.size),
      slot
    ));
    self.pool.clear(reg);
  }

  /// A register to allocate into: the first free one, or the front of
  /// the pool after evicting its occupant.
  fn get_register(&mut self) -> usize {
    if let Some(reg) = self.pool.first_free() {
      return reg;
    }
    self.spill(0);
    0
  }

  /// Move an expression into a specific register and bind it there.
  fn load(&mut self, expr: &Expression, reg: usize) {
    if self.pool.register_of(expr.id) == Some(reg) {
      return;
    }

    self.spill(reg);
    let size = expr.ty.size();
    let value = self.value(expr);
    self.asm.push_str(&format!(
      "\tmov{}\t{}, {}\n",
      suffix(size),
      value,
      register_name(reg, size)
    ));
    self.pool.bind(reg, expr.id, size);
  }

  /// The register holding this expression, loading it into a fresh one
  /// if necessary.
  fn loaded(&mut self, expr: &Expression) -> usize {
    if let Some(reg) = self.pool.register_of(expr.id) {
      return reg;
    }
    let reg = self.get_register();
    self.load(expr, reg);
    reg
  }

  /* Functions. */

  fn emit_function(&mut self, function: &Function, offset: i64) {
    let name = self.table.symbol(function.id).name().to_string();
    log::debug!("generating code for {name}");

    self.funcname = name.clone();
    self.offset = offset;
    self.spills.clear();

    self.asm.push_str(&format!("{name}:\n"));
    self.asm.push_str("\tpushq\t%rbp\n");
    self.asm.push_str("\tmovq\t%rsp, %rbp\n");
    self.asm.push_str(&format!("\tmovl\t${name}.size, %eax\n"));
    self.asm.push_str("\tsubq\t%rax, %rsp\n");

    let ty = self.table.symbol(function.id).ty().clone();
    let count = ty.parameters().types().map_or(0, |types| types.len());
    let symbols = self.table.symbols_of(function.body.scope).to_vec();
    for (i, &id) in symbols.iter().take(count.min(NUM_PARAM_REGS)).enumerate() {
      let symbol = self.table.symbol(id);
      let size = symbol.ty().size();
      self.asm.push_str(&format!(
        "\tmov{}\t{}, {}(%rbp)\n",
        suffix(size),
        register_name(PARAM_REGS[i], size),
        symbol.offset()
      ));
    }

    for statement in &function.body.statements {
      self.emit_statement(statement);
      debug_assert!(self.pool.is_empty(), "register leak in {name}");
    }

    self.asm.push_str(&format!("\n{name}.exit:\n"));
    self.asm.push_str("\tmovq\t%rbp, %rsp\n");
    self.asm.push_str("\tpopq\t%rbp\n");
    self.asm.push_str("\tret\n\n");

    // Pad the frame so %rsp stays 16-byte aligned at calls.
    let mut offset = self.offset;
    offset -= align(offset - 2 * SIZEOF_REG);
    self.asm.push_str(&format!("\t.set\t{name}.size, {}\n", -offset));
    self.asm.push_str(&format!("\t.globl\t{name}\n\n"));
  }

  fn emit_globals(&mut self, globals: ScopeId) {
    for &id in self.table.symbols_of(globals) {
      let symbol = self.table.symbol(id);
      if !symbol.ty().is_function() {
        let line = format!("\t.comm\t{}, {}\n", symbol.name(), symbol.ty().size());
        self.asm.push_str(&line);
      }
    }

    if self.strings.is_empty() {
      return;
    }

    self.asm.push_str("\t.data\n");
    for (text, number) in std::mem::take(&mut self.strings) {
      let line = format!("{}:\t.asciz\t\"{}\"\n", Label(number), escape(&text));
      self.asm.push_str(&line);
    }
  }

  /* Statements. */

  fn emit_statement(&mut self, statement: &Statement) {
    match statement {
      Statement::Simple(expr) => {
        self.emit_expression(expr);
        self.pool.release(expr.id);
      }
      Statement::Assignment { left, right } => self.emit_assignment(left, right),
      Statement::Return(expr) => {
        self.emit_expression(expr);
        self.load(expr, RAX);
        self.asm.push_str(&format!("\tjmp\t{}.exit\n", self.funcname));
        self.pool.release(expr.id);
      }
      Statement::Block(block) => {
        for statement in &block.statements {
          self.emit_statement(statement);
          debug_assert!(self.pool.is_empty(), "register leak in block");
        }
      }
      Statement::While { test, body } => {
        let begin = self.next_label();
        let exit = self.next_label();
        self.asm.push_str(&format!("{begin}:\n"));
        self.emit_test(test, exit, false);
        self.emit_statement(body);
        self.asm.push_str(&format!("\tjmp\t{begin}\n"));
        self.asm.push_str(&format!("{exit}:\n"));
      }
      Statement::For {
        init,
        test,
        step,
        body,
      } => {
        self.emit_statement(init);
        let begin = self.next_label();
        let exit = self.next_label();
        self.asm.push_str(&format!("{begin}:\n"));
        self.emit_test(test, exit, false);
        self.emit_statement(body);
        self.emit_statement(step);
        self.asm.push_str(&format!("\tjmp\t{begin}\n"));
        self.asm.push_str(&format!("{exit}:\n"));
      }
      Statement::If {
        test,
        then_stmt,
        else_stmt,
      } => {
        let skip = self.next_label();
        self.emit_test(test, skip, false);
        self.emit_statement(then_stmt);
        match else_stmt {
          Some(else_stmt) => {
            let exit = self.next_label();
            self.asm.push_str(&format!("\tjmp\t{exit}\n"));
            self.asm.push_str(&format!("{skip}:\n"));
            self.emit_statement(else_stmt);
            self.asm.push_str(&format!("{exit}:\n"));
          }
          None => self.asm.push_str(&format!("{skip}:\n")),
        }
      }
    }
  }

  /// A store through a dereference writes to the pointed-at location;
  /// anything else writes straight to the target's home.
  fn emit_assignment(&mut self, left: &Expression, right: &Expression) {
    self.emit_expression(right);

    if let Some(pointer) = left.as_dereference() {
      self.emit_expression(pointer);
      let pointer_reg = self.loaded(pointer);
      self.loaded(right);
      let value = self.value(right);
      self.asm.push_str(&format!(
        "\tmov{}\t{}, ({})\n",
        suffix(right.ty.size()),
        value,
        register_name(pointer_reg, 8)
      ));
      self.pool.release(pointer.id);
      self.pool.release(right.id);
      return;
    }

    self.loaded(right);
    let value = self.value(right);
    let target = self.operand(left);
    self.asm.push_str(&format!(
      "\tmov{}\t{}, {}\n",
      suffix(right.ty.size()),
      value,
      target
    ));
    self.pool.release(right.id);
  }

  /// Evaluate an expression as a branch condition: compare against zero
  /// and jump to `label` when the outcome matches `on_true`.
  fn emit_test(&mut self, expr: &Expression, label: Label, on_true: bool) {
    self.emit_expression(expr);
    let reg = self.loaded(expr);
    let size = expr.ty.size();
    self.asm.push_str(&format!(
      "\tcmp{}\t$0, {}\n",
      suffix(size),
      register_name(reg, size)
    ));
    let jump = if on_true { "jne" } else { "je" };
    self.asm.push_str(&format!("\t{jump}\t{label}\n"));
    self.pool.release(expr.id);
  }

  /* Expressions. */

  fn emit_expression(&mut self, expr: &Expression) {
    match &expr.kind {
      // Leaves are addressed in place until a register is required.
      ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Identifier(_) => {}
      ExprKind::Call { callee, args } => self.emit_call(expr, *callee, args),
      ExprKind::Not(operand) => self.emit_not(expr, operand),
      ExprKind::Negate(operand) => self.emit_negate(expr, operand),
      ExprKind::Dereference(operand) => self.emit_dereference(expr, operand),
      ExprKind::Address(operand) => self.emit_address(expr, operand),
      ExprKind::Cast(operand) => self.emit_cast(expr, operand),
      ExprKind::Binary { op, left, right } => match op {
        BinaryOp::Add => self.emit_arithmetic(expr, "add", left, right),
        BinaryOp::Subtract => self.emit_arithmetic(expr, "sub", left, right),
        BinaryOp::Multiply => self.emit_arithmetic(expr, "imul", left, right),
        BinaryOp::Divide => self.emit_division(expr, left, right, RAX),
        BinaryOp::Remainder => self.emit_division(expr, left, right, RDX),
        BinaryOp::LessThan => self.emit_comparison(expr, "setl", left, right),
        BinaryOp::GreaterThan => self.emit_comparison(expr, "setg", left, right),
        BinaryOp::LessOrEqual => self.emit_comparison(expr, "setle", left, right),
        BinaryOp::GreaterOrEqual => self.emit_comparison(expr, "setge", left, right),
        BinaryOp::Equal => self.emit_comparison(expr, "sete", left, right),
        BinaryOp::NotEqual => self.emit_comparison(expr, "setne", left, right),
        BinaryOp::LogicalAnd => self.emit_logical(expr, left, right, false),
        BinaryOp::LogicalOr => self.emit_logical(expr, left, right, true),
      },
    }
  }

  /// Two-operand arithmetic computes into the left operand's register.
  fn emit_arithmetic(&mut self, expr: &Expression, op: &str, left: &Expression, right: &Expression) {
    self.emit_expression(left);
    self.emit_expression(right);

    let reg = self.loaded(left);
    let size = left.ty.size();
    let value = self.value(right);
    self.asm.push_str(&format!(
      "\t{}{}\t{}, {}\n",
      op,
      suffix(size),
      value,
      register_name(reg, size)
    ));
    self.pool.release(right.id);
    self.pool.bind(reg, expr.id, expr.ty.size());
  }

  /// idiv leaves the quotient in %rax and the remainder in %rdx; the
  /// divisor goes through %rcx so neither is clobbered.
  fn emit_division(&mut self, expr: &Expression, left: &Expression, right: &Expression, result: usize) {
    self.emit_expression(left);
    self.emit_expression(right);

    self.load(left, RAX);
    self.spill(RDX);
    self.load(right, RCX);

    let size = expr.ty.size();
    let extend = if size == 8 { "cqto" } else { "cltd" };
    self.asm.push_str(&format!("\t{extend}\n"));
    self.asm.push_str(&format!(
      "\tidiv{}\t{}\n",
      suffix(size),
      register_name(RCX, size)
    ));

    self.pool.release(left.id);
    self.pool.release(right.id);
    self.pool.bind(result, expr.id, size);
  }

  fn emit_comparison(&mut self, expr: &Expression, set: &str, left: &Expression, right: &Expression) {
    self.emit_expression(left);
    self.emit_expression(right);

    let reg = self.loaded(left);
    let size = left.ty.size();
    let value = self.value(right);
    self.asm.push_str(&format!(
      "\tcmp{}\t{}, {}\n",
      suffix(size),
      value,
      register_name(reg, size)
    ));
    self.pool.release(left.id);
    self.pool.release(right.id);

    let reg = self.get_register();
    self.pool.bind(reg, expr.id, expr.ty.size());
    self.asm.push_str(&format!("\t{}\t{}\n", set, register_name(reg, 1)));
    self.asm.push_str(&format!(
      "\tmovzbl\t{}, {}\n",
      register_name(reg, 1),
      register_name(reg, 4)
    ));
  }

  /// Short-circuit evaluation: both operands branch to the same label,
  /// and the two constants meet at the join point.
  fn emit_logical(&mut self, expr: &Expression, left: &Expression, right: &Expression, or: bool) {
    let short = self.next_label();
    self.emit_test(left, short, or);
    self.emit_test(right, short, or);

    let (taken, shorted) = if or { (0, 1) } else { (1, 0) };
    let reg = self.get_register();
    self.pool.bind(reg, expr.id, expr.ty.size());
    let out = self.next_label();
    self.asm.push_str(&format!("\tmovl\t${taken}, {}\n", register_name(reg, 4)));
    self.asm.push_str(&format!("\tjmp\t{out}\n"));
    self.asm.push_str(&format!("{short}:\n"));
    self.asm.push_str(&format!("\tmovl\t${shorted}, {}\n", register_name(reg, 4)));
    self.asm.push_str(&format!("{out}:\n"));
  }

  fn emit_not(&mut self, expr: &Expression, operand: &Expression) {
    self.emit_expression(operand);
    let reg = self.loaded(operand);
    let size = operand.ty.size();
    self.asm.push_str(&format!(
      "\tcmp{}\t$0, {}\n",
      suffix(size),
      register_name(reg, size)
    ));
    self.pool.bind(reg, expr.id, expr.ty.size());
    self.asm.push_str(&format!("\tsete\t{}\n", register_name(reg, 1)));
    self.asm.push_str(&format!(
      "\tmovzbl\t{}, {}\n",
      register_name(reg, 1),
      register_name(reg, 4)
    ));
  }

  fn emit_negate(&mut self, expr: &Expression, operand: &Expression) {
    self.emit_expression(operand);
    let reg = self.loaded(operand);
    let size = expr.ty.size();
    self.asm.push_str(&format!("\tneg{}\t{}\n", suffix(size), register_name(reg, size)));
    self.pool.bind(reg, expr.id, size);
  }

  /// Read through a pointer. The result reuses the pointer's register,
  /// renamed to the pointee's width.
  fn emit_dereference(&mut self, expr: &Expression, operand: &Expression) {
    self.emit_expression(operand);
    let reg = self.loaded(operand);
    let size = expr.ty.size();
    self.asm.push_str(&format!(
      "\tmov{}\t({}), {}\n",
      suffix(size),
      register_name(reg, 8),
      register_name(reg, size)
    ));
    self.pool.bind(reg, expr.id, size);
  }

  /// The address of `*p` is just `p`; any other lvalue is a named
  /// location whose address comes from lea.
  fn emit_address(&mut self, expr: &Expression, operand: &Expression) {
    if let Some(pointer) = operand.as_dereference() {
      self.emit_expression(pointer);
      let reg = self.loaded(pointer);
      self.pool.bind(reg, expr.id, expr.ty.size());
      return;
    }

    let reg = self.get_register();
    let source = self.operand(operand);
    self.pool.bind(reg, expr.id, expr.ty.size());
    self.asm.push_str(&format!("\tleaq\t{}, {}\n", source, register_name(reg, 8)));
  }

  /// Widening casts sign-extend in place; narrowing just renames the
  /// register to the smaller width.
  fn emit_cast(&mut self, expr: &Expression, operand: &Expression) {
    self.emit_expression(operand);
    let reg = self.loaded(operand);
    let source = operand.ty.size();
    let dest = expr.ty.size();

    if dest <= source {
      self.pool.bind(reg, expr.id, dest);
      return;
    }

    let op = match (source, dest) {
      (1, 4) => "movsbl",
      (1, 8) => "movsbq",
      (4, 8) => "movslq",
      other => panic!("no extension from {other:?}"),
    };
    self.asm.push_str(&format!(
      "\t{}\t{}, {}\n",
      op,
      register_name(reg, source),
      register_name(reg, dest)
    ));
    self.pool.bind(reg, expr.id, dest);
  }

  /// The System V call sequence: every argument is computed first, right
  /// to left, so that a nested call spills whatever is already live; the
  /// results are then pushed or moved into their registers, and every
  /// remaining temporary spilled since the callee may clobber anything.
  fn emit_call(&mut self, expr: &Expression, callee: SymbolId, args: &[Expression]) {
    for arg in args.iter().rev() {
      self.emit_expression(arg);
    }

    let mut stack_bytes: i64 = 0;
    let overflow = args.len().saturating_sub(NUM_PARAM_REGS);
    if overflow % 2 != 0 {
      self.asm.push_str(&format!("\tsubq\t${SIZEOF_REG}, %rsp\n"));
      stack_bytes += SIZEOF_REG;
    }

    for (i, arg) in args.iter().enumerate().rev() {
      if i >= NUM_PARAM_REGS {
        self.load(arg, RAX);
        self.asm.push_str("\tpushq\t%rax\n");
        stack_bytes += SIZEOF_REG;
      } else {
        self.load(arg, PARAM_REGS[i]);
      }
      self.pool.release(arg.id);
    }

    for reg in 0..REGISTERS.len() {
      self.spill(reg);
    }

    let symbol = self.table.symbol(callee);
    if symbol.ty().is_function()
      && matches!(symbol.ty().parameters(), Parameters::Unspecified)
    {
      self.asm.push_str("\tmovl\t$0, %eax\n");
    }
    self.asm.push_str(&format!("\tcall\t{}\n", symbol.name()));

    if stack_bytes > 0 {
      self.asm.push_str(&format!("\taddq\t${stack_bytes}, %rsp\n"));
    }

    self.pool.bind(RAX, expr.id, expr.ty.size());
  }
}

/// Padding needed to round a frame up to the stack alignment.
fn align(offset: i64) -> i64 {
  if offset % STACK_ALIGNMENT == 0 {
    return 0;
  }
  STACK_ALIGNMENT - offset.abs() % STACK_ALIGNMENT
}

/// Escape a string literal for an .asciz directive.
fn escape(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '"' => escaped.push_str("\\\""),
      '\\' => escaped.push_str("\\\\"),
      '\n' => escaped.push_str("\\n"),
      '\t' => escaped.push_str("\\t"),
      c if !(' '..='~').contains(&c) => {
        escaped.push_str(&format!("\\{:03o}", c as u32));
      }
      c => escaped.push(c),
    }
  }
  escaped
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::checker::Checker;
  use crate::parser;
  use crate::tokenizer::tokenize;

  fn assemble(source: &str) -> String {
    let mut checker = Checker::new();
    let tokens = tokenize(source).unwrap();
    let unit = parser::parse(tokens, source, &mut checker).unwrap();
    assert!(checker.reporter.is_clean(), "{:?}", checker.reporter);
    generate(&unit, &mut checker.table)
  }

  #[test]
  fn a_minimal_function_gets_the_full_frame_protocol() {
    let asm = assemble("int main(void) { return 0; }");
    let expected = "main:\n\
                    \tpushq\t%rbp\n\
                    \tmovq\t%rsp, %rbp\n\
                    \tmovl\t$main.size, %eax\n\
                    \tsubq\t%rax, %rsp\n\
                    \tmovl\t$0, %eax\n\
                    \tjmp\tmain.exit\n\
                    \n\
                    main.exit:\n\
                    \tmovq\t%rbp, %rsp\n\
                    \tpopq\t%rbp\n\
                    \tret\n\
                    \n\
                    \t.set\tmain.size, 0\n\
                    \t.globl\tmain\n\n";
    assert_eq!(asm, expected);
  }

  #[test]
  fn register_parameters_are_spilled_in_the_prologue() {
    let asm = assemble("int f(int a, char c) { return a; }");
    assert!(asm.contains("\tmovl\t%edi, -4(%rbp)\n"));
    assert!(asm.contains("\tmovb\t%sil, -8(%rbp)\n"));
    assert!(asm.contains("\tmovl\t-4(%rbp), %eax\n\tjmp\tf.exit\n"));
  }

  #[test]
  fn the_frame_is_padded_to_the_stack_alignment() {
    let asm = assemble("int f(void) { int x; x = 1; return x; }");
    assert!(asm.contains("\t.set\tf.size, 16\n"), "{asm}");
  }

  #[test]
  fn division_uses_the_fixed_register_protocol() {
    let asm = assemble("int f(int a, int b) { return a % b; }");
    assert!(asm.contains(
      "\tmovl\t-4(%rbp), %eax\n\
       \tmovl\t-8(%rbp), %ecx\n\
       \tcltd\n\
       \tidivl\t%ecx\n"
    ));
    // The remainder comes back in %edx.
    assert!(asm.contains("\tmovl\t%edx, %eax\n\tjmp\tf.exit\n"));
  }

  #[test]
  fn comparisons_set_a_byte_and_widen_it() {
    let asm = assemble("int f(int a) { return a < 3; }");
    assert!(asm.contains(
      "\tmovl\t-4(%rbp), %r11d\n\
       \tcmpl\t$3, %r11d\n\
       \tsetl\t%r11b\n\
       \tmovzbl\t%r11b, %r11d\n"
    ));
  }

  #[test]
  fn while_loops_test_at_the_top() {
    let asm = assemble("int f(int n) { while (n) n = n - 1; return n; }");
    assert!(asm.contains(
      ".L0:\n\
       \tmovl\t-4(%rbp), %r11d\n\
       \tcmpl\t$0, %r11d\n\
       \tje\t.L1\n"
    ));
    assert!(asm.contains("\tjmp\t.L0\n.L1:\n"));
  }

  #[test]
  fn array_access_goes_through_address_arithmetic() {
    let asm = assemble("int f(void) { int a[4]; return a[1]; }");
    assert!(asm.contains("\tleaq\t-16(%rbp), %r11\n"));
    assert!(asm.contains("\taddq\t$4, %r11\n"));
    assert!(asm.contains("\tmovl\t(%r11), %r11d\n"));
  }

  #[test]
  fn calls_place_arguments_and_clear_the_accumulator_for_varargs() {
    let asm = assemble(
      "int printf(); int main(void) { printf(\"%d\\n\", 7); return 0; }",
    );
    assert!(asm.contains("\tleaq\t.L0, %r11\n"));
    assert!(asm.contains("\tmovl\t$7, %esi\n"));
    assert!(asm.contains("\tmovq\t%r11, %rdi\n"));
    assert!(asm.contains("\tmovl\t$0, %eax\n\tcall\tprintf\n"));
    assert!(asm.ends_with("\t.data\n.L0:\t.asciz\t\"%d\\n\"\n"));
  }

  #[test]
  fn overflow_arguments_are_pushed_right_to_left() {
    let asm = assemble(
      "int g(int a, int b, int c, int d, int e, int f, int h) { return a; }
       int main(void) { return g(1, 2, 3, 4, 5, 6, 7); }",
    );
    assert!(asm.contains("\tsubq\t$8, %rsp\n"));
    assert!(asm.contains("\tmovl\t$7, %eax\n\tpushq\t%rax\n"));
    assert!(asm.contains("\tmovl\t$1, %edi\n"));
    assert!(asm.contains("\tcall\tg\n\taddq\t$16, %rsp\n"));
    // A prototyped callee needs no %eax reset.
    assert!(!asm.contains("\tmovl\t$0, %eax\n\tcall\tg\n"));
  }

  #[test]
  fn stores_through_pointers_use_the_pointee_width() {
    let asm = assemble("int f(char *p) { *p = 'x'; return 0; }");
    assert!(asm.contains("\tmovl\t$120, %r11d\n"));
    assert!(asm.contains("\tmovq\t-8(%rbp), %r10\n"));
    assert!(asm.contains("\tmovb\t%r11b, (%r10)\n"));
  }

  #[test]
  fn narrowing_assignments_truncate_through_a_register() {
    let asm = assemble("int f(void) { char c; c = 300; return 0; }");
    // The literal is materialized at full width and stored narrow.
    assert!(asm.contains("\tmovl\t$300, %r11d\n"));
    assert!(asm.contains("\tmovb\t%r11b, -1(%rbp)\n"));
    assert!(!asm.contains("$300, %r11b"));
  }

  #[test]
  fn nested_call_arguments_survive_the_inner_call() {
    let asm = assemble(
      "int f(int x) { return x; }
       int g(int a, int b) { return a - b; }
       int main(void) { return g(f(1), 2); }",
    );
    assert!(
      asm.contains(
        "\tmovl\t$1, %edi\n\
         \tcall\tf\n\
         \tmovl\t$2, %esi\n\
         \tmovl\t%eax, %edi\n\
         \tcall\tg\n"
      ),
      "{asm}"
    );
  }

  #[test]
  fn deep_expressions_spill_and_reload_through_the_frame() {
    let asm = assemble(
      "int *p0; int *p1; int *p2; int *p3; int *p4;
       int *p5; int *p6; int *p7; int *p8; int *p9;
       int main(void) {
         return *p0 + (*p1 + (*p2 + (*p3 + (*p4 +
                (*p5 + (*p6 + (*p7 + (*p8 + *p9))))))));
       }",
    );
    // Ten live values against nine registers: the oldest is evicted to a
    // frame slot and read back from the same slot when its turn comes.
    let store = "\tmovl\t%r11d, -4(%rbp)\n";
    let reload = "\tmovl\t-4(%rbp), %r11d\n";
    assert!(asm.contains(store), "{asm}");
    assert!(asm.contains(reload), "{asm}");
    assert!(asm.find(store).unwrap() < asm.find(reload).unwrap());
    // The spill slot counts toward the frame.
    assert!(asm.contains("\t.set\tmain.size, 16\n"));
  }

  #[test]
  fn globals_are_emitted_as_common_storage() {
    let asm = assemble("int x; char buf[100]; long *p; int main(void) { return 0; }");
    assert!(asm.contains("\t.comm\tx, 4\n\t.comm\tbuf, 100\n\t.comm\tp, 8\n"));
  }

  #[test]
  fn logical_and_short_circuits_to_one_label() {
    let asm = assemble("int f(int a, int b) { return a && b; }");
    assert!(asm.contains("\tje\t.L0\n"));
    assert!(asm.contains(
      "\tmovl\t$1, %r11d\n\
       \tjmp\t.L1\n\
       .L0:\n\
       \tmovl\t$0, %r11d\n\
       .L1:\n"
    ));
  }
}
