//! Symbols and lexical scopes.
//!
//! Scopes form a chain from the innermost block out to the file-level
//! scope, which lives for the whole translation unit. Both symbols and
//! scopes are arena-allocated and addressed by copyable ids, so tree
//! nodes can refer to a symbol without owning it and the storage
//! allocator can write frame offsets through the one table that owns
//! everything.

use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A name bound to a type, with the frame offset filled in later by the
/// storage allocator. Offset zero is the "unassigned" sentinel; globals
/// keep it forever and the code generator treats it as "not on the
/// stack".
#[derive(Debug)]
pub struct Symbol {
  name: String,
  ty: Type,
  offset: i64,
}

impl Symbol {
  pub fn new(name: impl Into<String>, ty: Type) -> Self {
    Self {
      name: name.into(),
      ty,
      offset: 0,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn ty(&self) -> &Type {
    &self.ty
  }

  pub fn offset(&self) -> i64 {
    self.offset
  }
}

#[derive(Debug)]
struct Scope {
  symbols: Vec<SymbolId>,
  enclosing: Option<ScopeId>,
}

/// Arena of scopes and symbols plus the stack of currently open scopes.
#[derive(Debug, Default)]
pub struct SymbolTable {
  symbols: Vec<Symbol>,
  scopes: Vec<Scope>,
  open: Vec<ScopeId>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Push a new scope whose enclosing scope is the current top.
  pub fn open_scope(&mut self) -> ScopeId {
    let id = ScopeId(self.scopes.len());
    self.scopes.push(Scope {
      symbols: Vec::new(),
      enclosing: self.open.last().copied(),
    });
    self.open.push(id);
    id
  }

  /// Pop the current scope and hand it back; the caller typically walks
  /// its symbols for storage allocation or global emission.
  pub fn close_scope(&mut self) -> ScopeId {
    self.open.pop().expect("close_scope with no open scope")
  }

  /// The innermost open scope.
  pub fn current(&self) -> ScopeId {
    *self.open.last().expect("no open scope")
  }

  /// The file-level scope, which is always the first one opened.
  pub fn globals(&self) -> ScopeId {
    assert!(!self.scopes.is_empty(), "no scope has been opened");
    ScopeId(0)
  }

  pub fn insert(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
    let id = SymbolId(self.symbols.len());
    self.symbols.push(symbol);
    self.scopes[scope.0].symbols.push(id);
    id
  }

  /// Drop the binding for `name` from the given scope. The symbol itself
  /// stays in the arena so outstanding ids remain valid.
  pub fn remove(&mut self, scope: ScopeId, name: &str) {
    let symbols = &mut self.scopes[scope.0].symbols;
    if let Some(position) = symbols
      .iter()
      .rposition(|&id| self.symbols[id.0].name == name)
    {
      symbols.remove(position);
    }
  }

  /// Find a symbol declared directly in `scope`. Searches newest-first,
  /// so the most recent declaration of a name wins.
  pub fn find(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
    self.scopes[scope.0]
      .symbols
      .iter()
      .rev()
      .copied()
      .find(|&id| self.symbols[id.0].name == name)
  }

  /// Search the scope chain innermost-first.
  pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
    let mut next = Some(scope);
    while let Some(current) = next {
      if let Some(id) = self.find(current, name) {
        return Some(id);
      }
      next = self.scopes[current.0].enclosing;
    }
    None
  }

  pub fn symbol(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0]
  }

  /// Symbols of a scope in declaration order; for a function body scope
  /// the parameters come first.
  pub fn symbols_of(&self, scope: ScopeId) -> &[SymbolId] {
    &self.scopes[scope.0].symbols
  }

  /// Assign a frame offset. Offsets are written at most once; the
  /// allocator checks the sentinel before calling.
  pub fn set_offset(&mut self, id: SymbolId, offset: i64) {
    let symbol = &mut self.symbols[id.0];
    assert_eq!(symbol.offset, 0, "offset of '{}' reassigned", symbol.name);
    symbol.offset = offset;
  }
}
