//! Recursive-descent parser for Simple C.
//!
//! The parser owns the grammar and nothing else. Every declaration and
//! every expression it recognises goes straight through the checker, so
//! what comes out is the checked, rewritten tree rather than a raw
//! syntactic one. Precedence is handled with one helper per level, each
//! consuming its operators in a loop.
//!
//! A syntax error is fatal and aborts the parse; semantic errors are
//! collected by the checker's reporter and do not stop anything.

use crate::checker::Checker;
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, parse_string, token_text};
use crate::tree::{Block, Expression, Function, Statement, TranslationUnit};
use crate::ty::{Parameters, Specifier, Type};

/// Parse a whole translation unit. The checker comes in empty and leaves
/// holding the symbol table and any semantic diagnostics.
pub fn parse(
  tokens: Vec<Token>,
  source: &str,
  checker: &mut Checker,
) -> CompileResult<TranslationUnit> {
  let mut stream = TokenStream::new(tokens, source);
  checker.table.open_scope();

  let mut functions = Vec::new();
  while !stream.is_eof() {
    if let Some(function) = parse_global(&mut stream, checker)? {
      functions.push(function);
    }
  }

  let globals = checker.table.close_scope();
  Ok(TranslationUnit { functions, globals })
}

/// One file-level construct: a declaration list or a function definition.
fn parse_global(
  stream: &mut TokenStream,
  checker: &mut Checker,
) -> CompileResult<Option<Function>> {
  checker.set_line(stream.line());
  let specifier = parse_specifier(stream)?;
  let indirection = parse_pointers(stream);
  let name = stream.get_ident()?;

  if stream.equal("(") {
    if stream.equal(")") {
      let ty = Type::function(specifier, indirection, Parameters::Unspecified);
      checker.declare_function(&name, ty);
      parse_remaining_declarators(stream, checker, specifier)?;
      return Ok(None);
    }
    return parse_function_body(stream, checker, specifier, indirection, name).map(Some);
  }

  parse_global_declarator_tail(stream, checker, specifier, indirection, &name)?;
  parse_remaining_declarators(stream, checker, specifier)?;
  Ok(None)
}

/// The rest of a file-level declarator once the pointers and name have
/// been read: an optional array length or empty parameter list.
fn parse_global_declarator_tail(
  stream: &mut TokenStream,
  checker: &mut Checker,
  specifier: Specifier,
  indirection: u32,
  name: &str,
) -> CompileResult<()> {
  if stream.equal("[") {
    let length = stream.get_number()?.0;
    stream.skip("]")?;
    checker.declare_variable(name, Type::array(specifier, indirection, length));
  } else if stream.equal("(") {
    stream.skip(")")?;
    checker.declare_function(name, Type::function(specifier, indirection, Parameters::Unspecified));
  } else {
    checker.declare_variable(name, Type::scalar(specifier, indirection));
  }
  Ok(())
}

fn parse_remaining_declarators(
  stream: &mut TokenStream,
  checker: &mut Checker,
  specifier: Specifier,
) -> CompileResult<()> {
  while !stream.equal(";") {
    stream.skip(",")?;
    checker.set_line(stream.line());
    let indirection = parse_pointers(stream);
    let name = stream.get_ident()?;
    parse_global_declarator_tail(stream, checker, specifier, indirection, &name)?;
  }
  Ok(())
}

/// A function definition from the opening parenthesis of its parameter
/// list onward. The parameters live in the same scope as the body's
/// declarations.
fn parse_function_body(
  stream: &mut TokenStream,
  checker: &mut Checker,
  specifier: Specifier,
  indirection: u32,
  name: String,
) -> CompileResult<Function> {
  checker.table.open_scope();
  let parameters = parse_parameters(stream, checker)?;
  stream.skip(")")?;

  let ty = Type::function(specifier, indirection, parameters);
  let id = checker.define_function(&name, ty);

  stream.skip("{")?;
  parse_declarations(stream, checker)?;
  let return_type = Type::scalar(specifier, indirection);
  let statements = parse_statements(stream, checker, &return_type)?;
  stream.skip("}")?;

  let scope = checker.table.close_scope();
  Ok(Function {
    id,
    body: Block { scope, statements },
  })
}

/// `void` alone means no parameters; otherwise a comma-separated list of
/// scalar declarators, each declared in the function scope as it is seen.
fn parse_parameters(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Parameters> {
  let specifier = parse_specifier(stream)?;

  if specifier == Specifier::Void && stream.peek_is(")") {
    return Ok(Parameters::Empty);
  }

  let mut types = vec![parse_parameter(stream, checker, specifier)?];
  while stream.equal(",") {
    let specifier = parse_specifier(stream)?;
    types.push(parse_parameter(stream, checker, specifier)?);
  }

  Ok(Parameters::Known(types))
}

fn parse_parameter(
  stream: &mut TokenStream,
  checker: &mut Checker,
  specifier: Specifier,
) -> CompileResult<Type> {
  checker.set_line(stream.line());
  let indirection = parse_pointers(stream);
  let name = stream.get_ident()?;
  let ty = Type::scalar(specifier, indirection);
  checker.declare_variable(&name, ty.clone());
  Ok(ty)
}

/// Local declarations at the top of a block.
fn parse_declarations(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<()> {
  while stream.peek_specifier().is_some() {
    checker.set_line(stream.line());
    let specifier = parse_specifier(stream)?;
    loop {
      let indirection = parse_pointers(stream);
      let name = stream.get_ident()?;
      let ty = if stream.equal("[") {
        let length = stream.get_number()?.0;
        stream.skip("]")?;
        Type::array(specifier, indirection, length)
      } else {
        Type::scalar(specifier, indirection)
      };
      checker.declare_variable(&name, ty);
      if !stream.equal(",") {
        break;
      }
    }
    stream.skip(";")?;
  }
  Ok(())
}

fn parse_statements(
  stream: &mut TokenStream,
  checker: &mut Checker,
  return_type: &Type,
) -> CompileResult<Vec<Statement>> {
  let mut statements = Vec::new();
  while !stream.peek_is("}") {
    statements.push(parse_statement(stream, checker, return_type)?);
  }
  Ok(statements)
}

fn parse_statement(
  stream: &mut TokenStream,
  checker: &mut Checker,
  return_type: &Type,
) -> CompileResult<Statement> {
  checker.set_line(stream.line());

  if stream.equal("{") {
    checker.table.open_scope();
    parse_declarations(stream, checker)?;
    let statements = parse_statements(stream, checker, return_type)?;
    stream.skip("}")?;
    let scope = checker.table.close_scope();
    return Ok(Statement::Block(Block { scope, statements }));
  }

  if stream.keyword("return") {
    let expr = parse_expr(stream, checker)?;
    checker.set_line(stream.line());
    let statement = checker.check_return(expr, return_type);
    stream.skip(";")?;
    return Ok(statement);
  }

  if stream.keyword("while") {
    stream.skip("(")?;
    let test = parse_expr(stream, checker)?;
    let test = checker.check_test(test);
    stream.skip(")")?;
    let body = parse_statement(stream, checker, return_type)?;
    return Ok(Statement::While {
      test,
      body: Box::new(body),
    });
  }

  if stream.keyword("for") {
    stream.skip("(")?;
    let init = parse_assignment(stream, checker)?;
    stream.skip(";")?;
    let test = parse_expr(stream, checker)?;
    let test = checker.check_test(test);
    stream.skip(";")?;
    let step = parse_assignment(stream, checker)?;
    stream.skip(")")?;
    let body = parse_statement(stream, checker, return_type)?;
    return Ok(Statement::For {
      init: Box::new(init),
      test,
      step: Box::new(step),
      body: Box::new(body),
    });
  }

  if stream.keyword("if") {
    stream.skip("(")?;
    let test = parse_expr(stream, checker)?;
    let test = checker.check_test(test);
    stream.skip(")")?;
    let then_stmt = parse_statement(stream, checker, return_type)?;
    let else_stmt = if stream.keyword("else") {
      Some(Box::new(parse_statement(stream, checker, return_type)?))
    } else {
      None
    };
    return Ok(Statement::If {
      test,
      then_stmt: Box::new(then_stmt),
      else_stmt,
    });
  }

  let statement = parse_assignment(stream, checker)?;
  stream.skip(";")?;
  Ok(statement)
}

/// An expression statement with an optional top-level assignment. `=` is
/// not an expression operator in this language.
fn parse_assignment(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Statement> {
  let left = parse_expr(stream, checker)?;

  if stream.equal("=") {
    let right = parse_expr(stream, checker)?;
    checker.set_line(stream.line());
    return Ok(checker.check_assignment(left, right));
  }

  Ok(Statement::Simple(left))
}

fn parse_expr(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  parse_logical_or(stream, checker)
}

fn parse_logical_or(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  let mut node = parse_logical_and(stream, checker)?;

  while stream.equal("||") {
    let rhs = parse_logical_and(stream, checker)?;
    node = checker.check_logical_or(node, rhs);
  }

  Ok(node)
}

fn parse_logical_and(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  let mut node = parse_equality(stream, checker)?;

  while stream.equal("&&") {
    let rhs = parse_equality(stream, checker)?;
    node = checker.check_logical_and(node, rhs);
  }

  Ok(node)
}

fn parse_equality(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  let mut node = parse_relational(stream, checker)?;

  loop {
    if stream.equal("==") {
      let rhs = parse_relational(stream, checker)?;
      node = checker.check_equal(node, rhs);
    } else if stream.equal("!=") {
      let rhs = parse_relational(stream, checker)?;
      node = checker.check_not_equal(node, rhs);
    } else {
      break;
    }
  }

  Ok(node)
}

fn parse_relational(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  let mut node = parse_additive(stream, checker)?;

  loop {
    if stream.equal("<=") {
      let rhs = parse_additive(stream, checker)?;
      node = checker.check_less_or_equal(node, rhs);
    } else if stream.equal(">=") {
      let rhs = parse_additive(stream, checker)?;
      node = checker.check_greater_or_equal(node, rhs);
    } else if stream.equal("<") {
      let rhs = parse_additive(stream, checker)?;
      node = checker.check_less_than(node, rhs);
    } else if stream.equal(">") {
      let rhs = parse_additive(stream, checker)?;
      node = checker.check_greater_than(node, rhs);
    } else {
      break;
    }
  }

  Ok(node)
}

fn parse_additive(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  let mut node = parse_multiplicative(stream, checker)?;

  loop {
    if stream.equal("+") {
      let rhs = parse_multiplicative(stream, checker)?;
      node = checker.check_add(node, rhs);
    } else if stream.equal("-") {
      let rhs = parse_multiplicative(stream, checker)?;
      node = checker.check_subtract(node, rhs);
    } else {
      break;
    }
  }

  Ok(node)
}

fn parse_multiplicative(
  stream: &mut TokenStream,
  checker: &mut Checker,
) -> CompileResult<Expression> {
  let mut node = parse_prefix(stream, checker)?;

  loop {
    if stream.equal("*") {
      let rhs = parse_prefix(stream, checker)?;
      node = checker.check_multiply(node, rhs);
    } else if stream.equal("/") {
      let rhs = parse_prefix(stream, checker)?;
      node = checker.check_divide(node, rhs);
    } else if stream.equal("%") {
      let rhs = parse_prefix(stream, checker)?;
      node = checker.check_remainder(node, rhs);
    } else {
      break;
    }
  }

  Ok(node)
}

fn parse_prefix(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  checker.set_line(stream.line());

  if stream.equal("!") {
    let operand = parse_prefix(stream, checker)?;
    return Ok(checker.check_not(operand));
  }

  if stream.equal("-") {
    let operand = parse_prefix(stream, checker)?;
    return Ok(checker.check_negate(operand));
  }

  if stream.equal("*") {
    let operand = parse_prefix(stream, checker)?;
    return Ok(checker.check_dereference(operand));
  }

  if stream.equal("&") {
    let operand = parse_prefix(stream, checker)?;
    return Ok(checker.check_address(operand));
  }

  if stream.keyword("sizeof") {
    let operand = parse_prefix(stream, checker)?;
    return Ok(checker.check_sizeof(operand));
  }

  parse_postfix(stream, checker)
}

fn parse_postfix(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  let mut node = parse_primary(stream, checker)?;

  while stream.equal("[") {
    let index = parse_expr(stream, checker)?;
    stream.skip("]")?;
    node = checker.check_array(node, index);
  }

  Ok(node)
}

fn parse_primary(stream: &mut TokenStream, checker: &mut Checker) -> CompileResult<Expression> {
  if stream.equal("(") {
    let node = parse_expr(stream, checker)?;
    stream.skip(")")?;
    return Ok(node);
  }

  match stream.peek().map(|token| token.kind) {
    Some(TokenKind::Num) => {
      let (value, long) = stream.get_number()?;
      Ok(checker.number(value, long))
    }
    Some(TokenKind::CharLit) => {
      let token = stream.advance();
      let value = token.value.unwrap_or(0);
      Ok(checker.number(value, false))
    }
    Some(TokenKind::StringLit) => {
      let token = stream.advance();
      let text = parse_string(&token, stream.source);
      Ok(checker.string(text))
    }
    Some(TokenKind::Ident) => {
      let name = stream.get_ident()?;
      if stream.equal("(") {
        let callee = checker.check_function(&name);
        let mut args = Vec::new();
        if !stream.peek_is(")") {
          args.push(parse_expr(stream, checker)?);
          while stream.equal(",") {
            args.push(parse_expr(stream, checker)?);
          }
        }
        stream.skip(")")?;
        return Ok(checker.check_call(callee, args));
      }
      Ok(checker.check_identifier(&name))
    }
    _ => Err(stream.error()),
  }
}

fn parse_specifier(stream: &mut TokenStream) -> CompileResult<Specifier> {
  match stream.peek_specifier() {
    Some(specifier) => {
      stream.advance();
      Ok(specifier)
    }
    None => Err(stream.error()),
  }
}

fn parse_pointers(stream: &mut TokenStream) -> u32 {
  let mut indirection = 0;
  while stream.equal("*") {
    indirection += 1;
  }
  indirection
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn advance(&mut self) -> Token {
    let token = self.tokens[self.pos].clone();
    if self.pos + 1 < self.tokens.len() {
      self.pos += 1;
    }
    token
  }

  /// The line of the current token, for diagnostics.
  fn line(&self) -> usize {
    self.peek().map(|token| token.line).unwrap_or(1)
  }

  fn text_matches(&self, token: &Token, kind: TokenKind, text: &str) -> bool {
    token.kind == kind && token.len == text.len() && token_text(token, self.source) == text
  }

  fn peek_is(&self, op: &str) -> bool {
    self
      .peek()
      .is_some_and(|token| self.text_matches(token, TokenKind::Punctuator, op))
  }

  /// Consume the current token if it is the given punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.peek_is(op) {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it is the given keyword.
  fn keyword(&mut self, word: &str) -> bool {
    if let Some(token) = self.peek()
      && self.text_matches(token, TokenKind::Keyword, word)
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, op: &str) -> CompileResult<()> {
    if self.equal(op) {
      return Ok(());
    }
    Err(self.error())
  }

  /// The specifier named by the current token, if it is one.
  fn peek_specifier(&self) -> Option<Specifier> {
    let token = self.peek()?;
    if token.kind != TokenKind::Keyword {
      return None;
    }
    match token_text(token, self.source) {
      "char" => Some(Specifier::Char),
      "int" => Some(Specifier::Int),
      "long" => Some(Specifier::Long),
      "void" => Some(Specifier::Void),
      _ => None,
    }
  }

  /// Consume a numeric literal, reporting whether it has type long: an
  /// explicit suffix or a value too big for an int.
  fn get_number(&mut self) -> CompileResult<(u64, bool)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.unwrap_or(0);
      let text = token_text(token, self.source);
      let long = text.ends_with(['l', 'L']) || value > i32::MAX as u64;
      self.pos += 1;
      return Ok((value, long));
    }
    Err(self.error())
  }

  fn get_ident(&mut self) -> CompileResult<String> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let name = token_text(token, self.source).to_string();
      self.pos += 1;
      return Ok(name);
    }
    Err(self.error())
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }

  /// A syntax error anchored at the current token.
  fn error(&self) -> CompileError {
    match self.peek() {
      Some(token) if token.kind != TokenKind::Eof => {
        CompileError::syntax(token.line, token_text(token, self.source))
      }
      Some(token) => CompileError::syntax_at_eof(token.line),
      None => CompileError::syntax_at_eof(self.line()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> (CompileResult<TranslationUnit>, Checker) {
    let mut checker = Checker::new();
    let tokens = tokenize(source).unwrap();
    let unit = parse(tokens, source, &mut checker);
    (unit, checker)
  }

  #[test]
  fn a_minimal_function_parses_cleanly() {
    let (unit, checker) = parse_source("int main(void) { return 0; }");
    let unit = unit.unwrap();
    assert_eq!(unit.functions.len(), 1);
    assert!(checker.reporter.is_clean());
    let main = &unit.functions[0];
    assert_eq!(checker.table.symbol(main.id).name(), "main");
    assert_eq!(main.body.statements.len(), 1);
  }

  #[test]
  fn declarations_and_rewrites_show_in_the_tree() {
    let source = "int f(int n) { int a[4]; a[n] = n + 1; return a[0]; }";
    let (unit, checker) = parse_source(source);
    let unit = unit.unwrap();
    assert!(checker.reporter.is_clean(), "{:?}", checker.reporter);
    let body = &unit.functions[0].body;
    assert_eq!(
      body.statements[0].display(&checker.table).to_string(),
      "(= (* (+ (& a) (* (long n) 4L))) (+ n 1))"
    );
    assert_eq!(
      body.statements[1].display(&checker.table).to_string(),
      "(return (* (+ (& a) 0L)))"
    );
  }

  #[test]
  fn globals_functions_and_calls_share_the_file_scope() {
    let source = "int x; int f(void) { return x; } int main(void) { return f(); }";
    let (unit, checker) = parse_source(source);
    let unit = unit.unwrap();
    assert!(checker.reporter.is_clean());
    assert_eq!(unit.functions.len(), 2);
    assert_eq!(checker.table.symbols_of(unit.globals).len(), 3);
  }

  #[test]
  fn control_flow_statements_nest() {
    let source = "int main(void) {
      int i;
      i = 0;
      while (i < 10)
        if (i % 2 == 0)
          i = i + 1;
        else
          for (i = i; i < 10; i = i + 2)
            i = i;
      return i;
    }";
    let (unit, checker) = parse_source(source);
    assert!(unit.is_ok());
    assert!(checker.reporter.is_clean());
  }

  #[test]
  fn a_syntax_error_is_fatal() {
    let (unit, _) = parse_source("int main(void) { return 0 }");
    let err = unit.unwrap_err();
    assert_eq!(err.to_string(), "line 1: syntax error at '}'");
  }

  #[test]
  fn semantic_errors_do_not_stop_the_parse() {
    let source = "int main(void) { y = 1; z = 2; return 0; }";
    let (unit, checker) = parse_source(source);
    assert!(unit.is_ok());
    assert_eq!(
      checker.reporter.diagnostics(),
      ["line 1: 'y' undeclared", "line 1: 'z' undeclared"]
    );
  }

  #[test]
  fn function_declarations_do_not_produce_bodies() {
    let source = "int f(), *g(); int main(void) { return f(); }";
    let (unit, checker) = parse_source(source);
    let unit = unit.unwrap();
    assert!(checker.reporter.is_clean());
    assert_eq!(unit.functions.len(), 1);
  }

  #[test]
  fn string_literals_become_char_arrays() {
    let source = "int puts(); int main(void) { puts(\"hi\"); return 0; }";
    let (unit, checker) = parse_source(source);
    assert!(unit.is_ok());
    assert!(checker.reporter.is_clean(), "{:?}", checker.reporter);
  }
}
