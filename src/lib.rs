//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and drives the checker.
//! - `checker` enforces the language rules, building typed trees with every
//!   implicit conversion made explicit, and collects semantic diagnostics.
//! - `allocator` assigns frame offsets to parameters and locals.
//! - `codegen` lowers the checked trees into x86-64 AT&T assembly.
//! - `ty`, `scope`, and `tree` hold the data the passes exchange;
//!   `machine` pins down the target, and `error` centralises reporting.

pub mod allocator;
pub mod checker;
pub mod codegen;
pub mod error;
pub mod machine;
pub mod parser;
pub mod scope;
pub mod tokenizer;
pub mod tree;
pub mod ty;

pub use error::{CompileError, CompileResult};

/// What one run of the compiler produced. A syntax error aborts
/// compilation and is returned as `Err` instead; semantic errors land in
/// `diagnostics` and suppress the assembly without failing the run.
#[derive(Debug)]
pub struct Compilation {
  pub assembly: Option<String>,
  pub diagnostics: Vec<String>,
}

/// Compile a translation unit to AT&T assembly.
pub fn compile(source: &str) -> CompileResult<Compilation> {
  let tokens = tokenizer::tokenize(source)?;
  let mut checker = checker::Checker::new();
  let unit = parser::parse(tokens, source, &mut checker)?;

  let assembly = if checker.reporter.is_clean() {
    log::info!("generating assembly for {} function(s)", unit.functions.len());
    Some(codegen::generate(&unit, &mut checker.table))
  } else {
    log::info!(
      "skipping code generation after {} semantic error(s)",
      checker.reporter.error_count()
    );
    None
  };

  Ok(Compilation {
    assembly,
    diagnostics: checker.reporter.into_diagnostics(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn a_clean_program_compiles_to_assembly() {
    let source = "int fib(int n) {
      if (n < 2)
        return n;
      return fib(n - 1) + fib(n - 2);
    }

    int main(void) {
      return fib(10);
    }";
    let compilation = compile(source).unwrap();
    assert!(compilation.diagnostics.is_empty());
    let asm = compilation.assembly.unwrap();
    assert!(asm.contains("fib:\n"));
    assert!(asm.contains("\tcall\tfib\n"));
    assert!(asm.contains("\t.globl\tmain\n"));
  }

  #[test]
  fn semantic_errors_suppress_assembly_but_not_the_run() {
    let source = "int main(void) { return x + *3; }";
    let compilation = compile(source).unwrap();
    assert!(compilation.assembly.is_none());
    assert_eq!(
      compilation.diagnostics,
      [
        "line 1: 'x' undeclared",
        "line 1: invalid operand to unary *"
      ]
    );
  }

  #[test]
  fn a_syntax_error_fails_the_whole_run() {
    let err = compile("int main(void) { int 3; }").unwrap_err();
    assert_eq!(err.to_string(), "line 1: syntax error at '3'");
  }

  #[test]
  fn the_classic_greeting_survives_the_whole_pipeline() {
    let source = "int puts();

    int main(void) {
      puts(\"hello, world\");
      return 0;
    }";
    let compilation = compile(source).unwrap();
    let asm = compilation.assembly.unwrap();
    assert!(asm.contains("\tcall\tputs\n"));
    assert!(asm.contains(".asciz\t\"hello, world\""));
  }
}
