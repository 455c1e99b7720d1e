//! Shared error utilities used across the compilation pipeline.
//!
//! Two kinds of trouble exist and they are deliberately kept apart. A
//! syntax error is fatal: the parser stops at once and the whole run
//! fails, so it travels as a `CompileError` through `Result`. A semantic
//! error is not: the checker records a one-line diagnostic with the
//! `Reporter`, substitutes the error type, and keeps going so one run can
//! surface every independent mistake.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("line {line}: syntax error at '{text}'"))]
  Syntax { line: usize, text: String },

  #[snafu(display("line {line}: syntax error at end of file"))]
  SyntaxAtEof { line: usize },
}

impl CompileError {
  /// Construct a syntax error anchored at the offending lexeme.
  pub fn syntax(line: usize, text: impl Into<String>) -> Self {
    Self::Syntax {
      line,
      text: text.into(),
    }
  }

  pub fn syntax_at_eof(line: usize) -> Self {
    Self::SyntaxAtEof { line }
  }
}

/// Collects non-fatal semantic diagnostics.
///
/// Messages keep the original compiler's wording and format, one line
/// each: `line N: message`. The count of recorded messages decides later
/// whether code generation runs at all.
#[derive(Debug, Default)]
pub struct Reporter {
  diagnostics: Vec<String>,
}

impl Reporter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a semantic diagnostic against the given source line.
  pub fn report(&mut self, line: usize, message: impl Into<String>) {
    let message = message.into();
    log::debug!("semantic error on line {line}: {message}");
    self.diagnostics.push(format!("line {line}: {message}"));
  }

  pub fn error_count(&self) -> usize {
    self.diagnostics.len()
  }

  pub fn is_clean(&self) -> bool {
    self.diagnostics.is_empty()
  }

  pub fn diagnostics(&self) -> &[String] {
    &self.diagnostics
  }

  pub fn into_diagnostics(self) -> Vec<String> {
    self.diagnostics
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn syntax_error_formats_with_line() {
    let err = CompileError::syntax(3, "}");
    assert_eq!(err.to_string(), "line 3: syntax error at '}'");
    let err = CompileError::syntax_at_eof(7);
    assert_eq!(err.to_string(), "line 7: syntax error at end of file");
  }

  #[test]
  fn reporter_accumulates_in_order() {
    let mut reporter = Reporter::new();
    assert!(reporter.is_clean());
    reporter.report(1, "'x' undeclared");
    reporter.report(2, "redefinition of 'f'");
    assert_eq!(reporter.error_count(), 2);
    assert_eq!(reporter.diagnostics()[0], "line 1: 'x' undeclared");
    assert_eq!(reporter.diagnostics()[1], "line 2: redefinition of 'f'");
  }
}
