//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about semantics. It recognises keywords,
//! identifiers, numeric and character literals, string literals, and
//! punctuators, and tracks the line number of each token for diagnostics.
//! Multi-character punctuators are matched before single-character ones to
//! avoid ambiguity.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Keyword,
  Ident,
  Num,
  CharLit,
  StringLit,
  Punctuator,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<u64>,
  pub loc: usize,
  pub len: usize,
  pub line: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, line: usize, value: Option<u64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
      line,
    }
  }
}

/// Every reserved word of the language. Only a handful are given meaning
/// by the parser; using any of the others is a syntax error there, not a
/// valid identifier here.
const KEYWORDS: &[&str] = &[
  "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else", "enum",
  "extern", "float", "for", "goto", "if", "int", "long", "register", "return", "short", "signed",
  "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void", "volatile",
  "while",
];

fn is_ident_start(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
  c.is_ascii_alphanumeric() || c == b'_'
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line = 1;

  while i < bytes.len() {
    let c = bytes[i];

    if c == b'\n' {
      line += 1;
      i += 1;
      continue;
    }

    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("/*") {
      let start_line = line;
      let mut j = i + 2;
      loop {
        if j + 1 >= bytes.len() {
          return Err(CompileError::syntax_at_eof(start_line));
        }
        if bytes[j] == b'\n' {
          line += 1;
        }
        if bytes[j] == b'*' && bytes[j + 1] == b'/' {
          break;
        }
        j += 1;
      }
      i = j + 2;
      continue;
    }

    if is_ident_start(c) {
      let start = i;
      i += 1;
      while i < bytes.len() && is_ident_continue(bytes[i]) {
        i += 1;
      }
      let text = &input[start..i];
      let kind = if KEYWORDS.contains(&text) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, line, None));
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      let (value, end) = scan_number(input, start, line)?;
      i = end;
      tokens.push(Token::new(TokenKind::Num, start, i - start, line, Some(value)));
      continue;
    }

    if c == b'\'' {
      let start = i;
      let (value, end) = scan_char(input, start, line)?;
      i = end;
      tokens.push(Token::new(
        TokenKind::CharLit,
        start,
        i - start,
        line,
        Some(value),
      ));
      continue;
    }

    if c == b'"' {
      let start = i;
      let end = scan_string(input, start, line)?;
      i = end;
      tokens.push(Token::new(TokenKind::StringLit, start, i - start, line, None));
      continue;
    }

    if let Some(op) = ["==", "!=", "<=", ">=", "&&", "||"]
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), line, None));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+'
        | b'-'
        | b'*'
        | b'/'
        | b'%'
        | b'('
        | b')'
        | b'['
        | b']'
        | b'{'
        | b'}'
        | b'<'
        | b'>'
        | b'='
        | b'!'
        | b'&'
        | b';'
        | b','
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, line, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::syntax(line, invalid_char.to_string()));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, line, None));
  Ok(tokens)
}

/// Scan a numeric literal starting at `start`. Handles decimal, octal
/// (leading zero), and hexadecimal (`0x`) forms with an optional `l`/`L`
/// suffix. Returns the value and the index past the literal.
fn scan_number(input: &str, start: usize, line: usize) -> CompileResult<(u64, usize)> {
  let bytes = input.as_bytes();
  let mut i = start;

  let (base, digits_start) = if input[i..].starts_with("0x") || input[i..].starts_with("0X") {
    (16, i + 2)
  } else if bytes[i] == b'0' {
    (8, i)
  } else {
    (10, i)
  };

  i = digits_start;
  while i < bytes.len() && (bytes[i] as char).is_digit(base) {
    i += 1;
  }

  let text = &input[digits_start..i];
  let digits = if text.is_empty() { "0" } else { text };
  let value = u64::from_str_radix(digits, base)
    .map_err(|_| CompileError::syntax(line, &input[start..i]))?;

  if i < bytes.len() && (bytes[i] == b'l' || bytes[i] == b'L') {
    i += 1;
  }

  Ok((value, i))
}

/// Scan a character literal, interpreting any escape sequence, and return
/// its value and the index past the closing quote.
fn scan_char(input: &str, start: usize, line: usize) -> CompileResult<(u64, usize)> {
  let bytes = input.as_bytes();
  let mut i = start + 1;

  if i >= bytes.len() || bytes[i] == b'\'' || bytes[i] == b'\n' {
    return Err(CompileError::syntax(line, "'"));
  }

  let value = if bytes[i] == b'\\' {
    i += 1;
    if i >= bytes.len() {
      return Err(CompileError::syntax_at_eof(line));
    }
    let v = unescape(bytes[i]);
    i += 1;
    v
  } else {
    let v = bytes[i] as u64;
    i += 1;
    v
  };

  if i >= bytes.len() || bytes[i] != b'\'' {
    return Err(CompileError::syntax(line, "'"));
  }

  Ok((value, i + 1))
}

/// Scan a string literal and return the index past the closing quote. The
/// token keeps the raw text; `parse_string` interprets the escapes.
fn scan_string(input: &str, start: usize, line: usize) -> CompileResult<usize> {
  let bytes = input.as_bytes();
  let mut i = start + 1;

  while i < bytes.len() {
    match bytes[i] {
      b'"' => return Ok(i + 1),
      b'\n' => return Err(CompileError::syntax(line, "\"")),
      b'\\' => i += 2,
      _ => i += 1,
    }
  }

  Err(CompileError::syntax_at_eof(line))
}

fn unescape(c: u8) -> u64 {
  match c {
    b'a' => 7,
    b'b' => 8,
    b'f' => 12,
    b'n' => b'\n' as u64,
    b'r' => b'\r' as u64,
    b't' => b'\t' as u64,
    b'v' => 11,
    b'0' => 0,
    other => other as u64,
  }
}

/// Interpret the escapes of a string-literal token's raw text, quotes
/// stripped.
pub fn parse_string(token: &Token, source: &str) -> String {
  let raw = token_text(token, source);
  let inner = &raw[1..raw.len() - 1];
  let bytes = inner.as_bytes();
  let mut result = String::with_capacity(inner.len());
  let mut i = 0;

  while i < bytes.len() {
    if bytes[i] == b'\\' && i + 1 < bytes.len() {
      result.push(unescape(bytes[i + 1]) as u8 as char);
      i += 2;
    } else {
      result.push(bytes[i] as char);
      i += 1;
    }
  }

  result
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).unwrap().iter().map(|t| t.kind).collect()
  }

  #[test]
  fn keywords_are_distinguished_from_identifiers() {
    let tokens = tokenize("int main while whilst _x").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Keyword);
    assert_eq!(tokens[1].kind, TokenKind::Ident);
    assert_eq!(tokens[2].kind, TokenKind::Keyword);
    assert_eq!(tokens[3].kind, TokenKind::Ident);
    assert_eq!(tokens[4].kind, TokenKind::Ident);
    assert_eq!(tokens[5].kind, TokenKind::Eof);
  }

  #[test]
  fn numbers_in_all_bases_with_suffix() {
    let tokens = tokenize("10 0x1f 017 42L 0").unwrap();
    let values: Vec<u64> = tokens[..5].iter().map(|t| t.value.unwrap()).collect();
    assert_eq!(values, vec![10, 31, 15, 42, 0]);
    assert_eq!(token_text(&tokens[3], "10 0x1f 017 42L 0"), "42L");
  }

  #[test]
  fn character_literals_yield_their_value() {
    let tokens = tokenize(r"'a' '\n' '\0' '\\'").unwrap();
    let values: Vec<u64> = tokens[..4].iter().map(|t| t.value.unwrap()).collect();
    assert_eq!(values, vec![97, 10, 0, 92]);
  }

  #[test]
  fn string_literals_keep_raw_text_and_unescape_on_demand() {
    let source = r#""hi\n" "a\\b""#;
    let tokens = tokenize(source).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::StringLit);
    assert_eq!(parse_string(&tokens[0], source), "hi\n");
    assert_eq!(parse_string(&tokens[1], source), "a\\b");
  }

  #[test]
  fn two_character_punctuators_win_over_one() {
    let source = "a <= b == c && d";
    let tokens = tokenize(source).unwrap();
    assert_eq!(token_text(&tokens[1], source), "<=");
    assert_eq!(token_text(&tokens[3], source), "==");
    assert_eq!(token_text(&tokens[5], source), "&&");
  }

  #[test]
  fn comments_and_newlines_advance_the_line_counter() {
    let source = "int a;\n/* two\nlines */ int b;";
    let tokens = tokenize(source).unwrap();
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[3].line, 3);
  }

  #[test]
  fn unterminated_comment_is_a_syntax_error() {
    let err = tokenize("int a; /* oops").unwrap_err();
    assert!(err.to_string().contains("syntax error"));
  }

  #[test]
  fn stray_character_is_rejected() {
    assert!(tokenize("int a @ b;").is_err());
    assert_eq!(
      kinds("f(a, b);"),
      vec![
        TokenKind::Ident,
        TokenKind::Punctuator,
        TokenKind::Ident,
        TokenKind::Punctuator,
        TokenKind::Ident,
        TokenKind::Punctuator,
        TokenKind::Punctuator,
        TokenKind::Eof,
      ]
    );
  }
}
