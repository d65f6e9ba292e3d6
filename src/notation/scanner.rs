//! The tiny scanner shared by every short-notation parser (spec.md
//! §4.5): end-of-input, non-negative integers, bare alphabetic
//! identifiers, and the one-character tokens `- , : # [ ] ( ) @`.
//!
//! Pool names are not lexed here — spec.md §4.5 says identifiers extend
//! until a `[` or `#` is seen, which only ever applies to the leading
//! pool name. Callers split that prefix off with [`split_pool_name`]
//! before handing the remainder to [`Scanner`].

use crate::error::{SpecError, SpecErrorCode, SpecKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Int(u64),
    Ident(String),
    Minus,
    Comma,
    Colon,
    Hash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Eof,
}

pub struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn err(kind: SpecKind, msg: impl Into<String>) -> SpecError {
    SpecError::new(SpecErrorCode::ParseError, kind, msg)
}

impl<'a> Scanner<'a> {
    pub fn new(s: &'a str) -> Self {
        Scanner { bytes: s.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn next_token(&mut self, kind: SpecKind) -> Result<Tok, SpecError> {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let Some(b) = self.peek() else { return Ok(Tok::Eof) };
        let tok = match b {
            b'-' => { self.pos += 1; Tok::Minus }
            b',' => { self.pos += 1; Tok::Comma }
            b':' => { self.pos += 1; Tok::Colon }
            b'#' => { self.pos += 1; Tok::Hash }
            b'[' => { self.pos += 1; Tok::LBracket }
            b']' => { self.pos += 1; Tok::RBracket }
            b'(' => { self.pos += 1; Tok::LParen }
            b')' => { self.pos += 1; Tok::RParen }
            b'@' => { self.pos += 1; Tok::At }
            b'0'..=b'9' => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
                text.parse::<u64>().map(Tok::Int).map_err(|_| err(kind, format!("invalid integer `{text}`")))?
            }
            b if b.is_ascii_alphabetic() => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if b.is_ascii_alphabetic()) {
                    self.pos += 1;
                }
                Tok::Ident(std::str::from_utf8(&self.bytes[start..self.pos]).unwrap().to_string())
            }
            other => return Err(err(kind, format!("unexpected character `{}`", other as char))),
        };
        Ok(tok)
    }
}

/// Splits the leading pool name off `s`, stopping at the first `[` or
/// `#` (spec.md §4.5).
pub fn split_pool_name(s: &str, kind: SpecKind) -> Result<(&str, &str), SpecError> {
    let idx = s
        .find(['[', '#'])
        .ok_or_else(|| err(kind, "missing `[` or `#` after pool name"))?;
    if idx == 0 {
        return Err(err(kind, "empty pool name"));
    }
    Ok((&s[..idx], &s[idx..]))
}
