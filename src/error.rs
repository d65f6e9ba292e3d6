//! Shared error types for the expression, linear-analysis, and notation
//! subsystems (spec.md §7).

use thiserror::Error;

/// A byte offset into a parsed string — the free-string analogue of
/// `util::Location`, which tracks line/column within a file.
pub type Pos = usize;

/// Errors raised while building, rebuilding, or differentiating an
/// [`crate::expr::Expr`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error at byte {0}: {1}")]
    Parse(Pos, String),

    #[error("expression is not a linear combination of named variables")]
    NonLinear,

    #[error("operator `{0}` is not differentiable without smoothing")]
    NonDifferentiable(String),

    #[error("operator `{0}` is not valid in this context")]
    InvalidOperator(String),
}

/// The measurement kind a [`SpecError`] was raised while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Ms,
    MsMs,
    Mims,
    Nmr1h,
    Nmr13c,
    Generic,
}

/// The notation parsers' documented integer error codes (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecErrorCode {
    Success = 0,
    ParseError = 1,
    InvalidRange = 2,
    OverlappingRanges = 3,
    NotEnoughPositions = 4,
    InvalidWeightSpec = 5,
}

impl SpecErrorCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// An error raised by one of the short-notation parsers (spec.md §6, §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?} spec error (code {}): {message}", code.code())]
pub struct SpecError {
    pub code: SpecErrorCode,
    pub kind: SpecKind,
    pub message: String,
}

impl SpecError {
    pub fn new(code: SpecErrorCode, kind: SpecKind, message: impl Into<String>) -> Self {
        SpecError { code, kind, message: message.into() }
    }

    pub fn code(&self) -> u8 {
        self.code.code()
    }
}
