// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Errors raised while lexing, parsing or evaluating a script
//!
//! These carry only a span. The loader turns them into a
//! [`PipeflowError::Script`](crate::PipeflowError) once the source text is known.

use thiserror::Error;

use super::token::Span;

pub type ScriptResult<T> = Result<T, ScriptError>;

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub span: Span,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at byte {})", self.kind, self.span.offset)
    }
}

impl std::error::Error for ScriptError {}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptErrorKind {
    // ─────────────────────────────────────────────────────────────────────────
    // Lexing
    // ─────────────────────────────────────────────────────────────────────────
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    #[error("invalid interpolation, expected ${{name}}")]
    InvalidInterpolation,

    #[error("malformed number '{0}'")]
    InvalidNumber(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Parsing
    // ─────────────────────────────────────────────────────────────────────────
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("'{0}' is a reserved keyword")]
    Reserved(String),

    #[error("invalid assignment target")]
    InvalidAssignment,

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────
    #[error("function '{0}' is not defined")]
    UndefinedFunction(String),

    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("cannot apply '{op}' to {left} and {right}")]
    UnsupportedOperation {
        op: String,
        left: String,
        right: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(String),

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("'{function}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("condition must be a bool, found {found}")]
    NonBoolCondition { found: String },

    #[error("'{function}' can only be used inside {context}")]
    OutsideContext { function: String, context: String },

    #[error("invalid argument to '{function}': {message}")]
    InvalidArgument { function: String, message: String },

    #[error("'{0}' outside of a loop")]
    LoopControlOutsideLoop(String),

    #[error("'return' outside of a function")]
    ReturnOutsideFunction,

    #[error("recursion limit of {0} calls exceeded")]
    RecursionLimit(usize),

    #[error("{0}")]
    Io(String),
}

impl ScriptErrorKind {
    /// Short label shown under the offending span
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnexpectedChar(_) => "unexpected character",
            Self::UnterminatedString => "string starts here",
            Self::UnterminatedComment => "comment starts here",
            Self::InvalidEscape(_) => "unknown escape",
            Self::InvalidInterpolation => "bad interpolation",
            Self::InvalidNumber(_) => "not a number",
            Self::UnexpectedToken { .. } => "unexpected token",
            Self::Reserved(_) => "keyword used as a name",
            Self::InvalidAssignment => "cannot assign to this",
            Self::NestingTooDeep(_) => "too deeply nested",
            Self::UndefinedFunction(_) => "not defined",
            Self::UndefinedVariable(_) => "not defined",
            Self::UnknownModule(_) => "unknown module",
            Self::TypeMismatch { .. } => "wrong type",
            Self::UnsupportedOperation { .. } => "unsupported operation",
            Self::DivisionByZero => "divides by zero",
            Self::Overflow(_) => "overflows",
            Self::IndexOutOfBounds { .. } => "out of bounds",
            Self::ArityMismatch { .. } => "wrong number of arguments",
            Self::NonBoolCondition { .. } => "not a bool",
            Self::OutsideContext { .. } => "used here",
            Self::InvalidArgument { .. } => "invalid argument",
            Self::LoopControlOutsideLoop(_) => "not in a loop",
            Self::ReturnOutsideFunction => "not in a function",
            Self::RecursionLimit(_) => "called here",
            Self::Io(_) => "failed here",
        }
    }
}
