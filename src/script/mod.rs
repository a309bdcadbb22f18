// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline script language
//!
//! A small Kotlin-script flavoured language: `let`, `fn`, `if`, loops,
//! arrays, string interpolation and trailing-block calls such as
//! `step("build") { cmd("make") }`.

pub mod ast;
mod error;
pub mod interpreter;
pub mod lexer;
pub mod modules;
pub mod parser;
mod token;
pub mod value;

pub use error::{ScriptError, ScriptErrorKind, ScriptResult};
pub use interpreter::Interpreter;
pub use lexer::tokenize;
pub use modules::layout::{Created, LayoutState};
pub use parser::parse;
pub use token::{Span, StrPart, Token, TokenKind};
pub use value::Value;
