// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Parsing infrastructure for Garnet source code.
//!
//! This module contains the source unit model, the lexer, and the parser.
//!
//! # Lexical Analysis
//!
//! [`lex`] converts a [`SourceUnit`] into a stream of [`Token`]s. Each token
//! carries its [`Span`] and leading [`Trivia`] (whitespace and comments);
//! statement-terminating newlines and the spacing rules the grammar depends
//! on (`a -1` vs `a - 1`) are read back from that trivia.
//!
//! ```
//! use garnet_syntax::source_analysis::{lex, SourceUnit};
//!
//! let unit = SourceUnit::new("demo.grn", "x + 1");
//! let tokens = lex(&unit)?;
//! assert_eq!(tokens.len(), 4); // x, +, 1, eof
//! # Ok::<(), garnet_syntax::source_analysis::SyntaxError>(())
//! ```
//!
//! # Parsing
//!
//! [`parse`] converts one unit into an [`Ast`](crate::ast::Ast), driving the
//! lexer on demand. Binary operator precedence uses Pratt binding powers;
//! `&&`/`||`/compound assignments are desugared during parsing.
//!
//! # Error Handling
//!
//! Lexing and parsing are fail-fast: the first malformed literal or
//! unexpected token aborts with a single [`SyntaxError`] carrying a precise
//! [`Position`](crate::ast::Position). There is no recovery and no partial
//! tree.

mod error;
mod lexer;
mod parser;
mod source;
mod span;
mod token;

#[cfg(test)]
mod lexer_property_tests;

pub use error::{SyntaxError, SyntaxErrorKind};
pub use lexer::{lex, Lexer};
pub use parser::{parse, ParserConfig};
pub use source::SourceUnit;
pub use span::Span;
pub use token::{Keyword, StringPiece, Token, TokenKind, Trivia};
