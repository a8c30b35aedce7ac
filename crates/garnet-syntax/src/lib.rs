// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Garnet language front end.
//!
//! This crate contains the syntactic layer of the Garnet compiler:
//! - Lexical analysis (tokenization)
//! - Parsing (AST construction, parse-time desugaring)
//! - The AST arena with parent links, clone, and structural replace
//! - The scanner framework for tree traversal
//!
//! Parsing is fail-fast: the first lexical or grammar error aborts with a
//! single [`source_analysis::SyntaxError`] carrying a precise
//! [`ast::Position`]. There is no error recovery and no partial tree.

pub mod ast;
pub mod ast_printer;
pub mod ast_scanner;
pub mod source_analysis;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::ast::{Ast, Node, NodeId, NodeKind, Position};
    pub use crate::ast_scanner::{scan, Scanner};
    pub use crate::source_analysis::{parse, ParserConfig, SourceUnit, Span, SyntaxError};
}
