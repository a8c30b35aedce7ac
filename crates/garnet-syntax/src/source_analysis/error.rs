// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The single fatal error type of the front end.
//!
//! Parsing is fail-fast: the first lexical or structural problem aborts
//! with one [`SyntaxError`] carrying the offending [`Position`]. Errors
//! integrate with [`miette`] so callers get labelled source snippets.

use miette::Diagnostic;
use thiserror::Error;

use super::Span;
use crate::ast::Position;

/// A fatal lexical or grammar error with a precise source location.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{kind}")]
#[diagnostic()]
pub struct SyntaxError {
    /// What went wrong.
    #[source]
    kind: SyntaxErrorKind,
    /// The offending byte range.
    #[label("here")]
    span: Span,
    /// The offending location in line/column form.
    position: Position,
}

impl SyntaxError {
    /// Creates a new syntax error at `position`.
    #[must_use]
    pub fn new(kind: SyntaxErrorKind, position: Position) -> Self {
        Self {
            kind,
            span: position.span(),
            position,
        }
    }

    /// The kind of error.
    #[must_use]
    pub fn kind(&self) -> &SyntaxErrorKind {
        &self.kind
    }

    /// The source location of the error.
    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }
}

/// The kind of syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    // === Lexical ===
    /// An unexpected character was encountered.
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    /// A string literal was not terminated.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A heredoc ran to end of input without its terminator line.
    #[error("unterminated heredoc, expected a line containing just '{0}'")]
    UnterminatedHeredoc(ecow::EcoString),

    /// A regex literal was not terminated.
    #[error("unterminated regex literal")]
    UnterminatedRegex,

    /// A block comment was not terminated.
    #[error("unterminated block comment")]
    UnterminatedComment,

    /// A `#{...}` interpolation was not terminated.
    #[error("unterminated string interpolation")]
    UnterminatedInterpolation,

    /// `#@` not followed by a field name inside a string.
    #[error("expected a field name after '#@' in string interpolation")]
    MalformedFieldInterpolation,

    /// A numeric literal with a bad radix prefix, stray digit separator,
    /// or out-of-range value.
    #[error("malformed numeric literal")]
    MalformedNumber,

    /// A `?x` literal with more than one unescaped character.
    #[error("malformed character literal")]
    MalformedCharLiteral,

    /// An escape sequence that cannot be decoded.
    #[error("invalid escape sequence")]
    InvalidEscape,

    // === Grammar ===
    /// The parser found a token it cannot use here.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: ecow::EcoString,
        found: ecow::EcoString,
    },

    /// A parameter list with two rest parameters.
    #[error("duplicate rest parameter")]
    DuplicateRestParameter,

    /// A parameter list with two block parameters.
    #[error("duplicate block parameter")]
    DuplicateBlockParameter,

    /// A block parameter default other than `nil`.
    #[error("block parameter default must be nil")]
    InvalidBlockParameterDefault,

    /// Assignment to something that is not an lvalue.
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    /// Expression nesting beyond the supported depth.
    #[error("expression nesting is too deep")]
    NestingTooDeep,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::SourceUnit;

    #[test]
    fn error_display() {
        let unit = SourceUnit::new("t", "0X");
        let err = SyntaxError::new(SyntaxErrorKind::MalformedNumber, unit.position(Span::new(0, 2)));
        assert_eq!(err.to_string(), "malformed numeric literal");
        assert_eq!(err.position().start_line(), 1);
        assert_eq!(err.position().start_column(), 1);
    }

    #[test]
    fn unexpected_token_message() {
        let kind = SyntaxErrorKind::UnexpectedToken {
            expected: "expression".into(),
            found: "`)`".into(),
        };
        assert_eq!(kind.to_string(), "expected expression, found `)`");
    }
}
