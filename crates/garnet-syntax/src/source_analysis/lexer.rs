// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical analysis for Garnet source code.
//!
//! The lexer is hand-written and pull-based: [`Lexer::next_token`] produces
//! one token at a time, and [`lex`] drains a unit into a vector ending with
//! an EOF token. Lexing is fail-fast; the first malformed literal aborts
//! with a [`SyntaxError`].
//!
//! Three pieces of context make Garnet lexing more than a character
//! classifier:
//!
//! - **Operand tracking.** `/` after an operand is division, otherwise a
//!   regex opener; `<<` after an operand is a shift unless command-argument
//!   spacing says heredoc.
//! - **Spacing.** `?` glued to a character is a char literal while `? ` is
//!   the ternary operator, and `:` glued to a name in non-operand position
//!   is a symbol.
//! - **Heredoc claims.** A heredoc body starts after the current logical
//!   line. The opener token is produced immediately with its body content,
//!   and the consumed body region is "claimed" so the main cursor skips it
//!   when it reaches the end of the line. Several heredocs opened on one
//!   line extend the same claim in opening order.

use std::sync::Arc;

use ecow::EcoString;

use super::error::{SyntaxError, SyntaxErrorKind};
use super::token::{Keyword, StringPiece, Token, TokenKind, Trivia};
use super::{SourceUnit, Span};

/// Tokenizes `unit` completely; the final token is always EOF (carrying any
/// trailing trivia).
pub fn lex(unit: &Arc<SourceUnit>) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(unit);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind().is_eof();
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// A pull-based tokenizer over one [`SourceUnit`].
pub struct Lexer<'src> {
    unit: &'src Arc<SourceUnit>,
    source: &'src str,
    pos: usize,
    pending_trivia: Vec<Trivia>,
    /// Whether the previous token can end an operand (drives `/`, `<<`,
    /// and symbol disambiguation).
    prev_ends_operand: bool,
    /// Whether the previous token was `def`; a `/` right after it is the
    /// division method name, not a regex opener.
    prev_was_def: bool,
    /// Start of the heredoc body region the main cursor must skip.
    claim_begin: usize,
    /// End of the claimed region (0 = no active claim).
    claim_end: usize,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("position", &self.pos)
            .field("remaining", &self.source.get(self.pos..).unwrap_or(""))
            .finish()
    }
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer over the unit's text.
    #[must_use]
    pub fn new(unit: &'src Arc<SourceUnit>) -> Self {
        Self {
            unit,
            source: unit.text(),
            pos: 0,
            pending_trivia: Vec::new(),
            prev_ends_operand: false,
            prev_was_def: false,
            claim_begin: 0,
            claim_end: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn err(&self, kind: SyntaxErrorKind, span: Span) -> SyntaxError {
        SyntaxError::new(kind, self.unit.position(span))
    }

    fn err_here(&self, kind: SyntaxErrorKind, start: usize) -> SyntaxError {
        self.err(kind, self.span_from(start))
    }

    // ========================================================================
    // Trivia
    // ========================================================================

    /// Skips whitespace and comments, collecting them as pending trivia.
    /// Newlines are consumed one at a time so heredoc body claims can be
    /// skipped exactly when the cursor reaches them.
    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    let start = self.pos;
                    self.bump_while(|c| matches!(c, ' ' | '\t' | '\r'));
                    let text = &self.source[start..self.pos];
                    self.pending_trivia.push(Trivia::Whitespace(text.into()));
                }
                Some('\n') => {
                    self.bump();
                    self.pending_trivia.push(Trivia::Whitespace("\n".into()));
                    if self.claim_end > 0 && self.pos == self.claim_begin {
                        self.pos = self.claim_end;
                        self.claim_begin = 0;
                        self.claim_end = 0;
                    }
                }
                Some('\\') if matches!(self.peek_at(1), Some('\n')) => {
                    // Line continuation: recorded without the newline so the
                    // statement does not terminate.
                    self.bump();
                    self.bump();
                    self.pending_trivia.push(Trivia::Whitespace(" ".into()));
                }
                Some('\\') if matches!((self.peek_at(1), self.peek_at(2)), (Some('\r'), Some('\n'))) => {
                    self.bump();
                    self.bump();
                    self.bump();
                    self.pending_trivia.push(Trivia::Whitespace(" ".into()));
                }
                Some('#') => {
                    let start = self.pos;
                    self.bump();
                    self.bump_while(|c| c != '\n');
                    let text = &self.source[start + 1..self.pos];
                    self.pending_trivia.push(Trivia::LineComment(text.into()));
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.lex_block_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Lexes a `/* ... */` comment with arbitrary nesting. `/**` (but not
    /// `/**/`) marks a documentation comment.
    fn lex_block_comment(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.bump(); // /
        self.bump(); // *
        let is_doc = self.peek() == Some('*') && self.peek_at(1) != Some('/');

        let mut depth = 1u32;
        while depth > 0 {
            if self.rest().starts_with("/*") {
                depth += 1;
                self.bump();
                self.bump();
            } else if self.rest().starts_with("*/") {
                depth -= 1;
                self.bump();
                self.bump();
            } else if self.bump().is_none() {
                return Err(self.err_here(SyntaxErrorKind::UnterminatedComment, start));
            }
        }

        let text: EcoString = self.source[start..self.pos].into();
        self.pending_trivia.push(if is_doc {
            Trivia::DocComment(text)
        } else {
            Trivia::BlockComment(text)
        });
        Ok(())
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Produces the next token (EOF at end of input).
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_trivia()?;
        let has_space_before = !self.pending_trivia.is_empty() || self.pos == 0;
        let start = self.pos;

        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) => self.lex_token_kind(c, start, has_space_before)?,
        };

        self.prev_ends_operand = kind.ends_operand();
        self.prev_was_def = matches!(kind, TokenKind::Keyword(Keyword::Def));
        let trivia = std::mem::take(&mut self.pending_trivia);
        Ok(Token::new(kind, self.span_from(start), trivia))
    }

    #[allow(clippy::too_many_lines)]
    fn lex_token_kind(
        &mut self,
        c: char,
        start: usize,
        has_space_before: bool,
    ) -> Result<TokenKind, SyntaxError> {
        Ok(match c {
            'a'..='z' | 'A'..='Z' | '_' => self.lex_word(),
            '0'..='9' => self.lex_number(start)?,
            '\'' => self.lex_squote(start)?,
            '"' => self.lex_dquote(start)?,
            '?' => match self.peek_at(1) {
                Some(' ' | '\t' | '\r' | '\n') | None => {
                    self.bump();
                    TokenKind::Question
                }
                _ => self.lex_char_literal(start)?,
            },
            '@' => {
                self.bump();
                if self.peek() == Some('@') {
                    self.bump();
                    if self.peek().is_some_and(is_word_start) {
                        TokenKind::ClassVar(self.lex_word_text())
                    } else {
                        TokenKind::AtAt
                    }
                } else if self.peek().is_some_and(is_word_start) {
                    TokenKind::InstanceVar(self.lex_word_text())
                } else {
                    TokenKind::At
                }
            }
            '$' => {
                self.bump();
                TokenKind::Dollar
            }
            '`' => {
                self.bump();
                TokenKind::Backtick
            }
            ':' => {
                self.bump();
                if self.peek() == Some(':') {
                    self.bump();
                    TokenKind::ColonColon
                } else if self.peek().is_some_and(|c| is_word_start(c) || c == '@')
                    && (!self.prev_ends_operand || has_space_before)
                {
                    self.lex_symbol()
                } else {
                    TokenKind::Colon
                }
            }
            '.' => {
                self.bump();
                TokenKind::Dot
            }
            ';' => {
                self.bump();
                TokenKind::Semicolon
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            '[' => {
                self.bump();
                TokenKind::LBracket
            }
            ']' => {
                self.bump();
                TokenKind::RBracket
            }
            '{' => {
                self.bump();
                TokenKind::LBrace
            }
            '}' => {
                self.bump();
                TokenKind::RBrace
            }
            '~' => {
                self.bump();
                TokenKind::Tilde
            }
            '!' => {
                self.bump();
                if self.rest().starts_with("==") {
                    self.bump();
                    self.bump();
                    TokenKind::BinaryOp("!==".into())
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::BinaryOp("!=".into())
                } else if self.peek() == Some('~') {
                    self.bump();
                    TokenKind::BinaryOp("!~".into())
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                self.bump();
                if self.rest().starts_with("==") {
                    self.bump();
                    self.bump();
                    TokenKind::BinaryOp("===".into())
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::BinaryOp("==".into())
                } else if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else if self.peek() == Some('~') {
                    self.bump();
                    TokenKind::BinaryOp("=~".into())
                } else {
                    TokenKind::Eq
                }
            }
            '&' => {
                self.bump();
                if self.rest().starts_with("&=") {
                    self.bump();
                    self.bump();
                    TokenKind::AndAssign
                } else if self.peek() == Some('&') {
                    self.bump();
                    TokenKind::BinaryOp("&&".into())
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::OpAssign("&".into())
                } else {
                    TokenKind::BinaryOp("&".into())
                }
            }
            '|' => {
                self.bump();
                if self.rest().starts_with("|=") {
                    self.bump();
                    self.bump();
                    TokenKind::OrAssign
                } else if self.peek() == Some('|') {
                    self.bump();
                    TokenKind::BinaryOp("||".into())
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::OpAssign("|".into())
                } else {
                    TokenKind::BinaryOp("|".into())
                }
            }
            '+' | '-' | '%' | '^' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::OpAssign(EcoString::from(c.to_string()))
                } else {
                    TokenKind::BinaryOp(EcoString::from(c.to_string()))
                }
            }
            '*' => {
                self.bump();
                if self.rest().starts_with("*=") {
                    self.bump();
                    self.bump();
                    TokenKind::OpAssign("**".into())
                } else if self.peek() == Some('*') {
                    self.bump();
                    TokenKind::BinaryOp("**".into())
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::OpAssign("*".into())
                } else {
                    TokenKind::BinaryOp("*".into())
                }
            }
            '/' => {
                if self.prev_ends_operand || self.prev_was_def {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::OpAssign("/".into())
                    } else {
                        TokenKind::BinaryOp("/".into())
                    }
                } else {
                    self.lex_regex(start)?
                }
            }
            '<' => self.lex_less_than(start, has_space_before)?,
            '>' => {
                self.bump();
                if self.rest().starts_with(">=") {
                    self.bump();
                    self.bump();
                    TokenKind::OpAssign(">>".into())
                } else if self.rest().starts_with(">>") {
                    self.bump();
                    self.bump();
                    TokenKind::BinaryOp(">>>".into())
                } else if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::BinaryOp(">>".into())
                } else if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::BinaryOp(">=".into())
                } else {
                    TokenKind::BinaryOp(">".into())
                }
            }
            _ => {
                self.bump();
                return Err(self.err_here(SyntaxErrorKind::UnexpectedCharacter(c), start));
            }
        })
    }

    /// Consumes a run of word characters.
    fn lex_word_text(&mut self) -> EcoString {
        let start = self.pos;
        self.bump_while(is_word_continue);
        self.source[start..self.pos].into()
    }

    /// Lexes an identifier, constant name, or keyword. A trailing `?`/`!`
    /// (not followed by `=`) folds into the name and always yields a plain
    /// identifier, even for capitalized or keyword spellings (`B!`,
    /// `def?`).
    fn lex_word(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump_while(is_word_continue);
        if matches!(self.peek(), Some('?' | '!')) && self.peek_at(1) != Some('=') {
            self.bump();
            return TokenKind::Identifier(self.source[start..self.pos].into());
        }
        let word = &self.source[start..self.pos];
        if let Some(keyword) = Keyword::from_str(word) {
            TokenKind::Keyword(keyword)
        } else if word.starts_with(|c: char| c.is_ascii_uppercase()) {
            TokenKind::ConstantName(word.into())
        } else {
            TokenKind::Identifier(word.into())
        }
    }

    /// Lexes `:name`, `:@name`, `:@@name` (colon already consumed).
    fn lex_symbol(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek() == Some('@') {
            self.bump();
            if self.peek() == Some('@') {
                self.bump();
            }
        }
        self.bump_while(is_word_continue);
        if matches!(self.peek(), Some('?' | '!')) && self.peek_at(1) != Some('=') {
            self.bump();
        }
        TokenKind::Symbol(self.source[start..self.pos].into())
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    fn lex_number(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        // Radix prefixes: 0x/0X, 0b/0B, 0o/0O, 0d/0D.
        if self.peek() == Some('0') {
            if let Some(prefix) = self.peek_at(1) {
                let radix = match prefix {
                    'x' | 'X' => Some(16),
                    'b' | 'B' => Some(2),
                    'o' | 'O' => Some(8),
                    'd' | 'D' => Some(10),
                    _ => None,
                };
                if let Some(radix) = radix {
                    self.bump(); // 0
                    self.bump(); // prefix
                    return self.lex_radix_digits(start, radix);
                }
            }
        }

        self.bump_while(|c| c.is_ascii_digit() || c == '_');
        let int_text = &self.source[start..self.pos];
        if int_text.ends_with('_') {
            return Err(self.err_here(SyntaxErrorKind::MalformedNumber, start));
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump(); // .
            self.bump_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let after_sign = match self.peek_at(1) {
                Some('+' | '-') => self.peek_at(2),
                other => other,
            };
            if after_sign.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.bump(); // e
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.bump_while(|c| c.is_ascii_digit() || c == '_');
            }
        }

        let text = &self.source[start..self.pos];
        if text.ends_with('_') || text.contains("_.") || text.contains("._") {
            return Err(self.err_here(SyntaxErrorKind::MalformedNumber, start));
        }
        let stripped: String = text.chars().filter(|&c| c != '_').collect();

        if is_float {
            let value: f64 = stripped
                .parse()
                .map_err(|_| self.err_here(SyntaxErrorKind::MalformedNumber, start))?;
            Ok(TokenKind::Float(value))
        } else if stripped.len() > 1 && stripped.starts_with('0') {
            // Leading zero: octal.
            i64::from_str_radix(&stripped[1..], 8)
                .map(TokenKind::Integer)
                .map_err(|_| self.err_here(SyntaxErrorKind::MalformedNumber, start))
        } else {
            stripped
                .parse()
                .map(TokenKind::Integer)
                .map_err(|_| self.err_here(SyntaxErrorKind::MalformedNumber, start))
        }
    }

    fn lex_radix_digits(&mut self, start: usize, radix: u32) -> Result<TokenKind, SyntaxError> {
        let digits_start = self.pos;
        self.bump_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let text = &self.source[digits_start..self.pos];
        let stripped: String = text.chars().filter(|&c| c != '_').collect();
        if stripped.is_empty() || text.starts_with('_') || text.ends_with('_') {
            return Err(self.err_here(SyntaxErrorKind::MalformedNumber, start));
        }
        i64::from_str_radix(&stripped, radix)
            .map(TokenKind::Integer)
            .map_err(|_| self.err_here(SyntaxErrorKind::MalformedNumber, start))
    }

    // ========================================================================
    // Characters and escapes
    // ========================================================================

    fn lex_char_literal(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        self.bump(); // ?
        let value = match self.bump() {
            None => return Err(self.err_here(SyntaxErrorKind::MalformedCharLiteral, start)),
            Some('\\') => self.read_escape(start)?,
            Some(c) => c as u32,
        };
        // `?ab` is not a character literal.
        if self.peek().is_some_and(is_word_continue) {
            self.bump_while(is_word_continue);
            return Err(self.err_here(SyntaxErrorKind::MalformedCharLiteral, start));
        }
        Ok(TokenKind::CharLit(value))
    }

    /// Decodes one escape sequence; the backslash is already consumed.
    fn read_escape(&mut self, start: usize) -> Result<u32, SyntaxError> {
        let c = self
            .bump()
            .ok_or_else(|| self.err_here(SyntaxErrorKind::InvalidEscape, start))?;
        Ok(match c {
            'n' => 10,
            't' => 9,
            'r' => 13,
            's' => 32,
            'v' => 11,
            'f' => 12,
            'b' => 8,
            'a' => 7,
            'e' => 27,
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            self.bump();
                            value = value * 8 + d;
                        }
                        None => break,
                    }
                }
                value
            }
            'x' => self.read_hex_digits(start, 1, 2)?,
            'u' => self.read_hex_digits(start, 4, 4)?,
            'U' => self.read_hex_digits(start, 8, 8)?,
            other => other as u32,
        })
    }

    fn read_hex_digits(&mut self, start: usize, min: usize, max: usize) -> Result<u32, SyntaxError> {
        let mut value = 0u32;
        let mut count = 0;
        while count < max {
            match self.peek().and_then(|d| d.to_digit(16)) {
                Some(d) => {
                    self.bump();
                    value = value.wrapping_mul(16).wrapping_add(d);
                    count += 1;
                }
                None => break,
            }
        }
        if count < min {
            return Err(self.err_here(SyntaxErrorKind::InvalidEscape, start));
        }
        Ok(value)
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Single-quoted string: only `\\` and `\'` are decoded; everything
    /// else, including other backslash pairs, is literal.
    fn lex_squote(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        self.bump(); // '
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err_here(SyntaxErrorKind::UnterminatedString, start)),
                Some('\'') => return Ok(TokenKind::Str(value.into())),
                Some('\\') => match self.bump() {
                    None => return Err(self.err_here(SyntaxErrorKind::UnterminatedString, start)),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    /// Double-quoted string: escapes decoded, `#{...}` and `#@name`
    /// interpolation recognized.
    fn lex_dquote(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        self.bump(); // "
        let mut pieces: Vec<StringPiece> = Vec::new();
        let mut buf = String::new();
        let mut lit_start = self.pos;

        loop {
            match self.peek() {
                None => return Err(self.err_here(SyntaxErrorKind::UnterminatedString, start)),
                Some('"') => {
                    flush_literal(&mut pieces, &mut buf, self.span_from(lit_start));
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    let value = self.read_escape(start)?;
                    if let Some(c) = char::from_u32(value) {
                        buf.push(c);
                    }
                }
                Some('#') if self.peek_at(1) == Some('{') => {
                    flush_literal(&mut pieces, &mut buf, self.span_from(lit_start));
                    self.bump(); // #
                    self.bump(); // {
                    let body_start = self.pos;
                    let close = scan_interp_raw(self.source, body_start).ok_or_else(|| {
                        self.err(
                            SyntaxErrorKind::UnterminatedInterpolation,
                            self.span_from(start),
                        )
                    })?;
                    pieces.push(StringPiece::Interp {
                        source: self.source[body_start..close].into(),
                        span: (body_start..close).into(),
                    });
                    self.pos = close + 1;
                    lit_start = self.pos;
                }
                Some('#') if self.peek_at(1) == Some('@') => {
                    flush_literal(&mut pieces, &mut buf, self.span_from(lit_start));
                    let piece = self.lex_field_interpolation(start)?;
                    pieces.push(piece);
                    lit_start = self.pos;
                }
                Some(c) => {
                    self.bump();
                    buf.push(c);
                }
            }
        }

        let has_interp = pieces
            .iter()
            .any(|p| !matches!(p, StringPiece::Literal { .. }));
        if has_interp {
            Ok(TokenKind::StrInterp(pieces))
        } else {
            let value = match pieces.into_iter().next() {
                Some(StringPiece::Literal { value, .. }) => value,
                _ => EcoString::new(),
            };
            Ok(TokenKind::Str(value))
        }
    }

    /// Lexes `#@name` / `#@@name` inside a string (cursor on `#`).
    fn lex_field_interpolation(&mut self, start: usize) -> Result<StringPiece, SyntaxError> {
        let piece_start = self.pos;
        self.bump(); // #
        self.bump(); // @
        let is_static = self.peek() == Some('@');
        if is_static {
            self.bump();
        }
        let name_start = self.pos;
        self.bump_while(is_word_continue);
        if self.pos == name_start {
            return Err(self.err_here(SyntaxErrorKind::MalformedFieldInterpolation, start));
        }
        Ok(StringPiece::FieldRef {
            name: self.source[name_start..self.pos].into(),
            is_static,
            span: (piece_start..self.pos).into(),
        })
    }

    // ========================================================================
    // Regex
    // ========================================================================

    /// Regex literal: backslash pairs are preserved verbatim (so `\/` does
    /// not terminate), interpolation works like double-quoted strings, and
    /// trailing flag letters are collected.
    fn lex_regex(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        self.bump(); // /
        let mut pieces: Vec<StringPiece> = Vec::new();
        let mut buf = String::new();
        let mut lit_start = self.pos;

        loop {
            match self.peek() {
                None => return Err(self.err_here(SyntaxErrorKind::UnterminatedRegex, start)),
                Some('/') => {
                    flush_literal(&mut pieces, &mut buf, self.span_from(lit_start));
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    buf.push('\\');
                    match self.bump() {
                        None => {
                            return Err(self.err_here(SyntaxErrorKind::UnterminatedRegex, start))
                        }
                        Some(c) => buf.push(c),
                    }
                }
                Some('#') if self.peek_at(1) == Some('{') => {
                    flush_literal(&mut pieces, &mut buf, self.span_from(lit_start));
                    self.bump();
                    self.bump();
                    let body_start = self.pos;
                    let close = scan_interp_raw(self.source, body_start).ok_or_else(|| {
                        self.err(
                            SyntaxErrorKind::UnterminatedInterpolation,
                            self.span_from(start),
                        )
                    })?;
                    pieces.push(StringPiece::Interp {
                        source: self.source[body_start..close].into(),
                        span: (body_start..close).into(),
                    });
                    self.pos = close + 1;
                    lit_start = self.pos;
                }
                Some('#') if self.peek_at(1) == Some('@') => {
                    flush_literal(&mut pieces, &mut buf, self.span_from(lit_start));
                    let piece = self.lex_field_interpolation(start)?;
                    pieces.push(piece);
                    lit_start = self.pos;
                }
                Some(c) => {
                    self.bump();
                    buf.push(c);
                }
            }
        }

        let flags_start = self.pos;
        self.bump_while(|c| c.is_ascii_lowercase());
        let flags: EcoString = self.source[flags_start..self.pos].into();
        Ok(TokenKind::Regex { pieces, flags })
    }

    // ========================================================================
    // Heredocs and <<
    // ========================================================================

    fn lex_less_than(
        &mut self,
        start: usize,
        has_space_before: bool,
    ) -> Result<TokenKind, SyntaxError> {
        if self.peek_at(1) == Some('<') {
            if self.peek_at(2) == Some('=') {
                self.bump();
                self.bump();
                self.bump();
                return Ok(TokenKind::OpAssign("<<".into()));
            }
            // `<<` opens a heredoc at expression start, or after an operand
            // with command-argument spacing (space before, marker glued).
            let marker_pos = if self.peek_at(2) == Some('-') { 3 } else { 2 };
            let opens_heredoc = self
                .peek_at(marker_pos)
                .is_some_and(|c| is_word_start(c) || c == '\'' || c == '"')
                && (!self.prev_ends_operand || has_space_before);
            if opens_heredoc {
                return self.lex_heredoc(start);
            }
            self.bump();
            self.bump();
            return Ok(TokenKind::BinaryOp("<<".into()));
        }
        self.bump();
        if self.rest().starts_with("=>") {
            self.bump();
            self.bump();
            Ok(TokenKind::BinaryOp("<=>".into()))
        } else if self.peek() == Some('=') {
            self.bump();
            Ok(TokenKind::BinaryOp("<=".into()))
        } else {
            Ok(TokenKind::BinaryOp("<".into()))
        }
    }

    fn lex_heredoc(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        self.bump(); // <
        self.bump(); // <
        let dash = self.peek() == Some('-');
        if dash {
            self.bump();
        }

        let (marker, raw): (EcoString, bool) = match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.bump();
                let name_start = self.pos;
                self.bump_while(|c| c != q && c != '\n');
                if self.peek() != Some(q) {
                    return Err(self.err_here(SyntaxErrorKind::UnterminatedString, start));
                }
                let marker = self.source[name_start..self.pos].into();
                self.bump();
                (marker, q == '\'')
            }
            _ => {
                let name_start = self.pos;
                self.bump_while(is_word_continue);
                (self.source[name_start..self.pos].into(), false)
            }
        };

        let pieces = self.read_heredoc_body(&marker, raw, dash, start)?;
        Ok(TokenKind::Heredoc(pieces))
    }

    /// Reads a heredoc body without moving the main cursor, extending the
    /// claimed region so the body is skipped when the logical line ends.
    #[allow(clippy::cast_possible_truncation)]
    fn read_heredoc_body(
        &mut self,
        marker: &str,
        raw: bool,
        dash: bool,
        opener_start: usize,
    ) -> Result<Vec<StringPiece>, SyntaxError> {
        let src = self.source;
        let unterminated = || {
            self.err_here(
                SyntaxErrorKind::UnterminatedHeredoc(marker.into()),
                opener_start,
            )
        };

        let body_start = if self.claim_end > 0 {
            self.claim_end
        } else {
            match src[self.pos..].find('\n') {
                Some(n) => self.pos + n + 1,
                None => return Err(unterminated()),
            }
        };

        let mut pieces: Vec<StringPiece> = Vec::new();
        let mut buf = String::new();
        let mut lit_start = body_start;
        let mut i = body_start;
        let mut at_line_start = true;
        let terminator_end;

        loop {
            if at_line_start {
                let line_end = src[i..].find('\n').map_or(src.len(), |n| i + n);
                let line = &src[i..line_end];
                let candidate = if dash {
                    line.trim_start_matches([' ', '\t'])
                } else {
                    line
                };
                let candidate = candidate.strip_suffix('\r').unwrap_or(candidate);
                if candidate == marker {
                    terminator_end = if line_end < src.len() {
                        line_end + 1
                    } else {
                        src.len()
                    };
                    break;
                }
                at_line_start = false;
            }
            if i >= src.len() {
                return Err(unterminated());
            }
            let c = src[i..].chars().next().unwrap_or('\0');
            if c == '\n' {
                buf.push('\n');
                i += 1;
                at_line_start = true;
                continue;
            }
            if !raw && c == '#' && src[i + 1..].starts_with('{') {
                flush_literal(&mut pieces, &mut buf, (lit_start..i).into());
                let body = i + 2;
                let close = scan_interp_raw(src, body).ok_or_else(|| {
                    self.err(
                        SyntaxErrorKind::UnterminatedInterpolation,
                        (i..i + 2).into(),
                    )
                })?;
                pieces.push(StringPiece::Interp {
                    source: src[body..close].into(),
                    span: (body..close).into(),
                });
                i = close + 1;
                lit_start = i;
                continue;
            }
            if !raw && c == '#' && src[i + 1..].starts_with('@') {
                flush_literal(&mut pieces, &mut buf, (lit_start..i).into());
                let mut j = i + 2;
                let is_static = src[j..].starts_with('@');
                if is_static {
                    j += 1;
                }
                let name_start = j;
                while src[j..].chars().next().is_some_and(is_word_continue) {
                    j += 1;
                }
                if j == name_start {
                    return Err(self.err(
                        SyntaxErrorKind::MalformedFieldInterpolation,
                        (i..i + 2).into(),
                    ));
                }
                pieces.push(StringPiece::FieldRef {
                    name: src[name_start..j].into(),
                    is_static,
                    span: (i..j).into(),
                });
                i = j;
                lit_start = i;
                continue;
            }
            buf.push(c);
            i += c.len_utf8();
        }

        flush_literal(&mut pieces, &mut buf, (lit_start..i).into());
        if pieces.is_empty() {
            pieces.push(StringPiece::Literal {
                value: EcoString::new(),
                span: (body_start..body_start).into(),
            });
        }

        if self.claim_end == 0 {
            self.claim_begin = body_start;
        }
        self.claim_end = terminator_end;
        Ok(pieces)
    }
}

/// Pushes the buffered literal text as a piece, skipping empty buffers.
fn flush_literal(pieces: &mut Vec<StringPiece>, buf: &mut String, span: Span) {
    if !buf.is_empty() {
        pieces.push(StringPiece::Literal {
            value: buf.as_str().into(),
            span,
        });
        buf.clear();
    }
}

/// Scans an interpolation body from just after `#{` to its matching `}`,
/// skipping nested strings, comments, char literals, and balanced braces.
/// Returns the byte index of the closing brace.
fn scan_interp_raw(src: &str, start: usize) -> Option<usize> {
    let mut depth = 1u32;
    let mut i = start;
    while i < src.len() {
        let c = src[i..].chars().next()?;
        match c {
            '{' => {
                depth += 1;
                i += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            '"' | '\'' => {
                i = skip_plain_string(src, i, c)?;
            }
            '#' if src[i + 1..].starts_with('{') => {
                depth += 1;
                i += 2;
            }
            '#' => {
                // Line comment inside interpolated code.
                while i < src.len() && !src[i..].starts_with('\n') {
                    i += src[i..].chars().next()?.len_utf8();
                }
            }
            '/' if src[i + 1..].starts_with('*') => {
                i = skip_block_comment(src, i)?;
            }
            '?' if src[i + 1..]
                .chars()
                .next()
                .is_some_and(|n| !n.is_whitespace()) =>
            {
                i += 1;
                if src[i..].starts_with('\\') {
                    i += 1;
                }
                i += src[i..].chars().next()?.len_utf8();
            }
            '\\' => {
                i += 1;
                i += src[i..].chars().next().map_or(0, char::len_utf8);
            }
            _ => i += c.len_utf8(),
        }
    }
    None
}

/// Skips a quoted string starting at `i`; returns the index after the
/// closing quote.
fn skip_plain_string(src: &str, i: usize, quote: char) -> Option<usize> {
    let mut j = i + quote.len_utf8();
    while j < src.len() {
        let c = src[j..].chars().next()?;
        if c == '\\' {
            j += 1;
            j += src[j..].chars().next().map_or(0, char::len_utf8);
        } else if c == quote {
            return Some(j + quote.len_utf8());
        } else {
            j += c.len_utf8();
        }
    }
    None
}

/// Skips a nested block comment starting at `i` (`/*`); returns the index
/// after the closing `*/`.
fn skip_block_comment(src: &str, i: usize) -> Option<usize> {
    let mut depth = 0u32;
    let mut j = i;
    while j < src.len() {
        if src[j..].starts_with("/*") {
            depth += 1;
            j += 2;
        } else if src[j..].starts_with("*/") {
            depth -= 1;
            j += 2;
            if depth == 0 {
                return Some(j);
            }
        } else {
            j += src[j..].chars().next()?.len_utf8();
        }
    }
    None
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_word_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let unit = SourceUnit::new("test", source);
        lex(&unit)
            .expect("lex failed")
            .into_iter()
            .map(|t| t.kind().clone())
            .collect()
    }

    fn lex_err(source: &str) -> SyntaxError {
        let unit = SourceUnit::new("test", source);
        lex(&unit).expect_err("expected a lexical error")
    }

    #[test]
    fn integers_in_every_radix() {
        for source in ["15", "0xF", "0Xf", "017", "0o17", "0b1111", "0d15"] {
            assert_eq!(kinds(source), [TokenKind::Integer(15), TokenKind::Eof], "{source}");
        }
        assert_eq!(kinds("1_0_0"), [TokenKind::Integer(100), TokenKind::Eof]);
        assert_eq!(kinds("2800088046"), [TokenKind::Integer(2_800_088_046), TokenKind::Eof]);
    }

    #[test]
    fn malformed_numbers_fail() {
        for source in ["0X", "0b", "1_", "0b1_", "0x_1", "09"] {
            assert_eq!(
                *lex_err(source).kind(),
                SyntaxErrorKind::MalformedNumber,
                "{source}"
            );
        }
    }

    #[test]
    fn floats() {
        assert_eq!(kinds("1.0"), [TokenKind::Float(1.0), TokenKind::Eof]);
        assert_eq!(kinds("0e1"), [TokenKind::Float(0.0), TokenKind::Eof]);
        assert_eq!(kinds("1e0_1"), [TokenKind::Float(10.0), TokenKind::Eof]);
        assert_eq!(kinds("3_2e0_1"), [TokenKind::Float(320.0), TokenKind::Eof]);
        assert_eq!(kinds("4_2.2_2e0_1"), [TokenKind::Float(422.2), TokenKind::Eof]);
        // `1.` is an integer followed by a dot, not a float.
        assert_eq!(
            kinds("1."),
            [TokenKind::Integer(1), TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn char_literals() {
        let cases: &[(&str, u32)] = &[
            ("?a", 97),
            ("?A", 65),
            ("??", 63),
            ("?\\n", 10),
            ("?\\\\", 92),
            ("?\\s", 32),
            ("?\\e", 27),
            ("?\\012", 10),
            ("?\\x12", 18),
            ("?\\u20ac", 8364),
            ("?\\U0001d360", 119_648),
            ("?\\[", 91),
        ];
        for &(source, value) in cases {
            assert_eq!(kinds(source), [TokenKind::CharLit(value), TokenKind::Eof], "{source}");
        }
        assert_eq!(*lex_err("?aa").kind(), SyntaxErrorKind::MalformedCharLiteral);
    }

    #[test]
    fn ternary_question_needs_space() {
        assert_eq!(
            kinds("a ? b : c"),
            [
                TokenKind::Identifier("a".into()),
                TokenKind::Question,
                TokenKind::Identifier("b".into()),
                TokenKind::Colon,
                TokenKind::Identifier("c".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn single_quoted_strings() {
        assert_eq!(kinds("''"), [TokenKind::Str("".into()), TokenKind::Eof]);
        assert_eq!(kinds("'a'"), [TokenKind::Str("a".into()), TokenKind::Eof]);
        assert_eq!(
            kinds("'a\\'b'"),
            [TokenKind::Str("a'b".into()), TokenKind::Eof]
        );
        // Unknown escapes keep their backslash.
        assert_eq!(
            kinds("'\\\\\\'\\n'"),
            [TokenKind::Str("\\'\\n".into()), TokenKind::Eof]
        );
        assert!(matches!(
            lex_err("'").kind(),
            SyntaxErrorKind::UnterminatedString
        ));
        assert!(matches!(
            lex_err("'\\'").kind(),
            SyntaxErrorKind::UnterminatedString
        ));
    }

    #[test]
    fn double_quoted_strings() {
        assert_eq!(kinds("\"a\""), [TokenKind::Str("a".into()), TokenKind::Eof]);
        assert_eq!(
            kinds("\"\\\"\""),
            [TokenKind::Str("\"".into()), TokenKind::Eof]
        );
        assert_eq!(kinds("\"##\""), [TokenKind::Str("##".into()), TokenKind::Eof]);
        assert_eq!(
            kinds("\"\\e[1m\""),
            [TokenKind::Str("\u{1b}[1m".into()), TokenKind::Eof]
        );
        assert!(matches!(
            lex_err("\"").kind(),
            SyntaxErrorKind::UnterminatedString
        ));
        assert!(matches!(
            lex_err("\"#{").kind(),
            SyntaxErrorKind::UnterminatedInterpolation
        ));
        assert!(matches!(
            lex_err("\"#@\"").kind(),
            SyntaxErrorKind::MalformedFieldInterpolation
        ));
    }

    #[test]
    fn interpolation_pieces() {
        let tokens = kinds("\"a#{b}c\"");
        match &tokens[0] {
            TokenKind::StrInterp(pieces) => {
                assert_eq!(pieces.len(), 3);
                assert!(matches!(&pieces[0], StringPiece::Literal { value, .. } if value == "a"));
                assert!(matches!(&pieces[1], StringPiece::Interp { source, .. } if source == "b"));
                assert!(matches!(&pieces[2], StringPiece::Literal { value, .. } if value == "c"));
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }

        let tokens = kinds("\"a #@b c\"");
        match &tokens[0] {
            TokenKind::StrInterp(pieces) => {
                assert_eq!(pieces.len(), 3);
                assert!(matches!(
                    &pieces[1],
                    StringPiece::FieldRef { name, is_static: false, .. } if name == "b"
                ));
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }
    }

    #[test]
    fn regex_literals() {
        match &kinds("/a#{b}c/iz")[0] {
            TokenKind::Regex { pieces, flags } => {
                assert_eq!(pieces.len(), 3);
                assert_eq!(flags, "iz");
            }
            other => panic!("expected regex, got {other:?}"),
        }
        // Escaped delimiter stays raw.
        match &kinds("/\\//")[0] {
            TokenKind::Regex { pieces, .. } => {
                assert!(matches!(&pieces[0], StringPiece::Literal { value, .. } if value == "\\/"));
            }
            other => panic!("expected regex, got {other:?}"),
        }
        // Division after an operand.
        assert_eq!(
            kinds("x/4")[1],
            TokenKind::BinaryOp("/".into())
        );
    }

    #[test]
    fn heredocs_read_in_order() {
        let tokens = kinds("<<'A';<<'A'\na\nA\nb\nA\n1");
        assert!(matches!(&tokens[0], TokenKind::Heredoc(p)
            if matches!(&p[0], StringPiece::Literal { value, .. } if value == "a\n")));
        assert_eq!(tokens[1], TokenKind::Semicolon);
        assert!(matches!(&tokens[2], TokenKind::Heredoc(p)
            if matches!(&p[0], StringPiece::Literal { value, .. } if value == "b\n")));
        assert_eq!(tokens[3], TokenKind::Integer(1));
    }

    #[test]
    fn heredoc_terminator_must_own_its_line() {
        let tokens = kinds("<<'A'\na\n  A\nA\n");
        assert!(matches!(&tokens[0], TokenKind::Heredoc(p)
            if matches!(&p[0], StringPiece::Literal { value, .. } if value == "a\n  A\n")));
        // Dash form trims the indented terminator.
        let tokens = kinds("<<-'A'\na\n  A\n");
        assert!(matches!(&tokens[0], TokenKind::Heredoc(p)
            if matches!(&p[0], StringPiece::Literal { value, .. } if value == "a\n")));
    }

    #[test]
    fn heredoc_vs_shift() {
        // Space before, glued marker: heredoc command argument.
        let tokens = kinds("a <<b\nc\nb\n");
        assert!(matches!(tokens[1], TokenKind::Heredoc(_)));
        // Symmetric spacing: shift operator.
        let tokens = kinds("a << b\nc\n b\n");
        assert_eq!(tokens[1], TokenKind::BinaryOp("<<".into()));
    }

    #[test]
    fn unterminated_heredoc_fails() {
        assert!(matches!(
            lex_err("<<FOO").kind(),
            SyntaxErrorKind::UnterminatedHeredoc(_)
        ));
    }

    #[test]
    fn nested_block_comments() {
        assert_eq!(
            kinds("/* A /* nested */ comment */3"),
            [TokenKind::Integer(3), TokenKind::Eof]
        );
        assert!(matches!(
            lex_err("/* open").kind(),
            SyntaxErrorKind::UnterminatedComment
        ));
    }

    #[test]
    fn doc_comment_trivia() {
        let unit = SourceUnit::new("test", "/** jdoc */\nfoo");
        let tokens = lex(&unit).unwrap();
        assert!(tokens[0]
            .leading_trivia()
            .iter()
            .any(Trivia::is_doc_comment));
        // Plain block comments are not doc comments.
        let unit = SourceUnit::new("test", "/* jdoc */\nfoo");
        let tokens = lex(&unit).unwrap();
        assert!(!tokens[0].leading_trivia().iter().any(Trivia::is_doc_comment));
    }

    #[test]
    fn identifier_classification() {
        assert_eq!(
            kinds("B!"),
            [TokenKind::Identifier("B!".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("def?"),
            [TokenKind::Identifier("def?".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("end_pos"),
            [TokenKind::Identifier("end_pos".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("A"),
            [TokenKind::ConstantName("A".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("until"),
            [TokenKind::Keyword(Keyword::Until), TokenKind::Eof]
        );
        // `foo!=bar` keeps the bang for the operator.
        assert_eq!(
            kinds("foo!=bar"),
            [
                TokenKind::Identifier("foo".into()),
                TokenKind::BinaryOp("!=".into()),
                TokenKind::Identifier("bar".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn symbols() {
        assert_eq!(kinds(":foo"), [TokenKind::Symbol("foo".into()), TokenKind::Eof]);
        assert_eq!(kinds(":@bar"), [TokenKind::Symbol("@bar".into()), TokenKind::Eof]);
        assert_eq!(
            kinds(":@@cbar"),
            [TokenKind::Symbol("@@cbar".into()), TokenKind::Eof]
        );
        // Glued colon after an operand is a cast/hash colon, not a symbol.
        assert_eq!(
            kinds("x:int"),
            [
                TokenKind::Identifier("x".into()),
                TokenKind::Colon,
                TokenKind::Identifier("int".into()),
                TokenKind::Eof
            ]
        );
        // After an operand with a space, `:sym` is a symbol again.
        assert_eq!(
            kinds("puts :a")[1],
            TokenKind::Symbol("a".into())
        );
    }

    #[test]
    fn line_continuation_suppresses_newline() {
        let unit = SourceUnit::new("test", "a \\\n1");
        let tokens = lex(&unit).unwrap();
        assert!(!tokens[1].has_leading_newline());
        let unit = SourceUnit::new("test", "a \n1");
        let tokens = lex(&unit).unwrap();
        assert!(tokens[1].has_leading_newline());
    }

    #[test]
    fn statement_spacing_is_observable() {
        let unit = SourceUnit::new("test", "a -1");
        let tokens = lex(&unit).unwrap();
        assert!(tokens[1].has_space_before());
        assert!(!tokens[2].has_space_before());
    }
}
