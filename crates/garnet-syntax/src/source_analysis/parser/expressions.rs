// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression parsing for Garnet.
//!
//! This module contains the expression grammar: the Pratt binary loop, the
//! unary and postfix layers, primaries, and the control-flow expressions
//! (`if`, `while`, `case`, `begin`, `for`). The postfix layer owns the three
//! disambiguation rules that make Garnet more than a textbook grammar:
//!
//! - **Unary vs. binary `-`/`+`.** `a - 1` and `a-1` are binary; `a -1`
//!   (space before, none after) is a command call passing a negated
//!   argument. In command-argument position the sign consumes the whole
//!   additive chain with its top-level operators flipped, wrapped in a
//!   `-@`/`+@` call, so `a -b+c` is `a((-@)(b - c))`.
//! - **Block attachment.** A brace block binds to the tightest preceding
//!   call, which in command-argument position is the argument itself; a
//!   `do...end` block binds to the enclosing call after its arguments.
//!   Empty braces after a bare name are a hash argument, not a block.
//! - **Casts.** A glued `:Type` is a postfix operator, so chains resolve
//!   left to right: `x:A.y():B` is `((x:A).y()):B`.

use ecow::EcoString;

use crate::ast::{NodeId, NodeKind};
use crate::source_analysis::error::SyntaxError;
use crate::source_analysis::token::{Keyword, StringPiece, TokenKind};
use crate::source_analysis::{SourceUnit, Span};

use super::{binary_binding_power, Parser};

/// Binding power just above `+`/`-`, used when consuming the additive chain
/// of a signed command argument.
const ABOVE_ADDITIVE_BP: u8 = 16;

impl Parser {
    // ========================================================================
    // Statement-level expressions
    // ========================================================================

    /// Parses a full expression including the low-precedence `and`/`or`
    /// forms, which desugar into conditionals below assignment precedence
    /// (`a = 1 and b = 2` guards on the completed assignment).
    pub(super) fn parse_command_expr(&mut self) -> Result<NodeId, SyntaxError> {
        self.trace_rule("command_expr");
        let start = self.current_span();
        let mut expr = self.parse_command_assign()?;
        loop {
            if self.at_newline() {
                break;
            }
            if self.match_keyword(Keyword::And) {
                let rhs = self.parse_command_assign()?;
                expr = self.build_and(expr, rhs, self.spanned(start));
            } else if self.match_keyword(Keyword::Or) {
                let rhs = self.parse_command_assign()?;
                expr = self.build_or(expr, rhs, self.spanned(start));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parses `not expr`, assignments, and everything below them.
    pub(super) fn parse_command_assign(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        if self.match_keyword(Keyword::Not) {
            let value = self.parse_command_assign()?;
            self.detach(value);
            return Ok(self.add(NodeKind::Not { value }, self.spanned(start)));
        }

        let lhs = self.parse_expression()?;
        match self.current_kind().clone() {
            TokenKind::Eq => {
                self.advance();
                let value_start = self.current_span();
                let mut value = self.parse_command_assign()?;
                // `a = b rescue c` guards the right-hand side only.
                if self.check_keyword(Keyword::Rescue) && !self.at_newline() {
                    self.advance();
                    value = self.wrap_rescue_modifier(value_start, value)?;
                }
                self.build_assignment(lhs, value, self.spanned(start))
            }
            TokenKind::OpAssign(op) => {
                self.advance();
                let value = self.parse_command_assign()?;
                self.build_op_assign(lhs, &op, value, self.spanned(start))
            }
            TokenKind::AndAssign => {
                self.advance();
                let value = self.parse_command_assign()?;
                self.build_and_assign(lhs, value, self.spanned(start))
            }
            TokenKind::OrAssign => {
                self.advance();
                let value = self.parse_command_assign()?;
                self.build_or_assign(lhs, value, self.spanned(start))
            }
            _ => Ok(lhs),
        }
    }

    /// The right-hand side of a `rescue` statement modifier.
    pub(super) fn parse_not_expr(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        if self.match_keyword(Keyword::Not) {
            let value = self.parse_not_expr()?;
            self.detach(value);
            return Ok(self.add(NodeKind::Not { value }, self.spanned(start)));
        }
        self.parse_expression()
    }

    // ========================================================================
    // Operator layers
    // ========================================================================

    /// Parses one expression at ternary precedence.
    ///
    /// This is the recursive core, so it carries both guards: the
    /// nesting-depth cap and `stacker::maybe_grow` (32 KiB red zone, 256 KiB
    /// segments) so pathological nesting fails with a `SyntaxError` instead
    /// of a stack overflow.
    pub(super) fn parse_expression(&mut self) -> Result<NodeId, SyntaxError> {
        stacker::maybe_grow(32 * 1024, 256 * 1024, || {
            self.enter_nesting()?;
            let result = self.parse_ternary();
            self.leave_nesting();
            result
        })
    }

    fn parse_ternary(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        let condition = self.parse_binary(0)?;
        if !self.check(&TokenKind::Question) || self.at_newline() {
            return Ok(condition);
        }
        self.advance();
        let then_expr = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "`:`")?;
        let else_expr = self.parse_expression()?;

        let span = self.spanned(start);
        let then_span = self.node_span(then_expr);
        let body = self.node_list(vec![then_expr], then_span);
        let else_span = self.node_span(else_expr);
        let else_body = self.node_list(vec![else_expr], else_span);
        self.detach(condition);
        Ok(self.add(
            NodeKind::If {
                condition,
                body,
                else_body,
            },
            span,
        ))
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        let mut lhs = self.parse_unary()?;
        loop {
            // A line break before the operator ends the statement.
            if self.at_newline() {
                break;
            }
            let op = match self.current_kind() {
                TokenKind::BinaryOp(op) => op.clone(),
                _ => break,
            };
            let Some(bp) = binary_binding_power(&op) else {
                break;
            };
            if bp.left < min_bp {
                break;
            }
            self.advance();
            self.enter_nesting()?;
            let rhs = self.parse_binary(bp.right);
            self.leave_nesting();
            let rhs = rhs?;
            let span = self.spanned(start);
            lhs = match op.as_str() {
                "&&" => self.build_and(lhs, rhs, span),
                "||" => self.build_or(lhs, rhs, span),
                _ => self.binary_call(lhs, &op, rhs, span),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        match self.current_kind() {
            TokenKind::Bang => {
                self.advance();
                self.enter_nesting()?;
                let value = self.parse_unary();
                self.leave_nesting();
                let value = value?;
                self.detach(value);
                Ok(self.add(NodeKind::Not { value }, self.spanned(start)))
            }
            TokenKind::Tilde => {
                self.advance();
                self.enter_nesting()?;
                let value = self.parse_unary();
                self.leave_nesting();
                let value = value?;
                let span = self.spanned(start);
                Ok(self.unary_call(value, "~", span))
            }
            TokenKind::BinaryOp(op) if op == "-" || op == "+" => {
                let method: EcoString = if op == "-" { "-@".into() } else { "+@".into() };
                self.advance();
                self.enter_nesting()?;
                let value = self.parse_unary();
                self.leave_nesting();
                let value = value?;
                let span = self.spanned(start);
                Ok(self.unary_call(value, &method, span))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    /// A zero-argument call spelled as a unary operator (`-@`, `+@`, `~`).
    fn unary_call(&mut self, target: NodeId, method: &str, span: Span) -> NodeId {
        let name = self.simple_string(method, span);
        let args = self.empty_list(span);
        self.detach(target);
        self.add(
            NodeKind::Call {
                target,
                name,
                args,
                block: None,
            },
            span,
        )
    }

    // ========================================================================
    // Postfix chains
    // ========================================================================

    /// Extends `expr` with postfix forms: attribute/method calls, qualified
    /// constants, element access, casts, command arguments, and attached
    /// blocks. A leading `.` continues the chain across a line break.
    pub(super) fn parse_postfix(&mut self, mut expr: NodeId) -> Result<NodeId, SyntaxError> {
        loop {
            let expr_span = self.node_span(expr);
            match self.current_kind() {
                TokenKind::Dot => {
                    self.advance();
                    expr = self.parse_attr_call(expr, expr_span)?;
                }
                TokenKind::ColonColon => {
                    self.advance();
                    expr = self.parse_qualified(expr, expr_span)?;
                }
                TokenKind::LBracket if self.glued() => {
                    self.advance();
                    let args = self.parse_bracket_args()?;
                    let span = expr_span.merge(self.prev_span());
                    let name = self.simple_string("[]", span);
                    self.detach(expr);
                    expr = self.add(
                        NodeKind::Call {
                            target: expr,
                            name,
                            args,
                            block: None,
                        },
                        span,
                    );
                }
                TokenKind::Colon if self.glued() && self.peek_is_word() => {
                    self.advance();
                    let type_ref = self.parse_type_name(false)?;
                    let span = expr_span.merge(self.prev_span());
                    self.detach(expr);
                    self.detach(type_ref);
                    expr = self.add(
                        NodeKind::Cast {
                            type_ref,
                            value: expr,
                        },
                        span,
                    );
                }
                TokenKind::LBrace
                    if !self.at_newline() && self.is_block_capable(expr) =>
                {
                    if matches!(self.ast.node(expr).kind, NodeKind::VCall { .. })
                        && self.brace_starts_hash()
                    {
                        // Empty or pair-shaped braces after a bare name are
                        // a hash argument, not a block.
                        let hash = self.parse_hash_literal()?;
                        let span = self.node_span(hash);
                        let args = self.node_list(vec![hash], span);
                        self.rewrite_with_args(expr, args);
                    } else {
                        let block = self.parse_brace_block()?;
                        self.attach_block(expr, block);
                    }
                }
                TokenKind::Keyword(Keyword::Do)
                    if !self.no_do_block
                        && !self.at_newline()
                        && self.is_block_capable(expr) =>
                {
                    self.advance();
                    let block = self.parse_do_block()?;
                    self.attach_block(expr, block);
                }
                _ if self.is_command_capable(expr)
                    && self.current_token().has_space_before()
                    && !self.at_newline()
                    && self.starts_command_argument() =>
                {
                    let args = self.parse_command_args()?;
                    self.rewrite_with_args(expr, args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `recv.name`, `recv.name(args)`, `recv.(args)`.
    fn parse_attr_call(&mut self, target: NodeId, start: Span) -> Result<NodeId, SyntaxError> {
        let name = if self.check(&TokenKind::LParen) {
            // `a.()` calls `call`.
            self.simple_string("call", self.prev_span())
        } else {
            self.parse_call_name()?
        };
        let args = if self.check(&TokenKind::LParen) && self.glued() {
            self.advance();
            self.parse_paren_args()?
        } else {
            self.empty_list(self.prev_span())
        };
        let span = start.merge(self.prev_span());
        self.detach(target);
        self.detach(name);
        Ok(self.add(
            NodeKind::Call {
                target,
                name,
                args,
                block: None,
            },
            span,
        ))
    }

    /// `base::Name` is a qualified constant unless call syntax follows, in
    /// which case `::` behaves exactly like `.`.
    fn parse_qualified(&mut self, base: NodeId, start: Span) -> Result<NodeId, SyntaxError> {
        if let TokenKind::ConstantName(name) = self.current_kind().clone() {
            let name_span = self.current_span();
            self.advance();
            let has_paren_args = self.check(&TokenKind::LParen) && self.glued();
            let has_command_args = self.current_token().has_space_before()
                && !self.at_newline()
                && self.starts_command_argument();
            if !has_paren_args && !has_command_args {
                let span = start.merge(self.prev_span());
                let name = self.simple_string(name, name_span);
                self.detach(base);
                self.detach(name);
                return Ok(self.add(NodeKind::Colon2 { base, name }, span));
            }
            let args = if has_paren_args {
                self.advance();
                self.parse_paren_args()?
            } else {
                self.empty_list(name_span)
            };
            let span = start.merge(self.prev_span());
            let name = self.simple_string(name, name_span);
            self.detach(base);
            self.detach(name);
            return Ok(self.add(
                NodeKind::Call {
                    target: base,
                    name,
                    args,
                    block: None,
                },
                span,
            ));
        }
        self.parse_attr_call(base, start)
    }

    /// A method name after `.`/`::`: identifiers, constants, operator
    /// spellings, non-modifier keywords, or a quasiquote.
    fn parse_call_name(&mut self) -> Result<NodeId, SyntaxError> {
        let span = self.current_span();
        let name: EcoString = match self.current_kind().clone() {
            TokenKind::Identifier(name) | TokenKind::ConstantName(name) => name,
            TokenKind::BinaryOp(op) => op,
            TokenKind::Keyword(k) if k.modifier_value().is_none() => k.as_str().into(),
            TokenKind::Backtick => return self.parse_unquote(),
            _ => return Err(self.unexpected("a method name")),
        };
        self.advance();
        Ok(self.simple_string(name, span))
    }

    fn peek_is_word(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Colon
        ) && matches!(
            self.peek_kind(),
            Some(TokenKind::Identifier(_) | TokenKind::ConstantName(_))
        )
    }

    // ========================================================================
    // Command arguments and block attachment
    // ========================================================================

    /// Whether `expr` can still absorb paren-less command arguments: a bare
    /// name, a constant, or an attribute call that has none yet.
    fn is_command_capable(&self, expr: NodeId) -> bool {
        match &self.ast.node(expr).kind {
            NodeKind::VCall { .. } | NodeKind::Constant { .. } => true,
            NodeKind::Call { args, block, .. } => {
                block.is_none()
                    && matches!(
                        &self.ast.node(*args).kind,
                        NodeKind::NodeList { children } if children.is_empty()
                    )
            }
            _ => false,
        }
    }

    fn is_block_capable(&self, expr: NodeId) -> bool {
        matches!(
            &self.ast.node(expr).kind,
            NodeKind::VCall { .. }
                | NodeKind::FunctionalCall { block: None, .. }
                | NodeKind::Call { block: None, .. }
                | NodeKind::Super { block: None, .. }
        )
    }

    /// Whether the current token can open a command argument list.
    fn starts_command_argument(&self) -> bool {
        match self.current_kind() {
            TokenKind::Identifier(_)
            | TokenKind::ConstantName(_)
            | TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::CharLit(_)
            | TokenKind::Str(_)
            | TokenKind::StrInterp(_)
            | TokenKind::Heredoc(_)
            | TokenKind::Regex { .. }
            | TokenKind::Symbol(_)
            | TokenKind::InstanceVar(_)
            | TokenKind::ClassVar(_)
            | TokenKind::At
            | TokenKind::AtAt
            | TokenKind::Backtick
            | TokenKind::LBracket => true,
            TokenKind::Keyword(
                Keyword::True | Keyword::False | Keyword::Nil | Keyword::SelfKw,
            ) => true,
            TokenKind::BinaryOp(op) if op == "-" || op == "+" => {
                self.next_glued() && self.peek_starts_operand()
            }
            _ => false,
        }
    }

    fn peek_starts_operand(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Identifier(_)
                    | TokenKind::ConstantName(_)
                    | TokenKind::Integer(_)
                    | TokenKind::Float(_)
                    | TokenKind::CharLit(_)
                    | TokenKind::Str(_)
                    | TokenKind::StrInterp(_)
                    | TokenKind::Heredoc(_)
                    | TokenKind::Symbol(_)
                    | TokenKind::InstanceVar(_)
                    | TokenKind::ClassVar(_)
                    | TokenKind::At
                    | TokenKind::AtAt
                    | TokenKind::Backtick
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::Keyword(
                        Keyword::True | Keyword::False | Keyword::Nil | Keyword::SelfKw
                    )
            )
        )
    }

    /// Parses paren-less command arguments, including the flipped-sign
    /// unary chains and trailing bare assocs.
    fn parse_command_args(&mut self) -> Result<NodeId, SyntaxError> {
        let saved = self.no_do_block;
        self.no_do_block = true;
        let result = self.parse_command_args_inner();
        self.no_do_block = saved;
        result
    }

    fn parse_command_args_inner(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        let mut args = Vec::new();
        let mut entries: Vec<NodeId> = Vec::new();
        loop {
            if !entries.is_empty() || self.at_assoc_shorthand() {
                let entry = self.parse_assoc_entry()?;
                entries.push(entry);
            } else if self.at_signed_operand() {
                let arg = self.parse_signed_argument()?;
                args.push(arg);
            } else {
                let arg = self.parse_expression()?;
                if self.check(&TokenKind::Arrow) && !self.at_newline() {
                    self.advance();
                    let value = self.parse_expression()?;
                    let span = self.node_span(arg).merge(self.node_span(value));
                    self.detach(arg);
                    self.detach(value);
                    entries.push(self.add(
                        NodeKind::HashEntry {
                            key: arg,
                            value,
                        },
                        span,
                    ));
                } else {
                    args.push(arg);
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        if !entries.is_empty() {
            let span = self
                .node_span(entries[0])
                .merge(self.node_span(entries[entries.len() - 1]));
            for &e in &entries {
                self.detach(e);
            }
            args.push(self.add(NodeKind::Hash { entries }, span));
        }
        Ok(self.node_list(args, start))
    }

    fn at_signed_operand(&self) -> bool {
        matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "-" || op == "+")
            && self.next_glued()
            && self.peek_starts_operand()
    }

    /// A signed command argument: the sign applies to the whole additive
    /// chain with its top-level operators flipped, so `-b+c` becomes
    /// `(-@)(b - c)`.
    fn parse_signed_argument(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        let method: EcoString = match self.current_kind() {
            TokenKind::BinaryOp(op) if op == "-" => "-@".into(),
            _ => "+@".into(),
        };
        self.advance();
        let mut chain = self.parse_binary(ABOVE_ADDITIVE_BP)?;
        loop {
            if self.at_newline() {
                break;
            }
            let flipped = match self.current_kind() {
                TokenKind::BinaryOp(op) if op == "-" => "+",
                TokenKind::BinaryOp(op) if op == "+" => "-",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_binary(ABOVE_ADDITIVE_BP)?;
            let span = self.spanned(start);
            chain = self.binary_call(chain, flipped, rhs, span);
        }
        let span = self.spanned(start);
        Ok(self.unary_call(chain, &method, span))
    }

    /// Parses parenthesized arguments (the `(` is already consumed):
    /// positional expressions, trailing bare assocs collected into a hash,
    /// and a `&expr` block pass.
    fn parse_paren_args(&mut self) -> Result<NodeId, SyntaxError> {
        let saved = self.no_do_block;
        self.no_do_block = false;
        let result = self.parse_paren_args_inner();
        self.no_do_block = saved;
        result
    }

    fn parse_paren_args_inner(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.prev_span();
        let mut args = Vec::new();
        let mut entries: Vec<NodeId> = Vec::new();
        let mut block_pass = None;
        while !self.check(&TokenKind::RParen) {
            if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "&") {
                let amp = self.current_span();
                self.advance();
                let value = self.parse_expression()?;
                self.detach(value);
                block_pass = Some(self.add(NodeKind::BlockPass { value }, self.spanned(amp)));
                break;
            }
            if !entries.is_empty() || self.at_assoc_shorthand() {
                let entry = self.parse_assoc_entry()?;
                entries.push(entry);
            } else {
                let arg = self.parse_expression()?;
                if self.check(&TokenKind::Arrow) {
                    self.advance();
                    let value = self.parse_expression()?;
                    let span = self.node_span(arg).merge(self.node_span(value));
                    self.detach(arg);
                    self.detach(value);
                    entries.push(self.add(NodeKind::HashEntry { key: arg, value }, span));
                } else {
                    args.push(arg);
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        if !entries.is_empty() {
            let span = self
                .node_span(entries[0])
                .merge(self.node_span(entries[entries.len() - 1]));
            for &e in &entries {
                self.detach(e);
            }
            args.push(self.add(NodeKind::Hash { entries }, span));
        }
        if let Some(bp) = block_pass {
            args.push(bp);
        }
        Ok(self.node_list(args, start))
    }

    /// Whether the `{` at the cursor opens a hash literal: empty braces,
    /// a shorthand `key:` entry, or a single-token key followed by `=>`.
    fn brace_starts_hash(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::RBrace) => true,
            Some(
                TokenKind::Identifier(_)
                | TokenKind::ConstantName(_)
                | TokenKind::Str(_)
                | TokenKind::Symbol(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_),
            ) => match self.tokens.get(self.current + 2).map(|t| t.kind()) {
                Some(TokenKind::Arrow) => true,
                Some(TokenKind::Colon) => self
                    .tokens
                    .get(self.current + 2)
                    .is_some_and(|t| !t.has_space_before()),
                _ => false,
            },
            _ => false,
        }
    }

    /// `key: value` or `'key': value` or `expr => expr`.
    pub(super) fn parse_assoc_entry(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        let key = if self.at_assoc_shorthand() {
            let text: EcoString = match self.current_kind().clone() {
                TokenKind::Identifier(name) | TokenKind::ConstantName(name) => name,
                TokenKind::Str(value) => value,
                _ => unreachable!("checked by at_assoc_shorthand"),
            };
            let span = self.current_span();
            self.advance(); // key
            self.advance(); // :
            self.simple_string(text, span)
        } else {
            let key = self.parse_expression()?;
            self.expect(&TokenKind::Arrow, "`=>`")?;
            key
        };
        let value = self.parse_expression()?;
        let span = start.merge(self.node_span(value));
        self.detach(key);
        self.detach(value);
        Ok(self.add(NodeKind::HashEntry { key, value }, span))
    }

    pub(super) fn at_assoc_shorthand(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Identifier(_) | TokenKind::ConstantName(_) | TokenKind::Str(_)
        ) && matches!(self.peek_kind(), Some(TokenKind::Colon))
            && self.next_glued()
    }

    /// Replaces the (empty) argument list of `call` with `args`, promoting
    /// bare names to functional calls.
    fn rewrite_with_args(&mut self, call: NodeId, args: NodeId) {
        let span = self.node_span(call).merge(self.node_span(args));
        match self.ast.node(call).kind.clone() {
            NodeKind::VCall { name } | NodeKind::Constant { name } => {
                self.ast.node_mut(call).kind = NodeKind::FunctionalCall {
                    name,
                    args,
                    block: None,
                };
            }
            NodeKind::Call { args: old, .. } => {
                self.ast.node_mut(old).parent = None;
                if let NodeKind::Call { args: slot, .. } = &mut self.ast.node_mut(call).kind {
                    *slot = args;
                }
            }
            _ => unreachable!("rewrite_with_args target must be command-capable"),
        }
        self.ast.node_mut(args).parent = Some(call);
        self.ast.node_mut(call).position = self.pos(span);
    }

    /// Sets the block slot of a call-shaped node.
    fn attach_block(&mut self, call: NodeId, block: NodeId) {
        let span = self.node_span(call).merge(self.node_span(block));
        match self.ast.node(call).kind.clone() {
            NodeKind::VCall { name } => {
                let args = self.empty_list(self.node_span(call));
                self.ast.node_mut(args).parent = Some(call);
                self.ast.node_mut(call).kind = NodeKind::FunctionalCall {
                    name,
                    args,
                    block: Some(block),
                };
            }
            NodeKind::FunctionalCall { .. } | NodeKind::Call { .. } | NodeKind::Super { .. } => {
                match &mut self.ast.node_mut(call).kind {
                    NodeKind::FunctionalCall { block: slot, .. }
                    | NodeKind::Call { block: slot, .. }
                    | NodeKind::Super { block: slot, .. } => *slot = Some(block),
                    _ => unreachable!(),
                }
            }
            _ => unreachable!("attach_block target must be block-capable"),
        }
        self.ast.node_mut(block).parent = Some(call);
        self.ast.node_mut(call).position = self.pos(span);
    }

    /// `{ |params| body }` — the `{` is current.
    fn parse_brace_block(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let arguments = self.parse_block_params()?;
        let saved = self.no_do_block;
        self.no_do_block = false;
        let body = self.parse_statements(|k| matches!(k, TokenKind::RBrace));
        self.no_do_block = saved;
        let body = body?;
        self.expect(&TokenKind::RBrace, "`}`")?;
        let span = self.spanned(start);
        let body = self.node_list(body, span);
        Ok(self.add(NodeKind::Block { arguments, body }, span))
    }

    /// `do |params| body end` — the `do` is already consumed.
    fn parse_do_block(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.prev_span();
        let arguments = self.parse_block_params()?;
        let saved = self.no_do_block;
        self.no_do_block = false;
        let body = self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)));
        self.no_do_block = saved;
        let body = body?;
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);
        let body = self.node_list(body, span);
        Ok(self.add(NodeKind::Block { arguments, body }, span))
    }

    /// `|a, b|` or `||` after a block opener; `None` when absent.
    fn parse_block_params(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        let span = self.current_span();
        if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "||") {
            self.advance();
            return Ok(Some(self.build_arguments(
                Vec::new(),
                Vec::new(),
                None,
                Vec::new(),
                None,
                span,
            )));
        }
        if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "|") {
            self.advance();
            let arguments = self.parse_parameter_list(|k| {
                matches!(k, TokenKind::BinaryOp(op) if op == "|")
            })?;
            if !matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "|") {
                return Err(self.unexpected("`|`"));
            }
            self.advance();
            return Ok(Some(arguments));
        }
        Ok(None)
    }

    // ========================================================================
    // Primaries
    // ========================================================================

    #[allow(clippy::too_many_lines)]
    fn parse_primary(&mut self) -> Result<NodeId, SyntaxError> {
        self.trace_rule("primary");
        let span = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(self.add(NodeKind::Fixnum { value }, span))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(self.add(NodeKind::Float { value }, span))
            }
            TokenKind::CharLit(value) => {
                self.advance();
                Ok(self.add(NodeKind::CharLiteral { value }, span))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(self.simple_string(value, span))
            }
            TokenKind::Symbol(name) => {
                self.advance();
                Ok(self.simple_string(name, span))
            }
            TokenKind::StrInterp(pieces) | TokenKind::Heredoc(pieces) => {
                self.advance();
                let list = self.build_piece_list(&pieces, span)?;
                Ok(self.add(NodeKind::StringConcat { pieces: list }, span))
            }
            TokenKind::Regex { pieces, flags } => {
                self.advance();
                let list = self.build_piece_list(&pieces, span)?;
                let flags = self.simple_string(flags, span);
                Ok(self.add(
                    NodeKind::Regex {
                        pieces: list,
                        flags,
                    },
                    span,
                ))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                let name_node = self.simple_string(name, span);
                if self.check(&TokenKind::LParen) && self.glued() {
                    self.advance();
                    let args = self.parse_paren_args()?;
                    self.detach(name_node);
                    Ok(self.add(
                        NodeKind::FunctionalCall {
                            name: name_node,
                            args,
                            block: None,
                        },
                        self.spanned(span),
                    ))
                } else {
                    self.detach(name_node);
                    Ok(self.add(NodeKind::VCall { name: name_node }, span))
                }
            }
            TokenKind::ConstantName(name) => {
                self.advance();
                let name_node = self.simple_string(name, span);
                if self.check(&TokenKind::LParen) && self.glued() {
                    self.advance();
                    let args = self.parse_paren_args()?;
                    self.detach(name_node);
                    Ok(self.add(
                        NodeKind::FunctionalCall {
                            name: name_node,
                            args,
                            block: None,
                        },
                        self.spanned(span),
                    ))
                } else {
                    self.detach(name_node);
                    Ok(self.add(NodeKind::Constant { name: name_node }, span))
                }
            }
            TokenKind::InstanceVar(name) => {
                self.advance();
                let name_node = self.simple_string(name, span);
                self.detach(name_node);
                Ok(self.add(
                    NodeKind::FieldAccess {
                        name: name_node,
                        is_static: false,
                    },
                    span,
                ))
            }
            TokenKind::ClassVar(name) => {
                self.advance();
                let name_node = self.simple_string(name, span);
                self.detach(name_node);
                Ok(self.add(
                    NodeKind::FieldAccess {
                        name: name_node,
                        is_static: true,
                    },
                    span,
                ))
            }
            TokenKind::At | TokenKind::AtAt => {
                // `@`name-as-quasiquote: `` @`a` ``.
                let is_static = matches!(self.current_kind(), TokenKind::AtAt);
                self.advance();
                if !self.check(&TokenKind::Backtick) {
                    return Err(self.unexpected("a field name"));
                }
                let name = self.parse_unquote()?;
                self.detach(name);
                Ok(self.add(
                    NodeKind::FieldAccess { name, is_static },
                    self.spanned(span),
                ))
            }
            TokenKind::Backtick => self.parse_unquote(),
            TokenKind::ColonColon => {
                self.advance();
                let name_span = self.current_span();
                match self.current_kind().clone() {
                    TokenKind::ConstantName(name) => {
                        self.advance();
                        let name = self.simple_string(name, name_span);
                        self.detach(name);
                        Ok(self.add(NodeKind::Colon3 { name }, self.spanned(span)))
                    }
                    _ => Err(self.unexpected("a constant name")),
                }
            }
            TokenKind::LParen => self.parse_paren_group(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_hash_literal(),
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(self.add(NodeKind::Boolean { value: true }, span))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(self.add(NodeKind::Boolean { value: false }, span))
            }
            TokenKind::Keyword(Keyword::Nil) => {
                self.advance();
                Ok(self.add(NodeKind::Null, span))
            }
            TokenKind::Keyword(Keyword::SelfKw) => {
                self.advance();
                Ok(self.add(NodeKind::SelfRef, span))
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_expr(false),
            TokenKind::Keyword(Keyword::Unless) => self.parse_if_expr(true),
            TokenKind::Keyword(Keyword::While) => self.parse_while_expr(false),
            TokenKind::Keyword(Keyword::Until) => self.parse_while_expr(true),
            TokenKind::Keyword(Keyword::Case) => self.parse_case_expr(),
            TokenKind::Keyword(Keyword::Begin) => self.parse_begin_expr(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_expr(),
            TokenKind::Keyword(Keyword::Yield) => self.parse_yield(),
            TokenKind::Keyword(Keyword::Super) => self.parse_super(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Raise) => self.parse_raise(),
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Ok(self.add(NodeKind::Break, span))
            }
            TokenKind::Keyword(Keyword::Next) => {
                self.advance();
                Ok(self.add(NodeKind::Next, span))
            }
            TokenKind::Keyword(Keyword::Redo) => {
                self.advance();
                Ok(self.add(NodeKind::Redo, span))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// A parenthesized statement group. The group stays a list node, so
    /// `(true)` and `(1; 2)` have the same shape.
    fn parse_paren_group(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let saved = self.no_do_block;
        self.no_do_block = false;
        let stmts = self.parse_statements(|k| matches!(k, TokenKind::RParen));
        self.no_do_block = saved;
        let stmts = stmts?;
        self.expect(&TokenKind::RParen, "`)`")?;
        let span = self.spanned(start);
        Ok(self.node_list(stmts, span))
    }

    fn parse_array_literal(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let mut values = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            values.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "`]`")?;
        let span = self.spanned(start);
        let values = self.node_list(values, span);
        Ok(self.add(NodeKind::Array { values }, span))
    }

    /// Element-access arguments; the `[` is already consumed.
    fn parse_bracket_args(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.prev_span();
        let mut args = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            args.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "`]`")?;
        Ok(self.node_list(args, start))
    }

    fn parse_hash_literal(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            entries.push(self.parse_assoc_entry()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        for &e in &entries {
            self.detach(e);
        }
        Ok(self.add(NodeKind::Hash { entries }, self.spanned(start)))
    }

    /// A quasiquote: `` `expr` `` parses the enclosed expression and wraps
    /// it in an unquote-escape node.
    pub(super) fn parse_unquote(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.expect(&TokenKind::Backtick, "`` ` ``")?;
        let value = self.parse_command_expr()?;
        self.expect(&TokenKind::Backtick, "`` ` ``")?;
        self.detach(value);
        Ok(self.add(NodeKind::Unquote { value }, self.spanned(start)))
    }

    // ========================================================================
    // String interpolation
    // ========================================================================

    /// Converts lexer string pieces into a `StringPieceList`, re-parsing
    /// `#{...}` bodies through the public entry point on an embedded unit
    /// that reports positions in host-file coordinates.
    fn build_piece_list(
        &mut self,
        pieces: &[StringPiece],
        token_span: Span,
    ) -> Result<NodeId, SyntaxError> {
        let mut children = Vec::new();
        for piece in pieces {
            let node = match piece {
                StringPiece::Literal { value, span } => self.simple_string(value.clone(), *span),
                StringPiece::Interp { source, span } => {
                    let value = self.parse_embedded(source, *span)?;
                    self.detach(value);
                    self.add(NodeKind::StringEval { value }, *span)
                }
                StringPiece::FieldRef {
                    name,
                    is_static,
                    span,
                } => {
                    let name_node = self.simple_string(name.clone(), *span);
                    self.detach(name_node);
                    let access = self.add(
                        NodeKind::FieldAccess {
                            name: name_node,
                            is_static: *is_static,
                        },
                        *span,
                    );
                    self.detach(access);
                    self.add(NodeKind::StringEval { value: access }, *span)
                }
            };
            children.push(node);
        }
        for &c in &children {
            self.detach(c);
        }
        Ok(self.add(NodeKind::StringPieceList { children }, token_span))
    }

    /// Recursively parses an interpolation body and grafts its statement
    /// list into this tree.
    fn parse_embedded(&mut self, source: &EcoString, span: Span) -> Result<NodeId, SyntaxError> {
        let (line, column) = self.unit.line_column(span.start());
        let embedded = SourceUnit::with_offsets(
            self.unit.name(),
            source.to_string(),
            line,
            column,
        );
        let ast = super::parse(&embedded, &self.config)?;
        let body = match ast.node(ast.root()).kind {
            NodeKind::Script { body } => body,
            _ => unreachable!("parse always roots at a Script"),
        };
        Ok(self.ast.graft(&ast, body))
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    /// Consumes optional `;` separators and an optional `then` before a
    /// clause body.
    fn match_body_opener(&mut self) {
        while self.match_token(&TokenKind::Semicolon) {}
        self.match_keyword(Keyword::Then);
    }

    /// `if`/`unless`/`elsif` expressions; `unless` swaps the branches.
    fn parse_if_expr(&mut self, negated: bool) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        self.parse_if_tail(start, negated)
    }

    fn parse_if_tail(&mut self, start: Span, negated: bool) -> Result<NodeId, SyntaxError> {
        let saved = self.no_do_block;
        self.no_do_block = true;
        let condition = self.parse_command_expr();
        self.no_do_block = saved;
        let condition = condition?;
        self.match_body_opener();

        let body = self.parse_statements(|k| {
            matches!(
                k,
                TokenKind::Keyword(Keyword::End | Keyword::Else | Keyword::Elsif)
            )
        })?;

        let else_body = if self.check_keyword(Keyword::Elsif) {
            let elsif_start = self.current_span();
            self.advance();
            let nested = self.parse_if_tail(elsif_start, false)?;
            Some(vec![nested])
        } else if self.match_keyword(Keyword::Else) {
            let stmts =
                self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?;
            self.expect_keyword(Keyword::End, "`end`")?;
            Some(stmts)
        } else {
            self.expect_keyword(Keyword::End, "`end`")?;
            None
        };

        let span = self.spanned(start);
        let then_list = self.node_list(body, span);
        let else_list = match else_body {
            Some(stmts) => self.node_list(stmts, span),
            None => self.empty_list(span),
        };
        let (body, else_body) = if negated {
            (else_list, then_list)
        } else {
            (then_list, else_list)
        };
        self.detach(condition);
        Ok(self.add(
            NodeKind::If {
                condition,
                body,
                else_body,
            },
            span,
        ))
    }

    /// `while`/`until cond [do] body end` — a pre-test loop.
    fn parse_while_expr(&mut self, negative: bool) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let saved = self.no_do_block;
        self.no_do_block = true;
        let condition = self.parse_command_expr();
        self.no_do_block = saved;
        let condition = condition?;
        while self.match_token(&TokenKind::Semicolon) {}
        self.match_keyword(Keyword::Do);

        let body = self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?;
        self.expect_keyword(Keyword::End, "`end`")?;

        let span = self.spanned(start);
        let body = self.node_list(body, span);
        let init = self.empty_list(span);
        let pre = self.empty_list(span);
        let post = self.empty_list(span);
        self.detach(condition);
        Ok(self.add(
            NodeKind::Loop {
                init,
                condition,
                pre,
                body,
                post,
                skip_first_check: false,
                negative,
            },
            span,
        ))
    }

    fn parse_case_expr(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        while self.match_token(&TokenKind::Semicolon) {}

        let condition = if self.check_keyword(Keyword::When) {
            None
        } else {
            let saved = self.no_do_block;
            self.no_do_block = true;
            let subject = self.parse_command_expr();
            self.no_do_block = saved;
            let subject = subject?;
            while self.match_token(&TokenKind::Semicolon) {}
            Some(subject)
        };

        if !self.check_keyword(Keyword::When) {
            return Err(self.unexpected("`when`"));
        }
        let mut clauses = Vec::new();
        while self.match_keyword(Keyword::When) {
            let clause_start = self.prev_span();
            let mut candidates = Vec::new();
            loop {
                candidates.push(self.parse_expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.match_body_opener();
            let body = self.parse_statements(|k| {
                matches!(
                    k,
                    TokenKind::Keyword(Keyword::When | Keyword::Else | Keyword::End)
                )
            })?;
            let span = clause_start.merge(self.prev_span());
            let candidates = self.node_list(candidates, span);
            let body = self.node_list(body, span);
            clauses.push(self.add(NodeKind::WhenClause { candidates, body }, span));
        }

        let else_stmts = if self.match_keyword(Keyword::Else) {
            self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::End, "`end`")?;

        let span = self.spanned(start);
        let clauses = self.node_list(clauses, span);
        let else_body = self.node_list(else_stmts, span);
        if let Some(c) = condition {
            self.detach(c);
        }
        Ok(self.add(
            NodeKind::Case {
                condition,
                clauses,
                else_body,
            },
            span,
        ))
    }

    /// `begin ... [rescue ...]* [else ...] [ensure ...] end`.
    ///
    /// A plain `begin` body collapses to its single statement (or a list);
    /// the result is remembered so a trailing `while`/`until` builds a
    /// post-test loop.
    fn parse_begin_expr(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let stop = |k: &TokenKind| {
            matches!(
                k,
                TokenKind::Keyword(
                    Keyword::Rescue | Keyword::Else | Keyword::Ensure | Keyword::End
                )
            )
        };
        let body_stmts = self.parse_statements(stop)?;

        let mut clauses = Vec::new();
        while self.check_keyword(Keyword::Rescue) {
            let clause_start = self.current_span();
            self.advance();
            let mut types = Vec::new();
            while matches!(
                self.current_kind(),
                TokenKind::ConstantName(_) | TokenKind::ColonColon
            ) {
                types.push(self.parse_type_name(true)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            let name = if self.match_token(&TokenKind::Arrow) {
                let span = self.current_span();
                match self.current_kind().clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        Some(self.simple_string(name, span))
                    }
                    _ => return Err(self.unexpected("an exception binding name")),
                }
            } else {
                None
            };
            self.match_body_opener();
            let clause_body = self.parse_statements(stop)?;
            let span = clause_start.merge(self.prev_span());
            for &t in &types {
                self.detach(t);
            }
            let types = self.add(NodeKind::TypeNameList { children: types }, span);
            if let Some(n) = name {
                self.detach(n);
            }
            let body = self.node_list(clause_body, span);
            clauses.push(self.add(NodeKind::RescueClause { types, name, body }, span));
        }

        let else_stmts = if self.match_keyword(Keyword::Else) {
            self.parse_statements(|k| {
                matches!(k, TokenKind::Keyword(Keyword::Ensure | Keyword::End))
            })?
        } else {
            Vec::new()
        };
        let ensure_stmts = if self.match_keyword(Keyword::Ensure) {
            Some(self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?)
        } else {
            None
        };
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);

        let mut node = if clauses.is_empty() {
            let mut combined = body_stmts;
            combined.extend(else_stmts);
            if combined.len() == 1 {
                combined[0]
            } else {
                self.node_list(combined, span)
            }
        } else {
            let body = self.node_list(body_stmts, span);
            for &c in &clauses {
                self.detach(c);
            }
            let clauses = self.add(NodeKind::RescueClauseList { children: clauses }, span);
            let else_body = self.node_list(else_stmts, span);
            self.add(
                NodeKind::Rescue {
                    body,
                    clauses,
                    else_body,
                },
                span,
            )
        };
        if let Some(ensure_stmts) = ensure_stmts {
            let body = self.node_list(vec![node], span);
            let ensure_body = self.node_list(ensure_stmts, span);
            node = self.add(NodeKind::Ensure { body, ensure_body }, span);
        }
        self.mark_begin_block(node);
        Ok(node)
    }

    /// `for x in expr; body; end` desugars to `expr.each { |x| body }`.
    fn parse_for_expr(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let name_span = self.current_span();
        let name: EcoString = match self.current_kind().clone() {
            TokenKind::Identifier(name) => name,
            _ => return Err(self.unexpected("a loop variable name")),
        };
        self.advance();
        self.expect_keyword(Keyword::In, "`in`")?;

        let saved = self.no_do_block;
        self.no_do_block = true;
        let iterable = self.parse_command_expr();
        self.no_do_block = saved;
        let iterable = iterable?;
        while self.match_token(&TokenKind::Semicolon) {}
        self.match_keyword(Keyword::Do);

        let body = self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?;
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);

        let param_name = self.simple_string(name, name_span);
        self.detach(param_name);
        let annotations = self.empty_annotation_list(name_span);
        let required = self.add(
            NodeKind::RequiredArgument {
                name: param_name,
                type_ref: None,
                annotations,
            },
            name_span,
        );
        let arguments = self.build_arguments(vec![required], Vec::new(), None, Vec::new(), None, name_span);
        let body = self.node_list(body, span);
        self.detach(arguments);
        let block = self.add(
            NodeKind::Block {
                arguments: Some(arguments),
                body,
            },
            span,
        );
        let each = self.simple_string("each", span);
        let args = self.empty_list(span);
        self.detach(iterable);
        self.detach(each);
        self.detach(block);
        Ok(self.add(
            NodeKind::Call {
                target: iterable,
                name: each,
                args,
                block: Some(block),
            },
            span,
        ))
    }

    // ========================================================================
    // Keyword statements
    // ========================================================================

    fn parse_yield(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let args = self.parse_keyword_args(start)?;
        Ok(self.add(NodeKind::Yield { args }, self.spanned(start)))
    }

    fn parse_raise(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let args = self.parse_keyword_args(start)?;
        Ok(self.add(NodeKind::Raise { args }, self.spanned(start)))
    }

    fn parse_super(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        if self.check(&TokenKind::LParen) && self.glued() {
            self.advance();
            let args = self.parse_paren_args()?;
            return Ok(self.add(
                NodeKind::Super { args, block: None },
                self.spanned(start),
            ));
        }
        if self.current_token().has_space_before()
            && !self.at_newline()
            && self.starts_command_argument()
        {
            let args = self.parse_command_args()?;
            return Ok(self.add(
                NodeKind::Super { args, block: None },
                self.spanned(start),
            ));
        }
        Ok(self.add(NodeKind::ZSuper, start))
    }

    fn parse_return(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.advance();
        let value = if self.at_value_position() {
            self.parse_command_assign()?
        } else {
            self.add(NodeKind::ImplicitNil, start)
        };
        self.detach(value);
        Ok(self.add(NodeKind::Return { value }, self.spanned(start)))
    }

    /// Arguments of `yield`/`raise`: parenthesized, command-style, or none.
    fn parse_keyword_args(&mut self, start: Span) -> Result<NodeId, SyntaxError> {
        if self.check(&TokenKind::LParen) && self.glued() {
            self.advance();
            return self.parse_paren_args();
        }
        if self.current_token().has_space_before()
            && !self.at_newline()
            && self.starts_command_argument()
        {
            return self.parse_command_args();
        }
        Ok(self.empty_list(start))
    }

    /// Whether an expression (rather than a statement modifier or
    /// terminator) follows, for `return x` vs bare `return`.
    fn at_value_position(&self) -> bool {
        if self.at_newline() {
            return false;
        }
        !matches!(
            self.current_kind(),
            TokenKind::Eof
                | TokenKind::Semicolon
                | TokenKind::Comma
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Keyword(
                    Keyword::If
                        | Keyword::Unless
                        | Keyword::While
                        | Keyword::Until
                        | Keyword::Rescue
                        | Keyword::End
                        | Keyword::Then
                        | Keyword::Else
                        | Keyword::Elsif
                        | Keyword::Ensure
                        | Keyword::When
                        | Keyword::Do
                )
        )
    }
}
