// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Recursive descent parser for Garnet source code.
//!
//! The parser drives the lexer, builds the AST arena bottom-up, and fails
//! fast: the first grammar error aborts the parse with a single
//! [`SyntaxError`]. Binary operator precedence uses Pratt-style binding
//! powers (see [`binary_binding_power`]); everything else is ordinary
//! descent with one token of lookahead plus token spacing/newline trivia.
//!
//! # Statement termination
//!
//! A newline terminates a statement unless the next token continues it (a
//! leading `.`), the newline sits inside brackets, or the line ended with
//! an operator or `\` continuation. `;` also terminates. The lexer encodes
//! newlines as token trivia, so the parser just asks tokens whether they
//! start a line.
//!
//! # Parse-time desugaring
//!
//! `&&`, `||`, `and`, `or`, the compound assignments, and `for` loops are
//! rewritten into primitive nodes during parsing. Synthetic locals
//! (`$ptemp$N`, `$or$N`) are numbered by one per-parse counter held in the
//! parser, so nested parses (macro re-entry, interpolation) never collide.

use std::sync::Arc;

use ecow::EcoString;
use tracing::{debug, trace};

use crate::ast::{Ast, NodeId, NodeKind, Position};
use crate::source_analysis::error::{SyntaxError, SyntaxErrorKind};
use crate::source_analysis::lexer::lex;
use crate::source_analysis::token::{Keyword, Token, TokenKind};
use crate::source_analysis::{SourceUnit, Span};

mod declarations;
mod expressions;


#[cfg(test)]
mod property_tests;

/// Options for one parse call. No global state: a configuration value is
/// threaded into [`parse`] and lives for that call only.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Emit `trace!` events for parser rule entry.
    pub trace: bool,
    /// Emit the rendered tree via `debug!` after a successful parse.
    pub debug_parse_tree: bool,
    /// Discard `/** ... */` documentation comments instead of attaching
    /// them.
    pub skip_doc_comments: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            trace: false,
            debug_parse_tree: false,
            skip_doc_comments: true,
        }
    }
}

/// Parses one source unit into a complete AST, or fails with the first
/// error encountered.
///
/// Macro-expansion re-parsing recurses through this same entry point on an
/// embedded [`SourceUnit`] carrying host-file offsets.
pub fn parse(unit: &Arc<SourceUnit>, config: &ParserConfig) -> Result<Ast, SyntaxError> {
    let tokens = lex(unit)?;
    let parser = Parser::new(Arc::clone(unit), tokens, config.clone());
    let ast = parser.parse_script()?;
    if config.debug_parse_tree {
        debug!(tree = %ast.dump(), source = unit.name(), "parse tree");
    }
    Ok(ast)
}

/// Maximum expression nesting before the parser bails out, guarding
/// against stack overflow on pathological input. `stacker::maybe_grow`
/// at the recursive entry point is the second line of defence.
const MAX_NESTING_DEPTH: usize = 64;

pub(super) struct Parser {
    tokens: Vec<Token>,
    current: usize,
    unit: Arc<SourceUnit>,
    config: ParserConfig,
    pub(super) ast: Ast,
    /// One counter for all synthetic locals in this parse.
    temp_counter: u32,
    nesting_depth: usize,
    /// Results of `begin...end` primaries; a trailing `while`/`until` on
    /// one of these builds a post-test loop.
    begin_blocks: Vec<NodeId>,
    /// Doc comment text waiting to be attached to the next declaration.
    pending_doc: Option<EcoString>,
    /// Token index of the last doc comment already materialized.
    doc_emitted_at: Option<usize>,
    /// Set while parsing command arguments and loop conditions, where a
    /// `do` belongs to the enclosing construct rather than a call.
    pub(super) no_do_block: bool,
}

impl Parser {
    fn new(unit: Arc<SourceUnit>, tokens: Vec<Token>, config: ParserConfig) -> Self {
        Self {
            tokens,
            current: 0,
            unit,
            config,
            ast: Ast::new(),
            temp_counter: 0,
            nesting_depth: 0,
            begin_blocks: Vec::new(),
            pending_doc: None,
            doc_emitted_at: None,
            no_do_block: false,
        }
    }

    // ========================================================================
    // Token management
    // ========================================================================

    pub(super) fn current_token(&self) -> &Token {
        if self.current < self.tokens.len() {
            &self.tokens[self.current]
        } else {
            self.tokens
                .last()
                .expect("token stream always ends with EOF")
        }
    }

    pub(super) fn current_kind(&self) -> &TokenKind {
        self.current_token().kind()
    }

    pub(super) fn current_span(&self) -> Span {
        self.current_token().span()
    }

    pub(super) fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current + 1).map(Token::kind)
    }

    pub(super) fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    pub(super) fn is_at_end(&self) -> bool {
        self.current_kind().is_eof()
    }

    pub(super) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    /// Span of the last consumed token.
    pub(super) fn prev_span(&self) -> Span {
        if self.current == 0 {
            self.current_span()
        } else {
            self.tokens[self.current - 1].span()
        }
    }

    pub(super) fn spanned(&self, start: Span) -> Span {
        start.merge(self.prev_span())
    }

    pub(super) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    pub(super) fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current_kind(), TokenKind::Keyword(k) if *k == keyword)
    }

    pub(super) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(super) fn expect_keyword(
        &mut self,
        keyword: Keyword,
        expected: &str,
    ) -> Result<Token, SyntaxError> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Whether the current token starts a new source line.
    pub(super) fn at_newline(&self) -> bool {
        self.current_token().has_leading_newline()
    }

    /// Whether the current token is glued to the previous one.
    pub(super) fn glued(&self) -> bool {
        !self.current_token().has_space_before()
    }

    /// Whether the token after the current one is glued to it.
    pub(super) fn next_glued(&self) -> bool {
        self.peek_token().is_some_and(|t| !t.has_space_before())
    }

    pub(super) fn unexpected(&self, expected: &str) -> SyntaxError {
        self.error_at(
            SyntaxErrorKind::UnexpectedToken {
                expected: expected.into(),
                found: format!("`{}`", self.current_kind()).into(),
            },
            self.current_span(),
        )
    }

    pub(super) fn error_at(&self, kind: SyntaxErrorKind, span: Span) -> SyntaxError {
        SyntaxError::new(kind, self.unit.position(span))
    }

    pub(super) fn trace_rule(&self, rule: &str) {
        if self.config.trace {
            trace!(rule, token = %self.current_kind(), "parse");
        }
    }

    // ========================================================================
    // Node helpers
    // ========================================================================

    pub(super) fn pos(&self, span: Span) -> Position {
        self.unit.position(span)
    }

    pub(super) fn add(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let position = self.pos(span);
        self.ast.add(kind, position)
    }

    /// Clears a node's parent so it can be re-slotted under a new node.
    pub(super) fn detach(&mut self, id: NodeId) -> NodeId {
        self.ast.node_mut(id).parent = None;
        id
    }

    pub(super) fn simple_string(&mut self, value: impl Into<EcoString>, span: Span) -> NodeId {
        self.add(
            NodeKind::SimpleString {
                value: value.into(),
            },
            span,
        )
    }

    pub(super) fn node_list(&mut self, children: Vec<NodeId>, fallback: Span) -> NodeId {
        let span = children
            .iter()
            .map(|&c| self.ast.node(c).position.span())
            .reduce(Span::merge)
            .unwrap_or(fallback);
        for &c in &children {
            self.detach(c);
        }
        self.add(NodeKind::NodeList { children }, span)
    }

    pub(super) fn empty_list(&mut self, span: Span) -> NodeId {
        self.add(NodeKind::NodeList { children: Vec::new() }, span)
    }

    pub(super) fn empty_annotation_list(&mut self, span: Span) -> NodeId {
        self.add(
            NodeKind::AnnotationList {
                children: Vec::new(),
            },
            span,
        )
    }

    pub(super) fn empty_modifier_list(&mut self, span: Span) -> NodeId {
        self.add(
            NodeKind::ModifierList {
                children: Vec::new(),
            },
            span,
        )
    }

    /// Appends `child` to a sequence-container node, wiring its parent.
    pub(super) fn push_child(&mut self, list: NodeId, child: NodeId) {
        self.detach(child);
        self.ast.node_mut(child).parent = Some(list);
        match &mut self.ast.node_mut(list).kind {
            NodeKind::NodeList { children }
            | NodeKind::StringPieceList { children }
            | NodeKind::TypeNameList { children }
            | NodeKind::RescueClauseList { children }
            | NodeKind::HashEntryList { children }
            | NodeKind::ModifierList { children }
            | NodeKind::AnnotationList { children }
            | NodeKind::RequiredArgumentList { children }
            | NodeKind::OptionalArgumentList { children } => children.push(child),
            _ => unreachable!("push_child target must be a sequence container"),
        }
    }

    /// A fresh synthetic local name; one counter serves every desugaring
    /// category so generated names read in creation order.
    pub(super) fn next_temp(&mut self, prefix: &str) -> EcoString {
        self.temp_counter += 1;
        format!("${prefix}${}", self.temp_counter).into()
    }

    pub(super) fn node_span(&self, id: NodeId) -> Span {
        self.ast.node(id).position.span()
    }

    pub(super) fn enter_nesting(&mut self) -> Result<(), SyntaxError> {
        self.nesting_depth += 1;
        if self.nesting_depth > MAX_NESTING_DEPTH {
            self.nesting_depth -= 1;
            return Err(self.error_at(SyntaxErrorKind::NestingTooDeep, self.current_span()));
        }
        Ok(())
    }

    pub(super) fn leave_nesting(&mut self) {
        debug_assert!(self.nesting_depth > 0);
        self.nesting_depth = self.nesting_depth.saturating_sub(1);
    }

    pub(super) fn mark_begin_block(&mut self, id: NodeId) {
        self.begin_blocks.push(id);
    }

    pub(super) fn is_begin_block(&self, id: NodeId) -> bool {
        self.begin_blocks.contains(&id)
    }

    pub(super) fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub(super) fn unit(&self) -> &Arc<SourceUnit> {
        &self.unit
    }

    pub(super) fn take_pending_doc(&mut self) -> Option<EcoString> {
        self.pending_doc.take()
    }

    // ========================================================================
    // Script and statements
    // ========================================================================

    #[allow(clippy::cast_possible_truncation)]
    fn parse_script(mut self) -> Result<Ast, SyntaxError> {
        self.trace_rule("script");
        let full = Span::new(0, self.unit.text().len() as u32);
        let stmts = self.parse_statements(|k| k.is_eof())?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of input"));
        }
        let body = self.node_list(stmts, full);
        // The script covers the whole unit regardless of statement extent.
        self.ast.node_mut(body).position = self.pos(full);
        let root = self.add(NodeKind::Script { body }, full);
        self.ast.set_root(root);
        Ok(self.ast)
    }

    /// Parses a statement sequence until `stop` matches (the stop token is
    /// not consumed). Handles separators, empty statements, and doc
    /// comment materialization.
    pub(super) fn parse_statements(
        &mut self,
        stop: impl Fn(&TokenKind) -> bool + Copy,
    ) -> Result<Vec<NodeId>, SyntaxError> {
        self.parse_statements_impl(stop, None)
    }

    /// Like [`parse_statements`], but collects `implements` clauses into
    /// `interfaces` (class and interface bodies).
    pub(super) fn parse_statements_with_implements(
        &mut self,
        stop: impl Fn(&TokenKind) -> bool + Copy,
        interfaces: &mut Vec<NodeId>,
    ) -> Result<Vec<NodeId>, SyntaxError> {
        let mut collected = Vec::new();
        let stmts = self.parse_statements_impl(stop, Some(&mut collected))?;
        interfaces.extend(collected);
        Ok(stmts)
    }

    fn parse_statements_impl(
        &mut self,
        stop: impl Fn(&TokenKind) -> bool + Copy,
        mut implements: Option<&mut Vec<NodeId>>,
    ) -> Result<Vec<NodeId>, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            // Separators and doc comments before the next statement.
            loop {
                self.collect_doc_comment(&mut stmts);
                if self.check(&TokenKind::Semicolon) {
                    self.advance();
                } else {
                    break;
                }
            }
            if stop(self.current_kind()) || self.is_at_end() {
                return Ok(stmts);
            }
            if let Some(list) = implements.as_deref_mut() {
                if self.check_keyword(Keyword::Implements) {
                    self.advance();
                    loop {
                        let ty = self.parse_constant_path()?;
                        list.push(ty);
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                    continue;
                }
            }
            let stmt = self.parse_statement()?;
            stmts.push(stmt);

            if self.check(&TokenKind::Semicolon)
                || stop(self.current_kind())
                || self.is_at_end()
                || self.at_newline()
            {
                continue;
            }
            return Err(self.unexpected("a statement separator"));
        }
    }

    /// Materializes a doc comment from the current token's leading trivia:
    /// a standalone `JavaDoc` statement plus pending attachment text for
    /// the next declaration. A no-op when `skip_doc_comments` is set.
    fn collect_doc_comment(&mut self, stmts: &mut Vec<NodeId>) {
        if self.config.skip_doc_comments || self.doc_emitted_at == Some(self.current) {
            return;
        }
        let doc = self
            .current_token()
            .leading_trivia()
            .iter()
            .rev()
            .find_map(|t| match t {
                crate::source_analysis::Trivia::DocComment(text) => Some(text.clone()),
                _ => None,
            });
        if let Some(text) = doc {
            self.doc_emitted_at = Some(self.current);
            let span = Span::new(self.current_span().start(), self.current_span().start());
            let node = self.add(NodeKind::JavaDoc { value: text.clone() }, span);
            stmts.push(node);
            self.pending_doc = Some(text);
        }
    }

    fn parse_statement(&mut self) -> Result<NodeId, SyntaxError> {
        self.trace_rule("statement");
        let start = self.current_span();

        // Leading annotations and declaration modifiers.
        let mut annotations: Vec<NodeId> = Vec::new();
        let mut modifiers: Vec<NodeId> = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::Dollar => {
                    let annotation = self.parse_annotation()?;
                    annotations.push(annotation);
                }
                TokenKind::Keyword(k) if k.modifier_value().is_some() => {
                    let value = k.modifier_value().unwrap_or_default();
                    let span = self.current_span();
                    self.advance();
                    let node = self.add(
                        NodeKind::Modifier {
                            value: value.into(),
                        },
                        span,
                    );
                    modifiers.push(node);
                }
                _ => break,
            }
        }

        let stmt = match self.current_kind() {
            TokenKind::Keyword(Keyword::Def) => {
                return self.parse_method_definition(start, annotations, modifiers, None);
            }
            TokenKind::Keyword(Keyword::Macro | Keyword::Defmacro) => {
                return self.parse_macro_definition(start, annotations, modifiers);
            }
            TokenKind::Keyword(Keyword::Class) => {
                return self.parse_class_definition(start, annotations, modifiers);
            }
            TokenKind::Keyword(Keyword::Interface) => {
                return self.parse_interface_declaration(start, annotations, modifiers);
            }
            TokenKind::Keyword(Keyword::Package) => {
                self.require_undecorated(&annotations, &modifiers)?;
                self.parse_package()?
            }
            TokenKind::Keyword(Keyword::Import) => {
                self.require_undecorated(&annotations, &modifiers)?;
                self.parse_import()?
            }
            _ => {
                let expr = self.parse_expression_statement()?;
                if annotations.is_empty() && modifiers.is_empty() {
                    expr
                } else {
                    self.attach_decoration(expr, annotations, modifiers)?
                }
            }
        };
        Ok(stmt)
    }

    fn require_undecorated(
        &self,
        annotations: &[NodeId],
        modifiers: &[NodeId],
    ) -> Result<(), SyntaxError> {
        if annotations.is_empty() && modifiers.is_empty() {
            Ok(())
        } else {
            Err(self.unexpected("a declaration"))
        }
    }

    /// Attaches collected annotations/modifiers to a constant or field
    /// assignment; anything else cannot be decorated.
    fn attach_decoration(
        &mut self,
        stmt: NodeId,
        annotations: Vec<NodeId>,
        modifiers: Vec<NodeId>,
    ) -> Result<NodeId, SyntaxError> {
        let (anno_list, mod_list) = match self.ast.node(stmt).kind {
            NodeKind::ConstantAssign {
                annotations: a,
                modifiers: m,
                ..
            }
            | NodeKind::FieldAssign {
                annotations: a,
                modifiers: m,
                ..
            } => (a, m),
            _ => return Err(self.unexpected("a declaration")),
        };
        for annotation in annotations {
            self.push_child(anno_list, annotation);
        }
        for modifier in modifiers {
            self.push_child(mod_list, modifier);
        }
        Ok(stmt)
    }

    /// Parses one expression statement including trailing statement
    /// modifiers (`if`, `unless`, `while`, `until`, `rescue`).
    fn parse_expression_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        let mut expr = self.parse_command_expr()?;

        loop {
            if self.at_newline() {
                break;
            }
            match self.current_kind() {
                TokenKind::Keyword(Keyword::If) => {
                    self.advance();
                    let condition = self.parse_command_expr()?;
                    expr = self.wrap_conditional_modifier(start, expr, condition, false);
                }
                TokenKind::Keyword(Keyword::Unless) => {
                    self.advance();
                    let condition = self.parse_command_expr()?;
                    expr = self.wrap_conditional_modifier(start, expr, condition, true);
                }
                TokenKind::Keyword(Keyword::While) => {
                    self.advance();
                    expr = self.wrap_loop_modifier(start, expr, false)?;
                }
                TokenKind::Keyword(Keyword::Until) => {
                    self.advance();
                    expr = self.wrap_loop_modifier(start, expr, true)?;
                }
                TokenKind::Keyword(Keyword::Rescue) => {
                    self.advance();
                    expr = self.wrap_rescue_modifier(start, expr)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn wrap_conditional_modifier(
        &mut self,
        start: Span,
        stmt: NodeId,
        condition: NodeId,
        negated: bool,
    ) -> NodeId {
        let span = self.spanned(start);
        let stmt_span = self.node_span(stmt);
        let then_body = self.node_list(vec![stmt], stmt_span);
        let else_body = self.empty_list(span);
        let (body, else_body) = if negated {
            (else_body, then_body)
        } else {
            (then_body, else_body)
        };
        self.detach(condition);
        self.add(
            NodeKind::If {
                condition,
                body,
                else_body,
            },
            span,
        )
    }

    fn wrap_loop_modifier(
        &mut self,
        start: Span,
        stmt: NodeId,
        negative: bool,
    ) -> Result<NodeId, SyntaxError> {
        let was_begin = self.is_begin_block(stmt);
        let saved = self.no_do_block;
        self.no_do_block = true;
        let condition = self.parse_command_expr()?;
        self.no_do_block = saved;
        let span = self.spanned(start);
        let stmt_span = self.node_span(stmt);
        let body = self.node_list(vec![stmt], stmt_span);
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
                skip_first_check: was_begin,
                negative,
            },
            span,
        ))
    }

    /// `expr rescue handler` — a one-clause exception handler.
    pub(super) fn wrap_rescue_modifier(
        &mut self,
        start: Span,
        stmt: NodeId,
    ) -> Result<NodeId, SyntaxError> {
        let handler = self.parse_not_expr()?;
        let span = self.spanned(start);
        let stmt_span = self.node_span(stmt);
        let body = self.node_list(vec![stmt], stmt_span);
        let types = self.add(
            NodeKind::TypeNameList {
                children: Vec::new(),
            },
            span,
        );
        let handler_span = self.node_span(handler);
        let clause_body = self.node_list(vec![handler], handler_span);
        let clause = self.add(
            NodeKind::RescueClause {
                types,
                name: None,
                body: clause_body,
            },
            span,
        );
        let clauses = self.add(
            NodeKind::RescueClauseList {
                children: vec![clause],
            },
            span,
        );
        let else_body = self.empty_list(span);
        Ok(self.add(
            NodeKind::Rescue {
                body,
                clauses,
                else_body,
            },
            span,
        ))
    }

    // ========================================================================
    // Assignment building and desugaring
    // ========================================================================

    /// Builds the node for `lhs = value`, dispatching on the lvalue shape.
    /// A cast on the lvalue (`x:A = y`) becomes the declared type.
    pub(super) fn build_assignment(
        &mut self,
        lhs: NodeId,
        value: NodeId,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        let (lhs, type_ref) = self.split_lhs_cast(lhs);
        self.detach(value);
        let node = match self.ast.node(lhs).kind.clone() {
            NodeKind::VCall { name } => {
                self.detach(name);
                self.add(
                    NodeKind::LocalAssignment {
                        name,
                        value,
                        type_ref,
                    },
                    span,
                )
            }
            NodeKind::Constant { name } => {
                self.detach(name);
                let annotations = self.empty_annotation_list(span);
                let modifiers = self.empty_modifier_list(span);
                self.add(
                    NodeKind::ConstantAssign {
                        name,
                        value,
                        annotations,
                        modifiers,
                        type_ref,
                    },
                    span,
                )
            }
            NodeKind::FieldAccess { name, is_static } => {
                self.detach(name);
                let annotations = self.empty_annotation_list(span);
                let modifiers = self.empty_modifier_list(span);
                self.add(
                    NodeKind::FieldAssign {
                        name,
                        value,
                        annotations,
                        modifiers,
                        type_ref,
                        is_static,
                    },
                    span,
                )
            }
            NodeKind::Unquote { .. } => {
                self.detach(lhs);
                self.add(
                    NodeKind::UnquoteAssign {
                        unquote: lhs,
                        value,
                    },
                    span,
                )
            }
            NodeKind::Call {
                target, name, args, ..
            } => {
                if self.is_element_call(name) {
                    self.detach(target);
                    self.detach(args);
                    self.add(
                        NodeKind::ElemAssign {
                            target,
                            args,
                            value,
                        },
                        span,
                    )
                } else {
                    self.detach(target);
                    self.detach(name);
                    self.add(
                        NodeKind::AttrAssign {
                            target,
                            name,
                            value,
                        },
                        span,
                    )
                }
            }
            _ => {
                return Err(self.error_at(
                    SyntaxErrorKind::InvalidAssignmentTarget,
                    self.node_span(lhs),
                ))
            }
        };
        Ok(node)
    }

    /// Builds `lhs op= value` as read-op-write, evaluating receivers and
    /// indexes exactly once through synthetic temporaries.
    pub(super) fn build_op_assign(
        &mut self,
        lhs: NodeId,
        op: &str,
        value: NodeId,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        match self.ast.node(lhs).kind.clone() {
            NodeKind::VCall { name } => {
                let read = self.copy_local_read(name, span);
                let combined = self.binary_call(read, op, value, span);
                self.detach(name);
                Ok(self.add(
                    NodeKind::LocalAssignment {
                        name,
                        value: combined,
                        type_ref: None,
                    },
                    span,
                ))
            }
            NodeKind::FieldAccess { name, is_static } => {
                let name_copy = self.copy_simple_string(name);
                let read = self.add(
                    NodeKind::FieldAccess {
                        name: name_copy,
                        is_static,
                    },
                    span,
                );
                let combined = self.binary_call(read, op, value, span);
                self.detach(name);
                let annotations = self.empty_annotation_list(span);
                let modifiers = self.empty_modifier_list(span);
                Ok(self.add(
                    NodeKind::FieldAssign {
                        name,
                        value: combined,
                        annotations,
                        modifiers,
                        type_ref: None,
                        is_static,
                    },
                    span,
                ))
            }
            NodeKind::Call {
                target, name, args, ..
            } => {
                if self.is_element_call(name) {
                    self.desugar_elem_op_assign(target, args, op, value, span)
                } else {
                    self.desugar_attr_op_assign(target, name, op, value, span)
                }
            }
            _ => Err(self.error_at(
                SyntaxErrorKind::InvalidAssignmentTarget,
                self.node_span(lhs),
            )),
        }
    }

    fn desugar_elem_op_assign(
        &mut self,
        target: NodeId,
        args: NodeId,
        op: &str,
        value: NodeId,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        let mut stmts = Vec::new();
        let (recv_name, recv_assign) = self.bind_temp(target, span);
        stmts.push(recv_assign);
        let index_children = match &self.ast.node(args).kind {
            NodeKind::NodeList { children } => children.clone(),
            _ => Vec::new(),
        };
        let mut index_names = Vec::new();
        for index in index_children {
            let (name, assign) = self.bind_temp(index, span);
            index_names.push(name);
            stmts.push(assign);
        }
        let read_target = self.local_read(&recv_name, span);
        let read_indexes: Vec<NodeId> = index_names
            .iter()
            .map(|n| self.local_read(n, span))
            .collect();
        let read_args = self.node_list(read_indexes, span);
        let elem_name = self.simple_string("[]", span);
        let read = self.add(
            NodeKind::Call {
                target: read_target,
                name: elem_name,
                args: read_args,
                block: None,
            },
            span,
        );
        let combined = self.binary_call(read, op, value, span);
        let write_target = self.local_read(&recv_name, span);
        let write_indexes: Vec<NodeId> = index_names
            .iter()
            .map(|n| self.local_read(n, span))
            .collect();
        let write_args = self.node_list(write_indexes, span);
        let assign = self.add(
            NodeKind::ElemAssign {
                target: write_target,
                args: write_args,
                value: combined,
            },
            span,
        );
        stmts.push(assign);
        Ok(self.node_list(stmts, span))
    }

    fn desugar_attr_op_assign(
        &mut self,
        target: NodeId,
        name: NodeId,
        op: &str,
        value: NodeId,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        let (recv_name, recv_assign) = self.bind_temp(target, span);
        let read_target = self.local_read(&recv_name, span);
        let name_copy = self.copy_simple_string(name);
        let empty = self.empty_list(span);
        let read = self.add(
            NodeKind::Call {
                target: read_target,
                name: name_copy,
                args: empty,
                block: None,
            },
            span,
        );
        let combined = self.binary_call(read, op, value, span);
        let write_target = self.local_read(&recv_name, span);
        self.detach(name);
        let assign = self.add(
            NodeKind::AttrAssign {
                target: write_target,
                name,
                value: combined,
            },
            span,
        );
        Ok(self.node_list(vec![recv_assign, assign], span))
    }

    /// `lhs &&= value`: assign only when the current value is truthy.
    pub(super) fn build_and_assign(
        &mut self,
        lhs: NodeId,
        value: NodeId,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        match self.ast.node(lhs).kind.clone() {
            NodeKind::VCall { name } => {
                let guard = self.copy_local_read(name, span);
                let assign = {
                    let name_copy = self.copy_simple_string(name);
                    self.detach(value);
                    self.add(
                        NodeKind::LocalAssignment {
                            name: name_copy,
                            value,
                            type_ref: None,
                        },
                        span,
                    )
                };
                let body = self.node_list(vec![assign], span);
                let reread = self.copy_local_read(name, span);
                let else_body = self.node_list(vec![reread], span);
                self.detach(guard);
                Ok(self.add(
                    NodeKind::If {
                        condition: guard,
                        body,
                        else_body,
                    },
                    span,
                ))
            }
            NodeKind::FieldAccess { name, is_static } => {
                let guard = self.copy_field_read(name, is_static, span);
                let assign = self.field_assign_from(name, is_static, value, span);
                let body = self.node_list(vec![assign], span);
                let reread = self.copy_field_read(name, is_static, span);
                let else_body = self.node_list(vec![reread], span);
                self.detach(guard);
                Ok(self.add(
                    NodeKind::If {
                        condition: guard,
                        body,
                        else_body,
                    },
                    span,
                ))
            }
            NodeKind::Call {
                target, name, args, ..
            } if !self.is_element_call(name) => {
                let _ = args;
                let (recv_name, recv_assign) = self.bind_temp(target, span);
                let read_target = self.local_read(&recv_name, span);
                let name_copy = self.copy_simple_string(name);
                let empty = self.empty_list(span);
                let guard = self.add(
                    NodeKind::Call {
                        target: read_target,
                        name: name_copy,
                        args: empty,
                        block: None,
                    },
                    span,
                );
                let write_target = self.local_read(&recv_name, span);
                self.detach(name);
                self.detach(value);
                let assign = self.add(
                    NodeKind::AttrAssign {
                        target: write_target,
                        name,
                        value,
                    },
                    span,
                );
                let body = self.node_list(vec![assign], span);
                let else_body = self.empty_list(span);
                self.detach(guard);
                let conditional = self.add(
                    NodeKind::If {
                        condition: guard,
                        body,
                        else_body,
                    },
                    span,
                );
                Ok(self.node_list(vec![recv_assign, conditional], span))
            }
            _ => Err(self.error_at(
                SyntaxErrorKind::InvalidAssignmentTarget,
                self.node_span(lhs),
            )),
        }
    }

    /// `lhs ||= value`: assign only when the current value is falsy.
    pub(super) fn build_or_assign(
        &mut self,
        lhs: NodeId,
        value: NodeId,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        match self.ast.node(lhs).kind.clone() {
            NodeKind::VCall { name } => {
                let guard = self.copy_local_read(name, span);
                let reread = self.copy_local_read(name, span);
                let body = self.node_list(vec![reread], span);
                let assign = {
                    let name_copy = self.copy_simple_string(name);
                    self.detach(value);
                    self.add(
                        NodeKind::LocalAssignment {
                            name: name_copy,
                            value,
                            type_ref: None,
                        },
                        span,
                    )
                };
                let else_body = self.node_list(vec![assign], span);
                self.detach(guard);
                Ok(self.add(
                    NodeKind::If {
                        condition: guard,
                        body,
                        else_body,
                    },
                    span,
                ))
            }
            NodeKind::FieldAccess { name, is_static } => {
                let guard = self.copy_field_read(name, is_static, span);
                let reread = self.copy_field_read(name, is_static, span);
                let body = self.node_list(vec![reread], span);
                let assign = self.field_assign_from(name, is_static, value, span);
                let else_body = self.node_list(vec![assign], span);
                self.detach(guard);
                Ok(self.add(
                    NodeKind::If {
                        condition: guard,
                        body,
                        else_body,
                    },
                    span,
                ))
            }
            NodeKind::Call {
                target, name, args, ..
            } if !self.is_element_call(name) => {
                let _ = args;
                let (recv_name, recv_assign) = self.bind_temp(target, span);
                let read_target = self.local_read(&recv_name, span);
                let name_copy = self.copy_simple_string(name);
                let empty = self.empty_list(span);
                let read = self.add(
                    NodeKind::Call {
                        target: read_target,
                        name: name_copy,
                        args: empty,
                        block: None,
                    },
                    span,
                );
                let (or_name, or_assign) = self.bind_named_temp("or", read, span);
                let guard = self.local_read(&or_name, span);
                let reread = self.local_read(&or_name, span);
                let body = self.node_list(vec![reread], span);
                let write_target = self.local_read(&recv_name, span);
                self.detach(name);
                self.detach(value);
                let assign = self.add(
                    NodeKind::AttrAssign {
                        target: write_target,
                        name,
                        value,
                    },
                    span,
                );
                let else_body = self.node_list(vec![assign], span);
                self.detach(guard);
                let conditional = self.add(
                    NodeKind::If {
                        condition: guard,
                        body,
                        else_body,
                    },
                    span,
                );
                let inner = self.node_list(vec![or_assign, conditional], span);
                Ok(self.node_list(vec![recv_assign, inner], span))
            }
            _ => Err(self.error_at(
                SyntaxErrorKind::InvalidAssignmentTarget,
                self.node_span(lhs),
            )),
        }
    }

    /// `left && right` is a conditional evaluating `right` only when
    /// `left` is truthy.
    pub(super) fn build_and(&mut self, left: NodeId, right: NodeId, span: Span) -> NodeId {
        let right_span = self.node_span(right);
        let body = self.node_list(vec![right], right_span);
        let else_body = self.empty_list(span);
        self.detach(left);
        self.add(
            NodeKind::If {
                condition: left,
                body,
                else_body,
            },
            span,
        )
    }

    /// `left || right` binds `left` to a synthetic local so it is
    /// evaluated once, then picks it or `right`.
    pub(super) fn build_or(&mut self, left: NodeId, right: NodeId, span: Span) -> NodeId {
        let (or_name, or_assign) = self.bind_named_temp("or", left, span);
        let guard = self.local_read(&or_name, span);
        let reread = self.local_read(&or_name, span);
        let body = self.node_list(vec![reread], span);
        let right_span = self.node_span(right);
        let else_body = self.node_list(vec![right], right_span);
        self.detach(guard);
        let conditional = self.add(
            NodeKind::If {
                condition: guard,
                body,
                else_body,
            },
            span,
        );
        self.node_list(vec![or_assign, conditional], span)
    }

    // --- small desugaring helpers ---

    pub(super) fn is_element_call(&self, name: NodeId) -> bool {
        matches!(&self.ast.node(name).kind, NodeKind::SimpleString { value } if value == "[]")
    }

    /// Splits a cast lvalue (`x:A`) into the bare lvalue and its type.
    fn split_lhs_cast(&mut self, lhs: NodeId) -> (NodeId, Option<NodeId>) {
        if let NodeKind::Cast { type_ref, value } = self.ast.node(lhs).kind {
            if matches!(
                self.ast.node(value).kind,
                NodeKind::VCall { .. } | NodeKind::FieldAccess { .. } | NodeKind::Constant { .. }
            ) {
                self.detach(type_ref);
                self.detach(value);
                return (value, Some(type_ref));
            }
        }
        (lhs, None)
    }

    pub(super) fn binary_call(
        &mut self,
        target: NodeId,
        op: &str,
        arg: NodeId,
        span: Span,
    ) -> NodeId {
        let name = self.simple_string(op, span);
        let arg_span = self.node_span(arg);
        let args = self.node_list(vec![arg], arg_span);
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

    fn copy_simple_string(&mut self, name: NodeId) -> NodeId {
        let (value, span) = match &self.ast.node(name).kind {
            NodeKind::SimpleString { value } => (value.clone(), self.node_span(name)),
            _ => (EcoString::new(), self.node_span(name)),
        };
        self.simple_string(value, span)
    }

    /// A `LocalAccess` reading the same name as `name`.
    fn copy_local_read(&mut self, name: NodeId, span: Span) -> NodeId {
        let name_copy = self.copy_simple_string(name);
        self.add(NodeKind::LocalAccess { name: name_copy }, span)
    }

    fn copy_field_read(&mut self, name: NodeId, is_static: bool, span: Span) -> NodeId {
        let name_copy = self.copy_simple_string(name);
        self.add(
            NodeKind::FieldAccess {
                name: name_copy,
                is_static,
            },
            span,
        )
    }

    fn field_assign_from(
        &mut self,
        name: NodeId,
        is_static: bool,
        value: NodeId,
        span: Span,
    ) -> NodeId {
        let name_copy = self.copy_simple_string(name);
        let annotations = self.empty_annotation_list(span);
        let modifiers = self.empty_modifier_list(span);
        self.detach(value);
        self.add(
            NodeKind::FieldAssign {
                name: name_copy,
                value,
                annotations,
                modifiers,
                type_ref: None,
                is_static,
            },
            span,
        )
    }

    /// A `LocalAccess` of a synthetic name.
    pub(super) fn local_read(&mut self, name: &EcoString, span: Span) -> NodeId {
        let name_node = self.simple_string(name.clone(), span);
        self.add(NodeKind::LocalAccess { name: name_node }, span)
    }

    /// Binds `value` to a fresh `$ptemp$N` local; returns the name and the
    /// assignment statement.
    fn bind_temp(&mut self, value: NodeId, span: Span) -> (EcoString, NodeId) {
        self.bind_named_temp("ptemp", value, span)
    }

    fn bind_named_temp(
        &mut self,
        prefix: &str,
        value: NodeId,
        span: Span,
    ) -> (EcoString, NodeId) {
        let name = self.next_temp(prefix);
        let name_node = self.simple_string(name.clone(), span);
        self.detach(value);
        let assign = self.add(
            NodeKind::LocalAssignment {
                name: name_node,
                value,
                type_ref: None,
            },
            span,
        );
        (name, assign)
    }
}

// ============================================================================
// Pratt binding powers
// ============================================================================

/// Binding power for binary operators. Left-associative operators have
/// `right = left + 1`; the sole right-associative operator (`**`) flips
/// that.
#[derive(Debug, Clone, Copy)]
pub(super) struct BindingPower {
    pub(super) left: u8,
    pub(super) right: u8,
}

impl BindingPower {
    const fn left_assoc(precedence: u8) -> Self {
        Self {
            left: precedence,
            right: precedence + 1,
        }
    }

    const fn right_assoc(precedence: u8) -> Self {
        Self {
            left: precedence + 1,
            right: precedence,
        }
    }
}

/// Binding powers from loosest to tightest. `&&` and `||` live in the
/// table but build conditionals instead of calls.
pub(super) fn binary_binding_power(op: &str) -> Option<BindingPower> {
    match op {
        "||" => Some(BindingPower::left_assoc(1)),
        "&&" => Some(BindingPower::left_assoc(3)),
        "==" | "!=" | "===" | "!==" | "=~" | "!~" | "<=>" => Some(BindingPower::left_assoc(5)),
        "<" | ">" | "<=" | ">=" => Some(BindingPower::left_assoc(7)),
        "|" | "^" => Some(BindingPower::left_assoc(9)),
        "&" => Some(BindingPower::left_assoc(11)),
        "<<" | ">>" | ">>>" => Some(BindingPower::left_assoc(13)),
        "+" | "-" => Some(BindingPower::left_assoc(15)),
        "*" | "/" | "%" => Some(BindingPower::left_assoc(17)),
        "**" => Some(BindingPower::right_assoc(19)),
        _ => None,
    }
}
