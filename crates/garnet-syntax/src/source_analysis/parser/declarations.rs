// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Declaration parsing for Garnet: method, macro, class, and interface
//! definitions, packages, imports, annotations, and type references.
//!
//! Method names accept the full operator set (`def <=>`, `def []=`,
//! `def -@`) and non-modifier keywords (`def rescue`), and any name
//! position accepts a quasiquote. Parameter lists enforce the fixed slot
//! order: required, optional, rest, required-after, block.

use ecow::EcoString;

use crate::ast::{NodeId, NodeKind};
use crate::source_analysis::error::{SyntaxError, SyntaxErrorKind};
use crate::source_analysis::token::{Keyword, TokenKind};
use crate::source_analysis::Span;

use super::Parser;

impl Parser {
    // ========================================================================
    // Methods and macros
    // ========================================================================

    /// `def [self.]name[(params)][:Type]; body; end`.
    pub(super) fn parse_method_definition(
        &mut self,
        start: Span,
        annotations: Vec<NodeId>,
        modifiers: Vec<NodeId>,
        java_doc: Option<EcoString>,
    ) -> Result<NodeId, SyntaxError> {
        self.trace_rule("method_definition");
        let doc = java_doc.or_else(|| self.take_pending_doc());
        self.expect_keyword(Keyword::Def, "`def`")?;

        let is_static = if self.check_keyword(Keyword::SelfKw)
            && matches!(self.peek_kind(), Some(TokenKind::Dot))
        {
            self.advance();
            self.advance();
            true
        } else {
            false
        };
        let name = self.parse_def_name()?;
        let arguments = self.parse_def_arguments()?;
        let return_type = if self.check(&TokenKind::Colon) && self.glued() {
            self.advance();
            Some(self.parse_type_name(true)?)
        } else {
            None
        };

        let body = self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?;
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);

        let body = self.node_list(body, span);
        let annotations = self.annotation_list(annotations, span);
        let modifiers = self.modifier_list(modifiers, span);
        self.detach(name);
        if let Some(t) = return_type {
            self.detach(t);
        }
        Ok(self.add(
            NodeKind::MethodDefinition {
                name,
                arguments,
                return_type,
                body,
                annotations,
                modifiers,
                java_doc: doc,
                is_static,
            },
            span,
        ))
    }

    /// `macro def name(params); body; end` or `defmacro name; body; end`.
    /// The parameter list slot stays absent when no parentheses are given.
    pub(super) fn parse_macro_definition(
        &mut self,
        start: Span,
        annotations: Vec<NodeId>,
        modifiers: Vec<NodeId>,
    ) -> Result<NodeId, SyntaxError> {
        self.trace_rule("macro_definition");
        self.require_undecorated(&annotations, &modifiers)?;
        let doc = self.take_pending_doc();
        if self.match_keyword(Keyword::Macro) {
            self.expect_keyword(Keyword::Def, "`def`")?;
        } else {
            self.expect_keyword(Keyword::Defmacro, "`defmacro`")?;
        }

        let name = self.parse_def_name()?;
        let arguments = if self.check(&TokenKind::LParen) && self.glued() {
            self.advance();
            let args = self.parse_parameter_list(|k| matches!(k, TokenKind::RParen))?;
            self.expect(&TokenKind::RParen, "`)`")?;
            Some(args)
        } else {
            None
        };

        let body = self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?;
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);

        let body = self.node_list(body, span);
        self.detach(name);
        if let Some(a) = arguments {
            self.detach(a);
        }
        Ok(self.add(
            NodeKind::MacroDefinition {
                name,
                arguments,
                body,
                java_doc: doc,
            },
            span,
        ))
    }

    /// A definition name: identifier, constant, operator spelling,
    /// non-modifier keyword, or quasiquote. A glued `=` folds into the name
    /// (`def foo=`, `def []=`); a glued `@` folds into a sign (`def -@`).
    fn parse_def_name(&mut self) -> Result<NodeId, SyntaxError> {
        let span = self.current_span();
        let mut name: EcoString = match self.current_kind().clone() {
            TokenKind::Identifier(name) | TokenKind::ConstantName(name) => {
                self.advance();
                name
            }
            TokenKind::Keyword(k) if k.modifier_value().is_none() => {
                self.advance();
                k.as_str().into()
            }
            TokenKind::BinaryOp(op) => {
                self.advance();
                if (op == "-" || op == "+") && self.check(&TokenKind::At) && self.glued() {
                    self.advance();
                    return Ok(self.simple_string(format!("{op}@"), self.spanned(span)));
                }
                return Ok(self.simple_string(op, span));
            }
            TokenKind::Bang => {
                self.advance();
                return Ok(self.simple_string("!", span));
            }
            TokenKind::Tilde => {
                self.advance();
                return Ok(self.simple_string("~", span));
            }
            TokenKind::LBracket => {
                self.advance();
                self.expect(&TokenKind::RBracket, "`]`")?;
                let mut name = EcoString::from("[]");
                if self.check(&TokenKind::Eq) && self.glued() {
                    self.advance();
                    name.push('=');
                }
                return Ok(self.simple_string(name, self.spanned(span)));
            }
            TokenKind::Backtick => return self.parse_unquote(),
            _ => return Err(self.unexpected("a method name")),
        };
        if self.check(&TokenKind::Eq) && self.glued() {
            self.advance();
            name.push('=');
        }
        Ok(self.simple_string(name, self.spanned(span)))
    }

    /// A definition parameter list: parenthesized, bare, or absent.
    fn parse_def_arguments(&mut self) -> Result<NodeId, SyntaxError> {
        if self.check(&TokenKind::LParen) {
            self.advance();
            let args = self.parse_parameter_list(|k| matches!(k, TokenKind::RParen))?;
            self.expect(&TokenKind::RParen, "`)`")?;
            return Ok(args);
        }
        let bare_start = matches!(
            self.current_kind(),
            TokenKind::Identifier(_) | TokenKind::Dollar | TokenKind::Backtick
        ) || matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "*" || op == "&");
        if bare_start && !self.at_newline() {
            return self.parse_parameter_list(|_| false);
        }
        let span = self.prev_span();
        Ok(self.build_arguments(Vec::new(), Vec::new(), None, Vec::new(), None, span))
    }

    /// Parses parameters up to (not consuming) the stop token, enforcing
    /// the fixed slot order. Duplicate rest or block parameters are syntax
    /// errors.
    pub(super) fn parse_parameter_list(
        &mut self,
        stop: impl Fn(&TokenKind) -> bool,
    ) -> Result<NodeId, SyntaxError> {
        let list_start = self.current_span();
        let mut required = Vec::new();
        let mut optionals = Vec::new();
        let mut rest: Option<NodeId> = None;
        let mut required2 = Vec::new();
        let mut block: Option<NodeId> = None;

        while !stop(self.current_kind()) && !self.is_at_end() {
            let mut annotations = Vec::new();
            while self.check(&TokenKind::Dollar) {
                annotations.push(self.parse_annotation()?);
            }
            let span = self.current_span();
            match self.current_kind().clone() {
                TokenKind::BinaryOp(op) if op == "*" => {
                    self.advance();
                    if rest.is_some() {
                        return Err(
                            self.error_at(SyntaxErrorKind::DuplicateRestParameter, span)
                        );
                    }
                    let name = match self.current_kind().clone() {
                        TokenKind::Identifier(name) => {
                            let name_span = self.current_span();
                            self.advance();
                            Some(self.simple_string(name, name_span))
                        }
                        _ => None,
                    };
                    let type_ref = self.parse_param_type()?;
                    let annotations = self.annotation_list(annotations, span);
                    if let Some(n) = name {
                        self.detach(n);
                    }
                    rest = Some(self.add(
                        NodeKind::RestArgument {
                            name,
                            type_ref,
                            annotations,
                        },
                        self.spanned(span),
                    ));
                }
                TokenKind::BinaryOp(op) if op == "&" => {
                    self.advance();
                    if block.is_some() {
                        return Err(
                            self.error_at(SyntaxErrorKind::DuplicateBlockParameter, span)
                        );
                    }
                    let name_span = self.current_span();
                    let name = match self.current_kind().clone() {
                        TokenKind::Identifier(name) => {
                            self.advance();
                            self.simple_string(name, name_span)
                        }
                        _ => return Err(self.unexpected("a block parameter name")),
                    };
                    let type_ref = self.parse_param_type()?;
                    let optional = if self.match_token(&TokenKind::Eq) {
                        if !self.match_keyword(Keyword::Nil) {
                            return Err(self.error_at(
                                SyntaxErrorKind::InvalidBlockParameterDefault,
                                self.current_span(),
                            ));
                        }
                        true
                    } else {
                        false
                    };
                    self.detach(name);
                    block = Some(self.add(
                        NodeKind::BlockArgument {
                            name,
                            type_ref,
                            optional,
                        },
                        self.spanned(span),
                    ));
                }
                TokenKind::Identifier(_) | TokenKind::Backtick => {
                    let name = match self.current_kind().clone() {
                        TokenKind::Identifier(name) => {
                            self.advance();
                            self.simple_string(name, span)
                        }
                        _ => self.parse_unquote()?,
                    };
                    let type_ref = self.parse_param_type()?;
                    let annotations = self.annotation_list(annotations, span);
                    self.detach(name);
                    if self.match_token(&TokenKind::Eq) {
                        if rest.is_some() {
                            return Err(self.unexpected("a required parameter"));
                        }
                        let value = self.parse_expression()?;
                        self.detach(value);
                        optionals.push(self.add(
                            NodeKind::OptionalArgument {
                                name,
                                type_ref,
                                value,
                                annotations,
                            },
                            self.spanned(span),
                        ));
                    } else {
                        let node = self.add(
                            NodeKind::RequiredArgument {
                                name,
                                type_ref,
                                annotations,
                            },
                            self.spanned(span),
                        );
                        if rest.is_some() || !optionals.is_empty() {
                            required2.push(node);
                        } else {
                            required.push(node);
                        }
                    }
                }
                _ => return Err(self.unexpected("a parameter")),
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(self.build_arguments(required, optionals, rest, required2, block, list_start))
    }

    fn parse_param_type(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        if self.check(&TokenKind::Colon) && self.glued() {
            self.advance();
            let t = self.parse_type_name(true)?;
            self.detach(t);
            Ok(Some(t))
        } else {
            Ok(None)
        }
    }

    /// Assembles the five-slot `Arguments` node from parsed parameter
    /// groups.
    pub(super) fn build_arguments(
        &mut self,
        required: Vec<NodeId>,
        optionals: Vec<NodeId>,
        rest: Option<NodeId>,
        required2: Vec<NodeId>,
        block: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        for &n in required.iter().chain(&optionals).chain(&required2) {
            self.detach(n);
        }
        let required = self.add(NodeKind::RequiredArgumentList { children: required }, span);
        let optional = self.add(
            NodeKind::OptionalArgumentList {
                children: optionals,
            },
            span,
        );
        let required2 = self.add(
            NodeKind::RequiredArgumentList {
                children: required2,
            },
            span,
        );
        if let Some(r) = rest {
            self.detach(r);
        }
        if let Some(b) = block {
            self.detach(b);
        }
        self.add(
            NodeKind::Arguments {
                required,
                optional,
                rest,
                required2,
                block,
            },
            span,
        )
    }

    // ========================================================================
    // Classes and interfaces
    // ========================================================================

    /// `class Name [< Super]; body; end` or `class << self; body; end`.
    pub(super) fn parse_class_definition(
        &mut self,
        start: Span,
        annotations: Vec<NodeId>,
        modifiers: Vec<NodeId>,
    ) -> Result<NodeId, SyntaxError> {
        self.trace_rule("class_definition");
        let doc = self.take_pending_doc();
        self.expect_keyword(Keyword::Class, "`class`")?;

        if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "<<") {
            self.require_undecorated(&annotations, &modifiers)?;
            self.advance();
            self.expect_keyword(Keyword::SelfKw, "`self`")?;
            let body =
                self.parse_statements(|k| matches!(k, TokenKind::Keyword(Keyword::End)))?;
            self.expect_keyword(Keyword::End, "`end`")?;
            let span = self.spanned(start);
            let body = self.node_list(body, span);
            return Ok(self.add(NodeKind::ClassAppendSelf { body }, span));
        }

        let name = self.parse_declared_name()?;
        let superclass = if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "<") {
            self.advance();
            let t = self.parse_type_name(true)?;
            self.detach(t);
            Some(t)
        } else {
            None
        };

        let mut interfaces = Vec::new();
        let body = self.parse_statements_with_implements(
            |k| matches!(k, TokenKind::Keyword(Keyword::End)),
            &mut interfaces,
        )?;
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);

        let body = self.node_list(body, span);
        for &i in &interfaces {
            self.detach(i);
        }
        let interfaces = self.add(NodeKind::TypeNameList { children: interfaces }, span);
        let annotations = self.annotation_list(annotations, span);
        let modifiers = self.modifier_list(modifiers, span);
        self.detach(name);
        Ok(self.add(
            NodeKind::ClassDefinition {
                name,
                superclass,
                body,
                interfaces,
                annotations,
                modifiers,
                java_doc: doc,
            },
            span,
        ))
    }

    /// `interface Name [< A, B]; body; end`. The `<` list fills the
    /// implemented-type slot.
    pub(super) fn parse_interface_declaration(
        &mut self,
        start: Span,
        annotations: Vec<NodeId>,
        modifiers: Vec<NodeId>,
    ) -> Result<NodeId, SyntaxError> {
        self.trace_rule("interface_declaration");
        let doc = self.take_pending_doc();
        self.expect_keyword(Keyword::Interface, "`interface`")?;
        let name = self.parse_declared_name()?;

        let mut interfaces = Vec::new();
        if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "<") {
            self.advance();
            loop {
                interfaces.push(self.parse_type_name(true)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.match_keyword(Keyword::Do);

        let body = self.parse_statements_with_implements(
            |k| matches!(k, TokenKind::Keyword(Keyword::End)),
            &mut interfaces,
        )?;
        self.expect_keyword(Keyword::End, "`end`")?;
        let span = self.spanned(start);

        let body = self.node_list(body, span);
        for &i in &interfaces {
            self.detach(i);
        }
        let interfaces = self.add(NodeKind::TypeNameList { children: interfaces }, span);
        let annotations = self.annotation_list(annotations, span);
        let modifiers = self.modifier_list(modifiers, span);
        self.detach(name);
        Ok(self.add(
            NodeKind::InterfaceDeclaration {
                name,
                superclass: None,
                body,
                interfaces,
                annotations,
                modifiers,
                java_doc: doc,
            },
            span,
        ))
    }

    /// A class or interface name: any word (case does not matter here) or
    /// a quasiquote.
    fn parse_declared_name(&mut self) -> Result<NodeId, SyntaxError> {
        let span = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Identifier(name) | TokenKind::ConstantName(name) => {
                self.advance();
                let name = self.simple_string(name, span);
                self.detach(name);
                Ok(self.add(NodeKind::Constant { name }, span))
            }
            TokenKind::Backtick => self.parse_unquote(),
            _ => Err(self.unexpected("a type name")),
        }
    }

    // ========================================================================
    // Packages and imports
    // ========================================================================

    /// `package foo.bar` or `package foo { ... }`.
    pub(super) fn parse_package(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.expect_keyword(Keyword::Package, "`package`")?;
        let (path, path_span) = self.parse_dotted_path()?;
        let name = self.simple_string(path, path_span);

        let body = if self.check(&TokenKind::LBrace) {
            self.advance();
            let stmts = self.parse_statements(|k| matches!(k, TokenKind::RBrace))?;
            self.expect(&TokenKind::RBrace, "`}`")?;
            let span = self.spanned(start);
            Some(self.node_list(stmts, span))
        } else {
            None
        };
        self.detach(name);
        Ok(self.add(NodeKind::Package { name, body }, self.spanned(start)))
    }

    /// The import forms: dotted paths with optional `.*`, `as` aliases,
    /// `static` member imports, and quoted spellings.
    pub(super) fn parse_import(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.expect_keyword(Keyword::Import, "`import`")?;

        // Quoted: `import 'a.b.C'` or `import "Alias", "a.b.C"`.
        if let TokenKind::Str(first) = self.current_kind().clone() {
            self.advance();
            let (fullname, simplename) = if self.match_token(&TokenKind::Comma) {
                match self.current_kind().clone() {
                    TokenKind::Str(second) => {
                        self.advance();
                        (second, first)
                    }
                    _ => return Err(self.unexpected("a quoted import path")),
                }
            } else {
                let simple: EcoString = first.rsplit('.').next().unwrap_or(first.as_str()).into();
                (first, simple)
            };
            return Ok(self.finish_import(start, fullname, simplename));
        }

        // `import static a.b.C.member` / `import static a.b.C.*`.
        let is_static = matches!(self.current_kind(), TokenKind::Identifier(n) if n == "static")
            && matches!(
                self.peek_kind(),
                Some(TokenKind::Identifier(_) | TokenKind::ConstantName(_))
            );
        if is_static {
            self.advance();
            let (segments, star) = self.parse_import_path()?;
            if star {
                let fullname: EcoString = segments.join(".").into();
                return Ok(self.finish_import(start, fullname, ".*".into()));
            }
            let fullname: EcoString = segments.join(".").into();
            let simplename: EcoString =
                format!(".{}", segments.last().map(String::as_str).unwrap_or("")).into();
            return Ok(self.finish_import(start, fullname, simplename));
        }

        let (segments, star) = self.parse_import_path()?;
        if star {
            let fullname: EcoString = segments.join(".").into();
            return Ok(self.finish_import(start, fullname, "*".into()));
        }
        let simplename: EcoString =
            if matches!(self.current_kind(), TokenKind::Identifier(n) if n == "as") {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::Identifier(alias) | TokenKind::ConstantName(alias) => {
                        self.advance();
                        alias
                    }
                    _ => return Err(self.unexpected("an import alias")),
                }
            } else {
                segments.last().map(String::as_str).unwrap_or("").into()
            };
        let fullname: EcoString = segments.join(".").into();
        Ok(self.finish_import(start, fullname, simplename))
    }

    fn finish_import(&mut self, start: Span, fullname: EcoString, simplename: EcoString) -> NodeId {
        let span = self.spanned(start);
        let fullname = self.simple_string(fullname, span);
        let simplename = self.simple_string(simplename, span);
        self.detach(fullname);
        self.detach(simplename);
        self.add(
            NodeKind::Import {
                fullname,
                simplename,
            },
            span,
        )
    }

    /// Dotted word segments; returns the joined path. Stops before a
    /// trailing `.*`, reporting it through the flag.
    fn parse_import_path(&mut self) -> Result<(Vec<String>, bool), SyntaxError> {
        let mut segments = Vec::new();
        loop {
            match self.current_kind().clone() {
                TokenKind::Identifier(name) | TokenKind::ConstantName(name) => {
                    self.advance();
                    segments.push(name.to_string());
                }
                _ => return Err(self.unexpected("an import path")),
            }
            if !self.check(&TokenKind::Dot) {
                return Ok((segments, false));
            }
            self.advance();
            if matches!(self.current_kind(), TokenKind::BinaryOp(op) if op == "*") {
                self.advance();
                return Ok((segments, true));
            }
        }
    }

    fn parse_dotted_path(&mut self) -> Result<(EcoString, Span), SyntaxError> {
        let start = self.current_span();
        let mut path = String::new();
        loop {
            match self.current_kind().clone() {
                TokenKind::Identifier(name) | TokenKind::ConstantName(name) => {
                    self.advance();
                    path.push_str(&name);
                }
                _ => return Err(self.unexpected("a package name")),
            }
            if self.check(&TokenKind::Dot)
                && matches!(
                    self.peek_kind(),
                    Some(TokenKind::Identifier(_) | TokenKind::ConstantName(_))
                )
            {
                self.advance();
                path.push('.');
            } else {
                return Ok((path.into(), start.merge(self.prev_span())));
            }
        }
    }

    // ========================================================================
    // Annotations and type references
    // ========================================================================

    /// `$Type`, `$Type[Value, ...]`, `$Type[key: Value, ...]`. Positional
    /// values collect under the implicit `value` key, several of them as an
    /// array.
    pub(super) fn parse_annotation(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.current_span();
        self.expect(&TokenKind::Dollar, "`$`")?;
        let type_ref = self.parse_type_name(true)?;

        let mut entries = Vec::new();
        if self.check(&TokenKind::LBracket) && self.glued() {
            self.advance();
            let mut positional = Vec::new();
            while !self.check(&TokenKind::RBracket) {
                if self.at_assoc_shorthand() {
                    entries.push(self.parse_assoc_entry()?);
                } else {
                    positional.push(self.parse_expression()?);
                }
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBracket, "`]`")?;
            if !positional.is_empty() {
                let span = self
                    .node_span(positional[0])
                    .merge(self.node_span(positional[positional.len() - 1]));
                let value = if positional.len() == 1 {
                    positional[0]
                } else {
                    let values = self.node_list(positional, span);
                    self.add(NodeKind::Array { values }, span)
                };
                let key = self.simple_string("value", span);
                self.detach(key);
                self.detach(value);
                entries.push(self.add(NodeKind::HashEntry { key, value }, span));
            }
        }

        let span = self.spanned(start);
        for &e in &entries {
            self.detach(e);
        }
        let values = self.add(NodeKind::HashEntryList { children: entries }, span);
        self.detach(type_ref);
        Ok(self.add(NodeKind::Annotation { type_ref, values }, span))
    }

    /// A type name for `implements` clauses and rescue filters.
    pub(super) fn parse_constant_path(&mut self) -> Result<NodeId, SyntaxError> {
        self.parse_type_name(true)
    }

    /// A (possibly qualified) type reference. Segments always join across
    /// `::`; `.` joins only where `dots` allows it, since a `.` after a
    /// cast type is a method call on the cast result. A glued `[]` suffix
    /// flattens the whole path into an array type reference.
    pub(super) fn parse_type_name(&mut self, dots: bool) -> Result<NodeId, SyntaxError> {
        if self.check(&TokenKind::Backtick) {
            return self.parse_unquote();
        }
        let mut segments: Vec<(EcoString, Span)> = Vec::new();
        let start = self.current_span();
        loop {
            let span = self.current_span();
            match self.current_kind().clone() {
                TokenKind::Identifier(name) | TokenKind::ConstantName(name) => {
                    self.advance();
                    segments.push((name, span));
                }
                _ => return Err(self.unexpected("a type name")),
            }
            let joined = match self.current_kind() {
                TokenKind::ColonColon => true,
                TokenKind::Dot if dots => true,
                _ => false,
            };
            let next_is_word = matches!(
                self.peek_kind(),
                Some(TokenKind::Identifier(_) | TokenKind::ConstantName(_))
            );
            if joined && next_is_word {
                self.advance();
            } else {
                break;
            }
        }

        if self.check(&TokenKind::LBracket)
            && self.glued()
            && matches!(self.peek_kind(), Some(TokenKind::RBracket))
        {
            self.advance();
            self.advance();
            let name: EcoString = segments
                .iter()
                .map(|(s, _)| s.as_str())
                .collect::<Vec<_>>()
                .join(".")
                .into();
            return Ok(self.add(
                NodeKind::TypeRefImpl {
                    name,
                    is_array: true,
                    is_static: false,
                },
                start.merge(self.prev_span()),
            ));
        }

        let mut iter = segments.into_iter();
        let (first, first_span) = iter.next().expect("at least one segment");
        let name = self.simple_string(first, first_span);
        self.detach(name);
        let mut node = self.add(NodeKind::Constant { name }, first_span);
        for (segment, span) in iter {
            let name = self.simple_string(segment.clone(), span);
            self.detach(name);
            let constant = self.add(NodeKind::Constant { name }, span);
            self.detach(node);
            self.detach(constant);
            node = self.add(
                NodeKind::Colon2 {
                    base: node,
                    name: constant,
                },
                start.merge(span),
            );
        }
        Ok(node)
    }

    // ========================================================================
    // Decoration lists
    // ========================================================================

    pub(super) fn annotation_list(&mut self, annotations: Vec<NodeId>, span: Span) -> NodeId {
        for &a in &annotations {
            self.detach(a);
        }
        self.add(
            NodeKind::AnnotationList {
                children: annotations,
            },
            span,
        )
    }

    pub(super) fn modifier_list(&mut self, modifiers: Vec<NodeId>, span: Span) -> NodeId {
        for &m in &modifiers {
            self.detach(m);
        }
        self.add(
            NodeKind::ModifierList {
                children: modifiers,
            },
            span,
        )
    }
}
