// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Deterministic bracketed rendering of AST subtrees.
//!
//! The format is what tests and `ParserConfig::debug_parse_tree` rely on:
//! `[Kind, child, child]`, where a plain `NodeList` renders as a bare
//! `[...]`, absent optional slots render as `null`, value-carrying kinds
//! append their value after the kind name, and flag-carrying kinds append
//! their flags (`static`, `array`, `optional`, `skipFirstCheck`,
//! `negative`). Empty `AnnotationList` nodes are suppressed entirely so
//! undecorated declarations stay readable.
//!
//! The printer is an ordinary [`Scanner`], doubling as the reference
//! consumer of the traversal framework.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::ast_scanner::{scan, Scanner};

/// Renders the subtree rooted at `id`.
#[must_use]
pub fn print(ast: &Ast, id: NodeId) -> String {
    let mut printer = TreePrinter::new();
    scan(ast, id, &mut printer);
    printer.finish()
}

/// Renders the subtree rooted at `id` with `(line:col,line:col)` position
/// suffixes after each kind name.
#[must_use]
pub fn print_with_positions(ast: &Ast, id: NodeId) -> String {
    let mut printer = TreePrinter::new();
    printer.show_positions = true;
    scan(ast, id, &mut printer);
    printer.finish()
}

/// A [`Scanner`] accumulating the bracketed rendering.
pub struct TreePrinter {
    out: String,
    first: bool,
    /// Append `(startLine:startCol,endLine:endCol)` after kind names.
    pub show_positions: bool,
}

impl TreePrinter {
    /// Creates an empty printer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: String::new(),
            first: true,
            show_positions: false,
        }
    }

    /// The accumulated rendering.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }

    fn sep(&mut self) {
        if !self.first {
            self.out.push_str(", ");
        }
        self.first = false;
    }

    fn open(&mut self, ast: &Ast, node: NodeId) {
        self.sep();
        self.out.push('[');
        self.out.push_str(ast.node(node).kind.name());
        if self.show_positions {
            let pos = &ast.node(node).position;
            self.out.push_str(&format!(
                "({}:{},{}:{})",
                pos.start_line(),
                pos.start_column(),
                pos.end_line(),
                pos.end_column()
            ));
        }
    }

    fn is_empty_annotation_list(ast: &Ast, node: NodeId) -> bool {
        matches!(&ast.node(node).kind, NodeKind::AnnotationList { children } if children.is_empty())
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for TreePrinter {
    fn enter_default(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        true
    }

    fn exit_default(&mut self, _ast: &Ast, _node: NodeId) {
        self.first = false;
        self.out.push(']');
    }

    fn enter_null_child(&mut self, _ast: &Ast, _parent: NodeId) {
        self.out.push_str(", null");
    }

    fn enter_node_list(&mut self, _ast: &Ast, _node: NodeId) -> bool {
        self.sep();
        self.out.push('[');
        self.first = true;
        true
    }

    fn exit_node_list(&mut self, _ast: &Ast, _node: NodeId) {
        self.first = false;
        self.out.push(']');
    }

    fn enter_annotation_list(&mut self, ast: &Ast, node: NodeId) -> bool {
        if Self::is_empty_annotation_list(ast, node) {
            self.first = false;
            return false;
        }
        self.enter_default(ast, node)
    }

    fn exit_annotation_list(&mut self, ast: &Ast, node: NodeId) {
        if !Self::is_empty_annotation_list(ast, node) {
            self.exit_default(ast, node);
        }
    }

    fn enter_fixnum(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::Fixnum { value } = &ast.node(node).kind {
            self.out.push_str(&format!(", {value}"));
        }
        true
    }

    fn enter_float(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::Float { value } = &ast.node(node).kind {
            self.out.push_str(&format!(", {value:?}"));
        }
        true
    }

    fn enter_boolean(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::Boolean { value } = &ast.node(node).kind {
            self.out.push_str(&format!(", {value}"));
        }
        true
    }

    fn enter_char_literal(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::CharLiteral { value } = &ast.node(node).kind {
            self.out.push_str(&format!(", {value}"));
        }
        true
    }

    fn enter_simple_string(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::SimpleString { value } = &ast.node(node).kind {
            self.out.push_str(&format!(", {value}"));
        }
        true
    }

    fn enter_modifier(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.sep();
        self.out.push('[');
        self.out.push_str(ast.node(node).kind.name());
        if let NodeKind::Modifier { value } = &ast.node(node).kind {
            self.out.push(':');
            self.out.push_str(value);
        }
        true
    }

    fn enter_type_ref_impl(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::TypeRefImpl {
            name,
            is_array,
            is_static,
        } = &ast.node(node).kind
        {
            self.out.push_str(&format!(", {name}"));
            if *is_array {
                self.out.push_str(", array");
            }
            if *is_static {
                self.out.push_str(", static");
            }
        }
        true
    }

    fn enter_loop(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::Loop {
            skip_first_check,
            negative,
            ..
        } = &ast.node(node).kind
        {
            if *skip_first_check {
                self.out.push_str(", skipFirstCheck");
            }
            if *negative {
                self.out.push_str(", negative");
            }
        }
        true
    }

    fn enter_block_argument(&mut self, ast: &Ast, node: NodeId) -> bool {
        self.open(ast, node);
        if let NodeKind::BlockArgument { optional: true, .. } = &ast.node(node).kind {
            self.out.push_str(", optional");
        }
        true
    }

    fn exit_field_access(&mut self, ast: &Ast, node: NodeId) {
        if let NodeKind::FieldAccess {
            is_static: true, ..
        } = &ast.node(node).kind
        {
            self.out.push_str(", static");
        }
        self.exit_default(ast, node);
    }

    fn exit_field_assign(&mut self, ast: &Ast, node: NodeId) {
        if let NodeKind::FieldAssign {
            is_static: true, ..
        } = &ast.node(node).kind
        {
            self.out.push_str(", static");
        }
        self.exit_default(ast, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{parse, ParserConfig, SourceUnit};

    fn dump(source: &str) -> String {
        let unit = SourceUnit::new("test", source);
        parse(&unit, &ParserConfig::default())
            .expect("parse failed")
            .dump()
    }

    #[test]
    fn literals_render_with_values() {
        assert_eq!(dump("1"), "[Script, [[Fixnum, 1]]]");
        assert_eq!(dump("1.0"), "[Script, [[Float, 1.0]]]");
        assert_eq!(dump("true"), "[Script, [[Boolean, true]]]");
        assert_eq!(dump("nil"), "[Script, [[Null]]]");
    }

    #[test]
    fn null_slots_render() {
        assert_eq!(
            dump("a.foo"),
            "[Script, [[Call, [VCall, [SimpleString, a]], [SimpleString, foo], [], null]]]"
        );
    }

    #[test]
    fn static_flag_renders_after_children() {
        assert_eq!(
            dump("@@x"),
            "[Script, [[FieldAccess, [SimpleString, x], static]]]"
        );
    }

    #[test]
    fn positions_render_when_enabled() {
        let unit = SourceUnit::new("test", "a if b");
        let ast = parse(&unit, &ParserConfig::default()).expect("parse failed");
        let out = print_with_positions(&ast, ast.root());
        assert_eq!(
            out,
            "[Script(1:1,1:7), [[If(1:1,1:7), [VCall(1:6,1:7), [SimpleString(1:6,1:7), b]], \
             [[VCall(1:1,1:2), [SimpleString(1:1,1:2), a]]], []]]]"
        );
    }
}
