// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Double-dispatch traversal over the AST.
//!
//! A [`Scanner`] gets an `enter`/`exit` pair per node kind plus a default
//! pair; `enter` returning `false` skips the node's children. Absent
//! optional child slots are reported through [`Scanner::enter_null_child`]
//! so printers can emit placeholders. Sequence containers have their own
//! hooks, letting visitors bracket list rendering distinctly from scalar
//! nodes.
//!
//! Traversal is deterministic: pre-order, children in slot-declaration
//! order. Scanners keep their own state; traversal never mutates the tree.

use crate::ast::{Ast, NodeId, NodeKind};

macro_rules! scanner_hooks {
    ($( $variant:ident => $enter:ident / $exit:ident ),* $(,)?) => {
        /// Per-kind enter/exit hooks with overridable defaults.
        ///
        /// Every kind-specific hook falls back to
        /// [`enter_default`](Scanner::enter_default) /
        /// [`exit_default`](Scanner::exit_default), so a scanner only
        /// overrides the kinds it cares about.
        pub trait Scanner {
            /// Called for kinds without a specific override. Returning
            /// `false` skips the node's children.
            fn enter_default(&mut self, ast: &Ast, node: NodeId) -> bool {
                let _ = (ast, node);
                true
            }

            /// Called after a node's children for kinds without a specific
            /// override.
            fn exit_default(&mut self, ast: &Ast, node: NodeId) {
                let _ = (ast, node);
            }

            /// Called for each absent optional child slot of `parent`.
            fn enter_null_child(&mut self, ast: &Ast, parent: NodeId) {
                let _ = (ast, parent);
            }

            $(
                fn $enter(&mut self, ast: &Ast, node: NodeId) -> bool {
                    self.enter_default(ast, node)
                }

                fn $exit(&mut self, ast: &Ast, node: NodeId) {
                    self.exit_default(ast, node)
                }
            )*
        }

        fn dispatch_enter<S: Scanner + ?Sized>(scanner: &mut S, ast: &Ast, node: NodeId) -> bool {
            match ast.node(node).kind {
                $( NodeKind::$variant { .. } => scanner.$enter(ast, node), )*
            }
        }

        fn dispatch_exit<S: Scanner + ?Sized>(scanner: &mut S, ast: &Ast, node: NodeId) {
            match ast.node(node).kind {
                $( NodeKind::$variant { .. } => scanner.$exit(ast, node), )*
            }
        }
    };
}

scanner_hooks! {
    Script => enter_script / exit_script,
    NodeList => enter_node_list / exit_node_list,
    StringPieceList => enter_string_piece_list / exit_string_piece_list,
    TypeNameList => enter_type_name_list / exit_type_name_list,
    RescueClauseList => enter_rescue_clause_list / exit_rescue_clause_list,
    HashEntryList => enter_hash_entry_list / exit_hash_entry_list,
    ModifierList => enter_modifier_list / exit_modifier_list,
    AnnotationList => enter_annotation_list / exit_annotation_list,
    RequiredArgumentList => enter_required_argument_list / exit_required_argument_list,
    OptionalArgumentList => enter_optional_argument_list / exit_optional_argument_list,
    Fixnum => enter_fixnum / exit_fixnum,
    Float => enter_float / exit_float,
    Boolean => enter_boolean / exit_boolean,
    Null => enter_null / exit_null,
    ImplicitNil => enter_implicit_nil / exit_implicit_nil,
    SelfRef => enter_self_ref / exit_self_ref,
    CharLiteral => enter_char_literal / exit_char_literal,
    SimpleString => enter_simple_string / exit_simple_string,
    StringConcat => enter_string_concat / exit_string_concat,
    StringEval => enter_string_eval / exit_string_eval,
    Regex => enter_regex / exit_regex,
    Array => enter_array / exit_array,
    Hash => enter_hash / exit_hash,
    HashEntry => enter_hash_entry / exit_hash_entry,
    VCall => enter_vcall / exit_vcall,
    FunctionalCall => enter_functional_call / exit_functional_call,
    Call => enter_call / exit_call,
    Constant => enter_constant / exit_constant,
    Colon2 => enter_colon2 / exit_colon2,
    Colon3 => enter_colon3 / exit_colon3,
    FieldAccess => enter_field_access / exit_field_access,
    LocalAccess => enter_local_access / exit_local_access,
    Super => enter_super / exit_super,
    ZSuper => enter_zsuper / exit_zsuper,
    Yield => enter_yield / exit_yield,
    BlockPass => enter_block_pass / exit_block_pass,
    Block => enter_block / exit_block,
    LocalAssignment => enter_local_assignment / exit_local_assignment,
    ConstantAssign => enter_constant_assign / exit_constant_assign,
    FieldAssign => enter_field_assign / exit_field_assign,
    ElemAssign => enter_elem_assign / exit_elem_assign,
    AttrAssign => enter_attr_assign / exit_attr_assign,
    UnquoteAssign => enter_unquote_assign / exit_unquote_assign,
    If => enter_if / exit_if,
    Loop => enter_loop / exit_loop,
    Not => enter_not / exit_not,
    Case => enter_case / exit_case,
    WhenClause => enter_when_clause / exit_when_clause,
    Rescue => enter_rescue / exit_rescue,
    RescueClause => enter_rescue_clause / exit_rescue_clause,
    Ensure => enter_ensure / exit_ensure,
    Return => enter_return / exit_return,
    Break => enter_break / exit_break,
    Next => enter_next / exit_next,
    Redo => enter_redo / exit_redo,
    Raise => enter_raise / exit_raise,
    MethodDefinition => enter_method_definition / exit_method_definition,
    MacroDefinition => enter_macro_definition / exit_macro_definition,
    ClassDefinition => enter_class_definition / exit_class_definition,
    InterfaceDeclaration => enter_interface_declaration / exit_interface_declaration,
    ClassAppendSelf => enter_class_append_self / exit_class_append_self,
    Package => enter_package / exit_package,
    Import => enter_import / exit_import,
    Unquote => enter_unquote / exit_unquote,
    Modifier => enter_modifier / exit_modifier,
    Annotation => enter_annotation / exit_annotation,
    JavaDoc => enter_java_doc / exit_java_doc,
    TypeRefImpl => enter_type_ref_impl / exit_type_ref_impl,
    Cast => enter_cast / exit_cast,
    Arguments => enter_arguments / exit_arguments,
    RequiredArgument => enter_required_argument / exit_required_argument,
    OptionalArgument => enter_optional_argument / exit_optional_argument,
    RestArgument => enter_rest_argument / exit_rest_argument,
    BlockArgument => enter_block_argument / exit_block_argument,
}

/// Scans the subtree rooted at `node`: enter, children left to right (with
/// null-slot notifications), exit. The exit hook fires even when enter
/// declined descent.
pub fn scan<S: Scanner + ?Sized>(ast: &Ast, node: NodeId, scanner: &mut S) {
    if dispatch_enter(scanner, ast, node) {
        for slot in ast.node(node).kind.children() {
            match slot {
                Some(child) => scan(ast, child, scanner),
                None => scanner.enter_null_child(ast, node),
            }
        }
    }
    dispatch_exit(scanner, ast, node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{parse, ParserConfig, SourceUnit};

    fn parse_ok(source: &str) -> Ast {
        let unit = SourceUnit::new("test", source);
        parse(&unit, &ParserConfig::default()).expect("parse failed")
    }

    #[derive(Default)]
    struct Counter {
        enters: usize,
        exits: usize,
        nulls: usize,
        fixnums: usize,
        lists: usize,
    }

    impl Scanner for Counter {
        fn enter_default(&mut self, _ast: &Ast, _node: NodeId) -> bool {
            self.enters += 1;
            true
        }

        fn exit_default(&mut self, _ast: &Ast, _node: NodeId) {
            self.exits += 1;
        }

        fn enter_null_child(&mut self, _ast: &Ast, _parent: NodeId) {
            self.nulls += 1;
        }

        fn enter_fixnum(&mut self, ast: &Ast, node: NodeId) -> bool {
            self.fixnums += 1;
            self.enter_default(ast, node)
        }

        fn enter_node_list(&mut self, ast: &Ast, node: NodeId) -> bool {
            self.lists += 1;
            self.enter_default(ast, node)
        }
    }

    #[test]
    fn visits_every_node_once() {
        let ast = parse_ok("1; 2; 3");
        let mut counter = Counter::default();
        scan(&ast, ast.root(), &mut counter);
        // Script + body list + three literals.
        assert_eq!(counter.enters, 5);
        assert_eq!(counter.exits, 5);
        assert_eq!(counter.fixnums, 3);
        assert_eq!(counter.lists, 1);
    }

    #[test]
    fn null_slots_are_reported() {
        // `a.foo` is a Call with an absent block slot.
        let ast = parse_ok("a.foo");
        let mut counter = Counter::default();
        scan(&ast, ast.root(), &mut counter);
        assert_eq!(counter.nulls, 1);
    }

    struct SkipBlocks {
        seen_inside_block: bool,
    }

    impl Scanner for SkipBlocks {
        fn enter_block(&mut self, _ast: &Ast, _node: NodeId) -> bool {
            false
        }

        fn enter_vcall(&mut self, _ast: &Ast, _node: NodeId) -> bool {
            self.seen_inside_block = true;
            true
        }
    }

    #[test]
    fn enter_false_skips_children() {
        let ast = parse_ok("foo { x }");
        let mut scanner = SkipBlocks {
            seen_inside_block: false,
        };
        scan(&ast, ast.root(), &mut scanner);
        assert!(!scanner.seen_inside_block);
    }

    #[test]
    fn traversal_order_is_source_order() {
        let ast = parse_ok("a; b");
        struct Names(Vec<String>);
        impl Scanner for Names {
            fn enter_simple_string(&mut self, ast: &Ast, node: NodeId) -> bool {
                if let crate::ast::NodeKind::SimpleString { value } = &ast.node(node).kind {
                    self.0.push(value.to_string());
                }
                true
            }
        }
        let mut names = Names(Vec::new());
        scan(&ast, ast.root(), &mut names);
        assert_eq!(names.0, ["a", "b"]);
    }
}
