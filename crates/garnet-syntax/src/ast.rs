// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Abstract syntax tree for Garnet.
//!
//! The tree is an arena: nodes live in a `Vec` inside [`Ast`] and refer to
//! each other through stable [`NodeId`] indices, including the parent
//! back-reference every node carries. Index-based parents sidestep the
//! reference-cycle problems a pointer-based design would have: cloning a
//! whole tree is a plain `Vec` clone, cloning a subtree is copy-and-remap,
//! and replacing a child is a single slot rewrite in the parent.
//!
//! Sequence containers ([`NodeKind::NodeList`] and the named list kinds)
//! are nodes themselves, with their own positions and parent links, so
//! traversal treats them uniformly with scalar nodes.
//!
//! # Invariants
//!
//! - The root (a `Script`) has no parent; every other *attached* node is
//!   referenced by exactly one child slot of its parent.
//! - Detached subtrees (clone results, replaced-out children) keep their
//!   internal consistency; only their root's parent is unset.
//! - Structural equality ignores positions and parents.

use std::collections::HashMap;
use std::sync::Arc;

use ecow::EcoString;

use crate::source_analysis::{SourceUnit, Span};

/// A line/column range within a [`SourceUnit`].
///
/// Lines and columns are 1-based; the end is exclusive. Byte offsets are
/// kept alongside so the covered text can be recovered.
#[derive(Debug, Clone)]
pub struct Position {
    source: Arc<SourceUnit>,
    span: Span,
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

impl Position {
    /// Creates a position. Use [`SourceUnit::position`] rather than calling
    /// this directly.
    #[must_use]
    pub fn new(
        source: Arc<SourceUnit>,
        span: Span,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        debug_assert!((start_line, start_column) <= (end_line, end_column));
        Self {
            source,
            span,
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// The unit this position was measured against.
    #[must_use]
    pub fn source(&self) -> &Arc<SourceUnit> {
        &self.source
    }

    /// The byte-offset span.
    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    /// 1-based start line.
    #[must_use]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// 1-based start column.
    #[must_use]
    pub fn start_column(&self) -> u32 {
        self.start_column
    }

    /// 1-based end line.
    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// 1-based end column (exclusive).
    #[must_use]
    pub fn end_column(&self) -> u32 {
        self.end_column
    }

    /// Start byte offset.
    #[must_use]
    pub fn start_char(&self) -> u32 {
        self.span.start()
    }

    /// End byte offset (exclusive).
    #[must_use]
    pub fn end_char(&self) -> u32 {
        self.span.end()
    }

    /// The source text this position covers.
    #[must_use]
    pub fn text(&self) -> &str {
        self.source.slice(self.span)
    }

    /// A position covering both `self` and `other` (same unit assumed).
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let (start_line, start_column) = std::cmp::min(
            (self.start_line, self.start_column),
            (other.start_line, other.start_column),
        );
        let (end_line, end_column) = std::cmp::max(
            (self.end_line, self.end_column),
            (other.end_line, other.end_column),
        );
        Self {
            source: Arc::clone(&self.source),
            span: self.span.merge(other.span),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source.name(),
            self.start_line,
            self.start_column
        )
    }
}

/// A stable index of a node within its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node: a kind with child slots, a parent back-reference, and a
/// position.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub position: Position,
}

/// The closed set of node kinds. Child slots hold [`NodeId`]s into the
/// owning arena; optional slots are `Option<NodeId>`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The root container: a statement sequence.
    Script { body: NodeId },

    // === Sequence containers ===
    /// A generic ordered node sequence (statement lists, argument lists).
    NodeList { children: Vec<NodeId> },
    /// Pieces of a string concatenation or regex pattern.
    StringPieceList { children: Vec<NodeId> },
    /// Type names (interface lists, rescue type filters).
    TypeNameList { children: Vec<NodeId> },
    /// The rescue clauses of an exception handler.
    RescueClauseList { children: Vec<NodeId> },
    /// Name/value entries of an annotation.
    HashEntryList { children: Vec<NodeId> },
    /// Declaration modifiers.
    ModifierList { children: Vec<NodeId> },
    /// Declaration annotations.
    AnnotationList { children: Vec<NodeId> },
    /// Required parameters (before or after the rest parameter).
    RequiredArgumentList { children: Vec<NodeId> },
    /// Default-valued parameters.
    OptionalArgumentList { children: Vec<NodeId> },

    // === Literals ===
    Fixnum { value: i64 },
    Float { value: f64 },
    Boolean { value: bool },
    Null,
    /// The value of a bare `return`.
    ImplicitNil,
    SelfRef,
    CharLiteral { value: u32 },
    SimpleString { value: EcoString },
    /// A string with interpolation: a `StringPieceList` of literal pieces
    /// and `StringEval` pieces in source order.
    StringConcat { pieces: NodeId },
    /// An evaluated string piece: either a `NodeList` of re-parsed
    /// statements (`#{...}`) or a `FieldAccess` (`#@x`).
    StringEval { value: NodeId },
    Regex { pieces: NodeId, flags: NodeId },
    Array { values: NodeId },
    /// A hash literal; entries are direct children.
    Hash { entries: Vec<NodeId> },
    HashEntry { key: NodeId, value: NodeId },

    // === References and calls ===
    /// A bare lowercase name: a zero-argument implicit call.
    VCall { name: NodeId },
    /// A zero-receiver call with arguments and/or a block.
    FunctionalCall {
        name: NodeId,
        args: NodeId,
        block: Option<NodeId>,
    },
    /// A receiver-qualified call. Element reads are calls named `[]`.
    Call {
        target: NodeId,
        name: NodeId,
        args: NodeId,
        block: Option<NodeId>,
    },
    Constant { name: NodeId },
    /// Qualified name: `base::Name` / `base.Name` in type positions.
    Colon2 { base: NodeId, name: NodeId },
    /// Top-level qualified root: `::Name`.
    Colon3 { name: NodeId },
    FieldAccess { name: NodeId, is_static: bool },
    /// A read of a known local (only produced by desugaring).
    LocalAccess { name: NodeId },
    Super { args: NodeId, block: Option<NodeId> },
    /// `super` with neither arguments nor parentheses.
    ZSuper,
    Yield { args: NodeId },
    /// `&expr` in an argument list.
    BlockPass { value: NodeId },
    Block {
        arguments: Option<NodeId>,
        body: NodeId,
    },

    // === Assignments ===
    LocalAssignment {
        name: NodeId,
        value: NodeId,
        type_ref: Option<NodeId>,
    },
    ConstantAssign {
        name: NodeId,
        value: NodeId,
        annotations: NodeId,
        modifiers: NodeId,
        type_ref: Option<NodeId>,
    },
    FieldAssign {
        name: NodeId,
        value: NodeId,
        annotations: NodeId,
        modifiers: NodeId,
        type_ref: Option<NodeId>,
        is_static: bool,
    },
    ElemAssign {
        target: NodeId,
        args: NodeId,
        value: NodeId,
    },
    AttrAssign {
        target: NodeId,
        name: NodeId,
        value: NodeId,
    },
    /// Assignment to a quasiquoted target: `` `a` = b ``.
    UnquoteAssign { unquote: NodeId, value: NodeId },

    // === Control flow ===
    If {
        condition: NodeId,
        body: NodeId,
        else_body: NodeId,
    },
    Loop {
        init: NodeId,
        condition: NodeId,
        pre: NodeId,
        body: NodeId,
        post: NodeId,
        skip_first_check: bool,
        negative: bool,
    },
    Not { value: NodeId },
    Case {
        condition: Option<NodeId>,
        clauses: NodeId,
        else_body: NodeId,
    },
    WhenClause { candidates: NodeId, body: NodeId },
    Rescue {
        body: NodeId,
        clauses: NodeId,
        else_body: NodeId,
    },
    RescueClause {
        types: NodeId,
        name: Option<NodeId>,
        body: NodeId,
    },
    Ensure { body: NodeId, ensure_body: NodeId },
    Return { value: NodeId },
    Break,
    Next,
    Redo,
    Raise { args: NodeId },

    // === Declarations ===
    MethodDefinition {
        name: NodeId,
        arguments: NodeId,
        return_type: Option<NodeId>,
        body: NodeId,
        annotations: NodeId,
        modifiers: NodeId,
        java_doc: Option<EcoString>,
        is_static: bool,
    },
    MacroDefinition {
        name: NodeId,
        arguments: Option<NodeId>,
        body: NodeId,
        java_doc: Option<EcoString>,
    },
    ClassDefinition {
        name: NodeId,
        superclass: Option<NodeId>,
        body: NodeId,
        interfaces: NodeId,
        annotations: NodeId,
        modifiers: NodeId,
        java_doc: Option<EcoString>,
    },
    InterfaceDeclaration {
        name: NodeId,
        superclass: Option<NodeId>,
        body: NodeId,
        interfaces: NodeId,
        annotations: NodeId,
        modifiers: NodeId,
        java_doc: Option<EcoString>,
    },
    /// `class << self` singleton-class body.
    ClassAppendSelf { body: NodeId },
    Package { name: NodeId, body: Option<NodeId> },
    Import { fullname: NodeId, simplename: NodeId },

    // === Macros ===
    Unquote { value: NodeId },

    // === Decoration ===
    Modifier { value: EcoString },
    Annotation { type_ref: NodeId, values: NodeId },
    JavaDoc { value: EcoString },

    // === Types ===
    /// A flattened type reference (`String[]` -> name `String`, array).
    TypeRefImpl {
        name: EcoString,
        is_array: bool,
        is_static: bool,
    },
    Cast { type_ref: NodeId, value: NodeId },

    // === Parameter lists ===
    Arguments {
        required: NodeId,
        optional: NodeId,
        rest: Option<NodeId>,
        required2: NodeId,
        block: Option<NodeId>,
    },
    RequiredArgument {
        name: NodeId,
        type_ref: Option<NodeId>,
        annotations: NodeId,
    },
    OptionalArgument {
        name: NodeId,
        type_ref: Option<NodeId>,
        value: NodeId,
        annotations: NodeId,
    },
    RestArgument {
        name: Option<NodeId>,
        type_ref: Option<NodeId>,
        annotations: NodeId,
    },
    BlockArgument {
        name: NodeId,
        type_ref: Option<NodeId>,
        optional: bool,
    },
}

impl NodeKind {
    /// The kind name used by diagnostics and the tree printer.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Script { .. } => "Script",
            Self::NodeList { .. } => "NodeList",
            Self::StringPieceList { .. } => "StringPieceList",
            Self::TypeNameList { .. } => "TypeNameList",
            Self::RescueClauseList { .. } => "RescueClauseList",
            Self::HashEntryList { .. } => "HashEntryList",
            Self::ModifierList { .. } => "ModifierList",
            Self::AnnotationList { .. } => "AnnotationList",
            Self::RequiredArgumentList { .. } => "RequiredArgumentList",
            Self::OptionalArgumentList { .. } => "OptionalArgumentList",
            Self::Fixnum { .. } => "Fixnum",
            Self::Float { .. } => "Float",
            Self::Boolean { .. } => "Boolean",
            Self::Null => "Null",
            Self::ImplicitNil => "ImplicitNil",
            Self::SelfRef => "Self",
            Self::CharLiteral { .. } => "CharLiteral",
            Self::SimpleString { .. } => "SimpleString",
            Self::StringConcat { .. } => "StringConcat",
            Self::StringEval { .. } => "StringEval",
            Self::Regex { .. } => "Regex",
            Self::Array { .. } => "Array",
            Self::Hash { .. } => "Hash",
            Self::HashEntry { .. } => "HashEntry",
            Self::VCall { .. } => "VCall",
            Self::FunctionalCall { .. } => "FunctionalCall",
            Self::Call { .. } => "Call",
            Self::Constant { .. } => "Constant",
            Self::Colon2 { .. } => "Colon2",
            Self::Colon3 { .. } => "Colon3",
            Self::FieldAccess { .. } => "FieldAccess",
            Self::LocalAccess { .. } => "LocalAccess",
            Self::Super { .. } => "Super",
            Self::ZSuper => "ZSuper",
            Self::Yield { .. } => "Yield",
            Self::BlockPass { .. } => "BlockPass",
            Self::Block { .. } => "Block",
            Self::LocalAssignment { .. } => "LocalAssignment",
            Self::ConstantAssign { .. } => "ConstantAssign",
            Self::FieldAssign { .. } => "FieldAssign",
            Self::ElemAssign { .. } => "ElemAssign",
            Self::AttrAssign { .. } => "AttrAssign",
            Self::UnquoteAssign { .. } => "UnquoteAssign",
            Self::If { .. } => "If",
            Self::Loop { .. } => "Loop",
            Self::Not { .. } => "Not",
            Self::Case { .. } => "Case",
            Self::WhenClause { .. } => "WhenClause",
            Self::Rescue { .. } => "Rescue",
            Self::RescueClause { .. } => "RescueClause",
            Self::Ensure { .. } => "Ensure",
            Self::Return { .. } => "Return",
            Self::Break => "Break",
            Self::Next => "Next",
            Self::Redo => "Redo",
            Self::Raise { .. } => "Raise",
            Self::MethodDefinition { is_static, .. } => {
                if *is_static {
                    "StaticMethodDefinition"
                } else {
                    "MethodDefinition"
                }
            }
            Self::MacroDefinition { .. } => "MacroDefinition",
            Self::ClassDefinition { .. } => "ClassDefinition",
            Self::InterfaceDeclaration { .. } => "InterfaceDeclaration",
            Self::ClassAppendSelf { .. } => "ClassAppendSelf",
            Self::Package { .. } => "Package",
            Self::Import { .. } => "Import",
            Self::Unquote { .. } => "Unquote",
            Self::Modifier { .. } => "Modifier",
            Self::Annotation { .. } => "Annotation",
            Self::JavaDoc { .. } => "JavaDoc",
            Self::TypeRefImpl { .. } => "TypeRefImpl",
            Self::Cast { .. } => "Cast",
            Self::Arguments { .. } => "Arguments",
            Self::RequiredArgument { .. } => "RequiredArgument",
            Self::OptionalArgument { .. } => "OptionalArgument",
            Self::RestArgument { .. } => "RestArgument",
            Self::BlockArgument { .. } => "BlockArgument",
        }
    }

    /// The node's child slots in declaration order. `None` marks an absent
    /// optional slot (traversal reports these to scanners).
    #[must_use]
    pub fn children(&self) -> Vec<Option<NodeId>> {
        fn all(children: &[NodeId]) -> Vec<Option<NodeId>> {
            children.iter().copied().map(Some).collect()
        }
        match self {
            Self::Script { body } => vec![Some(*body)],
            Self::NodeList { children }
            | Self::StringPieceList { children }
            | Self::TypeNameList { children }
            | Self::RescueClauseList { children }
            | Self::HashEntryList { children }
            | Self::ModifierList { children }
            | Self::AnnotationList { children }
            | Self::RequiredArgumentList { children }
            | Self::OptionalArgumentList { children } => all(children),
            Self::Fixnum { .. }
            | Self::Float { .. }
            | Self::Boolean { .. }
            | Self::Null
            | Self::ImplicitNil
            | Self::SelfRef
            | Self::CharLiteral { .. }
            | Self::SimpleString { .. }
            | Self::ZSuper
            | Self::Break
            | Self::Next
            | Self::Redo
            | Self::Modifier { .. }
            | Self::JavaDoc { .. }
            | Self::TypeRefImpl { .. } => Vec::new(),
            Self::StringConcat { pieces } => vec![Some(*pieces)],
            Self::StringEval { value } | Self::Not { value } | Self::BlockPass { value } => {
                vec![Some(*value)]
            }
            Self::Regex { pieces, flags } => vec![Some(*pieces), Some(*flags)],
            Self::Array { values } => vec![Some(*values)],
            Self::Hash { entries } => all(entries),
            Self::HashEntry { key, value } => vec![Some(*key), Some(*value)],
            Self::VCall { name }
            | Self::Constant { name }
            | Self::Colon3 { name }
            | Self::FieldAccess { name, .. }
            | Self::LocalAccess { name } => vec![Some(*name)],
            Self::FunctionalCall { name, args, block } => vec![Some(*name), Some(*args), *block],
            Self::Call {
                target,
                name,
                args,
                block,
            } => vec![Some(*target), Some(*name), Some(*args), *block],
            Self::Colon2 { base, name } => vec![Some(*base), Some(*name)],
            Self::Super { args, block } => vec![Some(*args), *block],
            Self::Yield { args } | Self::Raise { args } => vec![Some(*args)],
            Self::Block { arguments, body } => vec![*arguments, Some(*body)],
            Self::LocalAssignment {
                name,
                value,
                type_ref,
            } => vec![Some(*name), Some(*value), *type_ref],
            Self::ConstantAssign {
                name,
                value,
                annotations,
                modifiers,
                type_ref,
            }
            | Self::FieldAssign {
                name,
                value,
                annotations,
                modifiers,
                type_ref,
                ..
            } => vec![
                Some(*name),
                Some(*value),
                Some(*annotations),
                Some(*modifiers),
                *type_ref,
            ],
            Self::ElemAssign {
                target,
                args,
                value,
            } => vec![Some(*target), Some(*args), Some(*value)],
            Self::AttrAssign {
                target,
                name,
                value,
            } => vec![Some(*target), Some(*name), Some(*value)],
            Self::UnquoteAssign { unquote, value } => vec![Some(*unquote), Some(*value)],
            Self::If {
                condition,
                body,
                else_body,
            } => vec![Some(*condition), Some(*body), Some(*else_body)],
            Self::Loop {
                init,
                condition,
                pre,
                body,
                post,
                ..
            } => vec![
                Some(*init),
                Some(*condition),
                Some(*pre),
                Some(*body),
                Some(*post),
            ],
            Self::Case {
                condition,
                clauses,
                else_body,
            } => vec![*condition, Some(*clauses), Some(*else_body)],
            Self::WhenClause { candidates, body } => vec![Some(*candidates), Some(*body)],
            Self::Rescue {
                body,
                clauses,
                else_body,
            } => vec![Some(*body), Some(*clauses), Some(*else_body)],
            Self::RescueClause { types, name, body } => vec![Some(*types), *name, Some(*body)],
            Self::Ensure { body, ensure_body } => vec![Some(*body), Some(*ensure_body)],
            Self::Return { value } => vec![Some(*value)],
            Self::MethodDefinition {
                name,
                arguments,
                return_type,
                body,
                annotations,
                modifiers,
                ..
            } => vec![
                Some(*name),
                Some(*arguments),
                *return_type,
                Some(*body),
                Some(*annotations),
                Some(*modifiers),
            ],
            Self::MacroDefinition {
                name,
                arguments,
                body,
                ..
            } => vec![Some(*name), *arguments, Some(*body)],
            Self::ClassDefinition {
                name,
                superclass,
                body,
                interfaces,
                annotations,
                modifiers,
                ..
            }
            | Self::InterfaceDeclaration {
                name,
                superclass,
                body,
                interfaces,
                annotations,
                modifiers,
                ..
            } => vec![
                Some(*name),
                *superclass,
                Some(*body),
                Some(*interfaces),
                Some(*annotations),
                Some(*modifiers),
            ],
            Self::ClassAppendSelf { body } => vec![Some(*body)],
            Self::Package { name, body } => vec![Some(*name), *body],
            Self::Import {
                fullname,
                simplename,
            } => vec![Some(*fullname), Some(*simplename)],
            Self::Unquote { value } => vec![Some(*value)],
            Self::Annotation { type_ref, values } => vec![Some(*type_ref), Some(*values)],
            Self::Cast { type_ref, value } => vec![Some(*type_ref), Some(*value)],
            Self::Arguments {
                required,
                optional,
                rest,
                required2,
                block,
            } => vec![Some(*required), Some(*optional), *rest, Some(*required2), *block],
            Self::RequiredArgument {
                name,
                type_ref,
                annotations,
            } => vec![Some(*name), *type_ref, Some(*annotations)],
            Self::OptionalArgument {
                name,
                type_ref,
                value,
                annotations,
            } => vec![Some(*name), *type_ref, Some(*value), Some(*annotations)],
            Self::RestArgument {
                name,
                type_ref,
                annotations,
            } => vec![*name, *type_ref, Some(*annotations)],
            Self::BlockArgument { name, type_ref, .. } => vec![Some(*name), *type_ref],
        }
    }

    /// Calls `f` on every present child slot, allowing index rewrites.
    pub fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut NodeId)) {
        match self {
            Self::Script { body } => f(body),
            Self::NodeList { children }
            | Self::StringPieceList { children }
            | Self::TypeNameList { children }
            | Self::RescueClauseList { children }
            | Self::HashEntryList { children }
            | Self::ModifierList { children }
            | Self::AnnotationList { children }
            | Self::RequiredArgumentList { children }
            | Self::OptionalArgumentList { children } => children.iter_mut().for_each(f),
            Self::Fixnum { .. }
            | Self::Float { .. }
            | Self::Boolean { .. }
            | Self::Null
            | Self::ImplicitNil
            | Self::SelfRef
            | Self::CharLiteral { .. }
            | Self::SimpleString { .. }
            | Self::ZSuper
            | Self::Break
            | Self::Next
            | Self::Redo
            | Self::Modifier { .. }
            | Self::JavaDoc { .. }
            | Self::TypeRefImpl { .. } => {}
            Self::StringConcat { pieces } => f(pieces),
            Self::StringEval { value } | Self::Not { value } | Self::BlockPass { value } => {
                f(value);
            }
            Self::Regex { pieces, flags } => {
                f(pieces);
                f(flags);
            }
            Self::Array { values } => f(values),
            Self::Hash { entries } => entries.iter_mut().for_each(f),
            Self::HashEntry { key, value } => {
                f(key);
                f(value);
            }
            Self::VCall { name }
            | Self::Constant { name }
            | Self::Colon3 { name }
            | Self::FieldAccess { name, .. }
            | Self::LocalAccess { name } => f(name),
            Self::FunctionalCall { name, args, block } => {
                f(name);
                f(args);
                if let Some(b) = block {
                    f(b);
                }
            }
            Self::Call {
                target,
                name,
                args,
                block,
            } => {
                f(target);
                f(name);
                f(args);
                if let Some(b) = block {
                    f(b);
                }
            }
            Self::Colon2 { base, name } => {
                f(base);
                f(name);
            }
            Self::Super { args, block } => {
                f(args);
                if let Some(b) = block {
                    f(b);
                }
            }
            Self::Yield { args } | Self::Raise { args } => f(args),
            Self::Block { arguments, body } => {
                if let Some(a) = arguments {
                    f(a);
                }
                f(body);
            }
            Self::LocalAssignment {
                name,
                value,
                type_ref,
            } => {
                f(name);
                f(value);
                if let Some(t) = type_ref {
                    f(t);
                }
            }
            Self::ConstantAssign {
                name,
                value,
                annotations,
                modifiers,
                type_ref,
            }
            | Self::FieldAssign {
                name,
                value,
                annotations,
                modifiers,
                type_ref,
                ..
            } => {
                f(name);
                f(value);
                f(annotations);
                f(modifiers);
                if let Some(t) = type_ref {
                    f(t);
                }
            }
            Self::ElemAssign {
                target,
                args,
                value,
            } => {
                f(target);
                f(args);
                f(value);
            }
            Self::AttrAssign {
                target,
                name,
                value,
            } => {
                f(target);
                f(name);
                f(value);
            }
            Self::UnquoteAssign { unquote, value } => {
                f(unquote);
                f(value);
            }
            Self::If {
                condition,
                body,
                else_body,
            } => {
                f(condition);
                f(body);
                f(else_body);
            }
            Self::Loop {
                init,
                condition,
                pre,
                body,
                post,
                ..
            } => {
                f(init);
                f(condition);
                f(pre);
                f(body);
                f(post);
            }
            Self::Case {
                condition,
                clauses,
                else_body,
            } => {
                if let Some(c) = condition {
                    f(c);
                }
                f(clauses);
                f(else_body);
            }
            Self::WhenClause { candidates, body } => {
                f(candidates);
                f(body);
            }
            Self::Rescue {
                body,
                clauses,
                else_body,
            } => {
                f(body);
                f(clauses);
                f(else_body);
            }
            Self::RescueClause { types, name, body } => {
                f(types);
                if let Some(n) = name {
                    f(n);
                }
                f(body);
            }
            Self::Ensure { body, ensure_body } => {
                f(body);
                f(ensure_body);
            }
            Self::Return { value } => f(value),
            Self::MethodDefinition {
                name,
                arguments,
                return_type,
                body,
                annotations,
                modifiers,
                ..
            } => {
                f(name);
                f(arguments);
                if let Some(t) = return_type {
                    f(t);
                }
                f(body);
                f(annotations);
                f(modifiers);
            }
            Self::MacroDefinition {
                name,
                arguments,
                body,
                ..
            } => {
                f(name);
                if let Some(a) = arguments {
                    f(a);
                }
                f(body);
            }
            Self::ClassDefinition {
                name,
                superclass,
                body,
                interfaces,
                annotations,
                modifiers,
                ..
            }
            | Self::InterfaceDeclaration {
                name,
                superclass,
                body,
                interfaces,
                annotations,
                modifiers,
                ..
            } => {
                f(name);
                if let Some(s) = superclass {
                    f(s);
                }
                f(body);
                f(interfaces);
                f(annotations);
                f(modifiers);
            }
            Self::ClassAppendSelf { body } => f(body),
            Self::Package { name, body } => {
                f(name);
                if let Some(b) = body {
                    f(b);
                }
            }
            Self::Import {
                fullname,
                simplename,
            } => {
                f(fullname);
                f(simplename);
            }
            Self::Unquote { value } => f(value),
            Self::Annotation { type_ref, values } => {
                f(type_ref);
                f(values);
            }
            Self::Cast { type_ref, value } => {
                f(type_ref);
                f(value);
            }
            Self::Arguments {
                required,
                optional,
                rest,
                required2,
                block,
            } => {
                f(required);
                f(optional);
                if let Some(r) = rest {
                    f(r);
                }
                f(required2);
                if let Some(b) = block {
                    f(b);
                }
            }
            Self::RequiredArgument {
                name,
                type_ref,
                annotations,
            } => {
                f(name);
                if let Some(t) = type_ref {
                    f(t);
                }
                f(annotations);
            }
            Self::OptionalArgument {
                name,
                type_ref,
                value,
                annotations,
            } => {
                f(name);
                if let Some(t) = type_ref {
                    f(t);
                }
                f(value);
                f(annotations);
            }
            Self::RestArgument {
                name,
                type_ref,
                annotations,
            } => {
                if let Some(n) = name {
                    f(n);
                }
                if let Some(t) = type_ref {
                    f(t);
                }
                f(annotations);
            }
            Self::BlockArgument { name, type_ref, .. } => {
                f(name);
                if let Some(t) = type_ref {
                    f(t);
                }
            }
        }
    }

    /// The attached documentation comment, for declaration kinds.
    #[must_use]
    pub fn java_doc(&self) -> Option<&str> {
        match self {
            Self::MethodDefinition { java_doc, .. }
            | Self::MacroDefinition { java_doc, .. }
            | Self::ClassDefinition { java_doc, .. }
            | Self::InterfaceDeclaration { java_doc, .. } => java_doc.as_deref(),
            _ => None,
        }
    }
}

/// An abstract syntax tree: an arena of nodes plus the root `Script`.
///
/// A whole-tree clone (`Clone`) yields an entirely new node graph, since
/// parent and child links are arena-relative indices.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    /// An empty arena; the root is set once the `Script` node exists.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        debug_assert!(self.nodes[root.index()].parent.is_none());
        self.root = root;
    }

    /// The root `Script` node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrows a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not an index of this arena.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Borrows a node mutably.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// The number of nodes in the arena (including detached ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the arena has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node, wiring the parent link of every child it references.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn add(&mut self, kind: NodeKind, position: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for slot in kind.children().into_iter().flatten() {
            debug_assert!(
                self.nodes[slot.index()].parent.is_none(),
                "child {slot} already has a parent"
            );
            self.nodes[slot.index()].parent = Some(id);
        }
        self.nodes.push(Node {
            kind,
            parent: None,
            position,
        });
        id
    }

    /// All node ids of the subtree rooted at `root`, in pre-order.
    #[must_use]
    pub fn subtree_ids(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.node(id).kind.children();
            for child in children.into_iter().rev().flatten() {
                stack.push(child);
            }
        }
        out
    }

    /// Deep-copies the subtree of `other` rooted at `root` into this arena.
    ///
    /// The copy shares no node identity with the source; its root comes
    /// back detached (no parent) and ready to be referenced by a new
    /// parent node.
    #[allow(clippy::cast_possible_truncation)]
    pub fn graft(&mut self, other: &Ast, root: NodeId) -> NodeId {
        let ids = other.subtree_ids(root);
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(ids.len());
        for &old in &ids {
            let new_id = NodeId(self.nodes.len() as u32);
            remap.insert(old, new_id);
            self.nodes.push(other.node(old).clone());
        }
        for &old in &ids {
            let new_id = remap[&old];
            let node = &mut self.nodes[new_id.index()];
            node.kind.for_each_child_mut(|child| {
                *child = remap[child];
            });
            node.parent = if old == root {
                None
            } else {
                node.parent.map(|p| remap[&p])
            };
        }
        remap[&root]
    }

    /// Clones the subtree rooted at `id` into a standalone tree whose root
    /// has no parent.
    #[must_use]
    pub fn clone_subtree(&self, id: NodeId) -> Ast {
        let mut out = Ast::new();
        let root = out.graft(self, id);
        out.root = root;
        out
    }

    /// Replaces attached child `old` with a copy of `replacement` taken
    /// from `donor` (which may be another tree).
    ///
    /// The copy lands in exactly the child slot `old` occupied, `old`'s
    /// parent becomes unset (its subtree stays internally consistent), and
    /// the returned id — a fresh node, never identity-equal to
    /// `replacement` — is the new child.
    ///
    /// # Panics
    ///
    /// Panics if `old` has no parent (the root cannot be replaced).
    pub fn replace_child_from(&mut self, old: NodeId, donor: &Ast, replacement: NodeId) -> NodeId {
        let parent = self
            .node(old)
            .parent
            .expect("replace_child requires an attached child");
        let new_id = self.graft(donor, replacement);
        self.nodes[parent.index()].kind.for_each_child_mut(|child| {
            if *child == old {
                *child = new_id;
            }
        });
        self.nodes[new_id.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
        new_id
    }

    /// Replaces attached child `old` with a copy of `replacement` from the
    /// same tree. See [`Ast::replace_child_from`].
    pub fn replace_child(&mut self, old: NodeId, replacement: NodeId) -> NodeId {
        let donor = self.clone_subtree(replacement);
        self.replace_child_from(old, &donor, donor.root())
    }

    /// Structural equality of two subtrees: kinds, payloads, and children
    /// must match recursively; positions and parents are ignored.
    #[must_use]
    pub fn structurally_eq(&self, a: NodeId, other: &Ast, b: NodeId) -> bool {
        let ka = normalized(&self.node(a).kind);
        let kb = normalized(&other.node(b).kind);
        if ka != kb {
            return false;
        }
        let ca = self.node(a).kind.children();
        let cb = other.node(b).kind.children();
        if ca.len() != cb.len() {
            return false;
        }
        ca.into_iter().zip(cb).all(|(x, y)| match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => self.structurally_eq(x, other, y),
            _ => false,
        })
    }

    /// The deterministic bracketed rendering used by diagnostics and tests.
    #[must_use]
    pub fn dump(&self) -> String {
        crate::ast_printer::print(self, self.root)
    }

    /// Renders the subtree rooted at `id`.
    #[must_use]
    pub fn dump_node(&self, id: NodeId) -> String {
        crate::ast_printer::print(self, id)
    }
}

/// A copy of `kind` with every child index zeroed, so payloads can be
/// compared without child identity getting in the way.
fn normalized(kind: &NodeKind) -> NodeKind {
    let mut copy = kind.clone();
    copy.for_each_child_mut(|child| *child = NodeId(0));
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{parse, ParserConfig, SourceUnit};

    fn parse_ok(source: &str) -> Ast {
        let unit = SourceUnit::new("test", source);
        parse(&unit, &ParserConfig::default()).expect("parse failed")
    }

    fn script_body(ast: &Ast) -> NodeId {
        match ast.node(ast.root()).kind {
            NodeKind::Script { body } => body,
            _ => panic!("root is not a Script"),
        }
    }

    fn body_stmt(ast: &Ast, i: usize) -> NodeId {
        match &ast.node(script_body(ast)).kind {
            NodeKind::NodeList { children } => children[i],
            _ => panic!("script body is not a NodeList"),
        }
    }

    /// Checks that every reachable child points back at its parent.
    fn check_parents(ast: &Ast, id: NodeId) {
        for child in ast.node(id).kind.children().into_iter().flatten() {
            assert_eq!(
                ast.node(child).parent,
                Some(id),
                "bad parent link for {child} under {id}"
            );
            check_parents(ast, child);
        }
    }

    #[test]
    fn parent_links_are_consistent() {
        let ast = parse_ok("if a then b else c end");
        assert_eq!(ast.node(ast.root()).parent, None);
        check_parents(&ast, ast.root());

        let body = script_body(&ast);
        assert_eq!(ast.node(body).parent, Some(ast.root()));
        let if_node = body_stmt(&ast, 0);
        match ast.node(if_node).kind {
            NodeKind::If {
                condition,
                body: then_body,
                else_body,
            } => {
                assert_eq!(ast.node(condition).parent, Some(if_node));
                assert_eq!(ast.node(then_body).parent, Some(if_node));
                assert_eq!(ast.node(else_body).parent, Some(if_node));
            }
            _ => panic!("expected If"),
        }
    }

    #[test]
    fn whole_tree_clone_is_detached_and_equal() {
        let ast = parse_ok("quote do\n  `map`.put(a, b)\nend");
        let copy = ast.clone();
        check_parents(&copy, copy.root());
        assert!(ast.structurally_eq(ast.root(), &copy, copy.root()));
        assert_eq!(ast.dump(), copy.dump());
    }

    #[test]
    fn subtree_clone_has_no_parent() {
        let ast = parse_ok("quote do\n  `map`.put(a, b)\nend");
        let stmt = body_stmt(&ast, 0);
        let sub = ast.clone_subtree(stmt);
        assert_eq!(sub.node(sub.root()).parent, None);
        check_parents(&sub, sub.root());
        assert!(ast.structurally_eq(stmt, &sub, sub.root()));
    }

    #[test]
    fn nested_clones_are_pairwise_distinct() {
        // Clone a tree containing a quasiquote escape, then clone a subtree
        // of the clone; all three stay structurally equal where they
        // overlap and share no node identity (separate arenas).
        let ast = parse_ok("`foo`");
        let copy = ast.clone();
        let stmt = body_stmt(&copy, 0);
        let inner = copy.clone_subtree(stmt);
        assert!(ast.structurally_eq(ast.root(), &copy, copy.root()));
        assert!(copy.structurally_eq(stmt, &inner, inner.root()));
        assert_eq!(inner.node(inner.root()).parent, None);
    }

    #[test]
    fn replace_child_swaps_slot_and_detaches_old() {
        let mut ast1 = parse_ok("`foo`");
        let ast2 = parse_ok("bar");
        let unquote = body_stmt(&ast1, 0);
        let call = body_stmt(&ast2, 0);

        let new_call = ast1.replace_child_from(unquote, &ast2, call);

        assert_eq!(body_stmt(&ast1, 0), new_call);
        assert_eq!(ast1.node(unquote).parent, None);
        assert!(ast1.structurally_eq(new_call, &ast2, call));
        assert_eq!(ast1.dump_node(new_call), ast2.dump_node(call));
        // The donor tree is untouched.
        assert_eq!(ast2.node(call).parent, Some(script_body(&ast2)));
        check_parents(&ast1, ast1.root());
    }

    #[test]
    fn replace_child_within_one_tree_clones() {
        let mut ast = parse_ok("`foo`; bar");
        let unquote = body_stmt(&ast, 0);
        let call = body_stmt(&ast, 1);

        let new_call = ast.replace_child(unquote, call);

        assert_ne!(new_call, call);
        assert!(ast.structurally_eq(new_call, &ast, call));
        assert_eq!(ast.node(unquote).parent, None);
        assert_eq!(ast.node(call).parent, Some(script_body(&ast)));
    }

    #[test]
    fn structural_eq_ignores_positions() {
        let a = parse_ok("foo(1, 2)");
        let b = parse_ok("  foo( 1,\\\n 2 )");
        assert!(a.structurally_eq(a.root(), &b, b.root()));
    }

    #[test]
    fn structural_eq_detects_differences() {
        let a = parse_ok("foo(1)");
        let b = parse_ok("foo(2)");
        let c = parse_ok("foo 1");
        assert!(!a.structurally_eq(a.root(), &b, b.root()));
        // Paren call and command call produce the same shape here.
        assert!(a.structurally_eq(a.root(), &c, c.root()));
    }

    #[test]
    fn cloned_arguments_can_diverge() {
        let ast1 = parse_ok("def foo(bar); end");
        let mut ast2 = parse_ok("def baz; end");
        let def1 = body_stmt(&ast1, 0);
        let def2 = body_stmt(&ast2, 0);
        let args1 = match ast1.node(def1).kind {
            NodeKind::MethodDefinition { arguments, .. } => arguments,
            _ => panic!("expected MethodDefinition"),
        };
        let args2 = match ast2.node(def2).kind {
            NodeKind::MethodDefinition { arguments, .. } => arguments,
            _ => panic!("expected MethodDefinition"),
        };

        let new_args = ast2.replace_child_from(args2, &ast1, args1);
        assert!(ast2.structurally_eq(new_args, &ast1, args1));
        // Mutating the copy leaves the original alone.
        let required2 = match ast2.node(new_args).kind {
            NodeKind::Arguments { required, .. } => required,
            _ => panic!("expected Arguments"),
        };
        match &mut ast2.node_mut(required2).kind {
            NodeKind::RequiredArgumentList { children } => children.clear(),
            _ => panic!("expected RequiredArgumentList"),
        }
        assert!(!ast2.structurally_eq(new_args, &ast1, args1));
    }
}
