// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the parser.
//!
//! These use `proptest` to verify parser invariants over generated inputs:
//!
//! 1. **Parser never panics** — arbitrary input yields `Ok` or a single
//!    `SyntaxError`, never a crash
//! 2. **Error positions are in bounds** — a failure always points inside
//!    the input
//! 3. **Parsing is deterministic** — same input, same tree rendering
//! 4. **Valid fragments parse** — a corpus of known-good snippets succeeds
//! 5. **Parent links stay consistent** — every reachable child points back
//!    at its parent, and the root has none

use proptest::prelude::*;

use crate::ast::{Ast, NodeId};
use crate::source_analysis::{parse, ParserConfig, SourceUnit};

/// Known-good snippets drawn from the grammar's corners.
const VALID_SNIPPETS: &[&str] = &[
    "0xF",
    "a - 1",
    "a -1",
    "a -b+c",
    "x:A.y():B",
    "a &&= b",
    "a ||= foo bar",
    "a[1] -= 2",
    "if a then 1 else 2 end",
    "unless a; b; end",
    "while a do b end",
    "begin; 1; rescue A => e; 2; ensure; 3; end",
    "begin;a;end until b",
    "case foo; when a, b; c else d end",
    "for a in [1, 2]; a; end",
    "def foo(a, b=1, *c, d, &e):int; 1; end",
    "def self.<=>; end",
    "macro def foo(a); quote { `a`.bar }; end",
    "class A < B\nimplements C, D\ndef run; end\nend",
    "interface A < B, C do 1;end",
    "$Foo[value: Bar] @a = 1",
    "import java.util.ArrayList as AL",
    "package foo { 1 }",
    "puts \"a #@b #{c.d} e\"",
    "<<-EOS\n  text #{1 + 2}\nEOS\n",
    "/a#{b}c/iz",
    "x = { 'a' => 'b', c: d }",
    "do_call curly_call {cb} do;db;end",
    "`a` = b",
    "a ? b : c",
    "return -1 if x",
];

fn valid_snippet() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_SNIPPETS).prop_map(std::string::ToString::to_string)
}

fn try_parse(source: &str) -> Result<Ast, crate::source_analysis::SyntaxError> {
    let unit = SourceUnit::new("prop", source);
    parse(&unit, &ParserConfig::default())
}

/// Checks that every reachable child points back at its parent.
fn check_parents(ast: &Ast, id: NodeId) {
    for child in ast.node(id).kind.children().into_iter().flatten() {
        assert_eq!(ast.node(child).parent, Some(id));
        check_parents(ast, child);
    }
}

/// Default is 512 cases; override via `PROPTEST_CASES` for nightly runs.
fn proptest_config() -> ProptestConfig {
    let default = ProptestConfig::default();
    ProptestConfig {
        cases: default.cases.max(512),
        ..default
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Property 1: the parser never panics on arbitrary input.
    #[test]
    fn parser_never_panics(input in "\\PC{0,300}") {
        let _ = try_parse(&input);
    }

    /// Property 1b: never panics on operator-and-bracket soup either.
    #[test]
    fn parser_never_panics_on_punctuation(input in "[-+*/%<>=&|^!~?:;.,@$`'\"\\[\\]{}()a-z0-9 \n]{0,120}") {
        let _ = try_parse(&input);
    }

    /// Property 2: a failure's position is inside the input.
    #[test]
    fn error_positions_in_bounds(input in "\\PC{0,300}") {
        if let Err(error) = try_parse(&input) {
            let len = u32::try_from(input.len()).unwrap_or(u32::MAX);
            prop_assert!(
                error.position().start_char() <= len,
                "error at {} beyond input length {} for {:?}",
                error.position().start_char(),
                len,
                input,
            );
        }
    }

    /// Property 3: parsing is deterministic.
    #[test]
    fn parser_deterministic(input in "\\PC{0,200}") {
        let first = try_parse(&input).map(|ast| ast.dump()).map_err(|e| e.to_string());
        let second = try_parse(&input).map(|ast| ast.dump()).map_err(|e| e.to_string());
        prop_assert_eq!(first, second, "nondeterministic result for {:?}", input);
    }

    /// Property 4: known-valid snippets parse cleanly.
    #[test]
    fn valid_snippets_parse(input in valid_snippet()) {
        let result = try_parse(&input);
        prop_assert!(result.is_ok(), "valid input {:?} failed: {:?}", input, result.err());
    }

    /// Property 5: parent links are consistent on every successful parse.
    #[test]
    fn parent_links_consistent(input in valid_snippet()) {
        let ast = try_parse(&input).expect("valid input");
        prop_assert!(ast.node(ast.root()).parent.is_none());
        check_parents(&ast, ast.root());
    }

    /// Property 5b: spans of parsed statements stay within the input.
    #[test]
    fn node_spans_in_bounds(input in valid_snippet()) {
        let ast = try_parse(&input).expect("valid input");
        let len = u32::try_from(input.len()).unwrap_or(u32::MAX);
        for id in ast.subtree_ids(ast.root()) {
            let span = ast.node(id).position.span();
            prop_assert!(span.end() <= len);
            prop_assert!(span.start() <= span.end());
        }
    }
}
