// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the lexer.
//!
//! These use `proptest` to verify lexer invariants over generated inputs:
//!
//! 1. **Lexer never panics** — arbitrary input yields tokens or a single
//!    error, never a crash
//! 2. **Token spans are in bounds and ordered** — every span fits the
//!    input and tokens never overlap
//! 3. **EOF is always last** — a successful lex ends with exactly one EOF
//! 4. **Lexing is deterministic** — same input, same tokens
//! 5. **Valid fragments lex** — a corpus of known-good snippets succeeds

use proptest::prelude::*;

use super::lexer::lex;
use super::{SourceUnit, SyntaxError, Token};

/// Known-valid fragments covering every literal form.
const VALID_FRAGMENTS: &[&str] = &[
    "42",
    "0xF",
    "0b1111",
    "0o17",
    "0d15",
    "1_000",
    "3.14",
    "4_2.2_2e0_1",
    "'a string'",
    "\"interp #{x} done\"",
    "\"field #@a and #@@b\"",
    "?a",
    "?\\u20ac",
    ":symbol",
    ":@field",
    "/regex#{x}/iz",
    "<<'EOS'\nraw\nEOS\n",
    "<<-EOS\n  body\n  EOS\n",
    "a <<b\nheredoc\nb\n",
    "a << b",
    "foo?",
    "bar!",
    "@ivar",
    "@@cvar",
    "`quoted`",
    "$Anno",
    "a&&=b",
    "a||=b",
    "a<=>b",
    "a>>>b",
    "a!~b",
    "x ? y : z",
    "/* block /* nested */ comment */ 1",
    "# line comment\n1",
    "a \\\n b",
];

fn valid_fragment() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_FRAGMENTS).prop_map(std::string::ToString::to_string)
}

fn try_lex(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let unit = SourceUnit::new("prop", source);
    lex(&unit)
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

    /// Property 1: the lexer never panics on arbitrary input.
    #[test]
    fn lexer_never_panics(input in "\\PC{0,500}") {
        let _ = try_lex(&input);
    }

    /// Property 2: token spans fit the input and never overlap.
    #[test]
    fn token_spans_in_bounds_and_ordered(input in "\\PC{0,500}") {
        if let Ok(tokens) = try_lex(&input) {
            let len = u32::try_from(input.len()).unwrap_or(u32::MAX);
            for token in &tokens {
                prop_assert!(
                    token.span().end() <= len,
                    "token {:?} span {:?} beyond input length {} for {:?}",
                    token.kind(),
                    token.span(),
                    len,
                    input,
                );
                prop_assert!(token.span().start() <= token.span().end());
            }
            for window in tokens.windows(2) {
                prop_assert!(
                    window[1].span().start() >= window[0].span().end(),
                    "overlapping spans {:?} and {:?} for {:?}",
                    window[0].span(),
                    window[1].span(),
                    input,
                );
            }
        }
    }

    /// Property 3: a successful lex ends with exactly one EOF token.
    #[test]
    fn eof_always_last(input in "\\PC{0,500}") {
        if let Ok(tokens) = try_lex(&input) {
            prop_assert!(!tokens.is_empty());
            prop_assert!(tokens.last().expect("nonempty").kind().is_eof());
            let eof_count = tokens.iter().filter(|t| t.kind().is_eof()).count();
            prop_assert_eq!(eof_count, 1);
        }
    }

    /// Property 4: lexing is deterministic.
    #[test]
    fn lexer_deterministic(input in "\\PC{0,200}") {
        let first = try_lex(&input);
        let second = try_lex(&input);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b, "token mismatch for {:?}", input),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            (a, b) => prop_assert!(false, "Ok/Err mismatch for {:?}: {:?} vs {:?}", input, a.is_ok(), b.is_ok()),
        }
    }

    /// Property 5: known-valid fragments lex cleanly.
    #[test]
    fn valid_fragments_lex(input in valid_fragment()) {
        let result = try_lex(&input);
        prop_assert!(result.is_ok(), "valid input {:?} failed: {:?}", input, result.err());
    }
}
