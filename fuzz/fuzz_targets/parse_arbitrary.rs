// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for parser crash safety testing.
//!
//! This target feeds arbitrary byte sequences to the parser and asserts
//! that it never panics. The parser must handle all input gracefully,
//! producing either a valid AST or a single syntax error.
//!
//! # Success Criteria
//!
//! The parser passes fuzzing if:
//! - It never panics on any input (including invalid UTF-8)
//! - It always returns `Ok(Ast)` or `Err(SyntaxError)`
//! - No assertions fail during parsing
//!
//! # Corpus Seeding
//!
//! Seed `fuzz/corpus/parse_arbitrary/` with `.grn` sources for realistic
//! starting points for mutation.

#![no_main]

use libfuzzer_sys::fuzz_target;

use garnet_syntax::source_analysis::{parse, ParserConfig, SourceUnit};

fuzz_target!(|data: &[u8]| {
    // Only test valid UTF-8 (the parser expects strings). Invalid UTF-8 is
    // not a parser concern - it's filtered earlier.
    if let Ok(source) = std::str::from_utf8(data) {
        let unit = SourceUnit::new("fuzz", source);
        // Success = no panic. We don't care whether it parsed.
        let _ = parse(&unit, &ParserConfig::default());
    }
});
