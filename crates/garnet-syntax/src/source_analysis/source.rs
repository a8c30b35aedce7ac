// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Source units and line/column positions.
//!
//! A [`SourceUnit`] wraps the raw text of one parse together with its origin
//! name and an optional line/column offset. Offsets matter for macro
//! expansion: a `#{...}` interpolation body or a quasiquoted template is
//! re-parsed through a fresh embedded unit whose offsets point back at the
//! host file, so every node in the nested tree still reports positions in
//! host-file coordinates.

use std::sync::Arc;

use ecow::EcoString;

use super::Span;
use crate::ast::Position;

/// An immutable unit of source text with an origin name and position offsets.
///
/// Units are shared via `Arc`: every [`Position`] holds a reference to the
/// unit it was measured against, so diagnostics can always recover the
/// original text.
#[derive(Debug)]
pub struct SourceUnit {
    name: EcoString,
    text: String,
    line_offset: u32,
    column_offset: u32,
    /// Byte offset of the start of each line, for offset -> line/column.
    line_starts: Vec<u32>,
}

impl SourceUnit {
    /// Creates a unit reporting positions from line 1, column 1.
    #[must_use]
    pub fn new(name: impl Into<EcoString>, text: impl Into<String>) -> Arc<Self> {
        Self::with_offsets(name, text, 1, 1)
    }

    /// Creates a unit whose first character reports as `line`:`column`.
    ///
    /// The column offset applies to the first line only; subsequent lines
    /// start at column 1 as usual.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_offsets(
        name: impl Into<EcoString>,
        text: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Arc<Self> {
        let text = text.into();
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Arc::new(Self {
            name: name.into(),
            text,
            line_offset: line.max(1),
            column_offset: column.max(1),
            line_starts,
        })
    }

    /// The origin name (file name or synthesized macro-expansion label).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line reported for the first line of text.
    #[must_use]
    pub fn line_offset(&self) -> u32 {
        self.line_offset
    }

    /// The column reported for the first character of text.
    #[must_use]
    pub fn column_offset(&self) -> u32 {
        self.column_offset
    }

    /// The text covered by `span`.
    #[must_use]
    pub fn slice(&self, span: Span) -> &str {
        &self.text[span.as_range()]
    }

    /// Converts a byte offset into a 1-based (line, column) pair,
    /// applying the unit's offsets.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line_idx];
        // Columns count characters, not bytes.
        let col = self.text[line_start as usize..offset as usize]
            .chars()
            .count() as u32
            + 1;
        let line = line_idx as u32 + self.line_offset;
        let col = if line_idx == 0 {
            col + self.column_offset - 1
        } else {
            col
        };
        (line, col)
    }

    /// Builds a [`Position`] for `span` within this unit.
    #[must_use]
    pub fn position(self: &Arc<Self>, span: Span) -> Position {
        let (start_line, start_column) = self.line_column(span.start());
        let (end_line, end_column) = self.line_column(span.end());
        Position::new(
            Arc::clone(self),
            span,
            start_line,
            start_column,
            end_line,
            end_column,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_basic() {
        let unit = SourceUnit::new("t", "ab\ncd\n");
        assert_eq!(unit.line_column(0), (1, 1));
        assert_eq!(unit.line_column(1), (1, 2));
        assert_eq!(unit.line_column(2), (1, 3));
        assert_eq!(unit.line_column(3), (2, 1));
        assert_eq!(unit.line_column(5), (2, 3));
    }

    #[test]
    fn offsets_shift_first_line_only() {
        let unit = SourceUnit::with_offsets("t", "foo\nbar", 3, 5);
        assert_eq!(unit.line_column(0), (3, 5));
        assert_eq!(unit.line_column(3), (3, 8));
        assert_eq!(unit.line_column(4), (4, 1));
    }

    #[test]
    fn position_carries_unit() {
        let unit = SourceUnit::new("t", "  foo");
        let pos = unit.position(Span::new(2, 5));
        assert_eq!(pos.start_line(), 1);
        assert_eq!(pos.start_column(), 3);
        assert_eq!(pos.end_column(), 6);
        assert_eq!(pos.source().name(), "t");
        assert_eq!(pos.text(), "foo");
    }

    #[test]
    fn columns_count_characters() {
        let unit = SourceUnit::new("t", "é x");
        // 'é' is two bytes but one column.
        assert_eq!(unit.line_column(2), (1, 2));
    }
}
