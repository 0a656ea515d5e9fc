//! Source-span side table
//!
//! Optional position records for compiled forms, keyed by cell identity
//! so the core value representation stays free of position data. The
//! front-end populates the table when span recording is enabled; the
//! host's error reporting consults it to annotate call-list traces.

use fennec_core::{CellRef, Value};
use rustc_hash::FxHashMap;

/// Half-open source region in line/column coordinates (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

/// Spans for compiled forms, keyed by cell.
#[derive(Debug, Default)]
pub struct SpanTable {
    map: FxHashMap<CellRef, Span>,
}

impl SpanTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the span of a compiled form. Immediates have no cell
    /// identity and are skipped.
    pub fn insert(&mut self, form: Value, span: Span) {
        if let Value::Cell(r) = form {
            self.map.insert(r, span);
        }
    }

    /// Span of a form, if one was recorded.
    pub fn get(&self, form: Value) -> Option<Span> {
        if let Value::Cell(r) = form {
            self.map.get(&r).copied()
        } else {
            None
        }
    }

    /// Number of recorded spans.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
