//! Coordinate types for source ranges, symbols and signatures
//!
//! All rows and columns are 0-indexed. Byte ranges are closed-open; row
//! ranges are inclusive for display purposes.

use std::sync::Arc;

// ============================================================================
// Points and Ranges
// ============================================================================

/// A 0-indexed row/column coordinate in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl From<tree_sitter::Point> for Point {
    fn from(p: tree_sitter::Point) -> Self {
        Self {
            row: p.row as u32,
            column: p.column as u32,
        }
    }
}

impl From<Point> for lsp_types::Position {
    fn from(p: Point) -> Self {
        lsp_types::Position {
            line: p.row,
            character: p.column,
        }
    }
}

impl From<lsp_types::Position> for Point {
    fn from(p: lsp_types::Position) -> Self {
        Self {
            row: p.line,
            column: p.character,
        }
    }
}

/// A contiguous span of a source file, tracked both as row/column points
/// and as a closed-open byte range.
///
/// Invariants: `start_byte <= end_byte` and `start <= end` lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Point,
    pub end: Point,
    pub start_byte: u32,
    pub end_byte: u32,
}

impl Range {
    pub fn new(start: Point, end: Point, start_byte: u32, end_byte: u32) -> Self {
        Self {
            start,
            end,
            start_byte,
            end_byte,
        }
    }

    /// Row-wise containment: this range spans every row of `other`.
    pub fn contains_rows(&self, other: &Range) -> bool {
        self.start.row <= other.start.row && self.end.row >= other.end.row
    }

    /// Row-wise overlap, inclusive on both bounds.
    pub fn overlaps_rows(&self, other: &Range) -> bool {
        self.start.row <= other.end.row && self.end.row >= other.start.row
    }
}

impl From<tree_sitter::Range> for Range {
    fn from(r: tree_sitter::Range) -> Self {
        Self {
            start: r.start_point.into(),
            end: r.end_point.into(),
            start_byte: r.start_byte as u32,
            end_byte: r.end_byte as u32,
        }
    }
}

impl From<lsp_types::Range> for Range {
    fn from(r: lsp_types::Range) -> Self {
        // LSP ranges carry no byte offsets; row/column is all we get.
        Self {
            start: r.start.into(),
            end: r.end.into(),
            start_byte: 0,
            end_byte: 0,
        }
    }
}

impl From<Range> for lsp_types::Range {
    fn from(r: Range) -> Self {
        lsp_types::Range {
            start: r.start.into(),
            end: r.end.into(),
        }
    }
}

// ============================================================================
// Line Index
// ============================================================================

/// Byte offsets of line boundaries in a source buffer.
///
/// Lines are counted from newline characters; a final line without a
/// trailing newline still counts as a line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset at which each line starts.
    starts: Vec<u32>,
    /// Total byte length of the indexed buffer.
    len: u32,
    /// Whether the buffer ends with a newline.
    ends_with_newline: bool,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' && i + 1 < text.len() {
                starts.push((i + 1) as u32);
            }
        }
        Self {
            starts,
            len: text.len() as u32,
            ends_with_newline: text.ends_with('\n'),
        }
    }

    /// Number of lines in the buffer. An empty buffer has zero lines; a
    /// buffer that does not end in a newline still counts its final line.
    pub fn line_count(&self) -> u32 {
        if self.len == 0 {
            return 0;
        }
        self.starts.len() as u32
    }

    /// Byte offset of the start of `row`, clamped to the last line.
    pub fn line_start(&self, row: u32) -> u32 {
        let idx = (row as usize).min(self.starts.len().saturating_sub(1));
        self.starts[idx]
    }

    /// Byte offset just past the content of `row`, excluding its newline.
    pub fn line_end(&self, row: u32) -> u32 {
        let idx = (row as usize).min(self.starts.len().saturating_sub(1));
        match self.starts.get(idx + 1) {
            Some(next) => next - 1,
            None => {
                if self.ends_with_newline && self.len > 0 {
                    self.len - 1
                } else {
                    self.len
                }
            }
        }
    }

    /// Last row index, or 0 for an empty buffer.
    pub fn last_row(&self) -> u32 {
        self.line_count().saturating_sub(1)
    }

    /// True if every line in `(after_row, before_row)` exclusive is blank
    /// after stripping whitespace.
    pub fn gap_is_blank(&self, text: &str, after_row: u32, before_row: u32) -> bool {
        if before_row <= after_row + 1 {
            return true;
        }
        for row in (after_row + 1)..before_row {
            let line = &text[self.line_start(row) as usize..self.line_end(row) as usize];
            if !line.trim().is_empty() {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Source Blocks
// ============================================================================

/// A contiguous slice of a source file.
///
/// The backing buffer is shared by every block produced from the same file
/// parse; a block is just a range into it.
#[derive(Debug, Clone)]
pub struct SourceBlock {
    pub source: Arc<str>,
    pub range: Range,
    /// Range of the defining symbol's name, when the block was produced by
    /// a symbol query. Header and wildcard blocks have none.
    pub name_range: Option<Range>,
}

impl SourceBlock {
    /// Build a block spanning whole lines `start_row..=end_row`, with the
    /// byte range recomputed from line boundaries.
    pub fn from_rows(
        source: Arc<str>,
        index: &LineIndex,
        start_row: u32,
        end_row: u32,
        name_range: Option<Range>,
    ) -> Self {
        let start_row = start_row.min(index.last_row());
        let end_row = end_row.min(index.last_row());
        let start_byte = index.line_start(start_row);
        let end_byte = index.line_end(end_row);
        let range = Range::new(
            Point::new(start_row, 0),
            Point::new(end_row, end_byte.saturating_sub(index.line_start(end_row))),
            start_byte,
            end_byte,
        );
        Self {
            source,
            range,
            name_range,
        }
    }

    /// The block's bytes.
    pub fn text(&self) -> &str {
        let start = self.range.start_byte as usize;
        let end = (self.range.end_byte as usize).min(self.source.len());
        &self.source[start.min(end)..end]
    }
}

// ============================================================================
// Symbols and Signatures
// ============================================================================

/// Classification of a definition, as reported by the structural queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Type,
    Constant,
    Variable,
    Field,
    Enum,
    Interface,
    Alias,
    Module,
    Header,
    Other,
}

/// A named definition found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// The symbol's name, or an alternative name form (e.g. `Recv.Method`).
    pub content: String,
    pub kind: SymbolKind,
    /// Full span of the definition, body included.
    pub declaration_range: Range,
    /// Span of just the name token.
    pub name_range: Range,
}

/// The lexical header of a definition: the declaration line(s) without the
/// body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub content: String,
    pub start: Point,
    pub end: Point,
}

impl Signature {
    /// Number of source lines the signature spans.
    pub fn line_count(&self) -> usize {
        self.content.lines().count().max(1)
    }
}
