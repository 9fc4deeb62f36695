//! Core symbol and source-range representations
//!
//! Provides the coordinate types shared by the parser, the LSP layer and
//! the renderer, plus the range algebra used to merge retrieved blocks.

mod block;
mod types;

pub use block::merge_adjacent_or_overlapping;
pub use types::{LineIndex, Point, Range, Signature, SourceBlock, SymbolInfo, SymbolKind};
