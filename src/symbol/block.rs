//! Merging of adjacent and overlapping source blocks
//!
//! Blocks retrieved for different symbols in the same file frequently abut
//! or overlap; the renderer works on a merged, non-overlapping set.

use std::sync::Arc;

use crate::symbol::{LineIndex, SourceBlock};

/// Merge blocks from a single file whenever they overlap, are adjacent, or
/// are separated only by blank lines.
///
/// Input blocks must all reference the same source buffer. The result is
/// sorted ascending by start row, merged blocks span whole lines, and no
/// two output blocks overlap or are separated by only whitespace.
/// Merging an already-merged list is a no-op.
pub fn merge_adjacent_or_overlapping(
    mut blocks: Vec<SourceBlock>,
    source: &str,
) -> Vec<SourceBlock> {
    if blocks.len() <= 1 {
        return blocks;
    }
    let index = LineIndex::new(source);
    blocks.sort_by_key(|b| (b.range.start.row, b.range.end.row));

    let mut merged: Vec<SourceBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(acc)
                if block.range.start.row <= acc.range.end.row.saturating_add(1)
                    || index.gap_is_blank(source, acc.range.end.row, block.range.start.row) =>
            {
                let start_row = acc.range.start.row.min(block.range.start.row);
                let end_row = acc.range.end.row.max(block.range.end.row);
                let name_range = acc.name_range.or(block.name_range);
                *acc = SourceBlock::from_rows(
                    Arc::clone(&acc.source),
                    &index,
                    start_row,
                    end_row,
                    name_range,
                );
            }
            _ => {
                let name_range = block.name_range;
                merged.push(SourceBlock::from_rows(
                    block.source,
                    &index,
                    block.range.start.row,
                    block.range.end.row,
                    name_range,
                ));
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Point, Range};

    fn block(source: &Arc<str>, start_row: u32, end_row: u32) -> SourceBlock {
        let index = LineIndex::new(source);
        SourceBlock::from_rows(Arc::clone(source), &index, start_row, end_row, None)
    }

    #[test]
    fn merges_overlapping_blocks() {
        let source: Arc<str> = Arc::from("a\nb\nc\nd\ne\n");
        let merged = merge_adjacent_or_overlapping(
            vec![block(&source, 0, 2), block(&source, 1, 4)],
            &source,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].range.start.row, 0);
        assert_eq!(merged[0].range.end.row, 4);
    }

    #[test]
    fn merges_across_blank_gap() {
        let source: Arc<str> = Arc::from("fn a\n\n\nfn b\n");
        let merged = merge_adjacent_or_overlapping(
            vec![block(&source, 0, 0), block(&source, 3, 3)],
            &source,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text(), "fn a\n\n\nfn b");
    }

    #[test]
    fn keeps_blocks_separated_by_code() {
        let source: Arc<str> = Arc::from("fn a\nmiddle\nfn b\nx\nx\nfn c\n");
        let merged = merge_adjacent_or_overlapping(
            vec![block(&source, 0, 0), block(&source, 5, 5)],
            &source,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let source: Arc<str> = Arc::from("a\nb\n\nc\nX\nd\n");
        let once = merge_adjacent_or_overlapping(
            vec![
                block(&source, 0, 1),
                block(&source, 3, 3),
                block(&source, 5, 5),
            ],
            &source,
        );
        let twice = merge_adjacent_or_overlapping(once.clone(), &source);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.range, b.range);
        }
    }

    #[test]
    fn output_is_sorted_and_disjoint() {
        let source: Arc<str> = Arc::from("l0\nl1\nl2\nl3\nl4\nl5\nl6\n");
        let merged = merge_adjacent_or_overlapping(
            vec![
                block(&source, 4, 5),
                block(&source, 0, 1),
                block(&source, 4, 6),
            ],
            &source,
        );
        assert_eq!(merged.len(), 2);
        assert!(merged[0].range.start.row < merged[1].range.start.row);
        assert!(merged[0].range.end.row + 1 < merged[1].range.start.row);
    }

    #[test]
    fn name_range_survives_merge() {
        let source: Arc<str> = Arc::from("a\nb\nc\n");
        let index = LineIndex::new(&source);
        let name = Range::new(Point::new(1, 0), Point::new(1, 1), 2, 3);
        let named = SourceBlock::from_rows(Arc::clone(&source), &index, 1, 1, Some(name));
        let merged =
            merge_adjacent_or_overlapping(vec![block(&source, 0, 0), named], &source);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name_range, Some(name));
    }
}
