//! Position index - locate the range enclosing a cursor position
//!
//! LSIF guarantees that the ranges of a single document never overlap, so a
//! position compared against a range is either before it, after it, or within
//! it. Binary search over the ordered ranges discards half of the remaining
//! candidates on every comparison.

use std::cmp::Ordering;
use serde::{Deserialize, Serialize};

/// A zero-based (line, character) position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A start/end pair of positions, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Self {
            start: Position::new(start_line, start_character),
            end: Position::new(end_line, end_character),
        }
    }
}

/// Anything with flat start/end bounds.
pub trait Bounded {
    fn bounds(&self) -> Range;
}

impl Bounded for Range {
    fn bounds(&self) -> Range {
        *self
    }
}

/// Compare a position against a range.
///
/// Returns `Equal` if the position lies within the range (inclusive of both
/// boundaries), `Less` if the position comes before the range and `Greater`
/// if it comes after it.
pub fn compare_position<B: Bounded + ?Sized>(range: &B, position: Position) -> Ordering {
    let Range { start, end } = range.bounds();

    if position.line < start.line {
        return Ordering::Less;
    }
    if position.line > end.line {
        return Ordering::Greater;
    }
    if position.line == start.line && position.character < start.character {
        return Ordering::Less;
    }
    if position.line == end.line && position.character > end.character {
        return Ordering::Greater;
    }

    Ordering::Equal
}

/// Find the range that contains `position`.
///
/// `ordered_ranges` must be sorted by start line, then start character, and
/// must not overlap.
pub fn find_range<B: Bounded>(ordered_ranges: &[B], position: Position) -> Option<&B> {
    find_range_index(ordered_ranges, position).map(|index| &ordered_ranges[index])
}

/// Like [`find_range`], but returns the index of the containing range.
pub fn find_range_index<B: Bounded>(ordered_ranges: &[B], position: Position) -> Option<usize> {
    let mut lo = 0usize;
    let mut hi = ordered_ranges.len();

    while lo < hi {
        let mid = lo + (hi - lo) / 2;

        match compare_position(&ordered_ranges[mid], position) {
            Ordering::Equal => return Some(mid),
            Ordering::Greater => lo = mid + 1,
            Ordering::Less => hi = mid,
        }
    }

    None
}
