//! Range arithmetic shared by selections, marked text and language layers.
//!
//! One interval-shift rule is used everywhere a stored range has to follow an edit, so that a
//! selection and the injected layer under it never disagree about where an edit landed.

use std::ops::Range;

use crate::edit::{InputEdit, TextMutation};

/// A positional edit: `[start, old_end)` was replaced by `[start, new_end)`.
///
/// The unit (characters or parser bytes) is whatever the shifted ranges use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEdit {
    /// Start of the replaced region.
    pub start: usize,
    /// End of the replaced region before the edit.
    pub old_end: usize,
    /// End of the inserted region after the edit.
    pub new_end: usize,
}

impl RangeEdit {
    /// Create an edit.
    pub fn new(start: usize, old_end: usize, new_end: usize) -> Self {
        Self {
            start,
            old_end,
            new_end,
        }
    }

    /// Returns `true` if nothing was replaced.
    pub fn is_insertion(&self) -> bool {
        self.start == self.old_end
    }

    /// Map a single offset through the edit. Offsets inside the replaced region collapse to the
    /// end of the inserted text.
    pub fn map_offset(&self, offset: usize) -> usize {
        if offset < self.start {
            offset
        } else if offset >= self.old_end {
            offset - self.old_end + self.new_end
        } else {
            self.new_end
        }
    }
}

impl From<&InputEdit> for RangeEdit {
    fn from(edit: &InputEdit) -> Self {
        Self::new(edit.start_byte, edit.old_end_byte, edit.new_end_byte)
    }
}

impl From<&TextMutation> for RangeEdit {
    fn from(mutation: &TextMutation) -> Self {
        Self::new(
            mutation.range.start,
            mutation.range.end,
            mutation.range.start + mutation.inserted_len(),
        )
    }
}

/// Shift a half-open range through an edit.
///
/// Rules (the range start is inclusive, the range end exclusive):
/// - an edit that ends at or before the range start moves the whole range;
/// - a pure insertion at the range start grows the range;
/// - an edit that starts at or after the range end leaves it untouched;
/// - an edit fully inside the range (including one starting at its start) grows or shrinks it;
/// - an edit overlapping the start truncates the range to begin after the inserted text;
/// - an edit overlapping the end truncates the range to end where the edit starts;
/// - an edit that starts before the range and covers all of it collapses it to an empty range.
pub fn shift_range(range: Range<usize>, edit: RangeEdit) -> Range<usize> {
    debug_assert!(range.start <= range.end);
    let RangeEdit {
        start,
        old_end,
        new_end,
    } = edit;

    if edit.is_insertion() {
        let inserted = new_end - start;
        return if start < range.start {
            range.start + inserted..range.end + inserted
        } else if start == range.start || start < range.end {
            range.start..range.end + inserted
        } else {
            range
        };
    }

    if old_end <= range.start {
        range.start - old_end + new_end..range.end - old_end + new_end
    } else if start >= range.end {
        range
    } else if start <= range.start && old_end >= range.end {
        if start == range.start {
            range.start..new_end
        } else {
            new_end..new_end
        }
    } else if start < range.start {
        new_end..range.end - old_end + new_end
    } else if old_end <= range.end {
        range.start..range.end - old_end + new_end
    } else {
        range.start..start
    }
}

/// [`shift_range`] for ranges that own both of their boundaries: a pure insertion at the end of
/// a non-empty range grows it as well.
///
/// Language layers use this, so text typed at the end of an embedded region stays in it.
pub fn shift_range_inclusive(range: Range<usize>, edit: RangeEdit) -> Range<usize> {
    if edit.is_insertion() && edit.start == range.end && range.start < range.end {
        return range.start..edit.new_end;
    }
    shift_range(range, edit)
}

/// The parts of `range` outside every range in `cut` (sorted, merged).
pub fn subtract_ranges(range: Range<usize>, cut: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = range.start;
    for hole in cut {
        if hole.end <= start {
            continue;
        }
        if hole.start >= range.end {
            break;
        }
        if hole.start > start {
            pieces.push(start..hole.start);
        }
        start = start.max(hole.end);
        if start >= range.end {
            break;
        }
    }
    if start < range.end {
        pieces.push(start..range.end);
    }
    pieces
}

/// Sort ranges, drop empty ones and merge overlapping or touching neighbours.
pub fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.retain(|range| range.start < range.end);
    ranges.sort_by_key(|range| (range.start, range.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Returns `true` if two half-open ranges share at least one position.
pub fn ranges_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
