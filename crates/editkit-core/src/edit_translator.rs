//! Edit translation.
//!
//! Turns one text replacement into:
//!
//! - a [`LineEditPlan`]: the minimal set of line-storage operations that brings the line
//!   structure in sync with the new text, and
//! - an [`InputEdit`] for incremental parsers.
//!
//! Translation runs **after** the text buffer was mutated and **before** the line storage is
//! touched: the storage still describes the old text while `new_text` already holds the new
//! one. Only the lines between the start of the line containing the edit start and the end of the
//! line containing the edit end are re-segmented; everything outside that span keeps its lines
//! untouched.

use std::ops::Range;

use crate::edit::{EditPoints, InputEdit, TextPoint};
use crate::error::EditError;
use crate::line_storage::LineStorage;
use crate::text::{BYTES_PER_UNIT, split_lines_with_endings, utf16_len};

/// Read access to the post-edit text, in UTF-16 units.
pub trait TextSource {
    /// Total length in UTF-16 units.
    fn len_utf16(&self) -> usize;

    /// Text of `range` (UTF-16 units; the range must fall on character boundaries).
    fn slice_utf16(&self, range: Range<usize>) -> String;
}

impl TextSource for str {
    fn len_utf16(&self) -> usize {
        utf16_len(self)
    }

    fn slice_utf16(&self, range: Range<usize>) -> String {
        let mut units = 0;
        let mut start_byte = self.len();
        let mut end_byte = self.len();
        for (byte, c) in self.char_indices() {
            if units == range.start && start_byte == self.len() {
                start_byte = byte;
            }
            if units == range.end {
                end_byte = byte;
                break;
            }
            units += c.len_utf16();
        }
        if start_byte > end_byte {
            return String::new();
        }
        self[start_byte..end_byte].to_string()
    }
}

/// One line-storage operation. Indices refer to the storage as it is when the operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOp {
    /// Remove line `index`.
    Delete {
        /// Line index.
        index: usize,
    },
    /// Change the length of line `index` in place.
    Resize {
        /// Line index.
        index: usize,
        /// Length change in UTF-16 units.
        length_delta: isize,
    },
    /// Insert a new line of `length` units so that it becomes line `index`.
    Insert {
        /// Line index.
        index: usize,
        /// Line length in UTF-16 units.
        length: usize,
    },
}

/// Ordered line-storage operations for one edit.
///
/// Deletes come first in descending index order, then in-place resizes, then inserts in
/// ascending index order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineEditPlan {
    /// The operations, in application order.
    pub ops: Vec<LineOp>,
    /// Lines of the new text that were re-segmented (their layout is stale).
    pub touched_lines: Range<usize>,
}

impl LineEditPlan {
    /// Apply the plan to a storage that still describes the pre-edit text.
    ///
    /// `new_line` creates the payload for inserted lines; inserted lines get
    /// `estimated_height`.
    pub fn apply<T>(
        &self,
        storage: &mut LineStorage<T>,
        mut new_line: impl FnMut() -> T,
        estimated_height: f64,
    ) {
        for op in &self.ops {
            match *op {
                LineOp::Delete { index } => {
                    storage.delete_at_index(index);
                }
                LineOp::Resize {
                    index,
                    length_delta,
                } => {
                    storage.update_at_index(index, length_delta, 0.0);
                }
                LineOp::Insert { index, length } => {
                    storage.insert_at_index(index, new_line(), length, estimated_height);
                }
            }
        }
    }
}

/// The result of translating one replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedEdit {
    /// Line-storage operations.
    pub plan: LineEditPlan,
    /// The parser-facing edit, with row/column points.
    pub input_edit: InputEdit,
}

/// Translate the replacement of `range` (pre-edit UTF-16 units) by `replacement`.
///
/// `storage` must describe the text before the edit and `new_text` the text after it.
pub fn translate<T>(
    storage: &LineStorage<T>,
    range: Range<usize>,
    replacement: &str,
    new_text: &(impl TextSource + ?Sized),
) -> Result<TranslatedEdit, EditError> {
    let old_len = storage.length();
    EditError::check_range(range.start, range.end, old_len)?;
    let inserted_len = utf16_len(replacement);
    let new_end = range.start + inserted_len;

    let input_edit = InputEdit::from_char_range(range.clone(), inserted_len);

    let (Some(first), Some(last)) = (storage.get_line(range.start), storage.get_line(range.end))
    else {
        // An empty storage has no lines yet: segment the whole text.
        let lengths = segment(&new_text.slice_utf16(0..new_text.len_utf16()), true);
        let ops = lengths
            .iter()
            .enumerate()
            .map(|(index, &length)| LineOp::Insert { index, length })
            .collect();
        return Ok(TranslatedEdit {
            plan: LineEditPlan {
                ops,
                touched_lines: 0..lengths.len(),
            },
            input_edit,
        });
    };

    let mut span_first = first.index;
    let mut span_start = first.range.start;

    // A CR ending the previous line fuses with an LF arriving at the start of this one.
    if range.start == first.range.start && first.index > 0 && range.start < new_text.len_utf16()
    {
        let starts_with_lf = new_text.slice_utf16(range.start..range.start + 1) == "\n";
        if starts_with_lf && let Some(prev) = storage.get_line_at_index(first.index - 1) {
            let ends_with_cr = prev.range.end > prev.range.start
                && new_text.slice_utf16(prev.range.end - 1..prev.range.end) == "\r";
            if ends_with_cr {
                span_first = prev.index;
                span_start = prev.range.start;
            }
        }
    }

    let old_span_end = last.range.end;
    let old_span_count = last.index + 1 - span_first;
    let at_document_end = old_span_end == old_len;
    let new_span_end = old_span_end - range.len() + inserted_len;

    let new_lengths = segment(
        &new_text.slice_utf16(span_start..new_span_end),
        at_document_end,
    );

    let old_lengths: Vec<usize> = storage
        .iter_from_index(span_first)
        .take(old_span_count)
        .map(|line| line.length())
        .collect();

    let kept = old_lengths.len().min(new_lengths.len());
    let mut ops = Vec::new();
    for index in (span_first + kept..span_first + old_lengths.len()).rev() {
        ops.push(LineOp::Delete { index });
    }
    for (offset, (&old, &new)) in old_lengths.iter().zip(&new_lengths).enumerate() {
        if old != new {
            ops.push(LineOp::Resize {
                index: span_first + offset,
                length_delta: new as isize - old as isize,
            });
        }
    }
    for (offset, &length) in new_lengths.iter().enumerate().skip(kept) {
        ops.push(LineOp::Insert {
            index: span_first + offset,
            length,
        });
    }

    let start_point = TextPoint::new(
        first.index,
        (range.start - first.range.start) * BYTES_PER_UNIT,
    );
    let old_end_point = TextPoint::new(last.index, (range.end - last.range.start) * BYTES_PER_UNIT);
    let new_end_point = {
        let mut line_start = span_start;
        let mut row = span_first;
        for (offset, &length) in new_lengths.iter().enumerate() {
            let is_last = offset + 1 == new_lengths.len();
            if new_end < line_start + length || is_last {
                break;
            }
            line_start += length;
            row += 1;
        }
        TextPoint::new(row, (new_end - line_start) * BYTES_PER_UNIT)
    };

    Ok(TranslatedEdit {
        plan: LineEditPlan {
            ops,
            touched_lines: span_first..span_first + new_lengths.len(),
        },
        input_edit: input_edit.with_points(EditPoints {
            start: start_point,
            old_end: old_end_point,
            new_end: new_end_point,
        }),
    })
}

/// Line lengths of `text`. Outside the document end the trailing empty piece is dropped,
/// since the span always ends with a terminator there.
fn segment(text: &str, at_document_end: bool) -> Vec<usize> {
    let mut pieces = split_lines_with_endings(text);
    if !at_document_end && pieces.len() > 1 && pieces.last().is_some_and(|piece| piece.is_empty())
    {
        pieces.pop();
    }
    pieces.into_iter().map(utf16_len).collect()
}
