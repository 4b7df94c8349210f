//! Structured edit descriptors.
//!
//! Two views of the same change flow through the engine:
//!
//! - [`TextMutation`] is expressed in **character offsets** (UTF-16 code units) and carries the
//!   exact replaced and inserted text, which is what undo needs.
//! - [`InputEdit`] is expressed in **parser bytes** (two per code unit) plus optional row/column
//!   points, which is what incremental parsers need.

use std::ops::Range;

use crate::text::{BYTES_PER_UNIT, utf16_len};

/// A half-open range of parser bytes.
pub type ByteRange = Range<usize>;

/// A row/column position. `column` is measured in parser bytes from the start of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPoint {
    /// Zero-based line index.
    pub row: usize,
    /// Byte column within the line.
    pub column: usize,
}

impl TextPoint {
    /// Create a point.
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Row/column positions matching the byte offsets of an [`InputEdit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditPoints {
    /// Position of `start_byte`.
    pub start: TextPoint,
    /// Position of `old_end_byte` in the pre-edit document.
    pub old_end: TextPoint,
    /// Position of `new_end_byte` in the post-edit document.
    pub new_end: TextPoint,
}

/// A parser-facing description of one replacement: bytes `[start_byte, old_end_byte)` of the old
/// document became bytes `[start_byte, new_end_byte)` of the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdit {
    /// Start byte, identical in both documents.
    pub start_byte: usize,
    /// End byte of the replaced region in the old document.
    pub old_end_byte: usize,
    /// End byte of the inserted region in the new document.
    pub new_end_byte: usize,
    /// Row/column positions, when known.
    pub points: Option<EditPoints>,
}

impl InputEdit {
    /// Build an edit from byte offsets without points.
    pub fn new(start_byte: usize, old_end_byte: usize, new_end_byte: usize) -> Self {
        debug_assert!(start_byte <= old_end_byte && start_byte <= new_end_byte);
        Self {
            start_byte,
            old_end_byte,
            new_end_byte,
            points: None,
        }
    }

    /// Build an edit from a replaced character range and the inserted length, both in UTF-16
    /// units.
    pub fn from_char_range(range: Range<usize>, inserted_len: usize) -> Self {
        Self::new(
            range.start * BYTES_PER_UNIT,
            range.end * BYTES_PER_UNIT,
            (range.start + inserted_len) * BYTES_PER_UNIT,
        )
    }

    /// Attach row/column points.
    pub fn with_points(mut self, points: EditPoints) -> Self {
        self.points = Some(points);
        self
    }

    /// Returns `true` for a pure insertion (nothing replaced).
    pub fn is_insertion(&self) -> bool {
        self.start_byte == self.old_end_byte && self.new_end_byte > self.start_byte
    }

    /// Signed change in document length, in bytes.
    pub fn delta(&self) -> isize {
        self.new_end_byte as isize - self.old_end_byte as isize
    }

    /// The replaced byte range in the old document.
    pub fn old_range(&self) -> ByteRange {
        self.start_byte..self.old_end_byte
    }

    /// The inserted byte range in the new document.
    pub fn new_range(&self) -> ByteRange {
        self.start_byte..self.new_end_byte
    }
}

/// A single text replacement expressed in character offsets.
///
/// Semantics:
/// - `range` is the replaced range in the document **at the time this mutation is applied**.
/// - `deleted_text` is exactly the text that `range` covered.
/// - Mutations in an undo group must be applied **in order**; undo applies their inverses in
///   reverse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMutation {
    /// Replaced range (UTF-16 units, pre-edit coordinates).
    pub range: Range<usize>,
    /// Exact deleted text (may be empty).
    pub deleted_text: String,
    /// Exact inserted text (may be empty).
    pub inserted_text: String,
}

impl TextMutation {
    /// Create a mutation.
    pub fn new(
        range: Range<usize>,
        deleted_text: impl Into<String>,
        inserted_text: impl Into<String>,
    ) -> Self {
        let mutation = Self {
            range,
            deleted_text: deleted_text.into(),
            inserted_text: inserted_text.into(),
        };
        debug_assert_eq!(mutation.range.len(), utf16_len(&mutation.deleted_text));
        mutation
    }

    /// Length of `inserted_text` in UTF-16 units.
    pub fn inserted_len(&self) -> usize {
        utf16_len(&self.inserted_text)
    }

    /// Length of `deleted_text` in UTF-16 units.
    pub fn deleted_len(&self) -> usize {
        self.range.len()
    }

    /// Range covered by the inserted text after the mutation is applied.
    pub fn inserted_range(&self) -> Range<usize> {
        self.range.start..self.range.start + self.inserted_len()
    }

    /// A pure insertion: nothing deleted, something inserted.
    pub fn is_insertion(&self) -> bool {
        self.deleted_text.is_empty() && !self.inserted_text.is_empty()
    }

    /// A pure deletion: something deleted, nothing inserted.
    pub fn is_deletion(&self) -> bool {
        !self.deleted_text.is_empty() && self.inserted_text.is_empty()
    }

    /// The mutation that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            range: self.inserted_range(),
            deleted_text: self.inserted_text.clone(),
            inserted_text: self.deleted_text.clone(),
        }
    }

    /// The parser-facing form of this mutation (without points).
    pub fn input_edit(&self) -> InputEdit {
        InputEdit::from_char_range(self.range.clone(), self.inserted_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_edit_doubles_offsets() {
        let edit = InputEdit::from_char_range(3..5, 4);
        assert_eq!(edit.start_byte, 6);
        assert_eq!(edit.old_end_byte, 10);
        assert_eq!(edit.new_end_byte, 14);
        assert_eq!(edit.delta(), 4);
        assert!(!edit.is_insertion());
        assert!(InputEdit::from_char_range(2..2, 1).is_insertion());
    }

    #[test]
    fn test_inverse_restores_original_text() {
        let mutation = TextMutation::new(2..5, "cde", "XY");
        let inverse = mutation.inverse();
        assert_eq!(inverse.range, 2..4);
        assert_eq!(inverse.deleted_text, "XY");
        assert_eq!(inverse.inserted_text, "cde");
        assert_eq!(inverse.inverse(), mutation);
    }

    #[test]
    fn test_mutation_kinds() {
        assert!(TextMutation::new(0..0, "", "a").is_insertion());
        assert!(TextMutation::new(0..1, "a", "").is_deletion());
        let replacement = TextMutation::new(0..1, "a", "b");
        assert!(!replacement.is_insertion() && !replacement.is_deletion());
        assert_eq!(TextMutation::new(1..1, "", "😀").inserted_range(), 1..3);
    }
}
