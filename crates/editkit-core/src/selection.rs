//! Selections and marked (IME composition) text.
//!
//! Selections are half-open character ranges with a stable [`SelectionId`]; an empty range is a
//! caret. After every edit all selections are shifted with the same rule as language-layer
//! ranges ([`crate::ranges::shift_range`]), except that a caret sitting exactly where text is
//! inserted moves past the insertion.
//!
//! Marked text is the provisional text of an input-method composition. It is tracked per
//! selection and is cancelled as soon as a selection leaves its marked range.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::ranges::{RangeEdit, shift_range};

/// Stable identity of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionId(u64);

impl SelectionId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// One selection (or caret).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSelection {
    /// Stable identity.
    pub id: SelectionId,
    /// Selected character range; empty for a caret.
    pub range: Range<usize>,
}

impl TextSelection {
    /// Returns `true` for an empty selection.
    pub fn is_caret(&self) -> bool {
        self.range.is_empty()
    }
}

/// Shift one selection range through an edit.
pub fn shift_selection(range: Range<usize>, edit: RangeEdit) -> Range<usize> {
    if range.is_empty() && edit.is_insertion() && edit.start == range.start {
        return edit.new_end..edit.new_end;
    }
    shift_range(range, edit)
}

/// The current set of selections, kept sorted and non-overlapping.
#[derive(Debug, Clone)]
pub struct SelectionTracker {
    selections: Vec<TextSelection>,
    primary: SelectionId,
    next_id: u64,
}

impl Default for SelectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionTracker {
    /// A single caret at offset 0.
    pub fn new() -> Self {
        let primary = SelectionId(0);
        Self {
            selections: vec![TextSelection {
                id: primary,
                range: 0..0,
            }],
            primary,
            next_id: 1,
        }
    }

    /// The selections in document order.
    pub fn selections(&self) -> &[TextSelection] {
        &self.selections
    }

    /// The selected ranges in document order.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        self.selections.iter().map(|s| s.range.clone()).collect()
    }

    /// The primary selection (the most recently placed one).
    pub fn primary(&self) -> Option<&TextSelection> {
        self.selections
            .iter()
            .find(|s| s.id == self.primary)
            .or_else(|| self.selections.last())
    }

    /// Look up a selection by id.
    pub fn get(&self, id: SelectionId) -> Option<&TextSelection> {
        self.selections.iter().find(|s| s.id == id)
    }

    /// Replace every selection. The last range becomes the primary selection.
    ///
    /// An empty input leaves a caret at offset 0.
    pub fn set_ranges(&mut self, ranges: impl IntoIterator<Item = Range<usize>>) -> Vec<SelectionId> {
        self.selections.clear();
        let mut ids = Vec::new();
        for range in ranges {
            let id = self.allocate_id();
            ids.push(id);
            self.selections.push(TextSelection { id, range });
        }
        if self.selections.is_empty() {
            let id = self.allocate_id();
            ids.push(id);
            self.selections.push(TextSelection { id, range: 0..0 });
        }
        if let Some(&last) = ids.last() {
            self.primary = last;
        }
        self.normalize();
        ids
    }

    /// Add one selection and make it primary.
    pub fn add(&mut self, range: Range<usize>) -> SelectionId {
        let id = self.allocate_id();
        self.selections.push(TextSelection { id, range });
        self.primary = id;
        self.normalize();
        id
    }

    /// Move selection `id` to `range`. Returns `false` if the id is unknown.
    pub fn set_range(&mut self, id: SelectionId, range: Range<usize>) -> bool {
        match self.selections.iter_mut().find(|s| s.id == id) {
            Some(selection) => {
                selection.range = range;
                self.normalize();
                true
            }
            None => false,
        }
    }

    /// Shift every selection through an edit.
    pub fn apply_edit(&mut self, edit: RangeEdit) {
        for selection in &mut self.selections {
            selection.range = shift_selection(selection.range.clone(), edit);
        }
        self.normalize();
    }

    /// Clamp every selection to a document of `len` units.
    pub fn clamp_to(&mut self, len: usize) {
        for selection in &mut self.selections {
            selection.range = selection.range.start.min(len)..selection.range.end.min(len);
        }
        self.normalize();
    }

    fn allocate_id(&mut self) -> SelectionId {
        let id = SelectionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Sort, then merge overlapping selections and drop exact duplicates. Touching selections
    /// stay separate. A merged selection keeps the id of its first member unless the primary
    /// selection was absorbed.
    fn normalize(&mut self) {
        for selection in &mut self.selections {
            if selection.range.start > selection.range.end {
                selection.range = selection.range.end..selection.range.start;
            }
        }
        self.selections
            .sort_by_key(|s| (s.range.start, s.range.end, s.id));

        let primary = self.primary;
        let mut merged: Vec<TextSelection> = Vec::with_capacity(self.selections.len());
        for selection in self.selections.drain(..) {
            match merged.last_mut() {
                Some(last)
                    if selection.range.start < last.range.end
                        || selection.range == last.range =>
                {
                    last.range.end = last.range.end.max(selection.range.end);
                    if selection.id == primary {
                        last.id = primary;
                    }
                }
                _ => merged.push(selection),
            }
        }
        self.selections = merged;
    }
}

/// Formatting attributes of marked text (underline style and the like), opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkedTextAttributes(BTreeMap<String, String>);

impl MarkedTextAttributes {
    /// Empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` if no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A marked range tied to the selection that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedRange {
    /// Owning selection.
    pub selection_id: SelectionId,
    /// Current marked text range.
    pub range: Range<usize>,
    /// The text this composition replaced when it started.
    pub replaced_text: String,
}

/// Tracks the ranges of an in-progress composition.
#[derive(Debug, Clone, Default)]
pub struct MarkedTextTracker {
    ranges: Vec<MarkedRange>,
    attributes: MarkedTextAttributes,
}

impl MarkedTextTracker {
    /// No composition in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a composition is in progress.
    pub fn has_marked_text(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// The marked ranges in document order.
    pub fn ranges(&self) -> &[MarkedRange] {
        &self.ranges
    }

    /// Attributes applied to marked text.
    pub fn attributes(&self) -> &MarkedTextAttributes {
        &self.attributes
    }

    /// Replace the attributes applied to marked text.
    pub fn set_attributes(&mut self, attributes: MarkedTextAttributes) {
        self.attributes = attributes;
    }

    /// The ranges the next composition update replaces: the existing marked ranges when a
    /// composition is in progress, otherwise one range per selection.
    pub fn replacement_targets(&self, selections: &[TextSelection]) -> Vec<(SelectionId, Range<usize>)> {
        if self.ranges.is_empty() {
            selections.iter().map(|s| (s.id, s.range.clone())).collect()
        } else {
            self.ranges
                .iter()
                .map(|m| (m.selection_id, m.range.clone()))
                .collect()
        }
    }

    /// Record the marked ranges after a composition update.
    ///
    /// `updated` holds, per target, the selection id, the start of the inserted marked text and
    /// the text that target replaced; `marked_len` is the length of the marked text. When a
    /// composition was already running, each range keeps the text it originally replaced.
    pub fn update_marked_ranges(
        &mut self,
        updated: Vec<(SelectionId, usize, String)>,
        marked_len: usize,
    ) {
        let previous: BTreeMap<SelectionId, String> = self
            .ranges
            .drain(..)
            .map(|m| (m.selection_id, m.replaced_text))
            .collect();

        self.ranges = updated
            .into_iter()
            .map(|(selection_id, start, replaced)| MarkedRange {
                selection_id,
                range: start..start + marked_len,
                replaced_text: previous.get(&selection_id).cloned().unwrap_or(replaced),
            })
            .collect();
        self.ranges.sort_by_key(|m| m.range.start);
    }

    /// Shift marked ranges through an edit.
    pub fn apply_edit(&mut self, edit: RangeEdit) {
        for marked in &mut self.ranges {
            marked.range = shift_range(marked.range.clone(), edit);
        }
    }

    /// Returns `true` if every marked range still contains a selection.
    pub fn is_backed_by(&self, selections: &[TextSelection]) -> bool {
        self.ranges.iter().all(|marked| {
            selections.iter().any(|s| {
                marked.range.start <= s.range.start && s.range.end <= marked.range.end
            })
        })
    }

    /// End the composition and hand back its ranges.
    pub fn take_ranges(&mut self) -> Vec<MarkedRange> {
        std::mem::take(&mut self.ranges)
    }
}
