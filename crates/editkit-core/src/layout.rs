//! Layout bookkeeping (headless).
//!
//! The layout manager owns the document's [`LineStorage`]. It does not measure glyphs: new lines
//! get an estimated height and a `needs_layout` flag, and a renderer that lays a line out reports
//! the real height back through [`LayoutManager::set_line_height`]. Vertical queries
//! ([`LayoutManager::line_at_y`], [`LayoutManager::lines_in_y_range`]) always reflect the heights
//! known so far.

use std::ops::Range;

use crate::edit_translator::LineEditPlan;
use crate::line_storage::{LineBounds, LinePosition, LineStorage};
use crate::text::{split_lines_with_endings, utf16_len};

/// Default height used for lines that were never laid out.
pub const DEFAULT_ESTIMATED_LINE_HEIGHT: f64 = 16.0;

/// Layout configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Height given to lines that were not laid out yet.
    pub estimated_line_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            estimated_line_height: DEFAULT_ESTIMATED_LINE_HEIGHT,
        }
    }
}

impl LayoutConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the estimated line height.
    pub fn with_estimated_line_height(mut self, height: f64) -> Self {
        self.estimated_line_height = height;
        self
    }
}

/// Stable identity of a line, preserved while the line is only resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(u64);

impl LineId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Per-line layout payload stored in the line storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    /// Stable identity.
    pub id: LineId,
    /// `true` until a renderer reports a measured height.
    pub needs_layout: bool,
}

/// A line that still has to be laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRequest {
    /// Line identity.
    pub id: LineId,
    /// Line geometry as currently known.
    pub bounds: LineBounds,
}

/// Owns the line storage and tracks which lines need layout.
#[derive(Debug, Clone)]
pub struct LayoutManager {
    storage: LineStorage<TextLine>,
    config: LayoutConfig,
    next_line_id: u64,
}

impl LayoutManager {
    /// Build the line structure for `text`.
    pub fn new(text: &str, config: LayoutConfig) -> Self {
        let mut manager = Self {
            storage: LineStorage::new(),
            config,
            next_line_id: 0,
        };
        manager.rebuild(text);
        manager
    }

    /// Discard every line and rebuild from `text`.
    pub fn rebuild(&mut self, text: &str) {
        let height = self.config.estimated_line_height;
        let lengths: Vec<usize> = split_lines_with_endings(text)
            .into_iter()
            .map(utf16_len)
            .collect();
        let lines: Vec<(TextLine, usize, f64)> = lengths
            .into_iter()
            .map(|length| (self.fresh_line(), length, height))
            .collect();
        self.storage = LineStorage::build(lines);
    }

    /// The underlying line storage.
    pub fn storage(&self) -> &LineStorage<TextLine> {
        &self.storage
    }

    /// Current configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Height given to lines that were not laid out yet.
    pub fn estimated_line_height(&self) -> f64 {
        self.config.estimated_line_height
    }

    /// Change the estimated line height. Every line falls back to the estimate and needs layout
    /// again.
    pub fn set_estimated_line_height(&mut self, height: f64) {
        self.config.estimated_line_height = height;
        self.invalidate_all();
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.storage.count()
    }

    /// Total height of the document.
    pub fn total_height(&self) -> f64 {
        self.storage.height()
    }

    /// The line containing character `offset`.
    pub fn line_at_offset(&self, offset: usize) -> Option<LinePosition<'_, TextLine>> {
        self.storage.get_line(offset)
    }

    /// The line covering vertical position `y`.
    pub fn line_at_y(&self, y: f64) -> Option<LinePosition<'_, TextLine>> {
        self.storage.get_line_at_y(y)
    }

    /// Line `index`.
    pub fn line_at_index(&self, index: usize) -> Option<LinePosition<'_, TextLine>> {
        self.storage.get_line_at_index(index)
    }

    /// Lines intersecting the vertical band `[y, until_y)`.
    pub fn lines_in_y_range(
        &self,
        y: f64,
        until_y: f64,
    ) -> impl Iterator<Item = LinePosition<'_, TextLine>> {
        self.storage.lines_starting_at(y, until_y)
    }

    /// Apply a translated edit to the line structure. Re-segmented lines need layout.
    pub fn apply_plan(&mut self, plan: &LineEditPlan) {
        let height = self.config.estimated_line_height;
        let mut next_line_id = self.next_line_id;
        plan.apply(
            &mut self.storage,
            || {
                let line = TextLine {
                    id: LineId(next_line_id),
                    needs_layout: true,
                };
                next_line_id += 1;
                line
            },
            height,
        );
        self.next_line_id = next_line_id;

        for index in plan.touched_lines.clone() {
            if let Some(line) = self.storage.data_mut_at_index(index) {
                line.needs_layout = true;
            }
        }
    }

    /// Mark every line overlapping the character range `range` as needing layout.
    ///
    /// Returns the number of lines marked.
    pub fn invalidate_layout_for_range(&mut self, range: Range<usize>) -> usize {
        let indices: Vec<usize> = self
            .storage
            .lines_in_range(range)
            .map(|line| line.index)
            .collect();
        for &index in &indices {
            if let Some(line) = self.storage.data_mut_at_index(index) {
                line.needs_layout = true;
            }
        }
        indices.len()
    }

    /// Reset every line to the estimated height and mark it for layout.
    pub fn invalidate_all(&mut self) {
        let height = self.config.estimated_line_height;
        for index in 0..self.storage.count() {
            self.storage.set_height_at_index(index, height);
            if let Some(line) = self.storage.data_mut_at_index(index) {
                line.needs_layout = true;
            }
        }
    }

    /// Lines waiting for layout, in document order.
    pub fn lines_needing_layout(&self) -> Vec<LayoutRequest> {
        self.storage
            .iter()
            .filter(|line| line.data.needs_layout)
            .map(|line| LayoutRequest {
                id: line.data.id,
                bounds: line.bounds(),
            })
            .collect()
    }

    /// Record the measured height of line `index` and clear its `needs_layout` flag.
    ///
    /// Returns `false` if the line does not exist.
    pub fn set_line_height(&mut self, index: usize, height: f64) -> bool {
        if !self.storage.set_height_at_index(index, height) {
            return false;
        }
        if let Some(line) = self.storage.data_mut_at_index(index) {
            line.needs_layout = false;
        }
        true
    }

    fn fresh_line(&mut self) -> TextLine {
        let id = LineId(self.next_line_id);
        self.next_line_id += 1;
        TextLine {
            id,
            needs_layout: true,
        }
    }
}
