//! Text document coordinator.
//!
//! [`TextDocument`] owns the text and keeps every derived structure in step with it. One
//! replacement flows through the components in a fixed order:
//!
//! 1. the rope is mutated;
//! 2. the edit is translated into line operations and an [`InputEdit`];
//! 3. the line storage applies the operations;
//! 4. selections and marked ranges are shifted;
//! 5. the syntax session receives the edit under a fresh [`EditTicket`];
//! 6. subscribers are notified and the mutation is registered for undo.
//!
//! # Example
//!
//! ```rust
//! use editkit_core::TextDocument;
//!
//! let mut document = TextDocument::new("fn main() {}\n");
//! document.set_selections([11..11]);
//! document.insert_text("\n    println!();\n").unwrap();
//!
//! assert_eq!(document.line_count(), 4);
//! assert!(document.undo());
//! assert_eq!(document.text(), "fn main() {}\n");
//! ```

use std::ops::Range;

use ropey::Rope;
use tracing::{trace, warn};

use crate::edit::{InputEdit, TextMutation, TextPoint};
use crate::edit_translator::{TextSource, translate};
use crate::error::EditError;
use crate::layout::{LayoutConfig, LayoutManager};
use crate::line_ending::LineEnding;
use crate::ranges::RangeEdit;
use crate::selection::{
    MarkedTextAttributes, MarkedTextTracker, SelectionId, SelectionTracker, TextSelection,
    shift_selection,
};
use crate::syntax::{
    EditClock, EditTicket, PlainText, SyntaxInvalidation, SyntaxSession, SyntaxUpdate, TextReader,
};
use crate::text::{BYTES_PER_UNIT, utf16_len};
use crate::undo::{DEFAULT_UNDO_LIMIT, UndoCoordinator, UndoTarget};

/// Document configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConfig {
    /// Layout settings.
    pub layout: LayoutConfig,
    /// Maximum number of undo groups.
    pub undo_limit: usize,
    /// Detect the line-ending style from the initial text (otherwise `\n`).
    pub detect_line_ending: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            undo_limit: DEFAULT_UNDO_LIMIT,
            detect_line_ending: true,
        }
    }
}

impl DocumentConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the layout configuration.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Set the undo limit.
    pub fn with_undo_limit(mut self, undo_limit: usize) -> Self {
        self.undo_limit = undo_limit;
        self
    }

    /// Enable or disable line-ending detection.
    pub fn with_line_ending_detection(mut self, detect: bool) -> Self {
        self.detect_line_ending = detect;
        self
    }
}

/// Sent to subscribers after every edit and every delivered syntax result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    /// Document version after the change.
    pub version: u64,
    /// Ticket of the edit this event belongs to.
    pub ticket: EditTicket,
    /// Character range holding the new text, for edits; `None` for background syntax results.
    pub edited_range: Option<Range<usize>>,
    /// Syntax invalidation, in parser bytes.
    pub syntax: SyntaxInvalidation,
}

/// Invalidation subscriber.
pub type InvalidationCallback = Box<dyn FnMut(&InvalidationEvent) + Send>;

/// What one replacement did.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// The applied mutation.
    pub mutation: TextMutation,
    /// The parser-facing edit.
    pub input_edit: InputEdit,
    /// Ticket the edit was issued under.
    pub ticket: EditTicket,
    /// Immediate syntax invalidation (deferred when parsing runs in the background).
    pub syntax: SyntaxInvalidation,
}

/// Reads a rope in UTF-16 units and parser bytes.
#[derive(Debug, Clone, Copy)]
pub struct RopeReader<'a> {
    rope: &'a Rope,
}

impl<'a> RopeReader<'a> {
    /// Wrap a rope.
    pub fn new(rope: &'a Rope) -> Self {
        Self { rope }
    }
}

impl TextSource for RopeReader<'_> {
    fn len_utf16(&self) -> usize {
        self.rope.len_utf16_cu()
    }

    fn slice_utf16(&self, range: Range<usize>) -> String {
        let start = self.rope.utf16_cu_to_char(range.start);
        let end = self.rope.utf16_cu_to_char(range.end);
        self.rope.slice(start..end).to_string()
    }
}

impl TextReader for RopeReader<'_> {
    fn len_bytes(&self) -> usize {
        self.rope.len_utf16_cu() * BYTES_PER_UNIT
    }

    fn read_utf16(&self, byte_offset: usize, max_units: usize) -> Option<Vec<u16>> {
        let unit = byte_offset / BYTES_PER_UNIT;
        let len = self.rope.len_utf16_cu();
        if unit >= len || max_units == 0 {
            return Some(Vec::new());
        }

        let char_idx = self.rope.utf16_cu_to_char(unit);
        // Starting inside a surrogate pair skips its leading half.
        let mut skip = unit - self.rope.char_to_utf16_cu(char_idx);
        let mut chunk = Vec::with_capacity(max_units.min(len - unit));
        let mut buf = [0u16; 2];
        for c in self.rope.chars_at(char_idx) {
            for &cu in c.encode_utf16(&mut buf).iter() {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
                if chunk.len() == max_units {
                    return Some(chunk);
                }
                chunk.push(cu);
            }
        }
        Some(chunk)
    }

    fn point_at(&self, byte_offset: usize) -> Option<TextPoint> {
        let unit = (byte_offset / BYTES_PER_UNIT).min(self.rope.len_utf16_cu());
        let char_idx = self.rope.utf16_cu_to_char(unit);
        let row = self.rope.char_to_line(char_idx);
        let line_start = self.rope.char_to_utf16_cu(self.rope.line_to_char(row));
        Some(TextPoint::new(row, (unit - line_start) * BYTES_PER_UNIT))
    }
}

/// Everything undo replays against: text and the structures derived from it.
struct EditBuffer<S> {
    rope: Rope,
    layout: LayoutManager,
    selections: SelectionTracker,
    marked_text: MarkedTextTracker,
    line_ending: LineEnding,
    clock: EditClock,
    syntax: S,
    version: u64,
    callbacks: Vec<InvalidationCallback>,
    /// While undo or redo replays a group: one caret per replayed mutation, kept current
    /// through the mutations that follow it.
    replay_carets: Option<Vec<usize>>,
}

impl<S: SyntaxSession> EditBuffer<S> {
    fn reader(&self) -> RopeReader<'_> {
        RopeReader::new(&self.rope)
    }

    fn len_utf16(&self) -> usize {
        self.rope.len_utf16_cu()
    }

    fn char_at_unit(&self, unit: usize) -> Result<usize, EditError> {
        let char_idx = self.rope.utf16_cu_to_char(unit);
        if self.rope.char_to_utf16_cu(char_idx) != unit {
            return Err(EditError::SplitSurrogate { offset: unit });
        }
        Ok(char_idx)
    }

    fn slice(&self, range: Range<usize>) -> String {
        self.reader().slice_utf16(range)
    }

    fn replace(&mut self, range: Range<usize>, text: &str) -> Result<EditOutcome, EditError> {
        EditError::check_range(range.start, range.end, self.len_utf16())?;
        let start = self.char_at_unit(range.start)?;
        let end = self.char_at_unit(range.end)?;

        let deleted = self.rope.slice(start..end).to_string();
        self.rope.remove(start..end);
        self.rope.insert(start, text);

        let translated = translate(
            self.layout.storage(),
            range.clone(),
            text,
            &RopeReader::new(&self.rope),
        )?;
        self.layout.apply_plan(&translated.plan);

        let mutation = TextMutation::new(range, deleted, text);
        let range_edit = RangeEdit::from(&mutation);
        self.selections.apply_edit(range_edit);
        self.marked_text.apply_edit(range_edit);
        if let Some(carets) = &mut self.replay_carets {
            for caret in carets.iter_mut() {
                *caret = shift_selection(*caret..*caret, range_edit).start;
            }
            carets.push(mutation.inserted_range().end);
        }

        let ticket = self.clock.advance();
        let input_edit = translated.input_edit;
        let syntax = self
            .syntax
            .apply_edit(&input_edit, ticket, &RopeReader::new(&self.rope));

        self.version += 1;
        self.notify(&InvalidationEvent {
            version: self.version,
            ticket,
            edited_range: Some(mutation.inserted_range()),
            syntax: syntax.clone(),
        });
        trace!(
            version = self.version,
            ticket = ticket.get(),
            deleted = mutation.deleted_len(),
            inserted = mutation.inserted_len(),
            "edit applied"
        );

        Ok(EditOutcome {
            mutation,
            input_edit,
            ticket,
            syntax,
        })
    }

    fn notify(&mut self, event: &InvalidationEvent) {
        for callback in &mut self.callbacks {
            callback(event);
        }
    }

    fn deliver(&mut self, updates: Vec<SyntaxUpdate>) -> Vec<SyntaxUpdate> {
        let mut delivered = Vec::new();
        for update in updates {
            if update.invalidation.is_deferred() || self.clock.is_stale(update.ticket) {
                trace!(ticket = update.ticket.get(), "stale syntax result discarded");
                continue;
            }
            self.notify(&InvalidationEvent {
                version: self.version,
                ticket: update.ticket,
                edited_range: None,
                syntax: update.invalidation.clone(),
            });
            delivered.push(update);
        }
        delivered
    }
}

impl<S: SyntaxSession> UndoTarget for EditBuffer<S> {
    fn apply_mutation(&mut self, range: Range<usize>, text: &str) {
        if let Err(error) = self.replace(range, text) {
            warn!(%error, "undo replay rejected");
        }
    }
}

/// A text document with line layout, selections, undo and incremental syntax.
///
/// All character offsets are UTF-16 code units. The document must be mutated from one thread;
/// a background [`crate::syntax::SyntaxWorker`] reads through the bridge served by
/// [`TextDocument::poll_syntax`] and [`TextDocument::wait_for_syntax`].
pub struct TextDocument<S: SyntaxSession = PlainText> {
    buffer: EditBuffer<S>,
    undo: UndoCoordinator,
}

impl TextDocument {
    /// A plain-text document with the default configuration.
    pub fn new(text: &str) -> Self {
        Self::with_config(text, DocumentConfig::default())
    }

    /// A plain-text document.
    pub fn with_config(text: &str, config: DocumentConfig) -> Self {
        Self::build(text, config, EditClock::new(), PlainText)
    }
}

impl<S: SyntaxSession> TextDocument<S> {
    /// A document with a syntax session.
    ///
    /// `make` receives the document's edit clock and builds the session; the whole document is
    /// then parsed once.
    pub fn with_syntax<E>(
        text: &str,
        config: DocumentConfig,
        make: impl FnOnce(EditClock) -> Result<S, E>,
    ) -> Result<Self, E> {
        let clock = EditClock::new();
        let syntax = make(clock.clone())?;
        let mut document = Self::build(text, config, clock, syntax);

        let buffer = &mut document.buffer;
        let ticket = buffer.clock.advance();
        let syntax = buffer
            .syntax
            .parse_all(ticket, &RopeReader::new(&buffer.rope));
        if !syntax.is_deferred() {
            let version = buffer.version;
            buffer.notify(&InvalidationEvent {
                version,
                ticket,
                edited_range: None,
                syntax,
            });
        }
        Ok(document)
    }

    fn build(text: &str, config: DocumentConfig, clock: EditClock, syntax: S) -> Self {
        let line_ending = if config.detect_line_ending {
            LineEnding::detect_in_text(text)
        } else {
            LineEnding::default()
        };
        Self {
            buffer: EditBuffer {
                rope: Rope::from_str(text),
                layout: LayoutManager::new(text, config.layout),
                selections: SelectionTracker::new(),
                marked_text: MarkedTextTracker::new(),
                line_ending,
                clock,
                syntax,
                version: 0,
                callbacks: Vec::new(),
                replay_carets: None,
            },
            undo: UndoCoordinator::new(config.undo_limit),
        }
    }

    /// The whole text.
    pub fn text(&self) -> String {
        self.buffer.rope.to_string()
    }

    /// The underlying rope.
    pub fn rope(&self) -> &Rope {
        &self.buffer.rope
    }

    /// A reader over the current text.
    pub fn reader(&self) -> RopeReader<'_> {
        self.buffer.reader()
    }

    /// Length in UTF-16 units.
    pub fn len_utf16(&self) -> usize {
        self.buffer.len_utf16()
    }

    /// Returns `true` for an empty document.
    pub fn is_empty(&self) -> bool {
        self.buffer.rope.len_chars() == 0
    }

    /// Number of lines (a trailing line break starts a final empty line).
    pub fn line_count(&self) -> usize {
        self.buffer.layout.line_count()
    }

    /// Text of line `index`, terminator included.
    pub fn line_text(&self, index: usize) -> Option<String> {
        let line = self.buffer.layout.line_at_index(index)?;
        Some(self.buffer.slice(line.range))
    }

    /// Text of a character range.
    pub fn slice(&self, range: Range<usize>) -> Result<String, EditError> {
        EditError::check_range(range.start, range.end, self.len_utf16())?;
        Ok(self.buffer.slice(range))
    }

    /// The line-ending style used for new line breaks.
    pub fn line_ending(&self) -> LineEnding {
        self.buffer.line_ending
    }

    /// Change the line-ending style used for new line breaks. Existing text is untouched.
    pub fn set_line_ending(&mut self, line_ending: LineEnding) {
        self.buffer.line_ending = line_ending;
    }

    /// Incremented on every edit.
    pub fn version(&self) -> u64 {
        self.buffer.version
    }

    /// The document's edit clock.
    pub fn clock(&self) -> &EditClock {
        &self.buffer.clock
    }

    /// Line layout.
    pub fn layout(&self) -> &LayoutManager {
        &self.buffer.layout
    }

    /// Line layout, for reporting measured heights.
    pub fn layout_mut(&mut self) -> &mut LayoutManager {
        &mut self.buffer.layout
    }

    /// The syntax session.
    pub fn syntax(&self) -> &S {
        &self.buffer.syntax
    }

    /// The syntax session, mutably.
    pub fn syntax_mut(&mut self) -> &mut S {
        &mut self.buffer.syntax
    }

    /// Undo history.
    pub fn undo_coordinator(&self) -> &UndoCoordinator {
        &self.undo
    }

    /// Subscribe to invalidation events.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&InvalidationEvent) + Send + 'static,
    {
        self.buffer.callbacks.push(Box::new(callback));
    }

    // Editing

    /// Replace `range` with `text`. The edit is recorded for undo.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<EditOutcome, EditError> {
        let outcome = self.buffer.replace(range, text)?;
        self.undo.register_mutation(outcome.mutation.clone());
        self.reconcile_marked_text();
        Ok(outcome)
    }

    /// Insert `text` at `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<EditOutcome, EditError> {
        self.replace(offset..offset, text)
    }

    /// Delete `range`.
    pub fn delete(&mut self, range: Range<usize>) -> Result<EditOutcome, EditError> {
        self.replace(range, "")
    }

    /// Type `text` at every selection, leaving a caret after each insertion.
    ///
    /// During a composition the marked text is replaced instead, which commits it.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditError> {
        if self.buffer.marked_text.has_marked_text() {
            let len = utf16_len(text);
            self.set_marked_text(text, len..len, MarkedTextAttributes::new())?;
            self.unmark_text();
            return Ok(());
        }

        let targets: Vec<(SelectionId, Range<usize>)> = self
            .buffer
            .selections
            .selections()
            .iter()
            .map(|s| (s.id, s.range.clone()))
            .collect();
        let placed = self.replace_targets(targets, text, true)?;

        let inserted = utf16_len(text);
        for (id, start, _) in placed {
            let caret = start + inserted;
            self.buffer.selections.set_range(id, caret..caret);
        }
        Ok(())
    }

    /// Insert a line break in the document's line-ending style at every selection.
    pub fn insert_line_break(&mut self) -> Result<(), EditError> {
        let line_ending = self.buffer.line_ending;
        self.insert_text(line_ending.as_str())
    }

    /// Delete every non-empty selection, or the character before every caret.
    ///
    /// A `\r\n` pair and a surrogate pair are each deleted as one character.
    pub fn delete_backward(&mut self) -> Result<(), EditError> {
        if self.buffer.marked_text.has_marked_text() {
            self.unmark_text();
        }

        let mut targets = Vec::new();
        for selection in self.buffer.selections.selections() {
            let range = if selection.is_caret() {
                let caret = selection.range.start;
                caret - self.previous_char_len(caret)..caret
            } else {
                selection.range.clone()
            };
            if !range.is_empty() {
                targets.push((selection.id, range));
            }
        }
        let placed = self.replace_targets(targets, "", true)?;
        for (id, start, _) in placed {
            self.buffer.selections.set_range(id, start..start);
        }
        Ok(())
    }

    fn previous_char_len(&self, offset: usize) -> usize {
        let rope = &self.buffer.rope;
        let char_idx = rope.utf16_cu_to_char(offset);
        if char_idx == 0 {
            return 0;
        }
        let previous = rope.char(char_idx - 1);
        if previous == '\n' && char_idx >= 2 && rope.char(char_idx - 2) == '\r' {
            return 2;
        }
        previous.len_utf16()
    }

    /// Replace non-overlapping targets with `text`, last target first.
    ///
    /// Returns, per target in document order, the selection id, the start of the inserted text
    /// in the final document and the replaced text.
    fn replace_targets(
        &mut self,
        mut targets: Vec<(SelectionId, Range<usize>)>,
        text: &str,
        record: bool,
    ) -> Result<Vec<(SelectionId, usize, String)>, EditError> {
        targets.sort_by_key(|(_, range)| range.start);
        let len = self.len_utf16();
        for (_, range) in &targets {
            EditError::check_range(range.start, range.end, len)?;
            self.buffer.char_at_unit(range.start)?;
            self.buffer.char_at_unit(range.end)?;
        }

        let grouped = record && targets.len() > 1;
        if grouped {
            self.undo.begin_grouping();
        }

        let mut replaced = Vec::with_capacity(targets.len());
        let mut result = Ok(());
        for (_, range) in targets.iter().rev() {
            match self.buffer.replace(range.clone(), text) {
                Ok(outcome) => {
                    replaced.push(outcome.mutation.deleted_text.clone());
                    if record {
                        self.undo.register_mutation(outcome.mutation);
                    }
                }
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }

        if grouped {
            self.undo.end_grouping();
        }
        result?;

        replaced.reverse();
        let inserted = utf16_len(text) as isize;
        let mut shift: isize = 0;
        let placed = targets
            .into_iter()
            .zip(replaced)
            .map(|((id, range), replaced_text)| {
                let start = range.start.saturating_add_signed(shift);
                shift += inserted - range.len() as isize;
                (id, start, replaced_text)
            })
            .collect();
        Ok(placed)
    }

    // Selections and marked text

    /// The selections in document order.
    pub fn selections(&self) -> &[TextSelection] {
        self.buffer.selections.selections()
    }

    /// Replace every selection. Ranges are clamped to the document and merged where they
    /// overlap. A composition whose marked range no longer holds a selection is committed.
    pub fn set_selections(
        &mut self,
        ranges: impl IntoIterator<Item = Range<usize>>,
    ) -> Vec<SelectionId> {
        let before = self.buffer.selections.ranges();
        let ids = self.buffer.selections.set_ranges(ranges);
        self.buffer.selections.clamp_to(self.len_utf16());
        if self.buffer.selections.ranges() != before {
            self.undo.break_group();
        }
        self.reconcile_marked_text();
        ids
    }

    /// The composition tracker.
    pub fn marked_text(&self) -> &MarkedTextTracker {
        &self.buffer.marked_text
    }

    /// Start or update a composition.
    ///
    /// `text` replaces the current marked ranges (or, when no composition is running, every
    /// selection). `selected` is the selection inside the marked text. Marked text is
    /// provisional: it only enters the undo history when the composition ends.
    pub fn set_marked_text(
        &mut self,
        text: &str,
        selected: Range<usize>,
        attributes: MarkedTextAttributes,
    ) -> Result<(), EditError> {
        let targets = self
            .buffer
            .marked_text
            .replacement_targets(self.buffer.selections.selections());
        let placed = self.replace_targets(targets, text, false)?;

        let marked_len = utf16_len(text);
        let selected = selected.start.min(marked_len)..selected.end.min(marked_len);
        for (id, start, _) in &placed {
            self.buffer
                .selections
                .set_range(*id, start + selected.start..start + selected.end);
        }
        self.buffer.marked_text.update_marked_ranges(placed, marked_len);
        self.buffer.marked_text.set_attributes(attributes);
        if marked_len == 0 {
            // Nothing left to compose.
            self.unmark_text();
        }
        Ok(())
    }

    /// End the composition, keeping the marked text, and record it for undo as one group.
    pub fn unmark_text(&mut self) {
        let ranges = self.buffer.marked_text.take_ranges();
        let mutations: Vec<TextMutation> = ranges
            .into_iter()
            .map(|marked| {
                let text = self.buffer.slice(marked.range.clone());
                let start = marked.range.start;
                TextMutation::new(
                    start..start + utf16_len(&marked.replaced_text),
                    marked.replaced_text,
                    text,
                )
            })
            .collect();
        if mutations.is_empty() {
            return;
        }

        let grouped = mutations.len() > 1;
        if grouped {
            self.undo.begin_grouping();
        }
        // Ascending order: each mutation's range is valid once the earlier ones are applied.
        for mutation in mutations {
            self.undo.register_mutation(mutation);
        }
        if grouped {
            self.undo.end_grouping();
        }
        self.undo.break_group();
    }

    fn reconcile_marked_text(&mut self) {
        let marked = &self.buffer.marked_text;
        if marked.has_marked_text() && !marked.is_backed_by(self.buffer.selections.selections()) {
            trace!("selection left the marked range, committing composition");
            self.unmark_text();
        }
    }

    // Undo

    /// Undo the last group. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.unmark_text();
        self.buffer.replay_carets = Some(Vec::new());
        let undone = self.undo.undo(&mut self.buffer);
        self.place_replay_carets();
        undone
    }

    /// Redo the last undone group. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.unmark_text();
        self.buffer.replay_carets = Some(Vec::new());
        let redone = self.undo.redo(&mut self.buffer);
        self.place_replay_carets();
        redone
    }

    /// One caret at the end of each replayed mutation; selections are untouched when nothing
    /// was replayed.
    fn place_replay_carets(&mut self) {
        let Some(carets) = self.buffer.replay_carets.take() else {
            return;
        };
        if carets.is_empty() {
            return;
        }
        let len = self.len_utf16();
        self.buffer
            .selections
            .set_ranges(carets.into_iter().map(|caret| caret.min(len)..caret.min(len)));
    }

    /// Returns `true` if there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Returns `true` if there is something to redo.
    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Group every edit until the matching [`TextDocument::end_undo_grouping`].
    pub fn begin_undo_grouping(&mut self) {
        self.undo.begin_grouping();
    }

    /// Close the group opened by [`TextDocument::begin_undo_grouping`].
    pub fn end_undo_grouping(&mut self) {
        self.undo.end_grouping();
    }

    /// Drop the undo history.
    pub fn clear_undo_history(&mut self) {
        self.undo.clear_stack();
    }

    // Syntax

    /// Serve pending background reads and deliver finished syntax results.
    ///
    /// Results for edits that have since been superseded are discarded.
    pub fn poll_syntax(&mut self) -> Vec<SyntaxUpdate> {
        let buffer = &mut self.buffer;
        let updates = buffer.syntax.poll(&RopeReader::new(&buffer.rope));
        buffer.deliver(updates)
    }

    /// Block until a syntax result for the latest edit arrives, serving reads meanwhile.
    ///
    /// Returns `None` once no background work is outstanding.
    pub fn wait_for_syntax(&mut self) -> Option<SyntaxUpdate> {
        loop {
            let buffer = &mut self.buffer;
            let update = buffer.syntax.wait(&RopeReader::new(&buffer.rope))?;
            if let Some(update) = buffer.deliver(vec![update]).pop() {
                return Some(update);
            }
        }
    }
}
