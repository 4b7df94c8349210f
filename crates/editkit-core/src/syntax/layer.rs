//! A single language layer: one parser, its latest tree and the byte ranges it covers.

use std::time::Duration;

use tracing::{debug, trace};

use crate::edit::{ByteRange, InputEdit};
use crate::ranges::{RangeEdit, merge_ranges, shift_range_inclusive};
use crate::syntax::backend::{
    LanguageId, LanguageParser, ParseOutcome, SyntaxNode, SyntaxTree, TextReader,
};

/// Stable identity of a layer within its layer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) u64);

impl LayerId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Where a layer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Created, never parsed successfully.
    Unparsed,
    /// Parsed, no edit since.
    Parsed,
    /// An edit was applied to the tree and ranges; a reparse is due.
    EditApplied,
    /// Reparsed after an edit.
    Reparsed,
}

/// Result of reparsing one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LayerParse {
    /// Finished; the byte ranges whose syntax changed.
    Complete(Vec<ByteRange>),
    /// Timed out; the previous tree stays in use.
    TimedOut,
    /// A read failed; the previous tree stays in use.
    Aborted,
    /// The parser rejected the layer configuration.
    Failed,
}

/// One parser plus the tree and ranges it owns.
pub struct LanguageLayer<P: LanguageParser> {
    id: LayerId,
    language: LanguageId,
    parser: P,
    tree: Option<P::Tree>,
    ranges: Vec<ByteRange>,
    supports_injections: bool,
    depth: usize,
    state: LayerState,
}

impl<P: LanguageParser> LanguageLayer<P> {
    pub(crate) fn new(
        id: LayerId,
        language: LanguageId,
        parser: P,
        ranges: Vec<ByteRange>,
        supports_injections: bool,
        depth: usize,
    ) -> Self {
        Self {
            id,
            language,
            parser,
            tree: None,
            ranges: merge_ranges(ranges),
            supports_injections,
            depth,
            state: LayerState::Unparsed,
        }
    }

    /// Layer identity.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Layer language.
    pub fn language(&self) -> &LanguageId {
        &self.language
    }

    /// The latest complete tree.
    pub fn tree(&self) -> Option<&P::Tree> {
        self.tree.as_ref()
    }

    /// Byte ranges covered by the layer.
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// Nesting depth: 0 for the primary layer, parent depth + 1 for injected layers.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Lifecycle state.
    pub fn state(&self) -> LayerState {
        self.state
    }

    /// Whether the layer is scanned for injections.
    pub fn supports_injections(&self) -> bool {
        self.supports_injections
    }

    pub(crate) fn is_primary(&self) -> bool {
        self.depth == 0
    }

    /// Whether `byte_offset` falls within the layer. A range end counts as inside, so that a
    /// caret right after embedded text still resolves into it.
    pub fn contains(&self, byte_offset: usize) -> bool {
        self.ranges
            .iter()
            .any(|range| range.start <= byte_offset && byte_offset <= range.end)
    }

    pub(crate) fn set_ranges(&mut self, ranges: Vec<ByteRange>) {
        self.ranges = ranges;
    }

    /// Forget the tree so the next parse starts from scratch.
    pub(crate) fn reset(&mut self) {
        self.tree = None;
        self.state = LayerState::Unparsed;
    }

    /// Shift ranges and the tree through an edit. Returns `false` if every range collapsed.
    pub(crate) fn apply_edit(&mut self, edit: &InputEdit) -> bool {
        let range_edit = RangeEdit::from(edit);
        if self.is_primary() {
            let end = self.ranges.last().map_or(0, |range| range.end);
            self.ranges = vec![0..end.saturating_add_signed(edit.delta())];
        } else {
            let shifted = self
                .ranges
                .iter()
                .map(|range| shift_range_inclusive(range.clone(), range_edit))
                .collect();
            self.ranges = merge_ranges(shifted);
            if self.ranges.is_empty() {
                return false;
            }
        }
        if let Some(tree) = self.tree.as_mut() {
            tree.edit(edit);
        }
        self.state = LayerState::EditApplied;
        true
    }

    /// Parse (or reparse) the layer against the current text.
    pub(crate) fn reparse(&mut self, reader: &dyn TextReader, timeout: Option<Duration>) -> LayerParse {
        if !self.is_primary()
            && let Err(error) = self.parser.set_included_ranges(&self.ranges, reader)
        {
            debug!(language = %self.language, %error, "included ranges rejected");
            return LayerParse::Failed;
        }

        match self.parser.parse(reader, self.tree.as_ref(), timeout) {
            ParseOutcome::Complete(new_tree) => {
                if self.is_primary() {
                    self.ranges = vec![0..reader.len_bytes()];
                }
                let changed = match &self.tree {
                    Some(old_tree) => old_tree.changed_ranges(&new_tree),
                    None => self.ranges.clone(),
                };
                self.state = match self.state {
                    LayerState::Unparsed => LayerState::Parsed,
                    _ => LayerState::Reparsed,
                };
                self.tree = Some(new_tree);
                trace!(language = %self.language, changed = changed.len(), "layer parsed");
                LayerParse::Complete(changed)
            }
            ParseOutcome::TimedOut => {
                debug!(language = %self.language, ?timeout, "parse timed out");
                LayerParse::TimedOut
            }
            ParseOutcome::Aborted => {
                debug!(language = %self.language, "parse aborted");
                LayerParse::Aborted
            }
        }
    }

    pub(crate) fn node_at(&self, byte_offset: usize) -> Option<SyntaxNode> {
        self.tree.as_ref()?.node_at(byte_offset)
    }
}
