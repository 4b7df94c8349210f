//! Undo/redo coordination.
//!
//! Every applied text mutation is registered here. Consecutive mutations are folded into one
//! undo group when they look like continuous typing or continuous backspacing:
//!
//! - an insertion continues the previous insertion when it starts exactly where that insertion
//!   ended, is not a lone line break, and (for short mutations) does not switch from
//!   non-whitespace to whitespace-only content;
//! - a deletion continues the previous deletion when it ends exactly where that deletion started
//!   and is not a lone line break;
//! - anything else (mixed polarity, replacements, jumps) starts a new group.
//!
//! Explicit grouping ([`UndoCoordinator::begin_grouping`] / [`UndoCoordinator::end_grouping`])
//! forces everything registered in between into a single group.

use std::ops::Range;

use crate::edit::TextMutation;
use crate::text::{is_single_line_break, is_whitespace_only};

/// Default maximum number of undo groups kept.
pub const DEFAULT_UNDO_LIMIT: usize = 1000;

/// Above this length (UTF-16 units) the whitespace rule no longer splits groups.
const WHITESPACE_SPLIT_LIMIT: usize = 1024;

/// Applies text replacements on behalf of undo and redo.
pub trait UndoTarget {
    /// Replace `range` (UTF-16 units) with `text`.
    fn apply_mutation(&mut self, range: Range<usize>, text: &str);
}

/// An ordered list of mutations undone and redone together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UndoGroup {
    mutations: Vec<TextMutation>,
}

impl UndoGroup {
    /// The mutations, in the order they were applied.
    pub fn mutations(&self) -> &[TextMutation] {
        &self.mutations
    }

    /// Number of mutations.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns `true` if the group holds no mutation.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Records mutations into undo groups and replays them.
#[derive(Debug)]
pub struct UndoCoordinator {
    undo_stack: Vec<UndoGroup>,
    redo_stack: Vec<UndoGroup>,
    max_groups: usize,
    grouping_depth: usize,
    /// Set by `begin_grouping` until the explicit group receives its first mutation.
    explicit_group_pending: bool,
    /// Whether the top group may still absorb a heuristic continuation.
    group_open: bool,
    is_undoing: bool,
    is_redoing: bool,
}

impl Default for UndoCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoCoordinator {
    /// Create a coordinator keeping at most `max_groups` undo groups.
    pub fn new(max_groups: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_groups: max_groups.max(1),
            grouping_depth: 0,
            explicit_group_pending: false,
            group_open: false,
            is_undoing: false,
            is_redoing: false,
        }
    }

    /// Returns `true` if an undo group is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns `true` if a redo group is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undo groups.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redo groups.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// The most recent undo group.
    pub fn last_group(&self) -> Option<&UndoGroup> {
        self.undo_stack.last()
    }

    /// Returns `true` while an undo is replaying.
    pub fn is_undoing(&self) -> bool {
        self.is_undoing
    }

    /// Returns `true` while a redo is replaying.
    pub fn is_redoing(&self) -> bool {
        self.is_redoing
    }

    /// Returns `true` inside `begin_grouping` / `end_grouping`.
    pub fn is_grouping(&self) -> bool {
        self.grouping_depth > 0
    }

    /// Start an explicit group. Nested calls join the outermost group.
    pub fn begin_grouping(&mut self) {
        self.grouping_depth += 1;
        if self.grouping_depth == 1 {
            self.explicit_group_pending = true;
        }
    }

    /// Close an explicit group. Unbalanced calls are ignored.
    pub fn end_grouping(&mut self) {
        if self.grouping_depth == 0 {
            return;
        }
        self.grouping_depth -= 1;
        if self.grouping_depth == 0 {
            self.explicit_group_pending = false;
            self.group_open = false;
        }
    }

    /// Prevent the next mutation from joining the current group (for example after the caret
    /// moved).
    pub fn break_group(&mut self) {
        self.group_open = false;
    }

    /// Record an applied mutation. Ignored while undoing or redoing.
    pub fn register_mutation(&mut self, mutation: TextMutation) {
        if self.is_undoing || self.is_redoing {
            return;
        }
        if mutation.deleted_text.is_empty() && mutation.inserted_text.is_empty() {
            return;
        }
        self.redo_stack.clear();

        if self.grouping_depth > 0 {
            if self.explicit_group_pending {
                self.explicit_group_pending = false;
                self.push_group(mutation);
            } else if let Some(group) = self.undo_stack.last_mut() {
                group.mutations.push(mutation);
            } else {
                self.push_group(mutation);
            }
            return;
        }

        let continues = self.group_open
            && self
                .undo_stack
                .last()
                .and_then(|group| group.mutations.last())
                .is_some_and(|previous| continues_group(previous, &mutation));

        match self.undo_stack.last_mut() {
            Some(group) if continues => group.mutations.push(mutation),
            _ => self.push_group(mutation),
        }
        self.group_open = true;
    }

    /// Undo the most recent group. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self, target: &mut impl UndoTarget) -> bool {
        let Some(group) = self.undo_stack.pop() else {
            return false;
        };

        self.is_undoing = true;
        for mutation in group.mutations.iter().rev() {
            let inverse = mutation.inverse();
            target.apply_mutation(inverse.range, &inverse.inserted_text);
        }
        self.is_undoing = false;

        self.redo_stack.push(group);
        self.group_open = false;
        true
    }

    /// Redo the most recently undone group. Returns `false` if there is nothing to redo.
    pub fn redo(&mut self, target: &mut impl UndoTarget) -> bool {
        let Some(group) = self.redo_stack.pop() else {
            return false;
        };

        self.is_redoing = true;
        for mutation in &group.mutations {
            target.apply_mutation(mutation.range.clone(), &mutation.inserted_text);
        }
        self.is_redoing = false;

        self.undo_stack.push(group);
        self.group_open = false;
        true
    }

    /// Drop all undo and redo history.
    pub fn clear_stack(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.group_open = false;
        self.explicit_group_pending = self.grouping_depth > 0;
    }

    fn push_group(&mut self, mutation: TextMutation) {
        if self.undo_stack.len() >= self.max_groups {
            self.undo_stack.remove(0);
        }
        self.undo_stack.push(UndoGroup {
            mutations: vec![mutation],
        });
    }
}

/// Whether `next` continues the undo group that ends with `previous`.
pub fn continues_group(previous: &TextMutation, next: &TextMutation) -> bool {
    if next.is_deletion() {
        return previous.is_deletion()
            && next.range.end == previous.range.start
            && !is_single_line_break(&next.deleted_text);
    }
    if next.is_insertion() {
        if !previous.is_insertion()
            || next.range.start != previous.range.start + previous.inserted_len()
            || is_single_line_break(&next.inserted_text)
        {
            return false;
        }
        let short = previous.inserted_len() < WHITESPACE_SPLIT_LIMIT
            && next.inserted_len() < WHITESPACE_SPLIT_LIMIT;
        let enters_whitespace = !is_whitespace_only(&previous.inserted_text)
            && is_whitespace_only(&next.inserted_text);
        return !(short && enters_whitespace);
    }
    false
}
