#![warn(missing_docs)]
//! Editkit Core - Headless Code-Editing Engine
//!
//! # Overview
//!
//! `editkit-core` keeps a text document and everything derived from it in step across edits:
//! line layout, selections, undo history and incremental syntax trees. It does not render; a
//! front end measures lines, reports their heights and repaints the ranges it is told about.
//!
//! All document offsets are UTF-16 code units. Parser-facing offsets are bytes of the UTF-16
//! encoding, so a parser byte offset is always twice the character offset.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  TextDocument (edit flow, notifications)    │  ← Public API
//! ├──────────────────────┬──────────────────────┤
//! │  Undo Coordinator    │  Selections / IME    │
//! ├──────────────────────┴──────────────────────┤
//! │  Language Layer Set (+ background worker)   │  ← Syntax
//! ├─────────────────────────────────────────────┤
//! │  Edit Translator                            │  ← Edit → line ops + InputEdit
//! ├─────────────────────────────────────────────┤
//! │  Line Storage Tree (red-black, sums)        │  ← Offset / y lookups
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use editkit_core::{SyntaxInvalidation, TextDocument};
//!
//! let mut document = TextDocument::new("let x = 1;\n");
//! let outcome = document.replace(8..9, "42").unwrap();
//!
//! assert_eq!(document.text(), "let x = 42;\n");
//! assert_eq!(outcome.input_edit.start_byte, 16);
//! assert_eq!(outcome.syntax, SyntaxInvalidation::none());
//!
//! // y-based lookups for scrolling
//! let line = document.layout().line_at_y(20.0).unwrap();
//! assert_eq!(line.index, 1);
//! ```
//!
//! # Module Description
//!
//! - [`line_storage`] - red-black order-statistics tree over lines
//! - [`edit_translator`] - replacement → line operations and parser edit
//! - [`layout`] - line heights and layout invalidation
//! - [`syntax`] - language layers, injections, background parsing
//! - [`undo`] - undo groups and the grouping heuristic
//! - [`selection`] - multi-selection and marked text
//! - [`document`] - the coordinator tying them together
//!
//! Syntax backends implement [`syntax::GrammarRegistry`]; `editkit-treesitter` provides one for
//! tree-sitter grammars.

pub mod document;
pub mod edit;
pub mod edit_translator;
pub mod error;
pub mod layout;
pub mod line_ending;
pub mod line_storage;
pub mod ranges;
pub mod selection;
pub mod syntax;
pub mod text;
pub mod undo;

pub use document::{
    DocumentConfig, EditOutcome, InvalidationCallback, InvalidationEvent, RopeReader, TextDocument,
};
pub use edit::{ByteRange, EditPoints, InputEdit, TextMutation, TextPoint};
pub use edit_translator::{LineEditPlan, LineOp, TextSource, TranslatedEdit, translate};
pub use error::{EditError, SyntaxError};
pub use layout::{LayoutConfig, LayoutManager, LayoutRequest, LineId, TextLine};
pub use line_ending::LineEnding;
pub use line_storage::{LineBounds, LinePosition, LineStorage};
pub use ranges::{
    RangeEdit, merge_ranges, shift_range, shift_range_inclusive, subtract_ranges,
};
pub use selection::{
    MarkedRange, MarkedTextAttributes, MarkedTextTracker, SelectionId, SelectionTracker,
    TextSelection,
};
pub use syntax::{
    EditClock, EditTicket, LanguageId, LanguageLayerSet, LayerSetConfig, PlainText,
    SyntaxInvalidation, SyntaxSession, SyntaxUpdate, SyntaxWorker,
};
pub use undo::{UndoCoordinator, UndoGroup, UndoTarget};
