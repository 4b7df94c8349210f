//! Incremental syntax synchronization.
//!
//! - [`backend`]: the traits a parsing backend implements
//! - [`layer`] / [`layer_set`]: the primary layer and its injected layers
//! - [`clock`]: the edit counter behind fast-exit
//! - [`read_bridge`] / [`worker`]: parsing on a background thread while the document stays on
//!   its owning thread
//!
//! A document talks to all of this through [`SyntaxSession`].

pub mod backend;
pub mod clock;
pub mod layer;
pub mod layer_set;
pub mod read_bridge;
pub mod worker;

pub use backend::{
    GrammarRegistry, Injection, LanguageId, LanguageParser, ParseOutcome, SyntaxNode, SyntaxTree,
    TextReader, TreeOf,
};
pub use clock::{EditClock, EditTicket};
pub use layer::{LanguageLayer, LayerId, LayerState};
pub use layer_set::{
    DEFAULT_MAX_LAYERS, DEFAULT_PARSE_TIMEOUT, LanguageLayerSet, LayerInfo, LayerSetConfig,
    LayerSetSnapshot, LayerSnapshot,
};
pub use read_bridge::{BridgedReader, ReadBridgeHost, read_bridge};
pub use worker::SyntaxWorker;

use crate::edit::{ByteRange, InputEdit};

/// What an edit invalidated, syntax-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxInvalidation {
    /// Byte ranges whose highlighting must be recomputed.
    Ranges {
        /// Sorted, merged byte ranges.
        ranges: Vec<ByteRange>,
        /// At least one layer timed out and kept its previous tree.
        parse_incomplete: bool,
    },
    /// No result for this edit. Either a newer edit superseded it or the parse runs elsewhere;
    /// the ranges are reported with a later update.
    Deferred,
}

impl SyntaxInvalidation {
    /// An empty, complete invalidation.
    pub fn none() -> Self {
        Self::Ranges {
            ranges: Vec::new(),
            parse_incomplete: false,
        }
    }

    /// The invalidated ranges, empty when deferred.
    pub fn ranges(&self) -> &[ByteRange] {
        match self {
            Self::Ranges { ranges, .. } => ranges,
            Self::Deferred => &[],
        }
    }

    /// Returns `true` for [`SyntaxInvalidation::Deferred`].
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }

    /// Returns `true` if some layer timed out.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::Ranges {
                parse_incomplete: true,
                ..
            }
        )
    }
}

/// A syntax result delivered after the edit that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxUpdate {
    /// Ticket of the edit (or full parse) this result belongs to.
    pub ticket: EditTicket,
    /// What the parse invalidated.
    pub invalidation: SyntaxInvalidation,
}

/// Syntax state attached to a document.
///
/// Offsets passed in and out are parser bytes. `reader` always reflects the document after the
/// edit being reported.
pub trait SyntaxSession {
    /// Parse the whole document.
    fn parse_all(&mut self, ticket: EditTicket, reader: &dyn TextReader) -> SyntaxInvalidation;

    /// Bring the syntax state up to date with one edit.
    fn apply_edit(
        &mut self,
        edit: &InputEdit,
        ticket: EditTicket,
        reader: &dyn TextReader,
    ) -> SyntaxInvalidation;

    /// Collect results that completed since the last call, serving any pending reads.
    fn poll(&mut self, reader: &dyn TextReader) -> Vec<SyntaxUpdate> {
        let _ = reader;
        Vec::new()
    }

    /// Block until the next result arrives, serving reads meanwhile.
    ///
    /// Returns `None` when no work is outstanding.
    fn wait(&mut self, reader: &dyn TextReader) -> Option<SyntaxUpdate> {
        let _ = reader;
        None
    }
}

/// No syntax: every edit invalidates nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainText;

impl SyntaxSession for PlainText {
    fn parse_all(&mut self, _ticket: EditTicket, _reader: &dyn TextReader) -> SyntaxInvalidation {
        SyntaxInvalidation::none()
    }

    fn apply_edit(
        &mut self,
        _edit: &InputEdit,
        _ticket: EditTicket,
        _reader: &dyn TextReader,
    ) -> SyntaxInvalidation {
        SyntaxInvalidation::none()
    }
}
