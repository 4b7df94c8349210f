//! The seams between the layer set and a parsing backend.
//!
//! A backend supplies a [`GrammarRegistry`] that creates one [`LanguageParser`] per layer. Parsers
//! produce [`SyntaxTree`]s that can be edited in place and diffed against a newer tree. All
//! offsets at these seams are parser bytes (two per UTF-16 unit); text is read on demand through
//! a [`TextReader`] in UTF-16 chunks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::edit::{ByteRange, InputEdit, TextPoint};
use crate::error::SyntaxError;

/// Reads document text on behalf of a parser.
pub trait TextReader {
    /// Document length in parser bytes.
    fn len_bytes(&self) -> usize;

    /// Up to `max_units` UTF-16 units starting at `byte_offset`.
    ///
    /// An empty chunk means end of input. `None` means the text could not be read; the caller
    /// must abort the current parse step.
    fn read_utf16(&self, byte_offset: usize, max_units: usize) -> Option<Vec<u16>>;

    /// Row/column of `byte_offset`.
    fn point_at(&self, byte_offset: usize) -> Option<TextPoint>;

    /// Text of a byte range, decoded lossily.
    fn text_for(&self, range: ByteRange) -> Option<String> {
        let units = range.end.saturating_sub(range.start) / 2;
        let chunk = self.read_utf16(range.start, units)?;
        Some(String::from_utf16_lossy(&chunk))
    }
}

/// Outcome of one parse call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    /// The parse finished.
    Complete(T),
    /// The parse ran out of time; the previous tree stays in use.
    TimedOut,
    /// A read failed; the previous tree stays in use.
    Aborted,
}

/// A node returned by [`SyntaxTree::node_at`], detached from the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    /// Grammar node kind.
    pub kind: String,
    /// Byte range of the node.
    pub byte_range: ByteRange,
    /// Position of the node start.
    pub start_point: TextPoint,
    /// Position of the node end.
    pub end_point: TextPoint,
    /// `true` for named nodes (as opposed to anonymous tokens).
    pub is_named: bool,
}

/// A parsed syntax tree.
///
/// Cloning is expected to be cheap (shared ownership), which is what makes layer-set snapshots
/// cheap.
pub trait SyntaxTree: Clone + Send + Sync + 'static {
    /// Adjust the tree for an edit so it can seed an incremental reparse.
    fn edit(&mut self, edit: &InputEdit);

    /// Byte ranges whose syntactic structure differs between `self` (edited) and `newer`.
    fn changed_ranges(&self, newer: &Self) -> Vec<ByteRange>;

    /// The smallest node enclosing `byte_offset`.
    fn node_at(&self, byte_offset: usize) -> Option<SyntaxNode>;
}

/// An incremental parser bound to one language.
pub trait LanguageParser: Send + 'static {
    /// Tree type produced by this parser.
    type Tree: SyntaxTree;

    /// Restrict parsing to `ranges` (sorted, non-overlapping byte ranges).
    fn set_included_ranges(
        &mut self,
        ranges: &[ByteRange],
        reader: &dyn TextReader,
    ) -> Result<(), SyntaxError>;

    /// Parse the document, reusing `old_tree` (already edited) when given.
    fn parse(
        &mut self,
        reader: &dyn TextReader,
        old_tree: Option<&Self::Tree>,
        timeout: Option<Duration>,
    ) -> ParseOutcome<Self::Tree>;
}

/// Name of a language, as used by injections and registries.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageId(Arc<str>);

impl LanguageId {
    /// Create a language id.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The language name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LanguageId({:?})", &*self.0)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LanguageId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// An embedded region of another language discovered in a parent layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Language of the embedded region.
    pub language: LanguageId,
    /// Byte ranges of the embedded region (one layer may span several ranges).
    pub ranges: Vec<ByteRange>,
}

/// Creates parsers and answers injection queries for registered grammars.
///
/// A registry is shared by every layer set that uses it, possibly across threads.
pub trait GrammarRegistry: Send + Sync + 'static {
    /// Parser type handed to layers.
    type Parser: LanguageParser;

    /// A fresh parser for `language`.
    fn create_parser(&self, language: &LanguageId) -> Result<Self::Parser, SyntaxError>;

    /// Whether layers of `language` are scanned for injections.
    fn supports_injections(&self, language: &LanguageId) -> bool;

    /// Embedded regions found in `tree`.
    fn injections(
        &self,
        language: &LanguageId,
        tree: &<Self::Parser as LanguageParser>::Tree,
        reader: &dyn TextReader,
    ) -> Result<Vec<Injection>, SyntaxError>;
}

/// The tree type produced by a registry's parsers.
pub type TreeOf<R> = <<R as GrammarRegistry>::Parser as LanguageParser>::Tree;
