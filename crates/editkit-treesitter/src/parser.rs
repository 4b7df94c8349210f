use std::cell::Cell;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use editkit_core::edit::{ByteRange, InputEdit, TextPoint};
use editkit_core::error::SyntaxError;
use editkit_core::syntax::{LanguageParser, ParseOutcome, SyntaxNode, SyntaxTree, TextReader};
use editkit_core::text::BYTES_PER_UNIT;
use tracing::trace;
use tree_sitter::{Node, ParseOptions, ParseState, Parser, Point, Tree};

/// UTF-16 units handed to tree-sitter per read.
const READ_CHUNK_UNITS: usize = 1024;

pub(crate) fn to_point(point: TextPoint) -> Point {
    Point {
        row: point.row,
        column: point.column,
    }
}

fn from_point(point: Point) -> TextPoint {
    TextPoint::new(point.row, point.column)
}

/// A tree-sitter tree over UTF-16 text.
///
/// Cloning shares the underlying tree.
#[derive(Debug, Clone)]
pub struct TreeSitterTree(Tree);

impl TreeSitterTree {
    /// The wrapped tree.
    pub fn tree(&self) -> &Tree {
        &self.0
    }

    /// The root node.
    pub fn root_node(&self) -> Node<'_> {
        self.0.root_node()
    }
}

impl SyntaxTree for TreeSitterTree {
    fn edit(&mut self, edit: &InputEdit) {
        let points = edit.points.unwrap_or_default();
        self.0.edit(&tree_sitter::InputEdit {
            start_byte: edit.start_byte,
            old_end_byte: edit.old_end_byte,
            new_end_byte: edit.new_end_byte,
            start_position: to_point(points.start),
            old_end_position: to_point(points.old_end),
            new_end_position: to_point(points.new_end),
        });
    }

    fn changed_ranges(&self, newer: &Self) -> Vec<ByteRange> {
        self.0
            .changed_ranges(&newer.0)
            .map(|range| range.start_byte..range.end_byte)
            .collect()
    }

    fn node_at(&self, byte_offset: usize) -> Option<SyntaxNode> {
        let node = self
            .0
            .root_node()
            .descendant_for_byte_range(byte_offset, byte_offset)?;
        Some(SyntaxNode {
            kind: node.kind().to_string(),
            byte_range: node.byte_range(),
            start_point: from_point(node.start_position()),
            end_point: from_point(node.end_position()),
            is_named: node.is_named(),
        })
    }
}

/// A tree-sitter parser reading UTF-16 text through a [`TextReader`].
pub struct TreeSitterParser {
    parser: Parser,
    language: String,
}

impl TreeSitterParser {
    pub(crate) fn new(language: &str, grammar: &tree_sitter::Language) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new();
        parser
            .set_language(grammar)
            .map_err(|error| SyntaxError::Language {
                language: language.to_string(),
                message: error.to_string(),
            })?;
        Ok(Self {
            parser,
            language: language.to_string(),
        })
    }
}

impl LanguageParser for TreeSitterParser {
    type Tree = TreeSitterTree;

    fn set_included_ranges(
        &mut self,
        ranges: &[ByteRange],
        reader: &dyn TextReader,
    ) -> Result<(), SyntaxError> {
        let mut included = Vec::with_capacity(ranges.len());
        for range in ranges {
            let (Some(start), Some(end)) = (reader.point_at(range.start), reader.point_at(range.end))
            else {
                return Err(SyntaxError::IncludedRanges(format!(
                    "no position for {}..{}",
                    range.start, range.end
                )));
            };
            included.push(tree_sitter::Range {
                start_byte: range.start,
                end_byte: range.end,
                start_point: to_point(start),
                end_point: to_point(end),
            });
        }
        self.parser
            .set_included_ranges(&included)
            .map_err(|error| SyntaxError::IncludedRanges(format!("{error:?}")))
    }

    fn parse(
        &mut self,
        reader: &dyn TextReader,
        old_tree: Option<&TreeSitterTree>,
        timeout: Option<Duration>,
    ) -> ParseOutcome<TreeSitterTree> {
        let aborted = Cell::new(false);
        let started = Instant::now();

        // Offsets handed to the read callback are UTF-16 units.
        let mut read = |offset: usize, _: Point| -> Vec<u16> {
            if aborted.get() {
                return Vec::new();
            }
            match reader.read_utf16(offset * BYTES_PER_UNIT, READ_CHUNK_UNITS) {
                Some(chunk) => chunk,
                None => {
                    aborted.set(true);
                    Vec::new()
                }
            }
        };
        let mut progress = |_: &ParseState| {
            if aborted.get() || timeout.is_some_and(|limit| started.elapsed() >= limit) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let options = ParseOptions::new().progress_callback(&mut progress);

        let tree = self.parser.parse_utf16_le_with_options(
            &mut read,
            old_tree.map(TreeSitterTree::tree),
            Some(options),
        );

        match tree {
            // A failed read looks like end of input to tree-sitter; the tree is unusable.
            Some(_) if aborted.get() => ParseOutcome::Aborted,
            Some(tree) => ParseOutcome::Complete(TreeSitterTree(tree)),
            None => {
                self.parser.reset();
                if aborted.get() {
                    ParseOutcome::Aborted
                } else {
                    trace!(language = %self.language, elapsed = ?started.elapsed(), "parse cancelled");
                    ParseOutcome::TimedOut
                }
            }
        }
    }
}
