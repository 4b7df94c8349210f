//! Highlight capture collection over a layer-set snapshot.

use editkit_core::edit::ByteRange;
use editkit_core::{merge_ranges, subtract_ranges};
use editkit_core::syntax::{LanguageId, LayerSetSnapshot, TextReader};
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, QueryCursor};

use crate::parser::TreeSitterTree;
use crate::registry::{TreeSitterRegistry, node_text};

/// One highlighted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Byte range of the span.
    pub range: ByteRange,
    /// Capture name, e.g. `"keyword"` or `"string.special"`.
    pub capture: String,
    /// Language of the layer that produced the span.
    pub language: LanguageId,
    /// Depth of that layer (0 for the primary layer).
    pub depth: usize,
}

impl TreeSitterRegistry {
    /// Highlight captures intersecting `range`, sorted by position.
    ///
    /// Where an injected layer covers text, only its captures are reported there: host captures
    /// are cut around the injected ranges. Layers without a tree or without a usable highlights
    /// query contribute nothing.
    pub fn highlights(
        &self,
        snapshot: &LayerSetSnapshot<TreeSitterTree>,
        range: ByteRange,
        reader: &dyn TextReader,
    ) -> Vec<HighlightSpan> {
        let mut spans = Vec::new();
        let mut cursor = QueryCursor::new();

        for layer in &snapshot.layers {
            let Some(tree) = &layer.tree else {
                continue;
            };
            let query = match self.highlights_query(&layer.language) {
                Ok(query) => query,
                Err(error) => {
                    debug!(language = %layer.language, %error, "no highlights for layer");
                    continue;
                }
            };

            // Layers nested deeper than this one own the text they cover.
            let covered = merge_ranges(
                snapshot
                    .layers
                    .iter()
                    .filter(|other| other.depth > layer.depth)
                    .flat_map(|other| other.ranges.iter().cloned())
                    .collect(),
            );

            for layer_range in &layer.ranges {
                let window = layer_range.start.max(range.start)..layer_range.end.min(range.end);
                if window.start >= window.end {
                    continue;
                }
                cursor.set_byte_range(window.clone());
                let mut captures = cursor.captures(query, tree.root_node(), |node: Node<'_>| {
                    std::iter::once(node_text(reader, node))
                });
                while let Some((m, index)) = captures.next() {
                    let capture = m.captures[*index];
                    let node_range = capture.node.byte_range();
                    let clipped =
                        node_range.start.max(window.start)..node_range.end.min(window.end);
                    let name = query.capture_names()[capture.index as usize];
                    for piece in subtract_ranges(clipped, &covered) {
                        spans.push(HighlightSpan {
                            range: piece,
                            capture: name.to_string(),
                            language: layer.language.clone(),
                            depth: layer.depth,
                        });
                    }
                }
            }
        }

        spans.sort_by(|a, b| {
            (a.range.start, a.range.end, a.depth).cmp(&(b.range.start, b.range.end, b.depth))
        });
        spans.dedup();
        spans
    }
}
