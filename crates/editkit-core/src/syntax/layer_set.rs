//! The language layer set: a primary layer plus every injected layer discovered in it.
//!
//! # Edit flow
//!
//! [`LanguageLayerSet::apply_edit`] walks the layers from the last one to the first:
//!
//! 1. injected layers shift their ranges through the edit; a layer whose ranges all collapsed is
//!    dropped;
//! 2. every surviving tree is edited so it can seed an incremental reparse.
//!
//! Then, unless a newer edit already exists (fast-exit), every layer is reparsed and injections
//! are rescanned: injected layers whose (language, ranges) key is rediscovered survive, an
//! injection that overlaps a not yet rediscovered layer of the same language takes that layer
//! over with its new ranges, other keys get a fresh layer, and layers nobody rediscovered are
//! removed.
//!
//! The result is the list of invalidated byte ranges: the edited region, the ranges whose syntax
//! changed in any layer, and the ranges of created or removed layers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::edit::{ByteRange, InputEdit};
use crate::error::SyntaxError;
use crate::ranges::{RangeEdit, merge_ranges, ranges_overlap, shift_range, subtract_ranges};
use crate::syntax::backend::{GrammarRegistry, LanguageId, SyntaxNode, TextReader, TreeOf};
use crate::syntax::clock::{EditClock, EditTicket};
use crate::syntax::layer::{LanguageLayer, LayerId, LayerParse, LayerState};
use crate::syntax::{SyntaxInvalidation, SyntaxSession};
use crate::text::BYTES_PER_UNIT;

/// Default per-layer parse budget.
pub const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_millis(50);

/// Default cap on the number of layers (primary included).
pub const DEFAULT_MAX_LAYERS: usize = 256;

/// Layer set configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSetConfig {
    /// Time budget for each layer parse. `None` disables the timeout.
    pub parse_timeout: Option<Duration>,
    /// Maximum number of layers; further injections are ignored.
    pub max_layers: usize,
}

impl Default for LayerSetConfig {
    fn default() -> Self {
        Self {
            parse_timeout: Some(DEFAULT_PARSE_TIMEOUT),
            max_layers: DEFAULT_MAX_LAYERS,
        }
    }
}

impl LayerSetConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-layer parse timeout.
    pub fn with_parse_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.parse_timeout = timeout;
        self
    }

    /// Set the layer cap.
    pub fn with_max_layers(mut self, max_layers: usize) -> Self {
        self.max_layers = max_layers.max(1);
        self
    }
}

/// Read-only description of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    /// Layer identity.
    pub id: LayerId,
    /// Layer language.
    pub language: LanguageId,
    /// Covered byte ranges.
    pub ranges: Vec<ByteRange>,
    /// Nesting depth (0 for the primary layer).
    pub depth: usize,
    /// Lifecycle state.
    pub state: LayerState,
    /// Whether a tree is available.
    pub has_tree: bool,
}

/// One layer inside a [`LayerSetSnapshot`].
#[derive(Debug, Clone)]
pub struct LayerSnapshot<T> {
    /// Layer identity.
    pub id: LayerId,
    /// Layer language.
    pub language: LanguageId,
    /// Covered byte ranges.
    pub ranges: Vec<ByteRange>,
    /// Nesting depth (0 for the primary layer).
    pub depth: usize,
    /// The layer's latest tree.
    pub tree: Option<T>,
}

/// A point-in-time copy of every layer, safe to hand to another thread.
#[derive(Debug, Clone)]
pub struct LayerSetSnapshot<T> {
    /// Layers in creation order; the primary layer comes first.
    pub layers: Vec<LayerSnapshot<T>>,
}

impl<T> LayerSetSnapshot<T> {
    /// Layers covering `byte_offset`, innermost first.
    pub fn layers_at(&self, byte_offset: usize) -> Vec<&LayerSnapshot<T>> {
        let mut hits: Vec<(usize, &LayerSnapshot<T>)> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| {
                layer
                    .ranges
                    .iter()
                    .any(|r| r.start <= byte_offset && byte_offset <= r.end)
            })
            .collect();
        hits.sort_by(|(ia, a), (ib, b)| b.depth.cmp(&a.depth).then(ib.cmp(ia)));
        hits.into_iter().map(|(_, layer)| layer).collect()
    }
}

struct InjectionScan {
    invalidated: Vec<ByteRange>,
    incomplete: bool,
}

/// The primary layer plus its injected layers, kept in sync with a document.
pub struct LanguageLayerSet<R: GrammarRegistry> {
    registry: Arc<R>,
    layers: Vec<LanguageLayer<R::Parser>>,
    config: LayerSetConfig,
    clock: EditClock,
    next_layer_id: u64,
    /// Invalidations of edits whose reparse was skipped or abandoned, in current coordinates.
    pending: Vec<ByteRange>,
    /// A full parse was superseded; the next fresh edit parses from scratch.
    full_parse_pending: bool,
}

impl<R: GrammarRegistry> LanguageLayerSet<R> {
    /// Create a layer set whose primary layer parses `language`.
    ///
    /// Nothing is parsed until [`LanguageLayerSet::parse_all`] runs.
    pub fn new(
        registry: Arc<R>,
        language: impl Into<LanguageId>,
        clock: EditClock,
        config: LayerSetConfig,
    ) -> Result<Self, SyntaxError> {
        let language = language.into();
        let parser = registry.create_parser(&language)?;
        let supports_injections = registry.supports_injections(&language);
        let primary = LanguageLayer::new(
            LayerId(0),
            language,
            parser,
            Vec::new(),
            supports_injections,
            0,
        );
        Ok(Self {
            registry,
            layers: vec![primary],
            config,
            clock,
            next_layer_id: 1,
            pending: Vec::new(),
            full_parse_pending: false,
        })
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// The edit clock tickets are checked against.
    pub fn clock(&self) -> &EditClock {
        &self.clock
    }

    /// Current configuration.
    pub fn config(&self) -> &LayerSetConfig {
        &self.config
    }

    /// The primary layer's language.
    pub fn primary_language(&self) -> &LanguageId {
        self.layers[0].language()
    }

    /// Number of layers, primary included.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The layers in creation order; the primary layer comes first.
    pub fn layers(&self) -> &[LanguageLayer<R::Parser>] {
        &self.layers
    }

    /// A description of every layer.
    pub fn layer_infos(&self) -> Vec<LayerInfo> {
        self.layers
            .iter()
            .map(|layer| LayerInfo {
                id: layer.id(),
                language: layer.language().clone(),
                ranges: layer.ranges().to_vec(),
                depth: layer.depth(),
                state: layer.state(),
                has_tree: layer.tree().is_some(),
            })
            .collect()
    }

    /// Copy every layer's ranges and tree.
    pub fn snapshot(&self) -> LayerSetSnapshot<TreeOf<R>> {
        LayerSetSnapshot {
            layers: self
                .layers
                .iter()
                .map(|layer| LayerSnapshot {
                    id: layer.id(),
                    language: layer.language().clone(),
                    ranges: layer.ranges().to_vec(),
                    depth: layer.depth(),
                    tree: layer.tree().cloned(),
                })
                .collect(),
        }
    }

    /// Parse the whole document from scratch and discover injections.
    ///
    /// Returns [`SyntaxInvalidation::Deferred`] if the reader stopped answering; the full parse
    /// is then repeated with the next edit.
    pub fn parse_all(&mut self, reader: &dyn TextReader) -> SyntaxInvalidation {
        self.layers.truncate(1);
        self.pending.clear();
        self.full_parse_pending = false;

        let document = 0..reader.len_bytes();
        self.layers[0].reset();
        self.layers[0].set_ranges(vec![document.clone()]);
        let mut incomplete = false;
        match self.layers[0].reparse(reader, self.config.parse_timeout) {
            LayerParse::Complete(_) => {}
            LayerParse::Aborted => {
                self.full_parse_pending = true;
                return SyntaxInvalidation::Deferred;
            }
            LayerParse::TimedOut | LayerParse::Failed => incomplete = true,
        }

        let scan = self.rescan_injections(reader, HashSet::new());
        incomplete |= scan.incomplete;

        let mut ranges = scan.invalidated;
        ranges.push(document);
        SyntaxInvalidation::Ranges {
            ranges: merge_ranges(ranges),
            parse_incomplete: incomplete,
        }
    }

    /// A full parse whose result only counts if `ticket` is still current when it finishes.
    fn parse_all_for(&mut self, ticket: EditTicket, reader: &dyn TextReader) -> SyntaxInvalidation {
        let invalidation = self.parse_all(reader);
        if self.clock.is_stale(ticket) {
            trace!(ticket = ticket.get(), "full parse superseded");
            self.pending.clear();
            self.full_parse_pending = true;
            return SyntaxInvalidation::Deferred;
        }
        invalidation
    }

    /// Bring every layer up to date with one edit.
    ///
    /// `reader` must already reflect the edit. When `ticket` is stale the trees and ranges are
    /// still adjusted, but reparsing is skipped and [`SyntaxInvalidation::Deferred`] is returned;
    /// the skipped invalidation is reported with the next completed parse.
    pub fn apply_edit(
        &mut self,
        edit: &InputEdit,
        ticket: EditTicket,
        reader: &dyn TextReader,
    ) -> SyntaxInvalidation {
        let range_edit = RangeEdit::from(edit);
        let mut dropped = Vec::new();
        for index in (0..self.layers.len()).rev() {
            if !self.layers[index].apply_edit(edit) {
                let layer = self.layers.remove(index);
                trace!(language = %layer.language(), "injected layer collapsed");
                // The layer's text may be gone entirely; the host text around it still changed.
                let start = edit.start_byte.saturating_sub(BYTES_PER_UNIT);
                let end = (edit.new_end_byte + BYTES_PER_UNIT).min(reader.len_bytes());
                dropped.push(start..end.max(edit.new_end_byte));
            }
        }

        self.pending = self
            .pending
            .drain(..)
            .map(|range| shift_range(range, range_edit))
            .collect();
        self.pending.push(edit.new_range());
        self.pending.extend(dropped);

        if self.clock.is_stale(ticket) {
            trace!(ticket = ticket.get(), "newer edit pending, skipping reparse");
            return SyntaxInvalidation::Deferred;
        }
        if self.full_parse_pending {
            return self.parse_all_for(ticket, reader);
        }

        self.reparse_all(ticket, reader)
    }

    /// Queue ranges to be reported again with the next completed parse.
    pub(crate) fn carry_invalidation(&mut self, ranges: impl IntoIterator<Item = ByteRange>) {
        self.pending.extend(ranges);
    }

    /// Rescan every layer for injections, creating and removing injected layers as needed.
    ///
    /// Returns the byte ranges of layers that were created or removed.
    pub fn update_injected_layers(&mut self, reader: &dyn TextReader) -> Vec<ByteRange> {
        let candidates = self.injected_layer_ids();
        merge_ranges(self.rescan_injections(reader, candidates).invalidated)
    }

    /// The smallest node at `byte_offset` in every layer covering it, innermost layer first.
    pub fn nodes_at(&self, byte_offset: usize) -> Vec<(LayerId, SyntaxNode)> {
        let mut hits: Vec<(usize, usize, LayerId, SyntaxNode)> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.contains(byte_offset))
            .filter_map(|(index, layer)| {
                layer
                    .node_at(byte_offset)
                    .map(|node| (layer.depth(), index, layer.id(), node))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        hits.into_iter().map(|(_, _, id, node)| (id, node)).collect()
    }

    fn reparse_all(&mut self, ticket: EditTicket, reader: &dyn TextReader) -> SyntaxInvalidation {
        let mut invalidated = std::mem::take(&mut self.pending);
        let mut incomplete = false;
        let mut aborted = false;

        for index in (0..self.layers.len()).rev() {
            match self.layers[index].reparse(reader, self.config.parse_timeout) {
                LayerParse::Complete(changed) => invalidated.extend(changed),
                LayerParse::TimedOut => incomplete = true,
                LayerParse::Aborted => aborted = true,
                LayerParse::Failed => {}
            }
        }

        if aborted || self.clock.is_stale(ticket) {
            // The text moved on underneath the parse; report everything with the next edit.
            self.pending = merge_ranges(invalidated);
            return SyntaxInvalidation::Deferred;
        }

        let candidates = self.injected_layer_ids();
        let scan = self.rescan_injections(reader, candidates);
        invalidated.extend(scan.invalidated);

        SyntaxInvalidation::Ranges {
            ranges: merge_ranges(invalidated),
            parse_incomplete: incomplete || scan.incomplete,
        }
    }

    fn injected_layer_ids(&self) -> HashSet<LayerId> {
        self.layers.iter().skip(1).map(|layer| layer.id()).collect()
    }

    /// Walk the layers in order (parents before the layers they inject), matching discovered
    /// injections against existing layers. Layers left in `candidates` afterwards were not
    /// rediscovered and are removed.
    fn rescan_injections(
        &mut self,
        reader: &dyn TextReader,
        mut candidates: HashSet<LayerId>,
    ) -> InjectionScan {
        let mut scan = InjectionScan {
            invalidated: Vec::new(),
            incomplete: false,
        };

        let mut index = 0;
        while index < self.layers.len() {
            let layer = &self.layers[index];
            // An orphaned layer's own injections must not keep their layers alive.
            if candidates.contains(&layer.id()) || !layer.supports_injections() {
                index += 1;
                continue;
            }
            let Some(tree) = layer.tree() else {
                index += 1;
                continue;
            };

            let injections = match self.registry.injections(layer.language(), tree, reader) {
                Ok(injections) => injections,
                Err(error) => {
                    debug!(language = %layer.language(), %error, "injection scan failed");
                    index += 1;
                    continue;
                }
            };
            let depth = layer.depth() + 1;

            for injection in injections {
                let ranges = merge_ranges(injection.ranges);
                if ranges.is_empty() {
                    continue;
                }

                if let Some(existing) = self
                    .layers
                    .iter()
                    .find(|l| *l.language() == injection.language && l.ranges() == ranges)
                {
                    candidates.remove(&existing.id());
                    continue;
                }

                // The same region, grown or shrunk by an edit: keep the layer and its tree.
                if let Some(moved) = self.layers.iter().position(|l| {
                    candidates.contains(&l.id())
                        && l.depth() == depth
                        && *l.language() == injection.language
                        && l.ranges()
                            .iter()
                            .any(|a| ranges.iter().any(|b| ranges_overlap(a, b)))
                }) {
                    let layer = &mut self.layers[moved];
                    candidates.remove(&layer.id());
                    scan.invalidated.extend(ranges_difference(layer.ranges(), &ranges));
                    scan.invalidated.extend(ranges_difference(&ranges, layer.ranges()));
                    trace!(language = %layer.language(), "injected layer ranges moved");
                    layer.set_ranges(ranges);
                    match layer.reparse(reader, self.config.parse_timeout) {
                        LayerParse::Complete(changed) => scan.invalidated.extend(changed),
                        LayerParse::TimedOut | LayerParse::Aborted | LayerParse::Failed => {
                            scan.incomplete = true;
                        }
                    }
                    continue;
                }

                if self.layers.len() >= self.config.max_layers {
                    debug!(language = %injection.language, "layer limit reached, injection ignored");
                    continue;
                }

                if let Some((layer, complete)) =
                    self.create_layer(injection.language, ranges, depth, reader)
                {
                    scan.invalidated.extend(layer.ranges().iter().cloned());
                    scan.incomplete |= !complete;
                    self.layers.push(layer);
                }
            }
            index += 1;
        }

        let mut index = self.layers.len();
        while index > 1 {
            index -= 1;
            if candidates.contains(&self.layers[index].id()) {
                let layer = self.layers.remove(index);
                trace!(language = %layer.language(), "injected layer removed");
                scan.invalidated.extend(layer.ranges().iter().cloned());
            }
        }

        scan
    }

    fn create_layer(
        &mut self,
        language: LanguageId,
        ranges: Vec<ByteRange>,
        depth: usize,
        reader: &dyn TextReader,
    ) -> Option<(LanguageLayer<R::Parser>, bool)> {
        let parser = match self.registry.create_parser(&language) {
            Ok(parser) => parser,
            Err(error) => {
                debug!(%language, %error, "skipping injected layer");
                return None;
            }
        };
        let supports_injections = self.registry.supports_injections(&language);
        let id = LayerId(self.next_layer_id);
        self.next_layer_id += 1;

        let mut layer = LanguageLayer::new(id, language, parser, ranges, supports_injections, depth);
        match layer.reparse(reader, self.config.parse_timeout) {
            LayerParse::Complete(_) => Some((layer, true)),
            LayerParse::TimedOut => Some((layer, false)),
            LayerParse::Aborted | LayerParse::Failed => None,
        }
    }
}

/// The parts of `ranges` not covered by `other`.
fn ranges_difference(ranges: &[ByteRange], other: &[ByteRange]) -> Vec<ByteRange> {
    ranges
        .iter()
        .flat_map(|range| subtract_ranges(range.clone(), other))
        .collect()
}

impl<R: GrammarRegistry> SyntaxSession for LanguageLayerSet<R> {
    fn parse_all(&mut self, ticket: EditTicket, reader: &dyn TextReader) -> SyntaxInvalidation {
        self.parse_all_for(ticket, reader)
    }

    fn apply_edit(
        &mut self,
        edit: &InputEdit,
        ticket: EditTicket,
        reader: &dyn TextReader,
    ) -> SyntaxInvalidation {
        LanguageLayerSet::apply_edit(self, edit, ticket, reader)
    }
}
