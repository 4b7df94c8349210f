mod common;

use std::ops::Range;
use std::sync::Arc;

use common::{StrReader, ToyRegistry, byte_range_of};
use editkit_core::edit::InputEdit;
use editkit_core::syntax::{
    EditClock, LanguageLayerSet, LayerSetConfig, LayerState, SyntaxInvalidation,
};
use pretty_assertions::assert_eq;

struct Harness {
    text: String,
    clock: EditClock,
    registry: Arc<ToyRegistry>,
    layers: LanguageLayerSet<ToyRegistry>,
}

impl Harness {
    fn new(text: &str) -> Self {
        Self::with_config(text, LayerSetConfig::default())
    }

    fn with_config(text: &str, config: LayerSetConfig) -> Self {
        let registry = Arc::new(ToyRegistry::new());
        let clock = EditClock::new();
        let mut layers =
            LanguageLayerSet::new(Arc::clone(&registry), "tmpl", clock.clone(), config).unwrap();
        layers.parse_all(&StrReader::new(text));
        Self {
            text: text.to_string(),
            clock,
            registry,
            layers,
        }
    }

    /// ASCII-only replacement.
    fn replace(&mut self, range: Range<usize>, replacement: &str) -> SyntaxInvalidation {
        let edit = self.mutate(range, replacement);
        let ticket = self.clock.advance();
        self.layers
            .apply_edit(&edit, ticket, &StrReader::new(&self.text))
    }

    fn mutate(&mut self, range: Range<usize>, replacement: &str) -> InputEdit {
        self.text.replace_range(range.clone(), replacement);
        InputEdit::from_char_range(range, replacement.len())
    }

    fn languages(&self) -> Vec<String> {
        self.layers
            .layer_infos()
            .into_iter()
            .map(|info| info.language.to_string())
            .collect()
    }
}

#[test]
fn test_parse_all_discovers_injections() {
    let text = "intro <js> let a = 1 </js> outro";
    let mut layers = LanguageLayerSet::new(
        Arc::new(ToyRegistry::new()),
        "tmpl",
        EditClock::new(),
        LayerSetConfig::default(),
    )
    .unwrap();
    let reader = StrReader::new(text);

    let invalidation = layers.parse_all(&reader);

    assert_eq!(invalidation.ranges(), &[0..text.len() * 2]);
    assert!(!invalidation.is_incomplete());
    let infos = layers.layer_infos();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].depth, 0);
    assert_eq!(infos[0].state, LayerState::Parsed);
    assert_eq!(infos[1].language.as_str(), "js");
    assert_eq!(infos[1].depth, 1);
    assert_eq!(infos[1].ranges, vec![byte_range_of(text, " let a = 1 ")]);
    assert!(infos[1].has_tree);
}

#[test]
fn test_edit_inside_injection_keeps_layer() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");
    let js_id = harness.layers.layer_infos()[1].id;

    let invalidation = harness.replace(19..20, "22");

    let infos = harness.layers.layer_infos();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].id, js_id);
    assert_eq!(infos[1].ranges, vec![byte_range_of(&harness.text, " let a = 22 ")]);
    assert_eq!(infos[0].state, LayerState::Reparsed);
    assert!(
        invalidation
            .ranges()
            .iter()
            .any(|r| r.start <= 38 && r.end >= 42),
        "edited word not invalidated: {invalidation:?}"
    );
}

#[test]
fn test_deleting_injected_region_drops_layer() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");
    assert_eq!(harness.layers.layer_count(), 2);

    let invalidation = harness.replace(5..26, "");

    assert_eq!(harness.text, "intro outro");
    assert_eq!(harness.languages(), vec!["tmpl"]);
    assert!(!invalidation.is_deferred());
}

#[test]
fn test_deleting_injected_region_reports_the_surrounding_text() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");

    let invalidation = harness.replace(5..26, "");

    // One unit on either side of where the region used to be.
    assert_eq!(invalidation.ranges(), &[8..12]);
}

#[test]
fn test_typing_at_the_end_of_an_injection_keeps_the_layer() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");
    let js_id = harness.layers.layer_infos()[1].id;

    let invalidation = harness.replace(21..21, "y ");

    assert_eq!(harness.text, "intro <js> let a = 1 y </js> outro");
    let infos = harness.layers.layer_infos();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].id, js_id);
    assert_eq!(infos[1].state, LayerState::Reparsed);
    assert_eq!(infos[1].ranges, vec![byte_range_of(&harness.text, " let a = 1 y ")]);
    // Only the typed text and what follows it, not the whole region.
    assert!(invalidation.ranges().iter().all(|r| r.start >= 42));
    assert!(
        invalidation
            .ranges()
            .iter()
            .any(|r| r.start <= 44 && 46 <= r.end)
    );
}

#[test]
fn test_injection_that_moved_its_end_keeps_the_layer() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");
    let js_id = harness.layers.layer_infos()[1].id;

    // Overlaps the end of the region, so shifting alone truncates it.
    harness.replace(19..22, "2 <");

    assert_eq!(harness.text, "intro <js> let a = 2 </js> outro");
    let infos = harness.layers.layer_infos();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].id, js_id);
    assert_eq!(infos[1].ranges, vec![byte_range_of(&harness.text, " let a = 2 ")]);

    let two = byte_range_of(&harness.text, "2");
    let nodes = harness.layers.nodes_at(two.start);
    assert_eq!(nodes[0].0, js_id);
    assert_eq!(nodes[0].1.byte_range, two);
}

#[test]
fn test_breaking_the_close_tag_removes_orphaned_layer() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");
    let js_range = harness.layers.layer_infos()[1].ranges[0].clone();

    // "</js>" -> "</jx>": the edit is outside the js content, only the host changes.
    let invalidation = harness.replace(24..25, "x");

    assert_eq!(harness.languages(), vec!["tmpl"]);
    assert!(
        invalidation
            .ranges()
            .iter()
            .any(|r| r.start <= js_range.start && js_range.end <= r.end)
    );
}

#[test]
fn test_typing_an_injection_creates_a_layer() {
    let mut harness = Harness::new("intro outro");
    assert_eq!(harness.layers.layer_count(), 1);

    let invalidation = harness.replace(5..5, " <css> a { } </css>");

    assert_eq!(harness.languages(), vec!["tmpl", "css"]);
    let css_range = byte_range_of(&harness.text, " a { } ");
    assert_eq!(harness.layers.layer_infos()[1].ranges, vec![css_range.clone()]);
    assert!(
        invalidation
            .ranges()
            .iter()
            .any(|r| r.start <= css_range.start && css_range.end <= r.end)
    );
}

#[test]
fn test_nested_injections_and_innermost_first_lookup() {
    let text = "<js> x <css> y </css> z </js>";
    let harness = Harness::new(text);

    let infos = harness.layers.layer_infos();
    assert_eq!(harness.languages(), vec!["tmpl", "js", "css"]);
    assert_eq!(infos[2].depth, 2);

    let y = byte_range_of(text, "y").start;
    let nodes = harness.layers.nodes_at(y);
    let ids: Vec<_> = nodes.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![infos[2].id, infos[1].id, infos[0].id]);
    assert_eq!(nodes[0].1.kind, "word");
    assert_eq!(nodes[0].1.byte_range, byte_range_of(text, "y"));

    // Outside every injection only the primary layer answers.
    let nodes = harness.layers.nodes_at(0);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].0, infos[0].id);
}

#[test]
fn test_rescanning_is_idempotent() {
    let text = "a <js> b <css> c </css> </js> <css> d </css>";
    let mut harness = Harness::new(text);
    let before = harness.layers.layer_infos();

    let invalidated = harness.layers.update_injected_layers(&StrReader::new(text));

    assert!(invalidated.is_empty());
    assert_eq!(harness.layers.layer_infos(), before);
}

#[test]
fn test_unknown_languages_are_skipped() {
    let harness = Harness::new("a <py> print </py> <css> b </css>");
    assert_eq!(harness.languages(), vec!["tmpl", "css"]);
}

#[test]
fn test_layer_limit() {
    let harness = Harness::with_config(
        "<css> a </css> <css> b </css> <css> c </css>",
        LayerSetConfig::new().with_max_layers(3),
    );
    assert_eq!(harness.layers.layer_count(), 3);
}

#[test]
fn test_stale_ticket_skips_reparse_and_reports_later() {
    let mut harness = Harness::new("one two three");
    let parses = harness.registry.parse_count();

    // Two edits are issued; the layer set only catches up with the first after the second.
    let first = harness.mutate(3..3, " and");
    let first_ticket = harness.clock.advance();
    let second = harness.mutate(0..0, "zero ");
    let second_ticket = harness.clock.advance();

    let stale = harness
        .layers
        .apply_edit(&first, first_ticket, &StrReader::new(&harness.text));
    assert_eq!(stale, SyntaxInvalidation::Deferred);
    assert_eq!(harness.registry.parse_count(), parses);

    let fresh = harness
        .layers
        .apply_edit(&second, second_ticket, &StrReader::new(&harness.text));
    assert!(harness.registry.parse_count() > parses);

    // " and" moved from 3..7 to 8..12 units.
    let and_bytes = 16..24;
    assert!(
        fresh
            .ranges()
            .iter()
            .any(|r| r.start <= and_bytes.start && and_bytes.end <= r.end),
        "deferred edit lost: {fresh:?}"
    );
    assert!(fresh.ranges().iter().any(|r| r.start == 0));
}

#[test]
fn test_timed_out_layer_keeps_previous_state() {
    let harness = Harness::new("a <slow> b </slow>");
    let infos = harness.layers.layer_infos();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].language.as_str(), "slow");
    assert!(!infos[1].has_tree);
    assert_eq!(infos[1].state, LayerState::Unparsed);

    let mut harness = Harness::new("a <slow> b </slow> c");
    let invalidation = harness.replace(19..20, "d");
    assert!(invalidation.is_incomplete());

    let unbounded = Harness::with_config(
        "a <slow> b </slow>",
        LayerSetConfig::new().with_parse_timeout(None),
    );
    assert!(unbounded.layers.layer_infos()[1].has_tree);
}

#[test]
fn test_snapshot_is_detached() {
    let mut harness = Harness::new("intro <js> let a = 1 </js> outro");
    let snapshot = harness.layers.snapshot();
    assert_eq!(snapshot.layers.len(), 2);
    assert!(snapshot.layers.iter().all(|layer| layer.tree.is_some()));

    harness.replace(5..26, "");
    assert_eq!(harness.layers.layer_count(), 1);
    assert_eq!(snapshot.layers.len(), 2);
    assert_eq!(
        snapshot.layers[0].tree.as_ref().unwrap().texts(),
        vec!["intro", "<js>", "let", "a", "=", "1", "</js>", "outro"]
    );

    let inside = byte_range_of("intro <js> let a = 1 </js> outro", "let").start;
    let hits = snapshot.layers_at(inside);
    assert_eq!(hits[0].language.as_str(), "js");
    assert_eq!(hits[1].depth, 0);
}
