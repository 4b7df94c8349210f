mod common;

use std::sync::{Arc, Mutex};

use common::{StrReader, ToyRegistry, byte_range_of};
use editkit_core::syntax::{
    EditClock, LanguageLayerSet, LayerSetConfig, SyntaxSession, SyntaxWorker,
};
use editkit_core::{DocumentConfig, InvalidationEvent, TextDocument};
use pretty_assertions::assert_eq;

fn covers(ranges: &[std::ops::Range<usize>], wanted: &std::ops::Range<usize>) -> bool {
    ranges
        .iter()
        .any(|r| r.start <= wanted.start && wanted.end <= r.end)
}

#[test]
fn test_document_with_inline_layer_set() {
    let registry = Arc::new(ToyRegistry::new());
    let mut document = TextDocument::with_syntax(
        "page <js> run </js>",
        DocumentConfig::default(),
        |clock| {
            LanguageLayerSet::new(Arc::clone(&registry), "tmpl", clock, LayerSetConfig::default())
        },
    )
    .unwrap();
    assert_eq!(document.syntax().layer_count(), 2);

    let events: Arc<Mutex<Vec<InvalidationEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    document.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    let outcome = document.insert(19, " <css> p </css>").unwrap();
    assert!(!outcome.syntax.is_deferred());
    assert_eq!(document.syntax().layer_count(), 3);

    let css = byte_range_of(&document.text(), " p ");
    assert!(covers(outcome.syntax.ranges(), &css));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].syntax, outcome.syntax);
    assert_eq!(events[0].ticket, document.clock().current());

    // Inline sessions have nothing outstanding.
    drop(events);
    assert!(document.wait_for_syntax().is_none());
}

#[test]
fn test_document_with_background_worker() {
    let registry = Arc::new(ToyRegistry::new());
    let text = "a <js> b </js>";
    let mut document = TextDocument::with_syntax(text, DocumentConfig::default(), |clock| {
        SyntaxWorker::spawn(LanguageLayerSet::new(
            Arc::clone(&registry),
            "tmpl",
            clock,
            LayerSetConfig::default(),
        )?)
    })
    .unwrap();

    let initial = document.wait_for_syntax().unwrap();
    assert_eq!(initial.ticket, document.clock().current());
    assert_eq!(initial.invalidation.ranges(), &[0..text.len() * 2]);
    assert_eq!(document.syntax().snapshot().unwrap().layers.len(), 2);

    let events: Arc<Mutex<Vec<InvalidationEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    document.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    // Several edits before the worker is given a chance to read.
    let first = document.insert(14, " <css> c </css>").unwrap();
    assert!(first.syntax.is_deferred());
    document.insert(0, "x ").unwrap();
    document.insert(2, "y ").unwrap();
    assert_eq!(document.text(), "x y a <js> b </js> <css> c </css>");

    let fresh = document.wait_for_syntax().unwrap();
    assert_eq!(fresh.ticket, document.clock().current());
    let text = document.text();
    assert!(covers(fresh.invalidation.ranges(), &byte_range_of(&text, " c ")));
    assert!(covers(fresh.invalidation.ranges(), &byte_range_of(&text, "y")));

    let snapshot = document.syntax().snapshot().unwrap();
    let languages: Vec<&str> = snapshot.layers.iter().map(|l| l.language.as_str()).collect();
    assert_eq!(languages, vec!["tmpl", "js", "css"]);
    assert_eq!(document.syntax().in_flight(), 0);
    assert!(document.wait_for_syntax().is_none());

    // Only the fresh result reached subscribers; edits themselves were reported as deferred.
    let events = events.lock().unwrap();
    let delivered: Vec<_> = events.iter().filter(|e| e.edited_range.is_none()).collect();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].ticket, fresh.ticket);
    assert!(
        events
            .iter()
            .filter(|e| e.edited_range.is_some())
            .all(|e| e.syntax.is_deferred())
    );
}

#[test]
fn test_background_updates_stay_local_after_delivery() {
    let registry = Arc::new(ToyRegistry::new());
    let text = "a <js> b </js> tail";
    let mut document = TextDocument::with_syntax(text, DocumentConfig::default(), |clock| {
        SyntaxWorker::spawn(LanguageLayerSet::new(
            Arc::clone(&registry),
            "tmpl",
            clock,
            LayerSetConfig::default(),
        )?)
    })
    .unwrap();
    let initial = document.wait_for_syntax().unwrap();
    assert_eq!(initial.invalidation.ranges(), &[0..text.len() * 2]);

    document.insert(19, " more").unwrap();
    let update = document.wait_for_syntax().unwrap();
    assert_eq!(update.ticket, document.clock().current());
    assert_eq!(update.invalidation.ranges(), &[38..48]);

    document.insert(24, "!").unwrap();
    let update = document.wait_for_syntax().unwrap();
    assert_eq!(update.invalidation.ranges(), &[40..50]);
    assert_eq!(document.text(), "a <js> b </js> tail more!");
}

#[test]
fn test_polling_eventually_delivers() {
    let registry = Arc::new(ToyRegistry::new());
    let mut document = TextDocument::with_syntax("one <css> two </css>", DocumentConfig::default(), |clock| {
        SyntaxWorker::spawn(LanguageLayerSet::new(
            Arc::clone(&registry),
            "tmpl",
            clock,
            LayerSetConfig::default(),
        )?)
    })
    .unwrap();

    let mut delivered = Vec::new();
    while document.syntax().in_flight() > 0 {
        delivered.extend(document.poll_syntax());
        std::thread::yield_now();
    }
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].ticket, document.clock().current());
}

#[test]
fn test_standalone_worker_returns_layers_on_shutdown() {
    let clock = EditClock::new();
    let layers = LanguageLayerSet::new(
        Arc::new(ToyRegistry::new()),
        "tmpl",
        clock.clone(),
        LayerSetConfig::default(),
    )
    .unwrap();
    let mut worker = SyntaxWorker::spawn(layers).unwrap();
    let reader = StrReader::new("x <js> y </js>");

    let ticket = clock.advance();
    assert!(worker.parse_all(ticket, &reader).is_deferred());
    assert_eq!(worker.in_flight(), 1);

    let update = worker.wait(&reader).unwrap();
    assert_eq!(update.ticket, ticket);
    assert!(!update.invalidation.is_deferred());
    assert_eq!(worker.in_flight(), 0);
    assert!(worker.wait(&reader).is_none());

    let layers = worker.shutdown().unwrap();
    assert_eq!(layers.layer_count(), 2);
}

#[test]
fn test_superseded_full_parse_reruns_with_next_edit() {
    let clock = EditClock::new();
    let layers = LanguageLayerSet::new(
        Arc::new(ToyRegistry::new()),
        "tmpl",
        clock.clone(),
        LayerSetConfig::default(),
    )
    .unwrap();
    let mut worker = SyntaxWorker::spawn(layers).unwrap();

    let stale_ticket = clock.advance();
    worker.parse_all(stale_ticket, &StrReader::new("z"));
    // A newer edit exists before the worker got to read anything.
    let text = "z <css> q </css>";
    let edit = editkit_core::InputEdit::from_char_range(1..1, text.len() - 1);
    let ticket = clock.advance();
    let reader = StrReader::new(text);
    worker.apply_edit(&edit, ticket, &reader);

    let mut last = None;
    while let Some(update) = worker.wait(&reader) {
        last = Some(update);
    }
    let last = last.unwrap();
    assert_eq!(last.ticket, ticket);
    assert_eq!(last.invalidation.ranges(), &[0..text.len() * 2]);
    assert_eq!(worker.snapshot().unwrap().layers.len(), 2);
}

#[test]
fn test_dropping_an_unserved_worker_does_not_hang() {
    let clock = EditClock::new();
    let layers = LanguageLayerSet::new(
        Arc::new(ToyRegistry::new()),
        "tmpl",
        clock.clone(),
        LayerSetConfig::default(),
    )
    .unwrap();
    let mut worker = SyntaxWorker::spawn(layers).unwrap();
    let reader = StrReader::new("never read");
    worker.parse_all(clock.advance(), &reader);
    drop(worker);
}
