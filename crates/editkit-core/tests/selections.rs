use editkit_core::{MarkedTextAttributes, TextDocument};
use pretty_assertions::assert_eq;

fn ranges(document: &TextDocument) -> Vec<std::ops::Range<usize>> {
    document.selections().iter().map(|s| s.range.clone()).collect()
}

#[test]
fn test_selections_follow_edits_elsewhere() {
    let mut document = TextDocument::new("alpha beta gamma");
    document.set_selections([6..10, 16..16]);

    document.insert(0, ">> ").unwrap();
    assert_eq!(ranges(&document), vec![9..13, 19..19]);

    // Deleting across the start of the selection truncates it.
    document.delete(8..11).unwrap();
    assert_eq!(document.text(), ">> alphta gamma");
    assert_eq!(ranges(&document), vec![8..10, 16..16]);
}

#[test]
fn test_overlapping_selections_merge() {
    let mut document = TextDocument::new("0123456789");
    let ids = document.set_selections([2..5, 4..8, 9..9]);
    assert_eq!(ids.len(), 3);
    assert_eq!(ranges(&document), vec![2..8, 9..9]);

    document.set_selections([3..3, 30..40]);
    assert_eq!(ranges(&document), vec![3..3, 10..10]);
}

#[test]
fn test_typing_replaces_every_selection() {
    let mut document = TextDocument::new("foo bar foo");
    document.set_selections([0..3, 8..11]);
    document.insert_text("baz").unwrap();
    assert_eq!(document.text(), "baz bar baz");
    assert_eq!(ranges(&document), vec![3..3, 11..11]);
}

#[test]
fn test_composition_commits_as_one_undo_step() {
    let mut document = TextDocument::new("ab");
    document.set_selections([1..1]);
    let attributes = MarkedTextAttributes::new().with("underline", "single");

    document
        .set_marked_text("k", 1..1, attributes.clone())
        .unwrap();
    assert_eq!(document.text(), "akb");
    assert_eq!(document.marked_text().ranges()[0].range, 1..2);
    assert_eq!(document.marked_text().attributes().get("underline"), Some("single"));
    assert_eq!(ranges(&document), vec![2..2]);
    assert!(!document.can_undo());

    document.set_marked_text("か", 1..1, attributes).unwrap();
    assert_eq!(document.text(), "aかb");
    assert_eq!(document.marked_text().ranges()[0].range, 1..2);

    document.unmark_text();
    assert!(!document.marked_text().has_marked_text());
    assert_eq!(document.text(), "aかb");
    assert_eq!(document.undo_coordinator().undo_depth(), 1);

    assert!(document.undo());
    assert_eq!(document.text(), "ab");
    assert!(document.redo());
    assert_eq!(document.text(), "aかb");
}

#[test]
fn test_composition_over_a_selection_restores_it_on_undo() {
    let mut document = TextDocument::new("one two");
    document.set_selections([4..7]);

    document
        .set_marked_text("に", 0..1, MarkedTextAttributes::new())
        .unwrap();
    assert_eq!(document.text(), "one に");
    assert_eq!(ranges(&document), vec![4..5]);
    assert_eq!(document.marked_text().ranges()[0].replaced_text, "two");

    document
        .set_marked_text("二", 1..1, MarkedTextAttributes::new())
        .unwrap();
    document.unmark_text();
    assert_eq!(document.text(), "one 二");

    assert!(document.undo());
    assert_eq!(document.text(), "one two");
}

#[test]
fn test_insert_text_commits_composition() {
    let mut document = TextDocument::new("");
    document
        .set_marked_text("nihon", 5..5, MarkedTextAttributes::new())
        .unwrap();
    document.insert_text("日本").unwrap();

    assert_eq!(document.text(), "日本");
    assert!(!document.marked_text().has_marked_text());
    assert_eq!(ranges(&document), vec![2..2]);

    assert!(document.undo());
    assert_eq!(document.text(), "");
}

#[test]
fn test_moving_selection_out_cancels_marked_range() {
    let mut document = TextDocument::new("xy");
    document.set_selections([2..2]);
    document
        .set_marked_text("abc", 3..3, MarkedTextAttributes::new())
        .unwrap();
    assert!(document.marked_text().has_marked_text());

    // Inside the marked range: composition continues.
    document.set_selections([3..3]);
    assert!(document.marked_text().has_marked_text());

    document.set_selections([0..0]);
    assert!(!document.marked_text().has_marked_text());
    assert_eq!(document.text(), "xyabc");
    assert!(document.undo());
    assert_eq!(document.text(), "xy");
}

#[test]
fn test_multi_cursor_composition() {
    let mut document = TextDocument::new("a b");
    document.set_selections([1..1, 3..3]);

    document
        .set_marked_text("k", 1..1, MarkedTextAttributes::new())
        .unwrap();
    assert_eq!(document.text(), "ak bk");
    let marked: Vec<_> = document
        .marked_text()
        .ranges()
        .iter()
        .map(|m| m.range.clone())
        .collect();
    assert_eq!(marked, vec![1..2, 4..5]);
    assert_eq!(ranges(&document), vec![2..2, 5..5]);

    document
        .set_marked_text("か", 1..1, MarkedTextAttributes::new())
        .unwrap();
    document.unmark_text();
    assert_eq!(document.text(), "aか bか");

    assert_eq!(document.undo_coordinator().undo_depth(), 1);
    assert!(document.undo());
    assert_eq!(document.text(), "a b");
}

#[test]
fn test_empty_marked_text_ends_composition() {
    let mut document = TextDocument::new("ab");
    document.set_selections([0..1]);
    document
        .set_marked_text("x", 1..1, MarkedTextAttributes::new())
        .unwrap();
    document
        .set_marked_text("", 0..0, MarkedTextAttributes::new())
        .unwrap();

    assert_eq!(document.text(), "b");
    assert!(!document.marked_text().has_marked_text());
    assert!(document.undo());
    assert_eq!(document.text(), "ab");
}
