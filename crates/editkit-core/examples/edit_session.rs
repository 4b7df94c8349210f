//! Typing session example
//!
//! Drives a document the way a front end would: type at two carets, lay out the lines that
//! changed, then undo the whole word in one step.

use std::sync::{Arc, Mutex};

use editkit_core::TextDocument;

fn main() {
    let mut document = TextDocument::new("alpha\nbeta\n");

    let edited = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&edited);
    document.subscribe(move |event| {
        if let (Ok(mut ranges), Some(range)) = (sink.lock(), event.edited_range.clone()) {
            ranges.push(range);
        }
    });

    document.set_selections([5..5, 10..10]);
    for piece in ["!", "!", "?"] {
        document.insert_text(piece).expect("caret in bounds");
    }
    println!("text: {:?}", document.text());
    println!("edited ranges: {:?}", edited.lock().map(|r| r.clone()).unwrap_or_default());

    // Pretend every line measures 18px.
    for request in document.layout().lines_needing_layout() {
        println!("layout line {} at y={}", request.bounds.index, request.bounds.y_pos);
        document.layout_mut().set_line_height(request.bounds.index, 18.0);
    }
    println!("total height: {}", document.layout().total_height());

    document.undo();
    println!("after undo: {:?}", document.text());
    println!("selections: {:?}", document.selections());
}
