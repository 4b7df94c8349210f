use std::sync::Arc;

use editkit_core::syntax::{LanguageLayerSet, LayerSetConfig};
use editkit_core::text::BYTES_PER_UNIT;
use editkit_core::{DocumentConfig, TextDocument};
use editkit_treesitter::{TreeSitterLanguageConfig, TreeSitterRegistry};

fn main() {
    let registry = Arc::new(TreeSitterRegistry::new().with_language(
        TreeSitterLanguageConfig::new(
            "rust",
            tree_sitter_rust::LANGUAGE.into(),
            tree_sitter_rust::HIGHLIGHTS_QUERY,
        )
        .with_alias("rs"),
    ));

    let source = r#"
// comment
fn add(a: i32, b: i32) -> i32 {
    let s = "hi";
    a + b
}
"#;
    let document = TextDocument::with_syntax(source, DocumentConfig::default(), |clock| {
        LanguageLayerSet::new(registry, "rs", clock, LayerSetConfig::default())
    })
    .expect("init tree-sitter");

    let snapshot = document.syntax().snapshot();
    let reader = document.reader();
    let spans = document
        .syntax()
        .registry()
        .highlights(&snapshot, 0..document.len_utf16() * BYTES_PER_UNIT, &reader);

    for span in &spans {
        let units = span.range.start / BYTES_PER_UNIT..span.range.end / BYTES_PER_UNIT;
        let text = document.slice(units).unwrap_or_default();
        println!(
            "{:>4}..{:<4} {:<12} {text:?}",
            span.range.start, span.range.end, span.capture
        );
    }
    println!("layers={} spans={}", snapshot.layers.len(), spans.len());
}
