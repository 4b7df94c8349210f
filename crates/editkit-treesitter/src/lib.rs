#![warn(missing_docs)]
//! `editkit-treesitter` - Tree-sitter backend for `editkit-core`.
//!
//! [`TreeSitterRegistry`] implements [`editkit_core::syntax::GrammarRegistry`]: plug it into a
//! [`editkit_core::LanguageLayerSet`] (directly, or through a [`editkit_core::SyntaxWorker`]) and
//! every layer is parsed incrementally by tree-sitter.
//!
//! - Text is parsed as UTF-16 read in chunks through the layer set's reader, so documents are
//!   never copied into a contiguous buffer.
//! - Injected layers are discovered with each grammar's injections query: `@injection.content`
//!   marks the embedded region, the language comes from `@injection.language` or
//!   `#set! injection.language`, and `#set! injection.combined` folds every match of a pattern
//!   into one layer.
//! - A parse that exceeds the layer set's timeout is cancelled and reported as timed out.
//! - [`TreeSitterRegistry::highlights`] collects highlight captures over a layer-set snapshot.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use editkit_core::{DocumentConfig, LanguageLayerSet, LayerSetConfig, TextDocument};
//! use editkit_treesitter::{TreeSitterLanguageConfig, TreeSitterRegistry};
//!
//! let registry = Arc::new(TreeSitterRegistry::new().with_language(TreeSitterLanguageConfig::new(
//!     "rust",
//!     tree_sitter_rust::LANGUAGE.into(),
//!     tree_sitter_rust::HIGHLIGHTS_QUERY,
//! )));
//! let document = TextDocument::with_syntax("fn main() {}", DocumentConfig::default(), |clock| {
//!     LanguageLayerSet::new(registry, "rust", clock, LayerSetConfig::default())
//! })?;
//! ```

mod config;
mod highlight;
mod parser;
mod registry;

pub use config::TreeSitterLanguageConfig;
pub use highlight::HighlightSpan;
pub use parser::{TreeSitterParser, TreeSitterTree};
pub use registry::TreeSitterRegistry;
