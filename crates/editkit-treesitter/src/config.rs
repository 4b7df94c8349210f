/// A grammar registered with [`crate::TreeSitterRegistry`].
#[derive(Debug, Clone)]
pub struct TreeSitterLanguageConfig {
    /// Language name used by layer sets and injections (e.g. `"javascript"`).
    pub name: String,
    /// Tree-sitter language.
    pub language: tree_sitter::Language,
    /// Syntax highlighting query (`.scm`).
    pub highlights_query: String,
    /// Optional injections query (`.scm`). Layers of this language are only scanned for embedded
    /// languages when it is set.
    pub injections_query: Option<String>,
    /// Other names this language is known by in injections (e.g. `"js"`).
    pub aliases: Vec<String>,
}

impl TreeSitterLanguageConfig {
    /// Create a config with a name, a language and a highlights query.
    pub fn new(
        name: impl Into<String>,
        language: tree_sitter::Language,
        highlights_query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language,
            highlights_query: highlights_query.into(),
            injections_query: None,
            aliases: Vec::new(),
        }
    }

    /// Set an injections query.
    pub fn with_injections_query(mut self, injections_query: impl Into<String>) -> Self {
        let query = injections_query.into();
        self.injections_query = (!query.trim().is_empty()).then_some(query);
        self
    }

    /// Add an alternative name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}
