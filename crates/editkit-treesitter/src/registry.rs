use std::collections::HashMap;
use std::sync::OnceLock;

use editkit_core::edit::ByteRange;
use editkit_core::error::SyntaxError;
use editkit_core::syntax::{GrammarRegistry, Injection, LanguageId, TextReader};
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Query, QueryCursor};

use crate::config::TreeSitterLanguageConfig;
use crate::parser::{TreeSitterParser, TreeSitterTree};

const CONTENT_CAPTURE: &str = "injection.content";
const LANGUAGE_CAPTURE: &str = "injection.language";
const LANGUAGE_PROPERTY: &str = "injection.language";
const COMBINED_PROPERTY: &str = "injection.combined";

/// One registered grammar and its lazily compiled queries.
struct Grammar {
    config: TreeSitterLanguageConfig,
    highlights: OnceLock<Result<Query, SyntaxError>>,
    injections: OnceLock<Result<Option<Query>, SyntaxError>>,
}

impl Grammar {
    fn new(config: TreeSitterLanguageConfig) -> Self {
        Self {
            config,
            highlights: OnceLock::new(),
            injections: OnceLock::new(),
        }
    }

    fn compile(&self, kind: &'static str, source: &str) -> Result<Query, SyntaxError> {
        Query::new(&self.config.language, source).map_err(|error| SyntaxError::Query {
            language: self.config.name.clone(),
            kind,
            message: error.to_string(),
        })
    }

    fn highlights_query(&self) -> Result<&Query, SyntaxError> {
        self.highlights
            .get_or_init(|| self.compile("highlights", &self.config.highlights_query))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn injections_query(&self) -> Result<Option<&Query>, SyntaxError> {
        self.injections
            .get_or_init(|| match &self.config.injections_query {
                Some(source) => self.compile("injections", source).map(Some),
                None => Ok(None),
            })
            .as_ref()
            .map(Option::as_ref)
            .map_err(Clone::clone)
    }
}

/// Grammars known to tree-sitter layer sets.
///
/// Queries are compiled on first use and cached per registry, so two registries never share
/// state. Share one registry between documents with an `Arc`.
#[derive(Default)]
pub struct TreeSitterRegistry {
    grammars: Vec<Grammar>,
    by_name: HashMap<String, usize>,
}

impl TreeSitterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a grammar, builder style.
    pub fn with_language(mut self, config: TreeSitterLanguageConfig) -> Self {
        self.register(config);
        self
    }

    /// Register a grammar. A grammar registered earlier under the same name is replaced.
    pub fn register(&mut self, config: TreeSitterLanguageConfig) {
        let names: Vec<String> = std::iter::once(&config.name)
            .chain(&config.aliases)
            .map(|name| normalize_name(name))
            .collect();
        let index = match self.by_name.get(&normalize_name(&config.name)) {
            Some(&index) if self.grammars[index].config.name == config.name => {
                self.grammars[index] = Grammar::new(config);
                index
            }
            _ => {
                self.grammars.push(Grammar::new(config));
                self.grammars.len() - 1
            }
        };
        for name in names {
            self.by_name.insert(name, index);
        }
    }

    /// Names of every registered grammar, in registration order.
    pub fn language_names(&self) -> Vec<&str> {
        self.grammars
            .iter()
            .map(|grammar| grammar.config.name.as_str())
            .collect()
    }

    /// The canonical language for a name or alias.
    pub fn resolve(&self, name: &str) -> Option<LanguageId> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&index| LanguageId::new(&self.grammars[index].config.name))
    }

    /// The configuration registered for `language`.
    pub fn config(&self, language: &LanguageId) -> Option<&TreeSitterLanguageConfig> {
        self.grammar(language).ok().map(|grammar| &grammar.config)
    }

    /// The compiled highlights query for `language`.
    pub fn highlights_query(&self, language: &LanguageId) -> Result<&Query, SyntaxError> {
        self.grammar(language)?.highlights_query()
    }

    /// The compiled injections query for `language`, if it has one.
    pub fn injections_query(&self, language: &LanguageId) -> Result<Option<&Query>, SyntaxError> {
        self.grammar(language)?.injections_query()
    }

    fn grammar(&self, language: &LanguageId) -> Result<&Grammar, SyntaxError> {
        self.by_name
            .get(&normalize_name(language.as_str()))
            .map(|&index| &self.grammars[index])
            .ok_or_else(|| SyntaxError::GrammarNotFound(language.to_string()))
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// `"Rust,ignore"` and `"rust extra"` both name `rust`.
fn language_from_text(text: &str) -> Option<String> {
    let lower = text.trim().to_lowercase();
    let name = lower.split([' ', ',', '\t']).next().unwrap_or("");
    (!name.is_empty()).then(|| name.to_string())
}

/// Node text decoded from the document, for query predicates.
pub(crate) fn node_text(reader: &dyn TextReader, node: Node<'_>) -> Vec<u8> {
    reader
        .text_for(node.byte_range())
        .unwrap_or_default()
        .into_bytes()
}

impl GrammarRegistry for TreeSitterRegistry {
    type Parser = TreeSitterParser;

    fn create_parser(&self, language: &LanguageId) -> Result<TreeSitterParser, SyntaxError> {
        let grammar = self.grammar(language)?;
        TreeSitterParser::new(&grammar.config.name, &grammar.config.language)
    }

    fn supports_injections(&self, language: &LanguageId) -> bool {
        self.config(language)
            .is_some_and(|config| config.injections_query.is_some())
    }

    fn injections(
        &self,
        language: &LanguageId,
        tree: &TreeSitterTree,
        reader: &dyn TextReader,
    ) -> Result<Vec<Injection>, SyntaxError> {
        let Some(query) = self.injections_query(language)? else {
            return Ok(Vec::new());
        };
        let content_index = query.capture_index_for_name(CONTENT_CAPTURE);
        let language_index = query.capture_index_for_name(LANGUAGE_CAPTURE);

        let mut injections: Vec<Injection> = Vec::new();
        // (pattern, language) -> position in `injections`, for combined patterns.
        let mut combined: HashMap<(usize, LanguageId), usize> = HashMap::new();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), |node: Node<'_>| {
            std::iter::once(node_text(reader, node))
        });
        while let Some(m) = matches.next() {
            let mut ranges: Vec<ByteRange> = Vec::new();
            let mut name = None;
            for capture in m.captures {
                if Some(capture.index) == content_index {
                    ranges.push(capture.node.byte_range());
                } else if Some(capture.index) == language_index {
                    name = reader
                        .text_for(capture.node.byte_range())
                        .and_then(|text| language_from_text(&text));
                }
            }

            let properties = query.property_settings(m.pattern_index);
            if name.is_none() {
                name = properties
                    .iter()
                    .find(|property| &*property.key == LANGUAGE_PROPERTY)
                    .and_then(|property| property.value.as_deref())
                    .and_then(language_from_text);
            }
            ranges.retain(|range| range.start < range.end);
            let Some(name) = name else {
                continue;
            };
            if ranges.is_empty() {
                continue;
            }

            let injected = self
                .resolve(&name)
                .unwrap_or_else(|| LanguageId::new(&name));
            let is_combined = properties
                .iter()
                .any(|property| &*property.key == COMBINED_PROPERTY);

            if is_combined {
                let key = (m.pattern_index, injected.clone());
                if let Some(&index) = combined.get(&key) {
                    injections[index].ranges.extend(ranges);
                    continue;
                }
                combined.insert(key, injections.len());
            }
            injections.push(Injection {
                language: injected,
                ranges,
            });
        }

        for injection in &mut injections {
            injection.ranges.sort_by_key(|range| range.start);
        }
        debug!(%language, count = injections.len(), "injections scanned");
        Ok(injections)
    }
}
