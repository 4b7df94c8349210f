//! A deterministic toy grammar backend.
//!
//! Every language tokenizes its text into whitespace-separated words. Languages that support
//! injections treat `<name>...</name>` as an embedded region of language `name`; nested blocks
//! belong to the innermost layer that sees them. The `slow` language never finishes within a
//! timeout.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use editkit_core::edit::{ByteRange, InputEdit, TextPoint};
use editkit_core::error::SyntaxError;
use editkit_core::ranges::{RangeEdit, shift_range};
use editkit_core::syntax::{
    GrammarRegistry, Injection, LanguageId, LanguageParser, ParseOutcome, SyntaxNode, SyntaxTree,
    TextReader,
};

const READ_CHUNK: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToyWord {
    pub text: String,
    pub range: ByteRange,
}

#[derive(Debug, Clone)]
pub struct ToyTree {
    pub words: Arc<Vec<ToyWord>>,
    pub ranges: Vec<ByteRange>,
}

impl ToyTree {
    pub fn texts(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }
}

impl SyntaxTree for ToyTree {
    fn edit(&mut self, edit: &InputEdit) {
        let range_edit = RangeEdit::from(edit);
        for word in Arc::make_mut(&mut self.words) {
            word.range = shift_range(word.range.clone(), range_edit);
        }
        self.ranges = self
            .ranges
            .iter()
            .map(|r| shift_range(r.clone(), range_edit))
            .collect();
    }

    fn changed_ranges(&self, newer: &Self) -> Vec<ByteRange> {
        let mut changed: Vec<ByteRange> = newer
            .words
            .iter()
            .filter(|w| !self.words.contains(w))
            .map(|w| w.range.clone())
            .collect();
        changed.extend(
            self.words
                .iter()
                .filter(|w| !newer.words.contains(w))
                .map(|w| w.range.clone()),
        );
        editkit_core::merge_ranges(changed)
    }

    fn node_at(&self, byte_offset: usize) -> Option<SyntaxNode> {
        if let Some(word) = self
            .words
            .iter()
            .find(|w| w.range.start <= byte_offset && byte_offset < w.range.end)
        {
            return Some(SyntaxNode {
                kind: if word.text.starts_with('<') { "tag" } else { "word" }.to_string(),
                byte_range: word.range.clone(),
                start_point: TextPoint::new(0, word.range.start),
                end_point: TextPoint::new(0, word.range.end),
                is_named: true,
            });
        }
        let start = self.ranges.first()?.start;
        let end = self.ranges.last()?.end;
        Some(SyntaxNode {
            kind: "source".to_string(),
            byte_range: start..end,
            start_point: TextPoint::new(0, start),
            end_point: TextPoint::new(0, end),
            is_named: true,
        })
    }
}

pub struct ToyParser {
    language: LanguageId,
    ranges: Option<Vec<ByteRange>>,
    parses: Arc<AtomicUsize>,
}

fn read_range(reader: &dyn TextReader, range: &ByteRange) -> Option<Vec<u16>> {
    let mut units = Vec::new();
    let wanted = (range.end - range.start) / 2;
    while units.len() < wanted {
        let offset = range.start + units.len() * 2;
        let chunk = reader.read_utf16(offset, READ_CHUNK.min(wanted - units.len()))?;
        if chunk.is_empty() {
            break;
        }
        units.extend(chunk);
    }
    Some(units)
}

fn tokenize(units: &[u16], base: usize, words: &mut Vec<ToyWord>) {
    let text: Vec<char> = char::decode_utf16(units.iter().copied())
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    let mut offset = base;
    let mut current: Option<(String, usize)> = None;
    for c in text {
        let width = c.len_utf16() * 2;
        if c.is_whitespace() {
            if let Some((word, start)) = current.take() {
                words.push(ToyWord {
                    text: word,
                    range: start..offset,
                });
            }
        } else {
            match current.as_mut() {
                Some((word, _)) => word.push(c),
                None => current = Some((c.to_string(), offset)),
            }
        }
        offset += width;
    }
    if let Some((word, start)) = current {
        words.push(ToyWord {
            text: word,
            range: start..offset,
        });
    }
}

impl LanguageParser for ToyParser {
    type Tree = ToyTree;

    fn set_included_ranges(
        &mut self,
        ranges: &[ByteRange],
        _reader: &dyn TextReader,
    ) -> Result<(), SyntaxError> {
        if ranges.windows(2).any(|w| w[0].end > w[1].start) {
            return Err(SyntaxError::IncludedRanges("overlapping".to_string()));
        }
        self.ranges = Some(ranges.to_vec());
        Ok(())
    }

    fn parse(
        &mut self,
        reader: &dyn TextReader,
        _old_tree: Option<&ToyTree>,
        timeout: Option<Duration>,
    ) -> ParseOutcome<ToyTree> {
        if self.language.as_str() == "slow" && timeout.is_some() {
            return ParseOutcome::TimedOut;
        }
        let ranges = match &self.ranges {
            Some(ranges) => ranges.clone(),
            None => vec![0..reader.len_bytes()],
        };
        let mut words = Vec::new();
        for range in &ranges {
            let Some(units) = read_range(reader, range) else {
                return ParseOutcome::Aborted;
            };
            tokenize(&units, range.start, &mut words);
        }
        self.parses.fetch_add(1, Ordering::SeqCst);
        ParseOutcome::Complete(ToyTree {
            words: Arc::new(words),
            ranges,
        })
    }
}

/// Registry for `tmpl`, `js` (both with injections), `css` and `slow`.
#[derive(Default)]
pub struct ToyRegistry {
    parses: Arc<AtomicUsize>,
}

impl ToyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed parses so far, across all languages.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}

fn injecting(language: &LanguageId) -> bool {
    matches!(language.as_str(), "tmpl" | "js")
}

impl GrammarRegistry for ToyRegistry {
    type Parser = ToyParser;

    fn create_parser(&self, language: &LanguageId) -> Result<ToyParser, SyntaxError> {
        match language.as_str() {
            "tmpl" | "js" | "css" | "slow" => Ok(ToyParser {
                language: language.clone(),
                ranges: None,
                parses: Arc::clone(&self.parses),
            }),
            other => Err(SyntaxError::GrammarNotFound(other.to_string())),
        }
    }

    fn supports_injections(&self, language: &LanguageId) -> bool {
        injecting(language)
    }

    fn injections(
        &self,
        _language: &LanguageId,
        tree: &ToyTree,
        _reader: &dyn TextReader,
    ) -> Result<Vec<Injection>, SyntaxError> {
        let words = &tree.words;
        let mut injections = Vec::new();
        let mut index = 0;
        while index < words.len() {
            let word = &words[index].text;
            let name = word
                .strip_prefix('<')
                .and_then(|w| w.strip_suffix('>'))
                .filter(|w| !w.starts_with('/') && !w.is_empty());
            let Some(name) = name else {
                index += 1;
                continue;
            };
            let close = format!("</{name}>");
            let Some(offset) = words[index + 1..].iter().position(|w| w.text == close) else {
                index += 1;
                continue;
            };
            let close_index = index + 1 + offset;
            let start = words[index].range.end;
            let end = words[close_index].range.start;
            if start < end {
                injections.push(Injection {
                    language: LanguageId::new(name),
                    ranges: vec![start..end],
                });
            }
            index = close_index + 1;
        }
        Ok(injections)
    }
}

/// Reads a plain string, for driving a layer set without a document.
pub struct StrReader(pub Vec<u16>);

impl StrReader {
    pub fn new(text: &str) -> Self {
        Self(text.encode_utf16().collect())
    }
}

impl TextReader for StrReader {
    fn len_bytes(&self) -> usize {
        self.0.len() * 2
    }

    fn read_utf16(&self, byte_offset: usize, max_units: usize) -> Option<Vec<u16>> {
        let start = (byte_offset / 2).min(self.0.len());
        let end = (start + max_units).min(self.0.len());
        Some(self.0[start..end].to_vec())
    }

    fn point_at(&self, byte_offset: usize) -> Option<TextPoint> {
        Some(TextPoint::new(0, byte_offset))
    }
}

/// Byte range of the first occurrence of `needle` in `text`.
pub fn byte_range_of(text: &str, needle: &str) -> ByteRange {
    let at = text.find(needle).expect("needle present");
    let start = text[..at].encode_utf16().count() * 2;
    start..start + needle.encode_utf16().count() * 2
}
