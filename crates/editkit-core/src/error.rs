//! Error types.

use thiserror::Error;

/// Errors returned when an edit is rejected.
///
/// A rejected edit leaves the document untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The replaced range is reversed or extends past the end of the document.
    #[error("invalid range {start}..{end} for a document of length {len}")]
    InvalidRange {
        /// Requested start (UTF-16 units).
        start: usize,
        /// Requested end (UTF-16 units).
        end: usize,
        /// Document length at the time of the request.
        len: usize,
    },
    /// A range boundary falls between the two halves of a surrogate pair.
    #[error("offset {offset} splits a surrogate pair")]
    SplitSurrogate {
        /// The offending offset (UTF-16 units).
        offset: usize,
    },
}

impl EditError {
    /// Check that `start..end` is a valid replacement range for a document of `len` units.
    pub fn check_range(start: usize, end: usize, len: usize) -> Result<(), Self> {
        if start > end || end > len {
            return Err(Self::InvalidRange { start, end, len });
        }
        Ok(())
    }
}

/// Recoverable syntax-layer failures.
///
/// None of these abort an edit: the affected layer is skipped and the failure is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// No grammar is registered under this language name.
    #[error("no grammar registered for language `{0}`")]
    GrammarNotFound(String),
    /// The grammar exists but could not be loaded into a parser.
    #[error("failed to load grammar for `{language}`: {message}")]
    Language {
        /// Language name.
        language: String,
        /// Backend message.
        message: String,
    },
    /// A highlights or injections query failed to compile.
    #[error("invalid {kind} query for `{language}`: {message}")]
    Query {
        /// Language name.
        language: String,
        /// Which query (`highlights`, `injections`).
        kind: &'static str,
        /// Backend message.
        message: String,
    },
    /// The parser rejected a layer's included ranges.
    #[error("invalid included ranges: {0}")]
    IncludedRanges(String),
    /// The background parse thread could not be started.
    #[error("failed to start syntax worker: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(EditError::check_range(0, 0, 0).is_ok());
        assert!(EditError::check_range(2, 5, 5).is_ok());
        assert_eq!(
            EditError::check_range(3, 2, 5),
            Err(EditError::InvalidRange {
                start: 3,
                end: 2,
                len: 5
            })
        );
        assert!(EditError::check_range(0, 6, 5).is_err());
        assert_eq!(
            EditError::check_range(0, 6, 5).unwrap_err().to_string(),
            "invalid range 0..6 for a document of length 5"
        );
    }
}
