//! Line ending helpers.
//!
//! `editkit-core` keeps text exactly as it was given: `"\n"`, `"\r"` and `"\r\n"` are all line
//! terminators and may be mixed in one document. The dominant style is detected on load and used
//! when the editor inserts a line break on its own.

use crate::text::split_lines_with_endings;

/// Maximum number of terminated lines sampled by [`LineEnding::detect_in_text`].
pub const LINE_ENDING_SAMPLE_LIMIT: usize = 15;

/// A newline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    #[default]
    Lf,
    /// Classic Mac CR (`'\r'`).
    Cr,
    /// Windows-style CRLF (`"\r\n"`).
    CrLf,
}

impl LineEnding {
    /// The terminator text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Cr => "\r",
            Self::CrLf => "\r\n",
        }
    }

    /// Length of the terminator in UTF-16 units.
    pub fn len_utf16(self) -> usize {
        self.as_str().len()
    }

    /// The terminator that ends `line`, if any.
    pub fn from_line(line: &str) -> Option<Self> {
        if line.ends_with("\r\n") {
            Some(Self::CrLf)
        } else if line.ends_with('\n') {
            Some(Self::Lf)
        } else if line.ends_with('\r') {
            Some(Self::Cr)
        } else {
            None
        }
    }

    /// Detect the dominant line ending from a source text.
    ///
    /// Policy: the first [`LINE_ENDING_SAMPLE_LIMIT`] terminated lines vote; the most frequent
    /// terminator wins, ties prefer LF, then CRLF. A text without line breaks is [`LineEnding::Lf`].
    pub fn detect_in_text(text: &str) -> Self {
        Self::detect_in_lines(split_lines_with_endings(text))
    }

    /// Same as [`LineEnding::detect_in_text`], over already split lines.
    pub fn detect_in_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut votes = [0usize; 3];
        for ending in lines
            .into_iter()
            .filter_map(Self::from_line)
            .take(LINE_ENDING_SAMPLE_LIMIT)
        {
            votes[ending.vote_slot()] += 1;
        }

        let mut best = Self::Lf;
        for candidate in [Self::CrLf, Self::Cr] {
            if votes[candidate.vote_slot()] > votes[best.vote_slot()] {
                best = candidate;
            }
        }
        best
    }

    /// Rewrite every terminator in `text` to this line ending.
    pub fn apply_to_text(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for line in split_lines_with_endings(text) {
            match Self::from_line(line) {
                Some(ending) => {
                    out.push_str(&line[..line.len() - ending.as_str().len()]);
                    out.push_str(self.as_str());
                }
                None => out.push_str(line),
            }
        }
        out
    }

    fn vote_slot(self) -> usize {
        match self {
            Self::Lf => 0,
            Self::CrLf => 1,
            Self::Cr => 2,
        }
    }
}
