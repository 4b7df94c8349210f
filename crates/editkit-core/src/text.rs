//! Text measurement helpers.
//!
//! Every character offset in `editkit-core` counts UTF-16 code units. Parser-facing byte offsets
//! are exactly twice the character offset (see [`BYTES_PER_UNIT`]).

/// Number of parser bytes per UTF-16 code unit.
pub const BYTES_PER_UNIT: usize = 2;

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Returns `true` if `c` starts or is a line break (`'\n'` or `'\r'`).
pub fn is_line_break_char(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Returns `true` if `text` is exactly one line terminator: `"\n"`, `"\r"` or `"\r\n"`.
pub fn is_single_line_break(text: &str) -> bool {
    matches!(text, "\n" | "\r" | "\r\n")
}

/// Returns `true` if `text` is non-empty and made only of whitespace (line breaks included).
pub fn is_whitespace_only(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_whitespace)
}

/// Splits `text` into lines that keep their terminators.
///
/// `"\n"`, `"\r"` and `"\r\n"` all end a line; a `"\r\n"` pair is never split. A text with N
/// line breaks yields N + 1 pieces, so the last piece is empty when the text ends with a
/// terminator (or when the text itself is empty).
pub fn split_lines_with_endings(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    lines.push(&text[start..]);
    lines
}

/// Number of line breaks in `text` (a `"\r\n"` pair counts once).
pub fn line_break_count(text: &str) -> usize {
    split_lines_with_endings(text).len() - 1
}

/// Length of the terminator that ends `line`, in UTF-16 units (0 if the line has none).
pub fn terminator_len(line: &str) -> usize {
    if line.ends_with("\r\n") {
        2
    } else if line.ends_with(['\n', '\r']) {
        1
    } else {
        0
    }
}
