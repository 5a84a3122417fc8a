//! Small text utilities shared by the chunker, size guard and prompt builders.

/// Rough token estimate: ASCII text averages ~4 chars per token, while
/// non-ASCII (CJK and the like) tends to cost ~2 tokens per char.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    let (ascii, other) = text.chars().fold((0usize, 0usize), |(a, o), c| {
        if c.is_ascii() {
            (a + 1, o)
        } else {
            (a, o + 1)
        }
    });
    ascii / 4 + other * 2
}

/// Cut `text` to at most `max_chars` characters, appending a note with the
/// number of characters dropped. Text that already fits is returned as is.
#[must_use]
pub fn truncate_to_limit(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let cut = byte_offset_of_char(text, max_chars);
    format!(
        "{}\n... (truncated: {} chars omitted)",
        &text[..cut],
        total - max_chars
    )
}

fn byte_offset_of_char(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Byte offsets of line starts, for turning line ranges into exact substrings.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Text of a single line without its terminator
    pub fn line(&self, line: usize) -> &'a str {
        let start = self.starts[line];
        let end = self.line_end(line);
        &self.text[start..end]
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.starts[line]
    }

    /// Byte offset just past the last character of `line`, excluding `\r\n`
    pub fn line_end(&self, line: usize) -> usize {
        let mut end = self
            .starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        if end > self.starts[line] && self.text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        end
    }

    /// 0-indexed line that contains `byte`
    pub fn line_of_byte(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }
}

/// Leading whitespace width, tabs counted as 4 columns
pub(crate) fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn estimate_counts_ascii_and_wide_chars() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("日本"), 4);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_to_limit("short", 10), "short");
    }

    #[test]
    fn truncate_appends_note() {
        let out = truncate_to_limit("abcdefghij", 4);
        assert_eq!(out, "abcd\n... (truncated: 6 chars omitted)");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let out = truncate_to_limit("ééééé", 2);
        assert!(out.starts_with("éé\n"));
    }

    #[test]
    fn line_index_slices_exact_text() {
        let text = "a\r\nbb\nccc";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line(0), "a");
        assert_eq!(index.line(1), "bb");
        assert_eq!(&text[index.line_start(1)..index.line_end(2)], "bb\nccc");
        assert_eq!(index.line_of_byte(4), 1);
        assert_eq!(index.line_of_byte(0), 0);
    }
}
