use crate::text::indent_width;
use crate::types::Chunk;
use unicode_segmentation::UnicodeSegmentation;

/// Bounds every chunk to a character ceiling before it is sent for inference.
///
/// Oversized chunks are split on line boundaries, preferring a line that ends
/// a statement (blank line, `;`, `}` or a dedent) in the back half of the
/// window. A single line longer than the ceiling is cut on grapheme
/// boundaries. Sub-chunks are named `<chunk_id>#<n>` and keep their own
/// absolute `start_line`. Small chunks are never merged.
#[derive(Debug, Clone, Copy)]
pub struct SizeGuard {
    max_chars: usize,
}

impl SizeGuard {
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Apply the guard to every chunk, preserving order
    #[must_use]
    pub fn guard_all(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks.into_iter().flat_map(|c| self.guard(c)).collect()
    }

    /// Split one chunk if it exceeds the ceiling
    #[must_use]
    pub fn guard(&self, chunk: Chunk) -> Vec<Chunk> {
        if chunk.char_len() <= self.max_chars {
            return vec![chunk];
        }

        let parts = self.split_parts(&chunk.source_text);
        if parts.len() <= 1 {
            return vec![chunk];
        }

        log::debug!(
            "Splitting {} ({} chars) into {} parts",
            chunk.chunk_id,
            chunk.char_len(),
            parts.len()
        );

        parts
            .into_iter()
            .enumerate()
            .map(|(i, (line_offset, text))| Chunk {
                chunk_id: format!("{}#{}", chunk.chunk_id, i + 1),
                qualified_name: format!("{}#{}", chunk.qualified_name, i + 1),
                source_text: text,
                start_line: chunk.start_line + line_offset,
                kind: chunk.kind,
            })
            .collect()
    }

    /// `(line offset within the chunk, text)` pieces, each within the ceiling
    fn split_parts(&self, text: &str) -> Vec<(usize, String)> {
        let lines: Vec<&str> = text.split('\n').collect();
        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        let mut parts = Vec::new();
        let mut first = 0;

        while first < lines.len() {
            if widths[first] > self.max_chars {
                for piece in self.hard_split(lines[first]) {
                    parts.push((first, piece));
                }
                first += 1;
                continue;
            }

            let mut last = first;
            let mut len = widths[first];
            let mut boundary = None;
            if is_boundary(&lines, first) {
                boundary = Some(first);
            }
            while last + 1 < lines.len() && len + 1 + widths[last + 1] <= self.max_chars {
                last += 1;
                len += 1 + widths[last];
                if is_boundary(&lines, last) {
                    boundary = Some(last);
                }
            }

            let midpoint = first + (last - first) / 2;
            let end = match boundary {
                _ if last + 1 == lines.len() => last,
                Some(b) if b >= midpoint => b,
                _ => last,
            };
            parts.push((first, lines[first..=end].join("\n")));
            first = end + 1;
        }
        parts
    }

    /// Cut one line into pieces of at most `max_chars` chars.
    ///
    /// Graphemes stay whole unless a single grapheme is wider than the
    /// ceiling, in which case it is cut between its chars.
    fn hard_split(&self, line: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut count = 0;
        let units = line.graphemes(true).flat_map(|g| {
            if g.chars().count() > self.max_chars {
                g.char_indices()
                    .map(|(i, c)| &g[i..i + c.len_utf8()])
                    .collect::<Vec<_>>()
            } else {
                vec![g]
            }
        });
        for grapheme in units {
            let width = grapheme.chars().count();
            if count + width > self.max_chars && !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                count = 0;
            }
            current.push_str(grapheme);
            count += width;
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

/// Whether a split right after line `i` falls between statements
fn is_boundary(lines: &[&str], i: usize) -> bool {
    let trimmed = lines[i].trim_end();
    if trimmed.trim().is_empty() {
        return true;
    }
    if trimmed.ends_with(';') || trimmed.ends_with('}') {
        return true;
    }
    let opens_block = [':', '{', '(', '[', ',', '\\', '='].iter().any(|c| trimmed.ends_with(*c));
    match lines.get(i + 1) {
        Some(next) if !next.trim().is_empty() => {
            !opens_block && indent_width(next) <= indent_width(lines[i])
        }
        _ => !opens_block,
    }
}
