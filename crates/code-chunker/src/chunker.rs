use crate::ast_analyzer::AstAnalyzer;
use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::heuristic;
use crate::language::Language;
use crate::size_guard::SizeGuard;
use crate::text::{indent_width, LineIndex};
use crate::types::{Chunk, ChunkKind, ChunkOutcome, Span};
use std::collections::HashMap;
use std::path::Path;

/// Qualified name given to top-level code outside any definition
pub const MODULE_BLOCK_NAME: &str = "<module>";

/// Main chunker interface for processing code
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::InvalidConfig)?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Size guard using this chunker's character ceiling
    #[must_use]
    pub fn size_guard(&self) -> SizeGuard {
        SizeGuard::new(self.config.max_chunk_chars)
    }

    /// Chunk a file on disk; ids use its path relative to `root`
    pub fn chunk_file(&self, path: &Path, root: &Path) -> Result<ChunkOutcome> {
        let content = read_source(path)?;
        let rel_path = relative_path(path, root);
        self.chunk_source(&rel_path, &content, Language::from_path(path))
    }

    /// Chunk source text, falling back to line heuristics when it does not parse
    pub fn chunk_source(
        &self,
        rel_path: &str,
        content: &str,
        language: Language,
    ) -> Result<ChunkOutcome> {
        if content.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        if !language.supports_ast() {
            return Err(ChunkerError::UnsupportedLanguage(language));
        }

        let (spans, degraded) = match Self::ast_spans(content, language) {
            Ok(spans) => (spans, None),
            Err(e) => {
                if e.is_recoverable() {
                    log::warn!("AST chunking failed for {rel_path}, falling back to heuristic: {e}");
                } else {
                    log::error!("{rel_path}: {e}; using heuristic chunks");
                }
                (heuristic::fallback_spans(content, language), Some(e.to_string()))
            }
        };

        let chunks = self.assemble(rel_path, content, language, spans);
        log::debug!("{rel_path}: {} chunks", chunks.len());
        Ok(ChunkOutcome { chunks, degraded })
    }

    /// Chunk, then bound every chunk with the size guard
    pub fn chunk_guarded(
        &self,
        rel_path: &str,
        content: &str,
        language: Language,
    ) -> Result<ChunkOutcome> {
        let outcome = self.chunk_source(rel_path, content, language)?;
        Ok(ChunkOutcome {
            chunks: self.size_guard().guard_all(outcome.chunks),
            degraded: outcome.degraded,
        })
    }

    fn ast_spans(content: &str, language: Language) -> Result<Vec<Span>> {
        let mut analyzer = AstAnalyzer::new(language)?;
        analyzer.definitions(content)
    }

    fn assemble(
        &self,
        rel_path: &str,
        content: &str,
        language: Language,
        mut spans: Vec<Span>,
    ) -> Vec<Chunk> {
        spans.sort_by_key(|s| (s.start_byte, s.end_byte));

        let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            let overlaps = kept.last().is_some_and(|prev| span.start_byte < prev.end_byte);
            if overlaps || span.end_byte <= span.start_byte {
                log::debug!("Dropping overlapping span {} in {rel_path}", span.qualified_name);
                continue;
            }
            kept.push(span);
        }

        if self.config.emit_module_block {
            let blocks = module_blocks(content, language, &kept);
            kept.extend(blocks);
            kept.sort_by_key(|s| s.start_byte);
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        kept.into_iter()
            .map(|span| {
                let count = seen.entry(span.qualified_name.clone()).or_insert(0);
                *count += 1;
                let name = if *count == 1 {
                    span.qualified_name
                } else {
                    format!("{}~{count}", span.qualified_name)
                };
                Chunk::new(
                    rel_path,
                    name,
                    &content[span.start_byte..span.end_byte],
                    span.start_line,
                    span.kind,
                )
            })
            .collect()
    }
}

/// Runs of top-level lines not covered by any definition that hold real code
fn module_blocks(content: &str, language: Language, spans: &[Span]) -> Vec<Span> {
    let index = LineIndex::new(content);
    let mut covered = vec![false; index.line_count()];
    for span in spans {
        let first = index.line_of_byte(span.start_byte);
        let last = index.line_of_byte(span.end_byte.saturating_sub(1).max(span.start_byte));
        for flag in &mut covered[first..=last] {
            *flag = true;
        }
    }

    let mut blocks = Vec::new();
    let mut run_start: Option<usize> = None;
    for line in 0..=index.line_count() {
        let uncovered = line < index.line_count() && !covered[line];
        match (uncovered, run_start) {
            (true, None) => run_start = Some(line),
            (false, Some(start)) => {
                if let Some(span) = module_run(&index, language, start, line - 1) {
                    blocks.push(span);
                }
                run_start = None;
            }
            _ => {}
        }
    }
    blocks
}

fn module_run(index: &LineIndex, language: Language, first: usize, last: usize) -> Option<Span> {
    let is_blank = |l: usize| index.line(l).trim().is_empty();
    let first = (first..=last).find(|&l| !is_blank(l))?;
    let last = (first..=last).rev().find(|&l| !is_blank(l))?;

    // Indented leftovers (class attributes between methods) are not module code
    let significant = (first..=last).any(|l| {
        let line = index.line(l);
        let trimmed = line.trim();
        indent_width(line) == 0
            && !trimmed.is_empty()
            && !language.comment_prefixes().iter().any(|p| trimmed.starts_with(p))
            && !language.import_patterns().iter().any(|p| trimmed.starts_with(p))
            && !trimmed.chars().all(|c| matches!(c, '}' | ')' | ']' | ';' | ','))
    });
    if !significant {
        return None;
    }

    Some(Span {
        qualified_name: MODULE_BLOCK_NAME.to_string(),
        kind: ChunkKind::ModuleBlock,
        start_byte: index.line_start(first),
        end_byte: index.line_end(last),
        start_line: first,
    })
}

/// Read a source file, replacing invalid UTF-8 rather than failing
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// `/`-separated path of `path` relative to `root` (file name when outside it)
#[must_use]
pub fn relative_path(path: &Path, root: &Path) -> String {
    let rel = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path.file_name().map_or(path, Path::new),
    };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunker() -> Chunker {
        Chunker::new(ChunkerConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Chunker::new(ChunkerConfig::with_max_chars(0)).unwrap_err();
        assert!(matches!(err, ChunkerError::InvalidConfig(_)));
    }

    #[test]
    fn test_module_block_collects_top_level_code() {
        let code = "import os\n\nLIMIT = 10\n\ndef f():\n    return LIMIT\n\nif __name__ == \"__main__\":\n    f()\n";
        let outcome = chunker().chunk_source("m.py", code, Language::Python).unwrap();
        let ids: Vec<_> = outcome.chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["m.py:<module>", "m.py:f", "m.py:<module>~2"]);
        assert_eq!(outcome.chunks[0].source_text, "import os\n\nLIMIT = 10");
        assert_eq!(outcome.chunks[2].start_line, 7);
    }

    #[test]
    fn test_import_only_preamble_is_not_a_chunk() {
        let code = "import os\nfrom sys import argv\n\ndef main():\n    print(argv)\n";
        let outcome = chunker().chunk_source("m.py", code, Language::Python).unwrap();
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].chunk_id, "m.py:main");
        assert_eq!(outcome.chunks[0].start_line, 3);
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let code = "def f():\n    pass\n\ndef f():\n    return 1\n";
        let outcome = chunker().chunk_source("d.py", code, Language::Python).unwrap();
        let ids: Vec<_> = outcome.chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["d.py:f", "d.py:f~2"]);
    }

    #[test]
    fn test_parse_failure_degrades_to_heuristic() {
        let code = "def ok():\n    return 1\n\ndef broken(:\n    pass\n";
        let outcome = chunker().chunk_source("b.py", code, Language::Python).unwrap();
        assert!(outcome.is_degraded());
        let names: Vec<_> = outcome.chunks.iter().map(|c| c.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["ok", "broken"]);
    }

    #[test]
    fn test_empty_content_is_an_error() {
        let err = chunker().chunk_source("e.py", "  \n", Language::Python).unwrap_err();
        assert!(matches!(err, ChunkerError::EmptyContent));
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(Path::new("/repo/pkg/a.py"), root), "pkg/a.py");
        assert_eq!(relative_path(Path::new("/elsewhere/b.py"), root), "b.py");
    }
}
