use serde::{Deserialize, Serialize};

/// A named, ordered unit of source code submitted for review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `<relative_path>:<qualified_name>`, unique within a file
    pub chunk_id: String,

    /// Nesting-aware name, e.g. `ClassName.method_name`
    pub qualified_name: String,

    /// Exact substring of the file covered by this unit
    pub source_text: String,

    /// Start line (0-indexed) in the original file
    pub start_line: usize,

    /// What kind of definition produced this unit
    pub kind: ChunkKind,
}

impl Chunk {
    /// Create a new chunk for a file-relative path
    #[must_use]
    pub fn new(
        rel_path: &str,
        qualified_name: impl Into<String>,
        source_text: impl Into<String>,
        start_line: usize,
        kind: ChunkKind,
    ) -> Self {
        let qualified_name = qualified_name.into();
        Self {
            chunk_id: format!("{rel_path}:{qualified_name}"),
            qualified_name,
            source_text: source_text.into(),
            start_line,
            kind,
        }
    }

    /// Number of lines in this chunk
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source_text.split('\n').count()
    }

    /// Last line (0-indexed, inclusive)
    #[must_use]
    pub fn end_line(&self) -> usize {
        self.start_line + self.line_count() - 1
    }

    /// Length in characters, the unit the size guard measures
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.source_text.chars().count()
    }

    /// Check if chunk contains a specific 0-indexed line
    #[must_use]
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line()
    }

    /// Id of the unit this chunk was split from, or its own id
    #[must_use]
    pub fn parent_id(&self) -> &str {
        parent_chunk_id(&self.chunk_id)
    }
}

/// Strip a size-guard `#n` suffix from a chunk id.
#[must_use]
pub fn parent_chunk_id(chunk_id: &str) -> &str {
    match chunk_id.rsplit_once('#') {
        Some((parent, index)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            parent
        }
        _ => chunk_id,
    }
}

/// Kind of definition a chunk was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ChunkKind {
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "class")]
    Class,
    #[serde(rename = "module-level-block")]
    ModuleBlock,
}

impl ChunkKind {
    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::ModuleBlock => "module-level-block",
        }
    }
}

/// Chunks for one file plus the reason structured parsing was abandoned, if it was
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub chunks: Vec<Chunk>,
    pub degraded: Option<String>,
}

impl ChunkOutcome {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// A definition located by a language extractor, before it becomes a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Span {
    pub qualified_name: String,
    pub kind: ChunkKind,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        let chunk = Chunk::new("pkg/a.py", "Foo.bar", "def bar(self):\n    pass", 3, ChunkKind::Function);
        assert_eq!(chunk.chunk_id, "pkg/a.py:Foo.bar");
        assert_eq!(chunk.line_count(), 2);
        assert_eq!(chunk.end_line(), 4);
    }

    #[test]
    fn test_chunk_contains_line() {
        let chunk = Chunk::new("a.rs", "f", "fn f() {\n}\n", 10, ChunkKind::Function);
        assert!(chunk.contains_line(10));
        assert!(chunk.contains_line(12));
        assert!(!chunk.contains_line(9));
        assert!(!chunk.contains_line(13));
    }

    #[test]
    fn test_parent_chunk_id() {
        assert_eq!(parent_chunk_id("a.py:foo#2"), "a.py:foo");
        assert_eq!(parent_chunk_id("a.py:foo"), "a.py:foo");
        assert_eq!(parent_chunk_id("a.py:weird#name"), "a.py:weird#name");
    }

    #[test]
    fn test_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&ChunkKind::ModuleBlock).unwrap();
        assert_eq!(json, "\"module-level-block\"");
        assert_eq!(ChunkKind::Class.as_str(), "class");
    }
}
