use crate::language::Language;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Tree-sitter produced no tree at all
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The tree contains error nodes; callers fall back to heuristic chunking
    #[error("{} syntax error near line {line}", .language.as_str())]
    Syntax { language: Language, line: usize },

    #[error("No chunker for {} files", .0.as_str())]
    UnsupportedLanguage(Language),

    #[error("Invalid chunker configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File has no content to chunk")]
    EmptyContent,

    #[error("Tree-sitter grammar rejected: {0}")]
    TreeSitterError(#[from] tree_sitter::LanguageError),
}

impl ChunkerError {
    /// True when structural parsing failed but the text is still usable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ParseError(_) | Self::Syntax { .. })
    }
}
