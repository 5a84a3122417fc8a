//! # Audit Code Chunker
//!
//! Splits source files into named, size-bounded units that a language model
//! can review one at a time.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Tree-sitter Parsing → AST
//!     │    └─> per-language LanguageChunker (Python, JS/TS, Rust)
//!     │         ├─> functions and methods (qualified `Class.method`)
//!     │         └─> class headers up to their first member
//!     │
//!     ├──> Heuristic fallback when the tree has syntax errors
//!     │    └─> indentation (Python) or brace matching
//!     │
//!     ├──> Module blocks for top-level code outside definitions
//!     │
//!     └──> Size Guard
//!          └─> split oversized chunks into `#n` sub-chunks on line boundaries
//! ```
//!
//! ## Example
//!
//! ```rust
//! use audit_code_chunker::{Chunker, ChunkerConfig, Language};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//!
//! let code = r#"
//! class Greeter:
//!     def greet(self, name):
//!         return f"hello {name}"
//! "#;
//!
//! let outcome = chunker
//!     .chunk_guarded("greeter.py", code, Language::Python)
//!     .unwrap();
//! for chunk in &outcome.chunks {
//!     println!("{} starts at line {}", chunk.chunk_id, chunk.start_line);
//! }
//! assert_eq!(outcome.chunks[1].chunk_id, "greeter.py:Greeter.greet");
//! ```

mod ast_analyzer;
mod chunker;
mod config;
mod error;
mod heuristic;
mod language;
mod size_guard;
mod skeleton;
mod text;
mod types;

pub use ast_analyzer::AstAnalyzer;
pub use chunker::{read_source, relative_path, Chunker, MODULE_BLOCK_NAME};
pub use config::{ChunkerConfig, DEFAULT_MAX_CHUNK_CHARS};
pub use error::{ChunkerError, Result};
pub use language::{Language, SUPPORTED_EXTENSIONS};
pub use size_guard::SizeGuard;
pub use skeleton::skeleton;
pub use text::{estimate_tokens, truncate_to_limit};
pub use types::{parent_chunk_id, Chunk, ChunkKind, ChunkOutcome};
