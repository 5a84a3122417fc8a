//! # Audit Pipeline
//!
//! Multi-pass code review driven by a remote language model.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore + .aiauditignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> Chunker + Size Guard
//!     │      └─> Bounded chunks
//!     │
//!     ├──> Wear Orchestrator (chunk × wear, bounded concurrency)
//!     │      ├─> Content Cache (hit: no model call)
//!     │      └─> Inference Client (miss: call, validate, store)
//!     │
//!     └──> Artifacts
//!            ├─> <stem>_audit.json, _summary_audit.json
//!            ├─> rationale store
//!            ├─> architecture review
//!            └─> _design_detail.md, _design_overview.md
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use audit_inference::{InferenceClient, ModelConfig};
//! use audit_pipeline::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = InferenceClient::new(ModelConfig::new("http://localhost:11434/v1", "gpt-oss:120b"))?;
//!     let pipeline = Pipeline::open(PipelineConfig::new("/tmp/ai_audit"), client).await?;
//!
//!     let summary = pipeline.audit_directory(Path::new("src"), false, None).await?;
//!     println!("{} issues in {} files", summary.total_issues, summary.audited_files);
//!     pipeline.close().await?;
//!     Ok(())
//! }
//! ```

mod architecture;
mod audit;
mod design_doc;
mod error;
mod limits;
mod orchestrator;
mod pipeline;
mod rationale;
mod run_lock;
mod scanner;
mod skeletons;
pub mod wear;

pub use architecture::ArchitectureReport;
pub use audit::{
    artifact_path, write_file_artifact, DirectoryAuditResult, FailedFile, FileAuditResult,
    FileSummary, AUDIT_SUFFIX, SUMMARY_FILE_NAME,
};
pub use design_doc::{
    DesignDocReport, DesignDocRun, DesignDocState, DETAIL_FILE_NAME, OVERVIEW_FILE_NAME,
};
pub use error::{PipelineError, Result};
pub use limits::{
    parse_concurrency, ConcurrencyLimit, ConcurrencySnapshot, InferencePermit, CONCURRENCY_ENV,
    DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};
pub use orchestrator::{
    AuditResult, CachePolicy, CallCounter, CallStats, RationaleOutcome, WearOrchestrator,
};
pub use pipeline::{Pipeline, PipelineConfig};
pub use rationale::{RationaleEntry, RationaleReport, RationaleStore};
pub use scanner::{AuditIgnore, FileScanner, IGNORE_FILE_NAME};
pub use skeletons::{batch_skeletons, collect_skeletons, Batch, SkeletonBlock};
pub use wear::{Issue, Severity, Wear, WearOutput};
