use crate::error::{PipelineError, Result};
use crate::orchestrator::{AuditResult, CachePolicy};
use crate::pipeline::{existing_dir, Pipeline};
use crate::scanner::FileScanner;
use crate::wear::Wear;
use audit_code_chunker::relative_path;
use audit_content_cache::write_json_atomic;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const AUDIT_SUFFIX: &str = "_audit.json";
pub const SUMMARY_FILE_NAME: &str = "_summary_audit.json";

/// Issues for every chunk of one file, in file order
#[derive(Debug, Clone, Serialize)]
pub struct FileAuditResult {
    pub source_file: PathBuf,
    pub chunks: Vec<AuditResult>,
    pub total_issues: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl FileAuditResult {
    fn new(source_file: PathBuf, chunks: Vec<AuditResult>, degraded: Option<String>) -> Self {
        let total_issues = chunks.iter().map(|c| c.issues.len()).sum();
        Self {
            source_file,
            chunks,
            total_issues,
            degraded,
        }
    }

    #[must_use]
    pub fn high_severity(&self) -> usize {
        self.chunks.iter().map(AuditResult::high_severity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub total_issues: usize,
    pub high_severity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub reason: String,
}

/// Directory-wide roll-up written to `_summary_audit.json`
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryAuditResult {
    pub directory: PathBuf,
    pub total_files: usize,
    pub audited_files: usize,
    pub skipped_files: usize,
    pub total_issues: usize,
    pub high_severity_total: usize,
    pub files: Vec<FileSummary>,
    pub failed: Vec<FailedFile>,
    #[serde(skip)]
    pub summary_path: PathBuf,
}

/// Where the per-file artifact for `source` goes.
///
/// Next to the source by default; under `output_dir` the directory layout
/// below `root` is mirrored.
#[must_use]
pub fn artifact_path(source: &Path, root: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{stem}{AUDIT_SUFFIX}");
    match output_dir {
        None => source.with_file_name(file_name),
        Some(out) => {
            let rel = source.strip_prefix(root).unwrap_or(source);
            let parent = rel.parent().unwrap_or_else(|| Path::new(""));
            out.join(parent).join(file_name)
        }
    }
}

/// Write a file audit as pretty JSON, atomically
pub async fn write_file_artifact(result: &FileAuditResult, path: &Path) -> Result<()> {
    write_json_atomic(path, result).await?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

impl Pipeline {
    /// Audit one file with the security and readability wears.
    ///
    /// With `force`, everything cached for the file's chunks is dropped and
    /// every pair goes to the model again.
    pub async fn audit_file(&self, path: &Path, root: &Path, force: bool) -> Result<FileAuditResult> {
        let source_file = path
            .canonicalize()
            .map_err(|e| PipelineError::invalid_path(path, &e.to_string()))?;
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        log::info!("Auditing {}", source_file.display());

        let outcome = self.chunk_file(&source_file, &root).await?;
        if let Some(reason) = &outcome.degraded {
            log::warn!("{}: structural parse failed, using heuristic chunks ({reason})", source_file.display());
        }
        if outcome.chunks.is_empty() {
            log::info!("No chunks in {}", source_file.display());
            return Ok(FileAuditResult::new(source_file, Vec::new(), outcome.degraded));
        }

        if force {
            let parents: BTreeSet<&str> = outcome.chunks.iter().map(|c| c.parent_id()).collect();
            for id in parents {
                self.cache.invalidate_all_for(id).await?;
            }
        }

        let wears = Wear::audit_set();
        let results = self
            .orchestrator
            .audit_chunks(&outcome.chunks, &wears, CachePolicy::from_force(force))
            .await?;

        let result = FileAuditResult::new(source_file, results, outcome.degraded);
        log::info!(
            "{}: {} chunks, {} issues",
            result.source_file.display(),
            result.chunks.len(),
            result.total_issues
        );
        Ok(result)
    }

    /// Audit one file and write its artifact; `None` when it has no chunks
    pub async fn audit_single(
        &self,
        path: &Path,
        force: bool,
        output_dir: Option<&Path>,
    ) -> Result<Option<(FileAuditResult, PathBuf)>> {
        let root = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let result = self.audit_file(path, &root, force).await?;
        if result.is_empty() {
            return Ok(None);
        }
        let root = result.source_file.parent().unwrap_or(&root).to_path_buf();
        let out = artifact_path(&result.source_file, &root, output_dir);
        write_file_artifact(&result, &out).await?;
        Ok(Some((result, out)))
    }

    /// Audit every eligible file below `dir`, then write the summary.
    ///
    /// Files are processed one after another; within a file all
    /// (chunk, wear) pairs share the concurrency limit. A failing file is
    /// recorded in `failed` unless the failure is fatal.
    pub async fn audit_directory(
        &self,
        dir: &Path,
        force: bool,
        output_dir: Option<&Path>,
    ) -> Result<DirectoryAuditResult> {
        let root = existing_dir(dir)?;
        let files = FileScanner::new(&root).scan();
        log::info!("Auditing {} files under {}", files.len(), root.display());

        let mut summaries = Vec::new();
        let mut failed = Vec::new();
        let mut skipped_files = 0;

        for (i, file) in files.iter().enumerate() {
            let rel = relative_path(file, &root);
            log::info!("[{}/{}] {rel}", i + 1, files.len());

            let result = match self.audit_file(file, &root, force).await {
                Ok(result) => result,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("Failed to audit {rel}: {e}");
                    failed.push(FailedFile {
                        file: rel,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if result.is_empty() {
                skipped_files += 1;
                continue;
            }

            let out = artifact_path(file, &root, output_dir);
            if let Err(e) = write_file_artifact(&result, &out).await {
                log::warn!("Failed to write {}: {e}", out.display());
                failed.push(FailedFile {
                    file: rel,
                    reason: e.to_string(),
                });
                continue;
            }
            summaries.push(FileSummary {
                file: rel,
                total_issues: result.total_issues,
                high_severity: result.high_severity(),
            });
        }

        summaries.sort_by(|a, b| b.total_issues.cmp(&a.total_issues).then_with(|| a.file.cmp(&b.file)));
        let summary_dir = output_dir.map_or_else(|| root.clone(), Path::to_path_buf);
        let summary = DirectoryAuditResult {
            total_files: files.len(),
            audited_files: summaries.len(),
            skipped_files,
            total_issues: summaries.iter().map(|f| f.total_issues).sum(),
            high_severity_total: summaries.iter().map(|f| f.high_severity).sum(),
            files: summaries,
            failed,
            summary_path: summary_dir.join(SUMMARY_FILE_NAME),
            directory: root,
        };
        write_json_atomic(&summary.summary_path, &summary).await?;
        log::info!(
            "Audit complete: {} files, {} skipped, {} failed, {} issues ({} high). Summary: {}",
            summary.total_files,
            summary.skipped_files,
            summary.failed.len(),
            summary.total_issues,
            summary.high_severity_total,
            summary.summary_path.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn artifact_next_to_source() {
        let path = artifact_path(Path::new("/repo/pkg/mod.py"), Path::new("/repo"), None);
        assert_eq!(path, PathBuf::from("/repo/pkg/mod_audit.json"));
    }

    #[test]
    fn artifact_mirrors_tree_under_output_dir() {
        let path = artifact_path(
            Path::new("/repo/pkg/sub/mod.ts"),
            Path::new("/repo"),
            Some(Path::new("/out")),
        );
        assert_eq!(path, PathBuf::from("/out/pkg/sub/mod_audit.json"));
    }
}
