use crate::error::{PipelineError, Result};
use crate::pipeline::{existing_dir, Pipeline};
use crate::scanner::FileScanner;
use crate::skeletons::{batch_skeletons, collect_skeletons, Batch};
use crate::wear::{Wear, ARCHITECTURE_REVIEWER};
use audit_content_cache::write_atomic;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArchitectureReport {
    pub markdown: String,
    pub file_count: usize,
    pub batch_count: usize,
    pub output_path: Option<PathBuf>,
}

/// Heading for a batch when a review spans several prompts
pub(crate) fn batch_heading(batch: &Batch) -> String {
    if batch.first_file == batch.last_file {
        format!("Files {}", batch.first_file)
    } else {
        format!("Files {}-{}", batch.first_file, batch.last_file)
    }
}

pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Pipeline {
    /// Review the architecture of `dir` from file skeletons
    pub async fn review_architecture(
        &self,
        dir: &Path,
        output: Option<&Path>,
    ) -> Result<ArchitectureReport> {
        let root = existing_dir(dir)?;
        let files = FileScanner::new(&root).scan();
        let blocks = collect_skeletons(files, &root).await;

        let texts: Vec<String> = blocks.iter().map(|b| b.text.clone()).collect();
        let batches = batch_skeletons(&texts, self.char_limit);

        let markdown = if batches.is_empty() {
            "# Architecture Review\n\nNo source files with a usable skeleton were found.\n".to_string()
        } else {
            log::info!("Reviewing {} skeletons in {} batches", blocks.len(), batches.len());
            let reviews = self.review_batches(&batches).await?;

            let header = format!(
                "# Architecture Review\n\n**Directory:** `{}`\n**Generated:** {}\n**Files:** {}\n\n---\n\n",
                root.display(),
                timestamp(),
                blocks.len()
            );
            let body = if reviews.len() == 1 {
                reviews.into_iter().map(|(_, r)| r).collect::<String>()
            } else {
                reviews
                    .into_iter()
                    .map(|(batch, review)| format!("## {}\n\n{review}", batch_heading(batch)))
                    .collect::<Vec<_>>()
                    .join("\n\n---\n\n")
            };
            header + &body
        };

        if let Some(path) = output {
            write_atomic(path, markdown.as_bytes()).await?;
            log::info!("Wrote architecture review to {}", path.display());
        }
        Ok(ArchitectureReport {
            markdown,
            file_count: blocks.len(),
            batch_count: batches.len(),
            output_path: output.map(Path::to_path_buf),
        })
    }

    async fn review_batches<'a>(&self, batches: &'a [Batch]) -> Result<Vec<(&'a Batch, String)>> {
        let wear = Wear::builtin(ARCHITECTURE_REVIEWER)
            .ok_or_else(|| PipelineError::UnknownWear(ARCHITECTURE_REVIEWER.to_string()))?;
        let mut reviews = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            log::info!("Reviewing batch {}/{} ({})", i + 1, batches.len(), batch_heading(batch));
            let prompt = format!("Review the architecture of this skeleton code:\n\n{}", batch.text);
            let review = match self.orchestrator.generate_document(wear, &prompt).await {
                Ok(text) => text.trim().to_string(),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("Batch {} failed: {e}", i + 1);
                    format!("*Review of batch {} failed: {e}*", i + 1)
                }
            };
            reviews.push((batch, review));
        }
        Ok(reviews)
    }
}
