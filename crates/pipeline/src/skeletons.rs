use audit_code_chunker::{read_source, relative_path, skeleton, Language};
use std::path::{Path, PathBuf};

/// Skeleton of one file, formatted for a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonBlock {
    pub rel_path: String,
    pub language: Language,
    pub text: String,
}

/// Consecutive files packed into one prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based index of the first file in the batch
    pub first_file: usize,
    /// 1-based index of the last file in the batch
    pub last_file: usize,
    pub text: String,
}

const BLOCK_SEPARATOR: &str = "\n\n";

/// Skeletons of `files`; files that cannot be read or parsed are left out
pub async fn collect_skeletons(files: Vec<PathBuf>, root: &Path) -> Vec<SkeletonBlock> {
    let root = root.to_path_buf();
    let collected = tokio::task::spawn_blocking(move || {
        files
            .iter()
            .filter_map(|file| skeleton_block(file, &root))
            .collect::<Vec<_>>()
    })
    .await;
    collected.unwrap_or_else(|e| {
        log::warn!("Skeleton task failed: {e}");
        Vec::new()
    })
}

fn skeleton_block(file: &Path, root: &Path) -> Option<SkeletonBlock> {
    let rel_path = relative_path(file, root);
    let language = Language::from_path(file);
    let source = read_source(file)
        .map_err(|e| log::warn!("Skipping {rel_path}: {e}"))
        .ok()?;
    let skeleton = skeleton(&source, language)
        .map_err(|e| log::warn!("No skeleton for {rel_path}: {e}"))
        .ok()?;
    if skeleton.trim().is_empty() {
        return None;
    }
    Some(SkeletonBlock {
        text: format!("=== File: {rel_path} ===\n{}", skeleton.trim_end()),
        rel_path,
        language,
    })
}

/// Pack blocks into batches of at most `limit` chars each.
///
/// A block longer than `limit` gets a batch of its own.
#[must_use]
pub fn batch_skeletons(blocks: &[String], limit: usize) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current: Option<Batch> = None;

    for (i, block) in blocks.iter().enumerate() {
        let index = i + 1;
        let block_len = block.chars().count();
        match current.as_mut() {
            Some(batch)
                if batch.text.chars().count() + BLOCK_SEPARATOR.len() + block_len <= limit =>
            {
                batch.text.push_str(BLOCK_SEPARATOR);
                batch.text.push_str(block);
                batch.last_file = index;
            }
            _ => {
                if let Some(done) = current.take() {
                    batches.push(done);
                }
                current = Some(Batch {
                    first_file: index,
                    last_file: index,
                    text: block.clone(),
                });
            }
        }
    }
    batches.extend(current);
    batches
}
