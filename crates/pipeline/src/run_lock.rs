use crate::error::{PipelineError, Result};
use fs2::FileExt;
use std::path::Path;

/// Exclusive advisory lock on a file, released on drop
pub(crate) struct RunLock {
    file: std::fs::File,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl RunLock {
    /// Wait for the lock at `path`, creating the file if needed
    pub(crate) async fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<RunLock> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)
                .map_err(|err| {
                    PipelineError::LockError(format!("open {}: {err}", path.display()))
                })?;
            file.lock_exclusive().map_err(|err| {
                PipelineError::LockError(format!("acquire {}: {err}", path.display()))
            })?;
            log::debug!("Acquired run lock {}", path.display());
            Ok(RunLock { file })
        })
        .await?
    }

}
