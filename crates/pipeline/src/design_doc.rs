//! Two-stage design document generation with restart from the last
//! completed stage.
//!
//! ```text
//! NotStarted ──> Stage1Running ──> Stage1Done ──> Stage2Running ──> Stage2Done
//!                 skeletons ->      _design_       detail ->          _design_
//!                 detail designer   detail.md      overview designer  overview.md
//! ```
//!
//! Each artifact is written atomically when its stage finishes, so the
//! files on disk are the only state a restart needs.

use crate::architecture::{batch_heading, timestamp};
use crate::error::{PipelineError, Result};
use crate::pipeline::{existing_dir, Pipeline};
use crate::run_lock::RunLock;
use crate::scanner::FileScanner;
use crate::skeletons::{batch_skeletons, collect_skeletons};
use crate::wear::{Wear, DETAIL_DESIGNER, OVERVIEW_DESIGNER};
use audit_content_cache::write_atomic;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DETAIL_FILE_NAME: &str = "_design_detail.md";
pub const OVERVIEW_FILE_NAME: &str = "_design_overview.md";

const JS_TS_NOTICE: &str = "> **Note on JavaScript/TypeScript**\n\
> This document was produced by language-agnostic designers. Type safety,\n\
> async/await misuse, React hook rules and other JS/TS-specific concerns\n\
> were not analysed in depth.\n\n";
const JS_TS_MARKER: &str = "> **Note on JavaScript/TypeScript**";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DesignDocState {
    NotStarted,
    Stage1Running,
    Stage1Done,
    Stage2Running,
    Stage2Done,
}

impl DesignDocState {
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Stage1Running)
                | (Self::Stage1Running, Self::Stage1Done)
                | (Self::Stage1Done, Self::Stage2Running)
                | (Self::Stage2Running, Self::Stage2Done)
        )
    }
}

/// Artifact paths and progress of one design document run
#[derive(Debug, Clone)]
pub struct DesignDocRun {
    detail_path: PathBuf,
    overview_path: PathBuf,
    state: DesignDocState,
    transitions: Vec<DesignDocState>,
}

impl DesignDocRun {
    /// Work out where a run into `out_dir` starts.
    ///
    /// `force` deletes both artifacts first. An existing detail document
    /// means Stage 1 is already done.
    pub async fn resume_point(out_dir: &Path, force: bool) -> Result<Self> {
        let detail_path = out_dir.join(DETAIL_FILE_NAME);
        let overview_path = out_dir.join(OVERVIEW_FILE_NAME);

        if force {
            for path in [&detail_path, &overview_path] {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => log::info!("Removed {}", path.display()),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let state = if tokio::fs::try_exists(&detail_path).await? {
            DesignDocState::Stage1Done
        } else {
            DesignDocState::NotStarted
        };
        Ok(Self {
            detail_path,
            overview_path,
            state,
            transitions: vec![state],
        })
    }

    #[must_use]
    pub fn state(&self) -> DesignDocState {
        self.state
    }

    #[must_use]
    pub fn detail_path(&self) -> &Path {
        &self.detail_path
    }

    #[must_use]
    pub fn overview_path(&self) -> &Path {
        &self.overview_path
    }

    pub fn advance(&mut self, next: DesignDocState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log::debug!("Design doc {:?} -> {next:?}", self.state);
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignDocReport {
    pub detail_path: PathBuf,
    pub overview_path: PathBuf,
    pub stage1_skipped: bool,
    pub transitions: Vec<DesignDocState>,
}

impl Pipeline {
    /// Generate `_design_detail.md` then `_design_overview.md` for `dir`
    pub async fn generate_design_doc(
        &self,
        dir: &Path,
        output_dir: Option<&Path>,
        force: bool,
    ) -> Result<DesignDocReport> {
        let root = existing_dir(dir)?;
        let out_dir = output_dir.map_or_else(|| root.clone(), Path::to_path_buf);
        tokio::fs::create_dir_all(&out_dir).await?;
        let _lock = RunLock::acquire(&self.design_lock_path(&out_dir)).await?;

        let mut run = DesignDocRun::resume_point(&out_dir, force).await?;
        let stage1_skipped = run.state() == DesignDocState::Stage1Done;
        if stage1_skipped {
            log::info!(
                "{} exists, resuming at the overview stage",
                run.detail_path().display()
            );
        } else {
            run.advance(DesignDocState::Stage1Running)?;
            self.write_detail(&root, run.detail_path()).await?;
            run.advance(DesignDocState::Stage1Done)?;
        }

        run.advance(DesignDocState::Stage2Running)?;
        self.write_overview(run.detail_path(), run.overview_path()).await?;
        run.advance(DesignDocState::Stage2Done)?;

        Ok(DesignDocReport {
            detail_path: run.detail_path.clone(),
            overview_path: run.overview_path.clone(),
            stage1_skipped,
            transitions: run.transitions,
        })
    }

    fn design_lock_path(&self, out_dir: &Path) -> PathBuf {
        let digest = Sha256::digest(out_dir.to_string_lossy().as_bytes());
        let name: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        self.data_dir.join("locks").join(format!("design-{name}.lock"))
    }

    async fn write_detail(&self, root: &Path, detail_path: &Path) -> Result<()> {
        let blocks = collect_skeletons(FileScanner::new(root).scan(), root).await;
        if blocks.is_empty() {
            log::warn!("No source files with a usable skeleton under {}", root.display());
            let body = "# Detailed Design (Internal)\n\nNo source files were found.\n";
            write_atomic(detail_path, body.as_bytes()).await?;
            return Ok(());
        }

        let has_js_ts = blocks.iter().any(|b| b.language.is_js_family());
        let texts: Vec<String> = blocks.iter().map(|b| b.text.clone()).collect();
        let batches = batch_skeletons(&texts, self.char_limit);
        log::info!("Designing from {} skeletons in {} batches", blocks.len(), batches.len());

        let wear = designer(DETAIL_DESIGNER)?;
        let mut sections = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            log::info!("Detail batch {}/{} ({})", i + 1, batches.len(), batch_heading(batch));
            let prompt = format!("Write the internal design document for this skeleton code:\n\n{}", batch.text);
            let text = match self.orchestrator.generate_document(wear, &prompt).await {
                Ok(text) => text.trim().to_string(),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("Detail batch {} failed: {e}", i + 1);
                    format!("*Generating batch {} failed: {e}*", i + 1)
                }
            };
            sections.push(if batches.len() > 1 {
                format!("## {} detailed design\n\n{text}", batch_heading(batch))
            } else {
                text
            });
        }

        let mut report = format!(
            "# Detailed Design (Internal)\n\n**Directory:** `{}`  \n**Generated:** {}  \n**Files:** {}\n\n---\n\n",
            root.display(),
            timestamp(),
            blocks.len()
        );
        if has_js_ts {
            report.push_str(JS_TS_NOTICE);
        }
        report.push_str(&sections.join("\n\n---\n\n"));
        write_atomic(detail_path, report.as_bytes()).await?;
        log::info!("Wrote {}", detail_path.display());
        Ok(())
    }

    async fn write_overview(&self, detail_path: &Path, overview_path: &Path) -> Result<()> {
        let detail = tokio::fs::read_to_string(detail_path).await?;
        log::info!("Writing overview from {} ({} chars)", detail_path.display(), detail.chars().count());

        let wear = designer(OVERVIEW_DESIGNER)?;
        let prompt = format!("Write the external design overview for this internal design document:\n\n{detail}");
        let text = match self.orchestrator.generate_document(wear, &prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("Overview generation failed: {e}");
                format!("*Generating the overview failed: {e}*")
            }
        };

        let detail_name = detail_path
            .file_name()
            .map_or_else(|| DETAIL_FILE_NAME.into(), |n| n.to_string_lossy());
        let mut report = format!(
            "# Design Overview (External)\n\n**Generated:** {}  \n**Source:** `{detail_name}`\n\n---\n\n",
            timestamp()
        );
        if detail.contains(JS_TS_MARKER) {
            report.push_str(JS_TS_NOTICE);
        }
        report.push_str(&text);
        write_atomic(overview_path, report.as_bytes()).await?;
        log::info!("Wrote {}", overview_path.display());
        Ok(())
    }
}

fn designer(id: &str) -> Result<&'static Wear> {
    Wear::builtin(id).ok_or_else(|| PipelineError::UnknownWear(id.to_string()))
}
