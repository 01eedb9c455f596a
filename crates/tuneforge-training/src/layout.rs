use crate::error::TrainingResult;
use crate::job::JobId;
use std::path::{Path, PathBuf};

/// Filesystem layout for lifecycle state inside a workspace.
///
/// Default layout is under `.tuneforge/`:
/// - `corpora/<run_id>.jsonl`
/// - `artifacts/<job_id>/`
/// - `tuneforge.db`
#[derive(Debug, Clone)]
pub struct ForgeLayout {
    root: PathBuf,
}

impl ForgeLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a layout rooted in a workspace directory.
    #[must_use]
    pub fn for_workspace_root(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(".tuneforge"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn corpora_dir(&self) -> PathBuf {
        self.root.join("corpora")
    }

    #[must_use]
    pub fn corpus_path(&self, run_id: &str) -> PathBuf {
        self.corpora_dir().join(format!("{run_id}.jsonl"))
    }

    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    #[must_use]
    pub fn job_output_dir(&self, job_id: &JobId) -> PathBuf {
        self.artifacts_dir().join(job_id.0.as_str())
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.root.join("tuneforge.db")
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(self.corpora_dir())?;
        std::fs::create_dir_all(self.artifacts_dir())?;
        Ok(())
    }
}
