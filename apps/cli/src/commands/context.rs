//! Wiring shared by every command: configuration, storage, and collaborators.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tuneforge_core::evaluation::{Inference, Judge};
use tuneforge_core::{
    AdapterRegistry, CommandTrainer, Database, ForgeConfig, GoldenDatasets, HttpInference,
    HttpJudge, HttpSearchSource, JsonlSearchSource, JudgeEvaluator, SearchSource, SharedDatabase,
    StreamingRetriever,
};
use tuneforge_orchestrator::JobManager;
use tuneforge_training::ForgeLayout;

/// Loads configuration. An explicit file replaces the local `tuneforge.toml`
/// layer; the global layer and environment overrides still apply.
pub fn load_config(config_path: Option<&Path>, workspace: Option<PathBuf>) -> Result<ForgeConfig> {
    let mut config = match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            let mut config = ForgeConfig::from_layers(&[ForgeConfig::default_global_path(), path.to_path_buf()])
                .with_context(|| format!("Failed to load {}", path.display()))?;
            config.apply_env_overrides(|name| std::env::var(name).ok())?;
            config
        }
        None => ForgeConfig::discover_and_load().context("Failed to load configuration")?,
    };
    if workspace.is_some() {
        config.workspace = workspace;
    }
    Ok(config)
}

pub struct CliContext {
    pub config: ForgeConfig,
    pub layout: ForgeLayout,
    pub db: SharedDatabase,
}

impl CliContext {
    pub fn open(config: ForgeConfig) -> Result<Self> {
        let layout = config.layout();
        layout
            .ensure_dirs()
            .with_context(|| format!("Failed to create {}", layout.root().display()))?;
        let db = Database::open(&layout.database_path())
            .with_context(|| format!("Failed to open {}", layout.database_path().display()))?
            .into_shared();
        Ok(Self { config, layout, db })
    }

    pub fn registry(&self) -> AdapterRegistry {
        AdapterRegistry::new(self.db.clone())
    }

    pub fn golden(&self) -> GoldenDatasets {
        GoldenDatasets::new(self.db.clone())
    }

    fn search_source(&self) -> Result<Arc<dyn SearchSource>> {
        let collaborators = &self.config.collaborators;
        if let Some(url) = &collaborators.search_url {
            return Ok(Arc::new(HttpSearchSource::new(url.clone())));
        }
        if let Some(path) = &collaborators.search_file {
            return Ok(Arc::new(JsonlSearchSource::new(path.clone())));
        }
        bail!("No search source configured. Set collaborators.search_url or collaborators.search_file.")
    }

    pub fn retriever(&self) -> Result<StreamingRetriever> {
        let retriever = StreamingRetriever::new(self.search_source()?, self.config.retrieval.quality.clone())?;
        Ok(retriever.with_streaming(self.config.retrieval.streaming_enabled))
    }

    pub fn inference(&self) -> Result<Arc<dyn Inference>> {
        let url = self
            .config
            .collaborators
            .inference_url
            .as_ref()
            .context("No inference endpoint configured. Set collaborators.inference_url.")?;
        Ok(Arc::new(HttpInference::new(url.clone())))
    }

    fn judge(&self) -> Result<Arc<dyn Judge>> {
        let url = self
            .config
            .collaborators
            .judge_url
            .as_ref()
            .context("No judge endpoint configured. Set collaborators.judge_url.")?;
        Ok(Arc::new(HttpJudge::new(url.clone())))
    }

    pub fn evaluator(&self) -> Result<JudgeEvaluator> {
        Ok(JudgeEvaluator::new(self.db.clone(), self.judge()?, self.config.evaluation.evaluator_settings())?)
    }

    pub fn job_manager(&self) -> Result<JobManager> {
        let collaborators = &self.config.collaborators;
        let program = collaborators
            .trainer_command
            .as_ref()
            .context("No trainer configured. Set collaborators.trainer_command.")?;
        let trainer = CommandTrainer::new(program.clone(), collaborators.trainer_args.clone(), self.layout.clone());
        Ok(JobManager::new(self.config.jobs.manager_config(), Arc::new(trainer)))
    }
}
