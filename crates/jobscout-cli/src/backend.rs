//! Wiring from command-line flags to a ready [`Agent`].
//!
//! Flags win over the `JOBSCOUT_*` environment; provider credentials always
//! come from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use jobscout_agent::llm::mock::MockModel;
use jobscout_agent::llm::providers::{LlmConfig, ModelEmbedder, Provider, UnifiedClient};
use jobscout_agent::{Agent, AgentOptions, LanguageModel};
use jobscout_index::{DedupRetriever, Embedder, TokenHashEmbedder, VectorIndex};

pub const DEFAULT_JOBS_PATH: &str = "data/jobs.json";
pub const DEFAULT_INDEX_PATH: &str = "data/index/jobs.jsi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Deterministic feature hashing; works offline.
    TokenHash,
    /// OpenAI embeddings endpoint (`OPENAI_API_KEY`, `OPENAI_EMBEDDING_MODEL`).
    Openai,
}

pub fn embedder(kind: EmbedderKind) -> Result<Arc<dyn Embedder>> {
    match kind {
        EmbedderKind::TokenHash => Ok(Arc::new(TokenHashEmbedder)),
        EmbedderKind::Openai => {
            let config = LlmConfig::provider_from_env(Provider::OpenAI)
                .context("the openai embedder needs OPENAI_API_KEY")?;
            Ok(Arc::new(ModelEmbedder::from_config(config)?))
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Job-postings JSON, used when the index has to be built.
    #[arg(long, default_value = DEFAULT_JOBS_PATH)]
    pub jobs: PathBuf,

    /// Persisted vector index (built from `--jobs` when missing).
    #[arg(long, default_value = DEFAULT_INDEX_PATH)]
    pub index: PathBuf,

    /// Rebuild the index from `--jobs` even when the index file exists.
    #[arg(long)]
    pub rebuild_index: bool,

    /// Embedder used to build or query the index; must match the index file.
    #[arg(long, value_enum, default_value_t = EmbedderKind::TokenHash)]
    pub embedder: EmbedderKind,

    /// Use the offline keyword model (the default when no backend is chosen).
    ///
    /// Choose at most one backend: `--llm-mock`, `--llm-openai`, `--llm-anthropic`, or `--llm-local`.
    #[arg(long)]
    pub llm_mock: bool,

    /// Use the OpenAI chat-completions backend (`OPENAI_API_KEY`, optional `OPENAI_BASE_URL`).
    #[arg(long)]
    pub llm_openai: bool,

    /// Use the Anthropic messages backend (`ANTHROPIC_API_KEY`).
    #[arg(long)]
    pub llm_anthropic: bool,

    /// Use an OpenAI-compatible local server such as Ollama or vLLM (`LOCAL_LLM_URL`).
    #[arg(long)]
    pub llm_local: bool,

    /// Model name override for the selected backend.
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Retrieve context for every question before the first model call.
    #[arg(long)]
    pub prefetch_context: bool,

    /// Model calls allowed per turn (defaults to `JOBSCOUT_MAX_MODEL_CALLS` or 8).
    #[arg(long)]
    pub max_model_calls: Option<usize>,
}

impl BackendArgs {
    /// `None` selects the offline mock.
    pub fn provider(&self) -> Result<Option<Provider>> {
        let selected = [
            (self.llm_mock, None),
            (self.llm_openai, Some(Provider::OpenAI)),
            (self.llm_anthropic, Some(Provider::Anthropic)),
            (self.llm_local, Some(Provider::Local)),
        ];
        let chosen: Vec<Option<Provider>> = selected
            .into_iter()
            .filter_map(|(flag, provider)| flag.then_some(provider))
            .collect();
        match chosen.as_slice() {
            [] => Ok(None),
            [one] => Ok(*one),
            _ => Err(anyhow!(
                "choose at most one LLM backend: `--llm-mock`, `--llm-openai`, `--llm-anthropic`, or `--llm-local`"
            )),
        }
    }

    pub fn language_model(&self) -> Result<Arc<dyn LanguageModel>> {
        let Some(provider) = self.provider()? else {
            tracing::info!("using the offline keyword model");
            return Ok(Arc::new(MockModel));
        };

        let mut config = LlmConfig::provider_from_env(provider)
            .with_context(|| format!("configuring the {} backend", provider.as_str()))?;
        if let Some(model) = self.llm_model.as_deref() {
            config = config.with_model(model);
        }
        tracing::info!(provider = provider.as_str(), model = %config.model, "using language model");
        Ok(Arc::new(UnifiedClient::from_config(config)?))
    }

    pub fn agent_options(&self) -> Result<AgentOptions> {
        let mut options = AgentOptions::from_env()?;
        if self.prefetch_context {
            options.prefetch_context = true;
        }
        if let Some(limit) = self.max_model_calls {
            if limit == 0 {
                return Err(anyhow!("--max-model-calls must be >= 1"));
            }
            options.max_model_calls = limit;
        }
        Ok(options)
    }

    pub async fn open_index(&self) -> Result<VectorIndex> {
        let embedder = embedder(self.embedder)?;
        VectorIndex::open_or_build(&self.index, &self.jobs, embedder, self.rebuild_index)
            .await
            .with_context(|| {
                format!(
                    "failed to open index {} (corpus {})",
                    self.index.display(),
                    self.jobs.display()
                )
            })
    }

    pub async fn build_agent(&self) -> Result<Agent> {
        let options = self.agent_options()?;
        let model = self.language_model()?;
        let index = self.open_index().await?;
        tracing::info!(
            documents = index.documents().len(),
            dim = index.dim(),
            prefetch = options.prefetch_context,
            "index ready"
        );
        Ok(Agent::with_job_tools(
            model,
            DedupRetriever::new(Arc::new(index)),
            options,
        ))
    }
}
