use std::sync::Arc;

use async_trait::async_trait;
use jobscout_index::DedupRetriever;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode_args, join_contents, Tool};
use crate::error::AgentError;
use crate::llm::{GenerationOptions, LanguageModel, ToolSpec};
use crate::prompts;

pub const SUMMARIZE_CAREER_K: usize = 5;
pub const LOCATION_FILTER_K: usize = 10;

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Deserialize)]
struct LocationArgs {
    location: String,
}

pub struct SummarizeCareerTool {
    retriever: DedupRetriever,
    model: Arc<dyn LanguageModel>,
}

impl SummarizeCareerTool {
    pub fn new(retriever: DedupRetriever, model: Arc<dyn LanguageModel>) -> Self {
        Self { retriever, model }
    }
}

#[async_trait]
impl Tool for SummarizeCareerTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "summarize_career_tool".to_string(),
            description: "Summarize the career path and growth opportunities for a job.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Role or career question"}
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<String, AgentError> {
        let args: QueryArgs = decode_args("summarize_career_tool", arguments)?;
        let docs = self.retriever.retrieve(&args.query, SUMMARIZE_CAREER_K).await?;
        let prompt = prompts::career_summary(&join_contents(&docs), &args.query);
        let summary = self.model.generate(&prompt, GenerationOptions::default()).await?;
        tracing::info!(query = %args.query, documents = docs.len(), chars = summary.len(), "career summary");
        Ok(summary)
    }
}

/// Relevance to the location is left to the model; retrieval only biases the
/// candidate set towards it.
pub struct LocationFilterTool {
    retriever: DedupRetriever,
    model: Arc<dyn LanguageModel>,
}

impl LocationFilterTool {
    pub fn new(retriever: DedupRetriever, model: Arc<dyn LanguageModel>) -> Self {
        Self { retriever, model }
    }
}

#[async_trait]
impl Tool for LocationFilterTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "location_filter_tool".to_string(),
            description: "Show jobs available in a specific city or region.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string", "description": "City or region, e.g. 'Cairo'"}
                },
                "required": ["location"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<String, AgentError> {
        let args: LocationArgs = decode_args("location_filter_tool", arguments)?;
        let docs = self
            .retriever
            .retrieve(&format!("location {}", args.location), LOCATION_FILTER_K)
            .await?;
        let prompt = prompts::location_filter(&join_contents(&docs), &args.location);
        let filtered = self
            .model
            .generate(&prompt, GenerationOptions::with_temperature(0.0))
            .await?;
        tracing::info!(location = %args.location, candidates = docs.len(), "location filter");
        Ok(filtered)
    }
}
