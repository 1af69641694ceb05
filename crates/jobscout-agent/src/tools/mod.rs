//! The fixed job tool set and its registry.
//!
//! Tools always answer with text. Input problems a user can fix (an
//! unparseable comparison, a title with no postings) come back as guidance
//! text; retrieval and model failures propagate as `AgentError`.

use std::sync::Arc;

use async_trait::async_trait;
use jobscout_index::{DedupRetriever, Document};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AgentError;
use crate::llm::{LanguageModel, ToolSpec};
use crate::message::ToolCall;

mod analysis;
mod compare;
mod retrieval;

pub use analysis::{LocationFilterTool, SummarizeCareerTool, LOCATION_FILTER_K, SUMMARIZE_CAREER_K};
pub use compare::{parse_job_titles, CompareJobsTool, TitleParseError, COMPARE_SUBQUERY_K};
pub use retrieval::{ListAllJobsTool, RetrieveJobsTool, LIST_ALL_K, LIST_ALL_PROBES, RETRIEVE_JOBS_K};

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn invoke(&self, arguments: &Value) -> Result<String, AgentError>;
}

/// Ordered set of tools, looked up by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five job tools over one retriever and one model.
    pub fn job_tools(retriever: DedupRetriever, model: Arc<dyn LanguageModel>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RetrieveJobsTool::new(retriever.clone())));
        registry.register(Arc::new(ListAllJobsTool::new(retriever.clone())));
        registry.register(Arc::new(CompareJobsTool::new(retriever.clone(), model.clone())));
        registry.register(Arc::new(SummarizeCareerTool::new(retriever.clone(), model.clone())));
        registry.register(Arc::new(LocationFilterTool::new(retriever, model)));
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        self.tools.retain(|t| t.spec().name != name);
        self.tools.push(tool);
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.spec().name == name)
    }

    pub async fn invoke(&self, call: &ToolCall) -> Result<String, AgentError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;
        tracing::info!(tool = %call.name, call_id = %call.id, "invoking tool");
        let output = tool.invoke(&call.arguments).await?;
        tracing::debug!(tool = %call.name, chars = output.len(), "tool finished");
        Ok(output)
    }
}

/// Decode a tool's argument object. A missing (`null`) object reads as `{}`.
pub(crate) fn decode_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, AgentError> {
    let value = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments.clone()
    };
    serde_json::from_value(value).map_err(|e| AgentError::InvalidToolArgs {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Document contents separated by a blank line.
pub fn join_contents<'a>(docs: impl IntoIterator<Item = &'a Document>) -> String {
    docs.into_iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use jobscout_index::{DedupRetriever, Document, IndexError, ScoredDocument, SimilarityIndex};
    use parking_lot::Mutex;

    /// Index returning a fixed ranking for every query and recording queries.
    pub(crate) struct CannedIndex {
        pub ranked: Vec<Document>,
        pub queries: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl SimilarityIndex for CannedIndex {
        async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, IndexError> {
            self.queries.lock().push((query.to_string(), k));
            Ok(self
                .ranked
                .iter()
                .take(k)
                .map(|d| ScoredDocument {
                    document: d.clone(),
                    score: 1.0,
                })
                .collect())
        }

        fn len(&self) -> usize {
            self.ranked.len()
        }
    }

    pub(crate) fn canned(ranked: Vec<Document>) -> (Arc<CannedIndex>, DedupRetriever) {
        let index = Arc::new(CannedIndex {
            ranked,
            queries: Mutex::new(Vec::new()),
        });
        let retriever = DedupRetriever::new(index.clone());
        (index, retriever)
    }

    pub(crate) fn posting(id: &str, title: &str, location: &str) -> Document {
        Document::new(
            id,
            format!("Title: {title}\nLocation: {location}\nDepartment: posting {id}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::llm::mock::ScriptedModel;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let (_, retriever) = canned(vec![posting("1", "Pharmacist", "Giza")]);
        ToolRegistry::job_tools(retriever, Arc::new(ScriptedModel::new()))
    }

    #[test]
    fn registry_holds_the_five_job_tools_in_order() {
        assert_eq!(
            registry().names(),
            vec![
                "retrieve_jobs",
                "list_all_jobs",
                "compare_jobs_tool",
                "summarize_career_tool",
                "location_filter_tool"
            ]
        );
        for spec in registry().specs() {
            assert_eq!(spec.input_schema["type"], "object", "{}", spec.name);
            assert!(!spec.description.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_tools_and_bad_arguments_are_errors() {
        let registry = registry();
        let err = registry
            .invoke(&ToolCall::new("c1", "book_interview", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(ref n) if n == "book_interview"), "{err}");

        let err = registry
            .invoke(&ToolCall::new("c2", "retrieve_jobs", json!({"q": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolArgs { .. }), "{err}");
    }

    #[tokio::test]
    async fn null_arguments_read_as_empty_object() {
        let out = registry()
            .invoke(&ToolCall::new("c1", "list_all_jobs", Value::Null))
            .await
            .expect("list");
        assert!(out.contains("Title: Pharmacist"));
    }
}
