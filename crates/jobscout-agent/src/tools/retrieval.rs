use std::cmp::Ordering;
use std::collections::HashSet;

use async_trait::async_trait;
use jobscout_index::{DedupRetriever, Document};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode_args, join_contents, Tool};
use crate::error::AgentError;
use crate::llm::ToolSpec;

pub const RETRIEVE_JOBS_K: usize = 5;
pub const LIST_ALL_K: usize = 50;

/// Broad probes whose union approximates "every posting".
pub const LIST_ALL_PROBES: [&str; 8] = [
    "job position role",
    "department location",
    "engineer manager analyst",
    "coordinator specialist assistant",
    "pharma medical sales",
    "all available jobs",
    "full-time part-time",
    "remote onsite hybrid",
];

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

pub struct RetrieveJobsTool {
    retriever: DedupRetriever,
}

impl RetrieveJobsTool {
    pub fn new(retriever: DedupRetriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrieveJobsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "retrieve_jobs".to_string(),
            description: "Retrieve relevant job postings for a specific query. Best for targeted searches about roles, skills, requirements, job type, workplace or departments.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What to search for"}
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<String, AgentError> {
        let args: QueryArgs = decode_args("retrieve_jobs", arguments)?;
        let docs = self.retriever.retrieve(&args.query, RETRIEVE_JOBS_K).await?;
        tracing::info!(query = %args.query, documents = docs.len(), "retrieved jobs");
        Ok(join_contents(&docs))
    }
}

pub struct ListAllJobsTool {
    retriever: DedupRetriever,
}

impl ListAllJobsTool {
    pub fn new(retriever: DedupRetriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for ListAllJobsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "list_all_jobs".to_string(),
            description: "List all open positions. Use when the user wants to see every available job or a broad overview of opportunities.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn invoke(&self, _arguments: &Value) -> Result<String, AgentError> {
        // First occurrence of an id wins.
        let mut seen: HashSet<String> = HashSet::new();
        let mut jobs: Vec<Document> = Vec::new();
        for probe in LIST_ALL_PROBES {
            for doc in self.retriever.retrieve(probe, LIST_ALL_K).await? {
                if seen.insert(doc.id.clone()) {
                    jobs.push(doc);
                }
            }
        }
        jobs.sort_by(|a, b| compare_ids(&a.id, &b.id));
        tracing::info!(unique_jobs = jobs.len(), "listed all jobs");
        Ok(join_contents(&jobs))
    }
}

/// Scraper ids are usually integers: numeric ids sort numerically and before
/// any non-numeric id, which sort as strings.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
