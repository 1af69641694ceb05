//! Integration tests for the complete jobscout pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - scraper JSON → documents → vector index (→ CBOR file → index)
//! - index → dedup retriever → job tools → agent control loop
//! - agent → session store across turns
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;

use jobscout_agent::llm::mock::{MockModel, ScriptedModel};
use jobscout_agent::{Agent, AgentNode, AgentOptions, Message, SessionStore};
use jobscout_index::{parse_jobs_json, DedupRetriever, Document, SimilarityIndex, TokenHashEmbedder, VectorIndex};
use serde_json::json;
use tempfile::tempdir;

const JOBS_JSON: &str = r#"[
  {
    "job_id": 101,
    "title": "Medical Representative",
    "location": "Cairo, Egypt",
    "department": "Sales",
    "job_type": "Full-time",
    "workplace_type": "Onsite",
    "job_summary": "Promote the product portfolio to physicians and pharmacies."
  },
  {
    "job_id": 102,
    "title": "Warehouse Supervisor",
    "location": "Alexandria",
    "department": "Supply Chain",
    "job_type": "Full-time",
    "workplace_type": "Onsite",
    "job_summary": "Run daily warehouse operations and stock control."
  },
  {
    "job_id": "103",
    "title": "Quality Control Chemist",
    "location": "Sadat City",
    "department": "Quality",
    "job_type": "Full-time",
    "workplace_type": "Onsite",
    "job_summary": "Test raw materials and finished products."
  }
]"#;

fn corpus() -> Vec<Document> {
    parse_jobs_json(JOBS_JSON).expect("corpus parses")
}

async fn retriever() -> DedupRetriever {
    let index = VectorIndex::build(corpus(), Arc::new(TokenHashEmbedder))
        .await
        .expect("build index");
    DedupRetriever::new(Arc::new(index))
}

/// Stand-in for text generation: reads the target location from the
/// location-filter prompt and lists the titles of the blocks located there.
fn echo_titles_in_location(prompt: &str) -> String {
    let location = prompt
        .lines()
        .find_map(|l| l.split_once("in or near:").map(|(_, loc)| loc.trim().to_lowercase()))
        .unwrap_or_default();

    let mut title = None;
    let mut matches = Vec::new();
    for line in prompt.lines() {
        if let Some(t) = line.strip_prefix("Title:") {
            title = Some(t.trim().to_string());
        } else if let Some(loc) = line.strip_prefix("Location:") {
            if !location.is_empty() && loc.to_lowercase().contains(&location) {
                matches.extend(title.take());
            }
        }
    }
    format!("matching: {}", matches.join("; "))
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_ingestion_is_idempotent() {
    let first = VectorIndex::build(corpus(), Arc::new(TokenHashEmbedder))
        .await
        .expect("first build");
    let second = VectorIndex::build(corpus(), Arc::new(TokenHashEmbedder))
        .await
        .expect("second build");

    assert_eq!(first.documents(), second.documents());
    assert_eq!(first.len(), 3);

    let a = first.search("quality chemist", 2).await.expect("search");
    let b = second.search("quality chemist", 2).await.expect("search");
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_persisted_index_answers_like_the_built_one() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("jobs.jsi");

    let built = VectorIndex::build(corpus(), Arc::new(TokenHashEmbedder))
        .await
        .expect("build");
    built.save(&path).expect("save");
    let loaded = VectorIndex::load(&path, Arc::new(TokenHashEmbedder)).expect("load");

    assert_eq!(loaded.documents(), built.documents());
    let query = "warehouse stock control";
    assert_eq!(
        loaded.search(query, 3).await.expect("search"),
        built.search(query, 3).await.expect("search")
    );
}

// ============================================================================
// Agent end to end
// ============================================================================

#[tokio::test]
async fn test_jobs_in_cairo_uses_location_filter() {
    let model = Arc::new(
        ScriptedModel::new()
            .call_tool("call_loc", "location_filter_tool", json!({"location": "Cairo"}))
            .answer("There is one opening in Cairo: Medical Representative.")
            .with_generator(echo_titles_in_location),
    );
    let agent = Agent::with_job_tools(model.clone(), retriever().await, AgentOptions::default());

    let outcome = agent.ask("Show me jobs in Cairo").await.expect("turn");
    assert_eq!(
        outcome.path,
        vec![AgentNode::Agent, AgentNode::Tools, AgentNode::Agent, AgentNode::Terminal]
    );
    assert_eq!(outcome.answer, "There is one opening in Cairo: Medical Representative.");

    // The generation step saw the whole candidate set...
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].prompt.contains("Title: Medical Representative"));
    assert!(prompts[0].prompt.contains("Title: Warehouse Supervisor"));

    // ...and the tool output handed back to the model keeps only Cairo.
    let second_request = &model.requests()[1];
    let tool_output = second_request
        .messages
        .iter()
        .find_map(|m| match m {
            Message::Tool { tool_call_id, content, .. } if tool_call_id == "call_loc" => Some(content.clone()),
            _ => None,
        })
        .expect("tool output linked to call_loc");
    assert!(tool_output.contains("Medical Representative"), "{tool_output}");
    assert!(!tool_output.contains("Warehouse Supervisor"), "{tool_output}");
}

#[tokio::test]
async fn test_keyword_mock_routes_and_answers_from_tool_output() {
    let agent = Agent::with_job_tools(Arc::new(MockModel), retriever().await, AgentOptions::default());

    let outcome = agent.ask("What jobs are available in Cairo?").await.expect("turn");
    assert_eq!(outcome.tool_calls, 1);
    assert!(outcome.answer.starts_with("Here is what I found:"), "{}", outcome.answer);
    assert!(outcome.answer.contains("Medical Representative"), "{}", outcome.answer);
}

#[tokio::test]
async fn test_sessions_keep_history_between_turns() {
    let agent = Agent::with_job_tools(Arc::new(MockModel), retriever().await, AgentOptions::default());
    let sessions = SessionStore::default();

    sessions
        .run_turn(&agent, Some("visitor-1"), "List all jobs")
        .await
        .expect("first turn");
    let second = sessions
        .run_turn(&agent, Some("visitor-1"), "quality control chemist")
        .await
        .expect("second turn");
    assert!(second.answer.contains("Quality Control Chemist"), "{}", second.answer);

    let state = sessions.snapshot("visitor-1").await.expect("session");
    let users: Vec<&str> = state
        .messages()
        .iter()
        .filter(|m| m.role() == "user")
        .map(Message::content)
        .collect();
    assert_eq!(users, vec!["List all jobs", "quality control chemist"]);
    assert!(state.pending_tool_calls().is_empty());
}
