//! # jobscout-agent
//!
//! The conversational layer over a job-posting index.
//!
//! ```text
//! user ──> SessionStore ──> Agent (control loop) ──> LanguageModel
//!                               │
//!                               └──> ToolRegistry ──> DedupRetriever ──> SimilarityIndex
//!                                       (5 tools)  └──> LanguageModel::generate
//! ```
//!
//! - [`agent`]: node state machine (`rag_retrieval`, `agent`, `tools`, `terminal`)
//! - [`tools`]: `retrieve_jobs`, `list_all_jobs`, `compare_jobs_tool`,
//!   `summarize_career_tool`, `location_filter_tool`
//! - [`llm`]: provider trait, OpenAI-compatible and Anthropic clients, mocks
//! - [`message`]: tagged messages and tool-call linkage
//! - [`session`]: per-session conversation state

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod prompts;
pub mod session;
pub mod tools;

pub use agent::{decide, Agent, AgentNode, AgentOptions, TurnOutcome};
pub use config::ConfigError;
pub use error::AgentError;
pub use llm::{
    CompletionRequest, CompletionResponse, GenerationOptions, LanguageModel, LlmError, ToolSpec,
};
pub use message::{ConversationState, Message, ToolCall};
pub use session::SessionStore;
pub use tools::{Tool, ToolRegistry};
