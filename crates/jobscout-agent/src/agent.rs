//! The per-turn control loop.
//!
//! ```text
//!   (prefetch) rag_retrieval ──┐
//!                              v
//!   entry ───────────────────> agent ──(tool calls)──> tools ──┐
//!                              ^   │                          │
//!                              │   └──(final answer)──> terminal
//!                              └──────────────────────────────┘
//! ```
//!
//! `decide` looks only at the last message. Everything inside a turn is
//! sequential: one model call, or one tool call, at a time.

use std::fmt;
use std::sync::Arc;

use jobscout_index::DedupRetriever;
use serde::Serialize;

use crate::config::{self, ConfigError};
use crate::error::AgentError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::message::{ConversationState, Message, ToolCall};
use crate::prompts;
use crate::tools::{join_contents, ToolRegistry};

/// Messages inspected when deciding whether tool output was just received.
const RECENT_TOOL_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentNode {
    RagRetrieval,
    Agent,
    Tools,
    Terminal,
}

impl fmt::Display for AgentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RagRetrieval => "rag_retrieval",
            Self::Agent => "agent",
            Self::Tools => "tools",
            Self::Terminal => "terminal",
        })
    }
}

/// Next node, from the last message alone.
pub fn decide(state: &ConversationState) -> AgentNode {
    match state.last() {
        Some(Message::Assistant { tool_calls, .. }) if !tool_calls.is_empty() => AgentNode::Tools,
        Some(Message::Assistant { .. }) => AgentNode::Terminal,
        Some(Message::Tool { .. }) => AgentNode::Agent,
        _ => AgentNode::Agent,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOptions {
    /// Model calls allowed per turn before the turn fails.
    pub max_model_calls: usize,
    /// Enter each turn through `rag_retrieval`.
    pub prefetch_context: bool,
    /// Documents fetched by `rag_retrieval`.
    pub context_k: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_model_calls: config::DEFAULT_MAX_MODEL_CALLS,
            prefetch_context: false,
            context_k: config::DEFAULT_CONTEXT_K,
            temperature: Some(0.0),
            max_tokens: None,
        }
    }
}

impl AgentOptions {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_model_calls: config::max_model_calls()?,
            prefetch_context: config::prefetch_context()?,
            context_k: config::context_k()?,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    /// Visited nodes in order, ending with `terminal`.
    pub path: Vec<AgentNode>,
    pub model_calls: usize,
    pub tool_calls: usize,
}

pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    retriever: DedupRetriever,
    options: AgentOptions,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.model.model_info().name)
            .field("tools", &self.tools)
            .field("options", &self.options)
            .finish()
    }
}

impl Agent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: ToolRegistry,
        retriever: DedupRetriever,
        options: AgentOptions,
    ) -> Self {
        Self {
            model,
            tools,
            retriever,
            options,
        }
    }

    /// Agent wired with the five job tools, sharing one retriever and model.
    pub fn with_job_tools(model: Arc<dyn LanguageModel>, retriever: DedupRetriever, options: AgentOptions) -> Self {
        let tools = ToolRegistry::job_tools(retriever.clone(), model.clone());
        Self::new(model, tools, retriever, options)
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// One turn on a fresh conversation.
    pub async fn ask(&self, query: &str) -> Result<TurnOutcome, AgentError> {
        let mut state = ConversationState::new(query);
        self.run_turn(&mut state).await
    }

    /// Drive `state` (whose latest user message is the question) to a final
    /// assistant message. On error `state` may hold a partial turn; callers
    /// that keep history should run on a copy.
    pub async fn run_turn(&self, state: &mut ConversationState) -> Result<TurnOutcome, AgentError> {
        if state.current_query().is_none() {
            return Err(AgentError::EmptyConversation);
        }

        let mut path = Vec::new();
        let mut tool_calls = 0usize;
        let mut node = if self.options.prefetch_context {
            AgentNode::RagRetrieval
        } else {
            AgentNode::Agent
        };

        loop {
            path.push(node);
            tracing::info!(node = %node, messages = state.messages().len(), "agent step");
            node = match node {
                AgentNode::RagRetrieval => {
                    self.retrieve_context(state).await;
                    AgentNode::Agent
                }
                AgentNode::Agent => {
                    self.call_model(state).await?;
                    decide(state)
                }
                AgentNode::Tools => {
                    tool_calls += self.run_tools(state).await?;
                    decide(state)
                }
                AgentNode::Terminal => break,
            };
        }

        let answer = state.last().map(|m| m.content().to_string()).unwrap_or_default();
        tracing::info!(
            model_calls = state.model_calls(),
            tool_calls,
            chars = answer.len(),
            "turn complete"
        );
        Ok(TurnOutcome {
            answer,
            path,
            model_calls: state.model_calls(),
            tool_calls,
        })
    }

    /// Fill `retrieved_context` for the current query. Failures leave it empty.
    async fn retrieve_context(&self, state: &mut ConversationState) {
        let query = state.current_query().unwrap_or_default().to_string();
        match self.retriever.retrieve(&query, self.options.context_k).await {
            Ok(docs) => {
                state.retrieved_context = join_contents(&docs);
                tracing::debug!(documents = docs.len(), chars = state.retrieved_context.len(), "retrieved context");
            }
            Err(e) => {
                tracing::warn!(error = %e, "context retrieval failed; continuing without context");
                state.retrieved_context.clear();
            }
        }
    }

    async fn call_model(&self, state: &mut ConversationState) -> Result<(), AgentError> {
        let limit = self.options.max_model_calls;
        if state.model_calls() >= limit {
            return Err(AgentError::StepLimitExceeded { limit });
        }
        let pending = state.pending_tool_calls().len();
        if pending > 0 {
            return Err(AgentError::PendingToolCalls { pending });
        }
        state.record_model_call();

        let request = CompletionRequest {
            system: Some(prompts::system_prompt(
                &state.retrieved_context,
                state.has_recent_tool_results(RECENT_TOOL_WINDOW),
            )),
            messages: state.messages().to_vec(),
            tools: self.tools.specs(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };
        let response = self.model.complete(request).await?;
        tracing::debug!(
            chars = response.content.len(),
            tool_calls = response.tool_calls.len(),
            finish_reason = ?response.finish_reason,
            "model responded"
        );
        state.push(response.into_message())
    }

    /// Invoke every call of the latest assistant message, in request order.
    async fn run_tools(&self, state: &mut ConversationState) -> Result<usize, AgentError> {
        let calls: Vec<ToolCall> = state.last().map(|m| m.tool_calls().to_vec()).unwrap_or_default();
        for call in &calls {
            let output = self.tools.invoke(call).await?;
            state.push(Message::tool(&call.id, &call.name, output))?;
        }
        Ok(calls.len())
    }
}
