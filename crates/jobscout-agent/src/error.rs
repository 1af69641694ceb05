use jobscout_index::IndexError;

use crate::llm::LlmError;

/// Failure of one agent turn. Everything here aborts the turn; conditions that
/// are answered with guidance text (e.g. an unparseable comparison) never
/// become an `AgentError`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("language model failed: {0}")]
    Llm(#[from] LlmError),
    #[error("retrieval failed: {0}")]
    Index(#[from] IndexError),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for tool {tool}: {message}")]
    InvalidToolArgs { tool: String, message: String },
    #[error("tool message {tool_call_id} does not answer any pending tool call")]
    ToolCallLinkage { tool_call_id: String },
    #[error("{pending} tool call(s) still unanswered before the next model call")]
    PendingToolCalls { pending: usize },
    #[error("turn exceeded the limit of {limit} model calls")]
    StepLimitExceeded { limit: usize },
    #[error("conversation has no user message")]
    EmptyConversation,
}
