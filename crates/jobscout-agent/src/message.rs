//! Conversation messages and per-session state.
//!
//! Tool-call linkage is enforced on append: a tool message must answer one
//! unanswered call of the latest assistant message, and no other message may
//! be appended while calls are still pending.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: Some(name.into()),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Tool calls carried by an assistant message; empty for every other role.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}

/// Message log of one session plus the most recent retrieval context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
    /// Overwritten by every context retrieval; empty when nothing was retrieved.
    pub retrieved_context: String,
    /// Model calls made during the current turn.
    #[serde(default)]
    model_calls: usize,
}

impl ConversationState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
            retrieved_context: String::new(),
            model_calls: 0,
        }
    }

    /// Start a new turn on an existing conversation.
    pub fn begin_turn(&mut self, query: impl Into<String>) -> Result<(), AgentError> {
        self.push(Message::user(query))?;
        self.model_calls = 0;
        Ok(())
    }

    pub fn push(&mut self, message: Message) -> Result<(), AgentError> {
        let pending = self.pending_tool_calls();
        match &message {
            Message::Tool { tool_call_id, .. } => {
                if !pending.iter().any(|c| &c.id == tool_call_id) {
                    return Err(AgentError::ToolCallLinkage {
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
            _ if !pending.is_empty() => {
                return Err(AgentError::PendingToolCalls {
                    pending: pending.len(),
                });
            }
            _ => {}
        }
        self.messages.push(message);
        Ok(())
    }

    /// Calls of the latest assistant message that have no tool message yet.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| matches!(m, Message::Assistant { .. }))
        else {
            return Vec::new();
        };

        let answered: Vec<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.messages[pos]
            .tool_calls()
            .iter()
            .filter(|c| !answered.contains(&c.id.as_str()))
            .collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Content of the most recent user message (the query of the current turn).
    pub fn current_query(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
    }

    /// Whether any of the last `window` messages is a tool result.
    pub fn has_recent_tool_results(&self, window: usize) -> bool {
        self.messages.iter().rev().take(window).any(Message::is_tool)
    }

    pub fn model_calls(&self) -> usize {
        self.model_calls
    }

    pub(crate) fn record_model_call(&mut self) -> usize {
        self.model_calls += 1;
        self.model_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_two_calls() -> ConversationState {
        let mut state = ConversationState::new("compare sales and marketing");
        state
            .push(Message::assistant_with_tools(
                "",
                vec![
                    ToolCall::new("c1", "retrieve_jobs", json!({"query": "sales"})),
                    ToolCall::new("c2", "retrieve_jobs", json!({"query": "marketing"})),
                ],
            ))
            .expect("assistant");
        state
    }

    #[test]
    fn tool_messages_must_answer_a_pending_call() {
        let mut state = with_two_calls();
        assert_eq!(state.pending_tool_calls().len(), 2);

        let err = state.push(Message::tool("c9", "retrieve_jobs", "x")).unwrap_err();
        assert!(matches!(err, AgentError::ToolCallLinkage { .. }), "{err}");

        state.push(Message::tool("c1", "retrieve_jobs", "a")).expect("c1");
        let err = state.push(Message::tool("c1", "retrieve_jobs", "again")).unwrap_err();
        assert!(matches!(err, AgentError::ToolCallLinkage { .. }), "{err}");

        state.push(Message::tool("c2", "retrieve_jobs", "b")).expect("c2");
        assert!(state.pending_tool_calls().is_empty());
    }

    #[test]
    fn model_output_is_rejected_while_calls_are_pending() {
        let mut state = with_two_calls();
        state.push(Message::tool("c1", "retrieve_jobs", "a")).expect("c1");
        let err = state.push(Message::assistant("done")).unwrap_err();
        assert!(matches!(err, AgentError::PendingToolCalls { pending: 1 }), "{err}");
        let err = state.begin_turn("next question").unwrap_err();
        assert!(matches!(err, AgentError::PendingToolCalls { .. }), "{err}");
    }

    #[test]
    fn tool_without_any_assistant_is_rejected() {
        let mut state = ConversationState::new("hi");
        assert!(state.push(Message::tool("c1", "retrieve_jobs", "x")).is_err());
    }

    #[test]
    fn recent_tool_window_and_current_query() {
        let mut state = with_two_calls();
        assert!(!state.has_recent_tool_results(3));
        state.push(Message::tool("c1", "retrieve_jobs", "a")).expect("c1");
        state.push(Message::tool("c2", "retrieve_jobs", "b")).expect("c2");
        state.push(Message::assistant("answer")).expect("answer");
        assert!(state.has_recent_tool_results(3));

        state.begin_turn("what about Giza?").expect("turn");
        assert_eq!(state.current_query(), Some("what about Giza?"));
        state.push(Message::assistant("one")).expect("a");
        assert!(!state.has_recent_tool_results(3));
    }

    #[test]
    fn messages_serialize_with_role_tag() {
        let msg = Message::assistant_with_tools("", vec![ToolCall::new("c1", "list_all_jobs", json!({}))]);
        let v = serde_json::to_value(&msg).expect("json");
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["tool_calls"][0]["name"], "list_all_jobs");

        let tool: Message = serde_json::from_value(json!({
            "role": "tool", "content": "ok", "tool_call_id": "c1"
        }))
        .expect("decode");
        assert_eq!(tool, Message::Tool { content: "ok".into(), tool_call_id: "c1".into(), name: None });
        assert!(serde_json::to_value(Message::assistant("x")).expect("json").get("tool_calls").is_none());
    }
}
