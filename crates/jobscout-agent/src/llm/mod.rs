//! Language-model interface.
//!
//! The control loop only needs two capabilities:
//! 1. `complete`: chat completion with function tools (drives the loop)
//! 2. `generate`: plain prompt → text (used by the analysis tools)
//!
//! Concrete providers live in [`providers`]; deterministic models for demos and
//! tests live in [`mock`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{Message, ToolCall};

pub mod mock;
pub mod providers;

// ============================================================================
// LLM Provider Interface
// ============================================================================

/// A callable tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System instruction, sent in the provider's native slot.
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Single-prompt request without tools.
    pub fn prompt(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            system: None,
            messages: vec![Message::user(prompt)],
            tools: Vec::new(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            model: model.into(),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>, model: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::default(),
            model: model.into(),
        }
    }

    pub fn into_message(self) -> Message {
        Message::assistant_with_tools(self.content, self.tool_calls)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub provider: String,
    pub supports_functions: bool,
}

/// Per-call knobs for plain generation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Scripted model: {0}")]
    Script(String),
}

/// Chat model with function calling.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn model_info(&self) -> ModelInfo;

    /// Opaque text generation: one prompt in, one text out.
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, LlmError> {
        let response = self.complete(CompletionRequest::prompt(prompt, options)).await?;
        Ok(response.content)
    }
}
