//! LLM API Providers
//!
//! Concrete clients for OpenAI-compatible servers (OpenAI itself, plus local
//! Ollama / vLLM endpoints) and Anthropic. Wire encoding and response parsing
//! are pure functions so they can be tested without a network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobscout_index::{Embedder, IndexError};
use reqwest::Client;
use serde_json::{json, Value};

use super::*;
use crate::config::{self, env_value, ConfigError};

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const ANTHROPIC_DEFAULT_MAX_TOKENS: usize = 4096;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Anthropic,
    Local,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Local => "local",
        }
    }
}

impl LlmConfig {
    /// First configured provider, in order OpenAI, Anthropic, local.
    pub fn from_env() -> Result<Self, ConfigError> {
        for provider in [Provider::OpenAI, Provider::Anthropic, Provider::Local] {
            match Self::provider_from_env(provider) {
                Ok(config) => return Ok(config),
                Err(ConfigError::Missing { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ConfigError::NoProviderConfigured)
    }

    /// Configuration for one specific provider; its key (or URL) must be set.
    pub fn provider_from_env(provider: Provider) -> Result<Self, ConfigError> {
        let timeout_secs = config::llm_timeout_secs()?;
        let embedding_model = env_value("OPENAI_EMBEDDING_MODEL")?
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        let config = match provider {
            Provider::OpenAI => Self {
                provider,
                api_key: env_value("OPENAI_API_KEY")?.ok_or(ConfigError::Missing { var: "OPENAI_API_KEY" })?,
                model: env_value("OPENAI_MODEL")?.unwrap_or_else(|| "gpt-4o-mini".to_string()),
                base_url: env_value("OPENAI_BASE_URL")?,
                embedding_model,
                timeout_secs,
            },
            Provider::Anthropic => Self {
                provider,
                api_key: env_value("ANTHROPIC_API_KEY")?
                    .ok_or(ConfigError::Missing { var: "ANTHROPIC_API_KEY" })?,
                model: env_value("ANTHROPIC_MODEL")?
                    .unwrap_or_else(|| "claude-3-5-haiku-latest".to_string()),
                base_url: env_value("ANTHROPIC_BASE_URL")?,
                embedding_model,
                timeout_secs,
            },
            Provider::Local => Self {
                provider,
                api_key: String::new(),
                model: env_value("LOCAL_LLM_MODEL")?.unwrap_or_else(|| "default".to_string()),
                base_url: Some(env_value("LOCAL_LLM_URL")?.ok_or(ConfigError::Missing { var: "LOCAL_LLM_URL" })?),
                embedding_model,
                timeout_secs: timeout_secs.max(120),
            },
        };
        Ok(config)
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::OpenAI,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: config::DEFAULT_LLM_TIMEOUT_SECS,
        }
    }

    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Anthropic,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: config::DEFAULT_LLM_TIMEOUT_SECS,
        }
    }

    pub fn local(url: &str, model: &str) -> Self {
        Self {
            provider: Provider::Local,
            api_key: String::new(),
            model: model.to_string(),
            base_url: Some(url.to_string()),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Chat-completions style base URL (`…/v1`) for OpenAI-compatible servers.
    fn openai_base_url(&self) -> String {
        match (self.provider, self.base_url.as_deref()) {
            (Provider::Local, Some(url)) => {
                let url = url.trim_end_matches('/');
                if url.ends_with("/v1") {
                    url.to_string()
                } else {
                    format!("{url}/v1")
                }
            }
            (_, Some(url)) => url.trim_end_matches('/').to_string(),
            (_, None) => OPENAI_DEFAULT_BASE_URL.to_string(),
        }
    }
}

fn http_client(timeout_secs: u64) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Config(format!("failed to create HTTP client: {e}")))
}

/// POST a JSON body and decode a JSON reply, mapping HTTP failures onto `LlmError`.
async fn send_json(request: reqwest::RequestBuilder, body: &Value) -> Result<Value, LlmError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Network(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LlmError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::Api(format!("{status}: {error_text}")));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

// ============================================================================
// OpenAI wire format
// ============================================================================

pub fn openai_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut out = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system.as_deref() {
        out.push(json!({"role": "system", "content": system}));
    }
    for m in &request.messages {
        let v = match m {
            Message::System { content } => json!({"role": "system", "content": content}),
            Message::User { content } => json!({"role": "user", "content": content}),
            Message::Assistant { content, tool_calls } if tool_calls.is_empty() => {
                json!({"role": "assistant", "content": content})
            }
            Message::Assistant { content, tool_calls } => {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": arguments_object(&c.arguments).to_string(),
                            }
                        })
                    })
                    .collect();
                let content = if content.is_empty() {
                    Value::Null
                } else {
                    json!(content)
                };
                json!({"role": "assistant", "content": content, "tool_calls": calls})
            }
            Message::Tool {
                content,
                tool_call_id,
                ..
            } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
        };
        out.push(v);
    }
    out
}

pub fn openai_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect()
}

pub fn openai_request_body(model: &str, request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": openai_messages(request),
    });
    if !request.tools.is_empty() {
        body["tools"] = json!(openai_tools(&request.tools));
        body["tool_choice"] = json!("auto");
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }
    body
}

pub fn parse_openai_response(data: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0]".to_string()))?;
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or("").to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("tool call without id".to_string()))?;
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("tool call without function name".to_string()))?;
            let raw_args = call["function"]["arguments"].as_str().unwrap_or("");
            let arguments = if raw_args.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(raw_args).map_err(|e| {
                    LlmError::InvalidResponse(format!("tool call {id} has non-JSON arguments: {e}"))
                })?
            };
            tool_calls.push(ToolCall::new(id, name, arguments));
        }
    }

    let finish_reason = match choice["finish_reason"].as_str() {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    };

    Ok(CompletionResponse {
        content,
        tool_calls,
        finish_reason,
        usage: Usage {
            prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        },
        model: data["model"].as_str().unwrap_or(model).to_string(),
    })
}

/// Vectors from an `/embeddings` reply, ordered by their `index` field.
pub fn parse_openai_embeddings(data: &Value) -> Result<Vec<Vec<f32>>, LlmError> {
    let items = data["data"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("Missing data array".to_string()))?;

    let mut indexed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        let vector = item["embedding"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("embedding item without vector".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        let idx = item["index"].as_u64().unwrap_or(pos as u64);
        indexed.push((idx, vector));
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn arguments_object(arguments: &Value) -> Value {
    if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    }
}

// ============================================================================
// Anthropic wire format
// ============================================================================

/// Anthropic messages. Tool results travel as `tool_result` blocks inside a user
/// message; consecutive results are merged into one such message.
pub fn anthropic_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(request.messages.len());
    for m in &request.messages {
        match m {
            // Folded into the top-level `system` field by `anthropic_request_body`.
            Message::System { .. } => {}
            Message::User { content } => out.push(json!({"role": "user", "content": content})),
            // The API rejects empty text content.
            Message::Assistant { content, tool_calls } if tool_calls.is_empty() && content.trim().is_empty() => {}
            Message::Assistant { content, tool_calls } if tool_calls.is_empty() => {
                out.push(json!({"role": "assistant", "content": content}))
            }
            Message::Assistant { content, tool_calls } => {
                let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
                if !content.is_empty() {
                    blocks.push(json!({"type": "text", "text": content}));
                }
                for c in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": c.id,
                        "name": c.name,
                        "input": arguments_object(&c.arguments),
                    }));
                }
                out.push(json!({"role": "assistant", "content": blocks}));
            }
            Message::Tool {
                content,
                tool_call_id,
                ..
            } => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": content,
                });
                let merged = out.last_mut().and_then(|last| {
                    let is_result_turn = last["role"] == "user"
                        && last["content"]
                            .as_array()
                            .is_some_and(|b| b.iter().all(|x| x["type"] == "tool_result"));
                    if is_result_turn {
                        last["content"].as_array_mut()
                    } else {
                        None
                    }
                });
                match merged {
                    Some(blocks) => blocks.push(block),
                    None => out.push(json!({"role": "user", "content": [block]})),
                }
            }
        }
    }
    out
}

pub fn anthropic_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}

pub fn anthropic_request_body(model: &str, request: &CompletionRequest) -> Value {
    let mut system_parts: Vec<&str> = Vec::new();
    if let Some(system) = request.system.as_deref() {
        system_parts.push(system);
    }
    for m in &request.messages {
        if let Message::System { content } = m {
            system_parts.push(content);
        }
    }

    let mut body = json!({
        "model": model,
        "messages": anthropic_messages(request),
        "max_tokens": request.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
    });
    if !system_parts.is_empty() {
        body["system"] = json!(system_parts.join("\n\n"));
    }
    if !request.tools.is_empty() {
        body["tools"] = json!(anthropic_tools(&request.tools));
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }
    body
}

pub fn parse_anthropic_response(data: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
    let blocks = data["content"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("missing content array".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => text.push_str(block["text"].as_str().unwrap_or("")),
            Some("tool_use") => {
                let id = block["id"]
                    .as_str()
                    .ok_or_else(|| LlmError::InvalidResponse("tool_use without id".to_string()))?;
                let name = block["name"]
                    .as_str()
                    .ok_or_else(|| LlmError::InvalidResponse("tool_use without name".to_string()))?;
                tool_calls.push(ToolCall::new(id, name, arguments_object(&block["input"])));
            }
            _ => {}
        }
    }

    let finish_reason = match data["stop_reason"].as_str() {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    };

    Ok(CompletionResponse {
        content: text,
        tool_calls,
        finish_reason,
        usage: Usage {
            prompt_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
        },
        model: data["model"].as_str().unwrap_or(model).to_string(),
    })
}

// ============================================================================
// OpenAI-compatible Provider (OpenAI, Ollama, vLLM)
// ============================================================================

pub struct OpenAIClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAIClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{path}", self.config.openai_base_url());
        let builder = self.client.post(url);
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.header("Authorization", format!("Bearer {}", self.config.api_key))
        }
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = openai_request_body(&self.config.model, request);
        let data = send_json(self.post("chat/completions"), &body).await?;
        let response = parse_openai_response(&data, &self.config.model)?;
        tracing::debug!(
            provider = self.config.provider.as_str(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            tool_calls = response.tool_calls.len(),
            "chat completion"
        );
        Ok(response)
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let data = send_json(self.post("embeddings"), &body).await?;
        let vectors = parse_openai_embeddings(&data)?;
        if vectors.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

// ============================================================================
// Anthropic Provider
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(ANTHROPIC_DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let url = format!("{base}/messages");

        let body = anthropic_request_body(&self.config.model, request);
        let builder = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let data = send_json(builder, &body).await?;
        let response = parse_anthropic_response(&data, &self.config.model)?;
        tracing::debug!(
            provider = "anthropic",
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            tool_calls = response.tool_calls.len(),
            "messages completion"
        );
        Ok(response)
    }
}

// ============================================================================
// Unified Client
// ============================================================================

/// Dispatches to the configured provider. Local servers speak the OpenAI
/// protocol, so they share `OpenAIClient`.
pub enum UnifiedClient {
    OpenAI(OpenAIClient),
    Anthropic(AnthropicClient),
}

impl UnifiedClient {
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        match config.provider {
            Provider::OpenAI | Provider::Local => Ok(Self::OpenAI(OpenAIClient::new(config)?)),
            Provider::Anthropic => Ok(Self::Anthropic(AnthropicClient::new(config)?)),
        }
    }

    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env().map_err(|e| LlmError::Config(e.to_string()))?;
        Self::from_config(config)
    }

    fn config(&self) -> &LlmConfig {
        match self {
            Self::OpenAI(c) => &c.config,
            Self::Anthropic(c) => &c.config,
        }
    }
}

#[async_trait]
impl LanguageModel for UnifiedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self {
            Self::OpenAI(c) => c.complete(&request).await,
            Self::Anthropic(c) => c.complete(&request).await,
        }
    }

    fn model_info(&self) -> ModelInfo {
        let config = self.config();
        ModelInfo {
            name: config.model.clone(),
            provider: config.provider.as_str().to_string(),
            supports_functions: true,
        }
    }
}

// ============================================================================
// Embeddings through a provider
// ============================================================================

/// `Embedder` backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct ModelEmbedder {
    client: Arc<OpenAIClient>,
}

impl ModelEmbedder {
    pub fn new(client: Arc<OpenAIClient>) -> Self {
        Self { client }
    }

    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        match config.provider {
            Provider::OpenAI | Provider::Local => Ok(Self::new(Arc::new(OpenAIClient::new(config)?))),
            Provider::Anthropic => Err(LlmError::Config(
                "Anthropic doesn't support embeddings".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Embedder for ModelEmbedder {
    fn backend(&self) -> &str {
        self.client.config.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.client.config.embedding_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        self.client
            .embed(texts)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_round_request() -> CompletionRequest {
        CompletionRequest {
            system: Some("policy".to_string()),
            messages: vec![
                Message::user("jobs in Cairo"),
                Message::assistant_with_tools(
                    "",
                    vec![
                        ToolCall::new("c1", "location_filter_tool", json!({"location": "Cairo"})),
                        ToolCall::new("c2", "list_all_jobs", Value::Null),
                    ],
                ),
                Message::tool("c1", "location_filter_tool", "Sales Rep"),
                Message::tool("c2", "list_all_jobs", "everything"),
            ],
            tools: vec![ToolSpec {
                name: "location_filter_tool".to_string(),
                description: "Filter jobs by location.".to_string(),
                input_schema: json!({"type": "object", "properties": {"location": {"type": "string"}}}),
            }],
            max_tokens: None,
            temperature: Some(0.0),
        }
    }

    #[test]
    fn openai_encodes_tool_calls_with_string_arguments() {
        let body = openai_request_body("gpt-4o-mini", &tool_round_request());
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");

        let call = &messages[2]["tool_calls"][0];
        assert_eq!(call["type"], "function");
        assert_eq!(call["function"]["name"], "location_filter_tool");
        let args: Value =
            serde_json::from_str(call["function"]["arguments"].as_str().expect("string args")).expect("json");
        assert_eq!(args, json!({"location": "Cairo"}));
        assert_eq!(messages[2]["tool_calls"][1]["function"]["arguments"], "{}");
        assert!(messages[2]["content"].is_null());

        assert_eq!(messages[3], json!({"role": "tool", "tool_call_id": "c1", "content": "Sales Rep"}));
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn openai_response_tool_calls_are_decoded() {
        let data = json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "retrieve_jobs", "arguments": "{\"query\":\"pharmacist\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let response = parse_openai_response(&data, "gpt-4o-mini").expect("parse");
        assert_eq!(response.content, "");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls, vec![ToolCall::new("call_1", "retrieve_jobs", json!({"query": "pharmacist"}))]);
        assert_eq!(response.usage.prompt_tokens, 12);
        assert_eq!(response.model, "gpt-4o-mini-2024");
    }

    #[test]
    fn openai_response_with_bad_arguments_is_invalid() {
        let data = json!({"choices": [{"message": {"tool_calls": [{
            "id": "x", "function": {"name": "retrieve_jobs", "arguments": "{not json"}
        }]}}]});
        let err = parse_openai_response(&data, "m").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)), "{err}");
        assert!(parse_openai_response(&json!({"choices": []}), "m").is_err());
    }

    #[test]
    fn embeddings_follow_index_order() {
        let data = json!({"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]});
        assert_eq!(parse_openai_embeddings(&data).expect("parse"), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn anthropic_merges_consecutive_tool_results() {
        let body = anthropic_request_body("claude", &tool_round_request());
        assert_eq!(body["system"], "policy");
        assert_eq!(body["max_tokens"], ANTHROPIC_DEFAULT_MAX_TOKENS);

        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 3);
        let uses = messages[1]["content"].as_array().expect("blocks");
        assert_eq!(uses.len(), 2, "empty text is not sent as a block");
        assert_eq!(uses[0]["type"], "tool_use");
        assert_eq!(uses[1]["input"], json!({}));

        let results = messages[2]["content"].as_array().expect("results");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "c1");
        assert_eq!(results[1]["tool_use_id"], "c2");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn anthropic_skips_empty_assistant_text() {
        let request = CompletionRequest {
            messages: vec![
                Message::user("hi"),
                Message::assistant(""),
                Message::user("any chemist jobs?"),
                Message::assistant("Yes, in Sadat City."),
            ],
            ..CompletionRequest::default()
        };
        let messages = anthropic_messages(&request);
        let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
        assert_eq!(roles, vec!["user", "user", "assistant"]);
        assert!(messages.iter().all(|m| m["content"] != ""));
    }

    #[test]
    fn anthropic_response_collects_text_and_tool_use() {
        let data = json!({
            "content": [
                {"type": "text", "text": "Looking that up."},
                {"type": "tool_use", "id": "toolu_1", "name": "summarize_career_tool", "input": {"query": "sales growth"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 9}
        });
        let response = parse_anthropic_response(&data, "claude").expect("parse");
        assert_eq!(response.content, "Looking that up.");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls[0].name, "summarize_career_tool");
        assert_eq!(response.usage.completion_tokens, 9);
        assert_eq!(response.model, "claude");
    }

    #[test]
    fn local_base_url_gets_v1_suffix_once() {
        assert_eq!(LlmConfig::local("http://localhost:11434", "llama3").openai_base_url(), "http://localhost:11434/v1");
        assert_eq!(LlmConfig::local("http://localhost:8000/v1/", "m").openai_base_url(), "http://localhost:8000/v1");
        assert_eq!(LlmConfig::openai("k", "m").openai_base_url(), OPENAI_DEFAULT_BASE_URL);
    }

    #[test]
    fn config_creation() {
        let config = LlmConfig::anthropic("test-key", "claude-3-5-haiku-latest").with_model("other");
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "other");
        assert!(ModelEmbedder::from_config(config).is_err());
    }
}
