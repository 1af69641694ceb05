//! Deterministic models.
//!
//! - `ScriptedModel` replays a fixed queue of completions and records what it
//!   was asked; tests use it to pin the control loop's behaviour.
//! - `MockModel` picks a tool from keywords in the user's question and answers
//!   with the tool output. It needs no network, which makes `--llm-mock` demos
//!   work offline.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::*;

type Generator = Box<dyn Fn(&str) -> String + Send + Sync>;

/// A generation request as seen by [`ScriptedModel::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrompt {
    pub prompt: String,
    pub temperature: Option<f32>,
}

#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
    generator: Option<Generator>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: CompletionResponse) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    pub fn answer(self, content: &str) -> Self {
        self.respond(CompletionResponse::text(content, "scripted"))
    }

    pub fn call_tool(self, id: &str, name: &str, arguments: serde_json::Value) -> Self {
        self.respond(CompletionResponse::with_tool_calls(
            vec![ToolCall::new(id, name, arguments)],
            "scripted",
        ))
    }

    pub fn fail(self, error: LlmError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Function answering `generate` calls (analysis tools). Without one,
    /// `generate` fails.
    pub fn with_generator(mut self, generator: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Script("script exhausted".to_string())))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "scripted".to_string(),
            provider: "mock".to_string(),
            supports_functions: true,
        }
    }

    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, LlmError> {
        self.prompts.lock().push(RecordedPrompt {
            prompt: prompt.to_string(),
            temperature: options.temperature,
        });
        match self.generator.as_ref() {
            Some(generate) => Ok(generate(prompt)),
            None => Err(LlmError::Script("no generator configured".to_string())),
        }
    }
}

// ============================================================================
// Keyword mock
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MockModel;

impl MockModel {
    /// Tool and arguments the mock would call for `question`.
    pub fn route(question: &str) -> (&'static str, serde_json::Value) {
        let q = question.trim();
        let lower = q.to_lowercase();

        if lower.contains(" vs ") || lower.contains(" versus ") || lower.starts_with("compare") {
            let titles = lower.strip_prefix("compare").unwrap_or(&lower).trim();
            return ("compare_jobs_tool", json!({"job_titles": titles}));
        }
        let asks_for_list = lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == "list");
        if asks_for_list || lower.contains("all jobs") || lower.contains("all positions") {
            return ("list_all_jobs", json!({}));
        }
        if lower.contains("career") || lower.contains("growth") || lower.contains("promotion") {
            return ("summarize_career_tool", json!({"query": q}));
        }
        if let Some(pos) = lower.rfind(" in ") {
            let location = q.get(pos + 4..).unwrap_or_default().trim_matches(|c: char| c.is_whitespace() || "?.!".contains(c));
            if !location.is_empty() {
                return ("location_filter_tool", json!({"location": location}));
            }
        }
        ("retrieve_jobs", json!({"query": q}))
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let trailing_tool_output: Vec<&str> = request
            .messages
            .iter()
            .rev()
            .take_while(|m| m.is_tool())
            .map(Message::content)
            .collect();

        if !trailing_tool_output.is_empty() {
            let mut body: Vec<&str> = trailing_tool_output;
            body.reverse();
            let joined = body.join("\n\n");
            let answer = if joined.trim().is_empty() {
                "I could not find any matching positions.".to_string()
            } else {
                format!("Here is what I found:\n\n{joined}")
            };
            return Ok(CompletionResponse::text(answer, "mock"));
        }

        let question = request
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or_default();

        let (tool, arguments) = Self::route(question);
        if !request.tools.iter().any(|t| t.name == tool) {
            return Ok(CompletionResponse::text(
                format!("You asked: {question}"),
                "mock",
            ));
        }

        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        Ok(CompletionResponse::with_tool_calls(
            vec![ToolCall::new(id, tool, arguments)],
            "mock",
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "keyword-mock".to_string(),
            provider: "mock".to_string(),
            supports_functions: true,
        }
    }

    /// Lists the job titles found in the prompt.
    async fn generate(&self, prompt: &str, _options: GenerationOptions) -> Result<String, LlmError> {
        let titles: Vec<&str> = prompt
            .lines()
            .filter_map(|l| l.strip_prefix("Title:"))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if titles.is_empty() {
            return Ok("No matching job postings were provided.".to_string());
        }
        let mut out = String::from("Relevant positions:");
        for title in titles {
            out.push_str("\n- ");
            out.push_str(title);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_questions_to_tools() {
        assert_eq!(MockModel::route("Compare sales rep vs pharmacist").0, "compare_jobs_tool");
        assert_eq!(
            MockModel::route("compare accountant and auditor").1,
            json!({"job_titles": "accountant and auditor"})
        );
        assert_eq!(MockModel::route("List all jobs").0, "list_all_jobs");
        assert_eq!(MockModel::route("career growth for chemists").0, "summarize_career_tool");
        assert_eq!(
            MockModel::route("What jobs are available in Cairo?"),
            ("location_filter_tool", json!({"location": "Cairo"}))
        );
        assert_eq!(MockModel::route("data analyst").0, "retrieve_jobs");
        assert_eq!(
            MockModel::route("Any specialist roles in Giza?"),
            ("location_filter_tool", json!({"location": "Giza"}))
        );
        assert_eq!(MockModel::route("checklist for applying").0, "retrieve_jobs");
        assert_eq!(MockModel::route("list openings, please").0, "list_all_jobs");
    }

    #[tokio::test]
    async fn scripted_model_replays_then_fails() {
        let model = ScriptedModel::new().answer("hello");
        let first = model.complete(CompletionRequest::default()).await.expect("first");
        assert_eq!(first.content, "hello");
        let err = model.complete(CompletionRequest::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::Script(_)), "{err}");
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn mock_answers_with_tool_output() {
        let request = CompletionRequest {
            messages: vec![
                Message::user("jobs in Giza"),
                Message::assistant_with_tools(
                    "",
                    vec![ToolCall::new("c1", "location_filter_tool", json!({"location": "Giza"}))],
                ),
                Message::tool("c1", "location_filter_tool", "Relevant positions:\n- Pharmacist"),
            ],
            ..Default::default()
        };
        let response = MockModel.complete(request).await.expect("complete");
        assert!(response.tool_calls.is_empty());
        assert!(response.content.ends_with("- Pharmacist"));
    }
}
