//! Side-by-side comparison of two roles.
//!
//! The free-text title pair is split heuristically, each title gets its own
//! multi-query context (postings that name the title verbatim first), and the
//! model writes the comparison.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use jobscout_index::{DedupRetriever, Document};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::{decode_args, join_contents, Tool};
use crate::error::AgentError;
use crate::llm::{GenerationOptions, LanguageModel, ToolSpec};
use crate::prompts;

pub const COMPARE_SUBQUERY_K: usize = 3;
const MAX_GENERAL_DOCS: usize = 3;
const MAX_CONTEXT_DOCS: usize = 5;

/// Separators tried in order; the first one present decides the split.
const SEPARATORS: [&str; 4] = [" vs ", " versus ", " and ", ","];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleParseError {
    /// No separator and fewer than four words.
    NoSeparator,
    /// A separator was found but it did not yield two non-empty titles.
    TooFewTitles,
}

impl TitleParseError {
    pub fn guidance(self) -> &'static str {
        match self {
            Self::NoSeparator => "Please specify two jobs to compare using a format like 'UX Designer vs Motion Graphics Designer' or 'UX Designer and Motion Graphics Designer'.",
            Self::TooFewTitles => "Please specify exactly two jobs to compare. Example: 'UX Designer vs Motion Graphics Designer'.",
        }
    }
}

/// Split free text into two lower-cased titles.
///
/// ```
/// use jobscout_agent::tools::parse_job_titles;
///
/// assert_eq!(
///     parse_job_titles("Sales Rep vs Pharmacist"),
///     Ok(("sales rep".to_string(), "pharmacist".to_string()))
/// );
/// ```
pub fn parse_job_titles(input: &str) -> Result<(String, String), TitleParseError> {
    let clean = input.trim().to_lowercase();

    if let Some(sep) = SEPARATORS.iter().find(|sep| clean.contains(**sep)) {
        let mut titles = clean.split(sep).map(str::trim).filter(|t| !t.is_empty());
        return match (titles.next(), titles.next()) {
            (Some(a), Some(b)) => Ok((a.to_string(), b.to_string())),
            _ => Err(TitleParseError::TooFewTitles),
        };
    }

    let words: Vec<&str> = clean.split_whitespace().collect();
    if words.len() < 4 {
        return Err(TitleParseError::NoSeparator);
    }
    let mid = words.len() / 2;
    Ok((words[..mid].join(" "), words[mid..].join(" ")))
}

fn fingerprint(content: &str) -> [u8; 32] {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[derive(Deserialize)]
struct CompareArgs {
    job_titles: String,
}

pub struct CompareJobsTool {
    retriever: DedupRetriever,
    model: Arc<dyn LanguageModel>,
}

impl CompareJobsTool {
    pub fn new(retriever: DedupRetriever, model: Arc<dyn LanguageModel>) -> Self {
        Self { retriever, model }
    }

    /// Context for one (lower-cased) title: verbatim matches first, then at
    /// most three general postings, five documents in total.
    pub async fn gather_context(&self, title: &str) -> Result<String, AgentError> {
        let queries = [
            title.to_string(),
            format!("{title} responsibilities duties"),
            format!("{title} requirements qualifications skills"),
            format!("{title} job description role"),
            format!("{title} experience level career"),
        ];

        let mut seen: HashSet<[u8; 32]> = HashSet::new();
        let mut docs: Vec<Document> = Vec::new();
        for query in &queries {
            for doc in self.retriever.retrieve(query, COMPARE_SUBQUERY_K).await? {
                if seen.insert(fingerprint(&doc.content)) {
                    docs.push(doc);
                }
            }
        }

        let (specific, general): (Vec<Document>, Vec<Document>) = docs
            .into_iter()
            .partition(|d| d.content.to_lowercase().contains(title));
        tracing::debug!(title, specific = specific.len(), general = general.len(), "comparison context");

        let prioritized: Vec<Document> = specific
            .into_iter()
            .chain(general.into_iter().take(MAX_GENERAL_DOCS))
            .take(MAX_CONTEXT_DOCS)
            .collect();
        Ok(join_contents(&prioritized))
    }
}

fn not_found(title: &str) -> String {
    format!(
        "I couldn't find detailed information about '{title}'. Please check the job title spelling or try a more general term."
    )
}

#[async_trait]
impl Tool for CompareJobsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "compare_jobs_tool".to_string(),
            description: "Compare two job roles. Input should be two job titles separated by 'vs' or 'and'.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_titles": {"type": "string", "description": "e.g. 'Sales Representative vs Pharmacist'"}
                },
                "required": ["job_titles"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<String, AgentError> {
        let args: CompareArgs = decode_args("compare_jobs_tool", arguments)?;
        let (first, second) = match parse_job_titles(&args.job_titles) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::info!(input = %args.job_titles, reason = ?e, "could not parse comparison titles");
                return Ok(e.guidance().to_string());
            }
        };
        tracing::info!(first = %first, second = %second, "comparing jobs");

        let first_info = self.gather_context(&first).await?;
        let second_info = self.gather_context(&second).await?;
        if first_info.trim().is_empty() {
            return Ok(not_found(&first));
        }
        if second_info.trim().is_empty() {
            return Ok(not_found(&second));
        }

        let prompt = prompts::compare_jobs(&first_info, &second_info, &first, &second);
        Ok(self.model.generate(&prompt, GenerationOptions::default()).await?)
    }
}
