//! Job postings and their canonical document form.
//!
//! The scraper writes a JSON array of postings. Each posting is rendered into a
//! fixed, line-oriented text block; that block is what gets embedded, deduplicated
//! and shown to the model.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IndexError;

/// One scraped posting, as written by the scraper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(deserialize_with = "string_or_number")]
    pub job_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub job_url: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub job_type: String,
    #[serde(default)]
    pub workplace_type: String,
    #[serde(default)]
    pub job_summary: String,
    #[serde(default)]
    pub key_responsibilities: String,
    #[serde(default)]
    pub requirements: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        UInt(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::UInt(n) => n.to_string(),
    })
}

impl JobPosting {
    /// Canonical content block. Field order is fixed; the job URL appears twice
    /// because downstream prompts and older indexes rely on both labels.
    pub fn render_content(&self) -> String {
        [
            format!("Title: {}", self.title),
            format!("Location: {}", self.location),
            format!("job_url: {}", self.job_url),
            format!("Department: {}", self.department),
            format!("Type: {}", self.job_type),
            format!("Workplace Type: {}", self.workplace_type),
            format!("Job URL: {}", self.job_url),
            format!("Summary: {}", self.job_summary),
            format!("Responsibilities: {}", self.key_responsibilities),
            format!("Requirements: {}", self.requirements),
        ]
        .join("\n")
    }

    pub fn to_document(&self) -> Document {
        Document {
            id: self.job_id.clone(),
            content: self.render_content(),
        }
    }
}

/// An immutable corpus entry. Embeddings are owned by the index, not the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    /// Value of a `Label: value` line in the canonical block, if present.
    pub fn field(&self, label: &str) -> Option<&str> {
        self.content.lines().find_map(|line| {
            let rest = line.strip_prefix(label)?;
            rest.strip_prefix(':').map(str::trim)
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.field("Title")
    }
}

/// Parse the scraper output and render documents, rejecting duplicate ids.
pub fn parse_jobs_json(text: &str) -> Result<Vec<Document>, IndexError> {
    let postings: Vec<JobPosting> = serde_json::from_str(text)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut docs = Vec::with_capacity(postings.len());
    for posting in postings {
        if !seen.insert(posting.job_id.clone()) {
            return Err(IndexError::DuplicateId(posting.job_id));
        }
        docs.push(posting.to_document());
    }
    Ok(docs)
}

pub fn load_jobs_file(path: &Path) -> Result<Vec<Document>, IndexError> {
    let text = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
    let docs = parse_jobs_json(&text)?;
    tracing::info!(path = %path.display(), documents = docs.len(), "loaded job corpus");
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cairo_posting() -> JobPosting {
        JobPosting {
            job_id: "17".to_string(),
            title: "Data Analyst".to_string(),
            location: "Cairo, Egypt".to_string(),
            job_url: "https://jobs.example.com/17".to_string(),
            department: "Analytics".to_string(),
            job_type: "Full-time".to_string(),
            workplace_type: "Hybrid".to_string(),
            job_summary: "Turn sales data into decisions.".to_string(),
            key_responsibilities: "Build dashboards.".to_string(),
            requirements: "SQL, Python.".to_string(),
        }
    }

    #[test]
    fn content_block_has_fixed_field_order() {
        let content = cairo_posting().render_content();
        let labels: Vec<&str> = content
            .lines()
            .map(|l| l.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(
            labels,
            vec![
                "Title",
                "Location",
                "job_url",
                "Department",
                "Type",
                "Workplace Type",
                "Job URL",
                "Summary",
                "Responsibilities",
                "Requirements"
            ]
        );
    }

    #[test]
    fn field_lookup_reads_canonical_lines() {
        let doc = cairo_posting().to_document();
        assert_eq!(doc.id, "17");
        assert_eq!(doc.title(), Some("Data Analyst"));
        assert_eq!(doc.field("Location"), Some("Cairo, Egypt"));
        assert_eq!(doc.field("Salary"), None);
    }

    #[test]
    fn accepts_numeric_ids_and_missing_fields() {
        let docs = parse_jobs_json(r#"[{"job_id": 42, "title": "Chemist"}, {"job_id": "a-1"}]"#)
            .expect("parse");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "42");
        assert!(docs[0].content.starts_with("Title: Chemist\nLocation: \n"));
        assert_eq!(docs[1].id, "a-1");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = parse_jobs_json(r#"[{"job_id": 1}, {"job_id": "1"}]"#).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateId(ref id) if id == "1"), "{err}");
    }
}
