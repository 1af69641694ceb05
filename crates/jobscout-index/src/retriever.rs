//! Deduplicating retriever.
//!
//! Scraped listings are often near-copies of each other (the same role posted
//! for several sites, or re-posted with a new id). The retriever over-fetches
//! `2k` candidates and drops any candidate whose token overlap with an already
//! accepted document exceeds the duplicate threshold. Acceptance order is the
//! index rank order; nothing is re-sorted and the index is never re-queried.

use std::collections::HashSet;
use std::sync::Arc;

use crate::document::Document;
use crate::error::IndexError;
use crate::index::SimilarityIndex;

pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.8;

/// Jaccard overlap of case-insensitive whitespace tokens. Two texts with no
/// tokens at all have overlap 0.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta: HashSet<String> = a.split_whitespace().map(|t| t.to_lowercase()).collect();
    let tb: HashSet<String> = b.split_whitespace().map(|t| t.to_lowercase()).collect();
    let union = ta.union(&tb).count();
    if union == 0 {
        return 0.0;
    }
    ta.intersection(&tb).count() as f64 / union as f64
}

#[derive(Clone)]
pub struct DedupRetriever {
    index: Arc<dyn SimilarityIndex>,
    threshold: f64,
}

impl std::fmt::Debug for DedupRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupRetriever")
            .field("documents", &self.index.len())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl DedupRetriever {
    pub fn new(index: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            index,
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        &self.index
    }

    /// At most `k` documents, in index rank order, pairwise overlap ≤ threshold.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.index.search(query, k.saturating_mul(2)).await?;
        let fetched = candidates.len();

        let mut accepted: Vec<Document> = Vec::with_capacity(k);
        for candidate in candidates {
            let duplicate = accepted
                .iter()
                .any(|existing| token_jaccard(&candidate.document.content, &existing.content) > self.threshold);
            if duplicate {
                tracing::debug!(id = %candidate.document.id, "dropping near-duplicate candidate");
                continue;
            }
            accepted.push(candidate.document);
            if accepted.len() >= k {
                break;
            }
        }

        tracing::debug!(query, k, fetched, accepted = accepted.len(), "dedup retrieval");
        Ok(accepted)
    }
}
