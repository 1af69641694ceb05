//! Similarity index over job documents.
//!
//! `VectorIndex` keeps every document next to its (normalized) embedding and
//! answers nearest-neighbour queries by cosine similarity. Large corpora are
//! served through an HNSW graph with exact re-ranking of the ANN candidates;
//! small corpora (the common case for a single employer) are scanned exactly so
//! rankings are fully deterministic.
//!
//! Persisted form
//! --------------
//! The index is the only durable artifact. It is written as one CBOR file
//! (`jobscout_index_v1`) holding the documents, their vectors and the embedder
//! that produced them. Schema changes bump the version; old files are rebuilt,
//! never migrated.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hnsw_rs::prelude::{DistL2, Hnsw};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::document::{load_jobs_file, Document};
use crate::embed::{normalize_in_place, Embedder};
use crate::error::IndexError;

pub const INDEX_FILE_VERSION_V1: &str = "jobscout_index_v1";

/// Corpora up to this size are scanned exactly instead of through HNSW.
const EXACT_SCAN_MAX: usize = 512;
const EMBED_BATCH: usize = 64;

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFileV1 {
    pub version: String,
    pub created_at_unix_secs: u64,
    pub backend: String,
    pub model: String,
    pub dim: usize,
    pub items: Vec<IndexedDocumentV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocumentV1 {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine similarity to the query (higher is closer).
    pub score: f32,
}

/// Nearest-neighbour lookup by text query.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` documents, most relevant first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    dim: usize,
    created_at_unix_secs: u64,
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
    ann: Option<Mutex<Hnsw<'static, f32, DistL2>>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("backend", &self.embedder.backend())
            .field("model", &self.embedder.model())
            .field("dim", &self.dim)
            .field("documents", &self.documents.len())
            .field("ann", &self.ann.is_some())
            .finish()
    }
}

fn build_hnsw(vectors: &[Vec<f32>]) -> Hnsw<'static, f32, DistL2> {
    // HNSW params (conservative defaults):
    // - `m`: max connections per layer
    // - `ef_construction`: construction search width
    let m: usize = 16;
    let ef_construction: usize = 200;

    let nb_elem = vectors.len();
    let max_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);

    let hnsw = Hnsw::<f32, DistL2>::new(m, nb_elem, max_layer, ef_construction, DistL2 {});
    for (i, v) in vectors.iter().enumerate() {
        hnsw.insert((&v[..], i));
    }
    hnsw
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl VectorIndex {
    /// Embed and index a full corpus. Document ids must be unique.
    pub async fn build(
        documents: Vec<Document>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IndexError> {
        ensure_unique_ids(&documents)?;

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(documents.len());
        for batch in documents.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(IndexError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
        tracing::info!(
            documents = documents.len(),
            backend = embedder.backend(),
            model = embedder.model(),
            dim,
            "built job index"
        );
        Self::from_parts(embedder, dim, now_unix_secs(), documents, vectors)
    }

    fn from_parts(
        embedder: Arc<dyn Embedder>,
        dim: usize,
        created_at_unix_secs: u64,
        documents: Vec<Document>,
        mut vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        for v in vectors.iter_mut() {
            if v.len() != dim {
                return Err(IndexError::DimensionMismatch {
                    expected: dim,
                    found: v.len(),
                });
            }
            normalize_in_place(v);
        }

        let ann = if vectors.len() > EXACT_SCAN_MAX {
            Some(Mutex::new(build_hnsw(&vectors)))
        } else {
            None
        };

        Ok(Self {
            embedder,
            dim,
            created_at_unix_secs,
            documents,
            vectors,
            ann,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn created_at_unix_secs(&self) -> u64 {
        self.created_at_unix_secs
    }

    pub fn to_file(&self) -> IndexFileV1 {
        IndexFileV1 {
            version: INDEX_FILE_VERSION_V1.to_string(),
            created_at_unix_secs: self.created_at_unix_secs,
            backend: self.embedder.backend().to_string(),
            model: self.embedder.model().to_string(),
            dim: self.dim,
            items: self
                .documents
                .iter()
                .zip(self.vectors.iter())
                .map(|(d, v)| IndexedDocumentV1 {
                    id: d.id.clone(),
                    content: d.content.clone(),
                    vector: v.clone(),
                })
                .collect(),
        }
    }

    /// Write the index atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(&self.to_file(), &mut out)
            .map_err(|e| IndexError::Encode(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
            }
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &out).map_err(|e| IndexError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| IndexError::io(path, e))?;
        tracing::info!(path = %path.display(), bytes = out.len(), "wrote job index");
        Ok(())
    }

    /// Load a persisted index. The embedder must be the one that built it.
    pub fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path).map_err(|e| IndexError::io(path, e))?;
        let file: IndexFileV1 = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Self::from_file(file, embedder)
    }

    pub fn from_file(file: IndexFileV1, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        if file.version != INDEX_FILE_VERSION_V1 {
            return Err(IndexError::UnsupportedVersion {
                found: file.version,
                expected: INDEX_FILE_VERSION_V1.to_string(),
            });
        }
        if file.backend != embedder.backend() || file.model != embedder.model() {
            return Err(IndexError::EmbedderMismatch {
                file_backend: file.backend,
                file_model: file.model,
                backend: embedder.backend().to_string(),
                model: embedder.model().to_string(),
            });
        }

        let mut documents = Vec::with_capacity(file.items.len());
        let mut vectors = Vec::with_capacity(file.items.len());
        for item in file.items {
            documents.push(Document::new(item.id, item.content));
            vectors.push(item.vector);
        }
        ensure_unique_ids(&documents)?;
        Self::from_parts(
            embedder,
            file.dim,
            file.created_at_unix_secs,
            documents,
            vectors,
        )
    }

    /// Load `index_path`, or rebuild it from `jobs_path` when it is missing or
    /// `rebuild` is set.
    pub async fn open_or_build(
        index_path: &Path,
        jobs_path: &Path,
        embedder: Arc<dyn Embedder>,
        rebuild: bool,
    ) -> Result<Self, IndexError> {
        if !rebuild && index_path.exists() {
            return Self::load(index_path, embedder);
        }
        let documents = load_jobs_file(jobs_path)?;
        let index = Self::build(documents, embedder).await?;
        index.save(index_path)?;
        Ok(index)
    }

    fn candidate_rows(&self, query: &[f32], k: usize) -> Vec<usize> {
        let len = self.vectors.len();
        match self.ann.as_ref() {
            // Asking for the whole corpus (or more) is an exact scan.
            Some(_) if k >= len => (0..len).collect(),
            Some(ann) => {
                let want = k.saturating_mul(4).min(len);
                let ef_search = want.max(128);
                let ann = ann.lock();
                ann.search(query, want, ef_search)
                    .into_iter()
                    .map(|n| n.d_id)
                    .filter(|idx| *idx < len)
                    .collect()
            }
            None => (0..len).collect(),
        }
    }

    fn rank(&self, query: &[f32], k: usize) -> Vec<(f32, usize)> {
        let mut scored: Vec<(f32, usize)> = self
            .candidate_rows(query, k)
            .into_iter()
            .map(|idx| (dot(query, &self.vectors[idx]), idx))
            .collect();
        scored.sort_by(|(sa, ia), (sb, ib)| sb.total_cmp(sa).then_with(|| ia.cmp(ib)));
        scored.dedup_by_key(|(_, idx)| *idx);
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl SimilarityIndex for VectorIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, IndexError> {
        if k == 0 || self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut embedded = self.embedder.embed(&[query.to_string()]).await?;
        let mut q = embedded
            .pop()
            .ok_or_else(|| IndexError::Embedding("embedder returned no query vector".to_string()))?;
        if q.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                found: q.len(),
            });
        }
        normalize_in_place(&mut q);

        let hits: Vec<ScoredDocument> = self
            .rank(&q, k)
            .into_iter()
            .map(|(score, idx)| ScoredDocument {
                document: self.documents[idx].clone(),
                score,
            })
            .collect();
        tracing::debug!(query, k, hits = hits.len(), "similarity search");
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

fn ensure_unique_ids(documents: &[Document]) -> Result<(), IndexError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for d in documents {
        if !seen.insert(d.id.as_str()) {
            return Err(IndexError::DuplicateId(d.id.clone()));
        }
    }
    Ok(())
}
