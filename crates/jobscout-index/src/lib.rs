//! Jobscout index: the retrieval side of the career assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        RETRIEVAL PIPELINE                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  jobs.json ──► JobPosting ──► Document ──► Embedder ──► VectorIndex
//! │  (scraper)                    (canonical       (token-hash,   (HNSW +
//! │                                text block)      model)         exact)
//! │                                                        │         │
//! │                                              index file (CBOR) ◄─┘
//! │                                                                  │
//! │  query ──► DedupRetriever ──► SimilarityIndex::search(2k)        │
//! │                 │                                                │
//! │                 └── token-Jaccard filter (> 0.8 dropped) ──► ≤ k docs
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The index is the only durable artifact. It is rebuilt wholesale from the
//! corpus and never patched in place.

pub mod document;
pub mod embed;
pub mod error;
pub mod index;
pub mod retriever;

pub use document::{load_jobs_file, parse_jobs_json, Document, JobPosting};
pub use embed::{Embedder, TokenHashEmbedder, TOKEN_HASH_DIM};
pub use error::IndexError;
pub use index::{ScoredDocument, SimilarityIndex, VectorIndex, INDEX_FILE_VERSION_V1};
pub use retriever::{token_jaccard, DedupRetriever, DEFAULT_DUPLICATE_THRESHOLD};
