use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid jobs JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to CBOR-encode index file: {0}")]
    Encode(String),
    #[error("failed to CBOR-decode index file: {0}")]
    Decode(String),
    #[error("unsupported index file version: {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },
    #[error(
        "index was built with {file_backend}/{file_model} but the embedder is {backend}/{model} (rebuild the index)"
    )]
    EmbedderMismatch {
        file_backend: String,
        file_model: String,
        backend: String,
        model: String,
    },
    #[error("embedding has wrong dim: expected {expected} got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("duplicate document id in corpus: {0}")]
    DuplicateId(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
