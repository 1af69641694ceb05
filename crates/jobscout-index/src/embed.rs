//! Embedding backends.
//!
//! Two kinds of embedder feed the index:
//! - a deterministic token-hash embedder (always available, no network), and
//! - model embedders living in `jobscout-agent`, wrapping an HTTP provider.
//!
//! Whatever built an index must also embed its queries; the index file records
//! the backend and model so a mismatch is caught at load time.

use async_trait::async_trait;

use crate::error::IndexError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short backend name stored in the index file (e.g. `token_hash`, `openai`).
    fn backend(&self) -> &str;

    fn model(&self) -> &str;

    /// Embed a batch of texts. Output is aligned with the input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}

pub const TOKEN_HASH_DIM: usize = 128;

fn fnv1a64(s: &str) -> u64 {
    let mut h: u64 = 14695981039346656037;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    h
}

/// Lower-cased alphanumeric runs. Used for hashing only; lexical dedup has its
/// own whitespace tokenizer.
fn hash_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

pub(crate) fn normalize_in_place(v: &mut [f32]) {
    let mut norm2 = 0.0f32;
    for x in v.iter() {
        norm2 += x * x;
    }
    if norm2 <= 0.0 {
        return;
    }
    let inv = 1.0f32 / norm2.sqrt();
    for x in v.iter_mut() {
        *x *= inv;
    }
}

/// Feature-hashing embedder: each token adds ±1 to one of `TOKEN_HASH_DIM`
/// buckets, then the vector is L2-normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenHashEmbedder;

impl TokenHashEmbedder {
    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; TOKEN_HASH_DIM];
        for t in hash_tokens(text) {
            let h = fnv1a64(&t);
            let idx = (h % (TOKEN_HASH_DIM as u64)) as usize;
            let sign = if ((h >> 32) & 1) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        normalize_in_place(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for TokenHashEmbedder {
    fn backend(&self) -> &str {
        "token_hash"
    }

    fn model(&self) -> &str {
        "fnv1a-128"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }
}
