//! Embedding providers and vector helpers
//!
//! Vectors are stored as little-endian f32 blobs keyed by `(turn_id, model)`.
//! The content hash recorded next to each vector lets a backfill skip turns
//! whose text has not changed.
//!
//! `search.semantic_model` picks the provider through [`create_embedder`]:
//! a sentence-embedding model run locally by fastembed (feature
//! `local-embeddings`, on by default), or [`HASHING_MODEL`] for an offline
//! vocabulary-overlap embedder that needs no model download.

#[cfg(feature = "local-embeddings")]
mod local;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

/// Model name recorded for vectors produced by [`HashingEmbedder`]
pub const HASHING_MODEL: &str = "gennie-hashing-384";

pub const HASHING_DIMS: usize = 384;

/// Sentence-embedding models fastembed can run, with their output size
pub const LOCAL_MODELS: &[(&str, usize)] = &[
    ("all-minilm-l6-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("bge-large-en-v1.5", 1024),
    ("nomic-embed-text-v1.5", 768),
    ("multilingual-e5-small", 384),
    ("multilingual-e5-base", 768),
    ("multilingual-e5-large", 1024),
];

/// Canonical local model name and dims. Hub prefixes such as
/// `sentence-transformers/` and letter case are ignored.
pub fn resolve_local_model(name: &str) -> Option<(&'static str, usize)> {
    let short = name.rsplit('/').next().unwrap_or(name).trim().to_ascii_lowercase();
    LOCAL_MODELS.iter().find(|(known, _)| *known == short).copied()
}

/// Build the embedder for a configured model name
pub fn create_embedder(model: &str) -> Result<Box<dyn Embedder>> {
    if model == HASHING_MODEL {
        return Ok(Box::new(HashingEmbedder::default()));
    }
    let Some((name, dims)) = resolve_local_model(model) else {
        let known: Vec<&str> = LOCAL_MODELS.iter().map(|(n, _)| *n).collect();
        bail!(
            "Unknown embedding model '{}'. Supported: {}, {}",
            model,
            known.join(", "),
            HASHING_MODEL
        );
    };
    local_embedder(name, dims)
}

#[cfg(feature = "local-embeddings")]
fn local_embedder(name: &'static str, dims: usize) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FastEmbedder::new(name, dims)?))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_embedder(name: &'static str, _dims: usize) -> Result<Box<dyn Embedder>> {
    bail!(
        "Embedding model {} requires --features local-embeddings; set search.semantic_model to {} to stay offline",
        name,
        HASHING_MODEL
    )
}

/// Turns text into fixed-size L2-normalized vectors
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    /// One vector per input, in input order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic feature-hashing embedder for offline use and tests.
///
/// Each lowercase word token is hashed into a bucket with a sign bit; the
/// bucket counts are L2-normalized. Only shared vocabulary brings texts
/// together, so paraphrases score low.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(&token.to_lowercase());
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if (hash >> 63) & 1 == 1 { -1.0 } else { 1.0 };
            vec[bucket] += sign;
        }
        normalize(&mut vec);
        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMS)
    }
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        HASHING_MODEL
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Scale to unit length in place; the zero vector is left alone
pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter_mut().for_each(|v| *v /= norm);
    }
}

pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity; 0.0 when either vector is zero or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// SHA-256 hex digest of the trimmed text
pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.trim().as_bytes()))
}
