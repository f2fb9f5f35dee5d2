//! Local sentence embeddings through fastembed (ONNX Runtime)

use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

use super::{normalize, Embedder};

/// Runs a fastembed model in-process.
///
/// The model is downloaded and loaded on the first `embed` call, so commands
/// that never embed pay nothing for it.
pub struct FastEmbedder {
    name: &'static str,
    dims: usize,
    model: EmbeddingModel,
    engine: Mutex<Option<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn new(name: &'static str, dims: usize) -> Result<Self> {
        Ok(Self {
            name,
            dims,
            model: fastembed_model(name)?,
            engine: Mutex::new(None),
        })
    }

    fn load(&self) -> Result<TextEmbedding> {
        tracing::info!("loading embedding model {}", self.name);
        TextEmbedding::try_new(InitOptions::new(self.model.clone()).with_show_download_progress(false))
            .map_err(|e| anyhow!("Failed to initialize embedding model {}: {}", self.name, e))
    }
}

impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut guard = self
            .engine
            .lock()
            .map_err(|_| anyhow!("embedding model {} lock poisoned", self.name))?;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let engine = guard
            .as_mut()
            .ok_or_else(|| anyhow!("embedding model {} not loaded", self.name))?;

        let mut vectors = engine
            .embed(texts.to_vec(), None)
            .map_err(|e| anyhow!("Local embedding with {} failed: {}", self.name, e))?;
        for vec in &mut vectors {
            if vec.len() != self.dims {
                return Err(anyhow!("{} returned {} dims, expected {}", self.name, vec.len(), self.dims));
            }
            normalize(vec);
        }
        Ok(vectors)
    }
}

fn fastembed_model(name: &str) -> Result<EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        other => Err(anyhow!("{} is not a fastembed model", other)),
    }
}
