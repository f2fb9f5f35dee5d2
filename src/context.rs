//! Per-run context: configuration plus the collaborators built from it

use anyhow::{Context, Result};

use crate::code::{ComplexityAnalyzer, HeuristicComplexity};
use crate::config::Config;
use crate::embed::{create_embedder, Embedder, HashingEmbedder, HASHING_MODEL};
use crate::text::Cleaner;

/// Built once per invocation and passed by reference to extraction,
/// enrichment, indexing and search.
pub struct RunContext {
    pub config: Config,
    pub cleaner: Cleaner,
    pub complexity: Box<dyn ComplexityAnalyzer>,
    pub embedder: Box<dyn Embedder>,
}

impl RunContext {
    /// Context with the embedder named by `search.semantic_model`
    pub fn new(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.search.semantic_model).context("search.semantic_model")?;
        Ok(Self::with_embedder(config, embedder))
    }

    pub fn with_embedder(config: Config, embedder: Box<dyn Embedder>) -> Self {
        let cleaner = Cleaner::new(&config.cleaner);
        Self {
            config,
            cleaner,
            complexity: Box::new(HeuristicComplexity),
            embedder,
        }
    }
}

/// Default settings with the offline hashing embedder
impl Default for RunContext {
    fn default() -> Self {
        let mut config = Config::default();
        config.search.semantic_model = HASHING_MODEL.to_string();
        Self::with_embedder(config, Box::new(HashingEmbedder::default()))
    }
}
