//! Keyword and semantic index maintenance

use anyhow::{bail, Context, Result};

use crate::embed::{text_hash, Embedder};
use crate::jobs::{CancelFlag, Progress};
use crate::store::{NewEmbedding, TurnStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillStats {
    /// Candidate turns looked at
    pub total: usize,
    /// Vectors written
    pub updated: usize,
    /// Empty text or unchanged hash
    pub skipped: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    pub keyword_indexed: usize,
    pub backfill: BackfillStats,
}

/// Rebuild the keyword index from the turns table
pub fn rebuild_keyword(store: &TurnStore) -> Result<usize> {
    let indexed = store.rebuild_keyword_index()?;
    tracing::info!("keyword index rebuilt over {} turns", indexed);
    Ok(indexed)
}

/// Embed every turn whose text hash differs from the stored one for the
/// embedder's model. `range` limits the run to a turn id window.
///
/// Cancellation is checked between batches, so a stopped run has written
/// whole batches only.
pub fn backfill(
    store: &TurnStore,
    embedder: &dyn Embedder,
    batch_size: usize,
    range: Option<(i64, i64)>,
    cancel: &CancelFlag,
    progress: &Progress,
) -> Result<BackfillStats> {
    let model = embedder.model_name().to_string();
    let candidates = store
        .embedding_candidates(&model, range)
        .context("loading embedding candidates")?;
    progress.set_total(candidates.len());
    tracing::info!(job = %progress.job_id, "backfilling {} candidates for {}", candidates.len(), model);

    let mut stats = BackfillStats::default();
    for chunk in candidates.chunks(batch_size.max(1)) {
        if cancel.is_cancelled() {
            tracing::warn!(job = %progress.job_id, "backfill cancelled after {} turns", stats.total);
            stats.cancelled = true;
            break;
        }

        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut hashes = Vec::new();
        for candidate in chunk {
            stats.total += 1;
            let text = candidate.text.trim();
            if text.is_empty() {
                stats.skipped += 1;
                continue;
            }
            let hash = text_hash(text);
            if candidate.stored_hash.as_deref() == Some(hash.as_str()) {
                stats.skipped += 1;
                continue;
            }
            ids.push(candidate.turn_id);
            texts.push(text.to_string());
            hashes.push(hash);
        }

        if !texts.is_empty() {
            let vectors = embedder
                .embed(&texts)
                .with_context(|| format!("embedding {} turns with {}", texts.len(), model))?;
            if vectors.len() != texts.len() {
                bail!("{} returned {} vectors for {} texts", model, vectors.len(), texts.len());
            }
            let batch: Vec<NewEmbedding> = ids
                .into_iter()
                .zip(vectors)
                .zip(hashes)
                .map(|((turn_id, vector), text_hash)| NewEmbedding { turn_id, vector, text_hash })
                .collect();
            store.upsert_embeddings(&model, &batch)?;
            stats.updated += batch.len();
        }
        progress.advance(chunk.len());
    }

    tracing::info!(
        job = %progress.job_id,
        "backfill done: {} total, {} updated, {} skipped",
        stats.total,
        stats.updated,
        stats.skipped
    );
    Ok(stats)
}

/// Full reindex: keyword rebuild, then a backfill over every turn
pub fn reindex(
    store: &TurnStore,
    embedder: &dyn Embedder,
    batch_size: usize,
    cancel: &CancelFlag,
    progress: &Progress,
) -> Result<ReindexStats> {
    let keyword_indexed = rebuild_keyword(store)?;
    let backfill = backfill(store, embedder, batch_size, None, cancel, progress)?;
    Ok(ReindexStats { keyword_indexed, backfill })
}
