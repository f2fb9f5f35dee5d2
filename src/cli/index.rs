//! Reindex and backfill command implementations

use anyhow::Result;

use crate::context::RunContext;
use crate::embed::{create_embedder, Embedder};
use crate::index;
use crate::jobs::{CancelFlag, Progress};
use crate::store::TurnStore;

pub fn reindex(store: &TurnStore, ctx: &RunContext, keyword_only: bool, cancel: &CancelFlag) -> Result<()> {
    if keyword_only {
        let indexed = index::rebuild_keyword(store)?;
        println!("Keyword index rebuilt over {} turns", indexed);
        return Ok(());
    }

    let progress = Progress::new();
    let stats = index::reindex(
        store,
        ctx.embedder.as_ref(),
        ctx.config.search.embedding_batch_size,
        cancel,
        &progress,
    )?;
    println!("Keyword index rebuilt over {} turns", stats.keyword_indexed);
    print_backfill(&stats.backfill);
    Ok(())
}

pub fn backfill(
    store: &TurnStore,
    ctx: &RunContext,
    model: Option<String>,
    batch_size: Option<usize>,
    cancel: &CancelFlag,
) -> Result<()> {
    // another model's vectors live next to the configured ones
    let requested = match model {
        Some(name) if name != ctx.embedder.model_name() => Some(create_embedder(&name)?),
        _ => None,
    };
    let embedder: &dyn Embedder = requested.as_deref().unwrap_or(ctx.embedder.as_ref());

    let progress = Progress::new();
    let stats = index::backfill(
        store,
        embedder,
        batch_size.unwrap_or(ctx.config.search.embedding_batch_size),
        None,
        cancel,
        &progress,
    )?;
    print_backfill(&stats);
    Ok(())
}

fn print_backfill(stats: &index::BackfillStats) {
    println!(
        "Embeddings: {} turns, {} updated, {} unchanged{}",
        stats.total,
        stats.updated,
        stats.skipped,
        if stats.cancelled { " (cancelled)" } else { "" }
    );
}
