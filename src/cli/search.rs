//! Search command implementation

use anyhow::{Context, Result};

use crate::context::RunContext;
use crate::model::Role;
use crate::search::{SearchEngine, SearchMode, SearchRequest};
use crate::store::TurnStore;

pub struct SearchArgs {
    pub query: String,
    pub mode: Option<SearchMode>,
    pub roles: Vec<String>,
    pub page: usize,
    pub page_size: usize,
    pub min_score: Option<f32>,
    pub strict: bool,
    pub timeline: bool,
    pub json: bool,
}

pub fn run(store: &TurnStore, ctx: &RunContext, args: SearchArgs) -> Result<()> {
    let config = &ctx.config.search;
    let mode = match args.mode {
        Some(mode) => mode,
        None => config
            .default_mode
            .parse::<SearchMode>()
            .map_err(anyhow::Error::msg)
            .context("search.default_mode")?,
    };
    let roles = args
        .roles
        .iter()
        .map(|r| Role::parse(r).with_context(|| format!("unknown role {:?} (use user or assistant)", r)))
        .collect::<Result<Vec<_>>>()?;

    let request = SearchRequest {
        query: args.query,
        mode,
        roles,
        page: args.page,
        page_size: args.page_size,
        min_score: args.min_score,
        strict: args.strict,
    };
    let engine = SearchEngine::new(store, ctx.embedder.as_ref(), config);
    let response = engine.search(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!(
        "{} results for {:?} ({} search, page {}, {} per page)\n",
        response.total_count, response.query, response.mode, response.page, response.page_size
    );
    for hit in &response.hits {
        let day = hit
            .timestamp_iso
            .as_deref()
            .map(|ts| ts.chars().take(10).collect::<String>())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:.3}  {:<9} {}  {}  {}#{}",
            hit.score,
            hit.role,
            day,
            hit.workspace_name.as_deref().unwrap_or("-"),
            hit.session_id,
            hit.turn
        );
        println!("       {}\n", super::one_line(&hit.snippet, 100));
    }

    if args.timeline {
        let days = engine.timeline(&request)?;
        println!("{:<12} {:>7} {:>9} {:>11}", "Date", "Matches", "Sessions", "Workspaces");
        for day in days {
            println!(
                "{:<12} {:>7} {:>9} {:>11}",
                day.date, day.count, day.unique_sessions, day.unique_workspaces
            );
        }
    }

    Ok(())
}
