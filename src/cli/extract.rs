//! Extract command implementation

use anyhow::{bail, Result};

use crate::extract::{ExtractionStatus, Extractor};
use crate::jobs::{CancelFlag, Progress};
use crate::reader::WorkspaceSelector;
use crate::store::TurnStore;

pub struct ExtractArgs {
    pub workspace: Option<String>,
    pub all: bool,
    pub agent: Option<String>,
    pub force: bool,
}

pub async fn run(extractor: &Extractor, store: &TurnStore, args: ExtractArgs, cancel: &CancelFlag) -> Result<()> {
    let ids: Vec<String> = match (args.workspace, args.all) {
        (Some(id), false) => vec![id],
        (None, true) => extractor
            .scan_all(&WorkspaceSelector::All)
            .into_iter()
            .map(|ws| ws.id)
            .collect(),
        _ => bail!("pass a workspace id or --all"),
    };

    if ids.is_empty() {
        println!("No workspaces found. Run 'gennie scan' to check the agent paths.");
        return Ok(());
    }

    let progress = Progress::new();
    let results = extractor
        .extract_many(store, ids, args.agent, args.force, cancel, &progress)
        .await;

    let (mut ok, mut skipped, mut failed) = (0, 0, 0);
    for r in &results {
        let detail = match r.status {
            ExtractionStatus::Success => {
                ok += 1;
                format!(
                    "{} sessions, {} turns, {} exchanges",
                    r.session_count, r.turn_count, r.combined_count
                )
            }
            ExtractionStatus::Skipped => {
                skipped += 1;
                r.reason.clone().unwrap_or_default()
            }
            ExtractionStatus::Failed => {
                failed += 1;
                r.error.clone().unwrap_or_default()
            }
        };
        let status = match r.status {
            ExtractionStatus::Success => "ok",
            ExtractionStatus::Skipped => "skip",
            ExtractionStatus::Failed => "FAIL",
        };
        println!(
            "[{:<4}] {} ({}) {} in {} ms",
            status,
            r.workspace_id,
            if r.workspace_name.is_empty() { "-" } else { r.workspace_name.as_str() },
            detail,
            r.duration_ms
        );
    }

    println!(
        "\n{} extracted, {} skipped, {} failed{}",
        ok,
        skipped,
        failed,
        if cancel.is_cancelled() { " (cancelled)" } else { "" }
    );
    Ok(())
}
