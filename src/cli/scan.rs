//! Scan command implementation

use anyhow::Result;

use crate::extract::Extractor;
use crate::reader::WorkspaceSelector;

pub fn run(extractor: &Extractor, folder: Option<String>) -> Result<()> {
    let selector = folder.map_or(WorkspaceSelector::All, WorkspaceSelector::Folder);
    let workspaces = extractor.scan_all(&selector);

    if workspaces.is_empty() {
        println!("No workspaces found. Check the agent paths in your configuration.");
        return Ok(());
    }

    println!(
        "{:<34} {:<26} {:>8} {:<17} {}",
        "ID", "Agents", "Sessions", "Last modified", "Folder"
    );
    println!("{}", "-".repeat(110));

    for ws in &workspaces {
        let modified = ws
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let folder = if ws.folder.is_empty() { ws.name.as_str() } else { ws.folder.as_str() };
        println!(
            "{:<34} {:<26} {:>8} {:<17} {}",
            super::one_line(&ws.id, 34),
            ws.agent_names().join(","),
            ws.session_count,
            modified,
            folder,
        );
    }

    println!("\n{} workspaces", workspaces.len());
    Ok(())
}
