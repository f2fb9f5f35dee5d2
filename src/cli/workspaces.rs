//! Workspaces command implementation

use anyhow::Result;

use crate::store::TurnStore;

pub fn run(store: &TurnStore) -> Result<()> {
    let workspaces = store.list_workspaces()?;

    if workspaces.is_empty() {
        println!("No workspaces stored. Run 'gennie extract' first.");
        return Ok(());
    }

    println!(
        "{:<34} {:<20} {:<22} {:>8} {:>7} {:>9} {}",
        "ID", "Name", "Agents", "Sessions", "Turns", "Code LOC", "Updated"
    );
    println!("{}", "-".repeat(120));

    for ws in workspaces {
        let info = &ws.info;
        println!(
            "{:<34} {:<20} {:<22} {:>8} {:>7} {:>9} {}",
            super::one_line(&info.workspace_id, 34),
            super::one_line(&info.name, 20),
            info.agents,
            info.session_count,
            info.turn_count,
            info.code_loc,
            ws.updated_at.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}
