//! Session command implementation

use anyhow::Result;

use crate::store::TurnStore;

pub fn run(store: &TurnStore, session_id: &str, full: bool) -> Result<()> {
    let turns = store.session_turns(session_id)?;

    let Some(first) = turns.first() else {
        println!("Session not found: {}", session_id);
        return Ok(());
    };

    println!("Session:   {}", first.session_id);
    if let Some(name) = first.session_name.as_deref().filter(|n| !n.is_empty()) {
        println!("Title:     {}", name);
    }
    println!(
        "Workspace: {} ({})",
        first.workspace_name.as_deref().unwrap_or("-"),
        first.workspace_id.as_deref().unwrap_or("-")
    );
    println!("Agent:     {}", first.agent.as_deref().unwrap_or("-"));
    println!("Turns:     {}\n", turns.len());

    for turn in &turns {
        let ts = turn.timestamp_iso.as_deref().unwrap_or("-");
        let mut header = format!("#{} [{}] {}", turn.turn, turn.role, ts);
        if let Some(model) = &turn.model_id {
            header.push_str(&format!(" {}", model));
        }
        if let Some(ms) = turn.response_time_ms {
            header.push_str(&format!(" ({} ms)", ms));
        }
        if turn.lines_added.is_some() || turn.lines_removed.is_some() {
            header.push_str(&format!(
                " +{}/-{}",
                turn.lines_added.unwrap_or(0),
                turn.lines_removed.unwrap_or(0)
            ));
        }
        println!("{}", header);

        if full {
            println!("{}\n", turn.original_text);
        } else {
            println!("  {}\n", super::one_line(&turn.text, 100));
        }
    }

    Ok(())
}
