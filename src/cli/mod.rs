//! Command implementations behind the `gennie` binary

pub mod extract;
pub mod index;
pub mod scan;
pub mod search;
pub mod session;
pub mod workspaces;

/// First line of `text`, cut to `max` chars with an ellipsis
pub(crate) fn one_line(text: &str, max: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
