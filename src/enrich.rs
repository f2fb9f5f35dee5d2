//! Turn enrichment: cleaned text, token estimates, languages, code-change
//! metrics and response latency.
//!
//! Everything here is a pure function of the input turns and the run context.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use std::sync::LazyLock;

use crate::code::{count_diff_lines, detect_languages, language_for_path, ComplexityAnalyzer};
use crate::context::RunContext;
use crate::model::{ChangeTotals, CodeEdit, CodeMetrics, EditMetrics, EnrichedTurn, MetricDelta, Role, TokenCounts, Turn};
use crate::text::estimate_tokens;

const MODEL_ALIASES: &[(&str, &str)] = &[
    ("gpt4", "gpt-4"),
    ("gpt-4-turbo", "gpt-4-turbo"),
    ("gpt-4-turbo-preview", "gpt-4-turbo"),
    ("gpt-4o-mini", "gpt-4o-mini"),
    ("gpt-4o", "gpt-4o"),
    ("gpt-4.5-preview", "gpt-4.5"),
    ("gpt-4.1", "gpt-4.1"),
    ("gpt-5", "gpt-5"),
    ("gpt-3.5-turbo", "gpt-3.5-turbo"),
    ("gpt35", "gpt-3.5-turbo"),
    ("claude-3-opus", "claude-3-opus"),
    ("claude-3-sonnet", "claude-3-sonnet"),
    ("claude-3-haiku", "claude-3-haiku"),
    ("claude-3.5-sonnet", "claude-3.5-sonnet"),
    ("claude-3.5-haiku", "claude-3.5-haiku"),
    ("claude-3.7-sonnet", "claude-3.7-sonnet"),
    ("claude-sonnet-4", "claude-sonnet-4"),
    ("claude-sonnet-4.5", "claude-sonnet-4.5"),
    ("claude-opus-4", "claude-opus-4"),
    ("o1-preview", "o1-preview"),
    ("o1-mini", "o1-mini"),
    ("o1", "o1"),
    ("o3", "o3"),
    ("o3-mini", "o3-mini"),
];

static DATE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d{6,}.*$").expect("date suffix pattern"));

fn alias(id: &str) -> Option<&'static str> {
    MODEL_ALIASES.iter().find(|(raw, _)| *raw == id).map(|(_, canonical)| *canonical)
}

/// Map a raw model id onto a known canonical name. Unknown ids come back unchanged.
pub fn normalize_model_id(model_id: &str) -> String {
    let lowered = model_id.trim().to_lowercase();
    if let Some(canonical) = alias(&lowered) {
        return canonical.to_string();
    }
    let base = DATE_SUFFIX_RE.replace(&lowered, "");
    let base = base.strip_suffix("-preview").unwrap_or(&base);
    let base = base.strip_suffix("-latest").unwrap_or(base);
    match alias(base) {
        Some(canonical) => canonical.to_string(),
        None => model_id.to_string(),
    }
}

/// Attach before/after/delta metrics to an edit, once
pub fn enrich_edit(mut edit: CodeEdit, analyzer: &dyn ComplexityAnalyzer) -> CodeEdit {
    if edit.metrics.is_some() {
        return edit;
    }
    let before_text = edit.code_before.as_deref().unwrap_or("");
    let after_text = edit.code_after.as_deref().unwrap_or("");
    let filename = if edit.file_path.is_empty() {
        format!("code.{}", edit.language)
    } else {
        edit.file_path.clone()
    };

    let measure = |text: &str| {
        if text.is_empty() {
            CodeMetrics::default()
        } else {
            analyzer.analyze(text, &filename)
        }
    };
    let before = measure(before_text);
    let after = measure(after_text);
    let (lines_added, lines_removed) = count_diff_lines(before_text, after_text);

    let metrics = EditMetrics {
        before,
        after,
        delta: MetricDelta {
            nloc: after.nloc - before.nloc,
            lines_added,
            lines_removed,
            cyclomatic_complexity: after.average_cyclomatic_complexity - before.average_cyclomatic_complexity,
            token_count: after.token_count - before.token_count,
        },
    };
    for (key, value) in [
        ("before_metrics", serde_json::to_value(metrics.before)),
        ("after_metrics", serde_json::to_value(metrics.after)),
        ("delta_metrics", serde_json::to_value(metrics.delta)),
    ] {
        if let Ok(value) = value {
            edit.extra.insert(key.to_string(), value);
        }
    }
    edit.metrics = Some(metrics);
    edit
}

/// Languages from touched files, else from the edits' paths and language tags
fn turn_languages(files: &[String], edits: &[CodeEdit]) -> Vec<String> {
    let languages = detect_languages(files.iter().map(String::as_str));
    if !languages.is_empty() || edits.is_empty() {
        return languages;
    }
    let mut languages = detect_languages(edits.iter().map(|e| e.file_path.as_str()).filter(|p| !p.is_empty()));
    for edit in edits {
        let tag = edit.language.to_lowercase();
        if matches!(tag.as_str(), "" | "unknown" | "text") {
            continue;
        }
        let name = language_for_path(&format!("x.{}", tag)).map_or(tag.clone(), str::to_string);
        if !languages.contains(&name) {
            languages.push(name);
        }
    }
    languages
}

/// Sum added/removed/NLOC across edits and keep the signed complexity delta
/// of largest magnitude. Files become the sorted set of edited paths.
fn change_totals(turn: &mut Turn) -> ChangeTotals {
    if turn.code_edits.is_empty() {
        return ChangeTotals::default();
    }
    let mut added = 0;
    let mut removed = 0;
    let mut nloc = 0;
    let mut worst = 0.0f64;
    let mut edited: BTreeSet<String> = BTreeSet::new();

    for edit in &turn.code_edits {
        if !edit.file_path.is_empty() {
            edited.insert(edit.file_path.clone());
        }
        let Some(metrics) = edit.metrics else { continue };
        added += metrics.delta.lines_added;
        removed += metrics.delta.lines_removed;
        nloc += metrics.delta.nloc;
        if metrics.delta.cyclomatic_complexity.abs() > worst.abs() {
            worst = metrics.delta.cyclomatic_complexity;
        }
    }

    if !edited.is_empty() {
        turn.files = edited.into_iter().collect();
    }
    ChangeTotals {
        lines_added: (added > 0).then_some(added),
        lines_removed: (removed > 0).then_some(removed),
        nloc_change: (nloc != 0).then_some(nloc),
        weighted_complexity_change: (worst != 0.0).then_some(worst),
    }
}

pub fn enrich_turn(mut turn: Turn, ctx: &RunContext) -> EnrichedTurn {
    let edits = std::mem::take(&mut turn.code_edits);
    turn.code_edits = edits
        .into_iter()
        .map(|e| enrich_edit(e, ctx.complexity.as_ref()))
        .collect();

    let languages = turn_languages(&turn.files, &turn.code_edits);
    let primary_language = languages.first().cloned();

    let cleaned_text = if turn.original_text.is_empty() {
        String::new()
    } else {
        ctx.cleaner.clean(&turn.original_text)
    };

    turn.model_id = turn.model_id.as_deref().map(normalize_model_id);

    let tokens = TokenCounts {
        original: estimate_tokens(&turn.original_text),
        cleaned: estimate_tokens(&cleaned_text),
        code: turn
            .code_edits
            .iter()
            .filter_map(|e| e.code_after.as_deref())
            .map(estimate_tokens)
            .sum(),
        tool: turn.tools.iter().map(|t| estimate_tokens(t)).sum(),
        system: 0,
        thinking: estimate_tokens(&turn.thinking_text),
        session_history: 0,
    };

    let totals = change_totals(&mut turn);

    EnrichedTurn {
        base: turn,
        cleaned_text,
        tokens,
        languages,
        primary_language,
        responding_to_turn: None,
        response_time_ms: None,
        totals,
    }
}

/// Indices of `turns` grouped by session, each group ordered by turn index
fn by_session(turns: &[EnrichedTurn]) -> BTreeMap<&str, Vec<usize>> {
    let mut sessions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, t) in turns.iter().enumerate() {
        if t.base.session_id.is_empty() {
            continue;
        }
        sessions.entry(t.base.session_id.as_str()).or_default().push(i);
    }
    for indices in sessions.values_mut() {
        indices.sort_by_key(|&i| turns[i].base.turn);
    }
    sessions
}

/// Pair each assistant turn with the latest preceding user turn in its session
pub fn apply_response_times(turns: &mut [EnrichedTurn]) {
    let groups: Vec<Vec<usize>> = by_session(turns).into_values().collect();
    for indices in groups {
        let mut last_user: Option<(u32, Option<i64>)> = None;
        for i in indices {
            let turn = &mut turns[i];
            match turn.base.role {
                Role::User => {
                    last_user = Some((turn.base.turn, turn.base.timestamp_ms));
                    turn.responding_to_turn = None;
                    turn.response_time_ms = None;
                }
                Role::Assistant => {
                    let recorded = turn.base.source_response_ms.filter(|ms| *ms != 0);
                    match last_user {
                        Some((user_turn, user_ts)) => {
                            turn.responding_to_turn = Some(user_turn);
                            turn.response_time_ms = match recorded {
                                Some(ms) => Some(ms),
                                None => match (user_ts, turn.base.timestamp_ms) {
                                    (Some(u), Some(a)) => Some(a - u),
                                    _ => None,
                                },
                            }
                            .filter(|ms| *ms >= 0);
                        }
                        None => {
                            turn.responding_to_turn = None;
                            turn.response_time_ms = recorded.filter(|ms| *ms >= 0);
                        }
                    }
                }
            }
        }
    }
}

/// Running total of prior turns' token totals within each session
pub fn apply_session_history(turns: &mut [EnrichedTurn]) {
    let groups: Vec<Vec<usize>> = by_session(turns).into_values().collect();
    for indices in groups {
        let mut running = 0;
        for i in indices {
            turns[i].tokens.session_history = running;
            running += turns[i].tokens.total();
        }
    }
}

pub fn enrich_turns(turns: Vec<Turn>, ctx: &RunContext) -> Vec<EnrichedTurn> {
    if turns.is_empty() {
        return Vec::new();
    }
    tracing::debug!("enriching {} turns", turns.len());
    let mut enriched: Vec<EnrichedTurn> = turns.into_iter().map(|t| enrich_turn(t, ctx)).collect();
    apply_response_times(&mut enriched);
    apply_session_history(&mut enriched);

    let edits: usize = enriched.iter().map(|t| t.base.code_edits.len()).sum();
    if edits > 0 {
        tracing::debug!("enriched {} code edits with metrics", edits);
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(session: &str, index: u32, role: Role, text: &str, ts: Option<i64>) -> Turn {
        Turn {
            session_id: session.into(),
            turn: index,
            role,
            original_text: text.into(),
            timestamp_ms: ts,
            workspace_id: "ws".into(),
            workspace_name: "ws".into(),
            workspace_folder: "/ws".into(),
            session_name: session.into(),
            agent: "claude_code".into(),
            files: vec![],
            tools: vec![],
            code_edits: vec![],
            thinking_text: String::new(),
            thinking_duration_ms: None,
            model_id: None,
            request_id: None,
            merged_request_ids: vec![],
            source_response_ms: None,
        }
    }

    #[test]
    fn test_normalize_model_id() {
        assert_eq!(normalize_model_id("GPT-4-Turbo-Preview"), "gpt-4-turbo");
        assert_eq!(normalize_model_id("claude-3.5-sonnet-20241022"), "claude-3.5-sonnet");
        assert_eq!(normalize_model_id("gpt-4o-latest"), "gpt-4o");
        assert_eq!(normalize_model_id("Some-Custom-Model"), "Some-Custom-Model");
    }

    #[test]
    fn test_response_times() {
        let mut a1 = turn("s", 1, Role::Assistant, "a", Some(1_500));
        a1.source_response_ms = None;
        let mut a3 = turn("s", 3, Role::Assistant, "b", Some(2_000));
        a3.source_response_ms = Some(750);
        let turns = vec![
            turn("s", 0, Role::User, "q", Some(1_000)),
            a1,
            turn("s", 2, Role::User, "q2", Some(3_000)),
            a3,
        ];
        let enriched = enrich_turns(turns, &RunContext::default());
        assert_eq!(enriched[1].responding_to_turn, Some(0));
        assert_eq!(enriched[1].response_time_ms, Some(500));
        assert_eq!(enriched[3].responding_to_turn, Some(2));
        assert_eq!(enriched[3].response_time_ms, Some(750));
    }

    #[test]
    fn test_negative_latency_discarded() {
        let turns = vec![
            turn("s", 0, Role::User, "q", Some(5_000)),
            turn("s", 1, Role::Assistant, "a", Some(4_000)),
        ];
        let enriched = enrich_turns(turns, &RunContext::default());
        assert_eq!(enriched[1].responding_to_turn, Some(0));
        assert_eq!(enriched[1].response_time_ms, None);
    }

    #[test]
    fn test_session_history_is_running_total_per_session() {
        let turns = vec![
            turn("s", 0, Role::User, "12345678", None),
            turn("other", 0, Role::User, "1234", None),
            turn("s", 1, Role::Assistant, "1234", None),
            turn("s", 2, Role::User, "x", None),
        ];
        let enriched = enrich_turns(turns, &RunContext::default());
        assert_eq!(enriched[0].tokens.session_history, 0);
        assert_eq!(enriched[1].tokens.session_history, 0);
        assert_eq!(enriched[2].tokens.session_history, 2);
        assert_eq!(enriched[3].tokens.session_history, 3);
    }

    #[test]
    fn test_edit_metrics_and_totals() {
        let mut t = turn("s", 1, Role::Assistant, "edited", None);
        t.files = vec!["notes.txt".into()];
        t.tools = vec!["Edit".into()];
        t.code_edits = vec![
            CodeEdit::between("/p/b.py", "def f():\n    return 1\n", "def f(x):\n    if x:\n        return 1\n    return 2\n")
                .unwrap(),
            CodeEdit::created("/p/a.py", "x = 1\n").unwrap(),
        ];
        let e = enrich_turn(t, &RunContext::default());

        assert_eq!(e.base.files, vec!["/p/a.py", "/p/b.py"]);
        assert_eq!(e.totals.lines_added, Some(5));
        assert_eq!(e.totals.lines_removed, Some(2));
        assert_eq!(e.totals.nloc_change, Some(3));
        assert_eq!(e.totals.weighted_complexity_change, Some(1.0));
        assert_eq!(e.tokens.tool, 1);
        assert!(e.tokens.code > 0);
        assert!(e.base.code_edits[0].extra.contains_key("delta_metrics"));
        // languages come from the turn's files before they are replaced
        assert!(e.languages.is_empty());
    }

    #[test]
    fn test_languages_fall_back_to_edits() {
        let mut t = turn("s", 1, Role::Assistant, "edited", None);
        t.code_edits = vec![CodeEdit::created("/p/lib.rs", "fn a() {}\n").unwrap()];
        let e = enrich_turn(t, &RunContext::default());
        assert_eq!(e.languages, vec!["rust"]);
        assert_eq!(e.primary_language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_empty_edit_side_has_zero_metrics() {
        let edit = enrich_edit(CodeEdit::created("/p/a.py", "def f():\n    pass\n").unwrap(), &crate::code::HeuristicComplexity);
        let metrics = edit.metrics.unwrap();
        assert_eq!(metrics.before, CodeMetrics::default());
        assert_eq!(metrics.delta.lines_added, 2);
        assert_eq!(metrics.delta.lines_removed, 0);
    }
}
