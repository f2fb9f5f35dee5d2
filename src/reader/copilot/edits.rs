//! Editing-session timelines recorded under `chatEditingSessions/<session>/`
//!
//! `state.json` is decoded into an [`EditHistory`]; file text lives in the
//! sibling `contents/` directory, addressed by hash.

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::reconstruct::{reconstruct, AttributedEdit, Baseline, ContentDir, EditHistory, LinearEntry, SnapshotEntry};

static TELEMETRY_REQUEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"requestId=([^;}\s]+)").expect("telemetry pattern"));

/// Reconstructed edits of one editing session; empty when there is no state file
pub fn session_edits(session_dir: &Path) -> Result<Vec<AttributedEdit>> {
    let state_path = session_dir.join("state.json");
    if !state_path.exists() {
        return Ok(vec![]);
    }
    let content = std::fs::read_to_string(&state_path)
        .with_context(|| format!("Failed to read {}", state_path.display()))?;
    let state: Value = serde_json::from_str(&content)
        .with_context(|| format!("Malformed editing state {}", state_path.display()))?;

    let history = parse_history(&state);
    Ok(reconstruct(&history, &ContentDir::new(session_dir.join("contents"))))
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// `telemetryInfo` is either an object or a `@{requestId=...; agentId=...}` string
fn telemetry_request_id(info: Option<&Value>) -> String {
    match info {
        Some(Value::Object(map)) => map
            .get("requestId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        Some(Value::String(s)) => TELEMETRY_REQUEST_RE
            .captures(s)
            .map(|c| c[1].to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

pub fn parse_history(state: &Value) -> EditHistory {
    // uri -> initial content token
    let mut initial: HashMap<&str, &str> = HashMap::new();
    for pair in state
        .get("initialFileContents")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        if let (Some(uri), Some(token)) = (
            pair.get(0).and_then(|v| v.as_str()),
            pair.get(1).and_then(|v| v.as_str()),
        ) {
            initial.insert(uri, token);
        }
    }

    let mut baselines = Vec::new();
    for pair in state
        .pointer("/timeline/fileBaselines")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        let (Some(key), Some(info)) = (pair.get(0).and_then(|v| v.as_str()), pair.get(1)) else {
            continue;
        };
        // key is "<uri>::<requestId>"
        let Some((uri, _)) = key.rsplit_once("::") else { continue };
        if !info.is_object() {
            continue;
        }
        baselines.push(Baseline {
            uri: uri.to_string(),
            request_id: str_field(info, "requestId").to_string(),
            epoch: info.get("epoch").and_then(|v| v.as_i64()).unwrap_or(0),
            content: str_field(info, "content").to_string(),
        });
    }

    let snapshot = state
        .pointer("/recentSnapshot/entries")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter(|e| e.is_object())
        .map(|entry| {
            let uri = str_field(entry, "resource");
            SnapshotEntry {
                uri: uri.to_string(),
                initial: initial.get(uri).copied().unwrap_or("").to_string(),
                current: str_field(entry, "currentHash").to_string(),
                request_id: telemetry_request_id(entry.get("telemetryInfo")),
            }
        })
        .collect();

    let mut linear = Vec::new();
    for item in state
        .get("linearHistory")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        let request_id = str_field(item, "requestId");
        for stop in item.get("stops").and_then(|v| v.as_array()).into_iter().flatten() {
            for entry in stop.get("entries").and_then(|v| v.as_array()).into_iter().flatten() {
                if !entry.is_object() {
                    continue;
                }
                linear.push(LinearEntry {
                    uri: str_field(entry, "resource").to_string(),
                    request_id: request_id.to_string(),
                    original: str_field(entry, "originalHash").to_string(),
                    current: str_field(entry, "currentHash").to_string(),
                });
            }
        }
    }

    EditHistory {
        baselines,
        snapshot,
        linear,
    }
}
