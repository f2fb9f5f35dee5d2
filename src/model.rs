//! Canonical turn records shared by readers, enrichment and storage

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Static code metrics for one version of a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub nloc: i64,
    pub average_cyclomatic_complexity: f64,
    pub token_count: i64,
    pub max_cyclomatic_complexity: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub nloc: i64,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub cyclomatic_complexity: f64,
    pub token_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EditMetrics {
    pub before: CodeMetrics,
    pub after: CodeMetrics,
    pub delta: MetricDelta,
}

/// One file change produced by an assistant turn.
///
/// Built through [`CodeEdit::between`] or [`CodeEdit::created`], both of which
/// refuse no-op edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEdit {
    pub file_path: String,
    pub language: String,
    pub code_before: Option<String>,
    pub code_after: Option<String>,
    pub diff: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub metrics: Option<EditMetrics>,
}

impl CodeEdit {
    /// Edit from a before and after state. `None` when both are identical.
    pub fn between(file_path: &str, before: &str, after: &str) -> Option<CodeEdit> {
        if before == after {
            return None;
        }
        Some(CodeEdit {
            file_path: file_path.to_string(),
            language: language_of(file_path),
            code_before: Some(before.to_string()),
            code_after: Some(after.to_string()),
            diff: None,
            extra: Map::new(),
            metrics: None,
        })
    }

    /// Edit where only the resulting content is known. `None` for empty content.
    pub fn created(file_path: &str, after: &str) -> Option<CodeEdit> {
        if after.is_empty() {
            return None;
        }
        Some(CodeEdit {
            file_path: file_path.to_string(),
            language: language_of(file_path),
            code_before: None,
            code_after: Some(after.to_string()),
            diff: None,
            extra: Map::new(),
            metrics: None,
        })
    }

    pub fn with_diff(mut self, diff: String) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// True when the edit actually changes something
    pub fn is_material(&self) -> bool {
        match (&self.code_before, &self.code_after) {
            (Some(b), Some(a)) => b != a,
            (None, Some(a)) | (Some(a), None) => !a.is_empty(),
            (None, None) => false,
        }
    }
}

/// File extension without the dot, the way edit records tag languages
fn language_of(file_path: &str) -> String {
    std::path::Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Canonical conversation unit as produced by a reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: String,
    pub turn: u32,
    pub role: Role,
    pub original_text: String,
    pub timestamp_ms: Option<i64>,

    pub workspace_id: String,
    pub workspace_name: String,
    pub workspace_folder: String,
    pub session_name: String,
    pub agent: String,

    pub files: Vec<String>,
    pub tools: Vec<String>,
    pub code_edits: Vec<CodeEdit>,

    pub thinking_text: String,
    pub thinking_duration_ms: Option<i64>,

    pub model_id: Option<String>,
    pub request_id: Option<String>,
    pub merged_request_ids: Vec<String>,

    /// Latency recorded by the source itself, preferred over timestamp arithmetic
    pub source_response_ms: Option<i64>,
}

impl Turn {
    pub fn timestamp_iso(&self) -> Option<String> {
        self.timestamp_ms.and_then(ms_to_iso)
    }
}

pub fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub fn ms_to_iso(ms: i64) -> Option<String> {
    ms_to_datetime(ms).map(|dt| dt.to_rfc3339())
}

/// Token estimates attached to an enriched turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub original: i64,
    pub cleaned: i64,
    pub code: i64,
    pub tool: i64,
    pub system: i64,
    pub thinking: i64,
    pub session_history: i64,
}

impl TokenCounts {
    pub fn total(&self) -> i64 {
        self.original + self.code + self.tool + self.system
    }
}

/// Per-turn code change aggregates. `None` where the total is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeTotals {
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
    pub nloc_change: Option<i64>,
    pub weighted_complexity_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTurn {
    pub base: Turn,
    pub cleaned_text: String,
    pub tokens: TokenCounts,
    pub languages: Vec<String>,
    pub primary_language: Option<String>,
    pub responding_to_turn: Option<u32>,
    pub response_time_ms: Option<i64>,
    pub totals: ChangeTotals,
}

/// Cheap metadata about one agent's view of a workspace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceSummary {
    pub agent: String,
    pub workspace_id: String,
    pub name: String,
    pub folder: String,
    pub session_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A project folder merged across every agent that worked in it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceRecord {
    pub id: String,
    pub name: String,
    pub folder: String,
    /// agent name -> that agent's own workspace id
    pub agents: BTreeMap<String, String>,
    pub session_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

impl WorkspaceRecord {
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}
