//! Source reader trait and registry
//!
//! One reader per assistant application. Each decodes its own on-disk format
//! into [`RawSession`]s of canonical turns by way of the shared aggregator.
//!
//! Reader status:
//! - claude_code: JSONL logs under ~/.claude/projects
//! - copilot: VS Code chatSessions JSON plus state.vscdb and editing-session snapshots
//! - cursor: state.vscdb composer/bubble records (two schema generations)

mod claude_code;
mod copilot;
mod cursor;
mod vscdb;

pub use claude_code::ClaudeCodeReader;
pub use copilot::CopilotReader;
pub use cursor::CursorReader;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::aggregate::SessionInfo;
use crate::model::{Turn, WorkspaceSummary};
use crate::text::paths::folder_key;
use crate::Config;

/// Which workspaces a scan should report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WorkspaceSelector {
    #[default]
    All,
    /// Exact agent-native workspace id
    Id(String),
    /// Any workspace rooted at this folder
    Folder(String),
}

impl WorkspaceSelector {
    pub fn matches(&self, summary: &WorkspaceSummary) -> bool {
        match self {
            WorkspaceSelector::All => true,
            WorkspaceSelector::Id(id) => summary.workspace_id == *id,
            WorkspaceSelector::Folder(folder) => {
                !summary.folder.is_empty() && folder_key(&summary.folder) == folder_key(folder)
            }
        }
    }
}

/// One extracted session: identity plus its aggregated turns
#[derive(Debug, Clone, PartialEq)]
pub struct RawSession {
    pub info: SessionInfo,
    pub turns: Vec<Turn>,
}

/// Source reader trait
pub trait SourceReader: Send + Sync {
    /// Agent tag stamped onto every turn ("claude_code", "copilot", "cursor")
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Check if this reader's storage root exists
    fn is_available(&self) -> bool;

    /// Cheap, metadata-only listing of workspaces
    fn scan(&self, selector: &WorkspaceSelector) -> Result<Vec<WorkspaceSummary>>;

    /// Decode every session of one workspace
    fn extract(&self, workspace_id: &str) -> Result<Vec<RawSession>>;

    /// Most recent modification inside the workspace, if known
    fn latest_activity(&self, _workspace_id: &str) -> Option<DateTime<Utc>> {
        None
    }

    /// Release anything held between calls
    fn cleanup(&self) {}
}

/// Registry of configured readers
pub struct ReaderRegistry {
    readers: Vec<Box<dyn SourceReader>>,
}

impl ReaderRegistry {
    pub fn new(config: &Config) -> Self {
        let mut registry = Self::empty();

        if config.is_agent_enabled(ClaudeCodeReader::NAME) {
            registry.register(Box::new(ClaudeCodeReader::new(config.agent_path(ClaudeCodeReader::NAME))));
        }

        if config.is_agent_enabled(CopilotReader::NAME) {
            registry.register(Box::new(CopilotReader::new(config.agent_path(CopilotReader::NAME))));
        }

        if config.is_agent_enabled(CursorReader::NAME) {
            registry.register(Box::new(CursorReader::new(config.agent_path(CursorReader::NAME))));
        }

        registry
    }

    pub fn empty() -> Self {
        Self { readers: vec![] }
    }

    pub fn register(&mut self, reader: Box<dyn SourceReader>) {
        self.readers.push(reader);
    }

    pub fn available_readers(&self) -> Vec<&dyn SourceReader> {
        self.readers
            .iter()
            .filter(|r| r.is_available())
            .map(|r| r.as_ref())
            .collect()
    }

    pub fn all_readers(&self) -> Vec<&dyn SourceReader> {
        self.readers.iter().map(|r| r.as_ref()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn SourceReader> {
        self.readers
            .iter()
            .find(|r| r.name() == name)
            .map(|r| r.as_ref())
    }
}

// ============================================
// SHARED DECODING HELPERS
// ============================================

/// Earliest plausible timestamp (2020-01-01T00:00:00Z); older values are clock garbage
pub(crate) const MIN_VALID_TIMESTAMP_MS: i64 = 1_577_836_800_000;

/// Epoch milliseconds from a JSON number, digit string or ISO-8601 string
pub(crate) fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub(crate) fn parse_timestamp_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    // naive ISO without offset is taken as UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

pub(crate) fn file_mtime_ms(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).timestamp_millis())
}

pub(crate) fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Newest mtime among `paths`
pub(crate) fn newest_mtime<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Option<DateTime<Utc>> {
    paths.into_iter().filter_map(|p| file_mtime(p)).max()
}

/// `<config dir>/<app>/User`, where VS Code derivatives keep their storage
pub(crate) fn editor_user_dir(app: &str) -> PathBuf {
    dirs::config_dir().unwrap_or_default().join(app).join("User")
}
