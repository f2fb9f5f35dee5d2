//! Claude Code reader
//!
//! Decodes Claude Code CLI sessions.
//! Data format: JSONL files in ~/.claude/projects/<encoded_folder>/<session_id>.jsonl
//! where the folder encoding replaces `:`, `/`, `\` and `.` with `-`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{file_mtime, newest_mtime, parse_timestamp_str, RawSession, SourceReader, WorkspaceSelector};
use crate::aggregate::{aggregate, MergePolicy, Noise, RawMessage, SessionInfo};
use crate::code::replacement_diff;
use crate::dedup::{dedupe_sessions, Fingerprint};
use crate::error::GennieError;
use crate::model::{CodeEdit, Role, WorkspaceSummary};
use crate::text::paths::{folder_name, normalize_path};

const SUBAGENT_TRIGGER: &str = "Create a Task with subagent_type";

const BARE_COMMANDS: &[&str] = &["warmup", "usage", "help", "init", "login", "status"];

const FILE_INPUT_KEYS: &[&str] = &["file_path", "path", "file"];

static SUBAGENT_PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"the prompt "([^"]+)""#).expect("subagent prompt pattern"));

static CONTROL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").expect("control char pattern"));

static CAVEAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Caveat: The messages below were generated by the user while running local commands\. DO NOT respond to these messages or otherwise consider them in your response unless the user explicitly asks you to\.\s*")
        .expect("caveat pattern")
});

static LOCAL_STDOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<local-command-stdout>.*?</local-command-stdout>\s*").expect("local stdout pattern")
});

static WINDOWS_DRIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z])--").expect("drive pattern"));

pub struct ClaudeCodeReader {
    base_path: PathBuf,
}

impl ClaudeCodeReader {
    pub const NAME: &'static str = "claude_code";

    pub fn new(custom_path: Option<PathBuf>) -> Self {
        let base_path = custom_path.unwrap_or_else(|| {
            let home = dirs::home_dir().unwrap_or_default();
            home.join(".claude/projects")
        });
        Self { base_path }
    }

    fn session_files(dir: &Path) -> Vec<PathBuf> {
        let pattern = dir.join("*.jsonl");
        let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .map(|paths| paths.filter_map(|p| p.ok()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    /// Folder recorded in the session's `cwd`, else decoded from the directory name
    fn workspace_folder(dir: &Path, files: &[PathBuf]) -> String {
        for file in files {
            let Ok(content) = std::fs::read_to_string(file) else { continue };
            for line in content.lines() {
                let Ok(json) = serde_json::from_str::<Value>(line) else { continue };
                if let Some(cwd) = json.get("cwd").and_then(|v| v.as_str()) {
                    return normalize_path(cwd);
                }
            }
        }
        let encoded = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        decode_project_dir(encoded)
    }

    fn summarize(&self, dir: &Path) -> Option<WorkspaceSummary> {
        let files = Self::session_files(dir);
        let session_count = files.iter().filter(|f| has_conversation(f)).count();
        if session_count == 0 {
            tracing::debug!("skipping {} - no sessions with content", dir.display());
            return None;
        }
        let workspace_id = dir.file_name()?.to_str()?.to_string();
        let folder = Self::workspace_folder(dir, &files);
        Some(WorkspaceSummary {
            agent: Self::NAME.to_string(),
            workspace_id,
            name: folder_name(&folder),
            folder,
            session_count,
            last_modified: newest_mtime(&files),
        })
    }
}

impl SourceReader for ClaudeCodeReader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Claude Code CLI (Anthropic)"
    }

    fn is_available(&self) -> bool {
        self.base_path.exists()
    }

    fn scan(&self, selector: &WorkspaceSelector) -> Result<Vec<WorkspaceSummary>> {
        let mut workspaces = vec![];

        if !self.base_path.exists() {
            return Ok(workspaces);
        }

        for entry in std::fs::read_dir(&self.base_path)
            .with_context(|| format!("Failed to list {}", self.base_path.display()))?
        {
            let dir = match entry {
                Ok(e) => e.path(),
                Err(_) => continue,
            };
            if !dir.is_dir() {
                continue;
            }
            if let Some(summary) = self.summarize(&dir) {
                if selector.matches(&summary) {
                    workspaces.push(summary);
                }
            }
        }

        workspaces.sort_by(|a, b| a.workspace_id.cmp(&b.workspace_id));
        Ok(workspaces)
    }

    fn extract(&self, workspace_id: &str) -> Result<Vec<RawSession>> {
        let dir = self.base_path.join(workspace_id);
        if !dir.is_dir() {
            return Err(GennieError::SourceUnavailable {
                agent: Self::NAME.to_string(),
                path: dir,
            }
            .into());
        }

        let files = Self::session_files(&dir);
        let folder = Self::workspace_folder(&dir, &files);

        // first pass: parse and fingerprint every session
        let mut loaded = Vec::new();
        for file in &files {
            let session_id = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            let records = match read_records(file) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("skipping session {}: {:#}", session_id, e);
                    continue;
                }
            };
            let fingerprint = fingerprint(&records);
            loaded.push(((session_id, records), fingerprint));
        }

        // second pass: only sessions that are not fragments of a sibling
        let policy = MergePolicy {
            text_separator: "\n",
            latest_assistant_timestamp: false,
        };
        let mut sessions = Vec::new();
        for (session_id, records) in dedupe_sessions(loaded) {
            let messages = classify_session(&records);
            let info = SessionInfo {
                session_name: session_title(&messages).unwrap_or_else(|| session_id.clone()),
                session_id,
                workspace_id: workspace_id.to_string(),
                workspace_name: folder_name(&folder),
                workspace_folder: folder.clone(),
                agent: Self::NAME.to_string(),
            };
            let turns = aggregate(messages, &policy, &info);
            if turns.is_empty() {
                continue;
            }
            sessions.push(RawSession { info, turns });
        }

        Ok(sessions)
    }

    fn latest_activity(&self, workspace_id: &str) -> Option<DateTime<Utc>> {
        let dir = self.base_path.join(workspace_id);
        Self::session_files(&dir).iter().filter_map(|f| file_mtime(f)).max()
    }
}

/// Reverse the folder encoding as far as it can be reversed
fn decode_project_dir(encoded: &str) -> String {
    if let Some(caps) = WINDOWS_DRIVE_RE.captures(encoded) {
        let rest = &encoded[caps[0].len()..];
        return format!("{}:/{}", caps[1].to_ascii_lowercase(), rest.replace('-', "/"));
    }
    encoded.replace('-', "/")
}

fn read_records(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut records = Vec::new();
    let mut last_error = None;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(v) => records.push(v),
            Err(e) => {
                tracing::debug!("{}:{} malformed record: {}", path.display(), i + 1, e);
                last_error = Some(format!("line {}: {}", i + 1, e));
            }
        }
    }
    // a file with lines but no decodable record is not a session
    match last_error {
        Some(reason) if records.is_empty() => Err(GennieError::MalformedRecord {
            context: path.display().to_string(),
            reason,
        }
        .into()),
        _ => Ok(records),
    }
}

fn has_conversation(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    content.lines().any(|line| {
        serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|json| json.get("type").and_then(|v| v.as_str()).map(String::from))
            .is_some_and(|t| t == "user" || t == "assistant")
    })
}

fn record_type(record: &Value) -> &str {
    record.get("type").and_then(|v| v.as_str()).unwrap_or("")
}

/// (timestamp, first text) pairs of the session's user records
fn fingerprint(records: &[Value]) -> Fingerprint {
    let mut fp = Fingerprint::default();
    for record in records.iter().filter(|r| record_type(r) == "user") {
        let ts = record.get("timestamp").and_then(|v| v.as_str()).unwrap_or("");
        let content = record.get("message").and_then(|m| m.get("content"));
        let preview = match content {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Array(blocks)) => blocks
                .iter()
                .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .and_then(|b| b.get("text").and_then(|t| t.as_str()))
                .unwrap_or(""),
            _ => "",
        };
        fp.add(ts, preview);
    }
    fp
}

/// Content decoded from one record's message blocks
#[derive(Default)]
struct Decoded {
    texts: Vec<String>,
    tools: Vec<String>,
    files: Vec<String>,
    edits: Vec<CodeEdit>,
    thinking: String,
    tool_result_only: bool,
}

fn decode_content(content: Option<&Value>, is_user: bool) -> Decoded {
    let mut out = Decoded::default();
    match content {
        Some(Value::String(s)) => out.texts.push(s.clone()),
        Some(Value::Array(blocks)) => {
            let mut has_text = false;
            let mut has_tool_result = false;
            for block in blocks {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("");
                        if !text.trim().is_empty() {
                            out.texts.push(text.to_string());
                            has_text = true;
                        }
                    }
                    Some("thinking") => {
                        let thinking = block.get("thinking").and_then(|t| t.as_str()).unwrap_or("");
                        out.thinking.push_str(thinking);
                        out.thinking.push('\n');
                    }
                    Some("tool_use") => decode_tool_use(block, &mut out),
                    Some("tool_result") => has_tool_result = true,
                    _ => {}
                }
            }
            out.tool_result_only = is_user && has_tool_result && !has_text;
        }
        _ => {}
    }
    out
}

fn decode_tool_use(block: &Value, out: &mut Decoded) {
    let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("");
    if !name.is_empty() {
        out.tools.push(name.to_string());
    }
    let input = block.get("input").cloned().unwrap_or(Value::Null);
    for key in FILE_INPUT_KEYS {
        if let Some(path) = input.get(*key).and_then(|v| v.as_str()) {
            out.files.push(normalize_path(path));
        }
    }

    let Some(file_path) = input.get("file_path").and_then(|v| v.as_str()) else {
        return;
    };
    let file_path = normalize_path(file_path);
    let edit = match name {
        "Write" => {
            let content = input.get("content").and_then(|v| v.as_str()).unwrap_or("");
            CodeEdit::created(&file_path, content).map(|e| e.with_extra("tool", "Write"))
        }
        "Edit" => {
            let old = input.get("old_string").and_then(|v| v.as_str()).unwrap_or("");
            let new = input.get("new_string").and_then(|v| v.as_str()).unwrap_or("");
            CodeEdit::between(&file_path, old, new)
                .map(|e| e.with_diff(replacement_diff(old, new)).with_extra("tool", "Edit"))
        }
        _ => None,
    };
    out.edits.extend(edit);
}

/// Strip control characters, the local-command caveat and captured command output
fn clean_user_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = CONTROL_CHARS_RE.replace_all(text, "");
    let text = CAVEAT_RE.replace_all(&text, "");
    let text = LOCAL_STDOUT_RE.replace_all(&text, "");
    text.trim().to_string()
}

fn subagent_prompt(text: &str) -> String {
    SUBAGENT_PROMPT_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

/// Tracks command and subagent context across a session's records
#[derive(Default)]
struct NoiseClassifier {
    prev_was_command: bool,
    in_subagent: bool,
    subagent_prompt: String,
}

impl NoiseClassifier {
    fn command_kind(text: &str, raw: Option<&Value>) -> Option<Noise> {
        if text.is_empty() && raw.map_or(true, Value::is_null) {
            return None;
        }
        let raw_str = raw.map(|v| v.to_string()).unwrap_or_default();
        if raw_str.contains("<command-name>") {
            return Some(Noise::CommandEcho);
        }
        if text.contains(SUBAGENT_TRIGGER) {
            return Some(Noise::SubagentTrigger);
        }
        let bare = text.trim().to_lowercase();
        if BARE_COMMANDS.contains(&bare.as_str()) {
            return Some(Noise::BareCommand);
        }
        None
    }

    /// Decide whether a decoded record is noise, updating the running context
    fn classify(&mut self, record: &Value, role: Role, text: &str, tool_result_only: bool) -> Option<Noise> {
        let raw = record.get("message").and_then(|m| m.get("content"));

        if let Some(kind) = Self::command_kind(text, raw) {
            if kind == Noise::SubagentTrigger {
                self.subagent_prompt = subagent_prompt(text);
                self.in_subagent = true;
            }
            self.prev_was_command = true;
            return Some(kind);
        }

        if role == Role::User && self.in_subagent && !self.subagent_prompt.is_empty() {
            let head: String = self.subagent_prompt.chars().take(50).collect();
            if text.trim().starts_with(&head) {
                self.prev_was_command = true;
                return Some(Noise::SubagentPrompt);
            }
        }

        match role {
            Role::Assistant => {
                if record.get("isApiErrorMessage").and_then(|v| v.as_bool()) == Some(true) {
                    self.prev_was_command = false;
                    return Some(Noise::ApiError);
                }
                let model = record.get("message").and_then(|m| m.get("model")).and_then(|v| v.as_str());
                if model == Some("<synthetic>") {
                    self.prev_was_command = false;
                    return Some(Noise::Synthetic);
                }
                if self.prev_was_command || self.in_subagent {
                    self.prev_was_command = false;
                    return Some(Noise::CommandReply);
                }
            }
            Role::User => {
                self.prev_was_command = false;
                if !tool_result_only {
                    self.in_subagent = false;
                    self.subagent_prompt.clear();
                }
            }
        }

        tool_result_only.then_some(Noise::ToolResultOnly)
    }
}

/// Decode and classify every chat record of one session, in file order
fn classify_session(records: &[Value]) -> Vec<RawMessage> {
    let mut classifier = NoiseClassifier::default();
    let mut messages = Vec::new();

    for record in records {
        let role = match record_type(record) {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => continue,
        };
        let content = record.get("message").and_then(|m| m.get("content"));
        let decoded = decode_content(content, role == Role::User);
        let text = decoded.texts.join("\n");

        let mut msg = RawMessage::new(role);
        msg.noise = classifier.classify(record, role, &text, decoded.tool_result_only);
        msg.text = match role {
            Role::User => clean_user_text(&text),
            Role::Assistant => text,
        };
        msg.timestamp_ms = record
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp_str);
        msg.tools = decoded.tools;
        msg.files = decoded.files;

        if role == Role::Assistant {
            msg.thinking = decoded.thinking.trim().to_string();
            msg.code_edits = decoded.edits;
            msg.model_id = record
                .get("message")
                .and_then(|m| m.get("model"))
                .and_then(|v| v.as_str())
                .map(String::from);
            msg.request_id = record.get("requestId").and_then(|v| v.as_str()).map(String::from);
        }

        messages.push(msg);
    }
    messages
}

/// First line of the first real user message, used as a session title
fn session_title(messages: &[RawMessage]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.role == Role::User && m.noise.is_none() && !m.text.trim().is_empty())
        .map(|m| truncate_title(&m.text))
}

/// Truncate a string to make a reasonable title (first 100 chars, first line)
fn truncate_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    if first_line.chars().count() > 100 {
        format!("{}...", first_line.chars().take(97).collect::<String>())
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_session(dir: &Path, name: &str, records: &[Value]) {
        let mut file = std::fs::File::create(dir.join(format!("{}.jsonl", name))).unwrap();
        for r in records {
            writeln!(file, "{}", r).unwrap();
        }
    }

    fn user(ts: &str, text: &str) -> Value {
        json!({"type": "user", "timestamp": ts, "cwd": "/home/dev/proj",
               "message": {"role": "user", "content": text}})
    }

    fn assistant(ts: &str, blocks: Value) -> Value {
        json!({"type": "assistant", "timestamp": ts, "requestId": "req-1",
               "message": {"role": "assistant", "model": "claude-sonnet-4-20250514", "content": blocks}})
    }

    fn fixture() -> (tempfile::TempDir, ClaudeCodeReader) {
        let root = tempfile::tempdir().unwrap();
        let reader = ClaudeCodeReader::new(Some(root.path().to_path_buf()));
        (root, reader)
    }

    #[test]
    fn test_scan_lists_workspaces_with_conversation() {
        let (root, reader) = fixture();
        let ws = root.path().join("-home-dev-proj");
        std::fs::create_dir(&ws).unwrap();
        write_session(&ws, "s1", &[user("2024-05-01T10:00:00Z", "hello")]);
        let empty = root.path().join("-home-dev-empty");
        std::fs::create_dir(&empty).unwrap();
        write_session(&empty, "s2", &[json!({"type": "file-history-snapshot"})]);

        let found = reader.scan(&WorkspaceSelector::All).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workspace_id, "-home-dev-proj");
        assert_eq!(found[0].folder, "/home/dev/proj");
        assert_eq!(found[0].name, "proj");
        assert_eq!(found[0].session_count, 1);
    }

    #[test]
    fn test_extract_filters_noise_and_builds_turns() {
        let (root, reader) = fixture();
        let ws = root.path().join("-home-dev-proj");
        std::fs::create_dir(&ws).unwrap();
        write_session(
            &ws,
            "s1",
            &[
                json!({"type": "summary", "summary": "x"}),
                user("2024-05-01T10:00:00Z", "<command-name>/clear</command-name>"),
                assistant("2024-05-01T10:00:01Z", json!([{"type": "text", "text": "cleared"}])),
                user("2024-05-01T10:00:02Z", "Caveat: The messages below were generated by the user while running local commands. DO NOT respond to these messages or otherwise consider them in your response unless the user explicitly asks you to.\nrun the tests"),
                assistant("2024-05-01T10:00:03Z", json!([
                    {"type": "thinking", "thinking": "plan"},
                    {"type": "tool_use", "name": "Edit", "input": {"file_path": "/home/dev/proj/a.py", "old_string": "x = 1", "new_string": "x = 2"}}
                ])),
                json!({"type": "user", "timestamp": "2024-05-01T10:00:04Z",
                       "message": {"role": "user", "content": [{"type": "tool_result", "content": "ok"}]}}),
                assistant("2024-05-01T10:00:05Z", json!([{"type": "text", "text": "Tests pass."}])),
                json!({"type": "assistant", "timestamp": "2024-05-01T10:00:06Z", "isApiErrorMessage": true,
                       "message": {"model": "<synthetic>", "content": [{"type": "text", "text": "API Error"}]}}),
                user("2024-05-01T10:00:07Z", "warmup"),
            ],
        );

        let sessions = reader.extract("-home-dev-proj").unwrap();
        assert_eq!(sessions.len(), 1);
        let turns = &sessions[0].turns;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].original_text, "run the tests");
        assert_eq!(turns[1].original_text, "Tests pass.");
        assert_eq!(turns[1].tools, vec!["Edit"]);
        assert_eq!(turns[1].files, vec!["/home/dev/proj/a.py"]);
        assert_eq!(turns[1].code_edits.len(), 1);
        assert_eq!(turns[1].code_edits[0].diff.as_deref(), Some("--- old\n+++ new\n@@ @@\n-x = 1\n+x = 2\n"));
        assert_eq!(turns[1].thinking_text, "plan");
        assert_eq!(turns[1].request_id.as_deref(), Some("req-1"));
        assert_eq!(turns[1].timestamp_ms, Some(1_714_557_603_000));
        assert_eq!(sessions[0].info.session_name, "run the tests");
    }

    #[test]
    fn test_subset_session_is_dropped() {
        let (root, reader) = fixture();
        let ws = root.path().join("-home-dev-proj");
        std::fs::create_dir(&ws).unwrap();
        write_session(&ws, "a", &[user("t1", "hello"), assistant("t1", json!([{"type": "text", "text": "hi"}]))]);
        write_session(
            &ws,
            "b",
            &[
                user("t1", "hello"),
                assistant("t1", json!([{"type": "text", "text": "hi"}])),
                user("t2", "fix bug"),
                assistant("t2", json!([{"type": "text", "text": "fixed"}])),
            ],
        );

        let sessions = reader.extract("-home-dev-proj").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].info.session_id, "b");
        assert_eq!(sessions[0].turns.len(), 4);
    }

    #[test]
    fn test_subagent_trigger_and_prompt_filtered() {
        let records = vec![
            user("t1", "Create a Task with subagent_type explorer and the prompt \"map the repo\""),
            user("t2", "map the repo and list modules"),
            assistant("t3", json!([{"type": "tool_use", "name": "Task", "input": {}}])),
            user("t4", "thanks, now summarize"),
            assistant("t5", json!([{"type": "text", "text": "summary"}])),
        ];
        let messages = classify_session(&records);
        let kept: Vec<_> = messages.iter().filter(|m| m.noise.is_none()).map(|m| m.text.as_str()).collect();
        assert_eq!(kept, vec!["thanks, now summarize", "summary"]);
        assert_eq!(messages[0].noise, Some(Noise::SubagentTrigger));
        assert_eq!(messages[1].noise, Some(Noise::SubagentPrompt));
        assert_eq!(messages[2].noise, Some(Noise::CommandReply));
    }

    #[test]
    fn test_decode_project_dir() {
        assert_eq!(decode_project_dir("C--code-app"), "c:/code/app");
        assert_eq!(decode_project_dir("-home-dev-proj"), "/home/dev/proj");
    }

    #[test]
    fn test_missing_workspace_is_unavailable() {
        let (_root, reader) = fixture();
        let err = reader.extract("nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GennieError>(),
            Some(GennieError::SourceUnavailable { agent, .. }) if agent == "claude_code"
        ));
    }

    #[test]
    fn test_undecodable_session_is_skipped() {
        let (root, reader) = fixture();
        let ws = root.path().join("-home-dev-proj");
        std::fs::create_dir(&ws).unwrap();
        std::fs::write(ws.join("broken.jsonl"), "{not json\n").unwrap();
        write_session(
            &ws,
            "good",
            &[user("2024-05-01T10:00:00Z", "hello"), assistant("2024-05-01T10:00:01Z", json!([{"type": "text", "text": "hi"}]))],
        );

        let err = read_records(&ws.join("broken.jsonl")).unwrap_err();
        assert!(matches!(err.downcast_ref::<GennieError>(), Some(GennieError::MalformedRecord { .. })));

        let sessions = reader.extract("-home-dev-proj").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].info.session_id, "good");
    }
}
