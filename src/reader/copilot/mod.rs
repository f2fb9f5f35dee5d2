//! GitHub Copilot Chat reader (VS Code)
//!
//! Data format:
//! - `workspaceStorage/<id>/workspace.json` names the opened folder as a file URI
//! - `workspaceStorage/<id>/chatSessions/<session>.json` holds the requests
//! - `workspaceStorage/<id>/state.vscdb` carries session titles
//! - `workspaceStorage/<id>/chatEditingSessions/<session>/` records file edits

mod edits;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::vscdb::StateDb;
use super::{editor_user_dir, file_mtime_ms, newest_mtime, parse_timestamp, RawSession, SourceReader, WorkspaceSelector};
use crate::aggregate::{turns_in_order, MergePolicy, RawMessage, SessionInfo};
use crate::error::GennieError;
use crate::model::{Role, WorkspaceSummary};
use crate::reconstruct::attach_edits;
use crate::text::paths::{decode_file_uri, folder_name, normalize_path, resolve_remote_path};

const TITLE_INDEX_KEY: &str = "chat.ChatSessionStore.index";

const REQUEST_ID_KEYS: &[&str] = &["requestId", "requestUUID", "clientRequestId", "conversationId", "sessionId"];

const MODEL_ID_KEYS: &[&str] = &["modelId", "model", "responseModel", "modelIdentifier"];

/// Bytes sniffed to detect an empty session without parsing it
const EMPTY_SNIFF_BYTES: u64 = 2048;

pub struct CopilotReader {
    base_path: PathBuf,
}

/// Workspace identity resolved from `workspace.json`
struct WorkspaceMeta {
    id: String,
    name: String,
    folder: String,
    dir: PathBuf,
}

impl CopilotReader {
    pub const NAME: &'static str = "copilot";

    pub fn new(custom_path: Option<PathBuf>) -> Self {
        let base_path = custom_path.unwrap_or_else(|| editor_user_dir("Code").join("workspaceStorage"));
        Self { base_path }
    }

    fn session_files(dir: &Path) -> Vec<PathBuf> {
        let pattern = dir.join("chatSessions").join("*.json");
        let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .map(|paths| paths.filter_map(|p| p.ok()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    fn load_meta(dir: &Path) -> WorkspaceMeta {
        let id = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let folder = std::fs::read_to_string(dir.join("workspace.json"))
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
            .and_then(|json| {
                ["folder", "folderUri", "workspace"]
                    .iter()
                    .find_map(|k| json.get(*k).and_then(|v| v.as_str()).map(String::from))
            })
            .map(|uri| {
                if uri.starts_with("vscode-remote://") {
                    normalize_path(&resolve_remote_path(&uri))
                } else {
                    decode_file_uri(&uri)
                }
            })
            .unwrap_or_default();

        let name = if folder.is_empty() { id.clone() } else { folder_name(&folder) };
        WorkspaceMeta {
            id,
            name,
            folder,
            dir: dir.to_path_buf(),
        }
    }

    fn summarize(dir: &Path) -> Option<WorkspaceSummary> {
        let files = Self::session_files(dir);
        let session_count = files.iter().filter(|f| !is_empty_session(f)).count();
        if session_count == 0 {
            return None;
        }
        let meta = Self::load_meta(dir);
        Some(WorkspaceSummary {
            agent: Self::NAME.to_string(),
            workspace_id: meta.id,
            name: meta.name,
            folder: meta.folder,
            session_count,
            last_modified: newest_mtime(&files),
        })
    }
}

impl SourceReader for CopilotReader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "GitHub Copilot Chat (VS Code)"
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
            if !dir.join("chatSessions").is_dir() {
                continue;
            }
            if let Some(summary) = Self::summarize(&dir) {
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
        if !dir.join("chatSessions").is_dir() {
            return Err(GennieError::SourceUnavailable {
                agent: Self::NAME.to_string(),
                path: dir.join("chatSessions"),
            }
            .into());
        }

        let meta = Self::load_meta(&dir);
        let titles = load_titles(&dir.join("state.vscdb"));
        let mut sessions = Vec::new();

        for file in Self::session_files(&dir) {
            match extract_session(&file, &meta, &titles) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping {}: {:#}", file.display(), e),
            }
        }

        Ok(sessions)
    }

    fn latest_activity(&self, workspace_id: &str) -> Option<DateTime<Utc>> {
        newest_mtime(&Self::session_files(&self.base_path.join(workspace_id)))
    }
}

/// An empty session is recognisable from its head alone
fn is_empty_session(path: &Path) -> bool {
    let mut head = String::new();
    let read = std::fs::File::open(path).and_then(|f| f.take(EMPTY_SNIFF_BYTES).read_to_string(&mut head));
    match read {
        Ok(_) => head.contains("\"requests\": []") || head.contains("\"requests\":[]"),
        // a multi-byte char split at the sniff boundary is not emptiness
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => false,
        Err(_) => true,
    }
}

/// Session id -> title from the workspace's state.vscdb
fn load_titles(db_path: &Path) -> HashMap<String, String> {
    if !db_path.exists() {
        return HashMap::new();
    }
    let index = StateDb::open(db_path).and_then(|db| db.item(TITLE_INDEX_KEY));
    let index = match index {
        Ok(Some(v)) => v,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            tracing::debug!("no session titles from {}: {:#}", db_path.display(), e);
            return HashMap::new();
        }
    };
    index
        .get("entries")
        .and_then(|v| v.as_object())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(id, info)| {
                    info.get("title")
                        .and_then(|t| t.as_str())
                        .map(|t| (id.clone(), t.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_session(path: &Path, meta: &WorkspaceMeta, titles: &HashMap<String, String>) -> Result<Option<RawSession>> {
    if is_empty_session(path) {
        return Ok(None);
    }
    let session_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let data: Value = serde_json::from_str(&content).map_err(|e| GennieError::MalformedRecord {
        context: format!("copilot session {}", session_id),
        reason: e.to_string(),
    })?;

    let requests = match data.get("requests").and_then(|v| v.as_array()) {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(None),
    };

    let session_name = data
        .get("customTitle")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| titles.get(&session_id).cloned())
        .unwrap_or_default();

    let fallback_ms = file_mtime_ms(path).unwrap_or(0);
    let messages = requests.iter().flat_map(|req| request_messages(req, fallback_ms));

    let info = SessionInfo {
        session_id: session_id.clone(),
        session_name,
        workspace_id: meta.id.clone(),
        workspace_name: meta.name.clone(),
        workspace_folder: meta.folder.clone(),
        agent: CopilotReader::NAME.to_string(),
    };
    // every request yields its user and assistant turn, even with an empty
    // response, so edits can still attach by request id
    let mut turns = turns_in_order(messages, &MergePolicy::default(), &info);

    let edit_dir = meta.dir.join("chatEditingSessions").join(&session_id);
    if edit_dir.is_dir() {
        match edits::session_edits(&edit_dir) {
            Ok(found) => {
                let orphaned = attach_edits(&mut turns, found);
                if orphaned > 0 {
                    tracing::debug!("{} edits in {} matched no request", orphaned, session_id);
                }
            }
            Err(e) => tracing::warn!("skipping edits for {}: {:#}", session_id, e),
        }
    }

    Ok((!turns.is_empty()).then_some(RawSession { info, turns }))
}

/// The user message and assistant response of one request
fn request_messages(req: &Value, fallback_ms: i64) -> [RawMessage; 2] {
    let timestamp = request_timestamp(req).unwrap_or(fallback_ms);
    let request_id = find_field(req, REQUEST_ID_KEYS);
    let model_id = find_field(req, MODEL_ID_KEYS);

    let mut user = RawMessage::new(Role::User).at(timestamp);
    user.text = user_text(req);
    user.files = user_files(req);
    user.request_id = request_id.clone();
    user.model_id = model_id.clone();

    let response = assistant_response(req);
    let mut assistant = RawMessage::new(Role::Assistant).at(timestamp);
    assistant.text = response.text;
    assistant.tools = response.tools;
    assistant.files = response.files;
    assistant.thinking = response.thinking;
    assistant.request_id = request_id;
    assistant.model_id = model_id;
    assistant.source_response_ms = req
        .pointer("/result/timings/totalElapsed")
        .and_then(|v| v.as_f64())
        .map(|ms| ms as i64)
        .filter(|ms| *ms > 0);

    [user, assistant]
}

/// `timestamp` (number or digit string), then ISO `createdAt`
fn request_timestamp(req: &Value) -> Option<i64> {
    let numeric = req.get("timestamp").and_then(|ts| match ts {
        Value::Number(_) => parse_timestamp(ts),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    });
    numeric.or_else(|| req.get("createdAt").and_then(parse_timestamp))
}

/// Depth-first, case-insensitive search for the first scalar under any of `keys`
fn find_field(value: &Value, keys: &[&str]) -> Option<String> {
    let map = value.as_object()?;
    for (k, v) in map {
        if keys.iter().any(|key| key.eq_ignore_ascii_case(k)) {
            match v {
                Value::String(s) if !s.is_empty() => return Some(s.clone()),
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    for v in map.values() {
        let found = match v {
            Value::Object(_) => find_field(v, keys),
            Value::Array(items) => items.iter().find_map(|item| find_field(item, keys)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn user_text(req: &Value) -> String {
    let Some(message) = req.get("message") else {
        return String::new();
    };
    if let Some(text) = message.get("text").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        return text.to_string();
    }
    message
        .get("parts")
        .and_then(|v| v.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.is_object())
                .map(|p| p.get("text").and_then(|t| t.as_str()).unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// File variables the user attached to the request
fn user_files(req: &Value) -> Vec<String> {
    let files: BTreeSet<String> = req
        .pointer("/variableData/variables")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter(|v| v.get("kind").and_then(|k| k.as_str()) == Some("file"))
        .filter_map(|v| v.pointer("/value/path").and_then(|p| p.as_str()))
        .filter(|p| !p.is_empty())
        .map(normalize_path)
        .collect();
    files.into_iter().collect()
}

/// Display name for an inline reference: a symbol name, else the file name
fn reference_name(reference: &Value) -> String {
    if let Some(name) = reference.get("name").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        return name.to_string();
    }
    let path = ["fsPath", "path"]
        .iter()
        .find_map(|k| reference.get(*k).and_then(|v| v.as_str()).filter(|s| !s.is_empty()))
        .or_else(|| {
            let uri = reference.pointer("/location/uri")?;
            ["fsPath", "path"]
                .iter()
                .find_map(|k| uri.get(*k).and_then(|v| v.as_str()).filter(|s| !s.is_empty()))
        });
    path.map(|p| folder_name(p)).unwrap_or_default()
}

fn uri_path(value: &Value) -> Option<String> {
    value
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(normalize_path)
}

#[derive(Default)]
struct Response {
    text: String,
    tools: Vec<String>,
    files: Vec<String>,
    thinking: String,
}

fn is_code_fence(value: &str) -> bool {
    let stripped = value.trim();
    stripped == "```" || (stripped.starts_with("```") && stripped.len() <= 15 && !stripped.contains('\n'))
}

/// Walk the response items by kind. Code fences around edit groups are kept
/// in place so the rendered text still reads as a code block.
fn assistant_response(req: &Value) -> Response {
    let Some(items) = req.get("response").and_then(|v| v.as_array()) else {
        return Response::default();
    };

    let mut parts: Vec<String> = Vec::new();
    let mut thinking: Vec<String> = Vec::new();
    let mut tools: BTreeSet<String> = BTreeSet::new();
    let mut files: BTreeSet<String> = BTreeSet::new();
    let mut in_code_block = false;
    let mut pending_fence: Option<String> = None;

    for item in items.iter().filter(|i| i.is_object()) {
        match item.get("kind").and_then(|k| k.as_str()).unwrap_or("") {
            "thinking" => {
                if let Some(v) = item.get("value").and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty()) {
                    thinking.push(v.trim().to_string());
                }
            }
            "inlineReference" => {
                let name = item.get("inlineReference").map(reference_name).unwrap_or_default();
                if !name.is_empty() {
                    parts.push(format!("`{}`", name));
                }
            }
            "codeblockUri" => {
                in_code_block = true;
                if let Some(uri) = item.get("uri").and_then(uri_path) {
                    files.insert(uri);
                }
                parts.extend(pending_fence.take());
            }
            "textEditGroup" => {
                if let Some(uri) = item.get("uri").and_then(uri_path) {
                    files.insert(uri);
                }
                parts.extend(pending_fence.take());
                let edit_texts: Vec<String> = item
                    .get("edits")
                    .and_then(|v| v.as_array())
                    .into_iter()
                    .flatten()
                    .filter_map(|group| group.as_array())
                    .flatten()
                    .filter_map(|edit| edit.get("text").and_then(|t| t.as_str()))
                    .filter(|t| !t.is_empty())
                    .map(|t| if t.starts_with('\n') { t.to_string() } else { format!("\n{}", t) })
                    .collect();
                if !edit_texts.is_empty() {
                    parts.push(edit_texts.join("\n"));
                    in_code_block = true;
                }
            }
            _ => {
                if let Some(value) = item.get("value").and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty()) {
                    if is_code_fence(value) {
                        if in_code_block {
                            parts.push(value.to_string());
                            in_code_block = false;
                        } else {
                            pending_fence = Some(value.to_string());
                        }
                    } else {
                        parts.push(value.to_string());
                    }
                }
                for key in ["toolId", "toolName"] {
                    if let Some(tool) = item.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
                        tools.insert(tool.to_string());
                    }
                }
                for uri in item
                    .pointer("/invocationMessage/uris")
                    .and_then(|v| v.as_array())
                    .into_iter()
                    .flatten()
                {
                    files.extend(uri_path(uri));
                }
            }
        }
    }

    for event in req.get("editedFileEvents").and_then(|v| v.as_array()).into_iter().flatten() {
        if let Some(uri) = event.get("uri").and_then(uri_path) {
            files.insert(uri);
        }
    }

    Response {
        text: parts.concat(),
        tools: tools.into_iter().collect(),
        files: files.into_iter().collect(),
        thinking: thinking.join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::vscdb::fixture::write_state_db;
    use serde_json::json;

    fn write_workspace(root: &Path, id: &str) -> PathBuf {
        let dir = root.join(id);
        std::fs::create_dir_all(dir.join("chatSessions")).unwrap();
        std::fs::write(
            dir.join("workspace.json"),
            json!({"folder": "file:///c%3A/Code/My%20App"}).to_string(),
        )
        .unwrap();
        dir
    }

    fn session() -> Value {
        json!({
            "requests": [
                {
                    "requestId": "req-1",
                    "timestamp": 1_700_000_000_000i64,
                    "modelId": "copilot/gpt-4o",
                    "message": {"text": "add a health check"},
                    "variableData": {"variables": [
                        {"kind": "file", "value": {"path": "/c:/Code/My App/server.py"}}
                    ]},
                    "response": [
                        {"kind": "thinking", "value": "need a route"},
                        {"value": "Added "},
                        {"kind": "inlineReference", "inlineReference": {"fsPath": "/c:/Code/My App/server.py"}},
                        {"kind": "toolInvocationSerialized", "toolId": "copilot_editFile",
                         "invocationMessage": {"uris": [{"path": "/c:/Code/My App/server.py"}]}}
                    ],
                    "result": {"timings": {"totalElapsed": 4200}}
                },
                {
                    "result": {"metadata": {"deep": {"requestId": "req-2"}}},
                    "createdAt": "2023-11-14T22:15:00Z",
                    "message": {"parts": [{"text": "thanks"}]},
                    "response": [{"value": "You're welcome"}]
                }
            ]
        })
    }

    #[test]
    fn test_extract_session_turns() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workspace(root.path(), "ws1");
        std::fs::write(dir.join("chatSessions/s1.json"), session().to_string()).unwrap();
        std::fs::write(dir.join("chatSessions/empty.json"), "{\"requests\": []}").unwrap();
        write_state_db(
            &dir.join("state.vscdb"),
            &[(TITLE_INDEX_KEY, json!({"entries": {"s1": {"title": "Health check"}}}).to_string())],
            &[],
        );

        let reader = CopilotReader::new(Some(root.path().to_path_buf()));
        let found = reader.scan(&WorkspaceSelector::All).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].folder, "c:/Code/My App");
        assert_eq!(found[0].name, "My App");
        assert_eq!(found[0].session_count, 1);

        let sessions = reader.extract("ws1").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].info.session_name, "Health check");
        let turns = &sessions[0].turns;
        let shape: Vec<_> = turns.iter().map(|t| (t.turn, t.role)).collect();
        assert_eq!(
            shape,
            vec![(0, Role::User), (1, Role::Assistant), (2, Role::User), (3, Role::Assistant)]
        );
        assert_eq!(turns[0].files, vec!["c:/Code/My App/server.py"]);
        assert_eq!(turns[1].original_text, "Added `server.py`");
        assert_eq!(turns[1].tools, vec!["copilot_editFile"]);
        assert_eq!(turns[1].thinking_text, "need a route");
        assert_eq!(turns[1].source_response_ms, Some(4200));
        assert_eq!(turns[1].request_id.as_deref(), Some("req-1"));
        assert_eq!(turns[3].request_id.as_deref(), Some("req-2"));
        assert_eq!(turns[2].timestamp_ms, Some(1_700_000_100_000));
    }

    #[test]
    fn test_edits_attach_to_matching_request() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workspace(root.path(), "ws1");
        std::fs::write(dir.join("chatSessions/s1.json"), session().to_string()).unwrap();
        let edit_dir = dir.join("chatEditingSessions/s1");
        std::fs::create_dir_all(edit_dir.join("contents")).unwrap();
        std::fs::write(edit_dir.join("contents/aaa"), "print('a')\n").unwrap();
        std::fs::write(edit_dir.join("contents/bbb"), "print('b')\n").unwrap();
        std::fs::write(
            edit_dir.join("state.json"),
            json!({
                "initialFileContents": [["file:///c%3A/Code/My%20App/server.py", "aaa"]],
                "recentSnapshot": {"entries": [{
                    "resource": "file:///c%3A/Code/My%20App/server.py",
                    "currentHash": "bbb",
                    "telemetryInfo": {"requestId": "req-1"}
                }]}
            })
            .to_string(),
        )
        .unwrap();

        let reader = CopilotReader::new(Some(root.path().to_path_buf()));
        let sessions = reader.extract("ws1").unwrap();
        let assistant = &sessions[0].turns[1];
        assert_eq!(assistant.code_edits.len(), 1);
        assert_eq!(assistant.code_edits[0].file_path, "c:/Code/My App/server.py");
        assert_eq!(assistant.code_edits[0].code_after.as_deref(), Some("print('b')\n"));
    }

    #[test]
    fn test_empty_response_keeps_request_pair_and_edits() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workspace(root.path(), "ws1");
        let data = json!({"requests": [
            {"requestId": "req-1", "timestamp": 1_700_000_000_000i64,
             "message": {"text": "refactor a.py"}, "response": []},
            {"requestId": "req-2", "timestamp": 1_700_000_060_000i64,
             "message": {"text": "now add tests"}, "response": [{"value": "done"}]}
        ]});
        std::fs::write(dir.join("chatSessions/s1.json"), data.to_string()).unwrap();
        let edit_dir = dir.join("chatEditingSessions/s1");
        std::fs::create_dir_all(edit_dir.join("contents")).unwrap();
        std::fs::write(edit_dir.join("contents/h1"), "old text").unwrap();
        std::fs::write(edit_dir.join("contents/h2"), "new text").unwrap();
        std::fs::write(
            edit_dir.join("state.json"),
            json!({"linearHistory": [{"requestId": "req-1", "stops": [{"entries": [
                {"resource": "file:///c%3A/Code/My%20App/a.py", "originalHash": "h1", "currentHash": "h2"}
            ]}]}]})
            .to_string(),
        )
        .unwrap();

        let reader = CopilotReader::new(Some(root.path().to_path_buf()));
        let turns = &reader.extract("ws1").unwrap()[0].turns;
        let shape: Vec<_> = turns.iter().map(|t| (t.turn, t.role, t.original_text.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (0, Role::User, "refactor a.py"),
                (1, Role::Assistant, ""),
                (2, Role::User, "now add tests"),
                (3, Role::Assistant, "done")
            ]
        );
        assert_eq!(turns[1].request_id.as_deref(), Some("req-1"));
        assert_eq!(turns[1].code_edits.len(), 1);
        assert_eq!(turns[1].code_edits[0].code_before.as_deref(), Some("old text"));
        assert_eq!(turns[1].code_edits[0].code_after.as_deref(), Some("new text"));
        assert!(turns[3].code_edits.is_empty());
    }

    #[test]
    fn test_malformed_session_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workspace(root.path(), "ws1");
        std::fs::write(dir.join("chatSessions/s1.json"), session().to_string()).unwrap();
        std::fs::write(dir.join("chatSessions/s2.json"), "{\"requests\": [{").unwrap();

        let meta = CopilotReader::load_meta(&dir);
        let err = extract_session(&dir.join("chatSessions/s2.json"), &meta, &HashMap::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<GennieError>(), Some(GennieError::MalformedRecord { .. })));

        let reader = CopilotReader::new(Some(root.path().to_path_buf()));
        let sessions = reader.extract("ws1").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].info.session_id, "s1");

        let err = reader.extract("nope").unwrap_err();
        assert!(matches!(err.downcast_ref::<GennieError>(), Some(GennieError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_find_field_is_recursive_and_case_insensitive() {
        let req = json!({"a": [{"b": {"REQUESTID": "deep"}}]});
        assert_eq!(find_field(&req, REQUEST_ID_KEYS).as_deref(), Some("deep"));
        assert_eq!(find_field(&json!({"x": 1}), REQUEST_ID_KEYS), None);
    }

    #[test]
    fn test_code_fences_wrap_edit_groups() {
        let req = json!({"response": [
            {"value": "Here:\n"},
            {"value": "```python"},
            {"kind": "textEditGroup", "uri": {"path": "/p/a.py"}, "edits": [[{"text": "x = 1"}]]},
            {"value": "```"}
        ]});
        let r = assistant_response(&req);
        assert_eq!(r.text, "Here:\n```python\nx = 1```");
        assert_eq!(r.files, vec!["/p/a.py"]);
    }
}
