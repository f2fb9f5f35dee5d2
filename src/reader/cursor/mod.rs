//! Cursor reader
//!
//! Data format:
//! - `workspaceStorage/<id>/state.vscdb` lists the workspace's composers under
//!   `composer.composerData`
//! - `globalStorage/state.vscdb` holds `composerData:<id>` and
//!   `bubbleId:<composer>:<bubble>` rows in `cursorDiskKV`
//! - older installs keep the same rows in the workspace database instead
//! - `inlineDiffUndoRedo*` rows carry the before/after lines of applied code blocks

mod bubbles;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use self::bubbles::{default_model, propagate, Bubble, CodeBlock, Conversation};
use super::vscdb::StateDb;
use super::{editor_user_dir, file_mtime, parse_timestamp, RawSession, SourceReader, WorkspaceSelector};
use crate::aggregate::{aggregate, MergePolicy, SessionInfo};
use crate::code::replacement_diff;
use crate::error::GennieError;
use crate::model::{CodeEdit, Turn, WorkspaceSummary};
use crate::text::paths::{decode_file_uri, folder_name, normalize_path};

const COMPOSER_LIST_KEY: &str = "composer.composerData";

const INLINE_DIFF_PREFIX: &str = "inlineDiffUndoRedo";

const DISK_KV_TABLE: &str = "cursorDiskKV";

const POLICY: MergePolicy = MergePolicy {
    text_separator: "\n\n_ ",
    latest_assistant_timestamp: true,
};

pub struct CursorReader {
    workspace_storage: PathBuf,
    global_db: PathBuf,
}

struct WorkspaceMeta {
    id: String,
    name: String,
    folder: String,
    db: PathBuf,
}

/// Before/after lines of one applied code block
struct InlineDiff {
    before: String,
    after: String,
}

/// Databases open for one workspace extraction
struct Stores {
    global: Option<StateDb>,
    workspace: Option<StateDb>,
}

impl Stores {
    fn open(global: &Path, workspace: &Path) -> Self {
        let open = |path: &Path| {
            if !path.exists() {
                return None;
            }
            StateDb::open(path)
                .map_err(|e| tracing::debug!("cannot open {}: {:#}", path.display(), e))
                .ok()
        };
        Self {
            global: open(global),
            workspace: open(workspace),
        }
    }

    /// The composer record and the database that holds its bubbles; global first
    fn composer(&self, composer_id: &str) -> Option<(Value, &StateDb)> {
        let key = format!("composerData:{}", composer_id);
        [self.global.as_ref(), self.workspace.as_ref()]
            .into_iter()
            .flatten()
            .filter(|db| db.has_table(DISK_KV_TABLE))
            .find_map(|db| match db.disk_kv(&key) {
                Ok(Some(data)) if Conversation::detect(&data).is_some() => Some((data, db)),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("skipping composer {}: {:#}", composer_id, e);
                    None
                }
            })
    }
}

impl CursorReader {
    pub const NAME: &'static str = "cursor";

    /// `custom_path` is the Cursor `User` directory
    pub fn new(custom_path: Option<PathBuf>) -> Self {
        let base = custom_path.unwrap_or_else(|| editor_user_dir("Cursor"));
        Self {
            workspace_storage: base.join("workspaceStorage"),
            global_db: base.join("globalStorage").join("state.vscdb"),
        }
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
                ["folder", "folderUri"]
                    .iter()
                    .find_map(|k| json.get(*k).and_then(|v| v.as_str()).map(decode_file_uri))
            })
            .unwrap_or_default();
        let name = if folder.is_empty() { id.clone() } else { folder_name(&folder) };
        WorkspaceMeta {
            id,
            name,
            folder,
            db: dir.join("state.vscdb"),
        }
    }

    /// Composer ids listed by the workspace that have conversation data somewhere
    fn composer_ids(meta: &WorkspaceMeta, stores: &Stores) -> Vec<String> {
        let Some(workspace) = stores.workspace.as_ref() else {
            return vec![];
        };
        let listed = match workspace.item(COMPOSER_LIST_KEY) {
            Ok(Some(v)) => v,
            Ok(None) => return vec![],
            Err(e) => {
                tracing::debug!("no composers in {}: {:#}", meta.id, e);
                return vec![];
            }
        };
        listed
            .get("allComposers")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|c| c.get("composerId").and_then(|v| v.as_str()))
            .filter(|id| stores.composer(id).is_some())
            .map(String::from)
            .collect()
    }

    fn summarize(&self, dir: &Path) -> Option<WorkspaceSummary> {
        let meta = Self::load_meta(dir);
        let stores = Stores::open(&self.global_db, &meta.db);
        let session_count = Self::composer_ids(&meta, &stores).len();
        if session_count == 0 {
            return None;
        }
        Some(WorkspaceSummary {
            agent: Self::NAME.to_string(),
            last_modified: file_mtime(&meta.db),
            workspace_id: meta.id,
            name: meta.name,
            folder: meta.folder,
            session_count,
        })
    }
}

impl SourceReader for CursorReader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Cursor composer chats"
    }

    fn is_available(&self) -> bool {
        self.workspace_storage.exists()
    }

    fn scan(&self, selector: &WorkspaceSelector) -> Result<Vec<WorkspaceSummary>> {
        let mut workspaces = vec![];

        if !self.workspace_storage.exists() {
            return Ok(workspaces);
        }

        for entry in std::fs::read_dir(&self.workspace_storage)
            .with_context(|| format!("Failed to list {}", self.workspace_storage.display()))?
        {
            let dir = match entry {
                Ok(e) => e.path(),
                Err(_) => continue,
            };
            if !dir.join("state.vscdb").is_file() {
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
        let dir = self.workspace_storage.join(workspace_id);
        if !dir.join("state.vscdb").is_file() {
            return Err(GennieError::SourceUnavailable {
                agent: Self::NAME.to_string(),
                path: dir.join("state.vscdb"),
            }
            .into());
        }

        let meta = Self::load_meta(&dir);
        let stores = Stores::open(&self.global_db, &meta.db);
        let mut sessions = Vec::new();

        for composer_id in Self::composer_ids(&meta, &stores) {
            match extract_composer(&composer_id, &meta, &stores) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping composer {}: {:#}", composer_id, e),
            }
        }

        Ok(sessions)
    }

    fn latest_activity(&self, workspace_id: &str) -> Option<DateTime<Utc>> {
        let local = file_mtime(&self.workspace_storage.join(workspace_id).join("state.vscdb"));
        local.max(file_mtime(&self.global_db))
    }
}

fn extract_composer(composer_id: &str, meta: &WorkspaceMeta, stores: &Stores) -> Result<Option<RawSession>> {
    let Some((composer, db)) = stores.composer(composer_id) else {
        return Ok(None);
    };
    let Some(conversation) = Conversation::detect(&composer) else {
        return Ok(None);
    };

    let mut bubbles = conversation.bubbles(|bubble_id| {
        db.disk_kv(&format!("bubbleId:{}:{}", composer_id, bubble_id))
            .map_err(|e| tracing::debug!("bubble {} unreadable: {:#}", bubble_id, e))
            .ok()
            .flatten()
    });
    if bubbles.is_empty() {
        return Ok(None);
    }
    propagate(&mut bubbles, default_model(&composer).as_deref());

    let session_ts = ["createdAt", "lastUpdatedAt"]
        .iter()
        .find_map(|k| composer.get(*k).and_then(parse_timestamp));

    let info = SessionInfo {
        session_id: composer_id.to_string(),
        session_name: composer
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        workspace_id: meta.id.clone(),
        workspace_name: meta.name.clone(),
        workspace_folder: meta.folder.clone(),
        agent: CursorReader::NAME.to_string(),
    };

    let mut turns = aggregate(bubbles.iter().filter_map(Bubble::to_message), &POLICY, &info);
    if turns.is_empty() {
        return Ok(None);
    }

    let blocks: HashMap<&str, &[CodeBlock]> = bubbles
        .iter()
        .filter(|b| !b.code_blocks.is_empty())
        .map(|b| (b.id.as_str(), b.code_blocks.as_slice()))
        .collect();
    let inline_diffs = if blocks.is_empty() {
        HashMap::new()
    } else {
        inline_diffs(db, composer_id).context("Failed to read inline diffs")?
    };
    let original_states = original_file_states(&composer);

    for turn in &mut turns {
        if turn.timestamp_ms.is_none() {
            turn.timestamp_ms = session_ts;
        }
        let turn_blocks: Vec<&CodeBlock> = bubble_ids(turn)
            .filter_map(|id| blocks.get(id))
            .flat_map(|b| b.iter())
            .collect();
        turn.code_edits = code_edits(&turn_blocks, &inline_diffs, &original_states);
    }

    Ok(Some(RawSession { info, turns }))
}

/// Bubble ids that merged into a turn, in order
fn bubble_ids(turn: &Turn) -> impl Iterator<Item = &str> {
    let ids: Vec<&str> = if turn.merged_request_ids.is_empty() {
        turn.request_id.as_deref().into_iter().collect()
    } else {
        turn.merged_request_ids.iter().map(String::as_str).collect()
    };
    ids.into_iter()
}

/// Inline diff records for one composer, keyed by codeblock id
fn inline_diffs(db: &StateDb, composer_id: &str) -> Result<HashMap<String, InlineDiff>> {
    let lines = |v: Option<&Value>| -> String {
        v.and_then(|l| l.as_array())
            .map(|l| l.iter().filter_map(|s| s.as_str()).collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    };
    let mut diffs = HashMap::new();
    for (_, data) in db.disk_kv_prefixed(INLINE_DIFF_PREFIX)? {
        let owner = data.pointer("/composerMetadata/composerId").and_then(|v| v.as_str());
        if owner != Some(composer_id) {
            continue;
        }
        let Some(codeblock_id) = data
            .pointer("/composerMetadata/codeblockId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        else {
            continue;
        };
        diffs.insert(
            codeblock_id.to_string(),
            InlineDiff {
                before: lines(data.get("originalTextLines")),
                after: lines(data.get("newTextLines")),
            },
        );
    }
    Ok(diffs)
}

/// Normalized path -> content the composer saw before editing
fn original_file_states(composer: &Value) -> HashMap<String, String> {
    composer
        .get("originalFileStates")
        .and_then(|v| v.as_object())
        .into_iter()
        .flatten()
        .filter_map(|(uri, state)| {
            let content = state.get("content")?.as_str()?;
            Some((normalize_path(&decode_file_uri(uri)).to_lowercase(), content.to_string()))
        })
        .collect()
}

/// One edit per file: before from the first block, after from the last
fn code_edits(
    blocks: &[&CodeBlock],
    inline_diffs: &HashMap<String, InlineDiff>,
    original_states: &HashMap<String, String>,
) -> Vec<CodeEdit> {
    let mut order: Vec<String> = Vec::new();
    let mut per_file: HashMap<String, (&CodeBlock, &CodeBlock)> = HashMap::new();
    for block in blocks.iter().copied().filter(|b| !b.file_path.is_empty()) {
        let key = block.file_path.to_lowercase();
        match per_file.get_mut(&key) {
            Some((_, last)) => *last = block,
            None => {
                order.push(key.clone());
                per_file.insert(key, (block, block));
            }
        }
    }

    let mut edits = Vec::new();
    for key in order {
        let Some((first, last)) = per_file.get(&key) else { continue };
        let before = inline_diffs
            .get(&first.codeblock_id)
            .map(|d| d.before.clone())
            .or_else(|| original_states.get(&key).cloned());
        let after = inline_diffs
            .get(&last.codeblock_id)
            .map(|d| d.after.clone())
            .unwrap_or_else(|| last.content.clone());

        let edit = match &before {
            Some(before) => CodeEdit::between(&first.file_path, before, &after)
                .map(|e| e.with_diff(replacement_diff(before, &after))),
            None => CodeEdit::created(&first.file_path, &after),
        };
        let Some(mut edit) = edit else { continue };

        if edit.language.is_empty() && !first.language_id.is_empty() {
            edit.language = first.language_id.clone();
        }
        let ids: Vec<&str> = if first.codeblock_id == last.codeblock_id {
            vec![first.codeblock_id.as_str()]
        } else {
            vec![first.codeblock_id.as_str(), last.codeblock_id.as_str()]
        };
        edits.push(edit.with_extra("codeblock_ids", ids));
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::reader::vscdb::fixture::write_state_db;
    use serde_json::json;

    fn composer_list(ids: &[&str]) -> String {
        let all: Vec<Value> = ids.iter().map(|id| json!({"composerId": id})).collect();
        json!({ "allComposers": all }).to_string()
    }

    fn setup(root: &Path, global_rows: &[(&str, String)]) {
        let ws = root.join("workspaceStorage").join("ws1");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("workspace.json"), json!({"folder": "file:///home/dev/shop"}).to_string()).unwrap();
        write_state_db(&ws.join("state.vscdb"), &[(COMPOSER_LIST_KEY, composer_list(&["c1", "ghost"]))], &[]);

        let global = root.join("globalStorage");
        std::fs::create_dir_all(&global).unwrap();
        write_state_db(&global.join("state.vscdb"), &[], global_rows);
    }

    fn headers_fixture() -> Vec<(&'static str, String)> {
        vec![
            (
                "composerData:c1",
                json!({
                    "name": "Fix checkout",
                    "usageData": {"claude-3.5-sonnet": {"count": 2}},
                    "fullConversationHeadersOnly": [
                        {"bubbleId": "u1", "type": 1},
                        {"bubbleId": "a1", "type": 2},
                        {"bubbleId": "a2", "type": 2},
                        {"bubbleId": "a3", "type": 2},
                        {"bubbleId": "a4", "type": 2}
                    ],
                    "originalFileStates": {
                        "file:///home/dev/shop/cart.py": {"content": "total = 0"}
                    }
                })
                .to_string(),
            ),
            (
                "bubbleId:c1:u1",
                json!({"type": 1, "text": "fix the cart", "createdAt": 1_700_000_000_000i64}).to_string(),
            ),
            (
                "bubbleId:c1:a1",
                json!({"type": 2, "thinking": "look at cart.py", "thinkingDurationMs": 50,
                       "timingInfo": {"clientRpcSendTime": 1_700_000_001_000i64}})
                .to_string(),
            ),
            (
                "bubbleId:c1:a2",
                json!({"type": 2, "text": "Fixed the total.",
                       "timingInfo": {"clientEndTime": 1_700_000_005_000i64},
                       "codeBlocks": [{"uri": {"fsPath": "/home/dev/shop/cart.py"},
                                       "content": "total = sum(items)", "codeblockId": "cb1"}]})
                .to_string(),
            ),
            ("bubbleId:c1:a3", json!({"type": 2, "toolFormerData": {"name": "run_terminal_cmd"}}).to_string()),
            ("bubbleId:c1:a4", json!({"type": 2}).to_string()),
        ]
    }

    #[test]
    fn test_scan_counts_composers_with_data() {
        let root = tempfile::tempdir().unwrap();
        setup(root.path(), &headers_fixture());

        let reader = CursorReader::new(Some(root.path().to_path_buf()));
        let found = reader.scan(&WorkspaceSelector::All).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workspace_id, "ws1");
        assert_eq!(found[0].name, "shop");
        assert_eq!(found[0].folder, "/home/dev/shop");
        assert_eq!(found[0].session_count, 1);
    }

    #[test]
    fn test_extract_headers_schema() {
        let root = tempfile::tempdir().unwrap();
        setup(root.path(), &headers_fixture());

        let reader = CursorReader::new(Some(root.path().to_path_buf()));
        let sessions = reader.extract("ws1").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].info.session_name, "Fix checkout");

        let turns = &sessions[0].turns;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].request_id.as_deref(), Some("u1"));

        let reply = &turns[1];
        assert_eq!(reply.original_text, "Fixed the total.");
        assert_eq!(reply.thinking_text, "look at cart.py");
        assert_eq!(reply.thinking_duration_ms, Some(50));
        assert_eq!(reply.tools, vec!["run_terminal_cmd"]);
        assert_eq!(reply.timestamp_ms, Some(1_700_000_005_000));
        assert_eq!(reply.model_id.as_deref(), Some("claude-3.5-sonnet"));
        assert_eq!(reply.merged_request_ids, vec!["a1", "a2", "a3"]);

        assert_eq!(reply.code_edits.len(), 1);
        let edit = &reply.code_edits[0];
        assert_eq!(edit.file_path, "/home/dev/shop/cart.py");
        assert_eq!(edit.code_before.as_deref(), Some("total = 0"));
        assert_eq!(edit.code_after.as_deref(), Some("total = sum(items)"));
        assert_eq!(edit.extra["codeblock_ids"], json!(["cb1"]));
    }

    #[test]
    fn test_inline_schema_and_inline_diffs() {
        let root = tempfile::tempdir().unwrap();
        let rows = vec![
            (
                "composerData:c1",
                json!({
                    "modelConfig": {"modelName": "gpt-4o"},
                    "conversation": [
                        {"bubbleId": "u1", "type": 1, "text": "rename x", "createdAt": 1_700_000_000_000i64},
                        {"bubbleId": "a1", "type": 2, "text": "Renamed.",
                         "codeBlocks": [{"uri": {"path": "/home/dev/shop/a.rs"}, "content": "ignored", "codeblockId": "cb9"}]},
                        {"bubbleId": "u2", "type": 1, "text": "thanks"}
                    ]
                })
                .to_string(),
            ),
            (
                "inlineDiffUndoRedo:1",
                json!({
                    "composerMetadata": {"composerId": "c1", "codeblockId": "cb9"},
                    "originalTextLines": ["let x = 1;"],
                    "newTextLines": ["let y = 1;"]
                })
                .to_string(),
            ),
            (
                "inlineDiffUndoRedo:2",
                json!({
                    "composerMetadata": {"composerId": "other", "codeblockId": "cb9"},
                    "originalTextLines": ["wrong"],
                    "newTextLines": ["wrong"]
                })
                .to_string(),
            ),
        ];
        setup(root.path(), &rows);

        let reader = CursorReader::new(Some(root.path().to_path_buf()));
        let sessions = reader.extract("ws1").unwrap();
        let turns = &sessions[0].turns;
        assert_eq!(turns.len(), 3);
        // timestamps carry forward from the first bubble
        assert_eq!(turns[1].timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(turns[2].timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(turns[1].model_id.as_deref(), Some("gpt-4o"));
        assert_eq!(turns[0].model_id, None);

        let edit = &turns[1].code_edits[0];
        assert_eq!(edit.code_before.as_deref(), Some("let x = 1;"));
        assert_eq!(edit.code_after.as_deref(), Some("let y = 1;"));
        assert!(edit.diff.is_some());
    }

    #[test]
    fn test_unchanged_block_emits_no_edit() {
        let block = CodeBlock {
            file_path: "/p/a.py".into(),
            content: "same".into(),
            language_id: "python".into(),
            codeblock_id: "cb".into(),
        };
        let mut states = HashMap::new();
        states.insert("/p/a.py".to_string(), "same".to_string());
        assert!(code_edits(&[&block], &HashMap::new(), &states).is_empty());
        assert_eq!(code_edits(&[&block], &HashMap::new(), &HashMap::new()).len(), 1);
    }

    #[test]
    fn test_missing_workspace_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let reader = CursorReader::new(Some(root.path().to_path_buf()));
        assert!(!reader.is_available());
        assert!(reader.scan(&WorkspaceSelector::All).unwrap().is_empty());
        let err = reader.extract("nope").unwrap_err();
        assert!(matches!(err.downcast_ref::<GennieError>(), Some(GennieError::SourceUnavailable { .. })));
    }
}
