//! Code-edit reconstruction from recorded editing timelines
//!
//! An editing session may record file history in up to three ways. They are
//! tried in priority order and the first one that yields edits wins:
//! 1. per-request baselines, each diffed against the next (or the final snapshot)
//! 2. whole-session initial vs. current snapshot per file
//! 3. linear history stops with original/current content hashes

use std::path::PathBuf;

use crate::model::{CodeEdit, Role, Turn};
use crate::text::paths::decode_file_uri;

/// Hash of the empty file as recorded by editors (SHA-1 of "")
pub const EMPTY_HASH_PREFIX: &str = "da39a3e";

/// Resolves a recorded content token to file text
pub trait ContentStore {
    fn resolve(&self, token: &str) -> String;
}

/// Content-addressed `contents/<hash>` directory.
///
/// Unknown tokens are returned verbatim since some records inline the text.
pub struct ContentDir {
    dir: PathBuf,
}

impl ContentDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ContentStore for ContentDir {
    fn resolve(&self, token: &str) -> String {
        if token.is_empty() || token.starts_with(EMPTY_HASH_PREFIX) {
            return String::new();
        }
        // tokens that look like paths are never hashes
        if token.contains(&['/', '\\', '\n'][..]) {
            return token.to_string();
        }
        let path = self.dir.join(token);
        if path.is_file() {
            return std::fs::read_to_string(&path).unwrap_or_else(|e| {
                tracing::debug!("unreadable content {}: {}", path.display(), e);
                String::new()
            });
        }
        token.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub uri: String,
    pub request_id: String,
    pub epoch: i64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub uri: String,
    pub initial: String,
    pub current: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearEntry {
    pub uri: String,
    pub request_id: String,
    pub original: String,
    pub current: String,
}

/// Every representation one editing session recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditHistory {
    pub baselines: Vec<Baseline>,
    pub snapshot: Vec<SnapshotEntry>,
    pub linear: Vec<LinearEntry>,
}

/// An edit together with the request that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedEdit {
    pub request_id: String,
    pub edit: CodeEdit,
}

pub fn reconstruct(history: &EditHistory, store: &dyn ContentStore) -> Vec<AttributedEdit> {
    let edits = from_baselines(history, store);
    if !edits.is_empty() {
        return edits;
    }
    let edits = from_snapshot(history, store);
    if !edits.is_empty() {
        return edits;
    }
    from_linear(history, store)
}

fn materialize(uri: &str, request_id: &str, before: String, after: String) -> Option<AttributedEdit> {
    let path = decode_file_uri(uri);
    CodeEdit::between(&path, &before, &after).map(|edit| AttributedEdit {
        request_id: request_id.to_string(),
        edit,
    })
}

fn from_baselines(history: &EditHistory, store: &dyn ContentStore) -> Vec<AttributedEdit> {
    // group per uri, first-seen order
    let mut groups: Vec<(&str, Vec<&Baseline>)> = Vec::new();
    for baseline in &history.baselines {
        match groups.iter_mut().find(|(uri, _)| *uri == baseline.uri) {
            Some((_, list)) => list.push(baseline),
            None => groups.push((&baseline.uri, vec![baseline])),
        }
    }

    let mut edits = Vec::new();
    for (uri, mut list) in groups {
        list.sort_by_key(|b| b.epoch);
        let final_token = history
            .snapshot
            .iter()
            .find(|e| e.uri == uri)
            .map(|e| e.current.as_str())
            .unwrap_or("");

        for (i, baseline) in list.iter().enumerate() {
            let after_token = list.get(i + 1).map_or(final_token, |next| next.content.as_str());
            let before = store.resolve(&baseline.content);
            let after = store.resolve(after_token);
            edits.extend(materialize(uri, &baseline.request_id, before, after));
        }
    }
    edits
}

fn from_snapshot(history: &EditHistory, store: &dyn ContentStore) -> Vec<AttributedEdit> {
    history
        .snapshot
        .iter()
        .filter(|e| e.initial != e.current)
        .filter_map(|e| materialize(&e.uri, &e.request_id, store.resolve(&e.initial), store.resolve(&e.current)))
        .collect()
}

fn from_linear(history: &EditHistory, store: &dyn ContentStore) -> Vec<AttributedEdit> {
    history
        .linear
        .iter()
        .filter(|e| e.original != e.current)
        .filter_map(|e| materialize(&e.uri, &e.request_id, store.resolve(&e.original), store.resolve(&e.current)))
        .collect()
}

/// Attach edits to the assistant turn sharing their request id.
///
/// Returns the number of edits with no matching turn; those are dropped.
pub fn attach_edits(turns: &mut [Turn], edits: Vec<AttributedEdit>) -> usize {
    let mut orphaned = 0;
    for attributed in edits {
        let target = turns.iter_mut().find(|t| {
            t.role == Role::Assistant
                && !attributed.request_id.is_empty()
                && (t.request_id.as_deref() == Some(attributed.request_id.as_str())
                    || t.merged_request_ids.contains(&attributed.request_id))
        });
        match target {
            Some(turn) => {
                let path = attributed.edit.file_path.clone();
                turn.code_edits.push(attributed.edit);
                if !turn.files.contains(&path) {
                    turn.files.push(path);
                }
            }
            None => orphaned += 1,
        }
    }
    orphaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapStore(HashMap<&'static str, &'static str>);

    impl ContentStore for MapStore {
        fn resolve(&self, token: &str) -> String {
            if token.is_empty() || token.starts_with(EMPTY_HASH_PREFIX) {
                return String::new();
            }
            self.0.get(token).map_or_else(|| token.to_string(), |s| s.to_string())
        }
    }

    fn store() -> MapStore {
        MapStore(HashMap::from([("h1", "v1"), ("h2", "v2"), ("h3", "v3")]))
    }

    fn baseline(req: &str, epoch: i64, content: &str) -> Baseline {
        Baseline {
            uri: "file:///proj/a.py".into(),
            request_id: req.into(),
            epoch,
            content: content.into(),
        }
    }

    #[test]
    fn test_baselines_sorted_by_epoch_and_chained() {
        let history = EditHistory {
            baselines: vec![baseline("r2", 20, "h2"), baseline("r1", 10, "h1")],
            snapshot: vec![SnapshotEntry {
                uri: "file:///proj/a.py".into(),
                initial: "h1".into(),
                current: "h3".into(),
                request_id: String::new(),
            }],
            linear: vec![],
        };
        let edits = reconstruct(&history, &store());
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].request_id, "r1");
        assert_eq!(edits[0].edit.code_before.as_deref(), Some("v1"));
        assert_eq!(edits[0].edit.code_after.as_deref(), Some("v2"));
        assert_eq!(edits[1].edit.code_after.as_deref(), Some("v3"));
        assert_eq!(edits[0].edit.file_path, "/proj/a.py");
        assert_eq!(edits[0].edit.language, "py");
    }

    #[test]
    fn test_snapshot_fallback_when_baselines_yield_nothing() {
        let history = EditHistory {
            baselines: vec![baseline("r1", 1, "h1")],
            snapshot: vec![SnapshotEntry {
                uri: "file:///proj/a.py".into(),
                initial: "da39a3ee5e6b".into(),
                current: "h1".into(),
                request_id: "r9".into(),
            }],
            linear: vec![],
        };
        // baseline h1 -> final h1 is a no-op, so the snapshot strategy runs
        let edits = reconstruct(&history, &store());
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].request_id, "r9");
        assert_eq!(edits[0].edit.code_before.as_deref(), Some(""));
    }

    #[test]
    fn test_linear_fallback_and_literal_tokens() {
        let history = EditHistory {
            linear: vec![
                LinearEntry {
                    uri: "file:///proj/b.rs".into(),
                    request_id: "r5".into(),
                    original: "h2".into(),
                    current: "literal new text".into(),
                },
                LinearEntry {
                    uri: "file:///proj/c.rs".into(),
                    request_id: "r5".into(),
                    original: "h3".into(),
                    current: "h3".into(),
                },
            ],
            ..Default::default()
        };
        let edits = reconstruct(&history, &store());
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].edit.code_after.as_deref(), Some("literal new text"));
    }

    #[test]
    fn test_content_dir_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123"), "stored").unwrap();
        let store = ContentDir::new(dir.path());
        assert_eq!(store.resolve("abc123"), "stored");
        assert_eq!(store.resolve(""), "");
        assert_eq!(store.resolve("da39a3ee5e6b4b0d"), "");
        assert_eq!(store.resolve("not-a-hash"), "not-a-hash");
    }

    #[test]
    fn test_attach_by_request_id() {
        let mut turns = vec![Turn {
            session_id: "s".into(),
            turn: 1,
            role: Role::Assistant,
            original_text: "done".into(),
            timestamp_ms: None,
            workspace_id: String::new(),
            workspace_name: String::new(),
            workspace_folder: String::new(),
            session_name: String::new(),
            agent: "copilot".into(),
            files: vec![],
            tools: vec![],
            code_edits: vec![],
            thinking_text: String::new(),
            thinking_duration_ms: None,
            model_id: None,
            request_id: Some("r1".into()),
            merged_request_ids: vec![],
            source_response_ms: None,
        }];
        let edits = vec![
            AttributedEdit {
                request_id: "r1".into(),
                edit: CodeEdit::between("/p/a.py", "a", "b").unwrap(),
            },
            AttributedEdit {
                request_id: "missing".into(),
                edit: CodeEdit::between("/p/b.py", "a", "b").unwrap(),
            },
        ];
        assert_eq!(attach_edits(&mut turns, edits), 1);
        assert_eq!(turns[0].code_edits.len(), 1);
        assert_eq!(turns[0].files, vec!["/p/a.py"]);
    }
}
