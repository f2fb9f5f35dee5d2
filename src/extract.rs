//! Extraction orchestrator
//!
//! Resolves a workspace across every reader that knows its folder, runs the
//! readers, enriches the merged turn stream and hands it to the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::code::count_loc;
use crate::context::RunContext;
use crate::enrich::enrich_turns;
use crate::error::{GennieError, GennieResult};
use crate::index::backfill;
use crate::jobs::{CancelFlag, Progress};
use crate::model::{EnrichedTurn, Turn, WorkspaceRecord, WorkspaceSummary};
use crate::reader::{ReaderRegistry, WorkspaceSelector};
use crate::store::{TurnStore, WorkspaceInfo};
use crate::text::paths::{folder_key, folder_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceExtractionResult {
    pub status: ExtractionStatus,
    pub workspace_id: String,
    pub workspace_name: String,
    pub workspace_folder: String,
    pub agents: Vec<String>,
    pub session_count: usize,
    pub turn_count: usize,
    pub combined_count: usize,
    pub duration_ms: i64,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl WorkspaceExtractionResult {
    fn new(status: ExtractionStatus, workspace_id: &str) -> Self {
        Self {
            status,
            workspace_id: workspace_id.to_string(),
            workspace_name: String::new(),
            workspace_folder: String::new(),
            agents: Vec::new(),
            session_count: 0,
            turn_count: 0,
            combined_count: 0,
            duration_ms: 0,
            reason: None,
            error: None,
        }
    }

    fn failed(workspace_id: &str, error: impl Into<String>) -> Self {
        let mut result = Self::new(ExtractionStatus::Failed, workspace_id);
        result.error = Some(error.into());
        result
    }

    fn for_record(mut self, record: &WorkspaceRecord) -> Self {
        self.workspace_name = record.name.clone();
        self.workspace_folder = record.folder.clone();
        self.agents = record.agents.keys().cloned().collect();
        self
    }
}

/// Turns of one workspace, enriched and stamped with its canonical identity
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: WorkspaceRecord,
    /// Agents that were asked to extract
    pub agents: Vec<String>,
    pub session_count: usize,
    pub turns: Vec<EnrichedTurn>,
    pub duration_ms: i64,
}

/// Cheap to clone; bulk runs hand copies to blocking tasks
#[derive(Clone)]
pub struct Extractor {
    registry: Arc<ReaderRegistry>,
    ctx: Arc<RunContext>,
}

impl Extractor {
    pub fn new(registry: Arc<ReaderRegistry>, ctx: Arc<RunContext>) -> Self {
        Self { registry, ctx }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn summaries(&self, selector: &WorkspaceSelector) -> Vec<WorkspaceSummary> {
        let mut all = Vec::new();
        for reader in self.registry.available_readers() {
            match reader.scan(selector) {
                Ok(found) => all.extend(found),
                Err(e) => tracing::warn!("{} scan failed: {:#}", reader.name(), e),
            }
        }
        all
    }

    /// Workspaces from every reader, merged by id and then by folder
    pub fn scan_all(&self, selector: &WorkspaceSelector) -> Vec<WorkspaceRecord> {
        merge_workspaces(self.summaries(selector))
    }

    /// Resolve `workspace_id` by exact match, then pull in agents whose
    /// workspace shares the matched folder
    pub fn find_workspace(&self, workspace_id: &str) -> Option<WorkspaceRecord> {
        let summaries = self.summaries(&WorkspaceSelector::All);

        let mut matches: Vec<&WorkspaceSummary> = Vec::new();
        for summary in summaries.iter().filter(|s| s.workspace_id == workspace_id) {
            if !matches.iter().any(|m| m.agent == summary.agent) {
                matches.push(summary);
            }
        }
        let first = *matches.first()?;
        let target = matches
            .iter()
            .find(|m| !m.folder.is_empty())
            .map(|m| folder_key(&m.folder));

        if let Some(target) = target {
            for summary in &summaries {
                if matches.iter().any(|m| m.agent == summary.agent) {
                    continue;
                }
                if !summary.folder.is_empty() && folder_key(&summary.folder) == target {
                    matches.push(summary);
                }
            }
        }

        let name = if first.name.is_empty() {
            folder_name(&first.folder)
        } else {
            first.name.clone()
        };
        Some(WorkspaceRecord {
            id: workspace_id.to_string(),
            name,
            folder: first.folder.clone(),
            agents: matches
                .iter()
                .map(|m| (m.agent.clone(), m.workspace_id.clone()))
                .collect(),
            session_count: matches.iter().map(|m| m.session_count).sum(),
            last_modified: matches.iter().filter_map(|m| m.last_modified).max(),
        })
    }

    /// Latest activity per contributing agent
    pub fn latest_activity(&self, record: &WorkspaceRecord) -> BTreeMap<String, Option<DateTime<Utc>>> {
        record
            .agents
            .iter()
            .map(|(agent, native_id)| {
                let latest = self.registry.get(agent).and_then(|r| r.latest_activity(native_id));
                (agent.clone(), latest)
            })
            .collect()
    }

    /// Extract and enrich every contributing agent's sessions.
    ///
    /// A reader that fails contributes nothing; the others carry on. No turns
    /// at all is a valid, empty result.
    pub fn extract(&self, workspace_id: &str, agent_filter: Option<&str>) -> GennieResult<Extraction> {
        let record = self
            .find_workspace(workspace_id)
            .ok_or_else(|| GennieError::Validation(format!("workspace {} not found", workspace_id)))?;
        self.extract_record(record, agent_filter)
    }

    pub fn extract_record(&self, record: WorkspaceRecord, agent_filter: Option<&str>) -> GennieResult<Extraction> {
        let started = Instant::now();
        let agents: Vec<(String, String)> = match agent_filter {
            Some(agent) => match record.agents.get(agent) {
                Some(native_id) => vec![(agent.to_string(), native_id.clone())],
                None => {
                    return Err(GennieError::Validation(format!(
                        "agent {} has no sessions in workspace {} (available: {})",
                        agent,
                        record.id,
                        record.agent_names().join(", ")
                    )))
                }
            },
            None => record.agents.iter().map(|(a, id)| (a.clone(), id.clone())).collect(),
        };

        let mut turns: Vec<Turn> = Vec::new();
        let mut session_count = 0;
        for (agent, native_id) in &agents {
            let Some(reader) = self.registry.get(agent) else {
                tracing::warn!("no reader registered for {}", agent);
                continue;
            };
            match reader.extract(native_id) {
                Ok(sessions) => {
                    for session in sessions.into_iter().filter(|s| !s.turns.is_empty()) {
                        session_count += 1;
                        turns.extend(session.turns);
                    }
                }
                Err(e) => match e.downcast_ref::<GennieError>() {
                    Some(GennieError::SourceUnavailable { .. }) => {
                        tracing::warn!("{} contributes nothing to {}: {}", agent, record.id, e)
                    }
                    _ => tracing::warn!("{} extraction failed for {}: {:#}", agent, native_id, e),
                },
            }
            reader.cleanup();
        }

        for turn in &mut turns {
            turn.workspace_id = record.id.clone();
            turn.workspace_name = record.name.clone();
            turn.workspace_folder = record.folder.clone();
        }
        tracing::info!(
            "extracted {} sessions, {} turns from {} for {}",
            session_count,
            turns.len(),
            agents.iter().map(|(a, _)| a.as_str()).collect::<Vec<_>>().join("+"),
            record.id
        );

        let turns = enrich_turns(turns, &self.ctx);
        Ok(Extraction {
            agents: agents.into_iter().map(|(a, _)| a).collect(),
            record,
            session_count,
            turns,
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }

    /// Resolve, extract and store one workspace
    pub fn extract_and_store(
        &self,
        store: &TurnStore,
        workspace_id: &str,
        agent_filter: Option<&str>,
        force_refresh: bool,
    ) -> WorkspaceExtractionResult {
        let started = Instant::now();
        let Some(record) = self.find_workspace(workspace_id) else {
            tracing::error!("workspace not found: {}", workspace_id);
            return WorkspaceExtractionResult::failed(workspace_id, "workspace_not_found");
        };
        if let Some(skipped) = already_stored(store, &record, force_refresh) {
            return skipped;
        }

        let mut result = match self.extract_record(record.clone(), agent_filter) {
            Ok(extraction) => self.store_extraction(store, extraction, force_refresh),
            Err(e) => WorkspaceExtractionResult::failed(workspace_id, e.to_string()).for_record(&record),
        };
        result.duration_ms = started.elapsed().as_millis() as i64;
        result
    }

    /// Write an extraction: turns, workspace_info and, when configured, embeddings
    pub fn store_extraction(
        &self,
        store: &TurnStore,
        extraction: Extraction,
        force_refresh: bool,
    ) -> WorkspaceExtractionResult {
        let record = &extraction.record;
        let mut result = WorkspaceExtractionResult::new(ExtractionStatus::Success, &record.id).for_record(record);
        result.agents = extraction.agents.clone();
        result.duration_ms = extraction.duration_ms;

        if extraction.turns.is_empty() {
            result.status = ExtractionStatus::Skipped;
            result.reason = Some("no_sessions".to_string());
            return result;
        }

        let written = if force_refresh {
            store.replace_workspace_turns(&record.id, &extraction.turns)
        } else {
            store.insert_turns(&extraction.turns)
        };
        if let Err(e) = written {
            tracing::error!("storing {} failed: {}", record.id, e);
            result.status = ExtractionStatus::Failed;
            result.error = Some(e.to_string());
            return result;
        }

        result.session_count = extraction.session_count;
        result.turn_count = extraction.turns.len();
        result.combined_count = store.count_combined(&record.id).unwrap_or_else(|e| {
            tracing::warn!("cannot count exchanges for {}: {}", record.id, e);
            0
        });

        let loc = count_loc(Path::new(&record.folder));
        let info = WorkspaceInfo {
            workspace_id: record.id.clone(),
            name: record.name.clone(),
            folder: record.folder.clone(),
            agents: extraction.agents.join("+"),
            extraction_duration_ms: extraction.duration_ms,
            session_count: result.session_count,
            turn_count: result.turn_count,
            code_loc: loc.code,
            doc_loc: loc.doc,
        };
        if let Err(e) = store.upsert_workspace_info(&info) {
            tracing::warn!("workspace info for {} not saved: {}", record.id, e);
        }

        if self.ctx.config.search.auto_embed_on_extraction {
            self.auto_embed(store, &record.id);
        }
        result
    }

    /// Embed the freshly stored id range. Failures are logged only.
    fn auto_embed(&self, store: &TurnStore, workspace_id: &str) {
        let range = match store.turn_id_range(workspace_id) {
            Ok(Some(range)) => range,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("auto-embed skipped for {}: {}", workspace_id, e);
                return;
            }
        };
        let outcome = backfill(
            store,
            self.ctx.embedder.as_ref(),
            self.ctx.config.search.embedding_batch_size,
            Some(range),
            &CancelFlag::new(),
            &Progress::new(),
        );
        if let Err(e) = outcome {
            tracing::warn!("auto-embed failed for {}: {:#}", workspace_id, e);
        }
    }

    /// Extract several workspaces. Reader and enrichment work runs on blocking
    /// tasks; writes go through `store` one workspace at a time.
    pub async fn extract_many(
        &self,
        store: &TurnStore,
        workspace_ids: Vec<String>,
        agent_filter: Option<String>,
        force_refresh: bool,
        cancel: &CancelFlag,
        progress: &Progress,
    ) -> Vec<WorkspaceExtractionResult> {
        progress.set_total(workspace_ids.len());
        tracing::info!(job = %progress.job_id, "extracting {} workspaces", workspace_ids.len());

        let mut results = Vec::with_capacity(workspace_ids.len());
        for workspace_id in workspace_ids {
            if cancel.is_cancelled() {
                tracing::warn!(job = %progress.job_id, "extraction cancelled after {} workspaces", progress.done());
                break;
            }
            let started = Instant::now();
            let Some(record) = self.find_workspace(&workspace_id) else {
                results.push(WorkspaceExtractionResult::failed(&workspace_id, "workspace_not_found"));
                progress.advance(1);
                continue;
            };
            if let Some(skipped) = already_stored(store, &record, force_refresh) {
                results.push(skipped);
                progress.advance(1);
                continue;
            }

            let worker = self.clone();
            let filter = agent_filter.clone();
            let fallback = record.clone();
            let joined =
                tokio::task::spawn_blocking(move || worker.extract_record(record, filter.as_deref())).await;
            let mut result = match joined {
                Ok(Ok(extraction)) => self.store_extraction(store, extraction, force_refresh),
                Ok(Err(e)) => WorkspaceExtractionResult::failed(&workspace_id, e.to_string()).for_record(&fallback),
                Err(e) => WorkspaceExtractionResult::failed(&workspace_id, format!("extraction task failed: {}", e))
                    .for_record(&fallback),
            };
            result.duration_ms = started.elapsed().as_millis() as i64;
            results.push(result);
            progress.advance(1);
        }
        results
    }
}

fn already_stored(store: &TurnStore, record: &WorkspaceRecord, force_refresh: bool) -> Option<WorkspaceExtractionResult> {
    if force_refresh {
        return None;
    }
    match store.workspace_exists(&record.id) {
        Ok(true) => {
            tracing::info!("{} already extracted, skipping", record.id);
            let mut result = WorkspaceExtractionResult::new(ExtractionStatus::Skipped, &record.id).for_record(record);
            result.reason = Some("already_extracted".to_string());
            result.turn_count = store.count_turns(Some(&record.id)).unwrap_or(0);
            result.combined_count = store.count_combined(&record.id).unwrap_or(0);
            Some(result)
        }
        Ok(false) => None,
        Err(e) => Some(WorkspaceExtractionResult::failed(&record.id, e.to_string()).for_record(record)),
    }
}

/// Merge per-agent summaries: first by workspace id, then by normalized
/// folder. The shorter id wins a folder merge.
pub fn merge_workspaces(summaries: Vec<WorkspaceSummary>) -> Vec<WorkspaceRecord> {
    let mut by_id: Vec<WorkspaceRecord> = Vec::new();
    let mut id_index: HashMap<String, usize> = HashMap::new();
    for summary in summaries {
        let idx = *id_index.entry(summary.workspace_id.clone()).or_insert_with(|| {
            by_id.push(WorkspaceRecord {
                id: summary.workspace_id.clone(),
                name: summary.name.clone(),
                folder: summary.folder.clone(),
                agents: BTreeMap::new(),
                session_count: 0,
                last_modified: None,
            });
            by_id.len() - 1
        });
        let record = &mut by_id[idx];
        record
            .agents
            .entry(summary.agent.clone())
            .or_insert_with(|| summary.workspace_id.clone());
        record.session_count += summary.session_count;
        record.last_modified = record.last_modified.max(summary.last_modified);
    }

    let mut merged: Vec<WorkspaceRecord> = Vec::new();
    let mut folder_index: HashMap<String, usize> = HashMap::new();
    for record in by_id {
        if record.folder.is_empty() {
            merged.push(record);
            continue;
        }
        match folder_index.get(&folder_key(&record.folder)) {
            None => {
                folder_index.insert(folder_key(&record.folder), merged.len());
                merged.push(record);
            }
            Some(&idx) => {
                let target = &mut merged[idx];
                for (agent, native_id) in record.agents {
                    target.agents.entry(agent).or_insert(native_id);
                }
                target.session_count += record.session_count;
                target.last_modified = target.last_modified.max(record.last_modified);
                if record.id.len() < target.id.len() {
                    target.id = record.id;
                }
            }
        }
    }
    for record in &mut merged {
        if record.name.is_empty() {
            record.name = folder_name(&record.folder);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, MergePolicy, RawMessage, SessionInfo};
    use crate::reader::{RawSession, SourceReader};
    use anyhow::{bail, Result};
    use tempfile::TempDir;

    struct StubReader {
        name: &'static str,
        workspaces: Vec<(String, String, usize)>,
        sessions: Vec<(&'static str, Vec<RawMessage>)>,
        fail: bool,
        gone: bool,
    }

    impl StubReader {
        fn new(name: &'static str, id: &str, folder: &str) -> Self {
            Self {
                name,
                workspaces: vec![(id.to_string(), folder.to_string(), 1)],
                sessions: Vec::new(),
                fail: false,
                gone: false,
            }
        }

        fn with_session(mut self, id: &'static str, messages: Vec<RawMessage>) -> Self {
            self.sessions.push((id, messages));
            self
        }
    }

    impl SourceReader for StubReader {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn scan(&self, selector: &WorkspaceSelector) -> Result<Vec<WorkspaceSummary>> {
            Ok(self
                .workspaces
                .iter()
                .map(|(id, folder, sessions)| WorkspaceSummary {
                    agent: self.name.to_string(),
                    workspace_id: id.clone(),
                    name: String::new(),
                    folder: folder.clone(),
                    session_count: *sessions,
                    last_modified: None,
                })
                .filter(|s| selector.matches(s))
                .collect())
        }

        fn extract(&self, workspace_id: &str) -> Result<Vec<RawSession>> {
            if self.fail {
                bail!("corrupt store");
            }
            if self.gone {
                return Err(GennieError::SourceUnavailable {
                    agent: self.name.to_string(),
                    path: format!("/stub/{}", workspace_id).into(),
                }
                .into());
            }
            Ok(self
                .sessions
                .iter()
                .map(|(id, messages)| {
                    let info = SessionInfo {
                        session_id: format!("{}-{}-{}", self.name, workspace_id, id),
                        session_name: id.to_string(),
                        workspace_id: workspace_id.to_string(),
                        workspace_name: "native".into(),
                        workspace_folder: "native".into(),
                        agent: self.name.to_string(),
                    };
                    RawSession {
                        turns: aggregate(messages.clone(), &MergePolicy::default(), &info),
                        info,
                    }
                })
                .collect())
        }
    }

    fn chat() -> Vec<RawMessage> {
        vec![
            RawMessage::user("run pytest").at(1_700_000_000_000),
            RawMessage::assistant("12 passed").at(1_700_000_004_000),
        ]
    }

    fn extractor(readers: Vec<StubReader>) -> Extractor {
        let mut registry = ReaderRegistry::empty();
        for reader in readers {
            registry.register(Box::new(reader));
        }
        Extractor::new(Arc::new(registry), Arc::new(RunContext::default()))
    }

    fn summary(agent: &str, id: &str, folder: &str, sessions: usize) -> WorkspaceSummary {
        WorkspaceSummary {
            agent: agent.into(),
            workspace_id: id.into(),
            name: String::new(),
            folder: folder.into(),
            session_count: sessions,
            last_modified: None,
        }
    }

    #[test]
    fn test_merge_by_folder_prefers_shorter_id() {
        let merged = merge_workspaces(vec![
            summary("claude_code", "-home-dev-shop", "/home/dev/shop", 2),
            summary("cursor", "a1b2", "/home/dev/Shop/", 3),
            summary("copilot", "a1b2", "/home/dev/shop", 1),
            summary("copilot", "solo", "", 1),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a1b2");
        assert_eq!(merged[0].session_count, 6);
        assert_eq!(merged[0].agent_names(), vec!["claude_code", "copilot", "cursor"]);
        assert_eq!(merged[0].agents["claude_code"], "-home-dev-shop");
        assert_eq!(merged[0].name, "shop");
        assert_eq!(merged[1].id, "solo");
    }

    #[test]
    fn test_find_workspace_adds_agents_sharing_folder() {
        let ex = extractor(vec![
            StubReader::new("cursor", "a1b2", "/home/dev/shop"),
            StubReader::new("claude_code", "-home-dev-shop", "/home/dev/shop"),
            StubReader::new("copilot", "other", "/home/dev/other"),
        ]);
        let record = ex.find_workspace("a1b2").unwrap();
        assert_eq!(record.agent_names(), vec!["claude_code", "cursor"]);
        assert_eq!(record.session_count, 2);
        assert!(ex.find_workspace("missing").is_none());
    }

    #[test]
    fn test_failing_reader_is_isolated() {
        let mut broken = StubReader::new("copilot", "a1b2", "/home/dev/shop").with_session("x", chat());
        broken.fail = true;
        let ex = extractor(vec![
            StubReader::new("cursor", "a1b2", "/home/dev/shop").with_session("c1", chat()),
            broken,
        ]);
        let extraction = ex.extract("a1b2", None).unwrap();
        assert_eq!(extraction.session_count, 1);
        assert_eq!(extraction.turns.len(), 2);
        assert!(extraction.turns.iter().all(|t| t.base.workspace_id == "a1b2"));
        assert_eq!(extraction.turns[0].base.workspace_folder, "/home/dev/shop");
        assert_eq!(extraction.turns[1].responding_to_turn, Some(0));
    }

    #[test]
    fn test_vanished_source_contributes_nothing() {
        let mut gone = StubReader::new("claude_code", "-home-dev-shop", "/home/dev/shop").with_session("k1", chat());
        gone.gone = true;
        let ex = extractor(vec![
            StubReader::new("cursor", "a1b2", "/home/dev/shop").with_session("c1", chat()),
            gone,
        ]);
        let extraction = ex.extract("a1b2", None).unwrap();
        assert_eq!(extraction.session_count, 1);
        assert!(extraction.turns.iter().all(|t| t.base.agent == "cursor"));
    }

    #[test]
    fn test_unknown_agent_filter_is_rejected() {
        let ex = extractor(vec![StubReader::new("cursor", "a1b2", "/home/dev/shop")]);
        let err = ex.extract("a1b2", Some("copilot")).unwrap_err();
        assert!(matches!(err, GennieError::Validation(_)));
    }

    #[test]
    fn test_empty_workspace_is_not_an_error() {
        let ex = extractor(vec![StubReader::new("cursor", "a1b2", "/home/dev/shop")]);
        let extraction = ex.extract("a1b2", None).unwrap();
        assert!(extraction.turns.is_empty());

        let dir = TempDir::new().unwrap();
        let store = TurnStore::open(&dir.path().join("gennie.db")).unwrap();
        let result = ex.extract_and_store(&store, "a1b2", None, false);
        assert_eq!(result.status, ExtractionStatus::Skipped);
        assert_eq!(result.reason.as_deref(), Some("no_sessions"));
    }

    #[test]
    fn test_extract_and_store_then_skip_then_refresh() {
        let ex = extractor(vec![
            StubReader::new("cursor", "a1b2", "/home/dev/shop").with_session("c1", chat()),
            StubReader::new("claude_code", "-home-dev-shop", "/home/dev/shop").with_session("k1", chat()),
        ]);
        let dir = TempDir::new().unwrap();
        let store = TurnStore::open(&dir.path().join("gennie.db")).unwrap();

        let first = ex.extract_and_store(&store, "a1b2", None, false);
        assert_eq!(first.status, ExtractionStatus::Success);
        assert_eq!((first.session_count, first.turn_count, first.combined_count), (2, 4, 2));
        assert_eq!(store.list_workspaces().unwrap()[0].info.agents, "claude_code+cursor");

        let second = ex.extract_and_store(&store, "a1b2", None, false);
        assert_eq!(second.status, ExtractionStatus::Skipped);
        assert_eq!(second.reason.as_deref(), Some("already_extracted"));
        assert_eq!(second.turn_count, 4);

        let (_, old_max) = store.turn_id_range("a1b2").unwrap().unwrap();
        let third = ex.extract_and_store(&store, "a1b2", None, true);
        assert_eq!(third.status, ExtractionStatus::Success);
        let (new_min, _) = store.turn_id_range("a1b2").unwrap().unwrap();
        assert!(new_min > old_max);
        assert_eq!(store.count_turns(Some("a1b2")).unwrap(), 4);

        let missing = ex.extract_and_store(&store, "nope", None, false);
        assert_eq!(missing.status, ExtractionStatus::Failed);
        assert_eq!(missing.error.as_deref(), Some("workspace_not_found"));
    }

    #[tokio::test]
    async fn test_extract_many_runs_each_workspace() {
        let mut reader = StubReader::new("cursor", "a1b2", "/home/dev/shop").with_session("c1", chat());
        reader.workspaces.push(("c3d4".into(), "/home/dev/blog".into(), 1));
        let ex = extractor(vec![reader]);
        let dir = TempDir::new().unwrap();
        let store = TurnStore::open(&dir.path().join("gennie.db")).unwrap();

        let progress = Progress::new();
        let results = ex
            .extract_many(
                &store,
                vec!["a1b2".into(), "c3d4".into(), "zzzz".into()],
                None,
                false,
                &CancelFlag::new(),
                &progress,
            )
            .await;
        let statuses: Vec<ExtractionStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ExtractionStatus::Success, ExtractionStatus::Success, ExtractionStatus::Failed]
        );
        assert_eq!(progress.done(), 3);
    }
}
