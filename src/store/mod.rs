//! Turn storage with SQLite
//!
//! - Turns are inserted per session and replaced per workspace inside one transaction
//! - The keyword index follows the turns table through triggers
//! - Embeddings and code metrics are deleted together with the turns they belong to

mod schema;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::embed::{blob_to_vec, vec_to_blob};
use crate::error::{GennieError, GennieResult};
use crate::model::{CodeEdit, EnrichedTurn, MetricDelta, Role};

pub use schema::SCHEMA;

/// Bound on bound parameters per `IN (...)` list
const ID_CHUNK: usize = 500;

pub struct TurnStore {
    conn: Connection,
}

impl TurnStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).context("creating schema")?;
        Ok(())
    }

    fn begin(&self) -> GennieResult<Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(GennieError::storage("begin transaction"))
    }

    // ============================================
    // TURNS
    // ============================================

    /// Insert turns, replacing any stored rows of the same sessions.
    /// Returns the number of turns written.
    pub fn insert_turns(&self, turns: &[EnrichedTurn]) -> GennieResult<usize> {
        let tx = self.begin()?;
        let sessions: BTreeSet<&str> = turns.iter().map(|t| t.base.session_id.as_str()).collect();
        for session_id in sessions {
            delete_session_rows(&tx, session_id)?;
        }
        let written = write_turns(&tx, turns)?;
        tx.commit().map_err(GennieError::storage("commit turns"))?;
        Ok(written)
    }

    /// Delete everything stored for a workspace and insert `turns` in its place.
    /// Either the whole replacement lands or nothing changes.
    pub fn replace_workspace_turns(&self, workspace_id: &str, turns: &[EnrichedTurn]) -> GennieResult<usize> {
        let tx = self.begin()?;
        delete_workspace_rows(&tx, workspace_id)?;
        let sessions: BTreeSet<&str> = turns.iter().map(|t| t.base.session_id.as_str()).collect();
        for session_id in sessions {
            delete_session_rows(&tx, session_id)?;
        }
        let written = write_turns(&tx, turns)?;
        tx.commit().map_err(GennieError::storage("commit replacement"))?;
        Ok(written)
    }

    /// Remove turns, embeddings, code metrics and the workspace_info row
    pub fn delete_workspace(&self, workspace_id: &str) -> GennieResult<usize> {
        let tx = self.begin()?;
        let deleted = delete_workspace_rows(&tx, workspace_id)?;
        tx.execute("DELETE FROM workspace_info WHERE workspace_id = ?", params![workspace_id])
            .map_err(GennieError::storage("delete workspace info"))?;
        tx.commit().map_err(GennieError::storage("commit delete"))?;
        Ok(deleted)
    }

    pub fn workspace_exists(&self, workspace_id: &str) -> GennieResult<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM turns WHERE workspace_id = ?)",
                params![workspace_id],
                |row| row.get(0),
            )
            .map_err(GennieError::storage("check workspace"))
    }

    pub fn count_turns(&self, workspace_id: Option<&str>) -> GennieResult<usize> {
        let count: i64 = match workspace_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM turns WHERE workspace_id = ?",
                params![id],
                |row| row.get(0),
            ),
            None => self.conn.query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0)),
        }
        .map_err(GennieError::storage("count turns"))?;
        Ok(count as usize)
    }

    /// Number of user/assistant exchanges in the combined view
    pub fn count_combined(&self, workspace_id: &str) -> GennieResult<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM combined_turns WHERE workspace_id = ?",
                params![workspace_id],
                |row| row.get(0),
            )
            .map_err(GennieError::storage("count exchanges"))?;
        Ok(count as usize)
    }

    /// Lowest and highest row id stored for a workspace
    pub fn turn_id_range(&self, workspace_id: &str) -> GennieResult<Option<(i64, i64)>> {
        let range: (Option<i64>, Option<i64>) = self
            .conn
            .query_row(
                "SELECT MIN(id), MAX(id) FROM turns WHERE workspace_id = ?",
                params![workspace_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(GennieError::storage("turn id range"))?;
        Ok(match range {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        })
    }

    pub fn turn_id(&self, session_id: &str, turn: u32) -> GennieResult<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM turns WHERE session_id = ? AND turn = ?",
                params![session_id, turn],
                |row| row.get(0),
            )
            .optional()
            .map_err(GennieError::storage("lookup turn"))
    }

    pub fn session_turns(&self, session_id: &str) -> GennieResult<Vec<TurnRow>> {
        self.select_turns("WHERE t.session_id = ?1 ORDER BY t.turn", vec![SqlValue::Text(session_id.to_string())])
    }

    pub fn workspace_turns(&self, workspace_id: &str) -> GennieResult<Vec<TurnRow>> {
        self.select_turns(
            "WHERE t.workspace_id = ?1 ORDER BY t.session_id, t.turn",
            vec![SqlValue::Text(workspace_id.to_string())],
        )
    }

    /// Rows for the given ids, in no particular order
    pub fn turns_by_ids(&self, ids: &[i64]) -> GennieResult<Vec<TurnRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let clause = format!("WHERE t.id IN ({})", placeholders(ids.len(), 1));
        self.select_turns(&clause, ids.iter().map(|id| SqlValue::Integer(*id)).collect())
    }

    fn select_turns(&self, clause: &str, args: Vec<SqlValue>) -> GennieResult<Vec<TurnRow>> {
        let sql = format!("SELECT {} FROM turns t {}", TURN_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql).map_err(GennieError::storage("load turns"))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), TurnRow::from_row)
            .map_err(GennieError::storage("load turns"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(GennieError::storage("load turns"))
    }

    // ============================================
    // WORKSPACES
    // ============================================

    /// Insert or refresh the workspace row. `created_at` keeps the first extraction time.
    pub fn upsert_workspace_info(&self, info: &WorkspaceInfo) -> GennieResult<()> {
        self.conn
            .execute(
                r#"INSERT INTO workspace_info
                   (workspace_id, workspace_name, workspace_folder, agent_used, extraction_duration_ms,
                    session_count, turn_count, total_code_loc, total_doc_loc, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'), datetime('now'))
                   ON CONFLICT(workspace_id) DO UPDATE SET
                       workspace_name = excluded.workspace_name,
                       workspace_folder = excluded.workspace_folder,
                       agent_used = excluded.agent_used,
                       extraction_duration_ms = excluded.extraction_duration_ms,
                       session_count = excluded.session_count,
                       turn_count = excluded.turn_count,
                       total_code_loc = excluded.total_code_loc,
                       total_doc_loc = excluded.total_doc_loc,
                       updated_at = datetime('now')"#,
                params![
                    info.workspace_id,
                    info.name,
                    info.folder,
                    info.agents,
                    info.extraction_duration_ms,
                    info.session_count as i64,
                    info.turn_count as i64,
                    info.code_loc as i64,
                    info.doc_loc as i64,
                ],
            )
            .map_err(GennieError::storage("upsert workspace info"))?;
        Ok(())
    }

    pub fn list_workspaces(&self) -> GennieResult<Vec<WorkspaceRow>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"SELECT workspace_id, workspace_name, workspace_folder, agent_used,
                          session_count, turn_count, total_code_loc, total_doc_loc,
                          extraction_duration_ms, created_at, updated_at
                   FROM workspace_info
                   ORDER BY updated_at DESC, workspace_id"#,
            )
            .map_err(GennieError::storage("list workspaces"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(WorkspaceRow {
                    info: WorkspaceInfo {
                        workspace_id: row.get(0)?,
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        folder: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        agents: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        session_count: row.get::<_, i64>(4)? as usize,
                        turn_count: row.get::<_, i64>(5)? as usize,
                        code_loc: row.get::<_, i64>(6)? as usize,
                        doc_loc: row.get::<_, i64>(7)? as usize,
                        extraction_duration_ms: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
                    },
                    created_at: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            })
            .map_err(GennieError::storage("list workspaces"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(GennieError::storage("list workspaces"))
    }

    // ============================================
    // KEYWORD INDEX
    // ============================================

    /// One page of keyword matches ordered by BM25, plus the total match count
    pub fn keyword_page(
        &self,
        query: &str,
        roles: &[Role],
        limit: usize,
        offset: usize,
    ) -> GennieResult<(usize, Vec<(TurnRow, f64)>)> {
        self.with_match_expr(query, |expr| {
            let total = self.keyword_count_raw(expr, roles)?;
            let hits = self.keyword_hits_raw(expr, roles, limit, offset)?;
            Ok((total, hits))
        })
    }

    /// Per-day counts of keyword matches with unique sessions and workspaces
    pub fn keyword_timeline(&self, query: &str, roles: &[Role]) -> GennieResult<Vec<TimelineRow>> {
        self.with_match_expr(query, |expr| {
            let (role_sql, mut args) = role_filter(roles, 2);
            args.insert(0, SqlValue::Text(expr.to_string()));
            let sql = format!(
                r#"SELECT DATE(t.timestamp_iso) AS day,
                          COUNT(*),
                          COUNT(DISTINCT t.session_id),
                          COUNT(DISTINCT COALESCE(t.workspace_name, t.workspace_id))
                   FROM turns_fts
                   JOIN turns t ON t.id = turns_fts.rowid
                   WHERE turns_fts MATCH ?1 AND t.timestamp_iso IS NOT NULL{}
                   GROUP BY day
                   ORDER BY day"#,
                role_sql
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
                Ok(TimelineRow {
                    date: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    count: row.get::<_, i64>(1)? as usize,
                    unique_sessions: row.get::<_, i64>(2)? as usize,
                    unique_workspaces: row.get::<_, i64>(3)? as usize,
                })
            })?;
            rows.collect()
        })
    }

    /// Per-day counts over a set of already-matched turns, in the same shape as
    /// [`TurnStore::keyword_timeline`]
    pub fn timeline_for_ids(&self, ids: &[i64]) -> GennieResult<Vec<TimelineRow>> {
        let mut days: BTreeMap<String, (usize, HashSet<String>, HashSet<String>)> = BTreeMap::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                r#"SELECT DATE(t.timestamp_iso), t.session_id, COALESCE(t.workspace_name, t.workspace_id)
                   FROM turns t
                   WHERE t.timestamp_iso IS NOT NULL AND t.id IN ({})"#,
                placeholders(chunk.len(), 1)
            );
            let mut stmt = self.conn.prepare(&sql).map_err(GennieError::storage("timeline"))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    ))
                })
                .map_err(GennieError::storage("timeline"))?;
            for row in rows {
                let (day, session, workspace) = row.map_err(GennieError::storage("timeline"))?;
                let entry = days.entry(day).or_default();
                entry.0 += 1;
                entry.1.insert(session);
                entry.2.insert(workspace);
            }
        }
        Ok(days
            .into_iter()
            .map(|(date, (count, sessions, workspaces))| TimelineRow {
                date,
                count,
                unique_sessions: sessions.len(),
                unique_workspaces: workspaces.len(),
            })
            .collect())
    }

    /// Run `f` with the raw query as an FTS expression, then again with the
    /// query quoted as one phrase when FTS rejects the syntax
    fn with_match_expr<T>(
        &self,
        query: &str,
        f: impl Fn(&str) -> rusqlite::Result<T>,
    ) -> GennieResult<T> {
        match f(query) {
            Ok(out) => Ok(out),
            Err(e) if is_missing_index(&e) => Err(GennieError::keyword_index_missing()),
            Err(e) => {
                tracing::debug!("FTS rejected {:?} ({}), retrying as a phrase", query, e);
                f(&quote_phrase(query)).map_err(|e| {
                    if is_missing_index(&e) {
                        GennieError::keyword_index_missing()
                    } else {
                        GennieError::StorageFailure {
                            step: "keyword search",
                            source: e,
                        }
                    }
                })
            }
        }
    }

    fn keyword_count_raw(&self, expr: &str, roles: &[Role]) -> rusqlite::Result<usize> {
        let (role_sql, mut args) = role_filter(roles, 2);
        args.insert(0, SqlValue::Text(expr.to_string()));
        let sql = format!(
            "SELECT COUNT(*) FROM turns_fts JOIN turns t ON t.id = turns_fts.rowid WHERE turns_fts MATCH ?1{}",
            role_sql
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn keyword_hits_raw(
        &self,
        expr: &str,
        roles: &[Role],
        limit: usize,
        offset: usize,
    ) -> rusqlite::Result<Vec<(TurnRow, f64)>> {
        let (role_sql, mut args) = role_filter(roles, 2);
        args.insert(0, SqlValue::Text(expr.to_string()));
        let next = args.len() + 1;
        args.push(SqlValue::Integer(limit as i64));
        args.push(SqlValue::Integer(offset as i64));
        let sql = format!(
            r#"SELECT {}, bm25(turns_fts) AS rank
               FROM turns_fts
               JOIN turns t ON t.id = turns_fts.rowid
               WHERE turns_fts MATCH ?1{}
               ORDER BY rank ASC, t.id ASC
               LIMIT ?{} OFFSET ?{}"#,
            TURN_COLUMNS,
            role_sql,
            next,
            next + 1
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((TurnRow::from_row(row)?, row.get::<_, f64>(TURN_COLUMN_COUNT)?))
        })?;
        rows.collect()
    }

    /// Drop every posting and re-index all turns. Returns the number of turns indexed.
    pub fn rebuild_keyword_index(&self) -> GennieResult<usize> {
        let tx = self.begin()?;
        tx.execute("INSERT INTO turns_fts(turns_fts) VALUES('delete-all')", [])
            .map_err(|e| {
                if is_missing_index(&e) {
                    GennieError::keyword_index_missing()
                } else {
                    GennieError::StorageFailure { step: "clear keyword index", source: e }
                }
            })?;
        let indexed = tx
            .execute(
                "INSERT INTO turns_fts(rowid, original_text) SELECT id, COALESCE(original_text, text, '') FROM turns",
                [],
            )
            .map_err(GennieError::storage("rebuild keyword index"))?;
        tx.commit().map_err(GennieError::storage("commit keyword index"))?;
        Ok(indexed)
    }

    // ============================================
    // SEMANTIC INDEX
    // ============================================

    /// Turns with non-empty text and the hash stored for `model`, if any, ordered by id
    pub fn embedding_candidates(
        &self,
        model: &str,
        range: Option<(i64, i64)>,
    ) -> GennieResult<Vec<EmbeddingCandidate>> {
        let mut sql = String::from(
            r#"SELECT t.id, COALESCE(t.original_text, t.text, ''), e.text_hash
               FROM turns t
               LEFT JOIN turn_embeddings e ON e.turn_id = t.id AND e.model = ?1
               WHERE COALESCE(t.original_text, t.text, '') != ''"#,
        );
        let mut args = vec![SqlValue::Text(model.to_string())];
        if let Some((lo, hi)) = range {
            sql.push_str(" AND t.id BETWEEN ?2 AND ?3");
            args.push(SqlValue::Integer(lo));
            args.push(SqlValue::Integer(hi));
        }
        sql.push_str(" ORDER BY t.id");

        let mut stmt = self.conn.prepare(&sql).map_err(GennieError::storage("load embedding candidates"))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(EmbeddingCandidate {
                    turn_id: row.get(0)?,
                    text: row.get(1)?,
                    stored_hash: row.get(2)?,
                })
            })
            .map_err(GennieError::storage("load embedding candidates"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(GennieError::storage("load embedding candidates"))
    }

    pub fn upsert_embeddings(&self, model: &str, batch: &[NewEmbedding]) -> GennieResult<()> {
        let tx = self.begin()?;
        {
            let mut stmt = tx
                .prepare(
                    r#"INSERT INTO turn_embeddings (turn_id, model, dims, embedding, text_hash, updated_at)
                       VALUES (?, ?, ?, ?, ?, datetime('now'))
                       ON CONFLICT(turn_id, model) DO UPDATE SET
                           dims = excluded.dims,
                           embedding = excluded.embedding,
                           text_hash = excluded.text_hash,
                           updated_at = datetime('now')"#,
                )
                .map_err(GennieError::storage("write embeddings"))?;
            for item in batch {
                stmt.execute(params![
                    item.turn_id,
                    model,
                    item.vector.len() as i64,
                    vec_to_blob(&item.vector),
                    item.text_hash,
                ])
                .map_err(GennieError::storage("write embeddings"))?;
            }
        }
        tx.commit().map_err(GennieError::storage("commit embeddings"))?;
        Ok(())
    }

    pub fn has_embeddings(&self, model: &str) -> GennieResult<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM turn_embeddings WHERE model = ?)",
                params![model],
                |row| row.get(0),
            )
            .map_err(GennieError::storage("check embeddings"))
    }

    /// Every stored vector for `model` whose turn passes the role filter.
    /// Rows whose blob length disagrees with `dims` are skipped.
    pub fn embeddings(&self, model: &str, roles: &[Role]) -> GennieResult<Vec<(i64, Vec<f32>)>> {
        let (role_sql, mut args) = role_filter(roles, 2);
        args.insert(0, SqlValue::Text(model.to_string()));
        let sql = format!(
            r#"SELECT e.turn_id, e.dims, e.embedding
               FROM turn_embeddings e
               JOIN turns t ON t.id = e.turn_id
               WHERE e.model = ?1{}"#,
            role_sql
        );
        let mut stmt = self.conn.prepare(&sql).map_err(GennieError::storage("load embeddings"))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let dims: i64 = row.get(1)?;
                let blob: Vec<u8> = row.get(2)?;
                Ok((row.get::<_, i64>(0)?, dims, blob))
            })
            .map_err(GennieError::storage("load embeddings"))?;

        let mut out = Vec::new();
        for row in rows {
            let (turn_id, dims, blob) = row.map_err(GennieError::storage("load embeddings"))?;
            let vector = blob_to_vec(&blob);
            if vector.len() as i64 != dims {
                tracing::warn!("Skipping embedding for turn {}: {} values, expected {}", turn_id, vector.len(), dims);
                continue;
            }
            out.push((turn_id, vector));
        }
        Ok(out)
    }
}

// ============================================
// WRITE HELPERS
// ============================================

fn delete_session_rows(tx: &Transaction<'_>, session_id: &str) -> GennieResult<()> {
    tx.execute(
        "DELETE FROM turn_embeddings WHERE turn_id IN (SELECT id FROM turns WHERE session_id = ?)",
        params![session_id],
    )
    .map_err(GennieError::storage("delete session embeddings"))?;
    tx.execute("DELETE FROM code_metrics WHERE session_id = ?", params![session_id])
        .map_err(GennieError::storage("delete session code metrics"))?;
    tx.execute("DELETE FROM turns WHERE session_id = ?", params![session_id])
        .map_err(GennieError::storage("delete session turns"))?;
    Ok(())
}

fn delete_workspace_rows(tx: &Transaction<'_>, workspace_id: &str) -> GennieResult<usize> {
    tx.execute(
        "DELETE FROM turn_embeddings WHERE turn_id IN (SELECT id FROM turns WHERE workspace_id = ?)",
        params![workspace_id],
    )
    .map_err(GennieError::storage("delete embeddings"))?;
    tx.execute("DELETE FROM code_metrics WHERE workspace_id = ?", params![workspace_id])
        .map_err(GennieError::storage("delete code metrics"))?;
    tx.execute("DELETE FROM turns WHERE workspace_id = ?", params![workspace_id])
        .map_err(GennieError::storage("delete turns"))
}

fn write_turns(tx: &Transaction<'_>, turns: &[EnrichedTurn]) -> GennieResult<usize> {
    let mut insert = tx
        .prepare(
            r#"INSERT INTO turns (
                   session_id, turn, role, text, original_text,
                   workspace_id, workspace_name, workspace_folder, session_name, agent_used,
                   model_id, request_id, merged_request_ids, timestamp_ms, timestamp_iso, ts,
                   original_text_tokens, cleaned_text_tokens, code_tokens, tool_tokens,
                   system_tokens, thinking_tokens, session_history_tokens,
                   thinking_text, thinking_duration_ms, primary_language, languages, files, tools,
                   responding_to_turn, response_time_ms,
                   total_lines_added, total_lines_removed, total_nloc_change, weighted_complexity_change)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .map_err(GennieError::storage("insert turns"))?;
    let mut metrics = tx
        .prepare(
            r#"INSERT OR REPLACE INTO code_metrics (
                   request_id, session_id, file_path, workspace_id, agent_used, model_id,
                   delta_nloc, delta_complexity, lines_added, lines_removed,
                   before_metrics, after_metrics, delta_metrics, code_before, code_after)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .map_err(GennieError::storage("insert code metrics"))?;

    for t in turns {
        let b = &t.base;
        let iso = b.timestamp_iso();
        let ts = b
            .timestamp_ms
            .and_then(crate::model::ms_to_datetime)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
        insert
            .execute(params![
                b.session_id,
                b.turn,
                b.role.as_str(),
                t.cleaned_text,
                b.original_text,
                b.workspace_id,
                b.workspace_name,
                b.workspace_folder,
                b.session_name,
                b.agent,
                b.model_id,
                b.request_id,
                json_list(&b.merged_request_ids),
                b.timestamp_ms,
                iso,
                ts,
                t.tokens.original,
                t.tokens.cleaned,
                t.tokens.code,
                t.tokens.tool,
                t.tokens.system,
                t.tokens.thinking,
                t.tokens.session_history,
                non_empty(&b.thinking_text),
                b.thinking_duration_ms,
                t.primary_language,
                json_list(&t.languages),
                json_list(&b.files),
                json_list(&b.tools),
                t.responding_to_turn,
                t.response_time_ms,
                t.totals.lines_added,
                t.totals.lines_removed,
                t.totals.nloc_change,
                t.totals.weighted_complexity_change,
            ])
            .map_err(GennieError::storage("insert turns"))?;

        let request_id = b
            .request_id
            .clone()
            .unwrap_or_else(|| format!("{}:{}", b.session_id, b.turn));
        for change in file_changes(&b.code_edits) {
            let (first, last) = (change.first, change.last);
            let delta_json = if change.edits == 1 {
                first.extra.get("delta_metrics").map(|v| v.to_string())
            } else {
                serde_json::to_string(&change.delta).ok()
            };
            metrics
                .execute(params![
                    request_id,
                    b.session_id,
                    first.file_path,
                    b.workspace_id,
                    b.agent,
                    b.model_id,
                    change.delta.nloc,
                    change.delta.cyclomatic_complexity,
                    change.delta.lines_added,
                    change.delta.lines_removed,
                    first.extra.get("before_metrics").map(|v| v.to_string()),
                    last.extra.get("after_metrics").map(|v| v.to_string()),
                    delta_json,
                    first.code_before,
                    last.code_after,
                ])
                .map_err(GennieError::storage("insert code metrics"))?;
        }
    }
    Ok(turns.len())
}

/// Measured edits of one turn folded per file: deltas summed, the first edit's
/// before state and the last edit's after state
struct FileChange<'a> {
    first: &'a CodeEdit,
    last: &'a CodeEdit,
    delta: MetricDelta,
    edits: usize,
}

fn file_changes(edits: &[CodeEdit]) -> Vec<FileChange<'_>> {
    let mut changes: Vec<FileChange<'_>> = Vec::new();
    for edit in edits {
        let Some(m) = edit.metrics else { continue };
        match changes.iter_mut().find(|c| c.first.file_path == edit.file_path) {
            Some(change) => {
                change.last = edit;
                change.edits += 1;
                change.delta.nloc += m.delta.nloc;
                change.delta.lines_added += m.delta.lines_added;
                change.delta.lines_removed += m.delta.lines_removed;
                change.delta.cyclomatic_complexity += m.delta.cyclomatic_complexity;
                change.delta.token_count += m.delta.token_count;
            }
            None => changes.push(FileChange { first: edit, last: edit, delta: m.delta, edits: 1 }),
        }
    }
    changes
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

// ============================================
// QUERY HELPERS
// ============================================

fn placeholders(n: usize, first: usize) -> String {
    (first..first + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ` AND LOWER(t.role) IN (...)` with numbered placeholders starting at `first`.
/// An empty filter matches every role.
fn role_filter(roles: &[Role], first: usize) -> (String, Vec<SqlValue>) {
    if roles.is_empty() {
        return (String::new(), Vec::new());
    }
    let sql = format!(" AND LOWER(t.role) IN ({})", placeholders(roles.len(), first));
    let args = roles.iter().map(|r| SqlValue::Text(r.as_str().to_string())).collect();
    (sql, args)
}

fn is_missing_index(e: &rusqlite::Error) -> bool {
    e.to_string().contains("no such table")
}

/// The whole query as one FTS phrase
fn quote_phrase(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

const TURN_COLUMNS: &str = "t.id, t.session_id, t.turn, t.role, t.text, t.original_text, \
     t.workspace_id, t.workspace_name, t.session_name, t.agent_used, t.model_id, \
     t.timestamp_ms, t.timestamp_iso, t.responding_to_turn, t.response_time_ms, \
     t.total_lines_added, t.total_lines_removed, t.original_text_tokens, t.session_history_tokens";

const TURN_COLUMN_COUNT: usize = 19;

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub struct TurnRow {
    pub id: i64,
    pub session_id: String,
    pub turn: u32,
    pub role: String,
    pub text: String,
    pub original_text: String,
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub session_name: Option<String>,
    pub agent: Option<String>,
    pub model_id: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub timestamp_iso: Option<String>,
    pub responding_to_turn: Option<u32>,
    pub response_time_ms: Option<i64>,
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
    pub original_tokens: i64,
    pub session_history_tokens: i64,
}

impl TurnRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(TurnRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            turn: row.get(2)?,
            role: row.get(3)?,
            text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            original_text: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            workspace_id: row.get(6)?,
            workspace_name: row.get(7)?,
            session_name: row.get(8)?,
            agent: row.get(9)?,
            model_id: row.get(10)?,
            timestamp_ms: row.get(11)?,
            timestamp_iso: row.get(12)?,
            responding_to_turn: row.get(13)?,
            response_time_ms: row.get(14)?,
            lines_added: row.get(15)?,
            lines_removed: row.get(16)?,
            original_tokens: row.get::<_, Option<i64>>(17)?.unwrap_or(0),
            session_history_tokens: row.get::<_, Option<i64>>(18)?.unwrap_or(0),
        })
    }
}

/// What one extraction run records about a workspace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceInfo {
    pub workspace_id: String,
    pub name: String,
    pub folder: String,
    /// Contributing agents joined with `+`
    pub agents: String,
    pub extraction_duration_ms: i64,
    pub session_count: usize,
    pub turn_count: usize,
    pub code_loc: usize,
    pub doc_loc: usize,
}

#[derive(Debug, Clone)]
pub struct WorkspaceRow {
    pub info: WorkspaceInfo,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub date: String,
    pub count: usize,
    pub unique_sessions: usize,
    pub unique_workspaces: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingCandidate {
    pub turn_id: i64,
    pub text: String,
    pub stored_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub turn_id: i64,
    pub vector: Vec<f32>,
    pub text_hash: String,
}
