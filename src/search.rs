//! Keyword, semantic and hybrid retrieval over stored turns

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::config::SearchConfig;
use crate::embed::{cosine_similarity, Embedder};
use crate::error::{GennieError, GennieResult};
use crate::model::Role;
use crate::store::{TimelineRow, TurnRow, TurnStore};
use crate::text::take_chars;

const SNIPPET_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!("unsupported search mode: {}", other)),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    /// Empty means every role
    pub roles: Vec<Role>,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
    pub min_score: Option<f32>,
    pub strict: bool,
}

impl SearchRequest {
    pub fn new(query: &str, mode: SearchMode) -> Self {
        Self {
            query: query.to_string(),
            mode,
            roles: Vec::new(),
            page: 1,
            page_size: 20,
            min_score: None,
            strict: false,
        }
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub turn_id: i64,
    pub session_id: String,
    pub turn: u32,
    pub role: String,
    pub snippet: String,
    pub timestamp_iso: Option<String>,
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub session_name: Option<String>,
    pub agent: Option<String>,
    /// Normalized to 0..=1
    pub score: f64,
}

impl SearchHit {
    fn from_row(row: TurnRow, score: f64) -> Self {
        Self {
            turn_id: row.id,
            snippet: take_chars(&row.original_text, SNIPPET_CHARS),
            session_id: row.session_id,
            turn: row.turn,
            role: row.role,
            timestamp_iso: row.timestamp_iso,
            workspace_id: row.workspace_id,
            workspace_name: row.workspace_name,
            session_name: row.session_name,
            agent: row.agent,
            score: score.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub hits: Vec<SearchHit>,
}

pub struct SearchEngine<'a> {
    store: &'a TurnStore,
    embedder: &'a dyn Embedder,
    config: &'a SearchConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a TurnStore, embedder: &'a dyn Embedder, config: &'a SearchConfig) -> Self {
        Self { store, embedder, config }
    }

    pub fn search(&self, request: &SearchRequest) -> GennieResult<SearchResponse> {
        self.validate(request)?;
        let (total_count, hits) = match request.mode {
            SearchMode::Keyword => self.keyword(request)?,
            SearchMode::Semantic => self.semantic(request)?,
            SearchMode::Hybrid => self.hybrid(request)?,
        };
        tracing::debug!("{} search {:?}: {} matches", request.mode, request.query, total_count);
        Ok(SearchResponse {
            query: request.query.clone(),
            mode: request.mode,
            total_count,
            page: request.page,
            page_size: request.page_size,
            hits,
        })
    }

    /// Per-day counts over every match of the request, not just its page.
    /// Semantic and hybrid modes count the same ranked set `search` pages through.
    pub fn timeline(&self, request: &SearchRequest) -> GennieResult<Vec<TimelineRow>> {
        self.validate(request)?;
        let ids: Vec<i64> = match request.mode {
            SearchMode::Keyword => {
                return self.store.keyword_timeline(request.query.trim(), &request.roles);
            }
            SearchMode::Semantic => self.semantic_ranked(request)?,
            SearchMode::Hybrid => self.hybrid_ranked(request)?,
        }
        .into_iter()
        .map(|(id, _)| id)
        .collect();
        self.store.timeline_for_ids(&ids)
    }

    fn validate(&self, request: &SearchRequest) -> GennieResult<()> {
        if request.query.trim().is_empty() {
            return Err(GennieError::Validation("search query cannot be empty".into()));
        }
        if request.page == 0 {
            return Err(GennieError::Validation("page starts at 1".into()));
        }
        if request.page_size == 0 || request.page_size > self.config.max_page_size {
            return Err(GennieError::Validation(format!(
                "page size must be between 1 and {}",
                self.config.max_page_size
            )));
        }
        if let Some(score) = request.min_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(GennieError::Validation(format!("min score {} is outside 0..1", score)));
            }
        }
        Ok(())
    }

    /// Override or configured floor; strict never lowers it
    fn min_score(&self, request: &SearchRequest) -> f32 {
        let base = request.min_score.unwrap_or(self.config.semantic_min_score);
        if request.strict {
            base.max(self.config.semantic_strict_min_score)
        } else {
            base
        }
    }

    fn keyword(&self, request: &SearchRequest) -> GennieResult<(usize, Vec<SearchHit>)> {
        let (total, rows) = self.store.keyword_page(
            request.query.trim(),
            &request.roles,
            request.page_size,
            request.offset(),
        )?;
        let hits = rows
            .into_iter()
            .map(|(row, bm25)| SearchHit::from_row(row, bm25_score(bm25)))
            .collect();
        Ok((total, hits))
    }

    fn semantic(&self, request: &SearchRequest) -> GennieResult<(usize, Vec<SearchHit>)> {
        let ranked = self.semantic_ranked(request)?;
        let page: Vec<(i64, f64)> = ranked
            .iter()
            .skip(request.offset())
            .take(request.page_size)
            .copied()
            .collect();
        Ok((ranked.len(), self.load_hits(&page)?))
    }

    fn hybrid(&self, request: &SearchRequest) -> GennieResult<(usize, Vec<SearchHit>)> {
        let fused = self.hybrid_ranked(request)?;
        let total = fused.len();
        let page: Vec<(i64, f64)> = fused
            .into_iter()
            .skip(request.offset())
            .take(request.page_size)
            .collect();
        Ok((total, self.load_hits(&page)?))
    }

    /// Keyword and semantic candidates fused with RRF, best first
    fn hybrid_ranked(&self, request: &SearchRequest) -> GennieResult<Vec<(i64, f64)>> {
        let (_, keyword_rows) = self.store.keyword_page(
            request.query.trim(),
            &request.roles,
            self.config.keyword_fetch_limit,
            0,
        )?;
        let keyword_ids: Vec<i64> = keyword_rows.iter().map(|(row, _)| row.id).collect();
        let semantic_ids: Vec<i64> = self
            .semantic_ranked(request)?
            .into_iter()
            .take(self.config.semantic_fetch_limit)
            .map(|(id, _)| id)
            .collect();

        Ok(rrf_merge(&[&keyword_ids, &semantic_ids], self.config.rrf_k))
    }

    /// Every stored vector above the score floor, best first
    fn semantic_ranked(&self, request: &SearchRequest) -> GennieResult<Vec<(i64, f64)>> {
        let model = self.embedder.model_name();
        if !self.store.has_embeddings(model)? {
            return Err(GennieError::semantic_index_missing());
        }
        let query_vec = self
            .embedder
            .embed(&[request.query.trim().to_string()])
            .map_err(|e| GennieError::Embedding {
                model: model.to_string(),
                reason: format!("{:#}", e),
            })?
            .into_iter()
            .next()
            .ok_or_else(|| GennieError::Embedding {
                model: model.to_string(),
                reason: "no vector returned for the query".into(),
            })?;

        let floor = self.min_score(request);
        let mut ranked: Vec<(i64, f64)> = self
            .store
            .embeddings(model, &request.roles)?
            .into_iter()
            .filter_map(|(id, vec)| {
                let score = cosine_similarity(&query_vec, &vec);
                (score >= floor).then_some((id, score as f64))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(ranked)
    }

    /// Rows for a scored page, in page order
    fn load_hits(&self, page: &[(i64, f64)]) -> GennieResult<Vec<SearchHit>> {
        let ids: Vec<i64> = page.iter().map(|(id, _)| *id).collect();
        let mut rows: HashMap<i64, TurnRow> = self
            .store
            .turns_by_ids(&ids)?
            .into_iter()
            .map(|row| (row.id, row))
            .collect();
        Ok(page
            .iter()
            .filter_map(|(id, score)| rows.remove(id).map(|row| SearchHit::from_row(row, *score)))
            .collect())
    }
}

/// BM25 from FTS5 is negative for matches; anything at or below zero maps to 1
fn bm25_score(bm25: f64) -> f64 {
    1.0 / (1.0 + bm25.max(0.0))
}

/// Reciprocal Rank Fusion. Ranks start at 1; scores are divided by the best
/// fused score. Ties keep the order in which ids were first seen.
pub fn rrf_merge(lists: &[&[i64]], k: u32) -> Vec<(i64, f64)> {
    let mut scores: HashMap<i64, f64> = HashMap::new();
    let mut order: Vec<i64> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    for list in lists {
        for (rank, id) in list.iter().enumerate() {
            *scores.entry(*id).or_insert(0.0) += 1.0 / (k as f64 + rank as f64 + 1.0);
            if seen.insert(*id) {
                order.push(*id);
            }
        }
    }
    let max = scores.values().copied().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let mut fused: Vec<(i64, f64)> = order
        .into_iter()
        .map(|id| (id, (scores[&id] / max).min(1.0)))
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use crate::index::backfill;
    use crate::jobs::{CancelFlag, Progress};
    use crate::store::testing::enriched;
    use tempfile::TempDir;

    fn corpus(dir: &TempDir) -> TurnStore {
        let store = TurnStore::open(&dir.path().join("gennie.db")).unwrap();
        let turns = vec![
            enriched("ws", "s1", 0, Role::User, "run pytest on the parser module", 1_700_000_000_000),
            enriched("ws", "s1", 1, Role::Assistant, "The parser tests now pass", 1_700_000_005_000),
            enriched("ws", "s1", 2, Role::User, "add a benchmark for the lexer", 1_700_000_010_000),
            enriched("ws", "s2", 0, Role::User, "deploy the service to staging", 1_700_086_400_000),
            enriched("ws", "s2", 1, Role::Assistant, "Deployment finished without errors", 1_700_086_405_000),
        ];
        store.insert_turns(&turns).unwrap();
        store
    }

    fn embedded_corpus(dir: &TempDir, embedder: &HashingEmbedder) -> TurnStore {
        let store = corpus(dir);
        backfill(&store, embedder, 16, None, &CancelFlag::new(), &Progress::new()).unwrap();
        store
    }

    #[test]
    fn test_validation_runs_before_any_index() {
        let dir = TempDir::new().unwrap();
        let store = corpus(&dir);
        let embedder = HashingEmbedder::default();
        let config = SearchConfig::default();
        let engine = SearchEngine::new(&store, &embedder, &config);

        let empty = SearchRequest::new("   ", SearchMode::Semantic);
        assert!(matches!(engine.search(&empty), Err(GennieError::Validation(_))));

        let mut big = SearchRequest::new("parser", SearchMode::Keyword);
        big.page_size = config.max_page_size + 1;
        assert!(matches!(engine.search(&big), Err(GennieError::Validation(_))));

        let mut zero = SearchRequest::new("parser", SearchMode::Keyword);
        zero.page = 0;
        assert!(matches!(engine.search(&zero), Err(GennieError::Validation(_))));
    }

    #[test]
    fn test_keyword_single_match_ranks_first() {
        let dir = TempDir::new().unwrap();
        let store = corpus(&dir);
        let embedder = HashingEmbedder::default();
        let config = SearchConfig::default();
        let engine = SearchEngine::new(&store, &embedder, &config);

        let response = engine.search(&SearchRequest::new("pytest", SearchMode::Keyword)).unwrap();
        assert_eq!(response.total_count, 1);
        assert_eq!(response.hits[0].session_id, "s1");
        assert_eq!(response.hits[0].turn, 0);
        assert!(response.hits[0].score > 0.0 && response.hits[0].score <= 1.0);
    }

    #[test]
    fn test_keyword_pagination_and_roles() {
        let dir = TempDir::new().unwrap();
        let store = corpus(&dir);
        let embedder = HashingEmbedder::default();
        let config = SearchConfig::default();
        let engine = SearchEngine::new(&store, &embedder, &config);

        let mut request = SearchRequest::new("parser", SearchMode::Keyword);
        request.page_size = 1;
        request.page = 2;
        let response = engine.search(&request).unwrap();
        assert_eq!(response.total_count, 2);
        assert_eq!(response.hits.len(), 1);

        request.page = 1;
        request.roles = vec![Role::Assistant];
        let response = engine.search(&request).unwrap();
        assert_eq!(response.total_count, 1);
        assert_eq!(response.hits[0].role, "assistant");
    }

    #[test]
    fn test_semantic_without_vectors_names_backfill() {
        let dir = TempDir::new().unwrap();
        let store = corpus(&dir);
        let embedder = HashingEmbedder::default();
        let config = SearchConfig::default();
        let engine = SearchEngine::new(&store, &embedder, &config);

        let err = engine.search(&SearchRequest::new("parser", SearchMode::Semantic)).unwrap_err();
        assert!(matches!(err, GennieError::IndexNotBuilt { index: "semantic", .. }));
        assert!(err.to_string().contains("gennie backfill"));
    }

    #[test]
    fn test_strict_never_returns_more() {
        let dir = TempDir::new().unwrap();
        let embedder = HashingEmbedder::default();
        let store = embedded_corpus(&dir, &embedder);
        let mut config = SearchConfig::default();
        config.semantic_min_score = 0.0;
        let engine = SearchEngine::new(&store, &embedder, &config);

        let mut request = SearchRequest::new("parser tests", SearchMode::Semantic);
        let loose = engine.search(&request).unwrap();
        request.strict = true;
        let strict = engine.search(&request).unwrap();
        assert!(strict.total_count <= loose.total_count);
        assert!(loose.total_count >= 1);
        assert!(loose.hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_hybrid_is_bounded_by_union() {
        let dir = TempDir::new().unwrap();
        let embedder = HashingEmbedder::default();
        let store = embedded_corpus(&dir, &embedder);
        let mut config = SearchConfig::default();
        config.semantic_min_score = 0.1;
        let engine = SearchEngine::new(&store, &embedder, &config);

        let mut keyword = SearchRequest::new("parser", SearchMode::Keyword);
        keyword.page_size = 100;
        let keyword_ids: HashSet<i64> = engine.search(&keyword).unwrap().hits.iter().map(|h| h.turn_id).collect();
        let mut semantic = SearchRequest::new("parser", SearchMode::Semantic);
        semantic.page_size = 100;
        semantic.min_score = Some(0.1);
        let semantic_ids: HashSet<i64> = engine.search(&semantic).unwrap().hits.iter().map(|h| h.turn_id).collect();

        let mut hybrid = SearchRequest::new("parser", SearchMode::Hybrid);
        hybrid.page_size = 100;
        let response = engine.search(&hybrid).unwrap();
        let union: HashSet<i64> = keyword_ids.union(&semantic_ids).copied().collect();
        assert_eq!(response.total_count, union.len());
        assert!(response.hits.iter().all(|h| union.contains(&h.turn_id)));
        assert_eq!(response.hits[0].score, 1.0);
    }

    #[test]
    fn test_rrf_merge_normalizes_by_best() {
        let fused = rrf_merge(&[&[1, 2, 3], &[2, 4]], 60);
        assert_eq!(fused[0].0, 2);
        assert_eq!(fused[0].1, 1.0);
        assert_eq!(fused.len(), 4);
        assert!(fused.iter().all(|(_, s)| *s > 0.0 && *s <= 1.0));
        assert!(rrf_merge(&[&[], &[]], 60).is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Hybrid".parse::<SearchMode>(), Ok(SearchMode::Hybrid));
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::Semantic.to_string(), "semantic");
    }

    #[test]
    fn test_timeline_over_keyword_matches() {
        let dir = TempDir::new().unwrap();
        let store = corpus(&dir);
        let embedder = HashingEmbedder::default();
        let config = SearchConfig::default();
        let engine = SearchEngine::new(&store, &embedder, &config);
        let days = engine.timeline(&SearchRequest::new("the", SearchMode::Keyword)).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days.iter().map(|d| d.count).sum::<usize>(), 4);
        assert!(engine.timeline(&SearchRequest::new(" ", SearchMode::Keyword)).is_err());
    }

    #[test]
    fn test_timeline_counts_full_ranked_set_in_every_mode() {
        let dir = TempDir::new().unwrap();
        let embedder = HashingEmbedder::default();
        let store = embedded_corpus(&dir, &embedder);
        let mut config = SearchConfig::default();
        config.semantic_min_score = 0.1;
        let engine = SearchEngine::new(&store, &embedder, &config);

        for mode in [SearchMode::Semantic, SearchMode::Hybrid] {
            let mut request = SearchRequest::new("parser tests", mode);
            request.page_size = 1;
            let total = engine.search(&request).unwrap().total_count;
            assert!(total >= 1, "{} found nothing", mode);

            let days = engine.timeline(&request).unwrap();
            assert_eq!(days.iter().map(|d| d.count).sum::<usize>(), total, "{}", mode);
            assert!(days.windows(2).all(|w| w[0].date < w[1].date));
        }
    }

    #[test]
    fn test_semantic_timeline_without_vectors_names_backfill() {
        let dir = TempDir::new().unwrap();
        let store = corpus(&dir);
        let embedder = HashingEmbedder::default();
        let config = SearchConfig::default();
        let engine = SearchEngine::new(&store, &embedder, &config);

        let err = engine.timeline(&SearchRequest::new("parser", SearchMode::Semantic)).unwrap_err();
        assert!(matches!(err, GennieError::IndexNotBuilt { index: "semantic", .. }));
    }
}
