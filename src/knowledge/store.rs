//! Vector Store - 인메모리 벡터 + BM25 키워드 인덱스
//!
//! 청크와 임베딩을 메모리에 올려두고 시맨틱/키워드/하이브리드/필터
//! 검색을 제공합니다. 인덱스는 단일 JSON 파일로 저장되며, 키워드
//! 인덱스는 로드 시 청크에서 재구축됩니다.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::chunker::Chunk;
use super::lexicon;
use super::metadata::DocumentType;
use super::EngineError;
use crate::embedding::{cosine_similarity, tokenize, VocabularyExport};

/// 인덱스 파일 포맷 버전 - 구조가 바뀌면 올린다
pub const FORMAT_VERSION: u32 = 1;

// BM25 파라미터
const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

// ============================================================================
// Result & Filter Types
// ============================================================================

/// 점수 분해 (디버깅/튜닝용)
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub keyword: f32,
    pub boost: f32,
}

/// 스토어 검색 결과
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// 스토어 내 청크 인덱스
    pub chunk_index: usize,
    pub chunk_id: String,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
}

/// 구조화 필터 - 차원 간 AND, 차원 내 OR
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub doc_types: Vec<DocumentType>,
    pub topics: Vec<String>,
    pub steps: Vec<u8>,
    pub verticals: Vec<String>,
    pub require_benchmarks: bool,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.doc_types.is_empty()
            && self.topics.is_empty()
            && self.steps.is_empty()
            && self.verticals.is_empty()
            && !self.require_benchmarks
    }
}

// ============================================================================
// Keyword Index (BM25)
// ============================================================================

/// BM25 역색인 - 저장하지 않고 청크에서 재구축
#[derive(Debug)]
struct KeywordIndex {
    /// 용어 → (청크 인덱스, 용어 빈도)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lens: Vec<u32>,
    avg_len: f32,
}

impl KeywordIndex {
    fn build(chunks: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lens = Vec::with_capacity(chunks.len());

        for (idx, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.content);
            doc_lens.push(tokens.len() as u32);

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in counts {
                postings.entry(term).or_default().push((idx, tf));
            }
        }

        let avg_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<u32>() as f32 / doc_lens.len() as f32
        };

        Self {
            postings,
            doc_lens,
            avg_len,
        }
    }

    /// BM25 스코어링: idf = ln(1 + (N - df + 0.5) / (df + 0.5))
    fn score(&self, query_tokens: &[String]) -> HashMap<usize, f32> {
        let n = self.doc_lens.len() as f32;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in query_tokens {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();

            for &(doc_idx, tf) in posting {
                let tf = tf as f32;
                let len_norm =
                    1.0 - BM25_B + BM25_B * self.doc_lens[doc_idx] as f32 / self.avg_len.max(1.0);
                let term_score = idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * len_norm);
                *scores.entry(doc_idx).or_insert(0.0) += term_score;
            }
        }

        scores
    }
}

// ============================================================================
// VectorStore
// ============================================================================

/// 인메모리 벡터 스토어
///
/// 빌드 후 불변입니다. 코퍼스가 바뀌면 새로 빌드해 교체합니다.
pub struct VectorStore {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    keyword: KeywordIndex,
}

impl VectorStore {
    /// 청크와 임베딩으로 스토어 빌드
    ///
    /// 두 벡터는 인덱스가 1:1 대응해야 합니다.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, EngineError> {
        if chunks.len() != embeddings.len() {
            return Err(EngineError::IndexMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let keyword = KeywordIndex::build(&chunks);
        Ok(Self {
            chunks,
            embeddings,
            keyword,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// 시맨틱 검색 - 쿼리 벡터와의 코사인 유사도 순
    pub fn search_semantic(&self, query_vector: &[f32], limit: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(idx, emb)| {
                let sim = cosine_similarity(query_vector, emb);
                SearchResult {
                    chunk_index: idx,
                    chunk_id: self.chunks[idx].id.clone(),
                    score: sim,
                    breakdown: ScoreBreakdown {
                        semantic: sim,
                        ..Default::default()
                    },
                }
            })
            .filter(|r| r.score > 0.0)
            .collect();

        sort_results(&mut results);
        results.truncate(limit);
        results
    }

    /// 키워드 검색 - BM25, 최고점 기준 [0,1] 정규화
    ///
    /// 매치가 하나라도 있으면 매치 없는 청크도 0점으로 꼬리에 포함되어
    /// 상위 k개가 전체 코퍼스에 대한 완전한 순위가 됩니다.
    pub fn search_keyword(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let raw = self.keyword.score(&tokens);
        let peak = raw.values().cloned().fold(0.0f32, f32::max);
        if peak <= 0.0 {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = (0..self.chunks.len())
            .map(|idx| {
                let normalized = raw.get(&idx).map(|score| score / peak).unwrap_or(0.0);
                SearchResult {
                    chunk_index: idx,
                    chunk_id: self.chunks[idx].id.clone(),
                    score: normalized,
                    breakdown: ScoreBreakdown {
                        keyword: normalized,
                        ..Default::default()
                    },
                }
            })
            .collect();

        sort_results(&mut results);
        results.truncate(limit);
        results
    }

    /// 하이브리드 검색 - 가중합 병합 + 메타데이터 부스팅
    ///
    /// 양쪽에서 `limit * 2` 후보를 모아 가중합으로 병합한 뒤
    /// 메타데이터 부스팅 계수를 곱합니다. 한쪽에만 잡힌 청크는
    /// 해당 방법의 가중 점수만 갖고 경쟁합니다.
    pub fn search_hybrid(
        &self,
        query: &str,
        query_vector: &[f32],
        semantic_weight: f32,
        limit: usize,
    ) -> Vec<SearchResult> {
        let pool = (limit * 2).max(limit);
        let semantic = self.search_semantic(query_vector, pool);
        let keyword = self.search_keyword(query, pool);
        let keyword_weight = 1.0 - semantic_weight;

        let mut merged: HashMap<usize, ScoreBreakdown> = HashMap::new();
        for r in &semantic {
            merged.entry(r.chunk_index).or_default().semantic = r.breakdown.semantic;
        }
        for r in &keyword {
            // 0점 꼬리는 실제 매치가 아니므로 병합에서 제외
            if r.score > 0.0 {
                merged.entry(r.chunk_index).or_default().keyword = r.breakdown.keyword;
            }
        }

        let query_lower = query.to_lowercase();
        let query_tokens = tokenize(query);

        let mut results: Vec<SearchResult> = merged
            .into_iter()
            .map(|(idx, mut breakdown)| {
                let base =
                    semantic_weight * breakdown.semantic + keyword_weight * breakdown.keyword;
                let boost = self.boost_factor(&query_lower, &query_tokens, &self.chunks[idx]);
                breakdown.boost = boost;
                SearchResult {
                    chunk_index: idx,
                    chunk_id: self.chunks[idx].id.clone(),
                    score: base * boost,
                    breakdown,
                }
            })
            .collect();

        sort_results(&mut results);
        results.truncate(limit);
        results
    }

    /// 메타데이터 부스팅 계수 (곱셈 누적)
    fn boost_factor(&self, query_lower: &str, query_tokens: &[String], chunk: &Chunk) -> f32 {
        let meta = &chunk.metadata;
        let content_lower = chunk.content.to_lowercase();
        let mut factor = meta.purpose.weight();

        if meta.deprioritized {
            factor *= 0.6;
        }

        // 벤치마크 질의 + 벤치마크 보유 청크
        const BENCHMARK_ASKS: &[&str] = &["benchmark", "typical", "average", "industry"];
        if meta.has_benchmarks
            && BENCHMARK_ASKS
                .iter()
                .any(|k| lexicon::contains_term(query_lower, k))
        {
            factor *= 1.3;
        }

        // 쿼리 전체가 그대로 등장하는 정확 구문 일치
        let phrase = query_lower.trim();
        if phrase.len() >= 8 && content_lower.contains(phrase) {
            factor *= 1.25;
        }

        // 동의어 그룹이 정규화 용어에 걸리면 한 번만 가산
        let synonym_hit = query_tokens.iter().any(|t| {
            lexicon::synonym_group(t)
                .map(|(canonical, _)| meta.normalized_terms.iter().any(|n| n == canonical))
                .unwrap_or(false)
        });
        if synonym_hit {
            factor *= 1.15;
        }

        // 한정어 질의("conservative cvr" 등) + 같은 한정어의 범위 보유
        const QUALIFIERS: &[&str] = &["conservative", "moderate", "aggressive"];
        let qualifier_hit = QUALIFIERS.iter().any(|q| {
            lexicon::contains_term(query_lower, q)
                && meta
                    .benchmark_ranges
                    .iter()
                    .any(|r| r.qualifier.as_deref() == Some(*q))
        });
        if qualifier_hit {
            factor *= 1.2;
        }

        // 수치 범위를 묻는 질의 + 추출된 범위 보유
        const RANGE_ASKS: &[&str] = &["what", "typical", "range"];
        let asks_range = RANGE_ASKS
            .iter()
            .any(|k| lexicon::contains_term(query_lower, k))
            || query_lower.contains("how much");
        if asks_range && !meta.benchmark_ranges.is_empty() {
            factor *= 1.15;
        }

        factor
    }

    /// 구조화 필터 검색 - 하이브리드 풀에 엄격한 필터 적용
    ///
    /// 필터는 차원 간 AND, 차원 내 OR입니다. 하이브리드 점수가 없는
    /// 청크(질의와 무관하지만 필터에 맞는 청크)는 목적 가중치 순으로
    /// 뒤에 채워집니다.
    pub fn search_filtered(
        &self,
        query: &str,
        query_vector: &[f32],
        semantic_weight: f32,
        filters: &SearchFilters,
        limit: usize,
    ) -> Vec<SearchResult> {
        let pool = (limit * 4).max(limit);
        let mut results: Vec<SearchResult> = self
            .search_hybrid(query, query_vector, semantic_weight, pool)
            .into_iter()
            .filter(|r| matches_filters(&self.chunks[r.chunk_index], filters))
            .collect();

        if results.len() < limit {
            // 점수가 없어도 필터에 맞으면 목적 가중치 순으로 보충
            let have: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();
            let mut fallback: Vec<SearchResult> = self
                .chunks
                .iter()
                .enumerate()
                .filter(|(idx, chunk)| {
                    !have.contains(idx) && matches_filters(chunk, filters)
                })
                .map(|(idx, chunk)| {
                    let mut score = chunk.metadata.purpose.weight();
                    if chunk.metadata.deprioritized {
                        score *= 0.6;
                    }
                    SearchResult {
                        chunk_index: idx,
                        chunk_id: chunk.id.clone(),
                        // 하이브리드 매치보다 항상 뒤에 오도록 스케일 다운
                        score: score * 1e-3,
                        breakdown: ScoreBreakdown {
                            boost: score,
                            ..Default::default()
                        },
                    }
                })
                .collect();
            sort_results(&mut fallback);
            results.extend(fallback);
        }

        results.truncate(limit);
        results
    }

    /// 스토어를 인덱스 파일로 저장
    pub fn save(
        &self,
        path: &Path,
        fingerprint: &str,
        vocabulary: &VocabularyExport,
    ) -> Result<(), EngineError> {
        let index = PersistedIndex {
            format_version: FORMAT_VERSION,
            fingerprint: fingerprint.to_string(),
            vocabulary: vocabulary.clone(),
            chunks: self.chunks.clone(),
            embeddings: self.embeddings.clone(),
        };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(&index)
            .map_err(|e| EngineError::LoadFailure(format!("serialize failed: {}", e)))?;
        std::fs::write(path, json)?;

        tracing::info!("Saved index: {} chunks to {:?}", self.chunks.len(), path);
        Ok(())
    }

    /// 인덱스 파일에서 스토어 복원
    ///
    /// 포맷 버전이나 설정 지문이 다르면 LoadFailure를 반환하며,
    /// 호출자(엔진)는 이를 리빌드 신호로 취급합니다.
    pub fn load(path: &Path, fingerprint: &str) -> Result<(Self, VocabularyExport), EngineError> {
        let json = std::fs::read_to_string(path)?;
        let index: PersistedIndex = serde_json::from_str(&json)
            .map_err(|e| EngineError::LoadFailure(format!("parse failed: {}", e)))?;

        if index.format_version != FORMAT_VERSION {
            return Err(EngineError::LoadFailure(format!(
                "format version mismatch: file={} expected={}",
                index.format_version, FORMAT_VERSION
            )));
        }
        if index.fingerprint != fingerprint {
            return Err(EngineError::LoadFailure(format!(
                "config fingerprint mismatch: file={} expected={}",
                index.fingerprint, fingerprint
            )));
        }

        let store = Self::build(index.chunks, index.embeddings)?;
        tracing::info!("Loaded index: {} chunks from {:?}", store.len(), path);
        Ok((store, index.vocabulary))
    }
}

/// 점수 내림차순, 동점은 청크 인덱스 오름차순 (결정적 순서)
fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
}

/// 필터 매칭 - 차원 간 AND, 차원 내 OR
pub fn matches_filters(chunk: &Chunk, filters: &SearchFilters) -> bool {
    let meta = &chunk.metadata;

    if !filters.doc_types.is_empty() && !filters.doc_types.contains(&meta.doc_type) {
        return false;
    }
    if !filters.topics.is_empty() && !filters.topics.iter().any(|t| meta.topics.contains(t)) {
        return false;
    }
    if !filters.steps.is_empty() && !filters.steps.iter().any(|s| meta.steps.contains(s)) {
        return false;
    }
    if !filters.verticals.is_empty()
        && !filters.verticals.iter().any(|v| meta.verticals.contains(v))
    {
        return false;
    }
    if filters.require_benchmarks && !meta.has_benchmarks {
        return false;
    }
    true
}

// ============================================================================
// Persistence Format
// ============================================================================

/// 인덱스 파일 형식 (단일 JSON)
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub format_version: u32,
    /// 차원 + 크기 밴드 설정 지문
    pub fingerprint: String,
    pub vocabulary: VocabularyExport,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingProvider, TfIdfEmbedding};
    use crate::knowledge::chunker::DocumentChunker;
    use tempfile::TempDir;

    fn sample_docs() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "cac-benchmarks.txt",
                "CAC BENCHMARKS\n\nEcommerce customer acquisition cost typically runs $25-45 \
                 on paid social. SaaS benchmarks land higher at $200-400 per customer.",
            ),
            (
                "budget-framework.txt",
                "BUDGET FRAMEWORK\n\nIf the budget is under ten thousand then focus on one \
                 channel. If the budget is larger then split across search and social.",
            ),
            (
                "audience-template.txt",
                "AUDIENCE WORKSHEET\n\nFill in your audience targeting worksheet with segment \
                 sizes and persona notes for each channel you plan to run.",
            ),
        ]
    }

    fn build_store() -> (VectorStore, TfIdfEmbedding) {
        let chunker = DocumentChunker::with_defaults();
        let mut chunks = Vec::new();
        for (name, text) in sample_docs() {
            chunks.extend(chunker.chunk_document(text, name));
        }
        let corpus: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut embedder = TfIdfEmbedding::new(128);
        embedder.initialize(&corpus).unwrap();
        let embeddings: Vec<Vec<f32>> = corpus.iter().map(|c| embedder.embed(c).unwrap()).collect();
        (VectorStore::build(chunks, embeddings).unwrap(), embedder)
    }

    #[test]
    fn test_build_rejects_length_mismatch() {
        let (store, _) = build_store();
        let chunks = store.chunks().to_vec();
        let result = VectorStore::build(chunks, vec![vec![0.0; 128]]);
        assert!(matches!(result, Err(EngineError::IndexMismatch { .. })));
    }

    #[test]
    fn test_semantic_search_finds_relevant_chunk() {
        let (store, embedder) = build_store();
        let qvec = embedder.embed("customer acquisition cost benchmarks").unwrap();
        let results = store.search_semantic(&qvec, 3);
        assert!(!results.is_empty());
        let top = store.chunk(results[0].chunk_index).unwrap();
        assert!(top.source.contains("cac-benchmarks"));
    }

    #[test]
    fn test_keyword_search_is_peak_normalized() {
        let (store, _) = build_store();
        let results = store.search_keyword("budget channel", 10);
        assert!(!results.is_empty());
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_keyword_search_ranks_non_matching_chunks_last() {
        // 매치가 있는 한 전체 코퍼스가 순위에 포함되고, 무관한 청크는 0점 꼬리
        let chunker = DocumentChunker::with_defaults();
        let mut chunks = Vec::new();
        chunks.extend(chunker.chunk_document(
            "CAC NOTES\n\nCAC here. Track cac daily, report cac weekly, review cac monthly.",
            "heavy.txt",
        ));
        chunks.extend(chunker.chunk_document(
            "MIXED NOTES\n\nChannel planning mentions cac once in passing.",
            "light.txt",
        ));
        chunks.extend(chunker.chunk_document(
            "OTHER NOTES\n\nCreative testing cadence and audience research only.",
            "none.txt",
        ));
        let corpus: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut embedder = TfIdfEmbedding::new(64);
        embedder.initialize(&corpus).unwrap();
        let embeddings: Vec<Vec<f32>> =
            corpus.iter().map(|c| embedder.embed(c).unwrap()).collect();
        let store = VectorStore::build(chunks, embeddings).unwrap();

        let results = store.search_keyword("cac", 3);
        assert_eq!(results.len(), 3);
        let sources: Vec<&str> = results
            .iter()
            .map(|r| store.chunk(r.chunk_index).unwrap().source.as_str())
            .collect();
        assert_eq!(sources, vec!["heavy.txt", "light.txt", "none.txt"]);
        assert_eq!(results[2].score, 0.0);
    }

    #[test]
    fn test_keyword_search_empty_query() {
        let (store, _) = build_store();
        assert!(store.search_keyword("   ", 10).is_empty());
        assert!(store.search_keyword("zzzunknown", 10).is_empty());
    }

    #[test]
    fn test_hybrid_search_applies_benchmark_boost() {
        let (store, embedder) = build_store();
        let query = "typical cac benchmark for ecommerce";
        let qvec = embedder.embed(query).unwrap();
        let results = store.search_hybrid(query, &qvec, 0.6, 5);
        assert!(!results.is_empty());
        let top = store.chunk(results[0].chunk_index).unwrap();
        assert!(top.metadata.has_benchmarks);
        assert!(results[0].breakdown.boost > 1.0);
    }

    #[test]
    fn test_range_ask_words_boost_range_chunks() {
        // "what"/"typical" 류 질의는 수치 범위 보유 청크를 부스팅
        let (store, _) = build_store();
        let chunk = store
            .chunks()
            .iter()
            .find(|c| !c.metadata.benchmark_ranges.is_empty())
            .unwrap();

        let factor_for = |query: &str| {
            let lower = query.to_lowercase();
            let tokens = tokenize(query);
            store.boost_factor(&lower, &tokens, chunk)
        };

        let base = factor_for("ecommerce cac");
        let what = factor_for("what is ecommerce cac");
        let typical = factor_for("typical ecommerce cac");

        assert!((what / base - 1.15).abs() < 1e-4);
        // "typical"은 벤치마크 키워드(1.3)와 범위 질의(1.15)를 모두 발동
        assert!((typical / base - 1.3 * 1.15).abs() < 1e-4);
    }

    #[test]
    fn test_deprioritized_template_sinks() {
        let (store, embedder) = build_store();
        let query = "audience targeting segment";
        let qvec = embedder.embed(query).unwrap();
        let results = store.search_hybrid(query, &qvec, 0.6, 10);
        // 템플릿 청크의 부스팅 계수는 1.0 미만이어야 함
        for r in &results {
            let chunk = store.chunk(r.chunk_index).unwrap();
            if chunk.metadata.deprioritized {
                assert!(r.breakdown.boost < 1.0);
            }
        }
    }

    #[test]
    fn test_filtered_search_and_across_dimensions() {
        let (store, embedder) = build_store();
        let query = "acquisition cost numbers";
        let qvec = embedder.embed(query).unwrap();

        let filters = SearchFilters {
            topics: vec!["cac".to_string()],
            require_benchmarks: true,
            ..Default::default()
        };
        let results = store.search_filtered(query, &qvec, 0.6, &filters, 10);
        assert!(!results.is_empty());
        for r in &results {
            let chunk = store.chunk(r.chunk_index).unwrap();
            assert!(chunk.metadata.topics.contains(&"cac".to_string()));
            assert!(chunk.metadata.has_benchmarks);
        }

        // 교집합이 없으면 빈 결과
        let none = SearchFilters {
            topics: vec!["cac".to_string()],
            verticals: vec!["gaming".to_string()],
            ..Default::default()
        };
        assert!(store.search_filtered(query, &qvec, 0.6, &none, 10).is_empty());
    }

    #[test]
    fn test_filtered_search_fills_from_filter_matches() {
        let (store, embedder) = build_store();
        // 질의와 무관하지만 필터에 맞는 청크도 채워진다
        let query = "completely unrelated words here";
        let qvec = embedder.embed(query).unwrap();
        let filters = SearchFilters {
            topics: vec!["budget".to_string()],
            ..Default::default()
        };
        let results = store.search_filtered(query, &qvec, 0.6, &filters, 10);
        assert!(!results.is_empty());
        for r in &results {
            let chunk = store.chunk(r.chunk_index).unwrap();
            assert!(chunk.metadata.topics.contains(&"budget".to_string()));
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (store, embedder) = build_store();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let vocab = embedder.export().unwrap();

        store.save(&path, "fp-v1", &vocab).unwrap();
        let (loaded, loaded_vocab) = VectorStore::load(&path, "fp-v1").unwrap();

        assert_eq!(loaded.len(), store.len());
        assert_eq!(loaded_vocab.entries.len(), vocab.entries.len());

        // 로드된 스토어는 동일한 검색 결과를 내야 함
        let qvec = embedder.embed("cac benchmarks").unwrap();
        let before: Vec<String> = store
            .search_semantic(&qvec, 5)
            .into_iter()
            .map(|r| r.chunk_id)
            .collect();
        let after: Vec<String> = loaded
            .search_semantic(&qvec, 5)
            .into_iter()
            .map(|r| r.chunk_id)
            .collect();
        assert_eq!(before, after);

        // 키워드 인덱스도 재구축되어 검색 가능해야 함
        let results = loaded.search_keyword("budget", 5);
        assert!(!results.is_empty());
    }

    #[test]
    fn test_keyword_frequency_orders_results() {
        // "cac"를 더 자주 언급하는 청크가 키워드 검색에서 앞선다
        let chunker = DocumentChunker::with_defaults();
        let mut chunks = Vec::new();
        chunks.extend(chunker.chunk_document(
            "CAC NOTES\n\nCAC matters. Track cac weekly and compare cac across channels.",
            "cac-heavy.txt",
        ));
        chunks.extend(chunker.chunk_document(
            "GENERAL NOTES\n\nBudget planning touches cac only once among other topics.",
            "cac-light.txt",
        ));
        let corpus: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut embedder = TfIdfEmbedding::new(64);
        embedder.initialize(&corpus).unwrap();
        let embeddings: Vec<Vec<f32>> =
            corpus.iter().map(|c| embedder.embed(c).unwrap()).collect();
        let store = VectorStore::build(chunks, embeddings).unwrap();

        let results = store.search_keyword("cac", 5);
        assert_eq!(results.len(), 2);
        let top = store.chunk(results[0].chunk_index).unwrap();
        assert_eq!(top.source, "cac-heavy.txt");
    }

    #[test]
    fn test_oov_query_yields_no_semantic_hits() {
        let (store, embedder) = build_store();
        // 어휘 밖 질의는 영벡터가 되어 시맨틱 검색이 비지만 에러는 아님
        let qvec = embedder.embed("zzz qqq unknownterm").unwrap();
        assert!(qvec.iter().all(|v| *v == 0.0));
        assert!(store.search_semantic(&qvec, 5).is_empty());
    }

    #[test]
    fn test_load_rejects_fingerprint_mismatch() {
        let (store, embedder) = build_store();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        store
            .save(&path, "fp-old", &embedder.export().unwrap())
            .unwrap();

        let result = VectorStore::load(&path, "fp-new");
        assert!(matches!(result, Err(EngineError::LoadFailure(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = VectorStore::load(&dir.path().join("missing.json"), "fp");
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn test_results_are_deterministically_ordered() {
        let (store, embedder) = build_store();
        let qvec = embedder.embed("budget allocation channels").unwrap();
        let a = store.search_semantic(&qvec, 10);
        let b = store.search_semantic(&qvec, 10);
        let ids_a: Vec<&str> = a.iter().map(|r| r.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
