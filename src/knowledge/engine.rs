//! 검색 엔진 파사드
//!
//! 인덱스 수명주기(로드/빌드/저장)와 검색 파이프라인을 관리합니다.
//! 스냅샷은 빌드 후 불변이며, 리빌드 시 원자적으로 교체됩니다.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::collector::{CollectorConfig, CorpusCollector};
use crate::embedding::{EmbeddingProvider, TfIdfEmbedding, DEFAULT_DIMENSION};
use crate::knowledge::chunker::{Chunk, ChunkConfig, DocumentChunker};
use crate::knowledge::hybrid::{
    build_attribution, MethodResults, QueryContext, ResultFusion, RetrievalMethod, RRF_K,
};
use crate::knowledge::lexicon;
use crate::knowledge::query::{QueryIntent, QueryUnderstanding};
use crate::knowledge::store::{matches_filters, SearchFilters, VectorStore};
use crate::knowledge::EngineError;

// ============================================================================
// Config
// ============================================================================

/// 인덱스 저장 폴더 (~/.growthkb-rag)
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".growthkb-rag")
}

/// 엔진 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 코퍼스 문서 폴더
    pub corpus_dir: PathBuf,
    /// 인덱스 파일 경로
    pub index_path: PathBuf,
    /// 임베딩 차원 (어휘 상한)
    pub dimension: usize,
    /// 하이브리드 시맨틱 가중치 (키워드는 1 - 이 값)
    pub semantic_weight: f32,
    /// RRF 상수
    pub rrf_k: f32,
    /// 기본 결과 수
    pub default_top_k: usize,
    /// 기본 최소 점수 (이 미만은 제외)
    pub min_score: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("knowledge"),
            index_path: get_data_dir().join("index.json"),
            dimension: DEFAULT_DIMENSION,
            semantic_weight: 0.6,
            rrf_k: RRF_K,
            default_top_k: 5,
            min_score: 0.0,
        }
    }
}

impl EngineConfig {
    /// 코퍼스 폴더만 바꾼 기본 설정
    pub fn for_corpus(dir: impl Into<PathBuf>) -> Self {
        Self {
            corpus_dir: dir.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Public Result Types
// ============================================================================

/// 검색 옵션
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub filters: SearchFilters,
}

/// 검색 결과 한 건
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    pub content: String,
    pub source: String,
    pub section: String,
    pub relevance_score: f32,
    pub citation_text: String,
}

/// 벤치마크 조회 결과
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkAnswer {
    pub metric: String,
    pub vertical: String,
    /// 매칭된 범위의 원문 ("$25-45" 등)
    pub value: String,
    pub qualifier: Option<String>,
    pub source: String,
    pub citation_text: String,
}

/// 오디언스 규모 조회 결과
#[derive(Debug, Clone, Serialize)]
pub struct AudienceSizing {
    pub audience_type: String,
    /// 본문에서 추출한 규모 표현 ("1.2 million" 등)
    pub total_size: String,
    /// 규모가 발견된 섹션 제목
    pub methodology: String,
    pub source: String,
    pub citation_text: String,
}

/// 인덱스 통계
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub chunk_count: usize,
    pub source_count: usize,
    pub vocabulary_size: usize,
    pub index_path: PathBuf,
}

// ============================================================================
// Snapshot
// ============================================================================

/// 불변 인덱스 스냅샷
///
/// 빈 코퍼스에서는 빈 스토어 + 미학습 임베더로 구성되며,
/// 모든 조회가 빈 결과를 반환합니다.
pub struct Snapshot {
    store: VectorStore,
    embedder: TfIdfEmbedding,
}

// ============================================================================
// RetrievalEngine
// ============================================================================

/// 구조화 검색 방법의 RRF 기여 가중치
const STRUCTURED_WEIGHT: f32 = 0.8;

/// 검색 엔진
///
/// `ensure_ready`는 멱등적이며 동시 호출에도 인덱스를 한 번만
/// 빌드합니다 (빌드 락 + 이중 확인).
pub struct RetrievalEngine {
    config: EngineConfig,
    chunker: DocumentChunker,
    analyzer: QueryUnderstanding,
    fusion: ResultFusion,
    /// "1.2 million", "350,000" 등 규모 표현
    audience_size: Regex,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    build_lock: Mutex<()>,
}

impl RetrievalEngine {
    pub fn new(config: EngineConfig) -> Self {
        let fusion = ResultFusion::with_k(config.rrf_k);
        Self {
            config,
            chunker: DocumentChunker::new(ChunkConfig::default()),
            analyzer: QueryUnderstanding::new(),
            fusion,
            audience_size: Regex::new(
                r"(?i)\b\d[\d,]*(?:\.\d+)?\s*(?:thousand|million|billion|[kmb])\b|\b\d{1,3}(?:,\d{3})+\b",
            )
            .unwrap(),
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 인덱스 설정 지문 - 차원이나 청킹 설정이 바뀌면 리빌드 유도
    fn fingerprint(&self) -> String {
        format!(
            "dim={};{}",
            self.config.dimension,
            self.chunker.config().fingerprint()
        )
    }

    /// 스냅샷 준비 (로드 시도 → 실패 시 빌드 + 저장)
    ///
    /// 이미 준비된 경우 즉시 반환합니다. 동시 호출은 빌드 락에서
    /// 직렬화되고, 락 획득 후 이중 확인으로 중복 빌드를 막습니다.
    pub async fn ensure_ready(&self) -> Result<Arc<Snapshot>, EngineError> {
        if let Some(snap) = self.snapshot.read().await.clone() {
            return Ok(snap);
        }

        let _guard = self.build_lock.lock().await;
        if let Some(snap) = self.snapshot.read().await.clone() {
            return Ok(snap);
        }

        let fingerprint = self.fingerprint();
        let loaded = VectorStore::load(&self.config.index_path, &fingerprint).and_then(
            |(store, vocab)| {
                let embedder = TfIdfEmbedding::from_export(vocab)?;
                Ok(Snapshot { store, embedder })
            },
        );

        let snap = match loaded {
            Ok(snap) => Arc::new(snap),
            Err(e) => {
                tracing::warn!("Index load failed, rebuilding from corpus: {}", e);
                let snap = self.build_from_corpus()?;
                self.persist(&snap, &fingerprint);
                Arc::new(snap)
            }
        };

        *self.snapshot.write().await = Some(snap.clone());
        Ok(snap)
    }

    /// 코퍼스에서 스냅샷 빌드
    ///
    /// 코퍼스 폴더가 없거나 비어 있으면 빈 스냅샷을 반환합니다.
    /// 엔진은 빈 결과로 계속 동작합니다.
    fn build_from_corpus(&self) -> Result<Snapshot, EngineError> {
        if !self.config.corpus_dir.exists() {
            tracing::warn!(
                "Corpus directory not found, starting empty: {:?}",
                self.config.corpus_dir
            );
            return Self::empty_snapshot(self.config.dimension);
        }

        let collector = CorpusCollector::new(CollectorConfig::default());
        let files = collector.collect(&self.config.corpus_dir)?;

        let mut chunks: Vec<Chunk> = Vec::new();
        for file in &files {
            chunks.extend(self.chunker.chunk_document(&file.content, &file.filename));
        }

        if chunks.is_empty() {
            tracing::warn!(
                "Corpus produced no chunks: {:?}",
                self.config.corpus_dir
            );
            return Self::empty_snapshot(self.config.dimension);
        }

        let corpus: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut embedder = TfIdfEmbedding::new(self.config.dimension);
        embedder.initialize(&corpus)?;
        let embeddings = embedder.embed_batch(&corpus)?;
        let store = VectorStore::build(chunks, embeddings)?;

        tracing::info!(
            "Built index: {} chunks, {} vocabulary terms",
            store.len(),
            embedder.vocabulary_size()
        );
        Ok(Snapshot { store, embedder })
    }

    fn empty_snapshot(dimension: usize) -> Result<Snapshot, EngineError> {
        Ok(Snapshot {
            store: VectorStore::build(Vec::new(), Vec::new())?,
            embedder: TfIdfEmbedding::new(dimension),
        })
    }

    /// 스냅샷 저장 - 저장 실패는 검색을 막지 않으므로 경고만 남김
    fn persist(&self, snap: &Snapshot, fingerprint: &str) {
        let vocab = match snap.embedder.export() {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!("Empty index not persisted");
                return;
            }
        };
        if let Err(e) = snap.store.save(&self.config.index_path, fingerprint, &vocab) {
            tracing::warn!("Failed to persist index: {}", e);
        }
    }

    /// 코퍼스에서 인덱스 강제 리빌드 + 저장 + 스냅샷 교체
    pub async fn rebuild(&self) -> Result<EngineStats, EngineError> {
        let _guard = self.build_lock.lock().await;

        let snap = self.build_from_corpus()?;
        self.persist(&snap, &self.fingerprint());
        let snap = Arc::new(snap);

        *self.snapshot.write().await = Some(snap.clone());
        Ok(self.stats_of(&snap))
    }

    /// 인덱스 통계
    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        let snap = self.ensure_ready().await?;
        Ok(self.stats_of(&snap))
    }

    fn stats_of(&self, snap: &Snapshot) -> EngineStats {
        let sources: BTreeSet<&str> = snap
            .store
            .chunks()
            .iter()
            .map(|c| c.source.as_str())
            .collect();
        EngineStats {
            chunk_count: snap.store.len(),
            source_count: sources.len(),
            vocabulary_size: snap.embedder.vocabulary_size(),
            index_path: self.config.index_path.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// 하이브리드 검색
    ///
    /// 시맨틱은 원문 질의, 키워드는 동의어 확장 질의로 수행한 뒤
    /// RRF로 융합하고 도메인 부스팅을 적용합니다. 필터가 있으면
    /// 구조화 검색이 세 번째 방법으로 참여하고, 최종 결과도 필터를
    /// 엄격하게 통과해야 합니다.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<EngineResult>, EngineError> {
        let snap = self.ensure_ready().await?;
        if snap.store.is_empty() {
            return Ok(Vec::new());
        }

        let top_k = options.top_k.unwrap_or(self.config.default_top_k);
        let min_score = options.min_score.unwrap_or(self.config.min_score);
        let pool = (top_k * 3).max(30);

        let intents = self.analyzer.classify(query);
        let entities = self.analyzer.extract_entities(query);
        let expanded = self.analyzer.expand(query);
        let query_lower = query.to_lowercase();
        let steps = lexicon::step_hits(&query_lower);
        let needs_benchmarks = intents.primary == QueryIntent::BenchmarkLookup
            || intents.secondary == Some(QueryIntent::BenchmarkLookup);

        let query_vector = snap.embedder.embed(query)?;
        let semantic = snap.store.search_semantic(&query_vector, pool);
        let keyword = snap.store.search_keyword(&expanded.expanded, pool);

        let mut methods = vec![
            MethodResults {
                method: RetrievalMethod::Semantic,
                weight: self.config.semantic_weight,
                ranking: semantic.iter().map(|r| r.chunk_index).collect(),
            },
            MethodResults {
                method: RetrievalMethod::Keyword,
                weight: 1.0 - self.config.semantic_weight,
                // 0점 꼬리는 순위 융합에 기여하지 않게 제외
                ranking: keyword
                    .iter()
                    .filter(|r| r.score > 0.0)
                    .map(|r| r.chunk_index)
                    .collect(),
            },
        ];

        let has_filters = !options.filters.is_empty();
        if has_filters {
            let structured = snap.store.search_filtered(
                query,
                &query_vector,
                self.config.semantic_weight,
                &options.filters,
                pool,
            );
            methods.push(MethodResults {
                method: RetrievalMethod::Structured,
                weight: STRUCTURED_WEIGHT,
                ranking: structured.iter().map(|r| r.chunk_index).collect(),
            });
        }

        let context = QueryContext {
            intents,
            entities,
            steps,
            needs_benchmarks,
        };
        let fused = self.fusion.fuse(&methods, snap.store.chunks(), &context, pool);

        let results = fused
            .into_iter()
            .filter(|f| {
                !has_filters
                    || snap
                        .store
                        .chunk(f.chunk_index)
                        .map(|c| matches_filters(c, &options.filters))
                        .unwrap_or(false)
            })
            .filter(|f| f.final_score >= min_score)
            .take(top_k)
            .filter_map(|f| {
                let chunk = snap.store.chunk(f.chunk_index)?;
                Some(EngineResult {
                    content: chunk.content.clone(),
                    source: chunk.source.clone(),
                    section: chunk.section.clone(),
                    relevance_score: f.final_score,
                    citation_text: f.attribution.citation,
                })
            })
            .collect();

        Ok(results)
    }

    // ------------------------------------------------------------------------
    // Structured Lookups
    // ------------------------------------------------------------------------

    /// 버티컬별 벤치마크 조회
    ///
    /// 지표를 canonical로 정규화한 뒤 벤치마크 보유 청크에서 찾습니다.
    /// 버티컬 일치 청크를 우선하고, 없으면 지표만 일치하는 청크로
    /// 폴백합니다. 후보는 신뢰도 → 목적 가중치 → 최신성 순으로
    /// 선정됩니다.
    pub async fn get_benchmark(
        &self,
        vertical: &str,
        metric: &str,
    ) -> Result<Option<BenchmarkAnswer>, EngineError> {
        let snap = self.ensure_ready().await?;
        if snap.store.is_empty() {
            return Ok(None);
        }

        let metric_lower = metric.to_lowercase();
        let canonical = lexicon::synonym_group(&metric_lower)
            .map(|(c, _)| c.to_string())
            .or_else(|| lexicon::metric_hits(&metric_lower).into_iter().next())
            .unwrap_or(metric_lower);

        let vertical_lower = vertical.to_lowercase();
        let vertical_canonical = lexicon::vertical_hits(&vertical_lower)
            .into_iter()
            .next()
            .unwrap_or(vertical_lower);

        let candidates: Vec<&Chunk> = snap
            .store
            .chunks()
            .iter()
            .filter(|c| {
                c.metadata.has_benchmarks && c.metadata.metrics.iter().any(|m| m == &canonical)
            })
            .collect();

        let scoped: Vec<&Chunk> = candidates
            .iter()
            .filter(|c| c.metadata.verticals.iter().any(|v| v == &vertical_canonical))
            .copied()
            .collect();

        let mut pool = if scoped.is_empty() { candidates } else { scoped };
        if pool.is_empty() {
            return Ok(None);
        }
        pool.sort_by(|a, b| benchmark_rank(b).partial_cmp(&benchmark_rank(a)).unwrap_or(std::cmp::Ordering::Equal));

        let best = pool[0];
        let range = best
            .metadata
            .benchmark_ranges
            .iter()
            .find(|r| r.metric.as_deref() == Some(canonical.as_str()))
            .or_else(|| best.metadata.benchmark_ranges.first());
        let Some(range) = range else {
            return Ok(None);
        };

        Ok(Some(BenchmarkAnswer {
            metric: canonical,
            vertical: vertical_canonical,
            value: range.raw.clone(),
            qualifier: range.qualifier.clone(),
            source: best.source.clone(),
            citation_text: build_attribution(best).citation,
        }))
    }

    /// 오디언스 규모 조회
    ///
    /// audience 토픽 청크를 대상으로 검색한 뒤, 본문에서 규모 표현을
    /// 찾은 첫 청크를 답으로 씁니다. 규모 표현이 없으면 None입니다.
    pub async fn get_audience_sizing(
        &self,
        audience_type: &str,
        geography: Option<&str>,
    ) -> Result<Option<AudienceSizing>, EngineError> {
        let snap = self.ensure_ready().await?;
        if snap.store.is_empty() {
            return Ok(None);
        }

        let query = match geography {
            Some(geo) => format!("{} audience size {}", audience_type, geo),
            None => format!("{} audience size", audience_type),
        };
        let filters = SearchFilters {
            topics: vec!["audience".into()],
            ..Default::default()
        };

        let query_vector = snap.embedder.embed(&query)?;
        let results = snap.store.search_filtered(
            &query,
            &query_vector,
            self.config.semantic_weight,
            &filters,
            10,
        );

        for result in &results {
            let Some(chunk) = snap.store.chunk(result.chunk_index) else {
                continue;
            };
            if let Some(m) = self.audience_size.find(&chunk.content) {
                return Ok(Some(AudienceSizing {
                    audience_type: audience_type.to_string(),
                    total_size: m.as_str().trim().to_string(),
                    methodology: chunk.section.clone(),
                    source: chunk.source.clone(),
                    citation_text: build_attribution(chunk).citation,
                }));
            }
        }

        Ok(None)
    }

    /// 워크플로우 단계별 가이드
    ///
    /// 해당 단계로 사전 필터링된 검색입니다. 토픽이 없으면 단계
    /// 일반 질의를 씁니다.
    pub async fn get_step_guidance(
        &self,
        step: u8,
        topic: Option<&str>,
    ) -> Result<Vec<EngineResult>, EngineError> {
        let query = match topic {
            Some(t) => t.to_string(),
            None => format!("workflow step {} guidance", step),
        };
        let options = SearchOptions {
            filters: SearchFilters {
                steps: vec![step],
                ..Default::default()
            },
            ..Default::default()
        };
        self.search(&query, &options).await
    }
}

/// 벤치마크 후보 정렬 키: (신뢰도, 목적 가중치, 최신성)
fn benchmark_rank(chunk: &Chunk) -> (u8, f32, i64) {
    use crate::knowledge::metadata::ConfidenceLevel;
    use chrono::Datelike;
    let confidence = match chunk.metadata.confidence {
        ConfidenceLevel::High => 2,
        ConfidenceLevel::Medium => 1,
        ConfidenceLevel::Low => 0,
    };
    let recency = chunk
        .metadata
        .last_updated
        .map(|d| d.num_days_from_ce() as i64)
        .unwrap_or(0);
    (confidence, chunk.metadata.purpose.weight(), recency)
}

// ============================================================================
// Tests
// ============================================================================
