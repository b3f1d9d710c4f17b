//! 하이브리드 융합 - RRF 통합 + 도메인 리랭킹
//!
//! 여러 검색 방법의 순위 목록을 RRF (Reciprocal Rank Fusion)로 통합하고,
//! 질의 맥락(의도/엔티티/벤치마크 필요)에 따른 도메인 부스팅을 적용합니다.
//!
//! ref: https://www.elastic.co/blog/hybrid-search-rrf
//!
//! RRF Score = sum(weight * 1 / (k + rank)), k = 60

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::chunker::Chunk;
use super::metadata::ConfidenceLevel;
use super::query::{IntentClassification, QueryEntities};

/// RRF 상수 - 상위 순위에 더 많은 가중치
pub const RRF_K: f32 = 60.0;

/// 인용문 최대 길이 (문자)
const CITATION_QUOTE_CHARS: usize = 80;

// 도메인 부스팅 가산치
const INTENT_PRIMARY_BOOST: f32 = 0.30;
const INTENT_SECONDARY_BOOST: f32 = 0.10;
const STEP_OVERLAP_BOOST: f32 = 0.20;
const BENCHMARK_BOOST: f32 = 0.25;
const RECENCY_BOOST_MAX: f32 = 0.15;
const CONFIDENCE_HIGH_BOOST: f32 = 0.15;
const CONFIDENCE_MEDIUM_BOOST: f32 = 0.05;
const CONFIDENCE_LOW_PENALTY: f32 = -0.10;
/// 부스팅 합계 상한 - 순위 융합 점수가 부스팅에 압도되지 않게 함
const BOOST_CAP: f32 = 1.0;

// ============================================================================
// Types
// ============================================================================

/// 검색 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetrievalMethod {
    Semantic,
    Keyword,
    Structured,
}

/// 한 검색 방법의 순위 목록 (청크 인덱스, 순위순)
#[derive(Debug, Clone)]
pub struct MethodResults {
    pub method: RetrievalMethod,
    /// RRF 기여 가중치
    pub weight: f32,
    pub ranking: Vec<usize>,
}

/// 융합에 쓰이는 질의 맥락
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub intents: IntentClassification,
    pub entities: QueryEntities,
    /// 질의에서 추출된 워크플로우 단계
    pub steps: Vec<u8>,
    pub needs_benchmarks: bool,
}

/// 결과 출처 표기
#[derive(Debug, Clone, Serialize)]
pub struct Attribution {
    pub source: String,
    pub section: String,
    pub doc_type: String,
    pub confidence: String,
    /// "파일 › 섹션: \"인용…\"" 형태
    pub citation: String,
}

/// 융합 최종 결과
#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    pub chunk_index: usize,
    pub chunk_id: String,
    pub rrf_score: f32,
    /// 적용된 도메인 부스팅 합계 (상한 적용 후)
    pub domain_boost: f32,
    /// rrf_score * (1 + domain_boost)
    pub final_score: f32,
    /// 이 청크를 찾아낸 방법과 그 방법 내 순위 (1부터)
    pub method_ranks: Vec<(RetrievalMethod, usize)>,
    pub attribution: Attribution,
}

// ============================================================================
// ResultFusion
// ============================================================================

/// RRF 융합기
///
/// 기준일을 고정하면 최신성 부스팅이 결정적이 됩니다 (테스트용).
pub struct ResultFusion {
    k: f32,
    reference_date: Option<NaiveDate>,
}

impl Default for ResultFusion {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFusion {
    pub fn new() -> Self {
        Self {
            k: RRF_K,
            reference_date: None,
        }
    }

    pub fn with_k(k: f32) -> Self {
        Self {
            k,
            reference_date: None,
        }
    }

    pub fn with_reference_date(date: NaiveDate) -> Self {
        Self {
            k: RRF_K,
            reference_date: Some(date),
        }
    }

    /// 방법별 순위 목록을 RRF로 통합하고 도메인 부스팅 적용
    ///
    /// 한 방법에만 잡힌 청크도 그 방법의 기여분만으로 경쟁합니다.
    /// 동점은 (시맨틱 순위, 청크 ID) 순으로 안정적으로 풀립니다.
    pub fn fuse(
        &self,
        method_results: &[MethodResults],
        chunks: &[Chunk],
        context: &QueryContext,
        limit: usize,
    ) -> Vec<FusedResult> {
        // 청크 인덱스 → (rrf 누적, (방법, 1기반 순위) 목록)
        let mut fused: HashMap<usize, (f32, Vec<(RetrievalMethod, usize)>)> = HashMap::new();
        // 동점 해소용 시맨틱 순위
        let mut semantic_rank: HashMap<usize, usize> = HashMap::new();

        for results in method_results {
            for (rank0, &chunk_index) in results.ranking.iter().enumerate() {
                let rank = rank0 + 1;
                let contribution = results.weight * (1.0 / (self.k + rank as f32));
                let entry = fused.entry(chunk_index).or_insert((0.0, Vec::new()));
                entry.0 += contribution;
                if !entry.1.iter().any(|(m, _)| *m == results.method) {
                    entry.1.push((results.method, rank));
                }
                if results.method == RetrievalMethod::Semantic {
                    semantic_rank.insert(chunk_index, rank0);
                }
            }
        }

        let mut results: Vec<FusedResult> = fused
            .into_iter()
            .filter_map(|(chunk_index, (rrf_score, method_ranks))| {
                let chunk = chunks.get(chunk_index)?;
                let domain_boost = self.domain_boost(chunk, context);
                Some(FusedResult {
                    chunk_index,
                    chunk_id: chunk.id.clone(),
                    rrf_score,
                    domain_boost,
                    final_score: rrf_score * (1.0 + domain_boost),
                    method_ranks,
                    attribution: build_attribution(chunk),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ra = semantic_rank.get(&a.chunk_index).copied().unwrap_or(usize::MAX);
                    let rb = semantic_rank.get(&b.chunk_index).copied().unwrap_or(usize::MAX);
                    ra.cmp(&rb)
                })
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        results.truncate(limit);
        results
    }

    /// 도메인 부스팅 합산 - 상한 BOOST_CAP
    fn domain_boost(&self, chunk: &Chunk, context: &QueryContext) -> f32 {
        let meta = &chunk.metadata;
        let mut boost = 0.0f32;

        // 의도 정렬
        let primary = context.intents.primary.as_str();
        if meta.intents.iter().any(|i| i == primary) {
            boost += INTENT_PRIMARY_BOOST;
        } else if let Some(secondary) = context.intents.secondary {
            if meta.intents.iter().any(|i| i == secondary.as_str()) {
                boost += INTENT_SECONDARY_BOOST;
            }
        }

        // 워크플로우 단계 겹침
        if !context.steps.is_empty() && context.steps.iter().any(|s| meta.steps.contains(s)) {
            boost += STEP_OVERLAP_BOOST;
        }

        // 벤치마크 필요 질의
        if context.needs_benchmarks && meta.has_benchmarks {
            boost += BENCHMARK_BOOST;
        }

        // 최신성 감쇠: 1년 경과 시 약 1/e
        if let Some(updated) = meta.last_updated {
            let today = self
                .reference_date
                .unwrap_or_else(|| chrono::Utc::now().date_naive());
            let age_days = (today - updated).num_days().max(0) as f32;
            boost += RECENCY_BOOST_MAX * (-age_days / 365.0).exp();
        }

        // 신뢰도
        boost += match meta.confidence {
            ConfidenceLevel::High => CONFIDENCE_HIGH_BOOST,
            ConfidenceLevel::Medium => CONFIDENCE_MEDIUM_BOOST,
            ConfidenceLevel::Low => CONFIDENCE_LOW_PENALTY,
        };

        boost.min(BOOST_CAP)
    }
}

/// 출처 표기 생성 - 인용은 청크 선두에서 문자 경계로 절단
pub fn build_attribution(chunk: &Chunk) -> Attribution {
    let quote: String = chunk.content.chars().take(CITATION_QUOTE_CHARS).collect();
    let truncated = quote.len() < chunk.content.len();
    let citation = format!(
        "{} › {}: \"{}{}\"",
        chunk.source,
        chunk.section,
        quote.replace('\n', " "),
        if truncated { "…" } else { "" }
    );

    Attribution {
        source: chunk.source.clone(),
        section: chunk.section.clone(),
        doc_type: chunk.metadata.doc_type.as_str().to_string(),
        confidence: chunk.metadata.confidence.as_str().to_string(),
        citation,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::{Chunk, ChunkMetadata, ContentType};
    use crate::knowledge::query::{QueryIntent, QueryUnderstanding};

    fn make_chunk(index: usize, meta: ChunkMetadata) -> Chunk {
        Chunk {
            id: format!("doc-{:03}", index),
            source: "doc.txt".to_string(),
            section: "Section".to_string(),
            content: format!("Chunk content number {} about marketing.", index),
            start_offset: 0,
            end_offset: 0,
            content_type: ContentType::Default,
            metadata: meta,
        }
    }

    fn neutral_context() -> QueryContext {
        QueryContext {
            intents: IntentClassification {
                primary: QueryIntent::GeneralGuidance,
                secondary: None,
                confidence: 0.2,
            },
            entities: QueryEntities::default(),
            steps: Vec::new(),
            needs_benchmarks: false,
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n).map(|i| make_chunk(i, ChunkMetadata::default())).collect()
    }

    #[test]
    fn test_rrf_prefers_chunk_in_both_rankings() {
        let chunks = chunks(3);
        let methods = vec![
            MethodResults {
                method: RetrievalMethod::Semantic,
                weight: 1.0,
                ranking: vec![0, 1],
            },
            MethodResults {
                method: RetrievalMethod::Keyword,
                weight: 1.0,
                ranking: vec![1, 2],
            },
        ];
        let fusion = ResultFusion::new();
        let results = fusion.fuse(&methods, &chunks, &neutral_context(), 10);

        // 청크 1은 양쪽에 등장하므로 최상위
        assert_eq!(results[0].chunk_index, 1);
        // 방법별 1기반 순위가 결과에 실려야 함
        assert_eq!(results[0].method_ranks.len(), 2);
        assert!(results[0]
            .method_ranks
            .contains(&(RetrievalMethod::Semantic, 2)));
        assert!(results[0]
            .method_ranks
            .contains(&(RetrievalMethod::Keyword, 1)));
        // 1/(60+2) + 1/(60+1)
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((results[0].rrf_score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_worse_rank_never_raises_fused_score() {
        // 한 방법에서 순위가 나빠지면 (다른 방법 고정) 융합 점수는 오르지 않는다
        let chunks = chunks(4);
        let fusion = ResultFusion::new();
        let context = neutral_context();

        let score_of = |keyword_ranking: Vec<usize>| -> f32 {
            let methods = vec![
                MethodResults {
                    method: RetrievalMethod::Semantic,
                    weight: 0.6,
                    ranking: vec![0, 1, 2],
                },
                MethodResults {
                    method: RetrievalMethod::Keyword,
                    weight: 0.4,
                    ranking: keyword_ranking,
                },
            ];
            fusion
                .fuse(&methods, &chunks, &context, 10)
                .into_iter()
                .find(|r| r.chunk_index == 0)
                .unwrap()
                .final_score
        };

        // 청크 0의 키워드 순위를 1위 → 2위 → 3위로 내리면서 비교
        let first = score_of(vec![0, 1, 2]);
        let second = score_of(vec![1, 0, 2]);
        let third = score_of(vec![1, 2, 0]);
        assert!(second < first);
        assert!(third < second);
    }

    #[test]
    fn test_method_weights_shift_ranking() {
        let chunks = chunks(2);
        let methods = vec![
            MethodResults {
                method: RetrievalMethod::Semantic,
                weight: 0.6,
                ranking: vec![0],
            },
            MethodResults {
                method: RetrievalMethod::Keyword,
                weight: 0.4,
                ranking: vec![1],
            },
        ];
        let results = ResultFusion::new().fuse(&methods, &chunks, &neutral_context(), 10);
        // 같은 순위라면 가중치가 큰 방법의 청크가 앞
        assert_eq!(results[0].chunk_index, 0);
    }

    #[test]
    fn test_intent_alignment_boost() {
        let mut meta_aligned = ChunkMetadata::default();
        meta_aligned.intents = vec!["benchmark_lookup".to_string()];
        let chunks = vec![
            make_chunk(0, ChunkMetadata::default()),
            make_chunk(1, meta_aligned),
        ];

        let mut context = neutral_context();
        context.intents.primary = QueryIntent::BenchmarkLookup;

        // 정렬된 청크가 더 낮은 순위에서 출발해도 부스팅으로 역전
        let methods = vec![MethodResults {
            method: RetrievalMethod::Semantic,
            weight: 1.0,
            ranking: vec![0, 1],
        }];
        let results = ResultFusion::new().fuse(&methods, &chunks, &context, 10);
        assert_eq!(results[0].chunk_index, 1);
        assert!(results[0].domain_boost >= INTENT_PRIMARY_BOOST);
    }

    #[test]
    fn test_benchmark_need_boost() {
        let mut meta = ChunkMetadata::default();
        meta.has_benchmarks = true;
        let chunks = vec![make_chunk(0, ChunkMetadata::default()), make_chunk(1, meta)];

        let mut context = neutral_context();
        context.needs_benchmarks = true;

        let methods = vec![MethodResults {
            method: RetrievalMethod::Semantic,
            weight: 1.0,
            ranking: vec![0, 1],
        }];
        let results = ResultFusion::new().fuse(&methods, &chunks, &context, 10);
        assert_eq!(results[0].chunk_index, 1);
    }

    #[test]
    fn test_recency_boost_is_deterministic_with_reference_date() {
        let mut fresh = ChunkMetadata::default();
        fresh.last_updated = NaiveDate::from_ymd_opt(2025, 6, 1);
        let mut stale = ChunkMetadata::default();
        stale.last_updated = NaiveDate::from_ymd_opt(2020, 6, 1);
        let chunks = vec![make_chunk(0, stale), make_chunk(1, fresh)];

        let fusion =
            ResultFusion::with_reference_date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let methods = vec![MethodResults {
            method: RetrievalMethod::Semantic,
            weight: 1.0,
            ranking: vec![0, 1],
        }];
        let results = fusion.fuse(&methods, &chunks, &neutral_context(), 10);
        assert_eq!(results[0].chunk_index, 1);
        assert!(results[0].domain_boost > results[1].domain_boost);
    }

    #[test]
    fn test_low_confidence_penalty() {
        let mut low = ChunkMetadata::default();
        low.confidence = ConfidenceLevel::Low;
        let chunks = vec![make_chunk(0, low), make_chunk(1, ChunkMetadata::default())];

        let methods = vec![MethodResults {
            method: RetrievalMethod::Semantic,
            weight: 1.0,
            ranking: vec![0, 1],
        }];
        let results = ResultFusion::new().fuse(&methods, &chunks, &neutral_context(), 10);
        let low_result = results.iter().find(|r| r.chunk_index == 0).unwrap();
        assert!(low_result.domain_boost < 0.0);
    }

    #[test]
    fn test_boost_is_capped() {
        let mut meta = ChunkMetadata::default();
        meta.intents = vec!["benchmark_lookup".to_string()];
        meta.steps = vec![2];
        meta.has_benchmarks = true;
        meta.confidence = ConfidenceLevel::High;
        meta.last_updated = NaiveDate::from_ymd_opt(2025, 6, 30);
        let chunks = vec![make_chunk(0, meta)];

        let mut context = neutral_context();
        context.intents.primary = QueryIntent::BenchmarkLookup;
        context.steps = vec![2];
        context.needs_benchmarks = true;

        let fusion =
            ResultFusion::with_reference_date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let methods = vec![MethodResults {
            method: RetrievalMethod::Semantic,
            weight: 1.0,
            ranking: vec![0],
        }];
        let results = fusion.fuse(&methods, &chunks, &context, 10);
        assert!(results[0].domain_boost <= BOOST_CAP);
    }

    #[test]
    fn test_citation_format() {
        let chunk = make_chunk(0, ChunkMetadata::default());
        let attribution = build_attribution(&chunk);
        assert!(attribution.citation.starts_with("doc.txt › Section: \""));
        assert_eq!(attribution.doc_type, "reference");
        assert_eq!(attribution.confidence, "MEDIUM");
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let chunks = chunks(5);
        let methods = vec![
            MethodResults {
                method: RetrievalMethod::Semantic,
                weight: 0.6,
                ranking: vec![3, 1, 4],
            },
            MethodResults {
                method: RetrievalMethod::Keyword,
                weight: 0.4,
                ranking: vec![1, 2, 0],
            },
        ];
        let fusion = ResultFusion::new();
        let a = fusion.fuse(&methods, &chunks, &neutral_context(), 10);
        let b = fusion.fuse(&methods, &chunks, &neutral_context(), 10);
        let ids_a: Vec<&str> = a.iter().map(|r| r.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
