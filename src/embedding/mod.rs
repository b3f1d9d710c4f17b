//! 임베딩 모듈 - 코퍼스 학습형 TF-IDF 희소 벡터화
//!
//! 외부 API 없이 코퍼스에서 어휘를 학습해 텍스트를 고정 차원의
//! L2 정규화 벡터로 변환합니다. 시맨틱 검색의 핵심 모듈입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let mut embedder = TfIdfEmbedding::new(DEFAULT_DIMENSION);
//! embedder.initialize(&corpus)?;
//! let vector = embedder.embed("ecommerce cac benchmarks")?;
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// 임베딩 에러
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider not initialized - call initialize() with a corpus first")]
    NotInitialized,

    #[error("corpus is empty - nothing to learn a vocabulary from")]
    EmptyCorpus,

    #[error("vocabulary is empty - corpus produced no usable terms")]
    EmptyVocabulary,
}

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// TF-IDF Embedding
// ============================================================================

/// 기본 임베딩 차원 (어휘 상한)
pub const DEFAULT_DIMENSION: usize = 512;

/// 어휘에 포함되는 최소 토큰 길이
const MIN_TERM_LEN: usize = 3;

/// 코퍼스 학습형 TF-IDF 임베딩 구현체
///
/// 어휘는 코퍼스 전체의 집계 TF-IDF 점수 상위 `dimension`개 용어로
/// 구성되며, 각 용어가 벡터의 한 슬롯을 차지합니다.
/// 가중치: tf' = 1 + ln(tf), idf = ln((N+1)/(df+1)) + 1.
#[derive(Debug, Clone)]
pub struct TfIdfEmbedding {
    dimension: usize,
    /// 용어 → 벡터 슬롯
    vocab: HashMap<String, usize>,
    /// 슬롯별 IDF 가중치
    idf: Vec<f32>,
    initialized: bool,
}

/// 어휘 직렬화 형식 (인덱스 파일에 저장)
///
/// entries는 슬롯 순서의 (용어, idf) 목록입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyExport {
    pub dimension: usize,
    pub entries: Vec<(String, f32)>,
}

impl TfIdfEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vocab: HashMap::new(),
            idf: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }

    /// 코퍼스에서 어휘와 IDF를 학습
    ///
    /// 집계 TF-IDF 점수 상위 `dimension`개 용어를 선정합니다.
    /// 동점은 용어의 사전순으로 안정적으로 정렬되므로 같은 코퍼스는
    /// 항상 같은 어휘를 만듭니다. 재호출 시 어휘를 다시 학습합니다.
    pub fn initialize(&mut self, corpus: &[String]) -> Result<(), EmbeddingError> {
        if corpus.is_empty() {
            return Err(EmbeddingError::EmptyCorpus);
        }

        let doc_count = corpus.len();
        // 용어 → (총 출현 횟수, 문서 빈도)
        let mut term_stats: HashMap<String, (u64, u64)> = HashMap::new();

        for doc in corpus {
            let tokens = tokenize(doc);
            let mut counts: HashMap<&str, u64> = HashMap::new();
            for token in &tokens {
                if token.len() >= MIN_TERM_LEN {
                    *counts.entry(token.as_str()).or_insert(0) += 1;
                }
            }
            for (term, count) in counts {
                let entry = term_stats.entry(term.to_string()).or_insert((0, 0));
                entry.0 += count;
                entry.1 += 1;
            }
        }

        if term_stats.is_empty() {
            return Err(EmbeddingError::EmptyVocabulary);
        }

        // 집계 TF-IDF 점수로 상위 dimension개 선정
        let mut scored: Vec<(String, f64)> = term_stats
            .into_iter()
            .map(|(term, (total_tf, df))| {
                let idf = idf_weight(doc_count, df as usize) as f64;
                let score = (1.0 + (total_tf as f64).ln()) * idf;
                (term, score)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(self.dimension);

        // 선정된 용어의 문서 빈도를 다시 센다
        let selected: std::collections::HashSet<&str> =
            scored.iter().map(|(t, _)| t.as_str()).collect();
        let mut df_map: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let tokens = tokenize(doc);
            let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
            for token in &tokens {
                if selected.contains(token.as_str()) {
                    seen.insert(token.as_str());
                }
            }
            for term in seen {
                *df_map.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        self.vocab = HashMap::with_capacity(scored.len());
        self.idf = Vec::with_capacity(scored.len());
        for (slot, (term, _)) in scored.iter().enumerate() {
            let df = df_map.get(term.as_str()).copied().unwrap_or(0);
            self.idf.push(idf_weight(doc_count, df));
            self.vocab.insert(term.clone(), slot);
        }
        self.initialized = true;

        tracing::info!(
            "TF-IDF vocabulary learned: {} terms from {} documents",
            self.vocab.len(),
            doc_count
        );
        Ok(())
    }

    /// 어휘를 직렬화 형식으로 내보내기
    pub fn export(&self) -> Result<VocabularyExport, EmbeddingError> {
        if !self.initialized {
            return Err(EmbeddingError::NotInitialized);
        }
        let mut entries: Vec<(String, f32)> = vec![(String::new(), 0.0); self.vocab.len()];
        for (term, slot) in &self.vocab {
            entries[*slot] = (term.clone(), self.idf[*slot]);
        }
        Ok(VocabularyExport {
            dimension: self.dimension,
            entries,
        })
    }

    /// 직렬화된 어휘에서 복원 (인덱스 로드 경로)
    pub fn from_export(export: VocabularyExport) -> Result<Self, EmbeddingError> {
        if export.entries.is_empty() {
            return Err(EmbeddingError::EmptyVocabulary);
        }
        let mut vocab = HashMap::with_capacity(export.entries.len());
        let mut idf = Vec::with_capacity(export.entries.len());
        for (slot, (term, weight)) in export.entries.into_iter().enumerate() {
            vocab.insert(term, slot);
            idf.push(weight);
        }
        Ok(Self {
            dimension: export.dimension,
            vocab,
            idf,
            initialized: true,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }
}

impl EmbeddingProvider for TfIdfEmbedding {
    /// 텍스트를 L2 정규화된 TF-IDF 벡터로 변환
    ///
    /// 어휘 밖 토큰만 있는 텍스트는 영벡터가 됩니다 (에러 아님).
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.initialized {
            return Err(EmbeddingError::NotInitialized);
        }

        let mut vector = vec![0.0f32; self.dimension];
        if text.trim().is_empty() {
            return Ok(vector);
        }

        let mut counts: HashMap<&str, u64> = HashMap::new();
        let tokens = tokenize(text);
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        for (term, count) in counts {
            if let Some(&slot) = self.vocab.get(term) {
                let tf = 1.0 + (count as f32).ln();
                vector[slot] = tf * self.idf[slot];
            }
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "tfidf-sparse"
    }
}

// ============================================================================
// Tokenization & Similarity
// ============================================================================

/// 소문자 영숫자 연속으로 토큰화
///
/// 청커/스토어/쿼리 모듈이 같은 토큰화를 공유해야 인덱스가 일관됩니다.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// 코사인 유사도 - 차원 불일치나 영벡터는 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// IDF 가중치: ln((N+1)/(df+1)) + 1
fn idf_weight(doc_count: usize, df: usize) -> f32 {
    ((doc_count as f32 + 1.0) / (df as f32 + 1.0)).ln() + 1.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "ecommerce cac benchmarks for paid social campaigns".to_string(),
            "saas cac payback period and retention benchmarks".to_string(),
            "budget allocation framework across channels".to_string(),
            "audience targeting and segmentation for ecommerce".to_string(),
        ]
    }

    #[test]
    fn test_embed_before_initialize_fails() {
        let embedder = TfIdfEmbedding::with_defaults();
        assert!(matches!(
            embedder.embed("anything"),
            Err(EmbeddingError::NotInitialized)
        ));
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let mut embedder = TfIdfEmbedding::with_defaults();
        assert!(matches!(
            embedder.initialize(&[]),
            Err(EmbeddingError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_embedding_is_normalized() {
        let mut embedder = TfIdfEmbedding::with_defaults();
        embedder.initialize(&corpus()).unwrap();
        let v = embedder.embed("ecommerce cac benchmarks").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_vocabulary_text_is_zero_vector() {
        let mut embedder = TfIdfEmbedding::with_defaults();
        embedder.initialize(&corpus()).unwrap();
        let v = embedder.embed("zzz qqq xxx").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let mut embedder = TfIdfEmbedding::with_defaults();
        embedder.initialize(&corpus()).unwrap();
        let query = embedder.embed("cac benchmarks for ecommerce").unwrap();
        let close = embedder
            .embed("ecommerce cac benchmarks for paid social campaigns")
            .unwrap();
        let far = embedder
            .embed("budget allocation framework across channels")
            .unwrap();
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_vocabulary_capped_at_dimension() {
        let docs: Vec<String> = (0..50)
            .map(|i| format!("unique{} term{} word{} extra{}", i, i, i, i))
            .collect();
        let mut embedder = TfIdfEmbedding::new(16);
        embedder.initialize(&docs).unwrap();
        assert!(embedder.vocabulary_size() <= 16);
    }

    #[test]
    fn test_export_restore_produces_same_vectors() {
        let mut embedder = TfIdfEmbedding::with_defaults();
        embedder.initialize(&corpus()).unwrap();
        let restored = TfIdfEmbedding::from_export(embedder.export().unwrap()).unwrap();
        let a = embedder.embed("saas retention benchmarks").unwrap();
        let b = restored.embed("saas retention benchmarks").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_vocabulary_is_deterministic() {
        let mut a = TfIdfEmbedding::with_defaults();
        let mut b = TfIdfEmbedding::with_defaults();
        a.initialize(&corpus()).unwrap();
        b.initialize(&corpus()).unwrap();
        assert_eq!(a.export().unwrap().entries, b.export().unwrap().entries);
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("CAC: $25-45, Paid-Social!"),
            vec!["cac", "25", "45", "paid", "social"]
        );
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
