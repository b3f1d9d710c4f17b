//! Knowledge 모듈 - 하이브리드 검색 지식 저장소
//!
//! - Lexicon: 도메인 키워드/동의어 테이블
//! - Metadata: 구조화 헤더 파싱 + 콘텐츠 기반 추론
//! - Chunker: 섹션 인식 크기 밴드 청킹
//! - Store: 인메모리 벡터 + BM25 키워드 인덱스
//! - Query: 의도 분류, 엔티티 추출, 동의어 확장
//! - Hybrid: RRF 융합 + 도메인 리랭킹
//! - Engine: 검색 파사드 (인덱스 수명주기 관리)

pub mod chunker;
pub mod engine;
pub mod hybrid;
pub mod lexicon;
pub mod metadata;
pub mod query;
pub mod store;

use thiserror::Error;

/// 검색 엔진 에러
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine not initialized - index the corpus first")]
    NotInitialized,

    #[error("chunk/embedding count mismatch: {chunks} chunks vs {embeddings} embeddings")]
    IndexMismatch { chunks: usize, embeddings: usize },

    #[error("index load failed: {0}")]
    LoadFailure(String),

    #[error("corpus is empty - no indexable documents found")]
    EmptyCorpus,

    #[error("vocabulary is empty - corpus produced no usable terms")]
    EmptyVocabulary,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<crate::embedding::EmbeddingError> for EngineError {
    fn from(err: crate::embedding::EmbeddingError) -> Self {
        use crate::embedding::EmbeddingError;
        match err {
            EmbeddingError::NotInitialized => EngineError::NotInitialized,
            EmbeddingError::EmptyCorpus => EngineError::EmptyCorpus,
            EmbeddingError::EmptyVocabulary => EngineError::EmptyVocabulary,
        }
    }
}

// Re-exports
pub use chunker::{
    BenchmarkRange, Chunk, ChunkConfig, ChunkMetadata, ContentType, DocumentChunker, RangeUnit,
    SizeBand,
};
pub use engine::{
    get_data_dir, AudienceSizing, BenchmarkAnswer, EngineConfig, EngineResult, EngineStats,
    RetrievalEngine, SearchOptions, Snapshot,
};
pub use hybrid::{
    Attribution, FusedResult, MethodResults, QueryContext, ResultFusion, RetrievalMethod, RRF_K,
};
pub use metadata::{ConfidenceLevel, DocumentPurpose, DocumentType, SectionMetadata};
pub use query::{
    BudgetRange, ExpandedQuery, IntentClassification, QueryEntities, QueryIntent, QueryUnderstanding,
};
pub use store::{
    PersistedIndex, ScoreBreakdown, SearchFilters, SearchResult, VectorStore, FORMAT_VERSION,
};
