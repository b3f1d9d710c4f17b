//! growthkb-rag - 로컬 하이브리드 문서 검색 엔진
//!
//! 마케팅 지식베이스를 위한 오프라인 검색 엔진입니다.
//! TF-IDF 시맨틱 검색 + BM25 키워드 검색을 RRF로 융합하고
//! 도메인 메타데이터로 리랭킹합니다.

pub mod cli;
pub mod collector;
pub mod embedding;
pub mod knowledge;

// Re-exports
pub use collector::{CollectorConfig, CorpusCollector, CorpusFile};
pub use embedding::{
    cosine_similarity, tokenize, EmbeddingError, EmbeddingProvider, TfIdfEmbedding,
    VocabularyExport, DEFAULT_DIMENSION,
};
pub use knowledge::{
    get_data_dir, AudienceSizing, BenchmarkAnswer, Chunk, ChunkConfig, ChunkMetadata,
    ContentType, DocumentChunker, EngineConfig, EngineError, EngineResult, EngineStats,
    QueryUnderstanding, ResultFusion, RetrievalEngine, SearchFilters, SearchOptions,
    SearchResult, VectorStore,
};
