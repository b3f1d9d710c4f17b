//! CLI 모듈
//!
//! growthkb-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::knowledge::lexicon::MAX_WORKFLOW_STEP;
use crate::knowledge::{
    EngineConfig, EngineResult, RetrievalEngine, SearchFilters, SearchOptions,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "growthkb-rag")]
#[command(version, about = "로컬 하이브리드 마케팅 지식 검색 엔진", long_about = None)]
pub struct Cli {
    /// 코퍼스 폴더 (기본: ./knowledge)
    #[arg(short, long, global = true)]
    pub corpus: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 코퍼스에서 인덱스 강제 리빌드
    Index,

    /// 지식베이스 하이브리드 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// 최소 점수 (이 미만은 제외)
        #[arg(long)]
        min_score: Option<f32>,

        /// 버티컬 필터 (ecommerce, saas 등)
        #[arg(long)]
        vertical: Option<String>,

        /// 워크플로우 단계 필터 (1-9)
        #[arg(long)]
        step: Option<u8>,

        /// 벤치마크 보유 청크만
        #[arg(long)]
        benchmarks_only: bool,
    },

    /// 버티컬별 벤치마크 조회
    Benchmark {
        /// 버티컬 (ecommerce, saas 등)
        vertical: String,

        /// 지표 (cac, cvr, roas 등 - 동의어 허용)
        metric: String,
    },

    /// 오디언스 규모 조회
    Audience {
        /// 오디언스 유형 (smb, enterprise 등)
        audience_type: String,

        /// 지역 한정
        #[arg(short, long)]
        geo: Option<String>,
    },

    /// 워크플로우 단계별 가이드
    Step {
        /// 단계 번호 (1-9)
        step: u8,

        /// 단계 내 세부 주제
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// 인덱스 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = match cli.corpus {
        Some(dir) => EngineConfig::for_corpus(dir),
        None => EngineConfig::default(),
    };
    let engine = RetrievalEngine::new(config);

    match cli.command {
        Commands::Index => cmd_index(&engine).await,
        Commands::Search {
            query,
            limit,
            min_score,
            vertical,
            step,
            benchmarks_only,
        } => cmd_search(&engine, &query, limit, min_score, vertical, step, benchmarks_only).await,
        Commands::Benchmark { vertical, metric } => {
            cmd_benchmark(&engine, &vertical, &metric).await
        }
        Commands::Audience { audience_type, geo } => {
            cmd_audience(&engine, &audience_type, geo.as_deref()).await
        }
        Commands::Step { step, topic } => cmd_step(&engine, step, topic.as_deref()).await,
        Commands::Status => cmd_status(&engine).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱스 명령어 (index)
async fn cmd_index(engine: &RetrievalEngine) -> Result<()> {
    println!(
        "[*] 인덱스 빌드 중: {}",
        engine.config().corpus_dir.display()
    );

    let stats = engine.rebuild().await.context("인덱스 빌드 실패")?;

    if stats.chunk_count == 0 {
        println!("[!] 인덱싱할 문서가 없습니다.");
        return Ok(());
    }

    println!(
        "[OK] 인덱스 빌드 완료: {} 청크, {} 문서, 어휘 {} 용어",
        stats.chunk_count, stats.source_count, stats.vocabulary_size
    );
    println!("     저장 위치: {}", stats.index_path.display());
    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    engine: &RetrievalEngine,
    query: &str,
    limit: usize,
    min_score: Option<f32>,
    vertical: Option<String>,
    step: Option<u8>,
    benchmarks_only: bool,
) -> Result<()> {
    if let Some(step) = step {
        validate_step(step)?;
    }

    println!("[*] 검색 중: \"{}\"", query);

    let options = SearchOptions {
        top_k: Some(limit),
        min_score,
        filters: SearchFilters {
            verticals: vertical.into_iter().map(|v| v.to_lowercase()).collect(),
            steps: step.into_iter().collect(),
            require_benchmarks: benchmarks_only,
            ..Default::default()
        },
    };

    let results = engine.search(query, &options).await.context("검색 실패")?;
    print_results(&results);
    Ok(())
}

/// 벤치마크 명령어 (benchmark)
async fn cmd_benchmark(engine: &RetrievalEngine, vertical: &str, metric: &str) -> Result<()> {
    println!("[*] 벤치마크 조회: {} / {}", vertical, metric);

    let answer = engine
        .get_benchmark(vertical, metric)
        .await
        .context("벤치마크 조회 실패")?;

    let Some(answer) = answer else {
        println!("[!] 해당 벤치마크를 찾을 수 없습니다.");
        return Ok(());
    };

    println!("\n[OK] {} ({})", answer.metric, answer.vertical);
    println!("     값: {}", answer.value);
    if let Some(ref qualifier) = answer.qualifier {
        println!("     한정어: {}", qualifier);
    }
    println!("     출처: {}", answer.citation_text);
    Ok(())
}

/// 오디언스 명령어 (audience)
async fn cmd_audience(
    engine: &RetrievalEngine,
    audience_type: &str,
    geo: Option<&str>,
) -> Result<()> {
    println!("[*] 오디언스 규모 조회: {}", audience_type);

    let sizing = engine
        .get_audience_sizing(audience_type, geo)
        .await
        .context("오디언스 조회 실패")?;

    let Some(sizing) = sizing else {
        println!("[!] 해당 오디언스 규모 정보를 찾을 수 없습니다.");
        return Ok(());
    };

    println!("\n[OK] {} 오디언스", sizing.audience_type);
    println!("     규모: {}", sizing.total_size);
    println!("     산정 근거: {}", sizing.methodology);
    println!("     출처: {}", sizing.citation_text);
    Ok(())
}

/// 단계 가이드 명령어 (step)
async fn cmd_step(engine: &RetrievalEngine, step: u8, topic: Option<&str>) -> Result<()> {
    validate_step(step)?;

    match topic {
        Some(t) => println!("[*] 단계 {} 가이드 조회: {}", step, t),
        None => println!("[*] 단계 {} 가이드 조회", step),
    }

    let results = engine
        .get_step_guidance(step, topic)
        .await
        .context("단계 가이드 조회 실패")?;
    print_results(&results);
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(engine: &RetrievalEngine) -> Result<()> {
    println!("growthkb-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!(
        "[*] 코퍼스 폴더: {}",
        engine.config().corpus_dir.display()
    );

    match engine.stats().await {
        Ok(stats) => {
            println!("[OK] 인덱스: {}", stats.index_path.display());
            println!(
                "     {} 청크, {} 문서, 어휘 {} 용어",
                stats.chunk_count, stats.source_count, stats.vocabulary_size
            );
            if stats.chunk_count == 0 {
                println!("[!] 인덱스가 비어 있습니다. `index` 명령으로 빌드하세요.");
            }
        }
        Err(e) => {
            println!("[!] 인덱스 상태 조회 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn validate_step(step: u8) -> Result<()> {
    if !(1..=MAX_WORKFLOW_STEP).contains(&step) {
        bail!("단계는 1-{} 범위여야 합니다 (입력: {})", MAX_WORKFLOW_STEP, step);
    }
    Ok(())
}

/// 검색 결과 출력
fn print_results(results: &[EngineResult]) {
    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return;
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] {} › {}",
            i + 1,
            result.relevance_score,
            result.source,
            result.section
        );
        println!("   내용: {}", truncate_text(&result.content, 200));
        println!("   출처: {}", result.citation_text);
        println!();
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
