//! 메타데이터 파서 - 구조화 헤더 블록 파싱 및 콘텐츠 기반 추론
//!
//! 지식베이스 파일의 META_* 헤더 블록을 파싱하고,
//! 블록이 없거나 불완전하면 키워드 테이블로 메타데이터를 추론합니다.
//! 구조의 부재는 정상 케이스이며 파싱은 절대 실패하지 않습니다.
//!
//! 헤더 블록 규약:
//! ```text
//! ==========================
//! SECTION TITLE
//! ==========================
//! META_STEPS: 2, 3
//! META_TOPICS: cac, budget
//! META_CONFIDENCE: HIGH
//! META_UPDATED: 2025-06-01
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lexicon;

// ============================================================================
// Types
// ============================================================================

/// 문서 타입 (파일명/콘텐츠에서 추론)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentType {
    Framework,
    ExpertGuidance,
    Playbook,
    Index,
    Template,
    Example,
    #[default]
    Reference,
}

impl DocumentType {
    /// 표시용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Framework => "framework",
            DocumentType::ExpertGuidance => "expert-guidance",
            DocumentType::Playbook => "playbook",
            DocumentType::Index => "index",
            DocumentType::Template => "template",
            DocumentType::Example => "example",
            DocumentType::Reference => "reference",
        }
    }
}

/// 문서 목적 분류 (검색 부스팅 가중치의 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentPurpose {
    Definitive,
    Guidance,
    #[default]
    Reference,
    Procedural,
    Template,
    Example,
}

impl DocumentPurpose {
    /// 목적별 부스팅 가중치 (definitive > guidance > reference > procedural > example > template)
    pub fn weight(&self) -> f32 {
        match self {
            DocumentPurpose::Definitive => 1.2,
            DocumentPurpose::Guidance => 1.1,
            DocumentPurpose::Reference => 1.0,
            DocumentPurpose::Procedural => 0.95,
            DocumentPurpose::Example => 0.85,
            DocumentPurpose::Template => 0.7,
        }
    }
}

/// 신뢰도 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "HIGH" => Some(ConfidenceLevel::High),
            "MEDIUM" | "MED" => Some(ConfidenceLevel::Medium),
            "LOW" => Some(ConfidenceLevel::Low),
            _ => None,
        }
    }
}

/// 섹션 메타데이터 (META 블록에서 파싱되거나 콘텐츠에서 추론)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub steps: Vec<u8>,
    pub topics: Vec<String>,
    pub verticals: Vec<String>,
    pub channels: Vec<String>,
    pub intents: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub last_updated: Option<NaiveDate>,
}

impl SectionMetadata {
    /// 콘텐츠에서 메타데이터 추론 (META 블록이 없을 때)
    pub fn infer(content: &str) -> Self {
        let lower = content.to_lowercase();
        Self {
            steps: lexicon::step_hits(&lower),
            topics: lexicon::topic_hits(&lower),
            verticals: lexicon::vertical_hits(&lower),
            channels: lexicon::channel_hits(&lower),
            intents: Vec::new(),
            confidence: ConfidenceLevel::default(),
            last_updated: None,
        }
    }

    /// 비어있는 필드를 추론값으로 채움 (부분 META 블록의 우아한 저하)
    fn fill_missing_from(&mut self, inferred: Self) {
        if self.steps.is_empty() {
            self.steps = inferred.steps;
        }
        if self.topics.is_empty() {
            self.topics = inferred.topics;
        }
        if self.verticals.is_empty() {
            self.verticals = inferred.verticals;
        }
        if self.channels.is_empty() {
            self.channels = inferred.channels;
        }
    }
}

/// 구조화 헤더로 구분된 문서 섹션
#[derive(Debug, Clone)]
pub struct StructuredSection {
    pub title: String,
    /// META 라인을 제거한 본문 (끝 공백만 제거)
    pub content: String,
    /// 원본 텍스트 기준 바이트 오프셋 (헤더 시작)
    pub start: usize,
    pub end: usize,
    /// 본문(content)이 원본에서 시작하는 바이트 오프셋
    pub content_start: usize,
    pub meta: SectionMetadata,
}

/// 문서 단위 메타데이터
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub filename: String,
    pub doc_type: DocumentType,
    pub purpose: DocumentPurpose,
    pub deprioritized: bool,
    /// 구조화 헤더 블록으로 나뉜 섹션 (없으면 빈 벡터)
    pub sections: Vec<StructuredSection>,
}

// ============================================================================
// Document Type Rules
// ============================================================================

/// 파일명 키워드 → 문서 타입 (순서대로 첫 매치 적용)
const DOC_TYPE_RULES: &[(&[&str], DocumentType)] = &[
    (&["framework"], DocumentType::Framework),
    (&["playbook"], DocumentType::Playbook),
    (&["template", "worksheet"], DocumentType::Template),
    (&["example", "transcript", "sample-call"], DocumentType::Example),
    (&["index", "table-of-contents", "toc"], DocumentType::Index),
    (&["expert", "guidance", "insights"], DocumentType::ExpertGuidance),
];

/// 파일명에서 문서 타입 추론
pub fn infer_document_type(filename: &str) -> DocumentType {
    let lower = filename.to_lowercase();
    for (keywords, doc_type) in DOC_TYPE_RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *doc_type;
        }
    }
    DocumentType::Reference
}

/// 문서 타입 → 목적 분류
pub fn purpose_for(doc_type: DocumentType) -> DocumentPurpose {
    match doc_type {
        DocumentType::Framework => DocumentPurpose::Definitive,
        DocumentType::ExpertGuidance => DocumentPurpose::Guidance,
        DocumentType::Playbook => DocumentPurpose::Procedural,
        DocumentType::Index => DocumentPurpose::Reference,
        DocumentType::Template => DocumentPurpose::Template,
        DocumentType::Example => DocumentPurpose::Example,
        DocumentType::Reference => DocumentPurpose::Reference,
    }
}

// ============================================================================
// Parser
// ============================================================================

/// 구분선 판정 (8개 이상의 '=' 연속)
fn is_delimiter_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 8 && trimmed.chars().all(|c| c == '=')
}

/// 문서 메타데이터 파싱 - 절대 실패하지 않음
///
/// 구조화 헤더 블록을 먼저 찾고, 없거나 불완전하면
/// 키워드 테이블 추론으로 대체합니다.
pub fn parse_document(text: &str, filename: &str) -> DocumentMetadata {
    let doc_type = infer_document_type(filename);
    let sections = parse_structured_sections(text);

    DocumentMetadata {
        filename: filename.to_string(),
        doc_type,
        purpose: purpose_for(doc_type),
        deprioritized: lexicon::is_deprioritized(filename),
        sections,
    }
}

/// 구조화 헤더 블록으로 섹션 분리
///
/// 블록 형식이 깨진 경우(닫는 구분선 누락 등)는 해당 위치를
/// 일반 본문으로 취급합니다.
fn parse_structured_sections(text: &str) -> Vec<StructuredSection> {
    // (헤더 시작 오프셋, 본문 시작 오프셋, 제목)
    let mut headers: Vec<(usize, usize, String)> = Vec::new();

    let mut offset = 0usize;
    let lines: Vec<(usize, &str)> = text
        .lines()
        .map(|line| {
            let start = offset;
            offset += line.len() + 1; // '\n' 포함 (마지막 라인은 초과해도 무해)
            (start, line)
        })
        .collect();

    let mut i = 0;
    while i + 2 < lines.len() {
        let (start, first) = lines[i];
        if is_delimiter_line(first)
            && !lines[i + 1].1.trim().is_empty()
            && !is_delimiter_line(lines[i + 1].1)
            && is_delimiter_line(lines[i + 2].1)
        {
            let title = lines[i + 1].1.trim().to_string();
            let body_start = lines
                .get(i + 3)
                .map(|(s, _)| *s)
                .unwrap_or(text.len());
            headers.push((start, body_start, title));
            i += 3;
        } else {
            i += 1;
        }
    }

    if headers.is_empty() {
        return Vec::new();
    }

    let mut sections = Vec::with_capacity(headers.len());
    for (idx, (header_start, body_start, title)) in headers.iter().enumerate() {
        let end = headers
            .get(idx + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(text.len());
        let body = &text[*body_start..end];

        let (mut meta, content_rel) = parse_meta_lines(body);
        let content = body[content_rel..].trim_end().to_string();
        meta.fill_missing_from(SectionMetadata::infer(&content));

        sections.push(StructuredSection {
            title: title.clone(),
            content,
            start: *header_start,
            end,
            content_start: body_start + content_rel,
            meta,
        });
    }

    sections
}

/// 본문 선두의 META_* 라인을 파싱하고 본문 시작 오프셋을 반환
///
/// META 라인은 본문 최상단에만 올 수 있습니다. 첫 일반 라인부터가
/// 본문이며, 반환 오프셋은 body 기준 바이트 위치입니다.
fn parse_meta_lines(body: &str) -> (SectionMetadata, usize) {
    let mut meta = SectionMetadata::default();
    let mut offset = 0usize;

    for line in body.lines() {
        let line_start = offset;
        offset = line_start + line.len() + 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim().to_uppercase();
            if key.starts_with("META_") {
                apply_meta_field(&mut meta, &key, value.trim());
                continue;
            }
        }
        // 첫 일반 라인 - 여기부터 본문
        return (meta, line_start);
    }

    (meta, body.len().min(offset))
}

/// META 필드 적용 - 알 수 없는 키나 파싱 불가 값은 조용히 무시
fn apply_meta_field(meta: &mut SectionMetadata, key: &str, value: &str) {
    match key {
        "META_STEPS" => {
            meta.steps = value
                .split(',')
                .filter_map(|s| s.trim().parse::<u8>().ok())
                .filter(|n| (1..=lexicon::MAX_WORKFLOW_STEP).contains(n))
                .collect();
        }
        "META_TOPICS" => meta.topics = parse_list(value),
        "META_VERTICALS" => meta.verticals = parse_list(value),
        "META_CHANNELS" => meta.channels = parse_list(value),
        "META_INTENT" | "META_INTENTS" => meta.intents = parse_list(value),
        "META_CONFIDENCE" => {
            if let Some(level) = ConfidenceLevel::parse(value) {
                meta.confidence = level;
            }
        }
        "META_UPDATED" | "META_LAST_UPDATED" => {
            meta.last_updated = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok();
        }
        _ => {
            tracing::debug!("Unknown META field ignored: {}", key);
        }
    }
}

/// 콤마 구분 목록 파싱 (소문자 정규화)
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
