//! 문서 청커 - 섹션 분할, 콘텐츠 타입 분류, 크기 밴드 기반 청킹
//!
//! 원본 텍스트를 (섹션 → 의미 단위 → 청크) 순서로 분할합니다.
//! 콘텐츠 타입별 크기 밴드를 존중하면서 의미 경계에서 청크를 끊고,
//! 청크마다 키워드/동의어/벤치마크 범위 메타데이터를 붙입니다.
//!
//! 동일한 (텍스트, 파일명, 설정)은 항상 동일한 청크 시퀀스를 생성합니다.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::lexicon;
use super::metadata::{
    self, ConfidenceLevel, DocumentPurpose, DocumentType, SectionMetadata,
};

// ============================================================================
// Content Types & Size Bands
// ============================================================================

/// 청크 콘텐츠 타입 - 타입별 목표 크기 밴드를 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Definition,
    Benchmark,
    Framework,
    Expert,
    Example,
    Default,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Definition => "definition",
            ContentType::Benchmark => "benchmark",
            ContentType::Framework => "framework",
            ContentType::Expert => "expert",
            ContentType::Example => "example",
            ContentType::Default => "default",
        }
    }

    /// 모든 콘텐츠 타입 (설정 지문 생성용 고정 순서)
    pub const ALL: [ContentType; 6] = [
        ContentType::Definition,
        ContentType::Benchmark,
        ContentType::Framework,
        ContentType::Expert,
        ContentType::Example,
        ContentType::Default,
    ];
}

/// 크기 밴드 (문자 수)
///
/// 불변식: max >= min + target + 2 (오버플로우 플러시 시 min 미달 방지)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBand {
    pub min: usize,
    pub target: usize,
    pub max: usize,
}

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 오버플로우 플러시 시 다음 청크로 넘기는 꼬리 문자 수
    pub overlap_characters: usize,
    pub definition: SizeBand,
    pub benchmark: SizeBand,
    pub framework: SizeBand,
    pub expert: SizeBand,
    pub example: SizeBand,
    pub default: SizeBand,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            overlap_characters: 100,
            definition: SizeBand { min: 200, target: 380, max: 620 },
            benchmark: SizeBand { min: 150, target: 320, max: 520 },
            framework: SizeBand { min: 400, target: 750, max: 1200 },
            expert: SizeBand { min: 300, target: 650, max: 1000 },
            example: SizeBand { min: 400, target: 900, max: 1400 },
            default: SizeBand { min: 300, target: 700, max: 1100 },
        }
    }
}

impl ChunkConfig {
    /// 콘텐츠 타입별 밴드 조회
    pub fn band(&self, content_type: ContentType) -> SizeBand {
        match content_type {
            ContentType::Definition => self.definition,
            ContentType::Benchmark => self.benchmark,
            ContentType::Framework => self.framework,
            ContentType::Expert => self.expert,
            ContentType::Example => self.example,
            ContentType::Default => self.default,
        }
    }

    /// 설정 지문 - 인덱스 파일과 청킹 설정의 호환성 검증에 사용
    pub fn fingerprint(&self) -> String {
        let bands: Vec<String> = ContentType::ALL
            .iter()
            .map(|ct| {
                let b = self.band(*ct);
                format!("{}={},{},{}", ct.as_str(), b.min, b.target, b.max)
            })
            .collect();
        format!("ov={};{}", self.overlap_characters, bands.join(";"))
    }
}

// ============================================================================
// Chunk Types
// ============================================================================

/// 벤치마크 범위 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeUnit {
    Currency,
    Percent,
    Ratio,
    Plain,
}

/// 텍스트에서 추출한 수치 벤치마크 범위
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRange {
    /// 같은 라인에서 발견된 canonical 지표명
    pub metric: Option<String>,
    /// "conservative: 2-3%" 형태의 한정어
    pub qualifier: Option<String>,
    pub low: f64,
    pub high: f64,
    pub unit: RangeUnit,
    /// 매칭된 원문
    pub raw: String,
}

/// 청크 메타데이터
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub topics: Vec<String>,
    pub steps: Vec<u8>,
    pub verticals: Vec<String>,
    pub channels: Vec<String>,
    pub metrics: Vec<String>,
    /// 동의어 정규화를 거친 canonical 용어
    pub normalized_terms: Vec<String>,
    pub benchmark_ranges: Vec<BenchmarkRange>,
    pub has_benchmarks: bool,
    pub intents: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub last_updated: Option<chrono::NaiveDate>,
    pub doc_type: DocumentType,
    pub purpose: DocumentPurpose,
    pub deprioritized: bool,
}

/// 검색의 원자 단위 - 생성 후 불변
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// 안정적 ID: "{파일 스템}-{문서 내 순번:03}"
    pub id: String,
    /// 원본 파일명
    pub source: String,
    /// 섹션 제목
    pub section: String,
    pub content: String,
    /// 원본 텍스트 기준 바이트 오프셋
    pub start_offset: usize,
    pub end_offset: usize,
    pub content_type: ContentType,
    pub metadata: ChunkMetadata,
}

/// 청킹 대상 섹션 (구조화 헤더 또는 헤더 규약에서 생성)
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub content: String,
    /// content가 원본에서 시작하는 바이트 오프셋
    pub content_start: usize,
    pub meta: SectionMetadata,
}

// ============================================================================
// DocumentChunker
// ============================================================================

/// 문서 청커
pub struct DocumentChunker {
    config: ChunkConfig,
    caps_header: Regex,
    numbered_header: Regex,
    markdown_header: Regex,
    currency_range: Regex,
    percent_range: Regex,
    ratio_range: Regex,
    qualifier_prefix: Regex,
}

impl DocumentChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            // ALL-CAPS 헤더: 영대문자로 시작, 소문자 없는 짧은 라인
            caps_header: Regex::new(r"(?m)^[A-Z][A-Z0-9 ,&/'\-]{3,}$").unwrap(),
            // "N.N Title" 번호 헤더
            numbered_header: Regex::new(r"(?m)^\d+\.\d+\s+\S.*$").unwrap(),
            // 마크다운 헤더
            markdown_header: Regex::new(r"(?m)^#{1,6}\s+\S.*$").unwrap(),
            currency_range: Regex::new(
                r"\$\s*(\d[\d,]*(?:\.\d+)?)\s*(?:-|–|~|to)\s*\$?\s*(\d[\d,]*(?:\.\d+)?)",
            )
            .unwrap(),
            percent_range: Regex::new(
                r"(\d+(?:\.\d+)?)\s*%?\s*(?:-|–|~|to)\s*(\d+(?:\.\d+)?)\s*%",
            )
            .unwrap(),
            ratio_range: Regex::new(r"(\d+(?:\.\d+)?)\s*:\s*(\d+(?:\.\d+)?)").unwrap(),
            qualifier_prefix: Regex::new(
                r"(?i)\b(conservative|moderate|aggressive|typical|best[- ]case|worst[- ]case)\s*:?\s*$",
            )
            .unwrap(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 문서 전체를 청크 시퀀스로 변환
    ///
    /// 섹션 파싱에 실패한 문서도 원문 콘텐츠에서 청크를 생성합니다.
    /// 문서는 절대 버려지지 않습니다.
    pub fn chunk_document(&self, text: &str, filename: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let doc = metadata::parse_document(text, filename);
        let sections = self.resolve_sections(text, &doc);

        let stem = file_stem(filename);
        let mut chunks = Vec::new();
        let mut ordinal = 0usize;

        for section in &sections {
            let content_type =
                self.detect_content_type(&section.title, &section.content, &section.meta);
            let band = self.config.band(content_type);

            for raw in self.chunk_section(&section.content, band) {
                let meta = self.extract_chunk_metadata(&raw.content, &section.meta, &doc);
                chunks.push(Chunk {
                    id: format!("{}-{:03}", stem, ordinal),
                    source: filename.to_string(),
                    section: section.title.clone(),
                    start_offset: section.content_start + raw.start,
                    end_offset: section.content_start + raw.end,
                    content: raw.content,
                    content_type,
                    metadata: meta,
                });
                ordinal += 1;
            }
        }

        tracing::debug!(
            "Chunked {} into {} chunks across {} sections",
            filename,
            chunks.len(),
            sections.len()
        );
        chunks
    }

    /// 섹션 결정: 구조화 헤더 블록 우선, 없으면 헤더 규약 분할
    fn resolve_sections(
        &self,
        text: &str,
        doc: &metadata::DocumentMetadata,
    ) -> Vec<Section> {
        if !doc.sections.is_empty() {
            return doc
                .sections
                .iter()
                .filter(|s| !s.content.trim().is_empty())
                .map(|s| Section {
                    title: s.title.clone(),
                    content: s.content.clone(),
                    content_start: s.content_start,
                    meta: s.meta.clone(),
                })
                .collect();
        }
        self.split_into_sections(text)
    }

    /// 세 가지 헤더 규약으로 섹션 분할
    ///
    /// ALL-CAPS 라인, "N.N Title" 번호 라인, 마크다운 `#` 헤더를 탐지해
    /// 가장 이른 위치 기준으로 병합합니다. 헤더가 없으면 문서 전체가
    /// 하나의 일반 섹션이 됩니다.
    pub fn split_into_sections(&self, text: &str) -> Vec<Section> {
        // (헤더 시작, 본문 시작, 제목)
        let mut headers: Vec<(usize, usize, String)> = Vec::new();

        for re in [&self.caps_header, &self.numbered_header, &self.markdown_header] {
            for m in re.find_iter(text) {
                let title = m.as_str().trim_start_matches('#').trim().to_string();
                headers.push((m.start(), m.end(), title));
            }
        }

        headers.sort_by_key(|(start, _, _)| *start);
        headers.dedup_by_key(|(start, _, _)| *start);

        if headers.is_empty() {
            let (content, lead) = trim_with_offset(text);
            return vec![Section {
                title: "General".to_string(),
                content: content.to_string(),
                content_start: lead,
                meta: SectionMetadata::infer(content),
            }];
        }

        let mut sections = Vec::new();

        // 첫 헤더 이전의 서문도 버리지 않음
        if headers[0].0 > 0 {
            let preamble = &text[..headers[0].0];
            if !preamble.trim().is_empty() {
                let (content, lead) = trim_with_offset(preamble);
                sections.push(Section {
                    title: "Overview".to_string(),
                    content: content.to_string(),
                    content_start: lead,
                    meta: SectionMetadata::infer(content),
                });
            }
        }

        for (idx, (_, body_start, title)) in headers.iter().enumerate() {
            let end = headers
                .get(idx + 1)
                .map(|(next, _, _)| *next)
                .unwrap_or(text.len());
            let body = &text[*body_start..end];
            if body.trim().is_empty() {
                continue;
            }
            let (content, lead) = trim_with_offset(body);
            sections.push(Section {
                title: title.clone(),
                content: content.to_string(),
                content_start: body_start + lead,
                meta: SectionMetadata::infer(content),
            });
        }

        if sections.is_empty() {
            // 헤더만 있고 본문이 없는 퇴화 케이스
            let (content, lead) = trim_with_offset(text);
            sections.push(Section {
                title: "General".to_string(),
                content: content.to_string(),
                content_start: lead,
                meta: SectionMetadata::infer(content),
            });
        }

        sections
    }

    /// 콘텐츠 타입 분류 - 우선순위 규칙 테이블, 첫 매치 적용
    ///
    /// 순서: definition → benchmark → expert → framework → example → default
    pub fn detect_content_type(
        &self,
        title: &str,
        content: &str,
        _meta: &SectionMetadata,
    ) -> ContentType {
        let title_lower = title.to_lowercase();
        let content_lower = content.to_lowercase();

        let title_has = |keywords: &[&str]| keywords.iter().any(|k| title_lower.contains(k));

        let rules: [(ContentType, bool); 5] = [
            (
                ContentType::Definition,
                title_has(&["definition", "what is", "glossary", "terminology"]),
            ),
            (
                ContentType::Benchmark,
                title_has(&["benchmark", "averages", "typical", "rates"])
                    || numeric_density(content) > 0.04
                    || self.currency_range.is_match(content)
                    || self.percent_range.is_match(content),
            ),
            (
                ContentType::Expert,
                title_has(&["expert", "practitioner", "lessons"])
                    || content_lower.contains("in practice")
                    || content_lower.contains("from experience"),
            ),
            (
                ContentType::Framework,
                title_has(&["framework", "decision", "criteria", "when to"])
                    || if_then_count(&content_lower) >= 2,
            ),
            (
                ContentType::Example,
                title_has(&["example", "transcript", "case study", "dialogue"])
                    || has_dialogue_markers(content),
            ),
        ];

        for (content_type, matched) in rules {
            if matched {
                return content_type;
            }
        }
        ContentType::Default
    }

    /// 섹션 콘텐츠를 크기 밴드에 맞는 청크로 분할
    ///
    /// 의미 단위(문단) 버퍼를 누적하다가:
    /// - max 초과 직전이면 플러시하고 오버랩 꼬리를 다음 버퍼로 이월
    /// - target 도달 + 마지막 단위가 의미 경계면 깨끗하게 플러시 (이월 없음)
    /// - min 미만의 마지막 잔여분은 직전 청크에 병합 (유일 청크 제외)
    fn chunk_section(&self, content: &str, band: SizeBand) -> Vec<RawChunk> {
        let units = self.split_units(content, band.target);
        if units.is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<RawChunk> = Vec::new();
        // (이월 텍스트, 원본 오프셋)
        let mut carry: Option<(String, usize)> = None;
        let mut buf: Vec<&Unit> = Vec::new();

        let current_len = |carry: &Option<(String, usize)>, buf: &[&Unit]| -> usize {
            let carry_len = carry.as_ref().map(|(t, _)| t.len() + 2).unwrap_or(0);
            let unit_len: usize = buf.iter().map(|u| u.text.len()).sum();
            let seps = if buf.is_empty() { 0 } else { (buf.len() - 1) * 2 };
            carry_len + unit_len + seps
        };

        for unit in &units {
            let len_now = current_len(&carry, &buf);
            if len_now > 0 && len_now + 2 + unit.text.len() > band.max {
                let chunk = assemble_chunk(&carry, &buf);
                carry = self.make_carry(&buf);
                chunks.push(chunk);
                buf.clear();
            }

            buf.push(unit);

            if current_len(&carry, &buf) >= band.target && unit.boundary {
                chunks.push(assemble_chunk(&carry, &buf));
                carry = None;
                buf.clear();
            }
        }

        // 잔여분 처리
        if carry.is_some() || !buf.is_empty() {
            let remainder = assemble_chunk(&carry, &buf);
            if remainder.content.len() < band.min {
                if let Some(last) = chunks.last_mut() {
                    last.content.push_str("\n\n");
                    last.content.push_str(&remainder.content);
                    last.end = remainder.end;
                } else {
                    // 섹션의 유일한 청크면 크기 미달이어도 그대로 배출
                    chunks.push(remainder);
                }
            } else {
                chunks.push(remainder);
            }
        }

        chunks
    }

    /// 오버랩 이월 생성 - 마지막 단위의 꼬리에서 단어 경계로 자름
    fn make_carry(&self, buf: &[&Unit]) -> Option<(String, usize)> {
        let overlap = self.config.overlap_characters;
        if overlap == 0 {
            return None;
        }
        let last = buf.last()?;
        let text = &last.text;
        if text.len() <= overlap {
            return Some((text.clone(), last.start));
        }

        let cut = floor_char_boundary(text, text.len() - overlap);
        // 단어 경계에서 시작하도록 조정
        let word_start = text[cut..]
            .find(char::is_whitespace)
            .map(|p| cut + p + 1)
            .unwrap_or(cut);
        let word_start = floor_char_boundary(text, word_start.min(text.len()));
        let tail = text[word_start..].trim_start();
        if tail.is_empty() {
            return None;
        }
        let origin = last.start + (text.len() - tail.len());
        Some((tail.to_string(), origin))
    }

    /// 의미 단위 분할 - 문단 단위, 초과 문단은 단어 경계로 하드 분할
    fn split_units(&self, content: &str, target: usize) -> Vec<Unit> {
        let mut units = Vec::new();

        for para in split_paragraphs(content) {
            if para.text.len() <= target {
                let boundary = self.is_semantic_boundary(&para.text);
                units.push(Unit {
                    text: para.text,
                    start: para.start,
                    end: para.end,
                    boundary,
                });
            } else {
                let pieces = hard_split(&para.text, target);
                let count = pieces.len();
                for (i, (piece, rel_start)) in pieces.into_iter().enumerate() {
                    let boundary = i + 1 == count && self.is_semantic_boundary(&piece);
                    let start = para.start + rel_start;
                    let end = start + piece.len();
                    units.push(Unit {
                        text: piece,
                        start,
                        end,
                        boundary,
                    });
                }
            }
        }

        units
    }

    /// 의미 경계 판정: 헤더형 라인, 결론 마커, 완결된 벤치마크 문장
    fn is_semantic_boundary(&self, unit: &str) -> bool {
        let trimmed = unit.trim();

        // 헤더형: 짧은 단일 라인이 ':'로 끝나거나 전부 대문자
        if !trimmed.contains('\n') && trimmed.len() < 80 {
            if trimmed.ends_with(':') {
                return true;
            }
            if trimmed.len() >= 4
                && trimmed
                    .chars()
                    .all(|c| !c.is_alphabetic() || c.is_uppercase())
            {
                return true;
            }
        }

        let lower = trimmed.to_lowercase();
        const CONCLUDING: &[&str] = &[
            "in summary",
            "in short",
            "bottom line",
            "the takeaway",
            "as a rule",
            "overall,",
            "to recap",
        ];
        if CONCLUDING.iter().any(|m| lower.contains(m)) {
            return true;
        }

        // 완결된 벤치마크 문장 (범위 + 종결 부호)
        let ends_complete = trimmed.ends_with('.') || trimmed.ends_with('%');
        if ends_complete
            && (self.currency_range.is_match(trimmed) || self.percent_range.is_match(trimmed))
        {
            return true;
        }

        false
    }

    /// 청크 메타데이터 추출 - 섹션 메타와 키워드 테이블 히트의 합집합
    fn extract_chunk_metadata(
        &self,
        content: &str,
        section_meta: &SectionMetadata,
        doc: &metadata::DocumentMetadata,
    ) -> ChunkMetadata {
        let lower = content.to_lowercase();
        let benchmark_ranges = self.extract_benchmark_ranges(content);
        let has_benchmarks = !benchmark_ranges.is_empty();

        ChunkMetadata {
            topics: merge_terms(&section_meta.topics, lexicon::topic_hits(&lower)),
            steps: merge_steps(&section_meta.steps, lexicon::step_hits(&lower)),
            verticals: merge_terms(&section_meta.verticals, lexicon::vertical_hits(&lower)),
            channels: merge_terms(&section_meta.channels, lexicon::channel_hits(&lower)),
            metrics: lexicon::metric_hits(&lower),
            normalized_terms: lexicon::normalized_terms(&lower),
            benchmark_ranges,
            has_benchmarks,
            intents: section_meta.intents.clone(),
            confidence: section_meta.confidence,
            last_updated: section_meta.last_updated,
            doc_type: doc.doc_type,
            purpose: doc.purpose,
            deprioritized: doc.deprioritized,
        }
    }

    /// 벤치마크 범위 추출 - 통화/퍼센트/비율 범위 정규식 패밀리
    ///
    /// "conservative: 2-3%" 형태의 한정어 접두사도 함께 추출합니다.
    /// 같은 라인의 canonical 지표명이 범위에 연결됩니다.
    pub fn extract_benchmark_ranges(&self, content: &str) -> Vec<BenchmarkRange> {
        let mut ranges = Vec::new();

        for line in content.lines() {
            let line_lower = line.to_lowercase();
            let metric = lexicon::metric_hits(&line_lower).into_iter().next();
            // 먼저 매칭된 구간은 뒤의 패턴이 재사용하지 못함
            let mut claimed: Vec<(usize, usize)> = Vec::new();

            for caps in self.currency_range.captures_iter(line) {
                let m = caps.get(0).unwrap();
                if let (Some(low), Some(high)) = (parse_number(&caps[1]), parse_number(&caps[2]))
                {
                    claimed.push((m.start(), m.end()));
                    ranges.push(BenchmarkRange {
                        metric: metric.clone(),
                        qualifier: self.qualifier_before(line, m.start()),
                        low,
                        high,
                        unit: RangeUnit::Currency,
                        raw: m.as_str().to_string(),
                    });
                }
            }

            for caps in self.percent_range.captures_iter(line) {
                let m = caps.get(0).unwrap();
                if overlaps(&claimed, m.start(), m.end()) {
                    continue;
                }
                if let (Some(low), Some(high)) = (parse_number(&caps[1]), parse_number(&caps[2]))
                {
                    claimed.push((m.start(), m.end()));
                    ranges.push(BenchmarkRange {
                        metric: metric.clone(),
                        qualifier: self.qualifier_before(line, m.start()),
                        low,
                        high,
                        unit: RangeUnit::Percent,
                        raw: m.as_str().to_string(),
                    });
                }
            }

            for caps in self.ratio_range.captures_iter(line) {
                let m = caps.get(0).unwrap();
                if overlaps(&claimed, m.start(), m.end()) {
                    continue;
                }
                if let (Some(low), Some(high)) = (parse_number(&caps[1]), parse_number(&caps[2]))
                {
                    claimed.push((m.start(), m.end()));
                    ranges.push(BenchmarkRange {
                        metric: metric.clone(),
                        qualifier: self.qualifier_before(line, m.start()),
                        low,
                        high,
                        unit: RangeUnit::Ratio,
                        raw: m.as_str().to_string(),
                    });
                }
            }
        }

        ranges
    }

    /// 매치 직전 텍스트에서 한정어 추출
    fn qualifier_before(&self, line: &str, match_start: usize) -> Option<String> {
        let prefix_start = floor_char_boundary(line, match_start.saturating_sub(30));
        let prefix = &line[prefix_start..match_start];
        self.qualifier_prefix
            .captures(prefix)
            .map(|c| c[1].to_lowercase())
    }
}

// ============================================================================
// Internal Types & Helpers
// ============================================================================

/// 의미 단위 (문단 또는 하드 분할 조각)
#[derive(Debug)]
struct Unit {
    text: String,
    start: usize,
    end: usize,
    boundary: bool,
}

/// 조립 전 청크
#[derive(Debug)]
struct RawChunk {
    content: String,
    start: usize,
    end: usize,
}

/// 이월분 + 버퍼를 청크로 조립
fn assemble_chunk(carry: &Option<(String, usize)>, buf: &[&Unit]) -> RawChunk {
    let mut parts: Vec<&str> = Vec::with_capacity(buf.len() + 1);
    let mut start = buf.first().map(|u| u.start).unwrap_or(0);
    if let Some((text, origin)) = carry {
        parts.push(text);
        start = *origin;
    }
    for unit in buf {
        parts.push(&unit.text);
    }
    let end = buf
        .last()
        .map(|u| u.end)
        .unwrap_or_else(|| carry.as_ref().map(|(t, o)| o + t.len()).unwrap_or(0));
    RawChunk {
        content: parts.join("\n\n"),
        start,
        end,
    }
}

/// 문단 분할 (빈 라인 기준, 오프셋 추적)
struct Paragraph {
    text: String,
    start: usize,
    end: usize,
}

fn split_paragraphs(content: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut para_start: Option<usize> = None;
    let mut para_end = 0usize;
    let mut offset = 0usize;

    for line in content.lines() {
        let line_start = offset;
        offset = line_start + line.len() + 1;

        if line.trim().is_empty() {
            if let Some(start) = para_start.take() {
                let (text, lead) = trim_with_offset(&content[start..para_end]);
                if !text.is_empty() {
                    paragraphs.push(Paragraph {
                        text: text.to_string(),
                        start: start + lead,
                        end: start + lead + text.len(),
                    });
                }
            }
        } else {
            if para_start.is_none() {
                para_start = Some(line_start);
            }
            para_end = line_start + line.len();
        }
    }

    if let Some(start) = para_start {
        let (text, lead) = trim_with_offset(&content[start..para_end.min(content.len())]);
        if !text.is_empty() {
            paragraphs.push(Paragraph {
                text: text.to_string(),
                start: start + lead,
                end: start + lead + text.len(),
            });
        }
    }

    paragraphs
}

/// 초과 문단을 단어 경계로 하드 분할 - (조각, 문단 내 상대 오프셋)
fn hard_split(text: &str, piece_size: usize) -> Vec<(String, usize)> {
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        if text.len() - start <= piece_size {
            pieces.push((text[start..].to_string(), start));
            break;
        }
        let mut cut = floor_char_boundary(text, start + piece_size);
        if let Some(ws) = text[start..cut].rfind(char::is_whitespace) {
            if ws > 0 {
                cut = start + ws;
            }
        }
        if cut <= start {
            cut = floor_char_boundary(text, start + piece_size);
        }
        let piece = text[start..cut].trim_end();
        if !piece.is_empty() {
            pieces.push((piece.to_string(), start));
        }
        // 다음 조각은 공백을 건너뛰고 시작
        start = cut
            + text[cut..]
                .char_indices()
                .take_while(|(_, c)| c.is_whitespace())
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
    }

    pieces
}

/// 선행/후행 공백 제거 + 제거된 선행 바이트 수 반환
fn trim_with_offset(text: &str) -> (&str, usize) {
    let trimmed_start = text.trim_start();
    let lead = text.len() - trimmed_start.len();
    (trimmed_start.trim_end(), lead)
}

/// UTF-8 경계 조정 (인덱스 이하로)
#[inline]
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// 수치 밀도 - 벤치마크 타입 분류 신호
fn numeric_density(content: &str) -> f32 {
    if content.is_empty() {
        return 0.0;
    }
    let numeric = content
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '$' || *c == '%')
        .count();
    numeric as f32 / content.len() as f32
}

/// "if ... then" 조건문 개수 - 프레임워크 타입 신호
fn if_then_count(content_lower: &str) -> usize {
    content_lower
        .match_indices("if ")
        .filter(|(pos, _)| content_lower[*pos..].contains(" then "))
        .count()
}

/// 대화 마커 - 예제/녹취 타입 신호
fn has_dialogue_markers(content: &str) -> bool {
    const MARKERS: &[&str] = &["Q:", "A:", "Client:", "Strategist:", "Interviewer:"];
    content
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            MARKERS.iter().any(|m| t.starts_with(m))
        })
        .count()
        >= 2
}

/// 숫자 파싱 (콤마 제거)
fn parse_number(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok()
}

/// 구간 중복 확인
fn overlaps(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|(s, e)| start < *e && *s < end)
}

/// 섹션 메타 우선, 키워드 히트 보충 (순서 보존 중복 제거)
fn merge_terms(primary: &[String], inferred: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = primary.to_vec();
    for term in inferred {
        if !merged.contains(&term) {
            merged.push(term);
        }
    }
    merged
}

fn merge_steps(primary: &[u8], inferred: Vec<u8>) -> Vec<u8> {
    let mut merged: Vec<u8> = primary.to_vec();
    for step in inferred {
        if !merged.contains(&step) {
            merged.push(step);
        }
    }
    merged
}

/// 파일명에서 확장자를 제거한 스템
fn file_stem(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
