//! 도메인 어휘 테이블 - 토픽/버티컬/채널/지표 키워드 및 동의어
//!
//! 청커의 메타데이터 추출과 쿼리 확장이 공유하는 정적 테이블입니다.
//! 새 규칙은 코드가 아니라 데이터(테이블 항목)로 추가합니다.

// ============================================================================
// Keyword Tables
// ============================================================================

/// 토픽 키워드 테이블 (canonical topic, 트리거 키워드 목록)
pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "cac",
        &[
            "cac",
            "customer acquisition cost",
            "cost per acquisition",
            "acquisition cost",
            "cpa",
        ],
    ),
    ("ltv", &["ltv", "lifetime value", "clv"]),
    ("budget", &["budget", "spend", "allocation", "media investment"]),
    (
        "channels",
        &[
            "channel",
            "paid social",
            "paid search",
            "media mix",
            "channel mix",
        ],
    ),
    (
        "audience",
        &["audience", "targeting", "segment", "persona", "icp"],
    ),
    (
        "measurement",
        &[
            "measurement",
            "attribution",
            "tracking",
            "incrementality",
            "analytics",
        ],
    ),
    ("creative", &["creative", "ad copy", "hook", "angle", "asset"]),
    (
        "benchmarks",
        &["benchmark", "industry average", "baseline", "typical range"],
    ),
    (
        "economics",
        &[
            "unit economics",
            "payback",
            "contribution margin",
            "gross margin",
            "roas",
        ],
    ),
    (
        "workflow",
        &["workflow", "process", "checklist", "playbook", "phase"],
    ),
];

/// 버티컬 테이블 (canonical vertical, 별칭 목록)
pub const VERTICALS: &[(&str, &[&str])] = &[
    (
        "ecommerce",
        &["ecommerce", "e-commerce", "d2c", "dtc", "online store"],
    ),
    ("saas", &["saas", "b2b software", "subscription software"]),
    (
        "fintech",
        &["fintech", "payments", "banking", "financial services"],
    ),
    (
        "healthcare",
        &["healthcare", "telehealth", "medical", "wellness"],
    ),
    ("education", &["education", "edtech", "e-learning", "courses"]),
    (
        "local-services",
        &["local services", "local business", "home services"],
    ),
    ("marketplace", &["marketplace", "two-sided"]),
    ("gaming", &["gaming", "mobile games"]),
];

/// 채널 테이블 (canonical channel, 별칭 목록)
pub const CHANNELS: &[(&str, &[&str])] = &[
    ("meta", &["meta", "facebook", "instagram", "fb ads"]),
    ("google", &["google", "search ads", "sem", "ppc"]),
    ("youtube", &["youtube", "video ads"]),
    ("tiktok", &["tiktok"]),
    ("linkedin", &["linkedin"]),
    ("email", &["email", "newsletter", "crm"]),
    ("programmatic", &["programmatic", "display", "dsp"]),
    ("affiliate", &["affiliate", "partnership marketing"]),
    ("influencer", &["influencer", "creator marketing"]),
];

/// 지표 동의어 테이블 (canonical metric, 동의어 목록)
///
/// canonical 용어 또는 동의어 중 하나라도 등장하면 canonical로 정규화됩니다.
pub const METRIC_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "cac",
        &[
            "customer acquisition cost",
            "cost per acquisition",
            "acquisition cost",
            "cpa",
        ],
    ),
    ("ltv", &["lifetime value", "clv", "customer lifetime value"]),
    ("roas", &["return on ad spend"]),
    ("ctr", &["click-through rate", "clickthrough rate", "click through rate"]),
    ("cpm", &["cost per mille", "cost per thousand"]),
    ("cpc", &["cost per click"]),
    ("cvr", &["conversion rate"]),
    ("aov", &["average order value", "basket size"]),
    ("churn", &["churn rate", "attrition"]),
    ("retention", &["retention rate"]),
    ("payback", &["payback period", "cac payback"]),
    ("arpu", &["average revenue per user"]),
];

/// 캠페인 목표 키워드
pub const OBJECTIVES: &[&str] = &[
    "awareness",
    "consideration",
    "conversion",
    "retention",
    "lead generation",
    "signups",
    "installs",
    "sales",
];

/// 지역/지오 키워드
pub const REGIONS: &[&str] = &[
    "united states",
    "north america",
    "canada",
    "uk",
    "europe",
    "emea",
    "apac",
    "latam",
    "australia",
    "global",
];

/// 우선순위를 낮추는 파일명 패턴 (부분 일치)
///
/// 템플릿과 통화 녹취 예제는 검색 결과에서 뒤로 밀립니다.
pub const DEPRIORITIZED_FILES: &[&str] = &[
    "template",
    "worksheet",
    "call-transcript",
    "example-transcript",
    "sample-call",
];

/// 워크플로우 최대 단계 수
pub const MAX_WORKFLOW_STEP: u8 = 9;

// ============================================================================
// Lookup Functions
// ============================================================================

/// 단어 경계를 존중하는 부분 문자열 탐색
///
/// "cac"가 "cache" 내부에 매칭되는 것을 방지합니다.
pub fn contains_term(text: &str, term: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !text[..abs]
                .chars()
                .next_back()
                .map(|c| c.is_alphanumeric())
                .unwrap_or(false);
        let after = abs + term.len();
        let after_ok = after >= text.len()
            || !text[after..]
                .chars()
                .next()
                .map(|c| c.is_alphanumeric())
                .unwrap_or(false);
        if before_ok && after_ok {
            return true;
        }
        start = abs + term.len().max(1);
        if start >= text.len() {
            break;
        }
    }
    false
}

/// canonical 테이블에서 히트한 canonical 값 수집
fn canonical_hits(text_lower: &str, table: &[(&str, &[&str])]) -> Vec<String> {
    let mut hits = Vec::new();
    for (canonical, aliases) in table {
        let matched = contains_term(text_lower, canonical)
            || aliases.iter().any(|a| contains_term(text_lower, a));
        if matched {
            hits.push((*canonical).to_string());
        }
    }
    hits
}

/// 텍스트에서 토픽 키워드 히트 수집
pub fn topic_hits(text_lower: &str) -> Vec<String> {
    let mut hits = Vec::new();
    for (topic, keywords) in TOPIC_KEYWORDS {
        if keywords.iter().any(|k| contains_term(text_lower, k)) {
            hits.push((*topic).to_string());
        }
    }
    hits
}

/// 텍스트에서 버티컬 히트 수집
pub fn vertical_hits(text_lower: &str) -> Vec<String> {
    canonical_hits(text_lower, VERTICALS)
}

/// 텍스트에서 채널 히트 수집
pub fn channel_hits(text_lower: &str) -> Vec<String> {
    canonical_hits(text_lower, CHANNELS)
}

/// 텍스트에서 지표 히트 수집 (canonical로 정규화)
pub fn metric_hits(text_lower: &str) -> Vec<String> {
    canonical_hits(text_lower, METRIC_SYNONYMS)
}

/// 동의어 정규화 용어 수집
///
/// canonical 용어 또는 등록된 동의어가 등장하면 canonical 용어를 반환합니다.
/// metric_hits와 같은 테이블을 쓰지만 의미가 다릅니다:
/// 여기서는 "청크가 이 개념을 다룬다"는 신호로 사용됩니다.
pub fn normalized_terms(text_lower: &str) -> Vec<String> {
    canonical_hits(text_lower, METRIC_SYNONYMS)
}

/// "step N" / "phase N" / "N." 멘션에서 워크플로우 단계 추출
pub fn step_hits(text_lower: &str) -> Vec<u8> {
    let mut steps = Vec::new();
    for n in 1..=MAX_WORKFLOW_STEP {
        let patterns = [format!("step {}", n), format!("phase {}", n)];
        if patterns.iter().any(|p| contains_term(text_lower, p)) {
            steps.push(n);
        }
    }
    steps
}

/// 동의어 그룹 조회 (쿼리 확장용)
///
/// 주어진 용어가 canonical이거나 동의어이면 (canonical, 전체 그룹)을 반환합니다.
pub fn synonym_group(term_lower: &str) -> Option<(&'static str, &'static [&'static str])> {
    for (canonical, synonyms) in METRIC_SYNONYMS {
        if *canonical == term_lower || synonyms.contains(&term_lower) {
            return Some((canonical, synonyms));
        }
    }
    None
}

/// 파일명이 우선순위 하향 대상인지 확인
pub fn is_deprioritized(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    DEPRIORITIZED_FILES.iter().any(|p| lower.contains(p))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_term_word_boundary() {
        assert!(contains_term("the cac is high", "cac"));
        assert!(contains_term("cac", "cac"));
        assert!(!contains_term("flush the cache now", "cac"));
        assert!(contains_term("cac.", "cac"));
    }

    #[test]
    fn test_topic_hits() {
        let hits = topic_hits("what is a good customer acquisition cost for us?");
        assert!(hits.contains(&"cac".to_string()));
    }

    #[test]
    fn test_vertical_hits_alias() {
        let hits = vertical_hits("typical numbers for a d2c brand");
        assert_eq!(hits, vec!["ecommerce".to_string()]);
    }

    #[test]
    fn test_metric_hits_normalizes_synonym() {
        let hits = metric_hits("our return on ad spend dropped");
        assert!(hits.contains(&"roas".to_string()));
    }

    #[test]
    fn test_step_hits() {
        let steps = step_hits("in step 3 we size the audience, then phase 5 begins");
        assert_eq!(steps, vec![3, 5]);
    }

    #[test]
    fn test_synonym_group() {
        let (canonical, group) = synonym_group("lifetime value").unwrap();
        assert_eq!(canonical, "ltv");
        assert!(group.contains(&"clv"));
        assert!(synonym_group("nonexistent").is_none());
    }

    #[test]
    fn test_is_deprioritized() {
        assert!(is_deprioritized("onboarding-template.txt"));
        assert!(is_deprioritized("sales-call-transcript-03.md"));
        assert!(!is_deprioritized("cac-benchmarks.txt"));
    }
}
