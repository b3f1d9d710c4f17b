//! 쿼리 이해 - 의도 분류, 엔티티 추출, 동의어 확장
//!
//! 자연어 질의를 검색 전에 분석합니다. 분류는 순서 있는 패턴 테이블
//! 기반이며, 새 의도나 패턴은 테이블 항목으로 추가합니다.

use regex::Regex;
use serde::Serialize;

use super::lexicon;
use crate::embedding::tokenize;

// ============================================================================
// Intent Types
// ============================================================================

/// 질의 의도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryIntent {
    BenchmarkLookup,
    ChannelSelection,
    BudgetPlanning,
    AudienceTargeting,
    MeasurementGuidance,
    WorkflowHelp,
    EconomicsValidation,
    RiskAssessment,
    GeneralGuidance,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::BenchmarkLookup => "benchmark_lookup",
            QueryIntent::ChannelSelection => "channel_selection",
            QueryIntent::BudgetPlanning => "budget_planning",
            QueryIntent::AudienceTargeting => "audience_targeting",
            QueryIntent::MeasurementGuidance => "measurement_guidance",
            QueryIntent::WorkflowHelp => "workflow_help",
            QueryIntent::EconomicsValidation => "economics_validation",
            QueryIntent::RiskAssessment => "risk_assessment",
            QueryIntent::GeneralGuidance => "general_guidance",
        }
    }
}

/// 분류 결과
#[derive(Debug, Clone, Serialize)]
pub struct IntentClassification {
    pub primary: QueryIntent,
    pub secondary: Option<QueryIntent>,
    /// 0.0 ~ 1.0, 패턴 히트 수 기반
    pub confidence: f32,
}

/// 의도 패턴 테이블 - 테이블 순서가 동점 시 우선순위
const INTENT_PATTERNS: &[(QueryIntent, &[&str])] = &[
    (
        QueryIntent::BenchmarkLookup,
        &[
            "benchmark",
            "typical",
            "average",
            "industry standard",
            "what is a good",
            "normal range",
        ],
    ),
    (
        QueryIntent::ChannelSelection,
        &[
            "which channel",
            "what channel",
            "channel",
            "paid social",
            "paid search",
            "media mix",
            "where should i advertise",
        ],
    ),
    (
        QueryIntent::BudgetPlanning,
        &["budget", "spend", "allocate", "allocation", "how much should"],
    ),
    (
        QueryIntent::AudienceTargeting,
        &["audience", "targeting", "segment", "persona", "icp", "who should"],
    ),
    (
        QueryIntent::MeasurementGuidance,
        &[
            "measure",
            "measurement",
            "attribution",
            "tracking",
            "incrementality",
            "analytics",
            "utm",
        ],
    ),
    (
        QueryIntent::WorkflowHelp,
        &["step", "phase", "workflow", "process", "checklist", "what comes next"],
    ),
    (
        QueryIntent::EconomicsValidation,
        &[
            "unit economics",
            "ltv",
            "payback",
            "margin",
            "roas",
            "profitable",
            "viable",
        ],
    ),
    (
        QueryIntent::RiskAssessment,
        &["risk", "pitfall", "mistake", "fail", "warning", "watch out"],
    ),
];

// ============================================================================
// Entity Types
// ============================================================================

/// 추출된 예산 범위 (USD)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetRange {
    pub low: f64,
    pub high: f64,
}

/// 질의에서 추출한 엔티티
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryEntities {
    pub verticals: Vec<String>,
    pub channels: Vec<String>,
    pub metrics: Vec<String>,
    pub budget: Option<BudgetRange>,
    pub objectives: Vec<String>,
    pub timeframe: Option<String>,
    pub regions: Vec<String>,
}

/// 동의어 확장 결과
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedQuery {
    pub original: String,
    /// 원문 + 추가 용어 (키워드 검색에 사용)
    pub expanded: String,
    pub added_terms: Vec<String>,
    /// 확장에 기여한 canonical 그룹
    pub groups_used: Vec<String>,
}

// ============================================================================
// QueryUnderstanding
// ============================================================================

/// 쿼리 분석기 - 정규식은 생성 시 한 번만 컴파일
pub struct QueryUnderstanding {
    budget_amount: Regex,
    timeframe: Regex,
}

impl Default for QueryUnderstanding {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryUnderstanding {
    pub fn new() -> Self {
        Self {
            // "$50k", "10k-20k", "$5,000 to $10,000", "2 million"
            budget_amount: Regex::new(
                r"(?i)\$\s*(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million)?(?:\s*(?:-|–|~|to)\s*\$?\s*(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million)?)?|(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million)(?:\s*(?:-|–|~|to)\s*\$?\s*(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million)?)?",
            )
            .unwrap(),
            timeframe: Regex::new(
                r"(?i)\b(q[1-4]|this (?:month|quarter|year)|next (?:month|quarter|year)|\d+\s*(?:days?|weeks?|months?))\b",
            )
            .unwrap(),
        }
    }

    /// 의도 분류 - 패턴 히트 수로 주/부 의도 결정
    ///
    /// 아무 패턴에도 걸리지 않으면 일반 안내 의도에 낮은 신뢰도를
    /// 부여합니다.
    pub fn classify(&self, query: &str) -> IntentClassification {
        let lower = query.to_lowercase();

        let mut scored: Vec<(QueryIntent, usize)> = INTENT_PATTERNS
            .iter()
            .map(|(intent, patterns)| {
                let hits = patterns
                    .iter()
                    .filter(|p| lexicon::contains_term(&lower, p))
                    .count();
                (*intent, hits)
            })
            .filter(|(_, hits)| *hits > 0)
            .collect();

        // 히트 수 내림차순, 동점은 테이블 순서 유지 (안정 정렬)
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        match scored.first() {
            Some(&(primary, hits)) => {
                let secondary = scored.get(1).map(|(intent, _)| *intent);
                let confidence = match hits {
                    1 => 0.5,
                    2 => 0.7,
                    _ => 0.9,
                };
                IntentClassification {
                    primary,
                    secondary,
                    confidence,
                }
            }
            None => IntentClassification {
                primary: QueryIntent::GeneralGuidance,
                secondary: None,
                confidence: 0.2,
            },
        }
    }

    /// 엔티티 추출 - 버티컬/채널/지표/예산/목표/기간/지역
    pub fn extract_entities(&self, query: &str) -> QueryEntities {
        let lower = query.to_lowercase();

        let objectives = lexicon::OBJECTIVES
            .iter()
            .filter(|o| lexicon::contains_term(&lower, o))
            .map(|o| o.to_string())
            .collect();
        let regions = lexicon::REGIONS
            .iter()
            .filter(|r| lexicon::contains_term(&lower, r))
            .map(|r| r.to_string())
            .collect();

        QueryEntities {
            verticals: lexicon::vertical_hits(&lower),
            channels: lexicon::channel_hits(&lower),
            metrics: lexicon::metric_hits(&lower),
            budget: self.extract_budget(&lower),
            objectives,
            timeframe: self
                .timeframe
                .find(&lower)
                .map(|m| m.as_str().to_string()),
            regions,
        }
    }

    /// 예산 범위 추출 - 단일 금액은 low == high
    fn extract_budget(&self, lower: &str) -> Option<BudgetRange> {
        let caps = self.budget_amount.captures(lower)?;

        // 앞 갈래($접두)와 뒤 갈래(단위 접미) 중 매칭된 쪽 사용
        let (first, first_unit, second, second_unit) = if caps.get(1).is_some() {
            (caps.get(1), caps.get(2), caps.get(3), caps.get(4))
        } else {
            (caps.get(5), caps.get(6), caps.get(7), caps.get(8))
        };

        let low = parse_amount(first?.as_str(), first_unit.map(|m| m.as_str()))?;
        let high = match second {
            Some(m) => {
                // "10-20k"처럼 단위가 뒤에만 붙으면 앞 값에도 적용
                let unit = second_unit.or(first_unit).map(|u| u.as_str());
                parse_amount(m.as_str(), unit)?
            }
            None => low,
        };

        // "$10-20k"처럼 앞 값이 단위 없이 잡힌 공유 접미 표기 보정
        let low = if first_unit.is_none() && second_unit.is_some() {
            let scaled = low * unit_multiplier(second_unit.map(|m| m.as_str()));
            if scaled <= high {
                scaled
            } else {
                low
            }
        } else {
            low
        };

        Some(BudgetRange {
            low: low.min(high),
            high: low.max(high),
        })
    }

    /// 동의어 확장 - 등록된 동의어 그룹의 canonical 용어를 추가
    ///
    /// 버티컬/채널 별칭도 canonical로 보강해 키워드 검색의 재현율을
    /// 높입니다. 원문은 그대로 유지됩니다.
    pub fn expand(&self, query: &str) -> ExpandedQuery {
        let lower = query.to_lowercase();
        let tokens = tokenize(&lower);
        let mut added: Vec<String> = Vec::new();
        let mut groups: Vec<String> = Vec::new();

        // 지표 동의어 그룹
        for (canonical, synonyms) in lexicon::METRIC_SYNONYMS {
            let hit = lexicon::contains_term(&lower, canonical)
                || synonyms.iter().any(|s| lexicon::contains_term(&lower, s));
            if !hit {
                continue;
            }
            groups.push(canonical.to_string());
            if !tokens.iter().any(|t| t == canonical) {
                added.push(canonical.to_string());
            }
            // 전체 그룹 대신 상위 두 동의어만 추가 (쿼리 비대화 방지)
            for syn in synonyms.iter().take(2) {
                if !lexicon::contains_term(&lower, syn) && !added.contains(&syn.to_string()) {
                    added.push(syn.to_string());
                }
            }
        }

        // 버티컬/채널 별칭 → canonical 보강
        for table in [lexicon::VERTICALS, lexicon::CHANNELS] {
            for (canonical, aliases) in table {
                let alias_hit = aliases.iter().any(|a| lexicon::contains_term(&lower, a));
                if alias_hit && !lexicon::contains_term(&lower, canonical) {
                    added.push(canonical.to_string());
                }
            }
        }

        added.dedup();
        let expanded = if added.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, added.join(" "))
        };

        ExpandedQuery {
            original: query.to_string(),
            expanded,
            added_terms: added,
            groups_used: groups,
        }
    }
}

/// 금액 파싱 (콤마 제거 + 단위 배수)
fn parse_amount(value: &str, unit: Option<&str>) -> Option<f64> {
    let base: f64 = value.replace(',', "").parse().ok()?;
    Some(base * unit_multiplier(unit))
}

fn unit_multiplier(unit: Option<&str>) -> f64 {
    match unit.map(|u| u.to_lowercase()) {
        Some(u) if u == "k" || u == "thousand" => 1_000.0,
        Some(u) if u == "m" || u == "million" => 1_000_000.0,
        _ => 1.0,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> QueryUnderstanding {
        QueryUnderstanding::new()
    }

    #[test]
    fn test_classify_benchmark_lookup() {
        let c = analyzer().classify("what is a typical cac benchmark for ecommerce?");
        assert_eq!(c.primary, QueryIntent::BenchmarkLookup);
        assert!(c.confidence >= 0.7);
    }

    #[test]
    fn test_classify_secondary_intent() {
        let c = analyzer().classify("which channel should i pick for my budget?");
        assert_eq!(c.primary, QueryIntent::ChannelSelection);
        assert_eq!(c.secondary, Some(QueryIntent::BudgetPlanning));
    }

    #[test]
    fn test_classify_no_match_is_general() {
        let c = analyzer().classify("hello there");
        assert_eq!(c.primary, QueryIntent::GeneralGuidance);
        assert!(c.secondary.is_none());
        assert!(c.confidence < 0.5);
    }

    #[test]
    fn test_classify_tie_uses_table_order() {
        // "benchmark"와 "budget" 각 1히트 - 테이블 앞쪽이 주 의도
        let c = analyzer().classify("benchmark my budget");
        assert_eq!(c.primary, QueryIntent::BenchmarkLookup);
        assert_eq!(c.secondary, Some(QueryIntent::BudgetPlanning));
    }

    #[test]
    fn test_extract_entities_verticals_channels_metrics() {
        let e = analyzer().extract_entities("d2c cac on facebook for conversion in the uk");
        assert_eq!(e.verticals, vec!["ecommerce"]);
        assert_eq!(e.channels, vec!["meta"]);
        assert!(e.metrics.contains(&"cac".to_string()));
        assert!(e.objectives.contains(&"conversion".to_string()));
        assert!(e.regions.contains(&"uk".to_string()));
    }

    #[test]
    fn test_extract_budget_single() {
        let e = analyzer().extract_entities("i have a $50k budget");
        let budget = e.budget.unwrap();
        assert_eq!(budget.low, 50_000.0);
        assert_eq!(budget.high, 50_000.0);
    }

    #[test]
    fn test_extract_budget_range() {
        let e = analyzer().extract_entities("spend between $5,000 to $10,000 monthly");
        let budget = e.budget.unwrap();
        assert_eq!(budget.low, 5_000.0);
        assert_eq!(budget.high, 10_000.0);
    }

    #[test]
    fn test_extract_budget_suffix_units() {
        let e = analyzer().extract_entities("around 2 million per year");
        let budget = e.budget.unwrap();
        assert_eq!(budget.low, 2_000_000.0);
    }

    #[test]
    fn test_extract_timeframe() {
        let e = analyzer().extract_entities("launch plan for q3 please");
        assert_eq!(e.timeframe.as_deref(), Some("q3"));

        let e = analyzer().extract_entities("results in 6 weeks");
        assert_eq!(e.timeframe.as_deref(), Some("6 weeks"));
    }

    #[test]
    fn test_expand_adds_canonical_for_synonym() {
        let x = analyzer().expand("what is a good customer acquisition cost?");
        assert!(x.added_terms.contains(&"cac".to_string()));
        assert!(x.groups_used.contains(&"cac".to_string()));
        assert!(x.expanded.starts_with(x.original.as_str()));
    }

    #[test]
    fn test_expand_adds_vertical_canonical() {
        let x = analyzer().expand("benchmarks for d2c brands");
        assert!(x.added_terms.contains(&"ecommerce".to_string()));
    }

    #[test]
    fn test_expand_no_groups_keeps_query() {
        let x = analyzer().expand("hello there");
        assert_eq!(x.expanded, "hello there");
        assert!(x.added_terms.is_empty());
        assert!(x.groups_used.is_empty());
    }
}
