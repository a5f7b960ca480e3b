//! Structured-response parser and repairer.
//!
//! Every reply from the generative service is untrusted text. [`parse_response`]
//! walks a fixed strategy chain and always produces a usable value:
//!
//! 1. direct JSON parse of the whole reply;
//! 2. the first fenced code block (optional language tag) that parses;
//! 3. the first balanced `{..}` / `[..]` region that parses;
//! 4. field-level regex recovery of the shape's keys from broken JSON;
//! 5. a keyword heuristic that synthesizes a minimal value flagged as degraded.
//!
//! Keys are matched against English and Italian aliases.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

use crate::model::{clamp_confidence, Evaluation, PriorAnalysis, NEUTRAL_CONFIDENCE};

/// Marker prepended to evidence and explanations synthesized by fallback strategies.
pub const DEGRADED_MARKER: &str = "[degraded parse]";

/// Maximum number of balanced-region candidates tried per reply.
const MAX_REGION_CANDIDATES: usize = 16;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("invalid fenced block regex")
});

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("invalid trailing comma regex"));

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").expect("invalid number regex"));

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[.)]|[-*\u{2022}])\s+").expect("invalid list marker regex"));

static QUOTED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("invalid quoted item regex"));

static LIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:\d+[.)]|[-*\u{2022}])\s+(.+?)\s*$").expect("invalid list line regex")
});

static REFUTATION_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(smentit[oa]|errat[oa]|fals[oa]|false|falsely|untrue|not true|non vero|debunked|refuted|unconfirmed|not confirmed|non confermat[oa]|not verified|non verificat[oa]|fabricated|misleading|fuorviante|infondat[oa])\b",
    )
    .expect("invalid refutation regex")
});

/// A negator a few words ahead of a confirmation token ("has not been confirmed").
static NEGATED_CONFIRMATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:not|never|cannot|non|mai|\w+n't)\b(?:\s+\S+){0,3}?\s+(?:confirm\w*|conferm\w*|verif\w*|corroborat\w*)",
    )
    .expect("invalid negated confirmation regex")
});

static CONFIRMATION_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(confermat[oa]|confirmed|corroborated|corroborat[oa]|verified|verificat[oa]|accurate|attendibile|true|vero|genuine)\b",
    )
    .expect("invalid confirmation regex")
});

static MISSING_PEER_REVIEW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(not peer[- ]?reviewed|no peer[- ]?review|without peer[- ]?review|lacks? peer[- ]?review|senza peer[- ]?review|non (?:è stato )?(?:revisionat[oa]|sottopost[oa] a peer[- ]?review)|preprint)",
    )
    .expect("invalid peer review regex")
});

static MISSING_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(no doi|without (?:a )?doi|missing doi|lacks? (?:a )?doi|senza doi|doi mancante|nessun doi|no identifier|no pmid|senza identificativo)",
    )
    .expect("invalid identifier regex")
});

/// Which step of the chain produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Direct,
    FencedBlock,
    BalancedRegion,
    FieldRecovery,
    Heuristic,
}

impl ParseStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStrategy::Direct => "direct",
            ParseStrategy::FencedBlock => "fenced_block",
            ParseStrategy::BalancedRegion => "balanced_region",
            ParseStrategy::FieldRecovery => "field_recovery",
            ParseStrategy::Heuristic => "heuristic",
        }
    }

    /// Field recovery and heuristics work on broken output and are trusted less.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParseStrategy::FieldRecovery | ParseStrategy::Heuristic)
    }
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed value together with the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub strategy: ParseStrategy,
}

/// Shape expected from a generative reply.
pub trait ResponseShape: Sized {
    /// Short label used in logs.
    const LABEL: &'static str;

    /// Build the shape from an already parsed JSON value.
    fn from_value(value: Value) -> Option<Self>;

    /// Recover the shape's fields from text that is not valid JSON.
    fn recover_fields(raw: &str) -> Option<Self>;

    /// Last resort; must always succeed.
    fn heuristic(raw: &str) -> Self;
}

/// Run strategies 1-4. `None` means only the heuristic would remain.
pub fn parse_structured<T: ResponseShape>(raw: &str) -> Option<Parsed<T>> {
    let parsed = parse_json_strategies(raw).or_else(|| {
        T::recover_fields(raw).map(|value| Parsed {
            value,
            strategy: ParseStrategy::FieldRecovery,
        })
    });
    if let Some(parsed) = &parsed {
        tracing::debug!(shape = T::LABEL, strategy = %parsed.strategy, "structured reply parsed");
    }
    parsed
}

/// Run the full chain. Never fails.
pub fn parse_response<T: ResponseShape>(raw: &str) -> Parsed<T> {
    parse_structured(raw).unwrap_or_else(|| {
        tracing::warn!(shape = T::LABEL, "falling back to heuristic parse");
        Parsed {
            value: T::heuristic(raw),
            strategy: ParseStrategy::Heuristic,
        }
    })
}

fn parse_json_strategies<T: ResponseShape>(raw: &str) -> Option<Parsed<T>> {
    let trimmed = raw.trim();

    if let Some(value) = parse_value(trimmed).and_then(T::from_value) {
        return Some(Parsed {
            value,
            strategy: ParseStrategy::Direct,
        });
    }

    for captures in FENCED_BLOCK.captures_iter(raw) {
        let Some(body) = captures.get(1) else {
            continue;
        };
        if let Some(value) = parse_value(body.as_str().trim()).and_then(T::from_value) {
            return Some(Parsed {
                value,
                strategy: ParseStrategy::FencedBlock,
            });
        }
    }

    balanced_regions(raw)
        .into_iter()
        .take(MAX_REGION_CANDIDATES)
        .find_map(|region| parse_value(region).and_then(T::from_value))
        .map(|value| Parsed {
            value,
            strategy: ParseStrategy::BalancedRegion,
        })
}

/// Parse JSON, tolerating trailing commas.
fn parse_value(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(text).ok().or_else(|| {
        let repaired = TRAILING_COMMA.replace_all(text, "$1");
        serde_json::from_str(&repaired).ok()
    })
}

/// Balanced `{..}` or `[..]` regions in order of their opening position.
///
/// The scan skips brackets inside string literals so that quoted braces do not
/// break the depth count.
pub fn balanced_regions(raw: &str) -> Vec<&str> {
    let mut regions = Vec::new();
    for (start, opener) in raw.char_indices().filter(|(_, c)| *c == '{' || *c == '[') {
        if regions.len() >= MAX_REGION_CANDIDATES {
            break;
        }
        if let Some(end) = region_end(&raw[start..], opener) {
            regions.push(&raw[start..start + end]);
        }
    }
    regions
}

fn region_end(text: &str, opener: char) -> Option<usize> {
    let closer = if opener == '{' { '}' } else { ']' };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == opener => depth += 1,
            c if c == closer => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Look up the first present key among `aliases`, case-insensitively.
pub fn field<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| {
        map.get(*alias).or_else(|| {
            map.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(alias))
                .map(|(_, value)| value)
        })
    })
}

pub fn has_any_field(map: &Map<String, Value>, aliases: &[&[&str]]) -> bool {
    aliases.iter().any(|group| field(map, group).is_some())
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => bool_from_text(text),
        _ => None,
    }
}

fn bool_from_text(text: &str) -> Option<bool> {
    let normalized = text
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .to_lowercase();
    match normalized.as_str() {
        "true" | "yes" | "si" | "sì" | "vero" | "confermato" | "confermata" | "confirmed" => {
            Some(true)
        }
        "false" | "no" | "falso" | "falsa" | "smentito" | "smentita" | "not confirmed"
        | "non confermato" | "unconfirmed" => Some(false),
        _ => None,
    }
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => number_from_text(text),
        _ => None,
    }
}

fn number_from_text(text: &str) -> Option<f64> {
    if let Some(found) = LEADING_NUMBER.find(text) {
        return found.as_str().replace(',', ".").parse().ok();
    }
    let lower = text.to_lowercase();
    if ["alto", "alta", "high", "elevato", "elevata"].iter().any(|w| lower.contains(w)) {
        Some(8.0)
    } else if ["medio", "media", "medium", "moderate", "moderato"].iter().any(|w| lower.contains(w)) {
        Some(NEUTRAL_CONFIDENCE)
    } else if ["basso", "bassa", "low"].iter().any(|w| lower.contains(w)) {
        Some(3.0)
    } else {
        None
    }
}

/// Confidence on the 1-10 scale; fractions below one are read as a 0-1 scale.
/// Percentages ("80%") are read on a 0-100 scale.
pub fn coerce_confidence(value: &Value) -> Option<f64> {
    let raw = coerce_number(value)?;
    let percent = matches!(value, Value::String(text) if text.trim_end().ends_with('%'));
    let scaled = if percent {
        raw / 10.0
    } else if raw > 0.0 && raw < 1.0 {
        raw * 10.0
    } else {
        raw
    };
    Some(clamp_confidence(scaled))
}

pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(coerce_text)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}

/// Strings from an array, a single string, or an object of `key: value` pairs.
pub fn coerce_string_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(item_text).collect(),
        Value::String(text) if !text.trim().is_empty() => vec![text.trim().to_string()],
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, value)| coerce_text(value).map(|text| format!("{key}: {text}")))
            .collect(),
        _ => Vec::new(),
    };
    items.into_iter().filter(|item| !item.is_empty()).collect()
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => field(map, &["query", "q", "text", "testo", "title"])
            .and_then(coerce_text)
            .or_else(|| Some(value.to_string())),
        other => coerce_text(other),
    }
}

fn alias_pattern(aliases: &[&str]) -> String {
    aliases
        .iter()
        .map(|alias| regex::escape(alias))
        .collect::<Vec<_>>()
        .join("|")
}

/// Recover a scalar value for any of `aliases` from broken JSON-ish text.
pub fn recover_scalar(raw: &str, aliases: &[&str]) -> Option<String> {
    let pattern = format!(
        r#"(?i)["']?(?:{})["']?\s*[:=]\s*(?:"((?:[^"\\]|\\.)*)"|([^,\n"}}\]]+))"#,
        alias_pattern(aliases)
    );
    let re = Regex::new(&pattern).ok()?;
    let captures = re.captures(raw)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().trim().trim_matches('"').replace("\\\"", "\""))
        .filter(|text| !text.is_empty())
}

/// Recover a list value for any of `aliases` from broken JSON-ish text.
pub fn recover_list(raw: &str, aliases: &[&str]) -> Option<Vec<String>> {
    let pattern = format!(
        r#"(?is)["']?(?:{})["']?\s*[:=]\s*\[(.*?)\]"#,
        alias_pattern(aliases)
    );
    let re = Regex::new(&pattern).ok()?;
    let body = re.captures(raw)?.get(1)?.as_str();

    let quoted: Vec<String> = QUOTED_ITEM
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().replace("\\\"", "\"").trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if !quoted.is_empty() {
        return Some(quoted);
    }

    let bare: Vec<String> = body
        .split(',')
        .map(|item| item.trim().trim_matches('\'').to_string())
        .filter(|item| !item.is_empty())
        .collect();
    Some(bare)
}

const CONFIRMED_KEYS: &[&str] = &["confirmed", "conferma", "confermato", "verified", "is_confirmed"];
const EVIDENCE_FOR_KEYS: &[&str] = &[
    "evidence_for",
    "evidenze_a_favore",
    "evidenza_a_favore",
    "supporting_evidence",
];
const EVIDENCE_AGAINST_KEYS: &[&str] = &[
    "evidence_against",
    "evidenze_contro",
    "evidenza_contro",
    "contradicting_evidence",
];
const CONFIDENCE_KEYS: &[&str] = &[
    "confidence",
    "livello_affidabilita",
    "livello_affidabilità",
    "affidabilita",
    "reliability",
    "confidenza",
];
const EXPLANATION_KEYS: &[&str] = &["explanation", "spiegazione", "reasoning", "motivazione"];

impl ResponseShape for Evaluation {
    const LABEL: &'static str = "evaluation";

    fn from_value(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        if !has_any_field(&map, &[CONFIRMED_KEYS, CONFIDENCE_KEYS]) {
            return None;
        }

        Some(Evaluation {
            confirmed: field(&map, CONFIRMED_KEYS)
                .and_then(coerce_bool)
                .unwrap_or(false),
            evidence_for: field(&map, EVIDENCE_FOR_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default(),
            evidence_against: field(&map, EVIDENCE_AGAINST_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default(),
            confidence: field(&map, CONFIDENCE_KEYS)
                .and_then(coerce_confidence)
                .unwrap_or(NEUTRAL_CONFIDENCE),
            explanation: field(&map, EXPLANATION_KEYS)
                .and_then(coerce_text)
                .unwrap_or_default(),
        })
    }

    fn recover_fields(raw: &str) -> Option<Self> {
        let confirmed = recover_scalar(raw, CONFIRMED_KEYS).and_then(|text| bool_from_text(&text));
        let confidence = recover_scalar(raw, CONFIDENCE_KEYS)
            .and_then(|text| coerce_confidence(&Value::String(text)));
        if confirmed.is_none() && confidence.is_none() {
            return None;
        }

        let explanation = recover_scalar(raw, EXPLANATION_KEYS).unwrap_or_default();
        Some(Evaluation {
            confirmed: confirmed.unwrap_or(false),
            evidence_for: recover_list(raw, EVIDENCE_FOR_KEYS).unwrap_or_default(),
            evidence_against: recover_list(raw, EVIDENCE_AGAINST_KEYS).unwrap_or_default(),
            confidence: confidence.unwrap_or(NEUTRAL_CONFIDENCE),
            explanation: format!("{DEGRADED_MARKER} {explanation}").trim_end().to_string(),
        })
    }

    fn heuristic(raw: &str) -> Self {
        let refuted = REFUTATION_LANGUAGE.is_match(raw) || NEGATED_CONFIRMATION.is_match(raw);
        let confirmed = !refuted && CONFIRMATION_LANGUAGE.is_match(raw);

        let mut evidence_for = Vec::new();
        let mut evidence_against = Vec::new();
        if confirmed {
            evidence_for.push(format!("{DEGRADED_MARKER} reply uses confirmation language"));
        }
        if refuted {
            evidence_against.push(format!("{DEGRADED_MARKER} reply uses refutation language"));
        }
        if MISSING_PEER_REVIEW.is_match(raw) {
            evidence_against.push(format!("{DEGRADED_MARKER} reply mentions missing peer review"));
        }
        if MISSING_IDENTIFIER.is_match(raw) {
            evidence_against.push(format!(
                "{DEGRADED_MARKER} reply mentions a missing identifier (DOI)"
            ));
        }
        if evidence_for.is_empty() && evidence_against.is_empty() {
            evidence_against.push(format!(
                "{DEGRADED_MARKER} no structured judgment could be recovered"
            ));
        }

        let excerpt: String = raw.trim().chars().take(300).collect();
        Evaluation {
            confirmed,
            evidence_for,
            evidence_against,
            confidence: NEUTRAL_CONFIDENCE,
            explanation: format!("{DEGRADED_MARKER} heuristic reading of an unstructured reply: {excerpt}"),
        }
    }
}

/// Search queries proposed by an agent: 1-5 short strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryList(pub Vec<String>);

impl QueryList {
    pub const MAX_QUERIES: usize = 5;
    pub const MAX_WORDS: usize = 12;

    /// Trim, strip list markers, drop duplicates, cap count and length.
    pub fn normalize<I: IntoIterator<Item = String>>(items: I) -> Self {
        let mut queries: Vec<String> = Vec::new();
        for item in items {
            let unmarked = LIST_MARKER.replace(item.trim(), "");
            let cleaned = unmarked
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
                .split_whitespace()
                .take(Self::MAX_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            if cleaned.is_empty() {
                continue;
            }
            if queries.iter().any(|q| q.eq_ignore_ascii_case(&cleaned)) {
                continue;
            }
            queries.push(cleaned);
            if queries.len() == Self::MAX_QUERIES {
                break;
            }
        }
        Self(queries)
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    fn non_empty(self) -> Option<Self> {
        (!self.0.is_empty()).then_some(self)
    }
}

const QUERY_KEYS: &[&str] = &["queries", "query", "ricerche", "domande", "search_queries"];

impl ResponseShape for QueryList {
    const LABEL: &'static str = "queries";

    fn from_value(value: Value) -> Option<Self> {
        let items = match &value {
            Value::Array(_) => coerce_string_list(&value),
            Value::Object(map) => field(map, QUERY_KEYS).map(coerce_string_list)?,
            _ => return None,
        };
        Self::normalize(items).non_empty()
    }

    fn recover_fields(raw: &str) -> Option<Self> {
        if let Some(items) = recover_list(raw, QUERY_KEYS) {
            if let Some(list) = Self::normalize(items).non_empty() {
                return Some(list);
            }
        }
        let lines = LIST_LINE
            .captures_iter(raw)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        Self::normalize(lines).non_empty()
    }

    fn heuristic(_raw: &str) -> Self {
        Self::default()
    }
}

const PLAUSIBILITY_KEYS: &[&str] = &["plausibility", "verosimiglianza", "plausibilita"];
const SUSPICIOUS_KEYS: &[&str] = &["suspicious_points", "punti_sospetti", "red_flags"];
const SCENARIO_KEYS: &[&str] = &["scenarios", "possibili_scenari", "scenari"];
const STRATEGIC_QUERY_KEYS: &[&str] = &["strategic_queries", "query_strategiche"];
const CREDIBILITY_KEYS: &[&str] = &[
    "credibility",
    "livello_credibilità",
    "livello_credibilita",
    "credibilita",
];
const RECOMMENDATION_KEYS: &[&str] = &["recommendations", "raccomandazioni"];

const ANALYSIS_KEY_GROUPS: &[&[&str]] = &[
    PLAUSIBILITY_KEYS,
    SUSPICIOUS_KEYS,
    SCENARIO_KEYS,
    STRATEGIC_QUERY_KEYS,
    CREDIBILITY_KEYS,
    RECOMMENDATION_KEYS,
];

fn credibility_from(value: &Value) -> Option<u8> {
    coerce_number(value).map(|n| clamp_confidence(n) as u8)
}

impl ResponseShape for PriorAnalysis {
    const LABEL: &'static str = "prior_analysis";

    fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        if !has_any_field(&map, ANALYSIS_KEY_GROUPS) {
            return None;
        }

        let mut analysis = PriorAnalysis {
            plausibility: field(&map, PLAUSIBILITY_KEYS).and_then(coerce_text),
            suspicious_points: field(&map, SUSPICIOUS_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default(),
            scenarios: field(&map, SCENARIO_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default(),
            strategic_queries: field(&map, STRATEGIC_QUERY_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default(),
            credibility: field(&map, CREDIBILITY_KEYS).and_then(credibility_from),
            recommendations: field(&map, RECOMMENDATION_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default(),
            raw: field(&map, &["raw"]).and_then(coerce_text),
            ..PriorAnalysis::default()
        };

        map.retain(|key, _| {
            let lower = key.to_lowercase();
            lower != "raw"
                && !ANALYSIS_KEY_GROUPS
                    .iter()
                    .any(|group| group.iter().any(|alias| alias.eq_ignore_ascii_case(&lower)))
        });
        analysis.extra = map;
        Some(analysis)
    }

    fn recover_fields(raw: &str) -> Option<Self> {
        let analysis = PriorAnalysis {
            plausibility: recover_scalar(raw, PLAUSIBILITY_KEYS),
            suspicious_points: recover_list(raw, SUSPICIOUS_KEYS).unwrap_or_default(),
            scenarios: recover_list(raw, SCENARIO_KEYS).unwrap_or_default(),
            strategic_queries: recover_list(raw, STRATEGIC_QUERY_KEYS).unwrap_or_default(),
            credibility: recover_scalar(raw, CREDIBILITY_KEYS)
                .and_then(|text| credibility_from(&Value::String(text))),
            recommendations: recover_list(raw, RECOMMENDATION_KEYS).unwrap_or_default(),
            raw: Some(raw.trim().to_string()),
            ..PriorAnalysis::default()
        };
        let recovered = analysis.plausibility.is_some()
            || analysis.credibility.is_some()
            || !analysis.suspicious_points.is_empty();
        recovered.then_some(analysis)
    }

    fn heuristic(raw: &str) -> Self {
        let trimmed = raw.trim();
        PriorAnalysis::neutral((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVALUATION_JSON: &str = r#"{"confirmed": true, "evidence_for": ["trial registered"], "evidence_against": [], "confidence": 8, "explanation": "Two outlets confirm."}"#;

    fn expected_evaluation() -> Evaluation {
        Evaluation {
            confirmed: true,
            evidence_for: vec!["trial registered".into()],
            evidence_against: vec![],
            confidence: 8.0,
            explanation: "Two outlets confirm.".into(),
        }
    }

    #[test]
    fn direct_fenced_and_embedded_json_parse_to_the_same_value() {
        let fenced = format!("Here you go:\n```json\n{EVALUATION_JSON}\n```\nThanks");
        let embedded = format!("My judgment is {EVALUATION_JSON} and that is final.");

        let direct = parse_response::<Evaluation>(EVALUATION_JSON);
        let from_fence = parse_response::<Evaluation>(&fenced);
        let from_prose = parse_response::<Evaluation>(&embedded);

        assert_eq!(direct.strategy, ParseStrategy::Direct);
        assert_eq!(from_fence.strategy, ParseStrategy::FencedBlock);
        assert_eq!(from_prose.strategy, ParseStrategy::BalancedRegion);
        assert_eq!(direct.value, expected_evaluation());
        assert_eq!(from_fence.value, expected_evaluation());
        assert_eq!(from_prose.value, expected_evaluation());
    }

    #[test]
    fn italian_keys_are_accepted() {
        let raw = r#"{"conferma": "sì", "evidenze_a_favore": ["fonte ANSA"], "evidenze_contro": [], "livello_affidabilita": "7/10", "spiegazione": "Confermato"}"#;
        let parsed = parse_response::<Evaluation>(raw);
        assert!(parsed.value.confirmed);
        assert_eq!(parsed.value.confidence, 7.0);
        assert_eq!(parsed.value.evidence_for, vec!["fonte ANSA".to_string()]);
    }

    #[test]
    fn braces_inside_strings_do_not_break_the_region_scan() {
        let raw = r#"Result: {"confirmed": false, "explanation": "the claim {as quoted} is wrong", "confidence": 3} end"#;
        let parsed = parse_response::<Evaluation>(raw);
        assert_eq!(parsed.strategy, ParseStrategy::BalancedRegion);
        assert_eq!(parsed.value.explanation, "the claim {as quoted} is wrong");
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let raw = r#"{"confirmed": true, "confidence": 6, "evidence_for": ["a", "b",],}"#;
        let parsed = parse_response::<Evaluation>(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Direct);
        assert_eq!(parsed.value.evidence_for.len(), 2);
    }

    #[test]
    fn broken_json_falls_back_to_field_recovery() {
        let raw = r#"{"confirmed": false, "confidence": 4, "evidence_against": ["no DOI", "preprint only"] "explanation": "methodology is weak"#;
        let parsed = parse_response::<Evaluation>(raw);
        assert_eq!(parsed.strategy, ParseStrategy::FieldRecovery);
        assert!(parsed.strategy.is_degraded());
        assert!(!parsed.value.confirmed);
        assert_eq!(parsed.value.confidence, 4.0);
        assert_eq!(parsed.value.evidence_against.len(), 2);
        assert!(parsed.value.explanation.starts_with(DEGRADED_MARKER));
    }

    #[test]
    fn missing_comma_keeps_the_confirmation() {
        let raw = r#"{"confirmed": true "confidence": 8, "explanation": "two outlets confirm""#;
        let parsed = parse_response::<Evaluation>(raw);
        assert_eq!(parsed.strategy, ParseStrategy::FieldRecovery);
        assert!(parsed.value.confirmed);
        assert_eq!(parsed.value.confidence, 8.0);
        assert_eq!(recover_scalar("plausibility: medium high, x", &["plausibility"]).as_deref(), Some("medium high"));
    }

    #[test]
    fn refutation_language_yields_unconfirmed_heuristic() {
        let raw = "La notizia è stata smentita: il dato citato è errato e non trova riscontro.";
        let parsed = parse_response::<Evaluation>(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Heuristic);
        assert!(!parsed.value.confirmed);
        assert_eq!(parsed.value.confidence, NEUTRAL_CONFIDENCE);
        assert!(
            parsed
                .value
                .evidence_against
                .iter()
                .all(|entry| entry.starts_with(DEGRADED_MARKER))
        );
    }

    #[test]
    fn negated_confirmation_is_not_read_as_confirmation() {
        let parsed = parse_response::<Evaluation>("The claim is not confirmed by any outlet.");
        assert!(!parsed.value.confirmed);

        for raw in [
            "The claim has not been confirmed by any outlet.",
            "La notizia non è stata confermata da nessuna fonte.",
            "The figure hasn't been independently verified.",
        ] {
            let parsed = parse_response::<Evaluation>(raw);
            assert_eq!(parsed.strategy, ParseStrategy::Heuristic);
            assert!(!parsed.value.confirmed, "read as confirmed: {raw}");
        }
        assert!(parse_response::<Evaluation>("Three outlets confirmed the report.").value.confirmed);
    }

    #[test]
    fn heuristic_flags_missing_peer_review_and_identifier() {
        let raw = "The study was never peer reviewed: it is a preprint with no DOI.";
        let parsed = parse_response::<Evaluation>(raw);
        let against = parsed.value.evidence_against.join("\n");
        assert!(against.contains("peer review"));
        assert!(against.contains("identifier"));
    }

    #[test]
    fn query_list_accepts_array_object_and_numbered_lines() {
        let array = parse_response::<QueryList>(r#"["vaccine trial results", "EMA approval"]"#);
        assert_eq!(array.value.0.len(), 2);

        let object = parse_response::<QueryList>(r#"{"queries": ["a b", "a b", "c"]}"#);
        assert_eq!(object.value.0, vec!["a b".to_string(), "c".to_string()]);

        let lines = parse_structured::<QueryList>("Queries:\n1. first query\n2. second query\n");
        let lines = lines.expect("numbered lines should be recovered");
        assert_eq!(lines.strategy, ParseStrategy::FieldRecovery);
        assert_eq!(lines.value.0, vec!["first query".to_string(), "second query".to_string()]);
    }

    #[test]
    fn query_list_is_capped_and_shortened() {
        let long = "one two three four five six seven eight nine ten eleven twelve thirteen";
        let items = (0..8).map(|i| format!("{long} {i}")).collect::<Vec<_>>();
        let list = QueryList::normalize(items);
        assert_eq!(list.0.len(), QueryList::MAX_QUERIES);
        assert!(list.0.iter().all(|q| q.split_whitespace().count() <= QueryList::MAX_WORDS));
    }

    #[test]
    fn prose_without_queries_is_not_structured() {
        assert!(parse_structured::<QueryList>("I cannot help with that.").is_none());
    }

    #[test]
    fn prior_analysis_keeps_unknown_keys() {
        let raw = r#"{"verosimiglianza": "bassa", "punti_sospetti": ["no source"], "livello_credibilità": 3, "tono": "allarmistico"}"#;
        let parsed = parse_response::<PriorAnalysis>(raw);
        assert_eq!(parsed.value.plausibility.as_deref(), Some("bassa"));
        assert_eq!(parsed.value.credibility, Some(3));
        assert!(parsed.value.extra.contains_key("tono"));
        assert!(!parsed.value.extra.contains_key("punti_sospetti"));
    }

    #[test]
    fn fractional_confidence_is_rescaled() {
        assert_eq!(coerce_confidence(&Value::from(0.8)), Some(8.0));
        assert_eq!(coerce_confidence(&Value::from(42)), Some(10.0));
        assert_eq!(coerce_confidence(&Value::from("alta")), Some(8.0));
        assert_eq!(coerce_confidence(&Value::from("80%")), Some(8.0));
        assert_eq!(coerce_confidence(&Value::from("65 %")), Some(7.0));
    }
}
