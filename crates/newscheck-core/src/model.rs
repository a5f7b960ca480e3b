//! Data model shared by the router, the agents and the aggregator.
//!
//! Everything here is plain data: articles arrive from the caller, routing
//! decisions and evaluations are produced once per request and never mutated
//! afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::trace::TraceEvent;

/// Lowest and highest confidence an evaluation may carry.
pub const CONFIDENCE_MIN: f64 = 1.0;
pub const CONFIDENCE_MAX: f64 = 10.0;
/// Confidence used whenever nothing better is known.
pub const NEUTRAL_CONFIDENCE: f64 = 5.0;

/// Domain-specialized verification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Political,
    Technological,
    Scientific,
    Economic,
    Universal,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Political,
        AgentKind::Technological,
        AgentKind::Scientific,
        AgentKind::Economic,
        AgentKind::Universal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Political => "political",
            AgentKind::Technological => "technological",
            AgentKind::Scientific => "scientific",
            AgentKind::Economic => "economic",
            AgentKind::Universal => "universal",
        }
    }

    /// Upper-case label used to tag merged queries and evidence.
    pub fn tag(&self) -> &'static str {
        match self {
            AgentKind::Political => "POLITICAL",
            AgentKind::Technological => "TECHNOLOGICAL",
            AgentKind::Scientific => "SCIENTIFIC",
            AgentKind::Economic => "ECONOMIC",
            AgentKind::Universal => "UNIVERSAL",
        }
    }

    /// Prefix `text` with this agent's tag, e.g. `[SCIENTIFIC] text`.
    pub fn tagged(&self, text: &str) -> String {
        format!("[{}] {}", self.tag(), text)
    }

    /// Map a free-form label (English or Italian) onto a known kind.
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '[' || c == ']')
            .to_lowercase();
        let kind = match normalized.as_str() {
            "political" | "politics" | "politico" | "politica" => AgentKind::Political,
            "technological" | "technology" | "tech" | "tecnologico" | "tecnologia" => {
                AgentKind::Technological
            }
            "scientific" | "science" | "scientifico" | "scienza" => AgentKind::Scientific,
            "economic" | "economy" | "economics" | "economico" | "economia" => AgentKind::Economic,
            "universal" | "general" | "generic" | "universale" | "cronaca" | "generale" => {
                AgentKind::Universal
            }
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// News item under verification. Owned by the caller and never modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Full text when present, the summary otherwise.
    pub fn body(&self) -> &str {
        self.content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or(self.summary.as_deref())
            .unwrap_or_default()
    }

    /// Title and body joined, the haystack used by entity extraction.
    pub fn searchable_text(&self) -> String {
        format!("{}\n{}", self.title, self.body())
    }
}

/// Upstream critical analysis of an article. Read-only to the verification core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plausibility: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suspicious_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategic_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PriorAnalysis {
    /// Analysis used when the upstream analyst produced nothing usable.
    pub fn neutral(raw: Option<String>) -> Self {
        Self {
            plausibility: Some("medium".to_string()),
            credibility: Some(5),
            recommendations: vec!["manual verification recommended".to_string()],
            raw,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plausibility.is_none()
            && self.suspicious_points.is_empty()
            && self.scenarios.is_empty()
            && self.strategic_queries.is_empty()
            && self.credibility.is_none()
            && self.recommendations.is_empty()
            && self.extra.is_empty()
    }

    /// Compact rendering embedded into routing and agent prompts.
    pub fn to_prompt_text(&self) -> String {
        if self.is_empty() {
            return match self.raw.as_deref() {
                Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
                _ => "No prior analysis available.".to_string(),
            };
        }

        let mut out = String::new();
        if let Some(plausibility) = &self.plausibility {
            let _ = writeln!(out, "Plausibility: {plausibility}");
        }
        if let Some(credibility) = self.credibility {
            let _ = writeln!(out, "Credibility: {credibility}/10");
        }
        write_list(&mut out, "Suspicious points", &self.suspicious_points);
        write_list(&mut out, "Scenarios", &self.scenarios);
        write_list(&mut out, "Strategic queries", &self.strategic_queries);
        write_list(&mut out, "Recommendations", &self.recommendations);
        for (key, value) in &self.extra {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "{key}: {rendered}");
        }
        out.trim_end().to_string()
    }
}

fn write_list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{label}:");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// Named slots of extracted strings, e.g. `institutions -> [..]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedEntities(BTreeMap<String, Vec<String>>);

impl ExtractedEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values to a slot, skipping blanks and duplicates.
    pub fn insert<I, S>(&mut self, slot: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = slot.into();
        let mut added: Vec<String> = Vec::new();
        let existing = self.0.get(&slot);
        for value in values {
            let value = value.into().trim().to_string();
            if value.is_empty() {
                continue;
            }
            let seen = existing.is_some_and(|items| items.contains(&value)) || added.contains(&value);
            if !seen {
                added.push(value);
            }
        }
        if !added.is_empty() {
            self.0.entry(slot).or_default().extend(added);
        }
    }

    pub fn merge(&mut self, other: &ExtractedEntities) {
        for (slot, values) in &other.0 {
            self.insert(slot.clone(), values.iter().cloned());
        }
    }

    pub fn get(&self, slot: &str) -> &[String] {
        self.0.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_prompt_text(&self) -> String {
        if self.0.is_empty() {
            return "none".to_string();
        }
        self.0
            .iter()
            .map(|(slot, values)| format!("{slot}: {}", values.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Unvalidated classifier output, turned into a [`RoutingDecision`] by the repair step.
#[derive(Debug, Clone, Default)]
pub struct RoutingDraft {
    pub agents: Vec<AgentKind>,
    pub rationale: String,
    pub confidence_level: Option<f64>,
    pub detected_traits: BTreeSet<String>,
    pub entity_hints: BTreeMap<AgentKind, ExtractedEntities>,
    pub collaboration_strategy: Option<String>,
}

/// Which agents run for one request, and why.
///
/// Always holds two or three unique agents; the only constructors go through
/// [`RoutingDecision::repair_selection`], deserialization included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RoutingRecord")]
pub struct RoutingDecision {
    chosen_agents: Vec<AgentKind>,
    rationale: String,
    confidence_level: u8,
    detected_traits: BTreeSet<String>,
    entity_hints: BTreeMap<AgentKind, ExtractedEntities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collaboration_strategy: Option<String>,
    fallback: bool,
}

#[derive(Deserialize)]
struct RoutingRecord {
    chosen_agents: Vec<AgentKind>,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    confidence_level: Option<f64>,
    #[serde(default)]
    detected_traits: BTreeSet<String>,
    #[serde(default)]
    entity_hints: BTreeMap<AgentKind, ExtractedEntities>,
    #[serde(default)]
    collaboration_strategy: Option<String>,
    #[serde(default)]
    fallback: bool,
}

impl From<RoutingRecord> for RoutingDecision {
    fn from(record: RoutingRecord) -> Self {
        let fallback = record.fallback;
        let mut decision = Self::from_draft(RoutingDraft {
            agents: record.chosen_agents,
            rationale: record.rationale,
            confidence_level: record.confidence_level,
            detected_traits: record.detected_traits,
            entity_hints: record.entity_hints,
            collaboration_strategy: record.collaboration_strategy,
        });
        decision.fallback = fallback;
        decision
    }
}

impl RoutingDecision {
    pub const MIN_AGENTS: usize = 2;
    pub const MAX_AGENTS: usize = 3;
    pub const FALLBACK_PAIR: [AgentKind; 2] = [AgentKind::Scientific, AgentKind::Universal];

    pub fn from_draft(draft: RoutingDraft) -> Self {
        let chosen_agents = Self::repair_selection(draft.agents);
        let confidence_level = draft
            .confidence_level
            .map(clamp_confidence)
            .unwrap_or(NEUTRAL_CONFIDENCE) as u8;
        let entity_hints = draft
            .entity_hints
            .into_iter()
            .filter(|(kind, hints)| chosen_agents.contains(kind) && !hints.is_empty())
            .collect();

        Self {
            chosen_agents,
            rationale: draft.rationale,
            confidence_level,
            detected_traits: draft.detected_traits,
            entity_hints,
            collaboration_strategy: draft.collaboration_strategy,
            fallback: false,
        }
    }

    /// Fixed `[scientific, universal]` pair used when classification fails outright.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            chosen_agents: Self::FALLBACK_PAIR.to_vec(),
            rationale: format!("fallback routing: {}", reason.into()),
            confidence_level: NEUTRAL_CONFIDENCE as u8,
            detected_traits: BTreeSet::new(),
            entity_hints: BTreeMap::new(),
            collaboration_strategy: None,
            fallback: true,
        }
    }

    /// Deduplicate, top up to two agents and truncate to three, preserving order.
    pub fn repair_selection(agents: Vec<AgentKind>) -> Vec<AgentKind> {
        let mut chosen: Vec<AgentKind> = Vec::with_capacity(Self::MAX_AGENTS);
        for kind in agents {
            if !chosen.contains(&kind) {
                chosen.push(kind);
            }
        }

        while chosen.len() < Self::MIN_AGENTS {
            let filler = if chosen.as_slice() == [AgentKind::Universal] {
                AgentKind::Scientific
            } else {
                AgentKind::Universal
            };
            chosen.push(filler);
        }

        chosen.truncate(Self::MAX_AGENTS);
        chosen
    }

    pub fn chosen_agents(&self) -> &[AgentKind] {
        &self.chosen_agents
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn confidence_level(&self) -> u8 {
        self.confidence_level
    }

    pub fn detected_traits(&self) -> &BTreeSet<String> {
        &self.detected_traits
    }

    pub fn entity_hints(&self) -> &BTreeMap<AgentKind, ExtractedEntities> {
        &self.entity_hints
    }

    pub fn hints_for(&self, kind: AgentKind) -> Option<&ExtractedEntities> {
        self.entity_hints.get(&kind)
    }

    pub fn collaboration_strategy(&self) -> Option<&str> {
        self.collaboration_strategy.as_deref()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// One agent's judgment of the article against the evidence it gathered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub confirmed: bool,
    pub evidence_for: Vec<String>,
    pub evidence_against: Vec<String>,
    pub confidence: f64,
    pub explanation: String,
}

impl Evaluation {
    /// Neutral judgment returned when an agent could not complete its work.
    pub fn unverifiable(reason: impl fmt::Display) -> Self {
        Self {
            confirmed: false,
            evidence_for: Vec::new(),
            evidence_against: Vec::new(),
            confidence: NEUTRAL_CONFIDENCE,
            explanation: format!("Unverifiable: {reason}; manual verification recommended"),
        }
    }
}

/// Clamp a raw confidence into `[1, 10]` and round to an integer.
pub fn clamp_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return NEUTRAL_CONFIDENCE;
    }
    raw.round().clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Output of one agent's full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: AgentKind,
    pub queries: Vec<String>,
    pub evaluation: Evaluation,
}

/// Reported domain of a verdict: one agent, or several merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum VerdictDomain {
    Collaborative,
    Agent(AgentKind),
}

impl fmt::Display for VerdictDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictDomain::Collaborative => f.write_str("collaborative"),
            VerdictDomain::Agent(kind) => f.write_str(kind.as_str()),
        }
    }
}

impl From<VerdictDomain> for String {
    fn from(domain: VerdictDomain) -> Self {
        domain.to_string()
    }
}

impl TryFrom<String> for VerdictDomain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("collaborative") {
            return Ok(VerdictDomain::Collaborative);
        }
        AgentKind::parse_label(&value)
            .map(VerdictDomain::Agent)
            .ok_or_else(|| format!("unknown verdict domain `{value}`"))
    }
}

/// Terminal artifact of one verification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedVerdict {
    pub domain: VerdictDomain,
    pub agents_used: Vec<AgentKind>,
    pub queries: Vec<String>,
    pub evaluation: Evaluation,
    pub per_agent_results: Vec<AgentResult>,
    pub routing_decision: RoutingDecision,
    pub trace: Vec<TraceEvent>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_label_accepts_italian_aliases() {
        assert_eq!(AgentKind::parse_label("Scientifico"), Some(AgentKind::Scientific));
        assert_eq!(AgentKind::parse_label(" \"cronaca\" "), Some(AgentKind::Universal));
        assert_eq!(AgentKind::parse_label("tech"), Some(AgentKind::Technological));
        assert_eq!(AgentKind::parse_label("sports"), None);
    }

    #[test]
    fn repair_tops_up_single_agent_with_universal() {
        let chosen = RoutingDecision::repair_selection(vec![AgentKind::Political]);
        assert_eq!(chosen, vec![AgentKind::Political, AgentKind::Universal]);
    }

    #[test]
    fn repair_tops_up_sole_universal_with_scientific() {
        let chosen = RoutingDecision::repair_selection(vec![AgentKind::Universal]);
        assert_eq!(chosen, vec![AgentKind::Universal, AgentKind::Scientific]);
    }

    #[test]
    fn repair_deduplicates_and_truncates() {
        let chosen = RoutingDecision::repair_selection(vec![
            AgentKind::Economic,
            AgentKind::Economic,
            AgentKind::Political,
            AgentKind::Technological,
            AgentKind::Scientific,
        ]);
        assert_eq!(
            chosen,
            vec![AgentKind::Economic, AgentKind::Political, AgentKind::Technological]
        );
    }

    #[test]
    fn every_repaired_selection_has_two_or_three_unique_agents() {
        let mut inputs: Vec<Vec<AgentKind>> = vec![Vec::new()];
        let mut frontier = inputs.clone();
        for _ in 0..4 {
            frontier = frontier
                .iter()
                .flat_map(|prefix| {
                    AgentKind::ALL.iter().map(move |kind| {
                        let mut extended = prefix.clone();
                        extended.push(*kind);
                        extended
                    })
                })
                .collect();
            inputs.extend(frontier.iter().cloned());
        }

        for input in inputs {
            let chosen = RoutingDecision::repair_selection(input.clone());
            assert!((2..=3).contains(&chosen.len()), "{input:?} -> {chosen:?}");
            let unique: BTreeSet<_> = chosen.iter().collect();
            assert_eq!(unique.len(), chosen.len(), "{input:?} -> {chosen:?}");
        }
    }

    #[test]
    fn draft_confidence_is_clamped_and_hints_scoped_to_chosen_agents() {
        let mut hints = BTreeMap::new();
        let mut economic = ExtractedEntities::new();
        economic.insert("indicators", ["GDP"]);
        hints.insert(AgentKind::Economic, economic);
        let mut political = ExtractedEntities::new();
        political.insert("institutions", ["Senate"]);
        hints.insert(AgentKind::Political, political);

        let decision = RoutingDecision::from_draft(RoutingDraft {
            agents: vec![AgentKind::Political],
            confidence_level: Some(14.0),
            entity_hints: hints,
            ..RoutingDraft::default()
        });

        assert_eq!(decision.confidence_level(), 10);
        assert!(decision.hints_for(AgentKind::Political).is_some());
        assert!(decision.hints_for(AgentKind::Economic).is_none());
        assert!(!decision.is_fallback());
    }

    #[test]
    fn unverifiable_evaluation_is_neutral() {
        let evaluation = Evaluation::unverifiable("search timed out");
        assert!(!evaluation.confirmed);
        assert_eq!(evaluation.confidence, NEUTRAL_CONFIDENCE);
        assert!(evaluation.evidence_for.is_empty());
        assert!(evaluation.explanation.contains("manual verification recommended"));
    }

    #[test]
    fn verdict_domain_serializes_as_plain_string() {
        let json = serde_json::to_string(&VerdictDomain::Agent(AgentKind::Scientific))
            .expect("serialize domain");
        assert_eq!(json, "\"scientific\"");
        let back: VerdictDomain = serde_json::from_str("\"collaborative\"").expect("parse domain");
        assert_eq!(back, VerdictDomain::Collaborative);
    }

    #[test]
    fn article_body_prefers_content_over_summary() {
        let mut article = Article::new("Title", "");
        article.summary = Some("short summary".into());
        assert_eq!(article.body(), "short summary");
        article.content = Some("full text".into());
        assert_eq!(article.body(), "full text");
    }

    #[test]
    fn deserialized_decision_is_repaired() {
        let raw = r#"{"chosen_agents":["political","political"],"confidence_level":7,"fallback":false}"#;
        let decision: RoutingDecision = serde_json::from_str(raw).expect("parse decision");
        assert_eq!(decision.chosen_agents(), &[AgentKind::Political, AgentKind::Universal]);
        assert_eq!(decision.confidence_level(), 7);

        let json = serde_json::to_value(RoutingDecision::fallback("offline")).expect("serialize");
        let back: RoutingDecision = serde_json::from_value(json).expect("parse fallback");
        assert!(back.is_fallback());
    }
}
