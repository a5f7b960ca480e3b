//! Domain classification: routing prompt in, validated [`RoutingDecision`] out.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use newscheck_core::metrics::{record_degraded_parse, record_routing};
use newscheck_core::parser::{
    coerce_number, coerce_string_list, coerce_text, field, recover_list, recover_scalar,
};
use newscheck_core::{
    AgentKind, Article, DEGRADED_MARKER, DynGenerator, ExtractedEntities, PriorAnalysis,
    ResponseShape, RoutingDecision, RoutingDraft, parse_response, redact_secrets,
};

use crate::entities::{AUTHORS, JOURNALS, STUDIES};
use crate::prompt;

const AGENT_KEYS: &[&str] = &["agents", "agenti_scelti", "chosen_agents", "selected_agents", "agenti"];
const RATIONALE_KEYS: &[&str] = &["rationale", "motivazione", "reason", "reasoning"];
const TRAIT_KEYS: &[&str] = &["detected_traits", "caratteristiche_notizia", "traits"];
const CONFIDENCE_KEYS: &[&str] = &["confidence_level", "livello_confidenza", "confidence"];
const STRATEGY_KEYS: &[&str] = &["collaboration_strategy", "strategia_collaborazione", "strategy"];
const HINT_KEYS: &[&str] = &["entity_hints", "informazioni_specifiche", "specific_information"];

/// Agent names accepted when scanning prose; generic words like "general" are left out.
const PROSE_AGENT_NAMES: &[&str] = &[
    "political",
    "technological",
    "scientific",
    "economic",
    "universal",
    "politico",
    "tecnologico",
    "scientifico",
    "economico",
    "universale",
    "cronaca",
];

/// Classifier reply as parsed, before the repair step.
#[derive(Debug, Clone, Default)]
pub struct RoutingReply(pub RoutingDraft);

fn agents_from_labels<I: IntoIterator<Item = String>>(labels: I) -> Vec<AgentKind> {
    labels
        .into_iter()
        .flat_map(|label| {
            label
                .split([',', '+', '&', '/'])
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter_map(|label| AgentKind::parse_label(&label))
        .collect()
}

fn slot_name(key: &str) -> String {
    let lowered = key.trim().to_lowercase();
    let slot = match lowered.as_str() {
        "entita_principali" | "entità_principali" | "main_entities" => "entities",
        "eventi_chiave" | "key_events" => "events",
        "fonti_citate" | "cited_sources" => "sources",
        "dettagli_rilevanti" | "relevant_details" => "details",
        "autori" | "autore" | "author" | "author_name" => AUTHORS,
        "studi" | "studio" | "study" | "study_name" => STUDIES,
        "riviste" | "rivista" | "journal" => JOURNALS,
        other => return other.to_string(),
    };
    slot.to_string()
}

fn entities_from(map: &Map<String, Value>) -> ExtractedEntities {
    let mut entities = ExtractedEntities::new();
    for (key, value) in map {
        entities.insert(slot_name(key), coerce_string_list(value));
    }
    entities
}

/// Per-agent hints when keyed by agent name, otherwise one set shared by all.
fn hints_from(value: &Value) -> BTreeMap<AgentKind, ExtractedEntities> {
    let Value::Object(map) = value else {
        return BTreeMap::new();
    };

    let per_agent: BTreeMap<AgentKind, ExtractedEntities> = map
        .iter()
        .filter_map(|(key, nested)| {
            let kind = AgentKind::parse_label(key)?;
            let Value::Object(nested) = nested else {
                return None;
            };
            Some((kind, entities_from(nested)))
        })
        .collect();
    if !per_agent.is_empty() {
        return per_agent;
    }

    let shared = entities_from(map);
    if shared.is_empty() {
        return BTreeMap::new();
    }
    AgentKind::ALL
        .into_iter()
        .map(|kind| (kind, shared.clone()))
        .collect()
}

impl ResponseShape for RoutingReply {
    const LABEL: &'static str = "routing";

    fn from_value(value: Value) -> Option<Self> {
        if value.is_array() {
            let agents = agents_from_labels(coerce_string_list(&value));
            return (!agents.is_empty()).then(|| {
                RoutingReply(RoutingDraft {
                    agents,
                    ..RoutingDraft::default()
                })
            });
        }
        let Value::Object(map) = value else {
            return None;
        };
        let agents = field(&map, AGENT_KEYS)?;

        Some(RoutingReply(RoutingDraft {
            agents: agents_from_labels(coerce_string_list(agents)),
            rationale: field(&map, RATIONALE_KEYS)
                .and_then(coerce_text)
                .unwrap_or_default(),
            confidence_level: field(&map, CONFIDENCE_KEYS).and_then(coerce_number),
            detected_traits: field(&map, TRAIT_KEYS)
                .map(coerce_string_list)
                .unwrap_or_default()
                .into_iter()
                .collect(),
            entity_hints: field(&map, HINT_KEYS).map(hints_from).unwrap_or_default(),
            collaboration_strategy: field(&map, STRATEGY_KEYS).and_then(coerce_text),
        }))
    }

    fn recover_fields(raw: &str) -> Option<Self> {
        let agents = agents_from_labels(recover_list(raw, AGENT_KEYS)?);
        if agents.is_empty() {
            return None;
        }
        let rationale = recover_scalar(raw, RATIONALE_KEYS).unwrap_or_default();
        Some(RoutingReply(RoutingDraft {
            agents,
            rationale: format!("{DEGRADED_MARKER} {rationale}").trim_end().to_string(),
            confidence_level: recover_scalar(raw, CONFIDENCE_KEYS)
                .and_then(|text| coerce_number(&Value::String(text))),
            detected_traits: recover_list(raw, TRAIT_KEYS)
                .unwrap_or_default()
                .into_iter()
                .collect(),
            collaboration_strategy: recover_scalar(raw, STRATEGY_KEYS),
            ..RoutingDraft::default()
        }))
    }

    fn heuristic(raw: &str) -> Self {
        let mut agents: Vec<AgentKind> = Vec::new();
        for word in raw.split(|c: char| !c.is_alphanumeric()) {
            let lowered = word.to_lowercase();
            if !PROSE_AGENT_NAMES.contains(&lowered.as_str()) {
                continue;
            }
            if let Some(kind) = AgentKind::parse_label(&lowered) {
                if !agents.contains(&kind) {
                    agents.push(kind);
                }
            }
        }
        RoutingReply(RoutingDraft {
            agents,
            rationale: format!("{DEGRADED_MARKER} agents named in an unstructured reply"),
            ..RoutingDraft::default()
        })
    }
}

/// Runs the routing prompt through the generator and repairs the reply.
pub struct Classifier {
    generator: DynGenerator,
    max_tokens: u32,
}

impl Classifier {
    pub fn new(generator: DynGenerator, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// Always yields a decision with two or three agents.
    pub async fn classify(&self, article: &Article, analysis: &PriorAnalysis) -> RoutingDecision {
        let prompt = prompt::routing_prompt(article, analysis);

        let decision = match self.generator.generate(&prompt, self.max_tokens).await {
            Err(err) => {
                let reason = redact_secrets(&err.to_string());
                warn!(error = %reason, "routing call failed; using fallback pair");
                RoutingDecision::fallback(format!("classification failed ({reason})"))
            }
            Ok(reply) => {
                let parsed = parse_response::<RoutingReply>(&reply);
                if parsed.strategy.is_degraded() {
                    record_degraded_parse(RoutingReply::LABEL);
                }
                let draft = parsed.value.0;
                if draft.agents.is_empty() {
                    warn!(strategy = %parsed.strategy, "no known agent in routing reply; using fallback pair");
                    RoutingDecision::fallback("no known agent in the classifier reply")
                } else {
                    RoutingDecision::from_draft(draft)
                }
            }
        };

        record_routing(decision.is_fallback(), decision.chosen_agents().len());
        info!(
            agents = ?decision.chosen_agents(),
            confidence = decision.confidence_level(),
            fallback = decision.is_fallback(),
            "routing decided"
        );
        decision
    }
}
