//! Study-quality sub-analysis used by the scientific agent.
//!
//! A study lead (author, topic, journal) is pulled from entity hints, then
//! from the queries, then from the evidence. The lead drives a publication
//! lookup and the best hit is scored against a fixed rubric:
//!
//! | criterion | points |
//! |---|---|
//! | abstract | 2 |
//! | methodology (only without red flags) | 3 |
//! | results | 2 |
//! | conclusions | 1 |
//! | identifier (DOI, PMID, arXiv) | 1 |
//! | peer review | 2 |
//! | reputable venue | 1 |
//!
//! Every methodological red flag costs 2 points, saturating at zero.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use newscheck_core::{
    DynSearch, EvidenceBundle, ExtractedEntities, SearchFlavor, SearchHit, redact_secrets,
};

use crate::entities::{self, AUTHORS, JOURNALS, STUDIES};
use crate::prompt::is_italian;

pub const MAX_SCORE: u8 = 12;
/// Confidence ceiling applied when the study band is low.
pub const LOW_QUALITY_CONFIDENCE_CAP: f64 = 4.0;
const MAX_LOOKUP_TERMS: usize = 3;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid study regex")
}

static ABSTRACT: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(abstract|sommario|riassunto)\b"));
static METHODOLOGY: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(methods?|methodology|metodologia|metodo|randomi[sz]ed|double[- ]blind|placebo|controlled|cohort|sample|campione|participants|partecipanti)\b",
    )
});
static RESULTS: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(results?|risultati|findings|efficacy|efficacia|outcomes?)\b")
});
static CONCLUSIONS: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(conclusions?|conclusioni|concludes?|conclude)\b"));
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)(\b10\.\d{4,9}/[-._;()/:\w]+|\bpmid:?\s*\d{5,}|\barxiv:\s*\d{4}\.\d{4,5})")
});
static PEER_REVIEWED: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)(peer[- ]?reviewed|revisionat[oa] (?:da|tra) pari|revisione paritaria)")
});
static NOT_PEER_REVIEWED: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)(preprint|not (?:yet )?peer[- ]?reviewed|non (?:ancora )?(?:peer[- ]?reviewed|revisionat[oa])|senza peer[- ]?review)")
});
static VENUE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(wiley|springer|elsevier|nature|science|lancet|nejm|new england journal|cell press|plos|bmj|jama|pnas)\b",
    )
});

/// Methodological limitation that voids the methodology points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlag {
    Reconstruction3d,
    SimulationAsProof,
    AmateurTooling,
    NoDirectAccess,
}

impl RedFlag {
    const ALL: [RedFlag; 4] = [
        RedFlag::Reconstruction3d,
        RedFlag::SimulationAsProof,
        RedFlag::AmateurTooling,
        RedFlag::NoDirectAccess,
    ];

    fn pattern(&self) -> &'static Regex {
        static RECONSTRUCTION: Lazy<Regex> = Lazy::new(|| {
            compile(r"(?i)(3d reconstruction|reconstructed in 3d|ricostruzion[ei] 3d|ricostruzion[ei] tridimensional[ei]|3d model|modello 3d)")
        });
        static SIMULATION: Lazy<Regex> = Lazy::new(|| {
            compile(r"(?i)\b(simulations?|simulazion[ei]|simulated|simulat[oa]|computer models?|mathematical models?|modell[oi] matematic[oi])\b")
        });
        static TOOLING: Lazy<Regex> = Lazy::new(|| {
            compile(r"(?i)(free software|freeware|software gratuit[oa]|amateur|amatorial[ei]|unvalidated|non validat[oa]|blender)")
        });
        static NO_ACCESS: Lazy<Regex> = Lazy::new(|| {
            compile(r"(?i)(no direct access|without direct access|senza accesso diretto|nessun accesso diretto|mancanza di accesso diretto|from photographs|da fotografie)")
        });
        match self {
            RedFlag::Reconstruction3d => &RECONSTRUCTION,
            RedFlag::SimulationAsProof => &SIMULATION,
            RedFlag::AmateurTooling => &TOOLING,
            RedFlag::NoDirectAccess => &NO_ACCESS,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            RedFlag::Reconstruction3d => "relies on a 3D reconstruction",
            RedFlag::SimulationAsProof => "presents a simulation or model as proof",
            RedFlag::AmateurTooling => "uses unvalidated or amateur tooling",
            RedFlag::NoDirectAccess => "had no direct access to the original material",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Low,
    Medium,
    High,
}

impl QualityBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => QualityBand::Low,
            5..=7 => QualityBand::Medium,
            _ => QualityBand::High,
        }
    }
}

impl fmt::Display for QualityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityBand::Low => f.write_str("low"),
            QualityBand::Medium => f.write_str("medium"),
            QualityBand::High => f.write_str("high"),
        }
    }
}

/// Who and what to look up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyLead {
    pub author: Option<String>,
    pub topic: Option<String>,
    pub journal: Option<String>,
}

impl StudyLead {
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.topic.is_none()
    }

    fn fill_from(&mut self, entities: &ExtractedEntities) {
        let first = |slot: &str| entities.get(slot).first().cloned();
        self.author = self.author.take().or_else(|| first(AUTHORS));
        self.topic = self.topic.take().or_else(|| first(STUDIES));
        self.journal = self.journal.take().or_else(|| first(JOURNALS));
    }

    /// Hints first, then queries, then evidence; later sources only fill gaps.
    pub fn locate(hints: Option<&ExtractedEntities>, queries: &[String], evidence: &EvidenceBundle) -> Self {
        let mut lead = StudyLead::default();
        if let Some(hints) = hints {
            lead.fill_from(hints);
        }
        if lead.author.is_some() && lead.topic.is_some() {
            return lead;
        }

        let mut from_queries = ExtractedEntities::new();
        entities::extract_study(&queries.join("\n"), &mut from_queries);
        lead.fill_from(&from_queries);
        if lead.author.is_some() && lead.topic.is_some() {
            return lead;
        }

        let evidence_text = evidence
            .records()
            .iter()
            .map(|record| format!("{}. {}", record.title, record.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        let mut from_evidence = ExtractedEntities::new();
        entities::extract_study(&evidence_text, &mut from_evidence);
        lead.fill_from(&from_evidence);
        lead
    }

    /// Lookup terms combining author, topic and journal.
    pub fn search_terms(&self, language: &str) -> Vec<String> {
        let (study_word, research_word) = if is_italian(language) {
            ("studio", "ricerca")
        } else {
            ("study", "paper")
        };
        let mut terms = Vec::new();
        match (&self.author, &self.topic) {
            (Some(author), Some(topic)) => {
                terms.push(format!("{author} {topic}"));
                terms.push(format!("{topic} {author}"));
                terms.push(format!("{author} {study_word}"));
            }
            (Some(author), None) => {
                terms.push(format!("{author} {study_word}"));
                terms.push(format!("{author} {research_word}"));
            }
            (None, Some(topic)) => {
                terms.push(format!("{topic} {study_word}"));
                terms.push(format!("{topic} {research_word}"));
            }
            (None, None) => {}
        }
        if let (Some(journal), Some(anchor)) = (&self.journal, self.author.as_ref().or(self.topic.as_ref())) {
            terms.push(format!("{journal} {anchor}"));
        }
        terms
    }
}

/// What could be observed about a publication from its search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyRecord {
    pub title: String,
    pub source: String,
    pub has_abstract: bool,
    pub has_methodology: bool,
    pub has_results: bool,
    pub has_conclusions: bool,
    pub identifier: Option<String>,
    pub peer_reviewed: bool,
    pub reputable_venue: bool,
    pub red_flags: Vec<RedFlag>,
}

impl StudyRecord {
    pub fn from_hit(hit: &SearchHit) -> Self {
        let text = format!("{}\n{}\n{}\n{}", hit.title, hit.snippet, hit.source, hit.link);
        Self {
            title: hit.title.clone(),
            source: hit.source.clone(),
            has_abstract: ABSTRACT.is_match(&text),
            has_methodology: METHODOLOGY.is_match(&text),
            has_results: RESULTS.is_match(&text),
            has_conclusions: CONCLUSIONS.is_match(&text),
            identifier: IDENTIFIER.find(&text).map(|m| m.as_str().to_string()),
            peer_reviewed: PEER_REVIEWED.is_match(&text) && !NOT_PEER_REVIEWED.is_match(&text),
            reputable_venue: VENUE.is_match(&text),
            red_flags: RedFlag::ALL
                .into_iter()
                .filter(|flag| flag.pattern().is_match(&text))
                .collect(),
        }
    }

    pub fn assess(&self) -> StudyAssessment {
        let mut strengths = Vec::new();
        let mut issues = Vec::new();
        let mut score: u8 = 0;

        let mut criterion = |present: bool, points: u8, strength: &str, issue: &str| {
            if present {
                score += points;
                strengths.push(strength.to_string());
            } else {
                issues.push(issue.to_string());
            }
        };
        criterion(self.has_abstract, 2, "abstract available", "no abstract");
        criterion(
            self.has_methodology && self.red_flags.is_empty(),
            3,
            "methodology described",
            "no sound methodology described",
        );
        criterion(self.has_results, 2, "results reported", "no results reported");
        criterion(self.has_conclusions, 1, "conclusions stated", "no conclusions stated");
        criterion(
            self.identifier.is_some(),
            1,
            "persistent identifier (DOI/PMID/arXiv)",
            "no DOI or other identifier",
        );
        criterion(self.peer_reviewed, 2, "peer reviewed", "not peer reviewed");
        criterion(self.reputable_venue, 1, "reputable venue", "venue of unknown standing");

        for flag in &self.red_flags {
            issues.push(format!("study {}", flag.describe()));
        }
        let penalty = 2 * self.red_flags.len() as u8;
        let score = score.saturating_sub(penalty);

        StudyAssessment {
            title: self.title.clone(),
            score,
            band: QualityBand::from_score(score),
            strengths,
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyAssessment {
    pub title: String,
    pub score: u8,
    pub band: QualityBand,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
}

impl StudyAssessment {
    /// Block injected into the scientific evaluation prompt.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Publication: {}\nQuality: {} ({}/{MAX_SCORE})",
            self.title, self.band, self.score
        );
        if !self.strengths.is_empty() {
            out.push_str(&format!("\nStrengths: {}", self.strengths.join("; ")));
        }
        if !self.issues.is_empty() {
            out.push_str(&format!("\nIssues: {}", self.issues.join("; ")));
        }
        if self.band == QualityBand::Low {
            out.push_str("\nMethodology outranks coverage: wide reporting does not make this study solid.");
        }
        out
    }
}

/// Publication lookup through the search collaborator.
#[derive(Clone)]
pub struct StudyAnalyzer {
    search: DynSearch,
    results: usize,
}

impl StudyAnalyzer {
    pub fn new(search: DynSearch, results: usize) -> Self {
        Self {
            search,
            results: results.max(1),
        }
    }

    /// Look the study up and score the best hit. `None` when nothing was found.
    pub async fn analyze(&self, lead: &StudyLead, language: &str) -> Option<StudyAssessment> {
        let mut hits: Vec<SearchHit> = Vec::new();
        for term in lead.search_terms(language).into_iter().take(MAX_LOOKUP_TERMS) {
            match self
                .search
                .search(&term, language, self.results, SearchFlavor::General)
                .await
            {
                Ok(found) if !found.is_empty() => {
                    hits = found;
                    break;
                }
                Ok(_) => debug!(term = %term, "study lookup returned nothing"),
                Err(err) => {
                    warn!(term = %term, error = %redact_secrets(&err.to_string()), "study lookup failed")
                }
            }
        }

        let assessment = hits
            .iter()
            .map(|hit| StudyRecord::from_hit(hit).assess())
            .reduce(|best, next| if next.score > best.score { next } else { best })?;
        debug!(
            title = %assessment.title,
            score = assessment.score,
            band = %assessment.band,
            "study assessed"
        );
        Some(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newscheck_core::{EvidenceRecord, StubSearch};
    use std::sync::Arc;

    fn reviewed_hit() -> SearchHit {
        SearchHit::new(
            "Efficacy of the XR-7 malaria vaccine: a randomized controlled trial",
            "Abstract: peer-reviewed phase 3 trial in The Lancet. Methods: double-blind, 4000 participants. Results: 78% efficacy. Conclusions: protective. doi:10.1016/S0140-6736(24)00001-1",
        )
        .with_source("The Lancet")
    }

    fn reconstruction_hit() -> SearchHit {
        SearchHit::new(
            "Shroud face obtained by 3D reconstruction",
            "Preprint, not peer-reviewed. Results of a 3D reconstruction made with free software (Blender) from photographs, with no direct access to the cloth.",
        )
        .with_source("personal blog")
    }

    #[test]
    fn complete_reviewed_study_scores_high() {
        let assessment = StudyRecord::from_hit(&reviewed_hit()).assess();
        assert_eq!(assessment.score, MAX_SCORE);
        assert_eq!(assessment.band, QualityBand::High);
        assert!(assessment.issues.is_empty());
    }

    #[test]
    fn red_flags_void_methodology_and_saturate_at_zero() {
        let record = StudyRecord::from_hit(&reconstruction_hit());
        assert!(!record.peer_reviewed);
        assert_eq!(record.red_flags.len(), 3);
        let assessment = record.assess();
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.band, QualityBand::Low);
        assert!(assessment.issues.iter().any(|i| i.contains("3D reconstruction")));
    }

    #[test]
    fn band_thresholds() {
        assert_eq!(QualityBand::from_score(4), QualityBand::Low);
        assert_eq!(QualityBand::from_score(5), QualityBand::Medium);
        assert_eq!(QualityBand::from_score(7), QualityBand::Medium);
        assert_eq!(QualityBand::from_score(8), QualityBand::High);
    }

    #[test]
    fn lead_prefers_hints_then_fills_from_evidence() {
        let mut hints = ExtractedEntities::new();
        hints.insert(AUTHORS, ["Maria Rossi"]);
        let evidence = EvidenceBundle::new(
            vec![EvidenceRecord {
                title: "Coverage".into(),
                snippet: "A study on the XR-7 malaria vaccine by Luca Verdi.".into(),
                source: "ANSA".into(),
                date: None,
            }],
            200,
        );
        let lead = StudyLead::locate(Some(&hints), &[], &evidence);
        assert_eq!(lead.author.as_deref(), Some("Maria Rossi"));
        assert_eq!(lead.topic.as_deref(), Some("the XR-7 malaria vaccine"));
    }

    #[test]
    fn search_terms_follow_the_language() {
        let lead = StudyLead {
            author: Some("Maria Rossi".into()),
            topic: None,
            journal: Some("Lancet".into()),
        };
        assert_eq!(
            lead.search_terms("it"),
            vec!["Maria Rossi studio", "Maria Rossi ricerca", "Lancet Maria Rossi"]
        );
        assert_eq!(lead.search_terms("en")[1], "Maria Rossi paper");
    }

    #[tokio::test]
    async fn analyzer_scores_the_best_hit() {
        let search = Arc::new(
            StubSearch::new().with_flavored_hits(
                "maria rossi",
                SearchFlavor::General,
                vec![reconstruction_hit(), reviewed_hit()],
            ),
        );
        let analyzer = StudyAnalyzer::new(search.clone(), 3);
        let lead = StudyLead {
            author: Some("Maria Rossi".into()),
            ..StudyLead::default()
        };
        let assessment = analyzer.analyze(&lead, "en").await.expect("study found");
        assert_eq!(assessment.band, QualityBand::High);
        assert_eq!(search.calls().len(), 1);
    }

    #[tokio::test]
    async fn analyzer_without_hits_returns_none() {
        let analyzer = StudyAnalyzer::new(Arc::new(StubSearch::new()), 3);
        let lead = StudyLead {
            topic: Some("turin shroud face".into()),
            ..StudyLead::default()
        };
        assert!(analyzer.analyze(&lead, "it").await.is_none());
    }
}
