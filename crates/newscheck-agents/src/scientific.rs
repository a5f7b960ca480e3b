//! Scientific verifier. On top of the shared pipeline it looks up the study
//! behind the article and lets methodology outrank media coverage.

use async_trait::async_trait;
use tracing::info;

use newscheck_core::{AgentKind, Article, Evaluation, EvidenceBundle, ExtractedEntities, PriorAnalysis};

use crate::agent::{AgentCore, AgentServices, VerificationAgent};
use crate::prompt::{Brief, TemplateSubject};
use crate::study::{LOW_QUALITY_CONFIDENCE_CAP, QualityBand, StudyAnalyzer, StudyAssessment, StudyLead};

pub(crate) static BRIEF: Brief = Brief {
    kind: AgentKind::Scientific,
    persona: "You are a scientific fact-checker. Judge the methodology of the underlying study, not only the authority of who reports it.",
    checklist: &[
        "Is the study published, peer reviewed and identifiable (DOI, PMID, arXiv)?",
        "Did the authors have direct access to data, samples or the object studied?",
        "Are 3D reconstructions, simulations or models presented as proof?",
        "Were validated instruments used, or free and amateur tooling?",
        "Do the reported results support the article's claim?",
    ],
    subject: TemplateSubject::Title,
    templates_it: [
        "studio scientifico {}",
        "paper ricerca {}",
        "pubblicazione {}",
    ],
    templates_en: ["scientific study {}", "research paper {}", "publication {}"],
};

pub struct ScientificAgent {
    core: AgentCore,
    studies: StudyAnalyzer,
}

impl ScientificAgent {
    pub fn new(services: &AgentServices) -> Self {
        Self {
            core: AgentCore::new(&BRIEF, services),
            studies: StudyAnalyzer::new(services.search.clone(), services.study_results),
        }
    }

    async fn assess_study(
        &self,
        hints: Option<&ExtractedEntities>,
        queries: &[String],
        evidence: &EvidenceBundle,
        language: &str,
    ) -> Option<StudyAssessment> {
        let lead = StudyLead::locate(hints, queries, evidence);
        if lead.is_empty() {
            info!("no study lead found");
            return None;
        }
        self.studies.analyze(&lead, language).await
    }
}

/// Low-quality studies cannot back a confirmation, however widely reported.
pub fn apply_quality_guard(mut evaluation: Evaluation, assessment: &StudyAssessment) -> Evaluation {
    if assessment.band != QualityBand::Low {
        return evaluation;
    }
    evaluation.confirmed = false;
    evaluation.confidence = evaluation.confidence.min(LOW_QUALITY_CONFIDENCE_CAP);
    evaluation.evidence_against.extend(
        assessment
            .issues
            .iter()
            .map(|issue| format!("study quality: {issue}")),
    );
    evaluation
}

#[async_trait]
impl VerificationAgent for ScientificAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Scientific
    }

    async fn generate_queries(&self, article: &Article, analysis: &PriorAnalysis, language: &str) -> Vec<String> {
        self.core.generate_queries(article, analysis, language).await
    }

    async fn evaluate(
        &self,
        queries: &[String],
        evidence: &EvidenceBundle,
        language: &str,
        hints: Option<&ExtractedEntities>,
        article: &Article,
    ) -> Evaluation {
        let assessment = self.assess_study(hints, queries, evidence, language).await;
        let summary = assessment.as_ref().map(StudyAssessment::summary);

        let evaluation = self
            .core
            .evaluate(article, queries, evidence, language, hints, summary.as_deref())
            .await;

        match &assessment {
            Some(assessment) => {
                info!(score = assessment.score, band = %assessment.band, "study quality applied");
                apply_quality_guard(evaluation, assessment)
            }
            None => evaluation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(band: QualityBand) -> StudyAssessment {
        StudyAssessment {
            title: "paper".into(),
            score: 2,
            band,
            strengths: vec![],
            issues: vec!["not peer reviewed".into()],
        }
    }

    fn confident() -> Evaluation {
        Evaluation {
            confirmed: true,
            evidence_for: vec!["many outlets".into()],
            evidence_against: vec![],
            confidence: 9.0,
            explanation: "widely reported".into(),
        }
    }

    #[test]
    fn low_band_caps_confidence_and_blocks_confirmation() {
        let guarded = apply_quality_guard(confident(), &assessment(QualityBand::Low));
        assert!(!guarded.confirmed);
        assert_eq!(guarded.confidence, 4.0);
        assert_eq!(guarded.evidence_against, vec!["study quality: not peer reviewed".to_string()]);
    }

    #[test]
    fn medium_band_leaves_the_evaluation_alone() {
        let guarded = apply_quality_guard(confident(), &assessment(QualityBand::Medium));
        assert_eq!(guarded, confident());
    }
}
