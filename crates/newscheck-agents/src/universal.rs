//! Catch-all verifier for general news and events.

use async_trait::async_trait;

use newscheck_core::{AgentKind, Article, Evaluation, EvidenceBundle, ExtractedEntities, PriorAnalysis};

use crate::agent::{AgentCore, AgentServices, VerificationAgent};
use crate::prompt::{Brief, TemplateSubject};

pub(crate) static BRIEF: Brief = Brief {
    kind: AgentKind::Universal,
    persona: "You are a general news fact-checker. Look for independent outlets reporting the same event with consistent details.",
    checklist: &[
        "Do at least two independent outlets report the event?",
        "Do places, dates and people match across sources?",
        "Is the story recent or recycled from an older event?",
    ],
    subject: TemplateSubject::Keywords,
    templates_it: ["{}", "notizia {}", "ultime notizie {}"],
    templates_en: ["{}", "news {}", "latest news {}"],
};

pub struct UniversalAgent {
    core: AgentCore,
}

impl UniversalAgent {
    pub fn new(services: &AgentServices) -> Self {
        Self {
            core: AgentCore::new(&BRIEF, services),
        }
    }
}

#[async_trait]
impl VerificationAgent for UniversalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Universal
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
        self.core
            .evaluate(article, queries, evidence, language, hints, None)
            .await
    }
}
