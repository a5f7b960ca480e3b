use async_trait::async_trait;

use newscheck_core::{AgentKind, Article, Evaluation, EvidenceBundle, ExtractedEntities, PriorAnalysis};

use crate::agent::{AgentCore, AgentServices, VerificationAgent};
use crate::prompt::{Brief, TemplateSubject};

pub(crate) static BRIEF: Brief = Brief {
    kind: AgentKind::Political,
    persona: "You are a political fact-checker. Trust official statements, institutional records and press agencies over commentary.",
    checklist: &[
        "Is there an official statement or press release?",
        "Do institutional sources (government, parliament, ministries) report it?",
        "Are quotes attributed to named politicians and verifiable?",
        "Is the item partisan framing of a real event?",
    ],
    subject: TemplateSubject::Title,
    templates_it: [
        "dichiarazione ufficiale {}",
        "comunicato stampa {}",
        "reazione politica {}",
    ],
    templates_en: ["official statement {}", "press release {}", "political reaction {}"],
};

pub struct PoliticalAgent {
    core: AgentCore,
}

impl PoliticalAgent {
    pub fn new(services: &AgentServices) -> Self {
        Self {
            core: AgentCore::new(&BRIEF, services),
        }
    }
}

#[async_trait]
impl VerificationAgent for PoliticalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Political
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
