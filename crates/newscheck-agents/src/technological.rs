use async_trait::async_trait;

use newscheck_core::{AgentKind, Article, Evaluation, EvidenceBundle, ExtractedEntities, PriorAnalysis};

use crate::agent::{AgentCore, AgentServices, VerificationAgent};
use crate::prompt::{Brief, TemplateSubject};

pub(crate) static BRIEF: Brief = Brief {
    kind: AgentKind::Technological,
    persona: "You are a technology fact-checker. Prefer vendor announcements, official blogs, release notes and specialist press.",
    checklist: &[
        "Did the company announce it on an official channel?",
        "Is the product, model or feature actually released or only rumored?",
        "Do specialist outlets report concrete specifications or dates?",
    ],
    subject: TemplateSubject::Title,
    templates_it: [
        "annuncio ufficiale {}",
        "comunicato stampa {}",
        "blog ufficiale {}",
    ],
    templates_en: ["official announcement {}", "press release {}", "official blog {}"],
};

pub struct TechnologicalAgent {
    core: AgentCore,
}

impl TechnologicalAgent {
    pub fn new(services: &AgentServices) -> Self {
        Self {
            core: AgentCore::new(&BRIEF, services),
        }
    }
}

#[async_trait]
impl VerificationAgent for TechnologicalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Technological
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
