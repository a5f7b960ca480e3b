use async_trait::async_trait;

use newscheck_core::{AgentKind, Article, Evaluation, EvidenceBundle, ExtractedEntities, PriorAnalysis};

use crate::agent::{AgentCore, AgentServices, VerificationAgent};
use crate::prompt::{Brief, TemplateSubject};

pub(crate) static BRIEF: Brief = Brief {
    kind: AgentKind::Economic,
    persona: "You are an economic fact-checker. Check figures against statistics offices, central banks, filings and financial press.",
    checklist: &[
        "Do the quoted figures match official statistics or filings?",
        "Are dates, currencies and units consistent?",
        "Is a forecast being reported as an outcome?",
    ],
    subject: TemplateSubject::Title,
    templates_it: [
        "report finanziario {}",
        "dati economici {}",
        "analisi economica {}",
    ],
    templates_en: ["financial report {}", "economic data {}", "economic analysis {}"],
};

pub struct EconomicAgent {
    core: AgentCore,
}

impl EconomicAgent {
    pub fn new(services: &AgentServices) -> Self {
        Self {
            core: AgentCore::new(&BRIEF, services),
        }
    }
}

#[async_trait]
impl VerificationAgent for EconomicAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Economic
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
