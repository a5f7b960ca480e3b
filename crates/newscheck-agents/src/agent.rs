//! The verification agent contract and the pipeline every variant shares.

use async_trait::async_trait;
use tracing::{debug, warn};

use newscheck_core::metrics::record_degraded_parse;
use newscheck_core::{
    AgentKind, Article, Config, DynGenerator, DynSearch, Evaluation, EvidenceBundle,
    ExtractedEntities, PriorAnalysis, QueryList, ResponseShape, parse_response, parse_structured,
    redact_secrets,
};

use crate::entities;
use crate::prompt::{self, Brief, EvaluationInput};

/// Generation budgets, in tokens, for the two agent prompts.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudgets {
    pub queries: u32,
    pub evaluation: u32,
}

/// Collaborators and limits handed to every agent.
#[derive(Clone)]
pub struct AgentServices {
    pub generator: DynGenerator,
    pub search: DynSearch,
    pub budgets: TokenBudgets,
    /// Hits requested per publication lookup by the scientific agent.
    pub study_results: usize,
}

impl AgentServices {
    pub fn new(generator: DynGenerator, search: DynSearch, config: &Config) -> Self {
        Self {
            generator,
            search,
            budgets: TokenBudgets {
                queries: config.verification.query_max_tokens,
                evaluation: config.verification.evaluation_max_tokens,
            },
            study_results: config.search.study_results,
        }
    }
}

/// A domain-specialized verifier.
#[async_trait]
pub trait VerificationAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Advisory pattern extraction over the article and the prior analysis.
    fn extract_entities(&self, article: &Article, analysis: &PriorAnalysis) -> ExtractedEntities {
        entities::extract(self.kind(), article, analysis)
    }

    /// 1-5 search queries; never empty thanks to template fallbacks.
    async fn generate_queries(
        &self,
        article: &Article,
        analysis: &PriorAnalysis,
        language: &str,
    ) -> Vec<String>;

    async fn evaluate(
        &self,
        queries: &[String],
        evidence: &EvidenceBundle,
        language: &str,
        hints: Option<&ExtractedEntities>,
        article: &Article,
    ) -> Evaluation;
}

/// Brief plus generator: the query and evaluation steps common to all variants.
pub struct AgentCore {
    brief: &'static Brief,
    generator: DynGenerator,
    budgets: TokenBudgets,
}

impl AgentCore {
    pub fn new(brief: &'static Brief, services: &AgentServices) -> Self {
        Self {
            brief,
            generator: services.generator.clone(),
            budgets: services.budgets,
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.brief.kind
    }

    pub fn brief(&self) -> &'static Brief {
        self.brief
    }

    pub async fn generate_queries(
        &self,
        article: &Article,
        analysis: &PriorAnalysis,
        language: &str,
    ) -> Vec<String> {
        let kind = self.kind();
        let prompt = prompt::queries_prompt(self.brief, article, analysis, language);

        let reply = match self.generator.generate(&prompt, self.budgets.queries).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(agent = %kind, error = %redact_secrets(&err.to_string()), "query generation failed; using templates");
                return self.brief.template_queries(article, language);
            }
        };

        match parse_structured::<QueryList>(&reply) {
            Some(parsed) if !parsed.value.0.is_empty() => {
                if parsed.strategy.is_degraded() {
                    record_degraded_parse(QueryList::LABEL);
                }
                debug!(agent = %kind, strategy = %parsed.strategy, count = parsed.value.0.len(), "queries parsed");
                parsed.value.into_inner()
            }
            _ => {
                warn!(agent = %kind, "no usable queries in reply; using templates");
                self.brief.template_queries(article, language)
            }
        }
    }

    /// Ask the generator for a judgment. Never fails: a service error yields
    /// the neutral unverifiable evaluation.
    pub async fn evaluate(
        &self,
        article: &Article,
        queries: &[String],
        evidence: &EvidenceBundle,
        language: &str,
        hints: Option<&ExtractedEntities>,
        study_summary: Option<&str>,
    ) -> Evaluation {
        let kind = self.kind();
        let prompt = prompt::evaluation_prompt(
            self.brief,
            &EvaluationInput {
                article,
                queries,
                evidence,
                language,
                hints,
                study_summary,
            },
        );

        match self.generator.generate(&prompt, self.budgets.evaluation).await {
            Ok(reply) => {
                let parsed = parse_response::<Evaluation>(&reply);
                if parsed.strategy.is_degraded() {
                    record_degraded_parse(Evaluation::LABEL);
                }
                debug!(agent = %kind, strategy = %parsed.strategy, confirmed = parsed.value.confirmed, "evaluation parsed");
                parsed.value
            }
            Err(err) => {
                let reason = redact_secrets(&err.to_string());
                warn!(agent = %kind, error = %reason, "evaluation failed");
                Evaluation::unverifiable(format!("evaluation by the {kind} agent failed ({reason})"))
            }
        }
    }
}
