//! Entry point of the verification core: classify, dispatch, aggregate.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument};

use newscheck_core::{
    AgentResult, Article, Config, ConsolidatedVerdict, DynGenerator, DynSearch, Evaluation,
    ExecutorSettings, NewsCheckError, PriorAnalysis, RoutingDecision, SearchExecutor, TraceEvent,
    TraceStage, build_generator, build_search, combine, redact_secrets,
};

use crate::agent::AgentServices;
use crate::classifier::Classifier;
use crate::dispatch::Dispatcher;
use crate::roster::AgentRoster;
use crate::workflow::VerificationGraph;

pub struct DomainRouter {
    graph: VerificationGraph,
    language: String,
}

impl DomainRouter {
    pub fn new(generator: DynGenerator, search: DynSearch, config: &Config) -> Self {
        let services = AgentServices::new(generator.clone(), search.clone(), config);
        let classifier = Classifier::new(generator, config.verification.routing_max_tokens);
        let executor = SearchExecutor::new(
            search,
            ExecutorSettings::from_config(&config.search, &config.pacing),
        );
        let dispatcher = Dispatcher::new(
            AgentRoster::new(&services),
            executor,
            config.verification.agent_timeout(),
        );

        Self {
            graph: VerificationGraph::new(Arc::new(classifier), Arc::new(dispatcher)),
            language: config.verification.language.clone(),
        }
    }

    /// Build the live generator and search backends from configuration.
    pub fn from_config(config: &Config) -> Result<Self, NewsCheckError> {
        let generator = build_generator(config)?;
        let search = build_search(config)?;
        Ok(Self::new(generator, search, config))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Always returns a verdict. If the workflow itself breaks, the fallback
    /// pair is reported as unverifiable.
    #[instrument(name = "router.verify", skip_all, fields(title = %article.title))]
    pub async fn verify(&self, article: &Article, analysis: &PriorAnalysis) -> ConsolidatedVerdict {
        match self.graph.run(article, analysis, &self.language).await {
            Ok(verdict) => {
                info!(domain = %verdict.domain, agents = verdict.agents_used.len(), "verification complete");
                verdict
            }
            Err(err) => {
                let reason = redact_secrets(&err.to_string());
                error!(error = %reason, "verification workflow failed");
                failed_verdict(&reason)
            }
        }
    }
}

fn failed_verdict(reason: &str) -> ConsolidatedVerdict {
    let decision = RoutingDecision::fallback(format!("workflow failure: {reason}"));
    let results = decision
        .chosen_agents()
        .iter()
        .map(|&agent| AgentResult {
            agent,
            queries: Vec::new(),
            evaluation: Evaluation::unverifiable(format!("verification workflow failed: {reason}")),
        })
        .collect::<Vec<_>>();
    let combined = combine(&results);

    ConsolidatedVerdict {
        domain: combined.domain,
        agents_used: decision.chosen_agents().to_vec(),
        queries: combined.queries,
        evaluation: combined.evaluation,
        per_agent_results: results,
        routing_decision: decision,
        trace: vec![TraceEvent::new(
            TraceStage::Aggregating,
            None,
            format!("workflow failed: {reason}"),
        )],
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use newscheck_core::VerdictDomain;

    use super::*;

    #[test]
    fn failed_verdict_reports_the_fallback_pair_as_unverifiable() {
        let verdict = failed_verdict("session storage unavailable");

        assert_eq!(verdict.domain, VerdictDomain::Collaborative);
        assert_eq!(verdict.agents_used, RoutingDecision::FALLBACK_PAIR.to_vec());
        assert!(verdict.routing_decision.is_fallback());
        assert!(!verdict.evaluation.confirmed);
        assert_eq!(verdict.evaluation.confidence, 5.0);
        assert!(verdict.trace[0].message.contains("session storage unavailable"));
    }
}
