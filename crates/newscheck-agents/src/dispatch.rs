//! Sequential execution of the chosen agents, each under its own deadline.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use newscheck_core::metrics::record_agent_run;
use newscheck_core::{
    AgentKind, AgentResult, Article, Evaluation, ExtractedEntities, PriorAnalysis, RoutingDecision, SearchExecutor,
    TraceCollector, TraceStage,
};

use crate::agent::VerificationAgent;
use crate::roster::AgentRoster;

pub struct Dispatcher {
    roster: AgentRoster,
    executor: SearchExecutor,
    agent_timeout: Duration,
}

impl Dispatcher {
    pub fn new(roster: AgentRoster, executor: SearchExecutor, agent_timeout: Duration) -> Self {
        Self {
            roster,
            executor,
            agent_timeout,
        }
    }

    /// One result per chosen agent, in decision order. A timed-out agent
    /// contributes an unverifiable result and the others still run.
    pub async fn dispatch(
        &self,
        decision: &RoutingDecision,
        article: &Article,
        analysis: &PriorAnalysis,
        language: &str,
        trace: &mut TraceCollector,
    ) -> Vec<AgentResult> {
        let mut results = Vec::with_capacity(decision.chosen_agents().len());

        for &kind in decision.chosen_agents() {
            let agent = self.roster.agent(kind);
            let mut hints = decision.hints_for(kind).cloned().unwrap_or_default();
            hints.merge(&agent.extract_entities(article, analysis));
            trace.record_agent(TraceStage::Dispatching, kind, "started");

            let started = Instant::now();
            let outcome = tokio::time::timeout(
                self.agent_timeout,
                self.run_pipeline(agent, article, analysis, language, &hints),
            )
            .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(result) => {
                    record_agent_run(kind, "completed", elapsed_ms);
                    trace.record_agent(
                        TraceStage::Dispatching,
                        kind,
                        format!(
                            "completed: confirmed={} confidence={} queries={}",
                            result.evaluation.confirmed,
                            result.evaluation.confidence,
                            result.queries.len()
                        ),
                    );
                    result
                }
                Err(_) => {
                    let timeout_ms = self.agent_timeout.as_millis();
                    warn!(agent = %kind, timeout_ms, "agent pipeline timed out");
                    record_agent_run(kind, "timed_out", elapsed_ms);
                    trace.record_agent(TraceStage::Dispatching, kind, format!("timed out after {timeout_ms} ms"));
                    timed_out(kind, timeout_ms)
                }
            };
            results.push(result);
        }

        results
    }

    async fn run_pipeline(
        &self,
        agent: &dyn VerificationAgent,
        article: &Article,
        analysis: &PriorAnalysis,
        language: &str,
        hints: &ExtractedEntities,
    ) -> AgentResult {
        let kind = agent.kind();
        let queries = agent.generate_queries(article, analysis, language).await;
        let evidence = self.executor.execute(&queries, language).await;
        info!(agent = %kind, queries = queries.len(), evidence = evidence.len(), "evidence gathered");

        let hints = (!hints.is_empty()).then_some(hints);
        let evaluation = agent
            .evaluate(&queries, &evidence, language, hints, article)
            .await;

        AgentResult {
            agent: kind,
            queries,
            evaluation,
        }
    }
}

fn timed_out(kind: AgentKind, timeout_ms: u128) -> AgentResult {
    AgentResult {
        agent: kind,
        queries: Vec::new(),
        evaluation: Evaluation::unverifiable(format!("the {kind} agent timed out after {timeout_ms} ms")),
    }
}
