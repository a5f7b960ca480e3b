//! The router's three states as a `graph_flow` graph:
//! `classify -> dispatch -> aggregate`, one in-memory session per request.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use graph_flow::{
    Context, ExecutionStatus, FlowRunner, Graph, GraphBuilder, GraphError, InMemorySessionStorage,
    NextAction, Session, SessionStorage, Task, TaskResult,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use newscheck_core::{
    AgentResult, Article, ConsolidatedVerdict, PriorAnalysis, RoutingDecision, TraceCollector,
    TraceStage, combine,
};

use crate::classifier::Classifier;
use crate::dispatch::Dispatcher;

pub const ARTICLE_KEY: &str = "article";
pub const ANALYSIS_KEY: &str = "analysis";
pub const LANGUAGE_KEY: &str = "language";
pub const DECISION_KEY: &str = "routing.decision";
pub const RESULTS_KEY: &str = "dispatch.results";
pub const TRACE_KEY: &str = "trace";
pub const VERDICT_KEY: &str = "verdict";

async fn require<T: DeserializeOwned>(context: &Context, key: &str) -> graph_flow::Result<T> {
    context
        .get(key)
        .await
        .ok_or_else(|| GraphError::TaskExecutionFailed(format!("session context is missing `{key}`")))
}

pub struct ClassifyTask {
    classifier: Arc<Classifier>,
}

#[async_trait]
impl Task for ClassifyTask {
    fn id(&self) -> &str {
        "classify"
    }

    #[instrument(name = "task.classify", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let article: Article = require(&context, ARTICLE_KEY).await?;
        let analysis: PriorAnalysis = context.get(ANALYSIS_KEY).await.unwrap_or_default();

        let mut trace = TraceCollector::new();
        trace.record(TraceStage::Classifying, format!("classifying \"{}\"", article.title));

        let decision = self.classifier.classify(&article, &analysis).await;
        let chosen = decision
            .chosen_agents()
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let message = if decision.is_fallback() {
            format!("fallback routing to {chosen}: {}", decision.rationale())
        } else {
            format!("routed to {chosen} (confidence {})", decision.confidence_level())
        };
        trace.record(TraceStage::Classifying, message);

        context.set(DECISION_KEY, &decision).await;
        context.set(TRACE_KEY, &trace).await;

        Ok(TaskResult::new(
            Some(format!("Routed to {chosen}")),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct DispatchTask {
    dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl Task for DispatchTask {
    fn id(&self) -> &str {
        "dispatch"
    }

    #[instrument(name = "task.dispatch", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let article: Article = require(&context, ARTICLE_KEY).await?;
        let decision: RoutingDecision = require(&context, DECISION_KEY).await?;
        let analysis: PriorAnalysis = context.get(ANALYSIS_KEY).await.unwrap_or_default();
        let language: String = require(&context, LANGUAGE_KEY).await?;
        let mut trace: TraceCollector = context.get(TRACE_KEY).await.unwrap_or_default();

        let results = self
            .dispatcher
            .dispatch(&decision, &article, &analysis, &language, &mut trace)
            .await;

        debug!(results = results.len(), "dispatch populated context");
        context.set(RESULTS_KEY, &results).await;
        context.set(TRACE_KEY, &trace).await;

        Ok(TaskResult::new(
            Some(format!("{} agent results", results.len())),
            NextAction::ContinueAndExecute,
        ))
    }
}

#[derive(Default)]
pub struct AggregateTask;

#[async_trait]
impl Task for AggregateTask {
    fn id(&self) -> &str {
        "aggregate"
    }

    #[instrument(name = "task.aggregate", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let decision: RoutingDecision = require(&context, DECISION_KEY).await?;
        let results: Vec<AgentResult> = context.get(RESULTS_KEY).await.unwrap_or_default();
        let mut trace: TraceCollector = context.get(TRACE_KEY).await.unwrap_or_default();

        let combined = combine(&results);
        trace.record(
            TraceStage::Aggregating,
            format!(
                "combined {} results into {}: confirmed={} confidence={}",
                results.len(),
                combined.domain,
                combined.evaluation.confirmed,
                combined.evaluation.confidence
            ),
        );

        let verdict = ConsolidatedVerdict {
            domain: combined.domain,
            agents_used: results.iter().map(|r| r.agent).collect(),
            queries: combined.queries,
            evaluation: combined.evaluation,
            per_agent_results: results,
            routing_decision: decision,
            trace: trace.into_events(),
            generated_at: Utc::now(),
        };

        info!(
            domain = %verdict.domain,
            confirmed = verdict.evaluation.confirmed,
            confidence = verdict.evaluation.confidence,
            "verdict ready"
        );
        context.set(VERDICT_KEY, &verdict).await;

        Ok(TaskResult::new(
            Some(format!("Verdict: {}", verdict.domain)),
            NextAction::End,
        ))
    }
}

/// Built once per router; every request runs in a fresh session.
pub struct VerificationGraph {
    graph: Arc<Graph>,
    start_task: String,
}

impl VerificationGraph {
    pub fn new(classifier: Arc<Classifier>, dispatcher: Arc<Dispatcher>) -> Self {
        let classify = Arc::new(ClassifyTask { classifier });
        let dispatch = Arc::new(DispatchTask { dispatcher });
        let aggregate = Arc::new(AggregateTask);

        let graph = GraphBuilder::new("newscheck_router")
            .add_task(classify.clone())
            .add_task(dispatch.clone())
            .add_task(aggregate.clone())
            .add_edge(classify.id(), dispatch.id())
            .add_edge(dispatch.id(), aggregate.id())
            .set_start_task(classify.id())
            .build();

        Self {
            graph: Arc::new(graph),
            start_task: classify.id().to_string(),
        }
    }

    pub async fn run(
        &self,
        article: &Article,
        analysis: &PriorAnalysis,
        language: &str,
    ) -> Result<ConsolidatedVerdict> {
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(self.graph.clone(), storage.clone());

        let session_id = format!("verify-{}", Uuid::new_v4());
        let session = Session::new_from_task(session_id.clone(), &self.start_task);
        session.context.set(ARTICLE_KEY, article).await;
        session.context.set(ANALYSIS_KEY, analysis).await;
        session.context.set(LANGUAGE_KEY, language).await;

        storage
            .save(session)
            .await
            .map_err(|err| anyhow!("failed to persist session: {err}"))?;

        loop {
            let result = runner
                .run(&session_id)
                .await
                .map_err(|err| anyhow!("graph execution failure: {err}"))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::WaitingForInput => continue,
                ExecutionStatus::Error(message) => return Err(anyhow!(message)),
            }
        }

        let session = storage
            .get(&session_id)
            .await
            .map_err(|err| anyhow!("failed to reload session: {err}"))?
            .ok_or_else(|| anyhow!("session missing after execution"))?;

        session
            .context
            .get(VERDICT_KEY)
            .await
            .ok_or_else(|| anyhow!("workflow finished without a verdict"))
    }
}
