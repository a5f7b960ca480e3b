use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::model::AgentKind;

struct RouterMetrics {
    agent_runs: Counter<u64>,
    agent_duration_ms: Histogram<f64>,
    routing_decisions: Counter<u64>,
    degraded_parses: Counter<u64>,
}

static METRICS: OnceCell<RouterMetrics> = OnceCell::new();

fn handles() -> &'static RouterMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("newscheck.router");
        RouterMetrics {
            agent_runs: meter
                .u64_counter("agent_runs_total")
                .with_description("Verification agent runs by kind and outcome")
                .init(),
            agent_duration_ms: meter
                .f64_histogram("agent_duration_ms")
                .with_description("Verification agent pipeline runtime in milliseconds")
                .init(),
            routing_decisions: meter
                .u64_counter("routing_decisions_total")
                .with_description("Routing decisions, split by whether the fallback pair was used")
                .init(),
            degraded_parses: meter
                .u64_counter("degraded_parses_total")
                .with_description("Generative replies only recoverable through degraded parsing")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) {
    if std::env::var("NEWSCHECK_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "NEWSCHECK_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export router metrics."
        );
    }
}

/// Record one agent pipeline run (no-op if no provider installed).
pub fn record_agent_run(agent: AgentKind, outcome: &str, duration_ms: u64) {
    let metrics = handles();
    let attrs = [
        KeyValue::new("agent", agent.as_str()),
        KeyValue::new("outcome", outcome.to_string()),
    ];
    metrics.agent_runs.add(1, &attrs);
    metrics.agent_duration_ms.record(duration_ms as f64, &attrs);
}

pub fn record_routing(fallback: bool, agents: usize) {
    let attrs = [
        KeyValue::new("fallback", fallback),
        KeyValue::new("agents", agents as i64),
    ];
    handles().routing_decisions.add(1, &attrs);
}

pub fn record_degraded_parse(shape: &'static str) {
    handles()
        .degraded_parses
        .add(1, &[KeyValue::new("shape", shape)]);
}
