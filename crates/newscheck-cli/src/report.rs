//! Human-readable rendering of a verification report.

use std::fmt::Write;

use newscheck_agents::VerificationReport;
use newscheck_core::{Evaluation, TraceSummary};

pub fn render_text(report: &VerificationReport) -> String {
    let verdict = &report.verdict;
    let mut out = String::new();

    let agents = verdict
        .agents_used
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Verdict ({}) via {agents}", verdict.domain);
    let _ = writeln!(
        out,
        "  confirmed: {}  confidence: {:.1}/10",
        if verdict.evaluation.confirmed { "yes" } else { "no" },
        verdict.evaluation.confidence
    );

    let routing = &verdict.routing_decision;
    let _ = writeln!(
        out,
        "  routing: {} (confidence {}/10){}",
        routing.rationale(),
        routing.confidence_level(),
        if routing.is_fallback() { " [fallback]" } else { "" }
    );
    if let Some(plausibility) = &report.analysis.plausibility {
        let _ = writeln!(out, "  prior plausibility: {plausibility}");
    }

    let _ = writeln!(out, "\nExplanation:\n{}", verdict.evaluation.explanation);
    write_section(&mut out, "Evidence for", &verdict.evaluation.evidence_for);
    write_section(&mut out, "Evidence against", &verdict.evaluation.evidence_against);
    write_section(&mut out, "Queries", &verdict.queries);

    if verdict.per_agent_results.len() > 1 {
        let _ = writeln!(out, "\nPer agent:");
        for result in &verdict.per_agent_results {
            let _ = writeln!(out, "  {:<14} {}", result.agent.as_str(), one_line(&result.evaluation));
        }
    }
    out
}

pub fn render_trace(report: &VerificationReport) -> String {
    TraceSummary::from_events(&report.verdict.trace).render_markdown()
}

fn write_section(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{label}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

fn one_line(evaluation: &Evaluation) -> String {
    format!(
        "confirmed={} confidence={:.1}",
        evaluation.confirmed, evaluation.confidence
    )
}
