use std::fmt::Write as _;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::AgentKind;

/// Router state a trace event was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    Classifying,
    Dispatching,
    Aggregating,
}

impl TraceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStage::Classifying => "classifying",
            TraceStage::Dispatching => "dispatching",
            TraceStage::Aggregating => "aggregating",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub stage: TraceStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentKind>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl TraceEvent {
    pub fn new(stage: TraceStage, agent: Option<AgentKind>, message: impl Into<String>) -> Self {
        Self {
            stage,
            agent,
            message: message.into(),
            at: Utc::now(),
        }
    }

    fn label(&self) -> String {
        match self.agent {
            Some(agent) => format!("{}/{}", self.stage.as_str(), agent.as_str()),
            None => self.stage.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceCollector {
    events: Vec<TraceEvent>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, stage: TraceStage, message: impl Into<String>) {
        self.events.push(TraceEvent::new(stage, None, message));
    }

    pub fn record_agent(&mut self, stage: TraceStage, agent: AgentKind, message: impl Into<String>) {
        self.events.push(TraceEvent::new(stage, Some(agent), message));
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_events(&self.events)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub index: usize,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    pub steps: Vec<TraceStep>,
}

impl TraceSummary {
    pub fn from_events(events: &[TraceEvent]) -> Self {
        let steps = events
            .iter()
            .enumerate()
            .map(|(idx, event)| TraceStep {
                index: idx + 1,
                label: event.label(),
                message: event.message.clone(),
            })
            .collect();
        Self { steps }
    }

    pub fn render_markdown(&self) -> String {
        if self.steps.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Verification Trace\n");
        for step in &self.steps {
            let _ = writeln!(output, "{}. {} -> {}", step.index, step.label, step.message);
        }
        output
    }

    pub fn render_mermaid(&self) -> String {
        if self.steps.is_empty() {
            return "flowchart TD\n  %% no trace events captured".to_string();
        }

        let mut output = String::from("flowchart TD\n");
        for step in &self.steps {
            let label = sanitize_mermaid(&format!("{}: {}", step.label, step.message));
            let _ = writeln!(output, "  step{}[\"{label}\"]", step.index);
        }
        for idx in 1..self.steps.len() {
            let _ = writeln!(output, "  step{idx} --> step{}", idx + 1);
        }
        output
    }
}

fn sanitize_mermaid(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('[', "(")
        .replace(']', ")")
        .replace('\n', "<br/>")
}

/// Write a request's trace as pretty JSON to `<dir>/<request_id>.json`.
pub fn persist_trace<P: AsRef<Path>>(
    dir: P,
    request_id: &str,
    events: &[TraceEvent],
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    create_dir_all(dir)
        .with_context(|| format!("failed to create trace directory {}", dir.display()))?;
    let path = dir.join(format!("{request_id}.json"));
    let payload = serde_json::to_vec_pretty(events)?;
    let mut file = File::create(&path)
        .with_context(|| format!("failed to create trace file {}", path.display()))?;
    file.write_all(&payload)
        .with_context(|| format!("failed to write trace file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_renders_stage_and_agent_labels() {
        let mut collector = TraceCollector::new();
        collector.record(TraceStage::Classifying, "selected scientific, universal");
        collector.record_agent(TraceStage::Dispatching, AgentKind::Scientific, "confidence 8");

        let markdown = collector.summary().render_markdown();
        assert!(markdown.contains("1. classifying -> selected"));
        assert!(markdown.contains("2. dispatching/scientific -> confidence 8"));
    }

    #[test]
    fn mermaid_links_consecutive_steps() {
        let events = vec![
            TraceEvent::new(TraceStage::Classifying, None, "routing [fallback]"),
            TraceEvent::new(TraceStage::Aggregating, None, "collaborative"),
        ];
        let mermaid = TraceSummary::from_events(&events).render_mermaid();
        assert!(mermaid.contains("step1 --> step2"));
        assert!(mermaid.contains("(fallback)"));
    }

    #[test]
    fn persisted_trace_round_trips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let events = vec![TraceEvent::new(TraceStage::Aggregating, None, "done")];
        let path = persist_trace(dir.path(), "req-1", &events)?;
        let loaded: Vec<TraceEvent> = serde_json::from_slice(&std::fs::read(path)?)?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].stage, TraceStage::Aggregating);
        Ok(())
    }
}
