//! Search executor: queries in, capped evidence bundle out.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{PacingConfig, SearchConfig};
use crate::redact::redact_secrets;
use crate::search::{DynSearch, SearchFlavor, SearchHit};

/// Marker sent to evaluation prompts when no evidence was gathered.
pub const NO_RESULTS_MARKER: &str = "No results found for the generated queries.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub title: String,
    pub snippet: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl From<SearchHit> for EvidenceRecord {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.title,
            snippet: hit.snippet,
            source: hit.source,
            date: hit.date,
        }
    }
}

/// Ephemeral, capped evidence gathered for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    records: Vec<EvidenceRecord>,
    snippet_chars: usize,
}

impl EvidenceBundle {
    pub fn new(records: Vec<EvidenceRecord>, snippet_chars: usize) -> Self {
        Self {
            records,
            snippet_chars,
        }
    }

    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize for an evaluation prompt; never empty.
    pub fn to_prompt_text(&self) -> String {
        if self.records.is_empty() {
            return NO_RESULTS_MARKER.to_string();
        }

        let mut out = String::new();
        for record in &self.records {
            let _ = writeln!(out, "Title: {}", record.title);
            let _ = writeln!(out, "Source: {}", non_blank(&record.source, "unknown"));
            let _ = writeln!(out, "Content: {}", truncate_chars(&record.snippet, self.snippet_chars));
            if let Some(date) = record.date.as_deref().filter(|d| !d.trim().is_empty()) {
                let _ = writeln!(out, "Date: {date}");
            }
            out.push_str("---\n");
        }
        out
    }
}

fn non_blank<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

/// Truncate to `max` characters on a char boundary, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub max_queries: usize,
    pub news_per_query: usize,
    pub general_per_query: usize,
    pub max_results: usize,
    pub snippet_chars: usize,
    pub pacing: PacingConfig,
}

impl ExecutorSettings {
    pub fn from_config(search: &SearchConfig, pacing: &PacingConfig) -> Self {
        Self {
            max_queries: search.max_queries,
            news_per_query: search.news_per_query,
            general_per_query: search.general_per_query,
            max_results: search.max_results,
            snippet_chars: search.snippet_chars,
            pacing: pacing.clone(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default(), &PacingConfig::default())
    }
}

/// Sequential search runner. One call at a time, paced, failures swallowed.
#[derive(Clone)]
pub struct SearchExecutor {
    search: DynSearch,
    settings: ExecutorSettings,
}

impl SearchExecutor {
    pub fn new(search: DynSearch, settings: ExecutorSettings) -> Self {
        Self { search, settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run a news then a general search for each of the first `max_queries`
    /// queries and collect up to `max_results` records.
    pub async fn execute(&self, queries: &[String], language: &str) -> EvidenceBundle {
        let mut records: Vec<EvidenceRecord> = Vec::new();
        let selected = queries.iter().take(self.settings.max_queries).enumerate();

        for (idx, query) in selected {
            if idx > 0 {
                pause(self.settings.pacing.between_queries()).await;
            }

            let news = self
                .run_one(query, language, self.settings.news_per_query, SearchFlavor::News)
                .await;
            push_unique(&mut records, news);

            pause(self.settings.pacing.between_calls()).await;

            let general = self
                .run_one(query, language, self.settings.general_per_query, SearchFlavor::General)
                .await;
            push_unique(&mut records, general);
        }

        let gathered = records.len();
        records.truncate(self.settings.max_results);
        debug!(gathered, kept = records.len(), "evidence bundle assembled");
        EvidenceBundle::new(records, self.settings.snippet_chars)
    }

    async fn run_one(
        &self,
        query: &str,
        language: &str,
        count: usize,
        flavor: SearchFlavor,
    ) -> Vec<EvidenceRecord> {
        if count == 0 {
            return Vec::new();
        }
        match self.search.search(query, language, count, flavor).await {
            Ok(hits) => hits.into_iter().take(count).map(EvidenceRecord::from).collect(),
            Err(err) => {
                warn!(
                    service = self.search.name(),
                    %flavor,
                    query,
                    error = %redact_secrets(&err.to_string()),
                    "search call failed; continuing"
                );
                Vec::new()
            }
        }
    }
}

fn push_unique(records: &mut Vec<EvidenceRecord>, incoming: Vec<EvidenceRecord>) {
    for record in incoming {
        let duplicate = records
            .iter()
            .any(|existing| existing.title == record.title && existing.source == record.source);
        if !duplicate {
            records.push(record);
        }
    }
}

async fn pause(duration: std::time::Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubSearch;
    use std::sync::Arc;

    fn settings(max_queries: usize) -> ExecutorSettings {
        ExecutorSettings {
            max_queries,
            pacing: PacingConfig::none(),
            ..ExecutorSettings::default()
        }
    }

    #[tokio::test]
    async fn a_failing_query_does_not_stop_the_others() {
        let search = Arc::new(
            StubSearch::new()
                .with_hits("alpha", vec![SearchHit::new("Alpha result", "a").with_source("A")])
                .with_hits("gamma", vec![SearchHit::new("Gamma result", "g").with_source("G")])
                .fail_on("beta"),
        );
        let executor = SearchExecutor::new(search.clone(), settings(3));
        let queries = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];

        let bundle = executor.execute(&queries, "en").await;

        let titles: Vec<&str> = bundle.records().iter().map(|r| r.title.as_str()).collect();
        assert!(titles.contains(&"Alpha result"));
        assert!(titles.contains(&"Gamma result"));
        assert_eq!(search.calls().len(), 6);
    }

    #[tokio::test]
    async fn only_the_first_queries_are_searched_by_default() {
        let search = Arc::new(StubSearch::new());
        let executor = SearchExecutor::new(search.clone(), settings(2));
        let queries: Vec<String> = (0..5).map(|i| format!("query {i}")).collect();

        let bundle = executor.execute(&queries, "it").await;

        assert!(bundle.is_empty());
        assert_eq!(bundle.to_prompt_text(), NO_RESULTS_MARKER);
        let calls = search.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].flavor, SearchFlavor::News);
        assert_eq!(calls[0].count, 2);
        assert_eq!(calls[1].flavor, SearchFlavor::General);
        assert_eq!(calls[1].count, 1);
    }

    #[tokio::test]
    async fn results_are_capped() {
        let hits: Vec<SearchHit> = (0..10).map(|i| SearchHit::new(format!("hit {i}"), "s")).collect();
        let search = Arc::new(StubSearch::new().with_hits("q", hits));
        let mut settings = settings(5);
        settings.news_per_query = 10;
        let executor = SearchExecutor::new(search, settings);
        let queries: Vec<String> = (0..5).map(|i| format!("q{i}")).collect();

        let bundle = executor.execute(&queries, "en").await;

        assert_eq!(bundle.len(), 6);
    }

    #[test]
    fn prompt_text_truncates_snippets_on_char_boundaries() {
        let record = EvidenceRecord {
            title: "T".into(),
            snippet: "è".repeat(250),
            source: String::new(),
            date: Some("2024-05-01".into()),
        };
        let text = EvidenceBundle::new(vec![record], 200).to_prompt_text();
        assert!(text.contains("Source: unknown"));
        assert!(text.contains(&format!("Content: {}...", "è".repeat(200))));
        assert!(text.contains("Date: 2024-05-01"));
        assert!(text.ends_with("---\n"));
    }
}
