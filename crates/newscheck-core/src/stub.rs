//! In-memory collaborators for tests and offline runs.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ServiceError;
use crate::llm::TextGenerator;
use crate::search::{SearchFlavor, SearchHit, SearchService};

enum ScriptedReply {
    Text(String),
    Fail(ServiceError),
    Delayed(Duration, String),
}

struct ScriptRule {
    needle: String,
    reply: ScriptedReply,
}

/// Generative double answering by prompt substring; first matching rule wins.
pub struct ScriptedGenerator {
    rules: Vec<ScriptRule>,
    default_reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push(ScriptRule {
            needle: needle.into(),
            reply: ScriptedReply::Text(reply.into()),
        });
        self
    }

    pub fn fail_on(mut self, needle: impl Into<String>, error: ServiceError) -> Self {
        self.rules.push(ScriptRule {
            needle: needle.into(),
            reply: ScriptedReply::Fail(error),
        });
        self
    }

    /// Reply only after `delay`; used to exercise timeouts.
    pub fn slow_on(mut self, needle: impl Into<String>, delay: Duration, reply: impl Into<String>) -> Self {
        self.rules.push(ScriptRule {
            needle: needle.into(),
            reply: ScriptedReply::Delayed(delay, reply.into()),
        });
        self
    }

    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Every prompt received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ServiceError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let rule = self.rules.iter().find(|rule| prompt.contains(&rule.needle));
        match rule.map(|rule| &rule.reply) {
            Some(ScriptedReply::Text(text)) => Ok(text.clone()),
            Some(ScriptedReply::Fail(err)) => Err(err.clone()),
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| ServiceError::invalid_response(self.name(), "no scripted reply")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub flavor: SearchFlavor,
    pub count: usize,
}

/// Search double returning canned hits for queries containing a needle.
pub struct StubSearch {
    hits: DashMap<(String, Option<SearchFlavor>), Vec<SearchHit>>,
    failures: DashMap<String, ()>,
    calls: Mutex<Vec<SearchCall>>,
}

impl Default for StubSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl StubSearch {
    pub fn new() -> Self {
        Self {
            hits: DashMap::new(),
            failures: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hits for any flavor of search whose query contains `needle` (case-insensitive).
    pub fn with_hits(self, needle: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert((needle.to_lowercase(), None), hits);
        self
    }

    pub fn with_flavored_hits(self, needle: &str, flavor: SearchFlavor, hits: Vec<SearchHit>) -> Self {
        self.hits.insert((needle.to_lowercase(), Some(flavor)), hits);
        self
    }

    pub fn fail_on(self, needle: &str) -> Self {
        self.failures.insert(needle.to_lowercase(), ());
        self
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SearchService for StubSearch {
    async fn search(
        &self,
        query: &str,
        _language: &str,
        count: usize,
        flavor: SearchFlavor,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SearchCall {
                query: query.to_string(),
                flavor,
                count,
            });

        let lowered = query.to_lowercase();
        if self.failures.iter().any(|entry| lowered.contains(entry.key().as_str())) {
            return Err(ServiceError::communication(self.name(), format!("scripted failure for `{query}`")));
        }

        let mut matches: Vec<(String, Vec<SearchHit>)> = self
            .hits
            .iter()
            .filter(|entry| {
                let (needle, wanted) = entry.key();
                lowered.contains(needle.as_str()) && wanted.is_none_or(|f| f == flavor)
            })
            .map(|entry| (entry.key().0.clone(), entry.value().clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hits: Vec<SearchHit> = Vec::new();
        for hit in matches.into_iter().flat_map(|(_, hits)| hits) {
            if !hits.iter().any(|existing| existing.title == hit.title) {
                hits.push(hit);
            }
        }
        hits.truncate(count);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "stub-search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_generator_matches_first_rule() {
        let generator = ScriptedGenerator::new()
            .on("[task:route]", "route reply")
            .on("[task:", "generic reply")
            .fail_on("boom", ServiceError::communication("scripted", "down"));

        assert_eq!(generator.generate("[task:route] x", 10).await.expect("reply"), "route reply");
        assert_eq!(generator.generate("[task:other]", 10).await.expect("reply"), "generic reply");
        assert!(generator.generate("boom", 10).await.is_err());
        assert!(generator.generate("unmatched", 10).await.is_err());
        assert_eq!(generator.prompts().len(), 4);
    }

    #[tokio::test]
    async fn stub_search_filters_by_needle_and_flavor() {
        let search = StubSearch::new()
            .with_flavored_hits("vaccine", SearchFlavor::News, vec![SearchHit::new("News hit", "n")])
            .with_hits("vaccine", vec![SearchHit::new("Any hit", "a")])
            .fail_on("broken");

        let news = search.search("Vaccine trial", "en", 5, SearchFlavor::News).await.expect("news");
        assert_eq!(news.len(), 2);
        let general = search.search("vaccine trial", "en", 5, SearchFlavor::General).await.expect("general");
        assert_eq!(general, vec![SearchHit::new("Any hit", "a")]);
        assert!(search.search("broken query", "en", 5, SearchFlavor::News).await.is_err());
        assert_eq!(search.calls().len(), 3);
    }
}
