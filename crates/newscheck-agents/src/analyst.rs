//! Critical analysis of an article before any search is run.

use tracing::{info, instrument, warn};

use newscheck_core::metrics::record_degraded_parse;
use newscheck_core::{Article, DynGenerator, PriorAnalysis, ResponseShape, parse_response, redact_secrets};

use crate::prompt;

pub struct CriticalAnalyst {
    generator: DynGenerator,
    max_tokens: u32,
}

impl CriticalAnalyst {
    pub fn new(generator: DynGenerator, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// Never fails; an unreachable generator yields the neutral analysis.
    #[instrument(name = "analyst.analyze", skip(self, article), fields(title = %article.title))]
    pub async fn analyze(&self, article: &Article, language: &str) -> PriorAnalysis {
        let prompt = prompt::analysis_prompt(article, language);
        let reply = match self.generator.generate(&prompt, self.max_tokens).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %redact_secrets(&err.to_string()), "critical analysis unavailable");
                return PriorAnalysis::neutral(None);
            }
        };

        let parsed = parse_response::<PriorAnalysis>(&reply);
        if parsed.strategy.is_degraded() {
            record_degraded_parse(PriorAnalysis::LABEL);
        }
        info!(
            strategy = %parsed.strategy,
            credibility = parsed.value.credibility,
            "critical analysis ready"
        );
        parsed.value
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use newscheck_core::{ScriptedGenerator, ServiceError};

    use super::*;

    fn article() -> Article {
        Article::new("Moon base announced", "A private company claims a base on the Moon by 2027.")
    }

    #[tokio::test]
    async fn structured_reply_becomes_the_analysis() {
        let generator = ScriptedGenerator::new().on(
            prompt::ANALYSIS_HEADER,
            r#"{"plausibility": "low", "suspicious_points": ["no launch contract"], "credibility": 3}"#,
        );
        let analyst = CriticalAnalyst::new(Arc::new(generator), 500);

        let analysis = analyst.analyze(&article(), "en").await;
        assert_eq!(analysis.plausibility.as_deref(), Some("low"));
        assert_eq!(analysis.suspicious_points, vec!["no launch contract".to_string()]);
        assert_eq!(analysis.credibility, Some(3));
    }

    #[tokio::test]
    async fn service_failure_yields_the_neutral_analysis() {
        let generator = ScriptedGenerator::new().fail_on(
            prompt::ANALYSIS_HEADER,
            ServiceError::communication("llm", "connection refused"),
        );
        let analyst = CriticalAnalyst::new(Arc::new(generator), 500);

        let analysis = analyst.analyze(&article(), "it").await;
        assert_eq!(analysis, PriorAnalysis::neutral(None));
    }

    #[tokio::test]
    async fn prose_reply_is_kept_as_raw_text() {
        let generator =
            ScriptedGenerator::new().on(prompt::ANALYSIS_HEADER, "Seems unlikely, no sources cited.");
        let analyst = CriticalAnalyst::new(Arc::new(generator), 500);

        let analysis = analyst.analyze(&article(), "en").await;
        assert_eq!(analysis.credibility, Some(5));
        assert_eq!(analysis.raw.as_deref(), Some("Seems unlikely, no sources cited."));
    }
}
