use serde::Serialize;
use tracing::debug;

use newscheck_core::{Article, Config, ConsolidatedVerdict, DynGenerator, DynSearch, NewsCheckError, PriorAnalysis, build_generator, build_search};

use crate::analyst::CriticalAnalyst;
use crate::router::DomainRouter;

/// What a caller gets back for one article.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub analysis: PriorAnalysis,
    pub verdict: ConsolidatedVerdict,
}

/// Critical analysis followed by routed verification.
pub struct NewsVerifier {
    analyst: CriticalAnalyst,
    router: DomainRouter,
}

impl NewsVerifier {
    pub fn new(generator: DynGenerator, search: DynSearch, config: &Config) -> Self {
        Self {
            analyst: CriticalAnalyst::new(generator.clone(), config.verification.analysis_max_tokens),
            router: DomainRouter::new(generator, search, config),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, NewsCheckError> {
        let generator = build_generator(config)?;
        let search = build_search(config)?;
        Ok(Self::new(generator, search, config))
    }

    /// A supplied analysis skips the analyst entirely.
    pub async fn verify(&self, article: &Article, analysis: Option<PriorAnalysis>) -> VerificationReport {
        let analysis = match analysis {
            Some(analysis) => {
                debug!("using supplied prior analysis");
                analysis
            }
            None => self.analyst.analyze(article, self.router.language()).await,
        };
        let verdict = self.router.verify(article, &analysis).await;
        VerificationReport { analysis, verdict }
    }
}
