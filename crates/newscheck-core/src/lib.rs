//! NewsCheck core: data model, collaborator contracts and the pure building
//! blocks of multi-agent news verification.
//!
//! The agents, the router and the `graph_flow` workflow live in
//! `newscheck-agents`; this crate holds everything they share.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
mod http;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod redact;
pub mod search;
pub mod stub;
pub mod telemetry;
pub mod trace;

pub use aggregate::{Combined, combine};
pub use config::{
    Config, ConfigLoader, LlmConfig, LlmProvider, LoggingConfig, PacingConfig, SearchConfig,
    SearchProvider, SecretValue, VerificationConfig, optional_env, require_env,
};
pub use error::{NewsCheckError, ServiceError};
pub use executor::{EvidenceBundle, EvidenceRecord, ExecutorSettings, NO_RESULTS_MARKER, SearchExecutor};
pub use http::RetryPolicy;
pub use llm::{DynGenerator, OllamaGenerator, OpenAiGenerator, TextGenerator, build_generator};
pub use model::{
    AgentKind, AgentResult, Article, ConsolidatedVerdict, Evaluation, ExtractedEntities,
    NEUTRAL_CONFIDENCE, PriorAnalysis, RoutingDecision, RoutingDraft, VerdictDomain,
};
pub use parser::{DEGRADED_MARKER, ParseStrategy, Parsed, QueryList, ResponseShape, parse_response, parse_structured};
pub use redact::redact_secrets;
pub use search::{
    DisabledSearch, DynSearch, ScrapingDogSearch, SearchFlavor, SearchHit, SearchService,
    SerpApiSearch, build_search,
};
pub use stub::{ScriptedGenerator, SearchCall, StubSearch};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use trace::{TraceCollector, TraceEvent, TraceStage, TraceSummary, persist_trace};
