//! Specialized verification agents and the router that drives them.
//!
//! [`NewsVerifier`] is the usual entry point: it runs the [`CriticalAnalyst`]
//! when no prior analysis is supplied, then hands the article to the
//! [`DomainRouter`], whose `graph_flow` workflow classifies the article,
//! dispatches the chosen agents and aggregates their judgments.

pub mod agent;
pub mod analyst;
pub mod classifier;
pub mod dispatch;
pub mod economic;
pub mod entities;
pub mod political;
pub mod prompt;
pub mod roster;
pub mod router;
pub mod scientific;
pub mod study;
pub mod technological;
pub mod universal;
pub mod verifier;
pub mod workflow;

pub use agent::{AgentCore, AgentServices, TokenBudgets, VerificationAgent};
pub use analyst::CriticalAnalyst;
pub use classifier::Classifier;
pub use dispatch::Dispatcher;
pub use economic::EconomicAgent;
pub use political::PoliticalAgent;
pub use roster::AgentRoster;
pub use router::DomainRouter;
pub use scientific::{ScientificAgent, apply_quality_guard};
pub use study::{QualityBand, RedFlag, StudyAnalyzer, StudyAssessment, StudyLead, StudyRecord};
pub use technological::TechnologicalAgent;
pub use universal::UniversalAgent;
pub use verifier::{NewsVerifier, VerificationReport};
pub use workflow::VerificationGraph;
