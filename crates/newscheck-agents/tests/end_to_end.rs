use std::sync::Arc;
use std::time::Duration;

use newscheck_agents::prompt::{ANALYSIS_HEADER, ROUTE_HEADER, evaluate_header, queries_header};
use newscheck_agents::{DomainRouter, NewsVerifier};
use newscheck_core::{
    AgentKind, Article, Config, PriorAnalysis, RoutingDecision, ScriptedGenerator, SearchFlavor,
    SearchHit, StubSearch, TraceStage, VerdictDomain,
};

fn test_config(agent_timeout_ms: u64) -> Config {
    let mut config = Config::default();
    config.verification.language = "en".to_string();
    config.verification.agent_timeout_ms = agent_timeout_ms;
    config.pacing.between_calls_ms = 0;
    config.pacing.between_queries_ms = 0;
    config
}

fn evaluation_json(confirmed: bool, confidence: u8, explanation: &str) -> String {
    format!(
        r#"{{"confirmed": {confirmed}, "evidence_for": ["coverage found"], "evidence_against": [], "confidence": {confidence}, "explanation": "{explanation}"}}"#
    )
}

fn vaccine_article() -> Article {
    Article::new(
        "Malaria vaccine XR-7 cuts infections by 78%",
        "A study on the XR-7 malaria vaccine by Maria Rossi was published in The Lancet last week. The phase 3 trial enrolled 4000 participants.",
    )
    .with_source("Health Daily")
    .with_date("2025-03-02")
}

fn reviewed_trial_hit() -> SearchHit {
    SearchHit::new(
        "Efficacy of the XR-7 malaria vaccine: a randomized controlled trial",
        "Abstract: peer-reviewed phase 3 trial in The Lancet. Methods: double-blind, 4000 participants. Results: 78% efficacy. Conclusions: protective. doi:10.1016/S0140-6736(24)00001-1",
    )
    .with_source("The Lancet")
    .with_link("https://example.org/lancet/xr7")
}

fn reconstruction_article() -> Article {
    Article::new(
        "Shroud face reconstructed in 3D proves authenticity",
        "A study on the Shroud of Turin face by Giulio Fanti claims the image is authentic, based on a 3D reconstruction.",
    )
    .with_source("Weekly Wonders")
}

fn reconstruction_hit() -> SearchHit {
    SearchHit::new(
        "Shroud face obtained by 3D reconstruction",
        "Preprint, not peer-reviewed. Results of a 3D reconstruction made with free software (Blender) from photographs, with no direct access to the cloth.",
    )
    .with_source("personal blog")
}

#[tokio::test]
async fn peer_reviewed_trial_is_confirmed_with_high_confidence() {
    let generator = ScriptedGenerator::new()
        .on(
            ANALYSIS_HEADER,
            r#"{"plausibility": "high", "suspicious_points": [], "credibility": 7}"#,
        )
        .on(
            ROUTE_HEADER,
            r#"{"agents": ["scientific", "universal"], "rationale": "clinical trial news", "confidence_level": 8}"#,
        )
        .on(queries_header(AgentKind::Scientific), r#"["XR-7 malaria vaccine Lancet trial"]"#)
        .on(queries_header(AgentKind::Universal), r#"["XR-7 malaria vaccine"]"#)
        .on(
            evaluate_header(AgentKind::Scientific),
            evaluation_json(true, 9, "Peer-reviewed trial in The Lancet."),
        )
        .on(
            evaluate_header(AgentKind::Universal),
            evaluation_json(true, 8, "Widely and consistently reported."),
        );
    let search = StubSearch::new()
        .with_flavored_hits("maria rossi", SearchFlavor::General, vec![reviewed_trial_hit()])
        .with_hits(
            "xr-7",
            vec![
                SearchHit::new("XR-7 vaccine approved for trials", "Health agencies welcome results")
                    .with_source("Reuters"),
            ],
        );

    let verifier = NewsVerifier::new(Arc::new(generator), Arc::new(search), &test_config(5_000));
    let report = verifier.verify(&vaccine_article(), None).await;

    assert_eq!(report.analysis.credibility, Some(7));

    let verdict = report.verdict;
    assert_eq!(verdict.domain, VerdictDomain::Collaborative);
    assert_eq!(verdict.agents_used, vec![AgentKind::Scientific, AgentKind::Universal]);
    assert!(!verdict.routing_decision.is_fallback());
    assert!(verdict.evaluation.confirmed);
    assert!(verdict.evaluation.confidence >= 7.0);
    assert_eq!(verdict.evaluation.confidence, 8.5);
    assert!(verdict.queries.iter().all(|q| q.starts_with('[')));

    let scientific = &verdict.per_agent_results[0];
    assert_eq!(scientific.agent, AgentKind::Scientific);
    assert!(scientific.evaluation.confirmed);
    assert_eq!(scientific.evaluation.confidence, 9.0);
}

#[tokio::test]
async fn unreviewed_reconstruction_cannot_be_confirmed() {
    let generator = ScriptedGenerator::new()
        .on(
            ROUTE_HEADER,
            r#"{"agents": ["scientific", "universal"], "rationale": "scientific claim", "confidence_level": 7}"#,
        )
        .on(queries_header(AgentKind::Scientific), r#"["Shroud 3D reconstruction study"]"#)
        .on(queries_header(AgentKind::Universal), r#"["Shroud face 3D"]"#)
        .on(
            evaluate_header(AgentKind::Scientific),
            evaluation_json(true, 8, "Many outlets covered the reconstruction."),
        )
        .on(
            evaluate_header(AgentKind::Universal),
            evaluation_json(true, 7, "Story is widely reported."),
        );
    let search = StubSearch::new()
        .with_flavored_hits("giulio fanti", SearchFlavor::General, vec![reconstruction_hit()])
        .with_hits(
            "shroud",
            vec![SearchHit::new("Shroud face revealed", "A viral 3D image").with_source("Daily Buzz")],
        );

    let router = DomainRouter::new(Arc::new(generator), Arc::new(search), &test_config(5_000));
    let verdict = router
        .verify(&reconstruction_article(), &PriorAnalysis::neutral(None))
        .await;

    let scientific = verdict
        .per_agent_results
        .iter()
        .find(|result| result.agent == AgentKind::Scientific)
        .expect("scientific agent ran");
    assert!(!scientific.evaluation.confirmed);
    assert!(scientific.evaluation.confidence <= 4.0);
    assert!(
        scientific
            .evaluation
            .evidence_against
            .iter()
            .any(|item| item.starts_with("study quality:"))
    );

    assert!(!verdict.evaluation.confirmed);
}

#[tokio::test]
async fn timed_out_agent_degrades_while_the_other_completes() {
    let generator = ScriptedGenerator::new()
        .on(
            ROUTE_HEADER,
            r#"{"agents": ["political", "universal"], "rationale": "government statement"}"#,
        )
        .slow_on(
            queries_header(AgentKind::Political),
            Duration::from_millis(500),
            r#"["minister statement"]"#,
        )
        .on(queries_header(AgentKind::Universal), r#"["pension reform"]"#)
        .on(
            evaluate_header(AgentKind::Universal),
            evaluation_json(true, 8, "Confirmed by national press."),
        );

    let router = DomainRouter::new(Arc::new(generator), Arc::new(StubSearch::new()), &test_config(50));
    let article = Article::new("Minister announces pension reform", "The minister spoke in parliament.");
    let verdict = router.verify(&article, &PriorAnalysis::default()).await;

    assert_eq!(verdict.per_agent_results.len(), 2);
    let political = &verdict.per_agent_results[0];
    assert_eq!(political.agent, AgentKind::Political);
    assert!(political.queries.is_empty());
    assert!(!political.evaluation.confirmed);
    assert_eq!(political.evaluation.confidence, 5.0);

    let universal = &verdict.per_agent_results[1];
    assert!(universal.evaluation.confirmed);

    // one of two confirmations is not a majority
    assert!(!verdict.evaluation.confirmed);
    assert_eq!(verdict.evaluation.confidence, 6.5);
    assert!(
        verdict
            .trace
            .iter()
            .any(|event| event.agent == Some(AgentKind::Political) && event.message.contains("timed out"))
    );
}

#[tokio::test]
async fn unreachable_collaborators_still_produce_a_verdict() {
    let search = Arc::new(StubSearch::new());
    let verifier = NewsVerifier::new(Arc::new(ScriptedGenerator::new()), search.clone(), &test_config(5_000));

    let report = verifier
        .verify(&Article::new("Something happened", "Details are scarce."), None)
        .await;

    assert_eq!(report.analysis, PriorAnalysis::neutral(None));
    let verdict = report.verdict;
    assert!(verdict.routing_decision.is_fallback());
    assert_eq!(verdict.agents_used, RoutingDecision::FALLBACK_PAIR.to_vec());
    assert!(!verdict.evaluation.confirmed);
    assert_eq!(verdict.evaluation.confidence, 5.0);

    // template queries were still searched
    assert!(!search.calls().is_empty());
    for result in &verdict.per_agent_results {
        assert!(!result.queries.is_empty());
    }

    let stages: Vec<TraceStage> = verdict.trace.iter().map(|event| event.stage).collect();
    assert_eq!(stages.first(), Some(&TraceStage::Classifying));
    assert_eq!(stages.last(), Some(&TraceStage::Aggregating));
    assert!(stages.contains(&TraceStage::Dispatching));
}
