//! Merge N independent agent judgments into one.

use crate::model::{AgentResult, Evaluation, VerdictDomain};

/// Merged queries and evaluation; the router attaches routing context on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub domain: VerdictDomain,
    pub queries: Vec<String>,
    pub evaluation: Evaluation,
}

/// Combine agent results.
///
/// A single result passes through untouched. Several results are merged with
/// every query, evidence entry and explanation tagged by agent, confidence as
/// the mean rounded to one decimal, and `confirmed` only on a strict majority.
pub fn combine(results: &[AgentResult]) -> Combined {
    match results {
        [] => Combined {
            domain: VerdictDomain::Collaborative,
            queries: Vec::new(),
            evaluation: Evaluation::unverifiable("no agent produced a result"),
        },
        [single] => Combined {
            domain: VerdictDomain::Agent(single.agent),
            queries: single.queries.clone(),
            evaluation: single.evaluation.clone(),
        },
        many => Combined {
            domain: VerdictDomain::Collaborative,
            queries: tag_all(many, |r| &r.queries),
            evaluation: merge(many),
        },
    }
}

fn merge(results: &[AgentResult]) -> Evaluation {
    let total = results.len();
    let confirmations = results.iter().filter(|r| r.evaluation.confirmed).count();
    let mean = results.iter().map(|r| r.evaluation.confidence).sum::<f64>() / total as f64;

    let explanation = results
        .iter()
        .map(|r| r.agent.tagged(&r.evaluation.explanation))
        .collect::<Vec<_>>()
        .join("\n");

    Evaluation {
        confirmed: confirmations * 2 > total,
        evidence_for: tag_all(results, |r| &r.evaluation.evidence_for),
        evidence_against: tag_all(results, |r| &r.evaluation.evidence_against),
        confidence: round_one_decimal(mean),
        explanation,
    }
}

fn tag_all<F>(results: &[AgentResult], items: F) -> Vec<String>
where
    F: Fn(&AgentResult) -> &Vec<String>,
{
    results
        .iter()
        .flat_map(|r| items(r).iter().map(move |item| r.agent.tagged(item)))
        .collect()
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentKind;

    fn result(agent: AgentKind, confirmed: bool, confidence: f64) -> AgentResult {
        AgentResult {
            agent,
            queries: vec![format!("{agent} query")],
            evaluation: Evaluation {
                confirmed,
                evidence_for: vec![format!("{agent} supports")],
                evidence_against: vec![format!("{agent} doubts")],
                confidence,
                explanation: format!("{agent} explanation"),
            },
        }
    }

    #[test]
    fn single_result_passes_through_untagged() {
        let only = result(AgentKind::Economic, true, 7.0);
        let combined = combine(std::slice::from_ref(&only));
        assert_eq!(combined.evaluation, only.evaluation);
        assert_eq!(combined.queries, only.queries);
        assert_eq!(combined.domain, VerdictDomain::Agent(AgentKind::Economic));
    }

    #[test]
    fn two_of_three_confirm() {
        let combined = combine(&[
            result(AgentKind::Scientific, true, 8.0),
            result(AgentKind::Universal, true, 7.0),
            result(AgentKind::Political, false, 4.0),
        ]);
        assert!(combined.evaluation.confirmed);
        assert_eq!(combined.evaluation.confidence, 6.3);
        assert_eq!(combined.domain, VerdictDomain::Collaborative);
    }

    #[test]
    fn one_of_two_is_a_tie_and_resolves_false() {
        let combined = combine(&[
            result(AgentKind::Scientific, true, 8.0),
            result(AgentKind::Universal, false, 5.0),
        ]);
        assert!(!combined.evaluation.confirmed);
        assert_eq!(combined.evaluation.confidence, 6.5);
    }

    #[test]
    fn merged_entries_are_tagged_in_agent_order() {
        let combined = combine(&[
            result(AgentKind::Scientific, true, 8.0),
            result(AgentKind::Universal, true, 6.0),
        ]);
        assert_eq!(
            combined.evaluation.evidence_for,
            vec![
                "[SCIENTIFIC] scientific supports".to_string(),
                "[UNIVERSAL] universal supports".to_string()
            ]
        );
        assert_eq!(combined.queries[0], "[SCIENTIFIC] scientific query");
        assert_eq!(
            combined.evaluation.explanation,
            "[SCIENTIFIC] scientific explanation\n[UNIVERSAL] universal explanation"
        );
    }

    #[test]
    fn mean_confidence_stays_within_bounds() {
        let confidences = [1.0, 10.0, 3.0, 7.0, 9.0];
        for window in 2..=3 {
            for start in 0..=confidences.len() - window {
                let results: Vec<AgentResult> = confidences[start..start + window]
                    .iter()
                    .zip(AgentKind::ALL)
                    .map(|(c, kind)| result(kind, false, *c))
                    .collect();
                let combined = combine(&results);
                let mean = confidences[start..start + window].iter().sum::<f64>() / window as f64;
                assert_eq!(combined.evaluation.confidence, round_one_decimal(mean));
                assert!((1.0..=10.0).contains(&combined.evaluation.confidence));
            }
        }
    }

    #[test]
    fn empty_input_is_unverifiable() {
        let combined = combine(&[]);
        assert!(!combined.evaluation.confirmed);
        assert!(combined.evaluation.explanation.contains("manual verification"));
    }
}
