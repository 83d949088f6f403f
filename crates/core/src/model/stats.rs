use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::result::{ItemOutcome, Verdict};

/// Cumulative per-question tally for one bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStat {
    pub attempts: u64,
    pub correct: u64,
    pub incorrect: u64,
}

impl QuestionStat {
    pub fn record(&mut self, verdict: Verdict) {
        self.attempts += 1;
        if verdict.is_correct() {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
    }
}

/// Per-question tallies keyed by question id.
pub type QuestionStats = BTreeMap<QuestionId, QuestionStat>;

/// Folds session outcomes into `stats`.
pub fn fold_outcomes(stats: &mut QuestionStats, outcomes: &[ItemOutcome]) {
    for outcome in outcomes {
        stats.entry(outcome.question_id).or_default().record(outcome.verdict);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconnected_counts_as_incorrect() {
        let mut stats = QuestionStats::new();
        fold_outcomes(
            &mut stats,
            &[
                ItemOutcome::new(QuestionId::new(1), Verdict::Correct),
                ItemOutcome::new(QuestionId::new(1), Verdict::Unconnected),
                ItemOutcome::new(QuestionId::new(2), Verdict::Incorrect),
            ],
        );
        assert_eq!(
            stats[&QuestionId::new(1)],
            QuestionStat {
                attempts: 2,
                correct: 1,
                incorrect: 1
            }
        );
        assert_eq!(stats[&QuestionId::new(2)].incorrect, 1);
    }

    #[test]
    fn stats_map_round_trips_through_json() {
        let mut stats = QuestionStats::new();
        stats.insert(QuestionId::new(10), QuestionStat::default());
        let text = serde_json::to_string(&stats).unwrap();
        assert_eq!(text, r#"{"10":{"attempts":0,"correct":0,"incorrect":0}}"#);
        let back: QuestionStats = serde_json::from_str(&text).unwrap();
        assert_eq!(back, stats);
    }
}
