use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{ModeId, QuestionId};

/// Integer percentage rounded half away from zero; 0 when `whole` is 0.
#[must_use]
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (part.saturating_mul(200) + whole) / (whole * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Why a session reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Termination {
    Completed,
    TimeLimit,
    MistakeLimit,
    EndedEarly,
}

/// Per-item scoring verdict.
///
/// `Incorrect` is a wrong pick, `Unconnected` is no pick at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unconnected,
}

impl Verdict {
    #[must_use]
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    #[must_use]
    pub fn is_correct(self) -> bool {
        self == Verdict::Correct
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub question_id: QuestionId,
    pub verdict: Verdict,
    /// Set when the item was built from a degraded statement whose truth
    /// does not follow the usual true/false convention.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inconsistent: bool,
}

impl ItemOutcome {
    #[must_use]
    pub fn new(question_id: QuestionId, verdict: Verdict) -> Self {
        Self {
            question_id,
            verdict,
            inconsistent: false,
        }
    }
}

/// Mode-specific extras carried alongside the common result fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModeSummary {
    MultipleChoice,
    #[serde(rename_all = "camelCase")]
    TrueFalse { inconsistent_items: usize },
    #[serde(rename_all = "camelCase")]
    Flashcard {
        known_cards: usize,
        pending_reviews: usize,
    },
    #[serde(rename_all = "camelCase")]
    Matching {
        stage_count: usize,
        stages_checked: usize,
        stage_mistakes: Vec<usize>,
    },
}

/// Finalized outcome of one session, produced exactly once by `finish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub mode_id: ModeId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_items: usize,
    pub answered_items: usize,
    pub correct_count: usize,
    pub mistake_count: usize,
    pub percentage: u32,
    pub elapsed_secs: u64,
    pub termination: Termination,
    pub per_item_outcomes: Vec<ItemOutcome>,
    pub summary: ModeSummary,
}

impl SessionResult {
    #[must_use]
    pub fn time_limit_reached(&self) -> bool {
        self.termination == Termination::TimeLimit
    }

    #[must_use]
    pub fn mistake_limit_reached(&self) -> bool {
        self.termination == Termination::MistakeLimit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn consistent_outcome_omits_flag_when_serialized() {
        let outcome = ItemOutcome::new(QuestionId::new(1), Verdict::Correct);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({ "questionId": 1, "verdict": "correct" }));
    }
}
