use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::model::{ModeId, Question};

//
// ─── RAW OPTIONS ───────────────────────────────────────────────────────────────
//

/// Raw setup input. Every field is optional; each mode fills its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    pub question_count: Option<u32>,
    /// `None` selects every category; `Some(vec![])` is a setup error.
    pub categories: Option<Vec<String>>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_answers: Option<bool>,
    pub show_comments: Option<bool>,
    pub time_limit_minutes: Option<u32>,
    pub max_mistakes: Option<u32>,
    pub pairs_per_stage: Option<u32>,
    pub repeat_unknown: Option<bool>,
    pub seed: Option<u64>,
}

/// Per-mode fallbacks for [`SessionOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ModeDefaults {
    pub question_count: u32,
    pub shuffle_questions: bool,
    pub shuffle_answers: bool,
    pub show_comments: bool,
    pub time_limit_minutes: u32,
    pub max_mistakes: u32,
    pub pairs_per_stage: u32,
    pub repeat_unknown: bool,
}

impl ModeDefaults {
    pub const MULTIPLE_CHOICE: Self = Self {
        question_count: 25,
        shuffle_questions: true,
        shuffle_answers: true,
        show_comments: true,
        time_limit_minutes: 0,
        max_mistakes: 0,
        pairs_per_stage: 0,
        repeat_unknown: false,
    };

    pub const TRUE_FALSE: Self = Self {
        question_count: 20,
        shuffle_answers: false,
        ..Self::MULTIPLE_CHOICE
    };

    pub const FLASHCARD: Self = Self {
        question_count: 20,
        shuffle_answers: false,
        max_mistakes: 5,
        repeat_unknown: true,
        ..Self::MULTIPLE_CHOICE
    };

    pub const MATCHING: Self = Self {
        question_count: 20,
        shuffle_answers: false,
        show_comments: false,
        pairs_per_stage: 5,
        ..Self::MULTIPLE_CHOICE
    };
}

pub const MIN_PAIRS_PER_STAGE: u32 = 2;
pub const MAX_PAIRS_PER_STAGE: u32 = 10;

//
// ─── FROZEN CONFIG ─────────────────────────────────────────────────────────────
//

/// Mode-specific part of a [`SessionConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModeConfig {
    #[serde(rename_all = "camelCase")]
    MultipleChoice { shuffle_answers: bool },
    TrueFalse,
    #[serde(rename_all = "camelCase")]
    Flashcard { repeat_unknown: bool },
    #[serde(rename_all = "camelCase")]
    Matching { pairs_per_stage: usize },
}

/// Validated, frozen setup produced by `configure` and consumed by `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub mode_id: ModeId,
    /// Selected questions in presentation order.
    pub questions: Vec<Question>,
    pub show_comments: bool,
    /// 0 means no limit.
    pub time_limit_minutes: u32,
    /// 0 means no limit.
    pub max_mistakes: u32,
    pub seed: u64,
    pub mode: ModeConfig,
}

impl SessionConfig {
    /// Freezes the common knobs from `options`, falling back to `defaults`.
    #[must_use]
    pub fn assemble(
        mode_id: ModeId,
        questions: Vec<Question>,
        options: &SessionOptions,
        defaults: &ModeDefaults,
        seed: u64,
        mode: ModeConfig,
    ) -> Self {
        Self {
            mode_id,
            questions,
            show_comments: options.show_comments.unwrap_or(defaults.show_comments),
            time_limit_minutes: options
                .time_limit_minutes
                .unwrap_or(defaults.time_limit_minutes),
            max_mistakes: options.max_mistakes.unwrap_or(defaults.max_mistakes),
            seed,
            mode,
        }
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_minutes > 0).then(|| Duration::minutes(i64::from(self.time_limit_minutes)))
    }

    #[must_use]
    pub fn mistake_limit(&self) -> Option<usize> {
        (self.max_mistakes > 0).then(|| usize::try_from(self.max_mistakes).unwrap_or(usize::MAX))
    }

    /// Generator used once the session starts. Distinct from the one that
    /// picked the questions so answer order does not mirror question order.
    #[must_use]
    pub fn start_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(1))
    }
}

/// Resolves the seed for a new config, drawing a fresh one when none is given.
#[must_use]
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_accept_camel_case_and_missing_fields() {
        let options: SessionOptions =
            serde_json::from_str(r#"{ "questionCount": 5, "timeLimitMinutes": 2 }"#).unwrap();
        assert_eq!(options.question_count, Some(5));
        assert_eq!(options.time_limit_minutes, Some(2));
        assert!(options.categories.is_none());
    }

    #[test]
    fn zero_limits_mean_unlimited() {
        let config = SessionConfig {
            mode_id: ModeId::new("multiple-choice"),
            questions: Vec::new(),
            show_comments: true,
            time_limit_minutes: 0,
            max_mistakes: 0,
            seed: 1,
            mode: ModeConfig::TrueFalse,
        };
        assert!(config.time_limit().is_none());
        assert!(config.mistake_limit().is_none());
    }

    #[test]
    fn mode_defaults_follow_each_mode() {
        assert_eq!(ModeDefaults::MULTIPLE_CHOICE.question_count, 25);
        assert_eq!(ModeDefaults::FLASHCARD.max_mistakes, 5);
        assert!(ModeDefaults::FLASHCARD.repeat_unknown);
        assert_eq!(ModeDefaults::MATCHING.pairs_per_stage, 5);
    }
}
