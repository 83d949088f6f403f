use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Optional three-level difficulty tier attached to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Converts the 1-3 tier used in bank files.
    #[must_use]
    pub fn from_tier(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Easy),
            2 => Some(Self::Medium),
            3 => Some(Self::Hard),
            _ => None,
        }
    }

    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_tier(value).ok_or_else(|| format!("difficulty tier out of range: {value}"))
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value.tier()
    }
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// One answer option of a question.
///
/// `is_correct` stays `None` when the source omitted the flag, which some
/// modes treat as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "isCorrect", skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl Answer {
    #[must_use]
    pub fn correct(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_correct: Some(true),
        }
    }

    #[must_use]
    pub fn incorrect(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_correct: Some(false),
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct == Some(true)
    }

    /// True when both the text and the correctness flag are present.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.text.trim().is_empty() && self.is_correct.is_some()
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single bank question with its ordered answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(default, rename = "question")]
    pub prompt: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, prompt: impl Into<String>, answers: Vec<Answer>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            answers,
            category: None,
            comment: None,
            difficulty: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn correct_answers(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter().filter(|a| a.is_correct())
    }

    pub fn incorrect_answers(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter().filter(|a| !a.is_correct())
    }

    /// Canonical indices of every correct answer.
    #[must_use]
    pub fn correct_indices(&self) -> Vec<usize> {
        self.answers
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_correct())
            .map(|(i, _)| i)
            .collect()
    }

    #[must_use]
    pub fn has_correct_answer(&self) -> bool {
        self.answers.iter().any(Answer::is_correct)
    }

    /// Baseline shape every mode requires: a prompt and at least one correct answer.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.prompt.trim().is_empty() && self.has_correct_answer()
    }

    /// True when the question belongs to one of `categories`.
    #[must_use]
    pub fn in_categories(&self, categories: &[String]) -> bool {
        self.category
            .as_ref()
            .is_some_and(|c| categories.iter().any(|wanted| wanted == c))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_parses_bank_shape() {
        let json = r#"{
            "id": 4,
            "question": "2 + 2?",
            "answers": [
                { "text": "4", "isCorrect": true },
                { "text": "5", "isCorrect": false }
            ],
            "category": "math",
            "difficulty": 1
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.id, QuestionId::new(4));
        assert_eq!(q.prompt, "2 + 2?");
        assert_eq!(q.correct_indices(), vec![0]);
        assert_eq!(q.difficulty, Some(Difficulty::Easy));
        assert!(q.is_usable());
    }

    #[test]
    fn missing_flag_is_not_correct_and_not_well_formed() {
        let answer: Answer = serde_json::from_str(r#"{ "text": "maybe" }"#).unwrap();
        assert!(!answer.is_correct());
        assert!(!answer.is_well_formed());
    }

    #[test]
    fn question_without_correct_answer_is_unusable() {
        let q = Question::new(
            QuestionId::new(1),
            "Pick one",
            vec![Answer::incorrect("a"), Answer::incorrect("b")],
        );
        assert!(!q.is_usable());
    }

    #[test]
    fn uncategorised_question_is_outside_every_filter() {
        let q = Question::new(QuestionId::new(1), "Q", vec![Answer::correct("A")]);
        assert!(!q.in_categories(&["x".to_string()]));
        let q = q.with_category("x");
        assert!(q.in_categories(&["x".to_string()]));
    }

    #[test]
    fn difficulty_rejects_unknown_tier() {
        assert!(Difficulty::try_from(7).is_err());
        assert_eq!(Difficulty::try_from(3), Ok(Difficulty::Hard));
    }
}
