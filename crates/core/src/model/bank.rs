use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::BankError;
use crate::model::ids::{BankId, QuestionId};
use crate::model::question::{Answer, Difficulty, Question};

/// Descriptive metadata shipped with a bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMeta {
    #[serde(default)]
    pub title: String,
}

/// An ordered, read-only sequence of questions for one quiz topic.
///
/// `rejected` counts source entries that could not be kept at all (not an
/// object, no id, or a repeated id). They still count towards the bank's
/// total when a mode validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    id: BankId,
    meta: BankMeta,
    questions: Vec<Question>,
    rejected: usize,
}

impl Bank {
    #[must_use]
    pub fn new(id: BankId, title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id,
            meta: BankMeta {
                title: title.into(),
            },
            questions,
            rejected: 0,
        }
    }

    /// Parses bank text of the shape `{ meta: { title }, questions: [...] }`.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Syntax` only when `text` is not JSON at all.
    pub fn from_json(id: BankId, text: &str) -> Result<Self, BankError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(id, &value))
    }

    /// Builds a bank from an already-parsed JSON value, keeping every entry
    /// that carries a unique numeric id.
    #[must_use]
    pub fn from_value(id: BankId, value: &Value) -> Self {
        let title = value
            .get("meta")
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let entries = value
            .get("questions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(entries.len());
        let mut rejected = 0;

        for (index, entry) in entries.iter().enumerate() {
            let Some(obj) = entry.as_object() else {
                warn!(bank = %id, index, "dropping bank entry that is not an object");
                rejected += 1;
                continue;
            };
            let Some(qid) = obj.get("id").and_then(Value::as_u64).map(QuestionId::new) else {
                warn!(bank = %id, index, "dropping bank entry without a numeric id");
                rejected += 1;
                continue;
            };
            if !seen.insert(qid) {
                warn!(bank = %id, index, question = %qid, "dropping bank entry with repeated id");
                rejected += 1;
                continue;
            }
            questions.push(question_from_object(qid, obj));
        }

        Self {
            id,
            meta: BankMeta { title },
            questions,
            rejected,
        }
    }

    #[must_use]
    pub fn id(&self) -> &BankId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.meta.title
    }

    #[must_use]
    pub fn meta(&self) -> &BankMeta {
        &self.meta
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Every source entry, kept or rejected.
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.questions.len() + self.rejected
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Distinct category labels, sorted.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.questions
            .iter()
            .filter_map(|q| q.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn question_from_object(id: QuestionId, obj: &Map<String, Value>) -> Question {
    let text_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    let answers = obj
        .get("answers")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(answer_from_value).collect())
        .unwrap_or_default();

    Question {
        id,
        prompt: text_field("question").unwrap_or_default(),
        answers,
        category: text_field("category"),
        comment: text_field("comment"),
        difficulty: obj
            .get("difficulty")
            .and_then(Value::as_u64)
            .and_then(|tier| u8::try_from(tier).ok())
            .and_then(Difficulty::from_tier),
    }
}

fn answer_from_value(value: &Value) -> Answer {
    Answer {
        text: value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        is_correct: value.get("isCorrect").and_then(Value::as_bool),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_id() -> BankId {
        BankId::new("geo")
    }

    #[test]
    fn loads_title_and_questions() {
        let text = r#"{
            "meta": { "title": "Geography" },
            "questions": [
                { "id": 1, "question": "Capital of France?", "category": "europe",
                  "answers": [ { "text": "Paris", "isCorrect": true }, { "text": "Rome", "isCorrect": false } ] },
                { "id": 2, "question": "Capital of Peru?", "category": "americas",
                  "answers": [ { "text": "Lima", "isCorrect": true } ] }
            ]
        }"#;
        let bank = Bank::from_json(bank_id(), text).unwrap();
        assert_eq!(bank.title(), "Geography");
        assert_eq!(bank.questions().len(), 2);
        assert_eq!(bank.rejected(), 0);
        assert_eq!(bank.categories(), vec!["americas".to_string(), "europe".to_string()]);
    }

    #[test]
    fn non_json_is_a_syntax_error() {
        assert!(matches!(
            Bank::from_json(bank_id(), "not json"),
            Err(BankError::Syntax(_))
        ));
    }

    #[test]
    fn malformed_entries_are_counted_not_fatal() {
        let text = r#"{
            "questions": [
                "just a string",
                { "question": "no id" },
                { "id": 3, "question": "ok", "answers": [ { "text": "yes", "isCorrect": true } ] },
                { "id": 3, "question": "dup" },
                { "id": 4, "answers": "wrong type", "difficulty": 9 }
            ]
        }"#;
        let bank = Bank::from_json(bank_id(), text).unwrap();
        assert_eq!(bank.questions().len(), 2);
        assert_eq!(bank.rejected(), 3);
        assert_eq!(bank.total_entries(), 5);

        let loose = bank.question(QuestionId::new(4)).unwrap();
        assert!(loose.prompt.is_empty());
        assert!(loose.answers.is_empty());
        assert_eq!(loose.difficulty, None);
    }

    #[test]
    fn totally_malformed_bank_is_empty() {
        let bank = Bank::from_json(bank_id(), "[1, 2, 3]").unwrap();
        assert!(bank.is_empty());
        assert_eq!(bank.total_entries(), 0);
        assert_eq!(bank.title(), "");
    }
}
