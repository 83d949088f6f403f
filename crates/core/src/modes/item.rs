use serde::{Deserialize, Serialize};

use crate::model::{QuestionId, SlotId, Verdict};

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

/// User action forwarded to the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// Multiple-choice pick, by canonical answer index.
    Choose { index: usize },
    /// True/false verdict on the shown statement.
    Judge { value: bool },
    /// Leave an answered item.
    Advance,
    /// Turn the current flashcard over.
    Reveal,
    /// Self-assessment of a revealed flashcard.
    Assess { known: bool },
    /// Arm a matching question (arming it again disarms it).
    Arm { question: QuestionId },
    /// Connect the armed question to a slot.
    Bind { slot: SlotId },
    /// Drop the connection of a question.
    Unbind { question: QuestionId },
    CheckStage,
}

//
// ─── ITEMS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceView {
    pub canonical_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceItem {
    pub position: usize,
    pub total: usize,
    pub question_id: QuestionId,
    pub prompt: String,
    pub category: Option<String>,
    /// Display order; each entry keeps its canonical index.
    pub choices: Vec<ChoiceView>,
    pub picked: Option<usize>,
}

/// Where a true/false statement's asserted answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StatementSource {
    OwnCorrect,
    OwnIncorrect,
    Borrowed { from: QuestionId },
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementItem {
    pub position: usize,
    pub total: usize,
    pub question_id: QuestionId,
    pub prompt: String,
    pub statement: String,
    pub source: StatementSource,
    pub inconsistent: bool,
    pub judged: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardItem {
    pub question_id: QuestionId,
    pub prompt: String,
    pub from_review: bool,
    pub revealed: bool,
    /// Correct answers; empty until the card is revealed.
    pub answers: Vec<String>,
    pub comment: Option<String>,
    pub known: usize,
    pub total: usize,
    pub pending_reviews: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeftEntry {
    pub question_id: QuestionId,
    pub prompt: String,
    pub bound_to: Option<SlotId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RightSlot {
    pub slot: SlotId,
    pub text: String,
    pub bound_from: Option<QuestionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageItem {
    pub stage_index: usize,
    pub stage_count: usize,
    pub left: Vec<LeftEntry>,
    pub right: Vec<RightSlot>,
    pub armed: Option<QuestionId>,
    pub connected: usize,
    pub required: usize,
    pub cumulative_mistakes: usize,
}

impl StageItem {
    #[must_use]
    pub fn can_check(&self) -> bool {
        self.connected == self.required
    }
}

/// What the renderer shows for the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionItem {
    Choice(ChoiceItem),
    Statement(StatementItem),
    Card(CardItem),
    Stage(StageItem),
}

impl SessionItem {
    /// Question ids the item is about.
    #[must_use]
    pub fn question_ids(&self) -> Vec<QuestionId> {
        match self {
            SessionItem::Choice(item) => vec![item.question_id],
            SessionItem::Statement(item) => vec![item.question_id],
            SessionItem::Card(item) => vec![item.question_id],
            SessionItem::Stage(item) => item.left.iter().map(|e| e.question_id).collect(),
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceFeedback {
    pub question_id: QuestionId,
    pub picked: usize,
    pub correct: bool,
    pub correct_indices: Vec<usize>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judgement {
    pub question_id: QuestionId,
    pub judged: bool,
    pub truth: bool,
    pub correct: bool,
    pub inconsistent: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairReport {
    pub question_id: QuestionId,
    pub chosen: Option<SlotId>,
    pub expected: SlotId,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage_index: usize,
    pub pairs: Vec<PairReport>,
    pub stage_mistakes: usize,
    pub cumulative_mistakes: usize,
}

/// Immediate result of one accepted response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
    Answered(ChoiceFeedback),
    Judged(Judgement),
    Advanced,
    #[serde(rename_all = "camelCase")]
    Revealed { answers: Vec<String> },
    #[serde(rename_all = "camelCase")]
    Assessed {
        question_id: QuestionId,
        known: bool,
        requeued: bool,
    },
    #[serde(rename_all = "camelCase")]
    Armed { question_id: Option<QuestionId> },
    #[serde(rename_all = "camelCase")]
    Bound {
        question_id: QuestionId,
        slot: SlotId,
        displaced: Option<QuestionId>,
    },
    #[serde(rename_all = "camelCase")]
    Unbound {
        question_id: QuestionId,
        slot: Option<SlotId>,
    },
    StageChecked(StageReport),
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Aggregated view of session progress for the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub mistakes: usize,
    pub remaining: usize,
    pub elapsed_secs: u64,
    pub remaining_secs: Option<u64>,
    pub is_complete: bool,
}
