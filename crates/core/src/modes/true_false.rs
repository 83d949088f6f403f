use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SessionError};
use crate::model::{
    Answer, Bank, ItemOutcome, ModeId, ModeSummary, Question, QuestionId, SessionResult,
    Termination, Verdict, percent,
};
use crate::modes::item::{
    Judgement, Outcome, Response, SessionItem, SessionProgress, StatementItem, StatementSource,
};
use crate::modes::options::{ModeConfig, ModeDefaults, SessionConfig, SessionOptions, resolve_seed};
use crate::modes::plan::SelectionBuilder;
use crate::modes::runtime::RunState;
use crate::modes::{Mode, ModeMetadata, ModeSession, check_config};

pub const MODE_ID: &str = "true-false";

/// Asks whether a synthesized "question: answer" statement holds.
#[derive(Debug, Clone)]
pub struct TrueFalseMode {
    metadata: ModeMetadata,
}

impl TrueFalseMode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: ModeMetadata::new(
                MODE_ID,
                "True or false",
                "Decide whether the shown answer fits the question.",
            ),
        }
    }

    #[must_use]
    pub fn supports(question: &Question) -> bool {
        question.is_usable()
    }
}

impl Default for TrueFalseMode {
    fn default() -> Self {
        Self::new()
    }
}

impl Mode for TrueFalseMode {
    fn metadata(&self) -> &ModeMetadata {
        &self.metadata
    }

    fn supports_question(&self, question: &Question) -> bool {
        Self::supports(question)
    }

    fn create_session(&self) -> Box<dyn ModeSession> {
        Box::new(TrueFalseSession::new(self.metadata.id.clone()))
    }
}

//
// ─── STATEMENT SYNTHESIS ───────────────────────────────────────────────────────
//

/// A synthesized claim about one question with its known ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub question_id: QuestionId,
    pub text: String,
    pub asserted: String,
    pub truth: bool,
    pub source: StatementSource,
    pub inconsistent: bool,
}

impl Statement {
    fn asserting(question: &Question, answer: &Answer, truth: bool, source: StatementSource) -> Self {
        Self {
            question_id: question.id,
            text: format!("{}: {}", question.prompt, answer.text),
            asserted: answer.text.clone(),
            truth,
            source,
            inconsistent: source == StatementSource::Degraded,
        }
    }
}

/// Builds a statement for `question`.
///
/// A true claim asserts one of its correct answers. A false claim asserts
/// one of its incorrect answers, or else a correct answer borrowed from
/// another question in `pool` whose text differs from every own correct
/// answer. With nothing to borrow the statement degrades to one of the
/// question's own answers, keeps that answer's real correctness as truth,
/// and is marked inconsistent.
pub fn synthesize_statement<R: Rng + ?Sized>(
    question: &Question,
    pool: &[Question],
    assert_true: bool,
    rng: &mut R,
) -> Statement {
    let correct: Vec<&Answer> = question.correct_answers().collect();
    let incorrect: Vec<&Answer> = question.incorrect_answers().collect();

    if assert_true && let Some(answer) = correct.choose(rng) {
        return Statement::asserting(question, answer, true, StatementSource::OwnCorrect);
    }
    if !assert_true {
        if let Some(answer) = incorrect.choose(rng) {
            return Statement::asserting(question, answer, false, StatementSource::OwnIncorrect);
        }

        let borrowable: Vec<(QuestionId, &Answer)> = pool
            .iter()
            .filter(|other| other.id != question.id)
            .flat_map(|other| other.correct_answers().map(move |a| (other.id, a)))
            .filter(|(_, a)| correct.iter().all(|own| own.text != a.text))
            .collect();
        if let Some((from, answer)) = borrowable.choose(rng) {
            return Statement::asserting(
                question,
                answer,
                false,
                StatementSource::Borrowed { from: *from },
            );
        }
    }

    warn!(question = %question.id, "no statement source available, degrading");
    match question.answers.choose(rng) {
        Some(answer) => {
            Statement::asserting(question, answer, answer.is_correct(), StatementSource::Degraded)
        }
        None => Statement {
            question_id: question.id,
            text: question.prompt.clone(),
            asserted: String::new(),
            truth: false,
            source: StatementSource::Degraded,
            inconsistent: true,
        },
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct StatementSlot {
    question: Question,
    statement: Statement,
    judged: Option<bool>,
}

/// Same linear shape as multiple-choice, judged against synthesized truth.
#[derive(Debug)]
pub struct TrueFalseSession {
    mode_id: ModeId,
    items: Vec<StatementSlot>,
    index: usize,
    show_comments: bool,
    mistake_limit: Option<usize>,
    correct: usize,
    mistakes: usize,
    outcomes: Vec<ItemOutcome>,
    run: RunState,
}

impl TrueFalseSession {
    fn new(mode_id: ModeId) -> Self {
        Self {
            mode_id,
            items: Vec::new(),
            index: 0,
            show_comments: false,
            mistake_limit: None,
            correct: 0,
            mistakes: 0,
            outcomes: Vec::new(),
            run: RunState::default(),
        }
    }

    fn judge(&mut self, value: bool, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let slot = self
            .items
            .get_mut(self.index)
            .ok_or(SessionError::Completed)?;
        if slot.judged.is_some() {
            return Err(SessionError::AlreadyAnswered);
        }
        slot.judged = Some(value);
        let statement = &slot.statement;
        let correct = value == statement.truth;

        self.outcomes.push(ItemOutcome {
            question_id: statement.question_id,
            verdict: Verdict::from_correct(correct),
            inconsistent: statement.inconsistent,
        });
        let judgement = Judgement {
            question_id: statement.question_id,
            judged: value,
            truth: statement.truth,
            correct,
            inconsistent: statement.inconsistent,
            comment: if self.show_comments {
                slot.question.comment.clone()
            } else {
                None
            },
        };

        if correct {
            self.correct += 1;
        } else {
            self.mistakes += 1;
            if self.mistake_limit.is_some_and(|max| self.mistakes >= max) {
                self.run.end(Termination::MistakeLimit, now);
            }
        }
        Ok(Outcome::Judged(judgement))
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let slot = self.items.get(self.index).ok_or(SessionError::Completed)?;
        if slot.judged.is_none() {
            return Err(SessionError::NotAnswered);
        }
        self.index += 1;
        if self.index >= self.items.len() {
            self.run.end(Termination::Completed, now);
        }
        Ok(Outcome::Advanced)
    }

    fn inconsistent_items(&self) -> usize {
        self.items.iter().filter(|s| s.statement.inconsistent).count()
    }
}

impl ModeSession for TrueFalseSession {
    fn mode_id(&self) -> &ModeId {
        &self.mode_id
    }

    fn configure(
        &self,
        bank: &Bank,
        options: &SessionOptions,
    ) -> Result<SessionConfig, ConfigError> {
        let defaults = ModeDefaults::TRUE_FALSE;
        let seed = resolve_seed(options.seed);
        let questions =
            SelectionBuilder::new(bank, TrueFalseMode::supports, defaults).build(options, seed)?;
        Ok(SessionConfig::assemble(
            self.mode_id.clone(),
            questions,
            options,
            &defaults,
            seed,
            ModeConfig::TrueFalse,
        ))
    }

    fn start(&mut self, config: SessionConfig, now: DateTime<Utc>) -> Result<(), SessionError> {
        check_config(&self.mode_id, &config)?;
        if self.run.is_started() {
            return Err(SessionError::AlreadyStarted);
        }

        let mut rng = config.start_rng();
        self.show_comments = config.show_comments;
        self.mistake_limit = config.mistake_limit();
        let time_limit = config.time_limit();
        let pool = &config.questions;
        self.items = pool
            .iter()
            .map(|question| {
                let assert_true = rng.random_bool(0.5);
                StatementSlot {
                    question: question.clone(),
                    statement: synthesize_statement(question, pool, assert_true, &mut rng),
                    judged: None,
                }
            })
            .collect();

        self.run.begin(&self.mode_id, now, time_limit)?;
        if self.items.is_empty() {
            self.run.end(Termination::Completed, now);
        }
        Ok(())
    }

    fn current_item(&self) -> Option<SessionItem> {
        if !self.run.is_started() || self.run.is_ended() {
            return None;
        }
        let slot = self.items.get(self.index)?;
        Some(SessionItem::Statement(StatementItem {
            position: self.index,
            total: self.items.len(),
            question_id: slot.question.id,
            prompt: slot.question.prompt.clone(),
            statement: slot.statement.text.clone(),
            source: slot.statement.source,
            inconsistent: slot.statement.inconsistent,
            judged: slot.judged,
        }))
    }

    fn submit_response(
        &mut self,
        response: Response,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        self.run.ensure_active(now)?;
        match response {
            Response::Judge { value } => self.judge(value, now),
            Response::Advance => self.advance(now),
            _ => Err(SessionError::UnsupportedResponse(self.mode_id.clone())),
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> bool {
        self.run.tick(now)
    }

    fn progress(&self, now: DateTime<Utc>) -> SessionProgress {
        let total = self.items.len();
        SessionProgress {
            total,
            answered: self.outcomes.len(),
            correct: self.correct,
            mistakes: self.mistakes,
            remaining: total.saturating_sub(self.outcomes.len()),
            elapsed_secs: self.run.elapsed_secs(now),
            remaining_secs: self.run.remaining_secs(now),
            is_complete: self.run.is_ended(),
        }
    }

    fn is_complete(&self) -> bool {
        self.run.is_ended()
    }

    fn finish(&mut self, now: DateTime<Utc>) -> Result<SessionResult, SessionError> {
        let closing = self.run.close(now)?;
        let total = self.items.len();
        Ok(SessionResult {
            mode_id: self.mode_id.clone(),
            started_at: closing.started_at,
            finished_at: closing.ended_at,
            total_items: total,
            answered_items: self.outcomes.len(),
            correct_count: self.correct,
            mistake_count: self.mistakes,
            percentage: percent(self.correct, total),
            elapsed_secs: closing.elapsed_secs(),
            termination: closing.termination,
            per_item_outcomes: self.outcomes.clone(),
            summary: ModeSummary::TrueFalse {
                inconsistent_items: self.inconsistent_items(),
            },
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
