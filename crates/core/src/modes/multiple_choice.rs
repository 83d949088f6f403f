use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use crate::error::{ConfigError, SessionError};
use crate::model::{
    Answer, Bank, ItemOutcome, ModeId, ModeSummary, Question, SessionResult, Termination, Verdict,
    percent,
};
use crate::modes::item::{
    ChoiceFeedback, ChoiceItem, ChoiceView, Outcome, Response, SessionItem, SessionProgress,
};
use crate::modes::options::{ModeConfig, ModeDefaults, SessionConfig, SessionOptions, resolve_seed};
use crate::modes::plan::SelectionBuilder;
use crate::modes::runtime::RunState;
use crate::modes::{Mode, ModeMetadata, ModeSession, check_config};

pub const MODE_ID: &str = "multiple-choice";

/// Classic quiz: one question at a time, pick one of its answers.
#[derive(Debug, Clone)]
pub struct MultipleChoiceMode {
    metadata: ModeMetadata,
}

impl MultipleChoiceMode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: ModeMetadata::new(
                MODE_ID,
                "Multiple choice",
                "Pick the correct answer from the listed options.",
            ),
        }
    }

    /// Needs a prompt, a correct answer and at least two fully specified answers.
    #[must_use]
    pub fn supports(question: &Question) -> bool {
        question.is_usable()
            && question.answers.len() >= 2
            && question.answers.iter().all(Answer::is_well_formed)
    }
}

impl Default for MultipleChoiceMode {
    fn default() -> Self {
        Self::new()
    }
}

impl Mode for MultipleChoiceMode {
    fn metadata(&self) -> &ModeMetadata {
        &self.metadata
    }

    fn supports_question(&self, question: &Question) -> bool {
        Self::supports(question)
    }

    fn create_session(&self) -> Box<dyn ModeSession> {
        Box::new(MultipleChoiceSession::new(self.metadata.id.clone()))
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct ChoiceSlot {
    question: Question,
    /// Display order as canonical answer indices.
    order: Vec<usize>,
    picked: Option<usize>,
}

/// Linear `Unanswered(i) -> Answered(i) -> Unanswered(i+1) -> ... -> Done`.
#[derive(Debug)]
pub struct MultipleChoiceSession {
    mode_id: ModeId,
    items: Vec<ChoiceSlot>,
    index: usize,
    show_comments: bool,
    mistake_limit: Option<usize>,
    correct: usize,
    mistakes: usize,
    outcomes: Vec<ItemOutcome>,
    run: RunState,
}

impl MultipleChoiceSession {
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

    fn choose(&mut self, picked: usize, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let slot = self
            .items
            .get_mut(self.index)
            .ok_or(SessionError::Completed)?;
        if slot.picked.is_some() {
            return Err(SessionError::AlreadyAnswered);
        }
        let answer = slot
            .question
            .answers
            .get(picked)
            .ok_or(SessionError::InvalidChoice {
                index: picked,
                len: slot.question.answers.len(),
            })?;
        let correct = answer.is_correct();
        slot.picked = Some(picked);

        let feedback = ChoiceFeedback {
            question_id: slot.question.id,
            picked,
            correct,
            correct_indices: slot.question.correct_indices(),
            comment: if self.show_comments {
                slot.question.comment.clone()
            } else {
                None
            },
        };
        self.outcomes
            .push(ItemOutcome::new(slot.question.id, Verdict::from_correct(correct)));
        if correct {
            self.correct += 1;
        } else {
            self.mistakes += 1;
            if self.mistake_limit.is_some_and(|max| self.mistakes >= max) {
                self.run.end(Termination::MistakeLimit, now);
            }
        }
        Ok(Outcome::Answered(feedback))
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let slot = self.items.get(self.index).ok_or(SessionError::Completed)?;
        if slot.picked.is_none() {
            return Err(SessionError::NotAnswered);
        }
        self.index += 1;
        if self.index >= self.items.len() {
            self.run.end(Termination::Completed, now);
        }
        Ok(Outcome::Advanced)
    }
}

impl ModeSession for MultipleChoiceSession {
    fn mode_id(&self) -> &ModeId {
        &self.mode_id
    }

    fn configure(
        &self,
        bank: &Bank,
        options: &SessionOptions,
    ) -> Result<SessionConfig, ConfigError> {
        let defaults = ModeDefaults::MULTIPLE_CHOICE;
        let seed = resolve_seed(options.seed);
        let questions = SelectionBuilder::new(bank, MultipleChoiceMode::supports, defaults)
            .build(options, seed)?;
        let mode = ModeConfig::MultipleChoice {
            shuffle_answers: options.shuffle_answers.unwrap_or(defaults.shuffle_answers),
        };
        Ok(SessionConfig::assemble(
            self.mode_id.clone(),
            questions,
            options,
            &defaults,
            seed,
            mode,
        ))
    }

    fn start(&mut self, config: SessionConfig, now: DateTime<Utc>) -> Result<(), SessionError> {
        check_config(&self.mode_id, &config)?;
        if self.run.is_started() {
            return Err(SessionError::AlreadyStarted);
        }
        let ModeConfig::MultipleChoice { shuffle_answers } = config.mode else {
            return Err(SessionError::ConfigMismatch {
                expected: self.mode_id.clone(),
                actual: config.mode_id.clone(),
            });
        };

        let mut rng = config.start_rng();
        self.show_comments = config.show_comments;
        self.mistake_limit = config.mistake_limit();
        let time_limit = config.time_limit();
        self.items = config
            .questions
            .into_iter()
            .map(|question| {
                let mut order: Vec<usize> = (0..question.answers.len()).collect();
                if shuffle_answers {
                    order.shuffle(&mut rng);
                }
                ChoiceSlot {
                    question,
                    order,
                    picked: None,
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
        Some(SessionItem::Choice(ChoiceItem {
            position: self.index,
            total: self.items.len(),
            question_id: slot.question.id,
            prompt: slot.question.prompt.clone(),
            category: slot.question.category.clone(),
            choices: slot
                .order
                .iter()
                .map(|&i| ChoiceView {
                    canonical_index: i,
                    text: slot.question.answers[i].text.clone(),
                })
                .collect(),
            picked: slot.picked,
        }))
    }

    fn submit_response(
        &mut self,
        response: Response,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        self.run.ensure_active(now)?;
        match response {
            Response::Choose { index } => self.choose(index, now),
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
            summary: ModeSummary::MultipleChoice,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, QuestionId};
    use crate::modes::fixtures;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn options() -> SessionOptions {
        SessionOptions {
            shuffle_questions: Some(false),
            shuffle_answers: Some(false),
            seed: Some(7),
            ..SessionOptions::default()
        }
    }

    fn started(bank: &Bank, options: &SessionOptions) -> Box<dyn ModeSession> {
        let mut session = MultipleChoiceMode::new().create_session();
        let config = session.configure(bank, options).unwrap();
        session.start(config, fixed_now()).unwrap();
        session
    }

    fn current(session: &dyn ModeSession) -> ChoiceItem {
        match session.current_item() {
            Some(SessionItem::Choice(item)) => item,
            other => panic!("expected a choice item, got {other:?}"),
        }
    }

    #[test]
    fn support_requires_two_flagged_answers() {
        let single = Question::new(QuestionId::new(1), "Q", vec![Answer::correct("a")]);
        assert!(!MultipleChoiceMode::supports(&single));

        let unflagged = Question::new(
            QuestionId::new(2),
            "Q",
            vec![
                Answer::correct("a"),
                Answer {
                    text: "b".into(),
                    is_correct: None,
                },
            ],
        );
        assert!(!MultipleChoiceMode::supports(&unflagged));
        assert!(MultipleChoiceMode::supports(&fixtures::question(3, 1)));
    }

    #[test]
    fn all_wrong_scores_zero() {
        let bank = fixtures::bank(10, 3);
        let mut session = started(
            &bank,
            &SessionOptions {
                question_count: Some(10),
                ..options()
            },
        );
        let mut now = fixed_now();
        while !session.is_complete() {
            let item = current(session.as_ref());
            assert_eq!(item.choices.len(), 4);
            let wrong = item
                .choices
                .iter()
                .map(|c| c.canonical_index)
                .find(|&i| i != 0)
                .unwrap();
            session.submit_response(Response::Choose { index: wrong }, now).unwrap();
            now += Duration::seconds(3);
            session.submit_response(Response::Advance, now).unwrap();
        }
        let result = session.finish(now).unwrap();
        assert_eq!(result.percentage, 0);
        assert_eq!(result.mistake_count, 10);
        assert_eq!(result.answered_items, 10);
        assert_eq!(result.termination, Termination::Completed);
        assert_eq!(result.elapsed_secs, 30);
    }

    #[test]
    fn double_submit_is_rejected_without_side_effects() {
        let bank = fixtures::bank(2, 1);
        let mut session = started(&bank, &options());
        session.submit_response(Response::Choose { index: 0 }, fixed_now()).unwrap();
        assert_eq!(
            session.submit_response(Response::Choose { index: 1 }, fixed_now()),
            Err(SessionError::AlreadyAnswered)
        );
        let progress = session.progress(fixed_now());
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.correct, 1);
        assert_eq!(progress.mistakes, 0);
    }

    #[test]
    fn advance_requires_an_answer_and_choices_are_bounds_checked() {
        let bank = fixtures::bank(2, 1);
        let mut session = started(&bank, &options());
        assert_eq!(
            session.submit_response(Response::Advance, fixed_now()),
            Err(SessionError::NotAnswered)
        );
        assert_eq!(
            session.submit_response(Response::Choose { index: 9 }, fixed_now()),
            Err(SessionError::InvalidChoice { index: 9, len: 2 })
        );
        assert!(matches!(
            session.submit_response(Response::Reveal, fixed_now()),
            Err(SessionError::UnsupportedResponse(_))
        ));
    }

    #[test]
    fn mistake_limit_ends_the_run_when_reached() {
        let bank = fixtures::bank(5, 1);
        let mut session = started(
            &bank,
            &SessionOptions {
                max_mistakes: Some(2),
                ..options()
            },
        );
        for _ in 0..2 {
            session.submit_response(Response::Choose { index: 1 }, fixed_now()).unwrap();
            if !session.is_complete() {
                session.submit_response(Response::Advance, fixed_now()).unwrap();
            }
        }
        assert!(session.is_complete());
        assert!(session.current_item().is_none());
        let result = session.finish(fixed_now()).unwrap();
        assert!(result.mistake_limit_reached());
        assert_eq!(result.total_items, 5);
        assert_eq!(result.answered_items, 2);
    }

    #[test]
    fn time_limit_forces_done_and_late_submit_is_refused() {
        let bank = fixtures::bank(3, 1);
        let mut session = started(
            &bank,
            &SessionOptions {
                time_limit_minutes: Some(1),
                ..options()
            },
        );
        let late = fixed_now() + Duration::seconds(61);
        assert_eq!(
            session.submit_response(Response::Choose { index: 0 }, late),
            Err(SessionError::Completed)
        );
        assert!(session.is_complete());
        let result = session.finish(late).unwrap();
        assert!(result.time_limit_reached());
        assert_eq!(result.elapsed_secs, 60);
        assert_eq!(result.answered_items, 0);
    }

    #[test]
    fn tick_reports_expiry_once() {
        let bank = fixtures::bank(3, 1);
        let mut session = started(
            &bank,
            &SessionOptions {
                time_limit_minutes: Some(1),
                ..options()
            },
        );
        assert!(!session.on_tick(fixed_now() + Duration::seconds(30)));
        assert!(session.on_tick(fixed_now() + Duration::seconds(60)));
        assert!(!session.on_tick(fixed_now() + Duration::seconds(90)));
    }

    #[test]
    fn shuffled_answers_keep_canonical_indices() {
        let bank = fixtures::bank(1, 5);
        let mut session = started(
            &bank,
            &SessionOptions {
                shuffle_answers: Some(true),
                ..options()
            },
        );
        let item = current(session.as_ref());
        let mut indices: Vec<usize> = item.choices.iter().map(|c| c.canonical_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
        let right = item.choices.iter().find(|c| c.text == "right 1").unwrap();
        let Outcome::Answered(feedback) = session
            .submit_response(Response::Choose { index: right.canonical_index }, fixed_now())
            .unwrap()
        else {
            panic!("expected feedback");
        };
        assert!(feedback.correct);
        assert_eq!(feedback.correct_indices, vec![0]);
    }

    #[test]
    fn finishing_early_and_twice() {
        let bank = fixtures::bank(3, 1);
        let mut session = started(&bank, &options());
        let result = session.finish(fixed_now()).unwrap();
        assert_eq!(result.termination, Termination::EndedEarly);
        assert_eq!(
            session.finish(fixed_now()),
            Err(SessionError::AlreadyFinished)
        );
    }
}
