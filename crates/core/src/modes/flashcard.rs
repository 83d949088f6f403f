use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::error::{ConfigError, SessionError};
use crate::model::{
    Bank, ItemOutcome, ModeId, ModeSummary, Question, QuestionId, SessionResult, Termination,
    Verdict, percent,
};
use crate::modes::item::{CardItem, Outcome, Response, SessionItem, SessionProgress};
use crate::modes::options::{ModeConfig, ModeDefaults, SessionConfig, SessionOptions, resolve_seed};
use crate::modes::plan::SelectionBuilder;
use crate::modes::runtime::RunState;
use crate::modes::{Mode, ModeMetadata, ModeSession, check_config};

pub const MODE_ID: &str = "flashcard";

/// Self-assessed recall with a repeat queue for unknown cards.
#[derive(Debug, Clone)]
pub struct FlashcardMode {
    metadata: ModeMetadata,
}

impl FlashcardMode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: ModeMetadata::new(
                MODE_ID,
                "Flashcards",
                "Recall the answer, reveal it, then say whether you knew it.",
            ),
        }
    }

    #[must_use]
    pub fn supports(question: &Question) -> bool {
        question.is_usable()
    }
}

impl Default for FlashcardMode {
    fn default() -> Self {
        Self::new()
    }
}

impl Mode for FlashcardMode {
    fn metadata(&self) -> &ModeMetadata {
        &self.metadata
    }

    fn supports_question(&self, question: &Question) -> bool {
        Self::supports(question)
    }

    fn create_session(&self) -> Box<dyn ModeSession> {
        Box::new(FlashcardSession::new(self.metadata.id.clone()))
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shown {
    card: usize,
    from_review: bool,
    revealed: bool,
}

/// Per card: `Shown -> Revealed -> SelfAssessed(known | unknown)`.
///
/// Cards are addressed by their index in the selection, so the review queue
/// deduplicates by identity.
#[derive(Debug)]
pub struct FlashcardSession {
    mode_id: ModeId,
    cards: Vec<Question>,
    next_primary: usize,
    review: VecDeque<usize>,
    shown: Option<Shown>,
    known: BTreeSet<QuestionId>,
    assessed: BTreeSet<usize>,
    repeat_unknown: bool,
    show_comments: bool,
    mistake_limit: Option<usize>,
    mistakes: usize,
    outcomes: Vec<ItemOutcome>,
    run: RunState,
}

impl FlashcardSession {
    fn new(mode_id: ModeId) -> Self {
        Self {
            mode_id,
            cards: Vec::new(),
            next_primary: 0,
            review: VecDeque::new(),
            shown: None,
            known: BTreeSet::new(),
            assessed: BTreeSet::new(),
            repeat_unknown: true,
            show_comments: false,
            mistake_limit: None,
            mistakes: 0,
            outcomes: Vec::new(),
            run: RunState::default(),
        }
    }

    /// Review queue first (front), then the primary sequence.
    fn next_card(&mut self) -> Option<Shown> {
        if self.repeat_unknown
            && let Some(card) = self.review.pop_front()
        {
            return Some(Shown {
                card,
                from_review: true,
                revealed: false,
            });
        }
        if self.next_primary < self.cards.len() {
            let card = self.next_primary;
            self.next_primary += 1;
            return Some(Shown {
                card,
                from_review: false,
                revealed: false,
            });
        }
        None
    }

    fn draw(&mut self, now: DateTime<Utc>) {
        self.shown = self.next_card();
        if self.shown.is_none() {
            self.run.end(Termination::Completed, now);
        }
    }

    fn reveal(&mut self) -> Result<Outcome, SessionError> {
        let shown = self.shown.as_mut().ok_or(SessionError::Completed)?;
        shown.revealed = true;
        let card = &self.cards[shown.card];
        Ok(Outcome::Revealed {
            answers: card.correct_answers().map(|a| a.text.clone()).collect(),
        })
    }

    fn assess(&mut self, known: bool, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let shown = self.shown.ok_or(SessionError::Completed)?;
        if !shown.revealed {
            return Err(SessionError::NotRevealed);
        }
        let question_id = self.cards[shown.card].id;
        self.assessed.insert(shown.card);
        self.outcomes
            .push(ItemOutcome::new(question_id, Verdict::from_correct(known)));

        let mut requeued = false;
        if known {
            self.known.insert(question_id);
        } else {
            self.mistakes += 1;
            if self.repeat_unknown && !self.review.contains(&shown.card) {
                self.review.push_back(shown.card);
                requeued = true;
            }
        }

        if !known && self.mistake_limit.is_some_and(|max| self.mistakes >= max) {
            self.shown = None;
            self.run.end(Termination::MistakeLimit, now);
        } else {
            self.draw(now);
        }

        Ok(Outcome::Assessed {
            question_id,
            known,
            requeued,
        })
    }

    fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.next_primary)
            + self.review.len()
            + usize::from(self.shown.is_some())
    }
}

impl ModeSession for FlashcardSession {
    fn mode_id(&self) -> &ModeId {
        &self.mode_id
    }

    fn configure(
        &self,
        bank: &Bank,
        options: &SessionOptions,
    ) -> Result<SessionConfig, ConfigError> {
        let defaults = ModeDefaults::FLASHCARD;
        let seed = resolve_seed(options.seed);
        let questions =
            SelectionBuilder::new(bank, FlashcardMode::supports, defaults).build(options, seed)?;
        let mode = ModeConfig::Flashcard {
            repeat_unknown: options.repeat_unknown.unwrap_or(defaults.repeat_unknown),
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
        let ModeConfig::Flashcard { repeat_unknown } = config.mode else {
            return Err(SessionError::ConfigMismatch {
                expected: self.mode_id.clone(),
                actual: config.mode_id.clone(),
            });
        };

        self.repeat_unknown = repeat_unknown;
        self.show_comments = config.show_comments;
        self.mistake_limit = config.mistake_limit();
        let time_limit = config.time_limit();
        self.cards = config.questions;

        self.run.begin(&self.mode_id, now, time_limit)?;
        self.draw(now);
        Ok(())
    }

    fn current_item(&self) -> Option<SessionItem> {
        if self.run.is_ended() {
            return None;
        }
        let shown = self.shown?;
        let card = &self.cards[shown.card];
        Some(SessionItem::Card(CardItem {
            question_id: card.id,
            prompt: card.prompt.clone(),
            from_review: shown.from_review,
            revealed: shown.revealed,
            answers: if shown.revealed {
                card.correct_answers().map(|a| a.text.clone()).collect()
            } else {
                Vec::new()
            },
            comment: if shown.revealed && self.show_comments {
                card.comment.clone()
            } else {
                None
            },
            known: self.known.len(),
            total: self.cards.len(),
            pending_reviews: self.review.len(),
        }))
    }

    fn submit_response(
        &mut self,
        response: Response,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        self.run.ensure_active(now)?;
        match response {
            Response::Reveal => self.reveal(),
            Response::Assess { known } => self.assess(known, now),
            _ => Err(SessionError::UnsupportedResponse(self.mode_id.clone())),
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> bool {
        self.run.tick(now)
    }

    fn progress(&self, now: DateTime<Utc>) -> SessionProgress {
        SessionProgress {
            total: self.cards.len(),
            answered: self.assessed.len(),
            correct: self.known.len(),
            mistakes: self.mistakes,
            remaining: self.remaining(),
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
        self.shown = None;
        let total = self.cards.len();
        Ok(SessionResult {
            mode_id: self.mode_id.clone(),
            started_at: closing.started_at,
            finished_at: closing.ended_at,
            total_items: total,
            answered_items: self.assessed.len(),
            correct_count: self.known.len(),
            mistake_count: self.mistakes,
            percentage: percent(self.known.len(), total),
            elapsed_secs: closing.elapsed_secs(),
            termination: closing.termination,
            per_item_outcomes: self.outcomes.clone(),
            summary: ModeSummary::Flashcard {
                known_cards: self.known.len(),
                pending_reviews: self.review.len(),
            },
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
