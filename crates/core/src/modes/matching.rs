use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::debug;

use crate::error::{ConfigError, SessionError};
use crate::model::{
    Bank, ItemOutcome, ModeId, ModeSummary, Question, QuestionId, SessionResult, SlotId,
    Termination, Verdict, percent,
};
use crate::modes::item::{
    LeftEntry, Outcome, PairReport, Response, RightSlot, SessionItem, SessionProgress, StageItem,
    StageReport,
};
use crate::modes::options::{
    MAX_PAIRS_PER_STAGE, MIN_PAIRS_PER_STAGE, ModeConfig, ModeDefaults, SessionConfig,
    SessionOptions, resolve_seed,
};
use crate::modes::plan::SelectionBuilder;
use crate::modes::runtime::RunState;
use crate::modes::{Mode, ModeMetadata, ModeSession, check_config};

pub const MODE_ID: &str = "matching-stage";

/// Staged click-to-connect matching of questions to answers.
#[derive(Debug, Clone)]
pub struct MatchingMode {
    metadata: ModeMetadata,
}

impl MatchingMode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: ModeMetadata::new(
                MODE_ID,
                "Matching (staged)",
                "Connect each question with its answer, one stage at a time.",
            ),
        }
    }

    #[must_use]
    pub fn supports(question: &Question) -> bool {
        question.is_usable()
    }
}

impl Default for MatchingMode {
    fn default() -> Self {
        Self::new()
    }
}

impl Mode for MatchingMode {
    fn metadata(&self) -> &ModeMetadata {
        &self.metadata
    }

    fn supports_question(&self, question: &Question) -> bool {
        Self::supports(question)
    }

    fn create_session(&self) -> Box<dyn ModeSession> {
        Box::new(MatchingSession::new(self.metadata.id.clone()))
    }
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

/// Generation-time pairing: `slot` is the ground truth for `question_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pair {
    question_id: QuestionId,
    prompt: String,
    answer: String,
    slot: SlotId,
}

/// One batch of pairs. `forward` and `reverse` mirror each other at all
/// times, so every question and every slot has at most one counterpart.
#[derive(Debug, Clone, Default)]
struct Stage {
    pairs: Vec<Pair>,
    left: Vec<usize>,
    right: Vec<usize>,
    forward: BTreeMap<QuestionId, SlotId>,
    reverse: BTreeMap<SlotId, QuestionId>,
    armed: Option<QuestionId>,
    report: Option<StageReport>,
}

impl Stage {
    fn generate<R: Rng + ?Sized>(questions: &[Question], next_slot: &mut u32, rng: &mut R) -> Self {
        let mut slots: Vec<SlotId> = (0..questions.len())
            .map(|_| {
                *next_slot += 1;
                SlotId::new(*next_slot)
            })
            .collect();
        slots.shuffle(rng);

        let pairs: Vec<Pair> = questions
            .iter()
            .zip(slots)
            .map(|(question, slot)| {
                let correct: Vec<_> = question.correct_answers().collect();
                Pair {
                    question_id: question.id,
                    prompt: question.prompt.clone(),
                    answer: correct
                        .choose(rng)
                        .map(|a| a.text.clone())
                        .unwrap_or_default(),
                    slot,
                }
            })
            .collect();

        let mut left: Vec<usize> = (0..pairs.len()).collect();
        let mut right: Vec<usize> = (0..pairs.len()).collect();
        left.shuffle(rng);
        right.shuffle(rng);

        Self {
            pairs,
            left,
            right,
            ..Self::default()
        }
    }

    fn size(&self) -> usize {
        self.pairs.len()
    }

    fn has_question(&self, id: QuestionId) -> bool {
        self.pairs.iter().any(|p| p.question_id == id)
    }

    fn has_slot(&self, slot: SlotId) -> bool {
        self.pairs.iter().any(|p| p.slot == slot)
    }

    fn arm(&mut self, id: QuestionId) -> Result<Outcome, SessionError> {
        if !self.has_question(id) {
            return Err(SessionError::UnknownItem(id));
        }
        self.armed = if self.armed == Some(id) { None } else { Some(id) };
        Ok(Outcome::Armed {
            question_id: self.armed,
        })
    }

    fn bind(&mut self, slot: SlotId) -> Result<Outcome, SessionError> {
        let question = self.armed.ok_or(SessionError::NothingArmed)?;
        if !self.has_slot(slot) {
            return Err(SessionError::UnknownSlot(slot));
        }

        if let Some(previous) = self.forward.remove(&question) {
            self.reverse.remove(&previous);
        }
        let displaced = self
            .reverse
            .remove(&slot)
            .filter(|other| *other != question);
        if let Some(other) = displaced {
            self.forward.remove(&other);
        }
        self.forward.insert(question, slot);
        self.reverse.insert(slot, question);
        self.armed = None;

        Ok(Outcome::Bound {
            question_id: question,
            slot,
            displaced,
        })
    }

    fn unbind(&mut self, id: QuestionId) -> Result<Outcome, SessionError> {
        if !self.has_question(id) {
            return Err(SessionError::UnknownItem(id));
        }
        let slot = self.forward.remove(&id);
        if let Some(slot) = slot {
            self.reverse.remove(&slot);
        }
        Ok(Outcome::Unbound {
            question_id: id,
            slot,
        })
    }

    /// Scores every pair against its generation-time slot and freezes the stage.
    fn validate(&mut self, index: usize, cumulative_before: usize) -> StageReport {
        let pairs: Vec<PairReport> = self
            .pairs
            .iter()
            .map(|pair| {
                let chosen = self.forward.get(&pair.question_id).copied();
                let verdict = match chosen {
                    Some(slot) if slot == pair.slot => Verdict::Correct,
                    Some(_) => Verdict::Incorrect,
                    None => Verdict::Unconnected,
                };
                PairReport {
                    question_id: pair.question_id,
                    chosen,
                    expected: pair.slot,
                    verdict,
                }
            })
            .collect();
        let stage_mistakes = pairs.iter().filter(|p| !p.verdict.is_correct()).count();
        let report = StageReport {
            stage_index: index,
            pairs,
            stage_mistakes,
            cumulative_mistakes: cumulative_before + stage_mistakes,
        };
        self.armed = None;
        self.report = Some(report.clone());
        report
    }

    fn view(&self, index: usize, count: usize, cumulative_mistakes: usize) -> StageItem {
        StageItem {
            stage_index: index,
            stage_count: count,
            left: self
                .left
                .iter()
                .map(|&i| {
                    let pair = &self.pairs[i];
                    LeftEntry {
                        question_id: pair.question_id,
                        prompt: pair.prompt.clone(),
                        bound_to: self.forward.get(&pair.question_id).copied(),
                    }
                })
                .collect(),
            right: self
                .right
                .iter()
                .map(|&i| {
                    let pair = &self.pairs[i];
                    RightSlot {
                        slot: pair.slot,
                        text: pair.answer.clone(),
                        bound_from: self.reverse.get(&pair.slot).copied(),
                    }
                })
                .collect(),
            armed: self.armed,
            connected: self.forward.len(),
            required: self.size(),
            cumulative_mistakes,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Stages run strictly in order; a stage is frozen once checked.
#[derive(Debug)]
pub struct MatchingSession {
    mode_id: ModeId,
    stages: Vec<Stage>,
    current: usize,
    stages_checked: usize,
    cumulative_mistakes: usize,
    correct: usize,
    outcomes: Vec<ItemOutcome>,
    run: RunState,
}

impl MatchingSession {
    fn new(mode_id: ModeId) -> Self {
        Self {
            mode_id,
            stages: Vec::new(),
            current: 0,
            stages_checked: 0,
            cumulative_mistakes: 0,
            correct: 0,
            outcomes: Vec::new(),
            run: RunState::default(),
        }
    }

    fn total_pairs(&self) -> usize {
        self.stages.iter().map(Stage::size).sum()
    }

    fn open_stage(&mut self) -> Result<&mut Stage, SessionError> {
        self.stages
            .get_mut(self.current)
            .ok_or(SessionError::Completed)
    }

    fn record(&mut self, report: &StageReport) {
        self.cumulative_mistakes = report.cumulative_mistakes;
        for pair in &report.pairs {
            if pair.verdict.is_correct() {
                self.correct += 1;
            }
            self.outcomes
                .push(ItemOutcome::new(pair.question_id, pair.verdict));
        }
    }

    fn check_stage(&mut self, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let index = self.current;
        let cumulative = self.cumulative_mistakes;
        let stage = self.open_stage()?;
        let (connected, required) = (stage.forward.len(), stage.size());
        if connected < required {
            return Err(SessionError::StageIncomplete {
                connected,
                required,
            });
        }
        let report = stage.validate(index, cumulative);
        self.record(&report);
        self.stages_checked += 1;
        self.current += 1;
        debug!(
            stage = index,
            mistakes = report.stage_mistakes,
            cumulative = report.cumulative_mistakes,
            "matching stage checked"
        );
        if self.current >= self.stages.len() {
            self.run.end(Termination::Completed, now);
        }
        Ok(Outcome::StageChecked(report))
    }

    /// Scores what is left when the run ends before the last check: the open
    /// stage in forced mode, every unreached stage as unconnected.
    fn settle_unfinished(&mut self) {
        while self.current < self.stages.len() {
            let index = self.current;
            let cumulative = self.cumulative_mistakes;
            let report = self.stages[index].validate(index, cumulative);
            self.record(&report);
            self.current += 1;
        }
    }

    fn checked_pairs(&self) -> usize {
        self.stages
            .iter()
            .take(self.stages_checked)
            .map(Stage::size)
            .sum()
    }
}

impl ModeSession for MatchingSession {
    fn mode_id(&self) -> &ModeId {
        &self.mode_id
    }

    fn configure(
        &self,
        bank: &Bank,
        options: &SessionOptions,
    ) -> Result<SessionConfig, ConfigError> {
        let defaults = ModeDefaults::MATCHING;
        let pairs_per_stage = options
            .pairs_per_stage
            .unwrap_or(defaults.pairs_per_stage)
            .clamp(MIN_PAIRS_PER_STAGE, MAX_PAIRS_PER_STAGE);
        let pairs_per_stage = usize::try_from(pairs_per_stage).unwrap_or(usize::MAX);

        let seed = resolve_seed(options.seed);
        let questions =
            SelectionBuilder::new(bank, MatchingMode::supports, defaults).build(options, seed)?;
        if questions.len() < pairs_per_stage {
            return Err(ConfigError::NotEnoughForStage {
                needed: pairs_per_stage,
                available: questions.len(),
            });
        }
        Ok(SessionConfig::assemble(
            self.mode_id.clone(),
            questions,
            options,
            &defaults,
            seed,
            ModeConfig::Matching { pairs_per_stage },
        ))
    }

    fn start(&mut self, config: SessionConfig, now: DateTime<Utc>) -> Result<(), SessionError> {
        check_config(&self.mode_id, &config)?;
        if self.run.is_started() {
            return Err(SessionError::AlreadyStarted);
        }
        let ModeConfig::Matching { pairs_per_stage } = config.mode else {
            return Err(SessionError::ConfigMismatch {
                expected: self.mode_id.clone(),
                actual: config.mode_id.clone(),
            });
        };

        let mut rng = config.start_rng();
        let mut next_slot = 0;
        self.stages = config
            .questions
            .chunks(pairs_per_stage.max(1))
            .map(|chunk| Stage::generate(chunk, &mut next_slot, &mut rng))
            .collect();

        self.run.begin(&self.mode_id, now, config.time_limit())?;
        if self.stages.is_empty() {
            self.run.end(Termination::Completed, now);
        }
        Ok(())
    }

    fn current_item(&self) -> Option<SessionItem> {
        if !self.run.is_started() || self.run.is_ended() {
            return None;
        }
        let stage = self.stages.get(self.current)?;
        Some(SessionItem::Stage(stage.view(
            self.current,
            self.stages.len(),
            self.cumulative_mistakes,
        )))
    }

    fn submit_response(
        &mut self,
        response: Response,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        self.run.ensure_active(now)?;
        match response {
            Response::Arm { question } => self.open_stage()?.arm(question),
            Response::Bind { slot } => self.open_stage()?.bind(slot),
            Response::Unbind { question } => self.open_stage()?.unbind(question),
            Response::CheckStage => self.check_stage(now),
            _ => Err(SessionError::UnsupportedResponse(self.mode_id.clone())),
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> bool {
        self.run.tick(now)
    }

    fn progress(&self, now: DateTime<Utc>) -> SessionProgress {
        let total = self.total_pairs();
        let answered = self.checked_pairs();
        SessionProgress {
            total,
            answered,
            correct: self.correct,
            mistakes: self.cumulative_mistakes,
            remaining: total.saturating_sub(answered),
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
        self.settle_unfinished();

        let total = self.total_pairs();
        let answered = self
            .outcomes
            .iter()
            .filter(|o| o.verdict != Verdict::Unconnected)
            .count();
        Ok(SessionResult {
            mode_id: self.mode_id.clone(),
            started_at: closing.started_at,
            finished_at: closing.ended_at,
            total_items: total,
            answered_items: answered,
            correct_count: self.correct,
            mistake_count: self.cumulative_mistakes,
            percentage: percent(total.saturating_sub(self.cumulative_mistakes), total),
            elapsed_secs: closing.elapsed_secs(),
            termination: closing.termination,
            per_item_outcomes: self.outcomes.clone(),
            summary: ModeSummary::Matching {
                stage_count: self.stages.len(),
                stages_checked: self.stages_checked,
                stage_mistakes: self
                    .stages
                    .iter()
                    .map(|s| s.report.as_ref().map_or(0, |r| r.stage_mistakes))
                    .collect(),
            },
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
