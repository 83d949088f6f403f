//! The mode capability contract and the four built-in modes.
//!
//! A [`Mode`] is a stateless strategy: it says which questions it can use and
//! creates [`ModeSession`]s. A session is an independent state machine that
//! the controller drives only through the methods on [`ModeSession`].

mod flashcard;
mod item;
mod matching;
mod multiple_choice;
mod options;
mod plan;
mod registry;
mod runtime;
mod true_false;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SessionError};
use crate::model::{Bank, ModeId, Question, SessionResult, ValidationResult};

pub use flashcard::FlashcardMode;
pub use item::{
    CardItem, ChoiceFeedback, ChoiceItem, ChoiceView, Judgement, LeftEntry, Outcome, PairReport,
    Response, RightSlot, SessionItem, SessionProgress, StageItem, StageReport, StatementItem,
    StatementSource,
};
pub use matching::MatchingMode;
pub use multiple_choice::MultipleChoiceMode;
pub use options::{
    MAX_PAIRS_PER_STAGE, MIN_PAIRS_PER_STAGE, ModeConfig, ModeDefaults, SessionConfig,
    SessionOptions,
};
pub use plan::SelectionBuilder;
pub use registry::{ModeRegistry, ModeSettings, Registration, RegistrySettings, SupportedMode};
pub use true_false::{Statement, TrueFalseMode, synthesize_statement};

/// Identity shown in the mode picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeMetadata {
    pub id: ModeId,
    pub name: String,
    pub description: String,
}

impl ModeMetadata {
    #[must_use]
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: ModeId::new(id),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// A pluggable testing strategy.
pub trait Mode: Send + Sync {
    fn metadata(&self) -> &ModeMetadata;

    fn supports_question(&self, question: &Question) -> bool;

    /// Applies [`Mode::supports_question`] to every question of the bank.
    fn validate(&self, bank: &Bank) -> ValidationResult {
        let supported = bank
            .questions()
            .iter()
            .filter(|q| self.supports_question(q))
            .count();
        ValidationResult::from_counts(supported, bank.total_entries())
    }

    fn filter_questions<'a>(&self, questions: &'a [Question]) -> Vec<&'a Question> {
        questions
            .iter()
            .filter(|q| self.supports_question(q))
            .collect()
    }

    fn create_session(&self) -> Box<dyn ModeSession>;
}

/// One running instance of a mode against a configured subset of a bank.
///
/// Rejected calls return a [`SessionError`] and leave the session untouched.
pub trait ModeSession: Send {
    fn mode_id(&self) -> &ModeId;

    /// Validates raw options against the bank and freezes the selection.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the options leave nothing to run.
    fn configure(
        &self,
        bank: &Bank,
        options: &SessionOptions,
    ) -> Result<SessionConfig, ConfigError>;

    /// # Errors
    ///
    /// `AlreadyStarted` on a second call, `ConfigMismatch` for a config
    /// produced by another mode.
    fn start(&mut self, config: SessionConfig, now: DateTime<Utc>) -> Result<(), SessionError>;

    /// The item to render, or `None` once the session is done.
    fn current_item(&self) -> Option<SessionItem>;

    /// # Errors
    ///
    /// Any [`SessionError`] describing why the response was refused.
    fn submit_response(
        &mut self,
        response: Response,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError>;

    /// Timer event. Returns true when this tick ended the run.
    fn on_tick(&mut self, now: DateTime<Utc>) -> bool;

    fn progress(&self, now: DateTime<Utc>) -> SessionProgress;

    fn is_complete(&self) -> bool;

    /// Produces the result exactly once. On a live session this ends the run
    /// early.
    ///
    /// # Errors
    ///
    /// `NotStarted` before `start`, `AlreadyFinished` on a second call.
    fn finish(&mut self, now: DateTime<Utc>) -> Result<SessionResult, SessionError>;
}

/// Shared start-time check: the config must belong to this mode.
pub(crate) fn check_config(expected: &ModeId, config: &SessionConfig) -> Result<(), SessionError> {
    if &config.mode_id != expected {
        return Err(SessionError::ConfigMismatch {
            expected: expected.clone(),
            actual: config.mode_id.clone(),
        });
    }
    Ok(())
}
