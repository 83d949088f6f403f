use thiserror::Error;

use crate::model::{ModeId, QuestionId, SlotId};

/// Raised while turning raw bank text into a [`crate::model::Bank`].
///
/// Only text that is not JSON at all fails; structurally wrong banks still
/// load so validation can report them as unsupported.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
    #[error("bank is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
}

/// Setup-time failures. A session never launches when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("no categories selected")]
    NoCategoriesSelected,
    #[error("no questions left after filtering")]
    NoQuestionsAfterFiltering,
    #[error("question count {requested} is out of range (1..={available})")]
    CountOutOfRange { requested: u32, available: usize },
    #[error("matching needs at least {needed} questions for one stage, found {available}")]
    NotEnoughForStage { needed: usize, available: usize },
}

/// Runtime invariant violations. Every variant is returned without touching
/// session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session has not been started")]
    NotStarted,
    #[error("session is already running")]
    AlreadyStarted,
    #[error("session is complete")]
    Completed,
    #[error("session result was already produced")]
    AlreadyFinished,
    #[error("current item was already answered")]
    AlreadyAnswered,
    #[error("current item has not been answered yet")]
    NotAnswered,
    #[error("card must be revealed before it is assessed")]
    NotRevealed,
    #[error("no question is armed")]
    NothingArmed,
    #[error("stage has {connected} of {required} connections")]
    StageIncomplete { connected: usize, required: usize },
    #[error("question {0} is not part of the current item")]
    UnknownItem(QuestionId),
    #[error("slot {0} is not part of the current stage")]
    UnknownSlot(SlotId),
    #[error("choice {index} is out of range for {len} answers")]
    InvalidChoice { index: usize, len: usize },
    #[error("response is not accepted by mode {0}")]
    UnsupportedResponse(ModeId),
    #[error("config was produced for mode {expected}, not {actual}")]
    ConfigMismatch { expected: ModeId, actual: ModeId },
}

/// Rejections raised by [`crate::modes::ModeRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("mode has an empty id")]
    EmptyId,
    #[error("mode {0} has an empty display name")]
    EmptyName(ModeId),
    #[error("mode {0} is already registered")]
    Duplicate(ModeId),
}
