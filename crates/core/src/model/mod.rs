mod bank;
mod history;
mod ids;
mod question;
mod result;
mod stats;
mod validation;

pub use bank::{Bank, BankMeta};
pub use history::{HISTORY_CAP, HistoryEntry, LEGACY_MODE, push_capped};
pub use ids::{BankId, ModeId, ParseIdError, QuestionId, SlotId};
pub use question::{Answer, Difficulty, Question};
pub use result::{ItemOutcome, ModeSummary, SessionResult, Termination, Verdict, percent};
pub use stats::{QuestionStat, QuestionStats, fold_outcomes};
pub use validation::ValidationResult;
