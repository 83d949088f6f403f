//! Key layout shared by every store backend.

use quiz_core::model::BankId;

/// Every key this application writes starts with this prefix.
pub const PREFIX: &str = "quiz_";

const HISTORY_SUFFIX: &str = "_history";
const STATS_SUFFIX: &str = "_stats";

#[must_use]
pub fn history_key(bank: &BankId) -> String {
    format!("{PREFIX}{bank}{HISTORY_SUFFIX}")
}

#[must_use]
pub fn stats_key(bank: &BankId) -> String {
    format!("{PREFIX}{bank}{STATS_SUFFIX}")
}

/// Recovers the bank id from a history key.
#[must_use]
pub fn bank_from_history_key(key: &str) -> Option<BankId> {
    key.strip_prefix(PREFIX)?
        .strip_suffix(HISTORY_SUFFIX)
        .filter(|id| !id.is_empty())
        .map(BankId::new)
}
