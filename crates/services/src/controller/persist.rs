use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quiz_core::model::{BankId, HistoryEntry, SessionResult};
use storage::HistoryRepository;

/// Whether a finished session's data reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SaveStatus {
    Saved,
    /// One of history or stats was written, the other failed.
    PartiallySaved { error: String },
    NotSaved { error: String },
}

impl SaveStatus {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved)
    }
}

/// A session that reached the results screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub result: SessionResult,
    pub save: SaveStatus,
}

/// Appends the history entry and folds outcomes into the stats. Failures are
/// logged and reported, never raised.
pub(crate) async fn save_result(
    history: &HistoryRepository,
    bank: &BankId,
    result: &SessionResult,
) -> SaveStatus {
    let entry = HistoryEntry::from_result(result);
    let history_write = history.append_history(bank, entry).await;
    let stats_write = history
        .record_outcomes(bank, &result.per_item_outcomes)
        .await;

    match (history_write, stats_write) {
        (Ok(()), Ok(())) => {
            debug!(bank = %bank, mode = %result.mode_id, "session result saved");
            SaveStatus::Saved
        }
        (Err(err), Ok(())) | (Ok(()), Err(err)) => {
            warn!(bank = %bank, error = %err, "session result partially saved");
            SaveStatus::PartiallySaved {
                error: err.to_string(),
            }
        }
        (Err(err), Err(_)) => {
            warn!(bank = %bank, error = %err, "session result not saved");
            SaveStatus::NotSaved {
                error: err.to_string(),
            }
        }
    }
}
