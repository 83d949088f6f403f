use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ModeId;
use crate::model::result::{SessionResult, percent};

/// Maximum number of history entries kept per bank; older ones are evicted.
pub const HISTORY_CAP: usize = 50;

/// Mode recorded for entries written before the mode field existed; only
/// the classic multiple-choice quiz wrote those.
pub const LEGACY_MODE: &str = "multiple-choice";

/// Persisted summary of one completed session.
///
/// Reading also accepts the older `{ correctCount, totalQuestions }` shape
/// without `mode` or `mistakesCount`; writing always uses the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredEntry")]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub mode: ModeId,
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub time_spent: u64,
    pub mistakes_count: usize,
}

impl HistoryEntry {
    #[must_use]
    pub fn from_result(result: &SessionResult) -> Self {
        Self {
            date: result.finished_at,
            mode: result.mode_id.clone(),
            score: result.correct_count,
            total: result.total_items,
            percentage: result.percentage,
            time_spent: result.elapsed_secs,
            mistakes_count: result.mistake_count,
        }
    }
}

/// Either stored shape of a history entry.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    date: DateTime<Utc>,
    mode: Option<ModeId>,
    score: Option<usize>,
    correct_count: Option<usize>,
    total: Option<usize>,
    total_questions: Option<usize>,
    percentage: Option<u32>,
    time_spent: Option<u64>,
    mistakes_count: Option<usize>,
}

impl From<StoredEntry> for HistoryEntry {
    fn from(stored: StoredEntry) -> Self {
        let score = stored.score.or(stored.correct_count).unwrap_or(0);
        let total = stored.total.or(stored.total_questions).unwrap_or(0);
        Self {
            date: stored.date,
            mode: stored.mode.unwrap_or_else(|| ModeId::new(LEGACY_MODE)),
            score,
            total,
            percentage: stored.percentage.unwrap_or_else(|| percent(score, total)),
            time_spent: stored.time_spent.unwrap_or(0),
            mistakes_count: stored
                .mistakes_count
                .unwrap_or_else(|| total.saturating_sub(score)),
        }
    }
}

/// Appends `entry` and evicts the oldest entries beyond [`HISTORY_CAP`].
pub fn push_capped(history: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    history.push(entry);
    if history.len() > HISTORY_CAP {
        let excess = history.len() - HISTORY_CAP;
        history.drain(..excess);
    }
}
